use crate::cli::RealignArgs;
use crate::config::builder::build_config;
use crate::config::models::AppConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use mctruth::{
    core::io::{
        store::{DirectoryStore, EventStore},
        trackrefs::TrackRefsFile,
        traits::EventFile,
    },
    engine::progress::{Progress, ProgressReporter},
    workflows::{
        event_handler::McEventHandler,
        realign_run::{self, RealignResult},
    },
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub fn run(args: RealignArgs) -> Result<()> {
    let config = build_config(&args)?;

    info!("Opening run in {:?}", &config.input_dir);
    let store = DirectoryStore::open(&config.input_dir)?;
    let events = select_events(&args.events, store.event_count())?;
    let by_file = group_by_file(&events, store.events_per_file());
    info!(
        "Realigning {} event(s) from {} file set(s).",
        events.len(),
        by_file.len()
    );

    let progress_handler = CliProgressHandler::new("file sets");
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Realigning track references...");
    reporter.report(Progress::TaskStart {
        total_steps: by_file.len() as u64,
    });
    let result = if config.parallel {
        realign_parallel(&config, &by_file, &reporter)?
    } else {
        realign_sequential(&config, store, &by_file, &reporter)?
    };
    reporter.report(Progress::TaskFinish);

    let Some(output_path) = config.output_path.as_ref() else {
        return Err(CliError::Argument("No output path given.".to_string()));
    };
    TrackRefsFile::write_to_path(&result.to_table(), output_path).map_err(|source| {
        CliError::Output {
            path: output_path.clone(),
            source,
        }
    })?;

    for summary in result.integrity_failures() {
        if let Some(err) = summary.integrity {
            warn!("Event {}: {}", summary.event, err);
            println!("Warning: event {}: {}", summary.event, err);
        }
    }
    println!(
        "✓ {} event(s), {} track reference(s) written to: {}",
        result.events.len(),
        result.reference_count(),
        output_path.display()
    );
    Ok(())
}

fn realign_sequential(
    config: &AppConfig,
    store: DirectoryStore,
    by_file: &BTreeMap<usize, Vec<usize>>,
    reporter: &ProgressReporter,
) -> Result<RealignResult> {
    let mut handler = McEventHandler::new(store, config.realign.clone());
    let mut result = RealignResult::default();
    for events in by_file.values() {
        result.merge(realign_run::run(&mut handler, events.iter().copied())?);
        reporter.report(Progress::TaskIncrement);
    }
    Ok(result)
}

/// Each file set gets its own store and handler.
fn realign_parallel(
    config: &AppConfig,
    by_file: &BTreeMap<usize, Vec<usize>>,
    reporter: &ProgressReporter,
) -> Result<RealignResult> {
    let partials = by_file
        .par_iter()
        .map(|(&file, events)| -> Result<RealignResult> {
            debug!(file, events = events.len(), "Realigning file set.");
            let store = DirectoryStore::open_at(&config.input_dir, file)?;
            let mut handler = McEventHandler::new(store, config.realign.clone());
            let partial = realign_run::run(&mut handler, events.iter().copied())?;
            reporter.report(Progress::TaskIncrement);
            Ok(partial)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(partials
        .into_iter()
        .fold(RealignResult::default(), |mut acc, partial| {
            acc.merge(partial);
            acc
        }))
}

fn select_events(requested: &[usize], total: usize) -> Result<Vec<usize>> {
    if requested.is_empty() {
        return Ok((0..total).collect());
    }
    if let Some(&event) = requested.iter().find(|&&e| e >= total) {
        return Err(CliError::Argument(format!(
            "Event {} is out of range (the run has {} events).",
            event, total
        )));
    }
    let mut events = requested.to_vec();
    events.sort_unstable();
    events.dedup();
    Ok(events)
}

fn group_by_file(events: &[usize], events_per_file: usize) -> BTreeMap<usize, Vec<usize>> {
    let per_file = events_per_file.max(1);
    let mut by_file: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &event in events {
        by_file.entry(event / per_file).or_default().push(event);
    }
    by_file
}
