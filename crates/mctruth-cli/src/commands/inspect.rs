use crate::cli::InspectArgs;
use crate::config::builder::build_inspect_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use mctruth::{
    core::io::store::{DirectoryStore, EventStore},
    core::models::reference::TrackReference,
    engine::progress::ProgressReporter,
    workflows::event_handler::McEventHandler,
};
use tracing::info;

pub fn run(args: InspectArgs) -> Result<()> {
    let config = build_inspect_config(&args)?;

    info!("Opening run in {:?}", &config.input_dir);
    let store = DirectoryStore::open(&config.input_dir)?;
    let progress_handler = CliProgressHandler::new("primaries");
    let mut handler = McEventHandler::new(store, config.realign)
        .with_reporter(ProgressReporter::with_callback(progress_handler.get_callback()));

    handler.get_event(args.event)?;
    print!("{}", render(&handler, args.track, args.next_from)?);
    Ok(())
}

fn render<S: EventStore>(
    handler: &McEventHandler<S>,
    track: Option<usize>,
    next_from: Option<usize>,
) -> Result<String> {
    let mut out = String::new();
    if let Some(summary) = handler.summary() {
        out.push_str(&format!(
            "Event {}: {} track(s), {} primaries, {} track reference(s){}\n",
            summary.event,
            summary.tracks,
            summary.primaries,
            summary.references,
            if summary.realigned { " (realigned)" } else { "" }
        ));
        if summary.out_of_range_labels > 0 {
            out.push_str(&format!(
                "  {} reference label(s) outside their secondary range\n",
                summary.out_of_range_labels
            ));
        }
        if let Some(err) = summary.integrity {
            out.push_str(&format!("  {}\n", err));
        }
    }

    if handler.references().is_none() {
        out.push_str("No track references available for this event.\n");
    }

    if let Some(from) = next_from {
        match handler.find_next_with_references(from) {
            Some(found) => {
                out.push_str(&format!("Next track with references at or after {}: {}\n", from, found));
                render_track(handler, found, &mut out)?;
            }
            None => out.push_str(&format!("No track at or after {} has references.\n", from)),
        }
    }

    if let Some(track) = track {
        render_track(handler, track, &mut out)?;
    }
    Ok(out)
}

fn render_track<S: EventStore>(
    handler: &McEventHandler<S>,
    track: usize,
    out: &mut String,
) -> Result<()> {
    let (particle, references) = handler.particle_and_references(track)?;
    let link = |l: Option<usize>| l.map_or_else(|| "-".to_string(), |i| i.to_string());
    out.push_str(&format!(
        "Track {}: pdg {}, mother {}, daughters {}..{}, pt {:.4}\n",
        track,
        particle.pdg_code,
        link(particle.mother),
        link(particle.first_daughter),
        link(particle.last_daughter),
        particle.pt()
    ));
    for reference in references.unwrap_or_default() {
        out.push_str(&format_reference(reference));
    }
    Ok(())
}

fn format_reference(reference: &TrackReference) -> String {
    format!(
        "  {:<6} det {:>2}  x ({:.3}, {:.3}, {:.3})  p ({:.3}, {:.3}, {:.3})  t {:.3e}\n",
        reference.origin.branch_name(),
        reference
            .detector_id
            .unwrap_or_else(|| reference.origin.detector_id()),
        reference.position.x,
        reference.position.y,
        reference.position.z,
        reference.momentum.x,
        reference.momentum.y,
        reference.momentum.z,
        reference.time
    )
}
