use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use mctruth::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SPINNER_TICK_MS: u64 = 100;

/// What the bar is currently working on; rendered into its message.
#[derive(Debug, Default)]
struct Position {
    event: Option<usize>,
    phase: Option<&'static str>,
}

impl Position {
    fn label(&self) -> String {
        match (self.event, self.phase) {
            (Some(event), Some(phase)) => format!("event {}: {}", event, phase),
            (Some(event), None) => format!("event {}", event),
            (None, Some(phase)) => phase.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Renders the progress of one command as a single bar counting `unit`s.
///
/// A task (`TaskStart` .. `TaskFinish`) drives the bar; event and phase markers
/// only change its message, so a realignment run shows which event is being
/// worked on next to the number of file sets or primaries done.
#[derive(Clone)]
pub struct CliProgressHandler {
    bar: ProgressBar,
    unit: &'static str,
    position: Arc<Mutex<Position>>,
}

impl CliProgressHandler {
    pub fn new(unit: &'static str) -> Self {
        Self::with_target(unit, ProgressDrawTarget::stderr_with_hz(12))
    }

    fn with_target(unit: &'static str, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target).with_style(spinner_style());
        Self {
            bar,
            unit,
            position: Arc::new(Mutex::new(Position::default())),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let handler = self.clone();
        Box::new(move |progress: Progress| handler.apply(progress))
    }

    fn apply(&self, progress: Progress) {
        match progress {
            Progress::EventStart { event } => self.relabel(|p| {
                p.event = Some(event);
                p.phase = None;
            }),
            Progress::EventFinish => self.relabel(|p| *p = Position::default()),
            Progress::PhaseStart { name } => {
                self.relabel(|p| p.phase = Some(name));
                if self.bar.length().is_none() {
                    self.bar
                        .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                }
            }
            Progress::PhaseFinish => self.relabel(|p| p.phase = None),
            Progress::TaskStart { total_steps } => {
                self.bar.disable_steady_tick();
                self.bar.reset();
                self.bar.set_length(total_steps);
                self.bar.set_style(bar_style(self.unit));
            }
            Progress::TaskIncrement => self.bar.inc(1),
            Progress::TaskFinish => {
                if let Some(len) = self.bar.length() {
                    self.bar.set_position(len);
                }
                self.bar.finish();
            }
            Progress::Message(msg) => self.bar.println(format!("  {}", msg)),
        }
    }

    fn relabel(&self, update: impl FnOnce(&mut Position)) {
        let mut position = match self.position.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        update(&mut position);
        self.bar.set_message(position.label());
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style(unit: &str) -> ProgressStyle {
    let template = format!(
        "[{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}}) {{msg:.dim}}",
        unit
    );
    ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("##-")
}
