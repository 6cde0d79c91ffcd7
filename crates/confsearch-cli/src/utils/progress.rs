use confsearch::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use tracing::warn;

const BAR_TEMPLATE: &str = "{prefix:>14.bold} {bar:32.green/white} {pos:>3}/{len:<3} {msg} [{elapsed}]";

/// What the status line shows besides the bar itself.
#[derive(Debug, Default)]
struct SearchTally {
    phase: &'static str,
    accepted: usize,
    best_energy: Option<f64>,
}

impl SearchTally {
    fn record(&mut self, energy: f64) {
        self.best_energy = Some(self.best_energy.map_or(energy, |best| best.min(energy)));
    }

    fn summary(&self) -> String {
        match self.best_energy {
            Some(best) => format!("{} accepted, best {:.4}", self.accepted, best),
            None => format!("{} accepted", self.accepted),
        }
    }
}

struct SearchDisplay {
    bar: ProgressBar,
    tally: SearchTally,
}

/// One bar per search phase: structures during initialization, generations
/// during evolution, with a running count of accepted structures and the best
/// energy seen so far.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<SearchDisplay>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(Self::bar_style());
        Self {
            display: Arc::new(Mutex::new(SearchDisplay {
                bar,
                tally: SearchTally::default(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let display = self.display.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut guard) = display.lock() else {
                warn!("Progress display lock was poisoned; dropping event.");
                return;
            };
            let SearchDisplay { bar, tally } = &mut *guard;

            match progress {
                Progress::PhaseStart { name } => {
                    tally.phase = name;
                    bar.reset();
                    bar.set_length(0);
                    bar.set_prefix(name);
                    bar.set_message(tally.summary());
                }
                Progress::TaskStart { total_steps } => {
                    bar.set_length(total_steps);
                    bar.set_position(0);
                }
                Progress::TaskIncrement => bar.inc(1),
                Progress::TaskFinish => {
                    if let Some(len) = bar.length() {
                        bar.set_position(len);
                    }
                }
                Progress::Accepted { energy, .. } => {
                    tally.accepted += 1;
                    tally.record(energy);
                    bar.set_message(tally.summary());
                }
                Progress::Generation { best_energy, .. } => {
                    tally.record(best_energy);
                    bar.set_message(tally.summary());
                }
                Progress::PhaseFinish => {
                    bar.finish_with_message(format!("{} done, {}", tally.phase, tally.summary()));
                }
                Progress::Message(msg) => {
                    if bar.is_finished() {
                        bar.set_message(msg);
                    } else {
                        bar.println(format!("  {}", msg));
                    }
                }
            }
        })
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
