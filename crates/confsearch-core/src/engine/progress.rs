//! Progress events emitted while a search runs.
//!
//! The search never renders anything itself; a front end installs a callback
//! on a [`ProgressReporter`] and turns the events into bars, logs or nothing.

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// A stage of the search began: `"Initialization"` or `"Evolution"`.
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// The current stage has `total_steps` units of work (structures to build
    /// or generations to run).
    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    /// A relaxed structure joined the population.
    Accepted { name: String, energy: f64 },
    /// A generation was completed and truncated.
    Generation { iteration: usize, best_energy: f64 },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards events to an optional callback.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    /// A reporter that drops every event.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// Whether events reach anyone; lets callers skip building costly payloads.
    pub fn is_enabled(&self) -> bool {
        self.callback.is_some()
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
