#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    /// A new independent trial of the orientation search begins.
    TrialStart {
        trial: usize,
        trials: usize,
        seed: u64,
        workers: usize,
    },
    /// One sweep over the projections begins; each placed projection is then
    /// reported with [`Progress::TaskIncrement`].
    IterationStart {
        iteration: usize,
        max_iterations: usize,
        projections: u64,
    },
    IterationFinish {
        iteration: usize,
        discrepancy: f64,
        changed: bool,
    },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn events_reach_the_callback_in_order() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            let label = match event {
                Progress::PhaseStart { name } => name.to_string(),
                Progress::IterationStart {
                    iteration,
                    max_iterations,
                    ..
                } => format!("{}/{}", iteration, max_iterations),
                other => format!("{:?}", other),
            };
            seen.lock().unwrap().push(label);
        }));
        reporter.report(Progress::PhaseStart { name: "Search" });
        reporter.report(Progress::IterationStart {
            iteration: 1,
            max_iterations: 4,
            projections: 6,
        });
        reporter.report(Progress::PhaseFinish);
        drop(reporter);
        assert_eq!(
            seen.into_inner().unwrap(),
            vec!["Search", "1/4", "PhaseFinish"]
        );
    }

    #[test]
    fn silent_reporter_ignores_events() {
        ProgressReporter::new().report(Progress::TaskIncrement);
    }
}
