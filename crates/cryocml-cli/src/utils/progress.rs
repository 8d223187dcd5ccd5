use cryocml::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Search context the bar keeps between events.
#[derive(Debug, Default)]
struct SearchStatus {
    phase: &'static str,
    /// One-based trial number and trial count.
    trial: Option<(usize, usize)>,
    workers: usize,
}

impl SearchStatus {
    fn label(&self) -> String {
        match self.trial {
            Some((trial, trials)) => format!(
                "{} [trial {}/{}, {} {}]",
                self.phase,
                trial,
                trials,
                self.workers,
                if self.workers == 1 { "worker" } else { "workers" }
            ),
            None => self.phase.to_string(),
        }
    }
}

struct BarState {
    pb: ProgressBar,
    status: SearchStatus,
}

impl BarState {
    fn apply(&mut self, progress: Progress) {
        let pb = &self.pb;
        match progress {
            Progress::PhaseStart { name } => {
                self.status = SearchStatus {
                    phase: name,
                    ..SearchStatus::default()
                };
                pb.reset();
                pb.set_length(0);
                pb.set_prefix("");
                pb.set_style(spinner_style());
                pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                pb.set_message(self.status.label());
            }
            Progress::PhaseFinish => {
                pb.disable_steady_tick();
                pb.finish_with_message(format!("✓ {}", self.status.phase));
            }
            Progress::TrialStart {
                trial,
                trials,
                seed,
                workers,
            } => {
                self.status.trial = Some((trial + 1, trials));
                self.status.workers = workers;
                pb.println(format!("  Trial {}/{} with seed {}", trial + 1, trials, seed));
                pb.set_message(self.status.label());
            }
            Progress::IterationStart {
                iteration,
                max_iterations,
                projections,
            } => {
                pb.disable_steady_tick();
                pb.reset();
                pb.set_length(projections);
                pb.set_position(0);
                pb.set_style(iteration_style());
                pb.set_prefix(format!("Iteration {}/{}", iteration, max_iterations));
                pb.set_message(self.status.label());
            }
            Progress::IterationFinish {
                discrepancy,
                changed,
                ..
            } => {
                pb.set_position(pb.length().unwrap_or(0));
                pb.set_message(format!(
                    "{} d = {:.4e}{}",
                    self.status.label(),
                    discrepancy,
                    if changed { "" } else { " (stable)" }
                ));
                pb.finish();
            }
            Progress::TaskStart { total_steps } => {
                pb.disable_steady_tick();
                pb.reset();
                pb.set_length(total_steps);
                pb.set_position(0);
                pb.set_prefix("");
                pb.set_style(task_style());
                pb.set_message(self.status.label());
            }
            Progress::TaskIncrement => {
                pb.inc(1);
            }
            Progress::TaskFinish => {
                pb.set_position(pb.length().unwrap_or(0));
                pb.finish();
            }
            Progress::Message(msg) => {
                if !pb.is_finished() {
                    pb.println(format!("  {}", msg));
                } else {
                    pb.set_message(msg);
                }
            }
        }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|e| {
        warn!("Invalid progress template {:?}: {}", template, e);
        ProgressStyle::default_bar()
    })
}

fn spinner_style() -> ProgressStyle {
    style("{spinner:.green} {msg}")
}

fn iteration_style() -> ProgressStyle {
    style("{prefix:>16.bold} [{bar:30.cyan/blue}] {pos}/{len} projections  {msg}")
        .progress_chars("##-")
}

fn task_style() -> ProgressStyle {
    style("{msg:<20} [{bar:40.cyan/blue}] {pos}/{len} ({eta})").progress_chars("##-")
}

/// Renders the core's progress events on stderr: a spinner per phase, one bar per
/// search iteration counting placed projections, and a plain bar for other tasks.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<BarState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0).with_style(spinner_style());
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.finish_and_clear();

        Self {
            display: Arc::new(Mutex::new(BarState {
                pb,
                status: SearchStatus::default(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let display = self.display.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut display) = display.lock() else {
                warn!("Progress display mutex was poisoned. Cannot update progress.");
                return;
            };
            display.apply(progress);
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn bar(handler: &CliProgressHandler) -> ProgressBar {
        handler.display.lock().unwrap().pb.clone()
    }

    #[test]
    fn handler_initializes_in_a_clean_state() {
        let handler = CliProgressHandler::new();
        let pb = bar(&handler);
        assert_eq!(pb.length(), Some(0));
        assert!(pb.is_finished());
    }

    #[test]
    fn search_iterations_count_placed_projections() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Orientation search",
        });
        callback(Progress::TrialStart {
            trial: 0,
            trials: 2,
            seed: 9,
            workers: 3,
        });
        assert_eq!(
            bar(&handler).message(),
            "Orientation search [trial 1/2, 3 workers]"
        );

        callback(Progress::IterationStart {
            iteration: 2,
            max_iterations: 10,
            projections: 5,
        });
        {
            let pb = bar(&handler);
            assert_eq!(pb.prefix(), "Iteration 2/10");
            assert_eq!(pb.length(), Some(5));
            assert_eq!(pb.position(), 0);
            assert!(!pb.is_finished());
        }

        callback(Progress::TaskIncrement);
        callback(Progress::TaskIncrement);
        assert_eq!(bar(&handler).position(), 2);

        callback(Progress::IterationFinish {
            iteration: 2,
            discrepancy: 1.5,
            changed: false,
        });
        {
            let pb = bar(&handler);
            assert_eq!(pb.position(), 5);
            assert!(pb.is_finished());
            assert_eq!(
                pb.message(),
                "Orientation search [trial 1/2, 3 workers] d = 1.5000e0 (stable)"
            );
        }

        callback(Progress::PhaseFinish);
        assert_eq!(bar(&handler).message(), "✓ Orientation search");
    }

    #[test]
    fn a_new_phase_forgets_the_trial() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();
        callback(Progress::PhaseStart {
            name: "Orientation search",
        });
        callback(Progress::TrialStart {
            trial: 0,
            trials: 1,
            seed: 0,
            workers: 1,
        });
        assert_eq!(
            bar(&handler).message(),
            "Orientation search [trial 1/1, 1 worker]"
        );
        callback(Progress::PhaseStart { name: "Sinograms" });
        assert_eq!(bar(&handler).message(), "Sinograms");
    }

    #[test]
    fn projection_tasks_use_a_plain_bar() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart { name: "Projection" });
        callback(Progress::TaskStart { total_steps: 3 });
        callback(Progress::TaskIncrement);
        {
            let pb = bar(&handler);
            assert_eq!(pb.length(), Some(3));
            assert_eq!(pb.position(), 1);
            assert_eq!(pb.prefix(), "");
        }
        callback(Progress::TaskFinish);
        {
            let pb = bar(&handler);
            assert!(pb.is_finished());
            assert_eq!(pb.position(), 3);
        }
        callback(Progress::Message("Trial 1: discrepancy 2.0e0".to_string()));
        assert_eq!(bar(&handler).message(), "Trial 1: discrepancy 2.0e0");
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::PhaseStart {
                name: "Orientation search",
            });
            callback(Progress::TaskIncrement);
            callback(Progress::PhaseFinish);
        })
        .join()
        .unwrap();

        let pb = bar(&handler);
        assert!(pb.is_finished());
        assert_eq!(pb.message(), "✓ Orientation search");
    }
}
