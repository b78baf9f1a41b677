use aipsync_core::{Events, SyncEvent};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use once_cell::sync::Lazy;

pub trait TrackerBuilder<T: Tracker<U>, U> {
    fn build(self) -> T;
}

pub trait Tracker<Inc> {
    fn step(&self, step: Inc) -> &Self;
    fn finish(self);
}

const PB_STYLE: &str = "{spinner:.blue} {prefix:>8.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} parts {wide_msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    let pb_style = match ProgressStyle::with_template(PB_STYLE) {
        Ok(pb_style) => pb_style.tick_chars(TICK).progress_chars(PB_CHARS),
        Err(_) => return None,
    };

    Some(pb_style)
});

/// Progress bar over every part scheduled during a run. The length grows as
/// units start their download passes.
#[derive(Clone)]
pub struct ProgressTracker {
    pb:     ProgressBar,
    finish: Option<String>,
}

impl ProgressTracker {
    /// Event sink feeding this tracker.
    pub fn events(&self) -> Events {
        let tracker = self.clone();
        Events::new(move |event| {
            tracker.step(event);
        })
    }
}

impl<'a> Tracker<&'a SyncEvent> for ProgressTracker {
    fn step(&self, event: &'a SyncEvent) -> &Self {
        match event {
            SyncEvent::UnitStarted {
                unit, outstanding, ..
            } => {
                self.pb.inc_length(*outstanding as u64);
                self.pb.set_message(unit.clone());
            }
            SyncEvent::PartFetched { .. } => self.pb.inc(1),
            SyncEvent::UnitRetry { unit, retries, .. } => {
                self.pb.println(format!("{unit}: retry {retries}"));
            }
            SyncEvent::UnitMerged { unit, written } => {
                self.pb.set_message(format!("{unit} merged ({written} written)"));
            }
            SyncEvent::UnitFailed { unit, reason } => {
                self.pb.println(format!("{unit}: {reason}"));
            }
        }
        self
    }

    fn finish(self) {
        match self.finish {
            Some(msg) => self.pb.finish_with_message(msg),
            None => self.pb.finish(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgressTrackerBuilder {
    prefix: Option<String>,
    finish: Option<String>,
    hidden: bool,
}

impl ProgressTrackerBuilder {
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn with_finish(mut self, finish: &str) -> Self {
        self.finish = Some(finish.to_string());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

impl<'a> TrackerBuilder<ProgressTracker, &'a SyncEvent> for ProgressTrackerBuilder {
    fn build(self) -> ProgressTracker {
        let pb = if self.hidden {
            ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(0)
        };
        let pb = if let Some(style) = PB_TEMPLATE.as_ref() {
            pb.with_style(style.clone())
        } else {
            pb
        };

        if let Some(prefix) = self.prefix {
            pb.set_prefix(prefix);
        }
        ProgressTracker {
            pb,
            finish: self.finish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ProgressTracker {
        ProgressTrackerBuilder::default().hidden(true).build()
    }

    #[test]
    fn test_length_grows_with_started_units() {
        let tracker = tracker();
        tracker.step(&SyncEvent::UnitStarted {
            unit:        "RJTT".into(),
            pass:        1,
            parts:       5,
            outstanding: 3,
        });
        tracker.step(&SyncEvent::UnitStarted {
            unit:        "RJAA".into(),
            pass:        1,
            parts:       2,
            outstanding: 2,
        });

        assert_eq!(tracker.pb.length(), Some(5));
        assert_eq!(tracker.pb.position(), 0);
    }

    #[test]
    fn test_events_advance_the_bar() {
        let tracker = tracker();
        let events = tracker.events();
        events.emit(SyncEvent::UnitStarted {
            unit:        "RJTT".into(),
            pass:        1,
            parts:       2,
            outstanding: 2,
        });
        for part in 0..2 {
            events.emit(SyncEvent::PartFetched {
                unit: "RJTT".into(),
                part,
                ok: part == 0,
            });
        }

        assert_eq!(tracker.pb.position(), 2);
        tracker.finish();
    }
}
