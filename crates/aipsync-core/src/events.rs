use std::fmt;
use std::sync::Arc;

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    UnitStarted {
        unit:        String,
        pass:        u32,
        parts:       usize,
        outstanding: usize,
    },
    PartFetched {
        unit: String,
        part: usize,
        ok:   bool,
    },
    UnitRetry {
        unit:    String,
        retries: u32,
        reason:  String,
    },
    UnitMerged {
        unit:    String,
        written: usize,
    },
    UnitFailed {
        unit:   String,
        reason: String,
    },
}

type Callback = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Optional event sink, cheap to clone into every task.
#[derive(Clone, Default)]
pub struct Events(Option<Callback>);

impl Events {
    pub fn new(callback: impl Fn(&SyncEvent) + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(callback)))
    }

    pub fn none() -> Self { Self(None) }

    pub fn emit(&self, event: SyncEvent) {
        if let Some(callback) = &self.0 {
            callback(&event);
        }
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Events")
            .field(&self.0.as_ref().map(|_| "callback"))
            .finish()
    }
}
