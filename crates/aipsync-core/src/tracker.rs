use tokio::sync::watch;

/// Per-unit barrier over outstanding fetches.
///
/// Every enqueued part adds one, every worker completion removes one, and
/// [`wait`](Self::wait) returns once the count is back to zero. Waiting on a
/// tracker with nothing pending returns immediately.
#[derive(Debug)]
pub struct CompletionTracker {
    pending: watch::Sender<usize>,
}

impl Default for CompletionTracker {
    fn default() -> Self { Self::new() }
}

impl CompletionTracker {
    pub fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self { pending }
    }

    pub fn add(&self, n: usize) { self.pending.send_modify(|p| *p += n); }

    pub fn done(&self) { self.pending.send_modify(|p| *p = p.saturating_sub(1)); }

    pub fn pending(&self) -> usize { *self.pending.borrow() }

    pub async fn wait(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}
