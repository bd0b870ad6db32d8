use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// `processed` out of `total` stores are materialized
    Update { processed: usize, total: usize },
    Complete,
}

/// Receives progress of a decode. Updates are monotonically increasing and
/// end with exactly one call to `complete`.
pub trait Progress: Send {
    fn update(&mut self, processed: usize, total: usize);
    fn complete(&mut self);
}

impl Progress for Sender<ProgressEvent> {
    fn update(&mut self, processed: usize, total: usize) {
        // receiver may have hung up, the decode continues regardless
        let _ = self.send(ProgressEvent::Update { processed, total });
    }

    fn complete(&mut self) {
        let _ = self.send(ProgressEvent::Complete);
    }
}

impl<F> Progress for F
where
    F: FnMut(ProgressEvent) + Send,
{
    fn update(&mut self, processed: usize, total: usize) {
        self(ProgressEvent::Update { processed, total });
    }

    fn complete(&mut self) {
        self(ProgressEvent::Complete);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&mut self, _: usize, _: usize) {}
    fn complete(&mut self) {}
}

/// Cooperative cancellation, checked before the index is built and
/// between stores.
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_receive_events() {
        let mut events: Vec<ProgressEvent> = Vec::new();
        {
            let mut sink = |e: ProgressEvent| events.push(e);
            sink.update(1, 2);
            Progress::complete(&mut sink);
        }
        assert_eq!(
            events,
            vec![
                ProgressEvent::Update {
                    processed: 1,
                    total: 2
                },
                ProgressEvent::Complete
            ]
        );
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
