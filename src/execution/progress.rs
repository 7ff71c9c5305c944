//! Progress aggregation across workers.
//!
//! Workers report completed units from any thread. The aggregated
//! percentage is forwarded to the callback only when it has advanced by at
//! least the configured step since the last emission, so a sink sees a short,
//! non-decreasing sequence ending at 100. Emission is best-effort: a worker
//! that finds another thread emitting skips its update instead of waiting.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Callback type for progress updates (percentage 0..=100).
pub type ProgressCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// Default minimum advance between emissions.
pub const DEFAULT_PROGRESS_STEP: u32 = 5;

/// Shared progress state for one filter run.
pub struct ProgressState {
    /// Progress callback.
    callback: Option<ProgressCallback>,
    /// Minimum advance before emitting.
    step: u32,
    /// Units completed in the current pass.
    done: AtomicU64,
    /// Units expected in the current pass.
    total: AtomicU64,
    /// Percentage at the start of the current pass.
    base: AtomicU32,
    /// Percentage covered by the current pass.
    span: AtomicU32,
    /// Last emitted percentage.
    last_emitted: Mutex<u32>,
}

impl ProgressState {
    /// Create a state with no callback.
    pub fn new() -> Self {
        Self {
            callback: None,
            step: DEFAULT_PROGRESS_STEP,
            done: AtomicU64::new(0),
            total: AtomicU64::new(0),
            base: AtomicU32::new(0),
            span: AtomicU32::new(100),
            last_emitted: Mutex::new(0),
        }
    }

    /// Set a callback for progress updates.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Set the minimum advance between emissions.
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step.clamp(1, 100);
        self
    }

    /// Start a pass of `units` work items mapped onto the window `[from, to]`.
    ///
    /// Multi-stage filters give each stage its own window so the overall
    /// sequence stays monotonic.
    pub fn begin_pass(&self, units: u64, from: u32, to: u32) {
        let from = from.min(100);
        let to = to.clamp(from, 100);
        self.base.store(from, Ordering::SeqCst);
        self.span.store(to - from, Ordering::SeqCst);
        self.total.store(units, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
    }

    /// Report `units` more completed items in the current pass.
    pub fn advance(&self, units: u64) {
        let done = self.done.fetch_add(units, Ordering::Relaxed) + units;
        let total = self.total.load(Ordering::Relaxed);
        let base = self.base.load(Ordering::Relaxed);
        let span = self.span.load(Ordering::Relaxed) as u64;
        let percent = if total == 0 {
            base as u64 + span
        } else {
            base as u64 + span * done.min(total) / total
        };
        self.report(percent as u32);
    }

    /// Report an absolute percentage.
    pub fn report(&self, percent: u32) {
        let percent = percent.min(100);
        if let Some(mut last) = self.last_emitted.try_lock() {
            let reached_end = percent == 100 && *last < 100;
            if percent >= *last + self.step || reached_end {
                *last = percent;
                self.send_update(percent);
            }
        }
    }

    /// Emit the final 100, waiting for any in-flight emission.
    pub fn finish(&self) {
        let mut last = self.last_emitted.lock();
        if *last < 100 {
            *last = 100;
            self.send_update(100);
        }
    }

    /// Last percentage forwarded to the callback.
    pub fn last_emitted(&self) -> u32 {
        *self.last_emitted.lock()
    }

    fn send_update(&self, percent: u32) {
        if let Some(ref callback) = self.callback {
            callback(percent);
        }
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressState")
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .field("step", &self.step)
            .field("done", &self.done.load(Ordering::Relaxed))
            .field("total", &self.total.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (ProgressState, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let state = ProgressState::new().with_callback(move |p| sink.lock().push(p));
        (state, seen)
    }

    #[test]
    fn test_updates_are_coalesced() {
        let (state, seen) = recording();
        state.begin_pass(100, 0, 100);
        for _ in 0..100 {
            state.advance(1);
        }
        let seen = seen.lock();
        assert_eq!(seen.len(), 20);
        assert!(seen.windows(2).all(|w| w[1] - w[0] >= 5));
        assert_eq!(*seen.last().unwrap(), 100);
    }

    #[test]
    fn test_passes_map_onto_windows() {
        let (state, seen) = recording();
        state.begin_pass(10, 0, 50);
        state.advance(10);
        state.begin_pass(4, 50, 100);
        state.advance(2);
        assert_eq!(*seen.lock(), vec![50, 75]);
        state.finish();
        assert_eq!(*seen.lock(), vec![50, 75, 100]);
    }

    #[test]
    fn test_finish_emits_once() {
        let (state, seen) = recording();
        state.finish();
        state.finish();
        state.report(100);
        assert_eq!(*seen.lock(), vec![100]);
    }

    #[test]
    fn test_concurrent_reports_stay_monotonic() {
        let (state, seen) = recording();
        let state = Arc::new(state);
        state.begin_pass(4000, 0, 100);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        state.advance(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        state.finish();

        let seen = seen.lock();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*seen.last().unwrap(), 100);
    }
}
