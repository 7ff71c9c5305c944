//! Per-run filter context.
//!
//! A [`FilterContext`] bundles the engine with the cancellation token and
//! progress state of one filter run, and provides the row-parallel helpers
//! every filter uses.

use crate::core::buffer::{PixelBuffer, RowBand};
use crate::execution::cancel::CancellationToken;
use crate::execution::engine::{FilterEngine, RunStatus};
use crate::execution::progress::ProgressState;
use std::ops::Range;
use std::sync::Arc;

/// Range of the overall progress percentage assigned to one pass.
pub type ProgressWindow = (u32, u32);

/// The whole 0..=100 progress range.
pub const FULL_WINDOW: ProgressWindow = (0, 100);

/// Execution context passed to every filter.
pub struct FilterContext<'a> {
    engine: &'a FilterEngine,
    cancel: CancellationToken,
    progress: Arc<ProgressState>,
}

impl<'a> FilterContext<'a> {
    /// Create a context with a fresh token and no progress callback.
    pub fn new(engine: &'a FilterEngine) -> Self {
        Self {
            engine,
            cancel: CancellationToken::new(),
            progress: Arc::new(ProgressState::new().with_step(engine.config().progress_step)),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Forward coalesced progress percentages to `callback`.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let step = self.engine.config().progress_step;
        self.progress = Arc::new(ProgressState::new().with_callback(callback).with_step(step));
        self
    }

    /// The engine running the passes.
    pub fn engine(&self) -> &FilterEngine {
        self.engine
    }

    /// The cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The progress state.
    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    /// Whether work should go on.
    pub fn should_continue(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Call `row_fn` for every row of `dest`, one band per worker.
    ///
    /// Cancellation is polled before each row and progress advances after it.
    pub fn for_each_row<F>(&self, dest: &mut PixelBuffer, window: ProgressWindow, row_fn: F) -> RunStatus
    where
        F: Fn(&mut RowBand<'_>, usize) + Sync,
    {
        self.for_each_row_with(dest, window, || (), |_, band, y| row_fn(band, y))
    }

    /// Like [`for_each_row`](Self::for_each_row) with band-local scratch
    /// state created by `init` once per band.
    pub fn for_each_row_with<S, I, F>(
        &self,
        dest: &mut PixelBuffer,
        window: ProgressWindow,
        init: I,
        row_fn: F,
    ) -> RunStatus
    where
        I: Fn() -> S + Sync,
        F: Fn(&mut S, &mut RowBand<'_>, usize) + Sync,
    {
        let height = dest.height() as usize;
        let ranges = self.engine.partition(height);
        self.progress.begin_pass(height as u64, window.0, window.1);

        let cancel = &self.cancel;
        let progress = &self.progress;
        self.engine.run_bands(dest, &ranges, cancel, |mut band| {
            let mut state = init();
            for y in band.rows() {
                if cancel.is_cancelled() {
                    return;
                }
                row_fn(&mut state, &mut band, y);
                progress.advance(1);
            }
        })
    }

    /// Run `task` over a partition of `[0, length)` without a destination,
    /// for read-only reductions.
    pub fn for_each_range<F>(&self, length: usize, window: ProgressWindow, task: F) -> RunStatus
    where
        F: Fn(Range<usize>) + Sync,
    {
        let ranges = self.engine.partition(length);
        self.progress.begin_pass(length as u64, window.0, window.1);
        let progress = &self.progress;
        self.engine.run(&ranges, &self.cancel, |range| {
            let units = range.len() as u64;
            task(range);
            progress.advance(units);
        })
    }
}

/// Split a progress window into `parts` consecutive sub-windows.
pub fn split_window(window: ProgressWindow, parts: u32) -> Vec<ProgressWindow> {
    let parts = parts.max(1);
    let (from, to) = window;
    let span = to.saturating_sub(from);
    (0..parts)
        .map(|i| (from + span * i / parts, from + span * (i + 1) / parts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::BitDepth;
    use crate::core::color::ColorSample;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_for_each_row_reports_progress() {
        let engine = FilterEngine::with_threads(2).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ctx = FilterContext::new(&engine).with_progress(move |p| sink.lock().push(p));

        let mut dest = PixelBuffer::new(3, 40, BitDepth::Eight, false).unwrap();
        let status = ctx.for_each_row(&mut dest, FULL_WINDOW, |band, y| {
            band.set_pixel(0, y, &ColorSample::opaque(y as u16, 0, 0, false));
        });

        assert_eq!(status, RunStatus::Completed);
        assert_eq!(dest.pixel(0, 39).unwrap().red, 39);
        let seen = seen.lock();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last().copied(), Some(100));
    }

    #[test]
    fn test_cancelled_context_stops_rows() {
        let engine = FilterEngine::with_threads(1).unwrap();
        let token = CancellationToken::new();
        let ctx = FilterContext::new(&engine).with_cancellation(token.clone());
        let rows = AtomicUsize::new(0);

        let mut dest = PixelBuffer::new(2, 50, BitDepth::Eight, false).unwrap();
        let status = ctx.for_each_row(&mut dest, FULL_WINDOW, |_, _| {
            if rows.fetch_add(1, Ordering::SeqCst) == 4 {
                token.cancel();
            }
        });

        assert_eq!(status, RunStatus::Cancelled);
        assert_eq!(rows.load(Ordering::SeqCst), 5);
        assert!(!ctx.should_continue());
    }

    #[test]
    fn test_split_window() {
        assert_eq!(split_window((0, 100), 4), vec![(0, 25), (25, 50), (50, 75), (75, 100)]);
        assert_eq!(split_window((20, 30), 1), vec![(20, 30)]);
    }
}
