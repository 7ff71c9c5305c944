//! Filter execution engine.
//!
//! The engine owns one bounded worker pool and runs fork-join passes over
//! it: a pass spawns one task per range and returns only after every task
//! has finished. Multi-stage filters call the engine once per stage.

use crate::core::buffer::{PixelBuffer, RowBand};
use crate::core::config::EngineConfig;
use crate::core::error::{FilterError, FilterResult};
use crate::execution::cancel::CancellationToken;
use crate::execution::partition::partition;
use log::{debug, info};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How a pass or filter run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every range was processed.
    Completed,
    /// Cancellation was observed; the destination must be discarded.
    Cancelled,
}

impl RunStatus {
    /// Whether the run completed.
    pub fn is_completed(self) -> bool {
        self == RunStatus::Completed
    }

    /// Whether the run was cancelled.
    pub fn is_cancelled(self) -> bool {
        self == RunStatus::Cancelled
    }
}

/// Parallel pass executor backed by a reusable rayon pool.
pub struct FilterEngine {
    pool: ThreadPool,
    config: EngineConfig,
}

impl FilterEngine {
    /// Create an engine sized to the hardware.
    pub fn new() -> FilterResult<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with exactly `threads` workers (0 = hardware).
    pub fn with_threads(threads: usize) -> FilterResult<Self> {
        Self::with_config(EngineConfig::default().with_max_threads(threads))
    }

    /// Create an engine from configuration.
    pub fn with_config(config: EngineConfig) -> FilterResult<Self> {
        config.validate()?;
        let threads = config.effective_threads();
        let prefix = config.thread_name_prefix.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{}-{}", prefix, i))
            .build()
            .map_err(|e| FilterError::ThreadPool(e.to_string()))?;

        info!("Filter engine started with {} worker threads", threads);
        Ok(Self { pool, config })
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Configuration the engine was built from.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Partition `[0, length)` across the workers.
    pub fn partition(&self, length: usize) -> Vec<Range<usize>> {
        partition(length, self.worker_count())
    }

    /// Run `task` once per range and wait for all of them.
    ///
    /// A task that has not started when cancellation is observed is skipped,
    /// so after a cancel each worker finishes at most the range it is on.
    pub fn run<F>(&self, ranges: &[Range<usize>], cancel: &CancellationToken, task: F) -> RunStatus
    where
        F: Fn(Range<usize>) + Sync,
    {
        if cancel.is_cancelled() {
            return RunStatus::Cancelled;
        }
        debug!("Dispatching {} ranges", ranges.len());

        let task = &task;
        self.pool.scope(|scope| {
            for range in ranges.iter().cloned() {
                scope.spawn(move |_| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    task(range);
                });
            }
        });

        self.finish_status(cancel)
    }

    /// Run `task` once per row band of `dest` and wait for all of them.
    ///
    /// Each task owns its band exclusively, so workers write disjoint rows.
    pub fn run_bands<F>(
        &self,
        dest: &mut PixelBuffer,
        ranges: &[Range<usize>],
        cancel: &CancellationToken,
        task: F,
    ) -> RunStatus
    where
        F: Fn(RowBand<'_>) + Sync,
    {
        if cancel.is_cancelled() {
            return RunStatus::Cancelled;
        }
        debug!("Dispatching {} row bands", ranges.len());

        let bands = dest.split_rows_mut(ranges);
        let task = &task;
        self.pool.scope(|scope| {
            for band in bands {
                scope.spawn(move |_| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    task(band);
                });
            }
        });

        self.finish_status(cancel)
    }

    fn finish_status(&self, cancel: &CancellationToken) -> RunStatus {
        if cancel.is_cancelled() {
            debug!("Pass observed cancellation");
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        }
    }
}

impl std::fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("workers", &self.worker_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::BitDepth;
    use crate::core::color::ColorSample;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_worker_count_follows_config() {
        let engine = FilterEngine::with_threads(3).unwrap();
        assert_eq!(engine.worker_count(), 3);
        assert_eq!(engine.partition(10).len(), 3);
    }

    #[test]
    fn test_run_visits_every_range() {
        let engine = FilterEngine::with_threads(4).unwrap();
        let visited = AtomicUsize::new(0);
        let ranges = engine.partition(1000);
        let status = engine.run(&ranges, &CancellationToken::new(), |r| {
            visited.fetch_add(r.len(), Ordering::Relaxed);
        });
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(visited.load(Ordering::Relaxed), 1000);
    }

    #[test]
    fn test_cancel_after_first_partition() {
        let engine = FilterEngine::with_threads(1).unwrap();
        let token = CancellationToken::new();
        let executed = AtomicUsize::new(0);
        let ranges = partition(400, 4);
        assert_eq!(ranges.len(), 4);

        let status = engine.run(&ranges, &token, |_| {
            if executed.fetch_add(1, Ordering::SeqCst) == 0 {
                token.cancel();
            }
        });

        assert_eq!(status, RunStatus::Cancelled);
        assert!(executed.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_pre_cancelled_run_does_nothing() {
        let engine = FilterEngine::with_threads(2).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let executed = AtomicUsize::new(0);
        let status = engine.run(&engine.partition(10), &token, |_| {
            executed.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(status, RunStatus::Cancelled);
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_run_bands_writes_every_row() {
        let engine = FilterEngine::with_threads(3).unwrap();
        let mut dest = PixelBuffer::new(4, 7, BitDepth::Eight, false).unwrap();
        let ranges = engine.partition(7);
        let status = engine.run_bands(&mut dest, &ranges, &CancellationToken::new(), |mut band| {
            let shade = band.rows().start as u16;
            band.fill(&ColorSample::opaque(shade, 1, 1, false));
        });
        assert!(status.is_completed());
        for y in 0..7 {
            assert_eq!(dest.pixel(3, y).unwrap().green, 1);
        }
    }
}
