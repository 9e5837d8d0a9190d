//! Stress tests for the exclusive writer.
//!
//! These drive many submitting threads at once and check that the writer
//! keeps its tasks apart, and that the store never sees a second writer.

use onewriter_core::{ExclusiveWriter, WriteError};
use onewriter_store::{LogStore, StorageBackend, Store, StoreError, Transaction};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone, Serialize)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations, intended failures included.
    pub failed_ops: usize,
    /// Failures caused by the store refusing a second writer.
    pub busy_errors: usize,
    /// Pairs of task executions that overlapped in time.
    pub overlaps: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            busy_errors: 0,
            overlaps: 0,
            duration,
            ops_per_second,
        }
    }

    /// Renders the result as pretty-printed JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("stress result is always serializable")
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Busy: {}", self.busy_errors);
        println!("Overlapping executions: {}", self.overlaps);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of submitting threads.
    pub threads: usize,
    /// Tasks submitted by each thread.
    pub tasks_per_thread: usize,
    /// Every n-th task fails on purpose (`None` = never).
    pub fail_every: Option<usize>,
    /// Size of each written value in bytes.
    pub value_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            tasks_per_thread: 250,
            fail_every: None,
            value_size: 64,
        }
    }
}

impl StressConfig {
    /// Total number of tasks across all threads.
    pub fn total_tasks(&self) -> usize {
        self.threads * self.tasks_per_thread
    }

    fn should_fail(&self, thread: usize, task: usize) -> bool {
        self.fail_every
            .is_some_and(|n| n > 0 && (thread * self.tasks_per_thread + task + 1) % n == 0)
    }
}

/// One recorded execution, as offsets from the recorder's creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    /// When the execution started.
    pub start: Duration,
    /// When it finished.
    pub end: Duration,
}

/// Records when closures run, to detect executions that overlapped.
#[derive(Debug)]
pub struct IntervalRecorder {
    origin: Instant,
    active: AtomicUsize,
    peak: AtomicUsize,
    intervals: Mutex<Vec<Interval>>,
}

impl Default for IntervalRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            intervals: Mutex::new(Vec::new()),
        }
    }

    /// Runs `f` and records the interval it occupied.
    pub fn record<T>(&self, f: impl FnOnce() -> T) -> T {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let start = self.origin.elapsed();

        let value = f();

        let end = self.origin.elapsed();
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.intervals.lock().push(Interval { start, end });
        value
    }

    /// Highest number of closures that were inside [`record`](Self::record)
    /// at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Returns every recorded interval, ordered by start.
    pub fn intervals(&self) -> Vec<Interval> {
        let mut intervals = self.intervals.lock().clone();
        intervals.sort_by_key(|i| (i.start, i.end));
        intervals
    }

    /// Counts intervals that started before an earlier one had ended.
    pub fn overlaps(&self) -> usize {
        let mut latest_end = Duration::ZERO;
        let mut overlaps = 0;
        for interval in self.intervals() {
            if interval.start < latest_end {
                overlaps += 1;
            }
            latest_end = latest_end.max(interval.end);
        }
        overlaps
    }

    /// Number of recorded executions.
    pub fn len(&self) -> usize {
        self.intervals.lock().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns true if `err` reports the store refusing a second writer.
pub fn is_busy(err: &WriteError<StoreError>) -> bool {
    match err {
        WriteError::Store(e) | WriteError::Task(e) => e.is_busy(),
        _ => false,
    }
}

/// Writes through one shared writer from many threads, each task in its own
/// scoped transaction.
///
/// Task `i` of thread `t` puts key `t:i`. Tasks selected by
/// [`StressConfig::fail_every`] write and then fail, so their transaction is
/// rolled back.
pub fn stress_scoped_writes<B>(
    store: &Arc<LogStore<B>>,
    writer: &Arc<ExclusiveWriter<LogStore<B>>>,
    config: &StressConfig,
) -> StressTestResult
where
    B: StorageBackend + 'static,
{
    let recorder = Arc::new(IntervalRecorder::new());
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let busy = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(config.threads));
    let value = vec![0xABu8; config.value_size];

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(store);
            let writer = Arc::clone(writer);
            let recorder = Arc::clone(&recorder);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let busy = Arc::clone(&busy);
            let barrier = Arc::clone(&barrier);
            let value = value.clone();
            let config = config.clone();

            thread::spawn(move || {
                barrier.wait();
                for i in 0..config.tasks_per_thread {
                    let fail = config.should_fail(t, i);
                    let recorder = Arc::clone(&recorder);
                    let value = value.clone();

                    let result = writer.submit_scoped(&store, move |ctx| {
                        recorder.record(|| -> Result<(), StoreError> {
                            let txn = ctx.txn().ok_or_else(|| {
                                StoreError::corrupted("scoped task without transaction")
                            })?;
                            txn.put(format!("{t}:{i}"), value)?;
                            if fail {
                                return Err(StoreError::Injected(format!("task {t}:{i}")));
                            }
                            Ok(())
                        })
                    });

                    match result {
                        Ok(()) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            if is_busy(&e) {
                                busy.fetch_add(1, Ordering::Relaxed);
                            }
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let mut result = StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    result.busy_errors = busy.load(Ordering::Relaxed);
    result.overlaps = recorder.overlaps();
    result
}

/// Writes to the store from many threads directly, without a writer.
///
/// The baseline the writer exists to fix: concurrent transactions collide
/// and the store answers with [`StoreError::Busy`].
pub fn stress_direct_writes<B>(store: &Arc<LogStore<B>>, config: &StressConfig) -> StressTestResult
where
    B: StorageBackend + 'static,
{
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let busy = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(config.threads));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let busy = Arc::clone(&busy);
            let barrier = Arc::clone(&barrier);
            let tasks = config.tasks_per_thread;
            let value = vec![0xCDu8; config.value_size];

            thread::spawn(move || {
                barrier.wait();
                for i in 0..tasks {
                    let result = store.begin().and_then(|mut txn| {
                        txn.put(format!("{t}:{i}"), value.clone())?;
                        thread::yield_now();
                        txn.commit()
                    });
                    match result {
                        Ok(()) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            if e.is_busy() {
                                busy.fetch_add(1, Ordering::Relaxed);
                            }
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let mut result = StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    result.busy_errors = busy.load(Ordering::Relaxed);
    result
}
