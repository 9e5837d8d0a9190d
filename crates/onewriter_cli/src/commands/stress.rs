//! Stress command implementation.

use super::{log_path, CliError, OutputFormat};
use onewriter_core::{ExclusiveWriter, WriteError, WriterConfig};
use onewriter_store::{FileBackend, LogStore, Store, StoreConfig, StoreError, Transaction};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

type FileStore = LogStore<FileBackend>;

/// Parameters of a stress run.
#[derive(Debug, Clone)]
pub struct StressOptions {
    /// Number of submitting threads.
    pub writers: usize,
    /// Tasks per thread.
    pub tasks: usize,
    /// Every n-th task fails on purpose.
    pub fail_every: Option<usize>,
    /// Open transactions directly instead of going through the writer.
    pub direct: bool,
}

impl StressOptions {
    fn should_fail(&self, writer: usize, task: usize) -> bool {
        self.fail_every
            .is_some_and(|n| n > 0 && (writer * self.tasks + task + 1) % n == 0)
    }
}

/// Stress run report.
#[derive(Debug, Serialize)]
pub struct StressReport {
    /// "writer" or "direct".
    pub mode: &'static str,
    /// Number of submitting threads.
    pub writers: usize,
    /// Tasks attempted in total.
    pub tasks: usize,
    /// Tasks that committed.
    pub succeeded: usize,
    /// Tasks that failed, planned failures included.
    pub failed: usize,
    /// Failures caused by the store refusing a second writer.
    pub busy: usize,
    /// Tasks that started while another was still running.
    pub overlaps: usize,
    /// Wall-clock time in milliseconds.
    pub elapsed_ms: u64,
    /// Tasks per second.
    pub tasks_per_sec: f64,
    /// Worker activations (writer mode only).
    pub activations: u64,
    /// Spawned workers that lost the activation race (writer mode only).
    pub lost_claims: u64,
    /// Committed batches in the log afterwards.
    pub commits: u64,
}

#[derive(Default)]
struct Tally {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    busy: AtomicUsize,
    overlaps: AtomicUsize,
    in_flight: AtomicUsize,
}

impl Tally {
    /// Runs `f` while counting how many calls are inside at once.
    fn exclusive<T>(&self, f: impl FnOnce() -> T) -> T {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        let value = f();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        value
    }

    fn outcome(&self, ok: bool, busy: bool) {
        if ok {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if busy {
            self.busy.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Runs the stress command.
pub fn run(
    path: &Path,
    options: &StressOptions,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(LogStore::open_file(&log_path(path), StoreConfig::default())?);
    info!(
        writers = options.writers,
        tasks = options.tasks,
        direct = options.direct,
        "starting stress run"
    );

    let report = execute(&store, options);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text_output(&report),
    }

    if !options.direct && (report.busy > 0 || report.overlaps > 0) {
        return Err(CliError::ExclusionViolated {
            busy: report.busy,
            overlaps: report.overlaps,
        }
        .into());
    }
    Ok(())
}

/// Runs the configured workload against `store` and reports what happened.
pub fn execute(store: &Arc<FileStore>, options: &StressOptions) -> StressReport {
    let tally = Arc::new(Tally::default());
    let barrier = Arc::new(Barrier::new(options.writers.max(1)));
    let writer: Arc<ExclusiveWriter<FileStore>> = Arc::new(ExclusiveWriter::with_config(
        WriterConfig::new().thread_name("onewriter-stress"),
    ));
    let commits_before = store.commits();

    let start = Instant::now();
    let handles: Vec<_> = (0..options.writers)
        .map(|w| {
            let store = Arc::clone(store);
            let writer = Arc::clone(&writer);
            let tally = Arc::clone(&tally);
            let barrier = Arc::clone(&barrier);
            let options = options.clone();

            thread::spawn(move || {
                barrier.wait();
                for t in 0..options.tasks {
                    let fail = options.should_fail(w, t);
                    if options.direct {
                        direct_task(&store, &tally, w, t, fail);
                    } else {
                        writer_task(&store, &writer, &tally, w, t, fail);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            tally.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    let elapsed = start.elapsed();

    let tasks = options.writers * options.tasks;
    let stats = writer.stats().snapshot();
    debug!(?stats, "writer counters after run");

    StressReport {
        mode: if options.direct { "direct" } else { "writer" },
        writers: options.writers,
        tasks,
        succeeded: tally.succeeded.load(Ordering::Relaxed),
        failed: tally.failed.load(Ordering::Relaxed),
        busy: tally.busy.load(Ordering::Relaxed),
        overlaps: tally.overlaps.load(Ordering::Relaxed),
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        tasks_per_sec: if elapsed.as_secs_f64() > 0.0 {
            tasks as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        },
        activations: stats.activations,
        lost_claims: stats.lost_claims,
        commits: store.commits() - commits_before,
    }
}

fn writer_task(
    store: &Arc<FileStore>,
    writer: &ExclusiveWriter<FileStore>,
    tally: &Arc<Tally>,
    w: usize,
    t: usize,
    fail: bool,
) {
    let inner = Arc::clone(tally);
    let result = writer.submit_scoped(store, move |ctx| {
        inner.exclusive(|| -> Result<(), StoreError> {
            let txn = ctx
                .txn()
                .ok_or_else(|| StoreError::corrupted("scoped task without transaction"))?;
            txn.put(format!("{w}:{t}"), format!("value-{w}-{t}"))?;
            if fail {
                return Err(StoreError::Injected(format!("planned failure {w}:{t}")));
            }
            Ok(())
        })
    });

    let busy = match &result {
        Err(WriteError::Store(e)) | Err(WriteError::Task(e)) => e.is_busy(),
        _ => false,
    };
    tally.outcome(result.is_ok(), busy);
}

fn direct_task(store: &FileStore, tally: &Tally, w: usize, t: usize, fail: bool) {
    let result = tally.exclusive(|| -> Result<(), StoreError> {
        let mut txn = store.begin()?;
        txn.put(format!("{w}:{t}"), format!("value-{w}-{t}"))?;
        thread::yield_now();
        if fail {
            txn.rollback()?;
            return Err(StoreError::Injected(format!("planned failure {w}:{t}")));
        }
        txn.commit()
    });

    let busy = matches!(&result, Err(e) if e.is_busy());
    tally.outcome(result.is_ok(), busy);
}

fn print_text_output(report: &StressReport) {
    println!("=== Stress ({}) ===", report.mode);
    println!();
    println!("Writers:       {}", report.writers);
    println!("Tasks:         {}", report.tasks);
    println!("Succeeded:     {}", report.succeeded);
    println!("Failed:        {}", report.failed);
    println!("Busy:          {}", report.busy);
    println!("Overlaps:      {}", report.overlaps);
    println!("Commits:       {}", report.commits);
    println!("Elapsed:       {} ms", report.elapsed_ms);
    println!("Throughput:    {:.0} tasks/sec", report.tasks_per_sec);
    if report.mode == "writer" {
        println!("Activations:   {}", report.activations);
        println!("Lost claims:   {}", report.lost_claims);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &Path) -> Arc<FileStore> {
        Arc::new(LogStore::open_file(&log_path(dir), StoreConfig::default()).unwrap())
    }

    #[test]
    fn writer_mode_never_collides() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let options = StressOptions {
            writers: 4,
            tasks: 25,
            fail_every: Some(5),
            direct: false,
        };

        let report = execute(&store, &options);
        assert_eq!(report.tasks, 100);
        assert_eq!(report.busy, 0);
        assert_eq!(report.overlaps, 0);
        assert_eq!(report.failed, 20);
        assert_eq!(report.commits, 80);
        assert!(report.activations >= 1);
    }

    #[test]
    fn direct_mode_accounts_for_every_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let options = StressOptions {
            writers: 4,
            tasks: 25,
            fail_every: None,
            direct: true,
        };

        let report = execute(&store, &options);
        assert_eq!(report.succeeded + report.failed, 100);
        assert_eq!(report.failed, report.busy);
        assert_eq!(report.commits as usize, report.succeeded);
    }
}
