//! The `rowql bench` load test.
//!
//! Workers write and read back keys in a [`Store`] until a deadline or a
//! stop flag, while a reporter prints the counters on every tick.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, select, tick};
use log::{info, warn};

use super::CliError;
use crate::kv::{Store, StoreError};
use crate::metrics::{Metrics, Sample};

#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub path: PathBuf,
    pub workers: usize,
    pub duration: Duration,
    /// Delay between worker starts
    pub stagger: Duration,
    /// Reporting interval
    pub interval: Duration,
    /// Bytes per written value
    pub value_size: usize,
}

#[derive(Debug, Clone)]
pub struct BenchReport {
    pub final_sample: Sample,
    /// Keys in the store after the run
    pub keys: usize,
}

const HEADER: &str = "Time        Writes     Reads  Errors       Rate";

/// Runs the load test, printing progress to `out`.
///
/// Setting `stop` ends the run before the deadline.
pub fn run_bench<W: Write + Send>(
    options: &BenchOptions,
    stop: &AtomicBool,
    out: &mut W,
) -> Result<BenchReport, CliError> {
    let store = Store::open(&options.path)?;
    let metrics = Metrics::new();
    let deadline = Instant::now() + options.duration;
    let value = "x".repeat(options.value_size);
    let running = || !stop.load(Ordering::Relaxed) && Instant::now() < deadline;

    info!(
        "Benchmarking {} with {} workers for {:?}",
        options.path.display(),
        options.workers,
        options.duration
    );
    writeln!(out, "{}", HEADER)?;

    let (done_tx, done_rx) = bounded::<()>(0);
    thread::scope(|s| -> Result<(), CliError> {
        let metrics = &metrics;
        let running = &running;
        let value = value.as_str();
        let progress = &mut *out;
        let reporter = s.spawn(move || -> std::io::Result<()> {
            let ticker = tick(options.interval);
            loop {
                select! {
                    recv(ticker) -> _ => writeln!(progress, "{}", metrics.sample())?,
                    recv(done_rx) -> _ => return Ok(()),
                }
            }
        });

        let mut workers = Vec::with_capacity(options.workers);
        for id in 0..options.workers {
            if !running() {
                break;
            }
            let store = store.handle();
            workers.push(s.spawn(move || work(id, &store, value, metrics, running)));
            if id + 1 < options.workers {
                thread::sleep(options.stagger);
            }
        }

        for worker in workers {
            worker.join().map_err(|_| CliError::Panicked("bench worker"))?;
        }
        drop(done_tx);
        match reporter.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(CliError::Panicked("reporter")),
        }
    })?;

    store.close()?;
    let final_sample = metrics.sample();
    writeln!(out, "{}", final_sample)?;
    Ok(BenchReport {
        final_sample,
        keys: store.len()?,
    })
}

fn work(id: usize, store: &Store, value: &str, metrics: &Metrics, running: &impl Fn() -> bool) {
    let mut seq: u64 = 0;
    while running() {
        let key = format!("w{}-{}", id, seq);
        seq += 1;
        match round_trip(store, &key, value) {
            Ok(true) => {
                metrics.record_write();
                metrics.record_read();
            }
            Ok(false) => {
                warn!("Worker {} read back a different value for {}", id, key);
                metrics.record_error();
            }
            Err(e) => {
                warn!("Worker {} failed on {}: {}", id, key, e);
                metrics.record_error();
            }
        }
    }
}

fn round_trip(store: &Store, key: &str, value: &str) -> Result<bool, StoreError> {
    store.put(key, value)?;
    Ok(store.get(key)?.as_deref() == Some(value))
}
