//! The record pipeline behind `rowql run`.
//!
//! ```text
//!              records (bounded)            reports (bounded)
//! producer ───────────────────▶ consumer ×N ────────────────▶ printer
//!     │                            ▲                       (calling thread)
//!     └──────── done (closed) ─────┘
//! ```
//!
//! The producer decodes records and pushes them onto the bounded queue, so a
//! slow consumer applies backpressure. When input ends it closes the `done`
//! channel and consumers drain whatever is queued before exiting. The printer
//! stops early once the program's limit is reached; dropping its receiver
//! makes the consumers, and then the producer, wind down.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender, bounded, select};
use log::{debug, info, warn};
use serde::Serialize;

use super::{CliError, Record, RecordReader};
use crate::ast::Program;
use crate::output::{OutputFormat, RowPrinter};
use crate::vm::{Outcome, Row, Vm};

/// Capacity of the record queue.
pub const QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of consumer threads
    pub concurrency: usize,
    pub delimiter: char,
    pub format: OutputFormat,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            concurrency: 1,
            delimiter: ',',
            format: OutputFormat::Text,
        }
    }
}

/// Counters and stage timings of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Records decoded and queued
    pub records: u64,
    /// Records that failed to decode
    pub skipped: u64,
    pub emitted: u64,
    pub filtered: u64,
    /// Records whose execution failed
    pub failed: u64,
    pub concurrency: usize,
    pub read_micros: u64,
    /// Execution time summed over consumers
    pub execute_micros: u64,
    pub elapsed_micros: u64,
}

/// What a consumer reports for one record.
enum Report {
    Emit { line: u64, row: Row },
    Filtered,
    Failed,
}

struct ProducerStats {
    records: u64,
    skipped: u64,
    elapsed: Duration,
}

/// Runs `program` over every record of `input`, writing emitted rows to
/// `output`.
pub fn run_pipeline<R, W>(
    vm: &Vm,
    program: &Program,
    input: R,
    output: &mut W,
    options: &PipelineOptions,
) -> Result<PipelineStats, CliError>
where
    R: BufRead + Send,
    W: Write,
{
    let started = Instant::now();
    let reader = RecordReader::new(input, options.delimiter)?;
    let header = reader.header().to_vec();
    let concurrency = options.concurrency.max(1);
    let printer = RowPrinter::new(options.format, program.outputs());
    debug!(
        "Running {} statements over columns {:?} with {} consumers",
        program.statements.len(),
        header,
        concurrency
    );

    let (record_tx, record_rx) = bounded::<Record>(QUEUE_CAPACITY);
    let (done_tx, done_rx) = bounded::<()>(0);
    let (report_tx, report_rx) = bounded::<Report>(QUEUE_CAPACITY);

    let mut stats = PipelineStats {
        concurrency,
        ..PipelineStats::default()
    };

    thread::scope(|s| -> Result<(), CliError> {
        let producer = s.spawn(move || produce(reader, record_tx, done_tx));

        let mut consumers = Vec::with_capacity(concurrency);
        for _ in 0..concurrency {
            let records = record_rx.clone();
            let done = done_rx.clone();
            let reports = report_tx.clone();
            let header = &header;
            consumers.push(s.spawn(move || consume(vm, program, header, records, done, reports)));
        }
        drop((record_rx, done_rx, report_tx));

        let printed = print_reports(&printer, program.limit, &report_rx, output, &mut stats);
        // Consumers blocked on a full report queue wake up once it is gone.
        drop(report_rx);

        let produced = producer.join().map_err(|_| CliError::Panicked("producer"))?;
        stats.records = produced.records;
        stats.skipped = produced.skipped;
        stats.read_micros = produced.elapsed.as_micros() as u64;
        for consumer in consumers {
            let busy = consumer.join().map_err(|_| CliError::Panicked("consumer"))?;
            stats.execute_micros += busy.as_micros() as u64;
        }
        printed
    })?;

    output.flush()?;
    stats.elapsed_micros = started.elapsed().as_micros() as u64;
    info!(
        "Processed {} records: {} emitted, {} filtered, {} failed, {} skipped",
        stats.records, stats.emitted, stats.filtered, stats.failed, stats.skipped
    );
    Ok(stats)
}

fn produce<R: BufRead>(
    reader: RecordReader<R>,
    records: Sender<Record>,
    done: Sender<()>,
) -> ProducerStats {
    // Dropped on return, which closes the done channel.
    let _done = done;
    let started = Instant::now();
    let mut stats = ProducerStats {
        records: 0,
        skipped: 0,
        elapsed: Duration::ZERO,
    };
    for item in reader {
        match item {
            Ok(record) => {
                stats.records += 1;
                if records.send(record).is_err() {
                    debug!("Consumers are gone, stopping input");
                    break;
                }
            }
            Err(e) => {
                stats.skipped += 1;
                warn!("Skipping record: {}", e);
            }
        }
    }
    stats.elapsed = started.elapsed();
    stats
}

/// Returns the time spent executing.
fn consume(
    vm: &Vm,
    program: &Program,
    header: &[String],
    records: Receiver<Record>,
    done: Receiver<()>,
    reports: Sender<Report>,
) -> Duration {
    let mut busy = Duration::ZERO;
    let mut handle = |record: Record| -> bool {
        let started = Instant::now();
        let report = execute(vm, program, header, record);
        busy += started.elapsed();
        reports.send(report).is_ok()
    };

    loop {
        select! {
            recv(records) -> msg => match msg {
                Ok(record) => {
                    if !handle(record) {
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(done) -> _ => {
                for record in records.try_iter() {
                    if !handle(record) {
                        break;
                    }
                }
                break;
            }
        }
    }
    busy
}

fn execute(vm: &Vm, program: &Program, header: &[String], record: Record) -> Report {
    let input = Row::from_record(header, &record.fields);
    let mut output = Row::new();
    match vm.execute(program, &mut output, &input) {
        Ok(Outcome::Passed) => Report::Emit {
            line: record.line,
            // Filter-only programs emit the input row
            row: if program.outputs().is_empty() {
                input
            } else {
                output
            },
        },
        Ok(Outcome::Filtered) => Report::Filtered,
        Err(e) => {
            warn!("Line {}: {}", record.line, e);
            Report::Failed
        }
    }
}

fn print_reports<W: Write>(
    printer: &RowPrinter<'_>,
    limit: Option<u64>,
    reports: &Receiver<Report>,
    output: &mut W,
    stats: &mut PipelineStats,
) -> Result<(), CliError> {
    if limit == Some(0) {
        return Ok(());
    }
    for report in reports.iter() {
        match report {
            Report::Emit { line, row } => {
                writeln!(output, "{}", printer.print(line, &row)?)?;
                stats.emitted += 1;
                if limit == Some(stats.emitted) {
                    debug!("Reached limit of {} rows", stats.emitted);
                    break;
                }
            }
            Report::Filtered => stats.filtered += 1,
            Report::Failed => stats.failed += 1,
        }
    }
    Ok(())
}

/// Writes `stats` as pretty JSON to `path`.
pub fn write_profile(path: &Path, stats: &PipelineStats) -> Result<(), CliError> {
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, stats)?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_zero_emits_nothing() {
        let vm = Vm::new();
        let mut program = vm.compile("a").unwrap();
        program.limit = Some(0);
        let mut output = Vec::new();
        let stats = run_pipeline(
            &vm,
            &program,
            "a\n1\n2\n".as_bytes(),
            &mut output,
            &PipelineOptions::default(),
        )
        .unwrap();
        assert!(output.is_empty());
        assert_eq!(stats.emitted, 0);
    }
}
