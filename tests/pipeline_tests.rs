// tests/pipeline_tests.rs

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rowql::OutputFormat;
use rowql::cli::{
    self, BenchOptions, CliError, DialectOptions, PipelineOptions, PipelineStats, Query,
    run_bench, run_pipeline,
};
use rowql::kv::Store;
use rowql::vm::Vm;

const PEOPLE: &str = "\
name,city,age
Ada,London,36
Bob,Oslo,41
Cy,Oslo,
Dee,Oslo,29,extra
Eve,Oslo,52
";

fn run_query(query: Query, input: &str, options: &PipelineOptions) -> (String, PipelineStats) {
    let vm = Vm::new();
    let program = cli::prepare(&vm, &query, DialectOptions::default()).unwrap();
    let mut output = Vec::new();
    let stats = run_pipeline(&vm, &program, input.as_bytes(), &mut output, options).unwrap();
    (String::from_utf8(output).unwrap(), stats)
}

fn sql(query: &str) -> Query {
    Query::Sql(query.to_string())
}

fn expr(query: &str) -> Query {
    Query::Expr(query.to_string())
}

// ============================================================================
// SQL Queries
// ============================================================================

#[test]
fn test_sql_query() {
    let (output, stats) = run_query(
        sql("SELECT name, upper(city) AS town FROM people WHERE city = 'Oslo'"),
        PEOPLE,
        &PipelineOptions::default(),
    );
    assert_eq!(
        output,
        "line 3: name=Bob, town=OSLO\nline 4: name=Cy, town=OSLO\nline 6: name=Eve, town=OSLO\n"
    );
    assert_eq!(stats.records, 4);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.emitted, 3);
    assert_eq!(stats.filtered, 1);
    assert_eq!(stats.failed, 0);
}

#[test]
fn test_sql_limit() {
    let (output, stats) = run_query(
        sql("SELECT name FROM people LIMIT 2"),
        PEOPLE,
        &PipelineOptions::default(),
    );
    assert_eq!(output, "line 2: name=Ada\nline 3: name=Bob\n");
    assert_eq!(stats.emitted, 2);
}

#[test]
fn test_sql_comparison_operators() {
    let input = "name,age\nada,30\nbob,40\n";
    let test_cases = vec![
        ("SELECT name FROM people WHERE age != 30", "line 3: name=bob\n"),
        ("SELECT name FROM people WHERE age > 35", "line 3: name=bob\n"),
        ("SELECT name FROM people WHERE age <= 30", "line 2: name=ada\n"),
        ("SELECT name FROM people WHERE age = 30", "line 2: name=ada\n"),
        ("SELECT name FROM people WHERE name >= 'b'", "line 3: name=bob\n"),
    ];

    for (query, expected) in test_cases {
        let (output, _) = run_query(sql(query), input, &PipelineOptions::default());
        assert_eq!(output, expected, "Failed for query: {}", query);
    }
}

#[test]
fn test_json_output() {
    let options = PipelineOptions {
        format: OutputFormat::Json,
        ..PipelineOptions::default()
    };
    let (output, _) = run_query(
        sql("SELECT name, age FROM people WHERE name = 'Cy'"),
        PEOPLE,
        &options,
    );
    assert_eq!(output, "{\"line\":4,\"values\":{\"name\":\"Cy\",\"age\":null}}\n");
}

// ============================================================================
// Expression Programs
// ============================================================================

#[test]
fn test_filter_only_program_emits_input() {
    let (output, stats) = run_query(expr("?(age > 40)"), PEOPLE, &PipelineOptions::default());
    assert_eq!(
        output,
        "line 3: age=41, city=Oslo, name=Bob\nline 6: age=52, city=Oslo, name=Eve\n"
    );
    assert_eq!(stats.filtered, 2);
}

#[test]
fn test_execution_errors_are_counted() {
    let input = "a,b\n4,2\n1,0\n9,3\n";
    let (output, stats) = run_query(expr("q := a / b"), input, &PipelineOptions::default());
    assert_eq!(output, "line 2: q=2\nline 4: q=3\n");
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.emitted, 2);
}

#[test]
fn test_concurrent_consumers() {
    let mut input = String::from("n\n");
    for n in 0..1000 {
        input.push_str(&format!("{}\n", n));
    }
    let options = PipelineOptions {
        concurrency: 4,
        ..PipelineOptions::default()
    };
    let (output, stats) = run_query(expr("?(n % 10 == 0); m := n * 2"), &input, &options);

    // Order across consumers is not guaranteed.
    let mut lines: Vec<_> = output.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines.len(), 100);
    assert!(lines.contains(&"line 2: m=0"));
    assert!(lines.contains(&"line 992: m=1980"));
    assert_eq!(stats.records, 1000);
    assert_eq!(stats.emitted + stats.filtered, 1000);
    assert_eq!(stats.concurrency, 4);
}

#[test]
fn test_limit_with_concurrency_stops_early() {
    let mut input = String::from("n\n");
    for n in 0..5000 {
        input.push_str(&format!("{}\n", n));
    }
    let options = PipelineOptions {
        concurrency: 3,
        ..PipelineOptions::default()
    };
    let vm = Vm::new();
    let mut program = vm.compile("m := n").unwrap();
    program.limit = Some(5);
    let mut output = Vec::new();
    let stats = run_pipeline(&vm, &program, input.as_bytes(), &mut output, &options).unwrap();
    assert_eq!(String::from_utf8(output).unwrap().lines().count(), 5);
    assert_eq!(stats.emitted, 5);
}

// ============================================================================
// Input Handling
// ============================================================================

#[test]
fn test_tab_delimiter() {
    let options = PipelineOptions {
        delimiter: '\t',
        ..PipelineOptions::default()
    };
    let (output, _) = run_query(expr("s := a + b"), "a\tb\n1\t2\n", &options);
    assert_eq!(output, "line 2: s=3\n");
}

#[test]
fn test_missing_header() {
    let vm = Vm::new();
    let program = vm.compile("a").unwrap();
    let mut output = Vec::new();
    let result = run_pipeline(
        &vm,
        &program,
        "".as_bytes(),
        &mut output,
        &PipelineOptions::default(),
    );
    assert!(matches!(result, Err(CliError::MissingHeader)));
}

#[test]
fn test_header_only() {
    let (output, stats) = run_query(expr("a"), "a,b\n", &PipelineOptions::default());
    assert_eq!(output, "");
    assert_eq!(stats.records, 0);
}

#[test]
fn test_prepare_reports_parse_errors() {
    let vm = Vm::new();
    assert!(matches!(
        cli::prepare(&vm, &sql("SELECT a FROM t OR"), DialectOptions::default()),
        Err(CliError::Parse(_))
    ));
    let lenient = DialectOptions {
        lenient: true,
        ..DialectOptions::default()
    };
    assert!(cli::prepare(&vm, &sql("SELECT a FROM t OR"), lenient).is_ok());
}

#[test]
fn test_profile_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.json");
    let (_, stats) = run_query(expr("a"), "a\n1\n", &PipelineOptions::default());
    cli::write_profile(&path, &stats).unwrap();

    let profile: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(profile["records"], 1);
    assert_eq!(profile["emitted"], 1);
    assert_eq!(profile["concurrency"], 1);
}

// ============================================================================
// Store and Bench
// ============================================================================

#[test]
fn test_store_handles_share_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv.log");

    let store = Store::open(&path).unwrap();
    let handle = store.handle();
    std::thread::scope(|s| {
        s.spawn(|| handle.put("from-thread", "1").unwrap());
    });
    store.put("from-main", "2").unwrap();
    assert_eq!(store.get("from-thread").unwrap().as_deref(), Some("1"));
    store.close().unwrap();

    let reopened = Store::open(&path).unwrap();
    assert_eq!(reopened.len().unwrap(), 2);
    assert_eq!(reopened.get("from-main").unwrap().as_deref(), Some("2"));
}

#[test]
fn test_bench_runs_until_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let options = BenchOptions {
        path: dir.path().join("bench.log"),
        workers: 2,
        duration: Duration::from_millis(200),
        stagger: Duration::from_millis(10),
        interval: Duration::from_millis(50),
        value_size: 16,
    };
    let stop = AtomicBool::new(false);
    let mut out = Vec::new();
    let report = run_bench(&options, &stop, &mut out).unwrap();

    assert!(report.final_sample.writes > 0);
    assert_eq!(report.final_sample.writes, report.final_sample.reads);
    assert_eq!(report.final_sample.errors, 0);
    assert_eq!(report.keys as u64, report.final_sample.writes);

    let out = String::from_utf8(out).unwrap();
    assert!(out.lines().count() >= 3);
    assert_eq!(Store::open(&options.path).unwrap().len().unwrap(), report.keys);
}
