use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Args, Parser as ClapParser, Subcommand};
use log::info;
use rowql::cli::{
    self, BenchOptions, CliError, DialectOptions, PipelineOptions, Query, run_bench, run_pipeline,
};
use rowql::{OutputFormat, Vm};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

#[derive(ClapParser)]
#[command(name = "rowql")]
#[command(about = "rowql - Run SQL-like queries and expression programs over delimited records")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, global = true, env = "ROWQL_LOG", default_value = "warn")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query over records read from stdin
    Run {
        #[command(flatten)]
        query: QueryArgs,

        /// Number of consumer threads
        #[arg(short, long, env = "ROWQL_CONCURRENCY", default_value_t = 1)]
        concurrency: usize,

        /// Field delimiter
        #[arg(short, long, env = "ROWQL_DELIMITER", default_value_t = ',')]
        delimiter: char,

        /// Print rows as JSON
        #[arg(long, env = "ROWQL_JSON")]
        json: bool,

        /// Write pipeline timings and counters as JSON to this path
        #[arg(long, env = "ROWQL_PROFILE")]
        profile: Option<PathBuf>,
    },

    /// Only validate syntax, don't read input
    Check {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Load test the key-value store
    Bench {
        /// Store file
        #[arg(long, env = "ROWQL_BENCH_PATH")]
        path: PathBuf,

        #[arg(short, long, env = "ROWQL_BENCH_WORKERS", default_value_t = 4)]
        workers: usize,

        #[arg(long, env = "ROWQL_BENCH_DURATION", default_value_t = 10)]
        duration_secs: u64,

        /// Delay between worker starts
        #[arg(long, env = "ROWQL_BENCH_STAGGER", default_value_t = 100)]
        stagger_ms: u64,

        /// Reporting interval
        #[arg(long, env = "ROWQL_BENCH_INTERVAL", default_value_t = 1000)]
        interval_ms: u64,

        /// Bytes per written value
        #[arg(long, env = "ROWQL_BENCH_VALUE_SIZE", default_value_t = 64)]
        value_size: usize,
    },
}

#[derive(Args)]
struct QueryArgs {
    #[command(flatten)]
    source: QuerySource,

    /// Ignore input after the statement instead of failing
    #[arg(long, env = "ROWQL_LENIENT")]
    lenient: bool,

    /// Store a predicate's field text instead of its operand
    #[arg(long, env = "ROWQL_LEGACY_PREDICATES")]
    legacy_predicates: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct QuerySource {
    /// A SQL statement, e.g. "SELECT name FROM people WHERE city = 'Oslo'"
    #[arg(long, env = "ROWQL_SQL")]
    sql: Option<String>,

    /// An expression program, e.g. "total := price * qty; ?(total > 100)"
    #[arg(long, env = "ROWQL_EXPR")]
    expr: Option<String>,
}

impl QueryArgs {
    fn query(&self) -> Result<Query, CliError> {
        match (&self.source.sql, &self.source.expr) {
            (Some(sql), _) => Ok(Query::Sql(sql.clone())),
            (None, Some(expr)) => Ok(Query::Expr(expr.clone())),
            (None, None) => Err(CliError::NoQuery),
        }
    }

    fn options(&self) -> DialectOptions {
        DialectOptions {
            lenient: self.lenient,
            legacy_predicates: self.legacy_predicates,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_level) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let result = match cli.command {
        Commands::Run {
            query,
            concurrency,
            delimiter,
            json,
            profile,
        } => run_query(&query, concurrency, delimiter, json, profile),
        Commands::Check { query } => run_check(&query),
        Commands::Bench {
            path,
            workers,
            duration_secs,
            stagger_ms,
            interval_ms,
            value_size,
        } => {
            let options = BenchOptions {
                path,
                workers,
                duration: Duration::from_secs(duration_secs),
                stagger: Duration::from_millis(stagger_ms),
                interval: Duration::from_millis(interval_ms),
                value_size,
            };
            run_load(&options)
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let mut config = ConfigBuilder::new();
    if level != LevelFilter::Debug && level != LevelFilter::Trace {
        config.add_filter_allow_str("rowql");
    }
    TermLogger::init(
        level,
        config.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
}

fn run_query(
    args: &QueryArgs,
    concurrency: usize,
    delimiter: char,
    json: bool,
    profile: Option<PathBuf>,
) -> Result<(), CliError> {
    if atty::is(atty::Stream::Stdin) {
        return Err(CliError::NoInput);
    }

    let vm = Vm::new();
    let program = cli::prepare(&vm, &args.query()?, args.options())?;
    let options = PipelineOptions {
        concurrency,
        delimiter,
        format: if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
    };

    // The producer thread owns the input, and a stdin lock cannot move threads.
    let input = BufReader::new(io::stdin());
    let stats = run_pipeline(&vm, &program, input, &mut io::stdout().lock(), &options)?;

    if let Some(path) = profile {
        cli::write_profile(&path, &stats)?;
        info!("Wrote profile to {}", path.display());
    }
    Ok(())
}

fn run_check(args: &QueryArgs) -> Result<(), CliError> {
    let result = cli::execute_check(&args.query()?, args.options())?;
    println!("{}", result.summary());
    Ok(())
}

fn run_load(options: &BenchOptions) -> Result<(), CliError> {
    let stop = AtomicBool::new(false);
    let report = run_bench(options, &stop, &mut io::stdout())?;
    println!("{} keys in {}", report.keys, options.path.display());
    Ok(())
}
