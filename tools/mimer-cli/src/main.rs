///
/// mimer CLI - run one SQL statement through the bridge
///
/// Usage:
/// - mimer -d bankdb "SELECT * FROM accounts": print the result rows
/// - mimer -d bankdb "DELETE FROM accounts": print the affected-row count
/// - mimer -v: print the bridge and engine API versions
///
/// Statements run in autocommit mode. Engine errors are printed with the
/// engine's message and exit with status 1.
///

mod settings;

use clap::Parser;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::process;
use tracing::Level;

use mimer_bridge::{
    Bridge, BridgeError, CursorMode, Engine, Fetched, RawHandle, SessionHandle, Status,
    StatementHandle, SystemAllocator,
};
use mimer_engine_sqlite::SqliteEngine;

use settings::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "mimer")]
#[command(author, about = "Run SQL through the Mimer bridge", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Database name (falls back to the config file, then MIMER_DATABASE)
    #[arg(short, long)]
    database: Option<String>,

    #[arg(short, long)]
    user: Option<String>,

    #[arg(short, long)]
    password: Option<String>,

    /// TOML config with [transfer] and [session] sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding `<database>.db` files for the reference engine
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print the bridge and engine API versions
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Log every bridge event, including LOB chunks
    #[arg(long)]
    trace: bool,

    /// Use the Mimer client library instead of the reference engine
    #[cfg(feature = "native")]
    #[arg(long)]
    native: bool,

    /// Statement to execute
    sql: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.trace);

    let overrides = Overrides {
        database: cli.database.as_deref(),
        user: cli.user.as_deref(),
        password: cli.password.as_deref(),
    };
    let settings = match settings::load(cli.config.as_deref(), overrides) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    #[cfg(feature = "native")]
    let outcome = if cli.native {
        run(mimer_bridge::NativeEngine::new(), &cli, settings)
    } else {
        run(reference_engine(&cli), &cli, settings)
    };
    #[cfg(not(feature = "native"))]
    let outcome = run(reference_engine(&cli), &cli, settings);

    if let Err(e) = outcome {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn init_logging(trace: bool) {
    let level = if trace { Level::TRACE } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

fn reference_engine(cli: &Cli) -> SqliteEngine {
    match &cli.data_dir {
        Some(dir) => SqliteEngine::with_root(dir.clone()),
        None => SqliteEngine::new(),
    }
}

fn run<E: Engine>(engine: E, cli: &Cli, settings: Settings) -> Result<(), BridgeError> {
    let mut bridge = Bridge::with_allocator(engine, SystemAllocator, settings.policy);
    let version = bridge.negotiate_version()?;
    if cli.version {
        println!("mimer {} (engine API {})", env!("CARGO_PKG_VERSION"), version);
    }
    let Some(sql) = cli.sql.as_deref() else {
        return Ok(());
    };

    let fetched = bridge.begin_session(&settings.database, &settings.user, &settings.password);
    let session = match fetched.value {
        Some(session) => session,
        None => return Err(BridgeError::from(fetched.status)),
    };
    let outcome = execute(&mut bridge, session, sql);
    bridge.end_session(session);
    outcome
}

fn execute<E: Engine>(bridge: &mut Bridge<E>, session: SessionHandle, sql: &str) -> Result<(), BridgeError> {
    let fetched = bridge.begin_statement(session, sql, CursorMode::ForwardOnly);
    let Some(statement) = checked(bridge, session.raw(), fetched)? else {
        return Ok(());
    };
    let outcome = print_result(bridge, statement);
    bridge.end_statement(statement);
    outcome
}

fn print_result<E: Engine>(bridge: &mut Bridge<E>, statement: StatementHandle) -> Result<(), BridgeError> {
    let handle = statement.raw();
    let fetched = bridge.column_count(statement);
    let columns = checked(bridge, handle, fetched)?.unwrap_or(0);

    if columns == 0 {
        let status = bridge.execute(statement);
        let affected = check(bridge, handle, status)?;
        println!("{} row(s) affected", affected.row_count().unwrap_or(0));
        return Ok(());
    }

    let indexes = column_indexes(columns)?;
    let mut header = Vec::with_capacity(columns);
    for index in indexes.clone() {
        let fetched = bridge.column_name(statement, index);
        header.push(checked(bridge, handle, fetched)?.map(|n| n.into_string()).unwrap_or_default());
    }
    println!("{}", header.join("\t"));

    let status = bridge.open_cursor(statement);
    check(bridge, handle, status)?;
    let mut rows = 0usize;
    loop {
        let fetched = bridge.fetch(statement);
        if checked(bridge, handle, fetched)? != Some(true) {
            break;
        }
        let mut line = Vec::with_capacity(columns);
        for index in indexes.clone() {
            let fetched = bridge.get_value(statement, index);
            line.push(checked(bridge, handle, fetched)?.map(|v| v.to_string()).unwrap_or_default());
        }
        println!("{}", line.join("\t"));
        rows += 1;
    }
    eprintln!("{} row(s)", rows);
    Ok(())
}

/// Column indexes `1..=columns`, which must fit the engine's `i16` index.
fn column_indexes(columns: usize) -> Result<RangeInclusive<i16>, BridgeError> {
    match i16::try_from(columns) {
        Ok(last) => Ok(1..=last),
        Err(_) => {
            eprintln!("result has {} columns, more than {} are not addressable", columns, i16::MAX);
            Err(BridgeError::DataConversion)
        }
    }
}

/// Turns an error status into `BridgeError`, printing the engine's message
/// for engine codes first.
fn check<E: Engine>(bridge: &mut Bridge<E>, handle: RawHandle, status: Status) -> Result<Status, BridgeError> {
    if status.is_ok() {
        return Ok(status);
    }
    if !status.is_local() {
        if let Some(last) = bridge.last_error(handle).value {
            if !last.message.is_empty() {
                eprintln!("{}", last.message);
            }
        }
    }
    Err(BridgeError::from(status))
}

fn checked<E: Engine, T>(bridge: &mut Bridge<E>, handle: RawHandle, fetched: Fetched<T>) -> Result<Option<T>, BridgeError> {
    check(bridge, handle, fetched.status)?;
    Ok(fetched.value)
}
