//! Command-line interface for the sqlsession demo server.
//!
//! Every option is optional so that unset flags leave file and environment
//! settings alone.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// SQLite connection URL.
    pub database: Option<String>,
    /// Session table name.
    pub table: Option<String>,
    /// Session lifetime in seconds.
    pub max_age: Option<i64>,
    /// Seconds between cleanup sweeps (0 selects the default).
    pub cleanup_interval: Option<u64>,
    /// Primary hash key.
    pub hash_key: Option<String>,
    /// Block key paired with `hash_key`.
    pub block_key: Option<String>,
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('d') | Long("database") => {
                result.database = Some(parser.value()?.parse()?);
            }
            Short('t') | Long("table") => {
                result.table = Some(parser.value()?.parse()?);
            }
            Short('m') | Long("max-age") => {
                result.max_age = Some(parse_value(&mut parser, "max-age")?);
            }
            Short('i') | Long("cleanup-interval") => {
                result.cleanup_interval = Some(parse_value(&mut parser, "cleanup-interval")?);
            }
            Short('k') | Long("hash-key") => {
                result.hash_key = Some(parser.value()?.parse()?);
            }
            Short('b') | Long("block-key") => {
                result.block_key = Some(parser.value()?.parse()?);
            }
            Short('H') | Long("host") => {
                result.host = Some(parse_value(&mut parser, "host")?);
            }
            Short('p') | Long("port") => {
                result.port = Some(parse_value(&mut parser, "port")?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.block_key.is_some() && result.hash_key.is_none() {
        return Err(ArgsError::BlockKeyWithoutHashKey);
    }

    Ok(result)
}

fn parse_value<T: std::str::FromStr>(
    parser: &mut lexopt::Parser,
    name: &'static str,
) -> Result<T, ArgsError> {
    use lexopt::ValueExt;

    let value: String = parser.value()?.parse()?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidValue(name, value))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"sqlsession {version}
SQL-backed web sessions with background expiry cleanup

USAGE:
    sqlsession [OPTIONS]

OPTIONS:
    -d, --database <URL>          SQLite database URL [default: sqlite://sessions.db]
    -t, --table <NAME>            Session table [default: sessions]
    -m, --max-age <SECS>          Session lifetime in seconds [default: 2592000]
    -i, --cleanup-interval <SECS> Seconds between expiry sweeps, 0 for default [default: 300]
    -k, --hash-key <KEY>          Primary cookie signing key
    -b, --block-key <KEY>         Cookie encryption key (16 or 32 bytes)
    -H, --host <ADDR>             Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>             Port to listen on [default: 3000]
    -c, --config <FILE>           Path to configuration file (JSON)
    -l, --log-level <LVL>         Log level (error, warn, info, debug, trace)
    -h, --help                    Print help
    -V, --version                 Print version

ENVIRONMENT VARIABLES:
    SQLSESSION_DATABASE_URL       Database URL (overrides config)
    SQLSESSION_TABLE              Session table (overrides config)
    SQLSESSION_MAX_AGE            Session lifetime (overrides config)
    SQLSESSION_HASH_KEY           Primary signing key (overrides config)
    SQLSESSION_BLOCK_KEY          Encryption key for SQLSESSION_HASH_KEY
    SQLSESSION_CLEANUP_INTERVAL   Sweep interval (overrides config)
    SQLSESSION_HOST               Host address (overrides config)
    SQLSESSION_PORT               Port number (overrides config)
    SQLSESSION_LOG_LEVEL          Log level (overrides config)
    RUST_LOG                      Alternative log level setting

EXAMPLES:
    # Start with a signing key and the default database
    sqlsession -k my-secret-key

    # Short-lived sessions swept every ten seconds
    sqlsession -k my-secret-key -m 60 -i 10

    # Start with config file
    sqlsession -c /etc/sqlsession/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("sqlsession {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
    /// `--block-key` given without `--hash-key`.
    BlockKeyWithoutHashKey,
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
            Self::BlockKeyWithoutHashKey => {
                write!(f, "--block-key requires --hash-key")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
