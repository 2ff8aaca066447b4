//! chbridge CLI - move tables between ClickHouse and CSV files.

use chbridge_lib::clickhouse::check_connection;
use chbridge_lib::config::{ConnectionConfig, Protocol};
use chbridge_lib::data_transfer::{
    ClickHouseSource, CsvSource, FileHandle, SchemaSource, Source, TableSource,
    TransferDirection, TransferReport, TransferSession, TransferTarget,
};
use chbridge_lib::db_types::JoinCondition;
use chbridge_lib::error::{Result, TransferError};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::task::JoinHandle;

#[derive(Parser)]
#[command(name = "chbridge")]
#[command(about = "Move tables between ClickHouse and CSV files")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags override the profile file; unset flags keep its values.
#[derive(Args)]
struct ConnectionArgs {
    /// JSON connection profile
    #[arg(long, global = true, env = "CHBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "CHBRIDGE_HOST")]
    host: Option<String>,

    #[arg(long, global = true, env = "CHBRIDGE_PORT")]
    port: Option<u16>,

    #[arg(long, global = true, env = "CHBRIDGE_DATABASE")]
    database: Option<String>,

    #[arg(long, global = true, env = "CHBRIDGE_USER")]
    user: Option<String>,

    /// Password or access token
    #[arg(long, global = true, env = "CHBRIDGE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// http or https
    #[arg(long, global = true, env = "CHBRIDGE_PROTOCOL")]
    protocol: Option<String>,

    /// Per-request timeout; unset waits indefinitely
    #[arg(long, global = true, env = "CHBRIDGE_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl ConnectionArgs {
    fn resolve(&self) -> Result<ConnectionConfig> {
        let mut config = match &self.config {
            Some(path) => ConnectionConfig::load(path)?,
            None => ConnectionConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(user) = &self.user {
            config.username = user.clone();
        }
        if let Some(token) = &self.token {
            config.token = token.clone();
        }
        if let Some(protocol) = &self.protocol {
            config.protocol = Protocol::parse(protocol)?;
        }
        if self.timeout_secs.is_some() {
            config.timeout_secs = self.timeout_secs;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Default)]
struct JoinArgs {
    /// Table to join with the source table
    #[arg(long)]
    join_table: Option<String>,

    /// Raw join predicate, inserted into the query as written
    #[arg(long, conflicts_with_all = ["join_left", "join_right"])]
    join_on: Option<String>,

    /// Source column of an equality join
    #[arg(long, requires = "join_right")]
    join_left: Option<String>,

    /// Joined-table column of an equality join
    #[arg(long, requires = "join_left")]
    join_right: Option<String>,
}

impl JoinArgs {
    fn condition(&self) -> Result<Option<(String, JoinCondition)>> {
        let Some(table) = self.join_table.clone() else {
            if self.join_on.is_some() || self.join_left.is_some() {
                return Err(TransferError::validation("--join-table is required for a join"));
            }
            return Ok(None);
        };

        let condition = match (&self.join_on, &self.join_left, &self.join_right) {
            (Some(predicate), _, _) => JoinCondition::predicate(predicate.clone()),
            (None, Some(left), Some(right)) => JoinCondition::columns(left.clone(), right.clone()),
            _ => {
                return Err(TransferError::validation(
                    "A join needs --join-on or both --join-left and --join-right",
                ))
            }
        };
        Ok(Some((table, condition)))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers a trivial query
    Ping,

    /// List tables of the configured database
    Tables,

    /// Show the declared columns of a table
    Describe { table: String },

    /// Infer column types of a CSV file from its first rows
    Infer { file: PathBuf },

    /// Show the first rows of a table or file projection
    Preview {
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        table: Option<String>,

        #[arg(long)]
        file: Option<PathBuf>,

        /// Columns in output order; all columns when omitted
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[command(flatten)]
        join: JoinArgs,
    },

    /// Write a table projection to a CSV file
    Export {
        #[arg(long)]
        table: String,

        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[command(flatten)]
        join: JoinArgs,

        #[arg(long)]
        out: PathBuf,
    },

    /// Load a CSV file into a table, creating it when missing
    Import {
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        table: String,

        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Sorting key columns; defaults to tuple()
        #[arg(long, value_delimiter = ',')]
        order_by: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    match run().await {
        Ok(code) => code,
        Err(error) => {
            let report = error.report();
            match serde_json::to_string_pretty(&report) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", error),
            }
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ping => {
            let config = cli.connection.resolve()?;
            let check = check_connection(&config).await;
            print_json(&check)?;
            if !check.success {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Tables => {
            let database = connect(&cli.connection)?;
            print_json(&database.list_tables().await?)?;
        }
        Commands::Describe { table } => {
            let database = connect(&cli.connection)?;
            print_json(&database.describe_table(&table).await?)?;
        }
        Commands::Infer { file } => {
            let source = CsvSource::parse(FileHandle::Path(file))?;
            print_json(source.schema())?;
        }
        Commands::Preview {
            table,
            file,
            columns,
            join,
        } => {
            let mut session = match (table, file) {
                (Some(table), _) => {
                    let database = connect(&cli.connection)?;
                    open_session(Source::Database(TableSource::open(database, &table).await?))?
                }
                (None, Some(file)) => {
                    open_session(Source::File(CsvSource::parse(FileHandle::Path(file))?))?
                }
                (None, None) => {
                    return Err(TransferError::validation("Either --table or --file is required"))
                }
            };
            choose(&mut session, &columns, &join)?;
            print_json(session.request_preview().await?)?;
        }
        Commands::Export {
            table,
            columns,
            join,
            out,
        } => {
            let database = connect(&cli.connection)?;
            let mut session = open_session(Source::Database(TableSource::open(database, &table).await?))?;
            choose(&mut session, &columns, &join)?;
            let report = transfer(session, TransferTarget::File { path: out }).await?;
            print_json(&report)?;
        }
        Commands::Import {
            file,
            table,
            columns,
            order_by,
        } => {
            let database = connect(&cli.connection)?;
            let mut session = open_session(Source::File(CsvSource::parse(FileHandle::Path(file))?))?;
            choose(&mut session, &columns, &JoinArgs::default())?;
            let target = TransferTarget::Table {
                database,
                table,
                order_by,
            };
            let report = transfer(session, target).await?;
            print_json(&report)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn connect(args: &ConnectionArgs) -> Result<ClickHouseSource> {
    ClickHouseSource::connect(args.resolve()?)
}

fn open_session(source: Source) -> Result<TransferSession> {
    let direction = match &source {
        Source::Database(_) => TransferDirection::DatabaseToFile,
        Source::File(_) => TransferDirection::FileToDatabase,
    };
    let mut session = TransferSession::new(direction);
    session.load_source(source)?;
    Ok(session)
}

/// Applies the projection (all columns when empty) and the optional join.
fn choose(session: &mut TransferSession, columns: &[String], join: &JoinArgs) -> Result<()> {
    let columns = if columns.is_empty() {
        session
            .source()
            .map(|source| source.schema().names())
            .unwrap_or_default()
    } else {
        columns.iter().map(|column| column.trim().to_string()).collect()
    };

    session.select_columns(&columns)?;
    if let Some((table, condition)) = join.condition()? {
        session.set_join(&table, condition)?;
    }
    Ok(())
}

/// Runs the transfer while a task logs progress. The session is dropped
/// before the task is joined so the last update is logged before exit.
async fn transfer(mut session: TransferSession, target: TransferTarget) -> Result<TransferReport> {
    let progress = watch_progress(&session);
    let result = session.start_transfer(target).await.cloned();
    drop(session);

    if let Err(error) = progress.await {
        log::warn!("Progress logger stopped: {}", error);
    }
    result
}

fn watch_progress(session: &TransferSession) -> JoinHandle<()> {
    let mut receiver = session.subscribe_progress();
    tokio::spawn(async move {
        while receiver.changed().await.is_ok() {
            let progress = *receiver.borrow_and_update();
            match progress.percent {
                Some(percent) => log::info!("progress {}% ({} rows)", percent, progress.rows),
                None => log::info!("progress: waiting for the server ({} rows)", progress.rows),
            }
        }
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| TransferError::Io(e.into()))?;
    println!("{}", json);
    Ok(())
}
