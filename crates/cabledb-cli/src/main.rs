//! Binary entry point for the CableDB command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use cabledb_error::CableError;
use cabledb_proto::{DatabaseResult, encode_outcome, write_frame};
use cabledb_service::{DatabaseService, Server, ServiceConfig};
use cabledb_types::QueryOutcome;

#[derive(Parser, Debug)]
#[command(
    name = "cabledb",
    version,
    about = "In-memory SQL database service over a typed wire protocol",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the database service.
    Serve(ServeArgs),
    /// Issue requests against a running service.
    Client(ClientArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 7687)]
    port: u16,
}

#[derive(Args, Debug)]
struct ClientArgs {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 7687)]
    port: u16,

    #[arg(long, help = "Connect over TLS (not yet available)")]
    tls: bool,

    #[arg(long, help = "Request path prefix (not yet available)")]
    prefix: Option<String>,

    #[arg(long, default_value = "default", help = "Database name to connect to")]
    database: String,

    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Json,
        help = "Result rendering: pretty JSON or the raw wire frame"
    )]
    format: OutputFormat,

    #[arg(long, value_name = "PATH", help = "Write output to a file ('-' for stdout)")]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: ClientCommand,
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    /// Execute a statement, expecting no row-bearing result.
    Exec { sql: String },
    /// Run a query and print its result.
    Query { sql: String },
    /// List the tables of the connected database.
    Tables,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Binary,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<CableError>()
        .map_or(1, CableError::exit_code)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Client(args) => client(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let service = Arc::new(DatabaseService::new(ServiceConfig::default()));
    let server = Server::bind((args.host.as_str(), args.port), service).await?;
    server.run().await?;
    Ok(())
}

async fn client(args: ClientArgs) -> anyhow::Result<()> {
    if args.tls {
        return Err(CableError::unimplemented("--tls").into());
    }
    if args.prefix.is_some() {
        return Err(CableError::unimplemented("--prefix").into());
    }

    let addr = format!("{}:{}", args.host, args.port);
    let mut adapter = cabledb_client::connect(&addr, &args.database).await?;
    let token = adapter.connect(&args.database).await?;
    info!(token, database = %args.database, "connected");

    let output = match &args.command {
        ClientCommand::Exec { sql } => {
            let outcome = adapter.exec(sql).await?;
            fail_on_error_outcome(&outcome)?;
            render_result(&encode_outcome(&outcome), args.format).await?
        }
        ClientCommand::Query { sql } => {
            let outcome = adapter.query(sql).await?;
            fail_on_error_outcome(&outcome)?;
            render_result(&encode_outcome(&outcome), args.format).await?
        }
        ClientCommand::Tables => {
            let tables = adapter.tables().await?;
            match args.format {
                OutputFormat::Json => {
                    let mut bytes = serde_json::to_vec_pretty(&tables)?;
                    bytes.push(b'\n');
                    bytes
                }
                OutputFormat::Binary => frame_bytes(&tables).await?,
            }
        }
    };

    write_output(args.out.as_deref(), &output)
}

/// A query that came back as an error envelope still exits non-zero.
fn fail_on_error_outcome(outcome: &QueryOutcome) -> Result<(), CableError> {
    if let QueryOutcome::Failure { message, code } = outcome {
        let code = code.unwrap_or(cabledb_error::StatusCode::Internal as i32);
        return Err(
            cabledb_proto::WireError {
                code,
                status: cabledb_error::StatusCode::from_wire(code).name().to_owned(),
                message: message.clone(),
            }
            .into_error(),
        );
    }
    Ok(())
}

async fn render_result(
    result: &DatabaseResult,
    format: OutputFormat,
) -> anyhow::Result<Vec<u8>> {
    match format {
        OutputFormat::Json => {
            let mut bytes = serde_json::to_vec_pretty(result)?;
            bytes.push(b'\n');
            Ok(bytes)
        }
        OutputFormat::Binary => frame_bytes(result).await,
    }
}

/// Encode a message exactly as it travels on the wire.
async fn frame_bytes<T: serde::Serialize>(message: &T) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_frame(&mut buf, message).await?;
    Ok(buf)
}

fn write_output(out: Option<&std::path::Path>, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write as _;

    match out {
        None => std::io::stdout().write_all(bytes)?,
        Some(path) if path.as_os_str() == "-" => std::io::stdout().write_all(bytes)?,
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("cannot write output to {}", path.display()))?,
    }
    Ok(())
}
