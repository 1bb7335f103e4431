//! adt-mcp: MCP stdio bridge for the adt-rs engine.
//!
//! Resolves its configuration from CLI flags, `SAP_*` environment
//! variables, a dotenv file and built-in defaults (in that precedence),
//! builds the engine and serves the tool catalog over stdio.
//!
//! Exit codes: 0 on clean stdio shutdown, non-zero on unrecoverable
//! startup errors (invalid configuration, missing auth).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use adt_mcp::config::{load_dotenv, Config, Overrides};
use adt_mcp::{catalog, McpServer};
use adt_rs::Engine;

#[derive(Parser)]
#[command(name = "adt-mcp")]
#[command(about = "SAP ADT tool broker for LLM-driven CLI agents (MCP over stdio)")]
#[command(version)]
struct Cli {
    /// SAP system base URL, e.g. http://a4h:50000
    #[arg(long)]
    url: Option<String>,

    /// Basic auth user (mutually exclusive with cookie auth)
    #[arg(long)]
    user: Option<String>,

    /// Basic auth password
    #[arg(long)]
    password: Option<String>,

    /// SAP client (default 001)
    #[arg(long)]
    client: Option<String>,

    /// Logon language (default EN)
    #[arg(long)]
    language: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Netscape cookie file for cookie auth
    #[arg(long)]
    cookie_file: Option<PathBuf>,

    /// Cookie string `k=v; k=v` for cookie auth
    #[arg(long)]
    cookie_string: Option<String>,

    /// Verbose transport tracing
    #[arg(long)]
    verbose: bool,

    /// Tool catalog mode: focused or expert
    #[arg(long)]
    mode: Option<String>,

    /// Deny all write operations
    #[arg(long)]
    read_only: bool,

    /// Deny free SQL queries
    #[arg(long)]
    block_free_sql: bool,

    /// Operation class whitelist, e.g. RSQTI
    #[arg(long)]
    allowed_ops: Option<String>,

    /// Operation class blacklist, e.g. CDUA
    #[arg(long)]
    disallowed_ops: Option<String>,

    /// Comma-separated package patterns, e.g. $TMP,Z*
    #[arg(long)]
    allowed_packages: Option<String>,

    /// Enable transport management operations
    #[arg(long)]
    enable_transports: bool,

    /// Restrict transports to read operations
    #[arg(long)]
    transport_read_only: bool,

    /// Comma-separated transport patterns, e.g. A4HK*
    #[arg(long)]
    allowed_transports: Option<String>,

    /// Allow mutations outside $* local packages
    #[arg(long)]
    allow_transportable_edits: bool,

    /// Evaluate calls but skip all side effects
    #[arg(long)]
    dry_run: bool,

    /// dotenv file to read (default ./.env)
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        // Boolean flags only override when set; absence falls through to
        // the next configuration layer.
        let flag = |set: bool| if set { Some(true) } else { None };
        Overrides {
            base_url: self.url.clone(),
            username: self.user.clone(),
            password: self.password.clone(),
            client: self.client.clone(),
            language: self.language.clone(),
            insecure: flag(self.insecure),
            cookie_file: self.cookie_file.clone(),
            cookie_string: self.cookie_string.clone(),
            verbose: flag(self.verbose),
            mode: self.mode.clone(),
            read_only: flag(self.read_only),
            block_free_sql: flag(self.block_free_sql),
            allowed_ops: self.allowed_ops.clone(),
            disallowed_ops: self.disallowed_ops.clone(),
            allowed_packages: self.allowed_packages.clone(),
            enable_transports: flag(self.enable_transports),
            transport_read_only: flag(self.transport_read_only),
            allowed_transports: self.allowed_transports.clone(),
            allow_transportable_edits: flag(self.allow_transportable_edits),
            dry_run: flag(self.dry_run),
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "adt_rs=debug,adt_mcp=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    // Stdout carries JSON-RPC; all logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env: HashMap<String, String> = std::env::vars().collect();
    let dotenv = load_dotenv(&cli.env_file)?;
    let config = Config::resolve(cli.overrides(), &env, &dotenv)
        .context("configuration invalid")?;

    init_logging(config.verbose);
    tracing::info!(
        url = %config.base_url,
        client = %config.client,
        mode = ?config.mode,
        "starting adt-mcp"
    );

    let endpoint = config.system_endpoint()?;
    let policy = config.safety_policy()?;
    let engine = Arc::new(Engine::new(endpoint, policy).context("engine startup failed")?);

    let server = McpServer::new(engine, catalog::catalog(config.mode));
    server.run().await.context("stdio loop failed")?;
    Ok(())
}
