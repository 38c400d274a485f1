//! kvsync CLI
//!
//! Pushes a tree of configuration files into a Consul KV prefix.
//!
//! # Strategies
//!
//! - `DRYRUN` - Report the operations a run would perform
//! - `ONCE` - Apply once and exit
//! - `POLL` - Apply every `--poll-interval` seconds
//! - `HOOK` - Apply on each `GET /v1/run`
//!
//! Every flag may also be set through a `KVSYNC_` environment variable.
//! The process exit status identifies the kind of failure.

mod commands;
mod settings;

use clap::Parser;
use kvsync_engine::{spawn_signal_watcher, SyncError, SyncMode, SyncResult};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Synchronise a directory of configuration files with Consul KV.
#[derive(Parser, Debug)]
#[command(name = "kvsync")]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Log verbosity: ERROR, INFO or DEBUG (RUST_LOG overrides)
    #[arg(long, env = "KVSYNC_LOG_LEVEL", default_value = "ERROR")]
    log_level: String,

    /// Run strategy: DRYRUN, ONCE, POLL or HOOK
    #[arg(long, env = "KVSYNC_STRATEGY", default_value = "ONCE")]
    strategy: String,

    /// Local checkout holding the configuration tree
    #[arg(long, env = "KVSYNC_REPO_ROOT", default_value = "/tmp/kvsync/repo")]
    repo_root: PathBuf,

    /// Git repository to clone into --repo-root and update before each run
    #[arg(long, env = "KVSYNC_REPO_URL")]
    repo_url: Option<String>,

    /// Branch to check out
    #[arg(long, env = "KVSYNC_REPO_BRANCH", default_value = "master")]
    repo_branch: String,

    /// Remote to fetch from
    #[arg(long, env = "KVSYNC_REPO_REMOTE_NAME", default_value = "origin")]
    repo_remote_name: String,

    /// SSH user for the repository
    #[arg(long, env = "KVSYNC_REPO_SSH_USER", default_value = "git")]
    repo_ssh_user: String,

    /// SSH private key for the repository
    #[arg(long, env = "KVSYNC_REPO_SSH_KEY")]
    repo_ssh_key: Option<PathBuf>,

    /// Directory inside the checkout to read from
    #[arg(long, env = "KVSYNC_REPO_BASE_PATH", default_value = "/")]
    repo_base_path: String,

    /// Consul address, e.g. http://127.0.0.1:8500
    #[arg(long, env = "KVSYNC_CONSUL_URL")]
    consul_url: Option<String>,

    /// Consul ACL token
    #[arg(long, env = "KVSYNC_CONSUL_ACL", default_value = "", hide_env_values = true)]
    consul_acl: String,

    /// KV prefix to manage
    #[arg(long, env = "KVSYNC_CONSUL_BASE_PATH", default_value = "")]
    consul_base_path: String,

    /// Client private key (PEM) for mutual TLS
    #[arg(long, env = "KVSYNC_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Client certificate (PEM) for mutual TLS
    #[arg(long, env = "KVSYNC_CERT_FILE")]
    cert_file: Option<PathBuf>,

    /// CA bundle (PEM) used to verify Consul
    #[arg(long, env = "KVSYNC_CA_FILE")]
    ca_file: Option<PathBuf>,

    /// Expand JSON documents into one key per leaf
    #[arg(long, env = "KVSYNC_EXPAND_JSON")]
    expand_json: bool,

    /// Expand YAML documents into one key per leaf
    #[arg(long, env = "KVSYNC_EXPAND_YAML")]
    expand_yaml: bool,

    /// JSON object of secrets substituted into {{placeholders}}
    #[arg(long, env = "KVSYNC_SECRETS_FILE")]
    secrets_file: Option<String>,

    /// Delete policy for keys missing locally: false, true or skip
    #[arg(long, env = "KVSYNC_ALLOW_DELETES", default_value = "false")]
    allow_deletes: String,

    /// Seconds between runs in POLL mode
    #[arg(long, env = "KVSYNC_POLL_INTERVAL", default_value_t = 60)]
    poll_interval: u64,

    /// Stop POLL mode after this many runs
    #[arg(long, env = "KVSYNC_POLL_ITERATIONS")]
    poll_iterations: Option<u64>,

    /// Comma-separated file extensions to read
    #[arg(long, env = "KVSYNC_INPUT_EXT", default_value = "json,txt,ini")]
    input_ext: String,

    /// Keep file extensions in KV keys
    #[arg(long, env = "KVSYNC_KEEP_EXT")]
    keep_ext: bool,

    /// Consul request timeout in seconds
    #[arg(long, env = "KVSYNC_TIMEOUT", default_value_t = 5)]
    timeout: u64,

    /// Listen address in HOOK mode
    #[arg(long, env = "KVSYNC_HOOK_ADDR", default_value = "0.0.0.0:8000")]
    hook_addr: String,

    /// Show decoded values in the operations table
    #[arg(long, env = "KVSYNC_SHOW_VALUES")]
    show_values: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = match settings::log_filter(&cli.log_level) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(SyncError::Interrupted) => {
            println!(" Interrupt received... Quitting!");
            0
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };
    info!("Quitting... bye.");
    std::process::exit(code);
}

fn run(cli: &Cli) -> SyncResult<()> {
    let mode: SyncMode = cli.strategy.parse()?;
    info!("Starting in mode: {}", mode);

    let engine = settings::build_engine(cli, mode)?;
    if let Err(e) = spawn_signal_watcher(Arc::clone(engine.busy_signal())) {
        warn!("signal handling unavailable: {}", e);
    }

    match mode {
        SyncMode::DryRun => commands::dry_run::run(&engine),
        SyncMode::Once => commands::once::run(&engine),
        SyncMode::Poll => commands::poll::run(&engine),
        SyncMode::Hook => commands::hook::run(engine, settings::server_config(cli)?),
    }
}
