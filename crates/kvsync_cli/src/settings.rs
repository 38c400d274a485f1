//! Assembles engine, source and server configuration from the command line.

use crate::Cli;
use kvsync_engine::{
    ConsulClient, PollConfig, SyncConfig, SyncEngine, SyncError, SyncMode, SyncResult,
    TableReporter, TlsConfig,
};
use kvsync_protocol::DeletePolicy;
use kvsync_server::ServerConfig;
use kvsync_source::{load_secrets, DirectorySource, RepoConfig, SourceConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// The engine as the binary runs it.
pub(crate) type Engine = SyncEngine<ConsulClient, DirectorySource>;

/// Maps `--log-level` to a filter. `RUST_LOG` wins when set.
pub(crate) fn log_filter(level: &str) -> SyncResult<EnvFilter> {
    let directive = match level.trim().to_ascii_uppercase().as_str() {
        "ERROR" => "error",
        "INFO" => "info",
        "DEBUG" => "debug",
        _ => {
            return Err(SyncError::BadConfig(format!(
                "invalid log level '{}', expected one of: ERROR, INFO, DEBUG",
                level
            )))
        }
    };
    Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)))
}

pub(crate) fn sync_config(cli: &Cli) -> SyncResult<SyncConfig> {
    let url = cli
        .consul_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| SyncError::BadConfig("the consul url is required".into()))?;

    let policy: DeletePolicy = cli.allow_deletes.parse()?;

    let mut poll = PollConfig::new(Duration::from_secs(cli.poll_interval));
    if let Some(iterations) = cli.poll_iterations {
        poll = poll.with_max_iterations(iterations);
    }

    let mut config = SyncConfig::new(url.trim_end_matches('/'))
        .with_token(cli.consul_acl.clone())
        .with_base_path(cli.consul_base_path.clone())
        .with_delete_policy(policy)
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_poll(poll);

    match (&cli.cert_file, &cli.key_file) {
        (Some(cert), Some(key)) => {
            let mut tls = TlsConfig::new(cert, key);
            if let Some(ca) = &cli.ca_file {
                tls = tls.with_ca_file(ca);
            }
            config = config.with_tls(tls);
        }
        (None, None) => {}
        _ => {
            return Err(SyncError::BadConfig(
                "mutual TLS needs both --cert-file and --key-file".into(),
            ))
        }
    }

    Ok(config)
}

pub(crate) fn source_config(cli: &Cli) -> SyncResult<SourceConfig> {
    let mut config = SourceConfig::new(&cli.repo_root)
        .with_repo_base_path(cli.repo_base_path.clone())
        .with_kv_base_path(cli.consul_base_path.clone())
        .with_extensions(cli.input_ext.split(','))
        .with_keep_extension(cli.keep_ext)
        .with_expand_json(cli.expand_json)
        .with_expand_yaml(cli.expand_yaml);

    if let Some(url) = cli.repo_url.as_deref().map(str::trim).filter(|url| !url.is_empty()) {
        let mut repo = RepoConfig::new(url)
            .with_branch(cli.repo_branch.clone())
            .with_remote_name(cli.repo_remote_name.clone());
        if let Some(key) = &cli.repo_ssh_key {
            repo = repo.with_ssh_key(cli.repo_ssh_user.clone(), key);
        }
        config = config.with_repository(repo);
    }

    if config.extensions.is_empty() {
        return Err(SyncError::BadConfig(
            "no input file extensions configured".into(),
        ));
    }
    Ok(config)
}

pub(crate) fn server_config(cli: &Cli) -> SyncResult<ServerConfig> {
    let addr: SocketAddr = cli.hook_addr.trim().parse().map_err(|e| {
        SyncError::BadConfig(format!("invalid hook address '{}': {}", cli.hook_addr, e))
    })?;
    Ok(ServerConfig::new(addr))
}

/// Builds the engine for `mode`. Hook runs report nothing to stdout.
pub(crate) fn build_engine(cli: &Cli, mode: SyncMode) -> SyncResult<Engine> {
    let config = sync_config(cli)?;
    let source = DirectorySource::new(source_config(cli)?);
    debug!(
        consul = %config.consul_url,
        base_path = %config.base_path,
        policy = %config.delete_policy,
        root = %source.config().walk_root().display(),
        "configuration loaded"
    );

    let client = ConsulClient::new(&config)?;
    let mut engine = SyncEngine::new(config, client, source);
    if let Some(file) = &cli.secrets_file {
        engine = engine.with_secrets(load_secrets(file, &cli.repo_root)?);
    }
    if mode != SyncMode::Hook {
        engine = engine.with_reporter(TableReporter::new(cli.show_values));
    }
    Ok(engine)
}
