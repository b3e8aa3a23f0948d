#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use egg_core::error::BuildError;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = real_main(cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    // Registers listing needs neither config nor hardware
    if let Commands::Registers = cli.cmd {
        run::list_registers(cli.json);
        return Ok(());
    }

    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("read config {}", cli.config.display()))?;
    let cfg = egg_config::load_toml(&text)?;
    init_tracing(&cli, &cfg.logging)?;
    cfg.validate()
        .map_err(|e| BuildError::InvalidConfig(e.to_string()))?;

    let config_dir = cli.config.parent().unwrap_or(Path::new("."));
    let channels = run::sensor_channels(&cfg, config_dir)?;
    let board = Arc::new(run::build_board(&cfg, channels)?);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .wrap_err("install Ctrl-C handler")?;
    }

    match cli.cmd {
        Commands::Run { ticks } => run::run_regulation(board, ticks, &shutdown, cli.json),
        Commands::Read { addr, ticks } => {
            run::read_register(board, addr, ticks, &shutdown, cli.json)
        }
        Commands::SelfCheck => run::self_check(&board, cli.json),
        Commands::Registers => Ok(()),
    }
}

/// Console logs go to stderr (pretty or JSON); `[logging].file` tees them into
/// a file with optional rotation.
fn init_tracing(cli: &Cli, logging: &egg_config::Logging) -> eyre::Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = if cli.log_level.is_none() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level))
    } else {
        EnvFilter::new(&level)
    };

    let file_writer = match &logging.file {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path.file_name().ok_or_else(|| {
                BuildError::InvalidConfig(format!("logging.file {file:?} has no file name"))
            })?;
            let appender = match logging.rotation.as_deref() {
                None | Some("never") => tracing_appender::rolling::never(dir, name),
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                Some(other) => {
                    return Err(BuildError::InvalidConfig(format!(
                        "logging.rotation must be never, daily or hourly, got {other:?}"
                    ))
                    .into());
                }
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(writer)
        }
        None => None,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match (cli.json, file_writer) {
        (true, Some(w)) => builder
            .json()
            .with_writer(std::io::stderr.and(w))
            .try_init(),
        (true, None) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, Some(w)) => builder
            .with_ansi(false)
            .with_writer(std::io::stderr.and(w))
            .try_init(),
        (false, None) => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|e| eyre::eyre!("init logging: {e}"))
}
