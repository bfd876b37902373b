mod cli;
mod config;
mod context;
mod fingerprint;
mod fragments;
mod guard;
mod migrate;
mod natural_order;
mod record;
mod render;
mod status;
mod update;

use cli::{Cli, Command};
use config::{ConfigLoader, LogLevel, Settings};
use context::{CommandContext, ExecutionContext, LocalContext, RemoteHost};
use render::RenderError;
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Event, Level, Subscriber, debug, error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use update::{Outcome, UpdateError, UpdateOptions, update_file};

const PROGRAM_NAME: &str = "dotdee";

struct DotdeeExitCode;

impl DotdeeExitCode {
    /// Exit code used when a modified file was not overwritten, or when
    /// status finds the file out of date.
    fn refused_or_stale() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code used when an executable fragment failed.
    fn fragment_failed() -> ExitCode {
        ExitCode::from(2)
    }

    /// Exit code used for other errors (I/O errors, invalid arguments, etc.).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }

    fn for_error(err: &anyhow::Error) -> ExitCode {
        match err.downcast_ref::<UpdateError>() {
            Some(UpdateError::RefuseToOverwrite { .. }) => Self::refused_or_stale(),
            Some(UpdateError::Render(
                RenderError::Execution { .. } | RenderError::Invoke { .. },
            )) => Self::fragment_failed(),
            _ => Self::any_error(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = load_settings(&cli);
    let config_level = settings.as_ref().ok().and_then(|(s, _)| s.log_level);
    init_tracing(
        explicit_log_level(cli.log_level, cli.verbose, cli.quiet),
        config_level,
    );

    let settings = match settings {
        Ok((settings, files)) => {
            for file in files {
                debug!("Loaded configuration file {}", file.display());
            }
            settings
        }
        Err(e) => {
            error!("{e}");
            return DotdeeExitCode::any_error();
        }
    };

    // Change working directory if -C was specified
    if let Some(directory) = &cli.directory
        && let Err(e) = std::env::set_current_dir(directory)
    {
        error!(
            "Failed to change directory to {}: {}",
            directory.display(),
            e
        );
        return DotdeeExitCode::any_error();
    }

    let ctx = build_context(&cli, &settings);
    debug!("Operating through {}", ctx.describe());

    let result: anyhow::Result<ExitCode> = match cli.command {
        Command::Update {
            file,
            force,
            dry_run,
            fingerprint,
        } => handle_update(
            ctx.as_ref(),
            &file,
            UpdateOptions {
                force,
                dry_run,
                fingerprint,
            },
        ),
        Command::Status { file } => handle_status(ctx.as_ref(), &file),
    };

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err}");
            DotdeeExitCode::for_error(&err)
        }
    }
}

fn load_settings(cli: &Cli) -> Result<(Settings, Vec<PathBuf>), config::ConfigError> {
    if cli.no_config {
        Ok((Settings::default(), Vec::new()))
    } else if let Some(path) = &cli.config {
        Ok((config::load_file(path)?, vec![path.clone()]))
    } else {
        ConfigLoader::new(PROGRAM_NAME).load()
    }
}

fn build_context(cli: &Cli, settings: &Settings) -> Box<dyn ExecutionContext> {
    let sudo = cli.sudo || settings.sudo.unwrap_or(false);
    let remote = cli
        .host
        .clone()
        .or_else(|| settings.host.clone())
        .map(|host| RemoteHost {
            host,
            user: cli.user.clone().or_else(|| settings.user.clone()),
            port: cli.port.or(settings.port),
        });

    if remote.is_none() && !sudo {
        Box::new(LocalContext::new())
    } else {
        Box::new(CommandContext::new(remote, sudo))
    }
}

fn handle_update(
    ctx: &dyn ExecutionContext,
    file: &Path,
    options: UpdateOptions,
) -> anyhow::Result<ExitCode> {
    let result = update_file(ctx, file, &options)?;
    let plan = &result.plan;

    match result.outcome {
        Outcome::Written => info!(
            "Generated {} from {} fragments ({} bytes)",
            plan.target.display(),
            plan.fragments.len(),
            plan.content.len()
        ),
        Outcome::Unchanged => {}
        Outcome::DryRun => {
            info!("DRY RUN - no files were modified");
            if plan.is_up_to_date() {
                info!("{} is up to date", plan.target.display());
            } else {
                info!(
                    "Would write {} bytes from {} fragments to {}",
                    plan.content.len(),
                    plan.fragments.len(),
                    plan.target.display()
                );
            }
            info!("Fingerprint: {}", result.fingerprint);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_status(ctx: &dyn ExecutionContext, file: &Path) -> anyhow::Result<ExitCode> {
    let report = status::compute_status(ctx, file)?;

    status::print_status(&report);

    if report.is_clean() {
        return Ok(ExitCode::SUCCESS);
    }

    let force_flag = if report.plan.state.is_modified() {
        " --force"
    } else {
        ""
    };
    info!(
        "Run 'dotdee update{} --fingerprint {} {}' to apply these changes.",
        force_flag,
        report.fingerprint,
        file.display()
    );

    Ok(DotdeeExitCode::refused_or_stale())
}

/// The level requested on the command line, if any. These flags take
/// precedence over `RUST_LOG`.
fn explicit_log_level(log_level: Option<LogLevel>, verbose: u8, quiet: u8) -> Option<&'static str> {
    if let Some(level) = log_level {
        return Some(level.as_filter());
    }
    match verbose {
        0 if quiet > 0 => Some("error"),
        0 => None,
        1 => Some("info"),
        _ => Some("debug"),
    }
}

fn init_tracing(explicit_level: Option<&str>, config_level: Option<LogLevel>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let filter = match explicit_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(config_level.map_or("warn", LogLevel::as_filter))
        }),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}


impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
