// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    display::{DisplayConsumer, DisplayStyles, MessageFormat},
    errors::{ExpectedError, Result, SpecbridgeExitCode},
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use specbridge_runner::{
    config::BridgeConfig,
    consumer::{FanOut, JunitConsumer},
    events::replay,
    orchestrator::NotificationOrchestrator,
};
use std::{
    fs::File,
    io::{BufReader, Write},
    sync::Arc,
};
use tracing::debug;

/// Orders test execution events into a hierarchy-respecting report.
#[derive(Debug, Parser)]
#[command(version, name = "specbridge", styles = clap_styles::style())]
pub struct SpecbridgeApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl SpecbridgeApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let workspace_root = match &self.config_opts.workspace_root {
            Some(root) => root.clone(),
            None => current_dir()?,
        };
        let config = self
            .config_opts
            .make_config(&workspace_root, self.command.junit_override())?;

        match self.command {
            Command::Replay {
                event_log,
                message_format,
                ..
            } => {
                let mut styles = DisplayStyles::default();
                if output.color.should_colorize(supports_color::Stream::Stdout) {
                    styles.colorize();
                }
                let display =
                    DisplayConsumer::new(message_format, output.verbose, styles, std::io::stdout());
                exec_replay(&event_log, &config, display)
            }
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: workspace-root/.config/specbridge.toml]
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Project root that relative config paths are resolved against
    /// [default: current directory]
    #[arg(long, global = true, value_name = "DIR")]
    workspace_root: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(
        &self,
        workspace_root: &Utf8Path,
        junit: Option<&Utf8Path>,
    ) -> Result<BridgeConfig> {
        let mut config = BridgeConfig::from_sources(workspace_root, self.config_file.as_deref())?;
        if let Some(junit) = junit {
            config.junit.path = Some(workspace_root.join(junit));
        }
        debug!(?config, "loaded config");
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a JSON-lines event log and print the ordered notifications
    ///
    /// Each line of the log is one event, for example
    /// `{"event":"group-prepared","group":["Math"]}`. Replay stops at the first line that
    /// violates the reporting protocol.
    Replay {
        /// The event log to replay
        #[arg(value_name = "EVENT_LOG")]
        event_log: Utf8PathBuf,

        /// Write a JUnit report to this path, overriding `[junit] path` in config
        #[arg(long, value_name = "PATH")]
        junit: Option<Utf8PathBuf>,

        /// Output format
        #[arg(long, short = 'T', value_enum, default_value_t, value_name = "FMT")]
        message_format: MessageFormat,
    },
}

impl Command {
    fn junit_override(&self) -> Option<&Utf8Path> {
        match self {
            Command::Replay { junit, .. } => junit.as_deref(),
        }
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDir { err })?;
    Utf8PathBuf::try_from(dir)
        .map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { path: err.into_path_buf() })
}

fn exec_replay<W: Write + Send + 'static>(
    event_log: &Utf8Path,
    config: &BridgeConfig,
    display: DisplayConsumer<W>,
) -> Result<i32> {
    let file = File::open(event_log).map_err(|err| ExpectedError::EventLogOpen {
        path: event_log.to_owned(),
        err,
    })?;

    // The report is written below rather than by the consumer, so a failed write fails the run.
    let junit = Arc::new(JunitConsumer::new(config.junit.report_name.as_str(), None));
    let display = Arc::new(display);
    let mut consumer = FanOut::new();
    consumer.push(display.clone()).push(junit.clone());

    let orchestrator = NotificationOrchestrator::new(consumer, config);
    let stats = replay(BufReader::new(file), &orchestrator)
        .map_err(|err| ExpectedError::Replay {
            path: event_log.to_owned(),
            err,
        })?
        .ok_or_else(|| ExpectedError::EngineNotFinished {
            path: event_log.to_owned(),
        })?;

    if let Some(err) = display.take_write_error() {
        return Err(ExpectedError::WriteOutput { err });
    }
    if let Some(path) = &config.junit.path {
        junit
            .write_to(path)
            .map_err(|err| ExpectedError::JunitWrite { err })?;
    }

    Ok(if stats.is_success() {
        SpecbridgeExitCode::OK
    } else {
        SpecbridgeExitCode::TEST_RUN_FAILED
    })
}
