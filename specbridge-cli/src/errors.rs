// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::StderrStyles;
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use specbridge_runner::errors::{
    ConfigParseError, DisplayErrorChain, JunitWriteError, ReplayError,
};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Process exit codes used by specbridge.
pub struct SpecbridgeExitCode;

impl SpecbridgeExitCode {
    /// Every group finished and nothing failed.
    pub const OK: i32 = 0;

    /// The run completed, but at least one test or group failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The event log or config could not be opened or loaded.
    pub const SETUP_ERROR: i32 = 96;

    /// The event log could not be parsed, or violated the reporting protocol.
    pub const PROTOCOL_ERROR: i32 = 97;

    /// Writing notifications to stdout, or writing the JUnit report, failed.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

// The #[error()] strings are placeholders: errors are printed with display_to_stderr.

/// An error that the CLI reports to the user, then exits with.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDir {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to open event log")]
    EventLogOpen {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("replay failed")]
    Replay {
        path: Utf8PathBuf,
        #[source]
        err: ReplayError,
    },
    #[error("event log ended before the engine finished")]
    EngineNotFinished { path: Utf8PathBuf },
    #[error("failed to write output")]
    WriteOutput {
        #[source]
        err: std::io::Error,
    },
    #[error("failed to write JUnit report")]
    JunitWrite {
        #[source]
        err: JunitWriteError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDir { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::EventLogOpen { .. } => SpecbridgeExitCode::SETUP_ERROR,
            Self::Replay { .. } | Self::EngineNotFinished { .. } => {
                SpecbridgeExitCode::PROTOCOL_ERROR
            }
            Self::WriteOutput { .. } | Self::JunitWrite { .. } => {
                SpecbridgeExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let next_error: Option<&dyn Error> = match self {
            Self::CurrentDir { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::EventLogOpen { path, err } => {
                error!("failed to open event log `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::Replay { path, err } => {
                match err {
                    ReplayError::Protocol { line, .. } | ReplayError::Parse { line, .. } => error!(
                        "replaying `{}` failed at line {}",
                        path.style(styles.bold),
                        line.style(styles.bold),
                    ),
                    _ => error!("replaying `{}` failed", path.style(styles.bold)),
                }
                err.source()
            }
            Self::EngineNotFinished { path } => {
                error!(
                    "event log `{}` ended before the engine finished",
                    path.style(styles.bold)
                );
                None
            }
            Self::WriteOutput { err } => {
                error!("failed to write output");
                Some(err as &dyn Error)
            }
            Self::JunitWrite { err } => {
                error!("failed to write JUnit report");
                Some(err as &dyn Error)
            }
        };

        if let Some(err) = next_error {
            error!("{}", DisplayErrorChain::new(err).style(styles.error));
        }
    }
}
