// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by specbridge.

use crate::description::{Description, TestType};
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt};
use thiserror::Error;

/// An error returned while constructing a [`Description`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DescriptionParseError {
    /// The description has no segments.
    #[error("description has no segments")]
    Empty,

    /// One of the segments is the empty string.
    #[error("description segment {index} is empty")]
    EmptySegment {
        /// The 0-based index of the empty segment.
        index: usize,
    },
}

/// The upstream executor violated its contract with the orchestrator.
///
/// These errors are fatal: the report would be corrupted if the orchestrator carried on.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// A node was created before its parent.
    #[error("cannot register `{description}`: parent `{parent}` has not been registered")]
    ParentNotRegistered {
        /// The description being registered.
        description: Description,
        /// The missing parent.
        parent: Description,
    },

    /// A node was registered under a leaf.
    #[error("cannot register `{description}`: parent `{parent}` is a leaf")]
    ParentIsLeaf {
        /// The description being registered.
        description: Description,
        /// The parent, which is a leaf.
        parent: Description,
    },

    /// A completion arrived for a node that was never discovered.
    #[error("invocation of `{description}` completed, but it was never discovered")]
    UndiscoveredCompletion {
        /// The description that completed.
        description: Description,
    },

    /// No outcome could be resolved for a discovered node at group completion.
    #[error("no outcome recorded for `{description}` ({test_type}) or any of its descendants")]
    UnresolvedOutcome {
        /// The description with no outcome.
        description: Description,
        /// The discovered type of the node.
        test_type: TestType,
    },

    /// An event arrived for a group that is not running.
    #[error("group `{group}` is not running")]
    GroupNotPrepared {
        /// The top-level group.
        group: Description,
    },

    /// A group was prepared or ignored more than once.
    #[error("group `{group}` was already prepared")]
    GroupAlreadyPrepared {
        /// The top-level group.
        group: Description,
    },

    /// A group operation was called with a nested description.
    #[error("`{description}` is not a top-level group")]
    NotTopLevel {
        /// The nested description.
        description: Description,
    },

    /// A node operation was called with a top-level group description.
    #[error("`{description}` is a top-level group, not a node within one")]
    NotInGroup {
        /// The top-level description.
        description: Description,
    },

    /// A group event arrived before the engine started, or after it finished.
    #[error("engine is not running")]
    EngineNotRunning,

    /// The engine was started twice.
    #[error("engine was already started")]
    EngineAlreadyStarted,

    /// A previous notification panicked while holding the state lock for a group.
    #[error("state for group `{group}` was poisoned by an earlier panic")]
    StatePoisoned {
        /// The top-level group.
        group: Description,
    },
}

/// An error returned by a [`ReportingConsumer`](crate::consumer::ReportingConsumer).
///
/// The orchestrator logs these and carries on with the remaining nodes.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConsumerError {
    message: String,
    #[source]
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl ConsumerError {
    /// Creates a new consumer error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new consumer error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// An error that occurred while loading the specbridge config.
#[derive(Debug, Error)]
#[error("failed to parse specbridge config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// The config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// The kind of error that occurred.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// The config sources could not be combined.
    #[error("error building config")]
    BuildError(#[source] Box<ConfigError>),

    /// The combined config did not match the expected shape.
    #[error("error deserializing config")]
    DeserializeError(#[source] Box<ConfigError>),
}

/// An error that occurred while replaying an event log.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplayError {
    /// Reading from the log failed.
    #[error("error reading event log")]
    Read(#[source] std::io::Error),

    /// A line could not be parsed as an event.
    #[error("error parsing event on line {line}")]
    Parse {
        /// The 1-based line number.
        line: usize,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The orchestrator rejected an event.
    #[error("event on line {line} violated the reporting protocol")]
    Protocol {
        /// The 1-based line number.
        line: usize,
        /// The underlying error.
        #[source]
        error: ProtocolError,
    },
}

impl ReplayError {
    /// Returns the protocol error, if this error was caused by one.
    pub fn protocol_error(&self) -> Option<&ProtocolError> {
        match self {
            ReplayError::Protocol { error, .. } => Some(error),
            ReplayError::Read(_) | ReplayError::Parse { .. } => None,
        }
    }
}

/// An error that occurred while writing out a JUnit report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JunitWriteError {
    /// Creating the output directory or file failed.
    #[error("error writing JUnit output to `{file}`")]
    Fs {
        /// The file or directory being written.
        file: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Serializing the report failed.
    #[error("error serializing JUnit report to `{file}`")]
    Serialize {
        /// The output file.
        file: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// Displays an error along with its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E> fmt::Display for DisplayErrorChain<E>
where
    E: error::Error,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        while let Some(current) = source {
            write!(f, "\n  caused by:\n  - {current}")?;
            source = current.source();
        }

        Ok(())
    }
}
