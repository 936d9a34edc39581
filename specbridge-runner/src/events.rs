// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A serializable form of the inbound events, and replay of recorded event logs.
//!
//! An event log is a JSON-lines file with one [`BridgeEvent`] per line, e.g.
//!
//! ```json
//! {"event":"engine-started","groups":[["Math"]]}
//! {"event":"group-prepared","group":["Math"]}
//! {"event":"discovered","description":["Math","add"],"test-type":"leaf"}
//! ```

use crate::{
    consumer::ReportingConsumer,
    description::{Description, TestType},
    errors::{ProtocolError, ReplayError},
    orchestrator::{NotificationOrchestrator, RunStats},
    outcome::{FailureInfo, InvocationOutcome},
    registry::GroupMetadata,
};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::debug;

/// One inbound event, as recorded in an event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum BridgeEvent {
    /// See [`NotificationOrchestrator::engine_started`].
    EngineStarted {
        /// The groups expected to run.
        #[serde(default)]
        groups: Vec<Description>,
    },

    /// See [`NotificationOrchestrator::engine_finished`].
    EngineFinished {
        /// The error that terminated the run, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<FailureInfo>,
    },

    /// See [`NotificationOrchestrator::prepare_group`].
    GroupPrepared {
        /// The top-level group.
        group: Description,
        /// Metadata about the group.
        #[serde(default)]
        metadata: GroupMetadata,
    },

    /// See [`NotificationOrchestrator::ignore_group`].
    GroupIgnored {
        /// The top-level group.
        group: Description,
        /// Metadata about the group.
        #[serde(default)]
        metadata: GroupMetadata,
        /// Why the group will not run.
        reason: String,
    },

    /// See [`NotificationOrchestrator::complete_group`].
    GroupCompleted {
        /// The top-level group.
        group: Description,
        /// Metadata about the group.
        #[serde(default)]
        metadata: GroupMetadata,
        /// The error that terminated the group, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<FailureInfo>,
    },

    /// See [`NotificationOrchestrator::discover`].
    Discovered {
        /// The node.
        description: Description,
        /// Whether the node can have children.
        test_type: TestType,
    },

    /// See [`NotificationOrchestrator::invocation_started`].
    InvocationStarted {
        /// The node.
        description: Description,
        /// Whether the node can have children.
        test_type: TestType,
    },

    /// See [`NotificationOrchestrator::invocation_completed`].
    InvocationCompleted {
        /// The node.
        description: Description,
        /// The outcome of the invocation.
        outcome: InvocationOutcome,
    },
}

impl BridgeEvent {
    /// Applies this event to an orchestrator.
    ///
    /// Returns the final statistics for [`BridgeEvent::EngineFinished`], and `None` otherwise.
    pub fn apply<C: ReportingConsumer>(
        self,
        orchestrator: &NotificationOrchestrator<C>,
    ) -> Result<Option<RunStats>, ProtocolError> {
        match self {
            BridgeEvent::EngineStarted { groups } => orchestrator.engine_started(&groups)?,
            BridgeEvent::EngineFinished { error } => {
                return orchestrator.engine_finished(error.as_ref()).map(Some);
            }
            BridgeEvent::GroupPrepared { group, metadata } => {
                orchestrator.prepare_group(&group, &metadata)?
            }
            BridgeEvent::GroupIgnored {
                group,
                metadata,
                reason,
            } => orchestrator.ignore_group(&group, &metadata, &reason)?,
            BridgeEvent::GroupCompleted {
                group,
                metadata,
                error,
            } => orchestrator.complete_group(&group, &metadata, error.as_ref())?,
            BridgeEvent::Discovered {
                description,
                test_type,
            } => orchestrator.discover(&description, test_type)?,
            BridgeEvent::InvocationStarted {
                description,
                test_type,
            } => orchestrator.invocation_started(&description, test_type)?,
            BridgeEvent::InvocationCompleted {
                description,
                outcome,
            } => orchestrator.invocation_completed(&description, outcome)?,
        }
        Ok(None)
    }
}

/// Replays a JSON-lines event log onto an orchestrator, stopping at the first error.
///
/// Blank lines are skipped. Returns the statistics from the last `engine-finished` event, if
/// there was one.
pub fn replay<C: ReportingConsumer>(
    reader: impl BufRead,
    orchestrator: &NotificationOrchestrator<C>,
) -> Result<Option<RunStats>, ReplayError> {
    let mut stats = None;
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(ReplayError::Read)?;
        if line.trim().is_empty() {
            continue;
        }
        let event: BridgeEvent = serde_json::from_str(&line).map_err(|error| ReplayError::Parse {
            line: line_number,
            error,
        })?;
        debug!(line = line_number, ?event, "replaying event");
        if let Some(finished) = event.apply(orchestrator).map_err(|error| ReplayError::Protocol {
            line: line_number,
            error,
        })? {
            stats = Some(finished);
        }
    }
    Ok(stats)
}
