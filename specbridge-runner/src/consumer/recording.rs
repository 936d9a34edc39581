// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::ReportingConsumer;
use crate::{
    description::Description,
    errors::ConsumerError,
    outcome::FailureInfo,
    registry::{ReportNode, UniqueId},
};
use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

/// A notification captured by a [`RecordingConsumer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// See [`ReportingConsumer::dynamically_registered`].
    DynamicallyRegistered {
        /// The node.
        node: NodeRef,
    },

    /// See [`ReportingConsumer::started`].
    Started {
        /// The node.
        node: NodeRef,
    },

    /// See [`ReportingConsumer::finished_successful`].
    FinishedSuccessful {
        /// The node.
        node: NodeRef,
    },

    /// See [`ReportingConsumer::finished_failed`].
    FinishedFailed {
        /// The node.
        node: NodeRef,
        /// The failure.
        failure: FailureInfo,
    },

    /// See [`ReportingConsumer::skipped`].
    Skipped {
        /// The node.
        node: NodeRef,
        /// Why the node was skipped.
        reason: String,
    },
}

impl Notification {
    /// The node this notification is about.
    pub fn node(&self) -> &NodeRef {
        match self {
            Notification::DynamicallyRegistered { node }
            | Notification::Started { node }
            | Notification::FinishedSuccessful { node }
            | Notification::FinishedFailed { node, .. }
            | Notification::Skipped { node, .. } => node,
        }
    }

    /// Returns true for the three terminal notifications.
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            Notification::FinishedSuccessful { .. }
                | Notification::FinishedFailed { .. }
                | Notification::Skipped { .. }
        )
    }

    /// A compact one-line rendering, e.g. `failed G.b`.
    pub fn brief(&self) -> String {
        match self {
            Notification::DynamicallyRegistered { node } => format!("registered {node}"),
            Notification::Started { node } => format!("started {node}"),
            Notification::FinishedSuccessful { node } => format!("successful {node}"),
            Notification::FinishedFailed { node, .. } => format!("failed {node}"),
            Notification::Skipped { node, reason } => format!("skipped {node} ({reason})"),
        }
    }
}

/// The identity of a node, as captured in a [`Notification`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// The node's unique identifier.
    pub unique_id: UniqueId,

    /// The node's description, or `None` for the process-wide root.
    pub description: Option<Description>,
}

impl NodeRef {
    fn new(node: &ReportNode) -> Self {
        Self {
            unique_id: node.unique_id().clone(),
            description: node.description().cloned(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{description}"),
            None => f.write_str("<engine>"),
        }
    }
}

/// A consumer that keeps every notification in memory, in the order received.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingConsumer {
    /// Creates a new, empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the notifications received so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// [`Notification::brief`] for every notification received so far.
    pub fn briefs(&self) -> Vec<String> {
        self.lock().iter().map(Notification::brief).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        // A panic while pushing can't leave the vector in an inconsistent state.
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, notification: Notification) -> Result<(), ConsumerError> {
        self.lock().push(notification);
        Ok(())
    }
}

impl ReportingConsumer for RecordingConsumer {
    fn dynamically_registered(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        self.push(Notification::DynamicallyRegistered {
            node: NodeRef::new(node),
        })
    }

    fn started(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        self.push(Notification::Started {
            node: NodeRef::new(node),
        })
    }

    fn finished_successful(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        self.push(Notification::FinishedSuccessful {
            node: NodeRef::new(node),
        })
    }

    fn finished_failed(
        &self,
        node: &ReportNode,
        failure: &FailureInfo,
    ) -> Result<(), ConsumerError> {
        self.push(Notification::FinishedFailed {
            node: NodeRef::new(node),
            failure: failure.clone(),
        })
    }

    fn skipped(&self, node: &ReportNode, reason: &str) -> Result<(), ConsumerError> {
        self.push(Notification::Skipped {
            node: NodeRef::new(node),
            reason: reason.to_owned(),
        })
    }
}
