// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invocation outcomes, and resolution of one outcome per node.
//!
//! Every finished invocation is appended to an [`OutcomeStore`]. When the owning group completes,
//! [`OutcomeStore::resolve`] picks one outcome per node from the node's whole subtree, so that a
//! failure anywhere below a container makes the container fail too.

use crate::description::Description;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of a single finished invocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvocationStatus {
    /// The invocation passed.
    Success,

    /// An assertion in the invocation failed.
    Failure,

    /// The invocation errored out before it could pass or fail.
    Error,

    /// The invocation was skipped.
    Ignored,
}

impl InvocationStatus {
    /// Resolution priority: higher wins.
    pub fn priority(self) -> u8 {
        match self {
            InvocationStatus::Error => 3,
            InvocationStatus::Failure => 2,
            InvocationStatus::Success => 1,
            InvocationStatus::Ignored => 0,
        }
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvocationStatus::Success => "success",
            InvocationStatus::Failure => "failure",
            InvocationStatus::Error => "error",
            InvocationStatus::Ignored => "ignored",
        };
        f.write_str(s)
    }
}

/// An error payload attached to a failed invocation, or to a terminating error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FailureInfo {
    /// A one-line description of the failure.
    pub message: String,

    /// The stack trace or other extended detail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl FailureInfo {
    /// Creates a new `FailureInfo` with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Sets the stack trace.
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The result of one finished invocation, as computed upstream.
///
/// The detail is folded into the variant: failures carry a [`FailureInfo`], skips carry a reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum InvocationOutcome {
    /// The invocation passed.
    Success,

    /// An assertion failed.
    Failure {
        /// What failed.
        failure: FailureInfo,
    },

    /// The invocation errored.
    Error {
        /// What went wrong.
        failure: FailureInfo,
    },

    /// The invocation was skipped.
    Ignored {
        /// Why it was skipped.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl InvocationOutcome {
    /// Creates a failure outcome.
    pub fn failure(message: impl Into<String>) -> Self {
        InvocationOutcome::Failure {
            failure: FailureInfo::new(message),
        }
    }

    /// Creates an error outcome.
    pub fn error(message: impl Into<String>) -> Self {
        InvocationOutcome::Error {
            failure: FailureInfo::new(message),
        }
    }

    /// Creates an ignored outcome with a reason.
    pub fn ignored(reason: impl Into<String>) -> Self {
        InvocationOutcome::Ignored {
            reason: Some(reason.into()),
        }
    }

    /// The status of this outcome.
    pub fn status(&self) -> InvocationStatus {
        match self {
            InvocationOutcome::Success => InvocationStatus::Success,
            InvocationOutcome::Failure { .. } => InvocationStatus::Failure,
            InvocationOutcome::Error { .. } => InvocationStatus::Error,
            InvocationOutcome::Ignored { .. } => InvocationStatus::Ignored,
        }
    }
}

/// An outcome recorded against a description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedOutcome {
    /// The node that was invoked.
    pub description: Description,

    /// The outcome of that invocation.
    pub outcome: InvocationOutcome,
}

/// An append-only multiset of outcomes for one top-level group.
#[derive(Clone, Debug, Default)]
pub struct OutcomeStore {
    outcomes: Vec<RecordedOutcome>,
}

impl OutcomeStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one invocation.
    pub fn record(&mut self, description: Description, outcome: InvocationOutcome) {
        self.outcomes.push(RecordedOutcome {
            description,
            outcome,
        });
    }

    /// All outcomes recorded for exactly this description, in recording order.
    pub fn outcomes_for<'a>(
        &'a self,
        description: &'a Description,
    ) -> impl Iterator<Item = &'a InvocationOutcome> + 'a {
        self.outcomes
            .iter()
            .filter(move |recorded| &recorded.description == description)
            .map(|recorded| &recorded.outcome)
    }

    /// Resolves one outcome for `description` from its whole subtree.
    ///
    /// Candidates are outcomes recorded for `description` or any of its descendants. The
    /// candidate with the highest [`InvocationStatus::priority`] wins; among equals, the
    /// earliest recorded wins. Returns `None` if the subtree has no outcomes at all.
    pub fn resolve(&self, description: &Description) -> Option<&RecordedOutcome> {
        let mut best: Option<&RecordedOutcome> = None;
        for recorded in &self.outcomes {
            if !description.contains(&recorded.description) {
                continue;
            }
            let priority = recorded.outcome.status().priority();
            match best {
                Some(current) if current.outcome.status().priority() >= priority => {}
                _ => best = Some(recorded),
            }
        }
        best
    }
}
