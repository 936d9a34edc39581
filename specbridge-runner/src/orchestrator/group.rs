// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-group state, and the completion sweep.

use super::RunStats;
use crate::{
    config::StartedIgnoredPolicy,
    consumer::Notifier,
    description::{Description, TestType},
    errors::ProtocolError,
    outcome::{FailureInfo, InvocationOutcome, OutcomeStore},
    registry::{DescriptorRegistry, GroupMetadata, NodeIndex, ReportNode},
};
use indexmap::IndexMap;
use std::{cmp::Reverse, collections::HashSet};
use tracing::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum GroupPhase {
    Running,
    Completing,
    Done,
    // The engine finished before the group completed.
    Abandoned,
}

/// Everything known about one top-level group while it runs.
///
/// Dropped once the group completes, so nothing leaks into the next group with the same name.
#[derive(Debug)]
pub(super) struct GroupState {
    group: Description,
    phase: GroupPhase,
    registry: DescriptorRegistry,
    // Insertion order is discovery order, which breaks ties between siblings in the sweep.
    discovered: IndexMap<Description, TestType>,
    outcomes: OutcomeStore,
    started: HashSet<Description>,
}

/// What a node's completion notification will be.
#[derive(Clone, Debug)]
enum Completion {
    Successful,
    Failed(FailureInfo),
    Skipped(String),
}

impl GroupState {
    /// Creates the state for a newly prepared group, registering and starting its node.
    pub(super) fn prepare(
        root: &ReportNode,
        group: Description,
        metadata: &GroupMetadata,
        notifier: &Notifier<'_>,
    ) -> Self {
        let registry = DescriptorRegistry::for_group(root, group.clone(), metadata, notifier);
        notifier.started(registry.node(registry.group_index()));

        let mut started = HashSet::new();
        started.insert(group.clone());
        Self {
            group,
            phase: GroupPhase::Running,
            registry,
            discovered: IndexMap::new(),
            outcomes: OutcomeStore::new(),
            started,
        }
    }

    pub(super) fn ensure_running(&self) -> Result<(), ProtocolError> {
        match self.phase {
            GroupPhase::Running => Ok(()),
            GroupPhase::Completing | GroupPhase::Done => Err(ProtocolError::GroupNotPrepared {
                group: self.group.clone(),
            }),
            GroupPhase::Abandoned => Err(ProtocolError::EngineNotRunning),
        }
    }

    /// Stops accepting events for this group. Returns true if it was still running.
    pub(super) fn abandon(&mut self) -> bool {
        let was_running = self.phase == GroupPhase::Running;
        if was_running {
            self.phase = GroupPhase::Abandoned;
        }
        was_running
    }

    /// Records that a node exists. Its parent must be the group or a discovered container.
    pub(super) fn discover(
        &mut self,
        description: Description,
        test_type: TestType,
    ) -> Result<(), ProtocolError> {
        // The group node is completed by the sweep itself.
        if description == self.group || self.discovered.contains_key(&description) {
            return Ok(());
        }
        self.check_parent(&description)?;
        self.discovered.insert(description, test_type);
        Ok(())
    }

    fn check_parent(&self, description: &Description) -> Result<(), ProtocolError> {
        let parent = description
            .parent()
            .ok_or_else(|| ProtocolError::NotInGroup {
                description: description.clone(),
            })?;
        if parent == self.group {
            return Ok(());
        }
        match self.discovered.get(&parent) {
            Some(TestType::Container) => Ok(()),
            Some(TestType::Leaf) => Err(ProtocolError::ParentIsLeaf {
                description: description.clone(),
                parent,
            }),
            None => Err(ProtocolError::ParentNotRegistered {
                description: description.clone(),
                parent,
            }),
        }
    }

    /// Starts a node unless it was already started. Returns true if a start was emitted.
    pub(super) fn start(
        &mut self,
        description: &Description,
        test_type: TestType,
        notifier: &Notifier<'_>,
    ) -> Result<bool, ProtocolError> {
        if self.started.contains(description) {
            return Ok(false);
        }
        // The discovered type wins, so the registered node agrees with what the sweep expects.
        let test_type = match self.discovered.get(description) {
            Some(&discovered) => discovered,
            None => {
                self.check_parent(description)?;
                test_type
            }
        };
        let index = self.registry.get_or_create(description, test_type, notifier)?;
        if !self.discovered.contains_key(description) {
            debug!(%description, "node started without being discovered, discovering it now");
            self.discovered.insert(description.clone(), test_type);
        }
        self.started.insert(description.clone());
        notifier.started(self.registry.node(index));
        Ok(true)
    }

    pub(super) fn record(
        &mut self,
        description: Description,
        outcome: InvocationOutcome,
    ) -> Result<(), ProtocolError> {
        if !self.discovered.contains_key(&description) {
            return Err(ProtocolError::UndiscoveredCompletion { description });
        }
        self.outcomes.record(description, outcome);
        Ok(())
    }

    /// Completes every discovered node, deepest first, and then the group itself.
    ///
    /// All outcomes are resolved before anything is emitted: if any discovered node has no
    /// outcome in its subtree, nothing is reported and an error is returned.
    pub(super) fn complete(
        &mut self,
        terminating_error: Option<&FailureInfo>,
        policy: StartedIgnoredPolicy,
        notifier: &Notifier<'_>,
    ) -> Result<RunStats, ProtocolError> {
        self.phase = GroupPhase::Completing;
        let result = self.sweep(terminating_error, policy, notifier);
        self.phase = GroupPhase::Done;
        result
    }

    fn sweep(
        &mut self,
        terminating_error: Option<&FailureInfo>,
        policy: StartedIgnoredPolicy,
        notifier: &Notifier<'_>,
    ) -> Result<RunStats, ProtocolError> {
        let mut plan = Vec::with_capacity(self.discovered.len());
        for (description, &test_type) in &self.discovered {
            let completion = self.completion_for(description, test_type, policy)?;
            plan.push((description.clone(), test_type, completion));
        }

        // Register missing nodes parents-first. Nodes that will finish (rather than be skipped)
        // must also have started before any of their children finish.
        plan.sort_by_key(|(description, _, _)| description.depth());
        let mut indexes = Vec::with_capacity(plan.len());
        for (description, test_type, completion) in &plan {
            let index = self.registry.get_or_create(description, *test_type, notifier)?;
            let finishes = !matches!(completion, Completion::Skipped(_));
            if finishes && self.started.insert(description.clone()) {
                debug!(%description, "node finished without starting, starting it now");
                notifier.started(self.registry.node(index));
            }
            indexes.push(index);
        }

        // Children complete before parents. The sort is stable, so siblings keep discovery
        // order.
        let mut order: Vec<usize> = (0..plan.len()).collect();
        order.sort_by_key(|&i| Reverse(plan[i].0.depth()));

        let mut stats = RunStats::default();
        for i in order {
            let (_, test_type, completion) = &plan[i];
            self.emit(indexes[i], completion, notifier);
            if *test_type == TestType::Leaf {
                match completion {
                    Completion::Successful => stats.passed += 1,
                    Completion::Failed(_) => stats.failed += 1,
                    Completion::Skipped(_) => stats.skipped += 1,
                }
            }
        }

        let group_completion = match terminating_error {
            Some(error) => Completion::Failed(error.clone()),
            None => match self.outcomes.resolve(&self.group) {
                Some(recorded) => match &recorded.outcome {
                    InvocationOutcome::Success => Completion::Successful,
                    InvocationOutcome::Failure { failure }
                    | InvocationOutcome::Error { failure } => Completion::Failed(failure.clone()),
                    // The group has already started, so it can't be skipped.
                    InvocationOutcome::Ignored { reason } => {
                        ignored_after_start(reason.as_deref(), policy)
                    }
                },
                None => Completion::Successful,
            },
        };
        self.emit(self.registry.group_index(), &group_completion, notifier);

        stats.groups_finished = 1;
        if matches!(group_completion, Completion::Failed(_)) {
            stats.groups_failed = 1;
        }
        Ok(stats)
    }

    fn completion_for(
        &self,
        description: &Description,
        test_type: TestType,
        policy: StartedIgnoredPolicy,
    ) -> Result<Completion, ProtocolError> {
        let recorded =
            self.outcomes
                .resolve(description)
                .ok_or_else(|| ProtocolError::UnresolvedOutcome {
                    description: description.clone(),
                    test_type,
                })?;
        let completion = match &recorded.outcome {
            InvocationOutcome::Success => Completion::Successful,
            InvocationOutcome::Failure { failure } | InvocationOutcome::Error { failure } => {
                Completion::Failed(failure.clone())
            }
            InvocationOutcome::Ignored { reason } => {
                if self.started.contains(description) {
                    ignored_after_start(reason.as_deref(), policy)
                } else {
                    Completion::Skipped(reason.as_deref().unwrap_or(IGNORED).to_owned())
                }
            }
        };
        Ok(completion)
    }

    fn emit(&self, index: NodeIndex, completion: &Completion, notifier: &Notifier<'_>) {
        let node = self.registry.node(index);
        match completion {
            Completion::Successful => notifier.finished_successful(node),
            Completion::Failed(failure) => notifier.finished_failed(node, failure),
            Completion::Skipped(reason) => notifier.skipped(node, reason),
        }
    }
}

const IGNORED: &str = "ignored";

/// A node that already started can only finish, so an ignored outcome maps through `policy`.
fn ignored_after_start(reason: Option<&str>, policy: StartedIgnoredPolicy) -> Completion {
    match policy {
        StartedIgnoredPolicy::Successful => Completion::Successful,
        StartedIgnoredPolicy::Failed => Completion::Failed(FailureInfo::new(format!(
            "skipped after starting: {}",
            reason.unwrap_or(IGNORED)
        ))),
    }
}
