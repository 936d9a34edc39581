// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{RunStats, group::GroupState};
use crate::{
    config::{BridgeConfig, StartedIgnoredPolicy},
    consumer::{Notifier, ReportingConsumer},
    description::{Description, TestType},
    errors::ProtocolError,
    outcome::{FailureInfo, InvocationOutcome},
    registry::{GroupMetadata, ReportNode},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, error, info, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum EnginePhase {
    NotStarted,
    Running,
    Finished,
}

#[derive(Debug)]
struct EngineState {
    phase: EnginePhase,
    stats: RunStats,
}

/// Relays lifecycle events from an executor to a [`ReportingConsumer`], in hierarchy order.
///
/// Starts are relayed as soon as they arrive, at most once per node. Completions are buffered
/// per top-level group and relayed when the group completes, children before parents, with one
/// outcome per node.
///
/// All methods take `&self` and may be called from many threads at once. Each top-level group
/// has its own lock, so groups running concurrently only contend briefly on the group table.
///
/// Locks are taken in the order: group table, group state, engine state.
pub struct NotificationOrchestrator<C> {
    consumer: C,
    root: ReportNode,
    started_ignored: StartedIgnoredPolicy,
    engine: Mutex<EngineState>,
    groups: Mutex<HashMap<Description, Arc<Mutex<GroupState>>>>,
}

impl<C: ReportingConsumer> NotificationOrchestrator<C> {
    /// Creates a new orchestrator that reports to `consumer`.
    pub fn new(consumer: C, config: &BridgeConfig) -> Self {
        Self {
            consumer,
            root: ReportNode::engine(
                config.engine.id.as_str(),
                config.engine.display_name.as_str(),
            ),
            started_ignored: config.reporting.started_ignored,
            engine: Mutex::new(EngineState {
                phase: EnginePhase::NotStarted,
                stats: RunStats::default(),
            }),
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// The consumer notifications are sent to.
    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    /// The process-wide root node.
    pub fn root(&self) -> &ReportNode {
        &self.root
    }

    /// The engine started; `groups` are the top-level groups expected to run.
    pub fn engine_started(&self, groups: &[Description]) -> Result<(), ProtocolError> {
        let mut engine = self.lock_engine();
        if engine.phase != EnginePhase::NotStarted {
            return Err(log_violation(ProtocolError::EngineAlreadyStarted));
        }
        engine.phase = EnginePhase::Running;
        engine.stats.groups_expected = groups.len();
        debug!(groups = groups.len(), "engine started");
        self.notifier().started(&self.root);
        Ok(())
    }

    /// The engine finished, with an optional error that terminated the whole run.
    ///
    /// Returns statistics for the run. Groups that were prepared but never completed are
    /// logged and left unreported, and any later events for them are rejected.
    pub fn engine_finished(&self, error: Option<&FailureInfo>) -> Result<RunStats, ProtocolError> {
        // Holding the table lock keeps new groups from being prepared until the phase changes.
        let groups = self.lock_groups();
        self.ensure_engine_running()?;
        for (group, state) in groups.iter() {
            // Waits for an in-progress sweep, so its notifications precede the root's.
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.abandon() {
                warn!(%group, "engine finished while group was still running");
            }
        }

        let mut engine = self.lock_engine();
        engine.phase = EnginePhase::Finished;
        let notifier = self.notifier();
        match error {
            Some(error) => notifier.finished_failed(&self.root, error),
            None => notifier.finished_successful(&self.root),
        }
        info!("run finished: {}", engine.stats);
        Ok(engine.stats)
    }

    /// A top-level group is about to run. Registers and starts its node.
    pub fn prepare_group(
        &self,
        group: &Description,
        metadata: &GroupMetadata,
    ) -> Result<(), ProtocolError> {
        ensure_top_level(group)?;

        // Hold the table lock across creation so two threads can't prepare the same group, and
        // the engine can't finish in between.
        let mut groups = self.lock_groups();
        self.ensure_engine_running()?;
        if groups.contains_key(group) {
            return Err(log_violation(ProtocolError::GroupAlreadyPrepared {
                group: group.clone(),
            }));
        }
        debug!(%group, "preparing group");
        let state = GroupState::prepare(&self.root, group.clone(), metadata, &self.notifier());
        groups.insert(group.clone(), Arc::new(Mutex::new(state)));
        Ok(())
    }

    /// A top-level group will not run at all. Reports it as skipped without starting it.
    pub fn ignore_group(
        &self,
        group: &Description,
        metadata: &GroupMetadata,
        reason: &str,
    ) -> Result<(), ProtocolError> {
        ensure_top_level(group)?;

        let groups = self.lock_groups();
        self.ensure_engine_running()?;
        if groups.contains_key(group) {
            return Err(log_violation(ProtocolError::GroupAlreadyPrepared {
                group: group.clone(),
            }));
        }
        debug!(%group, reason, "ignoring group");
        let node = ReportNode::group(&self.root, group.clone(), metadata);
        let notifier = self.notifier();
        notifier.dynamically_registered(&node);
        notifier.skipped(&node, reason);
        self.lock_engine().stats.groups_skipped += 1;
        Ok(())
    }

    /// A node is known to exist and may run. Has no immediate effect on the consumer.
    ///
    /// The parent must be the group itself or an already discovered container.
    pub fn discover(
        &self,
        description: &Description,
        test_type: TestType,
    ) -> Result<(), ProtocolError> {
        self.with_running_group(description, |state| {
            state.discover(description.clone(), test_type)
        })
    }

    /// One invocation of a node started. Only the first invocation is relayed.
    pub fn invocation_started(
        &self,
        description: &Description,
        test_type: TestType,
    ) -> Result<(), ProtocolError> {
        let notifier = self.notifier();
        self.with_running_group(description, |state| {
            if !state.start(description, test_type, &notifier)? {
                debug!(%description, "node already started, not relaying repeated start");
            }
            Ok(())
        })
    }

    /// One invocation of a node finished. Buffered until the group completes.
    pub fn invocation_completed(
        &self,
        description: &Description,
        outcome: InvocationOutcome,
    ) -> Result<(), ProtocolError> {
        debug!(%description, status = %outcome.status(), "invocation completed");
        self.with_running_group(description, |state| state.record(description.clone(), outcome))
    }

    /// A top-level group finished: relays completion for every node discovered in it, then for
    /// the group itself.
    ///
    /// The group's state is discarded afterwards, whether or not completion succeeded.
    pub fn complete_group(
        &self,
        group: &Description,
        metadata: &GroupMetadata,
        error: Option<&FailureInfo>,
    ) -> Result<(), ProtocolError> {
        ensure_top_level(group)?;
        self.ensure_engine_running()?;
        let state = self.group_state(group)?;
        let result = {
            let mut state = lock_state(&state, group)?;
            state.ensure_running().map_err(log_violation)?;
            let result = state.complete(error, self.started_ignored, &self.notifier());
            // Merged under the group lock, so the totals are final once the engine finishes.
            if let Ok(stats) = &result {
                self.lock_engine().stats.merge(stats);
            }
            result
        };
        {
            // Another run of the same group may have been prepared in the meantime.
            let mut groups = self.lock_groups();
            if groups
                .get(group)
                .is_some_and(|current| Arc::ptr_eq(current, &state))
            {
                groups.remove(group);
            }
        }

        let stats = result.map_err(log_violation)?;
        match &metadata.source {
            Some(source) => info!(%group, %source, "group finished: {stats}"),
            None => info!(%group, "group finished: {stats}"),
        }
        Ok(())
    }

    fn with_running_group<T>(
        &self,
        description: &Description,
        f: impl FnOnce(&mut GroupState) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        if description.is_top_level() {
            return Err(log_violation(ProtocolError::NotInGroup {
                description: description.clone(),
            }));
        }
        self.ensure_engine_running()?;
        let group = description.top_level();
        let state = self.group_state(&group)?;
        let mut state = lock_state(&state, &group)?;
        state.ensure_running().map_err(log_violation)?;
        f(&mut state).map_err(log_violation)
    }

    fn group_state(&self, group: &Description) -> Result<Arc<Mutex<GroupState>>, ProtocolError> {
        self.lock_groups().get(group).cloned().ok_or_else(|| {
            log_violation(ProtocolError::GroupNotPrepared {
                group: group.clone(),
            })
        })
    }

    fn ensure_engine_running(&self) -> Result<(), ProtocolError> {
        if self.lock_engine().phase == EnginePhase::Running {
            Ok(())
        } else {
            Err(log_violation(ProtocolError::EngineNotRunning))
        }
    }

    fn notifier(&self) -> Notifier<'_> {
        Notifier::new(&self.consumer)
    }

    fn lock_engine(&self) -> MutexGuard<'_, EngineState> {
        // Only plain counters and a phase are updated under this lock.
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_groups(&self) -> MutexGuard<'_, HashMap<Description, Arc<Mutex<GroupState>>>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_state<'a>(
    state: &'a Mutex<GroupState>,
    group: &Description,
) -> Result<MutexGuard<'a, GroupState>, ProtocolError> {
    state.lock().map_err(|_| {
        log_violation(ProtocolError::StatePoisoned {
            group: group.clone(),
        })
    })
}

fn ensure_top_level(description: &Description) -> Result<(), ProtocolError> {
    if description.is_top_level() {
        Ok(())
    } else {
        Err(log_violation(ProtocolError::NotTopLevel {
            description: description.clone(),
        }))
    }
}

fn log_violation(error: ProtocolError) -> ProtocolError {
    error!("reporting protocol violation: {error}");
    error
}
