// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use specbridge_runner::{
    config::BridgeConfig,
    consumer::{Notification, RecordingConsumer},
    description::Description,
    orchestrator::NotificationOrchestrator,
};
use std::collections::HashMap;

pub(crate) fn desc(path: &str) -> Description {
    Description::from_segments(path.split('.')).expect("valid description")
}

pub(crate) fn orchestrator() -> NotificationOrchestrator<RecordingConsumer> {
    NotificationOrchestrator::new(RecordingConsumer::new(), &BridgeConfig::default())
}

/// Checks the ordering guarantees that hold for any notification sequence:
///
/// * every node is registered before any other notification about it;
/// * every node starts at most once, and completes at most once;
/// * a started node completes after it starts, and is never skipped;
/// * a node is only registered once its parent is; and
/// * a node completes before its parent.
pub(crate) fn assert_well_ordered(notifications: &[Notification]) {
    #[derive(Default)]
    struct Seen {
        registered: Option<usize>,
        started: Option<usize>,
        completed: Option<usize>,
    }

    let mut seen: HashMap<Description, Seen> = HashMap::new();
    for (i, notification) in notifications.iter().enumerate() {
        // The root isn't part of any group.
        let Some(description) = notification.node().description.clone() else {
            continue;
        };
        let entry = seen.entry(description.clone()).or_default();
        match notification {
            Notification::DynamicallyRegistered { .. } => {
                assert!(entry.registered.is_none(), "{description} registered twice");
                entry.registered = Some(i);
                if let Some(parent) = description.parent() {
                    let parent_registered = seen.get(&parent).and_then(|s| s.registered);
                    assert!(
                        parent_registered.is_some(),
                        "{description} registered before its parent"
                    );
                }
            }
            Notification::Started { .. } => {
                assert!(entry.registered.is_some(), "{description} started before registration");
                assert!(entry.started.is_none(), "{description} started twice");
                entry.started = Some(i);
            }
            Notification::Skipped { .. } => {
                assert!(entry.registered.is_some(), "{description} skipped before registration");
                assert!(entry.started.is_none(), "{description} skipped after starting");
                assert!(entry.completed.is_none(), "{description} completed twice");
                entry.completed = Some(i);
            }
            Notification::FinishedSuccessful { .. } | Notification::FinishedFailed { .. } => {
                assert!(entry.started.is_some(), "{description} finished without starting");
                assert!(entry.completed.is_none(), "{description} completed twice");
                entry.completed = Some(i);
            }
        }
    }

    for (description, entry) in &seen {
        let (Some(parent), Some(completed)) = (description.parent(), entry.completed) else {
            continue;
        };
        if let Some(parent_completed) = seen.get(&parent).and_then(|s| s.completed) {
            assert!(
                completed < parent_completed,
                "{description} completed after its parent"
            );
        }
    }
}
