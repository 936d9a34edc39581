// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{assert_well_ordered, desc, orchestrator};
use specbridge_runner::{
    consumer::Notification,
    description::TestType,
    outcome::InvocationOutcome,
    registry::GroupMetadata,
};
use std::thread;

const GROUPS: usize = 8;
const CONTAINERS: usize = 3;
const LEAVES: usize = 4;
const THREADS_PER_GROUP: usize = 4;

#[test]
fn concurrent_groups_stay_well_ordered() {
    let o = orchestrator();
    let groups: Vec<_> = (0..GROUPS).map(|g| desc(&format!("G{g}"))).collect();
    o.engine_started(&groups).unwrap();

    thread::scope(|scope| {
        for group in &groups {
            let o = &o;
            scope.spawn(move || {
                let meta = GroupMetadata::default();
                o.prepare_group(group, &meta).unwrap();

                let containers: Vec<_> = (0..CONTAINERS)
                    .map(|c| group.child(format!("C{c}")))
                    .collect();
                for container in &containers {
                    o.discover(container, TestType::Container).unwrap();
                    o.invocation_started(container, TestType::Container).unwrap();
                }

                // Every thread runs every leaf, so each leaf is started and completed several
                // times, from several threads at once.
                thread::scope(|inner| {
                    for t in 0..THREADS_PER_GROUP {
                        let containers = &containers;
                        inner.spawn(move || {
                            for container in containers {
                                for l in 0..LEAVES {
                                    let leaf = container.child(format!("t{l}"));
                                    o.discover(&leaf, TestType::Leaf).unwrap();
                                    o.invocation_started(&leaf, TestType::Leaf).unwrap();
                                    let outcome = if l == 0 && t == 1 {
                                        InvocationOutcome::failure("flaky")
                                    } else {
                                        InvocationOutcome::Success
                                    };
                                    o.invocation_completed(&leaf, outcome).unwrap();
                                }
                            }
                        });
                    }
                });

                o.complete_group(group, &meta, None).unwrap();
            });
        }
    });

    let stats = o.engine_finished(None).unwrap();
    let notifications = o.consumer().notifications();
    assert_well_ordered(&notifications);

    assert_eq!(stats.groups_expected, GROUPS);
    assert_eq!(stats.groups_finished, GROUPS);
    assert_eq!(stats.groups_failed, GROUPS);
    assert_eq!(stats.failed, GROUPS * CONTAINERS);
    assert_eq!(stats.passed, GROUPS * CONTAINERS * (LEAVES - 1));
    assert!(!stats.is_success());

    // One start per node: the root, each group, each container, each leaf.
    let starts = notifications
        .iter()
        .filter(|n| matches!(n, Notification::Started { .. }))
        .count();
    assert_eq!(starts, 1 + GROUPS * (1 + CONTAINERS * (1 + LEAVES)));

    assert!(matches!(
        notifications.last(),
        Some(Notification::FinishedSuccessful { node }) if node.description.is_none()
    ));
}

#[test]
fn concurrent_duplicate_starts_collapse() {
    let o = orchestrator();
    o.engine_started(&[desc("G")]).unwrap();
    let meta = GroupMetadata::default();
    o.prepare_group(&desc("G"), &meta).unwrap();
    o.discover(&desc("G.a"), TestType::Leaf).unwrap();

    thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                o.invocation_started(&desc("G.a"), TestType::Leaf).unwrap();
                o.invocation_completed(&desc("G.a"), InvocationOutcome::Success)
                    .unwrap();
            });
        }
    });
    o.complete_group(&desc("G"), &meta, None).unwrap();

    assert_eq!(
        o.consumer().briefs(),
        [
            "started <engine>",
            "registered G",
            "started G",
            "registered G.a",
            "started G.a",
            "successful G.a",
            "successful G",
        ]
    );
}
