// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::assert_well_ordered;
use camino_tempfile::Utf8TempDir;
use indoc::indoc;
use pretty_assertions::assert_eq;
use specbridge_runner::{
    config::BridgeConfig,
    consumer::{FanOut, JunitConsumer, RecordingConsumer},
    errors::{ProtocolError, ReplayError},
    events::replay,
    orchestrator::NotificationOrchestrator,
};
use std::sync::Arc;

// A container `Math.Division` whose first leaf fails on the first attempt and passes on a retry,
// a leaf ignored before it started, and a group that never runs.
static EVENT_LOG: &str = indoc! {r#"
    {"event":"engine-started","groups":[["Math"],["Slow"]]}
    {"event":"group-ignored","group":["Slow"],"reason":"tagged slow"}
    {"event":"group-prepared","group":["Math"],"metadata":{"display-name":"Math specs","source":{"kind":"class","name":"com.example.MathSpec"}}}
    {"event":"discovered","description":["Math","Division"],"test-type":"container"}
    {"event":"invocation-started","description":["Math","Division"],"test-type":"container"}
    {"event":"discovered","description":["Math","Division","by zero"],"test-type":"leaf"}
    {"event":"invocation-started","description":["Math","Division","by zero"],"test-type":"leaf"}
    {"event":"invocation-completed","description":["Math","Division","by zero"],"outcome":{"status":"failure","failure":{"message":"expected error","stack-trace":"at MathSpec.kt:12"}}}
    {"event":"invocation-started","description":["Math","Division","by zero"],"test-type":"leaf"}
    {"event":"invocation-completed","description":["Math","Division","by zero"],"outcome":{"status":"success"}}
    {"event":"discovered","description":["Math","Division","by one"],"test-type":"leaf"}
    {"event":"invocation-completed","description":["Math","Division","by one"],"outcome":{"status":"ignored","reason":"pending"}}
    {"event":"invocation-completed","description":["Math","Division"],"outcome":{"status":"success"}}

    {"event":"group-completed","group":["Math"]}
    {"event":"engine-finished"}
"#};

#[test]
fn replay_event_log() {
    let dir = Utf8TempDir::new().unwrap();
    let junit_path = dir.path().join("target/junit.xml");

    let recorder = Arc::new(RecordingConsumer::new());
    let junit = Arc::new(JunitConsumer::new("specbridge-run", Some(junit_path.clone())));
    let mut consumer = FanOut::new();
    consumer.push(recorder.clone()).push(junit.clone());

    let orchestrator = NotificationOrchestrator::new(consumer, &BridgeConfig::default());
    let stats = replay(EVENT_LOG.as_bytes(), &orchestrator)
        .unwrap()
        .expect("engine finished");

    assert_eq!(
        recorder.briefs(),
        [
            "started <engine>",
            "registered Slow",
            "skipped Slow (tagged slow)",
            "registered Math",
            "started Math",
            "registered Math.Division",
            "started Math.Division",
            "registered Math.Division.by zero",
            "started Math.Division.by zero",
            "registered Math.Division.by one",
            "failed Math.Division.by zero",
            "skipped Math.Division.by one (pending)",
            "failed Math.Division",
            "failed Math",
            "successful <engine>",
        ]
    );
    assert_well_ordered(&recorder.notifications());

    assert_eq!(stats.groups_expected, 2);
    assert_eq!(stats.groups_finished, 1);
    assert_eq!(stats.groups_failed, 1);
    assert_eq!(stats.groups_skipped, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.passed, 0);

    let xml = std::fs::read_to_string(&junit_path).unwrap();
    assert!(xml.contains(r#"name="Division.by zero""#), "{xml}");
    assert!(xml.contains("expected error"), "{xml}");
    assert!(xml.contains("at MathSpec.kt:12"), "{xml}");
    assert!(xml.contains("pending"), "{xml}");
    assert!(xml.contains(r#"name="Slow""#), "{xml}");
}

#[test]
fn replay_stops_at_unresolved_outcome() {
    let log = indoc! {r#"
        {"event":"engine-started","groups":[["G"]]}
        {"event":"group-prepared","group":["G"]}
        {"event":"discovered","description":["G","a"],"test-type":"leaf"}
        {"event":"discovered","description":["G","b"],"test-type":"leaf"}
        {"event":"invocation-completed","description":["G","a"],"outcome":{"status":"success"}}
        {"event":"group-completed","group":["G"]}
        {"event":"engine-finished"}
    "#};
    let orchestrator =
        NotificationOrchestrator::new(RecordingConsumer::new(), &BridgeConfig::default());
    let error = replay(log.as_bytes(), &orchestrator).unwrap_err();
    assert_eq!(
        error.protocol_error(),
        Some(&ProtocolError::UnresolvedOutcome {
            description: crate::fixtures::desc("G.b"),
            test_type: specbridge_runner::description::TestType::Leaf,
        })
    );

    // Nothing about the group's nodes is reported once resolution fails.
    assert_eq!(
        orchestrator.consumer().briefs(),
        ["started <engine>", "registered G", "started G"]
    );
}

#[test]
fn replay_with_loaded_config() {
    let dir = Utf8TempDir::new().unwrap();
    let config_dir = dir.path().join(".config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("specbridge.toml"),
        indoc! {r#"
            [engine]
            id = "kotest"

            [reporting]
            started-ignored = "failed"
        "#},
    )
    .unwrap();
    let config = BridgeConfig::from_sources(dir.path(), None).unwrap();

    let log = indoc! {r#"
        {"event":"engine-started","groups":[["G"]]}
        {"event":"group-prepared","group":["G"]}
        {"event":"invocation-started","description":["G","a"],"test-type":"leaf"}
        {"event":"invocation-completed","description":["G","a"],"outcome":{"status":"ignored","reason":"assumption failed"}}
        {"event":"group-completed","group":["G"]}
        {"event":"engine-finished"}
    "#};
    let orchestrator = NotificationOrchestrator::new(RecordingConsumer::new(), &config);
    let stats = replay(log.as_bytes(), &orchestrator).unwrap().unwrap();

    assert_eq!(orchestrator.root().unique_id().to_string(), "[engine:kotest]");
    assert_eq!(
        orchestrator.consumer().briefs(),
        [
            "started <engine>",
            "registered G",
            "started G",
            "registered G.a",
            "started G.a",
            "failed G.a",
            "failed G",
            "successful <engine>",
        ]
    );
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.groups_failed, 1);
}

#[test]
fn replay_rejects_events_after_engine_finished() {
    let log = indoc! {r#"
        {"event":"engine-started","groups":[["G"]]}
        {"event":"group-prepared","group":["G"]}
        {"event":"discovered","description":["G","a"],"test-type":"leaf"}
        {"event":"engine-finished"}
        {"event":"invocation-started","description":["G","a"],"test-type":"leaf"}
        {"event":"group-completed","group":["G"]}
    "#};
    let orchestrator =
        NotificationOrchestrator::new(RecordingConsumer::new(), &BridgeConfig::default());
    let error = replay(log.as_bytes(), &orchestrator).unwrap_err();
    assert!(
        matches!(
            error,
            ReplayError::Protocol {
                line: 5,
                error: ProtocolError::EngineNotRunning,
            }
        ),
        "{error:?}"
    );

    let notifications = orchestrator.consumer().notifications();
    assert_eq!(
        orchestrator.consumer().briefs(),
        ["started <engine>", "registered G", "started G", "successful <engine>"]
    );
    assert_well_ordered(&notifications);
}
