// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A consumer that builds a JUnit XML report.

use super::ReportingConsumer;
use crate::{
    description::{Description, TestType},
    errors::{ConsumerError, JunitWriteError},
    outcome::FailureInfo,
    registry::{NodeKind, ReportNode},
};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::{
    fs::File,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::info;

/// Collects finished leaves into one `<testsuite>` per top-level group.
///
/// If an output path is set, the report is written out when the process-wide root finishes.
#[derive(Debug)]
pub struct JunitConsumer {
    report_name: String,
    path: Option<Utf8PathBuf>,
    suites: Mutex<DebugIgnore<IndexMap<Description, TestSuite>>>,
}

impl JunitConsumer {
    /// Creates a new consumer.
    pub fn new(report_name: impl Into<String>, path: Option<Utf8PathBuf>) -> Self {
        Self {
            report_name: report_name.into(),
            path,
            suites: Mutex::new(DebugIgnore(IndexMap::new())),
        }
    }

    /// Builds a report from everything received so far.
    pub fn report(&self) -> Report {
        let suites = self.lock();
        let mut report = Report::new(self.report_name.as_str());
        report.add_test_suites(suites.values().cloned());
        report
    }

    /// Writes the current report to `path`, creating parent directories as needed.
    pub fn write_to(&self, path: &Utf8Path) -> Result<(), JunitWriteError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|error| JunitWriteError::Fs {
                file: dir.to_owned(),
                error,
            })?;
        }
        let f = File::create(path).map_err(|error| JunitWriteError::Fs {
            file: path.to_owned(),
            error,
        })?;
        self.report()
            .serialize(f)
            .map_err(|error| JunitWriteError::Serialize {
                file: path.to_owned(),
                error,
            })?;
        info!("wrote JUnit report to {path}");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, DebugIgnore<IndexMap<Description, TestSuite>>> {
        self.suites.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_test_case(&self, node: &ReportNode, status: TestCaseStatus) {
        // Only leaves become test cases. Containers and groups are represented by the suite.
        if node.kind() != NodeKind::Test(TestType::Leaf) {
            return;
        }
        let Some(description) = node.description() else {
            return;
        };
        let group = description.top_level();
        let mut suites = self.lock();
        let suite = suites
            .entry(group.clone())
            .or_insert_with(|| TestSuite::new(group.to_string()));
        let mut test_case = TestCase::new(description.path_in_group(), status);
        test_case.set_classname(group.to_string());
        suite.add_test_case(test_case);
    }
}

impl ReportingConsumer for JunitConsumer {
    fn dynamically_registered(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        // Groups with no finished leaves still get an (empty) suite.
        if node.kind() == NodeKind::Group
            && let Some(description) = node.description()
        {
            self.lock()
                .entry(description.clone())
                .or_insert_with(|| TestSuite::new(node.display_name()));
        }
        Ok(())
    }

    fn finished_successful(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        if node.kind() == NodeKind::Engine
            && let Some(path) = &self.path
        {
            self.write_to(path).map_err(|error| {
                ConsumerError::with_source("failed to write JUnit report", error)
            })?;
        }
        self.add_test_case(node, TestCaseStatus::success());
        Ok(())
    }

    fn finished_failed(
        &self,
        node: &ReportNode,
        failure: &FailureInfo,
    ) -> Result<(), ConsumerError> {
        match node.kind() {
            NodeKind::Engine => {
                if let Some(path) = &self.path {
                    self.write_to(path).map_err(|error| {
                        ConsumerError::with_source("failed to write JUnit report", error)
                    })?;
                }
            }
            NodeKind::Group => {
                if let Some(description) = node.description()
                    && let Some(suite) = self.lock().get_mut(description)
                {
                    suite.add_property(("terminating-error", failure.message.as_str()));
                }
            }
            NodeKind::Test(_) => {
                let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
                status.set_message(failure.message.as_str());
                if let Some(stack_trace) = &failure.stack_trace {
                    status.set_description(stack_trace.as_str());
                }
                self.add_test_case(node, status);
            }
        }
        Ok(())
    }

    fn skipped(&self, node: &ReportNode, reason: &str) -> Result<(), ConsumerError> {
        let mut status = TestCaseStatus::skipped();
        status.set_message(reason);
        self.add_test_case(node, status);
        Ok(())
    }
}
