// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::Serialize;
use std::fmt;

/// Counts of what was reported during a run.
///
/// Test counts only include leaves; containers are summarized by their groups.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunStats {
    /// The number of groups announced when the engine started.
    pub groups_expected: usize,

    /// The number of groups that completed.
    pub groups_finished: usize,

    /// The number of completed groups reported as failed.
    pub groups_failed: usize,

    /// The number of groups skipped without running.
    pub groups_skipped: usize,

    /// Leaves reported as finished-successful.
    pub passed: usize,

    /// Leaves reported as finished-failed.
    pub failed: usize,

    /// Leaves reported as skipped.
    pub skipped: usize,
}

impl RunStats {
    /// Returns true if nothing failed.
    pub fn is_success(&self) -> bool {
        self.groups_failed == 0 && self.failed == 0
    }

    pub(super) fn merge(&mut self, other: &RunStats) {
        self.groups_expected += other.groups_expected;
        self.groups_finished += other.groups_finished;
        self.groups_failed += other.groups_failed;
        self.groups_skipped += other.groups_skipped;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} groups finished ({} failed, {} skipped); {} passed, {} failed, {} skipped",
            self.groups_finished,
            self.groups_failed,
            self.groups_skipped,
            self.passed,
            self.failed,
            self.skipped,
        )
    }
}
