// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests driving the orchestrator the way an executor would.

mod concurrency;
mod fixtures;
mod replay;
