// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core functionality for specbridge.
//!
//! specbridge sits between an executor that runs nested specifications and a consumer that
//! expects a strict, tree-shaped stream of notifications. The executor reports facts as they
//! happen (nodes discovered, invocations started and completed, groups prepared and finished),
//! in any order and from any number of threads. The
//! [`NotificationOrchestrator`](orchestrator::NotificationOrchestrator) turns those facts into
//! notifications that:
//!
//! * register every node before it is referenced, parents first;
//! * start every node at most once;
//! * finish children before their parents; and
//! * resolve each node's final status from every outcome recorded in its subtree, with the
//!   priority error > failure > success > ignored.
//!
//! Consumers implement [`ReportingConsumer`](consumer::ReportingConsumer). A recording consumer
//! and a JUnit consumer are included.

#![warn(missing_docs)]

pub mod config;
pub mod consumer;
pub mod description;
pub mod errors;
pub mod events;
pub mod orchestrator;
pub mod outcome;
pub mod registry;
#[cfg(test)]
mod test_helpers;
