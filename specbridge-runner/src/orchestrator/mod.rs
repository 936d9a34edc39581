// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns an unordered stream of execution events into ordered notifications.
//!
//! The main structure in this module is [`NotificationOrchestrator`].

mod group;
mod imp;
mod stats;

pub use imp::*;
pub use stats::*;
