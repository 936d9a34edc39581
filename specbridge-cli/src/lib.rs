// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line driver for specbridge.
//!
//! `specbridge replay <EVENT_LOG>` feeds a recorded JSON-lines event log through the
//! notification orchestrator, prints the ordered notifications, and optionally writes a JUnit
//! report.

#![warn(missing_docs)]

mod dispatch;
mod display;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
