// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outbound reporting API.
//!
//! A [`ReportingConsumer`] is told, in hierarchy order, when nodes are registered, start, finish
//! or are skipped. Consumers are shared between groups running on different threads, so every
//! method takes `&self`.

mod junit;
mod recording;

pub use junit::*;
pub use recording::*;

use crate::{
    errors::{ConsumerError, DisplayErrorChain},
    outcome::FailureInfo,
    registry::ReportNode,
};
use std::sync::Arc;
use tracing::warn;

/// Receives notifications about report nodes.
///
/// Every method defaults to doing nothing. Returning an error doesn't stop the run: the
/// orchestrator logs it and moves on to the next notification.
pub trait ReportingConsumer: Send + Sync {
    /// A node was created after the run started.
    fn dynamically_registered(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        let _ = node;
        Ok(())
    }

    /// A node started. Called at most once per node.
    fn started(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        let _ = node;
        Ok(())
    }

    /// A node finished successfully.
    fn finished_successful(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        let _ = node;
        Ok(())
    }

    /// A node finished with a failure.
    fn finished_failed(
        &self,
        node: &ReportNode,
        failure: &FailureInfo,
    ) -> Result<(), ConsumerError> {
        let _ = (node, failure);
        Ok(())
    }

    /// A node was skipped. Skipped nodes are never started.
    fn skipped(&self, node: &ReportNode, reason: &str) -> Result<(), ConsumerError> {
        let _ = (node, reason);
        Ok(())
    }
}

impl<T: ReportingConsumer + ?Sized> ReportingConsumer for Arc<T> {
    fn dynamically_registered(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        (**self).dynamically_registered(node)
    }

    fn started(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        (**self).started(node)
    }

    fn finished_successful(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        (**self).finished_successful(node)
    }

    fn finished_failed(
        &self,
        node: &ReportNode,
        failure: &FailureInfo,
    ) -> Result<(), ConsumerError> {
        (**self).finished_failed(node, failure)
    }

    fn skipped(&self, node: &ReportNode, reason: &str) -> Result<(), ConsumerError> {
        (**self).skipped(node, reason)
    }
}

/// Forwards every notification to several consumers in order.
///
/// All consumers see every notification even if an earlier one fails; the first error is
/// returned.
#[derive(Default)]
pub struct FanOut {
    consumers: Vec<Box<dyn ReportingConsumer>>,
}

impl FanOut {
    /// Creates an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a consumer.
    pub fn push(&mut self, consumer: impl ReportingConsumer + 'static) -> &mut Self {
        self.consumers.push(Box::new(consumer));
        self
    }

    fn for_each(
        &self,
        mut f: impl FnMut(&dyn ReportingConsumer) -> Result<(), ConsumerError>,
    ) -> Result<(), ConsumerError> {
        let mut first_error = None;
        for consumer in &self.consumers {
            if let Err(error) = f(consumer.as_ref())
                && first_error.is_none()
            {
                first_error = Some(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl ReportingConsumer for FanOut {
    fn dynamically_registered(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        self.for_each(|c| c.dynamically_registered(node))
    }

    fn started(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        self.for_each(|c| c.started(node))
    }

    fn finished_successful(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        self.for_each(|c| c.finished_successful(node))
    }

    fn finished_failed(
        &self,
        node: &ReportNode,
        failure: &FailureInfo,
    ) -> Result<(), ConsumerError> {
        self.for_each(|c| c.finished_failed(node, failure))
    }

    fn skipped(&self, node: &ReportNode, reason: &str) -> Result<(), ConsumerError> {
        self.for_each(|c| c.skipped(node, reason))
    }
}

/// Calls into a consumer, logging and swallowing its errors.
pub(crate) struct Notifier<'a> {
    consumer: &'a dyn ReportingConsumer,
}

impl<'a> Notifier<'a> {
    pub(crate) fn new(consumer: &'a dyn ReportingConsumer) -> Self {
        Self { consumer }
    }

    pub(crate) fn dynamically_registered(&self, node: &ReportNode) {
        log_failure("dynamically-registered", node, self.consumer.dynamically_registered(node));
    }

    pub(crate) fn started(&self, node: &ReportNode) {
        log_failure("started", node, self.consumer.started(node));
    }

    pub(crate) fn finished_successful(&self, node: &ReportNode) {
        log_failure("finished-successful", node, self.consumer.finished_successful(node));
    }

    pub(crate) fn finished_failed(&self, node: &ReportNode, failure: &FailureInfo) {
        log_failure(
            "finished-failed",
            node,
            self.consumer.finished_failed(node, failure),
        );
    }

    pub(crate) fn skipped(&self, node: &ReportNode, reason: &str) {
        log_failure("skipped", node, self.consumer.skipped(node, reason));
    }
}

fn log_failure(notification: &str, node: &ReportNode, result: Result<(), ConsumerError>) {
    if let Err(error) = result {
        warn!(
            unique_id = %node.unique_id(),
            "consumer failed to handle {notification} notification: {}",
            DisplayErrorChain::new(error),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::GroupMetadata;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing {
        calls: Arc<AtomicUsize>,
    }

    impl ReportingConsumer for Failing {
        fn started(&self, _node: &ReportNode) -> Result<(), ConsumerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ConsumerError::new("broken consumer"))
        }
    }

    #[test]
    fn fan_out_reaches_every_consumer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let recording = Arc::new(RecordingConsumer::new());
        let mut fan_out = FanOut::new();
        fan_out
            .push(Failing {
                calls: calls.clone(),
            })
            .push(recording.clone());

        let root = ReportNode::engine("specbridge", "Specbridge");
        let group = ReportNode::group(
            &root,
            crate::description::Description::group("G"),
            &GroupMetadata::default(),
        );
        let err = fan_out.started(&group).unwrap_err();
        assert_eq!(err.to_string(), "broken consumer");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(recording.briefs(), ["started G"]);

        // The notifier swallows the error.
        Notifier::new(&fan_out).started(&group);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(recording.briefs(), ["started G", "started G"]);
    }
}
