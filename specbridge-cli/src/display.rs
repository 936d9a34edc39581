// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints notifications as they are relayed.

use clap::ValueEnum;
use owo_colors::{OwoColorize, Style, style};
use serde_json::json;
use specbridge_runner::{
    consumer::ReportingConsumer,
    errors::ConsumerError,
    outcome::FailureInfo,
    registry::{NodeKind, ReportNode},
};
use std::{
    io::{self, Write},
    sync::{Mutex, MutexGuard, PoisonError},
};
use swrite::{SWrite, swrite};

/// The format notifications are printed in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum MessageFormat {
    /// One human-readable line per notification.
    #[default]
    Human,

    /// One JSON object per line.
    Json,
}

#[derive(Debug, Default)]
pub(crate) struct DisplayStyles {
    pass: Style,
    fail: Style,
    skip: Style,
    start: Style,
    node: Style,
}

impl DisplayStyles {
    pub(crate) fn colorize(&mut self) {
        self.pass = style().green().bold();
        self.fail = style().red().bold();
        self.skip = style().yellow().bold();
        self.start = style().bold();
        self.node = style().bold();
    }
}

/// Writes each notification to a writer, usually stdout.
///
/// In human format, registrations and starts are only shown if `verbose` is set. The first
/// write error is kept so the caller can fail the run once replay is done.
pub(crate) struct DisplayConsumer<W> {
    format: MessageFormat,
    verbose: bool,
    styles: DisplayStyles,
    output: Mutex<DisplayOutput<W>>,
}

struct DisplayOutput<W> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write + Send> DisplayConsumer<W> {
    pub(crate) fn new(
        format: MessageFormat,
        verbose: bool,
        styles: DisplayStyles,
        writer: W,
    ) -> Self {
        Self {
            format,
            verbose,
            styles,
            output: Mutex::new(DisplayOutput {
                writer,
                error: None,
            }),
        }
    }

    /// Returns the first error hit while writing, if any.
    pub(crate) fn take_write_error(&self) -> Option<io::Error> {
        self.lock().error.take()
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.output
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
    }

    fn lock(&self) -> MutexGuard<'_, DisplayOutput<W>> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn human_line(
        &self,
        status: &str,
        style: Style,
        node: &ReportNode,
        detail: Option<&str>,
    ) -> String {
        let mut line = String::new();
        swrite!(line, "{:>12} ", status.style(style));
        match node.description() {
            Some(description) => swrite!(line, "{}", description.style(self.styles.node)),
            None => swrite!(line, "{}", node.display_name().style(self.styles.node)),
        }
        if let Some(detail) = detail {
            swrite!(line, ": {detail}");
        }
        line
    }

    fn emit(
        &self,
        kind: &str,
        node: &ReportNode,
        human: Option<(&str, Style, Option<&str>)>,
        extra: Option<(&str, serde_json::Value)>,
    ) -> Result<(), ConsumerError> {
        let line = match self.format {
            MessageFormat::Human => {
                let Some((status, style, detail)) = human else {
                    return Ok(());
                };
                self.human_line(status, style, node, detail)
            }
            MessageFormat::Json => {
                let mut value = json!({
                    "type": kind,
                    "unique-id": node.unique_id().to_string(),
                    "kind": node_kind(node.kind()),
                    "description": node.description().map(|d| d.to_string()),
                });
                if let Some((key, extra)) = extra {
                    value[key] = extra;
                }
                value.to_string()
            }
        };

        let mut output = self.lock();
        let result = writeln!(output.writer, "{line}").and_then(|()| output.writer.flush());
        if let Err(error) = result {
            let consumer_error =
                ConsumerError::new(format!("failed to write notification: {error}"));
            output.error.get_or_insert(error);
            return Err(consumer_error);
        }
        Ok(())
    }

    fn verbose_only<'a>(
        &self,
        status: &'a str,
        style: Style,
    ) -> Option<(&'a str, Style, Option<&'a str>)> {
        self.verbose.then_some((status, style, None))
    }
}

impl<W: Write + Send> ReportingConsumer for DisplayConsumer<W> {
    fn dynamically_registered(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        let human = self.verbose_only("REGISTERED", self.styles.start);
        self.emit("registered", node, human, None)
    }

    fn started(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        let human = self.verbose_only("START", self.styles.start);
        self.emit("started", node, human, None)
    }

    fn finished_successful(&self, node: &ReportNode) -> Result<(), ConsumerError> {
        self.emit("finished-successful", node, Some(("PASS", self.styles.pass, None)), None)
    }

    fn finished_failed(
        &self,
        node: &ReportNode,
        failure: &FailureInfo,
    ) -> Result<(), ConsumerError> {
        self.emit(
            "finished-failed",
            node,
            Some(("FAIL", self.styles.fail, Some(failure.message.as_str()))),
            Some(("failure", json!(failure))),
        )
    }

    fn skipped(&self, node: &ReportNode, reason: &str) -> Result<(), ConsumerError> {
        self.emit(
            "skipped",
            node,
            Some(("SKIP", self.styles.skip, Some(reason))),
            Some(("reason", json!(reason))),
        )
    }
}

fn node_kind(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Engine => "engine",
        NodeKind::Group => "group",
        NodeKind::Test(test_type) => test_type.segment_kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use specbridge_runner::{
        description::{Description, TestType},
        registry::GroupMetadata,
    };

    fn group_node(root: &ReportNode) -> ReportNode {
        ReportNode::group(root, Description::group("Math"), &GroupMetadata::default())
    }

    #[test]
    fn human_output_hides_starts_unless_verbose() {
        let root = ReportNode::engine("specbridge", "Specbridge");
        let group = group_node(&root);
        let consumer =
            DisplayConsumer::new(MessageFormat::Human, false, DisplayStyles::default(), Vec::new());
        consumer.started(&root).unwrap();
        consumer.dynamically_registered(&group).unwrap();
        consumer.started(&group).unwrap();
        consumer
            .finished_failed(&group, &FailureInfo::new("expected 4, got 5"))
            .unwrap();
        consumer.skipped(&group, "disabled").unwrap();
        consumer.finished_successful(&root).unwrap();

        let output = String::from_utf8(consumer.into_inner()).unwrap();
        assert_eq!(
            output,
            "        FAIL Math: expected 4, got 5\n        SKIP Math: disabled\n        PASS Specbridge\n"
        );
    }

    #[test]
    fn verbose_human_output_shows_starts() {
        let root = ReportNode::engine("specbridge", "Specbridge");
        let consumer =
            DisplayConsumer::new(MessageFormat::Human, true, DisplayStyles::default(), Vec::new());
        consumer.started(&root).unwrap();
        let output = String::from_utf8(consumer.into_inner()).unwrap();
        assert_eq!(output, "       START Specbridge\n");
    }

    #[test]
    fn json_output() {
        let root = ReportNode::engine("specbridge", "Specbridge");
        let group = group_node(&root);
        let consumer =
            DisplayConsumer::new(MessageFormat::Json, false, DisplayStyles::default(), Vec::new());
        consumer.started(&group).unwrap();
        consumer.skipped(&group, "disabled").unwrap();

        let output = String::from_utf8(consumer.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "started");
        assert_eq!(lines[0]["unique-id"], "[engine:specbridge]/[group:Math]");
        assert_eq!(lines[0]["kind"], "group");
        assert_eq!(lines[0]["description"], "Math");
        assert_eq!(lines[1]["type"], "skipped");
        assert_eq!(lines[1]["reason"], "disabled");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_are_kept() {
        let root = ReportNode::engine("specbridge", "Specbridge");
        let consumer =
            DisplayConsumer::new(MessageFormat::Human, false, DisplayStyles::default(), BrokenPipe);
        // Hidden lines are never written, so they can't fail.
        consumer.started(&root).unwrap();
        assert!(consumer.take_write_error().is_none());

        consumer.finished_successful(&root).unwrap_err();
        consumer.finished_successful(&root).unwrap_err();
        let error = consumer.take_write_error().expect("write error recorded");
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
        assert!(consumer.take_write_error().is_none());
    }

    #[test]
    fn leaf_kind_in_json() {
        assert_eq!(node_kind(NodeKind::Test(TestType::Leaf)), "test");
        assert_eq!(node_kind(NodeKind::Test(TestType::Container)), "container");
    }
}
