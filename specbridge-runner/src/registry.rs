// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The descriptor registry: one externally visible [`ReportNode`] per [`Description`].
//!
//! The registry is an arena scoped to a single top-level group. Nodes are created lazily and
//! exactly once, always after their parent, and are announced to the consumer as dynamically
//! registered at creation time.

use crate::{
    consumer::Notifier,
    description::{Description, TestType},
    errors::ProtocolError,
};
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt, sync::Arc};
use tracing::debug;

/// One segment of a [`UniqueId`], e.g. `[group:Math]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdSegment {
    /// The segment kind: `engine`, `group`, `container` or `test`.
    pub kind: SmolStr,

    /// The segment value.
    pub value: SmolStr,
}

/// A unique, path-derived identifier for a [`ReportNode`].
///
/// Rendered as `[engine:specbridge]/[group:G]/[container:H]/[test:x]`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UniqueId {
    segments: Arc<[IdSegment]>,
}

impl UniqueId {
    /// Creates the identifier of a process-wide root.
    pub fn engine(id: impl Into<SmolStr>) -> Self {
        Self {
            segments: Arc::from([IdSegment {
                kind: "engine".into(),
                value: id.into(),
            }]),
        }
    }

    /// Returns a new identifier with one more segment.
    pub fn append(&self, kind: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(IdSegment {
            kind: kind.into(),
            value: value.into(),
        });
        Self {
            segments: segments.into(),
        }
    }

    /// The segments of this identifier, root first.
    pub fn segments(&self) -> &[IdSegment] {
        &self.segments
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str("[")?;
            write_escaped(f, &segment.kind)?;
            f.write_str(":")?;
            write_escaped(f, &segment.value)?;
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// Percent-encodes the characters that delimit segments, so distinct ids never render alike.
fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let mut rest = s;
    while let Some(pos) = rest.find(['%', '[', ']', ':', '/']) {
        f.write_str(&rest[..pos])?;
        let escaped = match rest.as_bytes()[pos] {
            b'%' => "%25",
            b'[' => "%5B",
            b']' => "%5D",
            b':' => "%3A",
            _ => "%2F",
        };
        f.write_str(escaped)?;
        rest = &rest[pos + 1..];
    }
    f.write_str(rest)
}

impl fmt::Debug for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniqueId({self})")
    }
}

/// Where a top-level group was declared.
///
/// Some consumers treat a group without a source as orphaned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeSource {
    /// A named type or class.
    Class {
        /// The fully qualified name.
        name: String,
    },

    /// A location in a file.
    File {
        /// The path to the file.
        path: Utf8PathBuf,

        /// The line, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
}

impl fmt::Display for NodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeSource::Class { name } => write!(f, "class {name}"),
            NodeSource::File {
                path,
                line: Some(line),
            } => write!(f, "{path}:{line}"),
            NodeSource::File { path, line: None } => write!(f, "{path}"),
        }
    }
}

/// Metadata supplied when a top-level group is prepared, ignored or completed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupMetadata {
    /// The name shown to users, if different from the description's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Where the group was declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<NodeSource>,
}

/// What a [`ReportNode`] represents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The process-wide root.
    Engine,

    /// A top-level group.
    Group,

    /// A node inside a group.
    Test(TestType),
}

impl NodeKind {
    /// Returns true if nodes of this kind may have children.
    pub fn can_have_children(self) -> bool {
        !matches!(self, NodeKind::Test(TestType::Leaf))
    }
}

/// An index into a [`DescriptorRegistry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

/// The externally visible descriptor for one node.
#[derive(Clone, Debug)]
pub struct ReportNode {
    unique_id: UniqueId,
    display_name: SmolStr,
    kind: NodeKind,
    description: Option<Description>,
    source: Option<NodeSource>,
    parent_id: Option<UniqueId>,
    children: Vec<NodeIndex>,
}

impl ReportNode {
    /// Creates the process-wide root node.
    pub fn engine(id: impl Into<SmolStr>, display_name: impl Into<SmolStr>) -> Self {
        Self {
            unique_id: UniqueId::engine(id),
            display_name: display_name.into(),
            kind: NodeKind::Engine,
            description: None,
            source: None,
            parent_id: None,
            children: Vec::new(),
        }
    }

    /// Creates a top-level group node, parented directly under `root`.
    pub fn group(root: &ReportNode, description: Description, metadata: &GroupMetadata) -> Self {
        let display_name = match &metadata.display_name {
            Some(name) => SmolStr::new(name),
            None => SmolStr::new(description.name()),
        };
        Self {
            unique_id: root.unique_id.append("group", description.name()),
            display_name,
            kind: NodeKind::Group,
            description: Some(description),
            source: metadata.source.clone(),
            parent_id: Some(root.unique_id.clone()),
            children: Vec::new(),
        }
    }

    pub(crate) fn test(parent: &ReportNode, description: Description, test_type: TestType) -> Self {
        Self {
            unique_id: parent
                .unique_id
                .append(test_type.segment_kind(), description.name()),
            display_name: SmolStr::new(description.name()),
            kind: NodeKind::Test(test_type),
            description: Some(description),
            source: None,
            parent_id: Some(parent.unique_id.clone()),
            children: Vec::new(),
        }
    }

    /// The unique identifier.
    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    /// The human-readable name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// What this node represents.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The description, or `None` for the process-wide root.
    pub fn description(&self) -> Option<&Description> {
        self.description.as_ref()
    }

    /// Where the node was declared. Only set for top-level groups.
    pub fn source(&self) -> Option<&NodeSource> {
        self.source.as_ref()
    }

    /// The unique identifier of the parent, or `None` for the process-wide root.
    pub fn parent_id(&self) -> Option<&UniqueId> {
        self.parent_id.as_ref()
    }

    /// Indexes of the children of this node within its registry.
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }
}

/// Maps descriptions within one top-level group to their [`ReportNode`]s.
#[derive(Debug)]
pub struct DescriptorRegistry {
    nodes: Vec<ReportNode>,
    by_description: IndexMap<Description, NodeIndex>,
}

impl DescriptorRegistry {
    /// Creates a registry for a top-level group, registering the group node under `root`.
    ///
    /// The group node is announced to the consumer as dynamically registered.
    pub(crate) fn for_group(
        root: &ReportNode,
        group: Description,
        metadata: &GroupMetadata,
        notifier: &Notifier<'_>,
    ) -> Self {
        let node = ReportNode::group(root, group.clone(), metadata);
        debug!(unique_id = %node.unique_id, "registering group node");
        notifier.dynamically_registered(&node);

        let mut by_description = IndexMap::new();
        by_description.insert(group, NodeIndex(0));
        Self {
            nodes: vec![node],
            by_description,
        }
    }

    /// The group node this registry was created for.
    pub fn group_index(&self) -> NodeIndex {
        NodeIndex(0)
    }

    /// Returns the node for `description`, creating and registering it if necessary.
    ///
    /// The parent node must already exist.
    pub(crate) fn get_or_create(
        &mut self,
        description: &Description,
        test_type: TestType,
        notifier: &Notifier<'_>,
    ) -> Result<NodeIndex, ProtocolError> {
        if let Some(&index) = self.by_description.get(description) {
            return Ok(index);
        }

        let parent = description
            .parent()
            .ok_or_else(|| ProtocolError::NotInGroup {
                description: description.clone(),
            })?;
        let &parent_index =
            self.by_description
                .get(&parent)
                .ok_or_else(|| ProtocolError::ParentNotRegistered {
                    description: description.clone(),
                    parent: parent.clone(),
                })?;
        let parent_node = &self.nodes[parent_index.0];
        if !parent_node.kind.can_have_children() {
            return Err(ProtocolError::ParentIsLeaf {
                description: description.clone(),
                parent,
            });
        }

        let node = ReportNode::test(parent_node, description.clone(), test_type);
        let index = NodeIndex(self.nodes.len());
        debug!(unique_id = %node.unique_id, "registering node");
        notifier.dynamically_registered(&node);

        self.nodes.push(node);
        self.nodes[parent_index.0].children.push(index);
        self.by_description.insert(description.clone(), index);
        Ok(index)
    }

    /// Looks up the node for a description without creating it.
    pub fn get(&self, description: &Description) -> Option<NodeIndex> {
        self.by_description.get(description).copied()
    }

    /// Returns the node at `index`.
    pub fn node(&self, index: NodeIndex) -> &ReportNode {
        &self.nodes[index.0]
    }

    /// The number of registered nodes, including the group node.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a registry contains at least its group node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
