// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hierarchical identifiers for tests and test groups.
//!
//! A [`Description`] is a path of name segments. The first segment names the top-level group
//! (depth 0); every further segment names a nested container or test.

use crate::errors::DescriptionParseError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt, sync::Arc};

/// A hierarchical, structurally compared identifier for a test or test group.
///
/// Cloning is cheap: segments are shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<SmolStr>", into = "Vec<SmolStr>")]
pub struct Description {
    segments: Arc<[SmolStr]>,
}

impl Description {
    /// Creates a description for a top-level group.
    pub fn group(name: impl Into<SmolStr>) -> Self {
        Self {
            segments: Arc::from([name.into()]),
        }
    }

    /// Creates a description from a full path of segments.
    ///
    /// Returns an error if there are no segments or any segment is empty.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, DescriptionParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        let segments: Vec<SmolStr> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(DescriptionParseError::Empty);
        }
        if let Some(index) = segments.iter().position(|s| s.is_empty()) {
            return Err(DescriptionParseError::EmptySegment { index });
        }
        Ok(Self {
            segments: segments.into(),
        })
    }

    /// Returns a new description nested directly under this one.
    pub fn child(&self, name: impl Into<SmolStr>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(name.into());
        Self {
            segments: segments.into(),
        }
    }

    /// The leaf segment.
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .expect("descriptions always have at least one segment")
    }

    /// All segments, outermost first.
    pub fn segments(&self) -> &[SmolStr] {
        &self.segments
    }

    /// Returns the parent description, or `None` for a top-level group.
    pub fn parent(&self) -> Option<Description> {
        match self.segments.len() {
            1 => None,
            len => Some(Self {
                segments: self.segments[..len - 1].into(),
            }),
        }
    }

    /// The top-level group this description belongs to.
    pub fn top_level(&self) -> Description {
        match self.segments.len() {
            1 => self.clone(),
            _ => Self {
                segments: self.segments[..1].into(),
            },
        }
    }

    /// Returns true if this is a top-level group.
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// The number of ancestors above this description. Top-level groups have depth 0.
    pub fn depth(&self) -> usize {
        self.segments.len() - 1
    }

    /// Returns true if `self` is a proper ancestor of `other`.
    ///
    /// This is not reflexive: a description is not its own ancestor. Use
    /// [`Self::contains`] for the inclusive check.
    pub fn is_ancestor_of(&self, other: &Description) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Returns true if `other` is `self` or one of its descendants.
    pub fn contains(&self, other: &Description) -> bool {
        self == other || self.is_ancestor_of(other)
    }

    /// The path below the top-level group, joined with `.`. Empty for a top-level group.
    pub fn path_in_group(&self) -> String {
        self.segments[1..].join(".")
    }
}

impl TryFrom<Vec<SmolStr>> for Description {
    type Error = DescriptionParseError;

    fn try_from(segments: Vec<SmolStr>) -> Result<Self, Self::Error> {
        Self::from_segments(segments)
    }
}

impl From<Description> for Vec<SmolStr> {
    fn from(description: Description) -> Self {
        description.segments.to_vec()
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Description({self})")
    }
}

/// Whether a node can have children.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestType {
    /// A node that may register further children after it starts.
    Container,

    /// A single test. Leaves never have children.
    Leaf,
}

impl TestType {
    /// The segment kind used for this type in unique identifiers.
    pub fn segment_kind(self) -> &'static str {
        match self {
            TestType::Container => "container",
            TestType::Leaf => "test",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Container => f.write_str("container"),
            TestType::Leaf => f.write_str("leaf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::arb_description;
    use test_case::test_case;
    use test_strategy::proptest;

    fn desc(path: &[&str]) -> Description {
        Description::from_segments(path.iter().copied()).unwrap()
    }

    #[test]
    fn parent_chain() {
        let leaf = desc(&["G", "H", "x"]);
        assert_eq!(leaf.name(), "x");
        assert_eq!(leaf.depth(), 2);
        assert_eq!(leaf.parent(), Some(desc(&["G", "H"])));
        assert_eq!(leaf.parent().unwrap().parent(), Some(Description::group("G")));
        assert_eq!(Description::group("G").parent(), None);
        assert_eq!(leaf.top_level(), Description::group("G"));
        assert_eq!(leaf.to_string(), "G.H.x");
        assert_eq!(leaf.path_in_group(), "H.x");
    }

    #[test_case(&["G"], &["G", "a"], true ; "direct parent")]
    #[test_case(&["G"], &["G", "a", "b"], true ; "grandparent")]
    #[test_case(&["G"], &["G"], false ; "self is not ancestor")]
    #[test_case(&["G", "a"], &["G", "ab"], false ; "segment prefix is not ancestry")]
    #[test_case(&["G", "a"], &["G"], false ; "descendant is not ancestor")]
    #[test_case(&["G"], &["F", "a"], false ; "different group")]
    fn ancestry(ancestor: &[&str], other: &[&str], expected: bool) {
        assert_eq!(desc(ancestor).is_ancestor_of(&desc(other)), expected);
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            Description::from_segments(Vec::<&str>::new()),
            Err(DescriptionParseError::Empty)
        ));
        assert!(matches!(
            Description::from_segments(["G", ""]),
            Err(DescriptionParseError::EmptySegment { index: 1 })
        ));
    }

    #[test]
    fn serde_as_segment_list() {
        let d = desc(&["G", "a"]);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"["G","a"]"#);
        let err = serde_json::from_str::<Description>("[]").unwrap_err();
        assert!(err.to_string().contains("no segments"), "{err}");
    }

    #[proptest(cases = 256)]
    fn ancestors_are_parents_transitively(#[strategy(arb_description())] d: Description) {
        let mut current = d.parent();
        let mut expected_depth = d.depth();
        while let Some(ancestor) = current {
            expected_depth -= 1;
            assert!(ancestor.is_ancestor_of(&d));
            assert!(!d.is_ancestor_of(&ancestor));
            assert_eq!(ancestor.depth(), expected_depth);
            current = ancestor.parent();
        }
        assert_eq!(expected_depth, 0);
        assert!(d.contains(&d));
        assert!(!d.is_ancestor_of(&d));
    }
}
