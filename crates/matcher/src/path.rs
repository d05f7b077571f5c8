//! Divergence paths
//!
//! Paths are a linked list of segments on the stack of the comparison, and
//! are only rendered when a mismatch is reported.

use std::fmt;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Segment<'a> {
    Root,
    Field(&'a str),
    Key(&'a str),
    Index(usize),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PathNode<'a> {
    parent: Option<&'a PathNode<'a>>,
    segment: Segment<'a>,
}

impl<'a> PathNode<'a> {
    pub(crate) fn root() -> Self {
        PathNode {
            parent: None,
            segment: Segment::Root,
        }
    }

    pub(crate) fn child(&'a self, segment: Segment<'a>) -> PathNode<'a> {
        PathNode {
            parent: Some(self),
            segment,
        }
    }
}

impl fmt::Display for PathNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent {
            fmt::Display::fmt(parent, f)?;
        }
        match self.segment {
            Segment::Root => f.write_str("root"),
            Segment::Field(name) => write!(f, ".{}", name),
            Segment::Key(key) => write!(f, "[{:?}]", key),
            Segment::Index(i) => write!(f, "[{}]", i),
        }
    }
}
