//! GEDCOM record trees and their serialisation.
//!
//! Builders produce [`GedcomNode`] trees without any concern for line
//! length; [`writer`] turns them into physical lines.

pub mod builder;
pub mod places;
pub mod sources;
pub mod writer;

/// One GEDCOM line and the lines nested under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GedcomNode {
    pub tag: &'static str,
    pub pointer: Option<String>,
    pub payload: Option<String>,
    pub children: Vec<GedcomNode>,
}

impl GedcomNode {
    pub fn new(tag: &'static str) -> Self {
        GedcomNode {
            tag,
            pointer: None,
            payload: None,
            children: Vec::new(),
        }
    }

    pub fn with_payload(tag: &'static str, payload: impl Into<String>) -> Self {
        GedcomNode {
            payload: Some(payload.into()),
            ..GedcomNode::new(tag)
        }
    }

    /// A top-level record such as `0 @P5@ INDI`.
    pub fn record(pointer: impl Into<String>, tag: &'static str) -> Self {
        GedcomNode {
            pointer: Some(pointer.into()),
            ..GedcomNode::new(tag)
        }
    }

    pub fn child(mut self, node: GedcomNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn push(&mut self, node: GedcomNode) {
        self.children.push(node);
    }

    #[cfg(test)]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    #[cfg(test)]
    pub fn find(&self, tag: &str) -> Option<&GedcomNode> {
        self.children.iter().find(|node| node.tag == tag)
    }

    #[cfg(test)]
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a GedcomNode> + 'a {
        self.children.iter().filter(move |node| node.tag == tag)
    }
}

pub fn person_pointer(id: u32) -> String {
    format!("@P{id}@")
}
