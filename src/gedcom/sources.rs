use std::collections::HashMap;

use super::GedcomNode;
use crate::error::ConvertError;

/// Numbers source titles in first-seen order for one run.
///
/// Titles are interned while the model is assembled; tree building only
/// looks them up, so the store is shared read-only by then.
#[derive(Debug, Default)]
pub struct CitationStore {
    titles: Vec<String>,
    ids: HashMap<String, usize>,
}

impl CitationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1-based id of `title`, assigning the next one on first sight.
    pub fn intern(&mut self, title: &str) -> usize {
        if let Some(&id) = self.ids.get(title) {
            return id;
        }
        self.titles.push(title.to_string());
        let id = self.titles.len();
        self.ids.insert(title.to_string(), id);
        id
    }

    pub fn pointer(&self, title: &str) -> Result<String, ConvertError> {
        self.ids
            .get(title)
            .map(|id| format!("@S{id}@"))
            .ok_or_else(|| ConvertError::UnregisteredSource(title.to_string()))
    }

    pub fn get_citation(&self, title: &str) -> Result<GedcomNode, ConvertError> {
        Ok(GedcomNode::with_payload("SOUR", self.pointer(title)?))
    }

    /// One citation per distinct title, in the order given.
    pub fn get_citations<'a, I>(&self, titles: I) -> Result<Vec<GedcomNode>, ConvertError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut seen: Vec<&str> = Vec::new();
        let mut citations = Vec::new();
        for title in titles {
            if seen.contains(&title.as_str()) {
                continue;
            }
            seen.push(title);
            citations.push(self.get_citation(title)?);
        }
        Ok(citations)
    }

    /// `0 @Sn@ SOUR` records with their titles, numbered in order.
    pub fn get_all_records(&self) -> Vec<GedcomNode> {
        self.titles
            .iter()
            .enumerate()
            .map(|(idx, title)| {
                GedcomNode::record(format!("@S{}@", idx + 1), "SOUR")
                    .child(GedcomNode::with_payload("TITL", title.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }
}
