pub mod family;
pub mod fields;
pub mod person;
pub mod text;

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{PageKind, ParseError};
use crate::family_key::FamilyKey;
use family::{Child, FamilyEvent};
use fields::EventValue;
use person::SourceList;

pub use family::FamilyRecord;
pub use person::PersonRecord;

/// One parsed value of a labelled page field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Id(u32),
    Text(String),
    Event(EventValue),
    List(Vec<String>),
    Sources(SourceList),
    Children(Vec<Child>),
    FamilyEvents(Vec<FamilyEvent>),
}

impl Value {
    #[cfg(test)]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Labelled fields of one page in page order. Labels may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, Value)>,
}

impl Properties {
    pub fn insert(&mut self, label: impl Into<String>, value: Value) {
        self.entries.push((label.into(), value));
    }

    #[cfg(test)]
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == label)
            .map(|(_, value)| value)
    }

    #[cfg(test)]
    pub fn get_all<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key == label)
            .map(|(_, value)| value)
    }

    #[cfg(test)]
    pub fn text(&self, label: &str) -> Option<&str> {
        self.get(label).and_then(Value::as_text)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// What a page describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordKey {
    Person(u32),
    Family(FamilyKey),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Person(id) => write!(f, "P{id}"),
            RecordKey::Family(key) => write!(f, "F{key}"),
        }
    }
}

/// A report page kind with its own layout.
pub trait ReportPage: Sized {
    const KIND: PageKind;

    fn parse(page: &str) -> Result<Self, ParseError>;

    fn properties(&self) -> &Properties;

    fn record_key(&self) -> RecordKey;

    /// Data-consistency problems that did not stop the parse.
    fn warnings(&self) -> &[String];
}
