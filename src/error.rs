use thiserror::Error;

use crate::family_key::FamilyKey;

/// Structural problems with a single report page. Always fatal for the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("full name is missing from page")]
    MissingFullName,
    #[error("no person id in full name \"{0}\"")]
    MissingPersonId(String),
    #[error("unexpected person format \"{0}\"")]
    UnexpectedName(String),
    #[error("unexpected format in {section}: \"{text}\"")]
    Residue { section: &'static str, text: String },
    #[error("no parent block found: \"{0}\"")]
    MissingParentBlock(String),
    #[error("no {role} line found: \"{block}\"")]
    MissingParentLine { role: &'static str, block: String },
    #[error("no parents found: \"{0}\"")]
    NoParents(String),
    #[error("unexpected child format: \"{0}\"")]
    UnexpectedChildRow(String),
    #[error("invalid date format \"{0}\"")]
    InvalidDate(String),
    #[error("unexpected second date in {field}: \"{text}\"")]
    UnexpectedSecondDate { field: String, text: String },
    #[error("unexpected text in PARENTS: \"{0}\"")]
    UnrecognizedParentSet(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Person,
    Family,
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageKind::Person => f.write_str("person"),
            PageKind::Family => f.write_str("family"),
        }
    }
}

/// Failures of a whole conversion run.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{kind} page {page}: {source}")]
    Parse {
        kind: PageKind,
        page: usize,
        #[source]
        source: ParseError,
    },
    #[error("person {person} refers to family {key}, which is missing from the family report")]
    MissingFamily { person: u32, key: FamilyKey },
    #[error("person {0} appears on more than one page")]
    DuplicatePerson(u32),
    #[error("source \"{0}\" was cited but never registered")]
    UnregisteredSource(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
