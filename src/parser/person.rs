use std::sync::LazyLock;

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::fields::{
    collapse_whitespace, extract_id, extract_ids, parse_event_value, parse_name, EventKind,
    EventValue,
};
use super::text::Unparsed;
use super::{Properties, RecordKey, ReportPage, Value};
use crate::error::{PageKind, ParseError};
use crate::family_key::{family_key, FamilyKey};

static SOURCES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\n-- SOURCES -+\n(.+)$").unwrap());
static SOURCE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^.\n]+)\.{2,}([^\n]+)\n").unwrap());
static HISTORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\n-- HISTORY NOTES -+\n(.+)$").unwrap());
static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ *([A-Z '/]+):(?: (.*(?:\n {10,}.+)*))?\n").unwrap());
static PARENTS_LEAD_IN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:also (?:the )?child of):?\s*").unwrap());
static PARENT_NOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?) ?\[NOTE: (.+)\]$").unwrap());

/// Source types the reports use; anything else is cited on the record.
pub const SOURCE_TYPES: &[&str] = &[
    "Name", "Birth", "BPlace", "Death", "DPlace", "Father", "Mother", "Other",
];

/// Labels that are understood but produce nothing on their own.
const PASSIVE_LABELS: &[&str] = &["FULL NAME", "CHILDREN", "FULL SIBL'G", "ID", "SEX"];

/// Source titles grouped by source type, in page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceList {
    entries: Vec<(String, Vec<String>)>,
}

impl SourceList {
    /// A type may list several titles; they accumulate.
    pub fn push(&mut self, source_type: &str, title: &str) {
        match self.entries.iter_mut().find(|(key, _)| key == source_type) {
            Some((_, titles)) => {
                if !titles.iter().any(|t| t == title) {
                    titles.push(title.to_string());
                }
            }
            None => self
                .entries
                .push((source_type.to_string(), vec![title.to_string()])),
        }
    }

    pub fn titles(&self, source_type: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(key, _)| key == source_type)
            .map(|(_, titles)| titles.as_slice())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, titles)| (key.as_str(), titles.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SourceList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, titles) in &self.entries {
            map.serialize_entry(key, titles)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonEvent {
    pub kind: EventKind,
    pub value: EventValue,
}

/// One candidate pair (or single) of parents.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentSet {
    parents: Vec<u32>,
    annotation: Option<String>,
}

impl ParentSet {
    #[cfg(test)]
    pub fn parents(&self) -> &[u32] {
        &self.parents
    }

    /// Free text such as `adopted, see notes`.
    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    pub fn family_key(&self) -> Option<FamilyKey> {
        family_key(&self.parents)
    }
}

/// One parsed person page.
#[derive(Debug, Clone)]
pub struct PersonRecord {
    properties: Properties,
    id: u32,
    name: String,
    events: Vec<PersonEvent>,
    occupation: Option<String>,
    notes: Vec<String>,
    tombstone: Option<String>,
    sources: SourceList,
    parent_sets: Vec<ParentSet>,
    spouses: Vec<u32>,
    warnings: Vec<String>,
}

impl PersonRecord {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Name in GEDCOM form, surname between slashes.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[PersonEvent] {
        &self.events
    }

    pub fn occupation(&self) -> Option<&str> {
        self.occupation.as_deref()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn tombstone(&self) -> Option<&str> {
        self.tombstone.as_deref()
    }

    pub fn sources(&self) -> &SourceList {
        &self.sources
    }

    /// The FATHER/MOTHER set comes first (possibly empty), then PARENTS entries.
    pub fn parent_sets(&self) -> &[ParentSet] {
        &self.parent_sets
    }

    #[cfg(test)]
    pub fn spouses(&self) -> &[u32] {
        &self.spouses
    }

    pub fn primary_family(&self) -> Option<FamilyKey> {
        self.parent_sets.first().and_then(ParentSet::family_key)
    }

    pub fn spouse_families(&self) -> Vec<FamilyKey> {
        self.spouses
            .iter()
            .filter_map(|&spouse| family_key(&[self.id, spouse]))
            .collect()
    }
}

impl ReportPage for PersonRecord {
    const KIND: PageKind = PageKind::Person;

    fn parse(page: &str) -> Result<Self, ParseError> {
        let mut text = Unparsed::from_page(page);
        let sources = take_sources(&mut text)?;
        let history = take_history_notes(&mut text);
        let fields = take_fields(&mut text);
        text.check_consumed("page")?;
        build_record(fields, history, sources)
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn record_key(&self) -> RecordKey {
        RecordKey::Person(self.id)
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

fn take_sources(text: &mut Unparsed) -> Result<SourceList, ParseError> {
    let mut sources = SourceList::default();
    let Some(section) = text.take_end(&SOURCES_RE) else {
        return Ok(sources);
    };
    let body = section.get(1).unwrap_or_default();
    let mut rest = body;
    loop {
        rest = rest.trim_start_matches(|c: char| c == '\n' || c == ' ');
        let Some(caps) = SOURCE_LINE_RE.captures(rest) else {
            break;
        };
        sources.push(caps[1].trim(), caps[2].trim());
        let end = caps.get(0).map_or(rest.len(), |m| m.end());
        rest = &rest[end..];
    }
    if !rest.trim().is_empty() {
        return Err(ParseError::Residue {
            section: "sources",
            text: rest.trim_end().to_string(),
        });
    }
    Ok(sources)
}

fn take_history_notes(text: &mut Unparsed) -> Option<String> {
    let section = text.take_end(&HISTORY_RE)?;
    let notes = collapse_whitespace(section.get(1).unwrap_or_default());
    (!notes.is_empty()).then_some(notes)
}

fn take_fields(text: &mut Unparsed) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    loop {
        text.skip_blank_lines();
        let Some(field) = text.take_start(&FIELD_RE) else {
            break;
        };
        let label = field.get(1).unwrap_or_default().trim().to_string();
        let value = collapse_whitespace(field.get(2).unwrap_or_default());
        fields.push((label, value));
    }
    fields
}

fn build_record(
    fields: Vec<(String, String)>,
    history: Option<String>,
    sources: SourceList,
) -> Result<PersonRecord, ParseError> {
    let full_name = fields
        .iter()
        .find(|(label, _)| label == "FULL NAME")
        .map(|(_, value)| value.as_str())
        .ok_or(ParseError::MissingFullName)?;
    let id = extract_id(full_name).ok_or_else(|| ParseError::MissingPersonId(full_name.to_string()))?;
    let (mut name, _) = parse_name(full_name)?;

    let mut properties = Properties::default();
    properties.insert("ID", Value::Id(id));

    let mut events = Vec::new();
    let mut occupation = None;
    let mut notes = Vec::new();
    let mut tombstone = None;
    let mut nickname = None;
    let mut primary = Vec::new();
    let mut parent_sets = Vec::new();
    let mut spouses = Vec::new();
    let mut warnings = Vec::new();

    for (label, value) in fields {
        if let Some(kind) = EventKind::from_label(&label) {
            let event = parse_event_value(&value)?;
            if event.date2.is_some() && !kind.allows_probate_date() {
                return Err(ParseError::UnexpectedSecondDate { field: label, text: value });
            }
            events.push(PersonEvent {
                kind,
                value: event.clone(),
            });
            properties.insert(label, Value::Event(event));
            continue;
        }
        match label.as_str() {
            "PARENTS" => {
                let items = split_parent_sets(&value);
                for item in &items {
                    parent_sets.push(parse_parent_set(item)?);
                }
                properties.insert(label, Value::List(items));
                continue;
            }
            "FATHER" | "MOTHER" => primary.extend(extract_id(&value)),
            "SPOUSES" => spouses = extract_ids(&value),
            "OCCUPATION" if !value.is_empty() => occupation = Some(value.clone()),
            "NOTE" if !value.is_empty() => notes.push(value.clone()),
            "NICKNAME" if !value.is_empty() => nickname = Some(value.clone()),
            "TOMBSTONE" if !value.is_empty() => tombstone = Some(value.clone()),
            "OCCUPATION" | "NOTE" | "NICKNAME" | "TOMBSTONE" => {}
            other if PASSIVE_LABELS.contains(&other) => {}
            other => warnings.push(format!("person {id}: field {other} has no GEDCOM mapping, skipped")),
        }
        properties.insert(label, Value::Text(value));
    }

    if let Some(history) = history {
        notes.push(history.clone());
        properties.insert("HISTORY NOTES", Value::Text(history));
    }
    for (source_type, _) in sources.iter() {
        if !SOURCE_TYPES.contains(&source_type) {
            warnings.push(format!(
                "person {id}: source type {source_type} has no GEDCOM mapping, cited on the record"
            ));
        }
    }
    if !sources.is_empty() {
        properties.insert("SOURCES", Value::Sources(sources.clone()));
    }

    if let Some(nickname) = nickname {
        name = match name.find('/') {
            Some(pos) => format!("{}\"{}\" {}", &name[..pos], nickname, &name[pos..]),
            None => format!("{} \"{}\"", name, nickname),
        };
    }
    parent_sets.insert(
        0,
        ParentSet {
            parents: primary,
            annotation: None,
        },
    );

    Ok(PersonRecord {
        properties,
        id,
        name,
        events,
        occupation,
        notes,
        tombstone,
        sources,
        parent_sets,
        spouses,
        warnings,
    })
}

/// Split a PARENTS value into one entry per candidate parent-set.
fn split_parent_sets(value: &str) -> Vec<String> {
    let value = PARENTS_LEAD_IN_RE.replace(value, "");
    let value = value.trim_end_matches(['.', ';', ',', ' ']);

    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let bytes = value.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b';' if depth == 0 && bytes.get(idx + 1) == Some(&b' ') => {
                items.push(value[start..idx].trim().to_string());
                start = idx + 2;
            }
            _ => {}
        }
    }
    items.push(value[start..].trim().to_string());
    items.retain(|item| !item.is_empty());
    items
}

fn parse_parent_set(item: &str) -> Result<ParentSet, ParseError> {
    let (text, annotation) = match PARENT_NOTE_RE.captures(item) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].trim().to_string())),
        None => (item.to_string(), None),
    };
    let parents = extract_ids(&text);
    if parents.is_empty() || parents.len() > 2 {
        return Err(ParseError::UnrecognizedParentSet(item.to_string()));
    }
    Ok(ParentSet { parents, annotation })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_pages() -> Vec<String> {
        std::fs::read_to_string("tests/fixtures/person.doc")
            .unwrap()
            .split('\x0c')
            .filter(|page| !page.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn minimal_page() {
        let person = PersonRecord::parse("FULL NAME: John SMITH (#5)\nBORN: 12 Jan 1900 Some City\n").unwrap();
        assert_eq!(person.id(), 5);
        assert_eq!(person.name(), "John /Smith/");
        assert_eq!(person.record_key(), RecordKey::Person(5));

        let props = person.properties();
        assert_eq!(props.get("ID"), Some(&Value::Id(5)));
        assert_eq!(props.text("FULL NAME"), Some("John SMITH (#5)"));
        let Some(Value::Event(born)) = props.get("BORN") else {
            panic!("BORN is not an event: {:?}", props.get("BORN"));
        };
        assert_eq!(born.date.as_ref().unwrap().to_string(), "12 JAN 1900");
        assert_eq!(born.place.as_deref(), Some("Some City"));

        let json = serde_json::to_value(props).unwrap();
        assert_eq!(json["BORN"]["date"], "12 JAN 1900");
        assert_eq!(json["BORN"]["place"], "Some City");
        assert_eq!(json["ID"], 5);
    }

    #[test]
    fn continuation_lines_joined() {
        let page = "FULL NAME: John SMITH (#5)\n      NOTE: first part of a long note\n            and its second line\n";
        let person = PersonRecord::parse(page).unwrap();
        assert_eq!(person.notes(), ["first part of a long note and its second line"]);
    }

    #[test]
    fn missing_full_name() {
        let err = PersonRecord::parse("BORN: 1900 Boston\n").unwrap_err();
        assert_eq!(err, ParseError::MissingFullName);
    }

    #[test]
    fn residue_is_an_error() {
        let err = PersonRecord::parse("FULL NAME: John SMITH (#5)\nthis line is not a field\n").unwrap_err();
        assert!(matches!(err, ParseError::Residue { section: "page", ref text } if text == "this line is not a field"));
    }

    #[test]
    fn bad_sources_line_is_an_error() {
        let page = "FULL NAME: John SMITH (#5)\n\n-- SOURCES ----\nBirth.....Records\nno dots here\n";
        let err = PersonRecord::parse(page).unwrap_err();
        assert!(matches!(err, ParseError::Residue { section: "sources", .. }));
    }

    #[test]
    fn sources_accumulate() {
        let page = "FULL NAME: John SMITH (#5)\n\n-- SOURCES ----\nOther.....1850 Census\nOther.....1860 Census\nBirth.....Town Records\n";
        let person = PersonRecord::parse(page).unwrap();
        assert_eq!(person.sources().titles("Other"), ["1850 Census", "1860 Census"]);
        assert_eq!(person.sources().titles("Birth"), ["Town Records"]);
        assert!(person.sources().titles("Death").is_empty());
    }

    #[test]
    fn second_date_only_on_wills() {
        let page = "FULL NAME: John SMITH (#5)\nDIED: 1900 (buried 1901) Boston\n";
        let err = PersonRecord::parse(page).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedSecondDate { ref field, .. } if field == "DIED"));

        let page = "FULL NAME: John SMITH (#5)\nWILL: 1899 (proved 1901) Boston\n";
        let person = PersonRecord::parse(page).unwrap();
        let will = &person.events()[0];
        assert_eq!(will.kind, EventKind::Will);
        assert_eq!(will.value.date2.as_ref().unwrap().to_string(), "1901");
    }

    #[test]
    fn estate_record_takes_one_date() {
        let page = "FULL NAME: John SMITH (#5)\nWILL/ESTATE: 1899 (proved 1901) Boston\n";
        let err = PersonRecord::parse(page).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedSecondDate { ref field, .. } if field == "WILL/ESTATE"));

        let page = "FULL NAME: John SMITH (#5)\nWILL/ESTATE: 1901 Boston\n";
        let person = PersonRecord::parse(page).unwrap();
        assert_eq!(person.events()[0].kind, EventKind::WillEstate);
        assert!(person.events()[0].value.date2.is_none());
    }

    #[test]
    fn unmapped_field_warns() {
        let person = PersonRecord::parse("FULL NAME: John SMITH (#5)\nHAIR: red\n").unwrap();
        assert_eq!(person.warnings().len(), 1);
        assert!(person.warnings()[0].contains("HAIR"));
    }

    #[test]
    fn parent_sets() {
        let page = "FULL NAME: Sarah SMITH (#4)\nFATHER: John SMITH (#1)\nMOTHER: Mary JONES (#2)\nPARENTS: Also child of Thomas JONES (#5) [NOTE: adopted, see notes]; Ann BROWN (#6) and Carl BROWN (#7).\n";
        let person = PersonRecord::parse(page).unwrap();
        let sets = person.parent_sets();
        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0].parents(), [1, 2]);
        assert_eq!(sets[1].parents(), [5]);
        assert_eq!(sets[1].annotation(), Some("adopted, see notes"));
        assert_eq!(sets[2].parents(), [6, 7]);
        assert_eq!(sets[2].annotation(), None);
        assert_eq!(person.primary_family().unwrap().to_string(), "1-2");
        assert_eq!(sets[1].family_key().unwrap().to_string(), "5-0");
    }

    #[test]
    fn parent_set_without_ids_is_an_error() {
        let page = "FULL NAME: Sarah SMITH (#4)\nPARENTS: unknown folks\n";
        assert!(matches!(
            PersonRecord::parse(page),
            Err(ParseError::UnrecognizedParentSet(_))
        ));
    }

    #[test]
    fn bracketed_notes_do_not_split() {
        let items = split_parent_sets("A (#1) [NOTE: foster; briefly]; B (#2)");
        assert_eq!(items, vec!["A (#1) [NOTE: foster; briefly]", "B (#2)"]);
    }

    #[test]
    fn nickname_goes_before_surname() {
        let person = PersonRecord::parse("FULL NAME: Thomas JONES (#5)\nNICKNAME: Tom\n").unwrap();
        assert_eq!(person.name(), "Thomas \"Tom\" /Jones/");
    }

    #[test]
    fn spouse_families_keyed_like_family_pages() {
        let person = PersonRecord::parse("FULL NAME: John SMITH (#9)\nSPOUSES: Mary (#2), Ann (#12)\n").unwrap();
        let keys: Vec<String> = person.spouse_families().iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["2-9", "9-12"]);
    }

    #[test]
    fn fixture_pages_parse_completely() {
        let pages = fixture_pages();
        assert_eq!(pages.len(), 5);
        for page in &pages {
            let person = PersonRecord::parse(page).unwrap();
            assert!(person.warnings().is_empty(), "{:?}", person.warnings());
        }
    }

    #[test]
    fn fixture_first_page() {
        let person = PersonRecord::parse(&fixture_pages()[0]).unwrap();
        assert_eq!(person.id(), 1);
        assert_eq!(person.name(), "John Henry /Smith/");
        assert_eq!(person.occupation(), Some("Farmer"));
        assert_eq!(person.tombstone(), Some("Here lies John;"));
        assert_eq!(person.spouses(), [2]);
        assert_eq!(person.notes().len(), 2);
        assert_eq!(
            person.notes()[1],
            "John came to Concord from Boston as a young man. He farmed the family land until his death."
        );
        assert_eq!(person.sources().titles("Name"), ["Smith Family Bible"]);
        let kinds: Vec<_> = person.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [EventKind::Birth, EventKind::Death, EventKind::Burial]);
        assert!(person.primary_family().is_none());
    }
}
