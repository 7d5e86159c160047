use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::places::normalize_place;
use super::sources::CitationStore;
use super::{person_pointer, GedcomNode};
use crate::config::{OutputFormat, Submitter};
use crate::error::ConvertError;
use crate::model::{Family, Individual};
use crate::parser::fields::{find_date, DateExpr, EventKind};
use crate::parser::person::{ParentSet, SourceList, SOURCE_TYPES};
use crate::parser::PersonRecord;

static PEDIGREE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(adopted|foster)(.*)").unwrap());

/// Record-level source types, in citation order; unknown types follow.
const RECORD_SOURCE_TYPES: [&str; 3] = ["Father", "Mother", "Other"];

/// Source types cited on an event's place and on the event itself.
fn event_source_types(kind: EventKind) -> (Option<&'static str>, Option<&'static str>) {
    match kind {
        EventKind::Birth => (Some("BPlace"), Some("Birth")),
        EventKind::Death => (Some("DPlace"), Some("Death")),
        _ => (None, None),
    }
}

fn titles<'a>(sources: &'a SourceList, source_type: Option<&str>) -> &'a [String] {
    match source_type {
        Some(source_type) => sources.titles(source_type),
        None => &[],
    }
}

/// Titles cited on the record itself, each with the source types citing it.
fn record_citation_groups(sources: &SourceList) -> Vec<(&str, Vec<&str>)> {
    let mut source_types: Vec<&str> = RECORD_SOURCE_TYPES.to_vec();
    source_types.extend(
        sources
            .iter()
            .map(|(source_type, _)| source_type)
            .filter(|source_type| !SOURCE_TYPES.contains(source_type)),
    );
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for source_type in source_types {
        for title in sources.titles(source_type) {
            match groups.iter_mut().find(|(known, _)| *known == title.as_str()) {
                Some((_, types)) => types.push(source_type),
                None => groups.push((title.as_str(), vec![source_type])),
            }
        }
    }
    groups
}

/// Which relationships a record-level source documents; none when it also covers other facts.
fn relationship_note(types: &[&str]) -> Option<String> {
    if types.iter().any(|t| *t != "Father" && *t != "Mother") {
        return None;
    }
    match types.join(", ").as_str() {
        "Father, Mother" => Some("Parents".to_string()),
        note => Some(note.to_string()),
    }
}

/// Every title a person cites, in the order the tree builder cites them.
pub fn citation_order(person: &PersonRecord) -> Vec<&str> {
    let sources = person.sources();
    let mut order: Vec<&str> = sources.titles("Name").iter().map(String::as_str).collect();
    for event in person.events() {
        let (place_type, event_type) = event_source_types(event.kind);
        let place_titles = titles(sources, place_type);
        let event_titles = titles(sources, event_type);
        let cited = if event.value.place.is_some() {
            place_titles.iter().chain(event_titles)
        } else {
            event_titles.iter().chain(place_titles)
        };
        order.extend(cited.map(String::as_str));
    }
    order.extend(record_citation_groups(sources).into_iter().map(|(title, _)| title));
    order
}

/// Builds GEDCOM record trees. Citations must already be registered.
pub struct TreeBuilder<'a> {
    citations: &'a CitationStore,
    format: OutputFormat,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(citations: &'a CitationStore, format: OutputFormat) -> Self {
        TreeBuilder { citations, format }
    }

    pub fn header(&self, charset: &str, submitter: Option<&Submitter>, now: DateTime<Utc>) -> GedcomNode {
        let mut head = GedcomNode::new("HEAD")
            .child(GedcomNode::with_payload("CHAR", charset))
            .child(
                GedcomNode::with_payload("SOUR", "{FamilyEdge}")
                    .child(GedcomNode::with_payload("NAME", "The Family Edge Plus"))
                    .child(GedcomNode::with_payload("VERS", "2.5b")),
            )
            .child(
                GedcomNode::new("GEDC")
                    .child(GedcomNode::with_payload("VERS", "5.5.1"))
                    .child(GedcomNode::with_payload("FORM", "LINEAGE-LINKED")),
            )
            .child(
                GedcomNode::with_payload("DATE", now.format("%d %b %Y").to_string().to_uppercase())
                    .child(GedcomNode::with_payload("TIME", now.format("%H:%M:%S").to_string())),
            );
        if let Some(submitter) = submitter {
            head.push(GedcomNode::with_payload("SUBM", submitter.pointer()));
        }
        head
    }

    pub fn submitter(&self, submitter: &Submitter) -> GedcomNode {
        let mut subm = GedcomNode::record(submitter.pointer(), "SUBM").child(GedcomNode::with_payload(
            "NAME",
            submitter.name.as_deref().unwrap_or("Unknown"),
        ));
        let optional = [
            ("ADDR", &submitter.address),
            ("PHON", &submitter.phone),
            ("EMAIL", &submitter.email),
            ("FAX", &submitter.fax),
            ("WWW", &submitter.www),
        ];
        for (tag, value) in optional {
            if let Some(value) = value {
                subm.push(GedcomNode::with_payload(tag, value.clone()));
            }
        }
        subm
    }

    pub fn individual(&self, person: &Individual) -> Result<GedcomNode, ConvertError> {
        let record = &person.record;
        let sources = record.sources();
        let mut indi = GedcomNode::record(person_pointer(record.id()), "INDI");

        let mut name = GedcomNode::with_payload("NAME", record.name());
        name.children
            .extend(self.citations.get_citations(sources.titles("Name"))?);
        indi.push(name);
        if let Some(sex) = person.sex {
            indi.push(GedcomNode::with_payload("SEX", sex.letter()));
        }

        let mut buried = false;
        for event in record.events() {
            let value = &event.value;
            let place = value.place.as_deref();
            let mut node = self.event(event.kind, value.date.as_ref(), place, sources)?;
            if event.kind == EventKind::Burial {
                if let Some(tombstone) = record.tombstone().filter(|_| !buried) {
                    node.push(gravestone_note(tombstone));
                }
                buried = true;
            }
            indi.push(node);
            if let Some(probate) = value.date2.as_ref().filter(|_| event.kind.allows_probate_date()) {
                indi.push(self.event(EventKind::Probate, Some(probate), place, sources)?);
            }
        }
        if let Some(tombstone) = record.tombstone().filter(|_| !buried) {
            indi.push(GedcomNode::new(EventKind::Burial.tag()).child(gravestone_note(tombstone)));
        }

        if let Some(occupation) = record.occupation() {
            indi.push(GedcomNode::with_payload("OCCU", occupation));
        }
        for note in record.notes() {
            indi.push(GedcomNode::with_payload("NOTE", note.clone()));
        }
        for key in &person.spouse_families {
            indi.push(GedcomNode::with_payload("FAMS", key.pointer()));
        }
        for (idx, set) in record.parent_sets().iter().enumerate() {
            indi.children
                .extend(self.child_family(set, idx == 0 && person.uncertain_parents));
        }

        for (title, types) in record_citation_groups(sources) {
            let mut citation = self.citations.get_citation(title)?;
            if let Some(note) = relationship_note(&types) {
                citation.push(GedcomNode::with_payload("NOTE", note));
            }
            indi.push(citation);
        }
        Ok(indi)
    }

    fn event(
        &self,
        kind: EventKind,
        date: Option<&DateExpr>,
        place: Option<&str>,
        sources: &SourceList,
    ) -> Result<GedcomNode, ConvertError> {
        let mut node = GedcomNode::new(kind.tag());
        if let Some(date) = date {
            node.push(self.date(date));
        }
        let (place_type, event_type) = event_source_types(kind);
        let event_titles = titles(sources, event_type);
        match place {
            Some(place) => {
                let mut plac = GedcomNode::with_payload("PLAC", normalize_place(place));
                plac.children
                    .extend(self.citations.get_citations(titles(sources, place_type))?);
                node.push(plac);
                node.children.extend(self.citations.get_citations(event_titles)?);
            }
            None => {
                let cited = event_titles.iter().chain(titles(sources, place_type));
                node.children.extend(self.citations.get_citations(cited)?);
            }
        }
        Ok(node)
    }

    fn date(&self, date: &DateExpr) -> GedcomNode {
        GedcomNode::with_payload("DATE", date.render(self.format))
    }

    /// FAMC for one parent set, preceded by an ADOP event when it records an adoption.
    fn child_family(&self, set: &ParentSet, challenged: bool) -> Vec<GedcomNode> {
        let Some(key) = set.family_key() else {
            return Vec::new();
        };
        let mut nodes = Vec::new();
        let mut famc = GedcomNode::with_payload("FAMC", key.pointer());
        if challenged {
            famc.push(GedcomNode::with_payload("STAT", "challenged"));
        }

        let annotation = set.annotation();
        let mut note = annotation.map(str::to_string);
        if let Some(caps) = annotation.and_then(|text| PEDIGREE_RE.captures(text)) {
            let pedigree = caps[1].to_ascii_lowercase();
            famc.push(GedcomNode::with_payload("PEDI", pedigree.clone()));
            if note.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(&pedigree)) {
                note = None;
            }
            if pedigree == "adopted" {
                let mut adop = GedcomNode::new(EventKind::Adoption.tag())
                    .child(GedcomNode::with_payload("FAMC", key.pointer()));
                let rest = caps.get(2).map_or("", |m| m.as_str());
                if let Some((date, span)) = find_date(rest) {
                    adop.push(self.date(&date));
                    let residue = format!("{}{}", &rest[..span.start], &rest[span.end..]);
                    if is_filler(&residue) {
                        note = None;
                    }
                }
                if let Some(text) = &note {
                    adop.push(GedcomNode::with_payload("NOTE", text.clone()));
                }
                nodes.push(adop);
            }
        }
        if let Some(note) = note {
            famc.push(GedcomNode::with_payload("NOTE", note));
        }
        nodes.push(famc);
        nodes
    }

    pub fn family(&self, family: &Family) -> GedcomNode {
        let mut fam = GedcomNode::record(family.key().pointer(), "FAM");
        if let Some(husband) = family.husband() {
            fam.push(GedcomNode::with_payload("HUSB", person_pointer(husband)));
        }
        if let Some(wife) = family.wife() {
            fam.push(GedcomNode::with_payload("WIFE", person_pointer(wife)));
        }
        for event in family.events() {
            // no sources or places exist for these
            let node = match &event.date {
                Some(date) => GedcomNode::new(event.kind.tag()).child(self.date(date)),
                None => GedcomNode::with_payload(event.kind.tag(), "Y"),
            };
            fam.push(node);
        }
        for child in family.children() {
            fam.push(GedcomNode::with_payload("CHIL", person_pointer(child.id)));
        }
        fam
    }

    pub fn trailer(&self) -> GedcomNode {
        GedcomNode::new("TRLR")
    }
}

fn gravestone_note(tombstone: &str) -> GedcomNode {
    let text = tombstone.trim_end_matches(['.', ';']).trim_end();
    GedcomNode::with_payload("NOTE", format!("Gravestone: {text}"))
}

/// What is left of an adoption annotation once the date is removed says nothing new.
fn is_filler(text: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .all(|word| matches!(word.to_ascii_lowercase().as_str(), "on" | "in" | "about"))
}
