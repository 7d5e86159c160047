use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::fields::{extract_id, parse_event_value, DateExpr, EventKind, Sex};
use super::text::Unparsed;
use super::{Properties, RecordKey, ReportPage, Value};
use crate::error::{PageKind, ParseError};
use crate::family_key::{family_key, FamilyKey};

static PARENT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ *(?:HUSBAND|WIFE|SPOUSE):.*\n(?:.*\n)*?={30,}\n").unwrap()
});
static PARENT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^ *(HUSBAND|WIFE|SPOUSE):[ \t]*(.*)$").unwrap());
static MARR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^ *MARR:[ \t]*(.*)$").unwrap());
static MARR_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:(married|divorced))\b[:,]? *(.*)$").unwrap());
static CHILD_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^.+?\n[=-]{30,}\n").unwrap());
/// divider, name line, sex
static CHILD_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \d][ \d] ([|?]) NAME:([^\n]*)\n ([FM ])[ \n]").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Child {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    /// Row divider was `?`: parentage in this family is doubtful.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub uncertain: bool,
}

/// Marriage or divorce. The reports never give a place or source for these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyEvent {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateExpr>,
}

/// One parsed family page. Families spanning several pages give one record per page.
#[derive(Debug, Clone)]
pub struct FamilyRecord {
    properties: Properties,
    key: FamilyKey,
    husband: Option<u32>,
    wife: Option<u32>,
    spouses: Vec<u32>,
    events: Vec<FamilyEvent>,
    children: Vec<Child>,
    warnings: Vec<String>,
}

impl FamilyRecord {
    pub fn key(&self) -> FamilyKey {
        self.key
    }

    pub fn husband(&self) -> Option<u32> {
        self.husband
    }

    pub fn wife(&self) -> Option<u32> {
        self.wife
    }

    /// Parents listed as SPOUSE on a remarriage page; their roles are unknown.
    pub fn spouses(&self) -> &[u32] {
        &self.spouses
    }

    pub fn events(&self) -> &[FamilyEvent] {
        &self.events
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }
}

impl ReportPage for FamilyRecord {
    const KIND: PageKind = PageKind::Family;

    fn parse(page: &str) -> Result<Self, ParseError> {
        let mut text = Unparsed::from_page(page);
        text.skip_blank_lines();
        let block = text
            .take_start(&PARENT_BLOCK_RE)
            .ok_or_else(|| ParseError::MissingParentBlock(text.as_str().trim_end().to_string()))?;
        let block = block.whole();

        let mut properties = Properties::default();
        let mut warnings = Vec::new();

        let (husband, wife, spouses) = parse_parents(block)?;
        let ids: Vec<u32> = husband.iter().chain(&wife).chain(&spouses).copied().collect();
        let key = family_key(&ids).ok_or_else(|| ParseError::NoParents(block.to_string()))?;
        for (label, id) in [("HUSBAND", husband), ("WIFE", wife)] {
            if let Some(id) = id {
                properties.insert(label, Value::Id(id));
            }
        }
        for &id in &spouses {
            properties.insert("SPOUSE", Value::Id(id));
        }

        let events = parse_family_events(block, key, &mut warnings)?;
        if !events.is_empty() {
            properties.insert("MARR", Value::FamilyEvents(events.clone()));
        }

        let children = take_children(&mut text, key, &mut warnings)?;
        text.check_consumed("family page")?;
        properties.insert("CHILDREN", Value::Children(children.clone()));

        Ok(FamilyRecord {
            properties,
            key,
            husband,
            wife,
            spouses,
            events,
            children,
            warnings,
        })
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn record_key(&self) -> RecordKey {
        RecordKey::Family(self.key)
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

type Parents = (Option<u32>, Option<u32>, Vec<u32>);

fn parse_parents(block: &str) -> Result<Parents, ParseError> {
    let lines: Vec<(&str, Option<u32>)> = PARENT_LINE_RE
        .captures_iter(block)
        .map(|caps| {
            let role = caps.get(1).map_or("", |m| m.as_str());
            let id = caps.get(2).and_then(|m| extract_id(m.as_str()));
            (role, id)
        })
        .collect();

    if lines.iter().any(|(role, _)| *role == "SPOUSE") {
        let spouses: Vec<u32> = lines
            .iter()
            .filter(|(role, _)| *role == "SPOUSE")
            .filter_map(|(_, id)| *id)
            .collect();
        return Ok((None, None, spouses));
    }

    let mut found = [None, None];
    for (slot, role) in ["HUSBAND", "WIFE"].into_iter().enumerate() {
        let Some((_, id)) = lines.iter().find(|(r, _)| *r == role) else {
            return Err(ParseError::MissingParentLine {
                role,
                block: block.trim_end().to_string(),
            });
        };
        found[slot] = *id;
    }
    Ok((found[0], found[1], Vec::new()))
}

fn parse_family_events(
    block: &str,
    key: FamilyKey,
    warnings: &mut Vec<String>,
) -> Result<Vec<FamilyEvent>, ParseError> {
    let Some(caps) = MARR_RE.captures(block) else {
        return Ok(Vec::new());
    };
    let line = caps.get(1).map_or("", |m| m.as_str());

    let mut events = Vec::new();
    for item in line.split(';').map(str::trim).filter(|item| !item.is_empty()) {
        let (kind, rest) = match MARR_ITEM_RE.captures(item) {
            Some(caps) if caps[1].eq_ignore_ascii_case("divorced") => {
                (EventKind::Divorce, caps.get(2).map_or("", |m| m.as_str()))
            }
            Some(caps) => (EventKind::Marriage, caps.get(2).map_or("", |m| m.as_str())),
            None => (EventKind::Marriage, item),
        };
        let value = parse_event_value(rest)?;
        if value.date2.is_some() {
            return Err(ParseError::UnexpectedSecondDate {
                field: "MARR".to_string(),
                text: item.to_string(),
            });
        }
        if let Some(place) = &value.place {
            warnings.push(format!("family {key}: text \"{place}\" after {} date ignored", kind.tag()));
        }
        let event = FamilyEvent {
            kind,
            date: value.date,
        };
        if !events.contains(&event) {
            events.push(event);
        }
    }
    Ok(events)
}

fn take_children(
    text: &mut Unparsed,
    key: FamilyKey,
    warnings: &mut Vec<String>,
) -> Result<Vec<Child>, ParseError> {
    let mut children: Vec<Child> = Vec::new();
    loop {
        text.skip_blank_lines();
        let Some(block) = text.take_start(&CHILD_BLOCK_RE) else {
            break;
        };
        let block = block.whole();
        let caps = CHILD_ROW_RE
            .captures(block)
            .ok_or_else(|| ParseError::UnexpectedChildRow(block.trim_end().to_string()))?;

        let name = caps.get(2).map_or("", |m| m.as_str().trim());
        if name.is_empty() {
            warnings.push(format!("family {key}: skipping blank child row"));
            continue;
        }
        let id = extract_id(name)
            .ok_or_else(|| ParseError::UnexpectedChildRow(block.trim_end().to_string()))?;
        let uncertain = &caps[1] == "?";
        if uncertain {
            warnings.push(format!("family {key}: parentage of child {id} is uncertain"));
        }
        let sex = Sex::from_letter(&caps[3]);

        match children.iter_mut().find(|child| child.id == id) {
            Some(child) => {
                child.sex = child.sex.or(sex);
                child.uncertain |= uncertain;
            }
            None => children.push(Child { id, sex, uncertain }),
        }
    }
    Ok(children)
}
