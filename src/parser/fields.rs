//! Stateless extractors shared by the person and family page parsers.

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use itertools::Itertools;
use regex::{Captures, Regex};
use serde::{Serialize, Serializer};

use crate::config::OutputFormat;
use crate::error::ParseError;

static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(#(\d+)\)").unwrap());

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// qualifier, day, month, year, dual year, `(?)`
const DATE_PATTERN: &str = r"(?:(?i:(circa|roughly|before|after)) )?(?:(?:(\d{1,2}) )?(?i:(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)) )?(\d{4})(?:/(\d{1,2}))?(?: ?(\(\?\)))?";

static LEADING_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^{DATE_PATTERN}(?:[,;.]?(?:\s+|$))")).unwrap());
static FULL_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^{DATE_PATTERN}$")).unwrap());
static FIND_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b{DATE_PATTERN}\b")).unwrap());
/// Text that starts like a date but failed the grammar is malformed, not a place.
static DATEISH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:(?:circa|roughly|before|after) |\d{1,2} [a-z]+\.? \d|\d{4}/)").unwrap()
});
static SECOND_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\((?:[A-Za-z]+\.? )?((?:\d{1,2} )?(?:[A-Za-z]{3} )?\d{4}(?:/\d{1,2})?)\)")
        .unwrap()
});

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)(?: ([JS]r|I+|IV|VI*))?\.? \(#(\d+)\)$").unwrap()
});
static SURNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z'-]{2,}(?:\b \b[A-Z'-]{2,})*$|\?{3}$").unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\W_]+").unwrap());
static MC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bMc([a-z])").unwrap());

/// First `(#123)` id in the text.
pub fn extract_id(text: &str) -> Option<u32> {
    ID_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Every distinct `(#123)` id in order of appearance.
pub fn extract_ids(text: &str) -> Vec<u32> {
    ID_RE
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .unique()
        .collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    pub fn from_letter(letter: &str) -> Option<Sex> {
        match letter {
            "M" => Some(Sex::Male),
            "F" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn letter(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    About,
    Estimated,
    Before,
    After,
}

impl Qualifier {
    fn from_word(word: &str) -> Option<Qualifier> {
        match word.to_ascii_lowercase().as_str() {
            "circa" => Some(Qualifier::About),
            "roughly" => Some(Qualifier::Estimated),
            "before" => Some(Qualifier::Before),
            "after" => Some(Qualifier::After),
            _ => None,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Qualifier::About => "ABT",
            Qualifier::Estimated => "EST",
            Qualifier::Before => "BEF",
            Qualifier::After => "AFT",
        }
    }
}

/// A report date: `[qualifier] [[day] month] year[/dual][(?)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateExpr {
    pub qualifier: Option<Qualifier>,
    pub day: Option<u8>,
    pub month: Option<u8>,
    pub year: u16,
    pub dual_year: Option<String>,
    pub uncertain: bool,
}

impl DateExpr {
    fn from_captures(caps: &Captures<'_>) -> Option<DateExpr> {
        let month = caps.get(3).and_then(|m| {
            let upper = m.as_str().to_ascii_uppercase();
            MONTHS.iter().position(|&name| name == upper)
        });
        Some(DateExpr {
            qualifier: caps.get(1).and_then(|m| Qualifier::from_word(m.as_str())),
            day: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            month: month.map(|idx| idx as u8 + 1),
            year: caps.get(4)?.as_str().parse().ok()?,
            dual_year: caps.get(5).map(|m| m.as_str().to_string()),
            uncertain: caps.get(6).is_some(),
        })
    }

    /// Render in the requested flavour; standard GEDCOM uses upper case.
    pub fn render(&self, format: OutputFormat) -> String {
        let mut parts = Vec::new();
        let qualifier = self
            .qualifier
            .or(self.uncertain.then_some(Qualifier::About));
        if let Some(q) = qualifier {
            parts.push(match format {
                OutputFormat::Standard => q.keyword().to_string(),
                OutputFormat::Ancestry => q.keyword().to_ascii_lowercase(),
            });
        }
        if let Some(day) = self.day {
            parts.push(day.to_string());
        }
        if let Some(month) = self.month {
            let name = MONTHS[usize::from(month - 1)];
            parts.push(match format {
                OutputFormat::Standard => name.to_string(),
                OutputFormat::Ancestry => {
                    let (first, rest) = name.split_at(1);
                    format!("{}{}", first, rest.to_ascii_lowercase())
                }
            });
        }
        let year = match &self.dual_year {
            // GEDCOM wants two digits after the slash
            Some(dual) if dual.len() == 1 => {
                format!("{}/{:02}", self.year, (self.year + 1) % 100)
            }
            Some(dual) => format!("{}/{}", self.year, dual),
            None => self.year.to_string(),
        };
        parts.push(year);
        parts.join(" ")
    }
}

impl fmt::Display for DateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(OutputFormat::Standard))
    }
}

impl Serialize for DateExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse text that must be a date and nothing else.
pub fn parse_date(text: &str) -> Result<DateExpr, ParseError> {
    FULL_DATE_RE
        .captures(text.trim())
        .and_then(|caps| DateExpr::from_captures(&caps))
        .ok_or_else(|| ParseError::InvalidDate(text.to_string()))
}

/// First date found anywhere in free text, with where it was found.
pub fn find_date(text: &str) -> Option<(DateExpr, Range<usize>)> {
    let caps = FIND_DATE_RE.captures(text)?;
    let span = caps.get(0)?.range();
    Some((DateExpr::from_captures(&caps)?, span))
}

/// Date and place decomposed from an event field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EventValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateExpr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date2: Option<DateExpr>,
}

/// Split `12 Jan 1900 Some City (proved 3 Mar 1901)` into its parts.
pub fn parse_event_value(text: &str) -> Result<EventValue, ParseError> {
    let text = collapse_whitespace(text);
    let (date, rest) = match LEADING_DATE_RE.captures(&text) {
        Some(caps) => {
            let date = DateExpr::from_captures(&caps)
                .ok_or_else(|| ParseError::InvalidDate(text.clone()))?;
            let end = caps.get(0).map_or(0, |m| m.end());
            (Some(date), &text[end..])
        }
        None if DATEISH_RE.is_match(&text) => return Err(ParseError::InvalidDate(text.clone())),
        None => (None, text.as_str()),
    };

    let mut date2 = None;
    let mut place = rest.to_string();
    if let Some(caps) = SECOND_DATE_RE.captures(rest) {
        date2 = Some(parse_date(&caps[1])?);
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        place.replace_range(whole, "");
    }
    let place = place
        .trim()
        .trim_end_matches('.')
        .trim_matches(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .to_string();

    Ok(EventValue {
        date,
        place: (!place.is_empty()).then_some(place),
        date2,
    })
}

/// The kinds of events the reports carry, keyed by their field labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Birth,
    Death,
    Burial,
    Christening,
    Residence,
    Will,
    WillEstate,
    Probate,
    Marriage,
    Divorce,
    Adoption,
}

impl EventKind {
    pub fn from_label(label: &str) -> Option<EventKind> {
        match label {
            "BORN" => Some(EventKind::Birth),
            "DIED" => Some(EventKind::Death),
            "BURIED" => Some(EventKind::Burial),
            "CHRISTENED" => Some(EventKind::Christening),
            "LOCATION" => Some(EventKind::Residence),
            "WILL" => Some(EventKind::Will),
            "WILL/ESTATE" => Some(EventKind::WillEstate),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            EventKind::Birth => "BIRT",
            EventKind::Death => "DEAT",
            EventKind::Burial => "BURI",
            EventKind::Christening => "CHR",
            EventKind::Residence => "RESI",
            EventKind::Will => "WILL",
            EventKind::WillEstate | EventKind::Probate => "PROB",
            EventKind::Marriage => "MARR",
            EventKind::Divorce => "DIV",
            EventKind::Adoption => "ADOP",
        }
    }

    /// Only wills may carry a second, probate date.
    pub fn allows_probate_date(self) -> bool {
        self == EventKind::Will
    }
}

/// Tags of every event record; used to find events in a built tree.
pub const EVENT_TAGS: &[&str] = &[
    "BIRT", "DEAT", "BURI", "CHR", "RESI", "WILL", "PROB", "MARR", "DIV", "ADOP",
];

/// Turn `John Henry SMITH Jr. (#5)` into the GEDCOM name `John Henry /Smith/ Jr`.
pub fn parse_name(text: &str) -> Result<(String, u32), ParseError> {
    let caps = NAME_RE
        .captures(text.trim())
        .ok_or_else(|| ParseError::UnexpectedName(text.to_string()))?;
    let id: u32 = caps[3]
        .parse()
        .map_err(|_| ParseError::UnexpectedName(text.to_string()))?;

    let name = SURNAME_RE.replace(&caps[1], |m: &Captures<'_>| {
        format!("/{}/", title_case(&m[0]))
    });
    let mut name = name
        .strip_suffix(" /???/")
        .unwrap_or(&*name)
        .to_string();
    if let Some(rest) = name.strip_prefix("??? ") {
        name = rest.to_string();
    }
    if let Some(suffix) = caps.get(2) {
        name.push(' ');
        name.push_str(suffix.as_str());
    }
    Ok((name, id))
}

fn title_case(text: &str) -> String {
    let words = WORD_RE.replace_all(text, |m: &Captures<'_>| {
        let mut chars = m[0].chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        }
    });
    MC_RE
        .replace_all(&words, |m: &Captures<'_>| format!("Mc{}", m[1].to_uppercase()))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids() {
        assert_eq!(extract_id("John SMITH (#5)"), Some(5));
        assert_eq!(extract_id("John SMITH"), None);
        assert_eq!(
            extract_ids("Mary (#4), Ann (#9) and Mary again (#4)"),
            vec![4, 9]
        );
    }

    #[test]
    fn simple_event() {
        let value = parse_event_value("12 Jan 1900 Some City").unwrap();
        assert_eq!(value.date.unwrap().to_string(), "12 JAN 1900");
        assert_eq!(value.place.as_deref(), Some("Some City"));
        assert!(value.date2.is_none());
    }

    #[test]
    fn qualified_dates() {
        let cases = [
            ("circa 1850 Boston", "ABT 1850"),
            ("roughly Mar 1850", "EST MAR 1850"),
            ("before 3 Mar 1801", "BEF 3 MAR 1801"),
            ("after 1790", "AFT 1790"),
            ("1850(?) Boston", "ABT 1850"),
            ("Circa 1850", "ABT 1850"),
        ];
        for (text, expected) in cases {
            let value = parse_event_value(text).unwrap();
            assert_eq!(value.date.unwrap().to_string(), expected, "{text}");
        }
    }

    #[test]
    fn dual_year_expanded() {
        let date = parse_date("12 Feb 1801/2").unwrap();
        assert_eq!(date.to_string(), "12 FEB 1801/02");
        let date = parse_date("1699/0").unwrap();
        assert_eq!(date.to_string(), "1699/00");
        let date = parse_date("1750/51").unwrap();
        assert_eq!(date.to_string(), "1750/51");
    }

    #[test]
    fn ancestry_rendering() {
        let date = parse_date("circa 12 Jan 1900").unwrap();
        assert_eq!(date.render(OutputFormat::Ancestry), "abt 12 Jan 1900");
        assert_eq!(date.render(OutputFormat::Standard), "ABT 12 JAN 1900");
    }

    #[test]
    fn place_only() {
        let value = parse_event_value("Boston, MA").unwrap();
        assert!(value.date.is_none());
        assert_eq!(value.place.as_deref(), Some("Boston, MA"));
    }

    #[test]
    fn date_only() {
        let value = parse_event_value("1900.").unwrap();
        assert_eq!(value.date.unwrap().year, 1900);
        assert!(value.place.is_none());
    }

    #[test]
    fn malformed_date_rejected() {
        assert!(matches!(
            parse_event_value("circa sometime Boston"),
            Err(ParseError::InvalidDate(_))
        ));
        assert!(matches!(
            parse_event_value("12 Foo 1900 Boston"),
            Err(ParseError::InvalidDate(_))
        ));
        assert!(parse_date("next year").is_err());
    }

    #[test]
    fn second_date_split_out() {
        let value = parse_event_value("4 Jun 1801 (proved 3 Mar 1802) Fairfax Co., VA").unwrap();
        assert_eq!(value.date.unwrap().to_string(), "4 JUN 1801");
        assert_eq!(value.date2.unwrap().to_string(), "3 MAR 1802");
        assert_eq!(value.place.as_deref(), Some("Fairfax Co., VA"));
    }

    #[test]
    fn find_date_in_annotation() {
        let (date, span) = find_date("adopted 5 May 1862 by the Joneses").unwrap();
        assert_eq!(date.to_string(), "5 MAY 1862");
        assert_eq!(span, 8..18);
        assert!(find_date("adopted").is_none());
    }

    #[test]
    fn names() {
        assert_eq!(parse_name("John SMITH (#5)").unwrap(), ("John /Smith/".to_string(), 5));
        assert_eq!(
            parse_name("John Henry SMITH Jr. (#12)").unwrap(),
            ("John Henry /Smith/ Jr".to_string(), 12)
        );
        assert_eq!(parse_name("Mary VAN BUREN (#7)").unwrap().0, "Mary /Van Buren/");
        assert_eq!(parse_name("Angus MCDONALD (#8)").unwrap().0, "Angus /McDonald/");
        assert_eq!(parse_name("Pat O'BRIEN (#9)").unwrap().0, "Pat /O'Brien/");
        assert_eq!(parse_name("Mary ??? (#10)").unwrap().0, "Mary");
        assert_eq!(parse_name("??? JONES (#11)").unwrap().0, "/Jones/");
        assert_eq!(parse_name("Henry TUDOR VIII (#13)").unwrap().0, "Henry /Tudor/ VIII");
    }

    #[test]
    fn name_without_id_rejected() {
        assert!(matches!(
            parse_name("John SMITH"),
            Err(ParseError::UnexpectedName(_))
        ));
    }
}
