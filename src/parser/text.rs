use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::ParseError;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\n]+\n=+\n").unwrap());
static FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\nFrom: .+$").unwrap());

/// Captured groups of a structure chopped off the page.
#[derive(Debug, Clone)]
pub struct Taken {
    groups: Vec<Option<String>>,
}

impl Taken {
    fn from_captures(caps: &Captures<'_>) -> Self {
        Taken {
            groups: caps
                .iter()
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    pub fn whole(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.groups.get(idx).and_then(|g| g.as_deref())
    }
}

/// The part of a page no structure has claimed yet.
///
/// Parsers chop recognised structures off either end; whatever is left when
/// they are done is reported by [`Unparsed::check_consumed`].
#[derive(Debug, Clone)]
pub struct Unparsed {
    text: String,
}

impl Unparsed {
    /// Normalise line endings and drop the title/rule header and `From:` footer.
    pub fn from_page(raw: &str) -> Self {
        let text = raw.replace("\r\n", "\n");
        let text = HEADER_RE.replace(&text, "");
        let mut text = FOOTER_RE.replace(&text, "\n").into_owned();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Unparsed { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Chop a structure matching `re` at the very start of the text.
    pub fn take_start(&mut self, re: &Regex) -> Option<Taken> {
        let (taken, end) = {
            let caps = re.captures(&self.text)?;
            let m = caps.get(0)?;
            if m.start() != 0 {
                return None;
            }
            (Taken::from_captures(&caps), m.end())
        };
        self.text.drain(..end);
        Some(taken)
    }

    /// Chop a structure matching `re` that runs to the end of the text.
    pub fn take_end(&mut self, re: &Regex) -> Option<Taken> {
        let (taken, start) = {
            let caps = re.captures(&self.text)?;
            let m = caps.get(0)?;
            if m.end() != self.text.len() {
                return None;
            }
            (Taken::from_captures(&caps), m.start())
        };
        self.text.truncate(start);
        Some(taken)
    }

    /// Drop blank lines in front of the next structure.
    pub fn skip_blank_lines(&mut self) {
        let keep_from = self
            .text
            .char_indices()
            .scan(0, |line_start, (idx, c)| {
                if c == '\n' {
                    *line_start = idx + 1;
                    Some(None)
                } else if c.is_whitespace() {
                    Some(None)
                } else {
                    Some(Some(*line_start))
                }
            })
            .flatten()
            .next()
            .unwrap_or(self.text.len());
        self.text.drain(..keep_from);
    }

    pub fn is_consumed(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Every page must be read completely; leftovers mean an unknown shape.
    pub fn check_consumed(&self, section: &'static str) -> Result<(), ParseError> {
        if self.is_consumed() {
            Ok(())
        } else {
            Err(ParseError::Residue {
                section,
                text: self.text.trim_end().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Z]+): (.*)\n").unwrap());
    static TRAILER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\n-- END -+\n(.+)$").unwrap());

    #[test]
    fn strips_header_and_footer() {
        let text = Unparsed::from_page("PERSON REPORT\r\n=======\r\nNAME: x\r\nFrom: Family Edge Plus\r\n");
        assert_eq!(text.as_str(), "NAME: x\n");
    }

    #[test]
    fn no_header_is_fine() {
        let text = Unparsed::from_page("NAME: x\nAGE: 3");
        assert_eq!(text.as_str(), "NAME: x\nAGE: 3\n");
    }

    #[test]
    fn take_start_chops_prefix() {
        let mut text = Unparsed::from_page("NAME: x\nAGE: 3\n");
        let taken = text.take_start(&FIELD_RE).unwrap();
        assert_eq!(taken.get(1), Some("NAME"));
        assert_eq!(taken.get(2), Some("x"));
        assert_eq!(text.as_str(), "AGE: 3\n");
    }

    #[test]
    fn take_start_ignores_later_matches() {
        let mut text = Unparsed::from_page("junk\nNAME: x\n");
        assert!(text.take_start(&FIELD_RE).is_none());
        assert_eq!(text.as_str(), "junk\nNAME: x\n");
    }

    #[test]
    fn take_end_chops_suffix() {
        let mut text = Unparsed::from_page("NAME: x\n-- END ----\ntail\n");
        let taken = text.take_end(&TRAILER_RE).unwrap();
        assert_eq!(taken.get(1), Some("tail\n"));
        assert_eq!(text.as_str(), "NAME: x");
    }

    #[test]
    fn blank_lines_skipped() {
        let mut text = Unparsed::from_page("\n   \nNAME: x\n");
        text.skip_blank_lines();
        assert_eq!(text.as_str(), "NAME: x\n");
    }

    #[test]
    fn residue_reported() {
        let text = Unparsed::from_page("something odd\n");
        let err = text.check_consumed("page").unwrap_err();
        assert_eq!(
            err,
            ParseError::Residue {
                section: "page",
                text: "something odd".to_string()
            }
        );
    }

    #[test]
    fn whitespace_only_counts_as_consumed() {
        let text = Unparsed::from_page("\n  \n");
        assert!(text.check_consumed("page").is_ok());
    }
}
