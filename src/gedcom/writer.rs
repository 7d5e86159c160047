//! Turns record trees into GEDCOM lines.
//!
//! Three pure passes run before rendering, in this order:
//! 1. a trailing `[NOTE: ...]` in a payload becomes a NOTE child,
//! 2. (Ancestry only) an event with no payload takes the text of its first NOTE,
//! 3. payloads are folded into CONT/CONC continuations to fit the line budget.

use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

use super::GedcomNode;
use crate::config::OutputFormat;
use crate::parser::fields::{collapse_whitespace, EVENT_TAGS};

static INLINE_NOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";? \[NOTE: ([^\]]+)\]$").unwrap());

const CONTINUATION_TAGS: [&str; 2] = ["CONC", "CONT"];

pub struct GedcomWriter {
    format: OutputFormat,
    max_line_length: usize,
}

impl GedcomWriter {
    pub fn new(format: OutputFormat, max_line_length: usize) -> Self {
        GedcomWriter {
            format,
            max_line_length,
        }
    }

    /// Apply every pass to a top-level record.
    pub fn prepare(&self, record: GedcomNode) -> GedcomNode {
        let record = extract_notes(record);
        let record = match self.format {
            OutputFormat::Ancestry => relocate_notes(record),
            OutputFormat::Standard => record,
        };
        fold(record, 0, self.max_line_length)
    }

    fn write_record(&self, out: &mut String, record: GedcomNode) {
        render(out, &self.prepare(record), 0);
    }

    pub fn render_all(&self, records: impl IntoIterator<Item = GedcomNode>) -> String {
        let mut out = String::new();
        for record in records {
            self.write_record(&mut out, record);
        }
        out
    }
}

/// Collapse runs of blanks within each line; line breaks are kept.
fn normalize_whitespace(text: &str) -> String {
    text.lines().map(collapse_whitespace).join("\n")
}

pub fn extract_notes(mut node: GedcomNode) -> GedcomNode {
    if let Some(payload) = node.payload.take() {
        let mut payload = normalize_whitespace(&payload);
        let is_note = node.tag == "NOTE" || CONTINUATION_TAGS.contains(&node.tag);
        let mut note = None;
        if !is_note {
            if let Some(caps) = INLINE_NOTE_RE.captures(&payload) {
                note = Some(caps[1].to_string());
                let start = caps.get(0).map_or(payload.len(), |m| m.start());
                payload.truncate(start);
            }
        }
        node.payload = Some(payload);
        if let Some(note) = note {
            node.children.push(GedcomNode::with_payload("NOTE", note));
        }
    }
    node.children = node.children.into_iter().map(extract_notes).collect();
    node
}

/// Ancestry.com reads an event's description from its payload rather than from a NOTE.
pub fn relocate_notes(mut node: GedcomNode) -> GedcomNode {
    let empty = node.payload.as_deref().map_or(true, str::is_empty);
    if empty && EVENT_TAGS.contains(&node.tag) {
        if let Some(idx) = node.children.iter().position(|child| child.tag == "NOTE") {
            let note = node.children.remove(idx);
            node.payload = note.payload.map(|text| collapse_whitespace(&text));
        }
    }
    node.children = node.children.into_iter().map(relocate_notes).collect();
    node
}

/// Room left for the payload on a line at `level`.
fn payload_budget(max: usize, level: usize, pointer: Option<&str>, tag: &str) -> usize {
    let mut overhead = level.to_string().len() + 1 + tag.len() + 1;
    if let Some(pointer) = pointer {
        overhead += pointer.len() + 1;
    }
    max.saturating_sub(overhead).max(1)
}

/// Cut `text` into chunks of at most `first` chars, then `rest` chars.
///
/// Breaks go just before a space so each chunk ends in a non-space and the
/// chunks concatenate back to `text`. A word longer than the budget is split hard.
fn chunk(text: &str, first: usize, rest: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    let mut width = first;
    loop {
        let chars: Vec<(usize, char)> = remaining.char_indices().collect();
        if chars.len() <= width {
            chunks.push(remaining.to_string());
            return chunks;
        }
        let cut = (1..=width)
            .rev()
            .find(|&i| chars[i].1 == ' ' && chars[i - 1].1 != ' ')
            .unwrap_or(width);
        let byte = chars[cut].0;
        chunks.push(remaining[..byte].to_string());
        remaining = &remaining[byte..];
        width = rest;
    }
}

/// Split payloads that do not fit into continuation children.
///
/// Line breaks become CONT; overflow becomes CONC. Continuations are placed
/// before the node's own children.
pub fn fold(mut node: GedcomNode, level: usize, max: usize) -> GedcomNode {
    let mut continuations = Vec::new();
    if let Some(payload) = node.payload.take() {
        let first = payload_budget(max, level, node.pointer.as_deref(), node.tag);
        let conc = payload_budget(max, level + 1, None, "CONC");
        let cont = payload_budget(max, level + 1, None, "CONT");

        let mut lines = payload.split('\n');
        let head = lines.next().unwrap_or_default();
        let mut pieces = chunk(head, first, conc).into_iter();
        node.payload = pieces.next();
        continuations.extend(pieces.map(|piece| GedcomNode::with_payload("CONC", piece)));

        for line in lines {
            let mut pieces = chunk(line, cont, conc).into_iter();
            if let Some(piece) = pieces.next() {
                continuations.push(GedcomNode::with_payload("CONT", piece));
            }
            continuations.extend(pieces.map(|piece| GedcomNode::with_payload("CONC", piece)));
        }
    }
    let children = std::mem::take(&mut node.children);
    node.children = continuations
        .into_iter()
        .chain(children.into_iter().map(|child| fold(child, level + 1, max)))
        .collect();
    node
}

fn render(out: &mut String, node: &GedcomNode, level: usize) {
    out.push_str(&level.to_string());
    if let Some(pointer) = &node.pointer {
        out.push(' ');
        out.push_str(pointer);
    }
    out.push(' ');
    out.push_str(node.tag);
    if let Some(payload) = node.payload.as_deref().filter(|p| !p.is_empty()) {
        out.push(' ');
        out.push_str(payload);
    }
    out.push('\n');
    for child in &node.children {
        render(out, child, level + 1);
    }
}
