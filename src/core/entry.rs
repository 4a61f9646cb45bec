//! Entry trees parsed from generator output
//!
//! An `Entry` is one node of the generated boot menu: a `menuentry` block,
//! a `submenu` block with children, a plaintext preamble, or the synthetic
//! root that holds a script's toplevel entries. Entries are owned by their
//! parent; everything else refers to them through a process-unique
//! `EntryId`.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an entry, stable for the entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntryId(u64);

impl EntryId {
    pub fn fresh() -> Self {
        EntryId(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    /// A concrete `menuentry` block.
    Menu,
    /// A `submenu` block holding child entries.
    Submenu,
    /// Free text that precedes the first entry of a script section.
    Plaintext,
    /// The synthetic root of a script's entry tree.
    Root,
}

#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub name: String,
    /// Raw text between the closing title quote and the opening brace
    /// (`--class ubuntu` and friends). Preserved verbatim for re-emission.
    pub extension: String,
    /// The block body, excluding nested menuentry blocks' braces.
    pub content: String,
    /// The quote character the generator used around the title.
    pub quote: char,
    pub is_valid: bool,
    pub is_modified: bool,
    pub children: Vec<Entry>,
}

impl Entry {
    pub fn new(kind: EntryKind, name: impl Into<String>) -> Self {
        Entry {
            id: EntryId::fresh(),
            kind,
            name: name.into(),
            extension: String::new(),
            content: String::new(),
            quote: '\'',
            is_valid: true,
            is_modified: false,
            children: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Entry::new(EntryKind::Root, "")
    }

    pub fn menu(name: impl Into<String>, extension: impl Into<String>, content: impl Into<String>) -> Self {
        let mut e = Entry::new(EntryKind::Menu, name);
        e.extension = extension.into();
        e.content = content.into();
        e
    }

    pub fn plaintext(content: impl Into<String>) -> Self {
        let mut e = Entry::new(EntryKind::Plaintext, "#text");
        e.content = content.into();
        e
    }

    /// Truncated hex digest of the body, the wire `~hash~` identity.
    /// Empty bodies have no identity.
    pub fn content_hash(&self) -> Option<String> {
        content_hash(&self.content)
    }
}

/// 32-hex-digit truncated BLAKE3 digest used as content identity.
pub fn content_hash(content: &str) -> Option<String> {
    if content.is_empty() {
        return None;
    }
    let digest = blake3::hash(content.as_bytes());
    Some(digest.to_hex().as_str()[..32].to_string())
}

/// Line cursor over generator output with one-row pushback.
pub struct Rows<I: Iterator<Item = io::Result<String>>> {
    lines: I,
    pending: Option<String>,
}

impl<R: BufRead> Rows<io::Lines<R>> {
    pub fn new(reader: R) -> Self {
        Rows { lines: reader.lines(), pending: None }
    }
}

impl<I: Iterator<Item = io::Result<String>>> Rows<I> {
    pub fn from_lines(lines: I) -> Self {
        Rows { lines, pending: None }
    }

    pub fn next_row(&mut self) -> io::Result<Option<String>> {
        if let Some(row) = self.pending.take() {
            return Ok(Some(row));
        }
        match self.lines.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Returns a row to the cursor; the next `next_row` yields it again.
    pub fn push_back(&mut self, row: String) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(row);
    }
}

/// True if `row` opens a block this module can parse.
pub fn starts_block(row: &str) -> bool {
    let t = row.trim_start();
    t.starts_with("menuentry ") || t.starts_with("submenu ")
}

impl Entry {
    /// Parses one `menuentry` or `submenu` block. `first_row` is the row
    /// that opened the block; the body is consumed from `rows` up to the
    /// matching closing brace.
    pub fn parse_block<I: Iterator<Item = io::Result<String>>>(
        first_row: &str,
        rows: &mut Rows<I>,
    ) -> io::Result<Entry> {
        let t = first_row.trim_start();
        if t.starts_with("submenu ") {
            Entry::parse_submenu(t, rows)
        } else {
            Entry::parse_menuentry(t, rows)
        }
    }

    fn parse_menuentry<I: Iterator<Item = io::Result<String>>>(
        row: &str,
        rows: &mut Rows<I>,
    ) -> io::Result<Entry> {
        let (name, quote, after_name) = split_title(row, "menuentry ");
        let mut extension = after_name;
        // the opening brace is the last char of the head row
        if extension.ends_with('{') {
            extension.pop();
        }

        let mut entry = Entry::menu(name, extension, "");
        entry.quote = quote;
        entry.is_valid = false;

        // Nested menuentry blocks belong to the body verbatim; track the
        // nesting level so their closing braces don't end this block.
        let mut depth = 1u32;
        while let Some(body_row) = rows.next_row()? {
            if body_row.trim() == "}" {
                depth -= 1;
                if depth == 0 {
                    entry.is_valid = true;
                    break;
                }
            } else if body_row.trim_start().starts_with("menuentry ") {
                depth += 1;
            }
            entry.content.push_str(&body_row);
            entry.content.push('\n');
        }
        Ok(entry)
    }

    fn parse_submenu<I: Iterator<Item = io::Result<String>>>(
        row: &str,
        rows: &mut Rows<I>,
    ) -> io::Result<Entry> {
        let (name, quote, _) = split_title(row, "submenu ");
        let mut entry = Entry::new(EntryKind::Submenu, name);
        entry.quote = quote;
        entry.is_valid = false;

        while let Some(child_row) = rows.next_row()? {
            if starts_block(&child_row) {
                entry.children.push(Entry::parse_block(&child_row, rows)?);
            } else if child_row.trim() == "}" {
                entry.is_valid = true;
                break;
            }
        }
        Ok(entry)
    }
}

/// Splits a block head row into (title, quote char, text after the closing
/// quote). Double quotes win when both appear, matching the generator.
fn split_title(row: &str, keyword: &str) -> (String, char, String) {
    let rest = &row[keyword.len()..];
    let quote = if rest.starts_with('"') { '"' } else { '\'' };
    let inner = &rest[1..];
    match inner.find(quote) {
        Some(end) => {
            let name = inner[..end].to_string();
            let after = inner[end + 1..].trim_end().to_string();
            (name, quote, after)
        }
        None => (inner.trim_end().to_string(), quote, String::new()),
    }
}
