//! BibTeX citation handling.
//!
//! Material files embed their bibliography as a single BibTeX string under
//! `meta.references`. This module parses that string into citation records
//! keyed by citation key, and serializes such records back into canonical
//! BibTeX text.

use indexmap::IndexMap;
use nom_bibtex::{Bibliography, Bibtex};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when parsing embedded BibTeX.
#[derive(Error, Debug)]
pub enum CitationError {
    #[error("Invalid BibTeX: {0}")]
    Parse(String),
}

/// Citation records keyed by citation key, in source order.
pub type ReferenceMap = IndexMap<String, Reference>;

/// A single parsed BibTeX entry, minus its citation key.
///
/// The citation key lives in the surrounding [`ReferenceMap`]; the record
/// itself only carries the entry type and the fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    entry_type: String,
    fields: IndexMap<String, String>,
}

impl Reference {
    /// Creates a reference of the given entry type with no fields.
    ///
    /// The entry type is lowercased, so `Article` and `article` compare
    /// equal after parsing.
    pub fn new(entry_type: impl Into<String>) -> Self {
        Reference {
            entry_type: entry_type.into().to_lowercase(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field insertion, convenient for tests and tooling.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Inserts or replaces a field. Field names are lowercased; a value
    /// wrapped over several lines is folded onto one, since line breaks
    /// inside a BibTeX value carry no meaning and the writer emits one
    /// line per field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let value = if value.contains(['\n', '\r']) {
            value.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            value
        };
        self.fields.insert(name.into().to_lowercase(), value);
    }

    /// The lowercased entry type (e.g. `article`, `misc`).
    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    /// Looks up a field by lowercased name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// All fields in source order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the reference has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parses a BibTeX string into a [`ReferenceMap`].
///
/// Each entry is rekeyed by its citation key; entry types and field names
/// are lowercased while citation keys are kept verbatim. Fields keep
/// their on-disk order, recovered from the raw text since the parser
/// reports tags in an order of its own. A duplicate citation key
/// overwrites the fields of the earlier entry but keeps its position.
///
/// # Returns
///
/// The parsed citations in source order. Empty or whitespace-only input
/// yields an empty map.
///
/// # Errors
///
/// Returns [`CitationError::Parse`] when the input is not valid BibTeX.
pub fn parse_references(bibtex: &str) -> Result<ReferenceMap, CitationError> {
    if bibtex.trim().is_empty() {
        return Ok(ReferenceMap::new());
    }

    let parsed = Bibtex::parse(bibtex).map_err(|e| CitationError::Parse(e.to_string()))?;
    let entries = parsed.bibliographies();
    let starts = entry_starts(bibtex, entries);

    let mut references = ReferenceMap::new();
    for (index, entry) in entries.iter().enumerate() {
        let end = starts.get(index + 1).copied().unwrap_or(bibtex.len());
        let body = &bibtex[starts[index]..end];
        let mut reference = Reference::new(entry.entry_type());
        for (name, value) in ordered_tags(body, entry.tags()) {
            reference.set(name, value);
        }
        references.insert(entry.citation_key().to_string(), reference);
    }
    Ok(references)
}

/// Byte offset where each entry begins, in source order.
///
/// Keys are looked up left to right, preferring the `{key` form that
/// follows the entry type, so a key mentioned inside an earlier value
/// does not shift the boundaries.
fn entry_starts(bibtex: &str, entries: &[Bibliography]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(entries.len());
    let mut cursor = 0;
    for entry in entries {
        let key = entry.citation_key();
        let braced = format!("{{{key}");
        let start = bibtex[cursor..]
            .find(&braced)
            .or_else(|| bibtex[cursor..].find(key))
            .map(|found| cursor + found)
            .unwrap_or(cursor);
        starts.push(start);
        cursor = start + key.len();
    }
    starts
}

/// Tags in on-disk order. nom-bibtex hands tags back in an order of its
/// own, so each field name is located in the raw entry text and the tags
/// are sorted by that position. Names the text never shows as a field
/// sort last, keeping their reported order.
fn ordered_tags<'a>(body: &str, tags: &'a [(String, String)]) -> Vec<(&'a str, &'a str)> {
    let haystack = body.to_lowercase();
    let mut positioned: Vec<(usize, &'a str, &'a str)> = tags
        .iter()
        .map(|(name, value)| {
            let position = field_position(&haystack, &name.to_lowercase());
            (position, name.as_str(), value.as_str())
        })
        .collect();
    positioned.sort_by_key(|&(position, _, _)| position);
    positioned
        .into_iter()
        .map(|(_, name, value)| (name, value))
        .collect()
}

/// First occurrence of `name` used as a field: standing alone and
/// followed by `=`.
fn field_position(haystack: &str, name: &str) -> usize {
    let mut from = 0;
    while let Some(found) = haystack[from..].find(name) {
        let at = from + found;
        let alone = haystack[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        let rest = &haystack[at + name.len()..];
        if alone && rest.trim_start().starts_with('=') {
            return at;
        }
        from = at + name.len();
    }
    usize::MAX
}

/// Serializes a [`ReferenceMap`] back into BibTeX text.
///
/// Layout per entry: `@type{key,` on the first line, one `name = {value}`
/// field per line at a one-space indent, no comma after the last field, and
/// the closing brace on its own line. Entries are separated by a blank line
/// and the result ends with a newline. An empty map yields an empty string.
pub fn to_bibtex(references: &ReferenceMap) -> String {
    if references.is_empty() {
        return String::new();
    }

    let mut entries = Vec::with_capacity(references.len());
    for (key, reference) in references {
        let mut entry = format!("@{}{{{}", reference.entry_type(), key);
        for (name, value) in reference.fields() {
            entry.push_str(",\n ");
            entry.push_str(name);
            entry.push_str(" = {");
            entry.push_str(value);
            entry.push('}');
        }
        entry.push_str("\n}");
        entries.push(entry);
    }

    let mut text = entries.join("\n\n");
    text.push('\n');
    text
}
