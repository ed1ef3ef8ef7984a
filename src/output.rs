//! Serialization of a [`Material`] back into the on-disk layout.
//!
//! The three sections of a material file are emitted independently and
//! concatenated: the identifier and meta block go through the generic YAML
//! emitter, the references become a re-indented BibTeX literal block, and
//! the data section is walked by hand so each value record can pick its
//! own flow or block style. The result is deterministic and parses back
//! into an equal [`Material`].

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::material::{Material, ParamValue, ValueRecord};
use crate::refs;

/// Errors that can occur while serializing a material.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Failed to serialize YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to quote flow scalar: {0}")]
    Quote(#[from] serde_json::Error),
}

/// Serializes a material into its canonical on-disk text.
///
/// Layout, top to bottom: `ID`, the `meta` fields as block YAML, the
/// references as a literal block under `  references: |`, then the
/// hand-indented `data:` section. Parameter headers sit at two spaces,
/// citation keys at four, record fields at six; compound values are
/// emitted as inline flow mappings, scalar values in block style.
///
/// # Errors
///
/// Returns [`DumpError`] when a YAML value inside the record cannot be
/// serialized. For records produced by loading a file this does not
/// happen.
pub fn dump(material: &Material) -> Result<String, DumpError> {
    let mut text = meta_section(material)?;
    text.push_str(&references_section(material));
    text.push('\n');
    text.push_str(&data_section(material)?);
    Ok(text)
}

/// Emits `ID` plus the meta block, with `references` left out.
///
/// `ID` always comes first so re-emitted files keep a stable head line.
/// An empty meta block is emitted as a bare `meta:` header rather than an
/// inline `{}`, since the references block nests under it next.
fn meta_section(material: &Material) -> Result<String, DumpError> {
    let mut view = Mapping::new();
    view.insert(
        Value::String("ID".to_string()),
        Value::String(material.id.clone()),
    );

    if material.meta.is_empty() {
        let mut text = serde_yaml::to_string(&view)?;
        text.push_str("meta:\n");
        return Ok(text);
    }

    view.insert(
        Value::String("meta".to_string()),
        Value::Mapping(material.meta.clone()),
    );
    Ok(serde_yaml::to_string(&view)?)
}

/// Emits the citation records as a BibTeX literal block nested in `meta`.
///
/// The serialized BibTeX is indented to sit under a `  references: |`
/// header: four spaces on the first line, five on every following one, so
/// continuation lines of an entry land one column deeper than its head.
/// The blank line between entries stays blank and trailing space and
/// newlines are stripped; the caller terminates the block. With no
/// references only the header line remains, which parses back as an empty
/// string.
fn references_section(material: &Material) -> String {
    let bibtex = refs::to_bibtex(&material.references);

    let mut reindented = String::new();
    for (index, line) in bibtex.split('\n').enumerate() {
        if index == 0 {
            reindented.push_str("    ");
        } else if line.is_empty() {
            reindented.push('\n');
            continue;
        } else {
            reindented.push_str("\n     ");
        }
        reindented.push_str(line);
    }

    let block = format!("  references: |\n{reindented}");
    block.trim_end_matches(['\n', ' ']).to_string()
}

/// Emits the `data:` section by hand.
///
/// Headers are plain concatenation; each record body is rendered per its
/// value variant and then shifted six columns right.
fn data_section(material: &Material) -> Result<String, DumpError> {
    let mut text = String::from("data:\n");
    for (param, sources) in &material.data {
        text.push_str("  ");
        text.push_str(param);
        text.push_str(":\n");
        for (key, record) in sources {
            text.push_str("    ");
            text.push_str(key);
            text.push_str(":\n");
            text.push_str(&indent_block(&record_yaml(record)?, 6));
        }
    }
    Ok(text)
}

/// Renders one value record as YAML, `value` first.
///
/// Scalar values go through the block emitter together with their extras.
/// Compound values are rendered as an inline flow mapping on the `value`
/// line, with the extras following in block style.
fn record_yaml(record: &ValueRecord) -> Result<String, DumpError> {
    match &record.value {
        ParamValue::Scalar(value) => {
            let mut full = Mapping::new();
            full.insert(Value::String("value".to_string()), value.clone());
            for (name, extra) in &record.extras {
                full.insert(name.clone(), extra.clone());
            }
            Ok(serde_yaml::to_string(&full)?)
        }
        ParamValue::Compound(mapping) => {
            let mut text = format!("value: {}\n", flow_mapping(mapping)?);
            if !record.extras.is_empty() {
                text.push_str(&serde_yaml::to_string(&record.extras)?);
            }
            Ok(text)
        }
    }
}

/// Renders a mapping in inline flow style, `{a: 1, b: 2}`, recursively.
fn flow_mapping(mapping: &Mapping) -> Result<String, DumpError> {
    let mut parts = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        parts.push(format!("{}: {}", flow_value(key)?, flow_value(value)?));
    }
    Ok(format!("{{{}}}", parts.join(", ")))
}

/// Renders a sequence in inline flow style, `[1, 2]`.
fn flow_sequence(sequence: &[Value]) -> Result<String, DumpError> {
    let mut parts = Vec::with_capacity(sequence.len());
    for value in sequence {
        parts.push(flow_value(value)?);
    }
    Ok(format!("[{}]", parts.join(", ")))
}

/// Renders any YAML value so it can sit inside a flow collection.
///
/// Scalars go through the YAML emitter so quoting matches the block
/// sections. The emitter quotes for block context though: it spreads some
/// strings over several lines and leaves flow indicators (commas, braces,
/// brackets) bare, since block plain scalars may contain them. Both kinds
/// are JSON-quoted instead; JSON string escapes are valid YAML flow
/// scalars.
fn flow_value(value: &Value) -> Result<String, DumpError> {
    match value {
        Value::Mapping(mapping) => flow_mapping(mapping),
        Value::Sequence(sequence) => flow_sequence(sequence),
        scalar => {
            let text = serde_yaml::to_string(scalar)?;
            let text = text.trim_end_matches('\n');
            if text.contains('\n') || needs_flow_quoting(text) {
                Ok(serde_json::to_string(scalar)?)
            } else {
                Ok(text.to_string())
            }
        }
    }
}

/// Whether a block-emitted scalar would be misread inside a flow
/// collection. A plain scalar carrying a flow indicator must be requoted;
/// anything the emitter already quoted is safe as-is.
fn needs_flow_quoting(text: &str) -> bool {
    if text.starts_with('\'') || text.starts_with('"') {
        return false;
    }
    text.contains([',', '{', '}', '[', ']'])
}

/// Prefixes every non-empty line of emitter output with `indent` spaces.
///
/// Empty lines stay empty, so the block never carries dangling indent.
fn indent_block(text: &str, indent: usize) -> String {
    let prefix = " ".repeat(indent);
    let mut out = String::new();
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(&prefix);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}
