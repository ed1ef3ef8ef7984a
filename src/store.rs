//! Loading material files from a base directory.
//!
//! A [`MaterialStore`] resolves a material identifier to `<base>/<id>.yml`,
//! reads the file and turns it into a [`Material`]: the `meta.references`
//! BibTeX blob is parsed into citation records, every `data` leaf becomes a
//! typed [`ValueRecord`], and the identifier replaces whatever `ID` the
//! file body may carry.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{error, info, info_span, warn, Span};

use crate::material::{DataMap, Material, ParamValue, ParameterMap, ValueRecord};
use crate::refs::{self, CitationError};

/// Errors that can occur when loading a material file.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Base path '{}' does not exist", path.display())]
    BasePath { path: PathBuf },

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Citation(#[from] CitationError),

    #[error("Malformed material: expected {expected} at '{path}'")]
    Shape { path: String, expected: &'static str },
}

impl StoreError {
    fn shape(path: impl Into<String>, expected: &'static str) -> Self {
        StoreError::Shape {
            path: path.into(),
            expected,
        }
    }
}

/// Loads material files from a base directory.
///
/// Construction is two-phase: [`MaterialStore::open`] fails up front when
/// the base directory is missing, while [`MaterialStore::new`] only records
/// the path (logging an error), so the failure surfaces on the first
/// [`load`](MaterialStore::load) instead.
#[derive(Debug, Clone)]
pub struct MaterialStore {
    base_path: PathBuf,
    span: Span,
}

impl MaterialStore {
    /// Creates a store, verifying that `base_path` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BasePath`] when the directory is missing.
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            return Err(StoreError::BasePath { path: base_path });
        }
        Ok(Self::configure(base_path))
    }

    /// Creates a store without verifying the base directory.
    ///
    /// A missing directory is logged as an error here and reported as an
    /// I/O error by the first `load`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        if !base_path.exists() {
            error!(path = %base_path.display(), "material base path does not exist");
        }
        Self::configure(base_path)
    }

    fn configure(base_path: PathBuf) -> Self {
        let span = info_span!("material_store", base = %base_path.display());
        span.in_scope(|| info!("base path set"));
        MaterialStore { base_path, span }
    }

    /// The configured base directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// The on-disk path a material identifier resolves to.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{name}.yml"))
    }

    /// Loads `<base>/<name>.yml` into a fresh [`Material`].
    ///
    /// Loading has no side effects on the store, so repeated calls for the
    /// same identifier return equal records.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, is not valid YAML,
    /// carries invalid BibTeX under `meta.references`, or does not have the
    /// material shape.
    pub fn load(&self, name: &str) -> Result<Material, StoreError> {
        let _guard = self.span.enter();
        let path = self.resolve(name);
        info!(path = %path.display(), "loading material file");

        let text = fs::read_to_string(&path)?;
        let material = parse_material(name, &text)?;

        info!(
            references = material.references.len(),
            parameters = material.data.len(),
            "material loaded"
        );
        Ok(material)
    }
}

/// Parses material file contents without touching the filesystem.
///
/// `name` becomes the record's identifier; an `ID` key in the text is
/// dropped, other unexpected top-level keys are skipped with a warning.
///
/// # Errors
///
/// Same conditions as [`MaterialStore::load`], minus the I/O.
pub fn parse_material(name: &str, text: &str) -> Result<Material, StoreError> {
    let document: Value = serde_yaml::from_str(text)?;
    let Value::Mapping(mut root) = document else {
        return Err(StoreError::shape("document", "a mapping"));
    };

    let mut meta = match root.shift_remove("meta") {
        Some(Value::Mapping(meta)) => meta,
        _ => return Err(StoreError::shape("meta", "a mapping")),
    };

    let references = match meta.shift_remove("references") {
        Some(Value::String(bibtex)) => refs::parse_references(&bibtex)?,
        _ => return Err(StoreError::shape("meta.references", "a BibTeX string")),
    };
    info!(count = references.len(), "parsed embedded references");

    let data = match root.shift_remove("data") {
        Some(Value::Mapping(data)) => parse_data(data)?,
        Some(Value::Null) => DataMap::new(),
        _ => return Err(StoreError::shape("data", "a mapping")),
    };

    root.shift_remove("ID");
    for key in root.keys() {
        warn!(key = ?key, "ignoring unexpected top-level key");
    }

    Ok(Material {
        id: name.to_string(),
        meta,
        references,
        data,
    })
}

fn parse_data(data: Mapping) -> Result<DataMap, StoreError> {
    let mut parameters = DataMap::new();
    for (param_key, param_value) in data {
        let param = scalar_key(&param_key, "data")?;
        let mut sources = ParameterMap::new();
        match param_value {
            Value::Mapping(records) => {
                for (source_key, record_value) in records {
                    let key = scalar_key(&source_key, &format!("data.{param}"))?;
                    let record = parse_record(&param, &key, record_value)?;
                    sources.insert(key, record);
                }
            }
            // A parameter header with nothing under it parses as null.
            Value::Null => {}
            _ => return Err(StoreError::shape(format!("data.{param}"), "a mapping")),
        }
        parameters.insert(param, sources);
    }
    Ok(parameters)
}

fn parse_record(param: &str, key: &str, value: Value) -> Result<ValueRecord, StoreError> {
    let Value::Mapping(mut record) = value else {
        return Err(StoreError::shape(format!("data.{param}.{key}"), "a mapping"));
    };
    let Some(value) = record.shift_remove("value") else {
        return Err(StoreError::shape(
            format!("data.{param}.{key}.value"),
            "a value",
        ));
    };
    Ok(ValueRecord {
        value: ParamValue::classify(value),
        extras: record,
    })
}

/// Mapping keys under `data` are usually strings, but plain YAML happily
/// reads a numeric-looking citation key as a number. Scalars are folded
/// back to their text form so such keys still match their BibTeX entry.
fn scalar_key(key: &Value, context: &str) -> Result<String, StoreError> {
    match key {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(StoreError::shape(context, "a scalar key")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // Helper to drop a material file into a base directory
    fn write_material(base: &Path, name: &str, content: &str) {
        fs::write(base.join(format!("{name}.yml")), content).unwrap();
    }

    const COPPER: &str = r#"meta:
  name: Copper
  symbol: Cu
  references: |
    @article{smith2020,
      title = {X},
      year = {2020}
     }
data:
  n:
    smith2020:
      value: 1.5
      unit: dimensionless
"#;

    // --- Tests for MaterialStore construction ---

    #[test]
    fn test_open_missing_base_path() {
        // Given: a directory that does not exist
        let result = MaterialStore::open("/nonexistent/materials");

        // Then: open refuses up front
        assert!(matches!(result, Err(StoreError::BasePath { .. })));
    }

    #[test]
    fn test_new_defers_missing_base_path() {
        // Given: a lenient store on a missing directory
        let store = MaterialStore::new("/nonexistent/materials");

        // When: we load from it
        let result = store.load("Cu");

        // Then: the failure surfaces as an I/O error
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_resolve_appends_yml_extension() {
        let dir = tempdir().unwrap();
        let store = MaterialStore::open(dir.path()).unwrap();
        assert_eq!(store.resolve("Cu"), dir.path().join("Cu.yml"));
        assert_eq!(store.base_path(), dir.path());
    }

    // --- Tests for load ---

    #[test]
    fn test_load_builds_full_record() {
        // Given: a material file in the base directory
        let dir = tempdir().unwrap();
        write_material(dir.path(), "Cu", COPPER);
        let store = MaterialStore::open(dir.path()).unwrap();

        // When: we load it
        let material = store.load("Cu").unwrap();

        // Then: the identifier comes from the file name
        assert_eq!(material.id, "Cu");

        // And: meta keeps its fields minus references, in order
        let meta_keys: Vec<&str> = material.meta.keys().filter_map(Value::as_str).collect();
        assert_eq!(meta_keys, vec!["name", "symbol"]);

        // And: the BibTeX blob is rekeyed by citation key
        let reference = material.references.get("smith2020").unwrap();
        assert_eq!(reference.entry_type(), "article");
        assert_eq!(reference.get("title"), Some("X"));

        // And: the data leaf is typed
        let record = material.value("n", "smith2020").unwrap();
        assert_eq!(record.value, ParamValue::Scalar(Value::from(1.5)));
        assert_eq!(
            record.extras.get("unit"),
            Some(&Value::String("dimensionless".to_string()))
        );
    }

    #[test]
    fn test_load_missing_file() {
        // Given: an empty base directory
        let dir = tempdir().unwrap();
        let store = MaterialStore::open(dir.path()).unwrap();

        // When: we load an identifier with no file
        let result = store.load("Unobtainium");

        // Then: the I/O error propagates
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempdir().unwrap();
        write_material(dir.path(), "Bad", "meta: [unclosed");
        let store = MaterialStore::open(dir.path()).unwrap();

        assert!(matches!(store.load("Bad"), Err(StoreError::Yaml(_))));
    }

    #[test]
    fn test_load_invalid_bibtex() {
        // Given: a material whose references block is not BibTeX
        let dir = tempdir().unwrap();
        let content = "meta:\n  references: '@article{broken'\ndata:\n";
        write_material(dir.path(), "Bad", content);
        let store = MaterialStore::open(dir.path()).unwrap();

        // Then: the citation error propagates
        assert!(matches!(store.load("Bad"), Err(StoreError::Citation(_))));
    }

    #[test]
    fn test_load_is_repeatable() {
        // Given: a loaded material
        let dir = tempdir().unwrap();
        write_material(dir.path(), "Cu", COPPER);
        let store = MaterialStore::open(dir.path()).unwrap();

        // When: we load it twice
        let first = store.load("Cu").unwrap();
        let second = store.load("Cu").unwrap();

        // Then: the records are equal
        assert_eq!(first, second);
    }

    // --- Tests for parse_material ---

    #[test]
    fn test_parse_material_overrides_file_id() {
        // Given: a file body claiming a different ID
        let content = "ID: Gold\nmeta:\n  references: ''\ndata:\n";

        // When: we parse it under another identifier
        let material = parse_material("Cu", content).unwrap();

        // Then: the given identifier wins
        assert_eq!(material.id, "Cu");
    }

    #[test]
    fn test_parse_material_skips_unknown_top_level_keys() {
        let content = "meta:\n  references: ''\ndata:\nstray: 1\n";
        let material = parse_material("Cu", content).unwrap();
        assert!(material.data.is_empty());
        assert!(!material.meta.contains_key("stray"));
    }

    #[test]
    fn test_parse_material_missing_meta() {
        let result = parse_material("Cu", "data:\n");
        match result.unwrap_err() {
            StoreError::Shape { path, .. } => assert_eq!(path, "meta"),
            err => panic!("Expected Shape error, got {:?}", err),
        }
    }

    #[test]
    fn test_parse_material_missing_references() {
        let result = parse_material("Cu", "meta:\n  name: Copper\ndata:\n");
        match result.unwrap_err() {
            StoreError::Shape { path, .. } => assert_eq!(path, "meta.references"),
            err => panic!("Expected Shape error, got {:?}", err),
        }
    }

    #[test]
    fn test_parse_material_non_mapping_document() {
        let result = parse_material("Cu", "- just\n- a\n- list\n");
        assert!(matches!(result, Err(StoreError::Shape { .. })));
    }

    #[test]
    fn test_parse_material_record_without_value() {
        // Given: a data leaf missing its value field
        let content = r#"meta:
  references: ''
data:
  n:
    smith2020:
      unit: dimensionless
"#;

        // When: we parse it
        let result = parse_material("Cu", content);

        // Then: the shape error names the full dotted path
        match result.unwrap_err() {
            StoreError::Shape { path, .. } => assert_eq!(path, "data.n.smith2020.value"),
            err => panic!("Expected Shape error, got {:?}", err),
        }
    }

    #[test]
    fn test_parse_material_empty_blocks() {
        // Given: headers with nothing under them
        let content = "meta:\n  references: ''\ndata:\n  n:\n";

        // When: we parse it
        let material = parse_material("Cu", content).unwrap();

        // Then: the empty parameter is kept, with no sources
        assert_eq!(material.data.len(), 1);
        assert!(material.data.get("n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_material_classifies_values() {
        // Given: one compound and one scalar value
        let content = r#"meta:
  references: ''
data:
  c_axis:
    schick2014:
      value:
        a: 1.5
        b: 2.0
  temp:
    schick2014:
      value: 300
"#;

        // When: we parse it
        let material = parse_material("Nb", content).unwrap();

        // Then: the mapping is compound, the number is scalar
        assert!(material.value("c_axis", "schick2014").unwrap().value.is_compound());
        assert!(!material.value("temp", "schick2014").unwrap().value.is_compound());
    }

    #[test]
    fn test_parse_material_numeric_citation_key() {
        // Given: a citation key YAML would read as a number
        let content = r#"meta:
  references: ''
data:
  n:
    2020:
      value: 1
"#;

        // When: we parse it
        let material = parse_material("Cu", content).unwrap();

        // Then: the key folds back to its text form
        assert!(material.value("n", "2020").is_some());
    }
}
