//! matdb: loader and canonical re-emitter for YAML material files with
//! embedded BibTeX references.
//!
//! A material file is a YAML document with a `meta` block (free-form
//! description plus a BibTeX bibliography under `meta.references`) and a
//! `data` block mapping parameter names to per-citation value records.
//! This library provides functionality to:
//! - Resolve and load material files from a base directory into typed
//!   [`Material`] records, with the BibTeX blob rekeyed by citation key
//! - Re-emit a record in the fixed on-disk layout: block meta, a BibTeX
//!   literal block, and a hand-indented data section whose style follows
//!   each value's shape
//! - Parse and serialize the embedded BibTeX on its own

pub mod material;
pub mod output;
pub mod refs;
pub mod store;

pub use material::{DataMap, Material, ParamValue, ParameterMap, ValueRecord};
pub use output::{dump, DumpError};
pub use refs::{parse_references, to_bibtex, CitationError, Reference, ReferenceMap};
pub use store::{parse_material, MaterialStore, StoreError};
