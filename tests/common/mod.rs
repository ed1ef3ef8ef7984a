//! Shared test fixtures and helpers for integration tests.

use std::fs;
use std::path::Path;

/// A complete material file already in the canonical on-disk layout.
///
/// Loading and dumping this text must reproduce it byte for byte: `ID`
/// first, block meta, the BibTeX literal block with its 4/5-space indent,
/// and the data section at 2/4/6 columns.
///
/// Also used in `src/output.rs` unit tests in reduced form (duplicated
/// there because unit tests cannot import from integration test crates).
pub const COPPER_CANONICAL: &str = "\
ID: Cu
meta:
  name: Copper
  symbol: Cu
  references: |
    @article{smith2020,
      title = {Optical constants of copper},
      year = {2020}
     }
data:
  n:
    smith2020:
      value: 1.1
      unit: dimensionless
";

/// A material file the way a human would author it: mixed-case BibTeX
/// entry type, an inline flow mapping as one value, several parameters
/// and two citations feeding the same parameter.
pub const NIOBIUM_AUTHORED: &str = "\
meta:
  name: Niobium
  symbol: Nb
  references: |
    @Article{schick2014,
      author = {Schick, D. and Bojahr, A.},
      title = {UDKM1DSIM},
      year = {2014}
    }
    @misc{datasheet,
      note = {vendor data sheet}
    }
data:
  c_axis:
    schick2014:
      value: {a: 3.3, b: 0.05}
      unit: angstrom
      comment: lattice fit
  sound_vel:
    schick2014:
      value: 5.068
      unit: nm/ps
    datasheet:
      value: 5.1
";

/// Drops a material file into a base directory as `<name>.yml`.
pub fn write_material(base: &Path, name: &str, content: &str) {
    fs::write(base.join(format!("{name}.yml")), content).unwrap();
}
