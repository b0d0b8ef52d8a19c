//! # Code Tables
//!
//! Bidirectional name ↔ code maps for key/button codes and relative axes.
//!
//! Tables are built once from the declaration lists in [`keys`] and [`rel`]
//! and are read-only afterwards. Share them through [`Arc`] (see
//! [`CodeTables::shared`]).
//!
//! ## Aliases
//!
//! A code may be declared under more than one name (`BTN_MOUSE` and
//! `BTN_LEFT` are both `0x110`). The forward map keeps every name; the
//! reverse map keeps one name per code, the one declared last.
//!
//! ## Usage
//!
//! ```
//! use input_event::codes::CodeTables;
//!
//! let tables = CodeTables::new();
//! assert_eq!(tables.keys.code_to_name(30), "KEY_A");
//! assert_eq!(tables.keys.name_to_code("BTN_MOUSE"), Some(0x110));
//! assert_eq!(tables.keys.code_to_name(0x110), "BTN_LEFT");
//! assert_eq!(tables.rel_axes.code_to_name(0x08), "REL_WHEEL");
//! assert_eq!(tables.rel_axes.code_to_name(0x7f), "unknown");
//! ```

pub mod keys;
pub mod rel;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Name returned by [`CodeTable::code_to_name`] for codes with no declaration.
pub const UNKNOWN_NAME: &str = "unknown";

/// One name ↔ code mapping.
#[derive(Debug, Clone)]
pub struct CodeTable {
    declarations: &'static [(&'static str, u16)],
    by_name: HashMap<&'static str, u16>,
    by_code: HashMap<u16, &'static str>,
}

impl CodeTable {
    /// Build a table from `(name, code)` declarations.
    ///
    /// Later declarations overwrite earlier ones in the reverse index.
    pub fn from_declarations(declarations: &'static [(&'static str, u16)]) -> Self {
        let mut by_name = HashMap::with_capacity(declarations.len());
        let mut by_code = HashMap::with_capacity(declarations.len());

        for &(name, code) in declarations {
            by_name.insert(name, code);
            by_code.insert(code, name);
        }

        Self {
            declarations,
            by_name,
            by_code,
        }
    }

    /// Resolve a code to its name, or [`UNKNOWN_NAME`] if it is not declared.
    pub fn code_to_name(&self, code: u16) -> &'static str {
        self.lookup(code).unwrap_or(UNKNOWN_NAME)
    }

    /// Resolve a code to its name.
    pub fn lookup(&self, code: u16) -> Option<&'static str> {
        self.by_code.get(&code).copied()
    }

    /// Resolve a name (e.g. `"KEY_ENTER"`) to its code.
    pub fn name_to_code(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    /// All declared `(name, code)` pairs, aliases included, in declaration order.
    pub fn declarations(&self) -> impl Iterator<Item = (&'static str, u16)> + '_ {
        self.declarations.iter().copied()
    }

    /// Number of distinct names in the table.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if the table has no declarations.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// The key/button table and the relative axis table.
#[derive(Debug, Clone)]
pub struct CodeTables {
    /// `KEY_*` and `BTN_*` codes, looked up for `EV_KEY` samples.
    pub keys: CodeTable,
    /// `REL_*` codes, looked up for `EV_REL` and `EV_ABS` samples.
    pub rel_axes: CodeTable,
}

impl CodeTables {
    /// Build both tables.
    pub fn new() -> Self {
        Self {
            keys: CodeTable::from_declarations(keys::KEY_CODES),
            rel_axes: CodeTable::from_declarations(rel::REL_CODES),
        }
    }

    /// Process-wide tables, built on first use.
    pub fn shared() -> Arc<CodeTables> {
        static TABLES: OnceLock<Arc<CodeTables>> = OnceLock::new();
        TABLES.get_or_init(|| Arc::new(CodeTables::new())).clone()
    }
}

impl Default for CodeTables {
    fn default() -> Self {
        Self::new()
    }
}
