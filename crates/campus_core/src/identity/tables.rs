//! Program and branch code directories.
//!
//! Built-in entries are static data; configuration may add or override
//! entries when a parser is constructed.

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};

/// Program code -> label.
pub const PROGRAM_CODES: &[(&str, &str)] = &[
    ("sm", "BTech"),
    ("mm", "MTech"),
    ("pm", "PhD"),
    ("im", "Integrated"),
];

/// Branch code -> label. Keys are unique; `meb` resolves to `MECH`.
pub const BRANCH_CODES: &[(&str, &str)] = &[
    ("csb", "CSE"),
    ("ecb", "ECE"),
    ("eeb", "EEE"),
    ("meb", "MECH"),
    ("cib", "CIVIL"),
    ("chb", "CHEM"),
    ("bib", "BIOTECH"),
];

static BUILTIN: Lazy<CodeTables> = Lazy::new(|| CodeTables {
    programs: to_map(PROGRAM_CODES),
    branches: to_map(BRANCH_CODES),
});

/// Immutable lookup tables used by one parser instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTables {
    programs: HashMap<String, String>,
    branches: HashMap<String, String>,
}

impl CodeTables {
    /// Built-in directory, initialized on first use.
    pub fn builtin() -> &'static CodeTables {
        &BUILTIN
    }

    /// Built-in directory with `programs`/`branches` merged over it.
    ///
    /// Override keys are matched case-insensitively.
    pub fn with_overrides(
        programs: &BTreeMap<String, String>,
        branches: &BTreeMap<String, String>,
    ) -> Self {
        let mut tables = Self::builtin().clone();
        for (code, label) in programs {
            tables
                .programs
                .insert(code.to_ascii_lowercase(), label.trim().to_string());
        }
        for (code, label) in branches {
            tables
                .branches
                .insert(code.to_ascii_lowercase(), label.trim().to_string());
        }
        tables
    }

    pub fn program_label(&self, code: &str) -> Option<&str> {
        self.programs.get(code).map(String::as_str)
    }

    pub fn branch_label(&self, code: &str) -> Option<&str> {
        self.branches.get(code).map(String::as_str)
    }
}

fn to_map(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(code, label)| ((*code).to_string(), (*label).to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{CodeTables, BRANCH_CODES, PROGRAM_CODES};
    use std::collections::{BTreeMap, HashSet};

    #[test]
    fn builtin_tables_have_unique_keys() {
        let programs: HashSet<_> = PROGRAM_CODES.iter().map(|(code, _)| *code).collect();
        let branches: HashSet<_> = BRANCH_CODES.iter().map(|(code, _)| *code).collect();
        assert_eq!(programs.len(), PROGRAM_CODES.len());
        assert_eq!(branches.len(), BRANCH_CODES.len());
    }

    #[test]
    fn meb_resolves_to_mechanical() {
        assert_eq!(CodeTables::builtin().branch_label("meb"), Some("MECH"));
    }

    #[test]
    fn overrides_win_over_builtin_entries() {
        let mut branches = BTreeMap::new();
        branches.insert("MEB".to_string(), "MME".to_string());
        branches.insert("aib".to_string(), "AI".to_string());
        let tables = CodeTables::with_overrides(&BTreeMap::new(), &branches);
        assert_eq!(tables.branch_label("meb"), Some("MME"));
        assert_eq!(tables.branch_label("aib"), Some("AI"));
        assert_eq!(tables.program_label("sm"), Some("BTech"));
    }
}
