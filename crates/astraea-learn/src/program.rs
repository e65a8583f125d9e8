//! Compiled few-shot program artifact.
//!
//! An offline optimiser may compile the accumulated corpus into a curated
//! few-shot program. When the artifact is present it is loaded at startup
//! and its section takes precedence over live retrieval; it is never in
//! the critical path and its absence is not an error.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Artifact filename the optimiser produces.
pub const COMPILED_PROGRAM_FILE: &str = "compiled_program.json";

/// A compiled few-shot program: one prompt section per domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompiledProgram {
    /// Optimiser identification, for provenance.
    #[serde(default)]
    pub compiled_by: Option<String>,
    /// Domain -> ready-to-insert examples section.
    pub sections: BTreeMap<String, String>,
}

impl CompiledProgram {
    /// Load the artifact from a directory, if present and well-formed.
    pub fn load_from(dir: &Path) -> Option<Self> {
        let path = dir.join(COMPILED_PROGRAM_FILE);
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Self>(&contents) {
            Ok(program) => {
                info!(
                    path = %path.display(),
                    domains = program.sections.len(),
                    "loaded compiled few-shot program"
                );
                Some(program)
            }
            Err(_) => None,
        }
    }

    /// The compiled section for a domain.
    pub fn section_for(&self, domain: &str) -> Option<&str> {
        self.sections.get(&domain.to_uppercase()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CompiledProgram::load_from(dir.path()).is_none());
    }

    #[test]
    fn artifact_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut sections = BTreeMap::new();
        sections.insert("AE".to_string(), "### Approved Example 1\n...".to_string());
        let program = CompiledProgram {
            compiled_by: Some("offline-optimiser".to_string()),
            sections,
        };
        std::fs::write(
            dir.path().join(COMPILED_PROGRAM_FILE),
            serde_json::to_string(&program).unwrap(),
        )
        .unwrap();
        let loaded = CompiledProgram::load_from(dir.path()).unwrap();
        assert!(loaded.section_for("ae").is_some());
    }
}
