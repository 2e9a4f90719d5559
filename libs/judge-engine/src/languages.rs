// Language registry
// Loads the canonical-name -> sandbox runtime id table from languages.json

use crate::error::JudgeError;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// The only language the local fallback can execute
pub const FALLBACK_LANGUAGE: &str = "javascript";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Canonical lowercase name
    pub name: String,
    /// Sandbox (Judge0) language id
    pub runtime_id: u32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguagesFile {
    pub languages: Vec<Language>,
}

/// Registry of configured languages
/// This is the authoritative source for which languages can be judged
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
    // lowercase name or alias -> index into `languages`
    lookup: HashMap<String, usize>,
}

impl LanguageRegistry {
    pub fn new(languages: Vec<Language>) -> Result<Self> {
        if languages.is_empty() {
            bail!("No languages configured");
        }

        let mut lookup = HashMap::new();
        for (idx, lang) in languages.iter().enumerate() {
            let keys = std::iter::once(&lang.name).chain(lang.aliases.iter());
            for key in keys {
                let key = normalize(key);
                if key.is_empty() {
                    bail!("Empty language name or alias for runtime id {}", lang.runtime_id);
                }
                if lookup.insert(key.clone(), idx).is_some() {
                    bail!("Duplicate language name or alias '{}'", key);
                }
            }
        }

        Ok(Self { languages, lookup })
    }

    /// Load language configuration from languages.json
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let file: LanguagesFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Self::new(file.languages)
    }

    /// Load from `path` if it exists, otherwise use the built-in table
    pub fn load_or_builtin<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::builtin())
        }
    }

    /// Judge0 CE language ids
    pub fn builtin() -> Self {
        let table: &[(&str, u32, &[&str])] = &[
            ("javascript", 63, &["js", "node", "nodejs"]),
            ("typescript", 74, &["ts"]),
            ("python", 71, &["py", "python3"]),
            ("java", 62, &[]),
            ("cpp", 54, &["c++"]),
            ("c", 50, &[]),
            ("csharp", 51, &["c#", "cs"]),
            ("go", 60, &["golang"]),
            ("rust", 73, &["rs"]),
            ("ruby", 72, &["rb"]),
            ("kotlin", 78, &["kt"]),
            ("swift", 83, &[]),
        ];

        let languages = table
            .iter()
            .map(|(name, id, aliases)| Language {
                name: name.to_string(),
                runtime_id: *id,
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
            })
            .collect();

        // The table above is non-empty and has unique keys
        Self::new(languages).unwrap_or_else(|e| unreachable!("builtin language table: {e}"))
    }

    /// Resolve a user-supplied name (case-insensitive, aliases allowed)
    pub fn resolve(&self, name: &str) -> Result<&Language, JudgeError> {
        self.lookup
            .get(&normalize(name))
            .map(|&idx| &self.languages[idx])
            .ok_or_else(|| JudgeError::UnsupportedLanguage(name.trim().to_string()))
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_case_insensitive() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(registry.resolve("JavaScript").unwrap().runtime_id, 63);
        assert_eq!(registry.resolve("  python ").unwrap().runtime_id, 71);
    }

    #[test]
    fn test_resolve_alias_returns_canonical() {
        let registry = LanguageRegistry::builtin();
        let lang = registry.resolve("JS").unwrap();
        assert_eq!(lang.name, "javascript");
        assert_eq!(registry.resolve("c++").unwrap().name, "cpp");
    }

    #[test]
    fn test_unsupported_language() {
        let registry = LanguageRegistry::builtin();
        let err = registry.resolve("cobol").unwrap_err();
        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref l) if l == "cobol"));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let result = LanguageRegistry::new(vec![
            Language { name: "python".into(), runtime_id: 71, aliases: vec!["py".into()] },
            Language { name: "pypy".into(), runtime_id: 99, aliases: vec!["PY".into()] },
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(LanguageRegistry::new(vec![]).is_err());
    }

    #[test]
    fn test_repo_languages_file() {
        // config/languages.json at the workspace root
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/languages.json");
        let registry = LanguageRegistry::load_from_file(path).unwrap();
        assert!(registry.resolve(FALLBACK_LANGUAGE).is_ok());
    }
}
