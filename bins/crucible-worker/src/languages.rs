//! Per-language execution profiles: container image, mount point inside the
//! container, and the compile/run command lines. Defaults are compiled in;
//! `config/languages.json` overrides them when present.

use anyhow::{Context, Result};
use crucible_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageProfile {
    pub name: String,
    pub image: String,
    /// Where the submission directory is mounted inside the container.
    pub mount_point: String,
    /// Compile command template, absent for interpreted languages.
    /// `{package_dir}` expands to the package directory path.
    #[serde(default)]
    pub compile_command: Option<Vec<String>>,
    /// Run command template. `{entry}` expands to the harness entry point.
    pub run_command: Vec<String>,
}

impl LanguageProfile {
    pub fn compile_command_for(&self, package_dir: &str) -> Option<Vec<String>> {
        self.compile_command.as_ref().map(|template| {
            template
                .iter()
                .map(|arg| arg.replace("{package_dir}", package_dir))
                .collect()
        })
    }

    pub fn run_command_for(&self, entry_point: &str) -> Vec<String> {
        self.run_command
            .iter()
            .map(|arg| arg.replace("{entry}", entry_point))
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesFile {
    languages: Vec<LanguageProfile>,
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: HashMap<Language, LanguageProfile>,
}

impl LanguageRegistry {
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            Language::Java,
            LanguageProfile {
                name: "java".to_string(),
                image: "crucible-java:latest".to_string(),
                mount_point: "/app/src".to_string(),
                compile_command: Some(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    "javac -cp '/app/src:/app/libs/*' /app/src/{package_dir}/*.java".to_string(),
                ]),
                run_command: vec![
                    "java".to_string(),
                    "-cp".to_string(),
                    "/app/src:/app/libs/*".to_string(),
                    "{entry}".to_string(),
                ],
            },
        );
        profiles.insert(
            Language::Python,
            LanguageProfile {
                name: "python".to_string(),
                image: "crucible-python:latest".to_string(),
                mount_point: "/app".to_string(),
                compile_command: None,
                run_command: vec![
                    "python3".to_string(),
                    "-u".to_string(),
                    "/app/{entry}".to_string(),
                ],
            },
        );
        LanguageRegistry { profiles }
    }

    /// Load profile overrides from a languages.json file. Unknown language
    /// names in the file are rejected; missing languages keep the builtins.
    pub fn load(path: &Path) -> Result<Self> {
        let mut registry = Self::builtin();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed: LanguagesFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        for profile in parsed.languages {
            let language = Language::from_str(&profile.name)
                .with_context(|| format!("unknown language in config: {}", profile.name))?;
            registry.profiles.insert(language, profile);
        }
        Ok(registry)
    }

    /// Builtin profiles, overlaid with `config/languages.json` if it exists.
    pub fn load_default() -> Result<Self> {
        let path = Path::new("config/languages.json");
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::builtin())
        }
    }

    pub fn profile(&self, language: Language) -> Result<&LanguageProfile> {
        self.profiles
            .get(&language)
            .with_context(|| format!("no profile configured for language: {}", language))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.values().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_cover_all_languages() {
        let registry = LanguageRegistry::builtin();
        assert!(registry.profile(Language::Java).is_ok());
        assert!(registry.profile(Language::Python).is_ok());
        assert_eq!(registry.names(), vec!["java", "python"]);
    }

    #[test]
    fn java_commands_substitute_placeholders() {
        let registry = LanguageRegistry::builtin();
        let java = registry.profile(Language::Java).unwrap();
        let compile = java.compile_command_for("com/example").unwrap();
        assert_eq!(
            compile[2],
            "javac -cp '/app/src:/app/libs/*' /app/src/com/example/*.java"
        );
        let run = java.run_command_for("com.example.Main");
        assert_eq!(run.last().unwrap(), "com.example.Main");
    }

    #[test]
    fn python_has_no_compile_step() {
        let registry = LanguageRegistry::builtin();
        let python = registry.profile(Language::Python).unwrap();
        assert!(python.compile_command_for("com/example").is_none());
        let run = python.run_command_for("com/example/main.py");
        assert_eq!(run, vec!["python3", "-u", "/app/com/example/main.py"]);
    }
}
