//! Language dispatch: extension -> language tag -> extraction rules.

use std::collections::HashMap;
use std::path::Path;

use super::languages;
use super::ExtractionRule;

/// A language with its file extensions and extraction rules.
#[derive(Debug, Clone, Copy)]
pub struct Language {
    pub tag: &'static str,
    /// Extensions without the leading dot, lowercase.
    pub extensions: &'static [&'static str],
    pub rules: &'static [ExtractionRule],
}

/// Maps language tags to rule lists and extensions to tags.
#[derive(Debug, Default, Clone)]
pub struct LanguageRegistry {
    languages: HashMap<&'static str, Language>,
    by_extension: HashMap<&'static str, &'static str>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in language.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for language in languages::all() {
            registry.register(language);
        }
        registry
    }

    /// Register a language. A later registration for the same tag or
    /// extension replaces the earlier one.
    pub fn register(&mut self, language: Language) {
        for ext in language.extensions {
            self.by_extension.insert(ext, language.tag);
        }
        self.languages.insert(language.tag, language);
    }

    pub fn by_tag(&self, tag: &str) -> Option<&Language> {
        self.languages.get(tag)
    }

    /// Language for a file path, by its (case-insensitive) extension.
    pub fn for_path(&self, path: &str) -> Option<&Language> {
        let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
        let tag = self.by_extension.get(ext.as_str())?;
        self.languages.get(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.languages.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_dispatch() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(registry.for_path("src/app.ts").map(|l| l.tag), Some("javascript"));
        assert_eq!(registry.for_path("App.JSX").map(|l| l.tag), Some("javascript"));
        assert_eq!(registry.for_path("main.go").map(|l| l.tag), Some("go"));
        assert_eq!(registry.for_path("lib.rs").map(|l| l.tag), Some("rust"));
        assert_eq!(registry.for_path("api.py").map(|l| l.tag), Some("python"));
        assert_eq!(registry.for_path("Api.kt").map(|l| l.tag), Some("java"));
        assert_eq!(registry.for_path("routes.rb").map(|l| l.tag), Some("ruby"));
        assert_eq!(registry.for_path("schema.graphql").map(|l| l.tag), Some("graphql"));
        assert!(registry.for_path("README").is_none());
        assert!(registry.for_path("notes.md").is_none());
    }

    #[test]
    fn test_register_replaces_extension() {
        let mut registry = LanguageRegistry::builtin();
        registry.register(Language {
            tag: "custom",
            extensions: &["go"],
            rules: &[],
        });
        assert_eq!(registry.for_path("main.go").map(|l| l.tag), Some("custom"));
        assert!(registry.tags().contains(&"custom"));
    }
}
