//! Ordered alias tables.
//!
//! An alias table maps recognisable name fragments to a launch target.  A
//! fragment matches when it occurs anywhere in the (lowercased) text; when
//! several fragments match, the one listed first wins.

use crate::config::AliasConfig;

/// Ordered `fragment → value` mapping with first-match-wins lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasTable<T> {
    entries: Vec<(String, T)>,
}

impl<T> AliasTable<T> {
    /// Build a table; fragments are lowercased, blank fragments dropped.
    pub fn new(entries: impl IntoIterator<Item = (String, T)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(alias, value)| (alias.trim().to_lowercase(), value))
            .filter(|(alias, _)| !alias.is_empty())
            .collect();
        Self { entries }
    }

    /// First entry whose fragment occurs in `text` (case-insensitive).
    pub fn first_match(&self, text: &str) -> Option<(&str, &T)> {
        let text = text.to_lowercase();
        self.entries
            .iter()
            .find(|(alias, _)| text.contains(alias.as_str()))
            .map(|(alias, value)| (alias.as_str(), value))
    }

    pub fn contains_match(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Both alias tables, shared by the resolver and the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasBook {
    /// Application fragment → program and arguments.
    pub apps: AliasTable<Vec<String>>,
    /// Site fragment → URL.
    pub sites: AliasTable<String>,
}

impl AliasBook {
    pub fn from_config(config: &AliasConfig) -> Self {
        Self {
            apps: AliasTable::new(
                config
                    .apps
                    .iter()
                    .map(|a| (a.alias.clone(), a.command.clone())),
            ),
            sites: AliasTable::new(config.sites.iter().map(|s| (s.alias.clone(), s.url.clone()))),
        }
    }
}

impl Default for AliasBook {
    fn default() -> Self {
        Self::from_config(&AliasConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AliasTable<&'static str> {
        AliasTable::new(vec![
            ("Chrome".to_string(), "chrome"),
            ("google chrome".to_string(), "google-chrome"),
            ("  ".to_string(), "blank"),
        ])
    }

    #[test]
    fn first_listed_match_wins() {
        // Both "chrome" and "google chrome" match; "chrome" is listed first.
        assert_eq!(table().first_match("google chrome"), Some(("chrome", &"chrome")));
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        assert_eq!(
            table().first_match("please start CHROME now"),
            Some(("chrome", &"chrome"))
        );
        assert!(table().first_match("firefox").is_none());
    }

    #[test]
    fn blank_aliases_are_dropped() {
        assert_eq!(table().len(), 2);
        assert!(!table().contains_match("   "));
    }

    #[test]
    fn default_book_has_original_tables() {
        let book = AliasBook::default();
        assert_eq!(book.sites.first_match("youtube").map(|(a, _)| a), Some("youtube"));
        assert_eq!(
            book.sites.first_match("gmail inbox").map(|(_, u)| u.as_str()),
            // "gmail" is listed after "google" but "google" does not occur.
            Some("https://mail.google.com")
        );
        assert_eq!(
            book.apps.first_match("calculator").map(|(_, c)| c.clone()),
            Some(vec!["calc".to_string()])
        );
    }
}
