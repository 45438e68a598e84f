//! A minimal INI-style config reader.
//!
//! The core only ever reads one key (`core.repositoryformatversion`), so
//! this is a small flat `[section]` / `key = value` scanner rather than a
//! full INI implementation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// A parsed config file: `(section, key) -> value`.
#[derive(Debug, Default, Clone)]
pub struct Config {
    entries: BTreeMap<(String, String), String>,
}

impl Config {
    /// Parses the config file at `path`. A missing file parses as empty.
    pub fn read(path: &Path) -> Result<Config> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Config::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parses INI-style text directly.
    pub fn parse(text: &str) -> Config {
        let mut entries = BTreeMap::new();
        let mut section = String::new();

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                section = name.trim().to_string();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(
                    (section.clone(), key.trim().to_string()),
                    value.trim().to_string(),
                );
            }
        }

        Config { entries }
    }

    /// Looks up `section.key`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.entries
            .get(&(section.to_string(), key.to_string()))
            .map(String::as_str)
    }

    /// Renders the default config written by `Repository::init`:
    /// `core.repositoryformatversion = 0`, `core.filemode = false`,
    /// `core.bare = false`.
    pub fn default_text() -> &'static str {
        "[core]\n\trepositoryformatversion = 0\n\tfilemode = false\n\tbare = false\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nested_section_key() {
        let cfg = Config::parse("[core]\n\trepositoryformatversion = 0\n\tfilemode = false\n");
        assert_eq!(cfg.get("core", "repositoryformatversion"), Some("0"));
        assert_eq!(cfg.get("core", "filemode"), Some("false"));
        assert_eq!(cfg.get("core", "missing"), None);
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let cfg = Config::parse("; a comment\n\n[core]\n# another comment\nbare = false\n");
        assert_eq!(cfg.get("core", "bare"), Some("false"));
    }

    #[test]
    fn missing_file_parses_as_empty() {
        let cfg = Config::read(Path::new("/nonexistent/path/to/config")).unwrap();
        assert_eq!(cfg.get("core", "repositoryformatversion"), None);
    }
}
