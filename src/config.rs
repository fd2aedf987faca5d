use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};

/// repository configuration stored INI-style in `<gitdir>/config`
///
/// the file format is git's: `[section]` headers followed by
/// tab-indented `key = value` lines. only `[user]` and `[core]` carry
/// meaning for the core; everything else is preserved as opaque data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// load config from a file; a missing file yields an empty config
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(source) => Err(Error::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// parse INI-style text; unrecognized lines are skipped
    pub fn parse(text: &str) -> Self {
        let mut config = Self::new();
        let mut section = String::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_ascii_lowercase();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if !section.is_empty() {
                    config
                        .sections
                        .entry(section.clone())
                        .or_default()
                        .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
                }
            }
        }

        config
    }

    /// save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.emit()).with_path(path)
    }

    /// emit the INI text form
    pub fn emit(&self) -> String {
        let mut out = String::new();
        for (section, keys) in &self.sections {
            out.push_str(&format!("[{}]\n", section));
            for (key, value) in keys {
                out.push_str(&format!("\t{} = {}\n", key, value));
            }
        }
        out
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)?
            .get(key)
            .map(String::as_str)
    }

    pub fn set(&mut self, section: impl Into<String>, key: impl Into<String>, value: impl Into<String>) {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn user_name(&self) -> Option<&str> {
        self.get("user", "name")
    }

    pub fn user_email(&self) -> Option<&str> {
        self.get("user", "email")
    }

    pub fn is_bare(&self) -> bool {
        self.get("core", "bare") == Some("true")
    }
}

/// which identity an operation is resolving
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityRole {
    Author,
    Committer,
}

impl IdentityRole {
    fn env_vars(&self) -> (&'static str, &'static str) {
        match self {
            IdentityRole::Author => ("SC_AUTHOR_NAME", "SC_AUTHOR_EMAIL"),
            IdentityRole::Committer => ("SC_COMMITTER_NAME", "SC_COMMITTER_EMAIL"),
        }
    }
}

/// resolve an identity: environment variables first, then `[user]` config
pub fn resolve_identity(config: &Config, role: IdentityRole) -> Result<(String, String)> {
    let (name_var, email_var) = role.env_vars();

    let name = env::var(name_var)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| config.user_name().map(String::from));
    let email = env::var(email_var)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| config.user_email().map(String::from));

    match (name, email) {
        (Some(name), Some(email)) => Ok((name, email)),
        _ => Err(Error::MissingIdentity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_user_section() {
        let config = Config::parse("[user]\n\tname = Dot Warner\n\temail = dot@example.com\n");
        assert_eq!(config.user_name(), Some("Dot Warner"));
        assert_eq!(config.user_email(), Some("dot@example.com"));
    }

    #[test]
    fn test_parse_is_case_insensitive_on_keys() {
        let config = Config::parse("[User]\nName = A\n");
        assert_eq!(config.user_name(), Some("A"));
    }

    #[test]
    fn test_parse_skips_comments_and_junk() {
        let config = Config::parse(
            "# a comment\n; another\n[core]\n\tbare = false\nstray line without equals\n",
        );
        assert!(!config.is_bare());
        assert_eq!(config.get("core", "bare"), Some("false"));
    }

    #[test]
    fn test_emit_parse_roundtrip() {
        let mut config = Config::new();
        config.set("core", "repositoryformatversion", "0");
        config.set("core", "bare", "true");
        config.set("user", "name", "Wakko");

        let parsed = Config::parse(&config.emit());
        assert_eq!(config, parsed);
        assert!(parsed.is_bare());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("config")).unwrap();
        assert_eq!(config.user_name(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");

        let mut config = Config::new();
        config.set("user", "name", "Yakko");
        config.set("user", "email", "yakko@wb.com");
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_identity_from_config() {
        let mut config = Config::new();
        config.set("user", "name", "Dot");
        config.set("user", "email", "dot@wb.com");

        let (name, email) = resolve_identity(&config, IdentityRole::Author).unwrap();
        assert_eq!(name, "Dot");
        assert_eq!(email, "dot@wb.com");
    }

    #[test]
    fn test_identity_missing() {
        let config = Config::new();
        assert!(matches!(
            resolve_identity(&config, IdentityRole::Committer),
            Err(Error::MissingIdentity)
        ));
    }
}
