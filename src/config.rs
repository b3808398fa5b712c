//! Credential and configuration resolution.
//!
//! Every tool needs a small number of secrets (metadata API keys, subtitle
//! provider accounts) before it can call out. Values are resolved through an
//! ordered chain of sources: an explicit command-line value, an environment
//! variable, an rc file in the current working directory and finally an rc
//! file in the user's home directory. The first source supplying a non-empty
//! value wins; exhausting the chain is a hard error naming the key and every
//! location that was searched.
//!
//! The chain is injected rather than hard-coded so tests can resolve against
//! synthetic sources without touching the real filesystem.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use ini::Ini;
use tracing::debug;

use crate::error::{ArchivistError, Result};

/// Name of the rc file looked up in the working and home directories.
pub const RC_FILENAME: &str = ".archivistrc";

/// Section holding metadata provider API keys.
pub const APIKEYS_SECTION: &str = "apikeys";

/// Section holding subtitle provider accounts.
pub const SUBTITLES_SECTION: &str = "subtitles";

/// One place a credential value may come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A value already supplied by the caller (e.g. a command-line flag).
    /// An empty string counts as not supplied.
    Explicit(Option<String>),
    /// A named environment variable. Empty counts as not supplied.
    Env(String),
    /// An INI rc file. A missing file is skipped; an existing file that does
    /// not parse aborts resolution; a file that parses but lacks the
    /// requested section or key falls through to the next source.
    File(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Explicit(_) => write!(f, "command line"),
            Source::Env(name) => write!(f, "${name}"),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolves credential keys against an ordered list of sources.
pub struct Resolver {
    sources: Vec<Source>,
}

impl Resolver {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    /// The chain used by the CLI tools: explicit flag value, environment
    /// variable, `.archivistrc` in the working directory, `.archivistrc` in
    /// the home directory.
    pub fn standard(explicit: Option<String>, env_var: &str) -> Self {
        let mut sources = vec![
            Source::Explicit(explicit),
            Source::Env(env_var.to_string()),
            Source::File(PathBuf::from(RC_FILENAME)),
        ];
        if let Some(home) = dirs::home_dir() {
            sources.push(Source::File(home.join(RC_FILENAME)));
        }
        Self::new(sources)
    }

    /// Resolves a single key. Lookup is case-sensitive for both the section
    /// and the key. Values that are present but empty are treated as not
    /// supplied and fall through.
    pub fn resolve(&self, section: &str, key: &str) -> Result<String> {
        for source in &self.sources {
            match source {
                Source::Explicit(value) => {
                    if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                        debug!("`{section}.{key}' resolved from the command line");
                        return Ok(v.to_string());
                    }
                }
                Source::Env(name) => {
                    if let Some(v) = std::env::var(name).ok().filter(|v| !v.is_empty()) {
                        debug!("`{section}.{key}' resolved from ${name}");
                        return Ok(v);
                    }
                }
                Source::File(path) => {
                    if !path.exists() {
                        continue;
                    }
                    let doc = load_rc_file(path)?;
                    if let Some(v) = doc
                        .get_from(Some(section), key)
                        .filter(|v| !v.is_empty())
                    {
                        debug!("`{section}.{key}' resolved from {}", path.display());
                        return Ok(v.to_string());
                    }
                }
            }
        }

        Err(ArchivistError::MissingCredential {
            section: section.to_string(),
            key: key.to_string(),
            searched: self.searched(),
        })
    }

    /// Resolves a whole section as a key/value map; used for subtitle
    /// provider accounts. Explicit and environment sources hold the map as a
    /// comma-separated `key=value` string. The first source yielding a
    /// non-empty map wins; an empty result is not an error.
    pub fn resolve_section(&self, section: &str) -> Result<HashMap<String, String>> {
        for source in &self.sources {
            let found = match source {
                Source::Explicit(value) => match value.as_deref().filter(|v| !v.is_empty()) {
                    Some(v) => parse_setup_string(v)?,
                    None => continue,
                },
                Source::Env(name) => match std::env::var(name).ok().filter(|v| !v.is_empty()) {
                    Some(v) => parse_setup_string(&v)?,
                    None => continue,
                },
                Source::File(path) => {
                    if !path.exists() {
                        continue;
                    }
                    let doc = load_rc_file(path)?;
                    match doc.section(Some(section)) {
                        Some(props) => props
                            .iter()
                            .filter(|(_, v)| !v.is_empty())
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect(),
                        None => continue,
                    }
                }
            };
            if !found.is_empty() {
                debug!("section `{section}' resolved from {source}");
                return Ok(found);
            }
        }
        Ok(HashMap::new())
    }

    fn searched(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn load_rc_file(path: &std::path::Path) -> Result<Ini> {
    Ini::load_from_file(path).map_err(|e| match e {
        ini::Error::Io(e) => ArchivistError::Io(e),
        ini::Error::Parse(e) => ArchivistError::ConfigParse {
            location: path.display().to_string(),
            message: e.to_string(),
        },
    })
}

/// Parses the `key=value,key=value` setup string accepted on the command
/// line and in `$SUBTITLES_SETUP`. Values cannot contain `=` or `,`.
pub fn parse_setup_string(s: &str) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for chunk in s.split(',').filter(|c| !c.is_empty()) {
        let (key, value) = chunk.split_once('=').ok_or_else(|| ArchivistError::ConfigParse {
            location: "setup string".to_string(),
            message: format!("`{chunk}' is not a key=value assignment"),
        })?;
        if !value.is_empty() {
            out.insert(key.trim().to_string(), value.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_rc(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join(RC_FILENAME);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn explicit_value_wins_without_touching_files() {
        let dir = TempDir::new().unwrap();
        // would abort resolution if it were ever read
        let rc = write_rc(dir.path(), "not an ini file at all [[[");

        let resolver = Resolver::new(vec![
            Source::Explicit(Some("from-flag".to_string())),
            Source::File(rc),
        ]);
        assert_eq!(resolver.resolve("apikeys", "tmdb").unwrap(), "from-flag");
    }

    #[test]
    fn empty_explicit_value_falls_through() {
        let dir = TempDir::new().unwrap();
        let rc = write_rc(dir.path(), "[apikeys]\ntmdb = from-file\n");

        let resolver = Resolver::new(vec![
            Source::Explicit(Some(String::new())),
            Source::File(rc),
        ]);
        assert_eq!(resolver.resolve("apikeys", "tmdb").unwrap(), "from-file");
    }

    #[test]
    fn cwd_file_shadows_home_file() {
        let cwd = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let cwd_rc = write_rc(cwd.path(), "[apikeys]\ntmdb = cwd-key\n");
        let home_rc = write_rc(home.path(), "[apikeys]\ntmdb = home-key\n");

        let resolver = Resolver::new(vec![Source::File(cwd_rc), Source::File(home_rc)]);
        assert_eq!(resolver.resolve("apikeys", "tmdb").unwrap(), "cwd-key");
    }

    #[test]
    fn home_file_answers_when_cwd_file_is_absent() {
        let cwd = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let home_rc = write_rc(home.path(), "[apikeys]\ntvdb = home-key\n");

        let resolver = Resolver::new(vec![
            Source::File(cwd.path().join(RC_FILENAME)),
            Source::File(home_rc),
        ]);
        assert_eq!(resolver.resolve("apikeys", "tvdb").unwrap(), "home-key");
    }

    #[test]
    fn malformed_first_file_aborts_despite_valid_fallback() {
        let cwd = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let cwd_rc = write_rc(cwd.path(), "[apikeys\ntmdb = broken section header\n");
        let home_rc = write_rc(home.path(), "[apikeys]\ntmdb = home-key\n");

        let resolver = Resolver::new(vec![Source::File(cwd_rc), Source::File(home_rc)]);
        match resolver.resolve("apikeys", "tmdb") {
            Err(ArchivistError::ConfigParse { location, .. }) => {
                assert!(location.contains(RC_FILENAME));
            }
            other => panic!("expected ConfigParse, got {other:?}"),
        }
    }

    #[test]
    fn file_lacking_the_key_falls_through() {
        let cwd = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let cwd_rc = write_rc(cwd.path(), "[apikeys]\ntvdb = some-other-key\n");
        let home_rc = write_rc(home.path(), "[apikeys]\ntmdb = home-key\n");

        let resolver = Resolver::new(vec![Source::File(cwd_rc), Source::File(home_rc)]);
        assert_eq!(resolver.resolve("apikeys", "tmdb").unwrap(), "home-key");
    }

    #[test]
    fn empty_file_value_falls_through() {
        let cwd = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let cwd_rc = write_rc(cwd.path(), "[apikeys]\ntmdb =\n");
        let home_rc = write_rc(home.path(), "[apikeys]\ntmdb = home-key\n");

        let resolver = Resolver::new(vec![Source::File(cwd_rc), Source::File(home_rc)]);
        assert_eq!(resolver.resolve("apikeys", "tmdb").unwrap(), "home-key");
    }

    #[test]
    fn exhausted_chain_names_key_section_and_locations() {
        let dir = TempDir::new().unwrap();
        let rc = dir.path().join(RC_FILENAME);

        let resolver = Resolver::new(vec![
            Source::Explicit(None),
            Source::Env("ARCHIVIST_TEST_UNSET_VAR".to_string()),
            Source::File(rc.clone()),
        ]);
        match resolver.resolve("apikeys", "tmdb") {
            Err(ArchivistError::MissingCredential { section, key, searched }) => {
                assert_eq!(section, "apikeys");
                assert_eq!(key, "tmdb");
                assert!(searched.contains("command line"));
                assert!(searched.contains("$ARCHIVIST_TEST_UNSET_VAR"));
                assert!(searched.contains(&rc.display().to_string()));
            }
            other => panic!("expected MissingCredential, got {other:?}"),
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let rc = write_rc(dir.path(), "[apikeys]\nTMDB = upper-key\n");

        let resolver = Resolver::new(vec![Source::File(rc)]);
        assert!(resolver.resolve("apikeys", "tmdb").is_err());
        assert!(resolver.resolve("Apikeys", "TMDB").is_err());
    }

    #[test]
    fn env_source_resolves() {
        std::env::set_var("ARCHIVIST_TEST_TMDB_KEY", "env-key");
        let resolver = Resolver::new(vec![
            Source::Explicit(None),
            Source::Env("ARCHIVIST_TEST_TMDB_KEY".to_string()),
        ]);
        assert_eq!(resolver.resolve("apikeys", "tmdb").unwrap(), "env-key");
        std::env::remove_var("ARCHIVIST_TEST_TMDB_KEY");
    }

    #[test]
    fn section_resolution_from_file() {
        let dir = TempDir::new().unwrap();
        let rc = write_rc(
            dir.path(),
            "[subtitles]\nopensubtitles_username = user\nopensubtitles_password = pass\n",
        );

        let resolver = Resolver::new(vec![Source::File(rc)]);
        let section = resolver.resolve_section("subtitles").unwrap();
        assert_eq!(section.len(), 2);
        assert_eq!(section["opensubtitles_username"], "user");
        assert_eq!(section["opensubtitles_password"], "pass");
    }

    #[test]
    fn section_resolution_from_setup_string() {
        let resolver = Resolver::new(vec![Source::Explicit(Some(
            "opensubtitles_username=u,opensubtitles_password=p".to_string(),
        ))]);
        let section = resolver.resolve_section("subtitles").unwrap();
        assert_eq!(section["opensubtitles_username"], "u");
        assert_eq!(section["opensubtitles_password"], "p");
    }

    #[test]
    fn missing_section_everywhere_is_empty_not_an_error() {
        let resolver = Resolver::new(vec![Source::Explicit(None)]);
        assert!(resolver.resolve_section("subtitles").unwrap().is_empty());
    }

    #[test]
    fn malformed_setup_string_is_a_parse_error() {
        assert!(parse_setup_string("no-equals-sign").is_err());
        let parsed = parse_setup_string("a=1,b=2").unwrap();
        assert_eq!(parsed["a"], "1");
        assert_eq!(parsed["b"], "2");
    }
}
