//! Flat `KEY=value` state file.
//!
//! Values written here are secrets (API keys). Only key names are ever
//! logged.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

const HEADER: [&str; 2] = [
    "# Generated by the Clawdbot setup proxy",
    "# Do not commit this file. Keep it private.",
];

/// Errors raised while persisting the state file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("value for {key} contains a line break")]
    LineBreak { key: String },
}

/// One requested change to a key.
///
/// `Some("")` is accepted and ignored so callers can forward optional form
/// fields without filtering them first.
pub type Updates = BTreeMap<String, Option<String>>;

/// In-memory view of the state file, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    entries: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Parse file contents. Comments, blank lines and lines without a key
    /// are skipped; a later duplicate wins.
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            entries.insert(key.to_string(), value.trim().to_string());
        }
        Self { entries }
    }

    /// Load from disk; a missing file is an empty snapshot.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply updates: `None` deletes, a non-empty value sets, an empty
    /// value leaves the key alone.
    ///
    /// A key or value containing `\r` or `\n` would render as extra lines,
    /// so the whole batch is refused and the snapshot stays untouched.
    pub fn apply(&mut self, updates: &Updates) -> Result<(), StoreError> {
        if let Some((key, _)) = updates
            .iter()
            .find(|(k, v)| has_line_break(k) || v.as_deref().is_some_and(has_line_break))
        {
            return Err(StoreError::LineBreak { key: key.clone() });
        }

        for (key, value) in updates {
            match value {
                None => {
                    self.entries.remove(key);
                }
                Some(v) if !v.is_empty() => {
                    self.entries.insert(key.clone(), v.clone());
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Deterministic rendering: header, then `KEY=value` lines sorted by key.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in HEADER {
            out.push_str(line);
            out.push('\n');
        }
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Write to disk with owner-only permissions.
    ///
    /// The contents go to a sibling `.tmp` file that is restricted before
    /// anything is written, then renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let staging = staging_path(path);
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&staging).map_err(write_err)?;

        // `mode` only applies on creation; a leftover staging file keeps its
        // old bits until tightened here.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        file.write_all(self.render().as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&staging, path).map_err(write_err)
    }
}

fn has_line_break(text: &str) -> bool {
    text.contains(['\r', '\n'])
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read-merge-write the state file at `path`.
///
/// Not transactional: a concurrent writer between load and rename is lost.
pub fn apply_updates(path: &Path, updates: &Updates) -> Result<(), StoreError> {
    let mut snapshot = EnvSnapshot::load(path)?;
    snapshot.apply(updates)?;
    snapshot.save(path)?;

    tracing::info!(
        path = %path.display(),
        keys = ?updates.keys().collect::<Vec<_>>(),
        "State file updated"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updates(pairs: &[(&str, Option<&str>)]) -> Updates {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_parse_skips_noise() {
        let snapshot = EnvSnapshot::parse(
            "# comment\n\n  FOO = bar \r\n=nokey\nnoequals\nURL=http://x?a=b\nFOO=baz\n",
        );
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("FOO"), Some("baz"));
        assert_eq!(snapshot.get("URL"), Some("http://x?a=b"));
    }

    #[test]
    fn test_render_is_sorted_with_header() {
        let mut snapshot = EnvSnapshot::default();
        snapshot
            .apply(&updates(&[("ZED", Some("1")), ("ALPHA", Some("2"))]))
            .unwrap();
        assert_eq!(
            snapshot.render(),
            "# Generated by the Clawdbot setup proxy\n\
             # Do not commit this file. Keep it private.\n\
             ALPHA=2\n\
             ZED=1\n"
        );
    }

    #[test]
    fn test_apply_semantics() {
        let mut snapshot = EnvSnapshot::parse("KEEP=1\nDROP=2\nSTAY=3\n");
        snapshot.apply(&updates(&[
            ("DROP", None),
            ("STAY", Some("")),
            ("NEW", Some("4")),
            ("ABSENT", None),
        ]))
        .unwrap();
        assert_eq!(snapshot.get("KEEP"), Some("1"));
        assert_eq!(snapshot.get("DROP"), None);
        assert_eq!(snapshot.get("STAY"), Some("3"));
        assert_eq!(snapshot.get("NEW"), Some("4"));
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_apply_updates_is_idempotent_and_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join(".env");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "OTHER=keep me\n").unwrap();

        let set = updates(&[("ANTHROPIC_API_KEY", Some("a"))]);
        apply_updates(&path, &set).unwrap();
        let once = fs::read_to_string(&path).unwrap();
        apply_updates(&path, &set).unwrap();
        let twice = fs::read_to_string(&path).unwrap();

        assert_eq!(once, twice);
        assert!(once.contains("OTHER=keep me\n"));
        assert!(once.contains("ANTHROPIC_API_KEY=a\n"));
    }

    #[test]
    fn test_delete_of_absent_key_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        apply_updates(&path, &updates(&[("A", Some("1"))])).unwrap();
        let before = fs::read_to_string(&path).unwrap();
        apply_updates(&path, &updates(&[("B", None)])).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_missing_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join(".env");
        apply_updates(&path, &updates(&[("K", Some("v"))])).unwrap();
        assert_eq!(EnvSnapshot::load(&path).unwrap().get("K"), Some("v"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        apply_updates(&path, &updates(&[("K", Some("v"))])).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_line_break_in_value_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "ANTHROPIC_API_KEY=good\n").unwrap();
        let before = fs::read_to_string(&path).unwrap();

        for value in ["sk\nANTHROPIC_API_KEY=evil", "sk\rANTHROPIC_API_KEY=evil"] {
            let err = apply_updates(
                &path,
                &updates(&[("OPENAI_API_KEY", Some(value)), ("OTHER", Some("x"))]),
            )
            .unwrap_err();
            assert!(matches!(err, StoreError::LineBreak { ref key } if key == "OPENAI_API_KEY"));
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        let snapshot = EnvSnapshot::load(&path).unwrap();
        assert_eq!(snapshot.get("ANTHROPIC_API_KEY"), Some("good"));
        assert_eq!(snapshot.get("OPENAI_API_KEY"), None);
    }

    #[test]
    fn test_save_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        apply_updates(&path, &updates(&[("K", Some("v"))])).unwrap();
        apply_updates(&path, &updates(&[("K", Some("w"))])).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(".env")]);
        assert_eq!(EnvSnapshot::load(&path).unwrap().get("K"), Some("w"));
    }

    #[test]
    fn test_unwritable_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // Parent is a regular file, so the directory cannot be created.
        let path = blocker.join(".env");
        let err = apply_updates(&path, &updates(&[("K", Some("v"))])).unwrap_err();
        assert!(matches!(err, StoreError::CreateDir { .. } | StoreError::Read { .. }));
    }
}
