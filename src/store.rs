//! Client-local key/value persistence.
//!
//! Values are plain strings, mirroring browser local storage. Batch writes and
//! removals are applied as one unit so the session fields can never be left
//! half-written.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

/// Session start time, Unix milliseconds.
pub const TIMER_KEY: &str = "tempmail_timer";
/// Session mailbox address.
pub const EMAIL_KEY: &str = "tempmail_email";
/// Session bearer token.
pub const TOKEN_KEY: &str = "tempmail_token";
/// Rate-limit ledger, JSON array of Unix milliseconds.
pub const LIMIT_KEY: &str = "tempmail_limit";
/// Theme preference.
pub const THEME_KEY: &str = "theme";

/// String-valued key/value storage with all-or-nothing batches.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write every pair, or none of them.
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove every key, or none of them. Missing keys are ignored.
    fn remove_all(&self, keys: &[&str]) -> Result<()>;

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_all(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_all(&[key])
    }
}

/// Volatile store, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a consistent map: every mutation is a single insert/remove pass.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = self.lock();
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut map = self.lock();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// Store backed by a JSON object file.
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// # Errors
    /// Fails if the file exists but cannot be read or is not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str::<BTreeMap<String, String>>(&raw)
                .map_err(|e| Error::StoreFormat(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "opened local store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.clone();
        mutate(&mut next);
        if next == *guard {
            return Ok(());
        }

        self.write(&next)?;
        *guard = next;
        Ok(())
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(key).cloned())
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        self.update(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}

/// Display theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Stored preference; anything missing or unrecognized reads as dark.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        Ok(store
            .get(THEME_KEY)?
            .as_deref()
            .and_then(|raw| raw.parse::<Theme>().ok())
            .unwrap_or_default())
    }

    pub fn save(self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(THEME_KEY, self.as_str())
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(Error::StoreFormat(format!("unknown theme {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_batches() {
        let store = MemoryStore::new();
        store
            .set_all(&[(EMAIL_KEY, "a@example.com"), (TOKEN_KEY, "tok")])
            .unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("tok"));

        store.remove_all(&[EMAIL_KEY, TOKEN_KEY, TIMER_KEY]).unwrap();
        assert_eq!(store.get(EMAIL_KEY).unwrap(), None);
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("tempmail.json");

        let store = FileStore::open(&path).unwrap();
        store
            .set_all(&[(EMAIL_KEY, "a@example.com"), (TIMER_KEY, "1000")])
            .unwrap();
        store.set(THEME_KEY, "light").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(EMAIL_KEY).unwrap().as_deref(),
            Some("a@example.com")
        );
        assert_eq!(Theme::load(&reopened).unwrap(), Theme::Light);

        reopened.remove(EMAIL_KEY).unwrap();
        drop(reopened);
        let again = FileStore::open(&path).unwrap();
        assert_eq!(again.get(EMAIL_KEY).unwrap(), None);
        assert_eq!(again.get(TIMER_KEY).unwrap().as_deref(), Some("1000"));
    }

    #[test]
    fn file_store_rejects_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::StoreFormat(_)));
    }

    #[test]
    fn theme_defaults_to_dark_and_toggles() {
        let store = MemoryStore::new();
        assert_eq!(Theme::load(&store).unwrap(), Theme::Dark);

        store.set(THEME_KEY, "sepia").unwrap();
        assert_eq!(Theme::load(&store).unwrap(), Theme::Dark);

        Theme::Dark.toggled().save(&store).unwrap();
        assert_eq!(Theme::load(&store).unwrap(), Theme::Light);
    }

    #[test]
    fn theme_parses_stored_names() {
        assert_eq!("light".parse::<Theme>().unwrap(), Theme::Light);
        assert_eq!("dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!(matches!("Dark".parse::<Theme>(), Err(Error::StoreFormat(_))));
    }
}
