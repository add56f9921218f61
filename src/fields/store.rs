//! Durable field record.
//!
//! The record is a single JSON object keyed by field id. Reads always go back
//! to disk so the public and admin surfaces see each other's writes. Writes go
//! to a unique temp file in the same directory and are renamed over the
//! canonical path, so a crash never leaves a truncated record behind.

use super::{
    error::{FieldError, Result},
    initial_map, Field, FieldMap, FieldSet,
};
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, info, instrument, warn};
use ulid::Ulid;

/// On-disk value for one field. Older records stored the bare hash string.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredField {
    Legacy(String),
    Record(Field),
}

impl From<StoredField> for Field {
    fn from(stored: StoredField) -> Self {
        match stored {
            StoredField::Legacy(secret_hash) => Field::locked_with(secret_hash),
            StoredField::Record(field) => field,
        }
    }
}

enum Snapshot {
    Loaded(FieldMap),
    Missing,
    Corrupt(serde_json::Error),
}

#[derive(Debug)]
pub struct FieldStore {
    path: PathBuf,
    fields: FieldSet,
    // Serializes load-modify-save within this process.
    write_lock: Mutex<()>,
}

impl FieldStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, fields: FieldSet) -> Self {
        Self {
            path: path.into(),
            fields,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn fields(&self) -> FieldSet {
        self.fields
    }

    /// Read the durable record.
    ///
    /// A missing record is created with every field locked and empty. A record
    /// that is not a JSON object is moved aside and replaced the same way.
    /// Both repairs happen under the writer lock, so they never overwrite a
    /// concurrent [`Self::update`].
    ///
    /// # Errors
    /// Returns `Persistence` if the file cannot be read or the initial record
    /// cannot be written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<FieldMap> {
        if let Snapshot::Loaded(map) = self.read().await? {
            return Ok(map);
        }
        let _guard = self.write_lock.lock().await;
        self.load_locked().await
    }

    /// [`Self::load`] for callers already holding the writer lock. The record
    /// is read again, since another writer may have repaired it meanwhile.
    async fn load_locked(&self) -> Result<FieldMap> {
        match self.read().await? {
            Snapshot::Loaded(map) => Ok(map),
            Snapshot::Missing => {
                info!("Field record not found, creating initial record");
                self.initialize().await
            }
            Snapshot::Corrupt(err) => {
                warn!("Field record is not valid JSON ({err}), reinitializing");
                self.quarantine().await;
                self.initialize().await
            }
        }
    }

    async fn read(&self) -> Result<Snapshot> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Snapshot::Missing),
            Err(err) => {
                return Err(FieldError::persistence(
                    format!("failed to read {}", self.path.display()),
                    err,
                ))
            }
        };

        Ok(
            match serde_json::from_str::<BTreeMap<String, Value>>(&contents) {
                Ok(raw) => Snapshot::Loaded(self.normalize(raw)),
                Err(err) => Snapshot::Corrupt(err),
            },
        )
    }

    /// Write the full mapping atomically.
    ///
    /// # Errors
    /// Returns `Persistence` on any I/O failure; the canonical record is left
    /// untouched in that case.
    #[instrument(skip(self, map), fields(path = %self.path.display()))]
    pub async fn save(&self, map: &FieldMap) -> Result<()> {
        let json = serde_json::to_vec_pretty(map).map_err(|err| {
            FieldError::persistence("failed to serialize field record", err.into())
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|err| {
                FieldError::persistence(format!("failed to create {}", parent.display()), err)
            })?;
        }

        let tmp_path = self.tmp_path();
        if let Err(err) = write_synced(&tmp_path, &json).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FieldError::persistence(
                format!("failed to write {}", tmp_path.display()),
                err,
            ));
        }

        if let Err(err) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FieldError::persistence(
                format!("failed to replace {}", self.path.display()),
                err,
            ));
        }

        debug!(fields = map.len(), "Saved field record");
        Ok(())
    }

    /// Load, apply `change`, and save if it reports a modification.
    ///
    /// `change` returns the caller's value and whether the map was modified.
    ///
    /// # Errors
    /// Returns `Persistence` if the load or the save fails.
    pub async fn update<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut FieldMap) -> (T, bool),
    {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load_locked().await?;
        let (value, modified) = change(&mut map);
        if modified {
            self.save(&map).await?;
        }
        Ok(value)
    }

    async fn initialize(&self) -> Result<FieldMap> {
        let map = initial_map(self.fields);
        self.save(&map).await?;
        Ok(map)
    }

    /// Keep unreadable bytes around for inspection instead of overwriting them.
    async fn quarantine(&self) {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Ulid::new()));
        let backup = PathBuf::from(name);
        match fs::rename(&self.path, &backup).await {
            Ok(()) => warn!("Moved unreadable field record to {}", backup.display()),
            Err(err) => warn!("Failed to move unreadable field record aside: {err}"),
        }
    }

    fn normalize(&self, raw: BTreeMap<String, Value>) -> FieldMap {
        let mut map = initial_map(self.fields);
        for (key, value) in raw {
            let Ok(id) = self.fields.parse(&key) else {
                warn!("Ignoring unknown field {key:?} in field record");
                continue;
            };
            let mut field: Field = match serde_json::from_value::<StoredField>(value) {
                Ok(stored) => stored.into(),
                Err(err) => {
                    warn!("Ignoring malformed entry for {id}: {err}");
                    continue;
                }
            };
            if !field.has_secret() {
                field.unlocked = false;
            }
            map.insert(id, field);
        }
        map
    }

    fn tmp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "fields".into(), |name| name.to_string_lossy());
        self.path
            .with_file_name(format!(".{file_name}.{}.tmp", Ulid::new()))
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
