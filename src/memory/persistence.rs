//! Durable per-host records
//!
//! One JSON file per host, named after the host's filesystem-safe stem.
//! Writes go to a temporary sibling first and are renamed into place.

use crate::core::error::{OpsError, Result};
use crate::core::types::HostId;
use crate::memory::record::HostMemory;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Storage backend for host memories
pub trait HostRecordStore: Send + Sync {
    /// `Ok(None)` when the host has never been recorded
    fn load(&self, host: &HostId) -> Result<Option<HostMemory>>;
    fn save(&self, memory: &HostMemory) -> Result<()>;
    /// Removing a record that does not exist is not an error
    fn remove(&self, host: &HostId) -> Result<()>;
    /// Move an unreadable record out of the way so the next save cannot
    /// overwrite it
    fn set_aside(&self, _host: &HostId) -> Result<()> {
        Ok(())
    }
}

/// JSON files under a single directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, host: &HostId) -> PathBuf {
        self.dir.join(format!("{}.json", host.file_stem()))
    }

    /// Where an unreadable record is kept after `set_aside`
    pub fn set_aside_path_for(&self, host: &HostId) -> PathBuf {
        self.path_for(host).with_extension("json.corrupt")
    }
}

fn persistence_error(action: &str, path: &Path, e: impl std::fmt::Display) -> OpsError {
    OpsError::Persistence(format!("Failed to {} {}: {}", action, path.display(), e))
}

impl HostRecordStore for JsonFileStore {
    fn load(&self, host: &HostId) -> Result<Option<HostMemory>> {
        let path = self.path_for(host);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(persistence_error("read", &path, e)),
        };

        let memory: HostMemory =
            serde_json::from_str(&content).map_err(|e| persistence_error("parse", &path, e))?;
        Ok(Some(memory))
    }

    fn save(&self, memory: &HostMemory) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| persistence_error("create", &self.dir, e))?;

        let path = self.path_for(&memory.host);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(memory)?;

        fs::write(&tmp, json).map_err(|e| persistence_error("write", &tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| persistence_error("replace", &path, e))?;
        Ok(())
    }

    fn remove(&self, host: &HostId) -> Result<()> {
        let path = self.path_for(host);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence_error("remove", &path, e)),
        }
    }

    fn set_aside(&self, host: &HostId) -> Result<()> {
        let path = self.path_for(host);
        let aside = self.set_aside_path_for(host);
        match fs::rename(&path, &aside) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence_error("set aside", &path, e)),
        }
    }
}
