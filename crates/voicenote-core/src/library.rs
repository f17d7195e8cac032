//! Preset sound-effect catalog.
//!
//! A library is a directory with a `files.json` index mapping effect names to file
//! names inside that directory, e.g. `{"airhorn": "airhorn.mp3"}`.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::decode::AudioSource;
use crate::error::{Error, Result};

/// Name of the index file inside a library directory.
pub const INDEX_FILE: &str = "files.json";

#[derive(Clone, Debug)]
pub struct EffectLibrary {
    root: PathBuf,
    entries: BTreeMap<String, String>,
}

impl EffectLibrary {
    /// Load `<dir>/files.json`.
    pub fn load(dir: &Path) -> Result<Self> {
        let index = dir.join(INDEX_FILE);
        let raw = std::fs::read_to_string(&index)?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| Error::Library(format!("parse {}: {e}", index.display())))?;

        for (name, file) in &entries {
            if !is_relative_inside(Path::new(file)) {
                return Err(Error::Library(format!(
                    "effect {name:?} points outside the library: {file}"
                )));
            }
        }

        tracing::debug!(root = %dir.display(), effects = entries.len(), "effect library loaded");
        Ok(Self {
            root: dir.to_path_buf(),
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Effect names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(name, file)` pairs in sorted order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        self.entries
            .get(name)
            .map(|file| self.root.join(file))
            .ok_or_else(|| Error::UnknownEffect(name.to_string()))
    }

    /// Read the effect's bytes, labelled with its name.
    pub fn read(&self, name: &str) -> Result<AudioSource> {
        let path = self.path_of(name)?;
        let mut source = AudioSource::from_path(&path)?;
        source.name = name.to_string();
        Ok(source)
    }
}

fn is_relative_inside(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
