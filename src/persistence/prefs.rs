use std::{
    cell::RefCell,
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Key/value medium holding persisted strings.
///
/// Each key is written as a whole value; there is no multi-key transaction.
/// Last writer wins.
pub trait PreferenceStore {
    /// Read a value. Returns `None` when the key was never written.
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Returns Ok(()) even if the key didn't exist.
    fn delete_key(&self, key: &str) -> Result<()>;

    /// Every key starting with `prefix`, in sorted order
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

impl<P: PreferenceStore + ?Sized> PreferenceStore for &P {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        (**self).get_string(key)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_string(key, value)
    }

    fn delete_key(&self, key: &str) -> Result<()> {
        (**self).delete_key(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys_with_prefix(prefix)
    }
}

impl<P: PreferenceStore + ?Sized> PreferenceStore for Rc<P> {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        (**self).get_string(key)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_string(key, value)
    }

    fn delete_key(&self, key: &str) -> Result<()> {
        (**self).delete_key(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys_with_prefix(prefix)
    }
}

fn keys_in(values: &BTreeMap<String, String>, prefix: &str) -> Vec<String> {
    values
        .range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Preferences kept only in memory
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RefCell<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_key(&self, key: &str) -> Result<()> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(keys_in(&self.values.borrow(), prefix))
    }
}

/// On-disk layout of [`FilePreferences`]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PreferencesFile {
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// Preferences stored in a single YAML file.
///
/// The file is read once on open. Every write rewrites it whole through a
/// temp file and an atomic rename, so a crash never leaves it half written.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: RefCell<BTreeMap<String, String>>,
}

impl FilePreferences {
    /// Open (or start) the preferences file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tracing::debug!("opening preferences at {:?}", path);
        let file = Self::read_file(&path)
            .with_context(|| format!("Failed to read preferences from {:?}", path))?;

        Ok(FilePreferences {
            path,
            values: RefCell::new(file.values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(path: &Path) -> Result<PreferencesFile, Error> {
        if !path.exists() {
            return Ok(PreferencesFile::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    fn write_file(&self, file: &PreferencesFile) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(file)?;

        let mut temp_name = self.path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, yaml)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Write `values` to disk, and only then make them the current state
    fn commit(&self, values: BTreeMap<String, String>) -> Result<()> {
        let file = PreferencesFile { values };
        self.write_file(&file)
            .with_context(|| format!("Failed to write preferences to {:?}", self.path))?;
        *self.values.borrow_mut() = file.values;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.borrow().clone();
        if values.insert(key.to_string(), value.to_string()).as_deref() == Some(value) {
            return Ok(());
        }
        self.commit(values)
    }

    fn delete_key(&self, key: &str) -> Result<()> {
        let mut values = self.values.borrow().clone();
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.commit(values)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(keys_in(&self.values.borrow(), prefix))
    }
}
