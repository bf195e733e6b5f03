//! Settings persistence
//!
//! The orchestrator never touches the settings file directly. It is handed a
//! [`SettingsRepository`] and goes through a [`SettingsStore`], which only
//! writes when the settings value as a whole has changed.

use crate::config::toml_config;
use crate::config::Settings;
use crate::error::ConsoleError;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Load/save access to persisted connect-page settings
pub trait SettingsRepository: Send + Sync {
    fn load(&self) -> Result<Settings, ConsoleError>;
    fn save(&self, settings: &Settings) -> Result<(), ConsoleError>;
}

/// Settings stored in the `[settings]` table of a TOML config file
#[derive(Debug, Clone)]
pub struct TomlSettingsRepository {
    path: PathBuf,
}

impl TomlSettingsRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Repository backed by the default config file location
    pub fn default_location() -> Result<Self, ConsoleError> {
        Ok(Self::new(toml_config::get_config_path()?))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SettingsRepository for TomlSettingsRepository {
    fn load(&self) -> Result<Settings, ConsoleError> {
        toml_config::load_settings_from_path(&self.path)
    }

    fn save(&self, settings: &Settings) -> Result<(), ConsoleError> {
        toml_config::save_settings_to_path(settings, &self.path)
    }
}

/// In-memory repository that counts writes
#[derive(Debug, Default, Clone)]
pub struct MemorySettingsRepository {
    inner: Arc<Mutex<(Settings, usize)>>,
}

impl MemorySettingsRepository {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new((settings, 0))),
        }
    }

    /// Number of times `save` has been called
    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|guard| guard.1).unwrap_or(0)
    }

    pub fn stored(&self) -> Settings {
        self.inner
            .lock()
            .map(|guard| guard.0.clone())
            .unwrap_or_default()
    }
}

impl SettingsRepository for MemorySettingsRepository {
    fn load(&self) -> Result<Settings, ConsoleError> {
        Ok(self.stored())
    }

    fn save(&self, settings: &Settings) -> Result<(), ConsoleError> {
        if let Ok(mut guard) = self.inner.lock() {
            guard.0 = settings.clone();
            guard.1 += 1;
        }
        Ok(())
    }
}

/// In-memory copy of the settings with a value-level write-through watch
pub struct SettingsStore {
    repository: Arc<dyn SettingsRepository>,
    current: Mutex<Settings>,
}

impl SettingsStore {
    /// Load the current settings from the repository
    pub fn open(repository: Arc<dyn SettingsRepository>) -> Result<Self, ConsoleError> {
        let current = repository.load()?;
        Ok(Self {
            repository,
            current: Mutex::new(current),
        })
    }

    pub fn get(&self) -> Settings {
        self.current
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Apply an edit and persist it if the resulting value differs
    ///
    /// Returns whether a write happened.
    pub fn update<F>(&self, edit: F) -> Result<bool, ConsoleError>
    where
        F: FnOnce(&mut Settings),
    {
        let changed = {
            let mut guard = match self.current.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let mut next = guard.clone();
            edit(&mut next);
            if next == *guard {
                None
            } else {
                *guard = next.clone();
                Some(next)
            }
        };

        match changed {
            Some(settings) => {
                self.repository.save(&settings)?;
                debug!("Settings changed, persisted");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_writes_only_on_change() {
        let repository = MemorySettingsRepository::default();
        let store = SettingsStore::open(Arc::new(repository.clone())).unwrap();

        assert!(!store.update(|_| {}).unwrap());
        assert_eq!(repository.save_count(), 0);

        assert!(store.update(|s| s.address = "router".to_string()).unwrap());
        assert_eq!(repository.save_count(), 1);

        // Same value again is not a change
        assert!(!store.update(|s| s.address = "router".to_string()).unwrap());
        assert_eq!(repository.save_count(), 1);
        assert_eq!(repository.stored().address, "router");
    }
}
