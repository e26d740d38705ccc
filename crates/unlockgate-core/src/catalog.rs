//! Unlock catalog - the set of purchasable features, loaded from JSON.
//!
//! ```json
//! {
//!   "lock_duration_secs": 1.5,
//!   "unlocks": [
//!     { "name": "Frost Blade", "flag_key": "unlock.frost_blade",
//!       "cost_coin": 100, "cost_gem": "10", "required_level": 3,
//!       "icon": "icons/frost_blade" }
//!   ]
//! }
//! ```
//!
//! Every entry is validated at load time; a bad value fails the whole load.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use unlockgate_logic::definition::{DefinitionError, FlagKey, RawUnlockDefinition, UnlockDefinition};

/// Lock window used when the catalog file does not set one.
pub const DEFAULT_LOCK_DURATION_SECS: f32 = 1.0;

fn default_lock_duration() -> f32 {
    DEFAULT_LOCK_DURATION_SECS
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default = "default_lock_duration")]
    lock_duration_secs: f32,
    unlocks: Vec<RawUnlockDefinition>,
}

/// Errors that can occur while loading a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unlock #{index} is invalid: {source}")]
    Definition {
        index: usize,
        source: DefinitionError,
    },
    #[error("flag key '{0}' is used by more than one unlock")]
    DuplicateFlagKey(FlagKey),
    #[error("lock duration must be a non-negative number of seconds, found {0}")]
    InvalidLockDuration(f32),
}

/// Validated unlock definitions plus the shared lock window length.
#[derive(Debug, Clone)]
pub struct Catalog {
    lock_duration_secs: f32,
    definitions: Vec<UnlockDefinition>,
    by_key: HashMap<FlagKey, usize>,
}

impl Catalog {
    pub fn from_definitions(
        definitions: Vec<UnlockDefinition>,
        lock_duration_secs: f32,
    ) -> Result<Self, CatalogError> {
        if !lock_duration_secs.is_finite() || lock_duration_secs < 0.0 {
            return Err(CatalogError::InvalidLockDuration(lock_duration_secs));
        }

        let mut by_key = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if by_key.insert(def.flag_key().clone(), i).is_some() {
                return Err(CatalogError::DuplicateFlagKey(def.flag_key().clone()));
            }
        }

        Ok(Self {
            lock_duration_secs,
            definitions,
            by_key,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(text)?;
        let definitions = file
            .unlocks
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                UnlockDefinition::try_from(raw)
                    .map_err(|source| CatalogError::Definition { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let catalog = Self::from_definitions(definitions, file.lock_duration_secs)?;
        log::info!(
            "Loaded {} unlocks (lock window {:.2}s)",
            catalog.len(),
            catalog.lock_duration_secs
        );
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn lock_duration_secs(&self) -> f32 {
        self.lock_duration_secs
    }

    pub fn get(&self, key: &FlagKey) -> Option<&UnlockDefinition> {
        self.by_key.get(key).map(|&i| &self.definitions[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnlockDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
