//! Unlock definitions — immutable per-feature configuration.
//!
//! A definition names one purchasable feature: what it costs in each
//! currency, which cleared stage it requires, and the key of the persisted
//! flag that records whether it has been bought. Definitions are validated
//! once, when built; after that every field is trusted.
//!
//! Config files use [`RawUnlockDefinition`], whose numeric fields are signed
//! and whose costs may be written as text, so that a bad value surfaces as a
//! [`DefinitionError`] at load time instead of a deserializer panic.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two spendable currencies an unlock can cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    /// Soft currency (currency A).
    Coin,
    /// Premium currency (currency B).
    Gem,
}

impl CurrencyKind {
    pub fn all() -> [CurrencyKind; 2] {
        [CurrencyKind::Coin, CurrencyKind::Gem]
    }

    pub fn label(&self) -> &'static str {
        match self {
            CurrencyKind::Coin => "coin",
            CurrencyKind::Gem => "gem",
        }
    }
}

/// Stable key of a persisted unlock flag. Unique per feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagKey(String);

impl FlagKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlagKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Opaque presentation asset reference. Carried through, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IconRef(String);

impl IconRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One purchasable feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockDefinition {
    name: String,
    flag_key: FlagKey,
    cost_coin: u64,
    cost_gem: u64,
    required_level: u32,
    icon: IconRef,
}

impl UnlockDefinition {
    /// Build a definition, rejecting an empty name or flag key.
    pub fn new(
        name: impl Into<String>,
        flag_key: impl Into<FlagKey>,
        cost_coin: u64,
        cost_gem: u64,
        required_level: u32,
        icon: impl Into<IconRef>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let flag_key = flag_key.into();
        if name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if flag_key.as_str().trim().is_empty() {
            return Err(DefinitionError::EmptyFlagKey { name });
        }
        Ok(Self {
            name,
            flag_key,
            cost_coin,
            cost_gem,
            required_level,
            icon: icon.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flag_key(&self) -> &FlagKey {
        &self.flag_key
    }

    pub fn cost_coin(&self) -> u64 {
        self.cost_coin
    }

    pub fn cost_gem(&self) -> u64 {
        self.cost_gem
    }

    /// Cost in the given currency.
    pub fn cost(&self, kind: CurrencyKind) -> u64 {
        match kind {
            CurrencyKind::Coin => self.cost_coin,
            CurrencyKind::Gem => self.cost_gem,
        }
    }

    /// Highest cleared stage needed before the feature can be bought.
    pub fn required_level(&self) -> u32 {
        self.required_level
    }

    pub fn icon(&self) -> &IconRef {
        &self.icon
    }
}

impl From<&str> for IconRef {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for IconRef {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<String> for FlagKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

/// A numeric config value, written either as a JSON integer or as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(i64),
    Text(String),
}

impl RawAmount {
    fn resolve(&self, field: &'static str) -> Result<i64, DefinitionError> {
        let value = match self {
            RawAmount::Number(n) => *n,
            RawAmount::Text(text) => {
                text.trim()
                    .parse::<i64>()
                    .map_err(|_| DefinitionError::InvalidNumber {
                        field,
                        text: text.clone(),
                    })?
            }
        };
        if value < 0 {
            return Err(DefinitionError::NegativeValue { field, value });
        }
        Ok(value)
    }
}

impl From<i64> for RawAmount {
    fn from(n: i64) -> Self {
        RawAmount::Number(n)
    }
}

/// Definition as authored in a config file, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUnlockDefinition {
    pub name: String,
    pub flag_key: String,
    pub cost_coin: RawAmount,
    pub cost_gem: RawAmount,
    pub required_level: RawAmount,
    #[serde(default)]
    pub icon: String,
}

impl TryFrom<RawUnlockDefinition> for UnlockDefinition {
    type Error = DefinitionError;

    fn try_from(raw: RawUnlockDefinition) -> Result<Self, Self::Error> {
        let cost_coin = raw.cost_coin.resolve("cost_coin")? as u64;
        let cost_gem = raw.cost_gem.resolve("cost_gem")? as u64;
        let level = raw.required_level.resolve("required_level")?;
        let required_level = u32::try_from(level).map_err(|_| DefinitionError::OutOfRange {
            field: "required_level",
            value: level,
        })?;
        UnlockDefinition::new(
            raw.name,
            raw.flag_key,
            cost_coin,
            cost_gem,
            required_level,
            raw.icon,
        )
    }
}

/// Configuration errors found while building a definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("unlock name is empty")]
    EmptyName,
    #[error("unlock '{name}' has an empty flag key")]
    EmptyFlagKey { name: String },
    #[error("{field} must be non-negative, found {value}")]
    NegativeValue { field: &'static str, value: i64 },
    #[error("{field} is not a whole number: {text:?}")]
    InvalidNumber { field: &'static str, text: String },
    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}
