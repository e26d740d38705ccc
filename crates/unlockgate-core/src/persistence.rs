//! Save/Load functionality for persisting the player profile
//!
//! Uses bincode for compact binary serialization. Only the durable part of
//! the profile is written: persisted balances, unlock flags and progress.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile::{PlayerProfile, ProfileSnapshot};

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable save file contents
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Durable profile state
    pub profile: ProfileSnapshot,
}

/// Save the profile to a writer
pub fn save_profile<W: Write>(writer: W, profile: &PlayerProfile) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        profile: profile.snapshot(),
    };
    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a profile from a reader
pub fn load_profile<R: Read>(reader: R) -> Result<PlayerProfile, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    Ok(PlayerProfile::from_snapshot(save_data.profile))
}

/// Write a save file, replacing any previous one only after the new
/// contents are fully on disk.
pub fn save_to_file(path: impl AsRef<Path>, profile: &PlayerProfile) -> Result<(), SaveError> {
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        save_profile(&mut writer, profile)?;
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    log::debug!("Saved profile to {}", path.display());
    Ok(())
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<PlayerProfile, SaveError> {
    let reader = BufReader::new(File::open(path)?);
    load_profile(reader)
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}
