//! Persistence of listener preferences
//!
//! Only the volume survives restarts. The mute flag and the selected station
//! are per-session.

use crate::error::Result;
use std::sync::{Arc, Mutex, PoisonError};

/// Volume used when nothing valid is stored
pub const DEFAULT_VOLUME: f32 = 0.7;

/// Storage for the persisted volume
pub trait PreferenceStore: Send {
    /// Stored volume, `None` when absent
    fn load_volume(&self) -> Option<f32>;

    fn save_volume(&self, volume: f32) -> Result<()>;
}

/// In-process store; clones share the same value
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    volume: Arc<Mutex<Option<f32>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(volume: f32) -> Self {
        Self {
            volume: Arc::new(Mutex::new(Some(volume))),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load_volume(&self) -> Option<f32> {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save_volume(&self, volume: f32) -> Result<()> {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner) = Some(volume);
        Ok(())
    }
}

/// Stored volume clamped to `[0, 1]`, or [`DEFAULT_VOLUME`] when unusable
pub fn restored_volume(store: &dyn PreferenceStore) -> f32 {
    match store.load_volume() {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => DEFAULT_VOLUME,
    }
}
