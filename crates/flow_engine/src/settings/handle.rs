use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

use super::types::FlowSettings;

static SETTINGS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_settings_lock_poison_once(operation: &'static str) {
    if SETTINGS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "settings lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionedSettings {
    pub generation: u64,
    pub settings: FlowSettings,
}

/// Shared, wholesale-replaceable settings cell.
///
/// Writers publish a complete settings value; readers compare generations
/// to notice a change between ticks.
#[derive(Clone, Debug)]
pub struct SettingsHandle {
    current: Arc<RwLock<VersionedSettings>>,
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(FlowSettings::default())
    }
}

impl SettingsHandle {
    pub fn new(settings: FlowSettings) -> Self {
        Self {
            current: Arc::new(RwLock::new(VersionedSettings {
                generation: 0,
                settings,
            })),
        }
    }

    pub fn current(&self) -> VersionedSettings {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn_settings_lock_poison_once("read");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn generation(&self) -> u64 {
        match self.current.read() {
            Ok(guard) => guard.generation,
            Err(poisoned) => {
                warn_settings_lock_poison_once("read");
                poisoned.into_inner().generation
            }
        }
    }

    /// Replaces the settings and returns the new generation.
    pub fn publish(&self, settings: FlowSettings) -> u64 {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_settings_lock_poison_once("write");
                poisoned.into_inner()
            }
        };
        guard.generation = guard.generation.saturating_add(1);
        guard.settings = settings;
        guard.generation
    }
}
