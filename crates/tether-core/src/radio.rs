// ── Radio ownership ──
//
// A single async lock over the wireless interface. Whoever holds a
// `RadioGuard` is the only code allowed to start or stop the hotspot or
// join a network. The holder is recorded so competing requests can be
// told what they are waiting on.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use strum::Display;
use tokio::sync::OwnedMutexGuard;

use crate::error::CoreError;

/// Who currently owns the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RadioUser {
    /// Hotspot start or stop.
    #[strum(serialize = "hotspot transition")]
    Hotspot,
    /// Join sequence for an upstream network.
    #[strum(serialize = "network join")]
    Join,
    #[strum(serialize = "disconnect")]
    Disconnect,
}

#[derive(Debug, Clone, Default)]
pub struct Radio {
    lock: Arc<tokio::sync::Mutex<()>>,
    holder: Arc<Mutex<Option<RadioUser>>>,
}

impl Radio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the radio without waiting.
    pub fn try_acquire(&self, user: RadioUser) -> Result<RadioGuard, CoreError> {
        match Arc::clone(&self.lock).try_lock_owned() {
            Ok(guard) => Ok(self.guard(guard, user)),
            Err(_) => Err(CoreError::RadioBusy {
                holder: self.holder(),
            }),
        }
    }

    /// Wait for the radio.
    pub async fn acquire(&self, user: RadioUser) -> RadioGuard {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        self.guard(guard, user)
    }

    pub fn holder(&self) -> Option<RadioUser> {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn guard(&self, guard: OwnedMutexGuard<()>, user: RadioUser) -> RadioGuard {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = Some(user);
        RadioGuard {
            holder: Arc::clone(&self.holder),
            _guard: guard,
        }
    }
}

/// Exclusive use of the radio; released on drop.
#[derive(Debug)]
pub struct RadioGuard {
    holder: Arc<Mutex<Option<RadioUser>>>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for RadioGuard {
    fn drop(&mut self) {
        // Cleared before the lock field is dropped.
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
