use std::{
    mem,
    sync::atomic::{AtomicBool, Ordering},
};

use mac_keycode::{Modifiers, Scancode};
use parking_lot::Mutex;

use crate::{Error, EventKind, Poster, Result};

/// One request seen by a [`RecordingPoster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posted {
    /// Virtual keycode requested.
    pub key_code: Scancode,
    /// Event kind requested.
    pub kind: EventKind,
    /// Flags requested.
    pub flags: Modifiers,
}

/// Poster that records requests instead of touching the OS.
#[derive(Debug, Default)]
pub struct RecordingPoster {
    posted: Mutex<Vec<Posted>>,
    failing: AtomicBool,
}

impl RecordingPoster {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every post is recorded and then rejected.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Drain and return everything posted so far.
    pub fn take(&self) -> Vec<Posted> {
        mem::take(&mut *self.posted.lock())
    }

    /// Copy of everything posted so far.
    pub fn snapshot(&self) -> Vec<Posted> {
        self.posted.lock().clone()
    }
}

impl Poster for RecordingPoster {
    fn post(&self, key_code: Scancode, kind: EventKind, flags: Modifiers) -> Result<()> {
        self.posted.lock().push(Posted {
            key_code,
            kind,
            flags,
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Rejected("recording poster set to fail".to_string()));
        }
        Ok(())
    }
}
