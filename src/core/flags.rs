use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// The per-hook switches that gate the lifecycle.
///
/// `execute` gates the execute phase and `post_process` gates the post-process
/// phase. `chained` and `fan_out` travel with the rest of the set on every reset
/// but do not gate anything; `fan_out` only exists on anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub execute: bool,
    pub chained: bool,
    pub post_process: bool,
    pub fan_out: Option<bool>,
}

impl Flags {
    /// The flag set of a plain hook.
    pub fn hook() -> Self {
        Flags {
            execute: true,
            chained: true,
            post_process: true,
            fan_out: None,
        }
    }

    /// The flag set of an anchor, which also carries `fan_out`.
    pub fn anchor() -> Self {
        Flags {
            fan_out: Some(true),
            ..Flags::hook()
        }
    }

    /// Sets every flag present in the set to `value`.
    pub fn set_all(&mut self, value: bool) {
        self.execute = value;
        self.chained = value;
        self.post_process = value;
        if let Some(fan_out) = self.fan_out.as_mut() {
            *fan_out = value;
        }
    }

    /// True when every flag present in the set equals `value`.
    pub fn all(&self, value: bool) -> bool {
        self.execute == value
            && self.chained == value
            && self.post_process == value
            && self.fan_out.is_none_or(|f| f == value)
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::hook()
    }
}

/// Interior-mutable home for a hook's [`Flags`].
///
/// The lock is only ever held for a copy in or out, never across an await.
#[derive(Debug, Default)]
pub(crate) struct FlagCell(Mutex<Flags>);

impl FlagCell {
    pub(crate) fn new(flags: Flags) -> Self {
        FlagCell(Mutex::new(flags))
    }

    pub(crate) fn get(&self) -> Flags {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_all(&self, value: bool) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_all(value);
    }

    pub(crate) fn replace(&self, flags: Flags) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = flags;
    }
}
