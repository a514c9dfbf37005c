//! Variable handle registry.
//!
//! The IDE shell pages into nested variable structures through opaque numeric
//! handles. The mapping is bidirectional and append-only: handles are
//! allocated on first use of a key and never reclaimed within a session.

use std::collections::HashMap;

const FIRST_HANDLE: i64 = 1;

#[derive(Default)]
pub struct HandleRegistry {
    by_handle: Vec<String>,
    by_key: HashMap<String, i64>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `key`, allocating one on first use.
    pub fn create(&mut self, key: &str) -> i64 {
        if let Some(handle) = self.by_key.get(key) {
            return *handle;
        }
        let handle = FIRST_HANDLE + self.by_handle.len() as i64;
        self.by_handle.push(key.to_string());
        self.by_key.insert(key.to_string(), handle);
        handle
    }

    pub fn get(&self, handle: i64) -> Option<&str> {
        let idx = usize::try_from(handle.checked_sub(FIRST_HANDLE)?).ok()?;
        self.by_handle.get(idx).map(String::as_str)
    }
}
