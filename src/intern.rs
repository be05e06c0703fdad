//! Process-wide string pool for tag and category values.
//!
//! Many documents share the same handful of tags, so the parser routes
//! every tag and category through [`intern`] and stores the returned
//! `Arc<str>`. Interning only shares allocations: two interned values
//! compare, hash and order exactly like the strings they hold.

use std::{
    collections::HashSet,
    sync::{Arc, LazyLock},
};

use parking_lot::RwLock;

/// A set of canonical string allocations.
#[derive(Debug, Default)]
pub struct StringInterner {
    strings: RwLock<HashSet<Arc<str>>>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical allocation for `s`, inserting it on first use.
    pub fn intern(&self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.read().get(s) {
            return Arc::clone(existing);
        }

        let mut strings = self.strings.write();
        // Another thread may have inserted between the two locks.
        if let Some(existing) = strings.get(s) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(s);
        strings.insert(Arc::clone(&interned));
        interned
    }

    /// Number of distinct strings held.
    pub fn len(&self) -> usize {
        self.strings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pooled string. Values already handed out stay valid;
    /// they simply stop being shared with future interns.
    pub fn reset(&self) {
        self.strings.write().clear();
    }
}

static GLOBAL: LazyLock<StringInterner> = LazyLock::new(StringInterner::new);

/// Intern `s` in the process-wide pool.
pub fn intern(s: &str) -> Arc<str> {
    GLOBAL.intern(s)
}

/// Size of the process-wide pool.
pub fn pool_len() -> usize {
    GLOBAL.len()
}

/// Clear the process-wide pool. Intended for tests that need a clean
/// slate without restarting the process.
pub fn reset_pool() {
    GLOBAL.reset();
}
