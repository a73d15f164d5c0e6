use std::sync::{Arc, Mutex, MutexGuard};

/// A shared, ordered, append-only sequence.
///
/// Clones share the same storage, so a view can hold one handle and read while
/// the owning component appends through another. Entries are never mutated or
/// removed once pushed.
#[derive(Debug)]
pub struct AppendLog<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for AppendLog<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for AppendLog<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> AppendLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: T) {
        self.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // A panicking reader cannot leave a Vec half-pushed, so poison is ignored.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> AppendLog<T> {
    /// Copy of every entry, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().clone()
    }

    /// Copy of the last `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> Vec<T> {
        let entries = self.lock();
        let start = entries.len().saturating_sub(count);
        entries[start..].to_vec()
    }

    pub fn last(&self) -> Option<T> {
        self.lock().last().cloned()
    }
}
