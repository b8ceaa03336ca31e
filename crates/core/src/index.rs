use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory map from a thread root timestamp to the canvas section most
/// recently inserted for that thread.
///
/// The map lives behind a mutex scoped to the store: concurrent updates to
/// the same thread key serialize last-write-wins, and updates to distinct
/// keys never corrupt each other. Entries are not persisted — sections
/// inserted before a process restart can no longer be retracted through the
/// bot.
#[derive(Debug, Default)]
pub struct ThreadSectionIndex {
    entries: Mutex<HashMap<String, String>>,
}

impl ThreadSectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert. A later insertion under the same thread root supersedes the
    /// earlier entry; only the most recent section stays retractable.
    pub fn record(&self, thread_root_ts: &str, section_id: &str) {
        let mut entries = self.entries.lock().expect("thread-section index lock");
        entries.insert(thread_root_ts.to_owned(), section_id.to_owned());
    }

    pub fn lookup(&self, thread_root_ts: &str) -> Option<String> {
        let entries = self.entries.lock().expect("thread-section index lock");
        entries.get(thread_root_ts).cloned()
    }

    /// Remove the entry for a thread, returning the section id it held.
    pub fn forget(&self, thread_root_ts: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("thread-section index lock");
        entries.remove(thread_root_ts)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("thread-section index lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
