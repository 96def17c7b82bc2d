// Admin panel state: the URL form and the selectable video list.
//
// Submitting trims the input and refuses empty strings; nothing else about
// the URL is checked. Deleting removes the selected record by id.

use crate::feed::registry::{VideoRecord, VideoRegistry};
use crate::feed::storage::KeyValueStore;

#[derive(Debug, Default)]
pub struct AdminPanel {
    input: String,
    selected: usize,
}

impl AdminPanel {
    pub fn new() -> Self {
        AdminPanel::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn push_char(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    /// One submit, at most one `add`. Empty input leaves the form untouched.
    pub fn submit<S: KeyValueStore>(&mut self, registry: &mut VideoRegistry<S>) -> Option<VideoRecord> {
        let url = self.input.trim();
        if url.is_empty() {
            return None;
        }
        let record = registry.add(url);
        self.input.clear();
        Some(record)
    }

    pub fn select_next(&mut self, len: usize) {
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    pub fn select_previous(&mut self, len: usize) {
        if len > 0 {
            if self.selected == 0 {
                self.selected = len - 1;
            } else {
                self.selected -= 1;
            }
        }
    }

    /// One delete, at most one `remove`. Returns the removed record.
    pub fn delete_selected<S: KeyValueStore>(&mut self, registry: &mut VideoRegistry<S>) -> Option<VideoRecord> {
        let record = registry.get(self.selected)?.clone();
        registry.remove(&record.id);
        self.selected = self.selected.min(registry.len().saturating_sub(1));
        Some(record)
    }
}
