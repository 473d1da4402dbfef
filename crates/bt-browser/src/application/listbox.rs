//! Selection list over the registry's (device, service) rows.

use bt_browser_core::{ListEntry, Registry};

/// Flattened registry rows plus a clamped cursor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Listbox {
    rows: Vec<ListEntry>,
    cursor: usize,
}

impl Listbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the rows from `registry` and moves the cursor to the top.
    pub fn rebuild(&mut self, registry: &Registry) {
        self.rows = registry.entries();
        self.cursor = 0;
    }

    pub fn rows(&self) -> &[ListEntry] {
        &self.rows
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Moves the cursor up one row.  Returns `true` if it moved.
    pub fn move_up(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Moves the cursor down one row.  Returns `true` if it moved.
    pub fn move_down(&mut self) -> bool {
        if self.cursor + 1 >= self.rows.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn selected(&self) -> Option<&ListEntry> {
        self.rows.get(self.cursor)
    }

    /// The (device, service) index pair under the cursor, if the cursor is on
    /// a service row.
    pub fn selected_service(&self) -> Option<(usize, usize)> {
        let row = self.selected()?;
        Some((row.device_index, row.service_index?))
    }
}
