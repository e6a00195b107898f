// ============================================================================
// HISTORY STACK: linear, branch-truncating undo/redo over raster snapshots
// ============================================================================

use crate::raster::Raster;

/// One committed state: the raster plus a label for history panels.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub raster: Raster,
    pub description: String,
}

/// Undo/redo history over immutable rasters.
///
/// Invariants:
/// * `cursor` is `Some(i)` with `i < entries.len()` when non-empty, `None` when empty.
/// * Index 0 is the "original" used for before/after comparison.
/// * `commit` discards everything after the cursor before appending.
///
/// Clearing transient session state (layers, crop, hotspot) is the caller's job;
/// every mutating method reports whether the active raster changed so the
/// caller knows when to do it.
#[derive(Default)]
pub struct HistoryStack {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
    /// Running byte total across all entries.
    total_memory: usize,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raster at the cursor.
    pub fn current(&self) -> Option<&Raster> {
        self.cursor.map(|i| &self.entries[i].raster)
    }

    /// Raster at index 0.
    pub fn original(&self) -> Option<&Raster> {
        self.entries.first().map(|e| &e.raster)
    }

    /// Truncate to `[0, cursor]`, append, move the cursor to the new last entry.
    pub fn commit(&mut self, raster: Raster, description: impl Into<String>) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        for dropped in self.entries.drain(keep..) {
            self.total_memory = self.total_memory.saturating_sub(dropped.raster.memory_bytes());
        }

        self.total_memory += raster.memory_bytes();
        self.entries.push(HistoryEntry {
            raster,
            description: description.into(),
        });
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Step back one entry. Returns `false` (and does nothing) at the start.
    pub fn undo(&mut self) -> bool {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                true
            }
            _ => false,
        }
    }

    /// Step forward one entry. Returns `false` (and does nothing) at the end.
    pub fn redo(&mut self) -> bool {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => {
                self.cursor = Some(c + 1);
                true
            }
            _ => false,
        }
    }

    /// Jump to the original without truncating; redo stays available.
    /// Returns `false` only when the history is empty.
    pub fn reset_to_original(&mut self) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        self.cursor = Some(0);
        true
    }

    /// Start a fresh one-entry history.
    pub fn replace_all(&mut self, raster: Raster, description: impl Into<String>) {
        self.clear();
        self.commit(raster, description);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.total_memory = 0;
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Labels of all entries, oldest first.
    pub fn descriptions(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.description.clone()).collect()
    }

    /// Label of the entry `undo()` would leave.
    pub fn undo_description(&self) -> Option<&str> {
        match self.cursor {
            Some(c) if c > 0 => Some(self.entries[c].description.as_str()),
            _ => None,
        }
    }

    /// Label of the entry `redo()` would reach.
    pub fn redo_description(&self) -> Option<&str> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => Some(self.entries[c + 1].description.as_str()),
            _ => None,
        }
    }

    /// Memory held by all entries, in bytes (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }
}
