use std::collections::VecDeque;

use crate::canvas::{Layer, LayerId, LayerStack, PixelSurface};

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

/// Default number of checkpoints kept.
pub const DEFAULT_MAX_HISTORY: usize = 50;

// ============================================================================
// CANVAS SNAPSHOT: full copy of every layer
// ============================================================================

#[derive(Clone, Debug)]
pub struct CanvasSnapshot {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<LayerSnapshot>,
    pub active_layer_index: usize,
}

#[derive(Clone, Debug)]
pub struct LayerSnapshot {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub pixels: PixelSurface,
}

impl CanvasSnapshot {
    pub fn capture(stack: &LayerStack) -> Self {
        Self {
            width: stack.width,
            height: stack.height,
            active_layer_index: stack.active_layer_index,
            layers: stack
                .layers
                .iter()
                .map(|l| LayerSnapshot {
                    id: l.id,
                    name: l.name.clone(),
                    visible: l.visible,
                    opacity: l.opacity,
                    pixels: l.pixels.clone(),
                })
                .collect(),
        }
    }

    /// Replace the stack's layers, size and active pointer with this
    /// snapshot.  The preview surface is cleared (and reallocated when the
    /// size changes).
    pub fn restore_into(&self, stack: &mut LayerStack) {
        stack.layers = self
            .layers
            .iter()
            .map(|snap| Layer {
                id: snap.id,
                name: snap.name.clone(),
                visible: snap.visible,
                opacity: snap.opacity,
                pixels: snap.pixels.clone(),
            })
            .collect();
        stack.active_layer_index = self
            .active_layer_index
            .min(stack.layers.len().saturating_sub(1));
        if stack.width != self.width || stack.height != self.height {
            stack.width = self.width;
            stack.height = self.height;
            stack.preview_layer.resize(self.width, self.height);
        } else {
            stack.preview_layer.clear();
        }
        stack.mark_dirty();
    }

    pub fn memory_bytes(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.pixels.memory_bytes() + l.name.len())
            .sum()
    }
}

// ============================================================================
// HISTORY MANAGER: bounded linear checkpoint list with a cursor
// ============================================================================

/// Enabled state of the undo / redo controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct HistoryButtons {
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Result of an undo or redo request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryStep {
    /// False when the request was a no-op at either end of the history.
    pub applied: bool,
    pub buttons: HistoryButtons,
}

/// Checkpoints oldest-first.  `cursor` indexes the entry matching the
/// current canvas; entries after it form the redo tail.
pub struct HistoryManager {
    entries: VecDeque<CanvasSnapshot>,
    cursor: usize,
    max_history_size: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            max_history_size: max_history_size.max(1),
        }
    }

    /// Record the stack's current state as a new checkpoint.
    pub fn push(&mut self, stack: &LayerStack) -> HistoryButtons {
        // Drop the redo branch
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }

        self.entries.push_back(CanvasSnapshot::capture(stack));

        while self.entries.len() > self.max_history_size {
            if let Some(evicted) = self.entries.pop_front() {
                log_info!(
                    "History: evicted oldest checkpoint ({} bytes)",
                    evicted.memory_bytes()
                );
            }
        }
        self.cursor = self.entries.len() - 1;
        self.buttons()
    }

    pub fn undo(&mut self, stack: &mut LayerStack) -> HistoryStep {
        if !self.can_undo() {
            return self.step(false);
        }
        self.cursor -= 1;
        self.entries[self.cursor].restore_into(stack);
        self.step(true)
    }

    pub fn redo(&mut self, stack: &mut LayerStack) -> HistoryStep {
        if !self.can_redo() {
            return self.step(false);
        }
        self.cursor += 1;
        self.entries[self.cursor].restore_into(stack);
        self.step(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn buttons(&self) -> HistoryButtons {
        HistoryButtons {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }

    fn step(&self, applied: bool) -> HistoryStep {
        HistoryStep {
            applied,
            buttons: self.buttons(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the current checkpoint, `None` before the first push.
    pub fn cursor(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.cursor)
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_history_size
    }

    /// Checkpoint at `index` (0 = oldest).
    pub fn entry(&self, index: usize) -> Option<&CanvasSnapshot> {
        self.entries.get(index)
    }

    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(|e| e.memory_bytes()).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
