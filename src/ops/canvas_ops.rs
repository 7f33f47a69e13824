// ============================================================================
// CANVAS-LEVEL OPERATIONS: layer management, clear, import
// ============================================================================
//
// Structural edits push a checkpoint after the change, so undo steps back to
// the arrangement before it.  Clearing checkpoints first: the pre-clear state
// stays one undo away.

use image::{imageops, RgbaImage};

use crate::canvas::{Layer, LayerId, LayerStack, MoveDirection, PixelSurface};
use crate::components::history::HistoryManager;

/// Name used for a new layer when the host doesn't supply one.
pub fn next_layer_name(stack: &LayerStack) -> String {
    format!("Layer {}", stack.len() + 1)
}

/// Append a transparent layer on top and make it active.
pub fn add_layer(stack: &mut LayerStack, history: &mut HistoryManager, name: Option<String>) -> LayerId {
    let name = name.unwrap_or_else(|| next_layer_name(stack));
    let id = stack.create_layer(name);
    history.push(stack);
    id
}

/// Delete a layer (the last remaining layer is kept).
pub fn delete_layer(stack: &mut LayerStack, history: &mut HistoryManager, index: usize) -> bool {
    let Some(removed) = stack.delete_layer(index) else { return false };
    log_info!("Deleted layer '{}'", removed.name);
    history.push(stack);
    true
}

/// Copy a layer into a new one directly above it and make the copy active.
pub fn duplicate_layer(stack: &mut LayerStack, history: &mut HistoryManager, index: usize) -> Option<usize> {
    let src = stack.layer(index)?;
    let dup = Layer {
        id: 0,
        name: format!("{} Copy", src.name),
        visible: src.visible,
        opacity: src.opacity,
        pixels: src.pixels.clone(),
    };
    let new_idx = stack.insert_layer(index + 1, dup);
    history.push(stack);
    Some(new_idx)
}

pub fn move_layer(
    stack: &mut LayerStack,
    history: &mut HistoryManager,
    index: usize,
    direction: MoveDirection,
) -> bool {
    if !stack.move_layer(index, direction) {
        return false;
    }
    history.push(stack);
    true
}

/// Bring a layer to the top of the stack and make it active.
pub fn raise_to_top(stack: &mut LayerStack, history: &mut HistoryManager, index: usize) -> bool {
    if index + 1 == stack.len() {
        return stack.select_layer(index);
    }
    if !stack.raise_to_top(index) {
        return false;
    }
    history.push(stack);
    true
}

/// Checkpoint, then erase every layer to transparent.
pub fn clear_canvas(stack: &mut LayerStack, history: &mut HistoryManager) {
    history.push(stack);
    for layer in &mut stack.layers {
        layer.pixels.clear();
    }
    stack.mark_dirty();
}

/// Place a decoded image, stretched to the canvas size, in a new layer at
/// the bottom of the stack.  The new layer becomes active.
pub fn import_image(
    stack: &mut LayerStack,
    history: &mut HistoryManager,
    image: &RgbaImage,
    name: impl Into<String>,
) -> LayerId {
    let (w, h) = (stack.width, stack.height);
    let pixels = if image.width() == 0 || image.height() == 0 {
        PixelSurface::new(w, h)
    } else if image.width() == w && image.height() == h {
        PixelSurface::from_rgba_image(image.clone())
    } else {
        PixelSurface::from_rgba_image(imageops::resize(image, w, h, imageops::FilterType::Triangle))
    };
    let name = name.into();
    log_info!(
        "Imported '{}' ({}×{}) scaled to {}×{}",
        name,
        image.width(),
        image.height(),
        w,
        h
    );
    let layer = Layer {
        id: 0,
        name,
        visible: true,
        opacity: 1.0,
        pixels,
    };
    let idx = stack.insert_layer(0, layer);
    let id = stack.layers[idx].id;
    history.push(stack);
    id
}
