use image::RgbaImage;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::canvas::{dimensions_fit, LayerId, LayerStack, MoveDirection, PixelSurface};
use crate::components::colors::Palette;
use crate::components::history::{HistoryButtons, HistoryManager, HistoryStep};
use crate::components::tools::{
    shortcut_for_key, ConfigChange, KeyAction, PointerEvent, Tool, ToolAction, ToolConfig,
    ToolStateMachine, Viewport,
};
use crate::io::{self, ExportFormat, ExportOptions, ProjectError, ProjectRecord};
use crate::ops::canvas_ops;
use crate::ops::text::FontBook;
use crate::settings::EngineSettings;

#[cfg(test)]
#[path = "project_test.rs"]
mod project_test;

/// Single open document: the layer stack plus everything that edits it.
pub struct Project {
    pub id: Uuid,
    canvas: LayerStack,
    history: HistoryManager,
    tools: ToolStateMachine,
    pub fonts: FontBook,
    pub palette: Palette,
    /// Last composite of the visible layers.
    frame: PixelSurface,
    frame_generation: Option<u64>,
    /// `None` for unsaved/untitled files.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, settings: &EngineSettings) -> Self {
        let canvas = LayerStack::new(settings.default_width, settings.default_height);
        Self::with_canvas(format!("Untitled-{}", untitled_counter), canvas, settings)
    }

    /// Open a project file or raster image.
    pub fn open(path: &Path, settings: &EngineSettings) -> Result<Self, ProjectError> {
        let canvas = io::load_image_sync(path)?;
        let mut project = Self::with_canvas(display_name(path), canvas, settings);
        if io::is_project_path(path) {
            project.path = Some(path.to_path_buf());
        }
        Ok(project)
    }

    fn with_canvas(name: String, canvas: LayerStack, settings: &EngineSettings) -> Self {
        let config = ToolConfig {
            grid_step: settings.grid_step,
            font_family: settings.default_font.clone(),
            text_size: settings.default_text_size,
            ..ToolConfig::default()
        };
        let mut palette = Palette::default();
        for (slot, color) in settings.swatches.iter().enumerate() {
            palette.set(slot, *color);
        }
        let mut project = Self {
            id: Uuid::new_v4(),
            frame: PixelSurface::new(canvas.width, canvas.height),
            frame_generation: None,
            canvas,
            history: HistoryManager::new(settings.max_undo_steps),
            tools: ToolStateMachine::new(config),
            fonts: FontBook::new(),
            palette,
            path: None,
            is_dirty: false,
            name,
        };
        // Baseline checkpoint so the first edit can be undone
        project.history.push(&project.canvas);
        project.recomposite();
        project
    }

    // ---- accessors ----------------------------------------------------------

    pub fn canvas(&self) -> &LayerStack {
        &self.canvas
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn tools(&self) -> &ToolStateMachine {
        &self.tools
    }

    /// Composite of the visible layers as of the last change.
    pub fn frame(&self) -> &PixelSurface {
        &self.frame
    }

    /// Tool previews and grid; drawn over `frame` by the host.
    pub fn overlay(&self) -> &PixelSurface {
        &self.canvas.preview_layer
    }

    pub fn history_buttons(&self) -> HistoryButtons {
        self.history.buttons()
    }

    // ---- compositing --------------------------------------------------------

    /// Rebuild `frame` if the stack changed since the last composite.
    pub fn recomposite(&mut self) {
        if self.frame_generation == Some(self.canvas.dirty_generation) {
            return;
        }
        self.canvas.composite_into(&mut self.frame);
        self.frame_generation = Some(self.canvas.dirty_generation);
    }

    fn after_edit(&mut self) {
        self.is_dirty = true;
        self.recomposite();
    }

    fn absorb(&mut self, actions: Vec<ToolAction>) -> Vec<ToolAction> {
        if actions.iter().any(|a| matches!(a, ToolAction::Recomposite)) {
            self.after_edit();
        }
        actions
    }

    // ---- input --------------------------------------------------------------

    pub fn pointer_down(&mut self, ev: PointerEvent) -> Vec<ToolAction> {
        let actions = self.tools.on_pointer_down(&mut self.canvas, &mut self.history, ev);
        self.absorb(actions)
    }

    pub fn pointer_move(&mut self, ev: PointerEvent) -> Vec<ToolAction> {
        let actions = self.tools.on_pointer_move(&mut self.canvas, &mut self.history, ev);
        self.absorb(actions)
    }

    pub fn pointer_up(&mut self, ev: PointerEvent) -> Vec<ToolAction> {
        let actions = self.tools.on_pointer_up(&mut self.canvas, &mut self.history, ev);
        self.absorb(actions)
    }

    pub fn pointer_leave(&mut self, ev: PointerEvent) -> Vec<ToolAction> {
        let actions = self.tools.on_pointer_leave(&mut self.canvas, &mut self.history, ev);
        self.absorb(actions)
    }

    pub fn set_tool(&mut self, tool: Tool) -> Vec<ToolAction> {
        let actions = self.tools.set_tool(tool, &mut self.canvas, &mut self.history);
        self.absorb(actions)
    }

    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.tools.set_viewport(viewport);
    }

    pub fn apply_config(&mut self, change: ConfigChange) {
        if self.tools.apply_config(change) {
            self.tools.refresh_overlay(&mut self.canvas);
        }
    }

    /// Run a keyboard shortcut.  Returns what it resolved to.
    pub fn handle_key(&mut self, key: &str, ctrl: bool, shift: bool) -> Option<KeyAction> {
        let action = shortcut_for_key(key, ctrl, shift)?;
        match action {
            KeyAction::Undo => {
                self.undo();
            }
            KeyAction::Redo => {
                self.redo();
            }
            KeyAction::SelectTool(tool) => {
                self.set_tool(tool);
            }
        }
        Some(action)
    }

    pub fn commit_text(&mut self, text: &str) -> Vec<ToolAction> {
        let actions = self
            .tools
            .commit_text(&mut self.canvas, &mut self.history, &mut self.fonts, text);
        self.absorb(actions)
    }

    pub fn cancel_text(&mut self) -> bool {
        self.tools.cancel_text()
    }

    // ---- colours ------------------------------------------------------------

    /// Make a swatch the current colour.
    pub fn pick_swatch(&mut self, slot: usize) -> bool {
        let Some(color) = self.palette.get(slot) else { return false };
        self.apply_config(ConfigChange::Color(color));
        true
    }

    /// Store the current colour in the first swatch.
    pub fn save_color(&mut self) {
        self.palette.save_current(self.tools.config().color);
    }

    // ---- history ------------------------------------------------------------

    pub fn undo(&mut self) -> HistoryStep {
        let step = self.history.undo(&mut self.canvas);
        if step.applied {
            self.tools.refresh_overlay(&mut self.canvas);
            self.after_edit();
        }
        step
    }

    pub fn redo(&mut self) -> HistoryStep {
        let step = self.history.redo(&mut self.canvas);
        if step.applied {
            self.tools.refresh_overlay(&mut self.canvas);
            self.after_edit();
        }
        step
    }

    // ---- layers -------------------------------------------------------------

    pub fn add_layer(&mut self, name: Option<String>) -> LayerId {
        let id = canvas_ops::add_layer(&mut self.canvas, &mut self.history, name);
        self.after_edit();
        id
    }

    pub fn delete_layer(&mut self, index: usize) -> bool {
        let done = canvas_ops::delete_layer(&mut self.canvas, &mut self.history, index);
        if done {
            self.after_edit();
        }
        done
    }

    pub fn duplicate_layer(&mut self, index: usize) -> Option<usize> {
        let idx = canvas_ops::duplicate_layer(&mut self.canvas, &mut self.history, index)?;
        self.after_edit();
        Some(idx)
    }

    pub fn move_layer(&mut self, index: usize, direction: MoveDirection) -> bool {
        let done = canvas_ops::move_layer(&mut self.canvas, &mut self.history, index, direction);
        if done {
            self.after_edit();
        }
        done
    }

    pub fn raise_to_top(&mut self, index: usize) -> bool {
        let done = canvas_ops::raise_to_top(&mut self.canvas, &mut self.history, index);
        if done {
            self.after_edit();
        }
        done
    }

    pub fn select_layer(&mut self, index: usize) -> bool {
        self.canvas.select_layer(index)
    }

    pub fn set_visibility(&mut self, index: usize, visible: bool) -> bool {
        let done = self.canvas.set_visibility(index, visible);
        if done {
            self.after_edit();
        }
        done
    }

    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> bool {
        let done = self.canvas.set_opacity(index, opacity);
        if done {
            self.after_edit();
        }
        done
    }

    pub fn rename_layer(&mut self, index: usize, name: impl Into<String>) -> bool {
        let done = self.canvas.rename_layer(index, name);
        if done {
            self.is_dirty = true;
        }
        done
    }

    pub fn clear_canvas(&mut self) {
        canvas_ops::clear_canvas(&mut self.canvas, &mut self.history);
        self.after_edit();
    }

    pub fn import_image(&mut self, image: &RgbaImage, name: impl Into<String>) -> LayerId {
        let id = canvas_ops::import_image(&mut self.canvas, &mut self.history, image, name);
        self.after_edit();
        id
    }

    pub fn import_image_file(&mut self, path: &Path) -> Result<LayerId, ProjectError> {
        let image = io::load_image_file(path)?;
        Ok(self.import_image(&image, display_name(path)))
    }

    // ---- canvas size --------------------------------------------------------

    /// Destructive resize: every layer restarts transparent at the new size.
    /// Returns false, changing nothing, when the size is outside the canvas
    /// limits.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        self.resize_with(width, height, LayerStack::resize)
    }

    /// Resize, rescaling each layer's content.
    pub fn resize_preserving(&mut self, width: u32, height: u32) -> bool {
        self.resize_with(width, height, LayerStack::resize_preserving)
    }

    fn resize_with(
        &mut self,
        width: u32,
        height: u32,
        apply: fn(&mut LayerStack, u32, u32) -> bool,
    ) -> bool {
        if !dimensions_fit(width, height) {
            log_warn!("Project '{}': resize to {}×{} refused", self.name, width, height);
            return false;
        }
        // Nothing may still be drawing when the surfaces are reallocated
        let actions = self.tools.end_interaction(&mut self.canvas, &mut self.history);
        self.absorb(actions);
        if !apply(&mut self.canvas, width, height) {
            return false;
        }
        self.tools.refresh_overlay(&mut self.canvas);
        self.after_edit();
        true
    }

    // ---- persistence --------------------------------------------------------

    pub fn to_record(&self) -> Result<ProjectRecord, ProjectError> {
        io::build_record(&self.canvas)
    }

    /// Replace the whole stack from a record.  The current stack is kept if
    /// the record is rejected; on success a checkpoint is pushed.
    pub fn load_record(&mut self, record: &ProjectRecord) -> Result<(), ProjectError> {
        let stack = io::stack_from_record(record)?;
        self.replace_canvas(stack);
        Ok(())
    }

    fn replace_canvas(&mut self, stack: LayerStack) {
        let generation = self.canvas.dirty_generation;
        self.tools.reset();
        self.canvas = stack;
        // Keep the frame cache from mistaking the new stack for the old one
        self.canvas.dirty_generation = generation.wrapping_add(1);
        self.tools.refresh_overlay(&mut self.canvas);
        self.history.push(&self.canvas);
        self.after_edit();
    }

    /// Load a project file into this document, replacing its layers.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ProjectError> {
        let stack = io::load_project(path)?;
        self.replace_canvas(stack);
        self.path = Some(path.to_path_buf());
        self.name = display_name(path);
        self.is_dirty = false;
        Ok(())
    }

    /// Save to the current path.
    pub fn save(&mut self) -> Result<(), ProjectError> {
        let Some(path) = self.path.clone() else {
            return Err(ProjectError::InvalidFormat("Project has no file path yet".into()));
        };
        self.save_as(&path)
    }

    pub fn save_as(&mut self, path: &Path) -> Result<(), ProjectError> {
        io::save_project(&self.canvas, path)?;
        self.path = Some(path.to_path_buf());
        self.name = display_name(path);
        self.is_dirty = false;
        Ok(())
    }

    pub fn export_image(&self, options: ExportOptions) -> Result<RgbaImage, ProjectError> {
        io::flatten_for_export(&self.canvas, options)
    }

    /// Flatten and write an image; the format comes from the extension.
    pub fn export_to(&self, path: &Path, options: ExportOptions) -> Result<(), ProjectError> {
        let format = ExportFormat::from_path(path).ok_or_else(|| {
            ProjectError::InvalidFormat(format!("Unsupported export type: {}", path.display()))
        })?;
        let image = self.export_image(options)?;
        io::encode_and_write(&image, path, format)?;
        Ok(())
    }

    // ---- title --------------------------------------------------------------

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}
