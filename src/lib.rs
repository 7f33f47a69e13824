//! Layered raster editing engine: pixel surfaces, a layer stack with
//! compositing, flood fill, a pointer-driven tool state machine and
//! snapshot undo/redo, plus project persistence and export.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{Layer, LayerId, LayerStack, MoveDirection, PixelSurface};
pub use components::history::HistoryManager;
pub use components::tools::{PointerEvent, Tool, ToolConfig, ToolStateMachine};
pub use project::Project;
