pub mod canvas_ops;
pub mod draw;
pub mod fill;
pub mod text;
