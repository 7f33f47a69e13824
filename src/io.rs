use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{imageops, ColorType, DynamicImage, ImageEncoder, ImageError, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub use crate::canvas::MAX_CANVAS_DIM;
use crate::canvas::{Layer, LayerStack, PixelSurface, MAX_SURFACE_PIXELS, WHITE};

#[cfg(test)]
#[path = "io_test.rs"]
mod io_test;

/// Magic header of the project file format.
const PROJECT_MAGIC: &str = "PCP1";
/// File extension of native project files.
pub const PROJECT_EXTENSION: &str = "pcp";

/// Maximum number of layers in a project file.
pub const MAX_LAYERS: usize = 256;

pub const JPEG_QUALITY: u8 = 92;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

impl From<Box<bincode::ErrorKind>> for ProjectError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        ProjectError::Serialize(e.to_string())
    }
}

// ============================================================================
// PROJECT RECORD
// ============================================================================

/// Serializable description of a layer stack, layers bottom-to-top.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProjectRecord {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<LayerRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LayerRecord {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    /// PNG-encoded pixels.
    pub pixels: Vec<u8>,
}

/// On-disk wrapper around the record.
#[derive(Serialize, Deserialize)]
struct ProjectFile {
    magic: String,
    active_layer_index: usize,
    record: ProjectRecord,
}

/// Snapshot the stack into a record.  Layers are PNG-encoded in parallel.
pub fn build_record(stack: &LayerStack) -> Result<ProjectRecord, ProjectError> {
    let layers = stack
        .layers
        .par_iter()
        .map(|layer| -> Result<LayerRecord, ImageError> {
            Ok(LayerRecord {
                name: layer.name.clone(),
                visible: layer.visible,
                opacity: layer.opacity,
                pixels: encode_png(layer.pixels.as_image())?,
            })
        })
        .collect::<Result<Vec<_>, ImageError>>()?;

    Ok(ProjectRecord {
        width: stack.width,
        height: stack.height,
        layers,
    })
}

/// Rebuild a stack from a record.  Every layer is validated and decoded
/// before anything is returned; on error no partial stack escapes.
/// The last layer becomes active.
pub fn stack_from_record(record: &ProjectRecord) -> Result<LayerStack, ProjectError> {
    validate_dimensions(record.width, record.height)?;
    if record.layers.is_empty() {
        return Err(ProjectError::InvalidFormat("Project has no layers".into()));
    }
    if record.layers.len() > MAX_LAYERS {
        return Err(ProjectError::InvalidFormat(format!(
            "Too many layers: {} (max {})",
            record.layers.len(),
            MAX_LAYERS
        )));
    }

    let decoded = record
        .layers
        .par_iter()
        .enumerate()
        .map(|(i, lr)| -> Result<PixelSurface, ProjectError> {
            let img = decode_image(&lr.pixels)?;
            if img.width() != record.width || img.height() != record.height {
                return Err(ProjectError::InvalidFormat(format!(
                    "Layer {} '{}' is {}×{}, expected {}×{}",
                    i,
                    lr.name,
                    img.width(),
                    img.height(),
                    record.width,
                    record.height
                )));
            }
            Ok(PixelSurface::from_rgba_image(img))
        })
        .collect::<Result<Vec<_>, ProjectError>>()?;

    let mut stack = LayerStack::empty(record.width, record.height);
    for (lr, pixels) in record.layers.iter().zip(decoded) {
        let layer = Layer {
            id: 0,
            name: lr.name.clone(),
            visible: lr.visible,
            opacity: if lr.opacity.is_nan() { 1.0 } else { lr.opacity.clamp(0.0, 1.0) },
            pixels,
        };
        let at = stack.len();
        stack.insert_layer(at, layer);
    }
    Ok(stack)
}

fn validate_dimensions(width: u32, height: u32) -> Result<(), ProjectError> {
    if width == 0 || height == 0 {
        return Err(ProjectError::InvalidFormat(
            "Canvas dimensions cannot be zero".into(),
        ));
    }
    if width > MAX_CANVAS_DIM || height > MAX_CANVAS_DIM {
        return Err(ProjectError::InvalidFormat(format!(
            "Canvas {}×{} exceeds maximum {}×{}",
            width, height, MAX_CANVAS_DIM, MAX_CANVAS_DIM
        )));
    }
    if width as u64 * height as u64 > MAX_SURFACE_PIXELS {
        return Err(ProjectError::InvalidFormat(format!(
            "Canvas {}×{} exceeds {} pixels",
            width, height, MAX_SURFACE_PIXELS
        )));
    }
    Ok(())
}

// ============================================================================
// PROJECT FILES
// ============================================================================

/// Save the stack as a project file.
pub fn save_project(stack: &LayerStack, path: &Path) -> Result<(), ProjectError> {
    let file = ProjectFile {
        magic: PROJECT_MAGIC.to_string(),
        active_layer_index: stack.active_layer_index,
        record: build_record(stack)?,
    };
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &file)?;
    writer.flush()?;
    log_info!("Saved project {} ({} layers)", path.display(), stack.len());
    Ok(())
}

/// Load a project file into a fresh stack.
pub fn load_project(path: &Path) -> Result<LayerStack, ProjectError> {
    let raw = std::fs::read(path)?;
    load_project_bytes(&raw).inspect_err(|e| {
        log_err!("Failed to load project {}: {}", path.display(), e);
    })
}

pub fn load_project_bytes(raw: &[u8]) -> Result<LayerStack, ProjectError> {
    if raw.len() < 12 {
        return Err(ProjectError::InvalidFormat("File too small".into()));
    }
    // bincode writes a String as an 8-byte length prefix then the bytes;
    // the 4-char magic sits at 8..12.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != PROJECT_MAGIC {
        return Err(ProjectError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }

    let file: ProjectFile = bincode::deserialize(raw)?;
    let mut stack = stack_from_record(&file.record)?;
    if file.active_layer_index < stack.len() {
        stack.active_layer_index = file.active_layer_index;
    }
    Ok(stack)
}

// ============================================================================
// IMAGE ENCODE / DECODE
// ============================================================================

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Decode any format the `image` crate recognises to RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

pub fn load_image_file(path: &Path) -> Result<RgbaImage, ProjectError> {
    Ok(image::open(path)?.to_rgba8())
}

/// Synchronously load a project file, or any raster image as a
/// single-layer stack named after the file.
pub fn load_image_sync(path: &Path) -> Result<LayerStack, ProjectError> {
    if is_project_path(path) {
        return load_project(path);
    }

    let img = load_image_file(path)?;
    validate_dimensions(img.width(), img.height())?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Background")
        .to_string();

    let mut stack = LayerStack::empty(img.width(), img.height());
    stack.insert_layer(
        0,
        Layer {
            id: 0,
            name,
            visible: true,
            opacity: 1.0,
            pixels: PixelSurface::from_rgba_image(img),
        },
    );
    Ok(stack)
}

pub fn is_project_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(PROJECT_EXTENSION))
}

// ============================================================================
// EXPORT
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportOptions {
    /// Output size multiplier; non-positive or non-finite values mean 1.
    pub scale: f32,
    /// Keep transparency instead of flattening onto white.
    pub transparent: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            transparent: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }
}

/// Composite the stack for export: optional white backing, optional
/// rescale.  A scale whose output would exceed the canvas limits is
/// rejected before anything is allocated.
pub fn flatten_for_export(stack: &LayerStack, options: ExportOptions) -> Result<RgbaImage, ProjectError> {
    let scale = if options.scale.is_finite() && options.scale > 0.0 {
        options.scale
    } else {
        1.0
    };
    let unscaled = (scale - 1.0).abs() < f32::EPSILON;
    let (new_w, new_h) = if unscaled {
        (stack.width, stack.height)
    } else {
        (scaled_dim(stack.width, scale), scaled_dim(stack.height, scale))
    };
    if let Err(e) = validate_dimensions(new_w, new_h) {
        log_err!("Export at scale {} refused: {}", scale, e);
        return Err(e);
    }

    let composite = stack.composite();
    let flat = if options.transparent {
        composite
    } else {
        let mut backed = PixelSurface::new_filled(stack.width, stack.height, WHITE);
        backed.blit_surface(&composite, 0, 0, 1.0);
        backed
    };

    if unscaled {
        return Ok(flat.into_image());
    }
    Ok(imageops::resize(flat.as_image(), new_w, new_h, imageops::FilterType::Triangle))
}

// Float-to-int `as` saturates, so an absurd scale lands on u32::MAX and fails
// validation instead of wrapping.
fn scaled_dim(dim: u32, scale: f32) -> u32 {
    ((dim as f64 * scale as f64).round() as u32).max(1)
}

/// Encode and write an image to a file.
pub fn encode_and_write(image: &RgbaImage, path: &Path, format: ExportFormat) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ColorType::Rgba8,
            )?;
        }
        ExportFormat::Jpeg => {
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                ColorType::Rgb8,
            )?;
        }
    }
    writer.flush()?;
    log_info!(
        "Exported {}×{} {:?} to {}",
        image.width(),
        image.height(),
        format,
        path.display()
    );
    Ok(())
}
