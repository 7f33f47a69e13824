use image::Rgba;
use std::path::{Path, PathBuf};

use crate::components::colors::{parse_hex, to_hex, DEFAULT_SWATCHES, SWATCH_COUNT};
use crate::components::history::DEFAULT_MAX_HISTORY;
use crate::components::tools::{DEFAULT_FONT_FAMILY, DEFAULT_GRID_STEP, DEFAULT_TEXT_SIZE};

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;

const SETTINGS_FILE: &str = "paintcore_settings.cfg";

/// Engine-wide preferences, persisted as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub max_undo_steps: usize,
    pub default_width: u32,
    pub default_height: u32,
    pub grid_step: u32,
    pub default_font: String,
    pub default_text_size: f32,
    pub export_scale: f32,
    pub export_transparent: bool,
    pub swatches: [Rgba<u8>; SWATCH_COUNT],
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: DEFAULT_MAX_HISTORY,
            default_width: 1200,
            default_height: 800,
            grid_step: DEFAULT_GRID_STEP,
            default_font: DEFAULT_FONT_FAMILY.to_string(),
            default_text_size: DEFAULT_TEXT_SIZE,
            export_scale: 1.0,
            export_transparent: false,
            swatches: DEFAULT_SWATCHES,
        }
    }
}

impl EngineSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/paintcore/paintcore_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\paintcore\paintcore_settings.cfg
    /// On macOS:   ~/Library/Application Support/paintcore/paintcore_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?
                .join("paintcore");
            Some(config_dir.join(SETTINGS_FILE))
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            Some(PathBuf::from(appdata).join("paintcore").join(SETTINGS_FILE))
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("paintcore")
                    .join(SETTINGS_FILE),
            )
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    /// Load from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::settings_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no settings directory on this platform",
            ));
        };
        self.save_to(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
        Self::parse(&content)
    }

    /// Parse `key=value` lines.  Unknown keys and unparsable values are
    /// skipped, leaving the default in place.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "max_undo_steps" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.max_undo_steps = v.max(1);
                    }
                }
                "default_width" => {
                    if let Ok(v) = val.parse::<u32>()
                        && v > 0
                    {
                        s.default_width = v;
                    }
                }
                "default_height" => {
                    if let Ok(v) = val.parse::<u32>()
                        && v > 0
                    {
                        s.default_height = v;
                    }
                }
                "grid_step" => {
                    if let Ok(v) = val.parse::<u32>()
                        && v > 0
                    {
                        s.grid_step = v;
                    }
                }
                "default_font" => {
                    if !val.is_empty() {
                        s.default_font = val.to_string();
                    }
                }
                "default_text_size" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v > 0.0
                    {
                        s.default_text_size = v;
                    }
                }
                "export_scale" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v > 0.0
                    {
                        s.export_scale = v;
                    }
                }
                "export_transparent" => {
                    s.export_transparent = val == "true";
                }
                "swatches" => {
                    let parsed: Vec<Rgba<u8>> = val.split(',').filter_map(parse_hex).collect();
                    if parsed.len() == SWATCH_COUNT {
                        s.swatches.copy_from_slice(&parsed);
                    }
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_cfg_string(&self) -> String {
        let swatches: Vec<String> = self.swatches.iter().map(|c| to_hex(*c)).collect();
        format!(
            "max_undo_steps={}\n\
             default_width={}\n\
             default_height={}\n\
             grid_step={}\n\
             default_font={}\n\
             default_text_size={}\n\
             export_scale={}\n\
             export_transparent={}\n\
             swatches={}\n",
            self.max_undo_steps,
            self.default_width,
            self.default_height,
            self.grid_step,
            self.default_font,
            self.default_text_size,
            self.export_scale,
            self.export_transparent,
            swatches.join(","),
        )
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_cfg_string())
    }
}
