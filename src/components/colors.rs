use image::Rgba;

#[cfg(test)]
#[path = "colors_test.rs"]
mod colors_test;

/// Starting colour of a fresh session (`#2aa198`).
pub const DEFAULT_COLOR: Rgba<u8> = Rgba([0x2a, 0xa1, 0x98, 255]);

/// Swatches a new palette starts with.
pub const DEFAULT_SWATCHES: [Rgba<u8>; SWATCH_COUNT] = [
    Rgba([0x00, 0x00, 0x00, 255]),
    Rgba([0xff, 0xff, 0xff, 255]),
    Rgba([0x2a, 0xa1, 0x98, 255]),
    Rgba([0xe8, 0xc9, 0xf0, 255]),
    Rgba([0xff, 0x3b, 0x30, 255]),
    Rgba([0x00, 0xff, 0x00, 255]),
];

pub const SWATCH_COUNT: usize = 6;

/// Parse `#RRGGBB`, `RRGGBB` or the short `#RGB` form into an opaque colour.
pub fn parse_hex(text: &str) -> Option<Rgba<u8>> {
    let hex = text.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let val = u32::from_str_radix(hex, 16).ok()?;
            Some(Rgba([
                ((val >> 16) & 0xFF) as u8,
                ((val >> 8) & 0xFF) as u8,
                (val & 0xFF) as u8,
                255,
            ]))
        }
        3 => {
            let val = u16::from_str_radix(hex, 16).ok()?;
            let expand = |n: u16| ((n & 0xF) as u8) * 17;
            Some(Rgba([expand(val >> 8), expand(val >> 4), expand(val), 255]))
        }
        _ => None,
    }
}

/// Lower-case `#rrggbb`; alpha is dropped.
pub fn to_hex(color: Rgba<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Fixed row of quick-pick colours.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    swatches: [Rgba<u8>; SWATCH_COUNT],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            swatches: DEFAULT_SWATCHES,
        }
    }
}

impl Palette {
    pub fn swatches(&self) -> &[Rgba<u8>] {
        &self.swatches
    }

    pub fn get(&self, slot: usize) -> Option<Rgba<u8>> {
        self.swatches.get(slot).copied()
    }

    /// Overwrite a slot.  Returns false for an unknown slot.
    pub fn set(&mut self, slot: usize, color: Rgba<u8>) -> bool {
        let Some(s) = self.swatches.get_mut(slot) else { return false };
        *s = Rgba([color[0], color[1], color[2], 255]);
        true
    }

    /// "Save colour": the current colour replaces the first swatch.
    pub fn save_current(&mut self, color: Rgba<u8>) {
        self.set(0, color);
    }
}
