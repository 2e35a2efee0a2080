use crate::color::{Color, DefaultSlot, Intensity, ResolvedColor};

/// The 20-entry color palette: 10 base colors (default fg, default bg,
/// and the 8 ANSI system colors) times 2 intensities. `Default`/`System`
/// colors are resolved against this table; `Indexed`/`Rgb` colors are
/// resolved independent of it (256-cube / grayscale ramp, and identity,
/// respectively).
#[derive(Debug, Clone)]
pub struct ColorPalette {
    /// [slot][intensity] for the two Default entries.
    default_entries: [[ResolvedColor; 2]; 2],
    /// [index 0..8][intensity] for the eight System entries.
    system_entries: [[ResolvedColor; 2]; 8],
}

const fn rc(r: u8, g: u8, b: u8) -> ResolvedColor {
    ResolvedColor { r, g, b }
}

impl ColorPalette {
    /// A conventional xterm-like default scheme: black-on-white default
    /// colors would be unusual for a terminal, so we follow the common
    /// dark-background convention (light fg on dark bg) that the teacher's
    /// own `indexed_to_rgb` base-16 table assumes.
    pub fn default_scheme() -> Self {
        Self {
            default_entries: [
                // Foreground: normal, bold
                [rc(0xe0, 0xe0, 0xe0), rc(0xff, 0xff, 0xff)],
                // Background: normal, bold (bold background is rare but defined)
                [rc(0x00, 0x00, 0x00), rc(0x20, 0x20, 0x20)],
            ],
            system_entries: [
                [rc(0x15, 0x16, 0x1e), rc(0x41, 0x48, 0x68)], // black
                [rc(0xf7, 0x76, 0x8e), rc(0xff, 0x9e, 0x9e)], // red
                [rc(0x9e, 0xce, 0x6a), rc(0xb9, 0xf2, 0x7c)], // green
                [rc(0xe0, 0xaf, 0x68), rc(0xff, 0x9e, 0x64)], // yellow
                [rc(0x7a, 0xa2, 0xf7), rc(0x82, 0xaa, 0xff)], // blue
                [rc(0xbb, 0x9a, 0xf7), rc(0xd4, 0xb0, 0xff)], // magenta
                [rc(0x7d, 0xcf, 0xff), rc(0xa9, 0xe1, 0xff)], // cyan
                [rc(0xa9, 0xb1, 0xd6), rc(0xc0, 0xca, 0xf5)], // white
            ],
        }
    }

    pub fn set_default(&mut self, slot: DefaultSlot, intensity: Intensity, value: ResolvedColor) {
        let slot_idx = match slot {
            DefaultSlot::Foreground => 0,
            DefaultSlot::Background => 1,
        };
        let i = match intensity {
            Intensity::Normal => 0,
            Intensity::Bold => 1,
        };
        self.default_entries[slot_idx][i] = value;
    }

    pub fn set_system(&mut self, index: u8, intensity: Intensity, value: ResolvedColor) {
        if index >= 8 {
            return;
        }
        let i = match intensity {
            Intensity::Normal => 0,
            Intensity::Bold => 1,
        };
        self.system_entries[index as usize][i] = value;
    }

    /// Resolve a `Color` to a concrete RGB value against this palette.
    /// `Undefined` resolves to the default foreground, matching the
    /// convention that an unset rendition attribute means "use the
    /// context default."
    pub fn resolve(&self, color: Color) -> ResolvedColor {
        match color {
            Color::Undefined => self.resolve(Color::default_fg()),
            Color::Default { slot, intensity } => {
                let slot_idx = match slot {
                    DefaultSlot::Foreground => 0,
                    DefaultSlot::Background => 1,
                };
                let i = match intensity {
                    Intensity::Normal => 0,
                    Intensity::Bold => 1,
                };
                self.default_entries[slot_idx][i]
            }
            Color::System { index, intensity } => {
                let idx = (index as usize).min(7);
                let i = match intensity {
                    Intensity::Normal => 0,
                    Intensity::Bold => 1,
                };
                self.system_entries[idx][i]
            }
            Color::Indexed(index) => indexed_to_rgb(index),
            Color::Rgb(r, g, b) => rc(r, g, b),
        }
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::default_scheme()
    }
}

/// Convert a 256-color index to an RGB tuple. 0-15 fall back to a
/// standard ANSI approximation (the palette itself is authoritative for
/// those; this table exists for indices 16-255, which are not
/// palette-backed).
pub fn indexed_to_rgb(index: u8) -> ResolvedColor {
    match index {
        0 => rc(0x15, 0x16, 0x1e),
        1 => rc(0xf7, 0x76, 0x8e),
        2 => rc(0x9e, 0xce, 0x6a),
        3 => rc(0xe0, 0xaf, 0x68),
        4 => rc(0x7a, 0xa2, 0xf7),
        5 => rc(0xbb, 0x9a, 0xf7),
        6 => rc(0x7d, 0xcf, 0xff),
        7 => rc(0xa9, 0xb1, 0xd6),
        8 => rc(0x41, 0x48, 0x68),
        9 => rc(0xff, 0x9e, 0x9e),
        10 => rc(0xb9, 0xf2, 0x7c),
        11 => rc(0xff, 0x9e, 0x64),
        12 => rc(0x82, 0xaa, 0xff),
        13 => rc(0xd4, 0xb0, 0xff),
        14 => rc(0xa9, 0xe1, 0xff),
        15 => rc(0xc0, 0xca, 0xf5),
        16..=231 => {
            let idx = index - 16;
            let r = idx / 36;
            let g = (idx % 36) / 6;
            let b = idx % 6;
            let to_val = |v: u8| if v == 0 { 0 } else { 55 + 40 * v };
            rc(to_val(r), to_val(g), to_val(b))
        }
        232..=255 => {
            let v = 8 + 10 * (index - 232);
            rc(v, v, v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_change_is_visible_on_resolve() {
        let mut palette = ColorPalette::default_scheme();
        let red = Color::system(1);
        let before = palette.resolve(red);
        palette.set_system(1, Intensity::Normal, rc(1, 2, 3));
        let after = palette.resolve(red);
        assert_ne!(before, after);
        assert_eq!(after, rc(1, 2, 3));
    }

    #[test]
    fn indexed_cube_endpoints() {
        assert_eq!(indexed_to_rgb(16), rc(0, 0, 0));
        assert_eq!(indexed_to_rgb(231), rc(255, 255, 255));
        assert_eq!(indexed_to_rgb(232), rc(8, 8, 8));
        assert_eq!(indexed_to_rgb(255), rc(238, 238, 238));
    }
}
