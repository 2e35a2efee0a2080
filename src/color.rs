use serde::Serialize;

/// Intensity bit carried by `Default` and `System` colors. Resolved
/// against the palette at render/export time, never folded into RGB
/// eagerly — a later palette change must still be visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Intensity {
    Normal,
    Bold,
}

/// Which half of the `Default` pair (fg/bg) a color refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DefaultSlot {
    Foreground,
    Background,
}

/// Five-variant tagged color union (spec §3). Never normalized to RGB
/// at write time: a `Default`/`System` color is resolved against the
/// current palette only when a consumer (render, HTML/plain export)
/// asks for a concrete RGB, so palette edits retroactively change
/// already-written cells' displayed color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind")]
pub enum Color {
    /// No color set; inherits from context (used for clearing SGR state).
    Undefined,
    /// The terminal's default foreground/background, with intensity.
    Default {
        slot: DefaultSlot,
        intensity: Intensity,
    },
    /// One of the eight ANSI base colors, with intensity (0..=7 doubled
    /// to 16 by the intensity bit).
    System { index: u8, intensity: Intensity },
    /// 256-color palette index.
    Indexed(u8),
    /// Direct RGB (truecolor).
    Rgb(u8, u8, u8),
}

impl Default for Color {
    fn default() -> Self {
        Color::Default {
            slot: DefaultSlot::Foreground,
            intensity: Intensity::Normal,
        }
    }
}

impl Color {
    pub fn default_fg() -> Self {
        Color::Default {
            slot: DefaultSlot::Foreground,
            intensity: Intensity::Normal,
        }
    }

    pub fn default_bg() -> Self {
        Color::Default {
            slot: DefaultSlot::Background,
            intensity: Intensity::Normal,
        }
    }

    /// System color from an SGR base index (0..=7, or 8..=15 folded to
    /// 0..=7 + bold intensity).
    pub fn system(index: u8) -> Self {
        if index < 8 {
            Color::System {
                index,
                intensity: Intensity::Normal,
            }
        } else {
            Color::System {
                index: index - 8,
                intensity: Intensity::Bold,
            }
        }
    }

    pub fn with_bold(self) -> Self {
        match self {
            Color::System { index, .. } => Color::System {
                index,
                intensity: Intensity::Bold,
            },
            Color::Default { slot, .. } => Color::Default {
                slot,
                intensity: Intensity::Bold,
            },
            other => other,
        }
    }
}

/// Wire-transport form for a resolved color, handed to a `Display`
/// implementation that wants concrete RGB bytes rather than the tagged
/// union (the union is an internal detail the palette can still affect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_color_folds_bright_to_intensity_bit() {
        assert_eq!(
            Color::system(9),
            Color::System {
                index: 1,
                intensity: Intensity::Bold
            }
        );
        assert_eq!(
            Color::system(1),
            Color::System {
                index: 1,
                intensity: Intensity::Normal
            }
        );
    }

    #[test]
    fn with_bold_preserves_indexed_and_rgb() {
        assert_eq!(Color::Indexed(200).with_bold(), Color::Indexed(200));
        assert_eq!(Color::Rgb(1, 2, 3).with_bold(), Color::Rgb(1, 2, 3));
    }
}
