use parking_lot::RwLock;

use crate::palette::ColorPalette;

/// Shared context a process hands to every `Session` it creates (spec
/// §9 Design Notes: "make these owned by a Core context passed to each
/// Session; do not rely on mutable process-wide singletons"). Owns the
/// one piece of state that is genuinely shared across screens and
/// sessions: the color palette. Each `Session` borrows a `Core`
/// reference rather than reaching for a global.
pub struct Core {
    palette: RwLock<ColorPalette>,
}

impl Core {
    pub fn new() -> Self {
        Self {
            palette: RwLock::new(ColorPalette::default_scheme()),
        }
    }

    pub fn with_palette(palette: ColorPalette) -> Self {
        Self {
            palette: RwLock::new(palette),
        }
    }

    pub fn palette(&self) -> parking_lot::RwLockReadGuard<'_, ColorPalette> {
        self.palette.read()
    }

    pub fn palette_mut(&self) -> parking_lot::RwLockWriteGuard<'_, ColorPalette> {
        self.palette.write()
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Color, Intensity};
    use crate::palette::indexed_to_rgb;

    #[test]
    fn palette_edit_is_visible_to_subsequent_resolves() {
        let core = Core::new();
        let before = core.palette().resolve(Color::system(1));
        core.palette_mut().set_system(1, Intensity::Normal, indexed_to_rgb(200));
        let after = core.palette().resolve(Color::system(1));
        assert_ne!(before, after);
    }
}
