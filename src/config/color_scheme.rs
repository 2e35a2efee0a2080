//! Parser for the color-scheme text format (spec §6): a `General`
//! section plus twenty `Foreground`/`Background`/`Color0..Color7` (and
//! `…Intense` variant) sections, each carrying `Color`, `Transparent`,
//! `Bold`. Also accepts the legacy KDE3 flat form: whitespace-separated
//! `color N R G B T B` / `title <text>` lines.

use super::{parse_bool, parse_sections};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchemeEntry {
    pub rgb: (u8, u8, u8),
    pub transparent: bool,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorScheme {
    pub description: String,
    pub opacity: f32,
    pub foreground: SchemeEntry,
    pub foreground_intense: SchemeEntry,
    pub background: SchemeEntry,
    pub background_intense: SchemeEntry,
    pub colors: [SchemeEntry; 8],
    pub colors_intense: [SchemeEntry; 8],
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            description: String::new(),
            opacity: 1.0,
            foreground: SchemeEntry::default(),
            foreground_intense: SchemeEntry::default(),
            background: SchemeEntry::default(),
            background_intense: SchemeEntry::default(),
            colors: [SchemeEntry::default(); 8],
            colors_intense: [SchemeEntry::default(); 8],
        }
    }
}

/// Parse a `RRGGBB` or `#RRGGBB` hex triplet; malformed input resolves
/// to black rather than failing the whole file, mirroring the teacher's
/// "warn and fall back to defaults" tolerance for bad config values.
fn parse_hex_rgb(value: &str) -> (u8, u8, u8) {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return (0, 0, 0);
    }
    let byte = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).unwrap_or(0);
    (byte(0..2), byte(2..4), byte(4..6))
}

fn parse_entry(pairs: &[(String, String)]) -> SchemeEntry {
    let mut entry = SchemeEntry::default();
    for (key, value) in pairs {
        match key.as_str() {
            "Color" => entry.rgb = parse_hex_rgb(value),
            "Transparent" => entry.transparent = parse_bool(value),
            "Bold" => entry.bold = parse_bool(value),
            _ => {}
        }
    }
    entry
}

impl ColorScheme {
    pub fn parse(text: &str) -> Self {
        if looks_like_legacy_kde3(text) {
            return Self::parse_legacy_kde3(text);
        }
        let mut scheme = ColorScheme::default();
        for (name, pairs) in parse_sections(text) {
            match name.as_str() {
                "General" => {
                    for (key, value) in &pairs {
                        match key.as_str() {
                            "Description" => scheme.description = value.clone(),
                            "Opacity" => scheme.opacity = value.parse().unwrap_or(1.0),
                            _ => {}
                        }
                    }
                }
                "Foreground" => scheme.foreground = parse_entry(&pairs),
                "ForegroundIntense" => scheme.foreground_intense = parse_entry(&pairs),
                "Background" => scheme.background = parse_entry(&pairs),
                "BackgroundIntense" => scheme.background_intense = parse_entry(&pairs),
                other => {
                    if let Some(index) = other.strip_prefix("Color").and_then(|rest| rest.strip_suffix("Intense")) {
                        if let Ok(n) = index.parse::<usize>() {
                            if n < 8 {
                                scheme.colors_intense[n] = parse_entry(&pairs);
                            }
                        }
                    } else if let Some(index) = other.strip_prefix("Color") {
                        if let Ok(n) = index.parse::<usize>() {
                            if n < 8 {
                                scheme.colors[n] = parse_entry(&pairs);
                            }
                        }
                    }
                }
            }
        }
        scheme
    }

    /// `color N R G B T B` (N: palette index 0-7 or +8 for intense;
    /// T/B: transparent/bold flags) and `title <text>` lines. `title`
    /// feeds `description` since the legacy format has no `General`
    /// section.
    fn parse_legacy_kde3(text: &str) -> Self {
        let mut scheme = ColorScheme::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.first().copied() {
                Some("title") => {
                    scheme.description = fields[1..].join(" ");
                }
                Some("color") if fields.len() >= 7 => {
                    let n: usize = fields[1].parse().unwrap_or(usize::MAX);
                    let r: u8 = fields[2].parse().unwrap_or(0);
                    let g: u8 = fields[3].parse().unwrap_or(0);
                    let b: u8 = fields[4].parse().unwrap_or(0);
                    let transparent = fields[5] != "0";
                    let bold = fields[6] != "0";
                    let entry = SchemeEntry { rgb: (r, g, b), transparent, bold };
                    match n {
                        0 => scheme.background = entry,
                        1 => scheme.foreground = entry,
                        2..=9 => scheme.colors[n - 2] = entry,
                        10 => scheme.background_intense = entry,
                        11 => scheme.foreground_intense = entry,
                        12..=19 => scheme.colors_intense[n - 12] = entry,
                        _ => {}
                    }
                }
                _ => {}
            }
        }
        scheme
    }
}

fn looks_like_legacy_kde3(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .all(|l| l.starts_with("color ") || l.starts_with("title "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_general_and_indexed_color_sections() {
        let text = "[General]\nDescription=Dark\nOpacity=0.95\n\n[Color3]\nColor=AABBCC\nBold=true\n\n[Color3Intense]\nColor=FFFFFF\n";
        let scheme = ColorScheme::parse(text);
        assert_eq!(scheme.description, "Dark");
        assert_eq!(scheme.opacity, 0.95);
        assert_eq!(scheme.colors[3].rgb, (0xAA, 0xBB, 0xCC));
        assert!(scheme.colors[3].bold);
        assert_eq!(scheme.colors_intense[3].rgb, (0xFF, 0xFF, 0xFF));
    }

    #[test]
    fn parses_legacy_kde3_flat_form() {
        let text = "title My Scheme\ncolor 0 0 0 0 0 0\ncolor 1 255 255 255 0 0\ncolor 2 255 0 0 0 1\n";
        let scheme = ColorScheme::parse(text);
        assert_eq!(scheme.description, "My Scheme");
        assert_eq!(scheme.background.rgb, (0, 0, 0));
        assert_eq!(scheme.foreground.rgb, (255, 255, 255));
        assert_eq!(scheme.colors[0].rgb, (255, 0, 0));
        assert!(scheme.colors[0].bold);
    }
}
