//! Data-contract parsers for the three on-disk text formats spec §6
//! names (color scheme, key bindings, profile). Persistence itself —
//! deciding *where* these files live, watching them for changes,
//! writing them back out — is explicitly out of this crate's scope;
//! these modules only turn bytes into the typed values a host needs.
//!
//! Grounded in the teacher's `config::RainConfig::load` pattern (`dirs`
//! for the base path, `tracing::warn!` and fall back to defaults on a
//! parse failure) but reading the actual key/value and legacy flat-file
//! formats spec §6 specifies rather than the teacher's own JSON.

pub mod color_scheme;
pub mod keybindings;
pub mod profile;

use std::path::PathBuf;

/// Base directory config files are conventionally read from
/// (`~/.config/kterm`), mirroring `dirs::config_dir()` use in the
/// teacher's `config::RainConfig::config_path`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("kterm"))
}

/// A line-oriented key/value section parser shared by `color_scheme`
/// and `profile`: splits `Key=Value` pairs, tracks the current
/// `[Section]` header, skips blank lines and `#`/`;`-prefixed comments.
pub(crate) fn parse_sections(text: &str) -> Vec<(String, Vec<(String, String)>)> {
    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
    let mut current = String::new();
    let mut entries: Vec<(String, String)> = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            if !current.is_empty() || !entries.is_empty() {
                sections.push((std::mem::take(&mut current), std::mem::take(&mut entries)));
            }
            current = line[1..line.len() - 1].to_string();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            entries.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    if !current.is_empty() || !entries.is_empty() {
        sections.push((current, entries));
    }
    sections
}

pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sections_splits_on_headers_and_skips_comments() {
        let text = "; comment\n[General]\nDescription=Dark\nOpacity=1\n\n[Color0]\nColor=0,0,0\n";
        let sections = parse_sections(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, "General");
        assert_eq!(sections[0].1, vec![("Description".to_string(), "Dark".to_string()), ("Opacity".to_string(), "1".to_string())]);
        assert_eq!(sections[1].0, "Color0");
    }
}
