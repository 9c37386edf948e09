//! Text measurement for label sizing. Fonts are resolved through the
//! system font database and measured with their glyph advances; when no
//! face matches (headless systems, missing fonts) a deterministic
//! per-character estimate keeps layout reproducible.

use std::collections::HashMap;
use std::sync::Mutex;

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use ttf_parser::Face;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Width of the widest line and total height of the text block, in the
/// same units as the font size. Lines are split on `\n`.
pub fn measure_text(text: &str, font_size: f64, font_family: &str, line_height: f64) -> (f64, f64) {
    if text.is_empty() || font_size <= 0.0 {
        return (0.0, 0.0);
    }
    let lines: Vec<&str> = text.lines().collect();
    let line_count = lines.len().max(1);
    let width = lines
        .iter()
        .map(|line| measure_line(line, font_size, font_family))
        .fold(0.0f64, f64::max);
    let height = line_count as f64 * font_size * line_height;
    (width, height)
}

fn measure_line(line: &str, font_size: f64, font_family: &str) -> f64 {
    let fallback = || estimate_width(line, font_size);
    let Ok(mut guard) = TEXT_MEASURER.lock() else {
        return fallback();
    };
    guard
        .measure(line, font_size, font_family)
        .unwrap_or_else(fallback)
}

/// Estimate used when no font face is available.
fn estimate_width(line: &str, font_size: f64) -> f64 {
    line.chars().filter(|c| *c != '\n').count() as f64 * font_size * 0.56
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<LoadedFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(&mut self, line: &str, font_size: f64, font_family: &str) -> Option<f64> {
        let key = normalize_family_key(font_family);
        if !self.cache.contains_key(&key) {
            let face = self.load_face(font_family);
            self.cache.insert(key.clone(), face);
        }
        let face = self.cache.get_mut(&key)?.as_mut()?;
        let normalized = line.replace('\t', "    ");
        Some(face.line_width(&normalized, font_size))
    }

    fn load_face(&mut self, font_family: &str) -> Option<LoadedFace> {
        let mut names: Vec<String> = Vec::new();
        let mut generics: Vec<Family<'static>> = Vec::new();
        for part in font_family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            match raw.to_ascii_lowercase().as_str() {
                "serif" => generics.push(Family::Serif),
                "sans-serif" | "sans" | "system-ui" => generics.push(Family::SansSerif),
                "monospace" => generics.push(Family::Monospace),
                "cursive" => generics.push(Family::Cursive),
                "fantasy" => generics.push(Family::Fantasy),
                _ => names.push(raw.to_string()),
            }
        }

        let mut families: Vec<Family<'_>> = names.iter().map(|name| Family::Name(name)).collect();
        families.extend(generics);
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded = None;
        self.db.with_face_data(id, |data, index| {
            let bytes = data.to_vec();
            if let Ok(face) = Face::parse(&bytes, index) {
                let units_per_em = face.units_per_em().max(1);
                loaded = Some(LoadedFace::new(bytes, index, units_per_em));
            }
        });
        loaded
    }
}

struct LoadedFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
    advance_cache: HashMap<char, Option<u16>>,
}

impl LoadedFace {
    fn new(data: Vec<u8>, index: u32, units_per_em: u16) -> Self {
        let mut ascii_advances = [0u16; 128];
        if let Ok(face) = Face::parse(&data, index) {
            for byte in 0u8..=127 {
                if let Some(glyph) = face.glyph_index(byte as char) {
                    ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
                }
            }
        }
        Self {
            data,
            index,
            units_per_em,
            ascii_advances,
            advance_cache: HashMap::new(),
        }
    }

    fn line_width(&mut self, line: &str, font_size: f64) -> f64 {
        let scale = font_size / self.units_per_em as f64;
        let fallback = font_size * 0.56;

        if line.is_ascii() {
            let mut width = 0.0;
            for byte in line.bytes() {
                let advance = self.ascii_advances[byte as usize];
                if advance == 0 {
                    width += fallback;
                } else {
                    width += advance as f64 * scale;
                }
            }
            return width.max(0.0);
        }

        let Ok(face) = Face::parse(&self.data, self.index) else {
            return estimate_width(line, font_size);
        };
        let mut width = 0.0;
        for ch in line.chars() {
            let advance = *self
                .advance_cache
                .entry(ch)
                .or_insert_with(|| face.glyph_index(ch).and_then(|g| face.glyph_hor_advance(g)));
            match advance {
                Some(advance) => width += advance as f64 * scale,
                None => width += fallback,
            }
        }
        width.max(0.0)
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_measures_zero() {
        assert_eq!(measure_text("", 10.0, "Arial", 1.2), (0.0, 0.0));
    }

    #[test]
    fn multi_line_text_grows_vertically() {
        let (w1, h1) = measure_text("block", 10.0, "Arial", 1.2);
        let (w2, h2) = measure_text("block\nblock", 10.0, "Arial", 1.2);
        assert!(w1 > 0.0);
        assert!((w2 - w1).abs() < 1e-6);
        assert!((h2 - 2.0 * h1).abs() < 1e-6);
    }

    #[test]
    fn wider_text_measures_wider() {
        let (narrow, _) = measure_text("io", 10.0, "Arial", 1.2);
        let (wide, _) = measure_text("instrumentation", 10.0, "Arial", 1.2);
        assert!(wide > narrow);
    }
}
