use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use super::glyphs;

/// Draws label text with the first loadable font, or built-in glyphs.
pub struct LabelRenderer {
    face: Face,
    text_size: f32,
}

enum Face {
    TrueType { font: FontVec, path: PathBuf },
    Builtin,
}

impl LabelRenderer {
    /// Try each candidate in order; never fails.
    pub fn load(candidates: &[PathBuf], text_size: f32) -> Self {
        for path in candidates {
            match load_font(path) {
                Some(font) => {
                    log::info!("LabelRenderer: using font {}", path.display());
                    return Self {
                        face: Face::TrueType {
                            font,
                            path: path.clone(),
                        },
                        text_size,
                    };
                }
                None => log::debug!("LabelRenderer: font {} unavailable", path.display()),
            }
        }
        if !candidates.is_empty() {
            log::warn!(
                "LabelRenderer: none of {} font candidates could be loaded; using built-in glyphs",
                candidates.len()
            );
        }
        Self::builtin(text_size)
    }

    pub fn builtin(text_size: f32) -> Self {
        Self {
            face: Face::Builtin,
            text_size,
        }
    }

    pub fn uses_builtin(&self) -> bool {
        matches!(self.face, Face::Builtin)
    }

    pub fn font_path(&self) -> Option<&Path> {
        match &self.face {
            Face::TrueType { path, .. } => Some(path),
            Face::Builtin => None,
        }
    }

    /// Rendered width and height of `text`.
    pub fn measure(&self, text: &str) -> (u32, u32) {
        match &self.face {
            Face::TrueType { font, .. } => text_size(PxScale::from(self.text_size), font, text),
            Face::Builtin => glyphs::measure(text, glyphs::cell_scale(self.text_size)),
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    pub fn draw(&self, image: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
        match &self.face {
            Face::TrueType { font, .. } => {
                draw_text_mut(image, color, x, y, PxScale::from(self.text_size), font, text)
            }
            Face::Builtin => glyphs::draw(
                image,
                text,
                x,
                y,
                glyphs::cell_scale(self.text_size),
                color,
            ),
        }
    }
}

fn load_font(path: &Path) -> Option<FontVec> {
    let data = std::fs::read(path).ok()?;
    let is_collection = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttc"));
    if is_collection {
        FontVec::try_from_vec_and_index(data, 0).ok()
    } else {
        FontVec::try_from_vec(data).ok()
    }
}
