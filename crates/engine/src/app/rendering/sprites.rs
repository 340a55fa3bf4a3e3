use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::ImageReader;
use tracing::warn;

use crate::sprite_keys::{sprite_file_path, validate_sprite_key};

use super::canvas::{Canvas, ScreenRect};

pub(crate) struct LoadedSprite {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl LoadedSprite {
    #[cfg(test)]
    pub(crate) fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Decoded sprites by key. A key that fails to load is remembered as missing
/// and warned about once.
pub(crate) struct SpriteCache {
    sprite_dir: PathBuf,
    loaded: HashMap<String, Option<LoadedSprite>>,
    warned: HashSet<String>,
}

impl SpriteCache {
    pub(crate) fn new(sprite_dir: PathBuf) -> Self {
        Self {
            sprite_dir,
            loaded: HashMap::new(),
            warned: HashSet::new(),
        }
    }

    pub(crate) fn get(&mut self, key: &str) -> Option<&LoadedSprite> {
        if !self.loaded.contains_key(key) {
            let sprite = self.load(key);
            self.loaded.insert(key.to_string(), sprite);
        }
        self.loaded.get(key).and_then(Option::as_ref)
    }

    fn load(&mut self, key: &str) -> Option<LoadedSprite> {
        if let Err(error) = validate_sprite_key(key) {
            warn_sprite_load_once(&mut self.warned, key, None, &error.to_string());
            return None;
        }
        let path = sprite_file_path(&self.sprite_dir, key);
        match load_sprite_rgba(&path) {
            Ok(sprite) => Some(sprite),
            Err(reason) => {
                warn_sprite_load_once(&mut self.warned, key, Some(&path), &reason);
                None
            }
        }
    }

    #[cfg(test)]
    fn warned_count(&self) -> usize {
        self.warned.len()
    }
}

fn load_sprite_rgba(path: &Path) -> Result<LoadedSprite, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedSprite {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

fn warn_sprite_load_once(
    warned_keys: &mut HashSet<String>,
    key: &str,
    resolved_path: Option<&Path>,
    reason: &str,
) {
    if !warned_keys.insert(key.to_string()) {
        return;
    }
    let path_display = resolved_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unresolved>".to_string());
    warn!(
        sprite_key = key,
        path = %path_display,
        reason = reason,
        "renderer_sprite_load_failed_using_placeholder"
    );
}

/// Stretches `sprite` over `rect` with nearest-neighbor sampling. Fully
/// transparent texels are skipped.
pub(crate) fn draw_sprite_stretched(
    canvas: &mut Canvas<'_>,
    sprite: &LoadedSprite,
    rect: ScreenRect,
    mirrored: bool,
) {
    if sprite.width == 0 || sprite.height == 0 || rect.width <= 0 || rect.height <= 0 {
        return;
    }
    let expected_rgba_len = sprite.width as usize * sprite.height as usize * 4;
    if sprite.rgba.len() < expected_rgba_len {
        return;
    }

    let draw_left = rect.x.max(0);
    let draw_top = rect.y.max(0);
    let draw_right = (rect.x + rect.width).min(canvas.width() as i32);
    let draw_bottom = (rect.y + rect.height).min(canvas.height() as i32);
    for out_y in draw_top..draw_bottom {
        let src_y = sample_index(out_y - rect.y, rect.height, sprite.height);
        for out_x in draw_left..draw_right {
            let mut src_x = sample_index(out_x - rect.x, rect.width, sprite.width);
            if mirrored {
                src_x = sprite.width as usize - 1 - src_x;
            }
            let offset = (src_y * sprite.width as usize + src_x) * 4;
            let texel = [
                sprite.rgba[offset],
                sprite.rgba[offset + 1],
                sprite.rgba[offset + 2],
                sprite.rgba[offset + 3],
            ];
            if texel[3] == 0 {
                continue;
            }
            canvas.blend(out_x, out_y, texel);
        }
    }
}

fn sample_index(offset: i32, span: i32, source_len: u32) -> usize {
    let index = (offset.max(0) as u64 * u64::from(source_len)) / span.max(1) as u64;
    (index as usize).min(source_len as usize - 1)
}
