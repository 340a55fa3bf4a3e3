use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("sprite key must not be empty")]
    Empty,
    #[error("sprite key has an empty path segment")]
    EmptySegment,
    #[error("sprite key must not contain '..'")]
    ParentTraversal,
    #[error("sprite key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Keys are `/`-separated lowercase segments such as `crops/wheat_2`.
pub(crate) fn validate_sprite_key(key: &str) -> Result<(), SpriteKeyError> {
    if key.is_empty() {
        return Err(SpriteKeyError::Empty);
    }
    if key.contains("..") {
        return Err(SpriteKeyError::ParentTraversal);
    }
    if let Some(character) = key
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-')))
    {
        return Err(SpriteKeyError::InvalidCharacter { character });
    }
    if key.split('/').any(str::is_empty) {
        return Err(SpriteKeyError::EmptySegment);
    }
    Ok(())
}

/// PNG location of `key` under the sprite directory.
pub(crate) fn sprite_file_path(sprite_dir: &Path, key: &str) -> PathBuf {
    let mut path = sprite_dir.to_path_buf();
    for segment in key.split('/') {
        path.push(segment);
    }
    path.set_extension("png");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_catalog_style_keys() {
        for key in ["house", "crops/wheat_3", "fence/corner-left", "ground/plain_v1"] {
            assert!(validate_sprite_key(key).is_ok(), "key={key}");
        }
    }

    #[test]
    fn rejects_malformed_keys() {
        let cases = [
            ("", SpriteKeyError::Empty),
            ("/crops", SpriteKeyError::EmptySegment),
            ("crops/", SpriteKeyError::EmptySegment),
            ("crops//wheat", SpriteKeyError::EmptySegment),
            ("crops/../secrets", SpriteKeyError::ParentTraversal),
            ("Crops", SpriteKeyError::InvalidCharacter { character: 'C' }),
            (r"crops\wheat", SpriteKeyError::InvalidCharacter { character: '\\' }),
            ("wheat.png", SpriteKeyError::InvalidCharacter { character: '.' }),
        ];
        for (key, expected) in cases {
            assert_eq!(validate_sprite_key(key), Err(expected), "key={key}");
        }
    }

    #[test]
    fn file_path_nests_segments() {
        let path = sprite_file_path(Path::new("sprites"), "crops/wheat_3");
        assert_eq!(path, Path::new("sprites").join("crops").join("wheat_3.png"));
    }
}
