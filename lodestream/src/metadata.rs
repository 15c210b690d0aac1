use std::fmt;

use serde::{Deserialize, Serialize};

/// Smallest atlas level dimension that still counts as the base texture.
/// Levels up to and including the first one at least this wide or tall are
/// fetched together with the base mesh.
pub const BASE_TEXTURE_DIM: u32 = 128;

/// Default byte length of one refinement stream chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 2_000_000;

/// Content-addressed identifier understood by the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentHash {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// One resolution tier of the texture atlas, addressed as a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureLevel {
    pub offset: u64,
    pub length: u64,
    pub width: u32,
    pub height: u32,
}

/// Texture atlas with its mip levels in increasing-resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureAtlas {
    pub hash: ContentHash,
    pub levels: Vec<TextureLevel>,
}

/// Chunked geometric refinement stream for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementStream {
    pub hash: ContentHash,
    /// Total stream length in bytes.
    pub size: u64,
    /// Compressed size of the whole stream, used for transfer cost estimates.
    pub gzip_size: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

/// Everything the metadata fetch learns about one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub mesh: ContentHash,
    pub mesh_size: u64,
    pub atlas: TextureAtlas,
    #[serde(default)]
    pub refinement: Option<RefinementStream>,
    /// Perceptual error bound of the asset before any data arrives; the
    /// reference maximum that streaming works down from.
    pub reference_error: f64,
}

impl AssetMetadata {
    /// Index of the atlas level fetched together with the base mesh: the
    /// first level at least [`BASE_TEXTURE_DIM`] wide or tall, or the last
    /// level when none reaches it. `None` for an atlas with no levels.
    pub fn base_level(&self) -> Option<usize> {
        let mut base = None;
        for (i, level) in self.atlas.levels.iter().enumerate() {
            base = Some(i);
            if level.width >= BASE_TEXTURE_DIM || level.height >= BASE_TEXTURE_DIM {
                break;
            }
        }
        base
    }

    pub fn level(&self, index: usize) -> Option<&TextureLevel> {
        self.atlas.levels.get(index)
    }

    /// The mip level to fetch after `index`, if one remains.
    pub fn next_level(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        (next < self.atlas.levels.len()).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlas(dims: &[(u32, u32)]) -> TextureAtlas {
        let mut offset = 0;
        let levels = dims
            .iter()
            .map(|&(width, height)| {
                let length = u64::from(width) * u64::from(height);
                let level = TextureLevel {
                    offset,
                    length,
                    width,
                    height,
                };
                offset += length;
                level
            })
            .collect();
        TextureAtlas {
            hash: ContentHash::from("atlas"),
            levels,
        }
    }

    fn metadata(dims: &[(u32, u32)]) -> AssetMetadata {
        AssetMetadata {
            mesh: ContentHash::from("mesh"),
            mesh_size: 1024,
            atlas: atlas(dims),
            refinement: None,
            reference_error: 100.0,
        }
    }

    #[test]
    fn base_level_is_first_at_threshold() {
        let meta = metadata(&[(32, 32), (64, 64), (128, 128), (256, 256)]);
        assert_eq!(meta.base_level(), Some(2));
    }

    #[test]
    fn base_level_falls_back_to_last() {
        let meta = metadata(&[(16, 16), (32, 32)]);
        assert_eq!(meta.base_level(), Some(1));
    }

    #[test]
    fn base_level_of_empty_atlas() {
        assert_eq!(metadata(&[]).base_level(), None);
    }

    #[test]
    fn next_level_stops_at_end() {
        let meta = metadata(&[(128, 128), (256, 256)]);
        assert_eq!(meta.next_level(0), Some(1));
        assert_eq!(meta.next_level(1), None);
    }

    #[test]
    fn refinement_chunk_size_defaults_from_json() {
        let json = r#"{
            "mesh": "abc",
            "mesh_size": 10,
            "atlas": { "hash": "atlas", "levels": [] },
            "refinement": { "hash": "pm", "size": 5000000, "gzip_size": 2500000 },
            "reference_error": 50.0
        }"#;
        let meta: AssetMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.refinement.unwrap().chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
