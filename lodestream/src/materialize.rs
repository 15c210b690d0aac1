use bytes::Bytes;
use lodestream_scene::Slug;

use crate::error::MaterializeError;

/// Locator of a renderer-loadable artifact produced from raw streamed data,
/// e.g. a model file staged on disk. Opaque to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub slug: Slug,
    pub locator: String,
}

/// Converts raw fetched bytes into loadable artifacts.
///
/// How meshes and textures decode is the rendering side's concern; the
/// scheduler only moves the results along the chain. Calls run on the
/// execution backend's workers and may block.
pub trait Materializer: Send + Sync {
    fn mesh(
        &self,
        slug: &Slug,
        mesh: Bytes,
        base_texture: Bytes,
    ) -> Result<Artifact, MaterializeError>;

    fn texture_level(
        &self,
        slug: &Slug,
        level: usize,
        data: Bytes,
    ) -> Result<Artifact, MaterializeError>;
}

/// Materializer that names artifacts without touching the bytes, for demos
/// and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMaterializer;

impl Materializer for NullMaterializer {
    fn mesh(
        &self,
        slug: &Slug,
        _mesh: Bytes,
        _base_texture: Bytes,
    ) -> Result<Artifact, MaterializeError> {
        Ok(Artifact {
            slug: slug.clone(),
            locator: format!("{slug}.mesh"),
        })
    }

    fn texture_level(
        &self,
        slug: &Slug,
        level: usize,
        _data: Bytes,
    ) -> Result<Artifact, MaterializeError> {
        Ok(Artifact {
            slug: slug.clone(),
            locator: format!("{slug}.tex{level}"),
        })
    }
}
