//! CPU-side texture payloads
//!
//! Images are decoded with the `image` crate on worker threads and travel to
//! the GPU thread inside a deferred load operation.

use crate::render::api::{Area, Texture2DDescription, TextureFilter, TextureFormat};
use crate::render::{RenderError, RenderResult};
use image::RgbaImage;
use std::path::Path;

/// Decoded 2D texture
#[derive(Debug, Clone)]
pub struct Texture2DData {
    /// Name used in logs
    pub name: String,
    /// RGBA8 texels
    pub image: RgbaImage,
    /// Sampling filter
    pub filter: TextureFilter,
}

impl Texture2DData {
    /// Wrap an already decoded image
    pub fn new(name: impl Into<String>, image: RgbaImage, filter: TextureFilter) -> Self {
        Self {
            name: name.into(),
            image,
            filter,
        }
    }

    /// Decode an image file
    pub fn decode_file(path: impl AsRef<Path>, filter: TextureFilter) -> RenderResult<Self> {
        let path = path.as_ref();
        let image = image::open(path)?.to_rgba8();
        Ok(Self::new(path.display().to_string(), image, filter))
    }

    /// Allocation description matching the decoded image
    pub fn description(&self) -> Texture2DDescription {
        Texture2DDescription {
            area: Area::new(self.image.width(), self.image.height()),
            format: TextureFormat::Rgba8,
            filter: self.filter,
        }
    }
}

/// Cube map face order: +X, -X, +Y, -Y, +Z, -Z
#[derive(Debug, Clone)]
pub struct CubeMapData {
    /// Name used in logs
    pub name: String,
    /// Six square faces of identical size
    pub faces: [RgbaImage; 6],
}

impl CubeMapData {
    /// Build a cube map, checking that all faces are square and equally sized
    pub fn new(name: impl Into<String>, faces: [RgbaImage; 6]) -> RenderResult<Self> {
        let name = name.into();
        let edge = faces[0].width();
        for (index, face) in faces.iter().enumerate() {
            if face.width() != edge || face.height() != edge {
                return Err(RenderError::Device(format!(
                    "{name}: cube face {index} is {}x{}, expected {edge}x{edge}",
                    face.width(),
                    face.height()
                )));
            }
        }
        Ok(Self { name, faces })
    }

    /// Edge length of each face
    pub fn edge(&self) -> u32 {
        self.faces[0].width()
    }
}
