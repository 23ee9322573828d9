//! CPU-side resource payloads handed to the GPU thread

pub mod mesh;
pub mod shader;
pub mod texture;

pub use mesh::{MeshData, Vertex};
pub use shader::{builtin, ShaderLibrary, ShaderSource};
pub use texture::{CubeMapData, Texture2DData};
