//! Background decode workers
//!
//! File I/O and decoding happen on a short-lived worker thread; only the
//! decoded payload travels to the GPU thread as a deferred operation. A decode
//! failure resolves the handle directly and never reaches the queues.

use super::{completion, Completion, OperationHandle, OperationSubmitter, PendingOperation};
use crate::render::api::{MeshHandle, TextureFilter, TextureHandle};
use crate::render::resources::{MeshData, Texture2DData};
use crate::render::RenderResult;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

/// Decode an image file in the background and upload it as a 2D texture
pub fn spawn_texture_2d_load(
    path: impl Into<PathBuf>,
    filter: TextureFilter,
    submitter: OperationSubmitter,
) -> OperationHandle<TextureHandle> {
    let decode = move |path: &Path| Texture2DData::decode_file(path, filter);
    spawn_decode(path.into(), submitter, decode, |data, done| {
        PendingOperation::LoadTexture2D { data, done }
    })
}

/// Parse a text mesh file in the background and upload it
pub fn spawn_mesh_load(
    path: impl Into<PathBuf>,
    submitter: OperationSubmitter,
) -> OperationHandle<MeshHandle> {
    let decode = |path: &Path| -> RenderResult<MeshData> {
        let source = fs::read_to_string(path)?;
        let name = path.file_stem().map_or_else(
            || path.display().to_string(),
            |stem| stem.to_string_lossy().into_owned(),
        );
        MeshData::parse_text(name, &source)
    };
    spawn_decode(path.into(), submitter, decode, |data, done| {
        PendingOperation::LoadMesh { data, done }
    })
}

fn spawn_decode<D, T>(
    path: PathBuf,
    submitter: OperationSubmitter,
    decode: impl FnOnce(&Path) -> RenderResult<D> + Send + 'static,
    operation: impl FnOnce(D, Completion<T>) -> PendingOperation + Send + 'static,
) -> OperationHandle<T>
where
    D: Send + 'static,
    T: Send + 'static,
{
    let (done, handle) = completion();
    let name = format!("decode {}", path.display());
    let spawned = thread::Builder::new().name(name).spawn(move || match decode(&path) {
        Ok(data) => submitter.submit(operation(data, done)),
        Err(error) => {
            log::error!("failed to decode {}: {error}", path.display());
            let _ = done.send(Err(error));
        }
    });
    match spawned {
        Ok(_) => handle,
        Err(error) => OperationHandle::failed(error.into()),
    }
}
