//! Deferred GPU operations and their completion handles

use super::QueueKind;
use crate::render::api::{GpuDevice, MeshHandle, ProgramHandle, TextureHandle};
use crate::render::cache::{CacheStatisticsSnapshot, RenderCaches};
use crate::render::resources::{CubeMapData, MeshData, ShaderSource, Texture2DData};
use crate::render::{RenderError, RenderResult};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Completion side of a deferred operation
pub type Completion<T> = Sender<RenderResult<T>>;

/// Create a connected completion sender and handle
pub fn completion<T>() -> (Completion<T>, OperationHandle<T>) {
    let (sender, receiver) = bounded(1);
    (sender, OperationHandle { receiver })
}

/// Future-like result of a submitted operation.
///
/// Resolved on the GPU thread while the queues are drained. Dropping the
/// handle does not cancel the operation.
#[derive(Debug)]
pub struct OperationHandle<T> {
    receiver: Receiver<RenderResult<T>>,
}

impl<T> OperationHandle<T> {
    /// A handle that is already resolved with `error`
    pub fn failed(error: RenderError) -> Self {
        let (sender, handle) = completion();
        let _ = sender.send(Err(error));
        handle
    }

    /// Block until the operation ran. Must not be called on the GPU thread.
    pub fn wait(self) -> RenderResult<T> {
        self.receiver
            .recv()
            .unwrap_or(Err(RenderError::OperationDropped))
    }

    /// Block for at most `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> RenderResult<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(RenderError::OperationTimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(RenderError::OperationDropped),
        }
    }

    /// The result if the operation already ran
    pub fn try_take(&self) -> Option<RenderResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RenderError::OperationDropped)),
        }
    }
}

/// Device and caches as seen by a draining operation
pub struct GpuAccess<'a> {
    /// The GPU device
    pub device: &'a mut dyn GpuDevice,
    /// The kernel caches
    pub caches: &'a mut RenderCaches,
}

/// A unit of deferred GPU work
#[derive(Debug)]
pub enum PendingOperation {
    /// Delete an uploaded mesh
    DeleteMesh {
        /// Mesh to delete
        mesh: MeshHandle,
        /// Completion
        done: Completion<()>,
    },
    /// Delete a 2D texture
    DeleteTexture2D {
        /// Texture to delete
        texture: TextureHandle,
        /// Completion
        done: Completion<()>,
    },
    /// Delete a cube texture
    DeleteTextureCube {
        /// Texture to delete
        texture: TextureHandle,
        /// Completion
        done: Completion<()>,
    },
    /// Upload a decoded 2D texture
    LoadTexture2D {
        /// Decoded texels
        data: Texture2DData,
        /// Completion
        done: Completion<TextureHandle>,
    },
    /// Upload a decoded cube texture
    LoadTextureCube {
        /// Decoded faces
        data: CubeMapData,
        /// Completion
        done: Completion<TextureHandle>,
    },
    /// Upload a decoded mesh
    LoadMesh {
        /// Vertices and indices
        data: MeshData,
        /// Completion
        done: Completion<MeshHandle>,
    },
    /// Register a program source and compile it, replacing any cached program
    /// of the same name
    LoadShader {
        /// Program source
        source: ShaderSource,
        /// Completion
        done: Completion<ProgramHandle>,
    },
    /// Snapshot the statistics of every cache
    CacheStatistics {
        /// Completion
        done: Completion<CacheStatisticsSnapshot>,
    },
}

impl PendingOperation {
    /// Queue the operation belongs to
    pub const fn kind(&self) -> QueueKind {
        match self {
            Self::DeleteMesh { .. } => QueueKind::MeshDelete,
            Self::DeleteTexture2D { .. } => QueueKind::Texture2DDelete,
            Self::DeleteTextureCube { .. } => QueueKind::TextureCubeDelete,
            Self::LoadTexture2D { .. } => QueueKind::Texture2DLoad,
            Self::LoadTextureCube { .. } => QueueKind::TextureCubeLoad,
            Self::LoadMesh { .. } => QueueKind::MeshLoad,
            Self::LoadShader { .. } => QueueKind::ShaderLoad,
            Self::CacheStatistics { .. } => QueueKind::CacheStatistics,
        }
    }

    /// Run the operation and resolve its handle. Returns whether it succeeded.
    pub fn execute(self, gpu: Option<&mut GpuAccess<'_>>) -> bool {
        let Some(gpu) = gpu else {
            log::warn!("{:?} operation drained before the GPU is ready", self.kind());
            return self.fail(RenderError::GpuNotReady);
        };

        match self {
            Self::DeleteMesh { mesh, done } => resolve(&done, gpu.device.delete_mesh(mesh)),
            Self::DeleteTexture2D { texture, done } | Self::DeleteTextureCube { texture, done } => {
                resolve(&done, gpu.device.delete_texture(texture))
            }
            Self::LoadTexture2D { data, done } => {
                log::debug!("uploading texture {}", data.name);
                let result = gpu
                    .device
                    .create_texture_2d(&data.description(), Some(data.image.as_raw()));
                resolve(&done, result)
            }
            Self::LoadTextureCube { data, done } => {
                log::debug!("uploading cube texture {}", data.name);
                resolve(&done, gpu.device.create_texture_cube(&data))
            }
            Self::LoadMesh { data, done } => {
                log::debug!("uploading mesh {} ({} triangles)", data.name, data.triangle_count());
                resolve(&done, gpu.device.create_mesh(&data))
            }
            Self::LoadShader { source, done } => {
                let name = source.name.clone();
                let shaders = &mut gpu.caches.shaders;
                if shaders.loader_mut().register(source) {
                    log::info!("reloading program {name}");
                }
                shaders.invalidate(gpu.device, &name);
                resolve(&done, shaders.get(gpu.device, &name))
            }
            Self::CacheStatistics { done } => resolve(&done, Ok(gpu.caches.statistics())),
        }
    }

    /// Resolve the handle with `error` without running
    fn fail(self, error: RenderError) -> bool {
        match self {
            Self::DeleteMesh { done, .. }
            | Self::DeleteTexture2D { done, .. }
            | Self::DeleteTextureCube { done, .. } => resolve(&done, Err(error)),
            Self::LoadTexture2D { done, .. } | Self::LoadTextureCube { done, .. } => {
                resolve(&done, Err(error))
            }
            Self::LoadMesh { done, .. } => resolve(&done, Err(error)),
            Self::LoadShader { done, .. } => resolve(&done, Err(error)),
            Self::CacheStatistics { done } => resolve(&done, Err(error)),
        }
    }
}

fn resolve<T>(done: &Completion<T>, result: RenderResult<T>) -> bool {
    let ok = result.is_ok();
    if let Err(error) = &result {
        log::warn!("deferred operation failed: {error}");
    }
    // The holder may have dropped its handle; that is not an error.
    let _ = done.send(result);
    ok
}
