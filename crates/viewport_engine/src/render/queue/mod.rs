//! # Deferred Operation Queues
//!
//! GPU resource work produced on any thread and executed on the GPU thread.
//!
//! Every [`QueueKind`] has its own unbounded channel. Producers hold a cloned
//! [`OperationSubmitter`] and get an [`OperationHandle`] back immediately. Once
//! per frame, before anything is rendered, the GPU thread calls
//! [`OperationQueues::drain_all`], which empties the queues one after another
//! in [`QueueKind::DRAIN_ORDER`]: deletes before loads, so a delete followed by
//! a reload of the same resource within one frame cannot race.
//!
//! A failing operation resolves its own handle with the error; draining goes
//! on with the next one.

pub mod operation;
pub mod workers;

pub use operation::{completion, Completion, GpuAccess, OperationHandle, PendingOperation};

use crate::render::api::{MeshHandle, ProgramHandle, TextureHandle};
use crate::render::cache::CacheStatisticsSnapshot;
use crate::render::resources::{CubeMapData, MeshData, ShaderSource, Texture2DData};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::fmt;

/// One queue per operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueKind {
    /// Mesh deletes
    MeshDelete = 0,
    /// 2D texture deletes
    Texture2DDelete = 1,
    /// Cube texture deletes
    TextureCubeDelete = 2,
    /// 2D texture uploads
    Texture2DLoad = 3,
    /// Cube texture uploads
    TextureCubeLoad = 4,
    /// Mesh uploads
    MeshLoad = 5,
    /// Program (re)loads
    ShaderLoad = 6,
    /// Cache statistics snapshots
    CacheStatistics = 7,
}

impl QueueKind {
    /// Number of queues
    pub const COUNT: usize = 8;

    /// The fixed order in which queues are drained
    pub const DRAIN_ORDER: [Self; Self::COUNT] = [
        Self::MeshDelete,
        Self::Texture2DDelete,
        Self::TextureCubeDelete,
        Self::Texture2DLoad,
        Self::TextureCubeLoad,
        Self::MeshLoad,
        Self::ShaderLoad,
        Self::CacheStatistics,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// What one [`OperationQueues::drain_all`] call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Queue of every executed operation, in execution order
    pub sequence: Vec<QueueKind>,
    /// Failed operations per queue
    pub failed: [usize; QueueKind::COUNT],
}

impl DrainReport {
    /// Operations executed, successful or not
    pub fn executed(&self) -> usize {
        self.sequence.len()
    }

    /// Operations that failed
    pub fn failures(&self) -> usize {
        self.failed.iter().sum()
    }

    /// True when nothing was queued
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

impl fmt::Display for DrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} executed, {} failed", self.executed(), self.failures())
    }
}

/// Producer side of the queues; cheap to clone and `Send`
#[derive(Debug, Clone)]
pub struct OperationSubmitter {
    senders: Vec<Sender<PendingOperation>>,
}

impl OperationSubmitter {
    /// Enqueue an operation built by the caller.
    ///
    /// If the queues are gone the operation is dropped, which resolves its
    /// handle with [`RenderError::OperationDropped`](crate::render::RenderError::OperationDropped).
    pub fn submit(&self, operation: PendingOperation) {
        let kind = operation.kind();
        if self.senders[kind.index()].send(operation).is_err() {
            log::warn!("{kind:?} operation submitted after the queues were closed");
        }
    }

    /// Upload a mesh
    pub fn load_mesh(&self, data: MeshData) -> OperationHandle<MeshHandle> {
        let (done, handle) = completion();
        self.submit(PendingOperation::LoadMesh { data, done });
        handle
    }

    /// Delete a mesh
    pub fn delete_mesh(&self, mesh: MeshHandle) -> OperationHandle<()> {
        let (done, handle) = completion();
        self.submit(PendingOperation::DeleteMesh { mesh, done });
        handle
    }

    /// Upload a 2D texture
    pub fn load_texture_2d(&self, data: Texture2DData) -> OperationHandle<TextureHandle> {
        let (done, handle) = completion();
        self.submit(PendingOperation::LoadTexture2D { data, done });
        handle
    }

    /// Delete a 2D texture
    pub fn delete_texture_2d(&self, texture: TextureHandle) -> OperationHandle<()> {
        let (done, handle) = completion();
        self.submit(PendingOperation::DeleteTexture2D { texture, done });
        handle
    }

    /// Upload a cube texture
    pub fn load_texture_cube(&self, data: CubeMapData) -> OperationHandle<TextureHandle> {
        let (done, handle) = completion();
        self.submit(PendingOperation::LoadTextureCube { data, done });
        handle
    }

    /// Delete a cube texture
    pub fn delete_texture_cube(&self, texture: TextureHandle) -> OperationHandle<()> {
        let (done, handle) = completion();
        self.submit(PendingOperation::DeleteTextureCube { texture, done });
        handle
    }

    /// Register and compile a program
    pub fn load_shader(&self, source: ShaderSource) -> OperationHandle<ProgramHandle> {
        let (done, handle) = completion();
        self.submit(PendingOperation::LoadShader { source, done });
        handle
    }

    /// Snapshot cache statistics on the GPU thread
    pub fn cache_statistics(&self) -> OperationHandle<CacheStatisticsSnapshot> {
        let (done, handle) = completion();
        self.submit(PendingOperation::CacheStatistics { done });
        handle
    }
}

/// Consumer side of the queues, owned by the GPU thread
pub struct OperationQueues {
    submitter: OperationSubmitter,
    receivers: Vec<Receiver<PendingOperation>>,
}

impl Default for OperationQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationQueues {
    /// Create empty queues
    pub fn new() -> Self {
        let (senders, receivers) = (0..QueueKind::COUNT).map(|_| unbounded()).unzip();
        Self {
            submitter: OperationSubmitter { senders },
            receivers,
        }
    }

    /// A new producer handle
    pub fn submitter(&self) -> OperationSubmitter {
        self.submitter.clone()
    }

    /// Enqueue from the owning thread
    pub fn submit(&self, operation: PendingOperation) {
        self.submitter.submit(operation);
    }

    /// Operations currently waiting in all queues
    pub fn pending(&self) -> usize {
        self.receivers.iter().map(Receiver::len).sum()
    }

    /// Execute everything queued, queue by queue in [`QueueKind::DRAIN_ORDER`].
    ///
    /// Without GPU access every operation fails with `GpuNotReady`.
    /// Operations submitted while a later queue is being drained wait for the
    /// next call if their queue was already emptied.
    pub fn drain_all(&self, mut gpu: Option<GpuAccess<'_>>) -> DrainReport {
        let mut report = DrainReport::default();
        for kind in QueueKind::DRAIN_ORDER {
            let receiver = &self.receivers[kind.index()];
            while let Ok(operation) = receiver.try_recv() {
                report.sequence.push(kind);
                if !operation.execute(gpu.as_mut()) {
                    report.failed[kind.index()] += 1;
                }
            }
        }
        if !report.is_empty() {
            log::debug!("drained deferred operations: {report}");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CacheSettings;
    use crate::render::api::{HeadlessDevice, TextureFilter};
    use crate::render::cache::RenderCaches;
    use crate::render::resources::ShaderLibrary;
    use crate::render::RenderError;
    use image::RgbaImage;
    use std::thread;

    fn caches() -> RenderCaches {
        RenderCaches::new(&CacheSettings::default(), ShaderLibrary::with_builtins())
    }

    fn texture(name: &str) -> Texture2DData {
        Texture2DData::new(name, RgbaImage::new(2, 2), TextureFilter::Linear)
    }

    #[test]
    fn test_drain_follows_fixed_queue_order_across_threads() {
        let mut device = HeadlessDevice::new();
        let mut caches = caches();
        let queues = OperationQueues::new();

        let quad = queues.submitter().load_mesh(MeshData::screen_quad());
        queues.drain_all(Some(GpuAccess {
            device: &mut device,
            caches: &mut caches,
        }));
        let quad = quad.wait().unwrap();

        let producers: Vec<_> = (0..4)
            .map(|n| {
                let submitter = queues.submitter();
                thread::spawn(move || {
                    // Handles are dropped; the operations still run.
                    let _ = submitter.cache_statistics();
                    let _ = submitter.load_texture_2d(texture(&format!("t{n}")));
                    let _ = submitter.load_mesh(MeshData::screen_quad());
                    if n == 0 {
                        let _ = submitter.delete_mesh(quad);
                    }
                    let _ = submitter.load_shader(ShaderSource::new(format!("p{n}"), "v", "f"));
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let report = queues.drain_all(Some(GpuAccess {
            device: &mut device,
            caches: &mut caches,
        }));

        assert_eq!(report.executed(), 4 * 4 + 1);
        assert_eq!(report.failures(), 0);
        assert_eq!(report.sequence[0], QueueKind::MeshDelete);
        let mut sorted = report.sequence.clone();
        sorted.sort();
        assert_eq!(report.sequence, sorted);
        assert_eq!(device.live_meshes(), 4);
        assert_eq!(queues.pending(), 0);
    }

    #[test]
    fn test_delete_and_reload_in_one_frame() {
        let mut device = HeadlessDevice::new();
        let mut caches = caches();
        let queues = OperationQueues::new();
        let submitter = queues.submitter();

        let first = submitter.load_texture_2d(texture("a"));
        queues.drain_all(Some(GpuAccess {
            device: &mut device,
            caches: &mut caches,
        }));
        let first = first.wait().unwrap();

        // Submitted load-then-delete, executed delete-then-load.
        let reloaded = submitter.load_texture_2d(texture("a"));
        let deleted = submitter.delete_texture_2d(first);
        let report = queues.drain_all(Some(GpuAccess {
            device: &mut device,
            caches: &mut caches,
        }));

        assert_eq!(
            report.sequence,
            vec![QueueKind::Texture2DDelete, QueueKind::Texture2DLoad]
        );
        deleted.wait().unwrap();
        reloaded.wait().unwrap();
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn test_failure_does_not_stop_draining() {
        let mut device = HeadlessDevice::new();
        let mut caches = caches();
        let queues = OperationQueues::new();
        let submitter = queues.submitter();

        let mesh = submitter.load_mesh(MeshData::screen_quad());
        queues.drain_all(Some(GpuAccess {
            device: &mut device,
            caches: &mut caches,
        }));
        let mesh = mesh.wait().unwrap();

        let first = submitter.delete_mesh(mesh);
        let second = submitter.delete_mesh(mesh);
        let empty_stage = submitter.load_shader(ShaderSource::new("broken", "", "void main() {}"));
        let stats = submitter.cache_statistics();

        let report = queues.drain_all(Some(GpuAccess {
            device: &mut device,
            caches: &mut caches,
        }));
        assert_eq!(report.executed(), 4);
        assert_eq!(report.failures(), 2);
        assert!(first.wait().is_ok());
        assert!(matches!(
            second.wait(),
            Err(RenderError::UnknownResource { kind: "mesh", .. })
        ));
        assert!(matches!(empty_stage.wait(), Err(RenderError::Device(_))));
        assert!(stats.wait().is_ok());
    }

    #[test]
    fn test_operations_fail_before_gpu_is_ready() {
        let queues = OperationQueues::new();
        let handle = queues.submitter().load_mesh(MeshData::screen_quad());
        let report = queues.drain_all(None);
        assert_eq!(report.failures(), 1);
        assert!(matches!(handle.wait(), Err(RenderError::GpuNotReady)));
    }

    #[test]
    fn test_every_operation_kind_fails_without_gpu() {
        let queues = OperationQueues::new();
        let submitter = queues.submitter();
        let faces = std::array::from_fn(|_| RgbaImage::new(2, 2));

        let deletes = [
            submitter.delete_mesh(MeshHandle::default()),
            submitter.delete_texture_2d(TextureHandle::default()),
            submitter.delete_texture_cube(TextureHandle::default()),
        ];
        let textures = [
            submitter.load_texture_2d(texture("flat")),
            submitter.load_texture_cube(CubeMapData::new("sky", faces).unwrap()),
        ];
        let mesh = submitter.load_mesh(MeshData::screen_quad());
        let shader = submitter.load_shader(ShaderSource::new("custom", "v", "f"));
        let stats = submitter.cache_statistics();

        let report = queues.drain_all(None);
        assert_eq!(report.failures(), 8);
        for handle in deletes {
            assert!(matches!(handle.wait(), Err(RenderError::GpuNotReady)));
        }
        for handle in textures {
            assert!(matches!(handle.wait(), Err(RenderError::GpuNotReady)));
        }
        assert!(matches!(mesh.wait(), Err(RenderError::GpuNotReady)));
        assert!(matches!(shader.wait(), Err(RenderError::GpuNotReady)));
        assert!(matches!(stats.wait(), Err(RenderError::GpuNotReady)));
    }

    #[test]
    fn test_shader_load_replaces_cached_program() {
        let mut device = HeadlessDevice::new();
        let mut caches = caches();
        let queues = OperationQueues::new();
        let submitter = queues.submitter();

        let first = submitter.load_shader(ShaderSource::new("custom", "v1", "f1"));
        let stats = submitter.cache_statistics();
        queues.drain_all(Some(GpuAccess {
            device: &mut device,
            caches: &mut caches,
        }));
        let first = first.wait().unwrap();
        // Statistics run after shader loads within the same drain.
        assert_eq!(stats.wait().unwrap().shaders.items, 1);

        let second = submitter.load_shader(ShaderSource::new("custom", "v2", "f2"));
        queues.drain_all(Some(GpuAccess {
            device: &mut device,
            caches: &mut caches,
        }));
        let second = second.wait().unwrap();
        assert_ne!(first, second);
        assert_eq!(device.live_programs(), 1);
    }

    #[test]
    fn test_handle_states() {
        let queues = OperationQueues::new();
        let handle = queues.submitter().cache_statistics();
        assert!(handle.try_take().is_none());
        assert!(matches!(
            handle.wait_timeout(std::time::Duration::from_millis(1)),
            Err(RenderError::OperationTimedOut)
        ));
        drop(queues);
        assert!(matches!(handle.wait(), Err(RenderError::OperationDropped)));
    }
}
