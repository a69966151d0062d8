//! Buffers and images tagged with an allocation class.
//!
//! Every allocation is counted in a shared [`MemoryLedger`]. Dropping a
//! handle frees the device memory and its ledger entry together, so the
//! ledger always reflects live bytes. Owners wait for the queue to drain
//! before dropping anything a submission may still read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cascade_core::error::DeviceError;
use cascade_core::types::Extent;

use crate::device::GpuContext;

/// How the host reaches an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryClass {
    /// Device-only; written by compute programs.
    DeviceLocal,
    /// Host streams whole updates in order (uniforms, initial uploads).
    HostSequentialWrite,
    /// Host may write or read back arbitrary ranges.
    HostRandomAccess,
}

impl MemoryClass {
    pub const ALL: [MemoryClass; 3] = [
        MemoryClass::DeviceLocal,
        MemoryClass::HostSequentialWrite,
        MemoryClass::HostRandomAccess,
    ];

    /// Usages added so the host can reach allocations of this class.
    pub fn host_usages(self) -> wgpu::BufferUsages {
        match self {
            MemoryClass::DeviceLocal => wgpu::BufferUsages::empty(),
            MemoryClass::HostSequentialWrite => wgpu::BufferUsages::COPY_DST,
            MemoryClass::HostRandomAccess => {
                wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC
            }
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Live byte counts per allocation class.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    live: [AtomicU64; 3],
    allocations: AtomicU64,
}

impl MemoryLedger {
    pub fn record_alloc(&self, class: MemoryClass, bytes: u64) {
        self.live[class.slot()].fetch_add(bytes, Ordering::Relaxed);
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_free(&self, class: MemoryClass, bytes: u64) {
        self.live[class.slot()].fetch_sub(bytes, Ordering::Relaxed);
        self.allocations.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn live_bytes(&self, class: MemoryClass) -> u64 {
        self.live[class.slot()].load(Ordering::Relaxed)
    }

    pub fn live_allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    pub fn log_report(&self) {
        for class in MemoryClass::ALL {
            log::info!("{:?}: {} bytes live", class, self.live_bytes(class));
        }
    }
}

/// A buffer and its accounting. Dropping it releases the ledger entry.
pub struct GpuBuffer {
    raw: wgpu::Buffer,
    class: MemoryClass,
    size: u64,
    ledger: Arc<MemoryLedger>,
}

impl GpuBuffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.raw.destroy();
        self.ledger.record_free(self.class, self.size);
    }
}

/// A 2D device-local image with a full view.
pub struct GpuImage {
    view: wgpu::TextureView,
    texture: wgpu::Texture,
    extent: Extent,
    bytes: u64,
    ledger: Arc<MemoryLedger>,
}

impl GpuImage {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        self.texture.destroy();
        self.ledger.record_free(MemoryClass::DeviceLocal, self.bytes);
    }
}

/// Buffer sizes are rounded up to whole 32-bit words for storage access.
pub fn padded_size(bytes: u64) -> u64 {
    bytes.div_ceil(4).max(1) * 4
}

impl GpuContext {
    pub fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
        class: MemoryClass,
    ) -> Result<GpuBuffer, DeviceError> {
        let size = padded_size(size);
        let raw = self.scoped(label, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: usage | class.host_usages(),
                mapped_at_creation: false,
            })
        })?;
        self.ledger().record_alloc(class, size);
        log::debug!("Created buffer {label}: {size} bytes ({class:?})");
        Ok(GpuBuffer {
            raw,
            class,
            size,
            ledger: Arc::clone(self.ledger()),
        })
    }

    /// Create a buffer and queue an upload of `contents`.
    pub fn create_buffer_init(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
        class: MemoryClass,
    ) -> Result<GpuBuffer, DeviceError> {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let buffer = self.create_buffer(label, contents.len() as u64, usage, class)?;
        // write_buffer needs a 4-byte multiple
        let aligned = contents.len() / 4 * 4;
        self.queue.write_buffer(buffer.raw(), 0, &contents[..aligned]);
        if aligned < contents.len() {
            let mut tail = [0u8; 4];
            tail[..contents.len() - aligned].copy_from_slice(&contents[aligned..]);
            self.queue.write_buffer(buffer.raw(), aligned as u64, &tail);
        }
        Ok(buffer)
    }

    /// Create a device-local 2D image usable as read-write storage.
    pub fn create_image(
        &self,
        label: &str,
        extent: Extent,
        format: wgpu::TextureFormat,
    ) -> Result<GpuImage, DeviceError> {
        let texture = self.scoped(label, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: extent.width,
                    height: extent.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let texel = format.block_copy_size(None).unwrap_or(4) as u64;
        let bytes = extent.width as u64 * extent.height as u64 * texel;
        self.ledger().record_alloc(MemoryClass::DeviceLocal, bytes);
        Ok(GpuImage {
            view,
            texture,
            extent,
            bytes,
            ledger: Arc::clone(self.ledger()),
        })
    }
}
