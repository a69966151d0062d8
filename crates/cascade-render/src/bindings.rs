//! Binding registry: layouts, fixed-budget pools and set writers.
//!
//! Creation order is always layout, then pool, then set. A pool holds an
//! `Arc` of its layout and owns every set drawn from it, so neither can be
//! outlived by a set. Callers keep [`SetHandle`]s, which are checked
//! against the pool generation on every lookup.

use std::sync::Arc;

use cascade_core::error::DeviceError;

use crate::device::GpuContext;

/// Kind of resource bound at one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    StorageBuffer,
    UniformBuffer,
    StorageImage {
        format: wgpu::TextureFormat,
        access: wgpu::StorageTextureAccess,
    },
}

impl ResourceKind {
    fn binding_type(self) -> wgpu::BindingType {
        match self {
            ResourceKind::StorageBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            ResourceKind::UniformBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            ResourceKind::StorageImage { format, access } => wgpu::BindingType::StorageTexture {
                access,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
        }
    }

    fn accepts(self, write: WriteKind) -> bool {
        matches!(
            (self, write),
            (ResourceKind::StorageBuffer | ResourceKind::UniformBuffer, WriteKind::Buffer)
                | (ResourceKind::StorageImage { .. }, WriteKind::Image)
        )
    }
}

/// One slot of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingEntry {
    pub slot: u32,
    pub kind: ResourceKind,
    pub visibility: wgpu::ShaderStages,
}

/// Collects slots in order and produces an immutable [`BindingLayout`].
#[derive(Debug, Clone)]
pub struct BindingLayoutBuilder {
    label: String,
    entries: Vec<BindingEntry>,
}

impl BindingLayoutBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
        }
    }

    pub fn add_binding(mut self, slot: u32, kind: ResourceKind, visibility: wgpu::ShaderStages) -> Self {
        self.entries.push(BindingEntry {
            slot,
            kind,
            visibility,
        });
        self
    }

    /// Validate the slots and translate them to wgpu layout entries.
    pub fn describe(&self) -> Result<Vec<wgpu::BindGroupLayoutEntry>, DeviceError> {
        if self.entries.is_empty() {
            return Err(self.error("layout has no bindings"));
        }
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.slot) {
                return Err(self.error(&format!("slot {} declared twice", entry.slot)));
            }
            if entry.visibility.is_empty() {
                return Err(self.error(&format!("slot {} is visible to no stage", entry.slot)));
            }
        }
        Ok(self
            .entries
            .iter()
            .map(|e| wgpu::BindGroupLayoutEntry {
                binding: e.slot,
                visibility: e.visibility,
                ty: e.kind.binding_type(),
                count: None,
            })
            .collect())
    }

    pub fn build(self, ctx: &GpuContext) -> Result<Arc<BindingLayout>, DeviceError> {
        let entries = self.describe()?;
        let raw = ctx.scoped(&self.label, |device| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&self.label),
                entries: &entries,
            })
        })?;
        Ok(Arc::new(BindingLayout {
            raw,
            label: self.label,
            entries: self.entries,
        }))
    }

    fn error(&self, reason: &str) -> DeviceError {
        DeviceError::BindingLayout {
            label: self.label.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Immutable layout shared by a pool and every pipeline that binds it.
#[derive(Debug)]
pub struct BindingLayout {
    raw: wgpu::BindGroupLayout,
    label: String,
    entries: Vec<BindingEntry>,
}

impl BindingLayout {
    pub fn raw(&self) -> &wgpu::BindGroupLayout {
        &self.raw
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn entries(&self) -> &[BindingEntry] {
        &self.entries
    }
}

/// Index into a [`SetArena`], valid until the arena is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetHandle {
    index: u32,
    generation: u32,
}

/// Fixed-capacity arena. Resetting invalidates every outstanding handle.
#[derive(Debug)]
pub struct SetArena<T> {
    items: Vec<T>,
    capacity: u32,
    generation: u32,
}

impl<T> SetArena<T> {
    pub fn new(capacity: u32) -> Self {
        Self {
            items: Vec::with_capacity(capacity as usize),
            capacity,
            generation: 0,
        }
    }

    /// Store `item`, or hand it back when the budget is spent.
    pub fn insert(&mut self, item: T) -> Result<SetHandle, T> {
        if self.items.len() as u32 >= self.capacity {
            return Err(item);
        }
        self.items.push(item);
        Ok(SetHandle {
            index: self.items.len() as u32 - 1,
            generation: self.generation,
        })
    }

    pub fn get(&self, handle: SetHandle) -> Option<&T> {
        if handle.generation != self.generation {
            return None;
        }
        self.items.get(handle.index as usize)
    }

    /// Drop every item. Items are released in reverse allocation order.
    pub fn reset(&mut self) {
        while self.items.pop().is_some() {}
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl<T> Drop for SetArena<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

/// A pool sized to exactly the sets that will ever be drawn from it.
#[derive(Debug)]
pub struct BindingPool {
    label: String,
    sets: SetArena<wgpu::BindGroup>,
    layout: Arc<BindingLayout>,
}

impl BindingPool {
    pub fn new(label: impl Into<String>, layout: Arc<BindingLayout>, capacity: u32) -> Self {
        Self {
            label: label.into(),
            sets: SetArena::new(capacity),
            layout,
        }
    }

    pub fn layout(&self) -> &Arc<BindingLayout> {
        &self.layout
    }

    pub fn get(&self, handle: SetHandle) -> Result<&wgpu::BindGroup, DeviceError> {
        self.sets.get(handle).ok_or_else(|| DeviceError::StaleSet {
            label: self.label.clone(),
        })
    }

    /// Return every set to the pool.
    pub fn reset(&mut self) {
        self.sets.reset();
    }

    pub fn remaining(&self) -> u32 {
        self.sets.capacity() - self.sets.len() as u32
    }

    fn exhausted(&self) -> DeviceError {
        DeviceError::PoolExhausted {
            label: self.label.clone(),
            capacity: self.sets.capacity(),
        }
    }
}

/// What a write provides, independent of the wgpu object behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Buffer,
    Image,
}

enum WriteResource<'a> {
    Buffer(&'a wgpu::Buffer),
    Image(&'a wgpu::TextureView),
}

impl WriteResource<'_> {
    fn kind(&self) -> WriteKind {
        match self {
            WriteResource::Buffer(_) => WriteKind::Buffer,
            WriteResource::Image(_) => WriteKind::Image,
        }
    }
}

/// Check that `writes` covers every slot of `entries` exactly once with a matching kind.
pub fn validate_writes(
    label: &str,
    entries: &[BindingEntry],
    writes: &[(u32, WriteKind)],
) -> Result<(), DeviceError> {
    let error = |reason: String| DeviceError::BindingLayout {
        label: label.to_string(),
        reason,
    };
    for (slot, kind) in writes {
        let entry = entries
            .iter()
            .find(|e| e.slot == *slot)
            .ok_or_else(|| error(format!("no slot {slot} in layout")))?;
        if !entry.kind.accepts(*kind) {
            return Err(error(format!(
                "slot {slot} expects {:?}, got a {kind:?} write",
                entry.kind
            )));
        }
        if writes.iter().filter(|(s, _)| s == slot).count() > 1 {
            return Err(error(format!("slot {slot} written twice")));
        }
    }
    if let Some(missing) = entries.iter().find(|e| !writes.iter().any(|(s, _)| *s == e.slot)) {
        return Err(error(format!("slot {} left unwritten", missing.slot)));
    }
    Ok(())
}

/// Batches buffer and image bindings into one set.
#[derive(Default)]
pub struct BindingWriter<'a> {
    writes: Vec<(u32, WriteResource<'a>)>,
}

impl<'a> BindingWriter<'a> {
    pub fn new() -> Self {
        Self { writes: Vec::new() }
    }

    pub fn buffer(mut self, slot: u32, buffer: &'a wgpu::Buffer) -> Self {
        self.writes.push((slot, WriteResource::Buffer(buffer)));
        self
    }

    pub fn image(mut self, slot: u32, view: &'a wgpu::TextureView) -> Self {
        self.writes.push((slot, WriteResource::Image(view)));
        self
    }

    /// Allocate one set from `pool` holding the batched bindings.
    pub fn allocate(self, ctx: &GpuContext, pool: &mut BindingPool) -> Result<SetHandle, DeviceError> {
        let layout = Arc::clone(pool.layout());
        let kinds: Vec<(u32, WriteKind)> = self.writes.iter().map(|(s, w)| (*s, w.kind())).collect();
        validate_writes(layout.label(), layout.entries(), &kinds)?;
        if pool.remaining() == 0 {
            return Err(pool.exhausted());
        }

        let entries: Vec<wgpu::BindGroupEntry> = self
            .writes
            .iter()
            .map(|(slot, resource)| wgpu::BindGroupEntry {
                binding: *slot,
                resource: match resource {
                    WriteResource::Buffer(buffer) => buffer.as_entire_binding(),
                    WriteResource::Image(view) => wgpu::BindingResource::TextureView(view),
                },
            })
            .collect();

        let set = ctx.scoped(&pool.label, |device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&pool.label),
                layout: layout.raw(),
                entries: &entries,
            })
        })?;
        pool.sets.insert(set).map_err(|_| pool.exhausted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_entry(slot: u32) -> BindingEntry {
        BindingEntry {
            slot,
            kind: ResourceKind::StorageBuffer,
            visibility: wgpu::ShaderStages::COMPUTE,
        }
    }

    fn image_entry(slot: u32) -> BindingEntry {
        BindingEntry {
            slot,
            kind: ResourceKind::StorageImage {
                format: wgpu::TextureFormat::Rgba16Float,
                access: wgpu::StorageTextureAccess::ReadWrite,
            },
            visibility: wgpu::ShaderStages::COMPUTE,
        }
    }

    #[test]
    fn test_describe_preserves_order() {
        let builder = BindingLayoutBuilder::new("test")
            .add_binding(1, ResourceKind::UniformBuffer, wgpu::ShaderStages::COMPUTE)
            .add_binding(0, ResourceKind::StorageBuffer, wgpu::ShaderStages::COMPUTE);
        let entries = builder.describe().expect("valid layout");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].binding, 1);
        assert!(matches!(
            entries[0].ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                ..
            }
        ));
        assert_eq!(entries[1].binding, 0);
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let builder = BindingLayoutBuilder::new("dup")
            .add_binding(0, ResourceKind::StorageBuffer, wgpu::ShaderStages::COMPUTE)
            .add_binding(0, ResourceKind::UniformBuffer, wgpu::ShaderStages::COMPUTE);
        assert!(matches!(
            builder.describe(),
            Err(DeviceError::BindingLayout { .. })
        ));
    }

    #[test]
    fn test_empty_layout_rejected() {
        assert!(BindingLayoutBuilder::new("empty").describe().is_err());
    }

    #[test]
    fn test_storage_image_entry() {
        let entries = BindingLayoutBuilder::new("image")
            .add_binding(
                0,
                ResourceKind::StorageImage {
                    format: wgpu::TextureFormat::Bgra8Unorm,
                    access: wgpu::StorageTextureAccess::WriteOnly,
                },
                wgpu::ShaderStages::COMPUTE,
            )
            .describe()
            .expect("valid layout");
        assert!(matches!(
            entries[0].ty,
            wgpu::BindingType::StorageTexture {
                format: wgpu::TextureFormat::Bgra8Unorm,
                access: wgpu::StorageTextureAccess::WriteOnly,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_writes_full_coverage() {
        let entries = [storage_entry(0), image_entry(1)];
        assert!(validate_writes("t", &entries, &[(0, WriteKind::Buffer), (1, WriteKind::Image)]).is_ok());
    }

    #[test]
    fn test_validate_writes_rejects_gaps_and_mismatches() {
        let entries = [storage_entry(0), image_entry(1)];
        // missing slot 1
        assert!(validate_writes("t", &entries, &[(0, WriteKind::Buffer)]).is_err());
        // image written into a buffer slot
        assert!(validate_writes("t", &entries, &[(0, WriteKind::Image), (1, WriteKind::Image)]).is_err());
        // unknown slot
        assert!(validate_writes(
            "t",
            &entries,
            &[(0, WriteKind::Buffer), (1, WriteKind::Image), (2, WriteKind::Buffer)]
        )
        .is_err());
        // duplicate write
        assert!(validate_writes(
            "t",
            &entries,
            &[(0, WriteKind::Buffer), (0, WriteKind::Buffer), (1, WriteKind::Image)]
        )
        .is_err());
    }

    #[test]
    fn test_arena_budget_is_exact() {
        let mut arena = SetArena::new(2);
        let a = arena.insert("a").expect("first set");
        let b = arena.insert("b").expect("second set");
        assert_eq!(arena.insert("c"), Err("c"));
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn test_arena_reset_invalidates_handles() {
        let mut arena = SetArena::new(1);
        let old = arena.insert(1u32).expect("set");
        arena.reset();
        assert!(arena.is_empty());
        assert_eq!(arena.get(old), None, "stale handle must not resolve");
        let new = arena.insert(2u32).expect("set after reset");
        assert_eq!(arena.get(new), Some(&2));
        assert_ne!(old, new);
    }

    #[test]
    fn test_arena_releases_in_reverse_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Tracked(u32, Rc<RefCell<Vec<u32>>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.1.borrow_mut().push(self.0);
            }
        }

        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let mut arena = SetArena::new(3);
            for i in 0..3 {
                assert!(arena.insert(Tracked(i, Rc::clone(&order))).is_ok());
            }
        }
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }
}
