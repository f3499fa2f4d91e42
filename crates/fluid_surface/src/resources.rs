//! Render surface manager.
//!
//! Owns the depth, composite and scratch surfaces plus the indirect draw
//! argument buffer, and keeps them matched to the viewport size and particle
//! count. Backends plug in through [`SurfaceAllocator`]; the manager is the
//! only place resources are created or released.

use crate::surface::{Surface, SurfaceDesc, SurfaceSlot, Viewport};

/// Arguments of the instanced billboard draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawArgs {
    /// A unit quad drawn as a triangle strip.
    pub const QUAD_VERTICES: u32 = 4;

    /// One quad instance per live particle.
    pub fn for_particles(particle_count: u32) -> Self {
        Self {
            vertex_count: Self::QUAD_VERTICES,
            instance_count: particle_count,
            first_vertex: 0,
            first_instance: 0,
        }
    }

    /// Words in the order the GPU reads them from an indirect buffer.
    pub fn to_words(&self) -> [u32; 4] {
        [
            self.vertex_count,
            self.instance_count,
            self.first_vertex,
            self.first_instance,
        ]
    }
}

/// Backend failure while creating a resource.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("out of memory: requested {requested} bytes with {available} available")]
    OutOfMemory { requested: u64, available: u64 },
    #[error("{0}")]
    Backend(String),
}

/// Resources owned by the manager, used in error reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    DepthSurface,
    CompositeSurface,
    ScratchSurface,
    ArgsBuffer,
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("viewport {width}x{height} has no area")]
    EmptyViewport { width: u32, height: u32 },
    #[error("failed to allocate {resource:?}: {source}")]
    Allocation {
        resource: Resource,
        #[source]
        source: AllocError,
    },
}

/// Creates and frees backend resources on behalf of [`SurfaceManager`].
pub trait SurfaceAllocator {
    type Surface;
    type ArgsBuffer;

    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<Self::Surface, AllocError>;
    fn release_surface(&mut self, surface: Self::Surface);
    fn create_args_buffer(&mut self, args: &DrawArgs) -> Result<Self::ArgsBuffer, AllocError>;
    fn release_args_buffer(&mut self, buffer: Self::ArgsBuffer);
}

/// Which resources an [`SurfaceManager::ensure`] call (re)created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reallocation {
    pub depth: bool,
    pub composite: bool,
    pub scratch: bool,
    pub args: bool,
}

impl Reallocation {
    pub fn any(&self) -> bool {
        self.depth || self.composite || self.scratch || self.args
    }

    pub fn count(&self) -> usize {
        [self.depth, self.composite, self.scratch, self.args]
            .iter()
            .filter(|b| **b)
            .count()
    }
}

struct Allocated<T, K> {
    handle: T,
    key: K,
}

pub struct SurfaceManager<A: SurfaceAllocator> {
    allocator: A,
    depth: Option<Allocated<A::Surface, SurfaceDesc>>,
    composite: Option<Allocated<A::Surface, SurfaceDesc>>,
    scratch: Option<Allocated<A::Surface, SurfaceDesc>>,
    args: Option<Allocated<A::ArgsBuffer, DrawArgs>>,
}

impl<A: SurfaceAllocator> SurfaceManager<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            depth: None,
            composite: None,
            scratch: None,
            args: None,
        }
    }

    /// Matches every resource to `viewport` and `particle_count`.
    ///
    /// Only resources that are missing or stale are recreated, and the old
    /// resource is released first. On failure the failing resource is left
    /// unallocated so the manager reports not-ready until a later call
    /// succeeds.
    pub fn ensure(
        &mut self,
        viewport: Viewport,
        particle_count: u32,
    ) -> Result<Reallocation, ResourceError> {
        if viewport.is_empty() {
            return Err(ResourceError::EmptyViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }

        let realloc = Reallocation {
            depth: reconcile_surface(
                &mut self.allocator,
                &mut self.depth,
                SurfaceDesc::depth(viewport),
                Resource::DepthSurface,
            )?,
            composite: reconcile_surface(
                &mut self.allocator,
                &mut self.composite,
                SurfaceDesc::composite(viewport),
                Resource::CompositeSurface,
            )?,
            scratch: reconcile_surface(
                &mut self.allocator,
                &mut self.scratch,
                SurfaceDesc::scratch(viewport),
                Resource::ScratchSurface,
            )?,
            args: reconcile_args(
                &mut self.allocator,
                &mut self.args,
                DrawArgs::for_particles(particle_count),
            )?,
        };

        if realloc.any() {
            log::debug!(
                "Fluid resources reallocated for {}x{} / {} particles: {:?}",
                viewport.width,
                viewport.height,
                particle_count,
                realloc
            );
        }
        Ok(realloc)
    }

    /// Releases every resource. The next [`ensure`](Self::ensure) allocates
    /// from scratch.
    pub fn release(&mut self) {
        for slot in [&mut self.depth, &mut self.composite, &mut self.scratch] {
            if let Some(old) = slot.take() {
                self.allocator.release_surface(old.handle);
            }
        }
        if let Some(old) = self.args.take() {
            self.allocator.release_args_buffer(old.handle);
        }
    }

    /// True when every resource is allocated.
    pub fn is_ready(&self) -> bool {
        self.depth.is_some() && self.composite.is_some() && self.scratch.is_some() && self.args.is_some()
    }

    /// Viewport the surfaces currently match, if they are allocated.
    pub fn viewport(&self) -> Option<Viewport> {
        self.composite.as_ref().map(|c| c.key.viewport())
    }

    pub fn particle_count(&self) -> Option<u32> {
        self.args.as_ref().map(|a| a.key.instance_count)
    }

    pub fn draw_args(&self) -> Option<DrawArgs> {
        self.args.as_ref().map(|a| a.key)
    }

    pub fn surface(&self, slot: SurfaceSlot) -> Option<&A::Surface> {
        self.slot(slot).map(|s| &s.handle)
    }

    /// Mutable access to surface contents. Never reallocates.
    pub fn surface_mut(&mut self, slot: SurfaceSlot) -> Option<&mut A::Surface> {
        let entry = match slot {
            SurfaceSlot::Depth => &mut self.depth,
            SurfaceSlot::Composite => &mut self.composite,
            SurfaceSlot::Scratch => &mut self.scratch,
            SurfaceSlot::Display => return None,
        };
        entry.as_mut().map(|s| &mut s.handle)
    }

    /// Two distinct surfaces at once, the first shared and the second
    /// mutable. Returns `None` if either is missing or they are the same.
    pub fn surface_pair_mut(
        &mut self,
        read: SurfaceSlot,
        write: SurfaceSlot,
    ) -> Option<(&A::Surface, &mut A::Surface)> {
        if read == write {
            return None;
        }
        let Self {
            depth,
            composite,
            scratch,
            ..
        } = self;
        let mut read_entry = None;
        let mut write_entry = None;
        for (slot, entry) in [
            (SurfaceSlot::Depth, depth),
            (SurfaceSlot::Composite, composite),
            (SurfaceSlot::Scratch, scratch),
        ] {
            if slot == read {
                read_entry = entry.as_ref().map(|s| &s.handle);
            } else if slot == write {
                write_entry = entry.as_mut().map(|s| &mut s.handle);
            }
        }
        Some((read_entry?, write_entry?))
    }

    pub fn surface_desc(&self, slot: SurfaceSlot) -> Option<&SurfaceDesc> {
        self.slot(slot).map(|s| &s.key)
    }

    pub fn args(&self) -> Option<&A::ArgsBuffer> {
        self.args.as_ref().map(|a| &a.handle)
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    fn slot(&self, slot: SurfaceSlot) -> Option<&Allocated<A::Surface, SurfaceDesc>> {
        match slot {
            SurfaceSlot::Depth => self.depth.as_ref(),
            SurfaceSlot::Composite => self.composite.as_ref(),
            SurfaceSlot::Scratch => self.scratch.as_ref(),
            SurfaceSlot::Display => None,
        }
    }
}

impl<A: SurfaceAllocator> Drop for SurfaceManager<A> {
    fn drop(&mut self) {
        self.release();
    }
}

fn reconcile_surface<A: SurfaceAllocator>(
    allocator: &mut A,
    entry: &mut Option<Allocated<A::Surface, SurfaceDesc>>,
    desc: SurfaceDesc,
    resource: Resource,
) -> Result<bool, ResourceError> {
    if entry.as_ref().is_some_and(|current| current.key == desc) {
        return Ok(false);
    }
    if let Some(old) = entry.take() {
        allocator.release_surface(old.handle);
    }
    let handle = allocator
        .create_surface(&desc)
        .map_err(|source| ResourceError::Allocation { resource, source })?;
    *entry = Some(Allocated { handle, key: desc });
    Ok(true)
}

fn reconcile_args<A: SurfaceAllocator>(
    allocator: &mut A,
    entry: &mut Option<Allocated<A::ArgsBuffer, DrawArgs>>,
    args: DrawArgs,
) -> Result<bool, ResourceError> {
    if entry.as_ref().is_some_and(|current| current.key == args) {
        return Ok(false);
    }
    if let Some(old) = entry.take() {
        allocator.release_args_buffer(old.handle);
    }
    let handle = allocator
        .create_args_buffer(&args)
        .map_err(|source| ResourceError::Allocation {
            resource: Resource::ArgsBuffer,
            source,
        })?;
    *entry = Some(Allocated { handle, key: args });
    Ok(true)
}

/// Allocation counters kept by [`HostAllocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationStats {
    pub surfaces_created: u32,
    pub surfaces_released: u32,
    pub buffers_created: u32,
    pub buffers_released: u32,
}

impl AllocationStats {
    pub fn live_surfaces(&self) -> u32 {
        self.surfaces_created - self.surfaces_released
    }

    pub fn live_buffers(&self) -> u32 {
        self.buffers_created - self.buffers_released
    }
}

/// In-memory allocator backing the host executor.
///
/// An optional byte budget makes allocations fail the way a GPU out of
/// memory would.
#[derive(Debug, Default)]
pub struct HostAllocator {
    budget: Option<u64>,
    bytes_in_use: u64,
    stats: AllocationStats,
}

/// Size the host allocator charges for an argument buffer.
const ARGS_BUFFER_BYTES: u64 = 16;

impl HostAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(bytes: u64) -> Self {
        Self {
            budget: Some(bytes),
            ..Self::default()
        }
    }

    pub fn set_budget(&mut self, budget: Option<u64>) {
        self.budget = budget;
    }

    pub fn stats(&self) -> AllocationStats {
        self.stats
    }

    pub fn bytes_in_use(&self) -> u64 {
        self.bytes_in_use
    }

    fn reserve(&mut self, bytes: u64) -> Result<(), AllocError> {
        if let Some(budget) = self.budget {
            let available = budget.saturating_sub(self.bytes_in_use);
            if bytes > available {
                return Err(AllocError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
        }
        self.bytes_in_use += bytes;
        Ok(())
    }
}

impl SurfaceAllocator for HostAllocator {
    type Surface = Surface;
    type ArgsBuffer = DrawArgs;

    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<Surface, AllocError> {
        self.reserve(desc.byte_size())?;
        self.stats.surfaces_created += 1;
        Ok(Surface::new(*desc))
    }

    fn release_surface(&mut self, surface: Surface) {
        self.bytes_in_use = self.bytes_in_use.saturating_sub(surface.desc().byte_size());
        self.stats.surfaces_released += 1;
    }

    fn create_args_buffer(&mut self, args: &DrawArgs) -> Result<DrawArgs, AllocError> {
        self.reserve(ARGS_BUFFER_BYTES)?;
        self.stats.buffers_created += 1;
        Ok(*args)
    }

    fn release_args_buffer(&mut self, _buffer: DrawArgs) {
        self.bytes_in_use = self.bytes_in_use.saturating_sub(ARGS_BUFFER_BYTES);
        self.stats.buffers_released += 1;
    }
}
