use std::sync::{Arc, Mutex};

use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Number of binding slots in every descriptor block.
///
/// A single `allocate` call can never request more than this; callers that
/// need more slots than one block holds are broken by contract.
pub const BLOCK_CAPACITY: u32 = 256;

/// Shader-visible heap categories the arena serves.
///
/// Color and depth attachments have no descriptor representation in Vulkan
/// (they bind by image view), so only the shader-addressed categories exist.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Uniform buffers and sampled/combined-image descriptors.
    Resource,
    /// Standalone sampler descriptors.
    Sampler,
}

impl DescriptorKind {
    pub const ALL: &'static [Self] = &[Self::Resource, Self::Sampler];
}

/// An opaque reference to a contiguous run of binding slots.
///
/// Valid for the remainder of the process; slots are never reclaimed or
/// reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DescriptorHandle {
    block: u32,
    offset: u64,
}

impl DescriptorHandle {
    /// Index of the owning block in the shared pool.
    pub fn block_index(self) -> u32 {
        self.block
    }

    /// Byte offset of the first slot from the block base.
    pub fn byte_offset(self) -> u64 {
        self.offset
    }
}

/// Device seam for block creation.
///
/// The slot stride is queried once per category and cached; creating a block
/// is the only device operation the arena performs.
pub trait DescriptorBlockDevice {
    type Block;

    /// Byte stride between adjacent slots of `kind`.
    fn descriptor_size(&self, kind: DescriptorKind) -> u64;

    /// Create a block able to hold `capacity` descriptors of `kind`.
    fn create_block(&self, kind: DescriptorKind, capacity: u32) -> Result<Self::Block>;
}

/// Process-lifetime store of every block ever created.
///
/// Shared by all allocator instances; its mutex serializes block creation
/// across threads. Blocks are only released when the pool itself is dropped
/// at teardown.
pub struct DescriptorBlockPool<D: DescriptorBlockDevice> {
    blocks: Mutex<Vec<Arc<D::Block>>>,
}

impl<D: DescriptorBlockDevice> DescriptorBlockPool<D> {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(Vec::new()),
        }
    }

    fn request_block(&self, device: &D, kind: DescriptorKind) -> Result<u32> {
        let mut blocks = self.blocks.lock().map_err(|e| eyre!(e.to_string()))?;
        let block = match device.create_block(kind, BLOCK_CAPACITY) {
            Ok(block) => Arc::new(block),
            Err(err) => {
                // Unrecoverable: the host is expected to abort on this error.
                log::error!("Failed to create a {kind:?} descriptor block: {err}");
                return Err(err);
            }
        };
        blocks.push(block);
        let index = (blocks.len() - 1) as u32;
        log::debug!("Created {kind:?} descriptor block #{index} ({BLOCK_CAPACITY} slots)");
        Ok(index)
    }

    /// Look up a block by the index stored in a handle.
    pub fn block(&self, index: u32) -> Option<Arc<D::Block>> {
        self.blocks
            .lock()
            .ok()?
            .get(index as usize)
            .cloned()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.lock().map(|b| b.len()).unwrap_or(0)
    }
}

impl<D: DescriptorBlockDevice> Default for DescriptorBlockPool<D> {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveBlock {
    index: u32,
    cursor: u64,
    remaining: u32,
}

/// Bump allocator over a growable list of fixed-capacity descriptor blocks,
/// one instance per [`DescriptorKind`].
///
/// Allocation is monotonic: the active block's cursor only advances, and a
/// fresh block is created exactly when the active one cannot satisfy a
/// request. There is no free list and no reuse; the design assumes the host
/// keeps a bounded descriptor budget for the process lifetime.
pub struct DescriptorAllocator<D: DescriptorBlockDevice> {
    kind: DescriptorKind,
    pool: Arc<DescriptorBlockPool<D>>,
    active: Option<ActiveBlock>,
    // 0 until the first block exists, then fixed for the process lifetime.
    descriptor_size: u64,
}

impl<D: DescriptorBlockDevice> DescriptorAllocator<D> {
    pub fn new(kind: DescriptorKind, pool: Arc<DescriptorBlockPool<D>>) -> Self {
        Self {
            kind,
            pool,
            active: None,
            descriptor_size: 0,
        }
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    /// Allocate `count` contiguous slots and return a handle to the first.
    ///
    /// `count` must be in `1..=BLOCK_CAPACITY`; anything else is a caller
    /// bug and fails the assertion. Block creation is the only fallible
    /// path and its failure is fatal for the host.
    pub fn allocate(&mut self, device: &D, count: u32) -> Result<DescriptorHandle> {
        assert!(count > 0, "descriptor allocation of zero slots");
        assert!(
            count <= BLOCK_CAPACITY,
            "descriptor allocation of {count} slots exceeds block capacity {BLOCK_CAPACITY}"
        );

        let exhausted = match &self.active {
            None => true,
            Some(block) => block.remaining < count,
        };
        if exhausted {
            // The request that overflows the active block is satisfied wholly
            // from the new one; the tail of the old block is abandoned.
            let index = self.pool.request_block(device, self.kind)?;
            if self.descriptor_size == 0 {
                self.descriptor_size = device.descriptor_size(self.kind);
            }
            self.active = Some(ActiveBlock {
                index,
                cursor: 0,
                remaining: BLOCK_CAPACITY,
            });
        }

        let block = self.active.as_mut().expect("active block just ensured");
        let handle = DescriptorHandle {
            block: block.index,
            offset: block.cursor,
        };
        block.cursor += u64::from(count) * self.descriptor_size;
        block.remaining -= count;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const SLOT_SIZE: u64 = 32;

    struct FakeBlock;

    struct FakeDevice {
        created: Cell<u32>,
        size_queries: Cell<u32>,
        fail_creation: bool,
    }

    impl FakeDevice {
        fn new() -> Self {
            Self {
                created: Cell::new(0),
                size_queries: Cell::new(0),
                fail_creation: false,
            }
        }
    }

    impl DescriptorBlockDevice for FakeDevice {
        type Block = FakeBlock;

        fn descriptor_size(&self, _kind: DescriptorKind) -> u64 {
            self.size_queries.set(self.size_queries.get() + 1);
            SLOT_SIZE
        }

        fn create_block(&self, _kind: DescriptorKind, _capacity: u32) -> Result<FakeBlock> {
            if self.fail_creation {
                return Err(eyre!("out of device memory"));
            }
            self.created.set(self.created.get() + 1);
            Ok(FakeBlock)
        }
    }

    fn allocator() -> DescriptorAllocator<FakeDevice> {
        DescriptorAllocator::new(DescriptorKind::Resource, Arc::new(DescriptorBlockPool::new()))
    }

    #[test]
    fn ranges_within_a_block_never_overlap() {
        let device = FakeDevice::new();
        let mut alloc = allocator();

        let mut previous_end = 0;
        for count in [1u32, 4, 16, 1, 64, 3] {
            let handle = alloc.allocate(&device, count).unwrap();
            assert_eq!(handle.block_index(), 0);
            assert!(handle.byte_offset() >= previous_end);
            previous_end = handle.byte_offset() + u64::from(count) * SLOT_SIZE;
        }
        assert_eq!(device.created.get(), 1);
    }

    #[test]
    fn exhaustion_creates_exactly_one_block_and_serves_from_it() {
        let device = FakeDevice::new();
        let mut alloc = allocator();

        alloc.allocate(&device, 200).unwrap();
        assert_eq!(device.created.get(), 1);

        // 56 slots remain; the request must not be pieced together across
        // blocks.
        let handle = alloc.allocate(&device, 100).unwrap();
        assert_eq!(device.created.get(), 2);
        assert_eq!(handle.block_index(), 1);
        assert_eq!(handle.byte_offset(), 0);
    }

    #[test]
    fn slot_size_is_queried_once() {
        let device = FakeDevice::new();
        let mut alloc = allocator();

        for _ in 0..4 {
            alloc.allocate(&device, BLOCK_CAPACITY).unwrap();
        }
        assert_eq!(device.created.get(), 4);
        assert_eq!(device.size_queries.get(), 1);
    }

    #[test]
    fn pool_retains_every_block_until_teardown() {
        let device = FakeDevice::new();
        let pool = Arc::new(DescriptorBlockPool::new());
        let mut alloc = DescriptorAllocator::new(DescriptorKind::Sampler, pool.clone());

        alloc.allocate(&device, BLOCK_CAPACITY).unwrap();
        alloc.allocate(&device, 1).unwrap();
        assert_eq!(pool.block_count(), 2);
        assert!(pool.block(0).is_some());
        assert!(pool.block(1).is_some());
        assert!(pool.block(2).is_none());
    }

    #[test]
    fn creation_failure_surfaces_as_error() {
        let mut device = FakeDevice::new();
        device.fail_creation = true;
        let mut alloc = allocator();
        assert!(alloc.allocate(&device, 1).is_err());
    }

    #[test]
    #[should_panic]
    fn zero_slot_request_is_a_bug() {
        let device = FakeDevice::new();
        let mut alloc = allocator();
        let _ = alloc.allocate(&device, 0);
    }

    #[test]
    #[should_panic]
    fn over_capacity_request_is_a_bug() {
        let device = FakeDevice::new();
        let mut alloc = allocator();
        let _ = alloc.allocate(&device, BLOCK_CAPACITY + 1);
    }
}
