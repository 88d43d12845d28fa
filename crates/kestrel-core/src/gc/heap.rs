//! Heap allocator for GC-managed blocks
//!
//! Every block records the allocation kind the collector needs to decide
//! whether to scan it. Blocks are only ever released by a collector sweep;
//! this layer never frees.

use super::ptr::{GcRef, MAX_BLOCK, MAX_OFFSET};
use crate::array::ArrayData;
use crate::closure::Closure;
use crate::value::Value;
use kestrel_types::TypeRef;
use std::num::NonZeroU32;

/// Byte pattern written into blocks allocated without zero-fill in debug builds
const UNINIT_PATTERN: u8 = 0xCD;

/// Collector hint describing what a block may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocKind {
    /// Block may hold traceable pointers and must be scanned
    MayContainPointers,
    /// Block holds plain data only
    NoPointers,
    /// Untyped storage owned by the host; never scanned
    Raw,
}

impl AllocKind {
    /// Kind for a block whose contents satisfy `has_pointers`
    pub fn for_pointers(has_pointers: bool) -> Self {
        if has_pointers {
            AllocKind::MayContainPointers
        } else {
            AllocKind::NoPointers
        }
    }
}

/// Allocation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The configured heap limit would be exceeded
    #[error("Heap size limit exceeded: requested {requested} bytes with {allocated} of {limit} in use")]
    HeapLimitExceeded {
        /// Bytes requested
        requested: usize,
        /// Bytes already allocated
        allocated: usize,
        /// Configured limit
        limit: usize,
    },

    /// Every block id has been handed out
    #[error("Heap block ids exhausted")]
    BlocksExhausted,

    /// The payload size of an array is not representable
    #[error("Array of {length} elements of {element_size} bytes is too large")]
    SizeOverflow {
        /// Requested element count
        length: usize,
        /// Bytes per element
        element_size: usize,
    },
}

/// Contents of a heap block
#[derive(Debug)]
pub enum HeapObject {
    /// Object, struct or raw byte storage
    Bytes(Vec<u8>),
    /// Element array (scalar slots or inline instances)
    Array(ArrayData),
    /// Function pointer with optional bound value
    Closure(Closure),
    /// Boxed value stored behind a dynamic or nullable slot
    Boxed(Value),
}

#[derive(Debug)]
struct Block {
    kind: AllocKind,
    size: usize,
    object: HeapObject,
}

/// Heap statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of live blocks
    pub allocation_count: usize,
    /// Total bytes allocated
    pub allocated_bytes: usize,
    /// Blocks the collector must scan
    pub pointer_blocks: usize,
    /// Blocks the collector can skip
    pub data_blocks: usize,
}

/// Heap allocator for GC-managed memory
#[derive(Debug, Default)]
pub struct Heap {
    /// All allocations, block id = index + 1
    blocks: Vec<Block>,

    /// Total bytes allocated
    allocated_bytes: usize,

    /// Maximum heap size (None = unlimited)
    max_heap_bytes: Option<usize>,
}

impl Heap {
    /// Create a heap with an optional size limit
    pub fn new(max_heap_bytes: Option<usize>) -> Self {
        Self {
            blocks: Vec::new(),
            allocated_bytes: 0,
            max_heap_bytes,
        }
    }

    /// Set maximum heap size
    pub fn set_max_heap_size(&mut self, bytes: Option<usize>) {
        self.max_heap_bytes = bytes;
    }

    fn reserve(&self, size: usize) -> Result<NonZeroU32, AllocError> {
        if let Some(limit) = self.max_heap_bytes {
            if self.allocated_bytes.saturating_add(size) > limit {
                return Err(AllocError::HeapLimitExceeded {
                    requested: size,
                    allocated: self.allocated_bytes,
                    limit,
                });
            }
        }
        next_block_id(self.blocks.len())
    }

    fn push(&mut self, id: NonZeroU32, kind: AllocKind, size: usize, object: HeapObject) -> GcRef {
        tracing::trace!(block = id.get(), size, ?kind, "heap allocate");
        self.blocks.push(Block { kind, size, object });
        self.allocated_bytes += size;
        GcRef::new(id)
    }

    /// Allocate a byte block
    ///
    /// Without `zero_fill` the contents are unspecified; debug builds fill
    /// them with a marker pattern so callers relying on zeroes fail fast.
    pub fn allocate(
        &mut self,
        size: usize,
        kind: AllocKind,
        zero_fill: bool,
    ) -> Result<GcRef, AllocError> {
        let id = self.reserve(size)?;
        let fill = if zero_fill || !cfg!(debug_assertions) {
            0
        } else {
            UNINIT_PATTERN
        };
        Ok(self.push(id, kind, size, HeapObject::Bytes(vec![fill; size])))
    }

    /// Allocate a zero-filled element array
    pub fn allocate_array(
        &mut self,
        element: TypeRef,
        length: usize,
        element_size: usize,
        inline: bool,
        kind: AllocKind,
    ) -> Result<GcRef, AllocError> {
        // Element pointers into inline arrays must keep their offset in the slot encoding
        let max_size = if inline { MAX_OFFSET } else { isize::MAX as usize };
        let size = length
            .checked_mul(element_size)
            .filter(|&size| size <= max_size)
            .ok_or(AllocError::SizeOverflow {
                length,
                element_size,
            })?;
        let id = self.reserve(size)?;
        let array = ArrayData::zeroed(element, length, element_size, inline);
        Ok(self.push(id, kind, size, HeapObject::Array(array)))
    }

    /// Allocate a closure block
    pub fn allocate_closure(&mut self, closure: Closure) -> Result<GcRef, AllocError> {
        let size = std::mem::size_of::<Closure>();
        let id = self.reserve(size)?;
        Ok(self.push(
            id,
            AllocKind::MayContainPointers,
            size,
            HeapObject::Closure(closure),
        ))
    }

    /// Box a value so it can live behind a pointer slot
    pub fn allocate_boxed(&mut self, value: Value) -> Result<GcRef, AllocError> {
        let size = std::mem::size_of::<Value>();
        let id = self.reserve(size)?;
        let kind = AllocKind::for_pointers(value.holds_pointer());
        Ok(self.push(id, kind, size, HeapObject::Boxed(value)))
    }

    fn block(&self, r: GcRef) -> Option<&Block> {
        self.blocks.get(r.block() as usize - 1)
    }

    fn block_mut(&mut self, r: GcRef) -> Option<&mut Block> {
        self.blocks.get_mut(r.block() as usize - 1)
    }

    /// Contents of the block `r` points into
    pub fn object(&self, r: GcRef) -> Option<&HeapObject> {
        self.block(r).map(|block| &block.object)
    }

    /// Allocation kind recorded for the block
    pub fn alloc_kind(&self, r: GcRef) -> Option<AllocKind> {
        self.block(r).map(|block| block.kind)
    }

    /// Payload bytes starting at `r`'s offset (byte blocks and arrays)
    pub fn bytes(&self, r: GcRef) -> Option<&[u8]> {
        let payload = match self.object(r)? {
            HeapObject::Bytes(bytes) => bytes.as_slice(),
            HeapObject::Array(array) => array.bytes(),
            HeapObject::Closure(_) | HeapObject::Boxed(_) => return None,
        };
        payload.get(r.offset()..)
    }

    /// Mutable payload bytes starting at `r`'s offset
    pub fn bytes_mut(&mut self, r: GcRef) -> Option<&mut [u8]> {
        let payload = match &mut self.block_mut(r)?.object {
            HeapObject::Bytes(bytes) => bytes.as_mut_slice(),
            HeapObject::Array(array) => array.bytes_mut(),
            HeapObject::Closure(_) | HeapObject::Boxed(_) => return None,
        };
        payload.get_mut(r.offset()..)
    }

    /// Array header and payload
    pub fn array(&self, r: GcRef) -> Option<&ArrayData> {
        match self.object(r)? {
            HeapObject::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Mutable array
    pub fn array_mut(&mut self, r: GcRef) -> Option<&mut ArrayData> {
        match &mut self.block_mut(r)?.object {
            HeapObject::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Two distinct arrays, the first mutable
    ///
    /// Returns `None` if either block is not an array or both name the same
    /// block.
    pub fn array_pair_mut(&mut self, dst: GcRef, src: GcRef) -> Option<(&mut ArrayData, &ArrayData)> {
        let (d, s) = (dst.block() as usize - 1, src.block() as usize - 1);
        if d == s || d >= self.blocks.len() || s >= self.blocks.len() {
            return None;
        }
        let (dst_block, src_block) = if d < s {
            let (low, high) = self.blocks.split_at_mut(s);
            (&mut low[d], &high[0])
        } else {
            let (low, high) = self.blocks.split_at_mut(d);
            (&mut high[0], &low[s])
        };
        match (&mut dst_block.object, &src_block.object) {
            (HeapObject::Array(dst), HeapObject::Array(src)) => Some((dst, src)),
            _ => None,
        }
    }

    /// Closure stored in the block
    pub fn closure(&self, r: GcRef) -> Option<&Closure> {
        match self.object(r)? {
            HeapObject::Closure(closure) => Some(closure),
            _ => None,
        }
    }

    /// Boxed value stored in the block
    pub fn boxed(&self, r: GcRef) -> Option<&Value> {
        match self.object(r)? {
            HeapObject::Boxed(value) => Some(value),
            _ => None,
        }
    }

    /// Get total allocated bytes
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// Get number of allocations
    pub fn allocation_count(&self) -> usize {
        self.blocks.len()
    }

    /// Heap statistics
    pub fn stats(&self) -> HeapStats {
        let pointer_blocks = self
            .blocks
            .iter()
            .filter(|block| block.kind == AllocKind::MayContainPointers)
            .count();
        HeapStats {
            allocation_count: self.blocks.len(),
            allocated_bytes: self.allocated_bytes,
            pointer_blocks,
            data_blocks: self.blocks.len() - pointer_blocks,
        }
    }

    /// Recorded size of a block in bytes
    pub fn block_size(&self, r: GcRef) -> Option<usize> {
        self.block(r).map(|block| block.size)
    }
}

/// Id of the block following `count` live blocks
fn next_block_id(count: usize) -> Result<NonZeroU32, AllocError> {
    count
        .checked_add(1)
        .and_then(|id| u32::try_from(id).ok())
        .filter(|&id| id <= MAX_BLOCK)
        .and_then(NonZeroU32::new)
        .ok_or(AllocError::BlocksExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_creation() {
        let heap = Heap::default();
        assert_eq!(heap.allocated_bytes(), 0);
        assert_eq!(heap.allocation_count(), 0);
    }

    #[test]
    fn test_allocate_zeroed_bytes() {
        let mut heap = Heap::default();
        let r = heap.allocate(32, AllocKind::NoPointers, true).unwrap();

        assert_eq!(r.offset(), 0);
        assert_eq!(heap.bytes(r).unwrap(), &[0u8; 32][..]);
        assert_eq!(heap.alloc_kind(r), Some(AllocKind::NoPointers));
        assert_eq!(heap.block_size(r), Some(32));
        assert_eq!(heap.allocated_bytes(), 32);
    }

    #[test]
    fn test_block_ids_are_distinct() {
        let mut heap = Heap::default();
        let a = heap.allocate(8, AllocKind::Raw, true).unwrap();
        let b = heap.allocate(8, AllocKind::Raw, true).unwrap();
        assert_ne!(a.block(), b.block());
        assert_eq!(heap.allocation_count(), 2);
    }

    #[test]
    fn test_offset_view() {
        let mut heap = Heap::default();
        let r = heap.allocate(16, AllocKind::NoPointers, true).unwrap();
        heap.bytes_mut(r).unwrap()[8] = 7;

        let view = r.with_offset(8);
        assert_eq!(heap.bytes(view).unwrap().len(), 8);
        assert_eq!(heap.bytes(view).unwrap()[0], 7);
        assert!(heap.bytes(r.with_offset(17)).is_none());
    }

    #[test]
    fn test_heap_limit() {
        let mut heap = Heap::new(Some(64));
        heap.allocate(48, AllocKind::NoPointers, true).unwrap();

        let err = heap.allocate(32, AllocKind::NoPointers, true).unwrap_err();
        assert_eq!(
            err,
            AllocError::HeapLimitExceeded {
                requested: 32,
                allocated: 48,
                limit: 64
            }
        );
        // A failed allocation leaves the heap untouched
        assert_eq!(heap.allocation_count(), 1);
        assert_eq!(heap.allocated_bytes(), 48);
    }

    #[test]
    fn test_stats_split_by_kind() {
        let mut heap = Heap::default();
        heap.allocate(8, AllocKind::MayContainPointers, true).unwrap();
        heap.allocate(8, AllocKind::NoPointers, true).unwrap();
        heap.allocate(8, AllocKind::Raw, true).unwrap();

        let stats = heap.stats();
        assert_eq!(stats.allocation_count, 3);
        assert_eq!(stats.pointer_blocks, 1);
        assert_eq!(stats.data_blocks, 2);
        assert_eq!(stats.allocated_bytes, 24);
    }

    #[test]
    fn test_block_ids_stop_at_slot_encoding_limit() {
        assert_eq!(next_block_id(0).unwrap().get(), 1);
        let last = next_block_id(MAX_BLOCK as usize - 1).unwrap();
        assert_eq!(last.get(), MAX_BLOCK);
        assert_eq!(GcRef::from_bits(GcRef::new(last).to_bits()), Some(GcRef::new(last)));
        assert_eq!(next_block_id(MAX_BLOCK as usize), Err(AllocError::BlocksExhausted));
        assert_eq!(next_block_id(usize::MAX - 1), Err(AllocError::BlocksExhausted));
    }

    #[test]
    fn test_array_size_overflow() {
        let mut heap = Heap::default();
        let element = kestrel_types::TypeRegistry::new().i64();
        let err = heap
            .allocate_array(element.clone(), 1 << 61, 8, false, AllocKind::NoPointers)
            .unwrap_err();
        assert_eq!(
            err,
            AllocError::SizeOverflow {
                length: 1 << 61,
                element_size: 8
            }
        );

        // Inline payloads are capped by the element pointer offset
        let err = heap
            .allocate_array(element, 1 << 32, 8, true, AllocKind::NoPointers)
            .unwrap_err();
        assert!(matches!(err, AllocError::SizeOverflow { .. }));
        assert_eq!(heap.allocation_count(), 0);
        assert_eq!(heap.allocated_bytes(), 0);
    }

    #[test]
    fn test_alloc_kind_for_pointers() {
        assert_eq!(AllocKind::for_pointers(true), AllocKind::MayContainPointers);
        assert_eq!(AllocKind::for_pointers(false), AllocKind::NoPointers);
    }
}
