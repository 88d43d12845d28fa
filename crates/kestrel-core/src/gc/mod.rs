//! Collector-facing allocation
//!
//! The mark/sweep algorithm lives outside this crate. What the native layer
//! needs from the collector is allocation with a kind hint:
//!
//! - **GcRef**: block id + payload offset, packable into an 8-byte slot
//! - **Heap**: block allocator recording each block's [`AllocKind`]
//!
//! # Block Contents
//!
//! ```text
//! ┌──────────────┬────────────────────────────────────────────┐
//! │ Bytes        │ object / struct instance, raw storage      │
//! │ Array        │ element type + length + element payload    │
//! │ Closure      │ type + function index + optional bound     │
//! │ Boxed        │ a value stored behind a dynamic slot       │
//! └──────────────┴────────────────────────────────────────────┘
//! ```

mod heap;
mod ptr;

pub use heap::{AllocError, AllocKind, Heap, HeapObject, HeapStats};
pub use ptr::GcRef;
