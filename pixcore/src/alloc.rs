/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{alloc::Layout, fmt, ptr::NonNull, sync::Arc};

use thiserror::Error;

/// The alignment of every [`Allocation`]. Large enough for every sample type.
pub const ALIGNMENT: usize = 16;

/// Indicate that an allocation error has occurred.
///
/// This type is limited in what it can contain because additional context
/// inevitably requires more memory allocation, which is what we're trying to avoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown allocation error")]
pub struct AllocatorError;

/// A dynamic memory allocator used to forge image storage.
///
/// # Safety
///
/// Implementations must ensure that if `allocate` succeeds, the returned slice has a length
/// of at least `layout.size()` bytes and an alignment of at least `layout.align()`. If this
/// cannot be satisfied, then an error **must** be returned.
pub unsafe trait AllocatorCore: Send + Sync + fmt::Debug {
    /// Allocate space for at least `layout.size()` bytes aligned to at least
    /// `layout.align()`. Returns an error if the requested size or alignment is not
    /// possible with this allocator.
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocatorError>;

    /// Deallocation companion to `allocate`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that
    ///
    /// 1. `ptr` is "currently allocated" from the allocator.
    /// 2. `ptr` has the same base pointer as the slice-pointer returned from [`Self::allocate`].
    /// 3. `layout` is the same layout that was passed to [`Self::allocate`] for this pointer.
    unsafe fn deallocate(&self, ptr: NonNull<[u8]>, layout: Layout);
}

/// A handle to Rust's global allocator. This type does not support allocations of size 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalAllocator;

// SAFETY: This is a simple wrapper around Rust's built-in allocation and deallocation
// methods. The returned slice from `allocate` always has the exact size and alignment as
// `layout`.
unsafe impl AllocatorCore for GlobalAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocatorError> {
        if layout.size() == 0 {
            return Err(AllocatorError);
        }

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { std::alloc::alloc(layout) };
        let ptr = std::ptr::slice_from_raw_parts_mut(ptr, layout.size());
        NonNull::new(ptr).ok_or(AllocatorError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<[u8]>, layout: Layout) {
        // SAFETY: The caller has the responsibility to ensure that `ptr` and `layout`
        // came from a previous allocation.
        unsafe { std::alloc::dealloc(ptr.as_ptr().cast::<u8>(), layout) }
    }
}

////////////////
// Allocation //
////////////////

#[repr(C, align(16))]
struct Aligned([u8; ALIGNMENT]);

/// A zero-initialized, fixed-size byte buffer shared by one or more image views.
///
/// An `Allocation` is only ever created by forging a view and is handed around as an
/// `Arc<Allocation>`. The memory is returned to its allocator when the last view referencing
/// it is dropped.
///
/// Empty allocations do not touch the allocator at all.
pub struct Allocation {
    ptr: NonNull<u8>,
    layout: Layout,
    // `None` means the global allocator.
    allocator: Option<Arc<dyn AllocatorCore>>,
}

impl Allocation {
    /// Allocate `bytes` zeroed bytes aligned to [`ALIGNMENT`].
    ///
    /// Nothing is leaked when this fails.
    pub(crate) fn new(
        bytes: usize,
        allocator: Option<Arc<dyn AllocatorCore>>,
    ) -> Result<Self, AllocatorError> {
        let layout = Layout::from_size_align(bytes, ALIGNMENT).map_err(|_| AllocatorError)?;
        if bytes == 0 {
            return Ok(Self {
                ptr: NonNull::<Aligned>::dangling().cast::<u8>(),
                layout,
                allocator,
            });
        }

        let slice = match &allocator {
            Some(allocator) => allocator.allocate(layout)?,
            None => GlobalAllocator.allocate(layout)?,
        };
        let ptr = slice.cast::<u8>();

        // SAFETY: `allocate` succeeded, so `ptr` is valid for writes of `layout.size()`
        // bytes.
        unsafe { ptr.as_ptr().write_bytes(0, bytes) };

        Ok(Self {
            ptr,
            layout,
            allocator,
        })
    }

    /// The size of the allocation in bytes.
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if self.layout.size() == 0 {
            return;
        }

        let ptr = NonNull::slice_from_raw_parts(self.ptr, self.layout.size());
        // SAFETY: `ptr` and `layout` are exactly what was obtained from and passed to the
        // allocator in `new`, and the memory has not been released since.
        unsafe {
            match &self.allocator {
                Some(allocator) => allocator.deallocate(ptr, self.layout),
                None => GlobalAllocator.deallocate(ptr, self.layout),
            }
        }
    }
}

// SAFETY: The allocation owns its memory and the allocator is `Send + Sync`. Views only
// read through shared references. Safe writes need `&mut` access to the only view of the
// allocation, and the `unsafe` aliasing writers require the caller to exclude concurrent
// access.
unsafe impl Send for Allocation {}

// SAFETY: See the `Send` implementation.
unsafe impl Sync for Allocation {}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("ptr", &self.ptr)
            .field("len", &self.len())
            .field("allocator", &self.allocator)
            .finish()
    }
}

///////////
// Tests //
///////////
