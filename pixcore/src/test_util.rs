/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{
    alloc::Layout,
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use crate::alloc::{AllocatorCore, AllocatorError, GlobalAllocator};

/// An allocator that always fails.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AlwaysFails;

// SAFETY: This always fails.
unsafe impl AllocatorCore for AlwaysFails {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<[u8]>, AllocatorError> {
        Err(AllocatorError)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<[u8]>, _layout: Layout) {}
}

/// An allocator that can only perform a limited number of allocations.
#[derive(Debug, Clone)]
pub(crate) struct LimitedAllocator {
    remaining: Arc<AtomicUsize>,
}

impl LimitedAllocator {
    pub(crate) fn new(allocations: usize) -> Self {
        Self {
            remaining: Arc::new(AtomicUsize::new(allocations)),
        }
    }
}

// SAFETY: This either forwards to the global allocator, or fails.
unsafe impl AllocatorCore for LimitedAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocatorError> {
        self.remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .map_err(|_| AllocatorError)?;
        GlobalAllocator.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<[u8]>, layout: Layout) {
        // SAFETY: Forwarded from the caller.
        unsafe { GlobalAllocator.deallocate(ptr, layout) }
    }
}

/// An allocator that forwards to the global allocator and counts what it hands out.
#[derive(Debug, Default)]
pub(crate) struct CountingAllocator {
    live: AtomicUsize,
    total: AtomicUsize,
}

impl CountingAllocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The number of allocations not yet returned.
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// The number of successful allocations ever made.
    pub(crate) fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

// SAFETY: Forwards to the global allocator.
unsafe impl AllocatorCore for CountingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocatorError> {
        let ptr = GlobalAllocator.allocate(layout)?;
        self.live.fetch_add(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<[u8]>, layout: Layout) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        // SAFETY: Forwarded from the caller.
        unsafe { GlobalAllocator.deallocate(ptr, layout) }
    }
}

/// Install a thread-local subscriber that writes through the test harness.
pub(crate) fn init_test_subscriber() -> tracing::subscriber::DefaultGuard {
    let fmt_layer = fmt::layer().with_target(true).with_test_writer();

    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .set_default()
}
