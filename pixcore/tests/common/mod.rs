/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

#![allow(dead_code)]

use std::{
    alloc::Layout,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use pixcore::{
    dispatch::TypedViewMut,
    pixcore_types::{Sample, SampleType, TensorShape},
    AllocatorCore, AllocatorError, GlobalAllocator, StridedView,
};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Forwards to the global allocator and counts the allocations still alive.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    live: AtomicUsize,
    bytes: AtomicUsize,
}

impl CountingAllocator {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Bytes currently handed out.
    pub fn bytes(&self) -> usize {
        self.bytes.load(Ordering::SeqCst)
    }
}

// SAFETY: Forwards to the global allocator.
unsafe impl AllocatorCore for CountingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocatorError> {
        let ptr = GlobalAllocator.allocate(layout)?;
        self.live.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(layout.size(), Ordering::SeqCst);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<[u8]>, layout: Layout) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.bytes.fetch_sub(layout.size(), Ordering::SeqCst);
        // SAFETY: Forwarded from the caller.
        unsafe { GlobalAllocator.deallocate(ptr, layout) }
    }
}

/// Never hands out memory.
#[derive(Debug)]
pub struct Exhausted;

// SAFETY: This always fails.
unsafe impl AllocatorCore for Exhausted {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<[u8]>, AllocatorError> {
        Err(AllocatorError)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<[u8]>, _layout: Layout) {}
}

pub fn init_test_subscriber() -> tracing::subscriber::DefaultGuard {
    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_test_writer())
        .set_default()
}

/// Forge an image of type `T` whose samples are `1, 2, 3, ...` in buffer order.
pub fn ramp<T: Sample>(sizes: &[usize], channels: usize) -> StridedView {
    let tensor = TensorShape::column_vector(channels).unwrap();
    let mut image = StridedView::forge(sizes, tensor, T::TYPE).unwrap();
    let mut next = 0.0;
    TypedViewMut::<T>::new(&mut image)
        .unwrap()
        .map_in_place(|_| {
            next += 1.0;
            T::from_real(next)
        });
    image
}

/// Every sample of `view`, in buffer order, as `f64`.
pub fn values(view: &StridedView) -> Vec<f64> {
    let format = pixcore::BufferFormat::interleaved(SampleType::DFloat);
    pixcore::write_to_buffer(view, &format, &Default::default())
        .unwrap()
        .chunks_exact(8)
        .map(bytemuck::pod_read_unaligned::<f64>)
        .collect()
}
