// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Accounting of host memory allocations.
//!
//! Memory itself always comes from the global allocator. A [`HostAllocator`] is notified of every
//! long-lived allocation that is made on behalf of a render pass or of a render pass recording,
//! and can refuse it, in which case the operation fails with [`OomError::OutOfHostMemory`].

use crate::OomError;
use std::{alloc::Layout, fmt::Debug, sync::Arc};

/// Receives a notification for every host allocation and free.
///
/// Every successful call to `allocate` is matched by exactly one call to `free` with the same
/// layout and scope.
pub trait HostAllocator: Debug + Send + Sync {
    /// Called before memory described by `layout` is allocated. Returning an error makes the
    /// operation that needed the memory fail.
    fn allocate(&self, layout: Layout, scope: AllocationScope) -> Result<(), OomError>;

    /// Called after memory previously accepted by `allocate` has been released.
    fn free(&self, layout: Layout, scope: AllocationScope);
}

/// Allocator that accepts every allocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHostAllocator;

impl HostAllocator for DefaultHostAllocator {
    #[inline]
    fn allocate(&self, _layout: Layout, _scope: AllocationScope) -> Result<(), OomError> {
        Ok(())
    }

    #[inline]
    fn free(&self, _layout: Layout, _scope: AllocationScope) {}
}

/// Lifetime of an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AllocationScope {
    /// Lives as long as a single command.
    Command = ash::vk::SystemAllocationScope::COMMAND.as_raw(),

    /// Lives as long as an object, such as a render pass or the recording state of a render pass.
    Object = ash::vk::SystemAllocationScope::OBJECT.as_raw(),

    /// Lives as long as the device.
    Device = ash::vk::SystemAllocationScope::DEVICE.as_raw(),
}

impl From<AllocationScope> for ash::vk::SystemAllocationScope {
    #[inline]
    fn from(val: AllocationScope) -> Self {
        Self::from_raw(val as i32)
    }
}

/// An allocation that was accepted by a [`HostAllocator`], reported as freed when dropped.
#[derive(Debug)]
pub(crate) struct HostAllocation {
    allocator: Arc<dyn HostAllocator>,
    layout: Layout,
    scope: AllocationScope,
}

impl HostAllocation {
    /// Asks `allocator` for room for `count` values of `T`.
    pub(crate) fn array<T>(
        allocator: &Arc<dyn HostAllocator>,
        count: usize,
        scope: AllocationScope,
    ) -> Result<Self, OomError> {
        let layout = Layout::array::<T>(count).map_err(|_| OomError::OutOfHostMemory)?;
        allocator.allocate(layout, scope)?;

        Ok(HostAllocation {
            allocator: allocator.clone(),
            layout,
            scope,
        })
    }

    #[inline]
    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }
}

impl Drop for HostAllocation {
    #[inline]
    fn drop(&mut self) {
        self.allocator.free(self.layout, self.scope);
    }
}

/// Creates an empty `Vec` able to hold `capacity` elements without reallocating.
#[inline]
pub(crate) fn try_vec<T>(capacity: usize) -> Result<Vec<T>, OomError> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(capacity)?;

    Ok(vec)
}
