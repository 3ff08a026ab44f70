// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Render passes executed on top of dynamic rendering.
//!
//! # Brief summary
//!
//! - A [`Device`](crate::device::Device) describes the limits of the implementation (maximum
//!   number of color attachments and multiview views, size of the tile buffer) and which optional
//!   features are enabled. It also carries the [`HostAllocator`](crate::alloc::HostAllocator)
//!   that is told about every host allocation made on behalf of a render pass.
//!
//! - A [`RenderPass`](crate::render_pass::RenderPass) is created from a
//!   [`RenderPassCreateInfo`](crate::render_pass::RenderPassCreateInfo), or from the older
//!   [`LegacyRenderPassCreateInfo`](crate::render_pass::LegacyRenderPassCreateInfo). Creation
//!   normalizes every attachment reference, detects feedback loops, computes which views of each
//!   attachment are last used in which subpass and, when the device has a tile buffer, merges
//!   consecutive subpasses that can share one on-tile rendering session.
//!
//! - A [`CommandBufferBuilder`](crate::command_buffer::CommandBufferBuilder) records a render pass
//!   into anything that implements
//!   [`RenderingCommands`](crate::command_buffer::RenderingCommands). Each subpass becomes a
//!   `begin_rendering`/`end_rendering` pair, surrounded by the pipeline barriers that perform the
//!   layout transitions and the dependencies declared by the render pass.
//!
//! Raw Vulkan enums and flags come from [`ash`], which is re-exported.

pub use ash;
use std::{error::Error, fmt};


pub mod alloc;
pub mod command_buffer;
pub mod device;
pub mod format;
pub mod framebuffer;
pub mod image;
#[macro_use]
pub mod render_pass;

/// Value of an attachment index that refers to no attachment.
pub const ATTACHMENT_UNUSED: u32 = ash::vk::ATTACHMENT_UNUSED;

/// Value of a subpass index that refers to the commands outside the render pass.
pub const SUBPASS_EXTERNAL: u32 = ash::vk::SUBPASS_EXTERNAL;

/// Maximum number of color attachments a merged subpass can track.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// Maximum number of multiview views tracked per attachment while recording.
pub const MAX_MULTIVIEW_VIEW_COUNT: usize = 32;

/// Error type returned when running out of memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OomError {
    /// There is no memory available on the host (ie. the CPU, RAM, etc.).
    OutOfHostMemory,
    /// There is no memory available on the device (ie. video memory).
    OutOfDeviceMemory,
}

impl Error for OomError {}

impl fmt::Display for OomError {
    #[inline]
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            fmt,
            "{}",
            match *self {
                OomError::OutOfHostMemory => "no memory available on the host",
                OomError::OutOfDeviceMemory => "no memory available on the graphical device",
            }
        )
    }
}

impl From<std::collections::TryReserveError> for OomError {
    #[inline]
    fn from(_: std::collections::TryReserveError) -> OomError {
        OomError::OutOfHostMemory
    }
}

impl From<smallvec::CollectionAllocErr> for OomError {
    #[inline]
    fn from(_: smallvec::CollectionAllocErr) -> OomError {
        OomError::OutOfHostMemory
    }
}

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`. The effect is
/// similar to the standard Rust `#[non_exhaustive]` attribute, except that it does not prevent
/// update syntax from being used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NonExhaustive(pub(crate) ());

/// Returns a mask with the lowest `count` bits set.
#[inline]
pub(crate) fn bitfield_mask(count: u32) -> u32 {
    if count >= u32::BITS {
        u32::MAX
    } else {
        (1 << count) - 1
    }
}

/// Returns the index of the highest set bit, plus one. Zero for an empty mask.
#[inline]
pub(crate) fn last_bit(mask: u32) -> u32 {
    u32::BITS - mask.leading_zeros()
}

/// Iterates over the indices of the set bits of `mask`, lowest first.
#[inline]
pub(crate) fn bits(mut mask: u32) -> impl Iterator<Item = u32> {
    std::iter::from_fn(move || {
        if mask == 0 {
            None
        } else {
            let bit = mask.trailing_zeros();
            mask &= mask - 1;
            Some(bit)
        }
    })
}
