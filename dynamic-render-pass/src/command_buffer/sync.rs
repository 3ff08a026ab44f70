// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::rendering::SampleLocationsInfo;
use crate::{image::Image, render_pass::Dependency, NonExhaustive};
use ash::vk::{
    AccessFlags2, DependencyFlags, ImageAspectFlags, ImageLayout, PipelineStageFlags2,
};
use std::{ops::Range, sync::Arc};

/// Dependency info for a pipeline barrier.
#[derive(Clone, Debug)]
pub struct DependencyInfo<'a> {
    /// Flags to modify how the execution and memory dependencies are formed.
    ///
    /// The default value is empty.
    pub dependency_flags: DependencyFlags,

    /// Memory barriers for global operations and accesses, not limited to a single resource.
    ///
    /// The default value is empty.
    pub memory_barriers: &'a [MemoryBarrier],

    /// Memory barriers for individual images.
    ///
    /// The default value is empty.
    pub image_memory_barriers: &'a [ImageMemoryBarrier],

    pub _ne: NonExhaustive,
}

impl DependencyInfo<'_> {
    /// Returns `true` if `self` doesn't contain any barriers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.memory_barriers.is_empty() && self.image_memory_barriers.is_empty()
    }
}

impl Default for DependencyInfo<'_> {
    #[inline]
    fn default() -> Self {
        DependencyInfo {
            dependency_flags: DependencyFlags::empty(),
            memory_barriers: &[],
            image_memory_barriers: &[],
            _ne: NonExhaustive(()),
        }
    }
}

/// A memory barrier that is applied globally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryBarrier {
    /// The pipeline stages in the source scope to wait for.
    ///
    /// The default value is empty.
    pub src_stages: PipelineStageFlags2,

    /// The memory accesses in the source scope to make available and visible.
    ///
    /// The default value is empty.
    pub src_access: AccessFlags2,

    /// The pipeline stages in the destination scope that must wait for `src_stages`.
    ///
    /// The default value is empty.
    pub dst_stages: PipelineStageFlags2,

    /// The memory accesses in the destination scope that must wait for `src_access` to be made
    /// available and visible.
    ///
    /// The default value is empty.
    pub dst_access: AccessFlags2,

    pub _ne: NonExhaustive,
}

impl MemoryBarrier {
    /// Adds the scopes of `dependency` to the barrier.
    #[inline]
    pub fn add_dependency(&mut self, dependency: &Dependency) {
        self.src_stages |= dependency.src_stages;
        self.src_access |= dependency.src_access;
        self.dst_stages |= dependency.dst_stages;
        self.dst_access |= dependency.dst_access;
    }

    pub fn to_vk(&self) -> ash::vk::MemoryBarrier2<'static> {
        ash::vk::MemoryBarrier2::default()
            .src_stage_mask(self.src_stages)
            .src_access_mask(self.src_access)
            .dst_stage_mask(self.dst_stages)
            .dst_access_mask(self.dst_access)
    }
}

impl Default for MemoryBarrier {
    #[inline]
    fn default() -> Self {
        Self {
            src_stages: PipelineStageFlags2::empty(),
            src_access: AccessFlags2::empty(),
            dst_stages: PipelineStageFlags2::empty(),
            dst_access: AccessFlags2::empty(),
            _ne: NonExhaustive(()),
        }
    }
}

/// A memory barrier that is applied to a single image, and that changes its layout.
#[derive(Clone, Debug)]
pub struct ImageMemoryBarrier {
    pub src_stages: PipelineStageFlags2,
    pub src_access: AccessFlags2,
    pub dst_stages: PipelineStageFlags2,
    pub dst_access: AccessFlags2,

    /// The layout that the specified `subresource_range` of `image` is expected to be in when the
    /// source scope completes.
    pub old_layout: ImageLayout,

    /// The layout that the specified `subresource_range` of `image` will be transitioned to.
    pub new_layout: ImageLayout,

    /// The image to apply the barrier to.
    pub image: Arc<Image>,

    /// The subresource range of `image` to apply the barrier to.
    pub subresource_range: ImageSubresourceRange,

    /// The sample locations that were used to render the depth/stencil contents of `image`, if
    /// they were not the standard ones.
    pub sample_locations: Option<SampleLocationsInfo>,

    pub _ne: NonExhaustive,
}

impl ImageMemoryBarrier {
    /// Returns the Vulkan structure, without the sample locations extension.
    pub fn to_vk(&self) -> ash::vk::ImageMemoryBarrier2<'static> {
        ash::vk::ImageMemoryBarrier2::default()
            .src_stage_mask(self.src_stages)
            .src_access_mask(self.src_access)
            .dst_stage_mask(self.dst_stages)
            .dst_access_mask(self.dst_access)
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_queue_family_index(ash::vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(ash::vk::QUEUE_FAMILY_IGNORED)
            .image(self.image.handle())
            .subresource_range(self.subresource_range.to_vk())
    }
}

/// Specifies a range of mip levels and array layers of an image.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageSubresourceRange {
    pub aspects: ImageAspectFlags,
    pub mip_levels: Range<u32>,
    pub array_layers: Range<u32>,
}

impl ImageSubresourceRange {
    #[inline]
    pub fn to_vk(&self) -> ash::vk::ImageSubresourceRange {
        ash::vk::ImageSubresourceRange {
            aspect_mask: self.aspects,
            base_mip_level: self.mip_levels.start,
            level_count: self.mip_levels.end - self.mip_levels.start,
            base_array_layer: self.array_layers.start,
            layer_count: self.array_layers.end - self.array_layers.start,
        }
    }
}
