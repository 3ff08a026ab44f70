// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The implementation that render passes are created for.
//!
//! A [`Device`] bundles the limits that creation and recording have to respect, the optional
//! features that were enabled, and the [`HostAllocator`] that accounts for host memory.

use crate::{
    alloc::{DefaultHostAllocator, HostAllocator},
    NonExhaustive, MAX_COLOR_ATTACHMENTS,
};
use std::sync::Arc;

/// Limits and optional features of an implementation.
#[derive(Debug)]
pub struct Device {
    properties: Properties,
    enabled_features: Features,
    allocator: Arc<dyn HostAllocator>,
}

impl Device {
    /// Creates a new `Device`.
    #[inline]
    pub fn new(create_info: DeviceCreateInfo) -> Arc<Device> {
        let DeviceCreateInfo {
            properties,
            enabled_features,
            allocator,
            _ne: _,
        } = create_info;

        debug_assert!(properties.max_color_attachments >= 1);
        debug_assert!(properties.max_multiview_view_count >= 1);

        log::debug!(
            "creating device: max_color_attachments={} max_multiview_view_count={} \
             tile_buffer_budget={:?}",
            properties.max_color_attachments,
            properties.max_multiview_view_count,
            properties.tile_buffer_budget,
        );

        Arc::new(Device {
            properties,
            enabled_features,
            allocator,
        })
    }

    /// Returns the limits of the device.
    #[inline]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns the features that are enabled on the device.
    #[inline]
    pub fn enabled_features(&self) -> &Features {
        &self.enabled_features
    }

    /// Returns the allocator that is notified of host allocations.
    #[inline]
    pub fn allocator(&self) -> &Arc<dyn HostAllocator> {
        &self.allocator
    }
}

/// Parameters to create a new `Device`.
#[derive(Clone, Debug)]
pub struct DeviceCreateInfo {
    /// The limits of the device.
    ///
    /// The default value is `Properties::default()`.
    pub properties: Properties,

    /// The optional features to enable.
    ///
    /// The default value is `Features::default()`, with everything disabled.
    pub enabled_features: Features,

    /// The allocator that is told about host allocations.
    ///
    /// The default value is [`DefaultHostAllocator`].
    pub allocator: Arc<dyn HostAllocator>,

    pub _ne: NonExhaustive,
}

impl Default for DeviceCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            properties: Properties::default(),
            enabled_features: Features::default(),
            allocator: Arc::new(DefaultHostAllocator),
            _ne: NonExhaustive(()),
        }
    }
}

/// Limits of a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Properties {
    /// The maximum number of color attachments of a subpass.
    ///
    /// The default value is `8`.
    pub max_color_attachments: u32,

    /// The maximum number of views of a multiview subpass.
    ///
    /// The default value is `6`.
    pub max_multiview_view_count: u32,

    /// The number of bytes of on-chip tile memory available to one rendering session.
    ///
    /// If `Some`, consecutive subpasses of a render pass are merged into a single rendering session
    /// when their color attachments fit into this budget, assuming a 16x16 tile. If `None`,
    /// subpasses are never merged.
    ///
    /// The default value is `None`.
    pub tile_buffer_budget: Option<u32>,

    pub _ne: NonExhaustive,
}

impl Properties {
    /// Returns the number of color slots that can be used by a merged subpass.
    #[inline]
    pub(crate) fn mergeable_color_attachments(&self) -> u32 {
        self.max_color_attachments.min(MAX_COLOR_ATTACHMENTS as u32)
    }
}

impl Default for Properties {
    #[inline]
    fn default() -> Self {
        Self {
            max_color_attachments: 8,
            max_multiview_view_count: 6,
            tile_buffer_budget: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// Optional features of a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Features {
    pub multiview: bool,
    pub legacy_dithering: bool,
    pub multisampled_render_to_single_sampled: bool,
    pub fragment_shading_rate: bool,
    pub fragment_density_map: bool,
    pub _ne: NonExhaustive,
}

impl Default for Features {
    #[inline]
    fn default() -> Self {
        Self {
            multiview: false,
            legacy_dithering: false,
            multisampled_render_to_single_sampled: false,
            fragment_shading_rate: false,
            fragment_density_map: false,
            _ne: NonExhaustive(()),
        }
    }
}
