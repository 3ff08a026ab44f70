// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Recording of render passes into dynamic rendering commands.
//!
//! A [`CommandBufferBuilder`] wraps the object that actually records commands, which only needs
//! to know three commands, described by the [`RenderingCommands`] trait:
//!
//! - `begin_rendering`, which starts a dynamic rendering session described by a
//!   [`RenderingInfo`].
//! - `end_rendering`, which ends it.
//! - `pipeline_barrier`, described by a [`DependencyInfo`].
//!
//! While a render pass is being recorded, the builder keeps track of the layout of every view of
//! every attachment and of which views were already loaded, so that each attachment is cleared at
//! most once per view and ends up in its final layout.
//!
//! # Examples
//!
//! ```
//! use dynamic_render_pass::{
//!     ash::vk::{Format, ImageLayout},
//!     command_buffer::{
//!         CommandBufferBuilder, DependencyInfo, RenderPassBeginInfo, RenderingCommands,
//!         RenderingInfo,
//!     },
//!     device::{Device, DeviceCreateInfo},
//!     format::ClearValue,
//!     framebuffer::{Framebuffer, FramebufferCreateInfo},
//!     image::{Image, ImageCreateInfo, ImageView},
//!     single_pass_renderpass,
//! };
//!
//! #[derive(Default)]
//! struct Counter {
//!     sessions: u32,
//! }
//!
//! impl RenderingCommands for Counter {
//!     fn begin_rendering(&mut self, _rendering_info: &RenderingInfo) {
//!         self.sessions += 1;
//!     }
//!
//!     fn end_rendering(&mut self) {}
//!
//!     fn pipeline_barrier(&mut self, _dependency_info: &DependencyInfo<'_>) {}
//! }
//!
//! let device = Device::new(DeviceCreateInfo::default());
//! let render_pass = single_pass_renderpass!(
//!     device,
//!     attachments: {
//!         color: {
//!             load: Clear,
//!             store: Store,
//!             format: Format::R8G8B8A8_UNORM,
//!             samples: 1,
//!             final_layout: ImageLayout::PRESENT_SRC_KHR,
//!         }
//!     },
//!     pass: {
//!         color: [color],
//!         depth_stencil: {}
//!     }
//! )
//! .unwrap();
//!
//! let image = Image::new(ImageCreateInfo {
//!     format: Format::R8G8B8A8_UNORM,
//!     extent: [256, 256, 1],
//!     ..Default::default()
//! });
//! let framebuffer = Framebuffer::new(FramebufferCreateInfo {
//!     attachments: vec![ImageView::new_default(image)],
//!     ..Default::default()
//! });
//!
//! let mut builder = CommandBufferBuilder::new(Counter::default());
//! builder
//!     .begin_render_pass(RenderPassBeginInfo {
//!         clear_values: vec![Some(ClearValue::Float([0.0, 0.0, 1.0, 1.0]))],
//!         ..RenderPassBeginInfo::framebuffer(render_pass, framebuffer)
//!     })
//!     .unwrap()
//!     .end_render_pass()
//!     .unwrap();
//!
//! assert_eq!(builder.commands().sessions, 1);
//! ```

pub use self::{
    render_pass::{
        AttachmentState, AttachmentSampleLocations, CommandBufferBuilder, RenderPassBeginInfo,
        RenderPassError, RenderPassSampleLocations, RenderPassState, SubpassSampleLocations,
    },
    rendering::{
        CommandBufferInheritanceInfo, CommandBufferInheritanceRenderPassInfo, CommandBufferLevel,
        RenderingAttachmentInfo, RenderingAttachmentResolveInfo,
        RenderingFragmentDensityMapAttachmentInfo, RenderingFragmentShadingRateAttachmentInfo,
        RenderingInfo, SampleLocationsInfo,
    },
    sync::{DependencyInfo, ImageMemoryBarrier, ImageSubresourceRange, MemoryBarrier},
};

mod render_pass;
mod rendering;
mod sync;

/// The commands that render passes are recorded as.
///
/// The arguments only live for the duration of the call; implementations that need to keep them
/// must clone them.
pub trait RenderingCommands {
    /// Begins a dynamic rendering session.
    fn begin_rendering(&mut self, rendering_info: &RenderingInfo);

    /// Ends the current dynamic rendering session.
    fn end_rendering(&mut self);

    /// Inserts a pipeline barrier.
    ///
    /// Never called with an empty `dependency_info`.
    fn pipeline_barrier(&mut self, dependency_info: &DependencyInfo<'_>);
}
