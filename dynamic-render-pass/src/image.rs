// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Images and image views, as far as render passes need to know about them.
//!
//! Images are not created here. An [`Image`] describes an image that was created elsewhere: its
//! handle, dimensions, format and creation flags. An [`ImageView`] selects a mip level and a range
//! of array layers of it, and is what framebuffers and rendering attachments refer to.

use crate::{format::FormatExt, NonExhaustive};
use ash::vk::{
    AccessFlags2, Format, ImageAspectFlags, ImageCreateFlags, ImageLayout, ImageType,
    ImageUsageFlags, PipelineStageFlags2, SampleCountFlags,
};
use std::sync::Arc;

/// Description of an image created outside of this crate.
#[derive(Debug)]
pub struct Image {
    handle: ash::vk::Image,
    image_type: ImageType,
    format: Format,
    samples: SampleCountFlags,
    extent: [u32; 3],
    array_layers: u32,
    flags: ImageCreateFlags,
    usage: ImageUsageFlags,
}

impl Image {
    /// Wraps an existing image.
    pub fn new(create_info: ImageCreateInfo) -> Arc<Image> {
        let ImageCreateInfo {
            handle,
            image_type,
            format,
            samples,
            extent,
            array_layers,
            flags,
            usage,
            _ne: _,
        } = create_info;

        debug_assert!(extent.iter().all(|&e| e != 0));
        debug_assert!(array_layers != 0);
        debug_assert!(image_type == ImageType::TYPE_3D || extent[2] == 1);

        Arc::new(Image {
            handle,
            image_type,
            format,
            samples,
            extent,
            array_layers,
            flags,
            usage,
        })
    }

    #[inline]
    pub fn handle(&self) -> ash::vk::Image {
        self.handle
    }

    #[inline]
    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn samples(&self) -> SampleCountFlags {
        self.samples
    }

    /// Returns the extent of the first mip level.
    #[inline]
    pub fn extent(&self) -> [u32; 3] {
        self.extent
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    #[inline]
    pub fn flags(&self) -> ImageCreateFlags {
        self.flags
    }

    #[inline]
    pub fn usage(&self) -> ImageUsageFlags {
        self.usage
    }
}

/// Parameters describing an [`Image`].
#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    /// The Vulkan handle of the image.
    ///
    /// The default value is a null handle.
    pub handle: ash::vk::Image,

    /// The dimensionality of the image.
    ///
    /// The default value is `ImageType::TYPE_2D`.
    pub image_type: ImageType,

    /// The format of the image.
    ///
    /// The default value is `Format::UNDEFINED`.
    pub format: Format,

    /// The number of samples per texel.
    ///
    /// The default value is `SampleCountFlags::TYPE_1`.
    pub samples: SampleCountFlags,

    /// The extent of the first mip level. The depth must be 1 unless the image is 3D.
    ///
    /// The default value is `[0, 0, 1]`, which must be overridden.
    pub extent: [u32; 3],

    /// The number of array layers.
    ///
    /// The default value is `1`.
    pub array_layers: u32,

    /// The flags the image was created with.
    ///
    /// The default value is empty.
    pub flags: ImageCreateFlags,

    /// The usages the image was created with.
    ///
    /// The default value is empty.
    pub usage: ImageUsageFlags,

    pub _ne: NonExhaustive,
}

impl Default for ImageCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            handle: ash::vk::Image::null(),
            image_type: ImageType::TYPE_2D,
            format: Format::UNDEFINED,
            samples: SampleCountFlags::TYPE_1,
            extent: [0, 0, 1],
            array_layers: 1,
            flags: ImageCreateFlags::empty(),
            usage: ImageUsageFlags::empty(),
            _ne: NonExhaustive(()),
        }
    }
}

/// A view of one mip level and a range of array layers of an [`Image`].
#[derive(Debug)]
pub struct ImageView {
    handle: ash::vk::ImageView,
    image: Arc<Image>,
    format: Format,
    aspects: ImageAspectFlags,
    base_mip_level: u32,
    base_array_layer: u32,
    layer_count: u32,
}

impl ImageView {
    /// Wraps an existing image view of `image`.
    pub fn new(image: Arc<Image>, create_info: ImageViewCreateInfo) -> Arc<ImageView> {
        let ImageViewCreateInfo {
            handle,
            format,
            aspects,
            base_mip_level,
            base_array_layer,
            layer_count,
            _ne: _,
        } = create_info;

        let format = format.unwrap_or(image.format());
        let aspects = if aspects.is_empty() {
            format.aspects()
        } else {
            aspects
        };
        // The slices of a 3D image are viewed as array layers.
        let array_layers = if image.image_type() == ImageType::TYPE_3D {
            image.extent()[2] >> base_mip_level
        } else {
            image.array_layers()
        };
        let layer_count = layer_count.unwrap_or(array_layers - base_array_layer);

        debug_assert!(base_array_layer + layer_count <= array_layers);

        Arc::new(ImageView {
            handle,
            image,
            format,
            aspects,
            base_mip_level,
            base_array_layer,
            layer_count,
        })
    }

    /// Wraps a view covering the whole of `image`.
    #[inline]
    pub fn new_default(image: Arc<Image>) -> Arc<ImageView> {
        Self::new(image, ImageViewCreateInfo::default())
    }

    #[inline]
    pub fn handle(&self) -> ash::vk::ImageView {
        self.handle
    }

    #[inline]
    pub fn image(&self) -> &Arc<Image> {
        &self.image
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn aspects(&self) -> ImageAspectFlags {
        self.aspects
    }

    #[inline]
    pub fn samples(&self) -> SampleCountFlags {
        self.image.samples()
    }

    #[inline]
    pub fn base_mip_level(&self) -> u32 {
        self.base_mip_level
    }

    #[inline]
    pub fn base_array_layer(&self) -> u32 {
        self.base_array_layer
    }

    #[inline]
    pub fn layer_count(&self) -> u32 {
        self.layer_count
    }

    /// Returns the extent of the viewed mip level.
    #[inline]
    pub fn extent(&self) -> [u32; 3] {
        self.image
            .extent()
            .map(|e| (e >> self.base_mip_level).max(1))
    }
}

/// Parameters describing an [`ImageView`].
#[derive(Clone, Debug)]
pub struct ImageViewCreateInfo {
    /// The Vulkan handle of the image view.
    ///
    /// The default value is a null handle.
    pub handle: ash::vk::ImageView,

    /// The format of the view. `None` means the format of the image.
    ///
    /// The default value is `None`.
    pub format: Option<Format>,

    /// The aspects of the image that are viewed. If empty, all the aspects of the format.
    ///
    /// The default value is empty.
    pub aspects: ImageAspectFlags,

    /// The mip level that is viewed.
    ///
    /// The default value is `0`.
    pub base_mip_level: u32,

    /// The first array layer that is viewed.
    ///
    /// The default value is `0`.
    pub base_array_layer: u32,

    /// The number of array layers that are viewed. `None` means all the remaining layers.
    ///
    /// The default value is `None`.
    pub layer_count: Option<u32>,

    pub _ne: NonExhaustive,
}

impl Default for ImageViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            handle: ash::vk::ImageView::null(),
            format: None,
            aspects: ImageAspectFlags::empty(),
            base_mip_level: 0,
            base_array_layer: 0,
            layer_count: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// Returns whether the `aspect` of an image in `layout` can only be read.
///
/// `aspect` must be a single aspect.
pub fn layout_is_read_only(layout: ImageLayout, aspect: ImageAspectFlags) -> bool {
    debug_assert_eq!(aspect.as_raw().count_ones(), 1);

    match layout {
        // Only used as the source of transitions.
        ImageLayout::UNDEFINED | ImageLayout::PREINITIALIZED => true,

        ImageLayout::GENERAL
        | ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        | ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        | ImageLayout::TRANSFER_DST_OPTIMAL
        | ImageLayout::SHARED_PRESENT_KHR
        | ImageLayout::FRAGMENT_SHADING_RATE_ATTACHMENT_OPTIMAL_KHR
        | ImageLayout::ATTACHMENT_OPTIMAL
        | ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT => false,

        ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        | ImageLayout::SHADER_READ_ONLY_OPTIMAL
        | ImageLayout::TRANSFER_SRC_OPTIMAL
        | ImageLayout::PRESENT_SRC_KHR
        | ImageLayout::FRAGMENT_DENSITY_MAP_OPTIMAL_EXT
        | ImageLayout::READ_ONLY_OPTIMAL
        | ImageLayout::DEPTH_READ_ONLY_OPTIMAL
        | ImageLayout::STENCIL_READ_ONLY_OPTIMAL => true,

        ImageLayout::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL
        | ImageLayout::STENCIL_ATTACHMENT_OPTIMAL => aspect == ImageAspectFlags::DEPTH,
        ImageLayout::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL
        | ImageLayout::DEPTH_ATTACHMENT_OPTIMAL => aspect == ImageAspectFlags::STENCIL,

        _ => false,
    }
}

/// Returns whether an image in `layout` can be read as an input attachment.
pub fn layout_supports_input_attachment(layout: ImageLayout) -> bool {
    matches!(
        layout,
        ImageLayout::GENERAL
            | ImageLayout::SHADER_READ_ONLY_OPTIMAL
            | ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            | ImageLayout::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL
            | ImageLayout::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL
            | ImageLayout::DEPTH_READ_ONLY_OPTIMAL
            | ImageLayout::STENCIL_READ_ONLY_OPTIMAL
            | ImageLayout::READ_ONLY_OPTIMAL
            | ImageLayout::SHARED_PRESENT_KHR
            | ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT
    )
}

/// Returns the stages and accesses that can touch the `aspects` of an attachment that is in
/// `layout` while a render pass is being executed.
///
/// Writable layouts include transfer writes, since the attachment might be the destination of a
/// resolve.
pub(crate) fn stage_access_for_layout(
    layout: ImageLayout,
    aspects: ImageAspectFlags,
) -> (PipelineStageFlags2, AccessFlags2) {
    let mut stages = PipelineStageFlags2::empty();
    let mut access = AccessFlags2::empty();

    if layout_supports_input_attachment(layout) {
        stages |= PipelineStageFlags2::FRAGMENT_SHADER;
        access |= AccessFlags2::INPUT_ATTACHMENT_READ;
    }

    if aspects.intersects(ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL) {
        stages |=
            PipelineStageFlags2::EARLY_FRAGMENT_TESTS | PipelineStageFlags2::LATE_FRAGMENT_TESTS;
        access |= AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ;

        let writable = [ImageAspectFlags::DEPTH, ImageAspectFlags::STENCIL]
            .into_iter()
            .filter(|&aspect| aspects.contains(aspect))
            .any(|aspect| !layout_is_read_only(layout, aspect));

        if writable {
            stages |= PipelineStageFlags2::ALL_TRANSFER;
            access |= AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE | AccessFlags2::TRANSFER_WRITE;
        }
    } else if !layout_is_read_only(layout, ImageAspectFlags::COLOR) {
        // There are no read-only color attachments.
        stages |= PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT | PipelineStageFlags2::ALL_TRANSFER;
        access |= AccessFlags2::COLOR_ATTACHMENT_READ
            | AccessFlags2::COLOR_ATTACHMENT_WRITE
            | AccessFlags2::TRANSFER_WRITE;
    }

    (stages, access)
}
