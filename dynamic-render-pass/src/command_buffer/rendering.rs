// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use crate::{
    alloc::try_vec,
    format::{ClearValue, FormatExt},
    framebuffer::Framebuffer,
    image::ImageView,
    render_pass::{
        AttachmentLocationInfo, InheritanceRenderingInfo, LoadOp, RenderPass, ResolveMode, StoreOp,
    },
    NonExhaustive, OomError,
};
use ash::vk::{ImageLayout, RenderingFlags, SampleCountFlags};
use std::sync::Arc;

/// Parameters to begin a new dynamic rendering session.
#[derive(Clone, Debug)]
pub struct RenderingInfo {
    /// Additional properties of the rendering.
    ///
    /// The default value is empty.
    pub flags: RenderingFlags,

    /// The offset from the top left corner of the attachments that will be rendered to.
    ///
    /// The default value is `[0, 0]`.
    pub render_area_offset: [u32; 2],

    /// The size of the area that will be rendered to.
    ///
    /// The default value is `[0, 0]`.
    pub render_area_extent: [u32; 2],

    /// The number of layers of the attachments that will be rendered to. Must be 1 if
    /// `view_mask` is not 0.
    ///
    /// The default value is `1`.
    pub layer_count: u32,

    /// If not `0`, enables multiview rendering, and specifies the view indices that are rendered
    /// to.
    ///
    /// The default value is `0`.
    pub view_mask: u32,

    /// The color attachments to use for rendering. `None` leaves the slot unbound.
    ///
    /// The default value is empty.
    pub color_attachments: Vec<Option<RenderingAttachmentInfo>>,

    /// The depth attachment to use for rendering.
    ///
    /// The default value is `None`.
    pub depth_attachment: Option<RenderingAttachmentInfo>,

    /// The stencil attachment to use for rendering.
    ///
    /// The default value is `None`.
    pub stencil_attachment: Option<RenderingAttachmentInfo>,

    /// The attachment that controls the fragment shading rate.
    ///
    /// The default value is `None`.
    pub fragment_shading_rate_attachment: Option<RenderingFragmentShadingRateAttachmentInfo>,

    /// The attachment that controls the fragment density.
    ///
    /// The default value is `None`.
    pub fragment_density_map_attachment: Option<RenderingFragmentDensityMapAttachmentInfo>,

    /// Custom sample locations used when rendering to the depth/stencil attachment.
    ///
    /// The default value is `None`.
    pub sample_locations: Option<SampleLocationsInfo>,

    /// If `Some`, single-sampled attachments are rendered with this number of samples and
    /// resolved into at the end of the session.
    ///
    /// The default value is `None`.
    pub multisampled_render_to_single_sampled: Option<SampleCountFlags>,

    pub _ne: NonExhaustive,
}

impl Default for RenderingInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: RenderingFlags::empty(),
            render_area_offset: [0, 0],
            render_area_extent: [0, 0],
            layer_count: 1,
            view_mask: 0,
            color_attachments: Vec::new(),
            depth_attachment: None,
            stencil_attachment: None,
            fragment_shading_rate_attachment: None,
            fragment_density_map_attachment: None,
            sample_locations: None,
            multisampled_render_to_single_sampled: None,
            _ne: NonExhaustive(()),
        }
    }
}

impl RenderingInfo {
    /// Returns the rendering info that a secondary command buffer executed inside `subpass` of
    /// `render_pass` resumes.
    ///
    /// Every attachment is loaded and stored in the layout it has in the subpass, and the render
    /// area covers the whole framebuffer.
    ///
    /// Returns `None` if `framebuffer` is imageless, since the image views are not known until the
    /// render pass is begun.
    pub fn resume_from_subpass(
        render_pass: &RenderPass,
        subpass: u32,
        framebuffer: &Framebuffer,
    ) -> Result<Option<RenderingInfo>, OomError> {
        if framebuffer.is_imageless() {
            return Ok(None);
        }

        let views = framebuffer.attachments();
        debug_assert!(views.len() >= render_pass.attachments().len());

        let subpass = render_pass.subpass(subpass);
        let resume = |image_view: &Arc<ImageView>, image_layout| RenderingAttachmentInfo {
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
            ..RenderingAttachmentInfo::image_view(image_view.clone(), image_layout)
        };

        let mut color_attachments = try_vec(subpass.color_attachments().len())?;
        color_attachments.extend(subpass.color_attachments().iter().map(|color| {
            color
                .attachment
                .map(|attachment| resume(&views[attachment as usize], color.layout))
        }));

        let mut depth_attachment = None;
        let mut stencil_attachment = None;

        if let Some(depth_stencil) = subpass.depth_stencil_attachment() {
            if let Some(attachment) = depth_stencil.attachment {
                let image_view = &views[attachment as usize];
                let format = image_view.image().format();

                if format.has_depth() {
                    depth_attachment = Some(resume(image_view, depth_stencil.layout));
                }

                if format.has_stencil() {
                    stencil_attachment = Some(resume(image_view, depth_stencil.stencil_layout));
                }
            }
        }

        let fragment_shading_rate_attachment = subpass
            .fragment_shading_rate_attachment()
            .and_then(|fsr| fsr.attachment.map(|attachment| (attachment, fsr.layout)))
            .map(
                |(attachment, image_layout)| RenderingFragmentShadingRateAttachmentInfo {
                    image_view: views[attachment as usize].clone(),
                    image_layout,
                    texel_size: subpass.fragment_shading_rate_texel_size(),
                },
            );

        Ok(Some(RenderingInfo {
            flags: RenderingFlags::RESUMING,
            render_area_offset: [0, 0],
            render_area_extent: framebuffer.extent(),
            layer_count: framebuffer.layers(),
            view_mask: if render_pass.is_multiview() {
                subpass.view_mask()
            } else {
                0
            },
            color_attachments,
            depth_attachment,
            stencil_attachment,
            fragment_shading_rate_attachment,
            multisampled_render_to_single_sampled: subpass.multisampled_render_to_single_sampled(),
            ..Default::default()
        }))
    }
}

/// Parameters to specify properties of an attachment.
#[derive(Clone, Debug)]
pub struct RenderingAttachmentInfo {
    /// The image view to use as the attachment.
    ///
    /// There is no default value.
    pub image_view: Arc<ImageView>,

    /// The image layout that `image_view` should be in during rendering.
    ///
    /// The default value is [`ImageLayout::COLOR_ATTACHMENT_OPTIMAL`] if `image_view` has a color
    /// format, [`ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL`] if `image_view` has a
    /// depth/stencil format.
    pub image_layout: ImageLayout,

    /// If `Some`, the attachment is currently in this layout and is transitioned to
    /// `image_layout` when the rendering begins, instead of by a separate pipeline barrier.
    ///
    /// Only used when `load_op` is [`LoadOp::Clear`], since the previous contents are discarded.
    ///
    /// The default value is `None`.
    pub initial_layout: Option<ImageLayout>,

    /// The resolve operation that should be performed at the end of rendering.
    ///
    /// The default value is `None`.
    pub resolve_info: Option<RenderingAttachmentResolveInfo>,

    /// What the implementation should do with the attachment at the start of rendering.
    ///
    /// The default value is [`LoadOp::DontCare`].
    pub load_op: LoadOp,

    /// What the implementation should do with the attachment at the end of rendering.
    ///
    /// The default value is [`StoreOp::DontCare`].
    pub store_op: StoreOp,

    /// If `load_op` is [`LoadOp::Clear`], specifies the clear value that should be used for the
    /// attachment.
    ///
    /// The default value is `None`.
    pub clear_value: Option<ClearValue>,

    pub _ne: NonExhaustive,
}

impl RenderingAttachmentInfo {
    /// Returns a `RenderingAttachmentInfo` with the specified `image_view` and `image_layout`.
    #[inline]
    pub fn image_view(image_view: Arc<ImageView>, image_layout: ImageLayout) -> Self {
        Self {
            image_view,
            image_layout,
            initial_layout: None,
            resolve_info: None,
            load_op: LoadOp::DontCare,
            store_op: StoreOp::DontCare,
            clear_value: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// Parameters to specify the resolve behavior of an attachment.
#[derive(Clone, Debug)]
pub struct RenderingAttachmentResolveInfo {
    /// How the resolve operation should be performed.
    pub mode: ResolveMode,

    /// The image view that the result of the resolve operation should be written to.
    ///
    /// `None` when the attachment is single-sampled and rendered with
    /// multisampled-render-to-single-sampled, in which case it is resolved into itself.
    pub image_view: Option<Arc<ImageView>>,

    /// The image layout that `image_view` should be in during the resolve operation.
    pub image_layout: ImageLayout,
}

/// The fragment shading rate attachment of a rendering session.
#[derive(Clone, Debug)]
pub struct RenderingFragmentShadingRateAttachmentInfo {
    pub image_view: Arc<ImageView>,
    pub image_layout: ImageLayout,

    /// The size of the portion of the framebuffer that one texel of the attachment controls.
    pub texel_size: [u32; 2],
}

/// The fragment density map attachment of a rendering session. It is always loaded.
#[derive(Clone, Debug)]
pub struct RenderingFragmentDensityMapAttachmentInfo {
    pub image_view: Arc<ImageView>,
    pub image_layout: ImageLayout,
}

/// A set of custom sample locations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleLocationsInfo {
    /// The number of samples per pixel the locations are given for.
    pub sample_locations_per_pixel: SampleCountFlags,

    /// The size of the pixel grid the locations repeat over.
    pub sample_location_grid_size: [u32; 2],

    /// The locations, in the `[0, 1)` range of a pixel.
    pub sample_locations: Vec<[f32; 2]>,
}

/// The level of a command buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandBufferLevel {
    /// Can be submitted to a queue, and can execute secondary command buffers.
    Primary,

    /// Can only be executed by a primary command buffer.
    Secondary,
}

/// The context that a secondary command buffer is recorded for.
#[derive(Clone, Debug)]
pub struct CommandBufferInheritanceInfo {
    /// The level of the command buffer being recorded. Nothing is inherited by primary command
    /// buffers.
    ///
    /// The default value is [`CommandBufferLevel::Primary`].
    pub level: CommandBufferLevel,

    /// Whether the command buffer will be executed entirely inside a render pass or rendering
    /// session.
    ///
    /// The default value is `false`.
    pub render_pass_continue: bool,

    /// The subpass the command buffer will be executed in, if it is executed in a render pass.
    ///
    /// The default value is `None`.
    pub render_pass: Option<CommandBufferInheritanceRenderPassInfo>,

    /// The rendering session the command buffer will be executed in, if it is executed in a
    /// session begun with dynamic rendering. Ignored if `render_pass` is `Some`.
    ///
    /// The default value is `None`.
    pub rendering_info: Option<InheritanceRenderingInfo>,

    /// The color attachment locations of the rendering session. Ignored if `render_pass` is
    /// `Some`.
    ///
    /// The default value is `None`.
    pub attachment_location_info: Option<AttachmentLocationInfo>,

    pub _ne: NonExhaustive,
}

impl Default for CommandBufferInheritanceInfo {
    #[inline]
    fn default() -> Self {
        Self {
            level: CommandBufferLevel::Primary,
            render_pass_continue: false,
            render_pass: None,
            rendering_info: None,
            attachment_location_info: None,
            _ne: NonExhaustive(()),
        }
    }
}

impl CommandBufferInheritanceInfo {
    #[inline]
    fn inherits_rendering(&self) -> bool {
        self.level == CommandBufferLevel::Secondary && self.render_pass_continue
    }

    /// Returns the rendering state that the command buffer inherits.
    ///
    /// If the command buffer continues a render pass, this is the state of its subpass.
    pub fn rendering_info(&self) -> Option<&InheritanceRenderingInfo> {
        if !self.inherits_rendering() {
            return None;
        }

        match &self.render_pass {
            Some(render_pass) => Some(
                render_pass
                    .render_pass
                    .subpass(render_pass.subpass)
                    .inheritance_rendering_info(),
            ),
            None => self.rendering_info.as_ref(),
        }
    }

    /// Returns the color attachment locations that the command buffer inherits.
    ///
    /// Subpasses of a render pass always use their own locations, so this is only returned when
    /// the command buffer does not continue a render pass.
    pub fn attachment_location_info(&self) -> Option<&AttachmentLocationInfo> {
        if !self.inherits_rendering() || self.render_pass.is_some() {
            return None;
        }

        self.attachment_location_info.as_ref()
    }

    /// Returns the rendering session that the command buffer resumes, when it continues a render
    /// pass whose framebuffer is known.
    pub fn resume_rendering_info(&self) -> Result<Option<RenderingInfo>, OomError> {
        if !self.inherits_rendering() {
            return Ok(None);
        }

        match &self.render_pass {
            Some(CommandBufferInheritanceRenderPassInfo {
                render_pass,
                subpass,
                framebuffer: Some(framebuffer),
            }) => RenderingInfo::resume_from_subpass(render_pass, *subpass, framebuffer),
            _ => Ok(None),
        }
    }
}

/// The render pass context that a secondary command buffer is created for.
#[derive(Clone, Debug)]
pub struct CommandBufferInheritanceRenderPassInfo {
    /// The render pass that this secondary command buffer must be executed within.
    ///
    /// There is no default value.
    pub render_pass: Arc<RenderPass>,

    /// The index of the subpass in `render_pass`.
    ///
    /// There is no default value.
    pub subpass: u32,

    /// The framebuffer object that will be used when calling the command buffer.
    /// This parameter is optional and is an optimization hint for the implementation.
    ///
    /// The default value is `None`.
    pub framebuffer: Option<Arc<Framebuffer>>,
}

impl CommandBufferInheritanceRenderPassInfo {
    /// Returns a `CommandBufferInheritanceRenderPassInfo` with the specified `render_pass` and
    /// `subpass`.
    #[inline]
    pub fn subpass(render_pass: Arc<RenderPass>, subpass: u32) -> Self {
        Self {
            render_pass,
            subpass,
            framebuffer: None,
        }
    }
}
