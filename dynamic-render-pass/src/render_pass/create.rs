// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{
    AttachmentUsage, Dependency, LoadOp, MergeState, RenderPass, RenderPassAttachment,
    ResolveMode, ResolveTarget, StoreOp, Subpass, SubpassAttachment, SubpassOwnership,
    SubpassSlot,
};
use crate::{
    alloc::try_vec, device::Device, format::FormatExt, last_bit, NonExhaustive, OomError,
};
use ash::vk::{
    AccessFlags, AccessFlags2, DependencyFlags, Format, ImageAspectFlags, ImageLayout,
    PipelineCreateFlags, PipelineStageFlags, PipelineStageFlags2, SampleCountFlags,
};
use log::debug;
use std::sync::Arc;

impl RenderPass {
    /// Creates a new `RenderPass`.
    ///
    /// Every attachment reference is normalized, feedback loops between input and output
    /// attachments are detected, and the last use of every attachment is computed for each view.
    /// If the device has a tile buffer, consecutive subpasses that can share a rendering session
    /// are merged.
    ///
    /// # Panics
    ///
    /// - In debug builds, panics if `create_info` is malformed: for example if an attachment
    ///   reference is out of range, or if some subpasses have a view mask and others don't.
    pub fn new(
        device: Arc<Device>,
        create_info: RenderPassCreateInfo,
    ) -> Result<Arc<RenderPass>, OomError> {
        Self::validate(&device, &create_info);

        let RenderPassCreateInfo {
            attachments,
            subpasses,
            dependencies,
            correlated_view_masks,
            fragment_density_map,
            _ne: _,
        } = create_info;

        // Built first so that an early return releases the blocks allocated so far.
        let mut render_pass = RenderPass {
            device,
            attachments: try_vec(attachments.len())?,
            subpass_blocks: try_vec(subpasses.len())?,
            subpass_slots: try_vec(subpasses.len())?,
            dependencies: try_vec(dependencies.len())?,
            correlated_view_masks,
            view_mask: 0,
            is_multiview: false,
            fragment_density_map,
        };

        render_pass
            .attachments
            .extend(attachments.iter().map(RenderPassAttachment::new));

        for description in &subpasses {
            let subpass = render_pass.create_subpass(&attachments, description)?;
            let mut block = try_vec(1)?;
            block.push(subpass);

            let block = render_pass.push_subpass_block(block)?;
            render_pass.subpass_slots.push(SubpassSlot {
                block,
                member: 0,
                ownership: SubpassOwnership::Owns,
            });
        }

        // Walk backwards so that the first subpass found for each view is its last use.
        for index in (0..render_pass.subpass_slots.len()).rev() {
            let slot = render_pass.subpass_slots[index];
            let subpass = &mut render_pass.subpass_blocks[slot.block].subpasses[slot.member];

            mark_last_use(subpass, &render_pass.attachments);
            accumulate_view_masks(subpass, &mut render_pass.attachments);
        }

        render_pass
            .dependencies
            .extend(dependencies.iter().map(Dependency::from));

        debug!(
            "created render pass: {} attachments, {} subpasses, {} dependencies, multiview: {}",
            render_pass.attachments.len(),
            render_pass.subpass_slots.len(),
            render_pass.dependencies.len(),
            render_pass.is_multiview,
        );

        if let Some(budget) = render_pass.device.properties().tile_buffer_budget {
            render_pass.merge_subpasses(budget)?;
        }

        Ok(Arc::new(render_pass))
    }

    fn validate(device: &Device, create_info: &RenderPassCreateInfo) {
        let properties = device.properties();
        let features = device.enabled_features();

        let RenderPassCreateInfo {
            attachments,
            subpasses,
            dependencies,
            correlated_view_masks: _,
            fragment_density_map,
            _ne: _,
        } = create_info;

        let attachment_count = attachments.len() as u32;
        let check_reference = |reference: &AttachmentReference| {
            debug_assert!(reference.attachment < attachment_count);
            debug_assert!(attachments[reference.attachment as usize]
                .format
                .aspects()
                .contains(reference.aspects));
        };

        // VUID-VkRenderPassCreateInfo2-subpassCount-arraylength
        debug_assert!(!subpasses.is_empty());

        // VUID-VkRenderPassCreateInfo2-viewMask-03058
        debug_assert!(
            subpasses.iter().all(|subpass| subpass.view_mask == 0)
                || subpasses.iter().all(|subpass| subpass.view_mask != 0)
        );

        for subpass in subpasses {
            debug_assert!(subpass.view_mask == 0 || features.multiview);
            debug_assert!(last_bit(subpass.view_mask) <= properties.max_multiview_view_count);
            debug_assert!(
                subpass.color_attachments.len() as u32 <= properties.max_color_attachments
            );

            // VUID-VkSubpassDescription2-pResolveAttachments-parameter
            debug_assert!(
                subpass.color_resolve_attachments.is_empty()
                    || subpass.color_resolve_attachments.len() == subpass.color_attachments.len()
            );

            for reference in subpass
                .input_attachments
                .iter()
                .chain(&subpass.color_attachments)
                .chain(&subpass.color_resolve_attachments)
                .flatten()
                .chain(&subpass.depth_stencil_attachment)
                .chain(&subpass.depth_stencil_resolve_attachment)
                .chain(&subpass.fragment_shading_rate_attachment)
            {
                check_reference(reference);
            }

            for &preserved in &subpass.preserve_attachments {
                debug_assert!(preserved < attachment_count);
            }

            debug_assert!(
                subpass.multisampled_render_to_single_sampled.is_none()
                    || features.multisampled_render_to_single_sampled
            );
            debug_assert!(
                subpass.fragment_shading_rate_attachment.is_none() || features.fragment_shading_rate
            );

            // VUID-VkSubpassDescriptionDepthStencilResolve-pDepthStencilResolveAttachment-03178
            debug_assert!(
                subpass.depth_stencil_resolve_attachment.is_none()
                    || subpass.depth_resolve_mode != ResolveMode::None
                    || subpass.stencil_resolve_mode != ResolveMode::None
            );
        }

        let subpass_count = subpasses.len() as u32;

        for dependency in dependencies {
            debug_assert!(dependency.src_subpass.map_or(true, |s| s < subpass_count));
            debug_assert!(dependency.dst_subpass.map_or(true, |s| s < subpass_count));
            debug_assert!(dependency.src_subpass.is_some() || dependency.dst_subpass.is_some());
        }

        if let Some(fragment_density_map) = fragment_density_map {
            debug_assert!(features.fragment_density_map);
            debug_assert!(fragment_density_map.attachment < attachment_count);
        }
    }

    fn create_subpass(
        &mut self,
        attachments: &[AttachmentDescription],
        description: &SubpassDescription,
    ) -> Result<Subpass, OomError> {
        let SubpassDescription {
            view_mask,
            ref input_attachments,
            ref color_attachments,
            ref color_resolve_attachments,
            ref depth_stencil_attachment,
            ref depth_stencil_resolve_attachment,
            depth_resolve_mode,
            stencil_resolve_mode,
            preserve_attachments: _,
            ref fragment_shading_rate_attachment,
            fragment_shading_rate_texel_size,
            legacy_dithering_enabled,
            multisampled_render_to_single_sampled,
            _ne: _,
        } = *description;

        if view_mask != 0 {
            self.is_multiview = true;
        }

        // Single-view subpasses render to view 0.
        let view_mask = if view_mask != 0 { view_mask } else { 1 };
        self.view_mask |= view_mask;

        let reference = |reference: Option<&AttachmentReference>, usage: AttachmentUsage| {
            reference.map_or(SubpassAttachment::unused(usage), |reference| {
                SubpassAttachment::new(attachments, reference, usage)
            })
        };

        let mut input = try_vec(input_attachments.len())?;
        input.extend(
            input_attachments
                .iter()
                .map(|r| reference(r.as_ref(), AttachmentUsage::Input)),
        );

        let mut color = try_vec(color_attachments.len())?;
        color.extend(
            color_attachments
                .iter()
                .map(|r| reference(r.as_ref(), AttachmentUsage::Color)),
        );

        let mut color_resolve = try_vec(color_resolve_attachments.len())?;
        color_resolve.extend(
            color_resolve_attachments
                .iter()
                .map(|r| reference(r.as_ref(), AttachmentUsage::TransferDst)),
        );

        for (index, (color, resolve)) in color.iter_mut().zip(&color_resolve).enumerate() {
            if resolve.attachment.is_some() {
                debug_assert!(color.attachment.is_some());
                color.resolve = Some(ResolveTarget::Color(index as u32));
            }
        }

        let mut depth_stencil = depth_stencil_attachment
            .as_ref()
            .map(|r| SubpassAttachment::new(attachments, r, AttachmentUsage::DepthStencil));
        let depth_stencil_resolve = depth_stencil_resolve_attachment
            .as_ref()
            .map(|r| SubpassAttachment::new(attachments, r, AttachmentUsage::TransferDst));

        if let (Some(depth_stencil), Some(_)) = (&mut depth_stencil, &depth_stencil_resolve) {
            depth_stencil.resolve = Some(ResolveTarget::DepthStencil);
        }

        let mut subpass = Subpass {
            view_mask,
            input_attachments: input,
            color_attachments: color,
            color_resolve_attachments: color_resolve,
            depth_stencil_attachment: depth_stencil,
            depth_stencil_resolve_attachment: depth_stencil_resolve,
            fragment_shading_rate_attachment: None,
            fragment_shading_rate_texel_size: [0; 2],
            depth_resolve_mode: ResolveMode::None,
            stencil_resolve_mode: ResolveMode::None,
            legacy_dithering_enabled: legacy_dithering_enabled
                && self.device.enabled_features().legacy_dithering,
            multisampled_render_to_single_sampled,
            pipeline_flags: PipelineCreateFlags::empty(),
            merged: MergeState::NotMerged,
            input_attachment_index_info: Default::default(),
            attachment_location_info: Default::default(),
            pipeline_rendering_info: Default::default(),
            inheritance_rendering_info: Default::default(),
            sample_count_info: Default::default(),
        };

        if subpass.depth_stencil_resolve_attachment.is_some()
            || multisampled_render_to_single_sampled.is_some()
        {
            subpass.depth_resolve_mode = depth_resolve_mode;
            subpass.stencil_resolve_mode = stencil_resolve_mode;
        }

        if let Some(fragment_shading_rate) = fragment_shading_rate_attachment {
            subpass.fragment_shading_rate_attachment = Some(SubpassAttachment::new(
                attachments,
                fragment_shading_rate,
                AttachmentUsage::FragmentShadingRate,
            ));
            subpass.fragment_shading_rate_texel_size = fragment_shading_rate_texel_size;
            subpass.pipeline_flags |=
                PipelineCreateFlags::RENDERING_FRAGMENT_SHADING_RATE_ATTACHMENT_KHR;
        }

        detect_feedback_loops(&mut subpass);

        subpass.init_identity_locations()?;
        subpass.init_rendering_info(&self.attachments)?;

        Ok(subpass)
    }
}

/// Puts attachments that are both read as input attachments and written by the same subpass in
/// the feedback-loop layout, and records the matching pipeline flags.
fn detect_feedback_loops(subpass: &mut Subpass) {
    let Subpass {
        input_attachments,
        color_attachments,
        depth_stencil_attachment,
        pipeline_flags,
        ..
    } = subpass;

    for input in input_attachments.iter_mut() {
        let Some(attachment) = input.attachment else {
            continue;
        };

        for color in color_attachments
            .iter_mut()
            .filter(|color| color.attachment == Some(attachment))
        {
            input.layout = ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT;
            color.layout = ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT;
            *pipeline_flags |= PipelineCreateFlags::COLOR_ATTACHMENT_FEEDBACK_LOOP_EXT;
        }

        let Some(depth_stencil) = depth_stencil_attachment
            .as_mut()
            .filter(|ds| ds.attachment == Some(attachment))
        else {
            continue;
        };

        if input.aspects.contains(ImageAspectFlags::DEPTH) {
            input.layout = ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT;
            depth_stencil.layout = ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT;
            *pipeline_flags |= PipelineCreateFlags::DEPTH_STENCIL_ATTACHMENT_FEEDBACK_LOOP_EXT;
        }

        if input.aspects.contains(ImageAspectFlags::STENCIL) {
            input.stencil_layout = ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT;
            depth_stencil.stencil_layout = ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT;
            *pipeline_flags |= PipelineCreateFlags::DEPTH_STENCIL_ATTACHMENT_FEEDBACK_LOOP_EXT;
        }
    }
}

/// Sets `last_subpass` of every used reference of `subpass` to the views of the subpass that no
/// later subpass has used the attachment with.
///
/// Must be called on the subpasses in reverse order, before `accumulate_view_masks` is called on
/// the same subpass, so that a subpass referencing an attachment several times gets the same mask
/// on every reference.
pub(super) fn mark_last_use(subpass: &mut Subpass, attachments: &[RenderPassAttachment]) {
    let view_mask = subpass.view_mask;

    for reference in subpass.attachments_mut() {
        if let Some(attachment) = reference.attachment {
            reference.last_subpass = view_mask & !attachments[attachment as usize].view_mask;
        }
    }
}

/// Adds the views of `subpass` to every attachment it references.
pub(super) fn accumulate_view_masks(subpass: &Subpass, attachments: &mut [RenderPassAttachment]) {
    for attachment in subpass.attachments().filter_map(|r| r.attachment) {
        attachments[attachment as usize].view_mask |= subpass.view_mask;
    }
}

impl RenderPassAttachment {
    fn new(description: &AttachmentDescription) -> Self {
        let &AttachmentDescription {
            format,
            samples,
            load_op,
            store_op,
            stencil_load_op,
            stencil_store_op,
            initial_layout,
            final_layout,
            stencil_initial_layout,
            stencil_final_layout,
            _ne: _,
        } = description;

        let stencil_layout = |explicit: Option<ImageLayout>, layout| {
            if format.has_stencil() {
                explicit.unwrap_or(layout)
            } else {
                ImageLayout::UNDEFINED
            }
        };

        RenderPassAttachment {
            format,
            aspects: format.aspects(),
            samples,
            view_mask: 0,
            load_op,
            store_op,
            stencil_load_op,
            stencil_store_op,
            initial_layout,
            final_layout,
            stencil_initial_layout: stencil_layout(stencil_initial_layout, initial_layout),
            stencil_final_layout: stencil_layout(stencil_final_layout, final_layout),
        }
    }
}

impl SubpassAttachment {
    fn new(
        attachments: &[AttachmentDescription],
        reference: &AttachmentReference,
        usage: AttachmentUsage,
    ) -> Self {
        let format = attachments[reference.attachment as usize].format;

        // Only input attachments may access a subset of the aspects.
        let aspects = match usage {
            AttachmentUsage::Input if !reference.aspects.is_empty() => reference.aspects,
            _ => format.aspects(),
        };

        let stencil_layout = if format.has_stencil() {
            reference.stencil_layout.unwrap_or(reference.layout)
        } else {
            ImageLayout::UNDEFINED
        };

        SubpassAttachment {
            attachment: Some(reference.attachment),
            aspects,
            usage,
            layout: reference.layout,
            stencil_layout,
            last_subpass: 0,
            resolve: None,
        }
    }
}

impl From<&SubpassDependency> for Dependency {
    fn from(dependency: &SubpassDependency) -> Self {
        let (src_stages, src_access, dst_stages, dst_access) = match dependency.memory_barrier {
            Some(barrier) => (
                barrier.src_stages,
                barrier.src_access,
                barrier.dst_stages,
                barrier.dst_access,
            ),
            None => (
                PipelineStageFlags2::from_raw(dependency.src_stages.as_raw() as u64),
                AccessFlags2::from_raw(dependency.src_access.as_raw() as u64),
                PipelineStageFlags2::from_raw(dependency.dst_stages.as_raw() as u64),
                AccessFlags2::from_raw(dependency.dst_access.as_raw() as u64),
            ),
        };

        Dependency {
            src_subpass: dependency.src_subpass,
            dst_subpass: dependency.dst_subpass,
            src_stages,
            dst_stages,
            src_access,
            dst_access,
            flags: dependency.dependency_flags,
            view_offset: dependency.view_offset,
        }
    }
}

/// Parameters to create a new `RenderPass`.
#[derive(Clone, Debug)]
pub struct RenderPassCreateInfo {
    /// The attachments available for the render pass.
    ///
    /// The default value is empty.
    pub attachments: Vec<AttachmentDescription>,

    /// The subpasses that make up this render pass.
    ///
    /// A render pass must contain at least one subpass.
    ///
    /// The default value is empty, which must be overridden.
    pub subpasses: Vec<SubpassDescription>,

    /// The dependencies between subpasses.
    ///
    /// The default value is empty.
    pub dependencies: Vec<SubpassDependency>,

    /// If multiview rendering is being used (the subpasses have a nonzero `view_mask`),
    /// this specifies sets of views that may be more efficient to render concurrently, for example
    /// because they show the same geometry from almost the same perspective. This is an
    /// optimization hint to the implementation, and does not affect the final result.
    ///
    /// The default value is empty.
    pub correlated_view_masks: Vec<u32>,

    /// An attachment that is used as fragment density map by every subpass.
    ///
    /// The default value is `None`.
    pub fragment_density_map: Option<FragmentDensityMapAttachment>,

    pub _ne: NonExhaustive,
}

impl Default for RenderPassCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            attachments: Vec::new(),
            subpasses: Vec::new(),
            dependencies: Vec::new(),
            correlated_view_masks: Vec::new(),
            fragment_density_map: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// Describes an attachment that will be used in a render pass.
#[derive(Clone, Copy, Debug)]
pub struct AttachmentDescription {
    /// The format of the image that is going to be bound.
    ///
    /// The default value is `Format::UNDEFINED`, which must be overridden.
    pub format: Format,

    /// The number of samples of the image that is going to be bound.
    ///
    /// The default value is `SampleCountFlags::TYPE_1`.
    pub samples: SampleCountFlags,

    /// What the implementation should do with the color or depth aspect of the image the first
    /// time it is used inside a render pass.
    ///
    /// The default value is [`LoadOp::DontCare`].
    pub load_op: LoadOp,

    /// What the implementation should do with the color or depth aspect of the image after the
    /// last time it is used inside a render pass.
    ///
    /// The default value is [`StoreOp::DontCare`].
    pub store_op: StoreOp,

    /// The equivalent of `load_op` for the stencil aspect of the image.
    ///
    /// The default value is [`LoadOp::DontCare`].
    pub stencil_load_op: LoadOp,

    /// The equivalent of `store_op` for the stencil aspect of the image.
    ///
    /// The default value is [`StoreOp::DontCare`].
    pub stencil_store_op: StoreOp,

    /// The layout that the image must be in at the start of the render pass.
    ///
    /// The default value is `ImageLayout::UNDEFINED`.
    pub initial_layout: ImageLayout,

    /// The layout that the image will be transitioned to at the end of the render pass.
    ///
    /// The default value is `ImageLayout::UNDEFINED`.
    pub final_layout: ImageLayout,

    /// The layout of the stencil aspect at the start of the render pass, if different from
    /// `initial_layout`. Ignored if the format has no stencil aspect.
    ///
    /// The default value is `None`.
    pub stencil_initial_layout: Option<ImageLayout>,

    /// The layout of the stencil aspect at the end of the render pass, if different from
    /// `final_layout`. Ignored if the format has no stencil aspect.
    ///
    /// The default value is `None`.
    pub stencil_final_layout: Option<ImageLayout>,

    pub _ne: NonExhaustive,
}

impl Default for AttachmentDescription {
    #[inline]
    fn default() -> Self {
        Self {
            format: Format::UNDEFINED,
            samples: SampleCountFlags::TYPE_1,
            load_op: LoadOp::DontCare,
            store_op: StoreOp::DontCare,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::UNDEFINED,
            final_layout: ImageLayout::UNDEFINED,
            stencil_initial_layout: None,
            stencil_final_layout: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// Describes one of the subpasses of a render pass.
///
/// A subpass can use zero or more input attachments, zero or more color attachments, zero or one
/// depth/stencil attachment, and zero or more resolve attachments. `None` entries in the lists
/// are unused slots.
#[derive(Clone, Debug)]
pub struct SubpassDescription {
    /// If not `0`, enables multiview rendering, and specifies the view indices that are rendered
    /// to in this subpass. Either all subpasses must have a non-zero view mask, or none of them.
    ///
    /// The default value is `0`.
    pub view_mask: u32,

    /// The attachments that will be used as input attachments in this subpass.
    ///
    /// The default value is empty.
    pub input_attachments: Vec<Option<AttachmentReference>>,

    /// The attachments that will be used as color attachments in this subpass.
    ///
    /// The default value is empty.
    pub color_attachments: Vec<Option<AttachmentReference>>,

    /// The attachments that the color attachments will be resolved into at the end of the
    /// subpass. Either empty, or as long as `color_attachments`.
    ///
    /// The default value is empty.
    pub color_resolve_attachments: Vec<Option<AttachmentReference>>,

    /// The single attachment that will be used as depth and/or stencil attachment in this
    /// subpass.
    ///
    /// The default value is `None`.
    pub depth_stencil_attachment: Option<AttachmentReference>,

    /// The attachment that the depth/stencil attachment will be resolved into at the end of the
    /// subpass.
    ///
    /// The default value is `None`.
    pub depth_stencil_resolve_attachment: Option<AttachmentReference>,

    /// How the depth aspect is resolved. Used if `depth_stencil_resolve_attachment` is set or
    /// if `multisampled_render_to_single_sampled` is enabled.
    ///
    /// The default value is [`ResolveMode::None`].
    pub depth_resolve_mode: ResolveMode,

    /// How the stencil aspect is resolved.
    ///
    /// The default value is [`ResolveMode::None`].
    pub stencil_resolve_mode: ResolveMode,

    /// The indices of attachments that are not used in this subpass, but whose contents must be
    /// preserved through it.
    ///
    /// The default value is empty.
    pub preserve_attachments: Vec<u32>,

    /// An attachment that controls the shading rate of the subpass.
    ///
    /// The default value is `None`.
    pub fragment_shading_rate_attachment: Option<AttachmentReference>,

    /// The size in pixels of the area covered by one texel of the fragment shading rate
    /// attachment.
    ///
    /// The default value is `[0; 2]`.
    pub fragment_shading_rate_texel_size: [u32; 2],

    /// Whether legacy dithering is enabled. Ignored if the `legacy_dithering` feature is not
    /// enabled on the device.
    ///
    /// The default value is `false`.
    pub legacy_dithering_enabled: bool,

    /// If `Some`, the single-sampled attachments of the subpass are rendered to with this number
    /// of samples, and resolved at the end of the subpass.
    ///
    /// The default value is `None`.
    pub multisampled_render_to_single_sampled: Option<SampleCountFlags>,

    pub _ne: NonExhaustive,
}

impl Default for SubpassDescription {
    #[inline]
    fn default() -> Self {
        Self {
            view_mask: 0,
            input_attachments: Vec::new(),
            color_attachments: Vec::new(),
            color_resolve_attachments: Vec::new(),
            depth_stencil_attachment: None,
            depth_stencil_resolve_attachment: None,
            depth_resolve_mode: ResolveMode::None,
            stencil_resolve_mode: ResolveMode::None,
            preserve_attachments: Vec::new(),
            fragment_shading_rate_attachment: None,
            fragment_shading_rate_texel_size: [0; 2],
            legacy_dithering_enabled: false,
            multisampled_render_to_single_sampled: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// A reference in a subpass description to a particular attachment of the render pass.
#[derive(Clone, Copy, Debug)]
pub struct AttachmentReference {
    /// The number of the attachment being referred to.
    ///
    /// The default value is `0`.
    pub attachment: u32,

    /// The image layout that the attachment should be transitioned to at the start of the
    /// subpass.
    ///
    /// The default value is `ImageLayout::UNDEFINED`.
    pub layout: ImageLayout,

    /// The layout of the stencil aspect, if different from `layout`. Ignored if the format has no
    /// stencil aspect.
    ///
    /// The default value is `None`.
    pub stencil_layout: Option<ImageLayout>,

    /// For input attachments, the aspects of the attachment that are read. Ignored for other
    /// references, and for input attachments if empty; the aspects of the format are used then.
    ///
    /// The default value is empty.
    pub aspects: ImageAspectFlags,

    pub _ne: NonExhaustive,
}

impl Default for AttachmentReference {
    #[inline]
    fn default() -> Self {
        Self {
            attachment: 0,
            layout: ImageLayout::UNDEFINED,
            stencil_layout: None,
            aspects: ImageAspectFlags::empty(),
            _ne: NonExhaustive(()),
        }
    }
}

/// A dependency between two subpasses of a render pass.
///
/// The implementation is allowed to change the order of the subpasses within a render pass, unless
/// you specify that there exists a dependency between two subpasses (ie. the result of one will be
/// used as the input of another one). Subpass dependencies work similar to pipeline barriers.
#[derive(Clone, Copy, Debug)]
pub struct SubpassDependency {
    /// The index of the subpass that writes the data, or `None` for the commands recorded before
    /// the render pass.
    ///
    /// The default value is `None`.
    pub src_subpass: Option<u32>,

    /// The index of the subpass that reads the data, or `None` for the commands recorded after
    /// the render pass.
    ///
    /// The default value is `None`.
    pub dst_subpass: Option<u32>,

    /// The pipeline stages that must be finished on the previous subpass before the destination
    /// subpass can start.
    ///
    /// The default value is empty.
    pub src_stages: PipelineStageFlags,

    /// The pipeline stages of the destination subpass that must wait for the source to be
    /// finished.
    ///
    /// The default value is empty.
    pub dst_stages: PipelineStageFlags,

    /// The way the source subpass accesses the attachments on which we depend.
    ///
    /// The default value is empty.
    pub src_access: AccessFlags,

    /// The way the destination subpass accesses the attachments on which we depend.
    ///
    /// The default value is empty.
    pub dst_access: AccessFlags,

    /// `BY_REGION` if the dependency is framebuffer-local, `VIEW_LOCAL` if each view of the
    /// destination only depends on one view of the source.
    ///
    /// The default value is empty.
    pub dependency_flags: DependencyFlags,

    /// For view-local dependencies, the offset from a destination view to the source view it
    /// depends on.
    ///
    /// The default value is `0`.
    pub view_offset: i32,

    /// If `Some`, replaces `src_stages`, `dst_stages`, `src_access` and `dst_access` with their
    /// extended equivalents.
    ///
    /// The default value is `None`.
    pub memory_barrier: Option<DependencyMemoryBarrier>,

    pub _ne: NonExhaustive,
}

impl Default for SubpassDependency {
    #[inline]
    fn default() -> Self {
        Self {
            src_subpass: None,
            dst_subpass: None,
            src_stages: PipelineStageFlags::empty(),
            dst_stages: PipelineStageFlags::empty(),
            src_access: AccessFlags::empty(),
            dst_access: AccessFlags::empty(),
            dependency_flags: DependencyFlags::empty(),
            view_offset: 0,
            memory_barrier: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// Extended stage and access masks of a subpass dependency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DependencyMemoryBarrier {
    pub src_stages: PipelineStageFlags2,
    pub src_access: AccessFlags2,
    pub dst_stages: PipelineStageFlags2,
    pub dst_access: AccessFlags2,
}

/// The fragment density map attachment of a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentDensityMapAttachment {
    /// The index of the attachment.
    pub attachment: u32,
    /// The layout of the attachment during the whole render pass.
    pub layout: ImageLayout,
}
