// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{
    rendering::{
        RenderingAttachmentInfo, RenderingAttachmentResolveInfo,
        RenderingFragmentDensityMapAttachmentInfo, RenderingFragmentShadingRateAttachmentInfo,
        RenderingInfo, SampleLocationsInfo,
    },
    sync::{DependencyInfo, ImageMemoryBarrier, ImageSubresourceRange, MemoryBarrier},
    RenderingCommands,
};
use crate::{
    alloc::{try_vec, AllocationScope, HostAllocation},
    bits,
    format::{ClearValue, FormatExt},
    framebuffer::Framebuffer,
    image::{stage_access_for_layout, Image, ImageView},
    last_bit,
    render_pass::{LoadOp, RenderPass, ResolveMode, StoreOp, Subpass},
    NonExhaustive, OomError, MAX_MULTIVIEW_VIEW_COUNT,
};
use ash::vk::{
    AccessFlags2, DependencyFlags, Format, ImageAspectFlags, ImageCreateFlags, ImageLayout,
    ImageType, PipelineStageFlags2, RenderingFlags, SampleCountFlags,
};
use log::{debug, trace};
use smallvec::SmallVec;
use std::{error::Error, fmt, ops::RangeInclusive, slice, sync::Arc};

type ImageBarriers = SmallVec<[ImageMemoryBarrier; 8]>;

/// Records render passes as dynamic rendering commands into a [`RenderingCommands`].
///
/// Between [`begin_render_pass`] and [`end_render_pass`], the builder owns a [`RenderPassState`]
/// that tracks the layout of every view of every attachment.
///
/// [`begin_render_pass`]: Self::begin_render_pass
/// [`end_render_pass`]: Self::end_render_pass
#[derive(Debug)]
pub struct CommandBufferBuilder<C> {
    commands: C,
    render_pass_state: Option<RenderPassState>,
}

impl<C> CommandBufferBuilder<C> {
    /// Returns a new builder that records into `commands`.
    #[inline]
    pub fn new(commands: C) -> Self {
        CommandBufferBuilder {
            commands,
            render_pass_state: None,
        }
    }

    #[inline]
    pub fn commands(&self) -> &C {
        &self.commands
    }

    #[inline]
    pub fn commands_mut(&mut self) -> &mut C {
        &mut self.commands
    }

    /// Returns the recorded commands, dropping any render pass that was not ended.
    #[inline]
    pub fn into_commands(self) -> C {
        self.commands
    }

    /// Returns the state of the render pass being recorded, if any.
    #[inline]
    pub fn render_pass_state(&self) -> Option<&RenderPassState> {
        self.render_pass_state.as_ref()
    }

    /// Forgets the render pass being recorded, if any, and releases its state. Nothing is
    /// recorded.
    #[inline]
    pub fn reset(&mut self) {
        self.render_pass_state = None;
    }

    /// Returns the index of the attachment of the current render pass that `image_view` views
    /// the image of, along with the layout and stencil layout of the first view of the current
    /// subpass.
    ///
    /// Returns `None` outside of a render pass, or if the image is not an attachment.
    pub fn attachment_layout(
        &self,
        image_view: &ImageView,
    ) -> Option<(u32, ImageLayout, ImageLayout)> {
        self.render_pass_state
            .as_ref()
            .and_then(|state| state.attachment_layout(image_view.image()))
    }

    /// Overwrites the tracked layouts of the views of the current subpass of `attachment`.
    ///
    /// Commands recorded inside a render pass that change the layout of an attachment must call
    /// this, so that the layout is transitioned correctly afterwards.
    ///
    /// # Panics
    ///
    /// - Panics if `attachment` is not less than the number of attachments of the render pass.
    pub fn set_attachment_layout(
        &mut self,
        attachment: u32,
        layout: ImageLayout,
        stencil_layout: ImageLayout,
    ) -> Result<&mut Self, RenderPassError> {
        let state = self
            .render_pass_state
            .as_mut()
            .ok_or(RenderPassError::ForbiddenOutsideRenderPass)?;
        let view_mask = state.render_pass.subpass(state.subpass).view_mask();
        state.set_views_layout(attachment, view_mask, layout, stencil_layout);

        Ok(self)
    }
}

impl<C> CommandBufferBuilder<C>
where
    C: RenderingCommands,
{
    /// Begins a render pass and its first subpass.
    ///
    /// On error, nothing about the render pass is kept and the builder is outside of a render
    /// pass.
    pub fn begin_render_pass(
        &mut self,
        begin_info: RenderPassBeginInfo,
    ) -> Result<&mut Self, RenderPassError> {
        if self.render_pass_state.is_some() {
            return Err(RenderPassError::ForbiddenInsideRenderPass);
        }

        let mut state = RenderPassState::new(begin_info)?;

        debug!(
            "beginning render pass: attachments={} subpasses={} render_area={:?}+{:?}",
            state.attachments.len(),
            state.render_pass.subpass_count(),
            state.render_area_offset,
            state.render_area_extent,
        );

        state.begin_subpass(&mut self.commands)?;
        self.render_pass_state = Some(state);

        Ok(self)
    }

    /// Ends the current subpass and begins the next one.
    ///
    /// On error, the render pass is abandoned.
    pub fn next_subpass(&mut self) -> Result<&mut Self, RenderPassError> {
        let state = self
            .render_pass_state
            .as_mut()
            .ok_or(RenderPassError::ForbiddenOutsideRenderPass)?;

        if state.subpass + 1 >= state.render_pass.subpass_count() {
            return Err(RenderPassError::NoSubpassesRemaining {
                current_subpass: state.subpass,
            });
        }

        state.end_subpass(&mut self.commands);
        state.subpass += 1;

        if let Err(err) = state.begin_subpass(&mut self.commands) {
            self.render_pass_state = None;
            return Err(err.into());
        }

        Ok(self)
    }

    /// Ends the last subpass and the render pass, and transitions every attachment to its final
    /// layout.
    pub fn end_render_pass(&mut self) -> Result<&mut Self, RenderPassError> {
        let state = self
            .render_pass_state
            .as_mut()
            .ok_or(RenderPassError::ForbiddenOutsideRenderPass)?;

        let remaining = state.render_pass.subpass_count() - 1 - state.subpass;

        if remaining != 0 {
            return Err(RenderPassError::SubpassesRemaining {
                current_subpass: state.subpass,
                remaining,
            });
        }

        state.end_subpass(&mut self.commands);
        let result = state.transition_to_final_layouts(&mut self.commands);
        self.render_pass_state = None;

        debug!("ended render pass");

        result?;

        Ok(self)
    }
}

/// The state of a render pass being recorded.
#[derive(Debug)]
pub struct RenderPassState {
    render_pass: Arc<RenderPass>,
    framebuffer: Arc<Framebuffer>,
    subpass: u32,
    render_area_offset: [u32; 2],
    render_area_extent: [u32; 2],
    attachments: Vec<AttachmentState>,
    sample_locations: Option<RenderPassSampleLocations>,
    _allocation: HostAllocation,
}

impl RenderPassState {
    fn new(begin_info: RenderPassBeginInfo) -> Result<Self, RenderPassError> {
        let RenderPassBeginInfo {
            render_pass,
            framebuffer,
            render_area_offset,
            render_area_extent,
            clear_values,
            attachments: begin_attachments,
            sample_locations,
            _ne: _,
        } = begin_info;

        let attachment_count = render_pass.attachments().len();

        let image_views = if framebuffer.is_imageless() {
            if begin_attachments.len() != attachment_count {
                return Err(RenderPassError::AttachmentCountMismatch {
                    required: attachment_count as u32,
                    provided: begin_attachments.len() as u32,
                });
            }

            begin_attachments.as_slice()
        } else {
            debug_assert!(begin_attachments.is_empty());

            if framebuffer.attachments().len() < attachment_count {
                return Err(RenderPassError::AttachmentCountMismatch {
                    required: attachment_count as u32,
                    provided: framebuffer.attachments().len() as u32,
                });
            }

            framebuffer.attachments()
        };

        if clear_values.len() > attachment_count {
            return Err(RenderPassError::ClearValueCountMismatch {
                attachment_count: attachment_count as u32,
                clear_value_count: clear_values.len() as u32,
            });
        }

        let allocation = HostAllocation::array::<AttachmentState>(
            render_pass.device().allocator(),
            attachment_count,
            AllocationScope::Object,
        )?;
        let mut attachments = try_vec(attachment_count)?;

        for (index, (description, image_view)) in
            render_pass.attachments().iter().zip(image_views).enumerate()
        {
            debug_assert_eq!(image_view.format(), description.format);

            let view = AttachmentViewState {
                layout: description.initial_layout,
                stencil_layout: description.stencil_initial_layout,
                sample_locations: None,
            };

            attachments.push(AttachmentState {
                image_view: image_view.clone(),
                views: [view; MAX_MULTIVIEW_VIEW_COUNT],
                views_loaded: 0,
                clear_value: clear_values.get(index).copied().flatten(),
            });
        }

        if let Some(sample_locations) = &sample_locations {
            for (index, initial) in sample_locations
                .attachment_initial_sample_locations
                .iter()
                .enumerate()
            {
                let Some(state) = attachments.get_mut(initial.attachment as usize) else {
                    continue;
                };

                if state.is_sample_locations_compatible() {
                    for view in &mut state.views {
                        view.sample_locations = Some(SampleLocationsSource::Attachment(index));
                    }
                }
            }
        }

        Ok(RenderPassState {
            render_pass,
            framebuffer,
            subpass: 0,
            render_area_offset,
            render_area_extent,
            attachments,
            sample_locations,
            _allocation: allocation,
        })
    }

    #[inline]
    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    #[inline]
    pub fn framebuffer(&self) -> &Arc<Framebuffer> {
        &self.framebuffer
    }

    /// Returns the index of the subpass being recorded.
    #[inline]
    pub fn subpass_index(&self) -> u32 {
        self.subpass
    }

    /// Returns the state of each attachment of the render pass.
    #[inline]
    pub fn attachments(&self) -> &[AttachmentState] {
        &self.attachments
    }

    fn is_multiview(&self) -> bool {
        self.render_pass.is_multiview()
    }

    fn layer_count(&self) -> u32 {
        if self.is_multiview() {
            1
        } else {
            self.framebuffer.layers()
        }
    }

    fn rendering_view_mask(&self, view_mask: u32) -> u32 {
        if self.is_multiview() {
            view_mask
        } else {
            0
        }
    }

    fn attachment_layout(&self, image: &Arc<Image>) -> Option<(u32, ImageLayout, ImageLayout)> {
        let first_view = self
            .render_pass
            .subpass(self.subpass)
            .view_mask()
            .trailing_zeros() as usize;

        self.attachments
            .iter()
            .position(|state| Arc::ptr_eq(state.image_view.image(), image))
            .and_then(|index| {
                let view = self.attachments[index].views.get(first_view)?;
                Some((index as u32, view.layout, view.stencil_layout))
            })
    }

    fn set_views_layout(
        &mut self,
        attachment: u32,
        view_mask: u32,
        layout: ImageLayout,
        stencil_layout: ImageLayout,
    ) {
        let state = &mut self.attachments[attachment as usize];

        for view in bits(view_mask) {
            let view = &mut state.views[view as usize];
            view.layout = layout;
            view.stencil_layout = stencil_layout;
        }
    }

    fn begin_subpass(&mut self, commands: &mut impl RenderingCommands) -> Result<(), OomError> {
        let render_pass = self.render_pass.clone();
        let subpass = render_pass.subpass(self.subpass);

        if !subpass.merge_state().begins_rendering() {
            self.framebuffer_local_barrier(commands);
            return Ok(());
        }

        let mut rendering_info = RenderingInfo {
            render_area_offset: self.render_area_offset,
            render_area_extent: self.render_area_extent,
            layer_count: self.layer_count(),
            view_mask: self.rendering_view_mask(subpass.view_mask()),
            color_attachments: self.color_attachments(subpass)?,
            ..Default::default()
        };
        self.depth_stencil_attachments(subpass, &mut rendering_info);

        self.begin_subpass_barriers(commands)?;
        self.use_subpass_sample_locations(subpass);
        self.load_subpass_attachments(commands)?;

        if subpass.legacy_dithering_enabled() {
            rendering_info.flags |= RenderingFlags::ENABLE_LEGACY_DITHERING_EXT;
        }

        if let Some(fsr) = subpass.fragment_shading_rate_attachment() {
            if let Some(attachment) = fsr.attachment {
                self.load_attachment(
                    commands,
                    attachment,
                    subpass.view_mask(),
                    fsr.layout,
                    fsr.stencil_layout,
                )?;

                rendering_info.fragment_shading_rate_attachment =
                    Some(RenderingFragmentShadingRateAttachmentInfo {
                        image_view: self.attachments[attachment as usize].image_view.clone(),
                        image_layout: fsr.layout,
                        texel_size: subpass.fragment_shading_rate_texel_size(),
                    });
            }
        }

        if let Some(fdm) = render_pass.fragment_density_map() {
            rendering_info.fragment_density_map_attachment =
                Some(RenderingFragmentDensityMapAttachmentInfo {
                    image_view: self.attachments[fdm.attachment as usize].image_view.clone(),
                    image_layout: fdm.layout,
                });
        }

        rendering_info.multisampled_render_to_single_sampled =
            subpass.multisampled_render_to_single_sampled();

        trace!(
            "beginning rendering for subpasses {:?}: view_mask={:#b} layer_count={} \
             color_attachments={}",
            render_pass.merged_range(self.subpass),
            rendering_info.view_mask,
            rendering_info.layer_count,
            rendering_info.color_attachments.len(),
        );

        commands.begin_rendering(&rendering_info);

        Ok(())
    }

    /// Inside a merged rendering session, only the framebuffer-local dependencies between the
    /// subpasses of the session can be honored. The others were waited on before it began.
    fn framebuffer_local_barrier(&self, commands: &mut impl RenderingCommands) {
        let group = self.render_pass.merged_range(self.subpass);
        let mut memory_barrier = MemoryBarrier::default();
        let mut needed = false;

        for dependency in self.render_pass.dependencies() {
            if dependency.dst_subpass == Some(self.subpass)
                && dependency.src_subpass.is_some_and(|s| group.contains(&s))
                && dependency.flags.contains(DependencyFlags::BY_REGION)
            {
                memory_barrier.add_dependency(dependency);
                needed = true;
            }
        }

        if needed {
            pipeline_barrier(commands, DependencyFlags::BY_REGION, Some(&memory_barrier), &[]);
        }
    }

    fn color_attachments(
        &mut self,
        subpass: &Subpass,
    ) -> Result<Vec<Option<RenderingAttachmentInfo>>, OomError> {
        let render_pass = self.render_pass.clone();
        let view_mask = subpass.view_mask();
        let mut color_attachments = try_vec(subpass.color_attachments().len())?;

        for color in subpass.color_attachments() {
            let Some(attachment) = color.attachment else {
                color_attachments.push(None);
                continue;
            };

            let description = &render_pass.attachments()[attachment as usize];
            let state = &mut self.attachments[attachment as usize];
            let mut info =
                RenderingAttachmentInfo::image_view(state.image_view.clone(), color.layout);

            if state.views_loaded & view_mask == 0 {
                info.load_op = description.load_op;
                info.clear_value = state.clear_value;
                state.views_loaded |= view_mask;

                if let Some((initial_layout, _)) = self.clear_initial_layout(attachment, view_mask)
                {
                    if initial_layout != color.layout {
                        info.initial_layout = Some(initial_layout);
                        self.set_views_layout(
                            attachment,
                            view_mask,
                            color.layout,
                            ImageLayout::UNDEFINED,
                        );
                    }
                }
            } else {
                info.load_op = LoadOp::Load;
            }

            // Only the views that are all at their last use can drop their contents.
            info.store_op = if view_mask & !color.last_subpass == 0 {
                description.store_op
            } else {
                StoreOp::Store
            };

            let resolve = color
                .resolve
                .and_then(|target| subpass.resolve_attachment(target))
                .and_then(|resolve| resolve.attachment.map(|index| (index, resolve.layout)));

            if let Some((resolve_attachment, image_layout)) = resolve {
                let resolve_state = &mut self.attachments[resolve_attachment as usize];
                resolve_state.views_loaded |= view_mask;

                info.resolve_info = Some(RenderingAttachmentResolveInfo {
                    mode: color_resolve_mode(resolve_state.image_view.format()),
                    image_view: Some(resolve_state.image_view.clone()),
                    image_layout,
                });
            } else if subpass.multisampled_render_to_single_sampled().is_some()
                && description.samples == SampleCountFlags::TYPE_1
            {
                info.resolve_info = Some(RenderingAttachmentResolveInfo {
                    mode: color_resolve_mode(description.format),
                    image_view: None,
                    image_layout: ImageLayout::UNDEFINED,
                });
            }

            color_attachments.push(Some(info));
        }

        Ok(color_attachments)
    }

    fn depth_stencil_attachments(&mut self, subpass: &Subpass, rendering_info: &mut RenderingInfo) {
        let Some(depth_stencil) = subpass.depth_stencil_attachment() else {
            return;
        };
        let Some(attachment) = depth_stencil.attachment else {
            return;
        };

        let render_pass = self.render_pass.clone();
        let description = &render_pass.attachments()[attachment as usize];
        let view_mask = subpass.view_mask();
        let image_view = self.attachments[attachment as usize].image_view.clone();

        let mut depth = description
            .aspects
            .contains(ImageAspectFlags::DEPTH)
            .then(|| RenderingAttachmentInfo::image_view(image_view.clone(), depth_stencil.layout));
        let mut stencil = description
            .aspects
            .contains(ImageAspectFlags::STENCIL)
            .then(|| {
                RenderingAttachmentInfo::image_view(
                    image_view.clone(),
                    depth_stencil.stencil_layout,
                )
            });

        let state = &mut self.attachments[attachment as usize];

        if state.views_loaded & view_mask == 0 {
            let clear_value = state.clear_value;
            state.views_loaded |= view_mask;

            if let Some(depth) = &mut depth {
                depth.load_op = description.load_op;
                depth.clear_value = clear_value;
            }

            if let Some(stencil) = &mut stencil {
                stencil.load_op = description.stencil_load_op;
                stencil.clear_value = clear_value;
            }

            if let Some((initial_layout, initial_stencil_layout)) =
                self.clear_initial_layout(attachment, view_mask)
            {
                if let Some(depth) = depth.as_mut().filter(|d| d.image_layout != initial_layout) {
                    depth.initial_layout = Some(initial_layout);
                }

                if let Some(stencil) = stencil
                    .as_mut()
                    .filter(|s| s.image_layout != initial_stencil_layout)
                {
                    stencil.initial_layout = Some(initial_stencil_layout);
                }

                self.set_views_layout(
                    attachment,
                    view_mask,
                    depth_stencil.layout,
                    depth_stencil.stencil_layout,
                );
            }
        } else {
            for info in depth.iter_mut().chain(stencil.iter_mut()) {
                info.load_op = LoadOp::Load;
            }
        }

        let last_use = view_mask & !depth_stencil.last_subpass == 0;

        if let Some(depth) = &mut depth {
            depth.store_op = if last_use {
                description.store_op
            } else {
                StoreOp::Store
            };
        }

        if let Some(stencil) = &mut stencil {
            stencil.store_op = if last_use {
                description.stencil_store_op
            } else {
                StoreOp::Store
            };
        }

        if self.attachments[attachment as usize].is_sample_locations_compatible() {
            rendering_info.sample_locations = self
                .subpass_sample_locations()
                .and_then(|index| {
                    self.sample_locations_info(SampleLocationsSource::Subpass(index))
                })
                .cloned();
        }

        let self_resolve = subpass.multisampled_render_to_single_sampled().is_some()
            && description.samples == SampleCountFlags::TYPE_1;

        if depth_stencil.resolve.is_some() || self_resolve {
            let resolve = depth_stencil
                .resolve
                .and_then(|target| subpass.resolve_attachment(target))
                .and_then(|resolve| resolve.attachment.map(|index| (index, resolve)));
            let resolve_attachment = resolve.map_or(attachment, |(index, _)| index);
            let resolve_aspects = render_pass.attachments()[resolve_attachment as usize].aspects;
            let resolve_image_view = resolve
                .map(|(index, _)| self.attachments[index as usize].image_view.clone());
            let mut resolved_aspects = ImageAspectFlags::empty();

            let depth_mode = subpass.depth_resolve_mode();

            if resolve_aspects.contains(ImageAspectFlags::DEPTH) && depth_mode != ResolveMode::None
            {
                if let Some(depth) = &mut depth {
                    depth.resolve_info = Some(RenderingAttachmentResolveInfo {
                        mode: depth_mode,
                        image_view: resolve_image_view.clone(),
                        image_layout: resolve
                            .map_or(ImageLayout::UNDEFINED, |(_, resolve)| resolve.layout),
                    });
                }

                resolved_aspects |= ImageAspectFlags::DEPTH;
            }

            let stencil_mode = subpass.stencil_resolve_mode();

            if resolve_aspects.contains(ImageAspectFlags::STENCIL)
                && stencil_mode != ResolveMode::None
            {
                if let Some(stencil) = &mut stencil {
                    stencil.resolve_info = Some(RenderingAttachmentResolveInfo {
                        mode: stencil_mode,
                        image_view: resolve_image_view,
                        image_layout: resolve
                            .map_or(ImageLayout::UNDEFINED, |(_, resolve)| resolve.stencil_layout),
                    });
                }

                resolved_aspects |= ImageAspectFlags::STENCIL;
            }

            // A resolve that writes only some of the aspects does not load the attachment.
            if resolved_aspects == resolve_aspects {
                self.attachments[resolve_attachment as usize].views_loaded |= view_mask;
            }
        }

        rendering_info.depth_attachment = depth;
        rendering_info.stencil_attachment = stencil;
    }

    /// Returns the index of the sample locations of the current subpass, if there are custom ones.
    fn subpass_sample_locations(&self) -> Option<usize> {
        self.sample_locations.as_ref().and_then(|sample_locations| {
            sample_locations
                .post_subpass_sample_locations
                .iter()
                .position(|locations| locations.subpass == self.subpass)
        })
    }

    fn sample_locations_info(&self, source: SampleLocationsSource) -> Option<&SampleLocationsInfo> {
        self.sample_locations
            .as_ref()
            .map(|sample_locations| sample_locations.get(source))
    }

    /// The depth/stencil attachment is transitioned with the sample locations it was last
    /// rendered with.
    fn use_subpass_sample_locations(&mut self, subpass: &Subpass) {
        let Some(attachment) = subpass
            .depth_stencil_attachment()
            .and_then(|depth_stencil| depth_stencil.attachment)
        else {
            return;
        };

        if self.sample_locations.is_none() {
            return;
        }

        let source = self
            .subpass_sample_locations()
            .map(SampleLocationsSource::Subpass);
        let state = &mut self.attachments[attachment as usize];

        if state.is_sample_locations_compatible() {
            for view in bits(subpass.view_mask()) {
                state.views[view as usize].sample_locations = source;
            }
        }
    }

    /// Returns the layout and stencil layout that the views of `attachment` in `view_mask` are
    /// in, if they can be transitioned by the rendering session itself when it clears them.
    fn clear_initial_layout(
        &self,
        attachment: u32,
        view_mask: u32,
    ) -> Option<(ImageLayout, ImageLayout)> {
        let description = &self.render_pass.attachments()[attachment as usize];
        let state = &self.attachments[attachment as usize];
        let image_view = &state.image_view;
        let has_stencil = description.aspects.contains(ImageAspectFlags::STENCIL);
        let has_other = !(description.aspects & !ImageAspectFlags::STENCIL).is_empty();

        if has_other && description.load_op != LoadOp::Clear {
            return None;
        }

        if has_stencil && description.stencil_load_op != LoadOp::Clear {
            return None;
        }

        let [width, height, _] = image_view.extent();

        if self.render_area_offset != [0, 0] || self.render_area_extent != [width, height] {
            return None;
        }

        let is_3d = image_view.image().image_type() == ImageType::TYPE_3D;

        if is_3d {
            if image_view.base_array_layer() != 0 {
                return None;
            }

            if self.is_multiview() {
                // The views must be exactly the slices of the view.
                let next = view_mask.wrapping_add(1);

                if next & next.wrapping_sub(1) != 0
                    || last_bit(view_mask) != image_view.layer_count()
                {
                    return None;
                }
            } else if self.framebuffer.layers() != image_view.layer_count() {
                return None;
            }
        }

        let view_mask = if is_3d { 1 } else { view_mask };
        let mut layout = None;
        let mut stencil_layout = None;

        for view in bits(view_mask) {
            let view = &state.views[view as usize];

            if has_other {
                match layout {
                    Some(layout) if layout != view.layout => return None,
                    _ => layout = Some(view.layout),
                }
            }

            if has_stencil {
                match stencil_layout {
                    Some(layout) if layout != view.stencil_layout => return None,
                    _ => stencil_layout = Some(view.stencil_layout),
                }
            }
        }

        Some((
            layout.unwrap_or(ImageLayout::UNDEFINED),
            stencil_layout.unwrap_or(ImageLayout::UNDEFINED),
        ))
    }

    /// Emits the barrier that precedes the rendering session of the subpasses merged with the
    /// current one.
    fn begin_subpass_barriers(
        &mut self,
        commands: &mut impl RenderingCommands,
    ) -> Result<(), OomError> {
        let render_pass = self.render_pass.clone();
        let first = self.subpass;
        let group = render_pass.merged_range(first);
        let last = *group.end();

        let mut memory_barrier = MemoryBarrier::default();
        let mut needs_memory_barrier = false;

        for dependency in render_pass.dependencies() {
            let Some(dst_subpass) = dependency.dst_subpass else {
                continue;
            };

            if !group.contains(&dst_subpass) {
                continue;
            }

            // Dependencies between the subpasses of the session are honored inside it.
            if dst_subpass > first && dependency.src_subpass.is_some_and(|s| group.contains(&s)) {
                continue;
            }

            if dependency.flags.contains(DependencyFlags::VIEW_LOCAL) {
                debug_assert!(dependency.src_subpass.is_some());

                if let Some(src_subpass) = dependency.src_subpass {
                    let dst_view_mask = render_pass.subpass(dst_subpass).view_mask();
                    let offset = dependency.view_offset;
                    let src_view_mask = if offset >= 0 {
                        dst_view_mask.checked_shl(offset as u32).unwrap_or(0)
                    } else {
                        dst_view_mask.checked_shr(offset.unsigned_abs()).unwrap_or(0)
                    };

                    if render_pass.subpass(src_subpass).view_mask() & src_view_mask == 0 {
                        continue;
                    }
                }
            }

            memory_barrier.add_dependency(dependency);
            needs_memory_barrier = true;
        }

        // Without an explicit dependency from outside the render pass, an implicit one exists.
        if first == 0
            && !render_pass.dependencies().iter().any(|dependency| {
                dependency.src_subpass.is_none()
                    && dependency.dst_subpass.is_some_and(|d| group.contains(&d))
            })
        {
            memory_barrier.dst_stages |= PipelineStageFlags2::ALL_COMMANDS;
            memory_barrier.dst_access |= AccessFlags2::INPUT_ATTACHMENT_READ
                | AccessFlags2::COLOR_ATTACHMENT_READ
                | AccessFlags2::COLOR_ATTACHMENT_WRITE
                | AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                | AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE;
            needs_memory_barrier = true;
        }

        let mut image_barriers = ImageBarriers::new();
        image_barriers.try_reserve_exact(self.group_barrier_count(group.clone()))?;

        for index in first..=last {
            let subpass = render_pass.subpass(index);

            for reference in subpass.attachments() {
                if let Some(attachment) = reference.attachment {
                    self.transition_attachment(
                        attachment,
                        subpass.view_mask(),
                        reference.layout,
                        reference.stencil_layout,
                        &mut image_barriers,
                    );
                }
            }

            if let Some(fdm) = render_pass.fragment_density_map() {
                self.transition_attachment(
                    fdm.attachment,
                    subpass.view_mask(),
                    fdm.layout,
                    ImageLayout::UNDEFINED,
                    &mut image_barriers,
                );
            }
        }

        pipeline_barrier(
            commands,
            DependencyFlags::empty(),
            needs_memory_barrier.then_some(&memory_barrier),
            &image_barriers,
        );

        Ok(())
    }

    /// Returns an upper bound of the number of image barriers needed to transition the
    /// attachments of the subpasses in `group`.
    fn group_barrier_count(&self, group: RangeInclusive<u32>) -> usize {
        let attachments = self.render_pass.attachments();
        let fdm = self.render_pass.fragment_density_map().is_some() as usize;

        group
            .map(|index| {
                let subpass = self.render_pass.subpass(index);
                let view_count = subpass.view_mask().count_ones() as usize;
                let aspect_count: usize = subpass
                    .attachments()
                    .filter_map(|reference| reference.attachment)
                    .map(|a| attachments[a as usize].aspects.as_raw().count_ones() as usize)
                    .sum();

                view_count * (aspect_count + fdm)
            })
            .sum()
    }

    /// Records the barriers that bring the views of `attachment` in `view_mask` into `layout` and
    /// `stencil_layout`.
    fn transition_attachment(
        &mut self,
        attachment: u32,
        view_mask: u32,
        layout: ImageLayout,
        stencil_layout: ImageLayout,
        barriers: &mut ImageBarriers,
    ) {
        let Self {
            render_pass,
            framebuffer,
            attachments,
            sample_locations,
            ..
        } = self;

        let aspects = render_pass.attachments()[attachment as usize].aspects;
        let state = &mut attachments[attachment as usize];
        let image_view = &state.image_view;
        let is_3d = image_view.image().image_type() == ImageType::TYPE_3D;

        // All the slices of a 3D image are one view.
        let view_mask = if is_3d { 1 } else { view_mask };

        for view in bits(view_mask) {
            let view_state = &mut state.views[view as usize];

            if view_state.layout == layout && view_state.stencil_layout == stencil_layout {
                continue;
            }

            let array_layers = if is_3d {
                0..image_view.extent()[2]
            } else if render_pass.is_multiview() {
                let layer = image_view.base_array_layer() + view;
                layer..layer + 1
            } else {
                let base = image_view.base_array_layer();
                base..base + framebuffer.layers()
            };
            let base_mip_level = image_view.base_mip_level();

            transition_image_range(
                image_view.image(),
                ImageSubresourceRange {
                    aspects,
                    mip_levels: base_mip_level..base_mip_level + 1,
                    array_layers,
                },
                [view_state.layout, layout],
                [view_state.stencil_layout, stencil_layout],
                view_state
                    .sample_locations
                    .zip(sample_locations.as_ref())
                    .map(|(source, locations)| locations.get(source)),
                barriers,
            );

            view_state.layout = layout;
            view_state.stencil_layout = stencil_layout;
        }
    }

    fn load_subpass_attachments(
        &mut self,
        commands: &mut impl RenderingCommands,
    ) -> Result<(), OomError> {
        let render_pass = self.render_pass.clone();

        for index in render_pass.merged_range(self.subpass) {
            let subpass = render_pass.subpass(index);

            for reference in subpass.attachments() {
                if let Some(attachment) = reference.attachment {
                    self.load_attachment(
                        commands,
                        attachment,
                        subpass.view_mask(),
                        reference.layout,
                        reference.stencil_layout,
                    )?;
                }
            }
        }

        Ok(())
    }

    /// Clears the views of `attachment` in `view_mask` that were not loaded yet, with a rendering
    /// session of its own.
    fn load_attachment(
        &mut self,
        commands: &mut impl RenderingCommands,
        attachment: u32,
        view_mask: u32,
        layout: ImageLayout,
        stencil_layout: ImageLayout,
    ) -> Result<(), OomError> {
        let render_pass = self.render_pass.clone();
        let description = &render_pass.attachments()[attachment as usize];
        let state = &mut self.attachments[attachment as usize];

        let view_mask = view_mask & !state.views_loaded;

        if view_mask == 0 {
            return Ok(());
        }

        state.views_loaded |= view_mask;

        let aspects = description.aspects;
        let clears = description
            .load_ops(aspects)
            .any(|load_op| load_op == LoadOp::Clear);

        if !clears {
            return Ok(());
        }

        let image_view = state.image_view.clone();
        let clear_value = state.clear_value;
        let mut rendering_info = RenderingInfo {
            render_area_offset: self.render_area_offset,
            render_area_extent: self.render_area_extent,
            layer_count: self.layer_count(),
            view_mask: self.rendering_view_mask(view_mask),
            ..Default::default()
        };

        let load = |image_layout, load_op| RenderingAttachmentInfo {
            load_op,
            store_op: StoreOp::Store,
            clear_value,
            ..RenderingAttachmentInfo::image_view(image_view.clone(), image_layout)
        };

        if aspects.intersects(ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL) {
            if aspects.contains(ImageAspectFlags::DEPTH) {
                rendering_info.depth_attachment = Some(load(layout, description.load_op));
            }

            if aspects.contains(ImageAspectFlags::STENCIL) {
                rendering_info.stencil_attachment =
                    Some(load(stencil_layout, description.stencil_load_op));
            }
        } else {
            let mut color_attachments = try_vec(1)?;
            color_attachments.push(Some(load(layout, description.load_op)));
            rendering_info.color_attachments = color_attachments;
        }

        trace!(
            "loading attachment {} in its own rendering session: view_mask={:#b}",
            attachment,
            view_mask,
        );

        commands.begin_rendering(&rendering_info);
        commands.end_rendering();

        Ok(())
    }

    fn end_subpass(&mut self, commands: &mut impl RenderingCommands) {
        let render_pass = self.render_pass.clone();
        let subpass = render_pass.subpass(self.subpass);

        if !subpass.merge_state().ends_rendering() {
            return;
        }

        commands.end_rendering();

        let group = render_pass.merged_range(self.subpass);
        let mut memory_barrier = MemoryBarrier::default();
        let mut needed = false;

        for dependency in render_pass.dependencies() {
            if dependency.dst_subpass.is_none()
                && dependency.src_subpass.is_some_and(|s| group.contains(&s))
            {
                memory_barrier.add_dependency(dependency);
                needed = true;
            }
        }

        // Without an explicit dependency to outside the render pass, an implicit one exists.
        if !needed && self.subpass == render_pass.subpass_count() - 1 {
            memory_barrier.src_stages |= PipelineStageFlags2::ALL_COMMANDS;
            memory_barrier.src_access |=
                AccessFlags2::COLOR_ATTACHMENT_WRITE | AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE;
            needed = true;
        }

        if needed {
            pipeline_barrier(commands, DependencyFlags::empty(), Some(&memory_barrier), &[]);
        }
    }

    fn transition_to_final_layouts(
        &mut self,
        commands: &mut impl RenderingCommands,
    ) -> Result<(), OomError> {
        let render_pass = self.render_pass.clone();
        let view_mask = render_pass.view_mask();
        let view_count = view_mask.count_ones() as usize;

        let mut image_barriers = ImageBarriers::new();
        image_barriers.try_reserve_exact(
            render_pass
                .attachments()
                .iter()
                .map(|description| view_count * description.aspects.as_raw().count_ones() as usize)
                .sum(),
        )?;

        for (index, description) in render_pass.attachments().iter().enumerate() {
            self.transition_attachment(
                index as u32,
                view_mask,
                description.final_layout,
                description.stencil_final_layout,
                &mut image_barriers,
            );
        }

        pipeline_barrier(commands, DependencyFlags::empty(), None, &image_barriers);

        Ok(())
    }
}

fn color_resolve_mode(format: Format) -> ResolveMode {
    if format.is_int() {
        ResolveMode::SampleZero
    } else {
        ResolveMode::Average
    }
}

fn pipeline_barrier(
    commands: &mut impl RenderingCommands,
    dependency_flags: DependencyFlags,
    memory_barrier: Option<&MemoryBarrier>,
    image_memory_barriers: &[ImageMemoryBarrier],
) {
    let dependency_info = DependencyInfo {
        dependency_flags,
        memory_barriers: memory_barrier.map_or(&[][..], slice::from_ref),
        image_memory_barriers,
        _ne: NonExhaustive(()),
    };

    if dependency_info.is_empty() {
        return;
    }

    trace!(
        "pipeline barrier: memory_barriers={} image_memory_barriers={}",
        dependency_info.memory_barriers.len(),
        dependency_info.image_memory_barriers.len(),
    );

    commands.pipeline_barrier(&dependency_info);
}

/// Records the barriers that transition `range` of `image`. `layouts` and `stencil_layouts` are
/// the old and new layouts. Depth and stencil are transitioned separately when their layouts
/// differ.
fn transition_image_range(
    image: &Arc<Image>,
    range: ImageSubresourceRange,
    layouts: [ImageLayout; 2],
    stencil_layouts: [ImageLayout; 2],
    sample_locations: Option<&SampleLocationsInfo>,
    barriers: &mut ImageBarriers,
) {
    let depth_stencil = ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL;
    let mut remaining = range.aspects;

    while !remaining.is_empty() {
        let mut aspects = remaining;

        if aspects == depth_stencil && layouts != stencil_layouts {
            aspects = ImageAspectFlags::DEPTH;
        }

        let [old_layout, new_layout] = if aspects == ImageAspectFlags::STENCIL {
            stencil_layouts
        } else {
            layouts
        };

        if old_layout != new_layout {
            let (src_stages, src_access) = stage_access_for_layout(old_layout, aspects);
            let (dst_stages, dst_access) = stage_access_for_layout(new_layout, aspects);

            barriers.push(ImageMemoryBarrier {
                src_stages,
                src_access,
                dst_stages,
                dst_access,
                old_layout,
                new_layout,
                image: image.clone(),
                subresource_range: ImageSubresourceRange {
                    aspects,
                    ..range.clone()
                },
                sample_locations: sample_locations.cloned(),
                _ne: NonExhaustive(()),
            });
        }

        remaining &= !aspects;
    }
}

/// The state of one attachment of a render pass being recorded.
#[derive(Debug)]
pub struct AttachmentState {
    image_view: Arc<ImageView>,
    views: [AttachmentViewState; MAX_MULTIVIEW_VIEW_COUNT],
    views_loaded: u32,
    clear_value: Option<ClearValue>,
}

impl AttachmentState {
    #[inline]
    pub fn image_view(&self) -> &Arc<ImageView> {
        &self.image_view
    }

    /// Returns the views whose contents were already loaded or cleared.
    #[inline]
    pub fn views_loaded(&self) -> u32 {
        self.views_loaded
    }

    /// Returns the layout that `view` is currently in.
    ///
    /// # Panics
    ///
    /// - Panics if `view` is not less than [`MAX_MULTIVIEW_VIEW_COUNT`].
    #[inline]
    pub fn layout(&self, view: u32) -> ImageLayout {
        self.views[view as usize].layout
    }

    /// Returns the layout that the stencil aspect of `view` is currently in.
    ///
    /// # Panics
    ///
    /// - Panics if `view` is not less than [`MAX_MULTIVIEW_VIEW_COUNT`].
    #[inline]
    pub fn stencil_layout(&self, view: u32) -> ImageLayout {
        self.views[view as usize].stencil_layout
    }

    #[inline]
    pub fn clear_value(&self) -> Option<ClearValue> {
        self.clear_value
    }

    fn is_sample_locations_compatible(&self) -> bool {
        let image = self.image_view.image();

        image
            .format()
            .aspects()
            .intersects(ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL)
            && image
                .flags()
                .contains(ImageCreateFlags::SAMPLE_LOCATIONS_COMPATIBLE_DEPTH_EXT)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AttachmentViewState {
    layout: ImageLayout,
    stencil_layout: ImageLayout,
    sample_locations: Option<SampleLocationsSource>,
}

/// Index into the lists of a [`RenderPassSampleLocations`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SampleLocationsSource {
    Attachment(usize),
    Subpass(usize),
}

/// Parameters to begin a new render pass.
#[derive(Clone, Debug)]
pub struct RenderPassBeginInfo {
    /// The render pass to begin.
    ///
    /// There is no default value.
    pub render_pass: Arc<RenderPass>,

    /// The framebuffer to use for rendering.
    ///
    /// There is no default value.
    pub framebuffer: Arc<Framebuffer>,

    /// The offset from the top left corner of the framebuffer that will be rendered to.
    ///
    /// The default value is `[0, 0]`.
    pub render_area_offset: [u32; 2],

    /// The size of the area that will be rendered to.
    ///
    /// The default value is [`framebuffer.extent()`](Framebuffer::extent).
    pub render_area_extent: [u32; 2],

    /// Provides, for each attachment in `render_pass` that has a load operation of
    /// [`LoadOp::Clear`], the clear values that should be used for the attachments in the
    /// framebuffer. There may be fewer elements than there are attachments; the missing ones are
    /// `None`.
    ///
    /// The default value is empty.
    pub clear_values: Vec<Option<ClearValue>>,

    /// The image views to use as attachments, if `framebuffer` is imageless. There must be
    /// exactly one for each attachment of `render_pass`.
    ///
    /// The default value is empty.
    pub attachments: Vec<Arc<ImageView>>,

    /// Custom sample locations of the depth/stencil attachments.
    ///
    /// The default value is `None`.
    pub sample_locations: Option<RenderPassSampleLocations>,

    pub _ne: NonExhaustive,
}

impl RenderPassBeginInfo {
    /// Returns a `RenderPassBeginInfo` with the specified `render_pass` and `framebuffer`, that
    /// renders to the whole framebuffer.
    #[inline]
    pub fn framebuffer(render_pass: Arc<RenderPass>, framebuffer: Arc<Framebuffer>) -> Self {
        let render_area_extent = framebuffer.extent();

        Self {
            render_pass,
            framebuffer,
            render_area_offset: [0, 0],
            render_area_extent,
            clear_values: Vec::new(),
            attachments: Vec::new(),
            sample_locations: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// Custom sample locations used by the depth/stencil attachments of a render pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderPassSampleLocations {
    /// The sample locations that the contents of each attachment were rendered with before the
    /// render pass. Used when the attachment is transitioned before its first use.
    pub attachment_initial_sample_locations: Vec<AttachmentSampleLocations>,

    /// The sample locations that the depth/stencil attachment of each subpass is rendered with.
    /// Used for rendering and for the transitions that follow.
    pub post_subpass_sample_locations: Vec<SubpassSampleLocations>,
}

impl RenderPassSampleLocations {
    fn get(&self, source: SampleLocationsSource) -> &SampleLocationsInfo {
        match source {
            SampleLocationsSource::Attachment(index) => {
                &self.attachment_initial_sample_locations[index].sample_locations
            }
            SampleLocationsSource::Subpass(index) => {
                &self.post_subpass_sample_locations[index].sample_locations
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentSampleLocations {
    pub attachment: u32,
    pub sample_locations: SampleLocationsInfo,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubpassSampleLocations {
    pub subpass: u32,
    pub sample_locations: SampleLocationsInfo,
}

/// Error that can happen when recording a render pass command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderPassError {
    OomError(OomError),

    /// Operation forbidden inside of a render pass.
    ForbiddenInsideRenderPass,

    /// Operation forbidden outside of a render pass.
    ForbiddenOutsideRenderPass,

    /// Tried to advance to the next subpass, but there are no subpasses remaining in the render
    /// pass.
    NoSubpassesRemaining { current_subpass: u32 },

    /// Tried to end a render pass with subpasses still remaining in the render pass.
    SubpassesRemaining { current_subpass: u32, remaining: u32 },

    /// The number of image views provided does not match the number of attachments of the render
    /// pass.
    AttachmentCountMismatch { required: u32, provided: u32 },

    /// More clear values were provided than the render pass has attachments.
    ClearValueCountMismatch {
        attachment_count: u32,
        clear_value_count: u32,
    },
}

impl Error for RenderPassError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OomError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for RenderPassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OomError(_) => write!(f, "not enough memory available"),
            Self::ForbiddenInsideRenderPass => {
                write!(f, "operation forbidden inside of a render pass")
            }
            Self::ForbiddenOutsideRenderPass => {
                write!(f, "operation forbidden outside of a render pass")
            }
            Self::NoSubpassesRemaining { current_subpass } => write!(
                f,
                "tried to advance to the next subpass after subpass {}, but there are no \
                 subpasses remaining in the render pass",
                current_subpass,
            ),
            Self::SubpassesRemaining {
                current_subpass,
                remaining,
            } => write!(
                f,
                "tried to end a render pass at subpass {}, with {} subpasses still remaining in \
                 the render pass",
                current_subpass, remaining,
            ),
            Self::AttachmentCountMismatch { required, provided } => write!(
                f,
                "the render pass has {} attachments, but {} image views were provided",
                required, provided,
            ),
            Self::ClearValueCountMismatch {
                attachment_count,
                clear_value_count,
            } => write!(
                f,
                "{} clear values were provided, but the render pass has only {} attachments",
                clear_value_count, attachment_count,
            ),
        }
    }
}

impl From<OomError> for RenderPassError {
    #[inline]
    fn from(err: OomError) -> Self {
        Self::OomError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AttachmentSampleLocations, CommandBufferBuilder, RenderPassBeginInfo, RenderPassError,
        RenderPassSampleLocations, SubpassSampleLocations,
    };
    use crate::{
        command_buffer::SampleLocationsInfo,
        device::Features,
        format::ClearValue,
        framebuffer::{Framebuffer, FramebufferCreateInfo},
        image::ImageView,
        render_pass::{
            AttachmentDescription, AttachmentReference, LoadOp, RenderPass, RenderPassCreateInfo,
            ResolveMode, StoreOp, SubpassDependency, SubpassDescription,
        },
        tests::{CountingAllocator, RecordedCommand, RecordingCommands},
        OomError,
    };
    use ash::vk::{
        AccessFlags, AccessFlags2, DependencyFlags, Format, ImageAspectFlags, ImageCreateFlags,
        ImageLayout, ImageType, PipelineStageFlags, PipelineStageFlags2, SampleCountFlags,
    };
    use std::sync::Arc;

    fn color(attachment: u32) -> Option<AttachmentReference> {
        Some(AttachmentReference {
            attachment,
            layout: ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ..Default::default()
        })
    }

    fn input(attachment: u32) -> Option<AttachmentReference> {
        Some(AttachmentReference {
            attachment,
            layout: ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ..Default::default()
        })
    }

    fn cleared(format: Format, final_layout: ImageLayout) -> AttachmentDescription {
        AttachmentDescription {
            format,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            final_layout,
            ..Default::default()
        }
    }

    /// One subpass writing one cleared color attachment that is presented afterwards.
    fn present_render_pass() -> Arc<RenderPass> {
        RenderPass::new(
            device!(),
            RenderPassCreateInfo {
                attachments: vec![cleared(
                    Format::R8G8B8A8_UNORM,
                    ImageLayout::PRESENT_SRC_KHR,
                )],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![color(0)],
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn framebuffer(attachments: Vec<Arc<ImageView>>) -> Arc<Framebuffer> {
        Framebuffer::new(FramebufferCreateInfo {
            attachments,
            ..Default::default()
        })
    }

    fn begin_info(
        render_pass: &Arc<RenderPass>,
        framebuffer: &Arc<Framebuffer>,
    ) -> RenderPassBeginInfo {
        RenderPassBeginInfo {
            clear_values: vec![Some(ClearValue::Float([0.0; 4]))],
            ..RenderPassBeginInfo::framebuffer(render_pass.clone(), framebuffer.clone())
        }
    }

    fn barrier_counts(command: &RecordedCommand) -> Option<(usize, usize)> {
        match command {
            RecordedCommand::PipelineBarrier {
                memory_barriers,
                image_memory_barriers,
                ..
            } => Some((memory_barriers.len(), image_memory_barriers.len())),
            _ => None,
        }
    }

    #[test]
    fn clear_transitions_from_initial_layout() {
        let _ = env_logger::builder().is_test(true).try_init();

        let render_pass = present_render_pass();
        let framebuffer = framebuffer(vec![image_view!(Format::R8G8B8A8_UNORM)]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(begin_info(&render_pass, &framebuffer))
            .unwrap()
            .end_render_pass()
            .unwrap();

        let commands = &builder.commands().commands;
        assert_eq!(commands.len(), 5);

        // Only the implicit dependency from before the render pass; the clear does the transition.
        assert_eq!(barrier_counts(&commands[0]), Some((1, 0)));

        let rendering_info = commands[1].rendering_info().unwrap();
        let attachment = rendering_info.color_attachments[0].as_ref().unwrap();
        assert_eq!(attachment.load_op, LoadOp::Clear);
        assert_eq!(attachment.store_op, StoreOp::Store);
        assert_eq!(attachment.initial_layout, Some(ImageLayout::UNDEFINED));
        assert_eq!(attachment.image_layout, ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert!(matches!(
            attachment.clear_value,
            Some(ClearValue::Float(_)),
        ));
        assert_eq!(rendering_info.render_area_extent, [64, 64]);
        assert_eq!(rendering_info.view_mask, 0);
        assert_eq!(rendering_info.layer_count, 1);

        assert!(matches!(commands[2], RecordedCommand::EndRendering));

        match &commands[3] {
            RecordedCommand::PipelineBarrier {
                memory_barriers,
                image_memory_barriers,
                ..
            } => {
                assert!(image_memory_barriers.is_empty());
                assert_eq!(memory_barriers[0].src_stages, PipelineStageFlags2::ALL_COMMANDS);
            }
            command => panic!("unexpected command {:?}", command),
        }

        let barriers: Vec<_> = builder.commands().image_barriers().collect();
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].old_layout, ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(barriers[0].new_layout, ImageLayout::PRESENT_SRC_KHR);
        assert!(builder.render_pass_state().is_none());
    }

    #[test]
    fn partial_render_area_needs_transition() {
        let render_pass = present_render_pass();
        let framebuffer = framebuffer(vec![image_view!(Format::R8G8B8A8_UNORM)]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(RenderPassBeginInfo {
                render_area_offset: [16, 16],
                render_area_extent: [32, 32],
                ..begin_info(&render_pass, &framebuffer)
            })
            .unwrap();

        let commands = &builder.commands().commands;
        assert_eq!(barrier_counts(&commands[0]), Some((1, 1)));

        let barrier = builder.commands().image_barriers().next().unwrap();
        assert_eq!(barrier.old_layout, ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(barrier.subresource_range.aspects, ImageAspectFlags::COLOR);
        assert_eq!(barrier.subresource_range.array_layers, 0..1);

        let attachment = commands[1].rendering_info().unwrap().color_attachments[0]
            .as_ref()
            .unwrap();
        assert_eq!(attachment.initial_layout, None);
        assert_eq!(attachment.load_op, LoadOp::Clear);
    }

    /// Subpass 0 writes attachment 0, subpass 1 reads it as input attachment and writes
    /// attachment 1. The two subpasses are merged.
    fn color_then_input_render_pass(
        extra_dependencies: Vec<SubpassDependency>,
    ) -> Arc<RenderPass> {
        let mut dependencies = vec![SubpassDependency {
            src_subpass: Some(0),
            dst_subpass: Some(1),
            src_stages: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stages: PipelineStageFlags::FRAGMENT_SHADER,
            src_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access: AccessFlags::INPUT_ATTACHMENT_READ,
            dependency_flags: DependencyFlags::BY_REGION,
            ..Default::default()
        }];
        dependencies.extend(extra_dependencies);

        let render_pass = RenderPass::new(
            device!(budget = 1 << 20),
            RenderPassCreateInfo {
                attachments: vec![
                    cleared(Format::R8G8B8A8_UNORM, ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                    cleared(Format::R8G8B8A8_UNORM, ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                ],
                subpasses: vec![
                    SubpassDescription {
                        color_attachments: vec![color(0)],
                        ..Default::default()
                    },
                    SubpassDescription {
                        input_attachments: vec![input(0)],
                        color_attachments: vec![color(1)],
                        ..Default::default()
                    },
                ],
                dependencies,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=1);

        render_pass
    }

    /// Returns the position of the first framebuffer-local barrier.
    fn by_region_barrier(commands: &[RecordedCommand]) -> Option<usize> {
        commands.iter().position(|command| {
            matches!(
                command,
                RecordedCommand::PipelineBarrier { dependency_flags, .. }
                    if *dependency_flags == DependencyFlags::BY_REGION
            )
        })
    }

    #[test]
    fn merged_subpasses_render_once() {
        let render_pass = color_then_input_render_pass(Vec::new());
        let framebuffer = framebuffer(vec![
            image_view!(Format::R8G8B8A8_UNORM),
            image_view!(Format::R8G8B8A8_UNORM),
        ]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(RenderPassBeginInfo {
                clear_values: vec![Some(ClearValue::Float([0.0; 4])); 2],
                ..RenderPassBeginInfo::framebuffer(render_pass, framebuffer)
            })
            .unwrap();

        // Both clears transition their attachment, and the attachment read in place is already
        // in the layout that the second subpass reads it in.
        assert_eq!(builder.commands().image_barriers().count(), 0);
        assert_eq!(barrier_counts(&builder.commands().commands[0]), Some((1, 0)));

        let rendering_info = builder.commands().rendering_infos().next().unwrap();
        let layouts: Vec<_> = rendering_info
            .color_attachments
            .iter()
            .map(|info| {
                let info = info.as_ref().unwrap();
                (info.image_layout, info.initial_layout)
            })
            .collect();
        assert_eq!(
            layouts,
            vec![
                (
                    ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT,
                    Some(ImageLayout::UNDEFINED),
                ),
                (ImageLayout::COLOR_ATTACHMENT_OPTIMAL, Some(ImageLayout::UNDEFINED)),
            ],
        );

        builder.next_subpass().unwrap();

        let state = builder.render_pass_state().unwrap();
        assert_eq!(state.subpass_index(), 1);
        assert!(state.attachments().iter().all(|a| a.views_loaded() == 1));
        assert_eq!(
            state.attachments()[0].layout(0),
            ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT,
        );
        assert_eq!(state.attachments()[1].layout(0), ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(builder.commands().image_barriers().count(), 0);

        builder.end_render_pass().unwrap();

        let commands = &builder.commands().commands;
        assert_eq!(builder.commands().rendering_infos().count(), 1);
        assert_eq!(
            commands
                .iter()
                .filter(|command| matches!(command, RecordedCommand::EndRendering))
                .count(),
            1,
        );

        // The dependency between the merged subpasses is a framebuffer-local barrier inside the
        // rendering session.
        let by_region = by_region_barrier(commands).unwrap();
        let begin = commands
            .iter()
            .position(|command| command.rendering_info().is_some())
            .unwrap();
        let end = commands
            .iter()
            .position(|command| matches!(command, RecordedCommand::EndRendering))
            .unwrap();
        assert!(begin < by_region && by_region < end);

        match &commands[by_region] {
            RecordedCommand::PipelineBarrier {
                memory_barriers,
                image_memory_barriers,
                ..
            } => {
                assert!(image_memory_barriers.is_empty());
                assert_eq!(memory_barriers[0].dst_access, AccessFlags2::INPUT_ATTACHMENT_READ);
            }
            _ => unreachable!(),
        }

        // The only transitions are the ones to the final layouts.
        let transitions: Vec<_> = builder
            .commands()
            .image_barriers()
            .map(|barrier| (barrier.old_layout, barrier.new_layout))
            .collect();
        assert_eq!(
            transitions,
            vec![
                (
                    ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT,
                    ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ),
                (
                    ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ),
            ],
        );
    }

    #[test]
    fn external_dependency_into_merged_subpass_waits_before_rendering() {
        let render_pass = color_then_input_render_pass(vec![SubpassDependency {
            src_subpass: None,
            dst_subpass: Some(1),
            src_stages: PipelineStageFlags::TRANSFER,
            dst_stages: PipelineStageFlags::FRAGMENT_SHADER,
            src_access: AccessFlags::TRANSFER_WRITE,
            dst_access: AccessFlags::INPUT_ATTACHMENT_READ,
            dependency_flags: DependencyFlags::BY_REGION,
            ..Default::default()
        }]);
        let framebuffer = framebuffer(vec![
            image_view!(Format::R8G8B8A8_UNORM),
            image_view!(Format::R8G8B8A8_UNORM),
        ]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(RenderPassBeginInfo {
                clear_values: vec![Some(ClearValue::Float([0.0; 4])); 2],
                ..RenderPassBeginInfo::framebuffer(render_pass, framebuffer)
            })
            .unwrap()
            .next_subpass()
            .unwrap()
            .end_render_pass()
            .unwrap();

        let commands = &builder.commands().commands;

        // The external dependency is waited on before the session, and replaces the implicit one.
        match &commands[0] {
            RecordedCommand::PipelineBarrier { memory_barriers, .. } => {
                assert_eq!(memory_barriers.len(), 1);
                assert_eq!(memory_barriers[0].src_access, AccessFlags2::TRANSFER_WRITE);
            }
            command => panic!("unexpected command {:?}", command),
        }

        // Inside the session, only the dependency from subpass 0 remains.
        let by_region = by_region_barrier(commands).unwrap();

        match &commands[by_region] {
            RecordedCommand::PipelineBarrier { memory_barriers, .. } => {
                assert_eq!(memory_barriers[0].src_access, AccessFlags2::COLOR_ATTACHMENT_WRITE);
                assert_eq!(
                    memory_barriers[0].src_stages,
                    PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                );
            }
            _ => unreachable!(),
        }

        assert_eq!(
            commands
                .iter()
                .filter(|command| matches!(
                    command,
                    RecordedCommand::PipelineBarrier { dependency_flags, .. }
                        if *dependency_flags == DependencyFlags::BY_REGION
                ))
                .count(),
            1,
        );
    }

    #[test]
    fn attachment_cleared_once_and_stored_until_last_use() {
        let render_pass = RenderPass::new(
            device!(),
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription {
                    store_op: StoreOp::DontCare,
                    ..cleared(Format::R8G8B8A8_UNORM, ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                }],
                subpasses: vec![
                    SubpassDescription {
                        color_attachments: vec![color(0)],
                        ..Default::default()
                    },
                    SubpassDescription {
                        color_attachments: vec![color(0)],
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![image_view!(Format::R8G8B8A8_UNORM)]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(begin_info(&render_pass, &framebuffer))
            .unwrap()
            .next_subpass()
            .unwrap()
            .end_render_pass()
            .unwrap();

        let attachments: Vec<_> = builder
            .commands()
            .rendering_infos()
            .map(|info| info.color_attachments[0].clone().unwrap())
            .collect();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].load_op, LoadOp::Clear);
        assert_eq!(attachments[0].store_op, StoreOp::Store);
        assert_eq!(attachments[1].load_op, LoadOp::Load);
        assert_eq!(attachments[1].store_op, StoreOp::DontCare);
        assert!(attachments[1].clear_value.is_none());

        // Already in its final layout.
        assert_eq!(builder.commands().image_barriers().count(), 0);
    }

    #[test]
    fn multiview_views_stored_until_their_last_use() {
        let device = device!(
            features = Features {
                multiview: true,
                ..Default::default()
            }
        );
        let render_pass = RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription {
                    store_op: StoreOp::DontCare,
                    ..cleared(Format::R8G8B8A8_UNORM, ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                }],
                subpasses: vec![
                    SubpassDescription {
                        view_mask: 0b11,
                        color_attachments: vec![color(0)],
                        ..Default::default()
                    },
                    SubpassDescription {
                        view_mask: 0b01,
                        color_attachments: vec![color(0)],
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![image_view!(
            Format::R8G8B8A8_UNORM,
            array_layers = 2
        )]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(begin_info(&render_pass, &framebuffer))
            .unwrap();
        assert_eq!(
            builder.render_pass_state().unwrap().attachments()[0].views_loaded(),
            0b11,
        );
        builder.next_subpass().unwrap().end_render_pass().unwrap();

        let infos: Vec<_> = builder.commands().rendering_infos().collect();
        assert_eq!(infos[0].view_mask, 0b11);
        assert_eq!(infos[0].layer_count, 1);
        assert_eq!(infos[1].view_mask, 0b01);

        // View 1 is last used by the first subpass, view 0 by the second one.
        let first = infos[0].color_attachments[0].as_ref().unwrap();
        let second = infos[1].color_attachments[0].as_ref().unwrap();
        assert_eq!(first.load_op, LoadOp::Clear);
        assert_eq!(first.store_op, StoreOp::Store);
        assert_eq!(first.initial_layout, Some(ImageLayout::UNDEFINED));
        assert_eq!(second.load_op, LoadOp::Load);
        assert_eq!(second.store_op, StoreOp::DontCare);
    }

    #[test]
    fn multiview_transitions_one_layer_per_view() {
        let device = device!(
            features = Features {
                multiview: true,
                ..Default::default()
            }
        );
        let render_pass = RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription {
                    format: Format::R8G8B8A8_UNORM,
                    final_layout: ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    ..Default::default()
                }],
                subpasses: vec![SubpassDescription {
                    view_mask: 0b101,
                    color_attachments: vec![color(0)],
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![image_view!(
            Format::R8G8B8A8_UNORM,
            array_layers = 3
        )]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(RenderPassBeginInfo::framebuffer(render_pass, framebuffer))
            .unwrap();

        let layers: Vec<_> = builder
            .commands()
            .image_barriers()
            .map(|barrier| barrier.subresource_range.array_layers.clone())
            .collect();
        assert_eq!(layers, vec![0..1, 2..3]);
    }

    #[test]
    fn image_3d_transitions_all_slices() {
        let render_pass = RenderPass::new(
            device!(),
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription {
                    format: Format::R8G8B8A8_UNORM,
                    final_layout: ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    ..Default::default()
                }],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![color(0)],
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![image_view!(
            Format::R8G8B8A8_UNORM,
            image_type = ImageType::TYPE_3D,
            extent = [64, 64, 4]
        )]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(RenderPassBeginInfo::framebuffer(render_pass, framebuffer))
            .unwrap()
            .end_render_pass()
            .unwrap();

        let barriers: Vec<_> = builder.commands().image_barriers().collect();
        assert_eq!(barriers.len(), 2);
        assert!(barriers
            .iter()
            .all(|barrier| barrier.subresource_range.array_layers == (0..4)));
    }

    #[test]
    fn depth_and_stencil_transition_separately() {
        let render_pass = RenderPass::new(
            device!(),
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription {
                    format: Format::D24_UNORM_S8_UINT,
                    stencil_load_op: LoadOp::Load,
                    final_layout: ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                    ..Default::default()
                }],
                subpasses: vec![SubpassDescription {
                    depth_stencil_attachment: Some(AttachmentReference {
                        attachment: 0,
                        layout: ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                        stencil_layout: Some(ImageLayout::STENCIL_READ_ONLY_OPTIMAL),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![image_view!(Format::D24_UNORM_S8_UINT)]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(RenderPassBeginInfo::framebuffer(render_pass, framebuffer))
            .unwrap();

        let barriers: Vec<_> = builder
            .commands()
            .image_barriers()
            .map(|barrier| (barrier.subresource_range.aspects, barrier.new_layout))
            .collect();
        assert_eq!(
            barriers,
            vec![
                (ImageAspectFlags::DEPTH, ImageLayout::DEPTH_ATTACHMENT_OPTIMAL),
                (ImageAspectFlags::STENCIL, ImageLayout::STENCIL_READ_ONLY_OPTIMAL),
            ],
        );

        let info = builder.commands().rendering_infos().next().unwrap();
        assert_eq!(info.depth_attachment.as_ref().unwrap().load_op, LoadOp::DontCare);
        assert_eq!(info.stencil_attachment.as_ref().unwrap().load_op, LoadOp::Load);
        assert!(info.color_attachments.is_empty());
    }

    #[test]
    fn color_resolve_modes() {
        let multisampled = |format| AttachmentDescription {
            format,
            samples: SampleCountFlags::TYPE_4,
            ..Default::default()
        };
        let resolved = |format| AttachmentDescription {
            format,
            final_layout: ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ..Default::default()
        };
        let render_pass = RenderPass::new(
            device!(),
            RenderPassCreateInfo {
                attachments: vec![
                    multisampled(Format::R8G8B8A8_UNORM),
                    multisampled(Format::R8G8B8A8_UINT),
                    resolved(Format::R8G8B8A8_UNORM),
                    resolved(Format::R8G8B8A8_UINT),
                ],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![color(0), color(1)],
                    color_resolve_attachments: vec![color(2), color(3)],
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![
            image_view!(Format::R8G8B8A8_UNORM, samples = SampleCountFlags::TYPE_4),
            image_view!(Format::R8G8B8A8_UINT, samples = SampleCountFlags::TYPE_4),
            image_view!(Format::R8G8B8A8_UNORM),
            image_view!(Format::R8G8B8A8_UINT),
        ]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(RenderPassBeginInfo::framebuffer(
                render_pass,
                framebuffer.clone(),
            ))
            .unwrap();

        let info = builder.commands().rendering_infos().next().unwrap();
        let modes: Vec<_> = info
            .color_attachments
            .iter()
            .map(|attachment| {
                let resolve = attachment.as_ref().unwrap().resolve_info.as_ref().unwrap();
                assert_eq!(resolve.image_layout, ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
                resolve.mode
            })
            .collect();
        assert_eq!(modes, vec![ResolveMode::Average, ResolveMode::SampleZero]);

        let resolve_view = info.color_attachments[1]
            .as_ref()
            .unwrap()
            .resolve_info
            .as_ref()
            .unwrap()
            .image_view
            .as_ref()
            .unwrap();
        assert!(Arc::ptr_eq(resolve_view, &framebuffer.attachments()[3]));

        // Resolving writes the whole attachment, so it never needs its own load.
        let state = builder.render_pass_state().unwrap();
        assert!(state.attachments().iter().all(|a| a.views_loaded() == 1));
        assert_eq!(builder.commands().rendering_infos().count(), 1);
    }

    #[test]
    fn fragment_shading_rate_attachment_loaded_separately() {
        let device = device!(
            features = Features {
                fragment_shading_rate: true,
                ..Default::default()
            }
        );
        let render_pass = RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments: vec![
                    cleared(Format::R8G8B8A8_UNORM, ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
                    cleared(
                        Format::R8_UINT,
                        ImageLayout::FRAGMENT_SHADING_RATE_ATTACHMENT_OPTIMAL_KHR,
                    ),
                ],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![color(0)],
                    fragment_shading_rate_attachment: Some(AttachmentReference {
                        attachment: 1,
                        layout: ImageLayout::FRAGMENT_SHADING_RATE_ATTACHMENT_OPTIMAL_KHR,
                        ..Default::default()
                    }),
                    fragment_shading_rate_texel_size: [16, 16],
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![
            image_view!(Format::R8G8B8A8_UNORM),
            image_view!(Format::R8_UINT),
        ]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(RenderPassBeginInfo {
                clear_values: vec![
                    Some(ClearValue::Float([0.0; 4])),
                    Some(ClearValue::Uint([1; 4])),
                ],
                ..RenderPassBeginInfo::framebuffer(render_pass, framebuffer.clone())
            })
            .unwrap();

        let commands = &builder.commands().commands;
        let infos: Vec<_> = builder.commands().rendering_infos().collect();
        assert_eq!(infos.len(), 2);

        let load = infos[0].color_attachments[0].as_ref().unwrap();
        assert!(Arc::ptr_eq(&load.image_view, &framebuffer.attachments()[1]));
        assert_eq!(load.load_op, LoadOp::Clear);
        assert_eq!(load.store_op, StoreOp::Store);
        assert!(matches!(load.clear_value, Some(ClearValue::Uint([1, 1, 1, 1]))));
        assert!(matches!(commands[2], RecordedCommand::EndRendering));

        let fsr = infos[1].fragment_shading_rate_attachment.as_ref().unwrap();
        assert!(Arc::ptr_eq(&fsr.image_view, &framebuffer.attachments()[1]));
        assert_eq!(fsr.texel_size, [16, 16]);
        assert!(infos[1].fragment_density_map_attachment.is_none());
    }

    #[test]
    fn explicit_external_dependency_replaces_implicit_one() {
        let render_pass = RenderPass::new(
            device!(),
            RenderPassCreateInfo {
                attachments: vec![cleared(
                    Format::R8G8B8A8_UNORM,
                    ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                )],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![color(0)],
                    ..Default::default()
                }],
                dependencies: vec![
                    SubpassDependency {
                        src_subpass: None,
                        dst_subpass: Some(0),
                        src_stages: PipelineStageFlags::TRANSFER,
                        dst_stages: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                        src_access: AccessFlags::TRANSFER_WRITE,
                        dst_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
                        ..Default::default()
                    },
                    SubpassDependency {
                        src_subpass: Some(0),
                        dst_subpass: None,
                        src_stages: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                        dst_stages: PipelineStageFlags::FRAGMENT_SHADER,
                        src_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
                        dst_access: AccessFlags::SHADER_READ,
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![image_view!(Format::R8G8B8A8_UNORM)]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(begin_info(&render_pass, &framebuffer))
            .unwrap()
            .end_render_pass()
            .unwrap();

        let memory_barriers: Vec<_> = builder
            .commands()
            .commands
            .iter()
            .filter_map(|command| match command {
                RecordedCommand::PipelineBarrier {
                    memory_barriers, ..
                } => memory_barriers.first().copied(),
                _ => None,
            })
            .collect();
        assert_eq!(memory_barriers.len(), 2);
        assert_eq!(memory_barriers[0].src_stages, PipelineStageFlags2::TRANSFER);
        assert_eq!(memory_barriers[0].dst_access, AccessFlags2::COLOR_ATTACHMENT_WRITE);
        assert_eq!(
            memory_barriers[1].src_stages,
            PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        );
        assert_eq!(memory_barriers[1].dst_stages, PipelineStageFlags2::FRAGMENT_SHADER);
    }

    #[test]
    fn sample_locations_follow_depth_attachment() {
        let render_pass = RenderPass::new(
            device!(),
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription {
                    format: Format::D32_SFLOAT,
                    samples: SampleCountFlags::TYPE_4,
                    final_layout: ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
                    ..Default::default()
                }],
                subpasses: vec![SubpassDescription {
                    depth_stencil_attachment: Some(AttachmentReference {
                        attachment: 0,
                        layout: ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![image_view!(
            Format::D32_SFLOAT,
            samples = SampleCountFlags::TYPE_4,
            flags = ImageCreateFlags::SAMPLE_LOCATIONS_COMPATIBLE_DEPTH_EXT
        )]);
        let locations = |offset: f32| SampleLocationsInfo {
            sample_locations_per_pixel: SampleCountFlags::TYPE_4,
            sample_location_grid_size: [1, 1],
            sample_locations: vec![[offset, offset]; 4],
        };

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(RenderPassBeginInfo {
                sample_locations: Some(RenderPassSampleLocations {
                    attachment_initial_sample_locations: vec![AttachmentSampleLocations {
                        attachment: 0,
                        sample_locations: locations(0.25),
                    }],
                    post_subpass_sample_locations: vec![SubpassSampleLocations {
                        subpass: 0,
                        sample_locations: locations(0.75),
                    }],
                }),
                ..RenderPassBeginInfo::framebuffer(render_pass, framebuffer)
            })
            .unwrap()
            .end_render_pass()
            .unwrap();

        let info = builder.commands().rendering_infos().next().unwrap();
        assert_eq!(info.sample_locations, Some(locations(0.75)));

        let barriers: Vec<_> = builder.commands().image_barriers().collect();
        assert_eq!(barriers.len(), 2);
        assert_eq!(barriers[0].sample_locations, Some(locations(0.25)));
        assert_eq!(barriers[1].sample_locations, Some(locations(0.75)));
    }

    #[test]
    fn recording_state_errors() {
        let render_pass = RenderPass::new(
            device!(),
            RenderPassCreateInfo {
                attachments: vec![cleared(
                    Format::R8G8B8A8_UNORM,
                    ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                )],
                subpasses: vec![
                    SubpassDescription {
                        color_attachments: vec![color(0)],
                        ..Default::default()
                    },
                    SubpassDescription {
                        color_attachments: vec![color(0)],
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![image_view!(Format::R8G8B8A8_UNORM)]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        assert_eq!(
            builder.next_subpass().unwrap_err(),
            RenderPassError::ForbiddenOutsideRenderPass,
        );
        assert_eq!(
            builder.end_render_pass().unwrap_err(),
            RenderPassError::ForbiddenOutsideRenderPass,
        );
        assert_eq!(
            builder
                .begin_render_pass(RenderPassBeginInfo {
                    clear_values: vec![None, None],
                    ..begin_info(&render_pass, &framebuffer)
                })
                .unwrap_err(),
            RenderPassError::ClearValueCountMismatch {
                attachment_count: 1,
                clear_value_count: 2,
            },
        );
        assert!(builder.commands().commands.is_empty());

        builder
            .begin_render_pass(begin_info(&render_pass, &framebuffer))
            .unwrap();
        assert_eq!(
            builder
                .begin_render_pass(begin_info(&render_pass, &framebuffer))
                .unwrap_err(),
            RenderPassError::ForbiddenInsideRenderPass,
        );
        assert_eq!(
            builder.end_render_pass().unwrap_err(),
            RenderPassError::SubpassesRemaining {
                current_subpass: 0,
                remaining: 1,
            },
        );

        builder.next_subpass().unwrap();
        assert_eq!(
            builder.next_subpass().unwrap_err(),
            RenderPassError::NoSubpassesRemaining { current_subpass: 1 },
        );
        builder.end_render_pass().unwrap();
    }

    #[test]
    fn imageless_framebuffer_takes_begin_attachments() {
        let render_pass = present_render_pass();
        let framebuffer = Framebuffer::new(FramebufferCreateInfo {
            extent: [64, 64],
            imageless: true,
            ..Default::default()
        });

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        assert_eq!(
            builder
                .begin_render_pass(begin_info(&render_pass, &framebuffer))
                .unwrap_err(),
            RenderPassError::AttachmentCountMismatch {
                required: 1,
                provided: 0,
            },
        );

        let image_view = image_view!(Format::R8G8B8A8_UNORM);
        builder
            .begin_render_pass(RenderPassBeginInfo {
                attachments: vec![image_view.clone()],
                ..begin_info(&render_pass, &framebuffer)
            })
            .unwrap();

        let state = builder.render_pass_state().unwrap();
        assert!(Arc::ptr_eq(state.attachments()[0].image_view(), &image_view));
        assert!(state.framebuffer().is_imageless());
    }

    #[test]
    fn framebuffer_with_too_few_attachments() {
        let render_pass = present_render_pass();
        let framebuffer = Framebuffer::new(FramebufferCreateInfo {
            extent: [64, 64],
            ..Default::default()
        });

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        assert_eq!(
            builder
                .begin_render_pass(begin_info(&render_pass, &framebuffer))
                .unwrap_err(),
            RenderPassError::AttachmentCountMismatch {
                required: 1,
                provided: 0,
            },
        );
    }

    #[test]
    fn out_of_memory_leaves_no_state() {
        let create_info = || RenderPassCreateInfo {
            attachments: vec![cleared(
                Format::R8G8B8A8_UNORM,
                ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            )],
            subpasses: vec![SubpassDescription {
                color_attachments: vec![color(0)],
                ..Default::default()
            }],
            ..Default::default()
        };

        let counting = Arc::new(CountingAllocator::default());
        let _ = RenderPass::new(device!(allocator = counting.clone()), create_info()).unwrap();
        let creation_allocations = counting.allocations();

        let allocator = Arc::new(CountingAllocator::failing_after(creation_allocations));
        let render_pass =
            RenderPass::new(device!(allocator = allocator.clone()), create_info()).unwrap();
        let framebuffer = framebuffer(vec![image_view!(Format::R8G8B8A8_UNORM)]);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        assert_eq!(
            builder
                .begin_render_pass(begin_info(&render_pass, &framebuffer))
                .unwrap_err(),
            RenderPassError::OomError(OomError::OutOfHostMemory),
        );
        assert!(builder.render_pass_state().is_none());
        assert!(builder.commands().commands.is_empty());

        drop(render_pass);
        assert_eq!(allocator.live_bytes(), 0);
    }

    #[test]
    fn recording_state_is_accounted() {
        let allocator = Arc::new(CountingAllocator::default());
        let render_pass = RenderPass::new(
            device!(allocator = allocator.clone()),
            RenderPassCreateInfo {
                attachments: vec![cleared(
                    Format::R8G8B8A8_UNORM,
                    ImageLayout::PRESENT_SRC_KHR,
                )],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![color(0)],
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap();
        let framebuffer = framebuffer(vec![image_view!(Format::R8G8B8A8_UNORM)]);
        let live_bytes = allocator.live_bytes();

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        builder
            .begin_render_pass(begin_info(&render_pass, &framebuffer))
            .unwrap();
        assert!(allocator.live_bytes() > live_bytes);

        builder.end_render_pass().unwrap();
        assert_eq!(allocator.live_bytes(), live_bytes);
    }

    #[test]
    fn attachment_layout_tracking() {
        let render_pass = present_render_pass();
        let image_view = image_view!(Format::R8G8B8A8_UNORM);
        let framebuffer = framebuffer(vec![image_view.clone()]);
        let other = image_view!(Format::R8G8B8A8_UNORM);

        let mut builder = CommandBufferBuilder::new(RecordingCommands::default());
        assert_eq!(builder.attachment_layout(&image_view), None);
        assert_eq!(
            builder
                .set_attachment_layout(0, ImageLayout::GENERAL, ImageLayout::UNDEFINED)
                .unwrap_err(),
            RenderPassError::ForbiddenOutsideRenderPass,
        );

        builder
            .begin_render_pass(begin_info(&render_pass, &framebuffer))
            .unwrap();
        assert_eq!(
            builder.attachment_layout(&image_view),
            Some((
                0,
                ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                ImageLayout::UNDEFINED,
            )),
        );
        assert_eq!(builder.attachment_layout(&other), None);

        builder
            .set_attachment_layout(0, ImageLayout::GENERAL, ImageLayout::UNDEFINED)
            .unwrap();
        assert_eq!(
            builder.render_pass_state().unwrap().attachments()[0].layout(0),
            ImageLayout::GENERAL,
        );

        builder.end_render_pass().unwrap();
        let barrier = builder.commands().image_barriers().last().unwrap();
        assert_eq!(barrier.old_layout, ImageLayout::GENERAL);
        assert_eq!(barrier.new_layout, ImageLayout::PRESENT_SRC_KHR);
    }
}
