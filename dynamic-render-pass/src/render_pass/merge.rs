// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Merging of consecutive subpasses into a single rendering session.
//!
//! On a tile-based renderer, every rendering session loads its attachments into the tile buffer
//! and writes them back to memory at the end. When a subpass reads what the previous one wrote,
//! running both in the same session keeps the data on the tile. This is only possible if all the
//! color attachments of the run fit in the tile buffer and all the dependencies between the
//! subpasses are framebuffer-local.

use super::{
    AttachmentUsage, MergeState, RenderPass, ResolveMode, ResolveTarget, Subpass,
    SubpassAttachment, SubpassOwnership, SubpassSlot,
};
use crate::{alloc::try_vec, bitfield_mask, bits, format::FormatExt, last_bit, OomError};
use ash::vk::{ImageAspectFlags, ImageLayout, PipelineCreateFlags};
use log::debug;
use std::ops::RangeInclusive;

/// Number of pixels of the tile that the tile buffer budget must accommodate.
const EFFECTIVE_TILE_PIXELS: u32 = 16 * 16;

/// Which subpass of the range introduced an attachment, and how many subpasses of the range
/// access it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct MergedAttachment {
    /// `None` if the slot is free.
    subpass: Option<u32>,
    /// Index of the color attachment in `subpass`. Unused for depth and stencil.
    index: u32,
    access_count: u32,
}

/// State of the analysis of a range of subpasses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MergingContext {
    first_subpass: u32,
    last_subpass: u32,
    colors: [MergedAttachment; crate::MAX_COLOR_ATTACHMENTS],
    depth: MergedAttachment,
    stencil: MergedAttachment,
    used_color_mask: u32,
}

impl MergingContext {
    /// Starts a range made of `first_subpass` alone.
    fn new(render_pass: &RenderPass, first_subpass: u32) -> Self {
        let subpass = render_pass.subpass(first_subpass);
        let mut ctx = MergingContext {
            first_subpass,
            last_subpass: first_subpass,
            colors: Default::default(),
            depth: Default::default(),
            stencil: Default::default(),
            used_color_mask: 0,
        };

        debug_assert!(subpass.color_attachments.len() <= ctx.colors.len());

        let introduced = MergedAttachment {
            subpass: Some(first_subpass),
            index: 0,
            access_count: 1,
        };

        for (index, color) in subpass.color_attachments.iter().enumerate() {
            if color.attachment.is_none() {
                continue;
            }

            ctx.colors[index] = MergedAttachment {
                index: index as u32,
                ..introduced
            };
            ctx.used_color_mask |= 1 << index;
        }

        if let Some(depth_stencil) = &subpass.depth_stencil_attachment {
            if depth_stencil.aspects.contains(ImageAspectFlags::DEPTH) {
                ctx.depth = introduced;
            }

            if depth_stencil.aspects.contains(ImageAspectFlags::STENCIL) {
                ctx.stencil = introduced;
            }
        }

        ctx
    }

    /// Returns the range of subpasses covered by the context.
    #[inline]
    pub(crate) fn range(&self) -> RangeInclusive<u32> {
        self.first_subpass..=self.last_subpass
    }

    /// Returns the attachment held by the color slot `slot`.
    fn color_attachment(&self, render_pass: &RenderPass, slot: u32) -> Option<u32> {
        let merged = self.colors[slot as usize];
        let subpass = render_pass.subpass(merged.subpass?);

        subpass.color_attachments[merged.index as usize].attachment
    }

    /// Returns the depth/stencil attachment that provides `aspect` to the range.
    fn depth_stencil_attachment(
        &self,
        render_pass: &RenderPass,
        aspect: ImageAspectFlags,
    ) -> Option<u32> {
        let merged = if aspect == ImageAspectFlags::DEPTH {
            self.depth
        } else {
            self.stencil
        };
        let subpass = render_pass.subpass(merged.subpass?);

        subpass.depth_stencil_attachment.as_ref()?.attachment
    }

    fn color_slots(&self) -> impl Iterator<Item = u32> {
        bits(self.used_color_mask)
    }

    /// Tries to add the subpass following the range to it.
    ///
    /// The context is left unmodified if the subpass can't be added.
    fn try_extend(&mut self, render_pass: &RenderPass) -> bool {
        let candidate_index = self.last_subpass + 1;

        if candidate_index >= render_pass.subpass_count() {
            return false;
        }

        let first = render_pass.subpass(self.first_subpass);
        let candidate = render_pass.subpass(candidate_index);

        // TODO: merge subpasses with a fragment shading rate attachment once rendering sessions
        // can switch the attachment between subpasses.
        if first.fragment_shading_rate_attachment.is_some()
            || candidate.fragment_shading_rate_attachment.is_some()
        {
            debug!(
                "subpass {} not merged: fragment shading rate attachment",
                candidate_index,
            );
            return false;
        }

        let modes_conflict = |a: ResolveMode, b: ResolveMode| {
            a != ResolveMode::None && b != ResolveMode::None && a != b
        };

        if modes_conflict(first.depth_resolve_mode, candidate.depth_resolve_mode)
            || modes_conflict(first.stencil_resolve_mode, candidate.stencil_resolve_mode)
        {
            debug!("subpass {} not merged: resolve modes differ", candidate_index);
            return false;
        }

        if first.legacy_dithering_enabled != candidate.legacy_dithering_enabled
            || first.multisampled_render_to_single_sampled
                != candidate.multisampled_render_to_single_sampled
        {
            debug!(
                "subpass {} not merged: dithering or multisampled rendering to single-sampled \
                attachments differ",
                candidate_index,
            );
            return false;
        }

        let non_local = render_pass.dependencies.iter().any(|dependency| {
            matches!(
                (dependency.src_subpass, dependency.dst_subpass),
                (Some(src), Some(dst)) if dst == candidate_index
                    && (self.first_subpass..=candidate_index).contains(&src)
            ) && !dependency.is_framebuffer_local()
        });

        if non_local {
            debug!(
                "subpass {} not merged: dependency is not framebuffer-local",
                candidate_index,
            );
            return false;
        }

        let aspect_attachment = |aspect| {
            candidate
                .depth_stencil_attachment
                .as_ref()
                .filter(|ds| ds.aspects.contains(aspect))
                .and_then(|ds| ds.attachment)
        };
        let depth = aspect_attachment(ImageAspectFlags::DEPTH);
        let stencil = aspect_attachment(ImageAspectFlags::STENCIL);
        let prev_depth = self.depth_stencil_attachment(render_pass, ImageAspectFlags::DEPTH);
        let prev_stencil = self.depth_stencil_attachment(render_pass, ImageAspectFlags::STENCIL);

        // The range can only have one depth/stencil attachment.
        let conflicts = |attachment: Option<u32>| {
            attachment.is_some_and(|attachment| {
                prev_depth.is_some_and(|prev| prev != attachment)
                    || prev_stencil.is_some_and(|prev| prev != attachment)
            })
        };

        if conflicts(depth) || conflicts(stencil) {
            debug!(
                "subpass {} not merged: depth/stencil attachment differs",
                candidate_index,
            );
            return false;
        }

        let mut depth_used = depth.is_some();
        let mut stencil_used = stencil.is_some();
        let mut color_used_mask = 0;
        let mut missing_color_mask = 0u32;

        for (index, color) in candidate.color_attachments.iter().enumerate() {
            let Some(attachment) = color.attachment else {
                continue;
            };

            match self
                .color_slots()
                .find(|&slot| self.color_attachment(render_pass, slot) == Some(attachment))
            {
                Some(slot) => color_used_mask |= 1 << slot,
                None => missing_color_mask |= 1 << index,
            }
        }

        let mut free_colors = !self.used_color_mask
            & bitfield_mask(render_pass.device.properties().mergeable_color_attachments());

        if missing_color_mask.count_ones() > free_colors.count_ones() {
            debug!(
                "subpass {} not merged: not enough color attachment slots",
                candidate_index,
            );
            return false;
        }

        for index in bits(missing_color_mask) {
            let slot = free_colors.trailing_zeros();
            free_colors &= free_colors - 1;

            self.colors[slot as usize] = MergedAttachment {
                subpass: Some(candidate_index),
                index,
                access_count: 0,
            };
            self.used_color_mask |= 1 << slot;
            color_used_mask |= 1 << slot;
        }

        if depth_used && self.depth.subpass.is_none() {
            self.depth.subpass = Some(candidate_index);
        }

        if stencil_used && self.stencil.subpass.is_none() {
            self.stencil.subpass = Some(candidate_index);
        }

        // Reading an attachment of the range as input attachment keeps it on the tile as well.
        for attachment in candidate.input_attachments.iter().filter_map(|a| a.attachment) {
            for slot in self.color_slots() {
                if self.color_attachment(render_pass, slot) == Some(attachment) {
                    color_used_mask |= 1 << slot;
                }
            }

            if self.depth_stencil_attachment(render_pass, ImageAspectFlags::DEPTH)
                == Some(attachment)
            {
                depth_used = true;
            }

            if self.depth_stencil_attachment(render_pass, ImageAspectFlags::STENCIL)
                == Some(attachment)
            {
                stencil_used = true;
            }
        }

        for slot in bits(color_used_mask) {
            self.colors[slot as usize].access_count += 1;
        }

        if depth_used {
            self.depth.access_count += 1;
        }

        if stencil_used {
            self.stencil.access_count += 1;
        }

        self.last_subpass = candidate_index;

        true
    }

    /// Returns whether an attachment introduced by the first subpass of the range is accessed
    /// again later in the range.
    fn first_subpass_outputs_reused(&self) -> bool {
        let reused = |merged: &MergedAttachment| {
            merged.subpass == Some(self.first_subpass) && merged.access_count > 1
        };

        self.color_slots()
            .any(|slot| reused(&self.colors[slot as usize]))
            || reused(&self.depth)
            || reused(&self.stencil)
    }

    /// Returns whether the color attachments of the range fit in a tile buffer of `budget`
    /// bytes.
    fn fits_in_tile_buffer(&self, render_pass: &RenderPass, budget: u32) -> bool {
        let mut total_bpp = 0u32;

        for slot in self.color_slots() {
            let Some(attachment) = self.color_attachment(render_pass, slot) else {
                continue;
            };
            let attachment = &render_pass.attachments[attachment as usize];

            let Some(bytes_per_sample) = attachment.format.tile_buffer_bytes_per_sample() else {
                return false;
            };

            total_bpp += bytes_per_sample * attachment.samples.as_raw();
        }

        total_bpp
            .checked_mul(EFFECTIVE_TILE_PIXELS)
            .is_some_and(|bytes| bytes <= budget)
    }
}

impl RenderPass {
    /// Returns the longest range of subpasses that starts at `first_subpass`, ends at
    /// `last_subpass` at the latest, and can be executed as one rendering session.
    pub(crate) fn next_mergeable_range(
        &self,
        first_subpass: u32,
        last_subpass: u32,
    ) -> MergingContext {
        let mut ctx = MergingContext::new(self, first_subpass);

        while ctx.last_subpass < last_subpass && ctx.try_extend(self) {}

        ctx
    }

    /// Merges every run of subpasses that is worth executing as one rendering session and fits
    /// in a tile buffer of `tile_buffer_budget` bytes.
    pub(crate) fn merge_subpasses(&mut self, tile_buffer_budget: u32) -> Result<(), OomError> {
        let subpass_count = self.subpass_count();
        let mut first_subpass = 0;
        let mut last_subpass = subpass_count - 1;

        while first_subpass < subpass_count {
            let ctx = self.next_mergeable_range(first_subpass, last_subpass);

            if ctx.first_subpass == ctx.last_subpass {
                first_subpass = ctx.first_subpass + 1;
                last_subpass = subpass_count - 1;
            } else if !ctx.first_subpass_outputs_reused() {
                debug!(
                    "subpasses {:?} not merged: outputs of subpass {} are not reused",
                    ctx.range(),
                    ctx.first_subpass,
                );
                first_subpass = ctx.first_subpass + 1;
                last_subpass = subpass_count - 1;
            } else if !ctx.fits_in_tile_buffer(self, tile_buffer_budget) {
                debug!(
                    "subpasses {:?} do not fit in the tile buffer, evicting subpass {}",
                    ctx.range(),
                    ctx.last_subpass,
                );
                last_subpass = ctx.last_subpass - 1;
            } else {
                debug!("merging subpasses {:?}", ctx.range());
                self.merge_range(&ctx)?;
                first_subpass = ctx.last_subpass + 1;
                last_subpass = subpass_count - 1;
            }
        }

        self.compact_subpass_blocks()?;

        Ok(())
    }

    /// Replaces the subpasses of the range of `ctx` with subpasses that share one set of
    /// attachments.
    fn merge_range(&mut self, ctx: &MergingContext) -> Result<(), OomError> {
        if ctx.first_subpass == ctx.last_subpass {
            return Ok(());
        }

        let template = self.merged_template(ctx)?;
        let color_count = template.color_attachments.len();
        let mut merged = try_vec(ctx.range().count())?;

        for index in ctx.range() {
            let original = self.subpass(index);
            let mut subpass = template.clone();

            subpass.merged = if index == ctx.first_subpass {
                MergeState::First
            } else if index == ctx.last_subpass {
                MergeState::Last
            } else {
                MergeState::Mid
            };

            // Each color output of the original subpass keeps its location, and is redirected to
            // the slot that holds its attachment.
            let mut locations = try_vec(color_count)?;
            locations.resize(color_count, None);

            for (location, color) in original.color_attachments.iter().enumerate() {
                let Some(attachment) = color.attachment else {
                    continue;
                };

                if let Some(slot) = template
                    .color_attachments
                    .iter()
                    .position(|c| c.attachment == Some(attachment))
                {
                    locations[slot] = Some(location as u32);
                }
            }

            subpass.attachment_location_info.color_attachment_locations = locations;

            let mut inputs: Vec<SubpassAttachment> = try_vec(original.input_attachments.len())?;

            for input in &original.input_attachments {
                if input.attachment.is_none() {
                    continue;
                }

                match inputs.iter_mut().find(|i| i.attachment == input.attachment) {
                    Some(existing) => existing.last_subpass |= input.last_subpass,
                    None => inputs.push(input.clone()),
                }
            }

            // Inputs that read an attachment of the session read it in place, in the layouts the
            // session keeps it in.
            for input in &mut inputs {
                let session_reference = template
                    .color_attachments
                    .iter()
                    .chain(&template.depth_stencil_attachment)
                    .find(|reference| reference.attachment == input.attachment);

                if let Some(reference) = session_reference {
                    input.layout = reference.layout;
                    input.stencil_layout = reference.stencil_layout;
                }
            }

            subpass.input_attachments = inputs;
            subpass.init_rendering_info(&self.attachments)?;
            merged.push(subpass);
        }

        let block = self.push_subpass_block(merged)?;
        let mut old_blocks = try_vec(ctx.range().count())?;
        old_blocks.extend(ctx.range().map(|index| self.subpass_slots[index as usize].block));

        for old_block in old_blocks {
            self.release_subpass_block(old_block);
        }

        for (member, index) in ctx.range().enumerate() {
            self.subpass_slots[index as usize] = SubpassSlot {
                block,
                member,
                ownership: if member == 0 {
                    SubpassOwnership::Owns
                } else {
                    SubpassOwnership::Aliases
                },
            };
        }

        Ok(())
    }

    /// Builds the subpass content shared by every member of the range of `ctx`, without input
    /// attachments.
    fn merged_template(&self, ctx: &MergingContext) -> Result<Subpass, OomError> {
        let first = self.subpass(ctx.first_subpass);
        let color_count = last_bit(ctx.used_color_mask) as usize;

        let mut template = first.clone();
        template.input_attachments = Vec::new();
        template.color_attachments = try_vec(color_count)?;
        template.color_resolve_attachments = Vec::new();
        template.depth_stencil_attachment = None;
        template.depth_stencil_resolve_attachment = None;
        template.depth_resolve_mode = ResolveMode::None;
        template.stencil_resolve_mode = ResolveMode::None;
        template.view_mask = 0;
        template.pipeline_flags = PipelineCreateFlags::empty();

        // Depth wins over stencil when both were introduced by different subpasses.
        let depth_stencil_subpass = ctx.depth.subpass.or(ctx.stencil.subpass);
        template.depth_stencil_attachment = depth_stencil_subpass
            .and_then(|index| self.subpass(index).depth_stencil_attachment.clone());

        let mut has_color_resolves = false;

        for index in ctx.range() {
            let subpass = self.subpass(index);
            template.view_mask |= subpass.view_mask;
            has_color_resolves |= !subpass.color_resolve_attachments.is_empty();

            if template.depth_stencil_resolve_attachment.is_none() {
                if let Some(resolve) = &subpass.depth_stencil_resolve_attachment {
                    template.depth_stencil_resolve_attachment = Some(resolve.clone());

                    if let Some(depth_stencil) = &mut template.depth_stencil_attachment {
                        depth_stencil.resolve = Some(ResolveTarget::DepthStencil);
                    }
                }
            }

            if subpass.depth_resolve_mode != ResolveMode::None {
                template.depth_resolve_mode = subpass.depth_resolve_mode;
            }

            if subpass.stencil_resolve_mode != ResolveMode::None {
                template.stencil_resolve_mode = subpass.stencil_resolve_mode;
            }
        }

        template.color_attachments.resize(
            color_count,
            SubpassAttachment::unused(AttachmentUsage::Color),
        );

        if has_color_resolves {
            template.color_resolve_attachments = try_vec(color_count)?;
            template.color_resolve_attachments.resize(
                color_count,
                SubpassAttachment::unused(AttachmentUsage::TransferDst),
            );
        }

        for slot in 0..color_count {
            let merged = ctx.colors[slot];
            let Some(index) = merged.subpass else {
                continue;
            };
            let subpass = self.subpass(index);
            let mut color = subpass.color_attachments[merged.index as usize].clone();
            color.resolve = None;

            if let Some(resolve) = subpass
                .color_resolve_attachments
                .get(merged.index as usize)
                .filter(|resolve| resolve.attachment.is_some())
            {
                template.color_resolve_attachments[slot] = resolve.clone();
                color.resolve = Some(ResolveTarget::Color(slot as u32));
            }

            template.color_attachments[slot] = color;
        }

        // Any input attachment that is also an attachment of the session reads it in place, so
        // the session keeps it in the feedback-loop layout from the start.
        for index in ctx.range() {
            for input in &self.subpass(index).input_attachments {
                let Some(attachment) = input.attachment else {
                    continue;
                };

                for color in template
                    .color_attachments
                    .iter_mut()
                    .filter(|color| color.attachment == Some(attachment))
                {
                    color.layout = ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT;
                    template.pipeline_flags |=
                        PipelineCreateFlags::COLOR_ATTACHMENT_FEEDBACK_LOOP_EXT;
                }

                let Some(depth_stencil) = template
                    .depth_stencil_attachment
                    .as_mut()
                    .filter(|ds| ds.attachment == Some(attachment))
                else {
                    continue;
                };

                if input.aspects.contains(ImageAspectFlags::DEPTH)
                    && depth_stencil.aspects.contains(ImageAspectFlags::DEPTH)
                {
                    depth_stencil.layout = ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT;
                    template.pipeline_flags |=
                        PipelineCreateFlags::DEPTH_STENCIL_ATTACHMENT_FEEDBACK_LOOP_EXT;
                }

                if input.aspects.contains(ImageAspectFlags::STENCIL)
                    && depth_stencil.aspects.contains(ImageAspectFlags::STENCIL)
                {
                    depth_stencil.stencil_layout =
                        ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT;
                    template.pipeline_flags |=
                        PipelineCreateFlags::DEPTH_STENCIL_ATTACHMENT_FEEDBACK_LOOP_EXT;
                }
            }
        }

        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        device::Features,
        render_pass::{
            AttachmentDescription, AttachmentReference, MergeState, RenderPass,
            RenderPassCreateInfo, SubpassDependency, SubpassDescription, SubpassOwnership,
        },
        tests::CountingAllocator,
    };
    use ash::vk::{
        AccessFlags, DependencyFlags, Format, ImageAspectFlags, ImageLayout, PipelineCreateFlags,
        PipelineStageFlags,
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

    fn attachment(format: Format) -> AttachmentDescription {
        AttachmentDescription {
            format,
            final_layout: ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ..Default::default()
        }
    }

    fn by_region(src: u32, dst: u32) -> SubpassDependency {
        SubpassDependency {
            src_subpass: Some(src),
            dst_subpass: Some(dst),
            src_stages: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stages: PipelineStageFlags::FRAGMENT_SHADER,
            src_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access: AccessFlags::INPUT_ATTACHMENT_READ,
            dependency_flags: DependencyFlags::BY_REGION,
            ..Default::default()
        }
    }

    /// A chain where each subpass writes a new attachment and reads the previous one.
    fn chain_create_info(length: u32) -> RenderPassCreateInfo {
        RenderPassCreateInfo {
            attachments: (0..length)
                .map(|_| attachment(Format::R8G8B8A8_UNORM))
                .collect(),
            subpasses: (0..length)
                .map(|index| SubpassDescription {
                    input_attachments: if index == 0 {
                        Vec::new()
                    } else {
                        vec![input(index - 1)]
                    },
                    color_attachments: vec![color(index)],
                    ..Default::default()
                })
                .collect(),
            dependencies: (1..length).map(|index| by_region(index - 1, index)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn single_subpass_is_not_merged() {
        let device = device!(budget = 1 << 20);
        let render_pass = RenderPass::new(device, chain_create_info(1)).unwrap();

        assert_eq!(render_pass.subpass(0).merge_state(), MergeState::NotMerged);
        assert_eq!(render_pass.merged_range(0), 0..=0);

        let ctx = render_pass.next_mergeable_range(0, 0);
        assert_eq!(ctx.range(), 0..=0);
    }

    #[test]
    fn no_merging_without_tile_buffer() {
        let device = device!();
        let render_pass = RenderPass::new(device, chain_create_info(2)).unwrap();

        assert_eq!(render_pass.subpass(0).merge_state(), MergeState::NotMerged);
        assert_eq!(render_pass.subpass(1).merge_state(), MergeState::NotMerged);
        assert_eq!(render_pass.merged_range(1), 1..=1);
    }

    #[test]
    fn two_subpass_merge() {
        let _ = env_logger::builder().is_test(true).try_init();

        let device = device!(budget = 1 << 20);
        let render_pass = RenderPass::new(device, chain_create_info(2)).unwrap();

        assert_eq!(render_pass.merged_range(0), 0..=1);
        assert_eq!(render_pass.merged_range(1), 0..=1);
        assert_eq!(render_pass.subpass(0).merge_state(), MergeState::First);
        assert_eq!(render_pass.subpass(1).merge_state(), MergeState::Last);
        assert_eq!(render_pass.subpass_ownership(0), SubpassOwnership::Owns);
        assert_eq!(render_pass.subpass_ownership(1), SubpassOwnership::Aliases);

        // Both subpasses render to the union of the attachments.
        for index in 0..2 {
            let subpass = render_pass.subpass(index);
            let attachments: Vec<_> = subpass
                .color_attachments()
                .iter()
                .map(|c| c.attachment)
                .collect();
            assert_eq!(attachments, vec![Some(0), Some(1)]);
            assert_eq!(
                subpass.pipeline_rendering_info().color_attachment_formats,
                vec![Format::R8G8B8A8_UNORM, Format::R8G8B8A8_UNORM],
            );
        }

        // Output location 0 of each subpass writes its own attachment.
        assert_eq!(
            render_pass
                .subpass(0)
                .attachment_location_info()
                .color_attachment_locations,
            vec![Some(0), None],
        );
        assert_eq!(
            render_pass
                .subpass(1)
                .attachment_location_info()
                .color_attachment_locations,
            vec![None, Some(0)],
        );

        // Input 0 of subpass 1 reads color slot 0 in place.
        let second = render_pass.subpass(1);
        assert_eq!(second.input_attachments().len(), 1);
        assert_eq!(
            second
                .input_attachment_index_info()
                .color_attachment_for_input(0),
            Some(0),
        );
        assert!(render_pass.subpass(0).input_attachments().is_empty());
        assert!(render_pass
            .pipeline_create_flags(1)
            .contains(PipelineCreateFlags::COLOR_ATTACHMENT_FEEDBACK_LOOP_EXT));

        // The attachment read in place stays in one layout for the whole session.
        for index in 0..2 {
            let colors = render_pass.subpass(index).color_attachments();
            assert_eq!(colors[0].layout, ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT);
            assert_eq!(colors[1].layout, ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        }
        assert_eq!(
            second.input_attachments()[0].layout,
            ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT,
        );
    }

    #[test]
    fn maximal_run_is_merged() {
        let device = device!(budget = 1 << 20);
        let render_pass = RenderPass::new(device, chain_create_info(4)).unwrap();

        for index in 0..4 {
            assert_eq!(render_pass.merged_range(index), 0..=3);
        }

        assert_eq!(render_pass.subpass(0).merge_state(), MergeState::First);
        assert_eq!(render_pass.subpass(1).merge_state(), MergeState::Mid);
        assert_eq!(render_pass.subpass(2).merge_state(), MergeState::Mid);
        assert_eq!(render_pass.subpass(3).merge_state(), MergeState::Last);
        assert_eq!(render_pass.subpass(3).color_attachments().len(), 4);
    }

    #[test]
    fn tile_buffer_budget_boundary() {
        // Two RGBA8 attachments take 8 bytes per pixel, so 2048 bytes for a 16x16 tile.
        let device = device!(budget = 2048);
        let render_pass = RenderPass::new(device, chain_create_info(2)).unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=1);

        let device = device!(budget = 2047);
        let render_pass = RenderPass::new(device, chain_create_info(2)).unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=0);
        assert_eq!(render_pass.merged_range(1), 1..=1);
        assert_eq!(render_pass.subpass(0).merge_state(), MergeState::NotMerged);
    }

    #[test]
    fn over_budget_range_is_shrunk() {
        // Three attachments do not fit, two do.
        let device = device!(budget = 2048);
        let render_pass = RenderPass::new(device, chain_create_info(3)).unwrap();

        assert_eq!(render_pass.merged_range(0), 0..=1);
        assert_eq!(render_pass.merged_range(1), 0..=1);
        assert_eq!(render_pass.merged_range(2), 2..=2);
        assert_eq!(render_pass.subpass(2).merge_state(), MergeState::NotMerged);
    }

    #[test]
    fn unused_outputs_are_not_merged() {
        let device = device!(budget = 1 << 20);
        let render_pass = RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments: vec![
                    attachment(Format::R8G8B8A8_UNORM),
                    attachment(Format::R8G8B8A8_UNORM),
                ],
                subpasses: vec![
                    SubpassDescription {
                        color_attachments: vec![color(0)],
                        ..Default::default()
                    },
                    SubpassDescription {
                        color_attachments: vec![color(1)],
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(render_pass.merged_range(0), 0..=0);
        assert_eq!(render_pass.merged_range(1), 1..=1);
    }

    #[test]
    fn non_local_dependency_breaks_chain() {
        let device = device!(budget = 1 << 20);
        let mut create_info = chain_create_info(3);
        create_info.dependencies[1].dependency_flags = DependencyFlags::empty();

        let render_pass = RenderPass::new(device, create_info).unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=1);
        assert_eq!(render_pass.merged_range(2), 2..=2);
    }

    #[test]
    fn fragment_shading_rate_prevents_merging() {
        let device = device!(
            budget = 1 << 20,
            features = Features {
                fragment_shading_rate: true,
                ..Default::default()
            },
        );
        let mut create_info = chain_create_info(2);
        create_info.attachments.push(attachment(Format::R8_UINT));
        create_info.subpasses[1].fragment_shading_rate_attachment = Some(AttachmentReference {
            attachment: 2,
            layout: ImageLayout::FRAGMENT_SHADING_RATE_ATTACHMENT_OPTIMAL_KHR,
            ..Default::default()
        });
        create_info.subpasses[1].fragment_shading_rate_texel_size = [8, 8];

        let render_pass = RenderPass::new(device, create_info).unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=0);
    }

    #[test]
    fn color_slots_are_limited() {
        // Each subpass writes two new attachments, so only one fits with three slots.
        let device = device!(budget = 1 << 20, max_color_attachments = 3);
        let render_pass = RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments: (0..4).map(|_| attachment(Format::R8G8B8A8_UNORM)).collect(),
                subpasses: vec![
                    SubpassDescription {
                        color_attachments: vec![color(0), color(1)],
                        ..Default::default()
                    },
                    SubpassDescription {
                        input_attachments: vec![input(0)],
                        color_attachments: vec![color(2), color(3)],
                        ..Default::default()
                    },
                ],
                dependencies: vec![by_region(0, 1)],
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(render_pass.merged_range(0), 0..=0);
    }

    #[test]
    fn unused_color_slots_are_skipped() {
        let device = device!(budget = 1 << 20);
        let mut create_info = chain_create_info(2);
        create_info.subpasses[1].color_attachments = vec![None, color(1)];

        let render_pass = RenderPass::new(device, create_info).unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=1);
        assert_eq!(
            render_pass
                .subpass(1)
                .attachment_location_info()
                .color_attachment_locations,
            vec![None, Some(1)],
        );
    }

    #[test]
    fn merged_run_frees_one_block() {
        let allocator = Arc::new(CountingAllocator::default());
        let device = device!(budget = 1 << 20, allocator = allocator.clone());
        let render_pass = RenderPass::new(device, chain_create_info(3)).unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=2);

        // One block per subpass, then the merged block.
        assert_eq!(allocator.allocations(), 4);
        assert_eq!(allocator.frees(), 3);

        drop(render_pass);
        assert_eq!(allocator.frees(), 4);
        assert_eq!(allocator.live_bytes(), 0);
    }

    #[test]
    fn shared_depth_attachment() {
        let device = device!(budget = 1 << 20);
        let depth = Some(AttachmentReference {
            attachment: 2,
            layout: ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        });
        let mut create_info = chain_create_info(2);
        create_info.attachments.push(AttachmentDescription {
            format: Format::D24_UNORM_S8_UINT,
            ..Default::default()
        });
        create_info.subpasses[0].depth_stencil_attachment = depth;
        create_info.subpasses[1].depth_stencil_attachment = depth;

        let render_pass = RenderPass::new(device.clone(), create_info.clone()).unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=1);
        assert_eq!(
            render_pass
                .subpass(1)
                .depth_stencil_attachment()
                .and_then(|ds| ds.attachment),
            Some(2),
        );
        assert_eq!(
            render_pass
                .subpass(1)
                .pipeline_rendering_info()
                .stencil_attachment_format,
            Format::D24_UNORM_S8_UINT,
        );

        // A different depth attachment in the second subpass prevents merging.
        create_info.attachments.push(AttachmentDescription {
            format: Format::D24_UNORM_S8_UINT,
            ..Default::default()
        });
        create_info.subpasses[1].depth_stencil_attachment = Some(AttachmentReference {
            attachment: 3,
            layout: ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        });

        let render_pass = RenderPass::new(device, create_info).unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=0);
    }

    #[test]
    fn depth_read_as_input_in_merged_run() {
        let device = device!(budget = 1 << 20);
        let mut create_info = chain_create_info(2);
        create_info.attachments.push(AttachmentDescription {
            format: Format::D24_UNORM_S8_UINT,
            ..Default::default()
        });
        create_info.subpasses[0].depth_stencil_attachment = Some(AttachmentReference {
            attachment: 2,
            layout: ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        });
        create_info.subpasses[1]
            .input_attachments
            .push(Some(AttachmentReference {
                attachment: 2,
                layout: ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
                aspects: ImageAspectFlags::DEPTH,
                ..Default::default()
            }));

        let render_pass = RenderPass::new(device, create_info).unwrap();
        assert_eq!(render_pass.merged_range(0), 0..=1);

        // Only the depth aspect is read, so only its layout becomes the feedback-loop one.
        for index in 0..2 {
            let depth_stencil = render_pass
                .subpass(index)
                .depth_stencil_attachment()
                .unwrap();
            assert_eq!(
                depth_stencil.layout,
                ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT,
            );
            assert_eq!(
                depth_stencil.stencil_layout,
                ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            );
        }

        let input = &render_pass.subpass(1).input_attachments()[1];
        assert_eq!(input.attachment, Some(2));
        assert_eq!(input.layout, ImageLayout::ATTACHMENT_FEEDBACK_LOOP_OPTIMAL_EXT);
        assert_eq!(input.stencil_layout, ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert!(render_pass
            .pipeline_create_flags(1)
            .contains(PipelineCreateFlags::DEPTH_STENCIL_ATTACHMENT_FEEDBACK_LOOP_EXT));
    }
}
