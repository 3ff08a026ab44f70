// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Description of the steps of the rendering process, and the images used as input or output.
//!
//! # Render passes on top of dynamic rendering
//!
//! A *render pass* describes the overall process of drawing a frame. It is subdivided into one or
//! more subpasses, each with its own set of attachments, and declares the dependencies between
//! them. This module turns that declarative description into the information needed to execute
//! every subpass as a dynamic rendering session:
//!
//! - Every attachment reference is normalized: its aspects are known, its stencil layout is
//!   explicit, and color and depth/stencil attachments are linked to their resolve attachments.
//! - Attachments that are read as input attachments while being written in the same subpass are
//!   put in the feedback-loop layout.
//! - Each reference knows for which views it is the last use of its attachment, which decides the
//!   store operation when recording.
//! - If the device has a tile buffer, runs of consecutive subpasses whose attachments fit in it are
//!   merged so that they are executed as a single rendering session. The subpasses of such a run
//!   share their attachments, and each of them remaps its color outputs and input attachments
//!   onto the shared set.
//!
//! The per-subpass information needed by pipeline creation and by secondary command buffers is
//! computed once here and exposed through [`Subpass`].

pub use self::{
    create::{
        AttachmentDescription, AttachmentReference, DependencyMemoryBarrier,
        FragmentDensityMapAttachment, RenderPassCreateInfo, SubpassDependency,
        SubpassDescription,
    },
    legacy::{
        InputAttachmentAspectReference, LegacyAttachmentReference, LegacyRenderPassCreateInfo,
        LegacySubpassDependency, LegacySubpassDescription, RenderPassMultiviewCreateInfo,
    },
};
use crate::{
    alloc::{try_vec, AllocationScope},
    device::Device,
    format::FormatExt,
    OomError,
};
use ash::vk::{
    AccessFlags2, DependencyFlags, Format, ImageAspectFlags, ImageLayout, ImageUsageFlags,
    PipelineCreateFlags, PipelineStageFlags2, RenderingFlags, SampleCountFlags,
};
use std::{alloc::Layout, ops::RangeInclusive, sync::Arc};

#[macro_use]
mod macros;
mod create;
mod legacy;
mod merge;

/// An object representing the discrete steps in which rendering is done.
///
/// A render pass is made up of three parts:
/// - A list of attachments, which are image views that are inputs, outputs or intermediate stages
///   in the rendering process.
/// - One or more subpasses, which are the steps in which the rendering process takes place, and
///   the attachments that are used for each step.
/// - Dependencies, which describe how the input and output data of each subpass is to be passed
///   from one subpass to the next.
///
/// The subpasses are stored in blocks. A subpass that was not merged has a block of its own. The
/// subpasses of a merged run share one block, which is owned by the slot of the first subpass of
/// the run; the other slots only alias it.
#[derive(Debug)]
pub struct RenderPass {
    device: Arc<Device>,

    attachments: Vec<RenderPassAttachment>,
    subpass_blocks: Vec<SubpassBlock>,
    subpass_slots: Vec<SubpassSlot>,
    dependencies: Vec<Dependency>,
    correlated_view_masks: Vec<u32>,

    view_mask: u32,
    is_multiview: bool,
    fragment_density_map: Option<FragmentDensityMapAttachment>,
}

impl RenderPass {
    /// Returns the device the render pass was created for.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Returns the attachments of the render pass.
    #[inline]
    pub fn attachments(&self) -> &[RenderPassAttachment] {
        &self.attachments
    }

    /// Returns the number of subpasses.
    #[inline]
    pub fn subpass_count(&self) -> u32 {
        self.subpass_slots.len() as u32
    }

    /// Returns the subpass at `index`.
    ///
    /// The subpasses of a merged run return the same attachments, but their own merge state,
    /// input attachments and remapping tables.
    ///
    /// # Panics
    ///
    /// - Panics if `index` is not less than the number of subpasses.
    #[inline]
    pub fn subpass(&self, index: u32) -> &Subpass {
        let slot = self.subpass_slots[index as usize];
        &self.subpass_blocks[slot.block].subpasses[slot.member]
    }

    /// Returns an iterator over the subpasses, in order.
    #[inline]
    pub fn subpasses(&self) -> impl ExactSizeIterator<Item = &Subpass> {
        self.subpass_slots
            .iter()
            .map(move |slot| &self.subpass_blocks[slot.block].subpasses[slot.member])
    }

    /// Returns whether the slot of the subpass at `index` owns its block or aliases the block of
    /// an earlier subpass of the same merged run.
    #[inline]
    pub fn subpass_ownership(&self, index: u32) -> SubpassOwnership {
        self.subpass_slots[index as usize].ownership
    }

    /// Returns the range of subpasses that are executed in the same rendering session as the
    /// subpass at `index`.
    ///
    /// For a subpass that was not merged, this is `index..=index`.
    #[inline]
    pub fn merged_range(&self, index: u32) -> RangeInclusive<u32> {
        let slot = self.subpass_slots[index as usize];
        let first = index - slot.member as u32;
        let len = self.subpass_blocks[slot.block].subpasses.len() as u32;

        first..=first + len - 1
    }

    /// Returns the dependencies of the render pass.
    #[inline]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Returns the correlated view masks of the render pass.
    #[inline]
    pub fn correlated_view_masks(&self) -> &[u32] {
        &self.correlated_view_masks
    }

    /// Returns the union of the view masks of all subpasses.
    ///
    /// For a render pass without multiview, this is `1`.
    #[inline]
    pub fn view_mask(&self) -> u32 {
        self.view_mask
    }

    /// Returns whether the subpasses were declared with non-zero view masks.
    #[inline]
    pub fn is_multiview(&self) -> bool {
        self.is_multiview
    }

    /// Returns the fragment density map attachment of the render pass, if any.
    #[inline]
    pub fn fragment_density_map(&self) -> Option<&FragmentDensityMapAttachment> {
        self.fragment_density_map.as_ref()
    }

    /// Returns the flags that a graphics pipeline used in the subpass at `index` must be created
    /// with.
    #[inline]
    pub fn pipeline_create_flags(&self, index: u32) -> PipelineCreateFlags {
        let mut flags = self.subpass(index).pipeline_flags;

        if self.fragment_density_map.is_some() {
            flags |= PipelineCreateFlags::RENDERING_FRAGMENT_DENSITY_MAP_ATTACHMENT_EXT;
        }

        flags
    }

    /// Adds a block holding `subpasses`, reporting its allocation to the device's allocator.
    ///
    /// Nothing is modified if the allocation is refused.
    pub(crate) fn push_subpass_block(
        &mut self,
        subpasses: Vec<Subpass>,
    ) -> Result<usize, OomError> {
        let layout =
            Layout::array::<Subpass>(subpasses.len()).map_err(|_| OomError::OutOfHostMemory)?;
        self.subpass_blocks.try_reserve(1)?;
        self.device
            .allocator()
            .allocate(layout, AllocationScope::Object)?;

        self.subpass_blocks.push(SubpassBlock {
            subpasses,
            layout: Some(layout),
        });

        Ok(self.subpass_blocks.len() - 1)
    }

    /// Reports the block at `index` as freed and drops its subpasses.
    ///
    /// The block stays in the arena, empty, until `compact_subpass_blocks` is called.
    pub(crate) fn release_subpass_block(&mut self, index: usize) {
        let block = &mut self.subpass_blocks[index];

        if let Some(layout) = block.layout.take() {
            self.device
                .allocator()
                .free(layout, AllocationScope::Object);
        }

        block.subpasses = Vec::new();
    }

    /// Removes released blocks from the arena.
    pub(crate) fn compact_subpass_blocks(&mut self) -> Result<(), OomError> {
        let mut remap = try_vec(self.subpass_blocks.len())?;
        let mut next = 0;

        for block in &self.subpass_blocks {
            remap.push(next);

            if block.layout.is_some() {
                next += 1;
            }
        }

        self.subpass_blocks.retain(|block| block.layout.is_some());

        for slot in &mut self.subpass_slots {
            slot.block = remap[slot.block];
        }

        Ok(())
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        // Blocks that were released by merging have already been reported.
        for slot in &self.subpass_slots {
            if slot.ownership != SubpassOwnership::Owns {
                continue;
            }

            if let Some(layout) = self.subpass_blocks[slot.block].layout {
                self.device
                    .allocator()
                    .free(layout, AllocationScope::Object);
            }
        }
    }
}

/// A block of subpasses in the arena of a render pass.
#[derive(Debug)]
pub(crate) struct SubpassBlock {
    pub(crate) subpasses: Vec<Subpass>,
    // `None` once the block has been released.
    pub(crate) layout: Option<Layout>,
}

/// A subpass index of a render pass, pointing into the block arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SubpassSlot {
    pub(crate) block: usize,
    pub(crate) member: usize,
    pub(crate) ownership: SubpassOwnership,
}

/// Whether a subpass slot is responsible for freeing the block it points to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubpassOwnership {
    /// The slot owns the block. This is the case for unmerged subpasses and for the first subpass
    /// of a merged run.
    Owns,
    /// The slot points to a block owned by an earlier slot.
    Aliases,
}

/// An attachment of a render pass, after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderPassAttachment {
    /// The format of the image that will be attached.
    pub format: Format,

    /// The aspects of the format.
    pub aspects: ImageAspectFlags,

    /// The number of samples of the image that will be attached.
    pub samples: SampleCountFlags,

    /// The union of the view masks of all the subpasses that reference the attachment.
    pub view_mask: u32,

    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,

    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,

    /// `UNDEFINED` if the format has no stencil aspect.
    pub stencil_initial_layout: ImageLayout,
    /// `UNDEFINED` if the format has no stencil aspect.
    pub stencil_final_layout: ImageLayout,
}

impl RenderPassAttachment {
    /// Returns the load operations of the aspects of the attachment that are in `aspects`.
    pub(crate) fn load_ops(&self, aspects: ImageAspectFlags) -> impl Iterator<Item = LoadOp> {
        let color_or_depth = aspects
            .intersects(ImageAspectFlags::COLOR | ImageAspectFlags::DEPTH)
            .then_some(self.load_op);
        let stencil = aspects
            .contains(ImageAspectFlags::STENCIL)
            .then_some(self.stencil_load_op);

        color_or_depth.into_iter().chain(stencil)
    }
}

/// How a subpass uses one of its attachment references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentUsage {
    /// Destination of a resolve operation.
    TransferDst,
    Input,
    Color,
    DepthStencil,
    FragmentShadingRate,
}

impl From<AttachmentUsage> for ImageUsageFlags {
    #[inline]
    fn from(val: AttachmentUsage) -> Self {
        match val {
            AttachmentUsage::TransferDst => ImageUsageFlags::TRANSFER_DST,
            AttachmentUsage::Input => ImageUsageFlags::INPUT_ATTACHMENT,
            AttachmentUsage::Color => ImageUsageFlags::COLOR_ATTACHMENT,
            AttachmentUsage::DepthStencil => ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            AttachmentUsage::FragmentShadingRate => {
                ImageUsageFlags::FRAGMENT_SHADING_RATE_ATTACHMENT_KHR
            }
        }
    }
}

/// Identifies the resolve attachment of a subpass that another attachment resolves into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolveTarget {
    /// The color resolve attachment at this index.
    Color(u32),
    /// The depth/stencil resolve attachment.
    DepthStencil,
}

/// A reference from a subpass to an attachment of its render pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubpassAttachment {
    /// The index of the attachment, or `None` for an unused slot.
    pub attachment: Option<u32>,

    /// The aspects of the attachment that are accessed. Input attachments may select a subset of
    /// the aspects of the format.
    pub aspects: ImageAspectFlags,

    pub usage: AttachmentUsage,

    pub layout: ImageLayout,

    /// `UNDEFINED` if the attachment has no stencil aspect.
    pub stencil_layout: ImageLayout,

    /// The views for which this is the last use of the attachment in the render pass, in the
    /// original subpass numbering.
    pub last_subpass: u32,

    /// The resolve attachment of the same subpass that this attachment is resolved into.
    pub resolve: Option<ResolveTarget>,
}

impl SubpassAttachment {
    pub(crate) fn unused(usage: AttachmentUsage) -> Self {
        SubpassAttachment {
            attachment: None,
            aspects: ImageAspectFlags::empty(),
            usage,
            layout: ImageLayout::UNDEFINED,
            stencil_layout: ImageLayout::UNDEFINED,
            last_subpass: 0,
            resolve: None,
        }
    }
}

/// Position of a subpass within a merged run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MergeState {
    NotMerged,
    First,
    Mid,
    Last,
}

impl MergeState {
    /// Returns whether a new rendering session starts with this subpass.
    #[inline]
    pub fn begins_rendering(self) -> bool {
        matches!(self, MergeState::NotMerged | MergeState::First)
    }

    /// Returns whether the rendering session ends with this subpass.
    #[inline]
    pub fn ends_rendering(self) -> bool {
        matches!(self, MergeState::NotMerged | MergeState::Last)
    }
}

/// A subpass of a render pass, after creation and merging.
#[derive(Clone, Debug)]
pub struct Subpass {
    pub(crate) view_mask: u32,

    pub(crate) input_attachments: Vec<SubpassAttachment>,
    pub(crate) color_attachments: Vec<SubpassAttachment>,
    pub(crate) color_resolve_attachments: Vec<SubpassAttachment>,
    pub(crate) depth_stencil_attachment: Option<SubpassAttachment>,
    pub(crate) depth_stencil_resolve_attachment: Option<SubpassAttachment>,
    pub(crate) fragment_shading_rate_attachment: Option<SubpassAttachment>,
    pub(crate) fragment_shading_rate_texel_size: [u32; 2],

    pub(crate) depth_resolve_mode: ResolveMode,
    pub(crate) stencil_resolve_mode: ResolveMode,
    pub(crate) legacy_dithering_enabled: bool,
    pub(crate) multisampled_render_to_single_sampled: Option<SampleCountFlags>,

    pub(crate) pipeline_flags: PipelineCreateFlags,
    pub(crate) merged: MergeState,

    pub(crate) input_attachment_index_info: InputAttachmentIndexInfo,
    pub(crate) attachment_location_info: AttachmentLocationInfo,
    pub(crate) pipeline_rendering_info: PipelineRenderingInfo,
    pub(crate) inheritance_rendering_info: InheritanceRenderingInfo,
    pub(crate) sample_count_info: AttachmentSampleCountInfo,
}

impl Subpass {
    /// Returns the views rendered by the subpass. Never 0; `1` without multiview.
    #[inline]
    pub fn view_mask(&self) -> u32 {
        self.view_mask
    }

    #[inline]
    pub fn input_attachments(&self) -> &[SubpassAttachment] {
        &self.input_attachments
    }

    #[inline]
    pub fn color_attachments(&self) -> &[SubpassAttachment] {
        &self.color_attachments
    }

    /// Returns the color resolve attachments. Either empty, or as long as `color_attachments`.
    #[inline]
    pub fn color_resolve_attachments(&self) -> &[SubpassAttachment] {
        &self.color_resolve_attachments
    }

    #[inline]
    pub fn depth_stencil_attachment(&self) -> Option<&SubpassAttachment> {
        self.depth_stencil_attachment.as_ref()
    }

    #[inline]
    pub fn depth_stencil_resolve_attachment(&self) -> Option<&SubpassAttachment> {
        self.depth_stencil_resolve_attachment.as_ref()
    }

    #[inline]
    pub fn fragment_shading_rate_attachment(&self) -> Option<&SubpassAttachment> {
        self.fragment_shading_rate_attachment.as_ref()
    }

    #[inline]
    pub fn fragment_shading_rate_texel_size(&self) -> [u32; 2] {
        self.fragment_shading_rate_texel_size
    }

    #[inline]
    pub fn depth_resolve_mode(&self) -> ResolveMode {
        self.depth_resolve_mode
    }

    #[inline]
    pub fn stencil_resolve_mode(&self) -> ResolveMode {
        self.stencil_resolve_mode
    }

    #[inline]
    pub fn legacy_dithering_enabled(&self) -> bool {
        self.legacy_dithering_enabled
    }

    /// Returns the rasterization sample count if multisampled rendering to single-sampled
    /// attachments is enabled.
    #[inline]
    pub fn multisampled_render_to_single_sampled(&self) -> Option<SampleCountFlags> {
        self.multisampled_render_to_single_sampled
    }

    #[inline]
    pub fn merge_state(&self) -> MergeState {
        self.merged
    }

    /// Returns every attachment reference slot of the subpass, including unused ones.
    ///
    /// The order is always: input, color, color resolve, depth/stencil, depth/stencil resolve,
    /// fragment shading rate.
    pub fn attachments(&self) -> impl Iterator<Item = &SubpassAttachment> {
        self.input_attachments
            .iter()
            .chain(&self.color_attachments)
            .chain(&self.color_resolve_attachments)
            .chain(&self.depth_stencil_attachment)
            .chain(&self.depth_stencil_resolve_attachment)
            .chain(&self.fragment_shading_rate_attachment)
    }

    /// Same as `attachments`, mutably.
    pub(crate) fn attachments_mut(&mut self) -> impl Iterator<Item = &mut SubpassAttachment> {
        self.input_attachments
            .iter_mut()
            .chain(&mut self.color_attachments)
            .chain(&mut self.color_resolve_attachments)
            .chain(&mut self.depth_stencil_attachment)
            .chain(&mut self.depth_stencil_resolve_attachment)
            .chain(&mut self.fragment_shading_rate_attachment)
    }

    /// Returns the attachment that `target` designates.
    #[inline]
    pub fn resolve_attachment(&self, target: ResolveTarget) -> Option<&SubpassAttachment> {
        match target {
            ResolveTarget::Color(index) => self.color_resolve_attachments.get(index as usize),
            ResolveTarget::DepthStencil => self.depth_stencil_resolve_attachment.as_ref(),
        }
    }

    /// Returns, for each color attachment, the input attachment that reads it in the same
    /// subpass, and the same for the depth and stencil aspects.
    #[inline]
    pub fn input_attachment_index_info(&self) -> &InputAttachmentIndexInfo {
        &self.input_attachment_index_info
    }

    /// Returns, for each color attachment of the rendering session, the fragment output location
    /// that writes it.
    #[inline]
    pub fn attachment_location_info(&self) -> &AttachmentLocationInfo {
        &self.attachment_location_info
    }

    /// Returns what a graphics pipeline used in this subpass must be created with.
    #[inline]
    pub fn pipeline_rendering_info(&self) -> &PipelineRenderingInfo {
        &self.pipeline_rendering_info
    }

    /// Returns what a secondary command buffer executed in this subpass inherits.
    #[inline]
    pub fn inheritance_rendering_info(&self) -> &InheritanceRenderingInfo {
        &self.inheritance_rendering_info
    }

    #[inline]
    pub fn sample_count_info(&self) -> &AttachmentSampleCountInfo {
        &self.sample_count_info
    }

    /// Sets every color attachment to be written by the output location with the same index.
    pub(crate) fn init_identity_locations(&mut self) -> Result<(), OomError> {
        let color_count = self.color_attachments.len();
        let mut locations = try_vec(color_count)?;
        locations.extend((0..color_count as u32).map(Some));
        self.attachment_location_info.color_attachment_locations = locations;

        Ok(())
    }

    /// Computes the information exposed to pipelines and secondary command buffers from the
    /// attachments of the subpass. The color locations are left untouched.
    pub(crate) fn init_rendering_info(
        &mut self,
        attachments: &[RenderPassAttachment],
    ) -> Result<(), OomError> {
        let color_count = self.color_attachments.len();
        let mut color_formats = try_vec(color_count)?;
        let mut color_samples = try_vec(color_count)?;

        for color in &self.color_attachments {
            match color.attachment {
                Some(attachment) => {
                    let attachment = &attachments[attachment as usize];
                    color_formats.push(attachment.format);
                    color_samples.push(attachment.samples);
                }
                None => {
                    color_formats.push(Format::UNDEFINED);
                    color_samples.push(SampleCountFlags::TYPE_1);
                }
            }
        }

        let mut depth_format = Format::UNDEFINED;
        let mut stencil_format = Format::UNDEFINED;
        let mut depth_stencil_samples = SampleCountFlags::TYPE_1;

        if let Some(attachment) = self
            .depth_stencil_attachment
            .as_ref()
            .and_then(|ds| ds.attachment)
        {
            let attachment = &attachments[attachment as usize];

            if attachment.format.has_depth() {
                depth_format = attachment.format;
            }

            if attachment.format.has_stencil() {
                stencil_format = attachment.format;
            }

            depth_stencil_samples = attachment.samples;
        }

        let mut rasterization_samples = SampleCountFlags::empty();

        if depth_format != Format::UNDEFINED || stencil_format != Format::UNDEFINED {
            rasterization_samples |= depth_stencil_samples;
        }

        for (&format, &samples) in color_formats.iter().zip(&color_samples) {
            if format != Format::UNDEFINED {
                rasterization_samples |= samples;
            }
        }

        let mut inheritance_color_formats = try_vec(color_count)?;
        inheritance_color_formats.extend_from_slice(&color_formats);

        self.input_attachment_index_info = InputAttachmentIndexInfo::compute(self)?;
        self.sample_count_info = AttachmentSampleCountInfo {
            color_attachment_samples: color_samples,
            depth_stencil_attachment_samples: depth_stencil_samples,
        };
        self.inheritance_rendering_info = InheritanceRenderingInfo {
            flags: RenderingFlags::CONTENTS_SECONDARY_COMMAND_BUFFERS,
            view_mask: self.view_mask,
            color_attachment_formats: inheritance_color_formats,
            depth_attachment_format: depth_format,
            stencil_attachment_format: stencil_format,
            rasterization_samples,
        };
        self.pipeline_rendering_info = PipelineRenderingInfo {
            view_mask: self.view_mask,
            color_attachment_formats: color_formats,
            depth_attachment_format: depth_format,
            stencil_attachment_format: stencil_format,
        };

        Ok(())
    }
}

/// Formats that a graphics pipeline used in a subpass must be created with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineRenderingInfo {
    pub view_mask: u32,
    /// `UNDEFINED` for unused color slots.
    pub color_attachment_formats: Vec<Format>,
    pub depth_attachment_format: Format,
    pub stencil_attachment_format: Format,
}

/// For each color attachment and for the depth and stencil aspects, the index of the input
/// attachment that reads the same attachment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputAttachmentIndexInfo {
    pub color_attachment_input_indices: Vec<Option<u32>>,
    pub depth_input_attachment_index: Option<u32>,
    pub stencil_input_attachment_index: Option<u32>,
}

impl InputAttachmentIndexInfo {
    fn compute(subpass: &Subpass) -> Result<Self, OomError> {
        let find_input = |attachment: u32| {
            subpass
                .input_attachments
                .iter()
                .rposition(|input| input.attachment == Some(attachment))
                .map(|index| index as u32)
        };

        let mut color_attachment_input_indices = try_vec(subpass.color_attachments.len())?;
        color_attachment_input_indices.extend(
            subpass
                .color_attachments
                .iter()
                .map(|color| color.attachment.and_then(find_input)),
        );

        let mut info = InputAttachmentIndexInfo {
            color_attachment_input_indices,
            depth_input_attachment_index: None,
            stencil_input_attachment_index: None,
        };

        if let Some(ds) = &subpass.depth_stencil_attachment {
            if let Some(input) = ds.attachment.and_then(find_input) {
                if ds.aspects.contains(ImageAspectFlags::DEPTH) {
                    info.depth_input_attachment_index = Some(input);
                }

                if ds.aspects.contains(ImageAspectFlags::STENCIL) {
                    info.stencil_input_attachment_index = Some(input);
                }
            }
        }

        Ok(info)
    }

    /// Returns the color attachment that the input attachment `input_index` reads, if it reads
    /// one.
    #[inline]
    pub fn color_attachment_for_input(&self, input_index: u32) -> Option<u32> {
        self.color_attachment_input_indices
            .iter()
            .position(|&index| index == Some(input_index))
            .map(|slot| slot as u32)
    }
}

/// For each color attachment of a rendering session, the fragment output location that writes
/// it, or `None` if the subpass does not write it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttachmentLocationInfo {
    pub color_attachment_locations: Vec<Option<u32>>,
}

impl AttachmentLocationInfo {
    /// Returns the color attachment of the rendering session that output `location` writes.
    #[inline]
    pub fn color_attachment_for_location(&self, location: u32) -> Option<u32> {
        self.color_attachment_locations
            .iter()
            .position(|&l| l == Some(location))
            .map(|slot| slot as u32)
    }
}

/// Rendering state that secondary command buffers executed in a subpass inherit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InheritanceRenderingInfo {
    pub flags: RenderingFlags,
    pub view_mask: u32,
    pub color_attachment_formats: Vec<Format>,
    pub depth_attachment_format: Format,
    pub stencil_attachment_format: Format,
    /// The union of the sample counts of the used attachments.
    pub rasterization_samples: SampleCountFlags,
}

/// Sample counts of the attachments of a subpass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttachmentSampleCountInfo {
    pub color_attachment_samples: Vec<SampleCountFlags>,
    pub depth_stencil_attachment_samples: SampleCountFlags,
}

/// A dependency between two subpasses, or between a subpass and the commands outside the render
/// pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    /// The source subpass, or `None` for the commands before the render pass.
    pub src_subpass: Option<u32>,
    /// The destination subpass, or `None` for the commands after the render pass.
    pub dst_subpass: Option<u32>,
    pub src_stages: PipelineStageFlags2,
    pub dst_stages: PipelineStageFlags2,
    pub src_access: AccessFlags2,
    pub dst_access: AccessFlags2,
    pub flags: DependencyFlags,
    /// For view-local dependencies, the offset from a destination view to the source view.
    pub view_offset: i32,
}

impl Dependency {
    /// Returns whether the dependency only involves framebuffer-space stages and is by region,
    /// so that it can be satisfied without leaving the tile.
    pub fn is_framebuffer_local(&self) -> bool {
        const FRAMEBUFFER_SPACE_STAGES: PipelineStageFlags2 = PipelineStageFlags2::from_raw(
            PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw()
                | PipelineStageFlags2::FRAGMENT_SHADER.as_raw()
                | PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw()
                | PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT.as_raw(),
        );

        self.flags.contains(DependencyFlags::BY_REGION)
            && FRAMEBUFFER_SPACE_STAGES.contains(self.src_stages)
            && FRAMEBUFFER_SPACE_STAGES.contains(self.dst_stages)
    }
}

/// Describes what the implementation should do with an attachment at the start of the subpass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
#[non_exhaustive]
pub enum LoadOp {
    /// The content of the attachment will be loaded from memory. This is what you want if you want
    /// to draw over something existing.
    ///
    /// While this is the most intuitive option, it is also the slowest because it uses a lot of
    /// memory bandwidth.
    Load = ash::vk::AttachmentLoadOp::LOAD.as_raw(),

    /// The content of the attachment will be filled by the implementation with a uniform value
    /// that you must provide when you start drawing.
    ///
    /// This is what you usually use at the start of a frame, in order to reset the content of
    /// the color, depth and/or stencil buffers.
    Clear = ash::vk::AttachmentLoadOp::CLEAR.as_raw(),

    /// The attachment will have undefined content.
    ///
    /// This is what you should use for attachments that you intend to entirely cover with draw
    /// commands.
    /// If you are going to fill the attachment with a uniform value, it is better to use `Clear`
    /// instead.
    DontCare = ash::vk::AttachmentLoadOp::DONT_CARE.as_raw(),

    /// The attachment is not accessed at the start of the subpass.
    None = ash::vk::AttachmentLoadOp::NONE_EXT.as_raw(),
}

impl From<LoadOp> for ash::vk::AttachmentLoadOp {
    #[inline]
    fn from(val: LoadOp) -> Self {
        Self::from_raw(val as i32)
    }
}

/// Describes what the implementation should do with an attachment after all the subpasses have
/// completed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
#[non_exhaustive]
pub enum StoreOp {
    /// The attachment will be stored. This is what you usually want.
    ///
    /// While this is the most intuitive option, it is also slower than `DontCare` because it can
    /// take time to write the data back to memory.
    Store = ash::vk::AttachmentStoreOp::STORE.as_raw(),

    /// What happens is implementation-specific.
    ///
    /// This is purely an optimization compared to `Store`. The implementation doesn't need to copy
    /// from the internal cache to the memory, which saves memory bandwidth.
    ///
    /// This doesn't mean that the data won't be copied, as an implementation is also free to not
    /// use a cache and write the output directly in memory. In other words, the content of the
    /// image will be undefined.
    DontCare = ash::vk::AttachmentStoreOp::DONT_CARE.as_raw(),

    /// The attachment is not written at the end of the subpass.
    None = ash::vk::AttachmentStoreOp::NONE.as_raw(),
}

impl From<StoreOp> for ash::vk::AttachmentStoreOp {
    #[inline]
    fn from(val: StoreOp) -> Self {
        Self::from_raw(val as i32)
    }
}

/// Possible resolve modes for attachments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
#[non_exhaustive]
pub enum ResolveMode {
    None = ash::vk::ResolveModeFlags::NONE.as_raw(),
    SampleZero = ash::vk::ResolveModeFlags::SAMPLE_ZERO.as_raw(),
    Average = ash::vk::ResolveModeFlags::AVERAGE.as_raw(),
    Min = ash::vk::ResolveModeFlags::MIN.as_raw(),
    Max = ash::vk::ResolveModeFlags::MAX.as_raw(),
}

impl From<ResolveMode> for ash::vk::ResolveModeFlags {
    #[inline]
    fn from(val: ResolveMode) -> Self {
        Self::from_raw(val as u32)
    }
}
