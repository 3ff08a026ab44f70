// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Creation of render passes from the original, single-reference-list description.
//!
//! In this form, attachment references and subpass indices use sentinel values instead of
//! `Option`, multiview and input attachment aspects are described by separate lists covering the
//! whole render pass, and there are no stencil layouts, resolve modes or extended barriers.

use super::{
    AttachmentDescription, AttachmentReference, FragmentDensityMapAttachment, RenderPass,
    RenderPassCreateInfo, SubpassDependency, SubpassDescription,
};
use crate::{
    alloc::{try_vec, AllocationScope, HostAllocation},
    device::Device,
    format::FormatExt,
    NonExhaustive, OomError, ATTACHMENT_UNUSED, SUBPASS_EXTERNAL,
};
use ash::vk::{AccessFlags, DependencyFlags, ImageAspectFlags, ImageLayout, PipelineStageFlags};
use std::sync::Arc;

impl RenderPass {
    /// Creates a new `RenderPass` from a legacy description.
    ///
    /// The description is translated to a [`RenderPassCreateInfo`], then [`RenderPass::new`] is
    /// called. Input attachments read all the aspects of their format unless
    /// `input_attachment_aspects` says otherwise.
    ///
    /// # Panics
    ///
    /// - In debug builds, panics if the multiview lists or the aspect references don't match the
    ///   subpasses and dependencies.
    pub fn from_legacy(
        device: Arc<Device>,
        create_info: LegacyRenderPassCreateInfo,
    ) -> Result<Arc<RenderPass>, OomError> {
        let reference_count = create_info
            .subpasses
            .iter()
            .map(LegacySubpassDescription::reference_count)
            .sum();

        // Only reports the memory of the translated references to the device allocator, so that
        // a refusal fails the creation. The references themselves are in the translated `Vec`s,
        // which live until the render pass is created.
        let _translation = HostAllocation::array::<AttachmentReference>(
            device.allocator(),
            reference_count,
            AllocationScope::Command,
        )?;

        let create_info = create_info.translate()?;

        RenderPass::new(device, create_info)
    }
}

/// Parameters to create a new `RenderPass` with [`RenderPass::from_legacy`].
#[derive(Clone, Debug)]
pub struct LegacyRenderPassCreateInfo {
    /// The attachments available for the render pass. Their stencil layouts are ignored.
    ///
    /// The default value is empty.
    pub attachments: Vec<AttachmentDescription>,

    /// The subpasses that make up this render pass.
    ///
    /// The default value is empty, which must be overridden.
    pub subpasses: Vec<LegacySubpassDescription>,

    /// The dependencies between subpasses.
    ///
    /// The default value is empty.
    pub dependencies: Vec<LegacySubpassDependency>,

    /// View masks, view offsets and correlation masks, if multiview is used.
    ///
    /// The default value is `None`.
    pub multiview: Option<RenderPassMultiviewCreateInfo>,

    /// The aspects read by some of the input attachments.
    ///
    /// The default value is empty.
    pub input_attachment_aspects: Vec<InputAttachmentAspectReference>,

    /// An attachment that is used as fragment density map by every subpass.
    ///
    /// The default value is `None`.
    pub fragment_density_map: Option<FragmentDensityMapAttachment>,

    pub _ne: NonExhaustive,
}

impl Default for LegacyRenderPassCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            attachments: Vec::new(),
            subpasses: Vec::new(),
            dependencies: Vec::new(),
            multiview: None,
            input_attachment_aspects: Vec::new(),
            fragment_density_map: None,
            _ne: NonExhaustive(()),
        }
    }
}

impl LegacyRenderPassCreateInfo {
    fn translate(&self) -> Result<RenderPassCreateInfo, OomError> {
        let Self {
            attachments,
            subpasses,
            dependencies,
            multiview,
            input_attachment_aspects,
            fragment_density_map,
            _ne: _,
        } = self;

        let multiview = multiview.as_ref();

        if let Some(multiview) = multiview {
            debug_assert!(
                multiview.view_masks.is_empty() || multiview.view_masks.len() == subpasses.len()
            );
            debug_assert!(
                multiview.view_offsets.is_empty()
                    || multiview.view_offsets.len() == dependencies.len()
            );
        }

        let mut translated_attachments = try_vec(attachments.len())?;
        translated_attachments.extend(attachments.iter().map(|attachment| {
            AttachmentDescription {
                stencil_initial_layout: None,
                stencil_final_layout: None,
                ..*attachment
            }
        }));

        let mut translated_subpasses = try_vec(subpasses.len())?;

        for (index, subpass) in subpasses.iter().enumerate() {
            let view_mask = multiview
                .and_then(|multiview| multiview.view_masks.get(index).copied())
                .unwrap_or(0);

            translated_subpasses.push(subpass.translate(attachments, view_mask)?);
        }

        for aspect_reference in input_attachment_aspects {
            let &InputAttachmentAspectReference {
                subpass,
                input_attachment_index,
                aspects,
            } = aspect_reference;

            debug_assert!((subpass as usize) < translated_subpasses.len());
            let subpass: &mut SubpassDescription = &mut translated_subpasses[subpass as usize];

            debug_assert!((input_attachment_index as usize) < subpass.input_attachments.len());
            if let Some(reference) = &mut subpass.input_attachments[input_attachment_index as usize]
            {
                reference.aspects = aspects;
            }
        }

        let mut translated_dependencies = try_vec(dependencies.len())?;

        for (index, dependency) in dependencies.iter().enumerate() {
            let view_offset = multiview
                .and_then(|multiview| multiview.view_offsets.get(index).copied())
                .unwrap_or(0);

            translated_dependencies.push(dependency.translate(view_offset));
        }

        let correlated_view_masks = match multiview {
            Some(multiview) => {
                let mut masks = try_vec(multiview.correlation_masks.len())?;
                masks.extend_from_slice(&multiview.correlation_masks);
                masks
            }
            None => Vec::new(),
        };

        Ok(RenderPassCreateInfo {
            attachments: translated_attachments,
            subpasses: translated_subpasses,
            dependencies: translated_dependencies,
            correlated_view_masks,
            fragment_density_map: *fragment_density_map,
            _ne: NonExhaustive(()),
        })
    }
}

/// Describes one of the subpasses of a render pass created with [`RenderPass::from_legacy`].
#[derive(Clone, Debug, Default)]
pub struct LegacySubpassDescription {
    pub input_attachments: Vec<LegacyAttachmentReference>,
    pub color_attachments: Vec<LegacyAttachmentReference>,
    /// Either empty, or as long as `color_attachments`.
    pub resolve_attachments: Vec<LegacyAttachmentReference>,
    pub depth_stencil_attachment: Option<LegacyAttachmentReference>,
    pub preserve_attachments: Vec<u32>,
}

impl LegacySubpassDescription {
    fn reference_count(&self) -> usize {
        self.input_attachments.len()
            + self.color_attachments.len()
            + self.resolve_attachments.len()
            + usize::from(self.depth_stencil_attachment.is_some())
    }

    fn translate(
        &self,
        attachments: &[AttachmentDescription],
        view_mask: u32,
    ) -> Result<SubpassDescription, OomError> {
        let translate_list = |references: &[LegacyAttachmentReference], is_input: bool| {
            let mut translated = try_vec(references.len())?;
            translated.extend(
                references
                    .iter()
                    .map(|reference| reference.translate(attachments, is_input)),
            );

            Ok::<_, OomError>(translated)
        };

        let mut preserve_attachments = try_vec(self.preserve_attachments.len())?;
        preserve_attachments.extend_from_slice(&self.preserve_attachments);

        Ok(SubpassDescription {
            view_mask,
            input_attachments: translate_list(&self.input_attachments, true)?,
            color_attachments: translate_list(&self.color_attachments, false)?,
            color_resolve_attachments: translate_list(&self.resolve_attachments, false)?,
            depth_stencil_attachment: self
                .depth_stencil_attachment
                .and_then(|reference| reference.translate(attachments, false)),
            preserve_attachments,
            ..Default::default()
        })
    }
}

/// A reference to an attachment in a [`LegacySubpassDescription`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LegacyAttachmentReference {
    /// The index of the attachment, or [`ATTACHMENT_UNUSED`].
    ///
    /// The default value is [`ATTACHMENT_UNUSED`].
    pub attachment: u32,

    /// The default value is `ImageLayout::UNDEFINED`.
    pub layout: ImageLayout,
}

impl Default for LegacyAttachmentReference {
    #[inline]
    fn default() -> Self {
        Self {
            attachment: ATTACHMENT_UNUSED,
            layout: ImageLayout::UNDEFINED,
        }
    }
}

impl LegacyAttachmentReference {
    fn translate(
        self,
        attachments: &[AttachmentDescription],
        is_input: bool,
    ) -> Option<AttachmentReference> {
        if self.attachment == ATTACHMENT_UNUSED {
            return None;
        }

        debug_assert!((self.attachment as usize) < attachments.len());

        // Input attachments read every aspect of the format by default.
        let aspects = if is_input {
            attachments[self.attachment as usize].format.aspects()
        } else {
            ImageAspectFlags::empty()
        };

        Some(AttachmentReference {
            attachment: self.attachment,
            layout: self.layout,
            stencil_layout: None,
            aspects,
            _ne: NonExhaustive(()),
        })
    }
}

/// A dependency between two subpasses of a render pass created with
/// [`RenderPass::from_legacy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LegacySubpassDependency {
    /// The source subpass, or [`SUBPASS_EXTERNAL`].
    pub src_subpass: u32,
    /// The destination subpass, or [`SUBPASS_EXTERNAL`].
    pub dst_subpass: u32,
    pub src_stages: PipelineStageFlags,
    pub dst_stages: PipelineStageFlags,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub dependency_flags: DependencyFlags,
}

impl Default for LegacySubpassDependency {
    #[inline]
    fn default() -> Self {
        Self {
            src_subpass: SUBPASS_EXTERNAL,
            dst_subpass: SUBPASS_EXTERNAL,
            src_stages: PipelineStageFlags::empty(),
            dst_stages: PipelineStageFlags::empty(),
            src_access: AccessFlags::empty(),
            dst_access: AccessFlags::empty(),
            dependency_flags: DependencyFlags::empty(),
        }
    }
}

impl LegacySubpassDependency {
    fn translate(&self, view_offset: i32) -> SubpassDependency {
        let subpass = |index| (index != SUBPASS_EXTERNAL).then_some(index);

        SubpassDependency {
            src_subpass: subpass(self.src_subpass),
            dst_subpass: subpass(self.dst_subpass),
            src_stages: self.src_stages,
            dst_stages: self.dst_stages,
            src_access: self.src_access,
            dst_access: self.dst_access,
            dependency_flags: self.dependency_flags,
            view_offset,
            memory_barrier: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// Multiview parameters of a render pass created with [`RenderPass::from_legacy`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderPassMultiviewCreateInfo {
    /// One view mask per subpass, or empty.
    pub view_masks: Vec<u32>,
    /// One view offset per dependency, or empty.
    pub view_offsets: Vec<i32>,
    pub correlation_masks: Vec<u32>,
}

/// Selects the aspects read by one input attachment of one subpass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputAttachmentAspectReference {
    pub subpass: u32,
    pub input_attachment_index: u32,
    pub aspects: ImageAspectFlags,
}
