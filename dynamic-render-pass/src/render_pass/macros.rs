// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

/// Builds a `RenderPass` object with a single subpass.
#[macro_export]
macro_rules! single_pass_renderpass {
    (
        $device:expr,
        attachments: { $($a:tt)* },
        pass: {
            color: [$($color_atch:ident),*],
            depth_stencil: {$($depth_atch:ident)*}$(,)*
            $(resolve: [$($resolve_atch:ident),*])*$(,)*
        }
    ) => (
        $crate::ordered_passes_renderpass!(
            $device,
            attachments: { $($a)* },
            passes: [
                {
                    color: [$($color_atch),*],
                    depth_stencil: {$($depth_atch)*},
                    input: [],
                    resolve: [$($($resolve_atch),*)*]
                }
            ]
        )
    )
}

/// Builds a `RenderPass` object whose subpasses are executed one after the other.
///
/// The layouts of the attachments are deduced from how the subpasses use them, unless
/// `initial_layout` or `final_layout` are given. Each subpass depends on the attachment writes of
/// the previous one, by region.
#[macro_export]
macro_rules! ordered_passes_renderpass {
    (
        $device:expr,
        attachments: {
            $(
                $atch_name:ident: {
                    load: $load:ident,
                    store: $store:ident,
                    format: $format:expr,
                    samples: $samples:expr,
                    $(initial_layout: $init_layout:expr,)*
                    $(final_layout: $final_layout:expr,)*
                }
            ),*
        },
        passes: [
            $(
                {
                    color: [$($color_atch:ident),*],
                    depth_stencil: {$($depth_atch:ident)*},
                    input: [$($input_atch:ident),*]$(,)*
                    $(resolve: [$($resolve_atch:ident),*])*$(,)*
                }
            ),*
        ]
    ) => ({
        use $crate::ash::vk::ImageLayout;
        use $crate::render_pass::RenderPass;

        let create_info = {
            #[allow(unused)]
            let mut attachment_num = 0;
            $(
                let $atch_name = attachment_num;
                attachment_num += 1;
            )*

            #[allow(unused)]
            let mut layouts: Vec<(Option<ImageLayout>, Option<ImageLayout>)> =
                vec![(None, None); attachment_num as usize];

            let subpasses = vec![
                $({
                    let desc = $crate::render_pass::SubpassDescription {
                        color_attachments: vec![
                            $({
                                let layout = &mut layouts[$color_atch as usize];
                                layout.0 = layout.0.or(Some(ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
                                layout.1 = Some(ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

                                Some($crate::render_pass::AttachmentReference {
                                    attachment: $color_atch,
                                    layout: ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                                    ..Default::default()
                                })
                            }),*
                        ],
                        depth_stencil_attachment: {
                            let depth: Option<$crate::render_pass::AttachmentReference> = None;
                            $(
                                let layout = &mut layouts[$depth_atch as usize];
                                layout.1 = Some(ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
                                layout.0 = layout.0.or(layout.1);

                                let depth = Some($crate::render_pass::AttachmentReference {
                                    attachment: $depth_atch,
                                    layout: ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                                    ..Default::default()
                                });
                            )*
                            depth
                        },
                        input_attachments: vec![
                            $({
                                let layout = &mut layouts[$input_atch as usize];
                                layout.1 = Some(ImageLayout::SHADER_READ_ONLY_OPTIMAL);
                                layout.0 = layout.0.or(layout.1);

                                Some($crate::render_pass::AttachmentReference {
                                    attachment: $input_atch,
                                    layout: ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                                    ..Default::default()
                                })
                            }),*
                        ],
                        color_resolve_attachments: vec![
                            $($({
                                let layout = &mut layouts[$resolve_atch as usize];
                                layout.1 = Some(ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
                                layout.0 = layout.0.or(layout.1);

                                Some($crate::render_pass::AttachmentReference {
                                    attachment: $resolve_atch,
                                    layout: ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                                    ..Default::default()
                                })
                            }),*)*
                        ],
                        preserve_attachments: (0..attachment_num).filter(|&a| {
                            $(if a == $color_atch { return false; })*
                            $(if a == $depth_atch { return false; })*
                            $(if a == $input_atch { return false; })*
                            $($(if a == $resolve_atch { return false; })*)*
                            true
                        }).collect(),
                        ..Default::default()
                    };

                    assert!(desc.color_resolve_attachments.is_empty() ||
                            desc.color_resolve_attachments.len() == desc.color_attachments.len());
                    desc
                }),*
            ];

            let dependencies: Vec<_> = (0..subpasses.len().saturating_sub(1) as u32)
                .map(|id| {
                    use $crate::ash::vk::{AccessFlags, PipelineStageFlags};

                    let attachment_stages = PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | PipelineStageFlags::EARLY_FRAGMENT_TESTS
                        | PipelineStageFlags::LATE_FRAGMENT_TESTS;

                    $crate::render_pass::SubpassDependency {
                        src_subpass: Some(id),
                        dst_subpass: Some(id + 1),
                        src_stages: attachment_stages,
                        dst_stages: attachment_stages | PipelineStageFlags::FRAGMENT_SHADER,
                        src_access: AccessFlags::COLOR_ATTACHMENT_WRITE
                            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                        dst_access: AccessFlags::INPUT_ATTACHMENT_READ
                            | AccessFlags::COLOR_ATTACHMENT_READ
                            | AccessFlags::COLOR_ATTACHMENT_WRITE
                            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                        dependency_flags: $crate::ash::vk::DependencyFlags::BY_REGION,
                        ..Default::default()
                    }
                })
                .collect();

            let attachments = vec![
                $({
                    let layout = &mut layouts[$atch_name as usize];
                    $(layout.0 = Some($init_layout);)*
                    $(layout.1 = Some($final_layout);)*

                    $crate::render_pass::AttachmentDescription {
                        format: $format,
                        samples: $crate::ash::vk::SampleCountFlags::from_raw($samples),
                        load_op: $crate::render_pass::LoadOp::$load,
                        store_op: $crate::render_pass::StoreOp::$store,
                        stencil_load_op: $crate::render_pass::LoadOp::$load,
                        stencil_store_op: $crate::render_pass::StoreOp::$store,
                        initial_layout: layout.0.unwrap_or(ImageLayout::UNDEFINED),
                        final_layout: layout.1.unwrap_or(ImageLayout::GENERAL),
                        ..Default::default()
                    }
                }),*
            ];

            $crate::render_pass::RenderPassCreateInfo {
                attachments,
                subpasses,
                dependencies,
                ..Default::default()
            }
        };

        RenderPass::new($device, create_info)
    });
}
