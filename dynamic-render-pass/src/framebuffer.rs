// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The set of images that a render pass draws to.

use crate::{image::ImageView, NonExhaustive};
use std::sync::Arc;

/// The attachments a render pass is executed on, along with the area and number of layers.
///
/// An imageless framebuffer has no attachments; its image views are provided when the render pass
/// is begun instead.
#[derive(Debug)]
pub struct Framebuffer {
    attachments: Vec<Arc<ImageView>>,
    extent: [u32; 2],
    layers: u32,
    imageless: bool,
}

impl Framebuffer {
    /// Creates a new `Framebuffer`.
    ///
    /// If `create_info.extent` is `[0, 0]`, the extent is the smallest extent of the attachments.
    pub fn new(create_info: FramebufferCreateInfo) -> Arc<Framebuffer> {
        let FramebufferCreateInfo {
            attachments,
            mut extent,
            layers,
            imageless,
            _ne: _,
        } = create_info;

        debug_assert!(!imageless || attachments.is_empty());
        debug_assert!(layers != 0);

        if extent == [0, 0] {
            extent = attachments
                .iter()
                .map(|view| {
                    let [width, height, _] = view.extent();
                    [width, height]
                })
                .reduce(|a, b| [a[0].min(b[0]), a[1].min(b[1])])
                .unwrap_or([0, 0]);
        }

        Arc::new(Framebuffer {
            attachments,
            extent,
            layers,
            imageless,
        })
    }

    /// Returns the image views bound to the framebuffer. Empty for imageless framebuffers.
    #[inline]
    pub fn attachments(&self) -> &[Arc<ImageView>] {
        &self.attachments
    }

    #[inline]
    pub fn extent(&self) -> [u32; 2] {
        self.extent
    }

    #[inline]
    pub fn layers(&self) -> u32 {
        self.layers
    }

    #[inline]
    pub fn is_imageless(&self) -> bool {
        self.imageless
    }
}

/// Parameters to create a new `Framebuffer`.
#[derive(Clone, Debug)]
pub struct FramebufferCreateInfo {
    /// The image views, one for each attachment of the render pass.
    ///
    /// The default value is empty.
    pub attachments: Vec<Arc<ImageView>>,

    /// The extent of the framebuffer. `[0, 0]` means the minimum extent of the attachments.
    ///
    /// The default value is `[0, 0]`.
    pub extent: [u32; 2],

    /// The number of layers.
    ///
    /// The default value is `1`.
    pub layers: u32,

    /// Whether the image views are provided when beginning the render pass.
    ///
    /// The default value is `false`.
    pub imageless: bool,

    pub _ne: NonExhaustive,
}

impl Default for FramebufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            attachments: Vec::new(),
            extent: [0, 0],
            layers: 1,
            imageless: false,
            _ne: NonExhaustive(()),
        }
    }
}
