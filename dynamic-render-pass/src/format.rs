// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Properties of image formats.
//!
//! Only the properties that matter to render passes are known here: which aspects a format has,
//! how many bytes a texel takes, whether its values are integers, and how much tile memory a
//! texel occupies on a tile-based renderer.
//!
//! Formats that are not in the table (compressed, planar and other formats that cannot be
//! attachments) report no aspects and no block size.

use ash::vk::{Format, ImageAspectFlags};

/// The numeric type that represents data of a format in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericType {
    /// Signed floating-point number.
    SFLOAT,
    /// Unsigned floating-point number.
    UFLOAT,
    /// Signed integer.
    SINT,
    /// Unsigned integer.
    UINT,
    /// Signed integer that represents a normalized floating-point value in the range \[-1,1].
    SNORM,
    /// Unsigned integer that represents a normalized floating-point value in the range \[0,1].
    UNORM,
    /// Unsigned integer where R, G, B components represent a normalized floating-point value in the
    /// sRGB color space, while the A component is a simple normalized value as in `UNORM`.
    SRGB,
}

#[derive(Clone, Copy, Debug)]
struct FormatInfo {
    block_size: u32,
    aspects: ImageAspectFlags,
    numeric_type: NumericType,
    // Stored in the tile buffer in a 32-bit blendable representation.
    tile_internal: bool,
}

const fn color(block_size: u32, numeric_type: NumericType, tile_internal: bool) -> FormatInfo {
    FormatInfo {
        block_size,
        aspects: ImageAspectFlags::COLOR,
        numeric_type,
        tile_internal,
    }
}

const fn depth_stencil(
    block_size: u32,
    aspects: ImageAspectFlags,
    numeric_type: NumericType,
) -> FormatInfo {
    FormatInfo {
        block_size,
        aspects,
        numeric_type,
        tile_internal: false,
    }
}

const DEPTH: ImageAspectFlags = ImageAspectFlags::DEPTH;
const STENCIL: ImageAspectFlags = ImageAspectFlags::STENCIL;
const DEPTH_STENCIL: ImageAspectFlags =
    ImageAspectFlags::from_raw(DEPTH.as_raw() | STENCIL.as_raw());

fn format_info(format: Format) -> Option<FormatInfo> {
    use NumericType::*;

    let info = match format {
        Format::R4G4B4A4_UNORM_PACK16
        | Format::B4G4R4A4_UNORM_PACK16
        | Format::R5G6B5_UNORM_PACK16
        | Format::B5G6R5_UNORM_PACK16
        | Format::R5G5B5A1_UNORM_PACK16
        | Format::B5G5R5A1_UNORM_PACK16
        | Format::A1R5G5B5_UNORM_PACK16 => color(2, UNORM, true),

        Format::R8_UNORM => color(1, UNORM, true),
        Format::R8_SRGB => color(1, SRGB, true),
        Format::R8_SNORM => color(1, SNORM, false),
        Format::R8_UINT => color(1, UINT, false),
        Format::R8_SINT => color(1, SINT, false),

        Format::R8G8_UNORM => color(2, UNORM, true),
        Format::R8G8_SRGB => color(2, SRGB, true),
        Format::R8G8_SNORM => color(2, SNORM, false),
        Format::R8G8_UINT => color(2, UINT, false),
        Format::R8G8_SINT => color(2, SINT, false),

        Format::R8G8B8_UNORM | Format::B8G8R8_UNORM => color(3, UNORM, false),
        Format::R8G8B8_SRGB | Format::B8G8R8_SRGB => color(3, SRGB, false),

        Format::R8G8B8A8_UNORM | Format::B8G8R8A8_UNORM | Format::A8B8G8R8_UNORM_PACK32 => {
            color(4, UNORM, true)
        }
        Format::R8G8B8A8_SRGB | Format::B8G8R8A8_SRGB | Format::A8B8G8R8_SRGB_PACK32 => {
            color(4, SRGB, true)
        }
        Format::R8G8B8A8_SNORM | Format::B8G8R8A8_SNORM | Format::A8B8G8R8_SNORM_PACK32 => {
            color(4, SNORM, false)
        }
        Format::R8G8B8A8_UINT | Format::B8G8R8A8_UINT | Format::A8B8G8R8_UINT_PACK32 => {
            color(4, UINT, false)
        }
        Format::R8G8B8A8_SINT | Format::B8G8R8A8_SINT | Format::A8B8G8R8_SINT_PACK32 => {
            color(4, SINT, false)
        }

        Format::A2R10G10B10_UNORM_PACK32 | Format::A2B10G10R10_UNORM_PACK32 => {
            color(4, UNORM, true)
        }
        Format::A2R10G10B10_UINT_PACK32 | Format::A2B10G10R10_UINT_PACK32 => {
            color(4, UINT, false)
        }
        Format::B10G11R11_UFLOAT_PACK32 | Format::E5B9G9R9_UFLOAT_PACK32 => color(4, UFLOAT, false),

        Format::R16_UNORM => color(2, UNORM, false),
        Format::R16_SNORM => color(2, SNORM, false),
        Format::R16_UINT => color(2, UINT, false),
        Format::R16_SINT => color(2, SINT, false),
        Format::R16_SFLOAT => color(2, SFLOAT, false),

        Format::R16G16_UNORM => color(4, UNORM, false),
        Format::R16G16_SNORM => color(4, SNORM, false),
        Format::R16G16_UINT => color(4, UINT, false),
        Format::R16G16_SINT => color(4, SINT, false),
        Format::R16G16_SFLOAT => color(4, SFLOAT, false),

        Format::R16G16B16A16_UNORM => color(8, UNORM, false),
        Format::R16G16B16A16_SNORM => color(8, SNORM, false),
        Format::R16G16B16A16_UINT => color(8, UINT, false),
        Format::R16G16B16A16_SINT => color(8, SINT, false),
        Format::R16G16B16A16_SFLOAT => color(8, SFLOAT, false),

        Format::R32_UINT => color(4, UINT, false),
        Format::R32_SINT => color(4, SINT, false),
        Format::R32_SFLOAT => color(4, SFLOAT, false),

        Format::R32G32_UINT => color(8, UINT, false),
        Format::R32G32_SINT => color(8, SINT, false),
        Format::R32G32_SFLOAT => color(8, SFLOAT, false),

        Format::R32G32B32_UINT => color(12, UINT, false),
        Format::R32G32B32_SINT => color(12, SINT, false),
        Format::R32G32B32_SFLOAT => color(12, SFLOAT, false),

        Format::R32G32B32A32_UINT => color(16, UINT, false),
        Format::R32G32B32A32_SINT => color(16, SINT, false),
        Format::R32G32B32A32_SFLOAT => color(16, SFLOAT, false),

        Format::D16_UNORM => depth_stencil(2, DEPTH, UNORM),
        Format::X8_D24_UNORM_PACK32 => depth_stencil(4, DEPTH, UNORM),
        Format::D32_SFLOAT => depth_stencil(4, DEPTH, SFLOAT),
        Format::S8_UINT => depth_stencil(1, STENCIL, UINT),
        Format::D16_UNORM_S8_UINT => depth_stencil(3, DEPTH_STENCIL, UNORM),
        Format::D24_UNORM_S8_UINT => depth_stencil(4, DEPTH_STENCIL, UNORM),
        Format::D32_SFLOAT_S8_UINT => depth_stencil(8, DEPTH_STENCIL, SFLOAT),

        _ => return None,
    };

    Some(info)
}

/// Render-pass related properties of a [`Format`].
pub trait FormatExt {
    /// Returns the aspects that images of this format have.
    ///
    /// Returns an empty set for formats that cannot be used as attachments.
    fn aspects(self) -> ImageAspectFlags;

    /// Returns the size in bytes of one texel block, if known.
    fn block_size(self) -> Option<u32>;

    /// Returns the numeric type of the color or depth component, if known.
    fn numeric_type(self) -> Option<NumericType>;

    /// Returns whether the color components are stored as (non-normalized) integers.
    ///
    /// Attachments with such a format are resolved by picking one sample rather than averaging.
    fn is_int(self) -> bool;

    /// Returns the number of bytes that one sample of this format occupies in the tile buffer.
    ///
    /// Blendable formats are stored in a 32-bit internal representation. Other formats are stored
    /// raw, with their block size rounded up to a power of two.
    fn tile_buffer_bytes_per_sample(self) -> Option<u32>;

    #[inline]
    fn has_depth(self) -> bool
    where
        Self: Sized,
    {
        self.aspects().contains(ImageAspectFlags::DEPTH)
    }

    #[inline]
    fn has_stencil(self) -> bool
    where
        Self: Sized,
    {
        self.aspects().contains(ImageAspectFlags::STENCIL)
    }
}

impl FormatExt for Format {
    #[inline]
    fn aspects(self) -> ImageAspectFlags {
        format_info(self).map_or(ImageAspectFlags::empty(), |info| info.aspects)
    }

    #[inline]
    fn block_size(self) -> Option<u32> {
        format_info(self).map(|info| info.block_size)
    }

    #[inline]
    fn numeric_type(self) -> Option<NumericType> {
        format_info(self).map(|info| info.numeric_type)
    }

    #[inline]
    fn is_int(self) -> bool {
        format_info(self).is_some_and(|info| {
            info.aspects == ImageAspectFlags::COLOR
                && matches!(info.numeric_type, NumericType::UINT | NumericType::SINT)
        })
    }

    #[inline]
    fn tile_buffer_bytes_per_sample(self) -> Option<u32> {
        format_info(self).map(|info| {
            if info.tile_internal {
                4
            } else {
                info.block_size.next_power_of_two()
            }
        })
    }
}

/// The value to clear an attachment with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    /// Value for floating-point attachments, including `UNORM`, `SNORM`, `SFLOAT`.
    Float([f32; 4]),
    /// Value for integer attachments, including `SINT`.
    Int([i32; 4]),
    /// Value for unsigned integer attachments, including `UINT`.
    Uint([u32; 4]),
    /// Value for depth attachments.
    Depth(f32),
    /// Value for stencil attachments.
    Stencil(u32),
    /// Value for depth and stencil attachments.
    DepthStencil((f32, u32)),
}

impl From<ClearValue> for ash::vk::ClearValue {
    #[inline]
    fn from(val: ClearValue) -> Self {
        match val {
            ClearValue::Float(float32) => Self {
                color: ash::vk::ClearColorValue { float32 },
            },
            ClearValue::Int(int32) => Self {
                color: ash::vk::ClearColorValue { int32 },
            },
            ClearValue::Uint(uint32) => Self {
                color: ash::vk::ClearColorValue { uint32 },
            },
            ClearValue::Depth(depth) => Self {
                depth_stencil: ash::vk::ClearDepthStencilValue { depth, stencil: 0 },
            },
            ClearValue::Stencil(stencil) => Self {
                depth_stencil: ash::vk::ClearDepthStencilValue {
                    depth: 0.0,
                    stencil,
                },
            },
            ClearValue::DepthStencil((depth, stencil)) => Self {
                depth_stencil: ash::vk::ClearDepthStencilValue { depth, stencil },
            },
        }
    }
}

impl From<[f32; 4]> for ClearValue {
    #[inline]
    fn from(val: [f32; 4]) -> ClearValue {
        ClearValue::Float(val)
    }
}

impl From<[u32; 4]> for ClearValue {
    #[inline]
    fn from(val: [u32; 4]) -> ClearValue {
        ClearValue::Uint(val)
    }
}

impl From<[i32; 4]> for ClearValue {
    #[inline]
    fn from(val: [i32; 4]) -> ClearValue {
        ClearValue::Int(val)
    }
}
