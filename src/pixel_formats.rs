// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Element types and texture formats.
//!
//! Buffers and textures accept typed host data.  Each Rust scalar type that can be uploaded
//! implements the sealed [`Element`] trait, which ties it to a runtime [`ElementType`] tag.
//! The tag travels with the data so that the device and the texture fallback path can
//! interpret raw bytes without knowing the original Rust type.
//!
//! # Available element types
//!
//! | Rust type    | [`ElementType`]      | bytes |
//! |--------------|----------------------|-------|
//! | `i8`         | [`ElementType::I8`]  | 1     |
//! | `u8`         | [`ElementType::U8`]  | 1     |
//! | `i16`        | [`ElementType::I16`] | 2     |
//! | `u16`        | [`ElementType::U16`] | 2     |
//! | `i32`        | [`ElementType::I32`] | 4     |
//! | `u32`        | [`ElementType::U32`] | 4     |
//! | [`f16`]      | [`ElementType::F16`] | 2     |
//! | `f32`        | [`ElementType::F32`] | 4     |
//!
//! # Examples
//!
//! ```
//! use buffers_and_bindings::pixel_formats::{ElementType, TextureFormat};
//!
//! assert_eq!(ElementType::F32.size(), 4);
//! assert_eq!(TextureFormat::from_channels(3), Some(TextureFormat::Rgb));
//! ```

/*
Quick note on type design.  Textures used to carry their format as a type parameter, which
made it impossible to re-upload a texture with different data.  The texture API here allows
set_data to change element type and channel count (a full upload recomputes the format), so
the element type is a runtime tag instead, and the typed entry points are only a convenience
for getting bytes in.
 */

use crate::pixel_formats::sealed::Element as SealedElement;

pub use half::f16;

pub(crate) mod sealed {
    /// Core trait for host element types.
    ///
    /// This trait is sealed and cannot be implemented outside this crate.
    pub trait Element: bytemuck::Pod + std::fmt::Debug {
        const TYPE: super::ElementType;
    }
}

/// A scalar type that can be uploaded to a buffer or texture.
///
/// Implemented for `i8`, `u8`, `i16`, `u16`, `i32`, `u32`, [`f16`] and `f32`.
pub trait Element: SealedElement {}
impl<T: SealedElement> Element for T {}

macro_rules! element {
    ($t:ty, $tag:ident) => {
        impl SealedElement for $t {
            const TYPE: ElementType = ElementType::$tag;
        }
    };
}
element!(i8, I8);
element!(u8, U8);
element!(i16, I16);
element!(u16, U16);
element!(i32, I32);
element!(u32, U32);
element!(f16, F16);
element!(f32, F32);

/// Runtime tag for the scalar type of buffer or texture data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F16,
    F32,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            ElementType::I8 | ElementType::U8 => 1,
            ElementType::I16 | ElementType::U16 | ElementType::F16 => 2,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
        }
    }

    /// Reads the element at the start of `bytes` as a float.
    ///
    /// `bytes` must hold at least [`Self::size`] bytes.
    pub(crate) fn read(self, bytes: &[u8]) -> f64 {
        match self {
            ElementType::I8 => bytes[0] as i8 as f64,
            ElementType::U8 => bytes[0] as f64,
            ElementType::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ElementType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ElementType::I32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            ElementType::U32 => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            ElementType::F16 => f16::from_le_bytes([bytes[0], bytes[1]]).to_f64(),
            ElementType::F32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
        }
    }

    /// Writes `value` into the start of `out`, rounding and saturating for integer types.
    pub(crate) fn write(self, value: f64, out: &mut [u8]) {
        match self {
            ElementType::I8 => out[0] = (value.round() as i8) as u8,
            ElementType::U8 => out[0] = value.round() as u8,
            ElementType::I16 => out[..2].copy_from_slice(&(value.round() as i16).to_le_bytes()),
            ElementType::U16 => out[..2].copy_from_slice(&(value.round() as u16).to_le_bytes()),
            ElementType::I32 => out[..4].copy_from_slice(&(value.round() as i32).to_le_bytes()),
            ElementType::U32 => out[..4].copy_from_slice(&(value.round() as u32).to_le_bytes()),
            ElementType::F16 => out[..2].copy_from_slice(&f16::from_f64(value).to_le_bytes()),
            ElementType::F32 => out[..4].copy_from_slice(&(value as f32).to_le_bytes()),
        }
    }
}

/// Channel layout of texture data as the device stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Alpha,
    Luminance,
    LuminanceAlpha,
    Rgb,
    Rgba,
}

impl TextureFormat {
    /// The format implied by a channel count.  One channel is luminance, not alpha.
    pub const fn from_channels(channels: usize) -> Option<TextureFormat> {
        match channels {
            1 => Some(TextureFormat::Luminance),
            2 => Some(TextureFormat::LuminanceAlpha),
            3 => Some(TextureFormat::Rgb),
            4 => Some(TextureFormat::Rgba),
            _ => None,
        }
    }

    pub const fn channels(self) -> usize {
        match self {
            TextureFormat::Alpha | TextureFormat::Luminance => 1,
            TextureFormat::LuminanceAlpha => 2,
            TextureFormat::Rgb => 3,
            TextureFormat::Rgba => 4,
        }
    }
}

/// Views a slice of elements as bytes.
pub(crate) fn element_bytes<T: Element>(data: &[T]) -> &[u8] {
    bytemuck::cast_slice(data)
}
