// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Builder for textures with non-default format, sampling or fallback settings.

use crate::Error;
use crate::bindings::sampler::{Interpolation, Wrapping};
use crate::bindings::texture::{Fallback, Texture, TextureData};
use crate::pixel_formats::TextureFormat;

/// Builder for creating textures with a cleaner API than long parameter lists.
///
/// ```
/// use buffers_and_bindings::bindings::sampler::Interpolation;
/// use buffers_and_bindings::bindings::texture::TextureData;
/// use buffers_and_bindings::bindings::texture_builder::TextureBuilder;
/// use buffers_and_bindings::pixel_formats::TextureFormat;
///
/// let mask = TextureData::new(&[2, 2], 1, &[0u8, 255, 255, 0]).unwrap();
/// let texture = TextureBuilder::new(mask)
///     .with_format(TextureFormat::Alpha)
///     .with_interpolation(Interpolation::Linear)
///     .with_debug_name("mask")
///     .build()
///     .unwrap();
/// assert_eq!(texture.format(), TextureFormat::Alpha);
/// ```
#[derive(Debug)]
pub struct TextureBuilder {
    data: TextureData,
    debug_name: String,
    format: Option<TextureFormat>,
    interpolation: Interpolation,
    wrapping: Wrapping,
    fallback: Fallback,
}

impl TextureBuilder {
    /// Create a new texture builder with the initial contents.
    pub fn new(data: TextureData) -> Self {
        Self {
            data,
            debug_name: "texture".to_string(),
            format: None,
            interpolation: Interpolation::default(),
            wrapping: Wrapping::default(),
            fallback: Fallback::default(),
        }
    }

    /// Fixes the format instead of deriving it from the channel count.
    ///
    /// Every full upload must then carry `format.channels()` channels.
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_wrapping(mut self, wrapping: Wrapping) -> Self {
        self.wrapping = wrapping;
        self
    }

    pub fn with_debug_name(mut self, name: &str) -> Self {
        self.debug_name = name.to_string();
        self
    }

    pub fn allow_downsample(mut self, allow: bool) -> Self {
        self.fallback.allow_downsample = allow;
        self
    }

    pub fn allow_padding(mut self, allow: bool) -> Self {
        self.fallback.allow_padding = allow;
        self
    }

    /// Caps the number of box-filter passes before giving up.  Defaults to 9.
    pub fn max_downsample_attempts(mut self, attempts: u32) -> Self {
        self.fallback.max_downsample_attempts = attempts;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Get the fallback settings.
    pub fn fallback(&self) -> Fallback {
        self.fallback
    }

    /// Get the explicit format if set.
    pub fn format(&self) -> Option<TextureFormat> {
        self.format
    }

    /// Builds the texture.  Fails if an explicit format disagrees with the data's channel count.
    pub fn build(self) -> Result<Texture, Error> {
        Texture::from_builder(
            self.data,
            &self.debug_name,
            self.format,
            self.interpolation,
            self.wrapping,
            self.fallback,
        )
    }
}
