/*! CPU-side image processing used when the device cannot take texture data as-is. */

pub(crate) mod texture;
