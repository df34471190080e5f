//! Usage declarations for device buffers.
//!
//! When allocating buffer storage the device can place it better if it knows how often the
//! contents will change.  These hints never change behavior, only placement.
//!
//! # Examples
//!
//! ```
//! use buffers_and_bindings::bindings::buffer::Buffer;
//! use buffers_and_bindings::bindings::visible_to::BufferUsage;
//!
//! // Positions that are rewritten every frame
//! let buffer = Buffer::with_capacity(1024).with_usage(BufferUsage::Stream);
//! assert_eq!(buffer.usage(), BufferUsage::Stream);
//! ```

/// Describes how often the CPU rewrites a buffer.
///
/// # Examples
///
/// ```
/// use buffers_and_bindings::bindings::visible_to::BufferUsage;
///
/// // Geometry that is uploaded once
/// let mesh = BufferUsage::Static;
/// assert_eq!(mesh, BufferUsage::default());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    ///
    /// The default; suits meshes and lookup tables.
    #[default]
    Static,

    /// Rewritten occasionally and drawn many times between writes.
    Dynamic,

    /// Rewritten before nearly every draw.
    ///
    /// Use for per-frame streaming data such as particle positions.
    Stream,
}
