// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The graphics device seam.
//!
//! Everything above this module is written against [`Device`], a GL-shaped interface with
//! explicit handles.  A device corresponds to one graphics context; all calls are expected on the
//! thread that owns it.  The crate ships a CPU implementation, [`crate::HeadlessDevice`].
use crate::bindings::inputs::GenericValue;
use crate::bindings::sampler::{Interpolation, Wrapping};
use crate::bindings::visible_to::BufferUsage;
use crate::images::reflection::ActiveInput;
use crate::images::render_pass::{DrawCommand, Primitive};
use crate::images::shader::StageKind;
use crate::pixel_formats::{ElementType, TextureFormat};
use crate::RawHandle;

/// Binding point for a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Index data for indexed draws.
    ElementArray,
}

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture1D,
    Texture2D,
    Texture3D,
}

impl TextureTarget {
    /// Number of spatial dimensions.
    pub const fn ndim(self) -> usize {
        match self {
            TextureTarget::Texture1D => 1,
            TextureTarget::Texture2D => 2,
            TextureTarget::Texture3D => 3,
        }
    }

    pub(crate) const fn for_ndim(ndim: usize) -> Option<TextureTarget> {
        match ndim {
            1 => Some(TextureTarget::Texture1D),
            2 => Some(TextureTarget::Texture2D),
            3 => Some(TextureTarget::Texture3D),
            _ => None,
        }
    }
}

/// A sampling parameter of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureParameter {
    Interpolation(Interpolation),
    Wrapping(Wrapping),
}

/// Texel data handed to the device.
///
/// `shape` lists the spatial extents slowest-varying first (depth, height, width), and `data`
/// holds `shape.product() * format.channels()` elements of `element`.
#[derive(Debug, Clone, Copy)]
pub struct TexelData<'a> {
    pub shape: &'a [usize],
    pub format: TextureFormat,
    pub element: ElementType,
    pub data: &'a [u8],
}

/// How an attribute reads from the buffer bound to [`BufferTarget::Array`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePointer {
    pub arity: usize,
    pub element: ElementType,
    pub stride: usize,
    pub offset: usize,
}

/// Outcome of a compile or link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLog {
    pub success: bool,
    /// The raw info log, in whatever format the driver uses.
    pub log: String,
}

/// Capability limits and device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Largest extent in any texture dimension.
    pub max_texture_size: usize,
    /// Number of texture units available to one program.
    pub max_texture_units: u32,
    /// Whether texture extents must be powers of two.
    pub require_power_of_two: bool,
    /// Names of supported extensions, e.g. `OES_element_index_uint`.
    pub extensions: Vec<String>,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        DeviceLimits {
            max_texture_size: 4096,
            max_texture_units: 16,
            require_power_of_two: false,
            extensions: vec!["OES_element_index_uint".to_string()],
        }
    }
}

/// Errors reported by the device itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DeviceError {
    #[error("the graphics context is not current")]
    ContextLost,
    #[error("no {kind} object with handle {handle}")]
    InvalidHandle { kind: &'static str, handle: u32 },
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("out of device memory")]
    OutOfMemory,
}

/// A graphics device with one context.
///
/// Handles are device-allocated and never zero.  Data operations name their target object
/// explicitly; `bind_*` and `use_program` set the state that draws observe.
pub trait Device {
    /// Whether this device's context is current on the calling thread.
    fn is_current(&self) -> bool;
    fn limits(&self) -> &DeviceLimits;
    fn has_extension(&self, name: &str) -> bool {
        self.limits().extensions.iter().any(|e| e == name)
    }
    /// Returns and clears the first error raised since the last call.
    fn take_error(&mut self) -> Option<DeviceError>;

    fn create_buffer(&mut self) -> Result<RawHandle, DeviceError>;
    fn delete_buffer(&mut self, buffer: RawHandle) -> Result<(), DeviceError>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<RawHandle>);
    /// (Re)allocates the storage of `buffer`, discarding its contents.
    fn allocate_buffer(
        &mut self,
        buffer: RawHandle,
        size: usize,
        usage: BufferUsage,
    ) -> Result<(), DeviceError>;
    fn write_buffer(
        &mut self,
        buffer: RawHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), DeviceError>;

    fn create_texture(&mut self, target: TextureTarget) -> Result<RawHandle, DeviceError>;
    fn delete_texture(&mut self, texture: RawHandle) -> Result<(), DeviceError>;
    fn select_texture_unit(&mut self, unit: u32) -> Result<(), DeviceError>;
    /// Binds `texture` to the currently selected unit.
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<RawHandle>);
    /// Asks whether an upload of this extent and format would succeed, without uploading.
    fn probe_texture(
        &mut self,
        target: TextureTarget,
        shape: &[usize],
        format: TextureFormat,
        element: ElementType,
    ) -> bool;
    /// Replaces storage and contents of `texture`.
    fn upload_texture(&mut self, texture: RawHandle, texels: TexelData<'_>)
    -> Result<(), DeviceError>;
    /// Overwrites the region starting at `offset` with `texels`.
    fn update_texture(
        &mut self,
        texture: RawHandle,
        offset: &[usize],
        texels: TexelData<'_>,
    ) -> Result<(), DeviceError>;
    fn set_texture_parameter(
        &mut self,
        texture: RawHandle,
        parameter: TextureParameter,
    ) -> Result<(), DeviceError>;

    fn create_shader(&mut self, kind: StageKind) -> Result<RawHandle, DeviceError>;
    fn delete_shader(&mut self, shader: RawHandle) -> Result<(), DeviceError>;
    fn compile_shader(&mut self, shader: RawHandle, source: &str) -> Result<BuildLog, DeviceError>;

    fn create_program(&mut self) -> Result<RawHandle, DeviceError>;
    fn delete_program(&mut self, program: RawHandle) -> Result<(), DeviceError>;
    fn attach_shader(&mut self, program: RawHandle, shader: RawHandle) -> Result<(), DeviceError>;
    fn detach_shader(&mut self, program: RawHandle, shader: RawHandle) -> Result<(), DeviceError>;
    fn link_program(&mut self, program: RawHandle) -> Result<BuildLog, DeviceError>;
    /// The uniforms and attributes the linker kept, with their locations.
    fn active_inputs(&self, program: RawHandle) -> Result<Vec<ActiveInput>, DeviceError>;
    fn use_program(&mut self, program: Option<RawHandle>);

    /// Sets a uniform of the program in use.  `value` already matches the slot's scalar kind.
    fn set_uniform(&mut self, location: u32, value: &GenericValue) -> Result<(), DeviceError>;
    fn set_sampler(&mut self, location: u32, unit: u32) -> Result<(), DeviceError>;
    /// Feeds the same value to every vertex and disables the attribute array.
    fn set_attribute_constant(&mut self, location: u32, value: &[f32])
    -> Result<(), DeviceError>;
    /// Reads the attribute from the buffer bound to [`BufferTarget::Array`] and enables the array.
    fn set_attribute_pointer(
        &mut self,
        location: u32,
        pointer: AttributePointer,
    ) -> Result<(), DeviceError>;
    fn disable_attribute(&mut self, location: u32);

    fn draw(&mut self, primitive: Primitive, command: DrawCommand) -> Result<(), DeviceError>;
}
