// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A CPU implementation of [`Device`].

[`HeadlessDevice`] keeps every object in host memory and validates calls the way a strict GL
driver would.  It runs anywhere, needs no window, and exposes its state for inspection, so it
backs the test suite and lets callers check what a sequence of activations would do to a real
device.
*/

mod compiler;

pub use compiler::DiagnosticStyle;

use crate::RawHandle;
use crate::bindings::inputs::{GenericValue, ScalarKind};
use crate::bindings::sampler::{Interpolation, Wrapping};
use crate::bindings::software::texture::{copy_region, region_fits};
use crate::bindings::visible_to::BufferUsage;
use crate::images::device::{
    AttributePointer, BufferTarget, BuildLog, Device, DeviceError, DeviceLimits, TexelData,
    TextureParameter, TextureTarget,
};
use crate::images::reflection::{ActiveInput, SlotRole};
use crate::images::render_pass::{DrawCommand, Primitive};
use crate::images::shader::StageKind;
use crate::pixel_formats::{ElementType, TextureFormat};
use logwise::privacy::LogIt;
use std::collections::BTreeMap;

const MAX_ATTRIBUTES: u32 = 16;

/// What an attribute location reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeState {
    /// The attribute array is off; the attribute reads its default.
    Disabled,
    /// Every vertex reads the same value.
    Constant(Vec<f32>),
    /// Vertices read from `buffer` through `pointer`.
    Pointer {
        buffer: RawHandle,
        pointer: AttributePointer,
    },
}

/// One draw call the device accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: RawHandle,
    pub primitive: Primitive,
    pub command: DrawCommand,
    pub index_buffer: Option<RawHandle>,
    /// Attribute locations of the program and what each read.
    pub attributes: Vec<(u32, AttributeState)>,
    /// Texture units and the texture bound to each.
    pub textures: Vec<(u32, RawHandle)>,
}

#[derive(Debug)]
struct BufferObject {
    data: Vec<u8>,
    usage: BufferUsage,
    allocations: usize,
}

#[derive(Debug)]
struct TextureObject {
    target: TextureTarget,
    shape: Vec<usize>,
    format: Option<TextureFormat>,
    element: Option<ElementType>,
    data: Vec<u8>,
    uploads: usize,
    interpolation: Interpolation,
    wrapping: Wrapping,
}

#[derive(Debug)]
struct ShaderObject {
    kind: StageKind,
    /// Source of the last successful compile.
    compiled: Option<String>,
    compiles: usize,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<RawHandle>,
    inputs: Vec<ActiveInput>,
    links: usize,
    uniforms: BTreeMap<u32, GenericValue>,
    samplers: BTreeMap<u32, u32>,
}

/**
A graphics device that lives in host memory.

```
use buffers_and_bindings::HeadlessDevice;
use buffers_and_bindings::bindings::buffer::Buffer;

let mut device = HeadlessDevice::new();
let mut buffer = Buffer::from_slice(&[1u8, 2, 3]);
buffer.activate(&mut device).unwrap();
assert_eq!(device.buffer_contents(buffer.handle().unwrap()), Some(&[1u8, 2, 3][..]));
buffer.delete(&mut device);
```
*/
#[derive(Debug)]
pub struct HeadlessDevice {
    limits: DeviceLimits,
    style: DiagnosticStyle,
    current: bool,
    next_handle: u32,
    error: Option<DeviceError>,
    buffers: BTreeMap<RawHandle, BufferObject>,
    bound_buffers: BTreeMap<BufferTarget, RawHandle>,
    textures: BTreeMap<RawHandle, TextureObject>,
    active_unit: u32,
    units: BTreeMap<u32, RawHandle>,
    shaders: BTreeMap<RawHandle, ShaderObject>,
    programs: BTreeMap<RawHandle, ProgramObject>,
    program_in_use: Option<RawHandle>,
    attributes: BTreeMap<u32, AttributeState>,
    draws: Vec<DrawRecord>,
    probes: Vec<Vec<usize>>,
}

fn invalid(kind: &'static str, handle: RawHandle) -> DeviceError {
    DeviceError::InvalidHandle {
        kind,
        handle: handle.get(),
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// A device with [`DeviceLimits::default`] and a current context.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        HeadlessDevice {
            limits,
            style: DiagnosticStyle::default(),
            current: true,
            next_handle: 0,
            error: None,
            buffers: BTreeMap::new(),
            bound_buffers: BTreeMap::new(),
            textures: BTreeMap::new(),
            active_unit: 0,
            units: BTreeMap::new(),
            shaders: BTreeMap::new(),
            programs: BTreeMap::new(),
            program_in_use: None,
            attributes: BTreeMap::new(),
            draws: Vec::new(),
            probes: Vec::new(),
        }
    }

    /// Formats compile logs the way `style`'s driver does.
    pub fn with_diagnostic_style(mut self, style: DiagnosticStyle) -> Self {
        self.style = style;
        self
    }

    /// Makes the context not current.  Objects survive until [`Self::make_current`].
    pub fn lose_context(&mut self) {
        self.current = false;
    }

    pub fn make_current(&mut self) {
        self.current = true;
    }

    pub fn buffer_contents(&self, buffer: RawHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }
    /// How many times storage was allocated for `buffer`.
    pub fn buffer_allocations(&self, buffer: RawHandle) -> usize {
        self.buffers.get(&buffer).map_or(0, |b| b.allocations)
    }
    pub fn buffer_usage(&self, buffer: RawHandle) -> Option<BufferUsage> {
        self.buffers.get(&buffer).map(|b| b.usage)
    }
    pub fn bound_buffer(&self, target: BufferTarget) -> Option<RawHandle> {
        self.bound_buffers.get(&target).copied()
    }

    pub fn texture_contents(&self, texture: RawHandle) -> Option<&[u8]> {
        self.textures.get(&texture).map(|t| t.data.as_slice())
    }
    pub fn texture_shape(&self, texture: RawHandle) -> Option<&[usize]> {
        self.textures.get(&texture).map(|t| t.shape.as_slice())
    }
    /// Number of full uploads into `texture`.  Sub-region updates are not counted.
    pub fn texture_uploads(&self, texture: RawHandle) -> usize {
        self.textures.get(&texture).map_or(0, |t| t.uploads)
    }
    pub fn texture_parameters(&self, texture: RawHandle) -> Option<(Interpolation, Wrapping)> {
        self.textures
            .get(&texture)
            .map(|t| (t.interpolation, t.wrapping))
    }
    pub fn bound_texture(&self, unit: u32) -> Option<RawHandle> {
        self.units.get(&unit).copied()
    }

    /// Number of compiles of `shader`, failed ones included.
    pub fn compile_count(&self, shader: RawHandle) -> usize {
        self.shaders.get(&shader).map_or(0, |s| s.compiles)
    }
    /// Number of links of `program`, failed ones included.
    pub fn link_count(&self, program: RawHandle) -> usize {
        self.programs.get(&program).map_or(0, |p| p.links)
    }
    pub fn program_in_use(&self) -> Option<RawHandle> {
        self.program_in_use
    }

    fn input(&self, program: RawHandle, name: &str) -> Option<(&ProgramObject, &ActiveInput)> {
        let object = self.programs.get(&program)?;
        let input = object.inputs.iter().find(|i| i.name == name)?;
        Some((object, input))
    }

    /// The last value set on uniform `name` of `program`.
    pub fn uniform_value(&self, program: RawHandle, name: &str) -> Option<GenericValue> {
        let (object, input) = self.input(program, name)?;
        object.uniforms.get(&input.location).cloned()
    }
    /// The texture unit sampler `name` of `program` reads.
    pub fn sampler_unit(&self, program: RawHandle, name: &str) -> Option<u32> {
        let (object, input) = self.input(program, name)?;
        object.samplers.get(&input.location).copied()
    }
    /// What attribute `name` of `program` currently reads.
    pub fn attribute_state(&self, program: RawHandle, name: &str) -> AttributeState {
        self.input(program, name)
            .filter(|(_, input)| input.role == SlotRole::Attribute)
            .and_then(|(_, input)| self.attributes.get(&input.location).cloned())
            .unwrap_or(AttributeState::Disabled)
    }

    /// Every draw accepted so far, oldest first.
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }
    /// Every extent passed to `probe_texture`, oldest first.
    pub fn probed_extents(&self) -> &[Vec<usize>] {
        &self.probes
    }

    fn record(&mut self, err: DeviceError) {
        logwise::trace_sync!("headless device error: {err}", err = LogIt(&err));
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn check_current(&self) -> Result<(), DeviceError> {
        if self.current {
            Ok(())
        } else {
            Err(DeviceError::ContextLost)
        }
    }

    fn allocate_handle(&mut self) -> Result<RawHandle, DeviceError> {
        self.check_current()?;
        let next = self
            .next_handle
            .checked_add(1)
            .ok_or(DeviceError::OutOfMemory)?;
        self.next_handle = next;
        RawHandle::new(next).ok_or(DeviceError::OutOfMemory)
    }

    fn fits(&self, target: TextureTarget, shape: &[usize]) -> bool {
        shape.len() == target.ndim()
            && shape.iter().all(|&extent| {
                extent > 0
                    && extent <= self.limits.max_texture_size
                    && (!self.limits.require_power_of_two || extent.is_power_of_two())
            })
    }

    /// The slot at `location` of the program in use.
    fn slot(&self, location: u32, role: SlotRole) -> Result<&ActiveInput, DeviceError> {
        let program = self
            .program_in_use
            .ok_or_else(|| DeviceError::InvalidOperation("no program in use".to_string()))?;
        let object = self
            .programs
            .get(&program)
            .ok_or_else(|| invalid("program", program))?;
        object
            .inputs
            .iter()
            .find(|i| i.location == location && i.role == role)
            .ok_or_else(|| DeviceError::InvalidOperation(format!("no input at location {location}")))
    }

    fn program_mut(&mut self) -> Result<&mut ProgramObject, DeviceError> {
        let program = self
            .program_in_use
            .ok_or_else(|| DeviceError::InvalidOperation("no program in use".to_string()))?;
        self.programs
            .get_mut(&program)
            .ok_or_else(|| invalid("program", program))
    }
}

impl Device for HeadlessDevice {
    fn is_current(&self) -> bool {
        self.current
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn take_error(&mut self) -> Option<DeviceError> {
        self.error.take()
    }

    fn create_buffer(&mut self) -> Result<RawHandle, DeviceError> {
        let handle = self.allocate_handle()?;
        self.buffers.insert(
            handle,
            BufferObject {
                data: Vec::new(),
                usage: BufferUsage::default(),
                allocations: 0,
            },
        );
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: RawHandle) -> Result<(), DeviceError> {
        self.check_current()?;
        self.buffers
            .remove(&buffer)
            .ok_or_else(|| invalid("buffer", buffer))?;
        self.bound_buffers.retain(|_, b| *b != buffer);
        Ok(())
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<RawHandle>) {
        if let Err(err) = self.check_current() {
            return self.record(err);
        }
        match buffer {
            Some(buffer) if !self.buffers.contains_key(&buffer) => {
                self.record(invalid("buffer", buffer))
            }
            Some(buffer) => {
                self.bound_buffers.insert(target, buffer);
            }
            None => {
                self.bound_buffers.remove(&target);
            }
        }
    }

    fn allocate_buffer(
        &mut self,
        buffer: RawHandle,
        size: usize,
        usage: BufferUsage,
    ) -> Result<(), DeviceError> {
        self.check_current()?;
        let object = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| invalid("buffer", buffer))?;
        object.data = vec![0; size];
        object.usage = usage;
        object.allocations += 1;
        Ok(())
    }

    fn write_buffer(
        &mut self,
        buffer: RawHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        self.check_current()?;
        let object = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| invalid("buffer", buffer))?;
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= object.data.len())
            .ok_or_else(|| {
                DeviceError::InvalidValue(format!(
                    "write of {} bytes at {offset} into a {}-byte buffer",
                    data.len(),
                    object.data.len()
                ))
            })?;
        object.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&mut self, target: TextureTarget) -> Result<RawHandle, DeviceError> {
        let handle = self.allocate_handle()?;
        self.textures.insert(
            handle,
            TextureObject {
                target,
                shape: Vec::new(),
                format: None,
                element: None,
                data: Vec::new(),
                uploads: 0,
                interpolation: Interpolation::default(),
                wrapping: Wrapping::default(),
            },
        );
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: RawHandle) -> Result<(), DeviceError> {
        self.check_current()?;
        self.textures
            .remove(&texture)
            .ok_or_else(|| invalid("texture", texture))?;
        self.units.retain(|_, t| *t != texture);
        Ok(())
    }

    fn select_texture_unit(&mut self, unit: u32) -> Result<(), DeviceError> {
        self.check_current()?;
        if unit >= self.limits.max_texture_units {
            return Err(DeviceError::InvalidValue(format!(
                "texture unit {unit} of {}",
                self.limits.max_texture_units
            )));
        }
        self.active_unit = unit;
        Ok(())
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<RawHandle>) {
        if let Err(err) = self.check_current() {
            return self.record(err);
        }
        match texture {
            Some(texture) => match self.textures.get(&texture) {
                None => self.record(invalid("texture", texture)),
                Some(object) if object.target != target => self.record(
                    DeviceError::InvalidOperation(format!(
                        "texture {} is {:?}, not {target:?}",
                        texture.get(),
                        object.target
                    )),
                ),
                Some(_) => {
                    self.units.insert(self.active_unit, texture);
                }
            },
            None => {
                self.units.remove(&self.active_unit);
            }
        }
    }

    fn probe_texture(
        &mut self,
        target: TextureTarget,
        shape: &[usize],
        _format: TextureFormat,
        _element: ElementType,
    ) -> bool {
        self.probes.push(shape.to_vec());
        self.current && self.fits(target, shape)
    }

    fn upload_texture(
        &mut self,
        texture: RawHandle,
        texels: TexelData<'_>,
    ) -> Result<(), DeviceError> {
        self.check_current()?;
        let target = self
            .textures
            .get(&texture)
            .ok_or_else(|| invalid("texture", texture))?
            .target;
        if !self.fits(target, texels.shape) {
            return Err(DeviceError::InvalidValue(format!(
                "extent {:?} is not supported",
                texels.shape
            )));
        }
        let expected = texels.shape.iter().product::<usize>()
            * texels.format.channels()
            * texels.element.size();
        if texels.data.len() != expected {
            return Err(DeviceError::InvalidValue(format!(
                "{} bytes for a {expected}-byte image",
                texels.data.len()
            )));
        }
        let object = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| invalid("texture", texture))?;
        object.shape = texels.shape.to_vec();
        object.format = Some(texels.format);
        object.element = Some(texels.element);
        object.data = texels.data.to_vec();
        object.uploads += 1;
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: RawHandle,
        offset: &[usize],
        texels: TexelData<'_>,
    ) -> Result<(), DeviceError> {
        self.check_current()?;
        let object = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| invalid("texture", texture))?;
        if object.format != Some(texels.format) || object.element != Some(texels.element) {
            return Err(DeviceError::InvalidOperation(format!(
                "update with {:?} {:?} data into a {:?} {:?} texture",
                texels.format, texels.element, object.format, object.element
            )));
        }
        if !region_fits(&object.shape, offset, texels.shape) {
            return Err(DeviceError::InvalidValue(format!(
                "region {:?} at {offset:?} outside {:?}",
                texels.shape, object.shape
            )));
        }
        let texel = texels.format.channels() * texels.element.size();
        if texels.data.len() != texels.shape.iter().product::<usize>() * texel {
            return Err(DeviceError::InvalidValue(format!(
                "{} bytes for region {:?}",
                texels.data.len(),
                texels.shape
            )));
        }
        copy_region(
            &object.shape,
            &mut object.data,
            offset,
            texels.shape,
            texels.data,
            texel,
        );
        Ok(())
    }

    fn set_texture_parameter(
        &mut self,
        texture: RawHandle,
        parameter: TextureParameter,
    ) -> Result<(), DeviceError> {
        self.check_current()?;
        let object = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| invalid("texture", texture))?;
        match parameter {
            TextureParameter::Interpolation(i) => object.interpolation = i,
            TextureParameter::Wrapping(w) => object.wrapping = w,
        }
        Ok(())
    }

    fn create_shader(&mut self, kind: StageKind) -> Result<RawHandle, DeviceError> {
        let handle = self.allocate_handle()?;
        self.shaders.insert(
            handle,
            ShaderObject {
                kind,
                compiled: None,
                compiles: 0,
            },
        );
        Ok(handle)
    }

    fn delete_shader(&mut self, shader: RawHandle) -> Result<(), DeviceError> {
        self.check_current()?;
        self.shaders
            .remove(&shader)
            .ok_or_else(|| invalid("shader", shader))?;
        for program in self.programs.values_mut() {
            program.attached.retain(|s| *s != shader);
        }
        Ok(())
    }

    fn compile_shader(&mut self, shader: RawHandle, source: &str) -> Result<BuildLog, DeviceError> {
        self.check_current()?;
        let style = self.style;
        let object = self
            .shaders
            .get_mut(&shader)
            .ok_or_else(|| invalid("shader", shader))?;
        object.compiles += 1;
        match compiler::check(source) {
            Ok(()) => {
                object.compiled = Some(source.to_string());
                Ok(BuildLog {
                    success: true,
                    log: String::new(),
                })
            }
            Err((line, message)) => {
                object.compiled = None;
                Ok(BuildLog {
                    success: false,
                    log: style.format(line, &message),
                })
            }
        }
    }

    fn create_program(&mut self) -> Result<RawHandle, DeviceError> {
        let handle = self.allocate_handle()?;
        self.programs.insert(handle, ProgramObject::default());
        Ok(handle)
    }

    fn delete_program(&mut self, program: RawHandle) -> Result<(), DeviceError> {
        self.check_current()?;
        self.programs
            .remove(&program)
            .ok_or_else(|| invalid("program", program))?;
        if self.program_in_use == Some(program) {
            self.program_in_use = None;
        }
        Ok(())
    }

    fn attach_shader(&mut self, program: RawHandle, shader: RawHandle) -> Result<(), DeviceError> {
        self.check_current()?;
        if !self.shaders.contains_key(&shader) {
            return Err(invalid("shader", shader));
        }
        let object = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| invalid("program", program))?;
        if object.attached.contains(&shader) {
            return Err(DeviceError::InvalidOperation(format!(
                "shader {} is already attached",
                shader.get()
            )));
        }
        object.attached.push(shader);
        Ok(())
    }

    fn detach_shader(&mut self, program: RawHandle, shader: RawHandle) -> Result<(), DeviceError> {
        self.check_current()?;
        let object = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| invalid("program", program))?;
        let before = object.attached.len();
        object.attached.retain(|s| *s != shader);
        if object.attached.len() == before {
            return Err(DeviceError::InvalidOperation(format!(
                "shader {} is not attached",
                shader.get()
            )));
        }
        Ok(())
    }

    fn link_program(&mut self, program: RawHandle) -> Result<BuildLog, DeviceError> {
        self.check_current()?;
        let attached = self
            .programs
            .get(&program)
            .ok_or_else(|| invalid("program", program))?
            .attached
            .clone();
        let mut stages = Vec::new();
        let mut problem = None;
        for shader in &attached {
            match self.shaders.get(shader) {
                Some(ShaderObject {
                    kind,
                    compiled: Some(source),
                    ..
                }) => stages.push((*kind, source.as_str())),
                Some(object) => {
                    problem = Some(format!("error: attached {} shader is not compiled", object.kind))
                }
                None => problem = Some(format!("error: shader {} does not exist", shader.get())),
            }
        }
        let result = match problem {
            Some(problem) => Err(problem),
            None => compiler::link(&stages),
        };
        let object = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| invalid("program", program))?;
        object.links += 1;
        object.uniforms.clear();
        object.samplers.clear();
        match result {
            Ok(inputs) => {
                object.inputs = inputs;
                Ok(BuildLog {
                    success: true,
                    log: String::new(),
                })
            }
            Err(log) => {
                object.inputs.clear();
                Ok(BuildLog {
                    success: false,
                    log,
                })
            }
        }
    }

    fn active_inputs(&self, program: RawHandle) -> Result<Vec<ActiveInput>, DeviceError> {
        self.check_current()?;
        self.programs
            .get(&program)
            .map(|p| p.inputs.clone())
            .ok_or_else(|| invalid("program", program))
    }

    fn use_program(&mut self, program: Option<RawHandle>) {
        if let Err(err) = self.check_current() {
            return self.record(err);
        }
        match program {
            Some(program) if !self.programs.contains_key(&program) => {
                self.record(invalid("program", program))
            }
            program => self.program_in_use = program,
        }
    }

    fn set_uniform(&mut self, location: u32, value: &GenericValue) -> Result<(), DeviceError> {
        self.check_current()?;
        let slot = self.slot(location, SlotRole::Uniform)?;
        let expected_kind = match slot.slot_type.scalar_kind() {
            ScalarKind::Float => ScalarKind::Float,
            ScalarKind::Int | ScalarKind::Bool => ScalarKind::Int,
        };
        if slot.slot_type.is_sampler()
            || slot.slot_type.arity() != value.len()
            || value.scalar_kind() != expected_kind
        {
            return Err(DeviceError::InvalidOperation(format!(
                "{:?} value of {} components for {} {}",
                value.scalar_kind(),
                value.len(),
                slot.slot_type.glsl_name(),
                slot.name
            )));
        }
        self.program_mut()?.uniforms.insert(location, value.clone());
        Ok(())
    }

    fn set_sampler(&mut self, location: u32, unit: u32) -> Result<(), DeviceError> {
        self.check_current()?;
        let slot = self.slot(location, SlotRole::Uniform)?;
        if !slot.slot_type.is_sampler() {
            return Err(DeviceError::InvalidOperation(format!("{} is not a sampler", slot.name)));
        }
        if unit >= self.limits.max_texture_units {
            return Err(DeviceError::InvalidValue(format!("texture unit {unit}")));
        }
        self.program_mut()?.samplers.insert(location, unit);
        Ok(())
    }

    fn set_attribute_constant(
        &mut self,
        location: u32,
        value: &[f32],
    ) -> Result<(), DeviceError> {
        self.check_current()?;
        if location >= MAX_ATTRIBUTES || value.is_empty() || value.len() > 16 {
            return Err(DeviceError::InvalidValue(format!(
                "{} components at attribute location {location}",
                value.len()
            )));
        }
        self.attributes
            .insert(location, AttributeState::Constant(value.to_vec()));
        Ok(())
    }

    fn set_attribute_pointer(
        &mut self,
        location: u32,
        pointer: AttributePointer,
    ) -> Result<(), DeviceError> {
        self.check_current()?;
        if location >= MAX_ATTRIBUTES || !(1..=4).contains(&pointer.arity) {
            return Err(DeviceError::InvalidValue(format!(
                "{} components at attribute location {location}",
                pointer.arity
            )));
        }
        let buffer = self.bound_buffer(BufferTarget::Array).ok_or_else(|| {
            DeviceError::InvalidOperation("no buffer bound for attribute data".to_string())
        })?;
        self.attributes
            .insert(location, AttributeState::Pointer { buffer, pointer });
        Ok(())
    }

    fn disable_attribute(&mut self, location: u32) {
        if let Err(err) = self.check_current() {
            return self.record(err);
        }
        self.attributes.insert(location, AttributeState::Disabled);
    }

    fn draw(&mut self, primitive: Primitive, command: DrawCommand) -> Result<(), DeviceError> {
        self.check_current()?;
        let program = self
            .program_in_use
            .ok_or_else(|| DeviceError::InvalidOperation("draw without a program".to_string()))?;
        let inputs = &self
            .programs
            .get(&program)
            .ok_or_else(|| invalid("program", program))?
            .inputs;

        let mut attributes = Vec::new();
        for input in inputs.iter().filter(|i| i.role == SlotRole::Attribute) {
            let state = self
                .attributes
                .get(&input.location)
                .cloned()
                .unwrap_or(AttributeState::Disabled);
            if let (AttributeState::Pointer { buffer, pointer }, DrawCommand::Arrays { first, count }) =
                (&state, command)
            {
                let len = self.buffers.get(buffer).map_or(0, |b| b.data.len());
                let element = pointer.arity * pointer.element.size();
                let stride = if pointer.stride == 0 { element } else { pointer.stride };
                if count > 0 && pointer.offset + (first + count - 1) * stride + element > len {
                    return Err(DeviceError::InvalidOperation(format!(
                        "{} reads past the end of its {len}-byte buffer",
                        input.name
                    )));
                }
            }
            attributes.push((input.location, state));
        }

        let index_buffer = match command {
            DrawCommand::Arrays { .. } => None,
            DrawCommand::Elements { count, index_type } => {
                let buffer = self.bound_buffer(BufferTarget::ElementArray).ok_or_else(|| {
                    DeviceError::InvalidOperation("indexed draw without an index buffer".to_string())
                })?;
                let len = self.buffers.get(&buffer).map_or(0, |b| b.data.len());
                if count * index_type.size() > len {
                    return Err(DeviceError::InvalidOperation(format!(
                        "{count} indices from a {len}-byte buffer"
                    )));
                }
                Some(buffer)
            }
        };

        let record = DrawRecord {
            program,
            primitive,
            command,
            index_buffer,
            attributes,
            textures: self.units.iter().map(|(u, t)| (*u, *t)).collect(),
        };
        self.draws.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(device: &mut HeadlessDevice, vertex: &str, fragment: &str) -> RawHandle {
        let v = device.create_shader(StageKind::Vertex).unwrap();
        let f = device.create_shader(StageKind::Fragment).unwrap();
        assert!(device.compile_shader(v, vertex).unwrap().success);
        assert!(device.compile_shader(f, fragment).unwrap().success);
        let p = device.create_program().unwrap();
        device.attach_shader(p, v).unwrap();
        device.attach_shader(p, f).unwrap();
        assert!(device.link_program(p).unwrap().success);
        p
    }

    #[test]
    fn compile_log_follows_style() {
        let mut device = HeadlessDevice::new().with_diagnostic_style(DiagnosticStyle::Nvidia);
        let shader = device.create_shader(StageKind::Fragment).unwrap();
        let log = device.compile_shader(shader, "void main() {\n").unwrap();
        assert!(!log.success);
        assert!(log.log.starts_with("0(1) : error"));
    }

    #[test]
    fn uniform_checks_type() {
        let mut device = HeadlessDevice::new();
        let p = program(
            &mut device,
            "void main() { gl_Position = vec4(0.0); }",
            "uniform vec2 u_v; void main() { gl_FragColor = vec4(u_v, 0.0, 1.0); }",
        );
        device.use_program(Some(p));
        assert!(device.set_uniform(0, &GenericValue::Float(vec![1.0])).is_err());
        assert!(device.set_uniform(0, &GenericValue::Int(vec![1, 2])).is_err());
        device.set_uniform(0, &GenericValue::Float(vec![1.0, 2.0])).unwrap();
        assert_eq!(
            device.uniform_value(p, "u_v"),
            Some(GenericValue::Float(vec![1.0, 2.0]))
        );
    }

    #[test]
    fn fire_and_forget_errors_are_recorded() {
        let mut device = HeadlessDevice::new();
        let bogus = RawHandle::new(99).unwrap();
        device.bind_buffer(BufferTarget::Array, Some(bogus));
        device.use_program(Some(bogus));
        assert!(matches!(
            device.take_error(),
            Some(DeviceError::InvalidHandle { kind: "buffer", .. })
        ));
        assert_eq!(device.take_error(), None);
    }

    #[test]
    fn draw_checks_buffer_bounds() {
        let mut device = HeadlessDevice::new();
        let p = program(
            &mut device,
            "attribute vec2 a_p; void main() { gl_Position = vec4(a_p, 0.0, 1.0); }",
            "void main() { gl_FragColor = vec4(1.0); }",
        );
        let buffer = device.create_buffer().unwrap();
        device.allocate_buffer(buffer, 24, BufferUsage::Static).unwrap();
        device.bind_buffer(BufferTarget::Array, Some(buffer));
        device.use_program(Some(p));
        let pointer = AttributePointer {
            arity: 2,
            element: ElementType::F32,
            stride: 8,
            offset: 0,
        };
        device.set_attribute_pointer(0, pointer).unwrap();
        device
            .draw(Primitive::Triangles, DrawCommand::Arrays { first: 0, count: 3 })
            .unwrap();
        assert!(device
            .draw(Primitive::Triangles, DrawCommand::Arrays { first: 0, count: 4 })
            .is_err());
        assert_eq!(device.draws().len(), 1);
        assert_eq!(
            device.draws()[0].attributes,
            [(0, AttributeState::Pointer { buffer, pointer })]
        );
    }

    #[test]
    fn probe_respects_limits() {
        let mut device = HeadlessDevice::with_limits(DeviceLimits {
            max_texture_size: 64,
            require_power_of_two: true,
            ..DeviceLimits::default()
        });
        let probe = |device: &mut HeadlessDevice, shape: &[usize]| {
            device.probe_texture(
                TextureTarget::Texture2D,
                shape,
                TextureFormat::Rgba,
                ElementType::U8,
            )
        };
        assert!(probe(&mut device, &[64, 32]));
        assert!(!probe(&mut device, &[128, 32]));
        assert!(!probe(&mut device, &[48, 32]));
        assert!(!probe(&mut device, &[32]));
    }
}
