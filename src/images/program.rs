// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Linked programs and their named inputs.

A [`Program`] aggregates shader stages and a table of values assigned to input names.  Values
can be assigned at any time.  Activating the program brings everything up to date, in order:

1. stages detached since the last activation are detached from the device program, and new
   ones attached;
2. stages with new source are compiled;
3. the program is relinked if any stage changed, rebuilding the table of active inputs;
4. every assigned value is applied against that table.  Names the linker did not keep are
   reported once per link and otherwise ignored.

Activation returns an [`ActiveProgram`] guard.  Drawing is only possible through the guard, and
dropping it releases the program.

```
use buffers_and_bindings::HeadlessDevice;
use buffers_and_bindings::bindings::InputValue;
use buffers_and_bindings::images::program::Program;
use buffers_and_bindings::images::render_pass::Primitive;
use buffers_and_bindings::images::shader::ShaderStage;

let vertex = ShaderStage::vertex(
    "attribute vec2 a_position;
     uniform float u_scale;
     void main() { gl_Position = vec4(a_position * u_scale, 0.0, 1.0); }",
);
let fragment = ShaderStage::fragment(
    "uniform vec4 u_color;
     void main() { gl_FragColor = u_color; }",
);
let mut program = Program::new(vertex, fragment);
//assigned before any device exists
program.set_uniform("u_color", [1.0f32, 0.0, 0.0, 1.0]).unwrap();
program
    .set_attribute("a_position", InputValue::dense(&[0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0], 2).unwrap())
    .unwrap();

let mut device = HeadlessDevice::new();
{
    let mut active = program.activate(&mut device).unwrap();
    active.set_uniform("u_scale", 0.5f32).unwrap();
    active.draw(Primitive::Triangles, None).unwrap();
}
assert_eq!(device.draws().len(), 1);
assert_eq!(device.draws()[0].command.vertex_count(), 3);
program.delete(&mut device);
```
*/

use crate::Error;
use crate::bindings::index_buffer::IndexBuffer;
use crate::bindings::inputs::{InputValue, VaryingSource};
use crate::bindings::resource_tracking::{
    self, Lifecycle, ObjectKind, ObjectState, RawHandle, Tracked,
};
use crate::bindings::vertex_buffer::VertexBuffer;
use crate::images::device::Device;
use crate::images::diagnostics;
use crate::images::reflection::{ActiveInput, SlotRole};
use crate::images::render_pass::{DrawCommand, Primitive};
use crate::images::shader::{CompileStatus, ShaderStage};
use logwise::privacy::LogIt;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Checks that `value` can be applied to `slot`.
fn check_compatible(slot: &ActiveInput, value: &InputValue) -> Result<(), Error> {
    let invalid = || Error::InvalidBinding {
        name: slot.name.clone(),
        kind: value.kind(),
    };
    let expected = slot.slot_type.arity();
    match value {
        InputValue::Generic(generic) => {
            if slot.slot_type.is_sampler() {
                return Err(invalid());
            }
            if generic.len() != expected {
                return Err(Error::BindingArity {
                    name: slot.name.clone(),
                    expected,
                    got: generic.len(),
                });
            }
        }
        InputValue::Varying(source) => {
            if slot.role != SlotRole::Attribute {
                return Err(invalid());
            }
            let got = source.arity()?;
            if got != expected {
                return Err(Error::BindingArity {
                    name: slot.name.clone(),
                    expected,
                    got,
                });
            }
        }
        InputValue::TextureRef(_) => {
            if !slot.slot_type.is_sampler() {
                return Err(invalid());
            }
        }
    }
    Ok(())
}

fn dense_buffer(value: &InputValue) -> Option<&Rc<VertexBuffer>> {
    match value {
        InputValue::Varying(VaryingSource::Dense(buffer)) => Some(buffer),
        _ => None,
    }
}

/// A compile failure surfaces from a program as a link failure.
fn as_link_error(err: Error) -> Error {
    match err {
        Error::Compile { diagnostics, .. } => Error::Link { diagnostics },
        other => other,
    }
}

/// A shader program: attached stages, the inputs the linker kept, and assigned input values.
#[derive(Debug)]
pub struct Program {
    lifecycle: Lifecycle,
    stages: Vec<ShaderStage>,
    /// Stages attached to the device program, with the stage handle they were attached under.
    attached: Vec<(ShaderStage, RawHandle)>,
    /// Stage generations and handles at the last successful link.
    linked: Option<Vec<(u64, Option<RawHandle>)>>,
    /// Stage generations at the last update attempt.
    attempted: Vec<u64>,
    slots: BTreeMap<String, ActiveInput>,
    values: BTreeMap<String, InputValue>,
    /// Buffers of replaced dense values, deleted at the next activation.
    retired: Vec<Rc<VertexBuffer>>,
    /// Names already reported since the last link.
    warned: BTreeSet<String>,
    /// Names whose value did not fit its input at activation; skipped until reassigned or relinked.
    rejected: BTreeSet<String>,
    /// Texture unit of each sampler bound in the current activation.
    units: BTreeMap<String, u32>,
    next_unit: u32,
}

impl Program {
    pub fn new(vertex: ShaderStage, fragment: ShaderStage) -> Self {
        let mut program = Self::empty();
        program.stages = vec![vertex, fragment];
        program
    }

    /// A program with no stages.
    pub fn empty() -> Self {
        Program {
            lifecycle: Lifecycle::new(ObjectKind::Program, "program"),
            stages: Vec::new(),
            attached: Vec::new(),
            linked: None,
            attempted: Vec::new(),
            slots: BTreeMap::new(),
            values: BTreeMap::new(),
            retired: Vec::new(),
            warned: BTreeSet::new(),
            rejected: BTreeSet::new(),
            units: BTreeMap::new(),
            next_unit: 0,
        }
    }

    pub fn with_debug_name(mut self, name: &str) -> Self {
        self.lifecycle.set_debug_name(name);
        self
    }

    /// Adds a stage.  Takes effect at the next activation.
    pub fn attach(&mut self, stage: ShaderStage) {
        if !self.stages.iter().any(|s| s.same_stage(&stage)) {
            self.stages.push(stage);
            self.lifecycle.mark_dirty();
        }
    }

    /// Removes a stage.  Takes effect at the next activation.
    pub fn detach(&mut self, stage: &ShaderStage) {
        let before = self.stages.len();
        self.stages.retain(|s| !s.same_stage(stage));
        if self.stages.len() != before {
            self.lifecycle.mark_dirty();
        }
    }

    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }
    pub fn handle(&self) -> Option<RawHandle> {
        self.lifecycle.handle()
    }
    pub fn state(&self) -> ObjectState {
        self.lifecycle.state()
    }

    fn stage_signature(&self) -> Vec<(u64, Option<RawHandle>)> {
        self.stages
            .iter()
            .map(|s| (s.generation(), s.handle()))
            .collect()
    }

    fn stage_generations(&self) -> Vec<u64> {
        self.stages.iter().map(|s| s.generation()).collect()
    }

    /// Whether the input table reflects the current stages.
    pub fn is_linked(&self) -> bool {
        self.linked.as_ref() == Some(&self.stage_signature())
    }

    /// The inputs the linker kept, by name.  Empty until linked.
    pub fn active_inputs(&self) -> impl Iterator<Item = &ActiveInput> {
        self.slots.values()
    }

    fn current_slot(&self, name: &str) -> Option<&ActiveInput> {
        if self.is_linked() {
            self.slots.get(name)
        } else {
            None
        }
    }

    /// The value assigned to `name`, if any.
    pub fn value(&self, name: &str) -> Option<&InputValue> {
        self.values.get(name)
    }

    /**
    Assigns a value to the input `name`.

    If the program is linked and `name` is active, the value is checked now: its component
    count must match the input's and its kind must suit the input.  Otherwise the check is
    deferred to the next activation.  Names the program does not have are accepted and never
    applied.
    */
    pub fn set_input(&mut self, name: &str, value: impl Into<InputValue>) -> Result<(), Error> {
        let value = value.into();
        if let Some(slot) = self.current_slot(name) {
            check_compatible(slot, &value)?;
        }
        self.rejected.remove(name);
        if let Some(old) = self.values.insert(name.to_string(), value) {
            if let Some(buffer) = dense_buffer(&old) {
                self.retired.push(buffer.clone());
            }
        }
        Ok(())
    }

    fn check_role(&self, name: &str, role: SlotRole, kind: &'static str) -> Result<(), Error> {
        match self.current_slot(name) {
            Some(slot) if slot.role != role => Err(Error::InvalidBinding {
                name: name.to_string(),
                kind,
            }),
            _ => Ok(()),
        }
    }

    /// Like [`Self::set_input`], and fails if `name` is an active attribute.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<InputValue>) -> Result<(), Error> {
        self.check_role(name, SlotRole::Uniform, "uniform")?;
        self.set_input(name, value)
    }

    /// Like [`Self::set_input`], and fails if `name` is an active uniform.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<InputValue>) -> Result<(), Error> {
        self.check_role(name, SlotRole::Attribute, "attribute")?;
        self.set_input(name, value)
    }

    fn link(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        self.slots.clear();
        self.warned.clear();
        self.rejected.clear();
        self.linked = None;
        let log = device.link_program(handle)?;
        if !log.success {
            return Err(Error::Link {
                diagnostics: diagnostics::parse(&log.log, ""),
            });
        }
        for input in device.active_inputs(handle)? {
            self.slots.insert(input.name.clone(), input);
        }
        self.linked = Some(self.stage_signature());
        logwise::info_sync!(
            "linked program {name} with {count} active inputs",
            name = LogIt(&self.lifecycle.debug_name()),
            count = self.slots.len()
        );
        Ok(())
    }

    /// Applies the value assigned to `name`, if `name` is active.
    fn apply(&mut self, device: &mut dyn Device, name: &str) -> Result<(), Error> {
        let Some(value) = self.values.get(name) else {
            return Ok(());
        };
        let Some(slot) = self.slots.get(name) else {
            if self.warned.insert(name.to_string()) {
                logwise::warn_sync!(
                    "program {program} has no active input {name}; its value is ignored",
                    program = LogIt(&self.lifecycle.debug_name()),
                    name = LogIt(&name)
                );
            }
            return Ok(());
        };
        check_compatible(slot, value)?;
        match (slot.role, value) {
            (SlotRole::Uniform, InputValue::Generic(generic)) => {
                let converted = generic.converted_to(slot.slot_type.scalar_kind());
                device.set_uniform(slot.location, &converted)?;
            }
            (SlotRole::Uniform, InputValue::TextureRef(texture)) => {
                //a sampler keeps its unit for the rest of the activation
                let assigned = self.units.get(name).copied();
                let unit = assigned.unwrap_or(self.next_unit);
                if unit >= device.limits().max_texture_units {
                    return Err(Error::BackendUnsupported {
                        capability: format!("texture unit {unit}"),
                    });
                }
                texture.activate_on_unit(device, unit)?;
                device.set_sampler(slot.location, unit)?;
                if assigned.is_none() {
                    self.units.insert(name.to_string(), unit);
                    self.next_unit += 1;
                }
            }
            (SlotRole::Attribute, InputValue::Generic(generic)) => {
                device.set_attribute_constant(slot.location, &generic.to_floats())?;
            }
            (SlotRole::Attribute, InputValue::Varying(source)) => {
                let view = source.view()?;
                view.activate(device)?;
                device.set_attribute_pointer(slot.location, view.pointer())?;
            }
            (_, value) => {
                return Err(Error::InvalidBinding {
                    name: name.to_string(),
                    kind: value.kind(),
                });
            }
        }
        Ok(())
    }

    /**
    Brings the program up to date and makes it current.

    Fails with [`Error::Link`] if a stage does not compile or the program does not link; the
    input table is then empty and the program stays failed until a stage gets new source or
    the stage set changes.  While failed, activation succeeds but draws nothing.

    A value that does not fit its input fails the activation that first applies it, with
    [`Error::BindingArity`] or [`Error::InvalidBinding`].  The other values are still applied,
    and later activations skip the misfit until it is reassigned or the program relinks.
    */
    pub fn activate<'p, 'd>(
        &'p mut self,
        device: &'d mut dyn Device,
    ) -> Result<ActiveProgram<'p, 'd>, Error> {
        if self.lifecycle.state() == ObjectState::Error
            && self.attempted != self.stage_generations()
        {
            self.lifecycle.mark_dirty();
        }
        if let Err(err) = resource_tracking::activate(self, device) {
            resource_tracking::deactivate(self, device);
            return Err(err);
        }
        Ok(ActiveProgram {
            program: self,
            device,
        })
    }

    pub fn deactivate(&mut self, device: &mut dyn Device) {
        resource_tracking::deactivate(self, device)
    }

    /**
    Deletes the device program and the buffers of dense values.

    Stages are deleted too unless something else still holds them: another program, or the
    caller's own clone.  Shared stages are left to their last holder.
    */
    pub fn delete(&mut self, device: &mut dyn Device) {
        resource_tracking::delete(self, device);
        self.attached.clear();
        for stage in &self.stages {
            if stage.holders() == 1 {
                stage.delete(device);
            }
        }
        let dense = self.values.values().filter_map(dense_buffer);
        for buffer in dense.chain(self.retired.iter()) {
            if let Ok(view) = buffer.view() {
                view.delete(device);
            }
        }
        self.retired.clear();
    }
}

impl Tracked for Program {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn create(&mut self, device: &mut dyn Device) -> Result<RawHandle, Error> {
        Ok(device.create_program()?)
    }

    fn update(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        self.attempted = self.stage_generations();

        let mut keep = Vec::new();
        for (stage, stage_handle) in std::mem::take(&mut self.attached) {
            let wanted = self.stages.iter().any(|s| s.same_stage(&stage))
                && stage.handle() == Some(stage_handle);
            if wanted {
                keep.push((stage, stage_handle));
            } else if let Err(err) = device.detach_shader(handle, stage_handle) {
                //a deleted stage is already gone from the device
                logwise::trace_sync!("detach skipped: {err}", err = LogIt(&err));
            }
        }
        self.attached = keep;

        for stage in &self.stages {
            if let Err(err) = stage.compile(device) {
                self.slots.clear();
                self.linked = None;
                return Err(as_link_error(err));
            }
        }
        if let Some(failed) = self
            .stages
            .iter()
            .find(|s| s.status() != CompileStatus::Succeeded)
        {
            self.slots.clear();
            self.linked = None;
            return Err(Error::Link {
                diagnostics: failed.diagnostics(),
            });
        }

        for stage in &self.stages {
            let Some(stage_handle) = stage.handle() else {
                continue;
            };
            if !self.attached.iter().any(|(s, _)| s.same_stage(stage)) {
                device.attach_shader(handle, stage_handle)?;
                self.attached.push((stage.clone(), stage_handle));
            }
        }

        if !self.is_linked() {
            self.link(device, handle)?;
        }
        Ok(())
    }

    fn needs_update(&self) -> bool {
        self.lifecycle.is_dirty() || !self.is_linked()
    }

    fn bind(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        device.use_program(Some(handle));
        self.next_unit = 0;
        self.units.clear();
        for buffer in std::mem::take(&mut self.retired) {
            if let Ok(view) = buffer.view() {
                view.delete(device);
            }
        }
        let names: Vec<String> = self.values.keys().cloned().collect();
        let mut misfit = None;
        for name in names {
            if self.rejected.contains(&name) {
                continue;
            }
            match self.apply(device, &name) {
                Ok(()) => {}
                Err(err @ (Error::BindingArity { .. } | Error::InvalidBinding { .. })) => {
                    logwise::error_sync!(
                        "program {program} skips the value of {name}: {err}",
                        program = LogIt(&self.lifecycle.debug_name()),
                        name = LogIt(&name),
                        err = LogIt(&err)
                    );
                    self.rejected.insert(name);
                    if misfit.is_none() {
                        misfit = Some(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }
        match misfit {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn unbind(&mut self, device: &mut dyn Device, _handle: RawHandle) {
        device.use_program(None);
    }

    fn destroy(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        Ok(device.delete_program(handle)?)
    }

    fn forget_device_state(&mut self) {
        self.attached.clear();
        self.linked = None;
        self.slots.clear();
        self.warned.clear();
        self.rejected.clear();
        self.units.clear();
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        if self.lifecycle.handle().is_some() {
            logwise::warn_sync!(
                "program {name} dropped while its device object is alive; call delete() first",
                name = LogIt(&self.lifecycle.debug_name())
            );
        }
    }
}

/**
A program that is current on a device.

Returned by [`Program::activate`].  Values assigned through the guard are applied immediately.
Dropping the guard releases the program.
*/
pub struct ActiveProgram<'p, 'd> {
    program: &'p mut Program,
    device: &'d mut dyn Device,
}

impl std::fmt::Debug for ActiveProgram<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveProgram")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl ActiveProgram<'_, '_> {
    pub fn program(&self) -> &Program {
        self.program
    }

    pub fn device(&mut self) -> &mut dyn Device {
        &mut *self.device
    }

    fn apply_now(&mut self, name: &str) -> Result<(), Error> {
        if self.program.state() == ObjectState::Valid && self.program.current_slot(name).is_some()
        {
            self.program.apply(&mut *self.device, name)?;
        }
        Ok(())
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<InputValue>) -> Result<(), Error> {
        self.program.set_uniform(name, value)?;
        self.apply_now(name)
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<InputValue>) -> Result<(), Error> {
        self.program.set_attribute(name, value)?;
        self.apply_now(name)
    }

    /**
    Draws `primitive`.

    Without `indices`, the vertex count is the smallest row count among the varying attributes.
    With `indices`, every index is drawn.  Attributes without a value are reported once per link;
    their arrays are disabled so they read the device default.  A program that failed to build draws nothing.
    */
    pub fn draw(&mut self, primitive: Primitive, indices: Option<&IndexBuffer>) -> Result<(), Error> {
        let program = &mut *self.program;
        if program.lifecycle.state() != ObjectState::Valid {
            logwise::trace_sync!(
                "program {name} is not valid; draw skipped",
                name = LogIt(&program.lifecycle.debug_name())
            );
            return Ok(());
        }
        let mut unset = Vec::new();
        for slot in program.slots.values() {
            if slot.role != SlotRole::Attribute
                || (program.values.contains_key(&slot.name) && !program.rejected.contains(&slot.name))
            {
                continue;
            }
            unset.push(slot.location);
            if program.warned.insert(slot.name.clone()) {
                logwise::warn_sync!(
                    "attribute {name} of program {program} has no value",
                    name = LogIt(&slot.name),
                    program = LogIt(&program.lifecycle.debug_name())
                );
            }
        }

        let mut rows: Option<usize> = None;
        for (name, value) in &program.values {
            let InputValue::Varying(source) = value else {
                continue;
            };
            if program.rejected.contains(name)
                || !matches!(program.slots.get(name), Some(slot) if slot.role == SlotRole::Attribute)
            {
                continue;
            }
            let count = source.view()?.count();
            rows = Some(rows.map_or(count, |r| r.min(count)));
        }

        let device = &mut *self.device;
        //unset attributes read the default, not whatever array was left enabled
        for location in unset {
            device.disable_attribute(location);
        }
        let command = match indices {
            Some(indices) => {
                indices.activate(device)?;
                DrawCommand::Elements {
                    count: indices.count(),
                    index_type: indices.index_type(),
                }
            }
            None => DrawCommand::Arrays {
                first: 0,
                count: rows.unwrap_or(0),
            },
        };
        let result = device.draw(primitive, command);
        if let Some(indices) = indices {
            indices.deactivate(device);
        }
        result?;
        if let Some(err) = device.take_error() {
            return Err(err.into());
        }
        Ok(())
    }
}

impl Drop for ActiveProgram<'_, '_> {
    fn drop(&mut self) {
        self.program.deactivate(&mut *self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::inputs::GenericValue;
    use crate::images::reflection::SlotType;
    use crate::{AttributeState, HeadlessDevice};

    const VERTEX: &str = "
        attribute vec3 a_position;
        uniform mat4 u_transform;
        void main() { gl_Position = u_transform * vec4(a_position, 1.0); }";
    const FRAGMENT: &str = "
        uniform vec4 u_color;
        uniform float u_unused;
        void main() { gl_FragColor = u_color; }";

    fn program() -> Program {
        Program::new(ShaderStage::vertex(VERTEX), ShaderStage::fragment(FRAGMENT))
    }

    #[test]
    fn reflects_active_inputs() {
        let mut program = program();
        let mut device = HeadlessDevice::new();
        drop(program.activate(&mut device).unwrap());
        let names: Vec<&str> = program.active_inputs().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a_position", "u_color", "u_transform"]);
        let color = program.active_inputs().find(|i| i.name == "u_color").unwrap();
        assert_eq!(color.slot_type, SlotType::Vec4);
        assert!(program.is_linked());
        program.delete(&mut device);
    }

    #[test]
    fn checks_arity_once_linked() {
        let mut program = program();
        //deferred: nothing to check against yet
        program.set_uniform("u_color", [1.0f32, 0.0, 0.0]).unwrap();
        let mut device = HeadlessDevice::new();
        assert!(matches!(
            program.activate(&mut device),
            Err(Error::BindingArity {
                expected: 4,
                got: 3,
                ..
            })
        ));
        assert!(matches!(
            program.set_uniform("u_color", 1.0f32),
            Err(Error::BindingArity { .. })
        ));
        program.set_uniform("u_color", [1.0f32, 0.0, 0.0, 1.0]).unwrap();
        drop(program.activate(&mut device).unwrap());
        assert_eq!(
            device.uniform_value(program.handle().unwrap(), "u_color"),
            Some(GenericValue::Float(vec![1.0, 0.0, 0.0, 1.0]))
        );
        program.delete(&mut device);
    }

    #[test]
    fn misfit_value_is_reported_once() {
        let mut program = program();
        program
            .set_attribute("a_position", InputValue::dense(&[0.0f32; 6], 2).unwrap())
            .unwrap();
        program.set_uniform("u_color", [0.0f32, 1.0, 0.0, 1.0]).unwrap();
        let mut device = HeadlessDevice::new();
        assert!(matches!(
            program.activate(&mut device),
            Err(Error::BindingArity {
                expected: 3,
                got: 2,
                ..
            })
        ));
        let handle = program.handle().unwrap();
        //names after the misfit were still applied
        assert_eq!(
            device.uniform_value(handle, "u_color"),
            Some(GenericValue::Float(vec![0.0, 1.0, 0.0, 1.0]))
        );

        for _ in 0..2 {
            let mut active = program.activate(&mut device).unwrap();
            active.draw(Primitive::Triangles, None).unwrap();
        }
        assert_eq!(
            device.attribute_state(handle, "a_position"),
            AttributeState::Disabled
        );
        assert_eq!(
            device.draws().last().unwrap().command,
            DrawCommand::Arrays { first: 0, count: 0 }
        );

        program
            .set_attribute("a_position", InputValue::dense(&[0.0f32; 9], 3).unwrap())
            .unwrap();
        {
            let mut active = program.activate(&mut device).unwrap();
            active.draw(Primitive::Triangles, None).unwrap();
        }
        assert_eq!(
            device.draws().last().unwrap().command,
            DrawCommand::Arrays { first: 0, count: 3 }
        );
        program.delete(&mut device);
    }

    #[test]
    fn shared_stage_survives_one_program() {
        let vertex = ShaderStage::vertex(VERTEX);
        let mut first = Program::new(vertex.clone(), ShaderStage::fragment(FRAGMENT));
        let mut second = Program::new(vertex, ShaderStage::fragment(FRAGMENT));
        let mut device = HeadlessDevice::new();
        drop(first.activate(&mut device).unwrap());
        drop(second.activate(&mut device).unwrap());
        let shared = second.stages()[0].handle();
        let own = first.stages()[1].clone();

        first.delete(&mut device);
        assert!(shared.is_some());
        assert_eq!(second.stages()[0].handle(), shared);
        //the clone taken above keeps first's fragment stage alive too
        assert!(own.handle().is_some());
        drop(second.activate(&mut device).unwrap());
        assert_eq!(device.link_count(second.handle().unwrap()), 1);

        drop(first);
        second.delete(&mut device);
        assert_eq!(second.stages()[0].handle(), None);
        own.delete(&mut device);
    }

    #[test]
    fn role_mismatch() {
        let mut program = program();
        let mut device = HeadlessDevice::new();
        drop(program.activate(&mut device).unwrap());
        assert!(matches!(
            program.set_attribute("u_color", [0.0f32; 4]),
            Err(Error::InvalidBinding { .. })
        ));
        assert!(matches!(
            program.set_uniform("a_position", [0.0f32; 3]),
            Err(Error::InvalidBinding { .. })
        ));
        program.delete(&mut device);
    }

    #[test]
    fn relinks_after_source_change() {
        let mut program = program();
        let mut device = HeadlessDevice::new();
        drop(program.activate(&mut device).unwrap());
        let handle = program.handle().unwrap();
        assert_eq!(device.link_count(handle), 1);
        drop(program.activate(&mut device).unwrap());
        assert_eq!(device.link_count(handle), 1);

        program.stages()[1].set_source(
            "uniform vec4 u_color; uniform float u_alpha;
             void main() { gl_FragColor = u_color * u_alpha; }",
        );
        assert!(!program.is_linked());
        drop(program.activate(&mut device).unwrap());
        assert_eq!(device.link_count(handle), 2);
        assert!(program.active_inputs().any(|i| i.name == "u_alpha"));
        program.delete(&mut device);
    }

    #[test]
    fn detach_takes_effect_on_activation() {
        let mut program = program();
        let extra = ShaderStage::fragment("void main() { gl_FragColor = vec4(0.0); }");
        let mut device = HeadlessDevice::new();
        drop(program.activate(&mut device).unwrap());
        let fragment = program.stages()[1].clone();
        program.detach(&fragment);
        program.attach(extra.clone());
        drop(program.activate(&mut device).unwrap());
        assert!(!program.active_inputs().any(|i| i.name == "u_color"));
        program.delete(&mut device);
        fragment.delete(&mut device);
    }
}
