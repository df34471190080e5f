// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shader stages.

A [`ShaderStage`] is GLSL source of one kind (vertex or fragment).  It is compiled the first
time a program that uses it is activated, and at most once per source assignment: a stage
that failed to compile stays failed until [`ShaderStage::set_source`] gives it new source.

```
use buffers_and_bindings::HeadlessDevice;
use buffers_and_bindings::images::shader::{CompileStatus, ShaderStage};

let stage = ShaderStage::fragment("void main() { gl_FragColor = vec4(1.0); }");
assert_eq!(stage.status(), CompileStatus::NotAttempted);
let mut device = HeadlessDevice::new();
stage.compile(&mut device).unwrap();
assert_eq!(stage.status(), CompileStatus::Succeeded);
```
*/

use crate::Error;
use crate::bindings::resource_tracking::{
    self, Lifecycle, ObjectKind, ObjectState, RawHandle, Tracked,
};
use crate::images::device::Device;
use crate::images::diagnostics::{self, Diagnostic};
use logwise::privacy::LogIt;
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Which pipeline stage a shader runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl Display for StageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Vertex => write!(f, "vertex"),
            StageKind::Fragment => write!(f, "fragment"),
        }
    }
}

/// Outcome of the most recent compile of the current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileStatus {
    NotAttempted,
    /// Compiled and failed.
    Attempted,
    Succeeded,
}

#[derive(Debug)]
struct StageState {
    lifecycle: Lifecycle,
    kind: StageKind,
    source: String,
    status: CompileStatus,
    diagnostics: Vec<Diagnostic>,
    /// Bumped on every source assignment.
    generation: u64,
}

impl Tracked for StageState {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn create(&mut self, device: &mut dyn Device) -> Result<RawHandle, Error> {
        Ok(device.create_shader(self.kind)?)
    }

    fn update(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        self.status = CompileStatus::Attempted;
        let log = device.compile_shader(handle, &self.source)?;
        self.diagnostics = diagnostics::parse(&log.log, &self.source);
        if !log.success {
            return Err(Error::Compile {
                stage: self.kind,
                diagnostics: self.diagnostics.clone(),
            });
        }
        self.status = CompileStatus::Succeeded;
        logwise::trace_sync!(
            "compiled {kind} shader {name}",
            kind = LogIt(&self.kind),
            name = LogIt(&self.lifecycle.debug_name())
        );
        for diagnostic in &self.diagnostics {
            logwise::warn_sync!(
                "{kind} shader {name}: {diagnostic}",
                kind = LogIt(&self.kind),
                name = LogIt(&self.lifecycle.debug_name()),
                diagnostic = LogIt(diagnostic)
            );
        }
        Ok(())
    }

    fn bind(&mut self, _device: &mut dyn Device, _handle: RawHandle) -> Result<(), Error> {
        Ok(())
    }
    fn unbind(&mut self, _device: &mut dyn Device, _handle: RawHandle) {}

    fn destroy(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        Ok(device.delete_shader(handle)?)
    }

    fn forget_device_state(&mut self) {
        self.status = CompileStatus::NotAttempted;
    }
}

impl Drop for StageState {
    fn drop(&mut self) {
        if self.lifecycle.handle().is_some() {
            logwise::warn_sync!(
                "{kind} shader {name} dropped while its device object is alive; call delete() first",
                kind = LogIt(&self.kind),
                name = LogIt(&self.lifecycle.debug_name())
            );
        }
    }
}

/// One shader stage.  Clones share the same stage, so a stage may be attached to several programs.
#[derive(Debug, Clone)]
pub struct ShaderStage {
    shared: Rc<RefCell<StageState>>,
}

impl ShaderStage {
    pub fn new(kind: StageKind, source: &str) -> Self {
        ShaderStage {
            shared: Rc::new(RefCell::new(StageState {
                lifecycle: Lifecycle::new(ObjectKind::Shader, format!("{kind} shader")),
                kind,
                source: source.to_string(),
                status: CompileStatus::NotAttempted,
                diagnostics: Vec::new(),
                generation: 0,
            })),
        }
    }

    pub fn vertex(source: &str) -> Self {
        Self::new(StageKind::Vertex, source)
    }

    pub fn fragment(source: &str) -> Self {
        Self::new(StageKind::Fragment, source)
    }

    pub fn with_debug_name(self, name: &str) -> Self {
        self.shared.borrow_mut().lifecycle.set_debug_name(name);
        self
    }

    pub fn kind(&self) -> StageKind {
        self.shared.borrow().kind
    }
    pub fn source(&self) -> String {
        self.shared.borrow().source.clone()
    }
    pub fn status(&self) -> CompileStatus {
        self.shared.borrow().status
    }
    /// Messages from the most recent compile, warnings included.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.shared.borrow().diagnostics.clone()
    }
    pub fn handle(&self) -> Option<RawHandle> {
        self.shared.borrow().lifecycle.handle()
    }
    pub fn state(&self) -> ObjectState {
        self.shared.borrow().lifecycle.state()
    }

    /// Replaces the source.  The next activation recompiles, even after a failure.
    pub fn set_source(&self, source: &str) {
        let mut state = self.shared.borrow_mut();
        state.source = source.to_string();
        state.status = CompileStatus::NotAttempted;
        state.diagnostics.clear();
        state.generation += 1;
        state.lifecycle.mark_dirty();
    }

    /// Creates and compiles the stage if that has not happened for the current source.
    ///
    /// A stage whose current source already failed returns `Ok` without compiling again;
    /// check [`Self::status`].
    pub fn compile(&self, device: &mut dyn Device) -> Result<(), Error> {
        resource_tracking::materialize(&mut *self.shared.borrow_mut(), device).map(|_| ())
    }

    pub fn delete(&self, device: &mut dyn Device) {
        resource_tracking::delete(&mut *self.shared.borrow_mut(), device)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.shared.borrow().generation
    }

    /// Number of live handles to this stage, clones included.
    pub(crate) fn holders(&self) -> usize {
        Rc::strong_count(&self.shared)
    }

    pub(crate) fn same_stage(&self, other: &ShaderStage) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}
