// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Deferred-creation lifecycle for device objects.
//!
//! Every buffer, texture, shader stage and program starts as a descriptor with no device
//! object.  The lifecycle tracked here decides, at each activation, whether the object must be
//! created, updated, or merely bound.
//!
//! # States
//!
//! - `Uncreated`: no device object exists.  Construction leaves objects here.
//! - `Created`: the device object exists but queued data has not been flushed.
//! - `Valid`: the device object exists and reflects every queued change.
//! - `Error`: creation or update failed.  Activation is a no-op until the object is mutated.
//! - `Deleted`: the device object was destroyed.  Activation creates a new one.
//!
//! # Failure containment
//!
//! Creation and update failures are returned from the activation that hit them and logged with
//! `logwise::error_sync!`.  The object is then pinned in `Error`, so later activations (typically
//! once per frame) skip the failing work.  Mutating the object clears the pin.
//!
//! Teardown never fails: errors from the device while deleting are logged and swallowed, since
//! the context may already be gone.

use crate::Error;
use crate::images::device::Device;
use logwise::privacy::LogIt;
use std::fmt::{Display, Formatter};
use std::num::NonZeroU32;

/// A device object handle.  Handles are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(NonZeroU32);

impl RawHandle {
    /// Wraps a raw handle; zero means "no object" and yields `None`.
    pub const fn new(raw: u32) -> Option<RawHandle> {
        match NonZeroU32::new(raw) {
            Some(h) => Some(RawHandle(h)),
            None => None,
        }
    }
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

/// What kind of device object a lifecycle tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Texture,
    Shader,
    Program,
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Buffer => write!(f, "buffer"),
            ObjectKind::Texture => write!(f, "texture"),
            ObjectKind::Shader => write!(f, "shader"),
            ObjectKind::Program => write!(f, "program"),
        }
    }
}

/// Where an object is in its lifecycle.  See the module documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectState {
    Uncreated,
    Created,
    Valid,
    Error,
    Deleted,
}

/// Handle, state and dirty flag of one device object.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    kind: ObjectKind,
    debug_name: String,
    handle: Option<RawHandle>,
    state: ObjectState,
    dirty: bool,
}

impl Lifecycle {
    pub(crate) fn new(kind: ObjectKind, debug_name: impl Into<String>) -> Self {
        Lifecycle {
            kind,
            debug_name: debug_name.into(),
            handle: None,
            state: ObjectState::Uncreated,
            dirty: true,
        }
    }

    pub(crate) fn handle(&self) -> Option<RawHandle> {
        self.handle
    }
    pub(crate) fn state(&self) -> ObjectState {
        self.state
    }
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }
    pub(crate) fn debug_name(&self) -> &str {
        &self.debug_name
    }
    pub(crate) fn set_debug_name(&mut self, name: &str) {
        self.debug_name = name.to_string();
    }

    /// Records a mutation.  Clears an error pin so the next activation retries.
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        if self.state == ObjectState::Error {
            self.state = if self.handle.is_some() {
                ObjectState::Created
            } else {
                ObjectState::Uncreated
            };
        }
    }
}

/// The per-kind hooks driven by [`activate`], [`deactivate`] and [`delete`].
pub(crate) trait Tracked {
    fn lifecycle(&self) -> &Lifecycle;
    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    fn create(&mut self, device: &mut dyn Device) -> Result<RawHandle, Error>;
    /// Flushes queued changes into the existing device object.
    fn update(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error>;
    fn bind(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error>;
    fn unbind(&mut self, device: &mut dyn Device, handle: RawHandle);
    fn destroy(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error>;

    /// Called once the device object is gone, so the next creation starts from scratch.
    fn forget_device_state(&mut self) {}

    fn needs_update(&self) -> bool {
        self.lifecycle().is_dirty()
    }
}

fn pin_error<T: Tracked + ?Sized>(object: &mut T, phase: &'static str, err: &Error) {
    let lifecycle = object.lifecycle_mut();
    logwise::error_sync!(
        "{phase} of {kind} {name} failed: {err}",
        phase = phase,
        kind = LogIt(&lifecycle.kind),
        name = LogIt(&lifecycle.debug_name),
        err = LogIt(err)
    );
    lifecycle.state = ObjectState::Error;
}

/// Creates and updates the object as needed, without binding it.
///
/// Returns `None` when the object is pinned in the error state.
pub(crate) fn materialize<T: Tracked + ?Sized>(
    object: &mut T,
    device: &mut dyn Device,
) -> Result<Option<RawHandle>, Error> {
    if !device.is_current() {
        return Err(Error::Context);
    }
    if object.lifecycle().state == ObjectState::Error {
        return Ok(None);
    }
    let handle = match object.lifecycle().handle {
        Some(handle) => handle,
        None => match object.create(device) {
            Ok(handle) => {
                let lifecycle = object.lifecycle_mut();
                lifecycle.handle = Some(handle);
                lifecycle.state = ObjectState::Created;
                lifecycle.dirty = true;
                logwise::trace_sync!(
                    "created {kind} {name}",
                    kind = LogIt(&lifecycle.kind),
                    name = LogIt(&lifecycle.debug_name)
                );
                handle
            }
            Err(err) => {
                pin_error(object, "creation", &err);
                return Err(err);
            }
        },
    };
    if object.needs_update() {
        if let Err(err) = object.update(device, handle) {
            pin_error(object, "update", &err);
            return Err(err);
        }
        let lifecycle = object.lifecycle_mut();
        lifecycle.dirty = false;
        lifecycle.state = ObjectState::Valid;
    }
    Ok(Some(handle))
}

/// Materializes, then binds.  A no-op for objects pinned in the error state.
pub(crate) fn activate<T: Tracked + ?Sized>(
    object: &mut T,
    device: &mut dyn Device,
) -> Result<(), Error> {
    match materialize(object, device)? {
        Some(handle) => object.bind(device, handle),
        None => Ok(()),
    }
}

pub(crate) fn deactivate<T: Tracked + ?Sized>(object: &mut T, device: &mut dyn Device) {
    let lifecycle = object.lifecycle();
    if lifecycle.state == ObjectState::Error {
        return;
    }
    if let Some(handle) = lifecycle.handle {
        object.unbind(device, handle);
    }
}

/// Destroys the device object if there is one.  Idempotent; never fails.
pub(crate) fn delete<T: Tracked + ?Sized>(object: &mut T, device: &mut dyn Device) {
    if let Some(handle) = object.lifecycle().handle {
        if !device.is_current() {
            let lifecycle = object.lifecycle();
            logwise::warn_sync!(
                "deleting {kind} {name} without a current context; the device object is abandoned",
                kind = LogIt(&lifecycle.kind),
                name = LogIt(&lifecycle.debug_name)
            );
        } else if let Err(err) = object.destroy(device, handle) {
            let lifecycle = object.lifecycle();
            logwise::warn_sync!(
                "ignoring error while deleting {kind} {name}: {err}",
                kind = LogIt(&lifecycle.kind),
                name = LogIt(&lifecycle.debug_name),
                err = LogIt(&err)
            );
        }
        let lifecycle = object.lifecycle_mut();
        lifecycle.handle = None;
        lifecycle.state = ObjectState::Deleted;
        lifecycle.dirty = true;
        object.forget_device_state();
    }
}

/// Releases a binding when dropped, so scoped use unbinds on every exit path.
pub(crate) struct BindGuard<'d, F: FnMut(&mut dyn Device)> {
    device: &'d mut dyn Device,
    release: F,
}

impl<'d, F: FnMut(&mut dyn Device)> BindGuard<'d, F> {
    pub(crate) fn new(device: &'d mut dyn Device, release: F) -> Self {
        BindGuard { device, release }
    }
    pub(crate) fn device(&mut self) -> &mut dyn Device {
        &mut *self.device
    }
}

impl<F: FnMut(&mut dyn Device)> Drop for BindGuard<'_, F> {
    fn drop(&mut self) {
        (self.release)(&mut *self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessDevice;
    use crate::images::device::DeviceError;

    /// Counts hook calls; optionally fails updates.
    struct Probe {
        lifecycle: Lifecycle,
        fail_update: bool,
        creates: usize,
        updates: usize,
        binds: usize,
        unbinds: usize,
    }

    impl Probe {
        fn new(fail_update: bool) -> Self {
            Probe {
                lifecycle: Lifecycle::new(ObjectKind::Buffer, "probe"),
                fail_update,
                creates: 0,
                updates: 0,
                binds: 0,
                unbinds: 0,
            }
        }
    }

    impl Tracked for Probe {
        fn lifecycle(&self) -> &Lifecycle {
            &self.lifecycle
        }
        fn lifecycle_mut(&mut self) -> &mut Lifecycle {
            &mut self.lifecycle
        }
        fn create(&mut self, device: &mut dyn Device) -> Result<RawHandle, Error> {
            self.creates += 1;
            Ok(device.create_buffer()?)
        }
        fn update(&mut self, _device: &mut dyn Device, _handle: RawHandle) -> Result<(), Error> {
            self.updates += 1;
            if self.fail_update {
                Err(DeviceError::OutOfMemory.into())
            } else {
                Ok(())
            }
        }
        fn bind(&mut self, _device: &mut dyn Device, _handle: RawHandle) -> Result<(), Error> {
            self.binds += 1;
            Ok(())
        }
        fn unbind(&mut self, _device: &mut dyn Device, _handle: RawHandle) {
            self.unbinds += 1;
        }
        fn destroy(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
            Ok(device.delete_buffer(handle)?)
        }
    }

    #[test]
    fn create_update_bind_once() {
        let mut device = HeadlessDevice::new();
        let mut probe = Probe::new(false);
        assert_eq!(probe.lifecycle.state(), ObjectState::Uncreated);
        activate(&mut probe, &mut device).unwrap();
        activate(&mut probe, &mut device).unwrap();
        assert_eq!(probe.creates, 1);
        assert_eq!(probe.updates, 1);
        assert_eq!(probe.binds, 2);
        assert_eq!(probe.lifecycle.state(), ObjectState::Valid);
        deactivate(&mut probe, &mut device);
        assert_eq!(probe.unbinds, 1);
    }

    #[test]
    fn update_failure_pins_error() {
        let mut device = HeadlessDevice::new();
        let mut probe = Probe::new(true);
        assert!(activate(&mut probe, &mut device).is_err());
        assert_eq!(probe.lifecycle.state(), ObjectState::Error);
        //pinned: no retry, no bind
        activate(&mut probe, &mut device).unwrap();
        assert_eq!(probe.updates, 1);
        assert_eq!(probe.binds, 0);
        //mutation clears the pin
        probe.fail_update = false;
        probe.lifecycle.mark_dirty();
        activate(&mut probe, &mut device).unwrap();
        assert_eq!(probe.updates, 2);
        assert_eq!(probe.creates, 1);
        assert_eq!(probe.lifecycle.state(), ObjectState::Valid);
    }

    #[test]
    fn delete_is_idempotent_and_recreates() {
        let mut device = HeadlessDevice::new();
        let mut probe = Probe::new(false);
        delete(&mut probe, &mut device);
        assert_eq!(probe.lifecycle.state(), ObjectState::Uncreated);
        activate(&mut probe, &mut device).unwrap();
        delete(&mut probe, &mut device);
        delete(&mut probe, &mut device);
        assert_eq!(probe.lifecycle.state(), ObjectState::Deleted);
        assert_eq!(probe.lifecycle.handle(), None);
        activate(&mut probe, &mut device).unwrap();
        assert_eq!(probe.creates, 2);
        assert!(probe.lifecycle.handle().is_some());
    }

    #[test]
    fn no_context() {
        let mut device = HeadlessDevice::new();
        let mut probe = Probe::new(false);
        activate(&mut probe, &mut device).unwrap();
        device.lose_context();
        assert!(matches!(
            activate(&mut probe, &mut device),
            Err(Error::Context)
        ));
        //tolerated
        delete(&mut probe, &mut device);
        assert_eq!(probe.lifecycle.handle(), None);
    }

    #[test]
    fn guard_releases() {
        let mut device = HeadlessDevice::new();
        let mut released = 0;
        {
            let mut guard = BindGuard::new(&mut device, |_d| released += 1);
            assert!(guard.device().is_current());
        }
        assert_eq!(released, 1);
    }
}
