// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Byte-addressable device buffers.

A [`Buffer`] is a CPU-side descriptor with a capacity and a queue of pending writes.  Nothing
is allocated until the buffer is activated against a [`Device`]; at that point the device
storage is (re)allocated if the capacity changed and the queued writes are replayed in the
order they were made.

```
use buffers_and_bindings::HeadlessDevice;
use buffers_and_bindings::bindings::buffer::Buffer;

let mut buffer = Buffer::with_capacity(8);
buffer.set_subdata(4, &[1u8, 2, 3, 4]).unwrap();
//sub-writes never grow a buffer
assert!(buffer.set_subdata(6, &[0u8; 4]).is_err());

let mut device = HeadlessDevice::new();
buffer.activate(&mut device).unwrap();
let bytes = device.buffer_contents(buffer.handle().unwrap()).unwrap();
assert_eq!(bytes, &[0, 0, 0, 0, 1, 2, 3, 4]);
```
*/

use crate::Error;
use crate::bindings::dirty_tracking::PendingQueue;
use crate::bindings::resource_tracking::{
    self, BindGuard, Lifecycle, ObjectKind, ObjectState, RawHandle, Tracked,
};
use crate::bindings::visible_to::BufferUsage;
use crate::images::device::{BufferTarget, Device};
use crate::pixel_formats::{Element, element_bytes};
use logwise::privacy::LogIt;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

#[derive(Debug)]
pub(crate) enum BufferWrite {
    /// Replaces the whole contents.  Always exactly `capacity` bytes.
    Full(Vec<u8>),
    Partial { offset: usize, data: Vec<u8> },
}

#[derive(Debug)]
pub(crate) struct BufferState {
    lifecycle: Lifecycle,
    target: BufferTarget,
    usage: BufferUsage,
    capacity: usize,
    /// Size of the current device allocation, if any.
    allocated: Option<usize>,
    pending: PendingQueue<BufferWrite>,
    /// Bumped whenever the capacity changes; views created under an older generation are stale.
    generation: u64,
}

impl BufferState {
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
    pub(crate) fn handle(&self) -> Option<RawHandle> {
        self.lifecycle.handle()
    }

    fn resize_to(&mut self, capacity: usize) {
        if capacity != self.capacity {
            self.capacity = capacity;
            self.generation += 1;
        }
    }

    pub(crate) fn set_data(&mut self, data: Vec<u8>) {
        self.resize_to(data.len());
        self.pending.replace(BufferWrite::Full(data));
        self.lifecycle.mark_dirty();
    }

    pub(crate) fn set_subdata(&mut self, offset: usize, data: &[u8]) -> Result<(), Error> {
        let end = offset.checked_add(data.len());
        match end {
            Some(end) if end <= self.capacity => {}
            _ => {
                return Err(Error::Capacity {
                    offset,
                    len: data.len(),
                    capacity: self.capacity,
                });
            }
        }
        if data.is_empty() {
            return Ok(());
        }
        self.pending.push(BufferWrite::Partial {
            offset,
            data: data.to_vec(),
        });
        self.lifecycle.mark_dirty();
        Ok(())
    }
}

impl Tracked for BufferState {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn create(&mut self, device: &mut dyn Device) -> Result<RawHandle, Error> {
        Ok(device.create_buffer()?)
    }

    fn update(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        if self.allocated != Some(self.capacity) {
            //destructive; the queue below restores whatever contents are known
            device.allocate_buffer(handle, self.capacity, self.usage)?;
            self.allocated = Some(self.capacity);
            logwise::trace_sync!(
                "allocated {capacity} bytes for buffer {name}",
                capacity = self.capacity,
                name = LogIt(&self.lifecycle.debug_name())
            );
        }
        let mut entries: Vec<BufferWrite> = self.pending.drain().collect();
        for i in 0..entries.len() {
            let result = match &entries[i] {
                BufferWrite::Full(data) => device.write_buffer(handle, 0, data),
                BufferWrite::Partial { offset, data } => device.write_buffer(handle, *offset, data),
            };
            if let Err(err) = result {
                //keep what was not applied so a retry replays it
                self.pending.requeue_front(entries.split_off(i));
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn bind(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        device.bind_buffer(self.target, Some(handle));
        Ok(())
    }

    fn unbind(&mut self, device: &mut dyn Device, _handle: RawHandle) {
        device.bind_buffer(self.target, None);
    }

    fn destroy(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        Ok(device.delete_buffer(handle)?)
    }

    fn forget_device_state(&mut self) {
        self.allocated = None;
    }
}

impl Drop for BufferState {
    fn drop(&mut self) {
        if self.lifecycle.handle().is_some() {
            logwise::warn_sync!(
                "buffer {name} dropped while its device object is alive; call delete() first",
                name = LogIt(&self.lifecycle.debug_name())
            );
        }
    }
}

/**
A device buffer.

The buffer owns its device allocation.  Views ([`crate::bindings::vertex_buffer::VertexBufferView`])
refer back to it without owning it; see [`Buffer::delete`] for what happens to them.
*/
#[derive(Debug)]
pub struct Buffer {
    shared: Rc<RefCell<BufferState>>,
}

impl Buffer {
    fn with_state(target: BufferTarget, capacity: usize, pending: PendingQueue<BufferWrite>) -> Self {
        Buffer {
            shared: Rc::new(RefCell::new(BufferState {
                lifecycle: Lifecycle::new(ObjectKind::Buffer, "buffer"),
                target,
                usage: BufferUsage::default(),
                capacity,
                allocated: None,
                pending,
                generation: 0,
            })),
        }
    }

    pub(crate) fn with_target(target: BufferTarget, data: Vec<u8>) -> Self {
        let capacity = data.len();
        let mut pending = PendingQueue::new();
        pending.push(BufferWrite::Full(data));
        Self::with_state(target, capacity, pending)
    }

    /// A buffer of `capacity` zeroed bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_state(BufferTarget::Array, capacity, PendingQueue::new())
    }

    /// A buffer holding a copy of `data`.
    pub fn from_slice<T: Element>(data: &[T]) -> Self {
        Self::from_bytes(element_bytes(data).to_vec())
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::with_target(BufferTarget::Array, data)
    }

    pub fn with_usage(self, usage: BufferUsage) -> Self {
        self.shared.borrow_mut().usage = usage;
        self
    }

    /// Names the buffer in log output.
    pub fn with_debug_name(self, name: &str) -> Self {
        self.shared.borrow_mut().lifecycle.set_debug_name(name);
        self
    }

    pub fn capacity(&self) -> usize {
        self.shared.borrow().capacity
    }
    pub fn usage(&self) -> BufferUsage {
        self.shared.borrow().usage
    }
    pub fn handle(&self) -> Option<RawHandle> {
        self.shared.borrow().lifecycle.handle()
    }
    pub fn state(&self) -> ObjectState {
        self.shared.borrow().lifecycle.state()
    }
    /// Number of writes waiting for the next activation.
    pub fn pending_writes(&self) -> usize {
        self.shared.borrow().pending.len()
    }

    /// Replaces the contents with `data`.
    ///
    /// Discards every queued write.  If the byte length differs from the current capacity the
    /// buffer is resized, which reallocates on the device and invalidates existing views.
    pub fn set_data<T: Element>(&mut self, data: &[T]) {
        self.set_bytes(element_bytes(data).to_vec());
    }

    pub fn set_bytes(&mut self, data: Vec<u8>) {
        self.shared.borrow_mut().set_data(data);
    }

    /// Queues a write of `data` at byte `offset`.
    ///
    /// Fails with [`Error::Capacity`] if the write would extend past the capacity; sub-writes
    /// never grow a buffer.
    pub fn set_subdata<T: Element>(&mut self, offset: usize, data: &[T]) -> Result<(), Error> {
        self.shared.borrow_mut().set_subdata(offset, element_bytes(data))
    }

    /// Changes the capacity without providing contents.
    ///
    /// Queued writes are dropped, the device storage is reallocated at the next activation,
    /// and existing views become invalid.
    pub fn resize(&mut self, capacity: usize) {
        let mut state = self.shared.borrow_mut();
        let _ = state.pending.drain().count();
        state.resize_to(capacity);
        state.lifecycle.mark_dirty();
    }

    /// Creates the device object and flushes queued writes, without binding.
    pub fn materialize(&self, device: &mut dyn Device) -> Result<(), Error> {
        resource_tracking::materialize(&mut *self.shared.borrow_mut(), device).map(|_| ())
    }

    pub fn activate(&self, device: &mut dyn Device) -> Result<(), Error> {
        resource_tracking::activate(&mut *self.shared.borrow_mut(), device)
    }

    pub fn deactivate(&self, device: &mut dyn Device) {
        resource_tracking::deactivate(&mut *self.shared.borrow_mut(), device)
    }

    /// Runs `f` with the buffer bound, unbinding afterwards even if `f` panics.
    pub fn with_active<R>(
        &self,
        device: &mut dyn Device,
        f: impl FnOnce(&mut dyn Device) -> R,
    ) -> Result<R, Error> {
        self.activate(device)?;
        let mut guard = BindGuard::new(device, |d: &mut dyn Device| self.deactivate(d));
        Ok(f(guard.device()))
    }

    /**
    Frees the device allocation.

    Views of this buffer stay usable: activating one re-creates the allocation.  Dropping
    the `Buffer` itself is different; views of a dropped buffer fail with
    [`Error::DanglingView`].
    */
    pub fn delete(&mut self, device: &mut dyn Device) {
        resource_tracking::delete(&mut *self.shared.borrow_mut(), device)
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<BufferState>> {
        Rc::downgrade(&self.shared)
    }

    pub(crate) fn state_ref(&self) -> Ref<'_, BufferState> {
        self.shared.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, BufferState> {
        self.shared.borrow_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessDevice;

    #[test]
    fn round_trip() {
        let buffer = Buffer::from_slice(&[1.5f32, -2.0, 8.0]);
        let mut device = HeadlessDevice::new();
        buffer.activate(&mut device).unwrap();
        let bytes = device.buffer_contents(buffer.handle().unwrap()).unwrap();
        assert_eq!(bytes, element_bytes(&[1.5f32, -2.0, 8.0]));
        assert_eq!(buffer.state(), ObjectState::Valid);
    }

    #[test]
    fn zero_capacity_subdata() {
        let mut buffer = Buffer::with_capacity(0);
        let err = buffer.set_subdata(0, &[0u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            Error::Capacity {
                offset: 0,
                len: 4,
                capacity: 0
            }
        ));
    }

    #[test]
    fn set_data_supersedes_subdata() {
        let mut buffer = Buffer::with_capacity(4);
        buffer.set_subdata(0, &[9u8]).unwrap();
        buffer.set_subdata(1, &[9u8]).unwrap();
        buffer.set_data(&[1u8, 2, 3, 4]);
        assert_eq!(buffer.pending_writes(), 1);
        buffer.set_subdata(2, &[7u8]).unwrap();
        let mut device = HeadlessDevice::new();
        buffer.activate(&mut device).unwrap();
        let bytes = device.buffer_contents(buffer.handle().unwrap()).unwrap();
        assert_eq!(bytes, &[1, 2, 7, 4]);
    }

    #[test]
    fn resize_reallocates() {
        let mut buffer = Buffer::from_slice(&[1u8, 2]);
        let mut device = HeadlessDevice::new();
        buffer.activate(&mut device).unwrap();
        let first = buffer.handle().unwrap();
        buffer.set_data(&[5u8, 6, 7]);
        buffer.activate(&mut device).unwrap();
        assert_eq!(buffer.handle(), Some(first));
        assert_eq!(device.buffer_contents(first).unwrap(), &[5, 6, 7]);
        assert_eq!(device.buffer_allocations(first), 2);
    }

    #[test]
    fn with_active_unbinds() {
        let buffer = Buffer::from_slice(&[1u8]);
        let mut device = HeadlessDevice::new();
        let bound = buffer
            .with_active(&mut device, |d| {
                d.limits().max_texture_size
            })
            .unwrap();
        assert_eq!(bound, 4096);
        assert_eq!(device.bound_buffer(BufferTarget::Array), None);
    }

    #[test]
    fn delete_then_recreate() {
        let mut buffer = Buffer::from_slice(&[1u8, 2]);
        let mut device = HeadlessDevice::new();
        buffer.activate(&mut device).unwrap();
        buffer.delete(&mut device);
        buffer.delete(&mut device);
        assert_eq!(buffer.state(), ObjectState::Deleted);
        buffer.set_subdata(1, &[3u8]).unwrap();
        buffer.activate(&mut device).unwrap();
        let bytes = device.buffer_contents(buffer.handle().unwrap()).unwrap();
        //recreated storage is zeroed, then the queue is replayed
        assert_eq!(bytes, &[0, 3]);
        buffer.delete(&mut device);
    }
}
