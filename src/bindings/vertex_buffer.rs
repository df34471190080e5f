// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Vertex buffers and views into them.

A [`VertexBuffer`] is a [`Buffer`] plus a [`VertexLayout`].  Its fields are exposed as
[`VertexBufferView`]s, lightweight descriptors of `(offset, stride, type, arity, count)` that
alias the buffer's storage.  The buffer is the only owner of device memory; views hold a weak
back-reference and forward every lifecycle call to it.

```
use buffers_and_bindings::bindings::vertex_buffer::VertexBuffer;
use buffers_and_bindings::images::vertex_layout::{VertexLayout, VertexFieldType};

let mut layout = VertexLayout::new();
layout.add_field("a_position", VertexFieldType::F32, 2).unwrap();
layout.add_field("a_size", VertexFieldType::F32, 1).unwrap();
let records = [[0.0f32, 0.0, 4.0], [1.0, 1.0, 8.0], [2.0, 0.0, 2.0]];
let vb = VertexBuffer::from_records(layout, &records).unwrap();

let sizes = vb.field("a_size").unwrap();
assert_eq!((sizes.offset(), sizes.stride(), sizes.count()), (8, 12, 3));

//rows compose multiplicatively, fields additively
let tail = sizes.rows(1..3).unwrap();
assert_eq!((tail.offset(), tail.count()), (20, 2));
```
*/

use crate::Error;
use crate::bindings::buffer::{Buffer, BufferState};
use crate::bindings::resource_tracking::{self, ObjectState, RawHandle};
use crate::images::device::{AttributePointer, Device};
use crate::images::vertex_layout::{VertexElement, VertexFieldType, VertexLayout};
use crate::pixel_formats::{Element, ElementType, element_bytes};
use std::cell::RefCell;
use std::ops::Range;
use std::rc::{Rc, Weak};

/// A buffer of vertex records.
#[derive(Debug)]
pub struct VertexBuffer {
    buffer: Buffer,
    layout: VertexLayout,
}

fn check_records(layout: &VertexLayout, len: usize) -> Result<(), Error> {
    let stride = layout.element_stride();
    if stride == 0 || len % stride != 0 {
        return Err(Error::ByteLength {
            expected: if stride == 0 { 0 } else { len / stride * stride },
            got: len,
        });
    }
    Ok(())
}

impl VertexBuffer {
    /// An empty vertex buffer with the given layout.
    pub fn new(layout: VertexLayout) -> Self {
        VertexBuffer {
            buffer: Buffer::with_capacity(0),
            layout,
        }
    }

    /// A homogeneous buffer: every `arity` consecutive values form one vertex.
    pub fn from_slice<T: VertexElement>(data: &[T], arity: usize) -> Result<Self, Error> {
        let layout = VertexLayout::homogeneous(T::FIELD, arity)?;
        Self::from_bytes(layout, element_bytes(data).to_vec())
    }

    /// An interleaved buffer from `#[repr(C)]` records whose size matches the layout stride.
    pub fn from_records<R: bytemuck::Pod>(layout: VertexLayout, records: &[R]) -> Result<Self, Error> {
        if std::mem::size_of::<R>() != layout.element_stride() {
            return Err(Error::ByteLength {
                expected: layout.element_stride(),
                got: std::mem::size_of::<R>(),
            });
        }
        Self::from_bytes(layout, bytemuck::cast_slice(records).to_vec())
    }

    /// An interleaved buffer from raw bytes; the length must be a whole number of records.
    pub fn from_bytes(layout: VertexLayout, bytes: Vec<u8>) -> Result<Self, Error> {
        check_records(&layout, bytes.len())?;
        Ok(VertexBuffer {
            buffer: Buffer::from_bytes(bytes),
            layout,
        })
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// The underlying buffer, for sub-writes in bytes.
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Number of whole records.
    pub fn count(&self) -> usize {
        match self.layout.element_stride() {
            0 => 0,
            stride => self.buffer.capacity() / stride,
        }
    }

    /// Replaces every record.  Changing the record count resizes, which invalidates views.
    pub fn set_data<T: Element>(&mut self, data: &[T]) -> Result<(), Error> {
        let bytes = element_bytes(data);
        check_records(&self.layout, bytes.len())?;
        self.buffer.set_bytes(bytes.to_vec());
        Ok(())
    }

    pub fn set_records<R: bytemuck::Pod>(&mut self, records: &[R]) -> Result<(), Error> {
        self.set_data::<u8>(bytemuck::cast_slice(records))
    }

    fn view_of(&self, field_type: VertexFieldType, arity: usize, offset: usize) -> VertexBufferView {
        let state = self.buffer.state_ref();
        VertexBufferView {
            base: self.buffer.downgrade(),
            generation: state.generation(),
            offset,
            stride: self.layout.element_stride(),
            field_type,
            arity,
            count: self.count(),
        }
    }

    /// A view of one named field.
    pub fn field(&self, name: &str) -> Result<VertexBufferView, Error> {
        let field = self
            .layout
            .field(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        Ok(self.view_of(field.field_type(), field.arity(), field.offset()))
    }

    /// A view of the whole element of a homogeneous buffer.
    pub fn view(&self) -> Result<VertexBufferView, Error> {
        match self.layout.fields() {
            [only] => Ok(self.view_of(only.field_type(), only.arity(), only.offset())),
            _ => Err(Error::UnknownField(String::new())),
        }
    }

    pub fn handle(&self) -> Option<RawHandle> {
        self.buffer.handle()
    }
    pub fn state(&self) -> ObjectState {
        self.buffer.state()
    }
    pub fn materialize(&self, device: &mut dyn Device) -> Result<(), Error> {
        self.buffer.materialize(device)
    }
    pub fn activate(&self, device: &mut dyn Device) -> Result<(), Error> {
        self.buffer.activate(device)
    }
    pub fn deactivate(&self, device: &mut dyn Device) {
        self.buffer.deactivate(device)
    }
    pub fn delete(&mut self, device: &mut dyn Device) {
        self.buffer.delete(device)
    }
}

/**
A non-owning view of rows of a vertex buffer.

The view's geometry is fixed when it is made.  If the base buffer is resized afterwards the view
is stale and every use fails with [`Error::InvalidatedView`]; if the base buffer is dropped, with
[`Error::DanglingView`].  Deleting the base's device object is fine: the next activation through
any view re-creates it.
*/
#[derive(Debug, Clone)]
pub struct VertexBufferView {
    base: Weak<RefCell<BufferState>>,
    generation: u64,
    offset: usize,
    stride: usize,
    field_type: VertexFieldType,
    arity: usize,
    count: usize,
}

impl VertexBufferView {
    pub fn offset(&self) -> usize {
        self.offset
    }
    pub fn stride(&self) -> usize {
        self.stride
    }
    pub fn field_type(&self) -> VertexFieldType {
        self.field_type
    }
    pub fn element_type(&self) -> ElementType {
        self.field_type.element_type()
    }
    pub fn arity(&self) -> usize {
        self.arity
    }
    /// Number of rows the view addresses.
    pub fn count(&self) -> usize {
        self.count
    }
    /// Size of one row of this view in bytes, excluding the rest of the record.
    pub fn element_size(&self) -> usize {
        self.field_type.size() * self.arity
    }

    /// Whether the base buffer still exists and has not been resized.
    pub fn is_valid(&self) -> bool {
        self.base().is_ok()
    }

    fn base(&self) -> Result<Rc<RefCell<BufferState>>, Error> {
        let base = self.base.upgrade().ok_or(Error::DanglingView)?;
        if base.borrow().generation() != self.generation {
            return Err(Error::InvalidatedView);
        }
        Ok(base)
    }

    /// A view of rows `range` of this view.
    pub fn rows(&self, range: Range<usize>) -> Result<VertexBufferView, Error> {
        if range.start > range.end || range.end > self.count {
            return Err(Error::Capacity {
                offset: range.start,
                len: range.end.saturating_sub(range.start),
                capacity: self.count,
            });
        }
        Ok(VertexBufferView {
            offset: self.offset + range.start * self.stride,
            count: range.end - range.start,
            ..self.clone()
        })
    }

    /// Every `step`th row of this view.  A step of zero is treated as one.
    pub fn step_by(&self, step: usize) -> VertexBufferView {
        let step = step.max(1);
        VertexBufferView {
            stride: self.stride * step,
            count: self.count.div_ceil(step),
            ..self.clone()
        }
    }

    /// Writes one element per row of the view.
    ///
    /// The payload must be exactly `count * element_size` bytes.
    pub fn set_data<T: Element>(&self, data: &[T]) -> Result<(), Error> {
        self.set_bytes(element_bytes(data))
    }

    pub fn set_bytes(&self, bytes: &[u8]) -> Result<(), Error> {
        let element_size = self.element_size();
        let expected = self.count * element_size;
        if bytes.len() != expected {
            return Err(Error::ByteLength {
                expected,
                got: bytes.len(),
            });
        }
        if self.count == 0 {
            return Ok(());
        }
        let base = self.base()?;
        let mut state = base.borrow_mut();
        let end = self.offset + (self.count - 1) * self.stride + element_size;
        if end > state.capacity() {
            return Err(Error::Capacity {
                offset: self.offset,
                len: end - self.offset,
                capacity: state.capacity(),
            });
        }
        if self.stride == element_size {
            state.set_subdata(self.offset, bytes)
        } else {
            for (row, chunk) in bytes.chunks_exact(element_size).enumerate() {
                state.set_subdata(self.offset + row * self.stride, chunk)?;
            }
            Ok(())
        }
    }

    pub fn buffer_handle(&self) -> Option<RawHandle> {
        self.base.upgrade().and_then(|b| b.borrow().handle())
    }

    pub(crate) fn pointer(&self) -> AttributePointer {
        AttributePointer {
            arity: self.arity,
            element: self.element_type(),
            stride: self.stride,
            offset: self.offset,
        }
    }

    pub fn materialize(&self, device: &mut dyn Device) -> Result<(), Error> {
        let base = self.base()?;
        resource_tracking::materialize(&mut *base.borrow_mut(), device).map(|_| ())
    }

    pub fn activate(&self, device: &mut dyn Device) -> Result<(), Error> {
        let base = self.base()?;
        resource_tracking::activate(&mut *base.borrow_mut(), device)
    }

    pub fn deactivate(&self, device: &mut dyn Device) {
        if let Some(base) = self.base.upgrade() {
            resource_tracking::deactivate(&mut *base.borrow_mut(), device)
        }
    }

    /// Deletes the base buffer's device object.
    pub fn delete(&self, device: &mut dyn Device) {
        if let Some(base) = self.base.upgrade() {
            resource_tracking::delete(&mut *base.borrow_mut(), device)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessDevice;

    fn interleaved() -> VertexBuffer {
        let mut layout = VertexLayout::new();
        layout.add_field("a_position", VertexFieldType::F32, 2).unwrap();
        layout.add_field("a_flag", VertexFieldType::U8, 1).unwrap();
        layout.add_field("a_weight", VertexFieldType::F32, 1).unwrap();
        let mut bytes = Vec::new();
        for i in 0..4u8 {
            bytes.extend_from_slice(element_bytes(&[i as f32, -(i as f32)]));
            bytes.push(i);
            bytes.extend_from_slice(element_bytes(&[0.5f32]));
        }
        VertexBuffer::from_bytes(layout, bytes).unwrap()
    }

    #[test]
    fn field_views_follow_layout() {
        let vb = interleaved();
        for field in vb.layout().fields() {
            let view = vb.field(field.name()).unwrap();
            assert_eq!(view.offset(), field.offset());
            assert_eq!(view.stride(), vb.layout().element_stride());
            assert_eq!(view.count(), 4);
        }
        assert!(matches!(vb.field("missing"), Err(Error::UnknownField(_))));
        assert!(vb.view().is_err());
    }

    #[test]
    fn rows_and_steps() {
        let vb = VertexBuffer::from_slice(&[0.0f32; 20], 2).unwrap();
        let view = vb.view().unwrap();
        assert_eq!(view.count(), 10);
        let middle = view.rows(2..6).unwrap();
        assert_eq!((middle.offset(), middle.stride(), middle.count()), (16, 8, 4));
        let stepped = middle.step_by(3);
        assert_eq!((stepped.offset(), stepped.stride(), stepped.count()), (16, 24, 2));
        let nested = stepped.rows(1..2).unwrap();
        assert_eq!(nested.offset(), 40);
        assert!(view.rows(5..11).is_err());
    }

    #[test]
    fn write_length_must_match() {
        let vb = interleaved();
        let weights = vb.field("a_weight").unwrap();
        for len in [0usize, 3, 5, 8] {
            let data = vec![1.0f32; len];
            assert!(matches!(
                weights.set_data(&data),
                Err(Error::ByteLength { expected: 16, .. })
            ));
        }
        assert_eq!(vb.buffer().pending_writes(), 1);
    }

    #[test]
    fn strided_write_lands_in_rows() {
        let vb = interleaved();
        let weights = vb.field("a_weight").unwrap();
        weights.set_data(&[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let mut device = HeadlessDevice::new();
        vb.activate(&mut device).unwrap();
        let bytes = device.buffer_contents(vb.handle().unwrap()).unwrap();
        let stride = vb.layout().element_stride();
        for row in 0..4 {
            let at = row * stride + 9;
            let value = f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
            assert_eq!(value, row as f32 + 1.0);
            //neighbouring field untouched
            assert_eq!(bytes[row * stride + 8], row as u8);
        }
    }

    #[test]
    fn resize_invalidates_and_drop_dangles() {
        let mut vb = VertexBuffer::from_slice(&[1.0f32, 2.0, 3.0], 1).unwrap();
        let view = vb.view().unwrap();
        vb.set_data(&[4.0f32, 5.0, 6.0]).unwrap();
        assert!(view.is_valid());
        vb.set_data(&[4.0f32]).unwrap();
        assert!(matches!(view.set_data(&[1.0f32, 2.0, 3.0]), Err(Error::InvalidatedView)));
        let fresh = vb.view().unwrap();
        drop(vb);
        let mut device = HeadlessDevice::new();
        assert!(matches!(fresh.activate(&mut device), Err(Error::DanglingView)));
    }

    #[test]
    fn views_recreate_deleted_base() {
        let mut vb = VertexBuffer::from_slice(&[1u8, 2, 3, 4], 2).unwrap();
        let view = vb.view().unwrap();
        let mut device = HeadlessDevice::new();
        view.activate(&mut device).unwrap();
        assert!(view.buffer_handle().is_some());
        view.delete(&mut device);
        assert_eq!(vb.state(), ObjectState::Deleted);
        view.activate(&mut device).unwrap();
        assert_eq!(vb.state(), ObjectState::Valid);
        vb.delete(&mut device);
    }
}
