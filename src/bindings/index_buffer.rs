// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Index buffers for indexed draws.

Indices may be 8, 16 or 32 bits wide.  32-bit indices are an extension on many GL ES class
devices; activating a `u32` index buffer on a device without `OES_element_index_uint` fails with
[`Error::BackendUnsupported`].
*/

use crate::Error;
use crate::bindings::buffer::Buffer;
use crate::bindings::resource_tracking::{ObjectState, RawHandle};
use crate::images::device::{BufferTarget, Device};
use crate::pixel_formats::{Element, element_bytes};

/// Extension required for [`IndexType::U32`].
pub const WIDE_INDEX_EXTENSION: &str = "OES_element_index_uint";

/// Width of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U8,
    U16,
    U32,
}

impl IndexType {
    pub const fn size(self) -> usize {
        match self {
            IndexType::U8 => 1,
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// A host type usable as an index: `u8`, `u16` or `u32`.
pub trait Index: Element {
    const TYPE: IndexType;
}
impl Index for u8 {
    const TYPE: IndexType = IndexType::U8;
}
impl Index for u16 {
    const TYPE: IndexType = IndexType::U16;
}
impl Index for u32 {
    const TYPE: IndexType = IndexType::U32;
}

#[derive(Debug)]
pub struct IndexBuffer {
    buffer: Buffer,
    index_type: IndexType,
}

impl IndexBuffer {
    pub fn from_slice<T: Index>(indices: &[T]) -> Self {
        IndexBuffer {
            buffer: Buffer::with_target(BufferTarget::ElementArray, element_bytes(indices).to_vec()),
            index_type: <T as Index>::TYPE,
        }
    }

    /// Replaces the indices.  The index type may change.
    pub fn set_data<T: Index>(&mut self, indices: &[T]) {
        self.buffer.set_data(indices);
        self.index_type = <T as Index>::TYPE;
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Number of indices.
    pub fn count(&self) -> usize {
        self.buffer.capacity() / self.index_type.size()
    }

    pub fn handle(&self) -> Option<RawHandle> {
        self.buffer.handle()
    }
    pub fn state(&self) -> ObjectState {
        self.buffer.state()
    }

    fn check_supported(&self, device: &dyn Device) -> Result<(), Error> {
        if self.index_type == IndexType::U32 && !device.has_extension(WIDE_INDEX_EXTENSION) {
            return Err(Error::BackendUnsupported {
                capability: WIDE_INDEX_EXTENSION.to_string(),
            });
        }
        Ok(())
    }

    pub fn activate(&self, device: &mut dyn Device) -> Result<(), Error> {
        self.check_supported(device)?;
        self.buffer.activate(device)
    }
    pub fn deactivate(&self, device: &mut dyn Device) {
        self.buffer.deactivate(device)
    }
    pub fn delete(&mut self, device: &mut dyn Device) {
        self.buffer.delete(device)
    }
}
