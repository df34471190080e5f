/*! buffers_and_bindings is the resource-lifecycle and shader-binding layer for GPU
visualization.

It lets CPU-side data (numeric arrays, images, shader source) be declared without a live
graphics context, then lazily materializes it into GPU objects, keeps those objects
consistent across mutation, and binds them to compiled program inputs with type and
capability checks.

# Two-phase resources

Every resource in this crate is a plain descriptor until it meets a [`images::Device`].
Construct buffers, textures and shader stages anywhere; they allocate nothing.  The first
`activate` (or an explicit `materialize`) against a current device creates the device object,
flushes queued writes in FIFO order and binds it.

| Type                                  | Owns device memory | Queue                                  |
|---------------------------------------|--------------------|----------------------------------------|
| [`bindings::buffer::Buffer`]          | yes                | full replace / sub-writes              |
| [`bindings::vertex_buffer::VertexBuffer`] | yes            | same as buffer, plus a record layout   |
| [`bindings::vertex_buffer::VertexBufferView`] | no         | writes forwarded to the base buffer    |
| [`bindings::texture::Texture`]        | yes                | uploads / sub-image updates, parameters |
| [`images::shader::ShaderStage`]       | yes                | one compile per source assignment      |
| [`images::program::Program`]          | yes                | attach/detach, input assignments       |

# Failure containment

Errors the device reports while creating or updating an object are returned once and then
pin the object in [`ObjectState::Error`], so a broken shader or an oversized texture does not
repeat its failing work every frame.  Mutating the object again clears the pin.

# Example

```
use buffers_and_bindings::HeadlessDevice;
use buffers_and_bindings::bindings::buffer::Buffer;

let buffer = Buffer::from_slice(&[1.0f32, 2.0, 3.0]);
let mut device = HeadlessDevice::new();
buffer.activate(&mut device).unwrap();
let handle = buffer.handle().unwrap();
assert_eq!(device.buffer_contents(handle).unwrap().len(), 12);
```
*/

pub mod bindings;
mod bittricks;
mod error;
pub mod images;
mod imp;
pub mod pixel_formats;

pub use bindings::resource_tracking::{ObjectKind, ObjectState, RawHandle};
pub use error::Error;
pub use imp::{AttributeState, DiagnosticStyle, DrawRecord, HeadlessDevice};
