/*! Defines the resource types that get bound to programs */

pub mod resource_tracking;
pub(crate) mod dirty_tracking;
pub mod visible_to;
pub mod sampler;
pub mod buffer;
pub mod vertex_buffer;
pub mod index_buffer;
pub mod texture;
pub mod texture_builder;
pub mod atlas;
pub mod inputs;
pub(crate) mod software;

pub use inputs::InputValue;
