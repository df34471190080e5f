/*! Programs, shader stages and the device they run on */

pub mod device;
pub mod diagnostics;
pub mod program;
pub mod reflection;
pub mod render_pass;
pub mod shader;
pub mod vertex_layout;

pub use device::Device;
pub use program::{ActiveProgram, Program};
