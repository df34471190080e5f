// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The crate error type.

use crate::images::device::DeviceError;
use crate::images::diagnostics::Diagnostic;
use crate::images::shader::StageKind;
use crate::pixel_formats::{ElementType, TextureFormat};

fn listing(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for d in diagnostics {
        out.push('\n');
        out.push_str(&d.to_string());
    }
    out
}

/// Errors raised by resources, programs and input bindings.
///
/// Shape and type errors are returned at the call that introduced them.  Errors the device
/// reports (compile, link, upload) are returned from the activation that triggered the work.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("no graphics context is current")]
    Context,
    #[error("{stage} shader failed to compile{}", listing(.diagnostics))]
    Compile {
        stage: StageKind,
        diagnostics: Vec<Diagnostic>,
    },
    #[error("program failed to link{}", listing(.diagnostics))]
    Link { diagnostics: Vec<Diagnostic> },
    #[error("write of {len} bytes at offset {offset} exceeds capacity {capacity}")]
    Capacity {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    #[error("{name} takes {expected} components but the value has {got}")]
    BindingArity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("device rejected texture extent {shape:?} after {attempts} attempts")]
    OutOfMemory { shape: Vec<usize>, attempts: u32 },
    #[error("device does not support {capability}")]
    BackendUnsupported { capability: String },
    #[error("payload is {got} bytes but the addressed range is {expected} bytes")]
    ByteLength { expected: usize, got: usize },
    #[error("partial update with {got:?} data into a {expected:?} texture")]
    ElementType {
        expected: ElementType,
        got: ElementType,
    },
    #[error("{format:?} takes {expected} channels but the data has {got}")]
    Format {
        format: TextureFormat,
        expected: usize,
        got: usize,
    },
    #[error("shape {shape:?} with {channels} channels does not describe {len} bytes")]
    Shape {
        shape: Vec<usize>,
        channels: usize,
        len: usize,
    },
    #[error("{got}-dimensional data for a {expected}-dimensional texture")]
    Dimensions { expected: usize, got: usize },
    #[error("region {shape:?} at {offset:?} does not fit texture extent {extent:?}")]
    Region {
        offset: Vec<usize>,
        shape: Vec<usize>,
        extent: Vec<usize>,
    },
    #[error("{name} cannot take a {kind} value")]
    InvalidBinding { name: String, kind: &'static str },
    #[error("{0} components is not a bindable value size")]
    ComponentCount(usize),
    #[error("view refers to a buffer that no longer exists")]
    DanglingView,
    #[error("view was invalidated when its buffer was resized")]
    InvalidatedView,
    #[error("vertex layout has no field named {0}")]
    UnknownField(String),
    #[error(transparent)]
    Device(#[from] DeviceError),
}
