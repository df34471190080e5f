// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Values that can be assigned to named program inputs.
//!
//! A program input receives one of three kinds of value:
//!
//! - **Generic**: a scalar, vector or matrix applied identically to every vertex.  Uniforms
//!   always take generic values; attributes may take one to feed a constant.
//! - **Varying**: per-vertex data read from a buffer view.  Dense host arrays are copied into
//!   a vertex buffer owned by the binding.
//! - **Texture**: a texture, legal only for sampler inputs.
//!
//! # Example
//!
//! ```
//! use buffers_and_bindings::bindings::InputValue;
//! use buffers_and_bindings::bindings::inputs::GenericValue;
//!
//! let tint: InputValue = [1.0f32, 0.5, 0.25, 1.0].into();
//! assert!(matches!(tint, InputValue::Generic(ref v) if v.len() == 4));
//!
//! //only 1-4, 9 or 16 components are bindable
//! assert!(GenericValue::floats(&[0.0; 5]).is_err());
//! ```

use crate::Error;
use crate::bindings::texture::Texture;
use crate::bindings::vertex_buffer::{VertexBuffer, VertexBufferView};
use crate::images::vertex_layout::VertexElement;

/// Component counts a generic value may have: scalars, vectors, `mat3` and `mat4`.
const BINDABLE_LENGTHS: [usize; 6] = [1, 2, 3, 4, 9, 16];

/// Scalar kind of a value or slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    Int,
    Bool,
}

/// A constant value: a scalar, vector or matrix.
///
/// Matrices are stored column-major, as GL expects them.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericValue {
    Float(Vec<f32>),
    Int(Vec<i32>),
}

impl GenericValue {
    pub fn floats(values: &[f32]) -> Result<Self, Error> {
        check_length(values.len())?;
        Ok(GenericValue::Float(values.to_vec()))
    }

    pub fn ints(values: &[i32]) -> Result<Self, Error> {
        check_length(values.len())?;
        Ok(GenericValue::Int(values.to_vec()))
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        match self {
            GenericValue::Float(v) => v.len(),
            GenericValue::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scalar_kind(&self) -> ScalarKind {
        match self {
            GenericValue::Float(_) => ScalarKind::Float,
            GenericValue::Int(_) => ScalarKind::Int,
        }
    }

    /// The components as floats.
    pub fn to_floats(&self) -> Vec<f32> {
        match self {
            GenericValue::Float(v) => v.clone(),
            GenericValue::Int(v) => v.iter().map(|&i| i as f32).collect(),
        }
    }

    /// The same value in the representation a slot of `kind` takes.
    ///
    /// Floats become integers by rounding; booleans are integers that are zero or one.
    pub(crate) fn converted_to(&self, kind: ScalarKind) -> GenericValue {
        match (kind, self) {
            (ScalarKind::Float, _) => GenericValue::Float(self.to_floats()),
            (ScalarKind::Int, GenericValue::Int(v)) => GenericValue::Int(v.clone()),
            (ScalarKind::Int, GenericValue::Float(v)) => {
                GenericValue::Int(v.iter().map(|f| f.round() as i32).collect())
            }
            (ScalarKind::Bool, GenericValue::Int(v)) => {
                GenericValue::Int(v.iter().map(|&i| (i != 0) as i32).collect())
            }
            (ScalarKind::Bool, GenericValue::Float(v)) => {
                GenericValue::Int(v.iter().map(|&f| (f != 0.0) as i32).collect())
            }
        }
    }
}

fn check_length(len: usize) -> Result<(), Error> {
    if BINDABLE_LENGTHS.contains(&len) {
        Ok(())
    } else {
        Err(Error::ComponentCount(len))
    }
}

impl From<f32> for GenericValue {
    fn from(value: f32) -> Self {
        GenericValue::Float(vec![value])
    }
}
impl From<i32> for GenericValue {
    fn from(value: i32) -> Self {
        GenericValue::Int(vec![value])
    }
}
impl From<bool> for GenericValue {
    fn from(value: bool) -> Self {
        GenericValue::Int(vec![value as i32])
    }
}

macro_rules! generic_arrays {
    ($($n:literal),*) => {
        $(
            impl From<[f32; $n]> for GenericValue {
                fn from(value: [f32; $n]) -> Self {
                    GenericValue::Float(value.to_vec())
                }
            }
            impl From<[i32; $n]> for GenericValue {
                fn from(value: [i32; $n]) -> Self {
                    GenericValue::Int(value.to_vec())
                }
            }
        )*
    };
}
generic_arrays!(1, 2, 3, 4, 9, 16);

impl From<[[f32; 4]; 4]> for GenericValue {
    /// A `mat4` given as four columns.
    fn from(columns: [[f32; 4]; 4]) -> Self {
        GenericValue::Float(columns.iter().flatten().copied().collect())
    }
}
impl From<[[f32; 3]; 3]> for GenericValue {
    /// A `mat3` given as three columns.
    fn from(columns: [[f32; 3]; 3]) -> Self {
        GenericValue::Float(columns.iter().flatten().copied().collect())
    }
}

/// Per-vertex data for an attribute.
#[derive(Debug, Clone)]
pub enum VaryingSource {
    /// A view into a buffer the caller owns.
    View(VertexBufferView),
    /// A buffer created from a dense host array and owned by the binding.
    Dense(std::rc::Rc<VertexBuffer>),
}

impl VaryingSource {
    /// The view attributes read through.
    pub(crate) fn view(&self) -> Result<VertexBufferView, Error> {
        match self {
            VaryingSource::View(view) => Ok(view.clone()),
            VaryingSource::Dense(buffer) => buffer.view(),
        }
    }

    /// Number of components per vertex.
    pub fn arity(&self) -> Result<usize, Error> {
        Ok(self.view()?.arity())
    }
}

/// A value assigned to a named program input.
#[derive(Debug, Clone)]
pub enum InputValue {
    Generic(GenericValue),
    Varying(VaryingSource),
    TextureRef(Texture),
}

impl InputValue {
    /// Copies a dense array of `arity`-component vertices into a new vertex buffer.
    ///
    /// ```
    /// use buffers_and_bindings::bindings::InputValue;
    ///
    /// //three 2D positions
    /// let positions = InputValue::dense(&[0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0], 2).unwrap();
    /// assert_eq!(positions.kind(), "varying");
    /// ```
    pub fn dense<T: VertexElement>(data: &[T], arity: usize) -> Result<Self, Error> {
        let buffer = VertexBuffer::from_slice(data, arity)?;
        Ok(InputValue::Varying(VaryingSource::Dense(std::rc::Rc::new(buffer))))
    }

    /// Name of the value kind, as used in binding errors.
    pub fn kind(&self) -> &'static str {
        match self {
            InputValue::Generic(_) => "generic",
            InputValue::Varying(_) => "varying",
            InputValue::TextureRef(_) => "texture",
        }
    }
}

macro_rules! generic_inputs {
    ($($t:ty),*) => {
        $(
            impl From<$t> for InputValue {
                fn from(value: $t) -> Self {
                    InputValue::Generic(value.into())
                }
            }
        )*
    };
}
generic_inputs!(
    GenericValue,
    f32,
    i32,
    bool,
    [f32; 2],
    [f32; 3],
    [f32; 4],
    [f32; 9],
    [f32; 16],
    [i32; 2],
    [i32; 3],
    [i32; 4],
    [[f32; 3]; 3],
    [[f32; 4]; 4]
);

impl From<VertexBufferView> for InputValue {
    fn from(view: VertexBufferView) -> Self {
        InputValue::Varying(VaryingSource::View(view))
    }
}

impl From<&Texture> for InputValue {
    fn from(texture: &Texture) -> Self {
        InputValue::TextureRef(texture.clone())
    }
}
