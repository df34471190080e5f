// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex buffer layout descriptions.
//!
//! A vertex buffer either holds one homogeneous element per vertex (say, a `vec3` position) or an
//! interleaved record of named fields.  [`VertexLayout`] describes which, and computes the byte
//! offset of each field and the stride of a whole record.
//!
//! # Example
//!
//! ```
//! use buffers_and_bindings::images::vertex_layout::{VertexLayout, VertexFieldType};
//!
//! // position (x, y, z) followed by an RGBA8 color
//! let mut layout = VertexLayout::new();
//! layout.add_field("a_position", VertexFieldType::F32, 3).unwrap();
//! layout.add_field("a_color", VertexFieldType::U8, 4).unwrap();
//! assert_eq!(layout.element_stride(), 16);
//! assert_eq!(layout.field("a_color").unwrap().offset(), 12);
//! ```

use crate::Error;
use crate::pixel_formats::{Element, ElementType, f16};

/// A host scalar type that vertex attributes accept.
///
/// Implemented for `i8`, `u8`, `i16`, `u16`, [`f16`] and `f32`.
pub trait VertexElement: Element {
    const FIELD: VertexFieldType;
}

macro_rules! vertex_element {
    ($t:ty, $tag:ident) => {
        impl VertexElement for $t {
            const FIELD: VertexFieldType = VertexFieldType::$tag;
        }
    };
}
vertex_element!(i8, I8);
vertex_element!(u8, U8);
vertex_element!(i16, I16);
vertex_element!(u16, U16);
vertex_element!(f16, F16);
vertex_element!(f32, F32);

/// Describes the layout of one vertex record.
///
/// Fields are stored in the order they are added with no padding between them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    fields: Vec<VertexField>,
}

/// One named field of a vertex record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexField {
    name: String,
    r#type: VertexFieldType,
    arity: usize,
    offset: usize,
}

impl VertexField {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn field_type(&self) -> VertexFieldType {
        self.r#type
    }
    /// Number of components, 1 to 4.
    pub fn arity(&self) -> usize {
        self.arity
    }
    /// Byte offset of the field from the start of the record.
    pub fn offset(&self) -> usize {
        self.offset
    }
    /// Size of the field in bytes.
    pub fn size(&self) -> usize {
        self.r#type.size() * self.arity
    }
}

/// Scalar type of a vertex field component.
///
/// Vertex attributes are narrower than general buffer data; 32-bit integers are not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFieldType {
    I8,
    U8,
    I16,
    U16,
    /// A half-precision float.
    F16,
    /// A 32-bit floating point value.
    ///
    /// This is the most common type for positions, normals, texture coordinates and colors.
    F32,
}

impl VertexFieldType {
    pub fn size(self) -> usize {
        self.element_type().size()
    }

    pub fn element_type(self) -> ElementType {
        match self {
            VertexFieldType::I8 => ElementType::I8,
            VertexFieldType::U8 => ElementType::U8,
            VertexFieldType::I16 => ElementType::I16,
            VertexFieldType::U16 => ElementType::U16,
            VertexFieldType::F16 => ElementType::F16,
            VertexFieldType::F32 => ElementType::F32,
        }
    }

    /// The field type for an element type, if vertex attributes accept it.
    pub fn from_element_type(element: ElementType) -> Option<VertexFieldType> {
        match element {
            ElementType::I8 => Some(VertexFieldType::I8),
            ElementType::U8 => Some(VertexFieldType::U8),
            ElementType::I16 => Some(VertexFieldType::I16),
            ElementType::U16 => Some(VertexFieldType::U16),
            ElementType::F16 => Some(VertexFieldType::F16),
            ElementType::F32 => Some(VertexFieldType::F32),
            ElementType::I32 | ElementType::U32 => None,
        }
    }
}

impl VertexLayout {
    /// Creates a new, empty vertex layout.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// A layout with a single unnamed field, for buffers that hold one element per vertex.
    ///
    /// ```
    /// use buffers_and_bindings::images::vertex_layout::{VertexLayout, VertexFieldType};
    ///
    /// let layout = VertexLayout::homogeneous(VertexFieldType::F32, 2).unwrap();
    /// assert!(layout.is_homogeneous());
    /// assert_eq!(layout.element_stride(), 8);
    /// ```
    pub fn homogeneous(r#type: VertexFieldType, arity: usize) -> Result<Self, Error> {
        let mut layout = Self::new();
        layout.add_field("", r#type, arity)?;
        Ok(layout)
    }

    /// Appends a field after every field already added.
    ///
    /// `arity` must be 1 to 4.
    pub fn add_field(
        &mut self,
        name: &str,
        r#type: VertexFieldType,
        arity: usize,
    ) -> Result<(), Error> {
        if !(1..=4).contains(&arity) {
            return Err(Error::ComponentCount(arity));
        }
        let offset = self.element_stride();
        self.fields.push(VertexField {
            name: name.to_string(),
            r#type,
            arity,
            offset,
        });
        Ok(())
    }

    /// Size in bytes of one whole record.
    pub fn element_stride(&self) -> usize {
        self.fields.iter().map(|f| f.size()).sum()
    }

    pub fn fields(&self) -> &[VertexField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&VertexField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the layout is a single field.
    pub fn is_homogeneous(&self) -> bool {
        self.fields.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_packed() {
        let mut layout = VertexLayout::new();
        layout.add_field("a", VertexFieldType::U8, 1).unwrap();
        layout.add_field("b", VertexFieldType::F32, 2).unwrap();
        layout.add_field("c", VertexFieldType::I16, 3).unwrap();
        assert_eq!(layout.field("a").unwrap().offset(), 0);
        assert_eq!(layout.field("b").unwrap().offset(), 1);
        assert_eq!(layout.field("c").unwrap().offset(), 9);
        assert_eq!(layout.element_stride(), 15);
        assert!(!layout.is_homogeneous());
    }

    #[test]
    fn arity_bounds() {
        let mut layout = VertexLayout::new();
        assert!(matches!(
            layout.add_field("a", VertexFieldType::F32, 5),
            Err(Error::ComponentCount(5))
        ));
        assert!(layout.add_field("a", VertexFieldType::F32, 0).is_err());
        assert!(layout.fields().is_empty());
    }

    #[test]
    fn wide_integers_rejected() {
        assert_eq!(VertexFieldType::from_element_type(ElementType::I32), None);
        assert_eq!(
            VertexFieldType::from_element_type(ElementType::F16),
            Some(VertexFieldType::F16)
        );
    }
}
