// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Program input reflection.
//!
//! After a link, a program knows which uniforms and attributes survived optimization and where
//! they live.  [`ActiveInput`] is one such entry.  This module also reads declarations straight
//! out of GLSL source, which is how the headless device reflects programs and how callers can
//! inspect a stage before it is compiled.
//!
//! ```
//! use buffers_and_bindings::images::reflection::{declarations, SlotRole, SlotType};
//! use buffers_and_bindings::images::shader::StageKind;
//!
//! let source = "
//!     uniform mat4 u_transform;   // model-view-projection
//!     attribute vec2 a_position;
//!     /* uniform float u_unused; */
//!     uniform float u_weights[3];
//! ";
//! let found = declarations(source, StageKind::Vertex);
//! let names: Vec<_> = found.iter().map(|d| d.name.as_str()).collect();
//! assert_eq!(names, ["u_transform", "a_position", "u_weights[0]", "u_weights[1]", "u_weights[2]"]);
//! assert_eq!(found[0].slot_type, SlotType::Mat4);
//! assert_eq!(found[1].role, SlotRole::Attribute);
//! ```

use crate::bindings::inputs::ScalarKind;
use crate::images::shader::StageKind;
use std::collections::BTreeSet;

/// GLSL type of a program input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    Bool,
    BVec2,
    BVec3,
    BVec4,
    Mat2,
    Mat3,
    Mat4,
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
}

const GLSL_TYPES: [(&str, SlotType); 19] = [
    ("float", SlotType::Float),
    ("vec2", SlotType::Vec2),
    ("vec3", SlotType::Vec3),
    ("vec4", SlotType::Vec4),
    ("int", SlotType::Int),
    ("ivec2", SlotType::IVec2),
    ("ivec3", SlotType::IVec3),
    ("ivec4", SlotType::IVec4),
    ("bool", SlotType::Bool),
    ("bvec2", SlotType::BVec2),
    ("bvec3", SlotType::BVec3),
    ("bvec4", SlotType::BVec4),
    ("mat2", SlotType::Mat2),
    ("mat3", SlotType::Mat3),
    ("mat4", SlotType::Mat4),
    ("sampler1D", SlotType::Sampler1D),
    ("sampler2D", SlotType::Sampler2D),
    ("sampler3D", SlotType::Sampler3D),
    ("samplerCube", SlotType::SamplerCube),
];

impl SlotType {
    pub fn from_glsl(name: &str) -> Option<SlotType> {
        GLSL_TYPES.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
    }

    pub fn glsl_name(self) -> &'static str {
        GLSL_TYPES
            .iter()
            .find(|(_, t)| *t == self)
            .map(|(n, _)| *n)
            .unwrap_or("?")
    }

    /// Number of components a value for this slot has.  Samplers take one (a texture unit).
    pub fn arity(self) -> usize {
        match self {
            SlotType::Float | SlotType::Int | SlotType::Bool => 1,
            SlotType::Vec2 | SlotType::IVec2 | SlotType::BVec2 => 2,
            SlotType::Vec3 | SlotType::IVec3 | SlotType::BVec3 => 3,
            SlotType::Vec4 | SlotType::IVec4 | SlotType::BVec4 | SlotType::Mat2 => 4,
            SlotType::Mat3 => 9,
            SlotType::Mat4 => 16,
            SlotType::Sampler1D
            | SlotType::Sampler2D
            | SlotType::Sampler3D
            | SlotType::SamplerCube => 1,
        }
    }

    pub fn scalar_kind(self) -> ScalarKind {
        match self {
            SlotType::Int | SlotType::IVec2 | SlotType::IVec3 | SlotType::IVec4 => ScalarKind::Int,
            SlotType::Bool | SlotType::BVec2 | SlotType::BVec3 | SlotType::BVec4 => ScalarKind::Bool,
            SlotType::Sampler1D
            | SlotType::Sampler2D
            | SlotType::Sampler3D
            | SlotType::SamplerCube => ScalarKind::Int,
            _ => ScalarKind::Float,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            SlotType::Sampler1D | SlotType::Sampler2D | SlotType::Sampler3D | SlotType::SamplerCube
        )
    }
}

/// Whether an input is per-draw or per-vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRole {
    Uniform,
    Attribute,
}

/// A declared input, as read from source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub slot_type: SlotType,
    pub role: SlotRole,
}

/// An input the linked program kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveInput {
    pub name: String,
    pub location: u32,
    pub slot_type: SlotType,
    pub role: SlotRole,
}

/// Removes `//` and `/* */` comments.  Newlines inside block comments are kept so line
/// numbers still match the original.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            ('"', _) => {
                out.push(c);
                for c in chars.by_ref() {
                    out.push(c);
                    if c == '"' {
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Blanks preprocessor lines, keeping the line count.
fn strip_preprocessor(source: &str) -> String {
    source
        .lines()
        .map(|l| if l.trim_start().starts_with('#') { "" } else { l })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses one statement as an input declaration.
fn parse_declaration(statement: &str, stage: StageKind) -> Option<Vec<Declaration>> {
    let mut tokens = statement.split_whitespace();
    let role = match tokens.next()? {
        "uniform" => SlotRole::Uniform,
        "attribute" => SlotRole::Attribute,
        "in" if stage == StageKind::Vertex => SlotRole::Attribute,
        _ => return None,
    };
    let mut type_name = tokens.next()?;
    while matches!(type_name, "lowp" | "mediump" | "highp") {
        type_name = tokens.next()?;
    }
    let slot_type = SlotType::from_glsl(type_name)?;
    let rest = tokens.collect::<Vec<_>>().join(" ");
    let names = rest.split('=').next().unwrap_or("");

    let mut out = Vec::new();
    for part in names.split(',') {
        let part = part.trim();
        match part.find('[') {
            Some(bracket) => {
                let base = part[..bracket].trim();
                let size: usize = part[bracket + 1..].trim_end_matches(']').trim().parse().ok()?;
                if !is_identifier(base) {
                    continue;
                }
                for i in 0..size {
                    out.push(Declaration {
                        name: format!("{base}[{i}]"),
                        slot_type,
                        role,
                    });
                }
            }
            None if is_identifier(part) => out.push(Declaration {
                name: part.to_string(),
                slot_type,
                role,
            }),
            None => {}
        }
    }
    Some(out)
}

/// Splits source into its input declarations and everything else.
///
/// The second value is the source with comments, preprocessor lines and declaration statements
/// removed.
pub(crate) fn split_declarations(source: &str, stage: StageKind) -> (Vec<Declaration>, String) {
    let text = strip_preprocessor(&strip_comments(source));
    let mut declarations = Vec::new();
    let mut body = String::with_capacity(text.len());
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, ';' | '{' | '}') {
            let statement = &text[start..i];
            match parse_declaration(statement, stage) {
                Some(mut found) => declarations.append(&mut found),
                None => body.push_str(statement),
            }
            body.push(c);
            start = i + 1;
        }
    }
    body.push_str(&text[start..]);
    (declarations, body)
}

/// Uniform and attribute declarations in `source`, arrays expanded per element.
///
/// Under `StageKind::Vertex`, `in` declarations count as attributes.
pub fn declarations(source: &str, stage: StageKind) -> Vec<Declaration> {
    split_declarations(source, stage).0
}

/// Every identifier in `text`.  Numeric literals are skipped.
pub(crate) fn identifiers(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut current = String::new();
    let mut in_number = false;
    for c in text.chars() {
        let continues = c.is_ascii_alphanumeric() || c == '_' || (in_number && c == '.');
        if continues {
            if current.is_empty() {
                in_number = c.is_ascii_digit();
            }
            current.push(c);
        } else {
            if !in_number && !current.is_empty() {
                out.insert(std::mem::take(&mut current));
            }
            current.clear();
            in_number = false;
        }
    }
    if !in_number && !current.is_empty() {
        out.insert(current);
    }
    out
}

/// The name an array element is declared under: `u_lights[2]` is `u_lights`.
pub(crate) fn base_name(name: &str) -> &str {
    name.split('[').next().unwrap_or(name)
}
