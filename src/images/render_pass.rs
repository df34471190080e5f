use crate::bindings::index_buffer::IndexType;

/// How the device assembles processed vertices into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// One draw submission as the device receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    /// Draw `count` vertices starting at `first`, in the order they appear in the bound attributes.
    Arrays { first: usize, count: usize },
    /// Draw `count` indices from the currently bound index buffer.
    Elements { count: usize, index_type: IndexType },
}

impl DrawCommand {
    ///number of vertices the device will process
    pub fn vertex_count(&self) -> usize {
        match self {
            DrawCommand::Arrays { count, .. } => *count,
            DrawCommand::Elements { count, .. } => *count,
        }
    }
}
