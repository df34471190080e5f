/// How a texture is filtered when sampled between texel centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    ///Use the nearest texel.
    #[default]
    Nearest,
    ///Blend the surrounding texels.
    Linear,
}

/// What sampling outside `[0, 1]` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrapping {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}
