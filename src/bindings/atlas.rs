// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Packs many small images into one 2D texture.

The atlas is a float RGB texture with linear interpolation and clamp-to-edge wrapping.  Space is
handed out with the skyline bottom-left heuristic: the free space is tracked as a list of
horizontal segments (the "skyline"), and each request goes where its top edge ends up lowest,
ties going to the narrowest segment.

```
use buffers_and_bindings::bindings::atlas::TextureAtlas;

let mut atlas = TextureAtlas::new(100, 100).unwrap();
//extents round to the nearest power of two
assert_eq!(atlas.shape(), [128, 128]);
let glyph = atlas.get_free_region(20, 30).unwrap();
assert_eq!((glyph.x, glyph.y), (0, 0));
atlas.set_region(glyph, &vec![1.0f32; 20 * 30 * 3]).unwrap();
```
*/

use crate::Error;
use crate::bindings::sampler::{Interpolation, Wrapping};
use crate::bindings::texture::{Texture, TextureData};
use crate::bindings::texture_builder::TextureBuilder;
use crate::bittricks::nearest_power_of_two;
use crate::pixel_formats::ElementType;

/// A rectangle of the atlas, in texels.  `y` grows with the row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// One skyline segment: `width` texels starting at `x` are free from row `y` upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SkylineNode {
    x: usize,
    y: usize,
    width: usize,
}

#[derive(Debug)]
pub struct TextureAtlas {
    texture: Texture,
    height: usize,
    width: usize,
    nodes: Vec<SkylineNode>,
}

impl TextureAtlas {
    /// Channels per texel.
    pub const CHANNELS: usize = 3;

    /// An empty atlas.  Each extent is rounded to the nearest power of two (in log space).
    pub fn new(width: usize, height: usize) -> Result<Self, Error> {
        let width = nearest_power_of_two(width);
        let height = nearest_power_of_two(height);
        let data = TextureData::zeros(&[height, width], Self::CHANNELS, ElementType::F32)?;
        let texture = TextureBuilder::new(data)
            .with_interpolation(Interpolation::Linear)
            .with_wrapping(Wrapping::ClampToEdge)
            .with_debug_name("atlas")
            .build()?;
        Ok(TextureAtlas {
            texture,
            height,
            width,
            nodes: vec![SkylineNode { x: 0, y: 0, width }],
        })
    }

    /// `[height, width]` of the backing texture.
    pub fn shape(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    /// The backing texture, for binding to a sampler.
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// The row at which a `width × height` region would sit on segment `index`, if it fits.
    fn fit(&self, index: usize, width: usize, height: usize) -> Option<usize> {
        let node = self.nodes[index];
        if node.x + width > self.width {
            return None;
        }
        let mut y = node.y;
        let mut width_left = width as isize;
        let mut i = index;
        while width_left > 0 {
            let node = self.nodes.get(i)?;
            y = y.max(node.y);
            if y + height > self.height {
                return None;
            }
            width_left -= node.width as isize;
            i += 1;
        }
        Some(y)
    }

    /**
    Allocates a `width × height` region.

    Returns `None` when no free space can hold it.  Allocated regions are never reclaimed.
    */
    pub fn get_free_region(&mut self, width: usize, height: usize) -> Option<AtlasRegion> {
        let mut best: Option<(usize, usize, usize, AtlasRegion)> = None;
        for i in 0..self.nodes.len() {
            let Some(y) = self.fit(i, width, height) else {
                continue;
            };
            let node = self.nodes[i];
            let top = y + height;
            let better = match best {
                None => true,
                Some((best_top, best_width, _, _)) => {
                    top < best_top || (top == best_top && node.width < best_width)
                }
            };
            if better {
                let region = AtlasRegion {
                    x: node.x,
                    y,
                    width,
                    height,
                };
                best = Some((top, node.width, i, region));
            }
        }
        let (_, _, index, region) = best?;

        self.nodes.insert(
            index,
            SkylineNode {
                x: region.x,
                y: region.y + height,
                width,
            },
        );
        //trim the segments the new one now shadows
        let mut i = index + 1;
        while i < self.nodes.len() {
            let prev = self.nodes[i - 1];
            let prev_end = prev.x + prev.width;
            let node = &mut self.nodes[i];
            if node.x >= prev_end {
                break;
            }
            let shrink = prev_end - node.x;
            if node.width <= shrink {
                self.nodes.remove(i);
            } else {
                node.x += shrink;
                node.width -= shrink;
                break;
            }
        }
        //merge neighbours at the same height
        let mut i = 0;
        while i + 1 < self.nodes.len() {
            if self.nodes[i].y == self.nodes[i + 1].y {
                self.nodes[i].width += self.nodes[i + 1].width;
                self.nodes.remove(i + 1);
            } else {
                i += 1;
            }
        }
        Some(region)
    }

    /// Queues `data` (row-major RGB floats, `height × width × 3`) into `region`.
    pub fn set_region(&self, region: AtlasRegion, data: &[f32]) -> Result<(), Error> {
        let data = TextureData::new(&[region.height, region.width], Self::CHANNELS, data)?;
        self.texture.set_data(data, Some(&[region.y, region.x]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_extents() {
        let atlas = TextureAtlas::new(1000, 300).unwrap();
        assert_eq!(atlas.shape(), [256, 1024]);
        assert_eq!(atlas.texture().channels(), 3);
        assert_eq!(atlas.texture().interpolation(), Interpolation::Linear);
    }

    #[test]
    fn packs_bottom_left() {
        let mut atlas = TextureAtlas::new(64, 64).unwrap();
        let a = atlas.get_free_region(32, 10).unwrap();
        let b = atlas.get_free_region(32, 20).unwrap();
        let c = atlas.get_free_region(32, 5).unwrap();
        assert_eq!((a.x, a.y), (0, 0));
        assert_eq!((b.x, b.y), (32, 0));
        //lowest top edge wins: above `a`
        assert_eq!((c.x, c.y), (0, 10));
        let wide = atlas.get_free_region(64, 8).unwrap();
        assert_eq!((wide.x, wide.y), (0, 20));
    }

    #[test]
    fn full_atlas_rejects() {
        let mut atlas = TextureAtlas::new(16, 16).unwrap();
        assert!(atlas.get_free_region(17, 1).is_none());
        assert!(atlas.get_free_region(16, 16).is_some());
        assert!(atlas.get_free_region(1, 1).is_none());
    }

    #[test]
    fn region_upload_checks_size() {
        let mut atlas = TextureAtlas::new(16, 16).unwrap();
        let region = atlas.get_free_region(2, 2).unwrap();
        assert!(atlas.set_region(region, &[0.0; 11]).is_err());
        atlas.set_region(region, &[0.5; 12]).unwrap();
        assert_eq!(atlas.texture().pending_updates(), 2);
    }
}
