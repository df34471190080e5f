// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Resampling of raw texel data.

Texel data is stored row-major with the last axis varying fastest, and channels interleaved
within each texel.  Everything here works on any dimensionality from 1 to 3.

# Coordinate conventions

- Coordinates list axes slowest-varying first, e.g. `[row, column]` for a 2D image.
- Offsets and extents use the same order.
*/

use crate::bindings::texture::TextureData;
use crate::bittricks::next_power_of_two;

/// Calls `f` with every coordinate inside `shape`, last axis fastest.
///
/// An empty `shape` has exactly one coordinate (the empty one); a zero extent has none.
pub(crate) fn for_each_coordinate(shape: &[usize], mut f: impl FnMut(&[usize])) {
    if shape.contains(&0) {
        return;
    }
    let mut coord = vec![0usize; shape.len()];
    loop {
        f(&coord);
        let mut axis = shape.len();
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            coord[axis] += 1;
            if coord[axis] < shape[axis] {
                break;
            }
            coord[axis] = 0;
        }
    }
}

/// Flat texel indices of the box-filter taps for output texel `coord`.
///
/// Each axis contributes input index `2c`, plus `2c + 1` when that is still inside the image,
/// so odd extents produce a smaller neighborhood at the far edge.
fn gather_taps(coord: &[usize], shape: &[usize], taps: &mut Vec<usize>) {
    let ndim = shape.len();
    for mask in 0..(1usize << ndim) {
        let mut flat = 0;
        let mut inside = true;
        for axis in 0..ndim {
            let i = 2 * coord[axis] + ((mask >> (ndim - 1 - axis)) & 1);
            if i >= shape[axis] {
                inside = false;
                break;
            }
            flat = flat * shape[axis] + i;
        }
        if inside {
            taps.push(flat);
        }
    }
}

/// Weighted average of `(weight, value)` taps.
fn avg(taps: &[(f64, f64)]) -> f64 {
    let mut sum = 0.0;
    for (weight, value) in taps {
        sum += weight * value;
    }
    sum
}

/**
Halves every extent (rounding up) with a box filter.

Each output texel averages the 2, 2×2 or 2×2×2 input neighborhood it covers.  At the far edge
of an odd extent the neighborhood is clipped and the remaining taps share the weight equally.
Integer data is rounded to nearest.
*/
pub(crate) fn downsample(data: &TextureData) -> TextureData {
    let shape = data.shape();
    let reduced: Vec<usize> = shape.iter().map(|&n| n.div_ceil(2)).collect();
    let channels = data.channels();
    let element = data.element();
    let size = element.size();
    let texel = data.texel_size();
    let src = data.bytes();

    let mut out = vec![0u8; reduced.iter().product::<usize>() * texel];
    let mut taps = Vec::with_capacity(1 << shape.len());
    let mut weighted = Vec::with_capacity(1 << shape.len());
    let mut out_index = 0;
    for_each_coordinate(&reduced, |coord| {
        taps.clear();
        gather_taps(coord, shape, &mut taps);
        let weight = 1.0 / taps.len() as f64;
        let base = out_index * texel;
        for c in 0..channels {
            weighted.clear();
            for &tap in &taps {
                let at = tap * texel + c * size;
                weighted.push((weight, element.read(&src[at..at + size])));
            }
            let at = base + c * size;
            element.write(avg(&weighted), &mut out[at..at + size]);
        }
        out_index += 1;
    });
    TextureData::from_parts(reduced, channels, element, out)
}

/// Zero-pads every extent up to the next power of two.  Data stays at the origin.
pub(crate) fn pad_to_power_of_two(data: &TextureData) -> TextureData {
    let padded: Vec<usize> = data.shape().iter().map(|&n| next_power_of_two(n)).collect();
    let texel = data.texel_size();
    let mut out = vec![0u8; padded.iter().product::<usize>() * texel];
    let origin = vec![0; padded.len()];
    copy_region(&padded, &mut out, &origin, data.shape(), data.bytes(), texel);
    TextureData::from_parts(padded, data.channels(), data.element(), out)
}

/// Whether a `shape` region at `offset` lies inside `extent`.
pub(crate) fn region_fits(extent: &[usize], offset: &[usize], shape: &[usize]) -> bool {
    extent.len() == offset.len()
        && extent.len() == shape.len()
        && extent
            .iter()
            .zip(offset)
            .zip(shape)
            .all(|((&e, &o), &s)| o.checked_add(s).is_some_and(|end| end <= e))
}

/**
Copies the `src_shape` image in `src` into `dst` at `offset`.

`texel` is the size of one texel in bytes.  The caller checks that the region fits
with [`region_fits`].
*/
pub(crate) fn copy_region(
    dst_shape: &[usize],
    dst: &mut [u8],
    offset: &[usize],
    src_shape: &[usize],
    src: &[u8],
    texel: usize,
) {
    let Some((&columns, outer)) = src_shape.split_last() else {
        return;
    };
    let row = columns * texel;
    let ndim = src_shape.len();
    let mut src_row = 0;
    for_each_coordinate(outer, |coord| {
        let mut flat = 0;
        for axis in 0..ndim - 1 {
            flat = flat * dst_shape[axis] + offset[axis] + coord[axis];
        }
        flat = flat * dst_shape[ndim - 1] + offset[ndim - 1];
        let start = flat * texel;
        dst[start..start + row].copy_from_slice(&src[src_row * row..(src_row + 1) * row]);
        src_row += 1;
    });
}
