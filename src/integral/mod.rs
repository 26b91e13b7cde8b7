// This file is part of the rustdetect library, implementing the cascade-based
// object detection method described in the following papers:
//
//      Rapid object detection using a boosted cascade of simple features,
//      Paul Viola, Michael Jones. In CVPR 2001.
//
//      An extended set of Haar-like features for rapid object detection,
//      Rainer Lienhart, Jochen Maydt. In ICIP 2002.
//
// You can redistribute rustdetect sources and/or modify them under the terms
// of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the
// software. If not, see <https://opensource.org/licenses/BSD-2-Clause>.

//! Summed area tables: the constant-time rectangle sums behind Haar-like
//! feature evaluation.
//!
//! Every table is one entry wider and taller than its source image, with a
//! zero first row and first column, so that rectangle sums need no border
//! special-casing. All arithmetic wraps on overflow; rectangle differences
//! taken over the table come out right as long as the true sums of the
//! involved regions stay below `2^32`.

use num::traits::AsPrimitive;

/// Computes the summed area table of a 1-channel image. Entry `(y, x)` of
/// the table holds the sum of all source pixels above and to the left, i.e.
/// rows `0..y` and columns `0..x`.
///
/// `dst` is resized to `(width + 1) * (height + 1)` and overwritten.
pub fn compute_sat<T: AsPrimitive<u32>>(
    src: &[T],
    width: usize,
    height: usize,
    dst: &mut Vec<u32>,
) {
    fill_sat(src, width, height, dst, |v| v);
}

/// Computes the summed area table of the squared source pixels, from which
/// detection windows derive their intensity variance.
pub fn compute_squared_sat<T: AsPrimitive<u32>>(
    src: &[T],
    width: usize,
    height: usize,
    dst: &mut Vec<u32>,
) {
    fill_sat(src, width, height, dst, |v| v.wrapping_mul(v));
}

fn fill_sat<T, F>(src: &[T], width: usize, height: usize, dst: &mut Vec<u32>, value: F)
where
    T: AsPrimitive<u32>,
    F: Fn(u32) -> u32,
{
    debug_assert_eq!(src.len(), width * height);
    let table_width = width + 1;
    dst.resize(table_width * (height + 1), 0);

    for i in (0..=height * table_width).step_by(table_width) {
        dst[i] = 0;
    }

    for x in 1..=width {
        let mut column_sum = 0u32;
        let mut index = x;
        dst[x] = 0;
        for y in 1..=height {
            // The source is one column narrower than the table, hence the
            // shrinking offset.
            column_sum = column_sum.wrapping_add(value(src[index - y].as_()));
            index += table_width;
            dst[index] = dst[index - 1].wrapping_add(column_sum);
        }
    }
}

/// Computes the 45 degree rotated summed area table of a 1-channel image,
/// as introduced by Lienhart and Maydt for tilted Haar-like features. Entry
/// `(y, x)` with `x >= 1` holds the sum of the pixels inside the diamond
/// whose bottom corner sits at `(y, x)`, clipped to the image.
///
/// `dst` is resized to `(width + 1) * (height + 1)` and overwritten.
pub fn compute_rotated_sat<T: AsPrimitive<u32>>(
    src: &[T],
    width: usize,
    height: usize,
    dst: &mut Vec<u32>,
) {
    debug_assert_eq!(src.len(), width * height);
    let table_width = width + 1;
    dst.resize(table_width * (height + 1), 0);

    for i in (0..=height * table_width).step_by(table_width) {
        dst[i] = 0;
    }
    for v in dst[..table_width].iter_mut() {
        *v = 0;
    }

    // Forward pass: each cell accumulates the diagonal running down-right
    // from the upper-left, with a per-row fixup for the last column.
    let mut index = 0;
    for y in 0..height {
        for _ in 0..width {
            dst[index + table_width + 1] = src[index - y].as_().wrapping_add(dst[index]);
            index += 1;
        }
        dst[index + table_width] = dst[index + table_width].wrapping_add(dst[index]);
        index += 1;
    }

    // Backward pass: fold in the down-left diagonals, right to left.
    for x in (1..width).rev() {
        let mut index = x + height * table_width;
        for _ in 0..height {
            index -= table_width;
            dst[index + table_width] = dst[index + table_width]
                .wrapping_add(dst[index].wrapping_add(dst[index + 1]));
        }
    }
}
