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

//! Pixel-level transforms over flat row-major buffers.
//!
//! All functions write into a caller-supplied `Vec` so that per-frame
//! buffers can be recycled; the destination is resized as needed and its
//! capacity is never released.

/// Converts an interleaved 8-bit RGBA image to single-channel grayscale.
///
/// Uses the fixed-point luminance weights of the `CV_RGB2GRAY` color space
/// conversion; the alpha channel is ignored. Trailing bytes short of a full
/// RGBA quad are ignored as well.
pub fn rgba_to_grayscale(src: &[u8], dst: &mut Vec<u32>) {
    dst.clear();
    dst.reserve(src.len() / 4);
    for px in src.chunks_exact(4) {
        let r = u32::from(px[0]);
        let g = u32::from(px[1]);
        let b = u32::from(px[2]);
        dst.push((r * 4899 + g * 9617 + b * 1868 + 8192) >> 14);
    }
}

/// Shrinks a grayscale image by `factor` (> 1) without interpolation.
///
/// Source columns and rows are picked at a fixed stride, columns first into
/// a `dst_width x src_height` working layout, then rows are compacted in
/// place. The destination ends up `floor(src_width / factor)` by
/// `floor(src_height / factor)`.
pub fn rescale(src: &[u32], src_width: usize, src_height: usize, factor: f32, dst: &mut Vec<u32>) {
    debug_assert_eq!(src.len(), src_width * src_height);
    let factor = f64::from(factor);
    let dst_width = (src_width as f64 / factor) as usize;
    let dst_height = (src_height as f64 / factor) as usize;

    // The column pass needs the full source height.
    dst.resize(dst_width * src_height, 0);

    for x in 0..dst_width {
        let mut dst_index = x;
        let mut src_index = (x as f64 * factor) as usize;
        for _ in 0..src_height {
            dst[dst_index] = src[src_index];
            dst_index += dst_width;
            src_index += src_width;
        }
    }

    let mut dst_index = 0;
    let mut y = 0.0f64;
    for _ in 0..dst_height {
        let mut src_index = (y as usize) * dst_width;
        for _ in 0..dst_width {
            dst[dst_index] = dst[src_index];
            dst_index += 1;
            src_index += 1;
        }
        y += factor;
    }

    dst.truncate(dst_width * dst_height);
}

/// Mirrors a grayscale image around its vertical axis.
///
/// Lets a single trained classifier detect mirrored object instances (for
/// example the opposite hand) by flipping the frame instead.
pub fn mirror_horizontal(src: &[u32], width: usize, height: usize, dst: &mut Vec<u32>) {
    debug_assert_eq!(src.len(), width * height);
    dst.clear();
    dst.reserve(src.len());
    for row in src.chunks_exact(width) {
        dst.extend(row.iter().rev());
    }
}

/// Computes the gradient magnitude of a grayscale image: a 5-tap Gaussian
/// blur (sigma ~ sqrt(2)), then the sum of absolute horizontal and vertical
/// Sobel responses. The resulting map is the usual input for edge-density
/// window pruning.
///
/// The two-pixel border is left zero; intermediate results are truncated to
/// integers between the passes. The blurs zero the same margin, so the
/// Sobel window sees a step there and even a flat image carries a thin
/// response ring just inside the border.
pub fn gradient_magnitude(src: &[u32], width: usize, height: usize, dst: &mut Vec<u32>) {
    let len = width * height;
    debug_assert_eq!(src.len(), len);
    dst.clear();
    dst.resize(len, 0);
    if width < 5 || height < 5 {
        return;
    }

    let mut blur_h = vec![0u32; len];
    let mut blur = vec![0u32; len];

    for x in 2..width - 2 {
        let mut index = x;
        for _ in 0..height {
            blur_h[index] = (0.1117 * f64::from(src[index - 2])
                + 0.2365 * f64::from(src[index - 1])
                + 0.3036 * f64::from(src[index])
                + 0.2365 * f64::from(src[index + 1])
                + 0.1117 * f64::from(src[index + 2])) as u32;
            index += width;
        }
    }

    for x in 0..width {
        let mut index = x + width;
        for _ in 2..height - 2 {
            index += width;
            blur[index] = (0.1117 * f64::from(blur_h[index - 2 * width])
                + 0.2365 * f64::from(blur_h[index - width])
                + 0.3036 * f64::from(blur_h[index])
                + 0.2365 * f64::from(blur_h[index + width])
                + 0.1117 * f64::from(blur_h[index + 2 * width])) as u32;
        }
    }

    for x in 2..width - 2 {
        let mut index = x + width;
        for _ in 2..height - 2 {
            index += width;
            let dx = -f64::from(blur[index - 1 - width]) + f64::from(blur[index + 1 - width])
                - 2.0 * f64::from(blur[index - 1])
                + 2.0 * f64::from(blur[index + 1])
                - f64::from(blur[index - 1 + width])
                + f64::from(blur[index + 1 + width]);
            let dy = f64::from(blur[index - 1 - width])
                + 2.0 * f64::from(blur[index - width])
                + f64::from(blur[index + 1 - width])
                - f64::from(blur[index - 1 + width])
                - 2.0 * f64::from(blur[index + width])
                - f64::from(blur[index + 1 + width]);
            dst[index] = (dx.abs() + dy.abs()) as u32;
        }
    }
}

/// Equalizes the histogram of a grayscale image with values in `0..=255`,
/// sampling every `step`-th pixel when building the histogram. Corresponds
/// to the `equalizeHist` OpenCV function.
///
/// # Panics
///
/// Panics if `step` is zero, or if any input value exceeds 255; the remap
/// pass reads every pixel regardless of the sampling step.
pub fn equalize_histogram(src: &[u32], step: usize, dst: &mut Vec<u32>) {
    if step == 0 {
        panic!("Illegal sampling step: {}", step);
    }
    let len = src.len();

    let mut hist = [0.0f32; 256];
    let mut i = 0;
    while i < len {
        hist[src[i] as usize] += 1.0;
        i += step;
    }

    // Cumulative histogram, normalized so that a full population maps to 255.
    let norm = 255.0 * step as f64 / len as f64;
    let mut remap = [0.0f32; 256];
    let mut prev = 0.0f64;
    for (bin, count) in hist.iter().enumerate() {
        prev += f64::from(*count);
        remap[bin] = (prev * norm) as f32;
    }

    dst.clear();
    dst.reserve(len);
    for &v in src {
        dst.push(remap[v as usize] as u32);
    }
}
