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

//! Compilation of cascade models against concrete image dimensions.
//!
//! A [`Model`] stores feature rectangles as window-relative coordinates. For
//! a fixed image size every rectangle corner can be precomputed as a summed
//! area table offset, turning each feature evaluation into four additions.
//! The compiled form is a single `u32` word stream; thresholds, weights and
//! leaf values are stored as `f32` bit patterns within it.

use std::error::Error;
use std::fmt;

use crate::model::Model;

/// A failure to specialize a model for given image dimensions.
#[derive(Debug)]
pub enum CompileError {
    /// A precomputed corner offset does not fit the packed 16-bit encoding.
    /// The image is too wide for this model; detect on a smaller scale.
    PackedOffsetOverflow {
        stage: usize,
        node: usize,
        value: u64,
    },
    /// The summed area tables of an image this large cannot be addressed.
    TableTooLarge { width: u32, height: u32 },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::PackedOffsetOverflow { stage, node, value } => write!(
                f,
                "corner offset {} of stage {}, node {} exceeds 16 bits",
                value, stage, node
            ),
            CompileError::TableTooLarge { width, height } => write!(
                f,
                "summed area tables for a {}x{} image exceed 32-bit indexing",
                width, height
            ),
        }
    }
}

impl Error for CompileError {}

/// A cascade classifier specialized for one image size.
///
/// Word layout, with `f32` values stored as bit patterns:
///
/// ```text
/// [window width, window height, stage, stage, ...]
/// stage   = [stage threshold (f32), node count, node, node, ...]
/// node    = [tilted, slot count, feature * (slot count / 3),
///            leaf (f32), leaf (f32)]
/// feature = [corner offset, packed spans, weight (f32)]
/// ```
///
/// Feature weights are pre-divided by their node threshold, and the two
/// leaves of a node with a negative threshold are stored swapped, so window
/// evaluation needs no threshold sign handling at all.
pub struct CompiledClassifier {
    words: Vec<u32>,
}

/// Specializes `model` for images of the given dimensions.
pub fn compile(
    model: &Model,
    width: u32,
    height: u32,
) -> Result<CompiledClassifier, CompileError> {
    let table_width = u64::from(width) + 1;
    let table_height = u64::from(height) + 1;
    if table_width * table_height > u64::from(u32::MAX) {
        return Err(CompileError::TableTooLarge { width, height });
    }

    let src = model.values();
    let mut words = Vec::with_capacity(src.len());
    words.push(model.window_width());
    words.push(model.window_height());

    let mut stage = 0;
    let mut i = 2;
    while i < src.len() {
        words.push(src[i].to_bits()); // stage threshold
        let node_count = src[i + 1] as usize;
        words.push(node_count as u32);
        i += 2;

        for node in 0..node_count {
            let tilted = src[i] != 0.0;
            let feature_count = src[i + 1] as usize;
            words.push(tilted as u32);
            words.push((feature_count * 3) as u32);
            i += 2;

            for _ in 0..feature_count {
                let x = u64::from(src[i] as u32);
                let y = u64::from(src[i + 1] as u32);
                let w = u64::from(src[i + 2] as u32);
                let h = u64::from(src[i + 3] as u32);
                let weight = src[i + 4];
                i += 5;

                let offset = x + y * table_width;
                let (width_span, height_span) = if tilted {
                    (w * (table_width + 1), h * (table_width - 1))
                } else {
                    (w, h * table_width)
                };
                for &span in [width_span, height_span].iter() {
                    if span > 0xffff {
                        return Err(CompileError::PackedOffsetOverflow {
                            stage,
                            node,
                            value: span,
                        });
                    }
                }

                words.push(offset as u32);
                words.push((width_span | height_span << 16) as u32);
                words.push(weight.to_bits());
            }

            let threshold = src[i];
            let left = src[i + 1].to_bits();
            let right = src[i + 2].to_bits();
            i += 3;

            let first_weight = words.len() - feature_count * 3 + 2;
            for k in 0..feature_count {
                let slot = first_weight + k * 3;
                let weight = f32::from_bits(words[slot]);
                words[slot] = ((f64::from(weight) / f64::from(threshold)) as f32).to_bits();
            }

            if threshold < 0.0 {
                words.push(right);
                words.push(left);
            } else {
                words.push(left);
                words.push(right);
            }
        }
        stage += 1;
    }

    Ok(CompiledClassifier { words })
}

impl CompiledClassifier {
    pub fn window_width(&self) -> u32 {
        self.words[0]
    }

    pub fn window_height(&self) -> u32 {
        self.words[1]
    }

    /// Runs the cascade on one detection window.
    ///
    /// `sat_index` is the table index of the window's top left corner, in
    /// the tables of the image this classifier was compiled for; `std_dev`
    /// is the variance-derived normalization term of that window. Tilted
    /// features read `rsat`, which may be empty for models without them.
    ///
    /// Returns `true` if every stage accepts the window.
    pub fn classify_window(
        &self,
        sat: &[u32],
        rsat: &[u32],
        sat_index: usize,
        std_dev: f64,
    ) -> bool {
        let words = &self.words;
        let end = words.len() - 1;

        let mut i = 1;
        while i < end {
            i += 1;
            let stage_threshold = f32::from_bits(words[i]);
            i += 1;
            let node_count = words[i];

            let mut stage_sum = 0.0f64;
            for _ in 0..node_count {
                i += 1;
                let tilted = words[i] != 0;
                i += 1;
                let slot_end = i + words[i] as usize;

                let mut node_sum = 0.0f64;
                if tilted {
                    while i < slot_end {
                        i += 1;
                        let f1 = sat_index + words[i] as usize;
                        i += 1;
                        let packed = words[i] as usize;
                        let f2 = f1 + (packed & 0xffff);
                        let f3 = f1 + (packed >> 16 & 0xffff);
                        i += 1;
                        node_sum += f64::from(f32::from_bits(words[i]))
                            * (f64::from(rsat[f1]) - f64::from(rsat[f2]) - f64::from(rsat[f3])
                                + f64::from(rsat[f2 + f3 - f1]));
                    }
                } else {
                    while i < slot_end {
                        i += 1;
                        let f1 = sat_index + words[i] as usize;
                        i += 1;
                        let packed = words[i] as usize;
                        let f2 = f1 + (packed & 0xffff);
                        let f3 = f1 + (packed >> 16 & 0xffff);
                        i += 1;
                        node_sum += f64::from(f32::from_bits(words[i]))
                            * (f64::from(sat[f1]) - f64::from(sat[f2]) - f64::from(sat[f3])
                                + f64::from(sat[f2 + f3 - f1]));
                    }
                }

                stage_sum += f64::from(f32::from_bits(
                    words[i + if node_sum > std_dev { 2 } else { 1 }],
                ));
                i += 2;
            }

            if stage_sum < f64::from(stage_threshold) {
                return false;
            }
        }
        true
    }
}
