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

pub mod classifier;
mod common;
pub mod detector;
pub mod imgproc;
pub mod integral;
pub mod model;

pub use crate::classifier::{compile, CompileError, CompiledClassifier};
pub use crate::common::{Detection, ImageData, Rect};
pub use crate::detector::{detect_windows, group_rectangles, CascadeDetector};
pub use crate::model::{read_model, Model, ModelError};
