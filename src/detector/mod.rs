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

use log::debug;

use crate::classifier::{compile, CompileError, CompiledClassifier};
use crate::common::{Detection, ImageData, Rect, Seq};
use crate::imgproc::{gradient_magnitude, rescale, rgba_to_grayscale};
use crate::integral::{compute_rotated_sat, compute_sat, compute_squared_sat};
use crate::model::Model;

/// Windows whose mean edge magnitude falls outside this band are skipped
/// when edge pruning is enabled.
const EDGE_DENSITY_BAND: (f64, f64) = (60.0, 200.0);

/// Fraction of a rectangle's extent by which a nested rectangle may protrude
/// and still count as contained during grouping.
const CONTAINMENT_TOLERANCE: f32 = 0.2;

/// Runs a compiled classifier over every detection window of an image,
/// stepping by `step` pixels in both directions.
///
/// All tables must have been computed for the same `width` by `height`
/// image the classifier was compiled for; `rsat` may be empty for models
/// without tilted features. When `canny_sat` is given, windows whose mean
/// edge magnitude falls outside `(60, 200)` are skipped without evaluating
/// the cascade.
///
/// Accepted windows are returned in scan order: left to right, top to
/// bottom within each column.
///
/// # Panics
///
/// Panics if `step` is zero.
pub fn detect_windows(
    sat: &[u32],
    rsat: &[u32],
    squared_sat: &[u32],
    canny_sat: Option<&[u32]>,
    width: u32,
    height: u32,
    step: u32,
    classifier: &CompiledClassifier,
) -> Vec<Rect> {
    if step == 0 {
        panic!("Illegal step size: {}", step);
    }
    scan_windows(
        sat,
        rsat,
        squared_sat,
        canny_sat,
        width,
        height,
        step,
        classifier,
        EDGE_DENSITY_BAND,
    )
}

fn scan_windows(
    sat: &[u32],
    rsat: &[u32],
    squared_sat: &[u32],
    canny_sat: Option<&[u32]>,
    width: u32,
    height: u32,
    step: u32,
    classifier: &CompiledClassifier,
    band: (f64, f64),
) -> Vec<Rect> {
    let table_width = width + 1;
    let table_height = height + 1;
    let window_width = classifier.window_width();
    let window_height = classifier.window_height();
    if window_width >= table_width || window_height >= table_height {
        return vec![];
    }

    let window_height_times_width = (window_height * table_width) as usize;
    let area = f64::from(window_width) * f64::from(window_height);
    let inverse_area = 1.0 / area;
    let row_step = (table_width * step) as usize;
    let max_x = table_width - window_width - 1;
    let max_y = table_height - window_height - 1;
    let mut rects = vec![];

    for x in Seq::new(0u32, move |n| n + step).take_while(move |n| *n <= max_x) {
        let mut sat_index = x as usize;
        for y in Seq::new(0u32, move |n| n + step).take_while(move |n| *n <= max_y) {
            let tl = sat_index;
            let tr = sat_index + window_width as usize;
            let bl = sat_index + window_height_times_width;
            let br = bl + window_width as usize;

            if let Some(canny_sat) = canny_sat {
                let edge_density = (f64::from(canny_sat[tl]) - f64::from(canny_sat[tr])
                    - f64::from(canny_sat[bl])
                    + f64::from(canny_sat[br]))
                    * inverse_area;
                if edge_density < band.0 || edge_density > band.1 {
                    sat_index += row_step;
                    continue;
                }
            }

            let mean =
                f64::from(sat[tl]) - f64::from(sat[tr]) - f64::from(sat[bl]) + f64::from(sat[br]);
            let variance = (f64::from(squared_sat[tl]) - f64::from(squared_sat[tr])
                - f64::from(squared_sat[bl])
                + f64::from(squared_sat[br]))
                * area
                - mean * mean;
            let std_dev = if variance > 1.0 { variance.sqrt() } else { 1.0 };

            if classifier.classify_window(sat, rsat, sat_index, std_dev) {
                rects.push(Rect::new(
                    x as f32,
                    y as f32,
                    window_width as f32,
                    window_height as f32,
                ));
            }
            sat_index += row_step;
        }
    }
    rects
}

/// Groups raw detection windows by proximity.
///
/// Rectangles are partitioned into similarity classes; two rectangles are
/// similar when all four of their corner distances stay within `confluence`
/// times their combined smaller extents. Each class with at least
/// `min_neighbors` members (zero keeps every class) yields one mean
/// rectangle, and mean rectangles nested inside a larger surviving mean are
/// discarded. Mutually nested means discard each other.
pub fn group_rectangles(rects: &[Rect], min_neighbors: u32, confluence: f32) -> Vec<Detection> {
    let mut labels = vec![0usize; rects.len()];
    let mut num_classes = 0;

    for i in 0..rects.len() {
        let mut found = false;
        for j in 0..i {
            let delta = confluence
                * (rects[i].width().min(rects[j].width())
                    + rects[i].height().min(rects[j].height()));
            if (rects[i].x() - rects[j].x()).abs() <= delta
                && (rects[i].y() - rects[j].y()).abs() <= delta
                && (rects[i].x() + rects[i].width() - rects[j].x() - rects[j].width()).abs()
                    <= delta
                && (rects[i].y() + rects[i].height() - rects[j].y() - rects[j].height()).abs()
                    <= delta
            {
                labels[i] = labels[j];
                found = true;
                break;
            }
        }
        if !found {
            labels[i] = num_classes;
            num_classes += 1;
        }
    }

    let mut sums = vec![[0.0f64; 4]; num_classes];
    let mut counts = vec![0u32; num_classes];
    for (rect, &label) in rects.iter().zip(labels.iter()) {
        sums[label][0] += f64::from(rect.x());
        sums[label][1] += f64::from(rect.y());
        sums[label][2] += f64::from(rect.width());
        sums[label][3] += f64::from(rect.height());
        counts[label] += 1;
    }

    let mut groups = Vec::new();
    for (sum, &count) in sums.iter().zip(counts.iter()) {
        if count >= min_neighbors {
            let n = f64::from(count);
            groups.push(Detection::new(
                Rect::new(
                    (sum[0] / n) as f32,
                    (sum[1] / n) as f32,
                    (sum[2] / n) as f32,
                    (sum[3] / n) as f32,
                ),
                count,
            ));
        }
    }

    let mut filtered = Vec::new();
    for (i, candidate) in groups.iter().enumerate() {
        let r1 = candidate.rect();
        let contained = groups.iter().enumerate().any(|(j, other)| {
            if i == j {
                return false;
            }
            let r2 = other.rect();
            let dx = r2.width() * CONTAINMENT_TOLERANCE;
            let dy = r2.height() * CONTAINMENT_TOLERANCE;
            r1.x() >= r2.x() - dx
                && r1.y() >= r2.y() - dy
                && r1.x() + r1.width() <= r2.x() + r2.width() + dx
                && r1.y() + r1.height() <= r2.y() + r2.height() + dy
        });
        if !contained {
            filtered.push(candidate.clone());
        }
    }
    filtered
}

fn is_legal_image(image: &ImageData, width: u32, height: u32) -> bool {
    (image.num_channels() == 1 || image.num_channels() == 4)
        && image.width() == width
        && image.height() == height
}

/// A multi-scale sliding window detector for a fixed frame size.
///
/// The detector compiles its model once per scale up front and keeps all
/// per-scale buffers alive, so repeated [`detect`](CascadeDetector::detect)
/// calls on a video stream allocate next to nothing.
///
/// # Examples
///
/// ```no_run
/// use rustdetect::{read_model, CascadeDetector, ImageData};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let file = std::fs::File::open("face.bin")?;
/// let model = read_model(file)?;
///
/// let mut detector = CascadeDetector::new(&model, 640, 480, 1.2)?;
/// detector.set_min_neighbors(2);
///
/// let frame = vec![0u8; 640 * 480 * 4];
/// let faces = detector.detect(&ImageData::rgba(&frame, 640, 480));
/// for face in faces {
///     println!("{:?}", face.rect());
/// }
/// # Ok(())
/// # }
/// ```
pub struct CascadeDetector {
    width: u32,
    height: u32,
    has_tilted: bool,
    step_size: u32,
    min_neighbors: u32,
    confluence: f32,
    canny_pruning: bool,
    edge_density_band: (f64, f64),
    gray: Vec<u32>,
    scales: Vec<ScaleData>,
}

struct ScaleData {
    scale: f32,
    width: u32,
    height: u32,
    classifier: CompiledClassifier,
    scaled_gray: Vec<u32>,
    sat: Vec<u32>,
    squared_sat: Vec<u32>,
    rotated_sat: Vec<u32>,
    edges: Vec<u32>,
    edge_sat: Vec<u32>,
}

impl CascadeDetector {
    /// Builds a detector for `width` by `height` frames, compiling `model`
    /// for every pyramid scale between the frame size and the model window
    /// size.
    ///
    /// # Panics
    ///
    /// Panics if `scale_factor` is not greater than one, or if a frame
    /// dimension is zero.
    pub fn new(
        model: &Model,
        width: u32,
        height: u32,
        scale_factor: f32,
    ) -> Result<CascadeDetector, CompileError> {
        if !(scale_factor > 1.0) {
            panic!("Illegal scale factor: {}", scale_factor);
        }
        if width == 0 || height == 0 {
            panic!("Illegal detector dimensions: {}x{}", width, height);
        }

        let ratio = (f64::from(width) / f64::from(model.window_width()))
            .min(f64::from(height) / f64::from(model.window_height()));
        let num_scales = (ratio.ln() / f64::from(scale_factor).ln()) as i32;

        let has_tilted = model.has_tilted_features();
        let mut scales = Vec::new();
        for scale in Seq::new(1.0f32, |s| s * scale_factor).take(num_scales.max(0) as usize) {
            // The scaled dimensions must agree with what rescaling to this
            // scale will produce, hence the f64 arithmetic.
            let scaled_width = (f64::from(width) / f64::from(scale)) as u32;
            let scaled_height = (f64::from(height) / f64::from(scale)) as u32;
            let classifier = compile(model, scaled_width, scaled_height)?;
            let image_len = (scaled_width * scaled_height) as usize;
            let table_len = ((scaled_width + 1) * (scaled_height + 1)) as usize;
            scales.push(ScaleData {
                scale,
                width: scaled_width,
                height: scaled_height,
                classifier,
                scaled_gray: Vec::with_capacity(image_len),
                sat: Vec::with_capacity(table_len),
                squared_sat: Vec::with_capacity(table_len),
                rotated_sat: Vec::with_capacity(if has_tilted { table_len } else { 0 }),
                edges: Vec::new(),
                edge_sat: Vec::new(),
            });
        }

        debug!(
            "detector for {}x{} frames: {} scale(s) at factor {}",
            width,
            height,
            scales.len(),
            scale_factor
        );

        Ok(CascadeDetector {
            width,
            height,
            has_tilted,
            step_size: 1,
            min_neighbors: 0,
            confluence: 1.0,
            canny_pruning: false,
            edge_density_band: EDGE_DENSITY_BAND,
            gray: Vec::new(),
            scales,
        })
    }

    /// Detects objects in a frame, which must match the detector dimensions
    /// and be either grayscale or RGBA.
    ///
    /// Returns detections ordered by neighbor count, most corroborated
    /// first. Without a minimum neighbor count every accepted window is
    /// returned ungrouped, with a neighbor count of zero.
    pub fn detect(&mut self, image: &ImageData) -> Vec<Detection> {
        if !is_legal_image(image, self.width, self.height) {
            panic!("Illegal image: {:?}", image);
        }

        match image.num_channels() {
            4 => rgba_to_grayscale(image.data(), &mut self.gray),
            _ => {
                self.gray.clear();
                self.gray.extend(image.data().iter().map(|&v| u32::from(v)));
            }
        }

        let mut rects = Vec::new();
        for scale_rects in self.process_scales() {
            rects.extend(scale_rects);
        }
        debug!("{} candidate window(s) before grouping", rects.len());

        let mut detections = if self.min_neighbors > 0 {
            group_rectangles(&rects, self.min_neighbors, self.confluence)
        } else {
            rects
                .into_iter()
                .map(|rect| Detection::new(rect, 0))
                .collect()
        };
        detections.sort_by(|a, b| b.neighbors().cmp(&a.neighbors()));
        detections
    }

    #[cfg(feature = "rayon")]
    fn process_scales(&mut self) -> Vec<Vec<Rect>> {
        use rayon::prelude::*;

        let gray = &self.gray;
        let frame_width = self.width;
        let frame_height = self.height;
        let step = self.step_size;
        let has_tilted = self.has_tilted;
        let canny_pruning = self.canny_pruning;
        let band = self.edge_density_band;

        self.scales
            .par_iter_mut()
            .map(|scale| {
                scale.process(
                    gray,
                    frame_width,
                    frame_height,
                    step,
                    has_tilted,
                    canny_pruning,
                    band,
                )
            })
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn process_scales(&mut self) -> Vec<Vec<Rect>> {
        let gray = &self.gray;
        let frame_width = self.width;
        let frame_height = self.height;
        let step = self.step_size;
        let has_tilted = self.has_tilted;
        let canny_pruning = self.canny_pruning;
        let band = self.edge_density_band;

        self.scales
            .iter_mut()
            .map(|scale| {
                scale.process(
                    gray,
                    frame_width,
                    frame_height,
                    step,
                    has_tilted,
                    canny_pruning,
                    band,
                )
            })
            .collect()
    }

    /// Sets the scan step in pixels. Larger steps trade recall for speed.
    pub fn set_step_size(&mut self, step_size: u32) {
        if step_size == 0 {
            panic!("Illegal step size: {}", step_size);
        }
        self.step_size = step_size;
    }

    /// Sets how many windows a similarity class needs before it is reported.
    /// Zero disables grouping altogether.
    pub fn set_min_neighbors(&mut self, min_neighbors: u32) {
        self.min_neighbors = min_neighbors;
    }

    /// Sets the relative corner distance within which windows are grouped.
    pub fn set_confluence(&mut self, confluence: f32) {
        if !(confluence > 0.0) {
            panic!("Illegal confluence: {}", confluence);
        }
        self.confluence = confluence;
    }

    /// Enables skipping windows with implausible edge density before the
    /// cascade runs. Costs one gradient pass per scale.
    pub fn set_canny_pruning(&mut self, enabled: bool) {
        self.canny_pruning = enabled;
    }

    /// Sets the accepted mean edge magnitude band for pruned windows.
    pub fn set_edge_density_band(&mut self, low: f64, high: f64) {
        if !(low >= 0.0 && high > low) {
            panic!("Illegal edge density band: ({}, {})", low, high);
        }
        self.edge_density_band = (low, high);
    }
}

impl ScaleData {
    fn process(
        &mut self,
        gray: &[u32],
        frame_width: u32,
        frame_height: u32,
        step: u32,
        has_tilted: bool,
        canny_pruning: bool,
        band: (f64, f64),
    ) -> Vec<Rect> {
        let width = self.width as usize;
        let height = self.height as usize;

        if self.scale == 1.0 {
            self.scaled_gray.clear();
            self.scaled_gray.extend_from_slice(gray);
        } else {
            rescale(
                gray,
                frame_width as usize,
                frame_height as usize,
                self.scale,
                &mut self.scaled_gray,
            );
        }

        compute_sat(&self.scaled_gray, width, height, &mut self.sat);
        compute_squared_sat(&self.scaled_gray, width, height, &mut self.squared_sat);
        if has_tilted {
            compute_rotated_sat(&self.scaled_gray, width, height, &mut self.rotated_sat);
        }

        let canny_sat = if canny_pruning {
            gradient_magnitude(&self.scaled_gray, width, height, &mut self.edges);
            compute_sat(&self.edges, width, height, &mut self.edge_sat);
            Some(&self.edge_sat[..])
        } else {
            None
        };

        let mut rects = scan_windows(
            &self.sat,
            &self.rotated_sat,
            &self.squared_sat,
            canny_sat,
            self.width,
            self.height,
            step,
            &self.classifier,
            band,
        );

        let scale_x = frame_width as f32 / self.width as f32;
        let scale_y = frame_height as f32 / self.height as f32;
        for rect in rects.iter_mut() {
            rect.set_x(rect.x() * scale_x);
            rect.set_y(rect.y() * scale_y);
            rect.set_width(rect.width() * scale_x);
            rect.set_height(rect.height() * scale_y);
        }

        debug!("scale {}: {} candidate window(s)", self.scale, rects.len());
        rects
    }
}
