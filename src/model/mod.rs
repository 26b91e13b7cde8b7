//! Parsing and validation of stump-based cascade classifier models.

use std::error::Error;
use std::fmt;
use std::io;
use std::io::{Cursor, Read};

use byteorder::{ReadBytesExt, LittleEndian};
use log::debug;

/// A validation or I/O failure while reading a classifier model.
#[derive(Debug)]
pub enum ModelError {
    /// The value stream ended in the middle of a structural element.
    UnexpectedEnd { offset: usize },
    /// A structural field holds a value outside its legal range.
    InvalidCount {
        field: &'static str,
        value: f32,
        offset: usize,
    },
    /// A feature rectangle reaches outside the detection window.
    FeatureOutsideWindow { stage: usize, node: usize },
    Io(io::Error),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelError::UnexpectedEnd { offset } => {
                write!(f, "classifier data ends unexpectedly at value {}", offset)
            }
            ModelError::InvalidCount {
                field,
                value,
                offset,
            } => write!(f, "illegal {} {} at value {}", field, value, offset),
            ModelError::FeatureOutsideWindow { stage, node } => write!(
                f,
                "feature of stage {}, node {} reaches outside the detection window",
                stage, node
            ),
            ModelError::Io(e) => write!(f, "failed to read classifier data: {}", e),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ModelError {
    fn from(e: io::Error) -> Self {
        ModelError::Io(e)
    }
}

/// A validated cascade classifier in the portable flat value layout:
///
/// ```text
/// [window width, window height, stage, stage, ...]
/// stage   = [stage threshold, node count, node, node, ...]
/// node    = [tilted, feature count, feature * count, node threshold,
///            left value, right value]
/// feature = [x, y, width, height, weight]
/// ```
///
/// There is no stage count field; stages extend to the end of the stream.
/// Every count, flag and feature rectangle has been range-checked, so
/// downstream consumers can walk the values without further bounds tests.
#[derive(Clone)]
pub struct Model {
    values: Vec<f32>,
    window_width: u32,
    window_height: u32,
    num_stages: usize,
    has_tilted_features: bool,
}

impl Model {
    /// Validates a flat value array and wraps it as a model.
    pub fn from_values(values: Vec<f32>) -> Result<Model, ModelError> {
        let mut cursor = ValueCursor {
            values: &values,
            pos: 0,
        };
        let window_width = cursor.read_count("window width", u32::MAX as usize)? as u32;
        let window_height = cursor.read_count("window height", u32::MAX as usize)? as u32;

        let mut num_stages = 0;
        let mut has_tilted_features = false;

        while !cursor.at_end() {
            cursor.read()?; // stage threshold
            let node_count = cursor.read_count("node count", usize::MAX)?;

            for node in 0..node_count {
                let tilted = cursor.read_tilted_flag()?;
                has_tilted_features |= tilted;

                let feature_count = cursor.read_count("feature count", 3)?;
                for _ in 0..feature_count {
                    let x = u64::from(cursor.read_geometry()?);
                    let y = u64::from(cursor.read_geometry()?);
                    let w = u64::from(cursor.read_geometry()?);
                    let h = u64::from(cursor.read_geometry()?);
                    cursor.read()?; // feature weight

                    let inside = if tilted {
                        x >= h
                            && x + w <= u64::from(window_width)
                            && y + w + h <= u64::from(window_height)
                    } else {
                        x + w <= u64::from(window_width) && y + h <= u64::from(window_height)
                    };
                    if !inside {
                        return Err(ModelError::FeatureOutsideWindow {
                            stage: num_stages,
                            node,
                        });
                    }
                }

                cursor.read()?; // node threshold
                cursor.read()?; // left value
                cursor.read()?; // right value
            }
            num_stages += 1;
        }

        if num_stages == 0 {
            return Err(ModelError::UnexpectedEnd { offset: cursor.pos });
        }

        debug!(
            "parsed classifier: {}x{} window, {} stage(s), tilted features: {}",
            window_width, window_height, num_stages, has_tilted_features
        );

        Ok(Model {
            values,
            window_width,
            window_height,
            num_stages,
            has_tilted_features,
        })
    }

    /// Returns a model that detects horizontally mirrored instances of the
    /// objects this model was trained on, for example the opposite hand.
    /// Mirroring twice restores the original model.
    pub fn mirrored(&self) -> Model {
        let mut values = self.values.clone();

        // The walk cannot fail on validated values.
        let mut i = 2;
        while i < values.len() {
            i += 1; // stage threshold
            let node_count = values[i] as usize;
            i += 1;
            for _ in 0..node_count {
                let tilted = values[i] != 0.0;
                i += 1;
                let feature_count = values[i] as usize;
                i += 1;
                for _ in 0..feature_count {
                    let x = values[i] as u32;
                    let w = values[i + 2] as u32;
                    let h = values[i + 3] as u32;
                    if tilted {
                        values[i] = (self.window_width - x) as f32;
                        values[i + 2] = h as f32;
                        values[i + 3] = w as f32;
                    } else {
                        values[i] = (self.window_width - x - w) as f32;
                    }
                    i += 5;
                }
                i += 3; // node threshold and leaf values
            }
        }

        Model {
            values,
            window_width: self.window_width,
            window_height: self.window_height,
            num_stages: self.num_stages,
            has_tilted_features: self.has_tilted_features,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn window_width(&self) -> u32 {
        self.window_width
    }

    pub fn window_height(&self) -> u32 {
        self.window_height
    }

    pub fn num_stages(&self) -> usize {
        self.num_stages
    }

    pub fn has_tilted_features(&self) -> bool {
        self.has_tilted_features
    }
}

/// Reads a model stored as consecutive little-endian 32-bit floats.
pub fn read_model<R: Read>(mut reader: R) -> Result<Model, ModelError> {
    let mut buf = vec![];
    reader.read_to_end(&mut buf)?;
    if buf.len() % 4 != 0 {
        return Err(ModelError::UnexpectedEnd {
            offset: buf.len() / 4,
        });
    }

    let mut values = Vec::with_capacity(buf.len() / 4);
    let mut cursor = Cursor::new(buf);
    for _ in 0..values.capacity() {
        values.push(cursor.read_f32::<LittleEndian>()?);
    }
    Model::from_values(values)
}

struct ValueCursor<'a> {
    values: &'a [f32],
    pos: usize,
}

impl<'a> ValueCursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.values.len()
    }

    fn read(&mut self) -> Result<f32, ModelError> {
        match self.values.get(self.pos) {
            Some(&v) => {
                self.pos += 1;
                Ok(v)
            }
            None => Err(ModelError::UnexpectedEnd { offset: self.pos }),
        }
    }

    // The limits are compared in f64; an f32 comparison would round the
    // limit itself and wave through the first out-of-range value.
    fn read_count(&mut self, field: &'static str, max: usize) -> Result<usize, ModelError> {
        let offset = self.pos;
        let v = self.read()?;
        if v >= 1.0 && v.fract() == 0.0 && f64::from(v) <= max as f64 {
            Ok(v as usize)
        } else {
            Err(ModelError::InvalidCount {
                field,
                value: v,
                offset,
            })
        }
    }

    fn read_geometry(&mut self) -> Result<u32, ModelError> {
        let offset = self.pos;
        let v = self.read()?;
        if v >= 0.0 && v.fract() == 0.0 && f64::from(v) <= f64::from(u32::MAX) {
            Ok(v as u32)
        } else {
            Err(ModelError::InvalidCount {
                field: "feature geometry",
                value: v,
                offset,
            })
        }
    }

    fn read_tilted_flag(&mut self) -> Result<bool, ModelError> {
        let offset = self.pos;
        let v = self.read()?;
        if v == 0.0 {
            Ok(false)
        } else if v == 1.0 {
            Ok(true)
        } else {
            Err(ModelError::InvalidCount {
                field: "tilted flag",
                value: v,
                offset,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A 20x20 window with two stages, one of them carrying a tilted node.
    fn sample_values() -> Vec<f32> {
        vec![
            20.0, 20.0, // window
            // stage 0
            0.5, 1.0, // threshold, node count
            0.0, 2.0, // upright, two features
            0.0, 0.0, 10.0, 20.0, 1.0, // feature
            10.0, 0.0, 10.0, 20.0, -1.0, // feature
            0.1, -0.8, 0.9, // node threshold, left, right
            // stage 1
            -1.0, 2.0, // threshold, node count
            1.0, 1.0, // tilted, one feature
            5.0, 2.0, 4.0, 3.0, 2.5, // feature
            0.2, 0.3, -0.4, // node threshold, left, right
            0.0, 1.0, // upright, one feature
            2.0, 2.0, 16.0, 16.0, 3.0, // feature
            -0.5, 0.1, -0.2, // node threshold, left, right
        ]
    }

    #[test]
    fn test_parses_valid_model() {
        let model = Model::from_values(sample_values()).unwrap();
        assert_eq!(20, model.window_width());
        assert_eq!(20, model.window_height());
        assert_eq!(2, model.num_stages());
        assert!(model.has_tilted_features());
    }

    #[test]
    fn test_upright_only_model_has_no_tilted_features() {
        let values = vec![
            8.0, 8.0, //
            0.5, 1.0, //
            0.0, 1.0, //
            0.0, 0.0, 8.0, 8.0, 1.0, //
            0.1, -1.0, 1.0,
        ];
        let model = Model::from_values(values).unwrap();
        assert_eq!(1, model.num_stages());
        assert!(!model.has_tilted_features());
    }

    #[test]
    fn test_rejects_truncated_values() {
        let mut values = sample_values();
        values.truncate(40);
        match Model::from_values(values) {
            Err(ModelError::UnexpectedEnd { offset }) => assert_eq!(40, offset),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_rejects_empty_cascade() {
        match Model::from_values(vec![20.0, 20.0]) {
            Err(ModelError::UnexpectedEnd { offset }) => assert_eq!(2, offset),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_rejects_illegal_feature_count() {
        let mut values = sample_values();
        values[5] = 4.0;
        match Model::from_values(values) {
            Err(ModelError::InvalidCount { field, value, .. }) => {
                assert_eq!("feature count", field);
                assert_eq!(4.0, value);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_rejects_illegal_tilted_flag() {
        let mut values = sample_values();
        values[4] = 0.5;
        match Model::from_values(values) {
            Err(ModelError::InvalidCount { field, .. }) => assert_eq!("tilted flag", field),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_rejects_feature_outside_window() {
        let mut values = sample_values();
        values[6] = 15.0; // x + width = 25 > 20
        match Model::from_values(values) {
            Err(ModelError::FeatureOutsideWindow { stage, node }) => {
                assert_eq!(0, stage);
                assert_eq!(0, node);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_read_model_round_trip() {
        let values = sample_values();
        let mut bytes = vec![];
        for v in &values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let model = read_model(Cursor::new(bytes)).unwrap();
        assert_eq!(values, model.values());
    }

    #[test]
    fn test_read_model_rejects_odd_length() {
        let mut bytes = vec![];
        for v in &sample_values() {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(0);
        match read_model(Cursor::new(bytes)) {
            Err(ModelError::UnexpectedEnd { offset }) => assert_eq!(41, offset),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_mirror_flips_feature_coordinates() {
        let model = Model::from_values(sample_values()).unwrap();
        let mirrored = model.mirrored();

        // Upright features reflect around the window center.
        assert_eq!(10.0, mirrored.values()[6]);
        assert_eq!(0.0, mirrored.values()[11]);
        // Tilted features move their anchor and swap extents.
        assert_eq!(15.0, mirrored.values()[23]);
        assert_eq!(3.0, mirrored.values()[25]);
        assert_eq!(4.0, mirrored.values()[26]);
    }

    #[test]
    fn test_mirror_twice_is_identity() {
        let model = Model::from_values(sample_values()).unwrap();
        assert_eq!(model.values(), model.mirrored().mirrored().values());
    }
}
