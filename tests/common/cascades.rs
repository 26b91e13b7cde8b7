use rustdetect::Model;

/// A 20x20 single-stage classifier that accepts uniformly bright windows
/// and rejects everything else, partial overlaps included.
pub fn brightness_model() -> Model {
    Model::from_values(vec![
        20.0, 20.0, //
        0.0, 1.0, //
        0.0, 1.0, //
        0.0, 0.0, 20.0, 20.0, 1.0, //
        5.0, -1.0, 1.0,
    ])
    .unwrap()
}

/// The brightness classifier with an extra tilted node whose leaves are
/// both zero, so the rotated table is read without affecting the outcome.
pub fn brightness_model_with_tilted_node() -> Model {
    Model::from_values(vec![
        20.0, 20.0, //
        0.0, 2.0, //
        0.0, 1.0, //
        0.0, 0.0, 20.0, 20.0, 1.0, //
        5.0, -1.0, 1.0, //
        1.0, 1.0, //
        9.0, 0.0, 5.0, 5.0, 1.0, //
        1000000.0, 0.0, 0.0,
    ])
    .unwrap()
}
