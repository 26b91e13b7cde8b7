/// Paints a bright square onto a black row-major frame.
pub fn paint_square(data: &mut [u8], frame: usize, corner_x: usize, corner_y: usize, side: usize) {
    for y in corner_y..corner_y + side {
        for x in corner_x..corner_x + side {
            data[y * frame + x] = 255;
        }
    }
}

/// A black square frame with one bright square of the given side length.
pub fn square_frame(frame: usize, corner: usize, side: usize) -> Vec<u8> {
    let mut data = vec![0u8; frame * frame];
    paint_square(&mut data, frame, corner, corner, side);
    data
}

/// The same frame expanded to opaque RGBA.
pub fn rgba_square_frame(frame: usize, corner: usize, side: usize) -> Vec<u8> {
    square_frame(frame, corner, side)
        .into_iter()
        .flat_map(|v| [v, v, v, 255])
        .collect()
}
