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

use std::fmt;
use std::mem;

/// Axis-aligned rectangle in frame coordinates.
///
/// The fields are `f32` because detections found at a pyramid scale are
/// mapped back to frame coordinates by a fractional factor, and grouping
/// averages the rectangles of a cluster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn set_x(&mut self, x: f32) {
        self.x = x;
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn set_y(&mut self, y: f32) {
        self.y = y;
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = width;
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn set_height(&mut self, height: f32) {
        self.height = height;
    }
}

/// A detected object: its bounding rectangle plus the number of raw
/// candidate windows merged into it by grouping.
///
/// Ungrouped results carry a neighbor count of zero.
#[derive(Clone, Debug)]
pub struct Detection {
    rect: Rect,
    neighbors: u32,
}

impl Detection {
    pub fn new(rect: Rect, neighbors: u32) -> Self {
        Detection { rect, neighbors }
    }

    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn neighbors(&self) -> u32 {
        self.neighbors
    }
}

/// Read-only descriptor of an input frame: a borrowed pixel buffer plus its
/// dimensions and channel count.
pub struct ImageData<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    num_channels: u32,
}

impl<'a> ImageData<'a> {
    /// Wraps a single-channel 8-bit grayscale frame.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` is not `width * height`.
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        Self::with_channels(data, width, height, 1)
    }

    /// Wraps an interleaved 8-bit RGBA frame.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` is not `width * height * 4`.
    pub fn rgba(data: &'a [u8], width: u32, height: u32) -> Self {
        Self::with_channels(data, width, height, 4)
    }

    fn with_channels(data: &'a [u8], width: u32, height: u32, num_channels: u32) -> Self {
        let expected = width as usize * height as usize * num_channels as usize;
        if data.len() != expected {
            panic!(
                "Illegal image buffer: {} bytes for a {}x{} image with {} channel(s)",
                data.len(),
                width,
                height,
                num_channels
            );
        }
        ImageData {
            data,
            width,
            height,
            num_channels,
        }
    }

    pub fn data(&self) -> &[u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn num_channels(&self) -> u32 {
        self.num_channels
    }
}

impl fmt::Debug for ImageData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("num_channels", &self.num_channels)
            .field("len", &self.data.len())
            .finish()
    }
}

pub struct Seq<T, G>
where
    G: Fn(&T) -> T + Sized,
{
    generator: G,
    next: T,
}

impl<T, G> Seq<T, G>
where
    G: Fn(&T) -> T + Sized,
{
    pub fn new(first_element: T, generator: G) -> Self {
        Seq {
            generator,
            next: first_element,
        }
    }
}

impl<T, G> Iterator for Seq<T, G>
where
    G: Fn(&T) -> T + Sized,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let next = (self.generator)(&self.next);
        let current = mem::replace(&mut self.next, next);
        Some(current)
    }
}
