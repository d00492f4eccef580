//! Parameter types for image operations.
//!
//! These describe *what* to write, not *how*. The pipeline decides the
//! bounds, quality and rotation for each derivative and hands them to an
//! [`ImageBackend`](super::backend::ImageBackend), which does the pixel work.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Bounds`]: A width × height box a derivative must fit inside.
//! - [`Rotation`]: Counter-clockwise correction derived from an EXIF orientation code.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Target box for a derivative image. Output never exceeds either edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square box, as produced by the `thumb: N` gallery option.
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }
}

/// Counter-clockwise rotation applied before writing derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Rotation {
    /// Map an EXIF orientation code to the correction it needs.
    ///
    /// Only the pure rotations are handled: `8` → 90°, `3` → 180°,
    /// `6` → 270°. Mirrored orientations and unknown values are left as is.
    pub fn from_orientation(code: &str) -> Self {
        match code.trim() {
            "8" => Rotation::Ccw90,
            "3" => Rotation::Ccw180,
            "6" => Rotation::Ccw270,
            _ => Rotation::None,
        }
    }

    /// Whether the rotation swaps width and height.
    pub fn transposes(self) -> bool {
        matches!(self, Rotation::Ccw90 | Rotation::Ccw270)
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Ccw90 => 90,
            Rotation::Ccw180 => 180,
            Rotation::Ccw270 => 270,
        }
    }
}
