//! Orientation normalization via integer affine pixel transforms.
//!
//! Rewrites a buffer whose storage is rotated and/or mirrored into a canonical
//! upright, top-left-origin `Rgba8` buffer. The transform is built from the
//! orientation tag as a rotation followed by an optional horizontal mirror,
//! then inverted so every output pixel pulls exactly one source pixel.

use crate::buffer::{DecodeError, PixelBuffer, PixelFormat};
use crate::source::SourceImage;
use serde::{Deserialize, Serialize};

/// How a buffer's raw storage must be reinterpreted to appear upright.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationTag {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

impl OrientationTag {
    pub const ALL: [OrientationTag; 8] = [
        OrientationTag::Up,
        OrientationTag::Down,
        OrientationTag::Left,
        OrientationTag::Right,
        OrientationTag::UpMirrored,
        OrientationTag::DownMirrored,
        OrientationTag::LeftMirrored,
        OrientationTag::RightMirrored,
    ];

    /// Map an EXIF `Orientation` value (1–8). Unknown values read as upright.
    pub fn from_exif(value: u8) -> Self {
        match value {
            2 => OrientationTag::UpMirrored,
            3 => OrientationTag::Down,
            4 => OrientationTag::DownMirrored,
            5 => OrientationTag::LeftMirrored,
            6 => OrientationTag::Right,
            7 => OrientationTag::RightMirrored,
            8 => OrientationTag::Left,
            _ => OrientationTag::Up,
        }
    }

    pub fn to_exif(self) -> u8 {
        match self {
            OrientationTag::Up => 1,
            OrientationTag::UpMirrored => 2,
            OrientationTag::Down => 3,
            OrientationTag::DownMirrored => 4,
            OrientationTag::LeftMirrored => 5,
            OrientationTag::Right => 6,
            OrientationTag::RightMirrored => 7,
            OrientationTag::Left => 8,
        }
    }

    /// Clockwise quarter turns needed to make the storage upright.
    fn quarter_turns(self) -> u8 {
        match self {
            OrientationTag::Up | OrientationTag::UpMirrored => 0,
            OrientationTag::Right | OrientationTag::LeftMirrored => 1,
            OrientationTag::Down | OrientationTag::DownMirrored => 2,
            OrientationTag::Left | OrientationTag::RightMirrored => 3,
        }
    }

    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            OrientationTag::UpMirrored
                | OrientationTag::DownMirrored
                | OrientationTag::LeftMirrored
                | OrientationTag::RightMirrored
        )
    }

    /// True for the tags whose upright form swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        self.quarter_turns() % 2 == 1
    }
}

/// Affine map between integer pixel indices:
/// ```text
/// | dx |   | a  b | | sx |   | tx |
/// | dy | = | c  d | | sy | + | ty |
/// ```
/// The 2×2 part is always a signed permutation, so inversion is a transpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelTransform {
    m: [i64; 4],
    t: [i64; 2],
}

impl PixelTransform {
    const IDENTITY: PixelTransform = PixelTransform {
        m: [1, 0, 0, 1],
        t: [0, 0],
    };

    /// Rotate a `width` × `height` grid clockwise by `turns` quarter turns.
    fn rotation(turns: u8, width: i64, height: i64) -> Self {
        match turns % 4 {
            1 => PixelTransform { m: [0, -1, 1, 0], t: [height - 1, 0] },
            2 => PixelTransform { m: [-1, 0, 0, -1], t: [width - 1, height - 1] },
            3 => PixelTransform { m: [0, 1, -1, 0], t: [0, width - 1] },
            _ => Self::IDENTITY,
        }
    }

    /// Mirror a grid of the given width left-to-right.
    fn mirror_horizontal(width: i64) -> Self {
        PixelTransform { m: [-1, 0, 0, 1], t: [width - 1, 0] }
    }

    /// `next ∘ self`: apply `self` first, then `next`.
    fn then(self, next: PixelTransform) -> Self {
        let [a, b, c, d] = self.m;
        let [na, nb, nc, nd] = next.m;
        PixelTransform {
            m: [
                na * a + nb * c,
                na * b + nb * d,
                nc * a + nd * c,
                nc * b + nd * d,
            ],
            t: [
                na * self.t[0] + nb * self.t[1] + next.t[0],
                nc * self.t[0] + nd * self.t[1] + next.t[1],
            ],
        }
    }

    fn invert(self) -> Self {
        let [a, b, c, d] = self.m;
        // M⁻¹ = Mᵀ for signed permutations; t' = -Mᵀ t
        let m = [a, c, b, d];
        PixelTransform {
            m,
            t: [
                -(m[0] * self.t[0] + m[1] * self.t[1]),
                -(m[2] * self.t[0] + m[3] * self.t[1]),
            ],
        }
    }

    fn apply(&self, x: i64, y: i64) -> (i64, i64) {
        (
            self.m[0] * x + self.m[1] * y + self.t[0],
            self.m[2] * x + self.m[3] * y + self.t[1],
        )
    }
}

/// Build the storage→upright transform for `tag` and the upright dimensions.
fn upright_transform(tag: OrientationTag, width: u32, height: u32) -> (PixelTransform, u32, u32) {
    let (w, h) = (width as i64, height as i64);
    let rotation = PixelTransform::rotation(tag.quarter_turns(), w, h);
    let (out_w, out_h) = if tag.swaps_dimensions() {
        (height, width)
    } else {
        (width, height)
    };
    let transform = if tag.is_mirrored() {
        rotation.then(PixelTransform::mirror_horizontal(out_w as i64))
    } else {
        rotation
    };
    (transform, out_w, out_h)
}

/// Decode an acquired image and make it upright.
///
/// Fails with [`DecodeError`] when the source pixels cannot be read as a valid
/// image. The failure is scoped to this image.
pub fn normalize(source: SourceImage) -> Result<PixelBuffer, DecodeError> {
    let (buffer, tag) = source.decode()?;
    Ok(normalize_buffer(buffer, tag))
}

/// Make an already-decoded buffer upright.
///
/// An `Up` buffer is returned as-is without allocating. Every other tag
/// renders into a fresh `Rgba8` canvas regardless of the source format.
pub fn normalize_buffer(buffer: PixelBuffer, tag: OrientationTag) -> PixelBuffer {
    if tag == OrientationTag::Up {
        return buffer;
    }

    let (forward, out_w, out_h) = upright_transform(tag, buffer.width(), buffer.height());
    let inverse = forward.invert();

    tracing::debug!(
        ?tag,
        src_width = buffer.width(),
        src_height = buffer.height(),
        out_width = out_w,
        out_height = out_h,
        "normalizing orientation"
    );

    let mut data = vec![0u8; out_w as usize * out_h as usize * 4];
    for (dy, row) in data.chunks_exact_mut(out_w as usize * 4).enumerate() {
        for (dx, px) in row.chunks_exact_mut(4).enumerate() {
            let (sx, sy) = inverse.apply(dx as i64, dy as i64);
            debug_assert!(sx >= 0 && sy >= 0, "inverse transform left the source grid");
            px.copy_from_slice(&buffer.pixel_rgba(sx as u32, sy as u32));
        }
    }

    PixelBuffer::assemble(out_w, out_h, PixelFormat::Rgba8, buffer.color_space(), data)
}
