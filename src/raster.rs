use std::sync::Arc;
use std::time::SystemTime;

use image::{Rgba, RgbaImage};
use uuid::Uuid;

/// Unique identity of a raster. Two rasters with identical pixels but
/// different origins are still different rasters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterId(pub Uuid);

impl RasterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RasterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RasterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable 8-bit RGBA pixel buffer.
///
/// Cloning is cheap (the pixels are shared). Nothing hands out a mutable
/// reference to the pixels: every edit produces a new `Raster`.
#[derive(Clone)]
pub struct Raster {
    id: RasterId,
    created: SystemTime,
    pixels: Arc<RgbaImage>,
}

impl Raster {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            id: RasterId::new(),
            created: SystemTime::now(),
            pixels: Arc::new(pixels),
        }
    }

    /// Build from a raw RGBA byte buffer. Returns `None` when the buffer
    /// length does not match `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(Self::from_rgba)
    }

    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::from_rgba(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    pub fn id(&self) -> RasterId {
        self.id
    }

    pub fn created(&self) -> SystemTime {
        self.created
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixels.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Copy of the pixels, for producing a derived raster.
    pub fn to_rgba_image(&self) -> RgbaImage {
        self.pixels.as_ref().clone()
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }

    /// Byte-for-byte pixel equality, ignoring identity.
    pub fn same_pixels(&self, other: &Raster) -> bool {
        self.dimensions() == other.dimensions() && self.pixels.as_raw() == other.pixels.as_raw()
    }
}

impl PartialEq for Raster {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Raster {}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("id", &self.id)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_identity() {
        let a = Raster::filled(2, 2, [1, 2, 3, 255]);
        let b = Raster::filled(2, 2, [1, 2, 3, 255]);
        assert_ne!(a, b);
        assert!(a.same_pixels(&b));
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn from_raw_rejects_short_buffer() {
        assert!(Raster::from_raw(2, 2, vec![0; 15]).is_none());
        let r = Raster::from_raw(2, 1, vec![9; 8]).unwrap();
        assert_eq!(r.pixel(1, 0), Some([9, 9, 9, 9]));
        assert_eq!(r.pixel(2, 0), None);
        assert_eq!(r.memory_bytes(), 8);
    }
}
