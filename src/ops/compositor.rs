// ============================================================================
// COMPOSITOR: flatten overlays onto a base raster, rasterize crop selections
// ============================================================================
//
// Both operations are pure: they read a base raster and return a new one.
// Row work is split across the rayon pool; results do not depend on the
// split, so output is bit-identical between call sites.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::components::layers::{paint_order, Layer};
use crate::error::{EditError, EditResult};
use crate::geometry::{rect_to_natural, Rect, Scale};
use crate::ops::text::{OverlayRenderer, Sprite};
use crate::raster::Raster;

/// Paint `base` at its natural resolution, then every visible layer in
/// paint order. Invisible layers are skipped, never painted at zero alpha.
///
/// Used for both "merge layers into history" and export.
pub fn flatten(base: &Raster, layers: &[Layer], renderer: &dyn OverlayRenderer) -> EditResult<Raster> {
    let (width, height) = base.dimensions();
    if width == 0 || height == 0 {
        return Err(EditError::RenderTargetUnavailable(format!(
            "cannot flatten onto a {}x{} raster",
            width, height
        )));
    }

    let mut out = base.to_rgba_image();
    for layer in paint_order(layers).filter(|l| l.visible) {
        let sprite = renderer.render(layer)?;
        if sprite.is_empty() {
            continue;
        }
        let origin_x = layer.position.x.round() as i32 + sprite.off_x;
        let origin_y = layer.position.y.round() as i32 + sprite.off_y;
        blit_sprite(&mut out, &sprite, origin_x, origin_y, layer.opacity);
    }

    log::debug!("Flattened {} layer(s) onto {}x{} raster", layers.len(), width, height);
    Ok(Raster::from_rgba(out))
}

/// Source-over blend of `sprite` into `dst` at (`dst_x`, `dst_y`), with
/// `opacity` as a global alpha multiplier. Pixels outside `dst` are clipped.
pub fn blit_sprite(dst: &mut RgbaImage, sprite: &Sprite, dst_x: i32, dst_y: i32, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }
    let (dw, dh) = (dst.width() as i32, dst.height() as i32);
    let (sw, sh) = (sprite.pixels.width() as i32, sprite.pixels.height() as i32);

    let x0 = dst_x.max(0);
    let y0 = dst_y.max(0);
    let x1 = (dst_x + sw).min(dw);
    let y1 = (dst_y + sh).min(dh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let stride = dw as usize * 4;
    let src = &sprite.pixels;
    dst.par_chunks_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(y, row)| {
            let sy = (y as i32 - dst_y) as u32;
            for x in x0..x1 {
                let top = *src.get_pixel((x - dst_x) as u32, sy);
                let pi = x as usize * 4;
                let base = Rgba([row[pi], row[pi + 1], row[pi + 2], row[pi + 3]]);
                let blended = blend_over(base, top, opacity);
                row[pi..pi + 4].copy_from_slice(&blended.0);
            }
        });
}

/// Normal (source-over) blend for straight-alpha pixels.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel, nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: full opacity, fully opaque top pixel, overwrite
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let top_a = (top[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let t = top[i] as f32 / 255.0;
        let b = base[i] as f32 / 255.0;
        let c = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Rasterize a display-space crop selection into a new base raster.
///
/// The selection is mapped to natural space with `scale` (per axis), the
/// output is `natural size * device_pixel_ratio`, and the source region is
/// resampled into it bilinearly. Fails with `InvalidRegion` for a
/// non-positive selection or when there is no base raster.
pub fn rasterize_crop(
    base: Option<&Raster>,
    region: Rect,
    scale: Scale,
    device_pixel_ratio: f32,
) -> EditResult<Raster> {
    let invalid = || EditError::InvalidRegion { width: region.width, height: region.height };
    let base = base.ok_or_else(invalid)?;
    let natural = rect_to_natural(region, scale);
    if !region.has_positive_area() || !natural.has_positive_area() {
        return Err(invalid());
    }

    let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    let out_w = (natural.width * dpr).round() as u32;
    let out_h = (natural.height * dpr).round() as u32;
    if out_w == 0 || out_h == 0 {
        return Err(invalid());
    }

    let src = base.pixels();
    if src.width() == 0 || src.height() == 0 {
        return Err(invalid());
    }
    let bounds = TapBounds::new(src, natural);
    let step_x = natural.width / out_w as f32;
    let step_y = natural.height / out_h as f32;
    let mut out = RgbaImage::new(out_w, out_h);
    out.par_chunks_mut(out_w as usize * 4)
        .enumerate()
        .for_each(|(oy, row)| {
            let sy = natural.y + (oy as f32 + 0.5) * step_y - 0.5;
            for ox in 0..out_w as usize {
                let sx = natural.x + (ox as f32 + 0.5) * step_x - 0.5;
                let px = sample_bilinear(src, bounds, sx, sy);
                row[ox * 4..ox * 4 + 4].copy_from_slice(&px);
            }
        });

    log::debug!(
        "Cropped natural region ({:.1}, {:.1}, {:.1}x{:.1}) into {}x{}",
        natural.x, natural.y, natural.width, natural.height, out_w, out_h
    );
    Ok(Raster::from_rgba(out))
}

/// Inclusive pixel range a crop may sample from: the crop clipped to the image.
#[derive(Clone, Copy, Debug)]
struct TapBounds {
    min_x: f32,
    max_x: f32,
    min_y: f32,
    max_y: f32,
}

impl TapBounds {
    fn new(src: &RgbaImage, natural: Rect) -> Self {
        let last_x = (src.width() - 1) as f32;
        let last_y = (src.height() - 1) as f32;
        let min_x = natural.x.floor().clamp(0.0, last_x);
        let min_y = natural.y.floor().clamp(0.0, last_y);
        Self {
            min_x,
            max_x: (natural.right().ceil() - 1.0).clamp(min_x, last_x),
            min_y,
            max_y: (natural.bottom().ceil() - 1.0).clamp(min_y, last_y),
        }
    }
}

/// Bilinear sample in premultiplied space. Taps past the crop edge repeat
/// the edge pixel.
fn sample_bilinear(src: &RgbaImage, bounds: TapBounds, sx: f32, sy: f32) -> [u8; 4] {
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;

    let fetch = |x: f32, y: f32| -> [f32; 4] {
        let x = x.clamp(bounds.min_x, bounds.max_x) as u32;
        let y = y.clamp(bounds.min_y, bounds.max_y) as u32;
        let p = src.get_pixel(x, y);
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let taps = [
        (fetch(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (fetch(x0 + 1.0, y0), fx * (1.0 - fy)),
        (fetch(x0, y0 + 1.0), (1.0 - fx) * fy),
        (fetch(x0 + 1.0, y0 + 1.0), fx * fy),
    ];

    let mut acc = [0.0f32; 4];
    for (p, w) in taps {
        if w <= 0.0 {
            continue;
        }
        let a = p[3] * w;
        acc[0] += p[0] * a;
        acc[1] += p[1] * a;
        acc[2] += p[2] * a;
        acc[3] += a;
    }
    if acc[3] <= 0.0 {
        return [0, 0, 0, 0];
    }
    [
        (acc[0] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[1] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[2] / acc[3]).round().clamp(0.0, 255.0) as u8,
        acc[3].round().clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_over_fast_paths() {
        let base = Rgba([10, 20, 30, 255]);
        assert_eq!(blend_over(base, Rgba([1, 2, 3, 0]), 1.0), base);
        assert_eq!(blend_over(base, Rgba([1, 2, 3, 255]), 1.0), Rgba([1, 2, 3, 255]));
        assert_eq!(blend_over(base, Rgba([255, 255, 255, 255]), 0.0), base);
    }

    #[test]
    fn blend_over_half_opacity_on_opaque_base() {
        let out = blend_over(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]), 0.5);
        assert_eq!(out, Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn blit_clips_to_destination() {
        let mut dst = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let sprite = Sprite {
            pixels: RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255])),
            off_x: 0,
            off_y: 0,
        };
        blit_sprite(&mut dst, &sprite, -1, 2, 1.0);
        assert_eq!(dst.get_pixel(0, 2).0, [255, 0, 0, 255]);
        assert_eq!(dst.get_pixel(1, 3).0, [255, 0, 0, 255]);
        assert_eq!(dst.get_pixel(2, 2).0, [0, 0, 0, 255]);
        assert_eq!(dst.get_pixel(0, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn crop_requires_base_and_area() {
        let base = Raster::filled(10, 10, [1, 1, 1, 255]);
        let zero_w = rasterize_crop(Some(&base), Rect::new(0.0, 0.0, 0.0, 5.0), Scale::IDENTITY, 1.0);
        assert!(matches!(zero_w, Err(EditError::InvalidRegion { .. })));
        let neg_h = rasterize_crop(Some(&base), Rect::new(0.0, 0.0, 5.0, -2.0), Scale::IDENTITY, 1.0);
        assert!(matches!(neg_h, Err(EditError::InvalidRegion { .. })));
        let no_base = rasterize_crop(None, Rect::new(0.0, 0.0, 5.0, 5.0), Scale::IDENTITY, 1.0);
        assert!(matches!(no_base, Err(EditError::InvalidRegion { .. })));
    }

    #[test]
    fn crop_at_identity_copies_exact_pixels() {
        let mut img = RgbaImage::new(4, 4);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgba([(x * 10) as u8, (y * 10) as u8, 7, 255]);
        }
        let base = Raster::from_rgba(img);
        let out = rasterize_crop(Some(&base), Rect::new(1.0, 2.0, 2.0, 2.0), Scale::IDENTITY, 1.0).unwrap();
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(out.pixel(0, 0), Some([10, 20, 7, 255]));
        assert_eq!(out.pixel(1, 1), Some([20, 30, 7, 255]));
    }

    #[test]
    fn crop_applies_device_pixel_ratio() {
        let base = Raster::filled(10, 10, [50, 60, 70, 255]);
        let out = rasterize_crop(Some(&base), Rect::new(2.0, 2.0, 4.0, 3.0), Scale::IDENTITY, 2.0).unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.pixel(3, 3), Some([50, 60, 70, 255]));
    }

    #[test]
    fn magnified_crop_keeps_opaque_edges() {
        let base = Raster::filled(10, 10, [200, 100, 50, 255]);
        let out = rasterize_crop(Some(&base), Rect::new(0.0, 0.0, 10.0, 10.0), Scale::IDENTITY, 2.0).unwrap();
        assert_eq!(out.dimensions(), (20, 20));
        for (x, y) in [(0, 0), (0, 10), (19, 19), (10, 0), (19, 0)] {
            assert_eq!(out.pixel(x, y), Some([200, 100, 50, 255]), "pixel ({x}, {y})");
        }
    }

    #[test]
    fn magnified_crop_does_not_sample_outside_selection() {
        let mut img = RgbaImage::from_pixel(8, 4, Rgba([255, 0, 0, 255]));
        for y in 0..4 {
            for x in 4..8 {
                img.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        let base = Raster::from_rgba(img);
        let out = rasterize_crop(Some(&base), Rect::new(0.0, 0.0, 4.0, 4.0), Scale::IDENTITY, 3.0).unwrap();
        assert_eq!(out.dimensions(), (12, 12));
        for (_, _, p) in out.pixels().enumerate_pixels() {
            assert_eq!(p.0, [255, 0, 0, 255]);
        }
    }
}
