// ============================================================================
// ADJUSTMENT OPERATIONS: whole-image pixel transforms (new raster out)
// ============================================================================
//
// Every function reads a source image and returns a new one; nothing is
// modified in place. Per-pixel work is parallelized via rayon.
// ============================================================================

use image::{imageops, RgbaImage};
use rayon::prelude::*;

// ============================================================================
// HELPER: per-pixel transform
// ============================================================================

/// Apply a per-pixel transform and return the result.
/// `transform` receives (r, g, b, a) as f32 and returns (r, g, b, a) as f32.
pub fn apply_pixel_transform<F>(src: &RgbaImage, transform: F) -> RgbaImage
where
    F: Fn(f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    let (w, h) = src.dimensions();
    let mut out = RgbaImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let stride = w as usize * 4;
    let src_raw = src.as_raw();
    out.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for pi in (0..stride).step_by(4) {
            let (nr, ng, nb, na) = transform(
                row_in[pi] as f32,
                row_in[pi + 1] as f32,
                row_in[pi + 2] as f32,
                row_in[pi + 3] as f32,
            );
            row_out[pi] = nr.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 1] = ng.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 2] = nb.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 3] = na.round().clamp(0.0, 255.0) as u8;
        }
    });
    out
}

// ============================================================================
// FILTERS
// ============================================================================

/// Invert all color channels (R, G, B). Alpha is preserved.
pub fn invert_colors(src: &RgbaImage) -> RgbaImage {
    apply_pixel_transform(src, |r, g, b, a| (255.0 - r, 255.0 - g, 255.0 - b, a))
}

/// Rec.601 luminance grayscale.
pub fn grayscale(src: &RgbaImage) -> RgbaImage {
    apply_pixel_transform(src, |r, g, b, a| {
        let l = 0.299 * r + 0.587 * g + 0.114 * b;
        (l, l, l, a)
    })
}

pub fn sepia(src: &RgbaImage) -> RgbaImage {
    apply_pixel_transform(src, |r, g, b, a| {
        let sr = 0.393 * r + 0.769 * g + 0.189 * b;
        let sg = 0.349 * r + 0.686 * g + 0.168 * b;
        let sb = 0.272 * r + 0.534 * g + 0.131 * b;
        (sr.min(255.0), sg.min(255.0), sb.min(255.0), a)
    })
}

pub fn gaussian_blur(src: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return src.clone();
    }
    imageops::blur(src, sigma)
}

pub fn sharpen(src: &RgbaImage, sigma: f32, threshold: i32) -> RgbaImage {
    imageops::unsharpen(src, sigma.max(0.1), threshold)
}

// ============================================================================
// GLOBAL ADJUSTMENTS
// ============================================================================

/// `brightness`: -100..100 (additive offset)
/// `contrast`: -100..100 (multiplier around midpoint)
pub fn brightness_contrast(src: &RgbaImage, brightness: f32, contrast: f32) -> RgbaImage {
    let contrast = contrast.clamp(-100.0, 100.0);
    let factor = (259.0 * (contrast + 255.0)) / (255.0 * (259.0 - contrast));
    apply_pixel_transform(src, move |r, g, b, a| {
        let nr = factor * (r + brightness - 128.0) + 128.0;
        let ng = factor * (g + brightness - 128.0) + 128.0;
        let nb = factor * (b + brightness - 128.0) + 128.0;
        (nr, ng, nb, a)
    })
}

/// `saturation`: -100..100 (0 = no change)
pub fn saturation(src: &RgbaImage, saturation: f32) -> RgbaImage {
    let sat_factor = 1.0 + saturation / 100.0;
    apply_pixel_transform(src, move |r, g, b, a| {
        let (h, s, l) = rgb_to_hsl(r / 255.0, g / 255.0, b / 255.0);
        let (nr, ng, nb) = hsl_to_rgb(h, (s * sat_factor).clamp(0.0, 1.0), l);
        (nr * 255.0, ng * 255.0, nb * 255.0, a)
    })
}

/// `exposure`: EV stops, 0 = no change. Simple gain of `2^exposure`.
pub fn exposure(src: &RgbaImage, exposure: f32) -> RgbaImage {
    let gain = 2.0f32.powf(exposure);
    apply_pixel_transform(src, move |r, g, b, a| (r * gain, g * gain, b * gain, a))
}

/// `temperature`: -100..100, positive warms (adds red, removes blue).
pub fn temperature(src: &RgbaImage, temperature: f32) -> RgbaImage {
    let temp_shift = temperature * 1.5;
    apply_pixel_transform(src, move |r, g, b, a| (r + temp_shift, g, b - temp_shift, a))
}

/// Auto Levels: stretches the tonal range of each channel independently
/// so min → 0 and max → 255. Fully transparent pixels do not count.
pub fn auto_levels(src: &RgbaImage) -> RgbaImage {
    let mut min = [255u8; 3];
    let mut max = [0u8; 3];
    for p in src.pixels() {
        if p[3] == 0 {
            continue;
        }
        for c in 0..3 {
            min[c] = min[c].min(p[c]);
            max[c] = max[c].max(p[c]);
        }
    }

    let luts = [
        build_stretch_lut(min[0], max[0]),
        build_stretch_lut(min[1], max[1]),
        build_stretch_lut(min[2], max[2]),
    ];
    apply_pixel_transform(src, move |r, g, b, a| {
        (
            luts[0][r as usize] as f32,
            luts[1][g as usize] as f32,
            luts[2][b as usize] as f32,
            a,
        )
    })
}

fn build_stretch_lut(min: u8, max: u8) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if max <= min {
        // No range to stretch: identity
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
    } else {
        let range = (max - min) as f32;
        for (i, v) in lut.iter_mut().enumerate() {
            let level = if (i as u8) <= min {
                0.0
            } else if (i as u8) >= max {
                255.0
            } else {
                (i as f32 - min as f32) / range * 255.0
            };
            *v = level.round().clamp(0.0, 255.0) as u8;
        }
    }
    lut
}

/// Largest factor [`upscale`] accepts.
pub const MAX_UPSCALE_FACTOR: u32 = 8;

/// Lanczos upscale by an integer factor, clamped to `1..=MAX_UPSCALE_FACTOR`.
pub fn upscale(src: &RgbaImage, factor: u32) -> RgbaImage {
    let factor = factor.clamp(1, MAX_UPSCALE_FACTOR);
    if factor == 1 {
        return src.clone();
    }
    let (w, h) = src.dimensions();
    let out_w = w.saturating_mul(factor);
    let out_h = h.saturating_mul(factor);
    imageops::resize(src, out_w, out_h, imageops::FilterType::Lanczos3)
}

// ============================================================================
// COLOR SPACE HELPERS
// ============================================================================

/// RGB (0..1) → HSL (H: 0..1, S: 0..1, L: 0..1)
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < 1e-6 {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / d;
        if h < 0.0 {
            h += 6.0;
        }
        h / 6.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    (h, s, l)
}

/// HSL (H: 0..1, S: 0..1, L: 0..1) → RGB (0..1)
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s.abs() < 1e-6 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn invert_keeps_alpha() {
        let src = RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 40]));
        assert_eq!(invert_colors(&src).get_pixel(1, 0).0, [245, 235, 225, 40]);
    }

    #[test]
    fn auto_levels_stretches_range() {
        let mut src = RgbaImage::new(2, 1);
        src.put_pixel(0, 0, Rgba([50, 50, 50, 255]));
        src.put_pixel(1, 0, Rgba([150, 150, 150, 255]));
        let out = auto_levels(&src);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn neutral_adjustments_are_identity() {
        let src = RgbaImage::from_pixel(3, 3, Rgba([90, 120, 200, 255]));
        assert_eq!(brightness_contrast(&src, 0.0, 0.0), src);
        assert_eq!(exposure(&src, 0.0), src);
        assert_eq!(temperature(&src, 0.0), src);
    }

    #[test]
    fn upscale_multiplies_dimensions() {
        let src = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        assert_eq!(upscale(&src, 2).dimensions(), (6, 4));
        assert_eq!(upscale(&src, 0).dimensions(), (3, 2));
    }
}
