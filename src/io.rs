use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageError, ImageFormat, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::EditResult;
use crate::raster::Raster;

/// Output encodings the file sink understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl ExportFormat {
    /// Pick a format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "webp" => Some(ExportFormat::Webp),
            "bmp" => Some(ExportFormat::Bmp),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Webp => "webp",
            ExportFormat::Bmp => "bmp",
        }
    }
}

/// Load any raster format the `image` crate can decode as an RGBA [`Raster`].
pub fn load_raster(path: &Path) -> EditResult<Raster> {
    let img = image::open(path)?.to_rgba8();
    log::info!("Loaded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(Raster::from_rgba(img))
}

/// Encode and write an image to a file.
/// Standalone (no sink state) so it can run on a worker thread.
pub fn encode_and_write(image: &RgbaImage, path: &Path, format: ExportFormat, quality: u8) -> Result<(), ImageError> {
    match format {
        ExportFormat::Png => {
            let mut writer = BufWriter::new(File::create(path)?);
            PngEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        ExportFormat::Jpeg => {
            let mut writer = BufWriter::new(File::create(path)?);
            // JPEG has no alpha channel
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        ExportFormat::Webp => {
            DynamicImage::ImageRgba8(image.clone()).save_with_format(path, ImageFormat::WebP)?;
        }
        ExportFormat::Bmp => {
            let mut writer = BufWriter::new(File::create(path)?);
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
    }
    Ok(())
}

// ============================================================================
// EXPORT SINK
// ============================================================================

/// Receives a final flattened raster. What "export" means (download, save,
/// upload) is up to the implementation.
pub trait ExportSink {
    fn export_raster(&self, raster: &Raster) -> EditResult<()>;
}

/// Writes the flattened raster to a file, picking the encoder by extension.
pub struct FileExportSink {
    pub path: PathBuf,
    /// Encoding used regardless of the path's extension.
    pub format: ExportFormat,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl FileExportSink {
    /// Sink whose format follows the path extension (PNG when unknown).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = ExportFormat::from_path(&path).unwrap_or(ExportFormat::Png);
        Self::with_format(path, format)
    }

    pub fn with_format(path: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self { path: path.into(), format, quality: 90 }
    }
}

impl ExportSink for FileExportSink {
    fn export_raster(&self, raster: &Raster) -> EditResult<()> {
        let format = self.format;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        encode_and_write(raster.pixels(), &self.path, format, self.quality.clamp(1, 100))?;
        log::info!(
            "Exported {}x{} raster to {} ({:?})",
            raster.width(),
            raster.height(),
            self.path.display(),
            format
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a/b.JPEG")), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::from_path(Path::new("x.png")), Some(ExportFormat::Png));
        assert_eq!(ExportFormat::from_path(Path::new("x.tiff")), None);
        assert_eq!(ExportFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn png_export_reloads_identically() {
        let dir = std::env::temp_dir().join(format!("retouch-io-{}", uuid::Uuid::new_v4()));
        let path = dir.join("out.png");
        let raster = Raster::filled(3, 2, [12, 34, 56, 200]);
        FileExportSink::new(&path).export_raster(&raster).unwrap();
        let back = load_raster(&path).unwrap();
        assert!(back.same_pixels(&raster));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn explicit_format_overrides_extension() {
        let dir = std::env::temp_dir().join(format!("retouch-io-{}", uuid::Uuid::new_v4()));
        let path = dir.join("out.png");
        let raster = Raster::filled(4, 4, [90, 120, 150, 255]);
        FileExportSink::with_format(&path, ExportFormat::Jpeg).export_raster(&raster).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn new_follows_extension() {
        assert_eq!(FileExportSink::new("a.bmp").format, ExportFormat::Bmp);
        assert_eq!(FileExportSink::new("a.tiff").format, ExportFormat::Png);
    }
}
