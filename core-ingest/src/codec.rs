//! Image codec capability and its `image` crate implementation.
//!
//! Codec calls are blocking; the pipeline runs them on the blocking pool.

use crate::error::{IngestError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Decode, re-encode and measure image files.
pub trait ImageCodec: Send + Sync {
    /// Width and height in pixels
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)>;

    /// Resample to exactly `width` x `height` and overwrite `path` in its
    /// current format. Metadata is not preserved.
    fn resize(&self, path: &Path, width: u32, height: u32) -> Result<()>;

    /// Decode `source`, drop alpha and metadata, write a JPEG to `target`
    /// and delete `source` if it is a different file.
    fn convert_to_jpeg(&self, source: &Path, target: &Path) -> Result<()>;

    /// Guess a file extension (with leading dot) from the first bytes.
    fn sniff_extension(&self, bytes: &[u8]) -> Option<String>;
}

/// [`ImageCodec`] backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageCrateCodec {
    jpeg_quality: u8,
}

impl ImageCrateCodec {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    fn decode(path: &Path) -> Result<(DynamicImage, ImageFormat)> {
        let reader = ImageReader::open(path)?
            .with_guessed_format()
            .map_err(|e| IngestError::codec(path, e))?;
        let format = reader
            .format()
            .ok_or_else(|| IngestError::UnknownFormat(path.to_path_buf()))?;
        let image = reader.decode().map_err(|e| IngestError::codec(path, e))?;
        Ok((image, format))
    }

    fn write_jpeg(&self, image: &DynamicImage, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality);
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(|e| IngestError::codec(path, e))
    }

    fn write(&self, image: &DynamicImage, format: ImageFormat, path: &Path) -> Result<()> {
        match format {
            ImageFormat::Jpeg => self.write_jpeg(image, path),
            other => image
                .save_with_format(path, other)
                .map_err(|e| IngestError::codec(path, e)),
        }
    }
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self::new(90)
    }
}

/// Sibling path used while rewriting a file in place.
fn scratch_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl ImageCodec for ImageCrateCodec {
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(path).map_err(|e| IngestError::codec(path, e))
    }

    fn resize(&self, path: &Path, width: u32, height: u32) -> Result<()> {
        let (image, format) = Self::decode(path)?;
        let resized = image.resize_exact(width, height, FilterType::Lanczos3);

        let scratch = scratch_path(path);
        if let Err(e) = self.write(&resized, format, &scratch) {
            fs::remove_file(&scratch).ok();
            return Err(e);
        }
        fs::rename(&scratch, path)?;
        Ok(())
    }

    fn convert_to_jpeg(&self, source: &Path, target: &Path) -> Result<()> {
        let (image, _) = Self::decode(source)?;

        let scratch = scratch_path(target);
        if let Err(e) = self.write_jpeg(&image, &scratch) {
            fs::remove_file(&scratch).ok();
            return Err(e);
        }
        fs::rename(&scratch, target)?;

        if source != target {
            fs::remove_file(source)?;
        }
        Ok(())
    }

    fn sniff_extension(&self, bytes: &[u8]) -> Option<String> {
        let format = image::guess_format(bytes).ok()?;
        format
            .extensions_str()
            .first()
            .map(|ext| format!(".{}", ext))
    }
}
