//! Page rasterization
//!
//! Rasterization is an optional capability. It is resolved once when the
//! engine is built ([`RasterCapability::resolve`]) and the renderer picks its
//! tier from the result instead of discovering a missing backend per page.
//!
//! The bundled backend shells out to poppler's `pdftoppm`.

use crate::error::LayoutError;
use crate::scratch::Scratch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

pub const DEFAULT_RASTER_DPI: u32 = 300;

const PDFTOPPM: &str = "pdftoppm";

/// An 8-bit RGB bitmap
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgb.len())
            .finish()
    }
}

impl RasterImage {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, LayoutError> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || rgb.len() != expected {
            return Err(LayoutError::RasterError(format!(
                "Bitmap of {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                rgb.len()
            )));
        }
        Ok(Self { width, height, rgb })
    }

    /// A single-colour bitmap
    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Result<Self, LayoutError> {
        let rgb = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(width, height, rgb)
    }

    /// Decode a PNG into RGB, dropping alpha
    pub fn from_png(bytes: &[u8]) -> Result<Self, LayoutError> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);

        let mut reader = decoder
            .read_info()
            .map_err(|e| LayoutError::RasterError(format!("PNG header: {}", e)))?;
        let (color_type, _) = reader.output_color_type();

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| LayoutError::RasterError(format!("PNG data: {}", e)))?;
        buf.truncate(info.buffer_size());

        let rgb = match color_type {
            png::ColorType::Rgb => buf,
            png::ColorType::Rgba => buf
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
            png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g]).collect(),
            png::ColorType::GrayscaleAlpha => {
                buf.chunks_exact(2).flat_map(|px| [px[0]; 3]).collect()
            }
            png::ColorType::Indexed => {
                return Err(LayoutError::RasterError(
                    "Indexed PNG was not expanded".into(),
                ))
            }
        };

        Self::new(info.width, info.height, rgb)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }
}

/// Turns the first page of a one-page PDF into a bitmap
pub trait Rasterizer: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the backend ran but produced no image
    fn rasterize(
        &self,
        page_pdf: &Path,
        dpi: u32,
        scratch: &Scratch,
    ) -> Result<Option<RasterImage>, LayoutError>;
}

/// `pdftoppm -png -singlefile`
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether `program` can be executed
    pub fn probe(program: &Path) -> bool {
        Command::new(program)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn name(&self) -> &str {
        PDFTOPPM
    }

    fn rasterize(
        &self,
        page_pdf: &Path,
        dpi: u32,
        scratch: &Scratch,
    ) -> Result<Option<RasterImage>, LayoutError> {
        let out_dir = scratch.subdir("raster")?;
        let prefix = out_dir.path().join("page");

        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .args(["-f", "1", "-l", "1", "-singlefile"])
            .arg(page_pdf)
            .arg(&prefix)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                LayoutError::RasterError(format!("Cannot run {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            return Err(LayoutError::RasterError(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let png_path = prefix.with_extension("png");
        if !png_path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&png_path)?;
        RasterImage::from_png(&bytes).map(Some)
    }
}

/// How the engine should find a rasterizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterizerSetting {
    /// Use `pdftoppm` from PATH when it can be executed
    #[default]
    Auto,
    /// Never rasterize; cells become labelled placeholder boxes
    Disabled,
    /// Use this `pdftoppm` executable
    Command(PathBuf),
}

/// Rasterization capability resolved at start-up
#[derive(Clone)]
pub enum RasterCapability {
    Available(Arc<dyn Rasterizer>),
    Unavailable,
}

impl fmt::Debug for RasterCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterCapability::Available(r) => write!(f, "Available({})", r.name()),
            RasterCapability::Unavailable => write!(f, "Unavailable"),
        }
    }
}

impl RasterCapability {
    pub fn resolve(setting: &RasterizerSetting) -> Self {
        let program = match setting {
            RasterizerSetting::Disabled => {
                tracing::info!("Rasterization disabled by configuration");
                return RasterCapability::Unavailable;
            }
            RasterizerSetting::Auto => PathBuf::from(PDFTOPPM),
            RasterizerSetting::Command(path) => path.clone(),
        };

        if PdftoppmRasterizer::probe(&program) {
            tracing::info!("Rasterizer available: {}", program.display());
            RasterCapability::Available(Arc::new(PdftoppmRasterizer::new(program)))
        } else {
            tracing::warn!(
                "Rasterizer {} not found, pages will be drawn as placeholders",
                program.display()
            );
            RasterCapability::Unavailable
        }
    }

    pub fn with(rasterizer: impl Rasterizer + 'static) -> Self {
        RasterCapability::Available(Arc::new(rasterizer))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RasterCapability::Available(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(width: u32, height: u32, color: png::ColorType, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(data).unwrap();
        }
        out
    }

    #[test]
    fn test_from_png_rgb() {
        let data = [255, 0, 0, 0, 255, 0];
        let png = encode_png(2, 1, png::ColorType::Rgb, &data);

        let image = RasterImage::from_png(&png).unwrap();
        assert_eq!((image.width(), image.height()), (2, 1));
        assert_eq!(image.rgb(), &data);
    }

    #[test]
    fn test_from_png_drops_alpha() {
        let data = [10, 20, 30, 255, 40, 50, 60, 0];
        let png = encode_png(2, 1, png::ColorType::Rgba, &data);

        let image = RasterImage::from_png(&png).unwrap();
        assert_eq!(image.rgb(), &[10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_from_png_expands_grayscale() {
        let png = encode_png(2, 1, png::ColorType::Grayscale, &[7, 200]);

        let image = RasterImage::from_png(&png).unwrap();
        assert_eq!(image.rgb(), &[7, 7, 7, 200, 200, 200]);
    }

    #[test]
    fn test_from_png_rejects_garbage() {
        let err = RasterImage::from_png(b"definitely not a png").unwrap_err();
        assert!(matches!(err, LayoutError::RasterError(_)));
    }

    #[test]
    fn test_new_checks_buffer_length() {
        assert!(RasterImage::new(2, 2, vec![0; 12]).is_ok());
        assert!(RasterImage::new(2, 2, vec![0; 11]).is_err());
        assert!(RasterImage::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_solid_fills_every_pixel() {
        let image = RasterImage::solid(3, 2, [1, 2, 3]).unwrap();
        assert_eq!(image.rgb().len(), 18);
        assert!(image.rgb().chunks(3).all(|px| px == [1, 2, 3]));
    }

    #[test]
    fn test_disabled_setting_is_unavailable() {
        let capability = RasterCapability::resolve(&RasterizerSetting::Disabled);
        assert!(!capability.is_available());
    }

    #[test]
    fn test_missing_command_is_unavailable() {
        let setting = RasterizerSetting::Command(PathBuf::from("/nonexistent/quadsheet/pdftoppm"));
        assert!(!RasterCapability::resolve(&setting).is_available());
    }

    #[test]
    fn test_setting_deserializes_from_json() {
        let auto: RasterizerSetting = serde_json::from_str(r#""auto""#).unwrap();
        assert_eq!(auto, RasterizerSetting::Auto);

        let command: RasterizerSetting =
            serde_json::from_str(r#"{"command":"/usr/bin/pdftoppm"}"#).unwrap();
        assert_eq!(
            command,
            RasterizerSetting::Command(PathBuf::from("/usr/bin/pdftoppm"))
        );
    }
}
