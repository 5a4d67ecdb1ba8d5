//! Test utilities: scripted detectors and in-memory image fixtures.
//!
//! The scripted detectors key off the pixel at (0, 0). A dark corner (< 128) stands for a symbol
//! visible in the raster's own polarity, a light one for a symbol that only shows up after
//! inversion. [`dark_corner_png`] builds uploads whose original variant has a dark corner and whose
//! inverted variant therefore has a light one.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use image::{GrayImage, ImageFormat, Luma};

use crate::config::Config;
use crate::detector::{DetectorError, Fiducial, FiducialDetector, Polygon2D};

pub fn encode_png(image: &GrayImage) -> Vec<u8> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .expect("Failed to encode PNG fixture");
    png
}

/// White `width`x`height` PNG with a black top-left pixel
pub fn dark_corner_png(width: u32, height: u32) -> Vec<u8> {
    let mut image = GrayImage::from_pixel(width, height, Luma([255]));
    image.put_pixel(0, 0, Luma([0]));
    encode_png(&image)
}

/// Quiet zone around generated QR fixtures, in modules
pub const QR_QUIET_ZONE: u32 = 4;

/// Standard QR symbol encoding `payload`, `scale` pixels per module, dark on white with a
/// [`QR_QUIET_ZONE`] border.
pub fn qr_code_image(payload: &str, scale: u32) -> GrayImage {
    let code = qrcode::QrCode::new(payload.as_bytes()).expect("Failed to encode QR fixture");
    let modules = code.width() as u32;
    let colors = code.to_colors();

    let side = (modules + 2 * QR_QUIET_ZONE) * scale;
    GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        let inside = (QR_QUIET_ZONE..QR_QUIET_ZONE + modules).contains(&mx)
            && (QR_QUIET_ZONE..QR_QUIET_ZONE + modules).contains(&my);
        let dark = inside
            && colors[((my - QR_QUIET_ZONE) * modules + (mx - QR_QUIET_ZONE)) as usize] == qrcode::Color::Dark;
        Luma([if dark { 0 } else { 255 }])
    })
}

/// Invert every module from `first_module` to the symbol's far corner, on both axes. Finder
/// patterns, timing patterns and format information of a version 1 symbol stay intact when
/// `first_module` is at least 9.
pub fn damage_qr_modules(image: &mut GrayImage, scale: u32, first_module: u32) {
    let side = image.width() / scale - 2 * QR_QUIET_ZONE;
    let start = (QR_QUIET_ZONE + first_module) * scale;
    let end = (QR_QUIET_ZONE + side) * scale;
    for y in start..end {
        for x in start..end {
            let pixel = image.get_pixel_mut(x, y);
            pixel.0[0] = 255 - pixel.0[0];
        }
    }
}

fn corner_is_dark(image: &GrayImage) -> bool {
    image.get_pixel(0, 0).0[0] < 128
}

/// Reports one symbol spanning the whole raster, depending on the corner polarity.
///
/// The message is `dark-WxH` or `light-WxH` so tests can tell which variant produced it.
#[derive(Debug, Clone, Copy)]
pub struct PolarityDetector {
    dark: bool,
    light: bool,
}

impl PolarityDetector {
    pub fn both() -> Self {
        Self { dark: true, light: true }
    }

    pub fn dark_only() -> Self {
        Self { dark: true, light: false }
    }
}

impl FiducialDetector for PolarityDetector {
    fn name(&self) -> &'static str {
        "polarity"
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Fiducial>, DetectorError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::InvalidBuffer {
                reason: "empty".to_string(),
            });
        }

        let dark = corner_is_dark(image);
        if (dark && !self.dark) || (!dark && !self.light) {
            return Ok(Vec::new());
        }

        let (w, h) = (f64::from(width - 1), f64::from(height - 1));
        Ok(vec![Fiducial {
            message: format!("{}-{width}x{height}", if dark { "dark" } else { "light" }),
            bounds: Polygon2D::from([(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]),
        }])
    }
}

/// Fails on light-corner rasters, delegates otherwise
pub struct FailingDetector {
    inner: PolarityDetector,
}

impl FailingDetector {
    pub fn on_light_corner(inner: PolarityDetector) -> Self {
        Self { inner }
    }
}

impl FiducialDetector for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Fiducial>, DetectorError> {
        if !corner_is_dark(image) {
            return Err(DetectorError::Backend("scripted failure".to_string()));
        }
        self.inner.detect(image)
    }
}

pub struct PanicDetector;

impl FiducialDetector for PanicDetector {
    fn name(&self) -> &'static str {
        "panic"
    }

    fn detect(&self, _image: &GrayImage) -> Result<Vec<Fiducial>, DetectorError> {
        panic!("scripted detector panic");
    }
}

/// Sleeps for a width-dependent time before delegating
pub struct SlowDetector {
    inner: PolarityDetector,
    delay: Box<dyn Fn(u32) -> Duration + Send + Sync>,
}

impl SlowDetector {
    pub fn new(inner: PolarityDetector, delay: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            inner,
            delay: Box::new(delay),
        }
    }
}

impl FiducialDetector for SlowDetector {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Fiducial>, DetectorError> {
        std::thread::sleep((self.delay)(image.width()));
        self.inner.detect(image)
    }
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        // Prometheus recorder is process-global
        enable_metrics: false,
        ..Default::default()
    }
}

pub fn create_test_app(config: Config, detector: impl FiducialDetector + 'static) -> TestServer {
    crate::Application::with_detector(config, Arc::new(detector))
        .expect("Failed to create application")
        .into_test_server()
}
