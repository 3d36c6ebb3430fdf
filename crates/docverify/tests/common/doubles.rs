#![allow(dead_code)]

use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};

use docverify::collaborators::{Detection, Detector};
use docverify::error::{CollaboratorError, ProcessError};
use docverify::processor::{PageRenderer, RenderedPage, UploadedFile};

pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Renders `pages` white pages for any input starting with `%PDF`.
pub struct BlankRenderer {
    pub pages: u32,
}

#[async_trait]
impl PageRenderer for BlankRenderer {
    async fn render(&self, pdf_bytes: &[u8], _dpi: u32) -> Result<Vec<RenderedPage>, ProcessError> {
        if !pdf_bytes.starts_with(b"%PDF") {
            return Err(ProcessError::PdfProcessing("Failed to load PDF: not a PDF".into()));
        }
        Ok((1..=self.pages)
            .map(|page| RenderedPage {
                page,
                png: blank_png(200, 300),
                width: 200,
                height: 300,
            })
            .collect())
    }
}

/// Reports the same markers on every page.
pub struct FixedDetector(pub Vec<Detection>);

impl FixedDetector {
    pub fn all_markers() -> Self {
        let marker = |category: &str, x: f64| Detection {
            category: category.to_string(),
            x,
            y: 250.0,
            width: 40.0,
            height: 30.0,
            confidence: 0.9,
        };
        Self(vec![marker("qr", 10.0), marker("stamp", 60.0), marker("signature", 120.0)])
    }
}

#[async_trait]
impl Detector for FixedDetector {
    async fn detect(
        &self,
        _filename: &str,
        _image: &[u8],
        min_confidence: f64,
    ) -> Result<Vec<Detection>, CollaboratorError> {
        Ok(self
            .0
            .iter()
            .filter(|d| d.confidence >= min_confidence)
            .cloned()
            .collect())
    }
}

pub fn pdf_upload(name: &str) -> UploadedFile {
    UploadedFile {
        filename: name.to_string(),
        bytes: format!("%PDF-1.4\n% {name}\n").into_bytes(),
    }
}
