use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ProcessError;

/// One rasterized PDF page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-based page number.
    pub page: u32,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Turns a PDF into page images.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<RenderedPage>, ProcessError>;
}

/// Renders pages with poppler's `pdftoppm`.
#[derive(Debug, Default, Clone)]
pub struct PdftoppmRenderer;

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<RenderedPage>, ProcessError> {
        let page_count = page_count(pdf_bytes)?;
        if page_count == 0 {
            return Err(ProcessError::EmptyDocument);
        }

        let work_dir = tempfile::tempdir().map_err(|e| {
            ProcessError::PdfProcessing(format!("Failed to create temp directory: {}", e))
        })?;
        let pdf_path = work_dir.path().join("document.pdf");
        tokio::fs::write(&pdf_path, pdf_bytes)
            .await
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to write temp PDF: {}", e)))?;

        let mut pages = Vec::with_capacity(page_count as usize);
        for page in 1..=page_count {
            let png = render_page(&pdf_path, work_dir.path(), page, dpi).await?;
            let (width, height) = super::raster::dimensions(&png)?;
            tracing::debug!(page, width, height, "rendered page");
            pages.push(RenderedPage {
                page,
                png,
                width,
                height,
            });
        }
        Ok(pages)
    }
}

/// Number of pages according to the PDF's page tree.
pub fn page_count(pdf_bytes: &[u8]) -> Result<u32, ProcessError> {
    let doc = lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;
    Ok(doc.get_pages().len() as u32)
}

async fn render_page(
    pdf_path: &Path,
    work_dir: &Path,
    page: u32,
    dpi: u32,
) -> Result<Vec<u8>, ProcessError> {
    let output_prefix = work_dir.join(format!("page_{}", page));

    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg("-f")
        .arg(page.to_string())
        .arg("-l")
        .arg(page.to_string())
        .arg(pdf_path)
        .arg(&output_prefix)
        .output()
        .await
        .map_err(|e| {
            ProcessError::PdfProcessing(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "pdftoppm failed on page {}: {}",
            page,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // pdftoppm zero-pads the page suffix depending on the document length.
    let prefix = output_prefix.display();
    let candidates = [
        format!("{}-{}.png", prefix, page),
        format!("{}-{:02}.png", prefix, page),
        format!("{}-{:03}.png", prefix, page),
        format!("{}-{:04}.png", prefix, page),
    ];
    for candidate in &candidates {
        match tokio::fs::read(candidate).await {
            Ok(bytes) => {
                let _ = tokio::fs::remove_file(candidate).await;
                return Ok(bytes);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(ProcessError::PdfProcessing(format!(
                    "Failed to read rendered page {}: {}",
                    page, e
                )))
            }
        }
    }

    Err(ProcessError::PdfProcessing(format!(
        "Failed to find rendered image for page {}",
        page
    )))
}
