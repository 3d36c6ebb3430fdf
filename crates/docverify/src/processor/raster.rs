//! Page image helpers: reading dimensions and drawing detection boxes.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::collaborators::{Detection, DetectionCategory};
use crate::error::ProcessError;

/// Width and height of an encoded image.
pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32), ProcessError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ProcessError::ImageProcessing(e.to_string()))?;
    reader
        .into_dimensions()
        .map_err(|e| ProcessError::ImageProcessing(e.to_string()))
}

fn color_for(category: &str) -> Rgba<u8> {
    match DetectionCategory::from_label(category) {
        Some(DetectionCategory::Qr) => Rgba([33, 150, 243, 255]),
        Some(DetectionCategory::Stamp) => Rgba([229, 57, 53, 255]),
        Some(DetectionCategory::Signature) => Rgba([67, 160, 71, 255]),
        None => Rgba([255, 179, 0, 255]),
    }
}

/// Returns a PNG copy of `page_png` with a rectangle around each detection.
pub fn draw_detections(page_png: &[u8], detections: &[Detection]) -> Result<Vec<u8>, ProcessError> {
    let mut canvas = image::load_from_memory(page_png)
        .map_err(|e| ProcessError::ImageProcessing(e.to_string()))?
        .to_rgba8();

    let thickness = (canvas.width().max(canvas.height()) / 400).max(2);
    for detection in detections {
        draw_rect(&mut canvas, detection, thickness, color_for(&detection.category));
    }

    let mut out = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| ProcessError::ImageProcessing(e.to_string()))?;
    Ok(out)
}

fn draw_rect(canvas: &mut RgbaImage, d: &Detection, thickness: u32, color: Rgba<u8>) {
    let (w, h) = (canvas.width(), canvas.height());
    if w == 0 || h == 0 {
        return;
    }
    let clamp_x = |v: f64| (v.max(0.0) as u32).min(w - 1);
    let clamp_y = |v: f64| (v.max(0.0) as u32).min(h - 1);

    let x0 = clamp_x(d.x);
    let y0 = clamp_y(d.y);
    let x1 = clamp_x(d.x + d.width);
    let y1 = clamp_y(d.y + d.height);
    if x1 < x0 || y1 < y0 {
        return;
    }

    for t in 0..thickness {
        let top = (y0 + t).min(y1);
        let bottom = y1.saturating_sub(t).max(y0);
        for x in x0..=x1 {
            canvas.put_pixel(x, top, color);
            canvas.put_pixel(x, bottom, color);
        }
        let left = (x0 + t).min(x1);
        let right = x1.saturating_sub(t).max(x0);
        for y in y0..=y1 {
            canvas.put_pixel(left, y, color);
            canvas.put_pixel(right, y, color);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::blank_png;
    use super::*;

    fn detection(category: &str, x: f64, y: f64, width: f64, height: f64) -> Detection {
        Detection {
            category: category.to_string(),
            x,
            y,
            width,
            height,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(dimensions(&blank_png(40, 30)).unwrap(), (40, 30));
    }

    #[test]
    fn test_dimensions_of_garbage_fails() {
        assert!(dimensions(b"nope").is_err());
    }

    #[test]
    fn test_draw_detections_outlines_box() {
        let page = blank_png(100, 100);
        let labeled = draw_detections(&page, &[detection("stamp", 10.0, 10.0, 20.0, 20.0)]).unwrap();
        let img = image::load_from_memory(&labeled).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (100, 100));
        assert_eq!(*img.get_pixel(10, 10), Rgba([229, 57, 53, 255]));
        assert_eq!(*img.get_pixel(30, 20), Rgba([229, 57, 53, 255]));
        // Interior stays untouched.
        assert_eq!(*img.get_pixel(20, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_draw_detections_clamps_out_of_bounds_boxes() {
        let page = blank_png(50, 50);
        let labeled =
            draw_detections(&page, &[detection("qr", -10.0, 40.0, 100.0, 100.0)]).unwrap();
        let img = image::load_from_memory(&labeled).unwrap().to_rgba8();
        assert_eq!(*img.get_pixel(0, 49), Rgba([33, 150, 243, 255]));
    }
}
