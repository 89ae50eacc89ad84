//! Crop slicing and PNG encoding for rendered pages.
//!
//! The page is rendered once at the target DPI; crops are sliced straight
//! out of that RGB buffer instead of re-rasterizing the clip region, which
//! gives identical pixels at the same resolution.

use pagelens_core::geometry::{Rect, pixel_window};
use pagelens_core::pdf::PageRaster;

use crate::ExtractError;

/// Slice the pixel window covering `clip` (page coordinates) out of a page
/// rendered at `dpi`.
pub fn crop_raster(raster: &PageRaster, page: &Rect, clip: &Rect, dpi: f32) -> PageRaster {
    let (x, y, w, h) = pixel_window(page, clip, dpi, raster.width, raster.height);

    let mut pixels = Vec::with_capacity((w as usize) * (h as usize) * 3);
    for row in y..y + h {
        let start = ((row * raster.width + x) * 3) as usize;
        let end = start + (w as usize) * 3;
        pixels.extend_from_slice(&raster.pixels[start..end]);
    }

    PageRaster {
        width: w,
        height: h,
        pixels,
    }
}

/// Encode a raster as PNG bytes.
pub fn encode_png(raster: &PageRaster) -> Result<Vec<u8>, ExtractError> {
    let img = image::RgbImage::from_raw(raster.width, raster.height, raster.pixels.clone())
        .ok_or_else(|| ExtractError::Image("raster buffer does not match dimensions".into()))?;
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| ExtractError::Image(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_raster(width: u32, height: u32) -> PageRaster {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        PageRaster {
            width,
            height,
            pixels,
        }
    }

    #[test]
    fn crop_takes_expected_window() {
        // 100x100 points rendered at 72 dpi: one pixel per point.
        let raster = gradient_raster(100, 100);
        let page = Rect::new(0.0, 0.0, 100.0, 100.0);
        let clip = Rect::new(10.0, 20.0, 40.0, 50.0);

        let crop = crop_raster(&raster, &page, &clip, 72.0);
        assert_eq!((crop.width, crop.height), (30, 30));
        // Top-left pixel of the crop is page pixel (10, 20).
        assert_eq!(&crop.pixels[..3], &[10, 20, 0]);
    }

    #[test]
    fn crop_respects_page_origin_offset() {
        let raster = gradient_raster(50, 50);
        let page = Rect::new(10.0, 10.0, 60.0, 60.0);
        let clip = Rect::new(10.0, 10.0, 20.0, 20.0);

        let crop = crop_raster(&raster, &page, &clip, 72.0);
        assert_eq!((crop.width, crop.height), (10, 10));
        assert_eq!(&crop.pixels[..3], &[0, 0, 0]);
    }

    #[test]
    fn png_round_trip_preserves_dimensions() {
        let raster = gradient_raster(8, 4);
        let bytes = encode_png(&raster).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
        assert_eq!(decoded.get_pixel(3, 2).0, [3, 2, 0]);
    }
}
