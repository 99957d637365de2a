use log::{debug, LevelFilter};
use opencv::prelude::*;
use opencv::{core, imgproc};

/// Initialize logging; later calls are no-ops.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies.
pub fn init_logging(default_filter: LevelFilter) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.try_init().ok();
}

/// Scale image for display in a window (max dimension 1000px)
pub fn scale_for_display(image: &Mat) -> opencv::Result<Mat> {
    let max_dimension = 1000.0;
    let height = image.rows() as f64;
    let width = image.cols() as f64;

    let scale = if width > height {
        if width > max_dimension { max_dimension / width } else { 1.0 }
    } else if height > max_dimension {
        max_dimension / height
    } else {
        1.0
    };

    if scale < 1.0 {
        let new_width = (width * scale) as i32;
        let new_height = (height * scale) as i32;
        let mut scaled = Mat::default();
        imgproc::resize(image, &mut scaled, core::Size::new(new_width, new_height), 0.0, 0.0, imgproc::INTER_AREA)?;
        debug!("Scaled image for display: {}x{} -> {}x{} (scale: {:.2})",
               width as i32, height as i32, new_width, new_height, scale);
        Ok(scaled)
    } else {
        image.try_clone()
    }
}

/// Convert a decoded frame to single-channel intensity.
pub fn to_gray(image: &Mat) -> opencv::Result<Mat> {
    let mut gray = Mat::default();
    match image.channels() {
        1 => gray = image.try_clone()?,
        4 => imgproc::cvt_color(image, &mut gray, imgproc::COLOR_BGRA2GRAY, 0)?,
        _ => imgproc::cvt_color(image, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?,
    }
    Ok(gray)
}

/// True when `image` is at least as large as `window` in both dimensions.
pub fn fits_window(image: &Mat, window: core::Size) -> bool {
    image.cols() >= window.width && image.rows() >= window.height
}

/// Intersection of `rect` with an image of `bounds` size, `None` when empty.
pub fn clip_to_bounds(rect: core::Rect, bounds: core::Size) -> Option<core::Rect> {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + rect.width).min(bounds.width);
    let y1 = (rect.y + rect.height).min(bounds.height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(core::Rect::new(x0, y0, x1 - x0, y1 - y0))
}

/// Get supported image file extensions
pub fn get_supported_extensions() -> Vec<&'static str> {
    vec!["jpg", "jpeg", "png", "bmp", "tif", "tiff", "pgm", "ppm", "webp"]
}

/// Check if a file has a supported image extension
pub fn is_supported_image(extension: &str) -> bool {
    let ext_lower = extension.to_lowercase();
    get_supported_extensions().contains(&ext_lower.as_str())
}
