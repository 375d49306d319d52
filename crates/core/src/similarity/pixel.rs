use image::GrayImage;

/// `100 × (1 − mean |a − b| / 255)` over two equally sized grayscale frames.
pub fn pixel_similarity(a: &GrayImage, b: &GrayImage) -> f64 {
    if a.dimensions() != b.dimensions() || a.as_raw().is_empty() {
        return 0.0;
    }

    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    let mean = total as f64 / a.as_raw().len() as f64;

    (1.0 - mean / 255.0) * 100.0
}
