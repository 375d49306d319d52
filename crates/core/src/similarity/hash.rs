//! Perceptual difference hash (dHash).
//!
//! The frame is shrunk to `(n + 1) × n` and each bit records whether
//! brightness increases from one column to the next. Robust to JPEG
//! recompression and mild exposure changes, sensitive to missing parts.

use image::imageops::{self, FilterType};
use image::GrayImage;

/// Compute the `n × n` bit signature of a grayscale frame.
pub fn difference_hash(frame: &GrayImage, hash_size: u32) -> Vec<bool> {
    let n = hash_size.max(2);
    let small = imageops::resize(frame, n + 1, n, FilterType::Triangle);

    let mut bits = Vec::with_capacity((n * n) as usize);
    for y in 0..n {
        for x in 0..n {
            let left = small.get_pixel(x, y)[0];
            let right = small.get_pixel(x + 1, y)[0];
            bits.push(left < right);
        }
    }
    bits
}

/// Normalized Hamming similarity between two signatures, as a percentage.
pub fn hash_similarity(a: &[bool], b: &[bool]) -> f64 {
    let len = a.len().max(b.len());
    if len == 0 {
        return 0.0;
    }

    let distance = (0..len)
        .filter(|&i| a.get(i).copied().unwrap_or(false) != b.get(i).copied().unwrap_or(false))
        .count();

    (1.0 - distance as f64 / len as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient(reverse: bool) -> GrayImage {
        GrayImage::from_fn(64, 64, |x, _| {
            let v = (x * 4) as u8;
            Luma([if reverse { 255 - v } else { v }])
        })
    }

    #[test]
    fn identical_frames_hash_equal() {
        let frame = gradient(false);
        let a = difference_hash(&frame, 8);
        let b = difference_hash(&frame, 8);
        assert_eq!(a.len(), 64);
        assert_eq!(hash_similarity(&a, &b), 100.0);
    }

    #[test]
    fn mirrored_gradient_hash_differs_completely() {
        let a = difference_hash(&gradient(false), 8);
        let b = difference_hash(&gradient(true), 8);
        assert_eq!(hash_similarity(&a, &b), 0.0);
    }

    #[test]
    fn empty_signatures_are_dissimilar() {
        assert_eq!(hash_similarity(&[], &[]), 0.0);
    }
}
