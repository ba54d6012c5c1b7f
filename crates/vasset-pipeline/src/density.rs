//! Visual information-density scoring.
//!
//! A cheap, deterministic proxy for "how much is on screen": no OCR, no
//! ASR, no external engine. The score combines four signals, weighted to
//! favor frames carrying text (slides, diagrams, captions) over talking
//! heads with busy backgrounds:
//!
//!   0.40 * text_likelihood + 0.25 * content_concentration
//! + 0.20 * edge_density    + 0.15 * luminance_variance
//!
//! All four signals are normalized to [0, 1]. Unreadable images score 0.

use image::GrayImage;
use std::path::Path;

/// Number of horizontal strips analyzed for text banding.
const TEXT_STRIPS: u32 = 30;

/// Score an image file. Returns 0.0 when the file cannot be decoded.
pub fn score_image(path: &Path) -> f64 {
    let gray = match image::open(path) {
        Ok(img) => img.to_luma8(),
        Err(_) => return 0.0,
    };
    score_gray(&gray)
}

/// Score a decoded grayscale frame.
pub fn score_gray(gray: &GrayImage) -> f64 {
    let edges = edge_map(gray);

    let variance = luminance_variance(gray);
    let density = edge_density(&edges);
    let concentration = content_concentration(&edges);
    let text = text_likelihood(&edges);

    let score = 0.40 * text + 0.25 * concentration + 0.20 * density + 0.15 * variance;
    round4(score)
}

/// 3x3 edge response (8-connected Laplacian), clamped to u8 range.
fn edge_map(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = 8i32 * gray.get_pixel(x, y)[0] as i32;
            let mut neighbors = 0i32;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let px = (x as i32 + dx) as u32;
                    let py = (y as i32 + dy) as u32;
                    neighbors += gray.get_pixel(px, py)[0] as i32;
                }
            }
            let response = (center - neighbors).clamp(0, 255) as u8;
            out.put_pixel(x, y, image::Luma([response]));
        }
    }
    out
}

/// Pixel variance normalized by 10000 (roughly half-black/half-white).
fn luminance_variance(gray: &GrayImage) -> f64 {
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64;
    let variance = pixels
        .iter()
        .map(|&p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / pixels.len() as f64;
    (variance / 10000.0).min(1.0)
}

/// Mean edge response normalized by 100.
fn edge_density(edges: &GrayImage) -> f64 {
    let pixels = edges.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64;
    (mean / 100.0).min(1.0)
}

/// Coefficient of variation of edge density over a 3x3 grid.
///
/// Concentrated complexity (text blocks, diagrams) scores high; uniform
/// complexity (a busy background everywhere) scores low. Blank or tiny
/// frames get the neutral 0.5.
fn content_concentration(edges: &GrayImage) -> f64 {
    let (w, h) = edges.dimensions();
    if w < 3 || h < 3 {
        return 0.5;
    }

    let grid_w = w / 3;
    let grid_h = h / 3;
    let mut region_means = Vec::with_capacity(9);

    for row in 0..3u32 {
        for col in 0..3u32 {
            let left = col * grid_w;
            let top = row * grid_h;
            let right = if col < 2 { left + grid_w } else { w };
            let bottom = if row < 2 { top + grid_h } else { h };

            let mut sum = 0u64;
            let mut count = 0u64;
            for y in top..bottom {
                for x in left..right {
                    sum += edges.get_pixel(x, y)[0] as u64;
                    count += 1;
                }
            }
            if count > 0 {
                region_means.push(sum as f64 / count as f64);
            }
        }
    }

    if region_means.len() < 2 {
        return 0.5;
    }

    let mean = region_means.iter().sum::<f64>() / region_means.len() as f64;
    if mean < 0.01 {
        return 0.5;
    }

    let variance = region_means
        .iter()
        .map(|d| {
            let diff = d - mean;
            diff * diff
        })
        .sum::<f64>()
        / region_means.len() as f64;
    let cv = (variance.sqrt() / mean).min(2.0);

    round4((cv / 0.8).min(1.0))
}

/// Horizontal edge-band analysis: text lines produce distinct peaks in
/// per-strip edge density.
fn text_likelihood(edges: &GrayImage) -> f64 {
    let (w, h) = edges.dimensions();
    if h < TEXT_STRIPS * 2 {
        return 0.5;
    }

    let strip_height = h / TEXT_STRIPS;
    let mut strip_means = Vec::with_capacity(TEXT_STRIPS as usize);

    for i in 0..TEXT_STRIPS {
        let top = i * strip_height;
        let bottom = if i < TEXT_STRIPS - 1 {
            top + strip_height
        } else {
            h
        };

        let mut sum = 0u64;
        let mut count = 0u64;
        for y in top..bottom {
            for x in 0..w {
                sum += edges.get_pixel(x, y)[0] as u64;
                count += 1;
            }
        }
        strip_means.push(if count > 0 {
            sum as f64 / count as f64
        } else {
            0.0
        });
    }

    let mean = strip_means.iter().sum::<f64>() / strip_means.len() as f64;
    if mean < 2.0 {
        return 0.0;
    }

    let peak_threshold = mean * 1.5;
    let high_threshold = mean * 2.0;
    let peaks = strip_means.iter().filter(|&&d| d > peak_threshold).count();
    let strong_peaks = strip_means.iter().filter(|&&d| d > high_threshold).count();

    let variance = strip_means
        .iter()
        .map(|d| {
            let diff = d - mean;
            diff * diff
        })
        .sum::<f64>()
        / strip_means.len() as f64;
    let cv = variance.sqrt() / mean;

    let peak_score = (peaks as f64 / 10.0).min(1.0);
    let cv_score = (cv / 0.8).min(1.0);
    let strong_peak_score = (strong_peaks as f64 / 5.0).min(1.0);

    round4(0.3 * peak_score + 0.4 * cv_score + 0.3 * strong_peak_score)
}

fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn flat(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    /// Alternating black/white text-like bands.
    fn banded(width: u32, height: u32) -> GrayImage {
        let mut img = flat(width, height, 255);
        let mut y = 10;
        while y + 4 < height {
            for yy in y..y + 4 {
                for x in 4..width - 4 {
                    img.put_pixel(x, yy, Luma([0]));
                }
            }
            y += 12;
        }
        img
    }

    #[test]
    fn test_flat_frame_scores_near_zero() {
        let img = flat(96, 96, 128);
        let score = score_gray(&img);
        // Neutral concentration (blank) contributes 0.25 * 0.5 at most.
        assert!(score <= 0.2, "flat frame scored {}", score);
    }

    #[test]
    fn test_banded_frame_outscores_flat() {
        let flat_score = score_gray(&flat(192, 192, 128));
        let banded_score = score_gray(&banded(192, 192));
        assert!(
            banded_score > flat_score,
            "banded {} <= flat {}",
            banded_score,
            flat_score
        );
    }

    #[test]
    fn test_score_is_deterministic() {
        let img = banded(192, 192);
        assert_eq!(score_gray(&img), score_gray(&img));
    }

    #[test]
    fn test_unreadable_image_scores_zero() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert_eq!(score_image(&path), 0.0);
    }

    #[test]
    fn test_tiny_image_is_safe() {
        let img = flat(2, 2, 10);
        let score = score_gray(&img);
        assert!((0.0..=1.0).contains(&score));
    }
}
