//! # 图像质量评估
//!
//! 计算载体与隐写结果之间的峰值信噪比 (PSNR)，用于衡量嵌入带来的失真。

use std::fmt;

use image::DynamicImage;
use thiserror::Error;

use crate::constants::IDENTICAL_PSNR;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("image dimensions differ: {left:?} vs {right:?}")]
pub struct DimensionMismatch {
    pub left: (u32, u32),
    pub right: (u32, u32),
}

/// 在 8 位 RGB 上计算 PSNR (dB)。两幅图完全相同时返回 100。
pub fn psnr(original: &DynamicImage, stego: &DynamicImage) -> Result<f64, DimensionMismatch> {
    let (a, b) = (original.to_rgb8(), stego.to_rgb8());
    if a.dimensions() != b.dimensions() {
        return Err(DimensionMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }

    let samples = a.as_raw().len();
    if samples == 0 {
        return Ok(IDENTICAL_PSNR);
    }
    let squared: f64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum();
    let mse = squared / samples as f64;
    if mse == 0.0 {
        return Ok(IDENTICAL_PSNR);
    }
    Ok(20.0 * (255.0 / mse.sqrt()).log10())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityGrade {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl QualityGrade {
    pub fn from_psnr(psnr: f64) -> Self {
        if psnr > 40.0 {
            QualityGrade::Excellent
        } else if psnr > 30.0 {
            QualityGrade::Good
        } else if psnr > 20.0 {
            QualityGrade::Acceptable
        } else {
            QualityGrade::Poor
        }
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityGrade::Excellent => "excellent (imperceptible)",
            QualityGrade::Good => "good",
            QualityGrade::Acceptable => "acceptable",
            QualityGrade::Poor => "poor (visible distortion)",
        };
        f.write_str(label)
    }
}
