//! # 容量计算
//!
//! 容量只取决于载体的几何结构：像素载体每像素 3 位，JPEG 载体每个系数 1 位。

use crate::constants::{BITS_PER_PIXEL, DEFAULT_HEADER_BITS};
use crate::jpeg::CoefficientPlane;

/// 像素载体的容量 (比特)。
pub fn pixel_capacity_bits(width: u32, height: u32) -> usize {
    width as usize * height as usize * BITS_PER_PIXEL
}

/// JPEG 载体的容量 (比特)：所有分量系数矩阵的元素总数，零系数也计入。
pub fn dct_capacity_bits(planes: &[CoefficientPlane]) -> usize {
    planes.iter().map(CoefficientPlane::len).sum()
}

/// 扣除 32 位长度头后，可容纳的载荷字节数。仅用于向用户报告。
pub fn usable_capacity_bytes(bits: usize) -> usize {
    usable_capacity_bytes_with(bits, DEFAULT_HEADER_BITS)
}

/// 与 [`usable_capacity_bytes`] 相同，但长度头宽度由调用者给出。
pub fn usable_capacity_bytes_with(bits: usize, header_bits: u32) -> usize {
    (bits / 8).saturating_sub(header_bits as usize / 8)
}
