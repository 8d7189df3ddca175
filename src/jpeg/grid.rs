//! 量化 DCT 系数的存储。
//!
//! [`BlockGrid`] 保存一个分量在 MCU 对齐后的全部块 (含填充块)，
//! [`CoefficientPlane`] 是对外暴露的二维视图：只覆盖可见块，
//! 元素 `(r, c)` 对应块 `(r / 8, c / 8)` 中自然顺序的第 `(r % 8, c % 8)` 个系数。

use super::error::{JpegError, Result};

/// 一个分量的块网格，每块 64 个系数，按自然顺序存放。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockGrid {
    blocks_wide: usize,
    blocks_tall: usize,
    coefficients: Vec<i16>,
}

impl BlockGrid {
    pub fn new(blocks_wide: usize, blocks_tall: usize) -> Self {
        Self {
            blocks_wide,
            blocks_tall,
            coefficients: vec![0; blocks_wide * blocks_tall * 64],
        }
    }

    pub fn block(&self, bx: usize, by: usize) -> &[i16] {
        let start = self.offset(bx, by);
        &self.coefficients[start..start + 64]
    }

    pub fn block_mut(&mut self, bx: usize, by: usize) -> &mut [i16] {
        let start = self.offset(bx, by);
        &mut self.coefficients[start..start + 64]
    }

    /// 取出左上角 `wide x tall` 个块组成的平面。
    pub fn to_plane(&self, wide: usize, tall: usize) -> CoefficientPlane {
        let mut plane = CoefficientPlane::zeros(tall * 8, wide * 8);
        for by in 0..tall {
            for bx in 0..wide {
                let block = self.block(bx, by);
                for (i, &value) in block.iter().enumerate() {
                    plane.set(by * 8 + i / 8, bx * 8 + i % 8, value);
                }
            }
        }
        plane
    }

    /// 把平面写回左上角的块，平面之外的填充块保持不变。
    pub fn store_plane(&mut self, plane: &CoefficientPlane) {
        let (wide, tall) = (plane.cols / 8, plane.rows / 8);
        for by in 0..tall {
            for bx in 0..wide {
                let block = self.block_mut(bx, by);
                for (i, slot) in block.iter_mut().enumerate() {
                    *slot = plane.get(by * 8 + i / 8, bx * 8 + i % 8);
                }
            }
        }
    }

    fn offset(&self, bx: usize, by: usize) -> usize {
        debug_assert!(bx < self.blocks_wide && by < self.blocks_tall);
        (by * self.blocks_wide + bx) * 64
    }
}

/// 一个分量的系数矩阵，行优先存储。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientPlane {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<i16>,
}

impl CoefficientPlane {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0; rows * cols],
        }
    }

    /// 用已有数据构造平面，长度必须等于 `rows * cols`。
    pub fn from_values(rows: usize, cols: usize, values: Vec<i16>) -> Option<Self> {
        (values.len() == rows * cols).then_some(Self { rows, cols, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> i16 {
        self.values[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: i16) {
        self.values[row * self.cols + col] = value;
    }

    pub(crate) fn check_shape(&self, component: usize, rows: usize, cols: usize) -> Result<()> {
        if self.rows == rows && self.cols == cols && self.values.len() == rows * cols {
            Ok(())
        } else {
            Err(JpegError::PlaneShapeMismatch {
                component,
                rows: self.rows,
                cols: self.cols,
                expected_rows: rows,
                expected_cols: cols,
            })
        }
    }
}
