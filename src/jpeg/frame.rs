//! SOF 帧头：图像尺寸、分量与采样因子。

use super::error::{JpegError, Result};

/// SOF 中声明的一个分量。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: u8,
    pub h_sampling: u8,
    pub v_sampling: u8,
    pub quant_table: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    pub components: Vec<Component>,
    pub max_h: u8,
    pub max_v: u8,
    /// 水平方向的 MCU 数。
    pub mcus_wide: usize,
    /// 垂直方向的 MCU 数。
    pub mcus_tall: usize,
}

impl Frame {
    /// 解析 SOF0/SOF1 段体 (长度字段之后的部分)。
    pub fn parse(data: &[u8]) -> Result<Self> {
        const SEGMENT: &str = "SOF";
        if data.len() < 6 {
            return Err(JpegError::UnexpectedEof);
        }
        if data[0] != 8 {
            return Err(JpegError::UnsupportedPrecision(data[0]));
        }
        let height = u16::from_be_bytes([data[1], data[2]]);
        let width = u16::from_be_bytes([data[3], data[4]]);
        let count = usize::from(data[5]);
        if width == 0 || height == 0 {
            return Err(JpegError::InvalidSegment {
                segment: SEGMENT,
                reason: "zero image dimension",
            });
        }
        if count == 0 || count > 4 {
            return Err(JpegError::InvalidSegment {
                segment: SEGMENT,
                reason: "component count must be 1 to 4",
            });
        }
        if data.len() < 6 + count * 3 {
            return Err(JpegError::UnexpectedEof);
        }

        let components = data[6..6 + count * 3]
            .chunks_exact(3)
            .map(|c| {
                let (h, v) = (c[1] >> 4, c[1] & 0x0F);
                if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
                    return Err(JpegError::InvalidSegment {
                        segment: SEGMENT,
                        reason: "sampling factor out of range",
                    });
                }
                if c[2] > 3 {
                    return Err(JpegError::InvalidSegment {
                        segment: SEGMENT,
                        reason: "quantization table id out of range",
                    });
                }
                Ok(Component {
                    id: c[0],
                    h_sampling: h,
                    v_sampling: v,
                    quant_table: c[2],
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let max_h = components.iter().map(|c| c.h_sampling).max().unwrap_or(1);
        let max_v = components.iter().map(|c| c.v_sampling).max().unwrap_or(1);

        Ok(Self {
            width,
            height,
            mcus_wide: usize::from(width).div_ceil(usize::from(max_h) * 8),
            mcus_tall: usize::from(height).div_ceil(usize::from(max_v) * 8),
            components,
            max_h,
            max_v,
        })
    }

    /// 分量在 MCU 对齐后的块网格尺寸 `(宽, 高)`。
    pub fn padded_blocks(&self, component: usize) -> (usize, usize) {
        let c = &self.components[component];
        (
            self.mcus_wide * usize::from(c.h_sampling),
            self.mcus_tall * usize::from(c.v_sampling),
        )
    }

    /// 分量真正覆盖图像的块数 `(宽, 高)`，不含 MCU 填充块。
    pub fn visible_blocks(&self, component: usize) -> (usize, usize) {
        let c = &self.components[component];
        let wide = (usize::from(self.width) * usize::from(c.h_sampling))
            .div_ceil(usize::from(self.max_h) * 8);
        let tall = (usize::from(self.height) * usize::from(c.v_sampling))
            .div_ceil(usize::from(self.max_v) * 8);
        (wide, tall)
    }
}
