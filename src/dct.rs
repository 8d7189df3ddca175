//! # DCT 系数最低位编解码器
//!
//! 在 JPEG 的量化 DCT 系数上做 LSB 嵌入。系数不经过反变换，直接在量化后的
//! 整数上按二进制补码改写第 0 位，因此重新编码不会带来额外损失。
//!
//! 位置顺序：先按分量 (文件中的分量顺序)，再在每个分量的系数矩阵内按行优先。
//! 编码与解码都只依赖 [`collect_positions`] 给出的同一份位置列表。

use log::debug;
use rand::Rng;

use crate::capacity::dct_capacity_bits;
use crate::error::{Result, StegoError};
use crate::framing::BitFramer;
use crate::jpeg::{CoefficientPlane, JpegImage};
use crate::noise::NoiseInjector;

/// 一个可嵌入的系数位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub component: usize,
    pub row: usize,
    pub col: usize,
}

/// 按嵌入顺序排列的系数位置。
///
/// 位置由矩阵形状直接推算，不会逐个展开存储。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionList {
    /// 每个分量的 `(行数, 列数)`。
    shapes: Vec<(usize, usize)>,
    /// 每个分量第一个位置的序号。
    starts: Vec<usize>,
    len: usize,
}

/// 枚举所有分量的全部系数位置，分量优先、行优先。
pub fn collect_positions(planes: &[CoefficientPlane]) -> PositionList {
    let shapes: Vec<(usize, usize)> = planes.iter().map(|p| (p.rows, p.cols)).collect();
    let mut starts = Vec::with_capacity(shapes.len());
    let mut len = 0;
    for &(rows, cols) in &shapes {
        starts.push(len);
        len += rows * cols;
    }
    PositionList { shapes, starts, len }
}

impl PositionList {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 第 `k` 个位置。
    pub fn get(&self, k: usize) -> Option<Position> {
        if k >= self.len {
            return None;
        }
        let component = self.starts.partition_point(|&start| start <= k) - 1;
        let local = k - self.starts[component];
        let cols = self.shapes[component].1;
        Some(Position {
            component,
            row: local / cols,
            col: local % cols,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Position> + '_ {
        self.shapes
            .iter()
            .enumerate()
            .flat_map(|(component, &(rows, cols))| {
                (0..rows).flat_map(move |row| {
                    (0..cols).map(move |col| Position {
                        component,
                        row,
                        col,
                    })
                })
            })
    }
}

pub fn get_lsb(planes: &[CoefficientPlane], position: Position) -> u8 {
    (planes[position.component].get(position.row, position.col) & 1) as u8
}

/// 清除系数的第 0 位后写入 `bit`，对负数同样按补码处理。
pub fn set_lsb(planes: &mut [CoefficientPlane], position: Position, bit: u8) {
    let plane = &mut planes[position.component];
    let value = plane.get(position.row, position.col);
    plane.set(position.row, position.col, (value & !1) | i16::from(bit & 1));
}

/// JPEG 载体的 LSB 编解码器。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DctLsbCodec {
    framer: BitFramer,
}

impl DctLsbCodec {
    pub fn new(framer: BitFramer) -> Self {
        Self { framer }
    }

    /// 载体可嵌入的比特数 (含长度头)。
    pub fn capacity_bits(&self, carrier: &[u8]) -> Result<usize> {
        let jpeg = JpegImage::from_bytes(carrier)?;
        Ok(dct_capacity_bits(&jpeg.coefficient_planes()))
    }

    /// 把载荷写入系数矩阵，可选地在剩余位置上注入噪声。
    ///
    /// 容量检查在任何修改之前完成。
    pub fn embed_planes<R: Rng + ?Sized>(
        &self,
        planes: &mut [CoefficientPlane],
        payload: &[u8],
        noise: Option<&NoiseInjector>,
        rng: &mut R,
    ) -> Result<()> {
        let positions = collect_positions(planes);
        let bits = self.framer.pack(payload)?;
        if bits.len() > positions.len() {
            return Err(StegoError::CapacityExceeded {
                required: bits.len(),
                available: positions.len(),
            });
        }

        for (position, &bit) in positions.iter().zip(&bits) {
            set_lsb(planes, position, bit);
        }
        debug!(
            "Embedded {} bits into {} coefficient positions",
            bits.len(),
            positions.len()
        );

        if let Some(injector) = noise {
            injector.apply(planes, &positions, bits.len(), rng);
        }
        Ok(())
    }

    /// 从系数矩阵中读出载荷。
    ///
    /// # Errors
    ///
    /// * [`StegoError::InsufficientCapacity`] - 位置数不足一个长度头。
    /// * [`StegoError::DeclaredLengthExceedsCapacity`] - 声明的长度超出位置总数。
    /// * 帧解析错误，例如 [`StegoError::NonUtf8Payload`]。
    pub fn extract_planes(&self, planes: &[CoefficientPlane]) -> Result<String> {
        let positions = collect_positions(planes);
        let header_bits = self.framer.header_bits();
        if positions.len() < header_bits as usize {
            return Err(StegoError::InsufficientCapacity {
                available: positions.len(),
                header_bits,
            });
        }

        let header: Vec<u8> = positions
            .iter()
            .take(header_bits as usize)
            .map(|p| get_lsb(planes, p))
            .collect();
        let declared = self.framer.read_length(&header)?;
        let total = self.framer.frame_bits(declared);
        if total > positions.len() as u64 {
            return Err(StegoError::DeclaredLengthExceedsCapacity {
                declared,
                available: positions.len(),
            });
        }

        let bits: Vec<u8> = positions
            .iter()
            .take(total as usize)
            .map(|p| get_lsb(planes, p))
            .collect();
        self.framer.unpack(&bits)
    }

    /// 使用线程本地随机数源的 [`Self::encode_with_rng`]。
    pub fn encode(
        &self,
        carrier: &[u8],
        payload: &[u8],
        noise: Option<&NoiseInjector>,
    ) -> Result<Vec<u8>> {
        self.encode_with_rng(carrier, payload, noise, &mut rand::rng())
    }

    /// 解析 JPEG，嵌入载荷后重新编码。量化表与其余标记段保持不变。
    pub fn encode_with_rng<R: Rng + ?Sized>(
        &self,
        carrier: &[u8],
        payload: &[u8],
        noise: Option<&NoiseInjector>,
        rng: &mut R,
    ) -> Result<Vec<u8>> {
        let mut jpeg = JpegImage::from_bytes(carrier)?;
        let mut planes = jpeg.coefficient_planes();
        debug!(
            "JPEG carrier {}x{} with {} components",
            jpeg.frame().width,
            jpeg.frame().height,
            jpeg.component_count()
        );

        self.embed_planes(&mut planes, payload, noise, rng)?;
        jpeg.store_coefficient_planes(&planes)?;
        Ok(jpeg.to_bytes()?)
    }

    pub fn decode(&self, carrier: &[u8]) -> Result<String> {
        let jpeg = JpegImage::from_bytes(carrier)?;
        self.extract_planes(&jpeg.coefficient_planes())
    }
}
