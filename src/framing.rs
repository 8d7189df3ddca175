//! # 帧协议
//!
//! 载荷以 "长度头 + 数据" 的形式写入载体：长度头是大端无符号整数
//! (默认 32 位，单位为字节)，随后是载荷本身。所有字节按 MSB 优先展开成比特流，
//! 两种编解码器共用同一套帧格式。

use log::debug;

use crate::constants::{DEFAULT_HEADER_BITS, SUPPORTED_HEADER_BITS};
use crate::error::{Result, StegoError};

/// 比特流：每个元素是 0 或 1。
pub type BitStream = Vec<u8>;

/// 载荷与比特流之间的转换器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitFramer {
    header_bits: u32,
}

impl Default for BitFramer {
    fn default() -> Self {
        Self {
            header_bits: DEFAULT_HEADER_BITS,
        }
    }
}

impl BitFramer {
    /// 使用指定宽度的长度头，宽度只能是 8、16、24 或 32 位。
    pub fn new(header_bits: u32) -> Result<Self> {
        if SUPPORTED_HEADER_BITS.contains(&header_bits) {
            Ok(Self { header_bits })
        } else {
            Err(StegoError::InvalidHeaderWidth(header_bits))
        }
    }

    pub fn header_bits(&self) -> u32 {
        self.header_bits
    }

    fn header_len(&self) -> usize {
        self.header_bits as usize
    }

    /// 长度为 `declared` 字节的载荷成帧后的总比特数。
    pub fn frame_bits(&self, declared: u64) -> u64 {
        u64::from(self.header_bits).saturating_add(declared.saturating_mul(8))
    }

    /// 把载荷打包成比特流：长度头在前，数据在后，均为 MSB 优先。
    ///
    /// # Errors
    ///
    /// 载荷长度达到 `2^header_bits` 字节时返回 [`StegoError::PayloadTooLarge`]。
    pub fn pack(&self, payload: &[u8]) -> Result<BitStream> {
        let len = payload.len() as u64;
        if len >> self.header_bits != 0 {
            return Err(StegoError::PayloadTooLarge {
                len: payload.len(),
                header_bits: self.header_bits,
            });
        }

        let mut bits = Vec::with_capacity(self.header_len() + payload.len() * 8);
        bits.extend((0..self.header_bits).rev().map(|i| ((len >> i) & 1) as u8));
        bits.extend(
            payload
                .iter()
                .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1)),
        );
        debug!(
            "Framed {} payload bytes into {} bits",
            payload.len(),
            bits.len()
        );
        Ok(bits)
    }

    /// 读取比特流开头的长度头，返回声明的载荷字节数。
    pub fn read_length(&self, bits: &[u8]) -> Result<u64> {
        let header = bits
            .get(..self.header_len())
            .ok_or(StegoError::TruncatedHeader {
                available: bits.len(),
                header_bits: self.header_bits,
            })?;
        Ok(header
            .iter()
            .fold(0u64, |acc, &bit| (acc << 1) | u64::from(bit & 1)))
    }

    /// 从比特流中解出载荷文本，长度头之后多余的比特被忽略。
    ///
    /// # Errors
    ///
    /// * [`StegoError::TruncatedHeader`] - 比特数不足一个长度头。
    /// * [`StegoError::TruncatedPayload`] - 剩余比特不足声明的长度。
    /// * [`StegoError::NonUtf8Payload`] - 数据不是合法的 UTF-8。
    pub fn unpack(&self, bits: &[u8]) -> Result<String> {
        let declared = self.read_length(bits)?;
        let required = self.frame_bits(declared);
        if required > bits.len() as u64 {
            return Err(StegoError::TruncatedPayload {
                required: usize::try_from(required).unwrap_or(usize::MAX),
                available: bits.len(),
            });
        }

        let data = &bits[self.header_len()..required as usize];
        let bytes: Vec<u8> = data
            .chunks_exact(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | (bit & 1)))
            .collect();
        String::from_utf8(bytes).map_err(StegoError::NonUtf8Payload)
    }
}
