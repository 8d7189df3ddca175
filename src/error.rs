//! # 错误类型
//!
//! 隐写核心对外暴露的唯一错误枚举，按容量、帧完整性和格式路由分组。
//! 所有容量类错误都在修改载体之前产生。

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

use crate::jpeg::JpegError;

#[derive(Debug, Error)]
pub enum StegoError {
    /// 载荷长度无法用帧头表示。
    #[error("payload of {len} bytes does not fit a {header_bits}-bit length header")]
    PayloadTooLarge { len: usize, header_bits: u32 },

    /// 帧 (帧头 + 数据) 的比特数超出载体容量。
    #[error("Not enough space in the carrier: {required} bits required, {available} bits available")]
    CapacityExceeded { required: usize, available: usize },

    /// 载体连帧头都放不下。
    #[error("carrier has {available} embeddable bits, fewer than the {header_bits}-bit header")]
    InsufficientCapacity { available: usize, header_bits: u32 },

    /// 帧头声明的长度超出载体所能容纳的范围。
    #[error("declared payload length of {declared} bytes exceeds carrier capacity of {available} bits")]
    DeclaredLengthExceedsCapacity { declared: u64, available: usize },

    #[error("bit stream ends inside the {header_bits}-bit length header ({available} bits)")]
    TruncatedHeader { available: usize, header_bits: u32 },

    #[error("bit stream ends inside the payload: {required} bits declared, {available} available")]
    TruncatedPayload { required: usize, available: usize },

    #[error("recovered payload is not valid UTF-8 text")]
    NonUtf8Payload(#[source] FromUtf8Error),

    /// 无法根据扩展名选择编解码器，或输入输出需要不同的编解码器。
    #[error("unsupported carrier format: {0}")]
    UnsupportedFormat(String),

    /// 载体数据无法按预期格式解析或写出。
    #[error("cannot process {format} carrier")]
    CodecFormat {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("noise ratio must be within [0, 1], got {0}")]
    InvalidNoiseRatio(f64),

    #[error("header width must be 8, 16, 24 or 32 bits, got {0}")]
    InvalidHeaderWidth(u32),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<JpegError> for StegoError {
    fn from(e: JpegError) -> Self {
        StegoError::CodecFormat {
            format: "JPEG",
            source: Box::new(e),
        }
    }
}

impl From<image::ImageError> for StegoError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => StegoError::Io(io),
            other => StegoError::CodecFormat {
                format: "raster image",
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, StegoError>;
