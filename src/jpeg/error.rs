//! JPEG 解析与编码错误。

use thiserror::Error;

/// 解析或重新编码 JPEG 码流时可能出现的错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JpegError {
    /// 数据在预期位置之前结束。
    #[error("unexpected end of JPEG data")]
    UnexpectedEof,

    /// 文件不以 SOI (0xFFD8) 开头。
    #[error("missing SOI marker, not a JPEG stream")]
    MissingSoi,

    /// 无损、分层或算术编码等本编解码器不处理的帧类型。
    #[error("unsupported JPEG frame type: 0xFF{0:02X}")]
    UnsupportedFrame(u8),

    #[error("unsupported sample precision: {0}-bit")]
    UnsupportedPrecision(u8),

    /// 标记段长度或内容不合法。
    #[error("invalid {segment} segment: {reason}")]
    InvalidSegment {
        segment: &'static str,
        reason: &'static str,
    },

    #[error("scan references unknown component id {0}")]
    UnknownComponent(u8),

    /// 所有扫描加起来仍有分量没有被编码。
    #[error("scans cover only {scanned} of {total} components")]
    PartialScan { scanned: usize, total: usize },

    #[error("Huffman table {class} #{id} is not defined")]
    MissingHuffmanTable { class: &'static str, id: u8 },

    /// 熵编码数据中出现无法识别的哈夫曼码。
    #[error("invalid Huffman code in scan data")]
    InvalidHuffmanCode,

    /// 当前哈夫曼表缺少某个需要编码的符号。
    #[error("Huffman table has no code for symbol 0x{0:02X}")]
    MissingHuffmanCode(u8),

    #[error("expected {expected} coefficient planes, got {given}")]
    PlaneCountMismatch { given: usize, expected: usize },

    /// 写回的系数矩阵与图像几何不一致。
    #[error("coefficient plane {component} has shape {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    PlaneShapeMismatch {
        component: usize,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
}

pub type Result<T> = std::result::Result<T, JpegError>;
