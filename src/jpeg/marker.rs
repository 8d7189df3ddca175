//! 标记段遍历。
//!
//! 从 SOI 走到 EOI，除 SOI 外的每个段都原样保留，以便重新编码时
//! 按原顺序写回 (APPn、COM、DQT 等都不会被改动)。每个 SOS 之后的熵编码数据
//! 只记录起始偏移，由扫描解码器读取。

use super::error::{JpegError, Result};

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOF0: u8 = 0xC0;
pub const SOF1: u8 = 0xC1;
pub const SOF2: u8 = 0xC2;
pub const DHT: u8 = 0xC4;
pub const SOS: u8 = 0xDA;
pub const DQT: u8 = 0xDB;
pub const DRI: u8 = 0xDD;

/// 一个带长度字段的标记段，`data` 不含标记与长度本身。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub marker: u8,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let length = (self.data.len() + 2) as u16;
        out.extend_from_slice(&[0xFF, self.marker]);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&self.data);
    }
}

/// SOS 中的一个分量选择子。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSelector {
    pub component_id: u8,
    pub dc_table: u8,
    pub ac_table: u8,
}

/// 扫描覆盖的之字形频带 `ss..=se` 与逐次逼近位 `ah`/`al`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

impl Band {
    /// 顺序扫描：一次写完全部 64 个系数。
    pub const FULL: Band = Band {
        ss: 0,
        se: 63,
        ah: 0,
        al: 0,
    };

    /// 检查频带参数对顺序或渐进式帧是否合法 (T.81 G.1.1.1)。
    pub fn check(self, progressive: bool, components: usize) -> Result<()> {
        let invalid = |reason| {
            Err(JpegError::InvalidSegment {
                segment: "SOS",
                reason,
            })
        };
        if !progressive {
            return if self == Band::FULL {
                Ok(())
            } else {
                invalid("spectral selection is not baseline")
            };
        }
        if self.se > 63 || self.ss > self.se || (self.ss == 0) != (self.se == 0) {
            return invalid("invalid spectral selection");
        }
        if self.ss > 0 && components != 1 {
            return invalid("AC scan must contain a single component");
        }
        if self.al > 13 || (self.ah != 0 && self.ah != self.al + 1) {
            return invalid("invalid successive approximation");
        }
        Ok(())
    }
}

/// SOS 段体：分量选择子与频带。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    pub selectors: Vec<ScanSelector>,
    pub band: Band,
}

/// 读取 SOI 之后直到 EOI 的所有段。
///
/// 返回段列表与每个 SOS 的熵编码数据起始偏移 (按 SOS 出现的顺序)。
/// 最后一个扫描之后缺少 EOI 的截断文件也可接受。
pub fn read_segments(data: &[u8]) -> Result<(Vec<Segment>, Vec<usize>)> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(JpegError::MissingSoi);
    }

    let mut segments = Vec::new();
    let mut scan_starts = Vec::new();
    let mut pos = 2;

    loop {
        // 标记前允许任意数量的 0xFF 填充
        while pos < data.len() && data[pos] != 0xFF {
            pos += 1;
        }
        while pos + 1 < data.len() && data[pos + 1] == 0xFF {
            pos += 1;
        }
        if pos + 1 >= data.len() {
            if scan_starts.is_empty() {
                return Err(JpegError::UnexpectedEof);
            }
            return Ok((segments, scan_starts));
        }
        let marker = data[pos + 1];
        pos += 2;

        match marker {
            0x00 | 0x01 | 0xD0..=0xD7 => continue,
            EOI if scan_starts.is_empty() => {
                return Err(JpegError::InvalidSegment {
                    segment: "SOS",
                    reason: "no scan before EOI",
                });
            }
            EOI => return Ok((segments, scan_starts)),
            0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                return Err(JpegError::UnsupportedFrame(marker));
            }
            _ => {}
        }

        if pos + 2 > data.len() {
            return Err(JpegError::UnexpectedEof);
        }
        let length = usize::from(u16::from_be_bytes([data[pos], data[pos + 1]]));
        if length < 2 || pos + length > data.len() {
            return Err(JpegError::UnexpectedEof);
        }
        segments.push(Segment {
            marker,
            data: data[pos + 2..pos + length].to_vec(),
        });
        pos += length;

        if marker == SOS {
            scan_starts.push(pos);
            pos = skip_entropy_data(data, pos);
        }
    }
}

/// 跳过熵编码数据 (含填充字节与 RST)，返回下一个真正标记的 0xFF 位置。
fn skip_entropy_data(data: &[u8], mut pos: usize) -> usize {
    while pos + 1 < data.len() {
        if data[pos] == 0xFF {
            match data[pos + 1] {
                0x00 | 0xD0..=0xD7 => pos += 2,
                0xFF => pos += 1,
                _ => return pos,
            }
        } else {
            pos += 1;
        }
    }
    data.len()
}

/// 解析 SOS 段体中的分量选择子与频带参数。
pub fn parse_sos(data: &[u8]) -> Result<ScanHeader> {
    const SEGMENT: &str = "SOS";
    let count = usize::from(*data.first().ok_or(JpegError::UnexpectedEof)?);
    if count == 0 || count > 4 {
        return Err(JpegError::InvalidSegment {
            segment: SEGMENT,
            reason: "component count must be 1 to 4",
        });
    }
    if data.len() < 1 + count * 2 + 3 {
        return Err(JpegError::UnexpectedEof);
    }

    let params = &data[1 + count * 2..];
    let band = Band {
        ss: params[0],
        se: params[1],
        ah: params[2] >> 4,
        al: params[2] & 0x0F,
    };

    let selectors = data[1..1 + count * 2]
        .chunks_exact(2)
        .map(|pair| {
            let (dc_table, ac_table) = (pair[1] >> 4, pair[1] & 0x0F);
            if dc_table > 3 || ac_table > 3 {
                return Err(JpegError::InvalidSegment {
                    segment: SEGMENT,
                    reason: "Huffman table id out of range",
                });
            }
            Ok(ScanSelector {
                component_id: pair[0],
                dc_table,
                ac_table,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ScanHeader { selectors, band })
}

/// 生成覆盖全部 64 个系数的顺序扫描 SOS 段体。
pub fn sos_body(selectors: &[ScanSelector]) -> Vec<u8> {
    let mut body = Vec::with_capacity(selectors.len() * 2 + 4);
    body.push(selectors.len() as u8);
    for sel in selectors {
        body.extend_from_slice(&[sel.component_id, (sel.dc_table << 4) | sel.ac_table]);
    }
    body.extend_from_slice(&[0, 63, 0]);
    body
}

pub fn parse_dri(data: &[u8]) -> Result<u16> {
    match data {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(JpegError::UnexpectedEof),
    }
}
