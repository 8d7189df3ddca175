//! 哈夫曼表：DHT 解析、解码/编码查找表，以及按符号统计重建最优表。

use super::bitio::BitReader;
use super::error::{JpegError, Result};

/// 0 = DC 表，1 = AC 表。
pub const DC_CLASS: u8 = 0;
pub const AC_CLASS: u8 = 1;

/// DHT 段中的一张表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanSpec {
    pub class: u8,
    pub id: u8,
    /// `counts[i]` 为长度 `i + 1` 的码字数量。
    pub counts: [u8; 16],
    /// 按码长递增排列的符号。
    pub symbols: Vec<u8>,
}

impl HuffmanSpec {
    /// 按 DHT 格式追加到 `out` (不含标记与长度字段)。
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push((self.class << 4) | self.id);
        out.extend_from_slice(&self.counts);
        out.extend_from_slice(&self.symbols);
    }

    /// 规范哈夫曼码：按 `symbols` 顺序给出 `(code, length)`。
    fn canonical_codes(&self) -> Vec<(u16, u8)> {
        let mut codes = Vec::with_capacity(self.symbols.len());
        let mut code: u32 = 0;
        for (i, &count) in self.counts.iter().enumerate() {
            for _ in 0..count {
                codes.push((code as u16, i as u8 + 1));
                code += 1;
            }
            code <<= 1;
        }
        codes
    }
}

/// 检查码长分布能否构成前缀码：每个长度上分配完后的下一个码字必须小于 `1 << len`，
/// 这也排除了全 1 码字。
fn check_code_space(counts: &[u8; 16]) -> Result<()> {
    let mut code: u32 = 0;
    for (i, &count) in counts.iter().enumerate() {
        code += u32::from(count);
        if count > 0 && code >= 1 << (i + 1) {
            return Err(JpegError::InvalidSegment {
                segment: "DHT",
                reason: "over-subscribed code lengths",
            });
        }
        code <<= 1;
    }
    Ok(())
}

/// 解析 DHT 段体，一个段可以包含多张表。
pub fn parse_dht(mut data: &[u8]) -> Result<Vec<HuffmanSpec>> {
    const SEGMENT: &str = "DHT";
    let mut specs = Vec::new();

    while let Some((&tc_th, rest)) = data.split_first() {
        let (class, id) = (tc_th >> 4, tc_th & 0x0F);
        if class > AC_CLASS || id > 3 {
            return Err(JpegError::InvalidSegment {
                segment: SEGMENT,
                reason: "table class or id out of range",
            });
        }
        if rest.len() < 16 {
            return Err(JpegError::UnexpectedEof);
        }
        let mut counts = [0u8; 16];
        counts.copy_from_slice(&rest[..16]);
        check_code_space(&counts)?;
        let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
        if total > 256 {
            return Err(JpegError::InvalidSegment {
                segment: SEGMENT,
                reason: "more than 256 symbols",
            });
        }
        let rest = &rest[16..];
        if rest.len() < total {
            return Err(JpegError::UnexpectedEof);
        }
        specs.push(HuffmanSpec {
            class,
            id,
            counts,
            symbols: rest[..total].to_vec(),
        });
        data = &rest[total..];
    }

    Ok(specs)
}

/// 解码表：8 位前瞻表覆盖短码，更长的码按位逐级比较。
pub struct HuffmanDecoder {
    lookahead: [(u8, u8); 256],
    /// 各码长的最大码字，没有该长度的码时为 -1。
    max_code: [i32; 17],
    /// 各码长第一个码字在 `symbols` 中的偏移减去其码值。
    offset: [i32; 17],
    symbols: Vec<u8>,
}

impl HuffmanDecoder {
    pub fn new(spec: &HuffmanSpec) -> Result<Self> {
        check_code_space(&spec.counts)?;
        let codes = spec.canonical_codes();
        if codes.len() != spec.symbols.len() {
            return Err(JpegError::InvalidSegment {
                segment: "DHT",
                reason: "symbol count mismatch",
            });
        }

        let mut lookahead = [(0u8, 0u8); 256];
        let mut max_code = [-1i32; 17];
        let mut offset = [0i32; 17];

        for (index, (&(code, len), &symbol)) in codes.iter().zip(&spec.symbols).enumerate() {
            let len_idx = usize::from(len);
            if max_code[len_idx] < 0 {
                offset[len_idx] = index as i32 - i32::from(code);
            }
            max_code[len_idx] = i32::from(code);

            if len <= 8 {
                let base = usize::from(code) << (8 - len);
                for slot in &mut lookahead[base..base + (1 << (8 - len))] {
                    *slot = (symbol, len);
                }
            }
        }

        Ok(Self {
            lookahead,
            max_code,
            offset,
            symbols: spec.symbols.clone(),
        })
    }

    pub fn decode(&self, reader: &mut BitReader) -> Result<u8> {
        let peek = reader.peek(8)?;
        let (symbol, len) = self.lookahead[usize::from(peek)];
        if len > 0 {
            reader.consume(len);
            return Ok(symbol);
        }

        reader.consume(8);
        let mut code = i32::from(peek);
        for len in 9..=16 {
            code = (code << 1) | i32::from(reader.read(1)?);
            if code <= self.max_code[len] {
                let index = (self.offset[len] + code) as usize;
                return self
                    .symbols
                    .get(index)
                    .copied()
                    .ok_or(JpegError::InvalidHuffmanCode);
            }
        }
        Err(JpegError::InvalidHuffmanCode)
    }
}

/// 编码表：符号 → `(code, length)`，长度 0 表示该符号不可编码。
pub struct HuffmanEncoder {
    codes: [(u16, u8); 256],
}

impl HuffmanEncoder {
    pub fn new(spec: &HuffmanSpec) -> Self {
        let mut codes = [(0u16, 0u8); 256];
        for (&code, &symbol) in spec.canonical_codes().iter().zip(&spec.symbols) {
            codes[usize::from(symbol)] = code;
        }
        Self { codes }
    }

    pub fn code(&self, symbol: u8) -> Result<(u16, u8)> {
        match self.codes[usize::from(symbol)] {
            (_, 0) => Err(JpegError::MissingHuffmanCode(symbol)),
            code => Ok(code),
        }
    }
}

/// 值的类别 (SSSS)，即表示 `|value|` 所需的位数。
pub fn category(value: i32) -> u8 {
    (32 - value.unsigned_abs().leading_zeros()) as u8
}

/// 类别 `size` 下 `value` 的附加位 (负数取反码)。
pub fn magnitude_bits(value: i32, size: u8) -> u16 {
    let raw = if value < 0 { value - 1 } else { value };
    (raw & ((1 << size) - 1)) as u16
}

/// [`magnitude_bits`] 的逆运算。
pub fn extend(bits: u16, size: u8) -> i32 {
    if size == 0 {
        return 0;
    }
    let bits = i32::from(bits);
    if bits < 1 << (size - 1) {
        bits - (1 << size) + 1
    } else {
        bits
    }
}

/// 根据符号频率构造码长不超过 16 的最优表。
///
/// 额外的保留符号 (下标 256) 保证没有真实符号得到全 1 码字。
pub fn optimal_spec(class: u8, id: u8, frequencies: &[u32; 256]) -> HuffmanSpec {
    let mut freq = [0u64; 257];
    for (f, &count) in freq.iter_mut().zip(frequencies) {
        *f = u64::from(count);
    }
    if freq[..256].iter().all(|&f| f == 0) {
        freq[0] = 1;
    }
    freq[256] = 1;

    let mut code_size = [0usize; 257];
    let mut chain: [Option<usize>; 257] = [None; 257];

    loop {
        // 频率最小的两个节点，频率相同时取下标较大的
        let mut first: Option<usize> = None;
        for i in 0..257 {
            if freq[i] > 0 && first.is_none_or(|c| freq[i] <= freq[c]) {
                first = Some(i);
            }
        }
        let mut second: Option<usize> = None;
        for i in 0..257 {
            if freq[i] > 0 && Some(i) != first && second.is_none_or(|c| freq[i] <= freq[c]) {
                second = Some(i);
            }
        }
        let (Some(mut a), Some(mut b)) = (first, second) else {
            break;
        };

        freq[a] += freq[b];
        freq[b] = 0;

        code_size[a] += 1;
        while let Some(next) = chain[a] {
            a = next;
            code_size[a] += 1;
        }
        chain[a] = Some(b);

        code_size[b] += 1;
        while let Some(next) = chain[b] {
            b = next;
            code_size[b] += 1;
        }
    }

    let mut per_length = [0u32; 33];
    for &size in code_size.iter().filter(|&&s| s > 0) {
        per_length[size.min(32)] += 1;
    }

    // 把超过 16 位的码长压回 16 位以内
    for long in (17..=32).rev() {
        while per_length[long] > 0 {
            let mut donor = long - 2;
            while per_length[donor] == 0 {
                donor -= 1;
            }
            per_length[long] -= 2;
            per_length[long - 1] += 1;
            per_length[donor + 1] += 2;
            per_length[donor] -= 1;
        }
    }

    // 去掉保留符号占用的最长码字
    if let Some(longest) = (1..=16).rev().find(|&l| per_length[l] > 0) {
        per_length[longest] -= 1;
    }

    let mut counts = [0u8; 16];
    for (count, &n) in counts.iter_mut().zip(&per_length[1..=16]) {
        *count = n as u8;
    }

    // 码长顺序不受压缩影响：按原始码长、再按符号值分配
    let mut order: Vec<usize> = (0..256).filter(|&s| code_size[s] > 0).collect();
    order.sort_by_key(|&s| (code_size[s], s));
    let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
    let symbols = order.into_iter().take(total).map(|s| s as u8).collect();

    HuffmanSpec {
        class,
        id,
        counts,
        symbols,
    }
}
