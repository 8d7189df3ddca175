//! 熵编码数据的按位读写。
//!
//! 两端都按 MSB 优先处理比特，并负责 JPEG 的字节填充 (0xFF → 0xFF 0x00)。

use super::error::{JpegError, Result};

/// 读到标记或数据末尾之后，允许补零的最大字节数。
///
/// 哈夫曼解码最多预读 16 位，因此正常的扫描结尾只会用到两个补零字节。
const MAX_PHANTOM_BYTES: u8 = 4;

/// 熵编码段的位读取器。
///
/// 遇到标记时不会越过它：`pos` 停在标记的 0xFF 上，之后的读取以零填充，
/// 由 [`BitReader::restart`] 负责跳过 RST 标记。
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u32,
    count: u8,
    phantom: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            acc: 0,
            count: 0,
            phantom: 0,
        }
    }

    /// 查看接下来的 `n` (1..=16) 位，不消耗。
    pub fn peek(&mut self, n: u8) -> Result<u16> {
        debug_assert!((1..=16).contains(&n));
        while self.count < n {
            let byte = self.next_byte()?;
            self.acc = (self.acc << 8) | u32::from(byte);
            self.count += 8;
        }
        Ok(((self.acc >> (self.count - n)) & ((1 << n) - 1)) as u16)
    }

    pub fn consume(&mut self, n: u8) {
        debug_assert!(n <= self.count);
        self.count -= n;
        self.acc &= (1u32 << self.count) - 1;
    }

    pub fn read(&mut self, n: u8) -> Result<u16> {
        if n == 0 {
            return Ok(0);
        }
        let value = self.peek(n)?;
        self.consume(n);
        Ok(value)
    }

    /// 丢弃当前字节剩余的位，并跳过紧随其后的 RST 标记 (若存在)。
    pub fn restart(&mut self) {
        self.acc = 0;
        self.count = 0;
        self.phantom = 0;
        while self.pos + 1 < self.data.len() && self.data[self.pos] == 0xFF {
            match self.data[self.pos + 1] {
                0xFF => self.pos += 1,
                0xD0..=0xD7 => {
                    self.pos += 2;
                    return;
                }
                _ => return,
            }
        }
    }

    fn next_byte(&mut self) -> Result<u8> {
        let at_marker = self.pos >= self.data.len()
            || (self.data[self.pos] == 0xFF
                && self.data.get(self.pos + 1).is_none_or(|&b| b != 0x00));
        if at_marker {
            self.phantom += 1;
            if self.phantom > MAX_PHANTOM_BYTES {
                return Err(JpegError::UnexpectedEof);
            }
            return Ok(0);
        }

        let byte = self.data[self.pos];
        self.pos += if byte == 0xFF { 2 } else { 1 };
        Ok(byte)
    }
}

/// 熵编码段的位写入器。
pub struct BitWriter {
    out: Vec<u8>,
    acc: u8,
    count: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            acc: 0,
            count: 0,
        }
    }

    /// 写入 `value` 的低 `n` 位。
    pub fn write(&mut self, value: u16, n: u8) {
        for shift in (0..n).rev() {
            self.acc = (self.acc << 1) | ((value >> shift) & 1) as u8;
            self.count += 1;
            if self.count == 8 {
                self.push(self.acc);
                self.acc = 0;
                self.count = 0;
            }
        }
    }

    /// 用 1 填满当前字节，然后写入第 `index % 8` 个 RST 标记。
    pub fn restart(&mut self, index: usize) {
        self.pad();
        self.out.push(0xFF);
        self.out.push(0xD0 + (index % 8) as u8);
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.pad();
        self.out
    }

    fn pad(&mut self) {
        if self.count > 0 {
            let fill = 8 - self.count;
            let byte = (self.acc << fill) | ((1u8 << fill) - 1);
            self.push(byte);
            self.acc = 0;
            self.count = 0;
        }
    }

    fn push(&mut self, byte: u8) {
        self.out.push(byte);
        if byte == 0xFF {
            self.out.push(0x00);
        }
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}
