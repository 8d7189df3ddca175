//! # 文件级隐写操作
//!
//! 负责读取载体文件、选择编解码器、在内存中完成嵌入，再把结果原子地写到目标路径。
//! 任何一步失败时，目标路径都不会出现不完整的文件。

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::capacity::usable_capacity_bytes_with;
use crate::error::{Result, StegoError};
use crate::framing::BitFramer;
use crate::router::{CarrierFormat, Codec, CodecKind, EncodeOptions};

/// 载体容量报告。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityReport {
    pub kind: CodecKind,
    /// 可嵌入的总比特数 (含长度头)。
    pub bits: usize,
    /// 扣除长度头后可容纳的载荷字节数。
    pub usable_bytes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Steganographer {
    framer: BitFramer,
}

impl Steganographer {
    pub fn new(framer: BitFramer) -> Self {
        Self { framer }
    }

    pub fn framer(&self) -> BitFramer {
        self.framer
    }

    /// 把 `payload` 隐藏到 `input` 中，结果写入 `output` 并返回该路径。输入文件不会被修改。
    ///
    /// # Errors
    ///
    /// * 输入或输出的扩展名不受支持，或两者需要不同的编解码器。
    /// * 载体容量不足、载体无法解析，或文件读写失败。
    pub fn hide(
        &self,
        input: &Path,
        output: &Path,
        payload: &[u8],
        options: &EncodeOptions,
    ) -> Result<PathBuf> {
        let codec = Codec::for_path(input, self.framer)?;
        let output_format = CarrierFormat::from_path(output)?;
        debug!(
            "Hiding {} bytes with the {} codec, output format {:?}",
            payload.len(),
            codec.kind(),
            output_format
        );

        let carrier = fs::read(input)?;
        let stego = codec.encode(&carrier, payload, output_format, options)?;
        write_atomically(output, &stego)?;

        info!(
            "Hid {} bytes in {} ({} bytes written)",
            payload.len(),
            output.display(),
            stego.len()
        );
        Ok(output.to_path_buf())
    }

    /// 从 `input` 中恢复隐藏的文本。
    pub fn reveal(&self, input: &Path) -> Result<String> {
        let codec = Codec::for_path(input, self.framer)?;
        let carrier = fs::read(input)?;
        let text = codec.decode(&carrier)?;
        info!("Recovered {} bytes from {}", text.len(), input.display());
        Ok(text)
    }

    pub fn capacity(&self, input: &Path) -> Result<CapacityReport> {
        let codec = Codec::for_path(input, self.framer)?;
        let bits = codec.capacity_bits(&fs::read(input)?)?;
        Ok(CapacityReport {
            kind: codec.kind(),
            bits,
            usable_bytes: usable_capacity_bytes_with(bits, self.framer.header_bits()),
        })
    }
}

/// 默认输出路径：与输入同目录，文件名为 `<stem><suffix>.<ext>`。
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    input.with_file_name(name)
}

/// 先写入目标目录下的临时文件，再重命名到 `path`。
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path)
        .map_err(|e| StegoError::Io(e.error))?;
    Ok(())
}
