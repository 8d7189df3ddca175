//! # 格式路由
//!
//! 根据文件扩展名选择像素域或 DCT 域编解码器。

use std::fmt;
use std::path::Path;

use image::ImageFormat;
use log::warn;
use rand::Rng;

use crate::dct::DctLsbCodec;
use crate::error::{Result, StegoError};
use crate::framing::BitFramer;
use crate::noise::NoiseInjector;
use crate::pixel::PixelLsbCodec;

/// 编解码器种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    PixelLsb,
    DctLsb,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecKind::PixelLsb => write!(f, "pixel LSB"),
            CodecKind::DctLsb => write!(f, "DCT coefficient LSB"),
        }
    }
}

/// 支持的载体文件格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierFormat {
    Png,
    Bmp,
    Tiff,
    Jpeg,
}

impl CarrierFormat {
    /// 扩展名不区分大小写。
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "bmp" => Ok(Self::Bmp),
            "tiff" => Ok(Self::Tiff),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(StegoError::UnsupportedFormat(format!(
                "unrecognised extension '.{other}'"
            ))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            StegoError::UnsupportedFormat(format!("'{}' has no file extension", path.display()))
        })?;
        Self::from_extension(extension)
    }

    pub fn codec_kind(self) -> CodecKind {
        match self {
            Self::Png | Self::Bmp | Self::Tiff => CodecKind::PixelLsb,
            Self::Jpeg => CodecKind::DctLsb,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// `png|bmp|tiff` → 像素编解码器，`jpeg|jpg` → DCT 编解码器。
pub fn select(extension: &str) -> Result<CodecKind> {
    CarrierFormat::from_extension(extension).map(CarrierFormat::codec_kind)
}

/// 嵌入选项。噪声只对 DCT 编解码器有意义。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeOptions {
    pub anti_forensic_noise: bool,
    pub noise_ratio: f64,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            anti_forensic_noise: false,
            noise_ratio: 0.0,
        }
    }
}

impl EncodeOptions {
    /// 启用噪声时构造注入器，比例非法则报错。
    pub fn noise_injector(&self) -> Result<Option<NoiseInjector>> {
        self.anti_forensic_noise
            .then(|| NoiseInjector::new(self.noise_ratio))
            .transpose()
    }
}

/// 已实例化的编解码器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    PixelLsb(PixelLsbCodec),
    DctLsb(DctLsbCodec),
}

impl Codec {
    pub fn new(kind: CodecKind, framer: BitFramer) -> Self {
        match kind {
            CodecKind::PixelLsb => Codec::PixelLsb(PixelLsbCodec::new(framer)),
            CodecKind::DctLsb => Codec::DctLsb(DctLsbCodec::new(framer)),
        }
    }

    /// 按输入文件的扩展名选择编解码器。
    pub fn for_path(path: &Path, framer: BitFramer) -> Result<Self> {
        Ok(Self::new(CarrierFormat::from_path(path)?.codec_kind(), framer))
    }

    pub fn kind(&self) -> CodecKind {
        match self {
            Codec::PixelLsb(_) => CodecKind::PixelLsb,
            Codec::DctLsb(_) => CodecKind::DctLsb,
        }
    }

    pub fn capacity_bits(&self, carrier: &[u8]) -> Result<usize> {
        match self {
            Codec::PixelLsb(codec) => codec.capacity_bits(carrier),
            Codec::DctLsb(codec) => codec.capacity_bits(carrier),
        }
    }

    pub fn encode(
        &self,
        carrier: &[u8],
        payload: &[u8],
        output: CarrierFormat,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>> {
        self.encode_with_rng(carrier, payload, output, options, &mut rand::rng())
    }

    /// 嵌入载荷并按 `output` 格式输出。
    ///
    /// # Errors
    ///
    /// 输出格式属于另一种编解码器 (例如 PNG 载体输出为 JPEG) 时返回
    /// [`StegoError::UnsupportedFormat`]。
    pub fn encode_with_rng<R: Rng + ?Sized>(
        &self,
        carrier: &[u8],
        payload: &[u8],
        output: CarrierFormat,
        options: &EncodeOptions,
        rng: &mut R,
    ) -> Result<Vec<u8>> {
        if output.codec_kind() != self.kind() {
            return Err(StegoError::UnsupportedFormat(format!(
                "cannot write a {} carrier as {:?}",
                self.kind(),
                output
            )));
        }
        let noise = options.noise_injector()?;

        match self {
            Codec::PixelLsb(codec) => {
                if noise.is_some() {
                    warn!("Anti-forensic noise only applies to JPEG carriers, ignoring it");
                }
                codec.encode(carrier, payload, output.image_format())
            }
            Codec::DctLsb(codec) => codec.encode_with_rng(carrier, payload, noise.as_ref(), rng),
        }
    }

    pub fn decode(&self, carrier: &[u8]) -> Result<String> {
        match self {
            Codec::PixelLsb(codec) => codec.decode(carrier),
            Codec::DctLsb(codec) => codec.decode(carrier),
        }
    }
}
