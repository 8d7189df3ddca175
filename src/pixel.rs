//! # 像素最低位编解码器
//!
//! 按行优先遍历像素，每个像素依次使用 R、G、B 三个通道的最低位，Alpha 通道
//! 原样保留。适用于 PNG、BMP、TIFF 等无损格式。

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use log::debug;

use crate::capacity::pixel_capacity_bits;
use crate::error::{Result, StegoError};
use crate::framing::BitFramer;

/// 无损像素载体的 LSB 编解码器。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelLsbCodec {
    framer: BitFramer,
}

/// 可按通道寻址的 8 位像素缓冲区。
enum Channels {
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

impl Channels {
    /// 灰度展开为 RGBA；16 位与浮点缓冲区按有无 Alpha 降为 8 位 RGB 或 RGBA。
    fn from_image(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgb8(buf) => Channels::Rgb(buf),
            DynamicImage::ImageRgba8(buf) => Channels::Rgba(buf),
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => {
                Channels::Rgba(image.to_rgba8())
            }
            other if other.color().has_alpha() => Channels::Rgba(other.to_rgba8()),
            other => Channels::Rgb(other.to_rgb8()),
        }
    }

    /// 原始通道字节与每像素的通道数。
    fn raw(&self) -> (&[u8], usize) {
        match self {
            Channels::Rgb(buf) => (buf.as_raw(), 3),
            Channels::Rgba(buf) => (buf.as_raw(), 4),
        }
    }

    fn raw_mut(&mut self) -> (&mut [u8], usize) {
        match self {
            Channels::Rgb(buf) => (&mut **buf, 3),
            Channels::Rgba(buf) => (&mut **buf, 4),
        }
    }

    fn into_image(self) -> DynamicImage {
        match self {
            Channels::Rgb(buf) => DynamicImage::ImageRgb8(buf),
            Channels::Rgba(buf) => DynamicImage::ImageRgba8(buf),
        }
    }
}

impl PixelLsbCodec {
    pub fn new(framer: BitFramer) -> Self {
        Self { framer }
    }

    pub fn capacity_bits(&self, carrier: &[u8]) -> Result<usize> {
        let image = image::load_from_memory(carrier)?;
        Ok(pixel_capacity_bits(image.width(), image.height()))
    }

    /// 把载荷写入图像，返回修改后的 8 位 RGB(A) 副本。
    ///
    /// 比特流写完即停止，其后的通道与像素不变。
    pub fn embed_image(&self, image: DynamicImage, payload: &[u8]) -> Result<DynamicImage> {
        let available = pixel_capacity_bits(image.width(), image.height());
        let bits = self.framer.pack(payload)?;
        if bits.len() > available {
            return Err(StegoError::CapacityExceeded {
                required: bits.len(),
                available,
            });
        }

        let mut channels = Channels::from_image(image);
        let (bytes, stride) = channels.raw_mut();
        let targets = bytes
            .chunks_exact_mut(stride)
            .flat_map(|pixel| pixel.iter_mut().take(3));
        for (channel, &bit) in targets.zip(&bits) {
            *channel = (*channel & !1) | bit;
        }
        debug!("Embedded {} bits into {available} channel LSBs", bits.len());
        Ok(channels.into_image())
    }

    /// 按与嵌入相同的顺序读出最低位并解析帧。
    pub fn extract_image(&self, image: DynamicImage) -> Result<String> {
        let channels = Channels::from_image(image);
        let (bytes, stride) = channels.raw();
        let mut lsbs = bytes
            .chunks_exact(stride)
            .flat_map(|pixel| &pixel[..3])
            .map(|&channel| channel & 1);

        let header_bits = self.framer.header_bits() as usize;
        let mut bits: Vec<u8> = lsbs.by_ref().take(header_bits).collect();
        if bits.len() == header_bits {
            let declared = self.framer.read_length(&bits)?;
            let remaining = self.framer.frame_bits(declared) - header_bits as u64;
            bits.extend(lsbs.take(usize::try_from(remaining).unwrap_or(usize::MAX)));
        }
        self.framer.unpack(&bits)
    }

    /// 解码载体、嵌入载荷，并按 `format` 重新编码。像素尺寸保持不变。
    pub fn encode(&self, carrier: &[u8], payload: &[u8], format: ImageFormat) -> Result<Vec<u8>> {
        let image = image::load_from_memory(carrier)?;
        debug!(
            "Pixel carrier {}x{} ({:?})",
            image.width(),
            image.height(),
            image.color()
        );
        let stego = self.embed_image(image, payload)?;

        let mut out = Vec::new();
        stego.write_to(&mut Cursor::new(&mut out), format)?;
        Ok(out)
    }

    pub fn decode(&self, carrier: &[u8]) -> Result<String> {
        self.extract_image(image::load_from_memory(carrier)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, Rgb32FImage, Rgba};

    fn rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 13 + y) as u8, (y * 29) as u8, (x ^ y) as u8])
        }))
    }

    #[test]
    fn hello_round_trips_in_ten_by_ten() {
        let codec = PixelLsbCodec::default();
        let stego = codec.embed_image(rgb(10, 10), b"hello").unwrap();
        assert_eq!(codec.extract_image(stego).unwrap(), "hello");
    }

    #[test]
    fn forty_bytes_exceed_ten_by_ten() {
        let codec = PixelLsbCodec::default();
        let err = codec.embed_image(rgb(10, 10), &[b'a'; 40]).unwrap_err();
        assert!(matches!(
            err,
            StegoError::CapacityExceeded {
                required: 352,
                available: 300
            }
        ));
    }

    #[test]
    fn exact_fit_boundary() {
        let codec = PixelLsbCodec::default();
        // 8x4 像素 = 96 位 = 32 位长度头 + 8 字节
        let stego = codec.embed_image(rgb(8, 4), b"12345678").unwrap();
        assert_eq!(codec.extract_image(stego).unwrap(), "12345678");
        assert!(matches!(
            codec.embed_image(rgb(8, 4), b"123456789"),
            Err(StegoError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn writes_rgb_channels_in_raster_order() {
        let codec = PixelLsbCodec::default();
        let blank = DynamicImage::ImageRgb8(RgbImage::new(14, 1));
        // 长度 1 的载荷：前 31 位为 0，第 32 位 (像素 10 的 G 通道) 为 1
        let stego = codec.embed_image(blank, &[0xFF]).unwrap().to_rgb8();
        assert_eq!(stego.get_pixel(10, 0), &Rgb([0, 1, 1]));
        assert_eq!(stego.get_pixel(11, 0), &Rgb([1, 1, 1]));
        assert_eq!(stego.get_pixel(9, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn alpha_is_preserved() {
        let codec = PixelLsbCodec::default();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(6, 6, |x, y| {
            Rgba([x as u8, y as u8, 200, (x * 40 + y) as u8])
        }));
        let stego = codec.embed_image(image.clone(), b"alpha").unwrap();
        for (before, after) in image.to_rgba8().pixels().zip(stego.to_rgba8().pixels()) {
            assert_eq!(before[3], after[3]);
        }
        assert_eq!(codec.extract_image(stego).unwrap(), "alpha");
    }

    #[test]
    fn grayscale_is_expanded_to_rgba() {
        let codec = PixelLsbCodec::default();
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(7, 7, Luma([128])));
        let stego = codec.embed_image(gray, b"gray").unwrap();
        assert!(matches!(stego, DynamicImage::ImageRgba8(_)));
        assert_eq!(codec.extract_image(stego).unwrap(), "gray");
    }

    #[test]
    fn sixteen_bit_carrier_is_reduced_to_eight_bits() {
        let codec = PixelLsbCodec::default();
        let deep: ImageBuffer<Rgb<u16>, Vec<u16>> =
            ImageBuffer::from_fn(20, 20, |x, y| Rgb([(x * 3000) as u16, (y * 3000) as u16, 0xABCD]));
        let stego = codec
            .embed_image(DynamicImage::ImageRgb16(deep), b"deep")
            .unwrap();
        assert!(matches!(stego, DynamicImage::ImageRgb8(_)));
        assert_eq!(codec.extract_image(stego).unwrap(), "deep");
    }

    #[test]
    fn sixteen_bit_alpha_is_kept_as_rgba() {
        let codec = PixelLsbCodec::default();
        let deep: ImageBuffer<Rgba<u16>, Vec<u16>> =
            ImageBuffer::from_pixel(12, 12, Rgba([0x1234, 0x5678, 0x9ABC, 0x8000]));
        let stego = codec
            .embed_image(DynamicImage::ImageRgba16(deep), b"rgba16")
            .unwrap();
        let DynamicImage::ImageRgba8(buf) = &stego else {
            panic!("expected an 8-bit RGBA buffer, got {:?}", stego.color());
        };
        assert!(buf.pixels().all(|p| p[3] == 0x80));
        assert_eq!(codec.extract_image(stego).unwrap(), "rgba16");
    }

    #[test]
    fn float_carrier_round_trips() {
        let codec = PixelLsbCodec::default();
        let float = Rgb32FImage::from_pixel(10, 10, Rgb([0.25, 0.5, 0.75]));
        let stego = codec
            .embed_image(DynamicImage::ImageRgb32F(float), b"float")
            .unwrap();
        assert_eq!(codec.extract_image(stego).unwrap(), "float");
    }

    #[test]
    fn sixteen_bit_png_survives_encode() {
        let codec = PixelLsbCodec::default();
        let deep: ImageBuffer<Rgb<u16>, Vec<u16>> =
            ImageBuffer::from_fn(20, 20, |x, y| Rgb([(x * 1000) as u16, (y * 2000) as u16, 500]));
        let mut carrier = Vec::new();
        DynamicImage::ImageRgb16(deep)
            .write_to(&mut Cursor::new(&mut carrier), ImageFormat::Png)
            .unwrap();

        let stego = codec.encode(&carrier, b"sixteen", ImageFormat::Png).unwrap();
        assert_eq!(codec.decode(&stego).unwrap(), "sixteen");
    }

    #[test]
    fn never_encoded_carrier_fails_framing() {
        let codec = PixelLsbCodec::default();
        let ones = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        assert!(matches!(
            codec.extract_image(ones),
            Err(StegoError::TruncatedPayload { available: 300, .. })
        ));
    }

    #[test]
    fn encode_survives_png_and_bmp() {
        let codec = PixelLsbCodec::default();
        let mut carrier = Vec::new();
        rgb(16, 16)
            .write_to(&mut Cursor::new(&mut carrier), ImageFormat::Png)
            .unwrap();

        for format in [ImageFormat::Png, ImageFormat::Bmp, ImageFormat::Tiff] {
            let stego = codec.encode(&carrier, "多格式".as_bytes(), format).unwrap();
            assert_eq!(image::guess_format(&stego).unwrap(), format);
            assert_eq!(codec.decode(&stego).unwrap(), "多格式");
        }
    }
}
