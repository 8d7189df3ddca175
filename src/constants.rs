/// 长度头的默认位数。
/// 帧头以大端无符号整数记录载荷的字节数，32 位足以描述任何实际载体的容量。
pub const DEFAULT_HEADER_BITS: u32 = 32;

/// 允许的长度头位数，必须是整字节。
pub const SUPPORTED_HEADER_BITS: [u32; 4] = [8, 16, 24, 32];

/// 每个像素可写入的比特数 (R、G、B 各一位，Alpha 不使用)。
pub const BITS_PER_PIXEL: usize = 3;

/// 隐写结果文件名的默认后缀，例如 `photo.png` → `photo_stego.png`。
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_stego";

/// 恢复文本的默认文件名前缀，例如 `photo_stego.png` → `recovered_photo_stego.txt`。
pub const RECOVERED_PREFIX: &str = "recovered_";

/// PSNR 在两幅图像完全相同时的约定值 (dB)。
pub const IDENTICAL_PSNR: f64 = 100.0;
