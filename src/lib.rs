//! # lsb_stego 库
//!
//! 本库包含 LSB 隐写工具的核心逻辑：共用的帧协议、容量计算、
//! 像素域与 DCT 域两种编解码器、反取证噪声，以及按扩展名选择编解码器的路由。

// 声明库包含的所有模块。

pub mod capacity;
pub mod cli;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod dct;
pub mod error;
pub mod framing;
pub mod handler;
pub mod jpeg;
pub mod noise;
pub mod pixel;
pub mod quality;
pub mod router;
pub mod steganography;

pub use error::{Result, StegoError};
pub use framing::BitFramer;
pub use router::{Codec, CodecKind, EncodeOptions};
pub use steganography::{CapacityReport, Steganographer};
