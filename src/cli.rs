//! # 命令行接口模块
//!
//! 使用 `clap` 定义了程序的命令行结构，包括子命令和参数。
//! 所有用户通过命令行与程序交互的入口点都在此模块中定义。

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// 一款基于 LSB (最低有效位) 隐写术的命令行工具，可在 PNG、BMP、TIFF 像素或 JPEG DCT 系数中隐藏或恢复文本。
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "一款基于 LSB (最低有效位) 隐写术的命令行工具。无损格式 (PNG, BMP, TIFF) 写入像素的 RGB 通道，JPEG 写入量化 DCT 系数，均可无损恢复文本。"
)]
pub struct Cli {
    /// TOML 配置文件路径。
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 输出更详细的日志，可重复使用 (-v, -vv)。
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 在图像中隐藏文本。
    Hide(HideArgs),

    /// 从经过隐写的图像中恢复隐藏的文本。
    Recover(RecoverArgs),

    /// 显示图像可容纳的载荷大小。
    Capacity(CapacityArgs),

    /// 比较原图与隐写结果的峰值信噪比 (PSNR)。
    Compare(CompareArgs),
}

/// 'hide' 命令所需的参数。
#[derive(Args, Debug, Default)]
pub struct HideArgs {
    /// 用于隐写的输入图像文件路径 (PNG, BMP, TIFF, JPEG)。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 要隐藏的文本内容的文件路径。
    #[arg(short, long, conflicts_with = "message", required_unless_present = "message")]
    pub text: Option<PathBuf>,

    /// 直接在命令行给出要隐藏的文本。
    #[arg(short, long)]
    pub message: Option<String>,

    /// 隐写完成后，保存结果图像的输出路径。默认为输入文件旁的 `<名称>_stego.<扩展名>`。
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// 如果输出文件已存在，则强制覆盖。
    #[arg(long)]
    pub force: bool,

    /// 在未使用的 JPEG 系数中注入随机噪声。
    #[arg(long)]
    pub noise: bool,

    /// 被注入噪声的空闲系数比例 (0 到 1)。
    #[arg(long, value_name = "RATIO")]
    pub noise_ratio: Option<f64>,

    /// 用口令加密文本后再隐藏。
    #[arg(short, long)]
    pub password: Option<String>,
}

/// 'recover' 命令所需的参数。
#[derive(Args, Debug, Default)]
pub struct RecoverArgs {
    /// 已隐藏文本数据的图像文件路径。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 恢复文本后，保存文本内容的输出路径。默认为图像旁的 `recovered_<名称>.txt`。
    #[arg(short, long)]
    pub text: Option<PathBuf>,

    /// 如果输出文件已存在，则强制覆盖。
    #[arg(long)]
    pub force: bool,

    /// 隐藏时使用的口令。
    #[arg(short, long)]
    pub password: Option<String>,
}

/// 'capacity' 命令所需的参数。
#[derive(Args, Debug, Default)]
pub struct CapacityArgs {
    /// 要检查的图像文件路径。
    #[arg(short, long)]
    pub image: PathBuf,
}

/// 'compare' 命令所需的参数。
#[derive(Args, Debug, Default)]
pub struct CompareArgs {
    /// 原始图像。
    #[arg(short, long)]
    pub original: PathBuf,

    /// 隐写后的图像。
    #[arg(short, long)]
    pub stego: PathBuf,
}
