//! # 命令处理逻辑模块
//!
//! 包含处理各个子命令的高级业务逻辑。
//! 本模块负责协调文件 I/O、调用隐写服务以及向用户报告结果。

use crate::cli::{CapacityArgs, CompareArgs, HideArgs, RecoverArgs};
use crate::config::Settings;
use crate::constants::RECOVERED_PREFIX;
use crate::crypto;
use crate::error::StegoError;
use crate::quality::{QualityGrade, psnr};
use crate::router::EncodeOptions;
use crate::steganography::{Steganographer, default_output_path, write_atomically};
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// 目标文件已存在且未指定 `--force` 时报错。
fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    anyhow::ensure!(
        force || !path.exists(),
        "Output file already exists: {}\nUse --force to overwrite it.",
        path.to_string_lossy().red().bold()
    );
    Ok(())
}

/// `recovered_<名称>.txt`，与图像位于同一目录。
fn default_recovered_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    image.with_file_name(format!("{RECOVERED_PREFIX}{stem}.txt"))
}

/// 处理 'Hide' 命令的执行逻辑。
///
/// 负责读取文本 (或使用命令行给出的消息)、按需加密、检查输出路径，
/// 然后调用隐写服务把结果写入目标图像文件。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 无法读取输入的图像或文本文件。
/// * 目标文件已存在且未指定 `--force`。
/// * 图像没有足够的空间来隐藏文本。
/// * 输入或输出格式不受支持。
pub fn handle_hide(args: HideArgs, settings: &Settings) -> Result<()> {
    let text = match (&args.text, args.message) {
        (Some(path), _) => fs::read_to_string(path).with_context(|| {
            format!(
                "Unable to read text file: {}",
                path.to_string_lossy().red().bold()
            )
        })?,
        (None, Some(message)) => message,
        (None, None) => anyhow::bail!("Either a text file (-t) or a message (-m) is required"),
    };

    let payload = match args.password.as_deref() {
        Some(password) => {
            crypto::seal(&text, password).context("Failed to encrypt the message")?
        }
        None => text,
    };

    let dest = args
        .dest
        .unwrap_or_else(|| default_output_path(&args.image, &settings.output.suffix));
    ensure_writable(&dest, args.force)?;

    let defaults = settings.encode_options();
    let options = EncodeOptions {
        anti_forensic_noise: args.noise || defaults.anti_forensic_noise,
        noise_ratio: args.noise_ratio.unwrap_or(defaults.noise_ratio),
    };

    let stego = Steganographer::new(settings.framer()?);
    let written = stego
        .hide(&args.image, &dest, payload.as_bytes(), &options)
        .map_err(|e| match e {
            StegoError::CapacityExceeded {
                required,
                available,
            } => anyhow::anyhow!(
                "Not enough space in the image to hide the text. \nRequired: {} bits, Available: {} bits",
                required.to_string().red().bold(),
                available.to_string().green().bold()
            ),
            other => anyhow::Error::new(other).context(format!(
                "Failed to hide the text in {}",
                args.image.to_string_lossy().red().bold()
            )),
        })?;

    println!(
        "The text has been successfully hidden and saved: {}",
        written.to_string_lossy().green().bold()
    );

    Ok(())
}

/// 处理 'Recover' 命令的执行逻辑。
///
/// 负责从隐写图像中恢复文本、按需解密，最后把文本写入目标文件。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 无法读取输入的图像文件，或图像中没有有效的隐藏数据。
/// * 口令错误。
/// * 目标文件已存在且未指定 `--force`，或无法写入。
pub fn handle_recover(args: RecoverArgs, settings: &Settings) -> Result<()> {
    let dest = args
        .text
        .unwrap_or_else(|| default_recovered_path(&args.image));
    ensure_writable(&dest, args.force)?;

    let stego = Steganographer::new(settings.framer()?);
    let hidden = stego.reveal(&args.image).with_context(|| {
        format!(
            "Failed to recover the text from '{}'. \nThe image may not contain a hidden message or is corrupted.",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    let text = match args.password.as_deref() {
        Some(password) => crypto::open(&hidden, password).context("Failed to decrypt the message")?,
        None => hidden,
    };

    write_atomically(&dest, text.as_bytes()).with_context(|| {
        format!(
            "Unable to write to target text file: {}",
            dest.to_string_lossy().red().bold()
        )
    })?;

    println!(
        "The text has been successfully recovered and saved: {}",
        dest.to_string_lossy().green().bold()
    );
    Ok(())
}

/// 处理 'Capacity' 命令：打印编解码器种类、总比特数和可用字节数。
pub fn handle_capacity(args: CapacityArgs, settings: &Settings) -> Result<()> {
    let stego = Steganographer::new(settings.framer()?);
    let report = stego.capacity(&args.image).with_context(|| {
        format!(
            "Unable to inspect image file: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    println!("Codec:    {}", report.kind.to_string().cyan());
    println!("Capacity: {} bits", report.bits.to_string().green().bold());
    println!(
        "Usable:   {} bytes of text",
        report.usable_bytes.to_string().green().bold()
    );
    Ok(())
}

/// 处理 'Compare' 命令：计算两幅图像之间的 PSNR 并给出评级。
pub fn handle_compare(args: CompareArgs) -> Result<()> {
    let load = |path: &Path| {
        image::open(path).with_context(|| {
            format!(
                "Unable to read image file: {}",
                path.to_string_lossy().red().bold()
            )
        })
    };
    let original = load(&args.original)?;
    let stego = load(&args.stego)?;

    let value = psnr(&original, &stego)?;
    let grade = QualityGrade::from_psnr(value);
    println!("PSNR:    {} dB", format!("{value:.2}").green().bold());
    println!("Quality: {}", grade.to_string().cyan());
    Ok(())
}
