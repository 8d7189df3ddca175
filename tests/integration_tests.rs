use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, GenericImageView, ImageBuffer, Rgb, Rgba};
use lsb_stego::{
    BitFramer, Codec, CodecKind, EncodeOptions, StegoError, Steganographer,
    cli::{CapacityArgs, CompareArgs, HideArgs, RecoverArgs},
    config::Settings,
    handler::{handle_capacity, handle_compare, handle_hide, handle_recover},
    quality::{QualityGrade, psnr},
    router::CarrierFormat,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// 一个辅助函数，用于创建一个带有随机像素的测试图像
fn create_test_image(path: &Path, width: u32, height: u32) {
    let mut img_buf = ImageBuffer::new(width, height);
    let mut raw_pixels = vec![0u8; (width * height * 4) as usize];
    rand::rng().fill_bytes(&mut raw_pixels);

    img_buf
        .pixels_mut()
        .zip(raw_pixels.chunks_exact(4))
        .for_each(|(pixel, chunk)| {
            *pixel = Rgba([chunk[0], chunk[1], chunk[2], 255]);
        });

    img_buf.save(path).expect("Failed to create test image.");
}

/// 创建一幅平滑渐变的 JPEG 载体
fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x * 3) as u8, (y * 5) as u8, ((x + y) * 2) as u8]);
        }
    }
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 85)
        .encode(&pixels, width, height, ExtendedColorType::Rgb8)
        .expect("Failed to encode test JPEG.");
    fs::write(path, out).expect("Failed to write test JPEG.");
}

/// 验证从隐藏到恢复的完整流程
#[test]
fn test_handle_hide_and_recover_integration() -> anyhow::Result<()> {
    // 1. 准备环境
    let dir = tempdir()?;
    let original_image_path = dir.path().join("original.png");
    let hidden_image_path = dir.path().join("hidden.png");
    let source_text_path = dir.path().join("source.txt");
    let recovered_text_path = dir.path().join("recovered.txt");
    let settings = Settings::default();

    create_test_image(&original_image_path, 100, 100);
    let original_text = "This is a test message for the handler! 这是一个给处理器的测试信息！";
    fs::write(&source_text_path, original_text)?;

    // 2. 测试 handle_hide
    let hide_args = HideArgs {
        image: original_image_path.clone(),
        text: Some(source_text_path.clone()),
        dest: Some(hidden_image_path.clone()),
        ..Default::default()
    };
    handle_hide(hide_args, &settings)?;
    assert!(
        hidden_image_path.exists(),
        "Hidden image should be created."
    );

    // 3. 测试 handle_recover
    let recover_args = RecoverArgs {
        image: hidden_image_path.clone(),
        text: Some(recovered_text_path.clone()),
        ..Default::default()
    };
    handle_recover(recover_args, &settings)?;
    assert!(
        recovered_text_path.exists(),
        "Recovered text file should be created."
    );

    // 4. 验证结果
    let recovered_text = fs::read_to_string(&recovered_text_path)?;
    assert_eq!(
        original_text, recovered_text,
        "Recovered text must match the original."
    );

    Ok(())
}

/// 验证当用户不提供输出路径时，是否能正确生成默认路径并完成操作
#[test]
fn test_handle_hide_and_recover_with_defaults() -> anyhow::Result<()> {
    // 1. 准备环境
    let dir = tempdir()?;
    let original_image_path = dir.path().join("original.png");
    let settings = Settings::default();

    create_test_image(&original_image_path, 100, 100);
    let original_text = "Testing default path generation. 测试默认路径生成。";

    // 2. 测试 handle_hide，不提供 dest 路径，直接给出消息
    let hide_args = HideArgs {
        image: original_image_path.clone(),
        message: Some(original_text.to_string()),
        dest: None, // 关键：测试 None 的情况
        ..Default::default()
    };
    handle_hide(hide_args, &settings)?;

    // 验证默认的隐藏图像文件是否已创建
    let expected_hidden_path = dir.path().join("original_stego.png");
    assert!(
        expected_hidden_path.exists(),
        "Default hidden image should be created at: {:?}",
        expected_hidden_path
    );

    // 3. 测试 handle_recover，不提供 text 输出路径
    let recover_args = RecoverArgs {
        image: expected_hidden_path, // 使用上一步生成的默认文件
        text: None,                  // 关键：测试 None 的情况
        ..Default::default()
    };
    handle_recover(recover_args, &settings)?;

    // 验证默认的恢复文本文件是否已创建
    let expected_recovered_path = dir.path().join("recovered_original_stego.txt");
    assert!(
        expected_recovered_path.exists(),
        "Default recovered text file should be created at: {:?}",
        expected_recovered_path
    );

    // 4. 验证结果
    let recovered_text = fs::read_to_string(&expected_recovered_path)?;
    assert_eq!(
        original_text, recovered_text,
        "Recovered text from default file must match the original."
    );

    Ok(())
}

/// 验证覆盖保护机制以及 `--force` 标志是否按预期工作
#[test]
fn test_overwrite_protection_and_force_flag() -> anyhow::Result<()> {
    // 1. 准备环境
    let dir = tempdir()?;
    let image_path = dir.path().join("image.png");
    let text_path = dir.path().join("text.txt");
    let dest_path = dir.path().join("dest.png");
    let settings = Settings::default();

    create_test_image(&image_path, 50, 50);
    fs::write(&text_path, "some text")?;

    // 2. 场景一：测试覆盖保护
    fs::write(&dest_path, "this is a dummy file to be overwritten")?;
    assert!(dest_path.exists());

    let hide_args_no_force = HideArgs {
        image: image_path.clone(),
        text: Some(text_path.clone()),
        dest: Some(dest_path.clone()),
        force: false,
        ..Default::default()
    };

    let result = handle_hide(hide_args_no_force, &settings);
    assert!(
        result.is_err(),
        "Execution should fail without --force when file exists."
    );
    if let Err(e) = result {
        assert!(e.to_string().contains("Output file already exists"));
    }

    // 3. 场景二：测试强制覆盖
    let hide_args_with_force = HideArgs {
        image: image_path.clone(),
        text: Some(text_path.clone()),
        dest: Some(dest_path.clone()),
        force: true,
        ..Default::default()
    };

    let result = handle_hide(hide_args_with_force, &settings);
    assert!(
        result.is_ok(),
        "Execution should succeed with --force when file exists."
    );

    let dummy_content = fs::read(&dest_path)?;
    assert_ne!(dummy_content, b"this is a dummy file to be overwritten");

    Ok(())
}

/// 验证空间不足时的错误处理，并且不会留下输出文件
#[test]
fn test_handle_hide_not_enough_space() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let image_path = dir.path().join("small.png");
    let text_path = dir.path().join("large.txt");
    let dest_path = dir.path().join("dest.png");

    // 10x10 像素只有 300 位，40 字节成帧后需要 352 位
    create_test_image(&image_path, 10, 10);
    fs::write(&text_path, "a".repeat(40))?;

    let hide_args = HideArgs {
        image: image_path,
        text: Some(text_path),
        dest: Some(dest_path.clone()),
        ..Default::default()
    };
    let result = handle_hide(hide_args, &Settings::default());

    assert!(result.is_err());
    if let Err(e) = result {
        assert!(e.to_string().contains("Not enough space"));
    }
    assert!(!dest_path.exists(), "A failed hide must not write output.");

    Ok(())
}

/// JPEG 载体：经由 DCT 系数隐藏并恢复，同时开启反取证噪声
#[test]
fn test_jpeg_hide_and_recover_with_noise() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let image_path = dir.path().join("photo.jpg");
    let recovered_path = dir.path().join("out.txt");
    let settings = Settings::default();
    create_test_jpeg(&image_path, 64, 48);

    let message = "JPEG 系数隐写 with noise";
    handle_hide(
        HideArgs {
            image: image_path.clone(),
            message: Some(message.to_string()),
            noise: true,
            noise_ratio: Some(0.5),
            ..Default::default()
        },
        &settings,
    )?;

    let stego_path = dir.path().join("photo_stego.jpg");
    let stego_bytes = fs::read(&stego_path)?;
    let decoded = image::load_from_memory(&stego_bytes)?;
    assert_eq!(decoded.dimensions(), (64, 48));

    handle_recover(
        RecoverArgs {
            image: stego_path,
            text: Some(recovered_path.clone()),
            ..Default::default()
        },
        &settings,
    )?;
    assert_eq!(fs::read_to_string(&recovered_path)?, message);

    Ok(())
}

/// 噪声在任意比例下都不会破坏载荷
#[test]
fn test_jpeg_noise_is_non_destructive() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let image_path = dir.path().join("noise.jpg");
    create_test_jpeg(&image_path, 40, 40);
    let carrier = fs::read(&image_path)?;

    let codec = Codec::new(CodecKind::DctLsb, BitFramer::default());
    for (seed, ratio) in [0.0, 0.1, 0.5, 0.9, 1.0].into_iter().enumerate() {
        let options = EncodeOptions {
            anti_forensic_noise: true,
            noise_ratio: ratio,
        };
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let stego =
            codec.encode_with_rng(&carrier, b"noise-proof", CarrierFormat::Jpeg, &options, &mut rng)?;
        assert_eq!(codec.decode(&stego)?, "noise-proof", "ratio {ratio}");
    }

    Ok(())
}

/// 真实 JPEG 的容量边界：恰好填满成功，多一个字节失败
#[test]
fn test_jpeg_capacity_boundary() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let image_path = dir.path().join("boundary.jpg");
    let exact_path = dir.path().join("exact.jpg");
    let over_path = dir.path().join("over.jpg");
    create_test_jpeg(&image_path, 16, 8);

    let stego = Steganographer::default();
    let report = stego.capacity(&image_path)?;
    // 三个分量各 2 个块
    assert_eq!(report.kind, CodecKind::DctLsb);
    assert_eq!(report.bits, 3 * 2 * 64);
    assert_eq!(report.usable_bytes, report.bits / 8 - 4);

    let exact = "e".repeat(report.usable_bytes);
    stego.hide(&image_path, &exact_path, exact.as_bytes(), &EncodeOptions::default())?;
    assert_eq!(stego.reveal(&exact_path)?, exact);

    let over = "e".repeat(report.usable_bytes + 1);
    let err = stego
        .hide(&image_path, &over_path, over.as_bytes(), &EncodeOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        StegoError::CapacityExceeded {
            required,
            available
        } if required == available + 8
    ));
    assert!(!over_path.exists());

    Ok(())
}

/// 口令加密后隐藏，恢复时需要同一口令
#[test]
fn test_password_protected_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let image_path = dir.path().join("secret.png");
    let stego_path = dir.path().join("secret_out.png");
    let text_path = dir.path().join("secret.txt");
    let settings = Settings::default();
    create_test_image(&image_path, 80, 80);

    handle_hide(
        HideArgs {
            image: image_path,
            message: Some("top secret 机密".to_string()),
            dest: Some(stego_path.clone()),
            password: Some("correct horse".to_string()),
            ..Default::default()
        },
        &settings,
    )?;

    // 不带口令时读出的是 Base64 密文
    let armored = Steganographer::default().reveal(&stego_path)?;
    assert!(!armored.contains("top secret"));

    let wrong = handle_recover(
        RecoverArgs {
            image: stego_path.clone(),
            text: Some(text_path.clone()),
            password: Some("battery staple".to_string()),
            ..Default::default()
        },
        &settings,
    );
    assert!(wrong.is_err());

    handle_recover(
        RecoverArgs {
            image: stego_path,
            text: Some(text_path.clone()),
            password: Some("correct horse".to_string()),
            ..Default::default()
        },
        &settings,
    )?;
    assert_eq!(fs::read_to_string(&text_path)?, "top secret 机密");

    Ok(())
}

/// 像素编解码器允许在 PNG、BMP、TIFF 之间转换，但不允许输出 JPEG
#[test]
fn test_pixel_format_conversion_rules() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let image_path = dir.path().join("source.png");
    create_test_image(&image_path, 30, 20);
    let stego = Steganographer::default();

    for name in ["out.bmp", "out.tiff", "OUT.PNG"] {
        let dest = dir.path().join(name);
        stego.hide(&image_path, &dest, "跨格式".as_bytes(), &EncodeOptions::default())?;
        assert_eq!(image::open(&dest)?.dimensions(), (30, 20));
        assert_eq!(stego.reveal(&dest)?, "跨格式");
    }

    let err = stego
        .hide(
            &image_path,
            &dir.path().join("out.jpg"),
            b"x",
            &EncodeOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, StegoError::UnsupportedFormat(_)));

    let err = stego.reveal(&dir.path().join("source.gif")).unwrap_err();
    assert!(matches!(err, StegoError::UnsupportedFormat(_)));

    Ok(())
}

/// 从未嵌入过数据的载体中读取会得到帧错误
#[test]
fn test_reveal_from_clean_carrier_fails() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let image_path = dir.path().join("clean.png");
    create_test_image(&image_path, 100, 100);

    let err = Steganographer::default().reveal(&image_path).unwrap_err();
    assert!(
        matches!(
            err,
            StegoError::TruncatedPayload { .. }
                | StegoError::DeclaredLengthExceedsCapacity { .. }
                | StegoError::NonUtf8Payload(_)
        ),
        "unexpected error: {err}"
    );

    Ok(())
}

/// 空消息可以隐藏，并恢复为空字符串
#[test]
fn test_empty_message_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let image_path = dir.path().join("empty.jpg");
    let stego_path = dir.path().join("empty_out.jpg");
    create_test_jpeg(&image_path, 24, 24);

    let stego = Steganographer::default();
    stego.hide(&image_path, &stego_path, b"", &EncodeOptions::default())?;
    assert_eq!(stego.reveal(&stego_path)?, "");

    Ok(())
}

/// 配置文件中的长度头宽度会传递给帧协议
#[test]
fn test_config_header_width_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("stego.toml");
    let image_path = dir.path().join("narrow.png");
    fs::write(
        &config_path,
        "[framing]\nheader_bits = 16\n\n[output]\nsuffix = \"_hidden\"\n",
    )?;
    create_test_image(&image_path, 20, 20);

    let settings = Settings::load(&config_path)?;
    handle_hide(
        HideArgs {
            image: image_path.clone(),
            message: Some("16-bit header".to_string()),
            ..Default::default()
        },
        &settings,
    )?;
    let stego_path = dir.path().join("narrow_hidden.png");
    assert!(stego_path.exists());

    let narrow = Steganographer::new(BitFramer::new(16)?);
    assert_eq!(narrow.reveal(&stego_path)?, "16-bit header");
    assert_eq!(narrow.capacity(&image_path)?.usable_bytes, 1200 / 8 - 2);

    handle_capacity(CapacityArgs { image: image_path }, &settings)?;

    Ok(())
}

/// PSNR 报告：LSB 修改后的图像质量应为优秀
#[test]
fn test_compare_reports_excellent_quality() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let original = dir.path().join("orig.png");
    let stego_path = dir.path().join("orig_stego.png");
    create_test_image(&original, 64, 64);

    Steganographer::default().hide(
        &original,
        &stego_path,
        "quality check".repeat(20).as_bytes(),
        &EncodeOptions::default(),
    )?;

    let value = psnr(&image::open(&original)?, &image::open(&stego_path)?)?;
    assert!(value > 40.0, "PSNR {value} too low");
    assert_eq!(QualityGrade::from_psnr(value), QualityGrade::Excellent);

    handle_compare(CompareArgs {
        original,
        stego: stego_path,
    })?;

    Ok(())
}

/// 16 位 PNG 载体降为 8 位后照常隐藏与恢复
#[test]
fn test_sixteen_bit_png_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let image_path = dir.path().join("deep.png");
    let stego_path = dir.path().join("deep_out.png");
    let deep: ImageBuffer<Rgb<u16>, Vec<u16>> = ImageBuffer::from_fn(20, 20, |x, y| {
        Rgb([(x * 3100) as u16, (y * 2900) as u16, ((x + y) * 1500) as u16])
    });
    deep.save(&image_path)?;

    let stego = Steganographer::default();
    stego.hide(&image_path, &stego_path, b"hello", &EncodeOptions::default())?;
    assert_eq!(stego.reveal(&stego_path)?, "hello");
    assert_eq!(image::open(&stego_path)?.dimensions(), (20, 20));

    Ok(())
}
