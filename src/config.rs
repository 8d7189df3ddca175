//! # 配置文件
//!
//! 从 TOML 文件读取默认参数，所有字段均可省略。命令行参数优先于文件中的值。
//!
//! ```toml
//! [framing]
//! header_bits = 32
//!
//! [noise]
//! enabled = false
//! ratio = 0.0
//!
//! [output]
//! suffix = "_stego"
//!
//! [logging]
//! level = "info"
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HEADER_BITS, DEFAULT_OUTPUT_SUFFIX};
use crate::framing::BitFramer;
use crate::noise::NoiseInjector;
use crate::router::EncodeOptions;

/// 读取 TOML 文件并反序列化为 `T`。
pub fn load_config<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("Unable to read config file: {}", path.display()))?;
    let config: T = toml::from_str(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// 长度头位数。
    pub header_bits: u32,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            header_bits: DEFAULT_HEADER_BITS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub enabled: bool,
    /// 空闲系数中被扰动的比例。
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 默认输出文件名的后缀。
    pub suffix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `off`、`error`、`warn`、`info`、`debug` 或 `trace`。
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// 全部配置。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub framing: FramingConfig,
    pub noise: NoiseConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// 读取并校验配置文件。
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = load_config(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// 有路径时读取文件，否则使用默认值。
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn validate(&self) -> Result<()> {
        BitFramer::new(self.framing.header_bits).context("Invalid [framing] header_bits")?;
        NoiseInjector::new(self.noise.ratio).context("Invalid [noise] ratio")?;
        self.log_level()?;
        Ok(())
    }

    pub fn framer(&self) -> Result<BitFramer> {
        Ok(BitFramer::new(self.framing.header_bits)?)
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            anti_forensic_noise: self.noise.enabled,
            noise_ratio: self.noise.ratio,
        }
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        self.logging
            .level
            .parse()
            .with_context(|| format!("Invalid [logging] level: {}", self.logging.level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_gives_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.toml");
        fs::write(&path, "")?;
        let settings = Settings::load(&path)?;
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.output.suffix, "_stego");
        assert_eq!(settings.framer()?.header_bits(), 32);
        assert_eq!(settings.log_level()?, LevelFilter::Info);
        Ok(())
    }

    #[test]
    fn partial_file_overrides_some_keys() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            "[noise]\nenabled = true\nratio = 0.25\n\n[logging]\nlevel = \"debug\"\n",
        )?;
        let settings = Settings::load(&path)?;
        assert_eq!(
            settings.encode_options(),
            EncodeOptions {
                anti_forensic_noise: true,
                noise_ratio: 0.25
            }
        );
        assert_eq!(settings.log_level()?, LevelFilter::Debug);
        assert_eq!(settings.framing, FramingConfig::default());
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() -> Result<()> {
        let dir = tempdir()?;
        let cases = [
            "[framing]\nheader_bits = 12\n",
            "[noise]\nratio = 1.5\n",
            "[logging]\nlevel = \"loud\"\n",
            "[framing]\nheader_bits = \"wide\"\n",
        ];
        for (i, content) in cases.iter().enumerate() {
            let path = dir.path().join(format!("bad{i}.toml"));
            fs::write(&path, content)?;
            assert!(Settings::load(&path).is_err(), "case {i} should fail");
        }
        Ok(())
    }

    #[test]
    fn missing_path_uses_defaults() -> Result<()> {
        assert_eq!(Settings::load_or_default(None)?, Settings::default());
        Ok(())
    }
}
