//! # 反取证噪声
//!
//! 嵌入完成后，在未承载载荷的系数中随机挑选一部分，把它们的最低位设为随机值，
//! 使被修改过的系数与未修改的系数在统计上更难区分。

use log::debug;
use rand::Rng;
use rand::seq::index;

use crate::dct::{PositionList, set_lsb};
use crate::error::{Result, StegoError};
use crate::jpeg::CoefficientPlane;

/// 按比例向空闲位置注入随机最低位。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseInjector {
    ratio: f64,
}

impl NoiseInjector {
    /// `ratio` 是空闲位置中被扰动的比例，必须在 `[0, 1]` 内。
    pub fn new(ratio: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&ratio) {
            Ok(Self { ratio })
        } else {
            Err(StegoError::InvalidNoiseRatio(ratio))
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// 扰动 `positions[used..]` 中 `floor(空闲数 * ratio)` 个不重复的位置，返回扰动数量。
    ///
    /// `positions[..used]` 承载着载荷，永远不会被触碰。
    pub fn apply<R: Rng + ?Sized>(
        &self,
        planes: &mut [CoefficientPlane],
        positions: &PositionList,
        used: usize,
        rng: &mut R,
    ) -> usize {
        let free = positions.len().saturating_sub(used);
        let amount = (free as f64 * self.ratio).floor() as usize;
        if amount == 0 {
            return 0;
        }

        for offset in index::sample(rng, free, amount).into_iter() {
            // 下标来自 positions 自身的范围
            if let Some(position) = positions.get(used + offset) {
                set_lsb(planes, position, u8::from(rng.random::<bool>()));
            }
        }
        debug!("Injected noise into {amount} of {free} free coefficient positions");
        amount
    }
}
