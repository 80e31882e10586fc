//! # 抠像分割模块（chroma）
//!
//! ## 设计思路
//!
//! 四种可互换的背景分割算法共享同一签名
//! `(buffer, options, key_sample)`，以闭合枚举 `ChromaKeyAlgorithm` 分发：
//!
//! - `classic`：RGB 距离洪水填充 + 边缘分级透明 + 反混合 + 去溢色
//! - `yuv`：只看色度 `(u, v)`，借助距离场在固定半径内羽化
//! - `hsl`：按色相/饱和度匹配，边缘用指数软化的透明度斜坡
//! - `aggressive`：宽松预处理擦除后再跑一遍 `classic`
//!
//! ## 共同约束
//!
//! - 原地修改缓冲，不依赖任何外部状态；
//! - alpha 已经为 0 的像素一律不动；
//! - 任意尺寸（包括 0 面积、单行单列）都不能 panic。

mod aggressive;
mod classic;
mod edge;
mod hsl;
mod yuv;

use serde::{Deserialize, Serialize};

use super::key_color::{KeyColorMode, KeyColorSample, is_magenta_like, is_red_dominant};
use super::{PixelBuffer, Rgb};

/// alpha 不超过该值的边界像素直接视为背景。
pub(crate) const NEAR_TRANSPARENT: u8 = 8;
/// 匹配度低于该值的边缘像素保持原样。
pub(crate) const MATCH_EPSILON: f32 = 0.08;
/// 衰减后 alpha 低于该值的像素直接擦除。
pub(crate) const ALPHA_FLOOR: f32 = 24.0;

/// 分割算法。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaKeyAlgorithm {
    #[default]
    Classic,
    Yuv,
    Hsl,
    Aggressive,
}

impl ChromaKeyAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Yuv => "yuv",
            Self::Hsl => "hsl",
            Self::Aggressive => "aggressive",
        }
    }

    /// 对缓冲执行所选算法。
    pub fn apply(self, buffer: &mut PixelBuffer, options: &ChromaKeyOptions, sample: &KeyColorSample) {
        if buffer.is_empty() {
            return;
        }
        let options = options.clamped();
        match self {
            Self::Classic => classic::apply(buffer, &options, sample),
            Self::Yuv => yuv::apply(buffer, &options, sample),
            Self::Hsl => hsl::apply(buffer, &options, sample),
            Self::Aggressive => aggressive::apply(buffer, &options, sample),
        }
    }
}

impl std::str::FromStr for ChromaKeyAlgorithm {
    type Err = super::SpriteSheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "yuv" => Ok(Self::Yuv),
            "hsl" => Ok(Self::Hsl),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(super::SpriteSheetError::InvalidFormat(format!(
                "未知抠像算法：{}（可选：classic / yuv / hsl / aggressive）",
                other
            ))),
        }
    }
}

/// 调用方提供的抠像参数，缺省时使用 `Default`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChromaKeyOptions {
    /// 手动指定键色；为空时使用自动检测结果。
    pub key_color: Option<Rgb>,
    pub similarity: f32,
    pub smoothness: f32,
    pub spill: f32,
}

impl Default for ChromaKeyOptions {
    fn default() -> Self {
        Self {
            key_color: None,
            similarity: 0.4,
            smoothness: 0.1,
            spill: 0.5,
        }
    }
}

impl ChromaKeyOptions {
    /// 三个系数夹取到 `[0, 1]`，NaN 视为 0。
    pub fn clamped(&self) -> Self {
        let unit = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self {
            key_color: self.key_color,
            similarity: unit(self.similarity),
            smoothness: unit(self.smoothness),
            spill: unit(self.spill),
        }
    }
}

/// 合并调用方键色与检测样本后的实际键色。
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedKey {
    pub color: Rgb,
    pub magenta: bool,
    pub red: bool,
    /// 品红主导度：`(min(r, b) - g) / 255`，夹取到 `[0, 1]`。
    pub dominance: f32,
}

impl ResolvedKey {
    pub fn new(options: &ChromaKeyOptions, sample: &KeyColorSample) -> Self {
        let (color, magenta, red) = match options.key_color {
            Some(c) => (c, is_magenta_like(c.r, c.g, c.b), is_red_dominant(c.r, c.g, c.b)),
            None => (
                sample.rgb(),
                matches!(sample.mode, KeyColorMode::Magenta | KeyColorMode::Unknown),
                sample.mode == KeyColorMode::Red,
            ),
        };
        Self {
            color,
            magenta,
            red,
            dominance: magenta_dominance(color.r, color.g, color.b),
        }
    }
}

#[inline]
pub(crate) fn magenta_dominance(r: u8, g: u8, b: u8) -> f32 {
    ((r.min(b) as f32 - g as f32) / 255.0).clamp(0.0, 1.0)
}

/// 将掩码内仍可见的像素置为全透明。
pub(crate) fn erase_masked(buffer: &mut PixelBuffer, mask: &[u8]) -> usize {
    let data = buffer.as_bytes_mut();
    let mut erased = 0;
    for (idx, m) in mask.iter().enumerate() {
        let a = idx * 4 + 3;
        if *m != 0 && data[a] != 0 {
            data[a] = 0;
            erased += 1;
        }
    }
    erased
}


#[cfg(test)]
mod tests {
    use super::test_support::sprite_on_background;
    use super::*;
    use crate::sprite_sheet::key_color;

    const ALL: [ChromaKeyAlgorithm; 4] = [
        ChromaKeyAlgorithm::Classic,
        ChromaKeyAlgorithm::Yuv,
        ChromaKeyAlgorithm::Hsl,
        ChromaKeyAlgorithm::Aggressive,
    ];

    #[test]
    fn every_algorithm_clears_the_border_and_keeps_the_core() {
        for algorithm in ALL {
            let mut buf = sprite_on_background(32, [30, 160, 60, 255], [255, 0, 255, 255]);
            let sample = key_color::detect(&buf);
            algorithm.apply(&mut buf, &ChromaKeyOptions::default(), &sample);

            assert_eq!(buf.alpha(0, 0), 0, "{:?} left the corner opaque", algorithm);
            assert_eq!(buf.alpha(31, 16), 0, "{:?} left the edge opaque", algorithm);
            assert_eq!(buf.get(16, 16), Some([30, 160, 60, 255]), "{:?} touched the core", algorithm);
        }
    }

    #[test]
    fn zero_alpha_pixels_are_never_modified() {
        for algorithm in ALL {
            let mut buf = sprite_on_background(24, [200, 200, 40, 255], [255, 0, 255, 255]);
            buf.set(0, 0, [12, 34, 56, 0]);
            buf.set(12, 12, [255, 0, 255, 0]);
            let sample = key_color::detect(&buf);
            algorithm.apply(&mut buf, &ChromaKeyOptions::default(), &sample);
            assert_eq!(buf.get(0, 0), Some([12, 34, 56, 0]), "{:?}", algorithm);
            assert_eq!(buf.get(12, 12), Some([255, 0, 255, 0]), "{:?}", algorithm);
        }
    }

    #[test]
    fn degenerate_buffers_do_not_panic() {
        for algorithm in ALL {
            for (w, h) in [(0, 0), (1, 1), (1, 9), (9, 1), (2, 2)] {
                let mut buf = PixelBuffer::new_transparent(w, h).expect("alloc failed");
                for y in 0..h {
                    for x in 0..w {
                        buf.set(x, y, [255, 0, 255, 255]);
                    }
                }
                algorithm.apply(&mut buf, &ChromaKeyOptions::default(), &KeyColorSample::DEFAULT);
            }
        }
    }

    #[test]
    fn algorithms_are_deterministic() {
        for algorithm in ALL {
            let source = sprite_on_background(40, [240, 120, 30, 255], [255, 0, 255, 255]);
            let sample = key_color::detect(&source);
            let mut a = source.clone();
            let mut b = source.clone();
            algorithm.apply(&mut a, &ChromaKeyOptions::default(), &sample);
            algorithm.apply(&mut b, &ChromaKeyOptions::default(), &sample);
            assert_eq!(a, b, "{:?}", algorithm);
        }
    }

    #[test]
    fn algorithm_tags_parse_and_serialize() {
        for algorithm in ALL {
            let parsed: ChromaKeyAlgorithm = algorithm.as_str().parse().expect("known tag");
            assert_eq!(parsed, algorithm);
            let json = serde_json::to_string(&algorithm).expect("serialize");
            assert_eq!(json, format!("\"{}\"", algorithm.as_str()));
        }
        assert!("lab".parse::<ChromaKeyAlgorithm>().is_err());
    }

    #[test]
    fn options_are_clamped() {
        let options = ChromaKeyOptions {
            key_color: None,
            similarity: 3.0,
            smoothness: -1.0,
            spill: f32::NAN,
        }
        .clamped();
        assert_eq!((options.similarity, options.smoothness, options.spill), (1.0, 0.0, 0.0));
    }
}
