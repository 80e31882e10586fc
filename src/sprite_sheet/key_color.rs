//! # 抠像键色检测模块
//!
//! ## 设计思路
//!
//! 精灵图背景通常是纯品红或纯红。检测只看外圈 2 行/2 列与四个角，
//! 按固定步长均匀取样（不使用随机数），保证同一缓冲必然得到同一结果。
//!
//! ## 实现思路
//!
//! 1. 采样：alpha >= 128 的边缘像素
//! 2. 分类：品红类 / 红色类
//! 3. 多数决：品红数量需超过红色且至少 3 个；否则红色需超过 4 个
//! 4. 返回胜出类别的平均色；没有合格样本时回落为 `(255, 0, 255)`

use serde::{Deserialize, Serialize};

use super::{PixelBuffer, Rgb};

/// 每条边缘线最多取样数量。
const MAX_SAMPLES_PER_LINE: u32 = 64;
const MIN_SAMPLE_ALPHA: u8 = 128;

/// 键色类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyColorMode {
    Magenta,
    Red,
    Unknown,
}

/// 检测得到的键色样本，单次构建内只读。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColorSample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub mode: KeyColorMode,
}

impl KeyColorSample {
    pub const DEFAULT: KeyColorSample = KeyColorSample {
        r: 255,
        g: 0,
        b: 255,
        mode: KeyColorMode::Unknown,
    };

    pub fn rgb(&self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }
}

/// 品红类判定。
#[inline]
pub fn is_magenta_like(r: u8, g: u8, b: u8) -> bool {
    let min_rb = r.min(b) as i32;
    (min_rb - g as i32 > 30 && r > 120 && b > 120) || (r > 200 && b > 200 && g < 80)
}

/// 红色主导判定。
#[inline]
pub fn is_red_dominant(r: u8, g: u8, b: u8) -> bool {
    r as i32 - g.max(b) as i32 > 50
}

#[derive(Default)]
struct ColorAccumulator {
    count: u32,
    r: u64,
    g: u64,
    b: u64,
}

impl ColorAccumulator {
    fn push(&mut self, r: u8, g: u8, b: u8) {
        self.count += 1;
        self.r += r as u64;
        self.g += g as u64;
        self.b += b as u64;
    }

    fn average(&self) -> Rgb {
        let n = self.count.max(1) as u64;
        Rgb::new((self.r / n) as u8, (self.g / n) as u8, (self.b / n) as u8)
    }
}

/// 从边缘像素推断背景键色。
pub fn detect(buffer: &PixelBuffer) -> KeyColorSample {
    let width = buffer.width();
    let height = buffer.height();
    if width == 0 || height == 0 {
        return KeyColorSample::DEFAULT;
    }

    let mut magenta = ColorAccumulator::default();
    let mut red = ColorAccumulator::default();

    let mut classify = |x: u32, y: u32| {
        let Some([r, g, b, a]) = buffer.get(x, y) else {
            return;
        };
        if a < MIN_SAMPLE_ALPHA {
            return;
        }
        if is_magenta_like(r, g, b) {
            magenta.push(r, g, b);
        } else if is_red_dominant(r, g, b) {
            red.push(r, g, b);
        }
    };

    let step_x = (width / MAX_SAMPLES_PER_LINE).max(1);
    let step_y = (height / MAX_SAMPLES_PER_LINE).max(1);

    for y in border_lines(height) {
        let mut x = 0;
        while x < width {
            classify(x, y);
            x += step_x;
        }
    }
    for x in border_lines(width) {
        let mut y = 0;
        while y < height {
            classify(x, y);
            y += step_y;
        }
    }
    for (x, y) in [(0, 0), (width - 1, 0), (0, height - 1), (width - 1, height - 1)] {
        classify(x, y);
    }

    let (acc, mode) = if magenta.count > red.count && magenta.count >= 3 {
        (&magenta, KeyColorMode::Magenta)
    } else if red.count > 4 {
        (&red, KeyColorMode::Red)
    } else {
        log::debug!(
            "🎯 未识别出背景键色（magenta={} red={}），回落默认品红",
            magenta.count,
            red.count
        );
        return KeyColorSample::DEFAULT;
    };

    let color = acc.average();
    log::debug!(
        "🎯 键色检测：{:?} rgb=({}, {}, {}) magenta={} red={}",
        mode,
        color.r,
        color.g,
        color.b,
        magenta.count,
        red.count
    );

    KeyColorSample {
        r: color.r,
        g: color.g,
        b: color.b,
        mode,
    }
}

/// 外圈两条线的坐标（尺寸为 1 时只有一条）。
fn border_lines(extent: u32) -> Vec<u32> {
    let mut lines = vec![0];
    for v in [1, extent.saturating_sub(2), extent.saturating_sub(1)] {
        if v < extent && !lines.contains(&v) {
            lines.push(v);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(width: u32, height: u32, rgba: [u8; 4]) -> PixelBuffer {
        let mut buf = PixelBuffer::new_transparent(width, height).expect("alloc failed");
        for y in 0..height {
            for x in 0..width {
                buf.set(x, y, rgba);
            }
        }
        buf
    }

    #[test]
    fn detects_magenta_background() {
        let buf = filled(64, 64, [250, 10, 245, 255]);
        let sample = detect(&buf);
        assert_eq!(sample.mode, KeyColorMode::Magenta);
        assert_eq!(sample.rgb(), Rgb::new(250, 10, 245));
    }

    #[test]
    fn detects_red_background() {
        let buf = filled(40, 40, [220, 30, 20, 255]);
        let sample = detect(&buf);
        assert_eq!(sample.mode, KeyColorMode::Red);
        assert_eq!(sample.r, 220);
    }

    #[test]
    fn falls_back_to_default_for_neutral_or_transparent_border() {
        assert_eq!(detect(&filled(32, 32, [40, 200, 40, 255])), KeyColorSample::DEFAULT);
        assert_eq!(detect(&filled(32, 32, [255, 0, 255, 10])), KeyColorSample::DEFAULT);
        assert_eq!(detect(&filled(0, 0, [0; 4])), KeyColorSample::DEFAULT);
    }

    #[test]
    fn detection_is_deterministic() {
        let mut buf = filled(97, 53, [255, 0, 255, 255]);
        buf.set(0, 0, [255, 40, 60, 255]);
        buf.set(96, 52, [10, 10, 10, 255]);
        assert_eq!(detect(&buf), detect(&buf));
    }

    #[test]
    fn tiny_buffers_do_not_panic() {
        let sample = detect(&filled(1, 1, [255, 0, 255, 255]));
        assert_eq!(sample.mode, KeyColorMode::Magenta);
    }
}
