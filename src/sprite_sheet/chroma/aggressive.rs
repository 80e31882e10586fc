//! 激进抠像：宽松的第一遍擦除 + 经典算法收尾。
//!
//! 品红变体判定由多组独立调校的阈值 OR 组合而成，数值保持原样，不做推导。

use super::{ChromaKeyOptions, NEAR_TRANSPARENT, ResolvedKey, classic, erase_masked};
use crate::sprite_sheet::color::rgb_to_hsl;
use crate::sprite_sheet::flood::flood_fill_from_borders;
use crate::sprite_sheet::key_color::KeyColorSample;
use crate::sprite_sheet::{PixelBuffer, Rgb};

const LOOSE_DISTANCE_BASE: f32 = 80.0;
const LOOSE_DISTANCE_RANGE: f32 = 160.0;

/// 宽泛的品红变体判定。
pub(crate) fn is_magenta_variant(r: u8, g: u8, b: u8) -> bool {
    let (ri, gi, bi) = (r as i32, g as i32, b as i32);
    if ri > 150 && bi > 150 && gi < 100 {
        return true;
    }
    if ri > 180 && bi > 120 && gi < ri - 60 && gi < bi - 40 {
        return true;
    }
    if ri - gi > 80 && bi - gi > 80 {
        return true;
    }
    let (h, s, l) = rgb_to_hsl(r, g, b);
    (270.0..=340.0).contains(&h) && s > 0.35 && l > 0.2 && l < 0.85
}

pub(super) fn apply(buffer: &mut PixelBuffer, options: &ChromaKeyOptions, sample: &KeyColorSample) {
    let key = ResolvedKey::new(options, sample);
    let loose = LOOSE_DISTANCE_BASE + options.similarity * LOOSE_DISTANCE_RANGE;
    let loose_sq = loose * loose;
    let use_variant = !key.red;

    let mask = flood_fill_from_borders(buffer, |_, _, [r, g, b, a]| {
        a <= NEAR_TRANSPARENT
            || (Rgb::new(r, g, b).distance_sq(key.color) as f32) <= loose_sq
            || (use_variant && is_magenta_variant(r, g, b))
    });
    let erased = erase_masked(buffer, &mask);
    log::debug!("🧹 aggressive 预处理：宽松距离={:.0} 擦除={}", loose, erased);

    classic::apply(buffer, options, sample);
}
