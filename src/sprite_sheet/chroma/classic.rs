//! 经典 RGB 距离抠像。

use super::edge::{despill, unblend};
use super::{ALPHA_FLOOR, ChromaKeyOptions, MATCH_EPSILON, NEAR_TRANSPARENT, ResolvedKey, erase_masked, magenta_dominance};
use crate::sprite_sheet::flood::{flood_fill_from_borders, touches_mask};
use crate::sprite_sheet::key_color::KeyColorSample;
use crate::sprite_sheet::{PixelBuffer, Rgb};

/// RGB 距离容差：`BASE + similarity * RANGE`，品红键色再按主导度放大。
const TOLERANCE_BASE: f32 = 24.0;
const TOLERANCE_RANGE: f32 = 150.0;
const MAGENTA_TOLERANCE_BOOST: f32 = 0.5;

pub(crate) fn tolerance(key: &ResolvedKey, options: &ChromaKeyOptions) -> f32 {
    let base = TOLERANCE_BASE + options.similarity * TOLERANCE_RANGE;
    if key.magenta {
        base * (1.0 + MAGENTA_TOLERANCE_BOOST * key.dominance)
    } else {
        base
    }
}

pub(super) fn apply(buffer: &mut PixelBuffer, options: &ChromaKeyOptions, sample: &KeyColorSample) {
    let key = ResolvedKey::new(options, sample);
    let tol = tolerance(&key, options);
    let tol_sq = tol * tol;

    let mask = flood_fill_from_borders(buffer, |_, _, [r, g, b, a]| {
        a <= NEAR_TRANSPARENT || (Rgb::new(r, g, b).distance_sq(key.color) as f32) <= tol_sq
    });
    let erased = erase_masked(buffer, &mask);

    let width = buffer.width();
    let height = buffer.height();
    let soft = tol * (1.6 + options.smoothness * 2.4);
    let strength = 0.4 + 0.6 * options.smoothness;
    let mut softened = 0usize;

    for y in 0..height {
        for x in 0..width {
            if !touches_mask(&mask, width, height, x, y) {
                continue;
            }
            let Some(i) = buffer.index_of(x, y) else {
                continue;
            };
            let px = &mut buffer.as_bytes_mut()[i..i + 4];
            if px[3] == 0 {
                continue;
            }

            let m = edge_match(px, &key, tol, soft);
            if m < MATCH_EPSILON {
                continue;
            }

            let alpha = px[3] as f32 * (1.0 - m * strength);
            if alpha < ALPHA_FLOOR {
                px[3] = 0;
                softened += 1;
                continue;
            }

            let alpha_f = alpha / 255.0;
            unblend(px, key.color, alpha_f);
            despill(px, key.color, options.spill * (1.0 - alpha_f * 0.5));
            px[3] = alpha.round() as u8;
            softened += 1;
        }
    }

    log::debug!(
        "🧹 classic 抠像：键色=({}, {}, {}) 容差={:.1} 擦除={} 边缘={}",
        key.color.r,
        key.color.g,
        key.color.b,
        tol,
        erased,
        softened
    );
}

/// 边缘像素与背景的匹配度 `[0, 1]`。
fn edge_match(px: &[u8], key: &ResolvedKey, tol: f32, soft: f32) -> f32 {
    if key.magenta {
        let pd = magenta_dominance(px[0], px[1], px[2]);
        let balance = 1.0 - (px[0] as f32 - px[2] as f32).abs() / 255.0;
        return (pd * balance / key.dominance.max(0.2)).clamp(0.0, 1.0);
    }
    let d = (Rgb::new(px[0], px[1], px[2]).distance_sq(key.color) as f32).sqrt();
    if soft <= tol {
        return if d <= tol { 1.0 } else { 0.0 };
    }
    (1.0 - (d - tol) / (soft - tol)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite_sheet::chroma::test_support::sprite_on_background;
    use crate::sprite_sheet::key_color::{self, KeyColorMode};

    /// 16x16：背景 + 一圈单像素描边 (5..11) + 实心核心 (6..10)。
    fn ringed_sprite(bg: [u8; 4], ring: [u8; 4], core: [u8; 4]) -> PixelBuffer {
        let mut buf = PixelBuffer::new_transparent(16, 16).expect("alloc failed");
        for y in 0..16 {
            for x in 0..16 {
                let rgba = if (6..10).contains(&x) && (6..10).contains(&y) {
                    core
                } else if (5..11).contains(&x) && (5..11).contains(&y) {
                    ring
                } else {
                    bg
                };
                buf.set(x, y, rgba);
            }
        }
        buf
    }

    #[test]
    fn blended_rim_is_removed_and_core_kept() {
        let mut buf = sprite_on_background(32, [40, 40, 200, 255], [255, 0, 255, 255]);
        let sample = key_color::detect(&buf);
        assert_eq!(sample.mode, KeyColorMode::Magenta);

        apply(&mut buf, &ChromaKeyOptions::default(), &sample);

        let rim = buf.get(7, 16).expect("rim pixel");
        assert!(rim[3] < 255, "rim alpha should drop, got {:?}", rim);
        let core = buf.get(8, 16).expect("core pixel");
        assert_eq!(core, [40, 40, 200, 255]);
    }

    #[test]
    fn red_key_uses_color_distance() {
        let mut buf = sprite_on_background(32, [20, 20, 20, 255], [230, 20, 20, 255]);
        let sample = key_color::detect(&buf);
        assert_eq!(sample.mode, KeyColorMode::Red);

        apply(&mut buf, &ChromaKeyOptions::default(), &sample);
        assert_eq!(buf.alpha(0, 0), 0);
        assert_eq!(buf.alpha(3, 20), 0);
        assert_eq!(buf.get(16, 16), Some([20, 20, 20, 255]));
    }

    #[test]
    fn magenta_key_widens_tolerance() {
        let options = ChromaKeyOptions::default();
        let magenta = ResolvedKey::new(&options, &KeyColorSample::DEFAULT);
        let gray = ResolvedKey::new(
            &ChromaKeyOptions {
                key_color: Some(Rgb::new(90, 90, 90)),
                ..options
            },
            &KeyColorSample::DEFAULT,
        );
        assert!(tolerance(&magenta, &options) > tolerance(&gray, &options));
    }

    #[test]
    fn partial_match_edge_is_graded_unblended_and_despilled() {
        let ring = [180, 70, 150, 255];
        let mut buf = ringed_sprite([255, 0, 255, 255], ring, [30, 160, 60, 255]);
        let sample = key_color::detect(&buf);
        assert_eq!(sample.mode, KeyColorMode::Magenta);

        apply(&mut buf, &ChromaKeyOptions::default(), &sample);

        assert_eq!(buf.alpha(0, 0), 0);
        let edge = buf.get(5, 8).expect("edge pixel");
        assert!(edge[3] >= 24 && edge[3] < 255, "edge alpha should be graded, got {:?}", edge);
        assert!((edge[3] as i32 - 223).abs() <= 2, "unexpected edge alpha {:?}", edge);
        // 反混合抬高了被键色压低的 G，去溢色把 R/B 拉向 G
        assert!(edge[1] > ring[1], "green should be unblended upward, got {:?}", edge);
        assert!(edge[0] < ring[0] && edge[2] < ring[2], "spill should be reduced, got {:?}", edge);
        assert!(edge[0] > edge[1] && edge[2] > edge[1], "despill overshot, got {:?}", edge);
        assert_eq!(buf.get(7, 8), Some([30, 160, 60, 255]));
    }

    #[test]
    fn weak_match_edge_is_left_untouched() {
        let ring = [120, 100, 110, 255];
        let mut buf = ringed_sprite([255, 0, 255, 255], ring, [30, 160, 60, 255]);
        let sample = key_color::detect(&buf);

        apply(&mut buf, &ChromaKeyOptions::default(), &sample);

        assert_eq!(buf.alpha(0, 0), 0);
        assert_eq!(buf.get(5, 8), Some(ring));
        assert_eq!(buf.get(5, 5), Some(ring));
    }

    #[test]
    fn strong_match_edge_below_floor_is_erased() {
        let options = ChromaKeyOptions {
            key_color: Some(Rgb::new(0, 200, 0)),
            similarity: 0.0,
            smoothness: 1.0,
            ..ChromaKeyOptions::default()
        };
        let mut buf = ringed_sprite([0, 200, 0, 255], [0, 200, 30, 255], [40, 40, 200, 255]);

        apply(&mut buf, &options, &KeyColorSample::DEFAULT);

        assert_eq!(buf.alpha(0, 0), 0);
        // 距离 30 刚好超出容差 24，未被填充，但匹配度约 0.92，衰减后低于下限
        assert_eq!(buf.alpha(5, 8), 0);
        assert_eq!(buf.alpha(10, 10), 0);
        assert_eq!(buf.get(7, 7), Some([40, 40, 200, 255]));
    }
}
