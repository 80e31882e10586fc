//! HSL 色相抠像。

use super::{ALPHA_FLOOR, ChromaKeyOptions, MATCH_EPSILON, NEAR_TRANSPARENT, ResolvedKey, erase_masked};
use crate::sprite_sheet::color::{hue_distance, rgb_to_hsl};
use crate::sprite_sheet::flood::{flood_fill_from_borders, touches_mask};
use crate::sprite_sheet::key_color::KeyColorSample;
use crate::sprite_sheet::PixelBuffer;

const MAGENTA_HUE: f32 = 300.0;
const HUE_TOLERANCE_BASE: f32 = 12.0;
const HUE_TOLERANCE_RANGE: f32 = 48.0;
const LIGHTNESS_MIN: f32 = 0.12;
const LIGHTNESS_MAX: f32 = 0.92;

struct HueGate {
    hue: f32,
    hue_tol: f32,
    sat_min: f32,
}

impl HueGate {
    fn new(key: &ResolvedKey, options: &ChromaKeyOptions) -> Self {
        let hue = if key.magenta {
            MAGENTA_HUE
        } else {
            rgb_to_hsl(key.color.r, key.color.g, key.color.b).0
        };
        Self {
            hue,
            hue_tol: HUE_TOLERANCE_BASE + options.similarity * HUE_TOLERANCE_RANGE,
            sat_min: (0.3 - options.similarity * 0.2).max(0.05),
        }
    }

    fn is_background(&self, r: u8, g: u8, b: u8) -> bool {
        let (h, s, l) = rgb_to_hsl(r, g, b);
        hue_distance(h, self.hue) <= self.hue_tol
            && s >= self.sat_min
            && (LIGHTNESS_MIN..=LIGHTNESS_MAX).contains(&l)
    }

    fn edge_match(&self, r: u8, g: u8, b: u8) -> f32 {
        let (h, s, _) = rgb_to_hsl(r, g, b);
        let hue_match = (1.0 - hue_distance(h, self.hue) / (self.hue_tol * 2.0)).clamp(0.0, 1.0);
        let sat_match = ((s - self.sat_min * 0.5) / self.sat_min).clamp(0.0, 1.0);
        hue_match * sat_match
    }
}

pub(super) fn apply(buffer: &mut PixelBuffer, options: &ChromaKeyOptions, sample: &KeyColorSample) {
    let key = ResolvedKey::new(options, sample);
    let gate = HueGate::new(&key, options);

    let mask = flood_fill_from_borders(buffer, |_, _, [r, g, b, a]| {
        a <= NEAR_TRANSPARENT || gate.is_background(r, g, b)
    });
    let erased = erase_masked(buffer, &mask);

    let width = buffer.width();
    let height = buffer.height();
    let exponent = 1.0 / (1.0 + options.smoothness * 8.0);
    let mut ramped = 0usize;

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

            let m = gate.edge_match(px[0], px[1], px[2]);
            if m < MATCH_EPSILON {
                continue;
            }

            let alpha = px[3] as f32 * (1.0 - m.powf(exponent));
            px[3] = if alpha < ALPHA_FLOOR { 0 } else { alpha.round() as u8 };
            ramped += 1;
        }
    }

    log::debug!(
        "🧹 hsl 抠像：色相={:.0}° 容差={:.0}° 擦除={} 边缘={}",
        gate.hue,
        gate.hue_tol,
        erased,
        ramped
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe(edge: [u8; 4]) -> PixelBuffer {
        // 第 0 列品红，第 1 列为待测边缘，其余为绿色前景
        let mut buf = PixelBuffer::new_transparent(6, 3).expect("alloc failed");
        for y in 0..3 {
            for x in 0..6 {
                let rgba = match x {
                    0 => [255, 0, 255, 255],
                    1 => edge,
                    _ => [20, 180, 20, 255],
                };
                buf.set(x, y, rgba);
            }
        }
        buf
    }

    #[test]
    fn smoothness_softens_the_ramp() {
        // 色相 320°：落在容差外，但仍有部分匹配
        let edge = [220, 40, 160, 255];
        let options = ChromaKeyOptions {
            similarity: 0.0,
            smoothness: 0.0,
            ..ChromaKeyOptions::default()
        };

        let mut hard = stripe(edge);
        apply(&mut hard, &options, &KeyColorSample::DEFAULT);
        let mut soft = stripe(edge);
        apply(
            &mut soft,
            &ChromaKeyOptions {
                smoothness: 1.0,
                ..options
            },
            &KeyColorSample::DEFAULT,
        );

        let hard_alpha = hard.alpha(1, 1);
        let soft_alpha = soft.alpha(1, 1);
        assert!(hard_alpha < 255);
        assert!(soft_alpha < hard_alpha, "soft={soft_alpha} hard={hard_alpha}");
        assert_eq!(hard.alpha(4, 1), 255);
    }

    #[test]
    fn foreground_hue_is_not_ramped() {
        let mut buf = stripe([20, 180, 20, 255]);
        apply(&mut buf, &ChromaKeyOptions::default(), &KeyColorSample::DEFAULT);
        assert_eq!(buf.alpha(0, 1), 0);
        assert_eq!(buf.alpha(1, 1), 255);
    }
}
