//! 色度（YUV）抠像：只比较 `(u, v)`，对亮度变化不敏感。

use super::edge::{despill, unblend};
use super::{ALPHA_FLOOR, ChromaKeyOptions, MATCH_EPSILON, NEAR_TRANSPARENT, ResolvedKey, erase_masked};
use crate::sprite_sheet::color::rgb_to_uv;
use crate::sprite_sheet::distance;
use crate::sprite_sheet::flood::flood_fill_from_borders;
use crate::sprite_sheet::key_color::KeyColorSample;
use crate::sprite_sheet::PixelBuffer;

/// 羽化半径（像素）。
pub(crate) const EDGE_RADIUS: u8 = 3;
const UV_TOLERANCE_BASE: f32 = 10.0;
const UV_TOLERANCE_RANGE: f32 = 80.0;

#[inline]
fn uv_distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

pub(super) fn apply(buffer: &mut PixelBuffer, options: &ChromaKeyOptions, sample: &KeyColorSample) {
    let key = ResolvedKey::new(options, sample);
    let key_uv = rgb_to_uv(key.color.r, key.color.g, key.color.b);
    let tol = UV_TOLERANCE_BASE + options.similarity * UV_TOLERANCE_RANGE;
    let soft = tol * (1.8 + options.smoothness * 2.2);

    let mask = flood_fill_from_borders(buffer, |_, _, [r, g, b, a]| {
        a <= NEAR_TRANSPARENT || uv_distance(rgb_to_uv(r, g, b), key_uv) <= tol
    });
    let erased = erase_masked(buffer, &mask);

    let width = buffer.width();
    let height = buffer.height();
    let field = distance::compute(&mask, width, height, EDGE_RADIUS);
    let mut feathered = 0usize;

    let data = buffer.as_bytes_mut();
    for (idx, d) in field.iter().enumerate() {
        if *d == 0 || *d > EDGE_RADIUS {
            continue;
        }
        let px = &mut data[idx * 4..idx * 4 + 4];
        if px[3] == 0 {
            continue;
        }

        let proximity = 1.0 - (*d as f32 - 1.0) / EDGE_RADIUS as f32;
        let uvd = uv_distance(rgb_to_uv(px[0], px[1], px[2]), key_uv);
        let m = (1.0 - (uvd - tol) / (soft - tol)).clamp(0.0, 1.0);
        if m < MATCH_EPSILON {
            continue;
        }

        let alpha = px[3] as f32 * (1.0 - m * proximity);
        if alpha < ALPHA_FLOOR {
            px[3] = 0;
            feathered += 1;
            continue;
        }

        let alpha_f = alpha / 255.0;
        unblend(px, key.color, alpha_f);
        despill(px, key.color, options.spill * proximity * (1.0 - alpha_f * 0.5));
        px[3] = alpha.round() as u8;
        feathered += 1;
    }

    log::debug!(
        "🧹 yuv 抠像：uv 容差={:.1} 擦除={} 羽化={}",
        tol,
        erased,
        feathered
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite_sheet::chroma::test_support::sprite_on_background;
    use crate::sprite_sheet::key_color;

    #[test]
    fn darker_shade_of_key_is_still_background() {
        // 亮度不同但色度相近：YUV 仍应判为背景
        let mut buf = sprite_on_background(32, [30, 200, 30, 255], [255, 0, 255, 255]);
        buf.set(0, 5, [200, 0, 200, 255]);
        buf.set(1, 5, [200, 0, 200, 255]);
        let sample = key_color::detect(&buf);
        apply(&mut buf, &ChromaKeyOptions::default(), &sample);
        assert_eq!(buf.alpha(0, 5), 0);
        assert_eq!(buf.alpha(1, 5), 0);
    }

    #[test]
    fn feathering_fades_with_distance() {
        // 左侧一列为键色，其余为略偏离键色的品红
        let mut buf = PixelBuffer::new_transparent(12, 3).expect("alloc failed");
        for y in 0..3 {
            for x in 0..12 {
                let rgba = if x == 0 { [255, 0, 255, 255] } else { [240, 10, 240, 255] };
                buf.set(x, y, rgba);
            }
        }
        let options = ChromaKeyOptions {
            similarity: 0.0,
            ..ChromaKeyOptions::default()
        };
        apply(&mut buf, &options, &KeyColorSample::DEFAULT);

        // x = 1 离背景 1，x = 3 离背景 3，x = 8 超出羽化半径
        let near = buf.alpha(1, 1);
        let far = buf.alpha(3, 1);
        assert!(near < far, "near={near} far={far}");
        assert!(far < 255);
        assert_eq!(buf.alpha(0, 1), 0);
        assert_eq!(buf.alpha(8, 1), 255);
    }
}
