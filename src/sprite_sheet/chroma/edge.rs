//! 边缘像素的反混合（unblend）与去溢色（despill）。

use crate::sprite_sheet::Rgb;

/// 键色通道需高出三通道均值多少才算“主导通道”。
const DOMINANT_MARGIN: f32 = 16.0;

/// 反混合：假设 `observed = fg * α + key * (1 - α)`，解出前景色。
#[inline]
pub(crate) fn unblend(px: &mut [u8], key: Rgb, alpha: f32) {
    if !(alpha > 0.0 && alpha < 1.0) {
        return;
    }
    let inv = 1.0 - alpha;
    let key = [key.r, key.g, key.b];
    for c in 0..3 {
        let v = (px[c] as f32 - key[c] as f32 * inv) / alpha;
        px[c] = v.round().clamp(0.0, 255.0) as u8;
    }
}

/// 去溢色：把键色主导通道拉向其余通道的最大值，`strength ∈ [0, 1]`。
#[inline]
pub(crate) fn despill(px: &mut [u8], key: Rgb, strength: f32) {
    if strength <= 0.0 {
        return;
    }
    let key = [key.r as f32, key.g as f32, key.b as f32];
    let mean = (key[0] + key[1] + key[2]) / 3.0;
    let dominant = [
        key[0] > mean + DOMINANT_MARGIN,
        key[1] > mean + DOMINANT_MARGIN,
        key[2] > mean + DOMINANT_MARGIN,
    ];
    if dominant.iter().all(|d| !*d) || dominant.iter().all(|d| *d) {
        return;
    }

    let limit = (0..3)
        .filter(|c| !dominant[*c])
        .map(|c| px[c])
        .max()
        .unwrap_or(0) as f32;

    let strength = strength.min(1.0);
    for c in 0..3 {
        if dominant[c] && px[c] as f32 > limit {
            let v = px[c] as f32 - (px[c] as f32 - limit) * strength;
            px[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unblend_recovers_foreground() {
        // 50% 红 (200, 40, 40) 混合品红
        let mut px = [228u8, 20, 148, 128];
        unblend(&mut px, Rgb::MAGENTA, 0.5);
        assert!((px[0] as i32 - 201).abs() <= 1);
        assert!((px[1] as i32 - 40).abs() <= 1);
        assert!((px[2] as i32 - 41).abs() <= 1);
    }

    #[test]
    fn unblend_ignores_opaque_and_transparent() {
        let mut px = [10u8, 20, 30, 255];
        unblend(&mut px, Rgb::MAGENTA, 1.0);
        unblend(&mut px, Rgb::MAGENTA, 0.0);
        assert_eq!(px, [10, 20, 30, 255]);
    }

    #[test]
    fn despill_pulls_key_channels_toward_neutral() {
        let mut px = [200u8, 100, 180, 255];
        despill(&mut px, Rgb::MAGENTA, 1.0);
        assert_eq!(px, [100, 100, 100, 255]);

        let mut half = [200u8, 100, 180, 255];
        despill(&mut half, Rgb::MAGENTA, 0.5);
        assert_eq!(half, [150, 100, 140, 255]);
    }

    #[test]
    fn despill_skips_neutral_keys() {
        let mut px = [200u8, 100, 180, 255];
        despill(&mut px, Rgb::new(128, 128, 128), 1.0);
        assert_eq!(px, [200, 100, 180, 255]);
    }
}
