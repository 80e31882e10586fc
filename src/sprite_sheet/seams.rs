//! # 接缝 / 网格线清理模块
//!
//! ## 设计思路
//!
//! 制作精灵图时常在帧边界上残留 1px 的不透明细线。抠像之后，这些线两侧
//! 都已透明，只剩线本身孤立存在。对每条内部边界，在 ±2px 范围内为候选线
//! 计算“覆盖率”投票，只清理覆盖率足够高的线。
//!
//! ## 实现思路
//!
//! - 覆盖率 = 线上满足 `alpha > 48` 且两侧垂直邻居 `alpha <= 16` 的像素占比；
//! - 最高覆盖率 >= 0.35 才接受；
//! - 其余候选线覆盖率同时 >= 0.35 且 >= 最高值的 70% 时视为同一接缝带；
//! - 被接受的线上，只把满足条件的像素 alpha 置 0。

use super::PixelBuffer;

const LINE_ALPHA_THRESHOLD: u8 = 48;
const NEIGHBOR_ALPHA_MAX: u8 = 16;
const MIN_COVERAGE: f32 = 0.35;
const BAND_RATIO: f32 = 0.7;
const SEARCH_RADIUS: i64 = 2;

#[derive(Clone, Copy)]
enum Axis {
    Vertical,
    Horizontal,
}

/// 清理帧边界上的细线，返回是否修改了任何像素。
pub fn remove_seams(surface: &mut PixelBuffer, columns: u32, rows: u32) -> bool {
    let width = surface.width();
    let height = surface.height();
    if width == 0 || height == 0 || columns == 0 || rows == 0 {
        return false;
    }

    let frame_width = width / columns;
    let frame_height = height / rows;
    let mut changed = 0usize;

    if frame_width > 0 {
        for c in 1..columns {
            changed += clean_boundary(surface, Axis::Vertical, (frame_width * c) as i64);
        }
    }
    if frame_height > 0 {
        for r in 1..rows {
            changed += clean_boundary(surface, Axis::Horizontal, (frame_height * r) as i64);
        }
    }

    if changed > 0 {
        log::info!("✂️ 已清理帧边界接缝：{} 个像素", changed);
    }
    changed > 0
}

fn clean_boundary(surface: &mut PixelBuffer, axis: Axis, boundary: i64) -> usize {
    let (line_count, line_len) = match axis {
        Axis::Vertical => (surface.width() as i64, surface.height()),
        Axis::Horizontal => (surface.height() as i64, surface.width()),
    };

    // 需要两侧邻居，所以候选线不能落在最外侧
    let candidates: Vec<(u32, f32)> = (boundary - SEARCH_RADIUS..=boundary + SEARCH_RADIUS)
        .filter(|line| *line >= 1 && *line + 1 < line_count)
        .map(|line| {
            let line = line as u32;
            (line, coverage(surface, axis, line, line_len))
        })
        .collect();

    let best = candidates.iter().map(|(_, c)| *c).fold(0.0_f32, f32::max);
    if best < MIN_COVERAGE {
        return 0;
    }

    let mut changed = 0;
    for (line, cov) in candidates {
        if cov >= MIN_COVERAGE && cov >= best * BAND_RATIO {
            changed += erase_line(surface, axis, line, line_len);
        }
    }
    changed
}

/// 坐标 `t` 处是否为孤立的线像素。
#[inline]
fn is_line_pixel(surface: &PixelBuffer, axis: Axis, line: u32, t: u32) -> bool {
    let (x, y) = at(axis, line, t);
    if surface.alpha(x, y) <= LINE_ALPHA_THRESHOLD {
        return false;
    }
    let (before, after) = match axis {
        Axis::Vertical => (surface.alpha(x - 1, y), surface.alpha(x + 1, y)),
        Axis::Horizontal => (surface.alpha(x, y - 1), surface.alpha(x, y + 1)),
    };
    before <= NEIGHBOR_ALPHA_MAX && after <= NEIGHBOR_ALPHA_MAX
}

fn coverage(surface: &PixelBuffer, axis: Axis, line: u32, line_len: u32) -> f32 {
    if line_len == 0 {
        return 0.0;
    }
    let hits = (0..line_len)
        .filter(|t| is_line_pixel(surface, axis, line, *t))
        .count();
    hits as f32 / line_len as f32
}

fn erase_line(surface: &mut PixelBuffer, axis: Axis, line: u32, line_len: u32) -> usize {
    // 先收集再擦除，避免同一条线上的修改影响判定
    let hits: Vec<u32> = (0..line_len)
        .filter(|t| is_line_pixel(surface, axis, line, *t))
        .collect();
    for t in &hits {
        let (x, y) = at(axis, line, *t);
        surface.set_alpha(x, y, 0);
    }
    hits.len()
}

#[inline]
fn at(axis: Axis, line: u32, t: u32) -> (u32, u32) {
    match axis {
        Axis::Vertical => (line, t),
        Axis::Horizontal => (t, line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::new_transparent(width, height).expect("alloc failed")
    }

    fn draw_vertical(buf: &mut PixelBuffer, x: u32, from: u32, to: u32) {
        for y in from..to {
            buf.set(x, y, [0, 0, 0, 255]);
        }
    }

    #[test]
    fn removes_full_height_line_on_boundary() {
        let mut buf = sheet(64, 32);
        draw_vertical(&mut buf, 32, 0, 32);
        assert!(remove_seams(&mut buf, 2, 1));
        assert!((0..32).all(|y| buf.alpha(32, y) == 0));
    }

    #[test]
    fn removes_line_offset_within_search_radius() {
        let mut buf = sheet(64, 64);
        for x in 0..64 {
            buf.set(x, 30, [10, 10, 10, 200]);
        }
        assert!(remove_seams(&mut buf, 2, 2));
        assert!((0..64).all(|x| buf.alpha(x, 30) == 0));
    }

    #[test]
    fn column_below_threshold_is_untouched_even_next_to_a_seam() {
        let mut buf = sheet(64, 40);
        draw_vertical(&mut buf, 32, 0, 40);
        // 相邻候选线只有 25% 覆盖率
        draw_vertical(&mut buf, 34, 0, 10);
        assert!(remove_seams(&mut buf, 2, 1));
        assert!((0..40).all(|y| buf.alpha(32, y) == 0));
        assert!((0..10).all(|y| buf.alpha(34, y) == 255));
    }

    #[test]
    fn weak_band_member_joins_the_seam() {
        let mut buf = sheet(64, 40);
        draw_vertical(&mut buf, 32, 0, 40);
        // 80% 覆盖率 >= 0.35 且 >= 70% * 1.0
        draw_vertical(&mut buf, 30, 0, 32);
        assert!(remove_seams(&mut buf, 2, 1));
        assert!((0..32).all(|y| buf.alpha(30, y) == 0));
    }

    #[test]
    fn short_strokes_and_sprite_content_are_kept() {
        let mut buf = sheet(64, 40);
        draw_vertical(&mut buf, 32, 0, 12);
        // 边界处的实心内容：两侧邻居不透明，不算细线
        for y in 20..40 {
            for x in 28..37 {
                buf.set(x, y, [200, 100, 50, 255]);
            }
        }
        assert!(!remove_seams(&mut buf, 2, 1));
        assert_eq!(buf.alpha(32, 5), 255);
        assert_eq!(buf.alpha(32, 30), 255);
    }

    #[test]
    fn degenerate_grids_report_no_change() {
        let mut empty = sheet(0, 0);
        assert!(!remove_seams(&mut empty, 2, 2));
        let mut single = sheet(32, 32);
        draw_vertical(&mut single, 16, 0, 32);
        assert!(!remove_seams(&mut single, 1, 1));
        let mut narrow = sheet(3, 3);
        assert!(!remove_seams(&mut narrow, 3, 3));
    }
}
