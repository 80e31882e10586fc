//! # 距离场模块
//!
//! 以背景掩码为多源起点做有界广度优先扩展，得到每个像素到最近背景像素的
//! 城市街区距离。只用于调节边缘羽化强度，从不参与掩码判定。

/// 超出 `max_dist` 的像素保留该哨兵值。
pub const DISTANCE_SENTINEL: u8 = 255;

/// 计算有界距离场。
///
/// 掩码像素为 `0`，4 邻接逐层 `+1`，距离超过 `max_dist`（上限 254）后停止扩展。
pub fn compute(mask: &[u8], width: u32, height: u32, max_dist: u8) -> Vec<u8> {
    let len = width as usize * height as usize;
    let mut dist = vec![DISTANCE_SENTINEL; len];
    if len == 0 || mask.len() < len {
        return dist;
    }

    let max_dist = max_dist.min(DISTANCE_SENTINEL - 1);
    let w = width as usize;
    let mut queue: Vec<u32> = Vec::new();

    for (idx, m) in mask.iter().take(len).enumerate() {
        if *m != 0 {
            dist[idx] = 0;
            queue.push(idx as u32);
        }
    }

    let mut head = 0usize;
    while head < queue.len() {
        let idx = queue[head] as usize;
        head += 1;

        let d = dist[idx];
        if d >= max_dist {
            continue;
        }
        let next = d + 1;
        let x = idx % w;
        let y = idx / w;

        let mut relax = |n: usize| {
            if dist[n] == DISTANCE_SENTINEL {
                dist[n] = next;
                queue.push(n as u32);
            }
        };

        if x > 0 {
            relax(idx - 1);
        }
        if x + 1 < w {
            relax(idx + 1);
        }
        if y > 0 {
            relax(idx - w);
        }
        if y + 1 < height as usize {
            relax(idx + w);
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_seed_yields_manhattan_distance_up_to_cap() {
        let (w, h) = (21u32, 21u32);
        let mut mask = vec![0u8; (w * h) as usize];
        mask[(10 * w + 10) as usize] = 1;

        let max_dist = 6;
        let dist = compute(&mask, w, h, max_dist);

        for y in 0..h {
            for x in 0..w {
                let manhattan = (x as i32 - 10).unsigned_abs() + (y as i32 - 10).unsigned_abs();
                let value = dist[(y * w + x) as usize];
                if manhattan <= max_dist as u32 {
                    assert_eq!(value as u32, manhattan, "at ({x},{y})");
                } else {
                    assert_eq!(value, DISTANCE_SENTINEL, "at ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn empty_mask_leaves_everything_at_sentinel() {
        let dist = compute(&[0u8; 12], 4, 3, 3);
        assert!(dist.iter().all(|d| *d == DISTANCE_SENTINEL));
        assert!(compute(&[], 0, 0, 3).is_empty());
    }
}
