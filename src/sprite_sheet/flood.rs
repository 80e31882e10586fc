//! # 边界连通洪水填充
//!
//! 以图像四条边上满足谓词的像素为种子，按 4 邻接向内扩展，产出背景掩码。
//! 工作队列是一个可增长的 `Vec<u32>` 加手动头指针：只追加不出队，
//! 每个像素最多入队一次。

use super::PixelBuffer;

/// 每像素一个字节的背景掩码，`1` 表示背景。
pub type BackgroundMask = Vec<u8>;

/// 从边界像素出发的 4 连通洪水填充。
///
/// `predicate(x, y, rgba)` 决定像素能否属于背景。
pub fn flood_fill_from_borders<F>(buffer: &PixelBuffer, mut predicate: F) -> BackgroundMask
where
    F: FnMut(u32, u32, [u8; 4]) -> bool,
{
    let width = buffer.width();
    let height = buffer.height();
    let mut mask = vec![0u8; buffer.pixel_count()];
    if width == 0 || height == 0 {
        return mask;
    }

    let data = buffer.as_bytes();
    let w = width as usize;
    let mut queue: Vec<u32> = Vec::with_capacity((width as usize + height as usize) * 2);

    let mut try_push = |x: u32, y: u32, mask: &mut BackgroundMask, queue: &mut Vec<u32>| {
        let idx = y as usize * w + x as usize;
        if mask[idx] != 0 {
            return;
        }
        let o = idx * 4;
        let rgba = [data[o], data[o + 1], data[o + 2], data[o + 3]];
        if predicate(x, y, rgba) {
            mask[idx] = 1;
            queue.push(idx as u32);
        }
    };

    for x in 0..width {
        try_push(x, 0, &mut mask, &mut queue);
        try_push(x, height - 1, &mut mask, &mut queue);
    }
    for y in 0..height {
        try_push(0, y, &mut mask, &mut queue);
        try_push(width - 1, y, &mut mask, &mut queue);
    }

    let mut head = 0usize;
    while head < queue.len() {
        let idx = queue[head] as usize;
        head += 1;
        let x = (idx % w) as u32;
        let y = (idx / w) as u32;

        if x > 0 {
            try_push(x - 1, y, &mut mask, &mut queue);
        }
        if x + 1 < width {
            try_push(x + 1, y, &mut mask, &mut queue);
        }
        if y > 0 {
            try_push(x, y - 1, &mut mask, &mut queue);
        }
        if y + 1 < height {
            try_push(x, y + 1, &mut mask, &mut queue);
        }
    }

    mask
}

/// 像素是否与掩码 4 邻接（自身不在掩码内）。
#[inline]
pub fn touches_mask(mask: &[u8], width: u32, height: u32, x: u32, y: u32) -> bool {
    let w = width as usize;
    let idx = y as usize * w + x as usize;
    if mask[idx] != 0 {
        return false;
    }
    (x > 0 && mask[idx - 1] != 0)
        || (x + 1 < width && mask[idx + 1] != 0)
        || (y > 0 && mask[idx - w] != 0)
        || (y + 1 < height && mask[idx + w] != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_buffer() -> PixelBuffer {
        // 5x5：外圈 + 中心为品红，中间一圈为白色墙
        let mut buf = PixelBuffer::new_transparent(5, 5).expect("alloc failed");
        for y in 0..5 {
            for x in 0..5 {
                let wall = (1..=3).contains(&x) && (1..=3).contains(&y) && !(x == 2 && y == 2);
                let rgba = if wall { [255, 255, 255, 255] } else { [255, 0, 255, 255] };
                buf.set(x, y, rgba);
            }
        }
        buf
    }

    #[test]
    fn enclosed_region_is_not_reached() {
        let buf = ring_buffer();
        let mask = flood_fill_from_borders(&buf, |_, _, p| p[1] == 0);
        assert_eq!(mask.iter().filter(|m| **m != 0).count(), 16);
        assert_eq!(mask[2 * 5 + 2], 0);
        assert!(touches_mask(&mask, 5, 5, 1, 1));
        assert!(!touches_mask(&mask, 5, 5, 2, 2));
    }

    #[test]
    fn empty_buffer_yields_empty_mask() {
        let buf = PixelBuffer::new_transparent(0, 0).expect("alloc failed");
        assert!(flood_fill_from_borders(&buf, |_, _, _| true).is_empty());
    }
}
