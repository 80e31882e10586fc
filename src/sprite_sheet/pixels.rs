//! # 像素缓冲模块
//!
//! ## 设计思路
//!
//! 整条处理链路都在同一块行优先（row-major）的 RGBA8 字节数组上原地修改，
//! 不把像素建模为独立对象，保持 `O(width * height)` 的线性访问特性。
//!
//! ## 实现思路
//!
//! - `PixelBuffer` 持有 `width/height/data`，构造时校验长度一致。
//! - 访问器全部做边界检查；越界读取返回 `None`，越界写入被忽略。
//! - 热路径（分割算法）通过 `index_of` 拿到字节偏移后直接操作切片。

use image::RgbaImage;

use super::SpriteSheetError;

/// 单个 RGB 颜色（不含 alpha）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const MAGENTA: Rgb = Rgb { r: 255, g: 0, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 与另一颜色的 RGB 欧氏距离平方。
    pub fn distance_sq(self, other: Rgb) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

/// 行优先 RGBA8 像素缓冲。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// 从原始字节构造，要求 `data.len() == width * height * 4`。
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, SpriteSheetError> {
        let expected = byte_len(width, height)?;
        if data.len() != expected {
            return Err(SpriteSheetError::Decode(format!(
                "像素数据长度异常：{}（期望：{}）",
                data.len(),
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// 分配一块全透明缓冲。
    pub fn new_transparent(width: u32, height: u32) -> Result<Self, SpriteSheetError> {
        let len = byte_len(width, height)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            SpriteSheetError::SurfaceAllocation(format!(
                "无法分配 {}x{} 输出表面：{}",
                width, height, e
            ))
        })?;
        data.resize(len, 0);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// 坐标对应的字节偏移；越界返回 `None`。
    #[inline]
    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let i = self.index_of(x, y)?;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(i) = self.index_of(x, y) {
            self.data[i..i + 4].copy_from_slice(&rgba);
        }
    }

    /// 越界视为全透明。
    #[inline]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.index_of(x, y).map(|i| self.data[i + 3]).unwrap_or(0)
    }

    #[inline]
    pub fn set_alpha(&mut self, x: u32, y: u32, alpha: u8) {
        if let Some(i) = self.index_of(x, y) {
            self.data[i + 3] = alpha;
        }
    }

    /// 复制一块矩形区域；超出边界的部分以透明填充。
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<PixelBuffer, SpriteSheetError> {
        let mut out = PixelBuffer::new_transparent(width, height)?;
        let row_bytes = width as usize * 4;
        for row in 0..height {
            let sy = y.saturating_add(row);
            if sy >= self.height {
                break;
            }
            let copy_w = width.min(self.width.saturating_sub(x));
            if copy_w == 0 {
                break;
            }
            let Some(src) = self.index_of(x, sy) else {
                continue;
            };
            let dst = row as usize * row_bytes;
            let n = copy_w as usize * 4;
            out.data[dst..dst + n].copy_from_slice(&self.data[src..src + n]);
        }
        Ok(out)
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage, SpriteSheetError> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| SpriteSheetError::Encode("像素缓冲转换 RgbaImage 失败".to_string()))
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

fn byte_len(width: u32, height: u32) -> Result<usize, SpriteSheetError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| SpriteSheetError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))
}
