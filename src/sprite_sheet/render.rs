//! # 帧提取与绘制
//!
//! ## 设计思路
//!
//! 播放侧每个输出目标（窗口中的一块画布）持有自己的后备缓冲。
//! 后备分辨率 = 逻辑尺寸 × 设备像素比（向上取整）；尺寸与像素比未变化时复用缓冲，
//! 只清空后重绘，避免逐帧重新分配。
//!
//! ## 实现思路
//!
//! - 源矩形：`x = (frame mod columns) * fw`，`y = min(row, rows - 1) * fh`；
//! - 帧按原始宽高比居中适配到后备缓冲；
//! - `smoothing` 决定双线性还是最近邻缩放；
//! - `export_frame_png` 为无状态版本，按原始帧尺寸导出 PNG。

use base64::{Engine as _, engine::general_purpose};
use image::imageops::FilterType;

use super::decode::resize_buffer;
use super::pixels::PixelBuffer;
use super::processor::{ProcessedSheet, encode_png};
use super::SpriteSheetError;

/// 输出目标的逻辑尺寸与设备像素比。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
}

impl OutputSize {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// 后备缓冲的物理像素尺寸。非法像素比按 1 处理。
    pub fn backing_size(&self) -> (u32, u32) {
        let dpr = self.effective_ratio() as f64;
        (
            (self.width as f64 * dpr).ceil() as u32,
            (self.height as f64 * dpr).ceil() as u32,
        )
    }

    fn effective_ratio(&self) -> f32 {
        if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        }
    }
}

/// 精灵图表面上的源矩形。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FrameRect {
    /// 计算指定帧的源矩形；行号超出时夹取到最后一行。
    pub fn locate(sheet: &ProcessedSheet, frame_index: u32, row_index: u32) -> Self {
        if sheet.columns == 0 || sheet.rows == 0 {
            return Self {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            };
        }
        let column = frame_index % sheet.columns;
        let row = row_index.min(sheet.rows - 1);
        Self {
            x: column * sheet.frame_width,
            y: row * sheet.frame_height,
            width: sheet.frame_width,
            height: sheet.frame_height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BackingRecord {
    width: u32,
    height: u32,
    dpr_bits: u32,
}

/// 单个输出目标：后备缓冲 + 上次使用的尺寸记录。
#[derive(Debug, Default)]
pub struct RenderTarget {
    backing: Option<PixelBuffer>,
    record: Option<BackingRecord>,
    allocations: u32,
}

impl RenderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前后备缓冲（尚未绘制时为空）。
    pub fn backing(&self) -> Option<&PixelBuffer> {
        self.backing.as_ref()
    }

    /// 后备缓冲累计分配次数。
    pub fn allocations(&self) -> u32 {
        self.allocations
    }

    fn prepare(&mut self, size: OutputSize) -> Result<&mut PixelBuffer, SpriteSheetError> {
        let (width, height) = size.backing_size();
        let record = BackingRecord {
            width,
            height,
            dpr_bits: size.effective_ratio().to_bits(),
        };

        let reusable = self.backing.is_some() && self.record == Some(record);
        if reusable {
            if let Some(existing) = self.backing.as_mut() {
                existing.as_bytes_mut().fill(0);
            }
        } else {
            let buffer = PixelBuffer::new_transparent(width, height).map_err(|e| {
                SpriteSheetError::SurfaceAllocation(format!(
                    "无法分配 {}x{} 后备缓冲：{}",
                    width, height, e
                ))
            })?;
            log::debug!("🖼️ 分配后备缓冲 {}x{}（dpr={}）", width, height, size.effective_ratio());
            self.backing = Some(buffer);
            self.record = Some(record);
            self.allocations += 1;
        }

        self.backing
            .as_mut()
            .ok_or_else(|| SpriteSheetError::SurfaceAllocation("后备缓冲不可用".to_string()))
    }
}

/// 帧绘制器。
#[derive(Debug, Clone, Copy)]
pub struct FrameRenderer {
    smoothing: bool,
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self { smoothing: true }
    }
}

impl FrameRenderer {
    pub fn new(smoothing: bool) -> Self {
        Self { smoothing }
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    /// 把一帧绘制到目标上，保持帧宽高比并居中。返回读取的源矩形。
    pub fn draw_frame(
        &self,
        target: &mut RenderTarget,
        sheet: &ProcessedSheet,
        frame_index: u32,
        row_index: u32,
        size: OutputSize,
    ) -> Result<FrameRect, SpriteSheetError> {
        let rect = FrameRect::locate(sheet, frame_index, row_index);
        let backing = target.prepare(size)?;
        if rect.is_empty() || backing.is_empty() {
            return Ok(rect);
        }

        let (draw_width, draw_height) = fit_inside(rect, backing.width(), backing.height());
        let frame = sheet.surface.crop(rect.x, rect.y, rect.width, rect.height)?;
        let filter = if self.smoothing {
            FilterType::Triangle
        } else {
            FilterType::Nearest
        };
        let scaled = resize_buffer(frame, draw_width, draw_height, filter)?;

        let offset_x = (backing.width() - draw_width) / 2;
        let offset_y = (backing.height() - draw_height) / 2;
        blit(backing, &scaled, offset_x, offset_y);

        Ok(rect)
    }
}

/// 按宽高比把帧适配进 `max_width x max_height`。
fn fit_inside(rect: FrameRect, max_width: u32, max_height: u32) -> (u32, u32) {
    let scale = (max_width as f64 / rect.width as f64).min(max_height as f64 / rect.height as f64);
    let width = ((rect.width as f64 * scale).round() as u32).clamp(1, max_width);
    let height = ((rect.height as f64 * scale).round() as u32).clamp(1, max_height);
    (width, height)
}

fn blit(dst: &mut PixelBuffer, src: &PixelBuffer, offset_x: u32, offset_y: u32) {
    let row_bytes = src.width() as usize * 4;
    for y in 0..src.height() {
        let (Some(from), Some(to)) = (src.index_of(0, y), dst.index_of(offset_x, offset_y + y)) else {
            continue;
        };
        let n = row_bytes.min(dst.as_bytes().len() - to);
        dst.as_bytes_mut()[to..to + n].copy_from_slice(&src.as_bytes()[from..from + n]);
    }
}

/// 无状态导出：按原始帧尺寸编码单帧 PNG。
pub fn export_frame_png(
    sheet: &ProcessedSheet,
    frame_index: u32,
    row_index: u32,
) -> Result<Vec<u8>, SpriteSheetError> {
    let rect = FrameRect::locate(sheet, frame_index, row_index);
    if rect.is_empty() {
        return Err(SpriteSheetError::SurfaceAllocation("精灵图没有可导出的帧".to_string()));
    }
    let frame = sheet.surface.crop(rect.x, rect.y, rect.width, rect.height)?;
    encode_png(&frame)
}

pub fn export_frame_png_base64(
    sheet: &ProcessedSheet,
    frame_index: u32,
    row_index: u32,
) -> Result<String, SpriteSheetError> {
    Ok(general_purpose::STANDARD.encode(export_frame_png(sheet, frame_index, row_index)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 每帧填充不同颜色的 4x2 网格。
    fn numbered_sheet() -> ProcessedSheet {
        let (fw, fh, columns, rows) = (8, 6, 4, 2);
        let mut surface = PixelBuffer::new_transparent(fw * columns, fh * rows).expect("alloc failed");
        for y in 0..fh * rows {
            for x in 0..fw * columns {
                let id = (y / fh) * columns + x / fw;
                surface.set(x, y, [id as u8 * 10, 100, 200, 255]);
            }
        }
        ProcessedSheet {
            surface,
            frame_width: fw,
            frame_height: fh,
            columns,
            rows,
        }
    }

    #[test]
    fn source_rect_wraps_columns_and_clamps_rows() {
        let sheet = numbered_sheet();
        assert_eq!(
            FrameRect::locate(&sheet, 5, 0),
            FrameRect { x: 8, y: 0, width: 8, height: 6 }
        );
        assert_eq!(FrameRect::locate(&sheet, 0, 9).y, 6);
    }

    #[test]
    fn draw_fits_frame_and_scales_backing_by_dpr() {
        let sheet = numbered_sheet();
        let renderer = FrameRenderer::new(false);
        let mut target = RenderTarget::new();
        renderer
            .draw_frame(&mut target, &sheet, 2, 1, OutputSize::new(16, 24, 2.0))
            .expect("draw failed");

        let backing = target.backing().expect("backing missing");
        assert_eq!((backing.width(), backing.height()), (32, 48));
        // 8x6 帧适配进 32x48：32x24，垂直居中
        assert_eq!(backing.alpha(16, 0), 0);
        assert_eq!(backing.get(16, 24), Some([60, 100, 200, 255]));
    }

    #[test]
    fn unchanged_size_reuses_backing() {
        let sheet = numbered_sheet();
        let renderer = FrameRenderer::default();
        let mut target = RenderTarget::new();
        let size = OutputSize::new(20, 20, 1.5);
        for frame in 0..8 {
            renderer
                .draw_frame(&mut target, &sheet, frame, 0, size)
                .expect("draw failed");
        }
        assert_eq!(target.allocations(), 1);

        renderer
            .draw_frame(&mut target, &sheet, 0, 0, OutputSize::new(20, 20, 2.0))
            .expect("draw failed");
        assert_eq!(target.allocations(), 2);
    }

    #[test]
    fn exported_frame_matches_source_rect() {
        let sheet = numbered_sheet();
        let png = export_frame_png(&sheet, 1, 1).expect("export failed");
        let decoded = image::load_from_memory(&png).expect("decode failed").to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 6));
        assert_eq!(decoded.get_pixel(0, 0).0, [50, 100, 200, 255]);
        assert!(export_frame_png_base64(&sheet, 1, 1).is_ok());
    }

    #[test]
    fn zero_sized_output_does_not_panic() {
        let sheet = numbered_sheet();
        let mut target = RenderTarget::new();
        let rect = FrameRenderer::default()
            .draw_frame(&mut target, &sheet, 0, 0, OutputSize::new(0, 0, 1.0))
            .expect("draw failed");
        assert!(!rect.is_empty());
    }
}
