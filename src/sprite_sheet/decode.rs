//! # 解码与表面构建
//!
//! ## 设计思路
//!
//! “字节 → RGBA 缓冲 → 裁剪缩放后的输出表面”集中在此处理。
//! 先读 header 尺寸做像素上限检查，再完整解码，避免恶意输入触发高内存开销。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素上限快速拒绝
//! 3. 完整解码为 RGBA8
//! 4. 按几何结果裁剪网格区域
//! 5. 需要缩放时使用 `fast_image_resize`，失败则回退 `image::imageops`

use fast_image_resize as fr;
use image::imageops::FilterType;
use std::io::Cursor;

use super::geometry::SheetGeometry;
use super::pixels::PixelBuffer;
use super::source::RawImageData;
use super::{ProcessingConfig, SheetProcessor, SpriteSheetError};

impl SheetProcessor {
    /// 将原始字节解码为 RGBA 像素缓冲。
    pub(crate) fn decode_to_buffer(
        &self,
        raw: RawImageData,
        config: &ProcessingConfig,
    ) -> Result<PixelBuffer, SpriteSheetError> {
        image::guess_format(&raw.bytes)
            .map_err(|e| SpriteSheetError::InvalidFormat(format!("不支持的图片格式：{}", e)))?;

        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory(&raw.bytes)
            .map_err(|e| SpriteSheetError::Decode(format!("图片解码失败：{}", e)))?;
        drop(raw.bytes);

        let rgba = decoded.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self::validate_pixel_limits(config, width, height)?;

        log::info!(
            "✅ 精灵图解码成功 - 来源: {} 尺寸: {}x{}",
            raw.source_hint,
            width,
            height
        );

        Ok(PixelBuffer::from_rgba_image(rgba))
    }

    /// 仅通过图片头信息读取宽高。
    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), SpriteSheetError> {
        image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| SpriteSheetError::InvalidFormat(format!("无法识别图片格式：{}", e)))?
            .into_dimensions()
            .map_err(|e| SpriteSheetError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    fn validate_pixel_limits(
        config: &ProcessingConfig,
        width: u32,
        height: u32,
    ) -> Result<(), SpriteSheetError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| SpriteSheetError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(SpriteSheetError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }
}

/// 按几何结果把源图的网格区域裁剪（并按需缩放）到输出表面。
///
/// `smoothing` 关闭时使用最近邻，保持像素风素材的硬边。
pub(crate) fn render_surface(
    source: &PixelBuffer,
    geometry: &SheetGeometry,
    smoothing: bool,
    filter: FilterType,
) -> Result<PixelBuffer, SpriteSheetError> {
    let cropped = source.crop(
        geometry.crop_x,
        geometry.crop_y,
        geometry.sheet_width,
        geometry.sheet_height,
    )?;

    if !geometry.is_scaled() {
        return Ok(cropped);
    }

    let target_width = geometry.output_width();
    let target_height = geometry.output_height();
    let filter = if smoothing { filter } else { FilterType::Nearest };

    log::info!(
        "🧩 精灵图降采样：{}x{} -> {}x{}（scale={:.3}, filter={:?}）",
        geometry.sheet_width,
        geometry.sheet_height,
        target_width,
        target_height,
        geometry.scale,
        filter
    );

    resize_buffer(cropped, target_width, target_height, filter)
}

/// 缩放像素缓冲，`fast_image_resize` 失败时回退 `image::imageops::resize`。
pub(crate) fn resize_buffer(
    source: PixelBuffer,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<PixelBuffer, SpriteSheetError> {
    if source.width() == target_width && source.height() == target_height {
        return Ok(source);
    }
    if source.is_empty() || target_width == 0 || target_height == 0 {
        return PixelBuffer::new_transparent(target_width, target_height);
    }

    match resize_with_fast_image_resize(&source, target_width, target_height, filter) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::imageops：{}", err);
            let image = source.to_rgba_image()?;
            Ok(PixelBuffer::from_rgba_image(image::imageops::resize(
                &image,
                target_width,
                target_height,
                filter,
            )))
        }
    }
}

fn resize_with_fast_image_resize(
    source: &PixelBuffer,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<PixelBuffer, SpriteSheetError> {
    let src_image = fr::images::Image::from_vec_u8(
        source.width(),
        source.height(),
        source.as_bytes().to_vec(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| SpriteSheetError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let algorithm = match filter {
        FilterType::Nearest => fr::ResizeAlg::Nearest,
        other => fr::ResizeAlg::Convolution(to_fast_filter(other)),
    };
    let options = fr::ResizeOptions::new().resize_alg(algorithm);

    fr::Resizer::new()
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| SpriteSheetError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    PixelBuffer::from_raw(target_width, target_height, dst_image.into_vec())
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite_sheet::geometry::{GeometryRequest, resolve};
    use image::{ImageBuffer, ImageFormat, Rgba};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png failed");
        bytes
    }

    #[test]
    fn decodes_png_into_rgba_buffer() {
        let processor = SheetProcessor::new(ProcessingConfig::default());
        let raw = RawImageData {
            bytes: png_bytes(40, 20),
            source_hint: "test",
        };
        let buffer = processor
            .decode_to_buffer(raw, &ProcessingConfig::default())
            .expect("decode failed");
        assert_eq!((buffer.width(), buffer.height()), (40, 20));
        assert_eq!(buffer.get(3, 2), Some([3, 2, 128, 255]));
    }

    #[test]
    fn pixel_limit_is_enforced_before_full_decode() {
        let processor = SheetProcessor::new(ProcessingConfig::default());
        let mut config = ProcessingConfig::default();
        config.max_decoded_pixels = 100;
        let raw = RawImageData {
            bytes: png_bytes(20, 20),
            source_hint: "test",
        };
        let result = processor.decode_to_buffer(raw, &config);
        assert!(matches!(result, Err(SpriteSheetError::ResourceLimit(_))));
    }

    #[test]
    fn corrupt_bytes_are_a_decode_or_format_error() {
        let processor = SheetProcessor::new(ProcessingConfig::default());
        let mut bytes = png_bytes(8, 8);
        bytes.truncate(40);
        let raw = RawImageData {
            bytes,
            source_hint: "test",
        };
        let result = processor.decode_to_buffer(raw, &ProcessingConfig::default());
        assert!(matches!(
            result,
            Err(SpriteSheetError::Decode(_)) | Err(SpriteSheetError::InvalidFormat(_))
        ));
    }

    #[test]
    fn surface_is_cropped_and_scaled_to_grid_multiples() {
        let mut source = PixelBuffer::new_transparent(130, 64).expect("alloc failed");
        source.set(1, 0, [9, 9, 9, 255]);
        let request = GeometryRequest {
            target_frame_width: Some(16),
            ..GeometryRequest::default()
        };
        let geometry = resolve(130, 64, 4, 2, &request).expect("geometry failed");
        let surface = render_surface(&source, &geometry, false, FilterType::Triangle)
            .expect("render failed");
        assert_eq!(surface.width(), geometry.output_frame_width * 4);
        assert_eq!(surface.height(), geometry.output_frame_height * 2);
        assert_eq!(geometry.output_frame_width, 16);

        let unscaled = resolve(130, 64, 4, 2, &GeometryRequest::default()).expect("geometry failed");
        let surface = render_surface(&source, &unscaled, true, FilterType::Triangle)
            .expect("render failed");
        assert_eq!((surface.width(), surface.height()), (128, 64));
        // 130 宽居中裁剪 128，左侧偏移 1 像素
        assert_eq!(surface.get(0, 0), Some([9, 9, 9, 255]));
    }

    #[test]
    fn nearest_resize_keeps_hard_edges() {
        let mut source = PixelBuffer::new_transparent(4, 4).expect("alloc failed");
        for y in 0..4 {
            for x in 0..2 {
                source.set(x, y, [255, 0, 0, 255]);
            }
        }
        let resized = resize_buffer(source, 2, 2, FilterType::Nearest).expect("resize failed");
        assert_eq!(resized.get(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(resized.alpha(1, 1), 0);
    }
}
