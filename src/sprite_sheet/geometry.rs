//! # 精灵图几何解析模块
//!
//! ## 设计思路
//!
//! 在解码完成、分割开始之前，先确认图片确实是 `columns x rows` 的网格：
//! 每帧至少 32px，整体宽高比与网格比例偏差不超过 15%。
//! 校验函数是纯函数，宿主可以在提交完整处理前单独调用。
//!
//! ## 实现思路
//!
//! - 帧尺寸按整数除法向下取整，网格区域在原图中居中裁剪；
//! - 调用方的裁剪偏移叠加在居中偏移上，并夹取到原图范围内；
//! - 缩放比例取 `min(1, 目标帧宽 / 帧宽, sqrt(像素预算 / 原图面积))`。

use serde::Serialize;

use super::ValidationError;

/// 单帧最小边长（像素）。
pub const MIN_FRAME_SIZE: u32 = 32;
/// 允许的宽高比相对偏差。
pub const ASPECT_RATIO_TOLERANCE: f64 = 0.15;

/// 几何解析的可选输入。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeometryRequest {
    pub crop_offset_x: i32,
    pub crop_offset_y: i32,
    pub target_frame_width: Option<u32>,
    pub max_processed_pixels: Option<u64>,
}

/// 网格几何。
///
/// `sheet_width = frame_width * columns <= source_width`，高度同理；
/// `output_frame_*` 为乘以 `scale` 后实际分配的帧尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetGeometry {
    pub columns: u32,
    pub rows: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub sheet_width: u32,
    pub sheet_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
    pub scale: f64,
    pub output_frame_width: u32,
    pub output_frame_height: u32,
}

impl SheetGeometry {
    pub fn output_width(&self) -> u32 {
        self.output_frame_width * self.columns
    }

    pub fn output_height(&self) -> u32 {
        self.output_frame_height * self.rows
    }

    pub fn is_scaled(&self) -> bool {
        self.output_frame_width != self.frame_width || self.output_frame_height != self.frame_height
    }
}

/// `validate_dimensions` 的结果报告。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_height: Option<u32>,
}

/// 校验原图尺寸是否满足网格要求，成功时返回帧尺寸。
pub fn check_dimensions(
    width: u32,
    height: u32,
    columns: u32,
    rows: u32,
) -> Result<(u32, u32), ValidationError> {
    if columns == 0 || rows == 0 {
        return Err(ValidationError::EmptyGrid { columns, rows });
    }

    let min_width = columns.saturating_mul(MIN_FRAME_SIZE);
    let min_height = rows.saturating_mul(MIN_FRAME_SIZE);
    if width < min_width || height < min_height {
        return Err(ValidationError::TooSmall {
            width,
            height,
            columns,
            rows,
            min_width,
            min_height,
        });
    }

    let actual = width as f64 / height as f64;
    let expected = columns as f64 / rows as f64;
    if (actual / expected - 1.0).abs() > ASPECT_RATIO_TOLERANCE {
        return Err(ValidationError::AspectRatioMismatch {
            actual,
            expected,
            columns,
            rows,
        });
    }

    Ok((width / columns, height / rows))
}

/// 独立校验入口：不抛错，返回结构化报告。
///
/// # 示例
/// ```rust
/// use sprite_keyer::sprite_sheet::validate_dimensions;
///
/// let report = validate_dimensions(1024, 896, 8, 7);
/// assert!(report.valid);
/// assert_eq!(report.frame_width, Some(128));
/// ```
pub fn validate_dimensions(width: u32, height: u32, columns: u32, rows: u32) -> DimensionReport {
    match check_dimensions(width, height, columns, rows) {
        Ok((frame_width, frame_height)) => DimensionReport {
            valid: true,
            error: None,
            frame_width: Some(frame_width),
            frame_height: Some(frame_height),
        },
        Err(err) => DimensionReport {
            valid: false,
            error: Some(err.to_string()),
            frame_width: None,
            frame_height: None,
        },
    }
}

/// 解析完整几何：校验、居中裁剪、偏移夹取与缩放比例。
pub fn resolve(
    width: u32,
    height: u32,
    columns: u32,
    rows: u32,
    request: &GeometryRequest,
) -> Result<SheetGeometry, ValidationError> {
    let (frame_width, frame_height) = check_dimensions(width, height, columns, rows)?;
    let sheet_width = frame_width * columns;
    let sheet_height = frame_height * rows;

    let crop_x = clamp_crop(width, sheet_width, request.crop_offset_x);
    let crop_y = clamp_crop(height, sheet_height, request.crop_offset_y);

    let scale = compute_scale(width, height, frame_width, request);
    let output_frame_width = scaled_dimension(frame_width, scale);
    let output_frame_height = scaled_dimension(frame_height, scale);

    Ok(SheetGeometry {
        columns,
        rows,
        frame_width,
        frame_height,
        sheet_width,
        sheet_height,
        crop_x,
        crop_y,
        scale,
        output_frame_width,
        output_frame_height,
    })
}

fn clamp_crop(source: u32, sheet: u32, offset: i32) -> u32 {
    let slack = source.saturating_sub(sheet) as i64;
    let base = slack / 2;
    (base + offset as i64).clamp(0, slack) as u32
}

fn compute_scale(width: u32, height: u32, frame_width: u32, request: &GeometryRequest) -> f64 {
    let mut scale = 1.0_f64;

    if let Some(target) = request.target_frame_width.filter(|t| *t > 0) {
        scale = scale.min(target as f64 / frame_width as f64);
    }

    if let Some(budget) = request.max_processed_pixels.filter(|b| *b > 0) {
        let area = width as f64 * height as f64;
        if area > 0.0 {
            scale = scale.min((budget as f64 / area).sqrt());
        }
    }

    scale
}

fn scaled_dimension(frame: u32, scale: f64) -> u32 {
    if scale >= 1.0 {
        return frame;
    }
    ((frame as f64 * scale).floor() as u32).max(1)
}
