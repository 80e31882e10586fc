//! # 构建参数
//!
//! `SheetBuildOptions` 描述一次精灵图处理的全部输出相关参数，
//! 可直接从皮肤配置 JSON（camelCase）反序列化。
//! 缓存键由这些参数加来源标识稳定序列化得到。

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::chroma::{ChromaKeyAlgorithm, ChromaKeyOptions};
use super::geometry::GeometryRequest;
use super::SpriteSheetError;

/// 单次精灵图处理参数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetBuildOptions {
    pub columns: u32,
    pub rows: u32,
    pub crop_offset_x: i32,
    pub crop_offset_y: i32,
    pub chroma_key_enabled: bool,
    pub chroma_key_algorithm: ChromaKeyAlgorithm,
    pub chroma_key_options: ChromaKeyOptions,
    /// 缩放与绘制时是否使用平滑插值。
    pub image_smoothing_enabled: bool,
    pub remove_grid_lines_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_frame_width_px: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processed_pixels: Option<u64>,
}

impl Default for SheetBuildOptions {
    fn default() -> Self {
        Self {
            columns: 8,
            rows: 7,
            crop_offset_x: 0,
            crop_offset_y: 0,
            chroma_key_enabled: true,
            chroma_key_algorithm: ChromaKeyAlgorithm::Classic,
            chroma_key_options: ChromaKeyOptions::default(),
            image_smoothing_enabled: true,
            remove_grid_lines_enabled: true,
            target_frame_width_px: None,
            max_processed_pixels: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheKeyView<'a> {
    source: &'a str,
    resize_filter: String,
    #[serde(flatten)]
    options: &'a SheetBuildOptions,
}

impl SheetBuildOptions {
    pub(crate) fn geometry_request(&self) -> GeometryRequest {
        GeometryRequest {
            crop_offset_x: self.crop_offset_x,
            crop_offset_y: self.crop_offset_y,
            target_frame_width: self.target_frame_width_px,
            max_processed_pixels: self.max_processed_pixels,
        }
    }

    /// 未显式指定像素预算时，使用配置中的默认预算。
    pub fn with_default_budget(mut self, budget: Option<u64>) -> Self {
        if self.max_processed_pixels.is_none() {
            self.max_processed_pixels = budget;
        }
        self
    }

    /// 规范化：抠像系数夹取到合法区间，避免等价参数产生不同缓存键。
    pub fn normalized(&self) -> Self {
        Self {
            chroma_key_options: self.chroma_key_options.clamped(),
            ..self.clone()
        }
    }

    /// 计算缓存键：所有影响输出字节的参数 + 来源标识 + 缩放滤镜的稳定 JSON。
    ///
    /// 字段顺序固定为结构体声明顺序，同参数必得同键。
    pub fn cache_key(
        &self,
        source_identity: &str,
        resize_filter: FilterType,
    ) -> Result<String, SpriteSheetError> {
        let normalized = self.normalized();
        serde_json::to_string(&CacheKeyView {
            source: source_identity,
            resize_filter: format!("{:?}", resize_filter),
            options: &normalized,
        })
        .map_err(|e| SpriteSheetError::Encode(format!("缓存键序列化失败：{}", e)))
    }
}
