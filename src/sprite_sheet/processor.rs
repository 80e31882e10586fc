//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `SheetProcessor` 只负责流程编排与配置管理。处理链路固定为：
//! 1. 读取配置快照
//! 2. 按来源加载原始字节
//! 3. 解码为 RGBA 缓冲
//! 4. 几何校验 + 裁剪缩放到输出表面
//! 5. 检测键色并抠像
//! 6. 清理帧边界接缝
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<ProcessingConfig>>` 支持运行时切档。
//! - 单次请求内使用同一配置快照，避免处理中途配置漂移。
//! - 第 4~6 步是同步纯计算（`process_loaded_image`），只有加载阶段会挂起。
//! - 记录 `load/decode/process/total` 阶段耗时，便于性能诊断。

use base64::{Engine as _, engine::general_purpose};
use image::ImageFormat;
use std::io::Cursor;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::decode::render_surface;
use super::options::SheetBuildOptions;
use super::pixels::PixelBuffer;
use super::{
    ImageSource, ProcessingConfig, ProcessingProfile, SpriteSheetError, ValidationError, geometry,
    key_color, seams,
};

/// 处理完成的精灵图：输出表面与网格信息，构建后只读共享。
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSheet {
    pub surface: PixelBuffer,
    pub frame_width: u32,
    pub frame_height: u32,
    pub columns: u32,
    pub rows: u32,
}

impl ProcessedSheet {
    pub fn frame_count(&self) -> u32 {
        self.columns * self.rows
    }

    /// 编码为 PNG，供宿主持久化处理后的精灵图。
    pub fn encode_png(&self) -> Result<Vec<u8>, SpriteSheetError> {
        encode_png(&self.surface)
    }

    pub fn to_png_base64(&self) -> Result<String, SpriteSheetError> {
        Ok(general_purpose::STANDARD.encode(self.encode_png()?))
    }
}

pub(crate) fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, SpriteSheetError> {
    let image = buffer.to_rgba_image()?;
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| SpriteSheetError::Encode(format!("PNG 编码失败：{}", e)))?;
    Ok(bytes)
}

/// 精灵图处理器。
pub struct SheetProcessor {
    pub(super) config: Arc<RwLock<ProcessingConfig>>,
}

impl SheetProcessor {
    /// 根据初始配置创建处理器。
    ///
    /// # 示例
    /// ```rust
    /// use sprite_keyer::sprite_sheet::{ProcessingConfig, SheetProcessor};
    ///
    /// let processor = SheetProcessor::new(ProcessingConfig::default());
    /// assert!(processor.config_snapshot().is_ok());
    /// ```
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取配置快照，保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<ProcessingConfig, SpriteSheetError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| SpriteSheetError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 切换性能档位。
    pub fn set_profile(&self, profile: ProcessingProfile) -> Result<(), SpriteSheetError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| SpriteSheetError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.apply_profile(profile);

        log::info!(
            "⚙️ 已切换精灵图处理档位：{}（max_pixels={:?}, filter={:?}）",
            profile.as_str(),
            config.default_max_processed_pixels,
            config.resize_filter
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn profile(&self) -> Result<ProcessingProfile, SpriteSheetError> {
        let config = self
            .config
            .read()
            .map_err(|_| SpriteSheetError::ResourceLimit("配置读取锁已中毒".to_string()))?;
        Ok(config.infer_profile())
    }

    /// 整体替换配置（例如宿主加载了新的高级设置）。
    pub fn replace_config(&self, next: ProcessingConfig) -> Result<(), SpriteSheetError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| SpriteSheetError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        *config = next;
        Ok(())
    }

    /// 使用当前配置快照处理一个来源。
    pub async fn build(
        &self,
        source: &ImageSource,
        options: &SheetBuildOptions,
    ) -> Result<ProcessedSheet, SpriteSheetError> {
        let config = self.config_snapshot()?;
        self.build_with_config(source, options, &config).await
    }

    pub(crate) async fn build_with_config(
        &self,
        source: &ImageSource,
        options: &SheetBuildOptions,
        config: &ProcessingConfig,
    ) -> Result<ProcessedSheet, SpriteSheetError> {
        let total_start = Instant::now();

        // 尺寸非法时无需下载
        if options.columns == 0 || options.rows == 0 {
            return Err(ValidationError::EmptyGrid {
                columns: options.columns,
                rows: options.rows,
            }
            .into());
        }

        let load_start = Instant::now();
        let raw = self.load_source(source, config).await?;
        let load_elapsed = load_start.elapsed();

        let decode_start = Instant::now();
        let buffer = self.decode_to_buffer(raw, config)?;
        let decode_elapsed = decode_start.elapsed();

        let process_start = Instant::now();
        let options = options.clone().with_default_budget(config.default_max_processed_pixels);
        let sheet = process_with_filter(buffer, &options, config.resize_filter)?;
        let process_elapsed = process_start.elapsed();

        log::info!(
            "✅ 精灵图处理完成 - {}x{} 帧 {}x{} load={}ms decode={}ms process={}ms total={}ms",
            sheet.columns,
            sheet.rows,
            sheet.frame_width,
            sheet.frame_height,
            load_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            process_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(sheet)
    }
}

/// 异步入口：加载来源并执行完整处理链路。
///
/// # 示例
/// ```rust,ignore
/// use sprite_keyer::sprite_sheet::{
///     ImageSource, ProcessingConfig, SheetBuildOptions, build_processed_sheet,
/// };
///
/// # async fn demo() -> Result<(), sprite_keyer::sprite_sheet::SpriteSheetError> {
/// let sheet = build_processed_sheet(
///     &ImageSource::FilePath("skins/fish.png".into()),
///     &SheetBuildOptions::default(),
///     &ProcessingConfig::default(),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn build_processed_sheet(
    source: &ImageSource,
    options: &SheetBuildOptions,
    config: &ProcessingConfig,
) -> Result<ProcessedSheet, SpriteSheetError> {
    SheetProcessor::new(config.clone())
        .build_with_config(source, options, config)
        .await
}

/// 同步核心：对已解码的缓冲执行几何、抠像与接缝清理。
pub fn process_loaded_image(
    buffer: PixelBuffer,
    options: &SheetBuildOptions,
) -> Result<ProcessedSheet, SpriteSheetError> {
    process_with_filter(buffer, options, ProcessingConfig::default().resize_filter)
}

fn process_with_filter(
    buffer: PixelBuffer,
    options: &SheetBuildOptions,
    filter: image::imageops::FilterType,
) -> Result<ProcessedSheet, SpriteSheetError> {
    let geometry = geometry::resolve(
        buffer.width(),
        buffer.height(),
        options.columns,
        options.rows,
        &options.geometry_request(),
    )?;
    log::debug!(
        "📐 网格几何：帧 {}x{} 裁剪起点 ({}, {}) scale={:.3}",
        geometry.frame_width,
        geometry.frame_height,
        geometry.crop_x,
        geometry.crop_y,
        geometry.scale
    );

    let mut surface = render_surface(&buffer, &geometry, options.image_smoothing_enabled, filter)?;
    drop(buffer);

    if options.chroma_key_enabled {
        let sample = key_color::detect(&surface);
        log::debug!(
            "🎯 键色检测：({}, {}, {}) mode={:?} 算法={}",
            sample.r,
            sample.g,
            sample.b,
            sample.mode,
            options.chroma_key_algorithm.as_str()
        );
        options
            .chroma_key_algorithm
            .apply(&mut surface, &options.chroma_key_options, &sample);
    }

    if options.remove_grid_lines_enabled
        && seams::remove_seams(&mut surface, options.columns, options.rows)
    {
        log::debug!("🧹 已清理帧边界接缝");
    }

    Ok(ProcessedSheet {
        surface,
        frame_width: geometry.output_frame_width,
        frame_height: geometry.output_frame_height,
        columns: options.columns,
        rows: options.rows,
    })
}
