//! # 精灵图处理模块（sprite_sheet）
//!
//! ## 设计思路
//!
//! 用户提供一张按 N×M 网格排列动画帧、背景为纯色的静态图，本模块输出
//! 背景透明、边缘 alpha 正确、帧边界干净的精灵图，供逐帧播放。
//!
//! 按职责拆分子模块：
//!
//! - `loader`：URL / Base64 / 文件加载与安全校验
//! - `decode`：解码、像素上限、裁剪缩放到输出表面
//! - `geometry`：网格尺寸校验、帧尺寸、居中裁剪、缩放比例
//! - `key_color`：从边框采样检测键色
//! - `chroma`：四种背景分割算法（classic / yuv / hsl / aggressive）
//! - `flood` / `distance` / `color`：泛洪填充、距离场、颜色空间
//! - `seams`：帧边界接缝清理
//! - `render`：帧提取、绘制与导出
//! - `cache` / `service`：结果缓存与宿主服务
//!
//! ## 调用链
//!
//! ```text
//! 宿主（皮肤编辑器 / CLI）
//!    ↓
//! service.rs（代次计数 + 缓存键）
//!    ↓
//! cache.rs（同键单次构建）
//!    ↓
//! processor.rs（配置快照 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + 安全校验）
//!    ├─ decode.rs（解码 + 裁剪缩放）
//!    ├─ key_color.rs → chroma/（抠像）
//!    └─ seams.rs（接缝清理）
//!    ↓
//! ProcessedSheet → render.rs（绘制 / 导出 PNG）
//! ```

mod cache;
pub mod chroma;
mod color;
mod config;
mod decode;
mod distance;
mod error;
mod flood;
pub mod geometry;
pub mod key_color;
mod loader;
mod options;
mod pixels;
mod processor;
mod render;
pub mod seams;
mod service;
mod source;

pub use cache::{DEFAULT_CACHE_CAPACITY, ProcessedSheetCache};
pub use chroma::{ChromaKeyAlgorithm, ChromaKeyOptions};
pub use config::{ProcessingConfig, ProcessingProfile};
pub use distance::{DISTANCE_SENTINEL, compute as compute_distance_field};
pub use error::{SpriteSheetError, ValidationError};
pub use flood::{BackgroundMask, flood_fill_from_borders};
pub use geometry::{DimensionReport, GeometryRequest, SheetGeometry, validate_dimensions};
pub use key_color::{KeyColorMode, KeyColorSample};
pub use options::SheetBuildOptions;
pub use pixels::{PixelBuffer, Rgb};
pub use processor::{ProcessedSheet, SheetProcessor, build_processed_sheet, process_loaded_image};
pub use render::{
    FrameRect, FrameRenderer, OutputSize, RenderTarget, export_frame_png, export_frame_png_base64,
};
pub use seams::remove_seams;
pub use service::{RequestTicket, SpriteSheetService};
pub use source::ImageSource;
