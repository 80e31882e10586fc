//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! `SpriteSheetService` 由宿主持有，组合处理器、结果缓存与请求代次计数。
//! 测试可创建独立实例，不存在跨测试共享的全局状态。
//!
//! ## 实现思路
//!
//! - `request_sheet`：计算规范化缓存键，经缓存执行完整处理链路；
//! - `begin_request` / `is_current`：代次计数实现协作式取消，
//!   过期请求完成后由调用方丢弃结果，不中断底层计算；
//! - 档位与配置切换只影响之后的请求（请求内使用配置快照）。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::cache::ProcessedSheetCache;
use super::options::SheetBuildOptions;
use super::processor::{ProcessedSheet, SheetProcessor};
use super::{ImageSource, ProcessingConfig, ProcessingProfile, SpriteSheetError};

/// 一次请求的代次凭证。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

/// 精灵图处理服务。
pub struct SpriteSheetService {
    processor: SheetProcessor,
    cache: ProcessedSheetCache,
    generation: AtomicU64,
}

impl Default for SpriteSheetService {
    fn default() -> Self {
        Self::new(ProcessingConfig::default())
    }
}

impl SpriteSheetService {
    /// 按配置创建服务，缓存容量取自 `cache_capacity`。
    pub fn new(config: ProcessingConfig) -> Self {
        let cache = ProcessedSheetCache::new(config.cache_capacity);
        Self::with_cache(config, cache)
    }

    /// 注入自定义缓存。
    pub fn with_cache(config: ProcessingConfig, cache: ProcessedSheetCache) -> Self {
        Self {
            processor: SheetProcessor::new(config),
            cache,
            generation: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &ProcessedSheetCache {
        &self.cache
    }

    /// 开始一次新请求，之前发出的凭证全部过期。
    pub fn begin_request(&self) -> RequestTicket {
        RequestTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// 凭证是否仍是最新请求。
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// 经缓存获取处理后的精灵图。
    pub async fn request_sheet(
        &self,
        source: &ImageSource,
        options: &SheetBuildOptions,
    ) -> Result<Arc<ProcessedSheet>, SpriteSheetError> {
        let config = self.processor.config_snapshot()?;
        let options = options
            .normalized()
            .with_default_budget(config.default_max_processed_pixels);
        let key = options.cache_key(&source.identity(), config.resize_filter)?;

        log::info!(
            "📦 请求精灵图 - 来源: {} 网格: {}x{} 算法: {}",
            source.hint(),
            options.columns,
            options.rows,
            options.chroma_key_algorithm.as_str()
        );

        let processor = &self.processor;
        let (options, config) = (&options, &config);
        self.cache
            .get_or_build(&key, move || async move {
                processor.build_with_config(source, options, config).await
            })
            .await
    }

    /// 带代次检查的请求：若期间有更新的请求发出，返回 `Ok(None)`。
    pub async fn request_latest(
        &self,
        source: &ImageSource,
        options: &SheetBuildOptions,
    ) -> Result<Option<Arc<ProcessedSheet>>, SpriteSheetError> {
        let ticket = self.begin_request();
        let sheet = self.request_sheet(source, options).await?;
        if self.is_current(ticket) {
            Ok(Some(sheet))
        } else {
            log::debug!("⏭️ 请求已被新请求取代，丢弃结果");
            Ok(None)
        }
    }

    pub fn set_profile(&self, profile: ProcessingProfile) -> Result<(), SpriteSheetError> {
        self.processor.set_profile(profile)
    }

    pub fn profile(&self) -> Result<ProcessingProfile, SpriteSheetError> {
        self.processor.profile()
    }

    pub fn config(&self) -> Result<ProcessingConfig, SpriteSheetError> {
        self.processor.config_snapshot()
    }

    pub fn replace_config(&self, config: ProcessingConfig) -> Result<(), SpriteSheetError> {
        self.processor.replace_config(config)
    }
}
