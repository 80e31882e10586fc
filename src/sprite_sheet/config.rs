//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ProcessingConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中处理档位（quality / balanced / speed）作为高层语义，映射到像素预算与缩放滤镜组合。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置。
//! - `ProcessingProfile` 负责档位字符串解析与反向输出。
//! - `apply_profile` 将档位转换为具体阈值。
//! - `infer_profile` 用于从当前配置反推档位（给宿主展示状态）。

use image::imageops::FilterType;

use super::SpriteSheetError;

/// 精灵图处理配置。
///
/// 字段覆盖了加载、解码与表面缩放三个阶段；单次构建的选项见 `SheetBuildOptions`。
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// 下载/读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 网络下载超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接超时时间（秒）。
    pub connect_timeout: u64,
    /// 下载分块读取超时时间（毫秒）。
    pub stream_chunk_timeout_ms: u64,
    /// 最大重定向次数。
    pub max_redirects: usize,
    /// 是否允许访问内网或本地地址（默认关闭，防 SSRF）。
    pub allow_private_network: bool,
    /// 是否对域名执行 DNS 解析后再做内网 IP 拦截。
    pub resolve_dns_for_url_safety: bool,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 调用方未指定时使用的处理像素预算。
    pub default_max_processed_pixels: Option<u64>,
    /// 开启平滑时的缩放滤镜；关闭平滑时固定使用最近邻。
    pub resize_filter: FilterType,
    /// 已处理精灵图缓存容量。
    pub cache_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            stream_chunk_timeout_ms: 15_000,
            max_redirects: 5,
            allow_private_network: false,
            resolve_dns_for_url_safety: true,
            max_decoded_pixels: 40_000_000,
            default_max_processed_pixels: Some(4_000_000),
            resize_filter: FilterType::Triangle,
            cache_capacity: 8,
        }
    }
}

/// 处理档位（面向产品/用户语义）。
///
/// - `Quality`：不限制像素预算
/// - `Balanced`：质量与耗时平衡
/// - `Speed`：优先编辑器响应速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingProfile {
    Quality,
    Balanced,
    Speed,
}

impl ProcessingProfile {
    /// 从外部字符串解析档位。
    pub fn parse(profile: &str) -> Result<Self, SpriteSheetError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(SpriteSheetError::InvalidFormat(format!(
                "未知处理档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl ProcessingConfig {
    /// 基于当前参数反推处理档位。
    pub fn infer_profile(&self) -> ProcessingProfile {
        match self.default_max_processed_pixels {
            None => ProcessingProfile::Quality,
            Some(budget) if budget <= 1_500_000 => ProcessingProfile::Speed,
            Some(_) => ProcessingProfile::Balanced,
        }
    }

    /// 应用指定档位到实际参数。
    pub fn apply_profile(&mut self, profile: ProcessingProfile) {
        match profile {
            ProcessingProfile::Quality => {
                self.default_max_processed_pixels = None;
                self.resize_filter = FilterType::CatmullRom;
            }
            ProcessingProfile::Balanced => {
                self.default_max_processed_pixels = Some(4_000_000);
                self.resize_filter = FilterType::Triangle;
            }
            ProcessingProfile::Speed => {
                self.default_max_processed_pixels = Some(1_500_000);
                self.resize_filter = FilterType::Nearest;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_round_trips_through_config() {
        for profile in [
            ProcessingProfile::Quality,
            ProcessingProfile::Balanced,
            ProcessingProfile::Speed,
        ] {
            let mut config = ProcessingConfig::default();
            config.apply_profile(profile);
            assert_eq!(config.infer_profile(), profile);
            assert_eq!(ProcessingProfile::parse(profile.as_str()).ok(), Some(profile));
        }
    }

    #[test]
    fn unknown_profile_is_rejected() {
        assert!(matches!(
            ProcessingProfile::parse("turbo"),
            Err(SpriteSheetError::InvalidFormat(_))
        ));
        assert_eq!(ProcessingProfile::parse(" Speed ").ok(), Some(ProcessingProfile::Speed));
    }
}
