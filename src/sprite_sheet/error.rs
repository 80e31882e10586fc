//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载精灵图处理链路中的所有错误来源，避免字符串拼接式错误处理。
//! 尺寸校验错误单独建模为 `ValidationError`，调用侧可在完整处理前先行校验。
//!
//! 分割、距离场与接缝清理步骤没有错误通道：给定合法缓冲即必然成功。

/// 网格尺寸校验错误。
///
/// 属于调用方输入问题，不会被重试；消息中必须带上实际值与期望值。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("网格行列数必须大于 0（当前：{columns} 列 x {rows} 行）")]
    EmptyGrid { columns: u32, rows: u32 },

    #[error(
        "图片尺寸过小：{width}x{height}，{columns} 列 x {rows} 行至少需要 {min_width}x{min_height}"
    )]
    TooSmall {
        width: u32,
        height: u32,
        columns: u32,
        rows: u32,
        min_width: u32,
        min_height: u32,
    },

    #[error("图片宽高比不匹配：实际 {actual:.3}，期望 {expected:.3}（{columns} 列 x {rows} 行）")]
    AspectRatioMismatch {
        actual: f64,
        expected: f64,
        columns: u32,
        rows: u32,
    },
}

/// 精灵图处理统一错误类型。
///
/// 可克隆：同键并发等待者共享同一个失败结果。
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpriteSheetError {
    #[error("网络错误：{0}")]
    Network(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("尺寸校验失败：{0}")]
    Validation(#[from] ValidationError),

    #[error("输出表面不可用：{0}")]
    SurfaceAllocation(String),

    #[error("编码错误：{0}")]
    Encode(String),
}

impl SpriteSheetError {
    /// 稳定错误码，供宿主侧做分支处理。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidFormat(_) => "E_INVALID_FORMAT",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::Validation(ValidationError::EmptyGrid { .. }) => "E_EMPTY_GRID",
            Self::Validation(ValidationError::TooSmall { .. }) => "E_TOO_SMALL",
            Self::Validation(ValidationError::AspectRatioMismatch { .. }) => "E_ASPECT_RATIO",
            Self::SurfaceAllocation(_) => "E_SURFACE_ALLOCATION",
            Self::Encode(_) => "E_ENCODE",
        }
    }
}

impl From<SpriteSheetError> for String {
    fn from(error: SpriteSheetError) -> Self {
        error.to_string()
    }
}
