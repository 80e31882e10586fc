//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 宿主侧只面对一个 `AppError`，内部的 `SpriteSheetError`、I/O 与序列化错误
//! 都通过 `From` 转换，`?` 可以跨层直接使用。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 实现 `Serialize` 将错误序列化为字符串，便于宿主以 JSON 回传。

use serde::Serialize;

use crate::sprite_sheet::SpriteSheetError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 精灵图处理流水线错误（加载 / 解码 / 校验 / 编码）
    #[error("{0}")]
    SpriteSheet(#[from] SpriteSheetError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 参数或配置 JSON 解析失败
    #[error("配置解析失败: {0}")]
    Config(#[from] serde_json::Error),
}

impl AppError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::SpriteSheet(err) => err.code(),
            Self::Io(_) => "E_IO",
            Self::Config(_) => "E_CONFIG",
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite_sheet::ValidationError;

    #[test]
    fn serializes_as_message_string() {
        let err = AppError::from(SpriteSheetError::Decode("坏数据".to_string()));
        let json = serde_json::to_string(&err).expect("serialize failed");
        assert_eq!(json, "\"解码错误：坏数据\"");
    }

    #[test]
    fn code_passes_through_pipeline_errors() {
        let err = AppError::from(SpriteSheetError::from(ValidationError::EmptyGrid {
            columns: 0,
            rows: 1,
        }));
        assert_eq!(err.code(), "E_EMPTY_GRID");

        let io = AppError::from(std::io::Error::other("boom"));
        assert_eq!(io.code(), "E_IO");
    }
}
