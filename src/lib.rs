//! # 精灵图抠像工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │          宿主（皮肤编辑器 / 播放器 / sprite-keyer CLI）   │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕                                                  │
//! │  ┌─ error ─────── AppError (统一错误类型)                 │
//! │  │                                                       │
//! │  └─ sprite_sheet  加载·校验·抠像·接缝清理·绘制·缓存      │
//! │      ├─ loader / decode    来源加载 + 解码缩放           │
//! │      ├─ geometry           网格校验 + 裁剪 + 缩放比例    │
//! │      ├─ key_color / chroma 键色检测 + 四种分割算法       │
//! │      ├─ seams              帧边界接缝清理                │
//! │      ├─ render             帧绘制 / 导出                 │
//! │      └─ cache / service    结果缓存 + 代次计数           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，宿主与 CLI 的返回类型 |
//! | [`sprite_sheet`] | 从 URL/Base64/文件加载精灵图并输出透明背景的帧网格 |

pub mod error;
pub mod sprite_sheet;
