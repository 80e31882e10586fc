//! # sprite-keyer — 命令行入口
//!
//! 本文件只负责参数解析、日志初始化与输出写入。
//! 处理逻辑都在 `sprite_sheet` 模块中，详见 `lib.rs` 架构文档。

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use sprite_keyer::error::AppError;
use sprite_keyer::sprite_sheet::{
    ChromaKeyAlgorithm, ImageSource, ProcessingConfig, ProcessingProfile, SheetBuildOptions,
    SpriteSheetError, SpriteSheetService, export_frame_png, validate_dimensions,
};

#[derive(Parser, Debug)]
#[command(name = "sprite-keyer", version, about = "精灵图背景抠除与接缝清理")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 处理精灵图并输出透明背景 PNG。
    Process(ProcessArgs),
    /// 只校验图片尺寸与网格是否匹配，输出 JSON 报告。
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// 图片来源：本地路径、http(s) 地址或 data URL。
    source: String,

    /// 输出 PNG 路径。
    #[arg(long)]
    out: PathBuf,

    /// 处理参数 JSON（camelCase，与皮肤配置一致）。
    #[arg(long)]
    options: Option<PathBuf>,

    #[arg(long)]
    columns: Option<u32>,

    #[arg(long)]
    rows: Option<u32>,

    #[arg(long, allow_hyphen_values = true)]
    crop_offset_x: Option<i32>,

    #[arg(long, allow_hyphen_values = true)]
    crop_offset_y: Option<i32>,

    /// 抠像算法：classic / yuv / hsl / aggressive。
    #[arg(long)]
    algorithm: Option<ChromaKeyAlgorithm>,

    /// 关闭抠像。
    #[arg(long, default_value_t = false)]
    no_chroma_key: bool,

    /// 关闭平滑缩放（像素风素材）。
    #[arg(long, default_value_t = false)]
    no_smoothing: bool,

    /// 保留帧边界细线。
    #[arg(long, default_value_t = false)]
    keep_grid_lines: bool,

    #[arg(long)]
    target_frame_width: Option<u32>,

    #[arg(long)]
    max_pixels: Option<u64>,

    /// 处理档位：quality / balanced / speed。
    #[arg(long)]
    profile: Option<String>,

    /// 允许访问内网地址（仅限可信来源）。
    #[arg(long, default_value_t = false)]
    allow_private_network: bool,

    /// 额外导出单帧 PNG。
    #[arg(long)]
    frame_out: Option<PathBuf>,

    #[arg(long, default_value_t = 0)]
    frame: u32,

    #[arg(long, default_value_t = 0)]
    row: u32,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// 读取该图片的尺寸；不提供时使用 --width / --height。
    #[arg(long, conflicts_with_all = ["width", "height"])]
    image: Option<PathBuf>,

    #[arg(long, required_unless_present = "image")]
    width: Option<u32>,

    #[arg(long, required_unless_present = "image")]
    height: Option<u32>,

    #[arg(long, default_value_t = 8)]
    columns: u32,

    #[arg(long, default_value_t = 7)]
    rows: u32,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Process(args) => cmd_process(args).await,
        Command::Validate(args) => cmd_validate(args),
    }
}

fn parse_source(raw: &str) -> ImageSource {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        ImageSource::Url(trimmed.to_string())
    } else if lower.starts_with("data:") {
        ImageSource::Base64(trimmed.to_string())
    } else {
        ImageSource::FilePath(trimmed.to_string())
    }
}

fn build_options(args: &ProcessArgs) -> Result<SheetBuildOptions, AppError> {
    let mut options = match &args.options {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => SheetBuildOptions::default(),
    };

    if let Some(columns) = args.columns {
        options.columns = columns;
    }
    if let Some(rows) = args.rows {
        options.rows = rows;
    }
    if let Some(x) = args.crop_offset_x {
        options.crop_offset_x = x;
    }
    if let Some(y) = args.crop_offset_y {
        options.crop_offset_y = y;
    }
    if let Some(algorithm) = args.algorithm {
        options.chroma_key_algorithm = algorithm;
    }
    if args.no_chroma_key {
        options.chroma_key_enabled = false;
    }
    if args.no_smoothing {
        options.image_smoothing_enabled = false;
    }
    if args.keep_grid_lines {
        options.remove_grid_lines_enabled = false;
    }
    if args.target_frame_width.is_some() {
        options.target_frame_width_px = args.target_frame_width;
    }
    if args.max_pixels.is_some() {
        options.max_processed_pixels = args.max_pixels;
    }

    Ok(options)
}

fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn cmd_process(args: ProcessArgs) -> Result<(), AppError> {
    let options = build_options(&args)?;

    let mut config = ProcessingConfig::default();
    if let Some(profile) = &args.profile {
        config.apply_profile(ProcessingProfile::parse(profile)?);
    }
    config.allow_private_network = args.allow_private_network;

    let service = SpriteSheetService::new(config);
    let source = parse_source(&args.source);
    let sheet = service.request_sheet(&source, &options).await?;

    ensure_parent_dir(&args.out)?;
    std::fs::write(&args.out, sheet.encode_png()?)?;
    log::info!(
        "💾 已写出精灵图 {}（{}x{}，帧 {}x{}）",
        args.out.display(),
        sheet.surface.width(),
        sheet.surface.height(),
        sheet.frame_width,
        sheet.frame_height
    );

    if let Some(frame_out) = &args.frame_out {
        ensure_parent_dir(frame_out)?;
        std::fs::write(frame_out, export_frame_png(&sheet, args.frame, args.row)?)?;
        log::info!("💾 已导出第 {} 行第 {} 帧 → {}", args.row, args.frame, frame_out.display());
    }

    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> Result<(), AppError> {
    let (width, height) = match (&args.image, args.width, args.height) {
        (Some(path), _, _) => image::image_dimensions(path).map_err(|e| {
            SpriteSheetError::Decode(format!("无法读取图片尺寸：{}", e))
        })?,
        (None, Some(width), Some(height)) => (width, height),
        _ => {
            return Err(SpriteSheetError::InvalidFormat(
                "需要 --image 或 --width/--height".to_string(),
            )
            .into());
        }
    };

    let report = validate_dimensions(width, height, args.columns, args.rows);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
