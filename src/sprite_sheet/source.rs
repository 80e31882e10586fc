//! # 数据源与中间模型
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `RawImageData` 表示已加载但未解码的字节

use sha2::Digest as _;

/// 图片输入来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// 网络地址来源。
    Url(String),
    /// 内嵌数据（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(String),
}

impl ImageSource {
    /// 来源标识，参与缓存键计算。
    ///
    /// 内嵌数据可能很大，只记录长度与 SHA-256 摘要。
    pub fn identity(&self) -> String {
        match self {
            Self::Url(url) => format!("url:{}", url.trim()),
            Self::FilePath(path) => format!("file:{}", path.trim()),
            Self::Base64(data) => {
                let data = data.trim();
                format!("base64:{}:{}", data.len(), sha256_hex(data.as_bytes()))
            }
        }
    }

    pub(crate) fn hint(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Base64(_) => "base64",
            Self::FilePath(_) => "file",
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_distinguishes_sources() {
        let a = ImageSource::Base64("aGVsbG8=".into()).identity();
        let b = ImageSource::Base64("d29ybGQ=".into()).identity();
        assert_ne!(a, b);
        assert_eq!(a, ImageSource::Base64(" aGVsbG8= ".into()).identity());
        assert_eq!(ImageSource::FilePath("/tmp/a.png".into()).identity(), "file:/tmp/a.png");
        assert_ne!(
            ImageSource::Url("x".into()).identity(),
            ImageSource::FilePath("x".into()).identity()
        );
    }

    #[test]
    fn base64_identity_uses_sha256_digest() {
        // 同长度的不同负载也必须区分开
        let a = ImageSource::Base64("aGVsbG8=".into()).identity();
        let b = ImageSource::Base64("aGVsbG9=".into()).identity();
        assert_ne!(a, b);
        assert_eq!(
            a,
            "base64:8:333d6b3a3c1f5db6c9bdda5939b136986d170f4649172a68368d54ecb44c2ff2"
        );
        let digest = a.rsplit(':').next().expect("digest part");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(
            ImageSource::Base64("".into()).identity(),
            "base64:0:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
