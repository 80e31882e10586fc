//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（URL / Base64 / 本地文件）的原始字节加载，并在“尽可能早”的阶段执行输入校验。
//! 目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - URL：协议 + 主机安全 + 手动重定向 + 内容类型 + 体积校验 + 分块流式下载；
//!   域名在每一跳解析一次，HTTP 客户端绑定到校验过的公网地址，不再二次解析。
//! - Base64：格式解析 + 解码前体积估算。
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 所有来源最后都经过文件签名（magic bytes）校验。

use base64::{Engine as _, engine::general_purpose};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio::net::lookup_host;

use super::source::{ImageSource, RawImageData};
use super::{ProcessingConfig, SheetProcessor, SpriteSheetError};

const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;

impl SheetProcessor {
    /// 按来源加载原始字节。
    pub(crate) async fn load_source(
        &self,
        source: &ImageSource,
        config: &ProcessingConfig,
    ) -> Result<RawImageData, SpriteSheetError> {
        match source {
            ImageSource::Url(url) => self.load_from_url(url, config).await,
            ImageSource::Base64(data) => self.load_from_base64(data, config),
            ImageSource::FilePath(path) => self.load_from_file(path, config),
        }
    }

    /// 从 URL 加载图片原始字节。
    pub(crate) async fn load_from_url(
        &self,
        url: &str,
        config: &ProcessingConfig,
    ) -> Result<RawImageData, SpriteSheetError> {
        log::info!("🌐 开始下载精灵图 - URL: {}", Self::redact_url_for_log(url));

        Self::validate_url_safety(url, config).await?;
        let bytes = self.download_with_validation(url, config).await?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "url",
        })
    }

    /// 从 Base64 / Data URL 加载图片原始字节。
    pub(crate) fn load_from_base64(
        &self,
        data: &str,
        config: &ProcessingConfig,
    ) -> Result<RawImageData, SpriteSheetError> {
        log::info!("📝 开始处理内嵌精灵图数据");

        let bytes = Self::parse_base64_with_limit(data, config.max_file_size)?;
        if bytes.len() as u64 > config.max_file_size {
            return Err(SpriteSheetError::ResourceLimit(format!(
                "Base64 解码后体积过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "base64",
        })
    }

    /// 从本地路径加载图片原始字节。
    pub(crate) fn load_from_file(
        &self,
        path: &str,
        config: &ProcessingConfig,
    ) -> Result<RawImageData, SpriteSheetError> {
        log::info!("📁 开始读取本地精灵图 - 路径: {}", path);

        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(SpriteSheetError::FileSystem(format!("文件不存在：{}", path)));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| SpriteSheetError::FileSystem(format!("无法读取文件信息：{}", e)))?;
        if metadata.len() > config.max_file_size {
            return Err(SpriteSheetError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(file_path)
            .map_err(|e| SpriteSheetError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "file",
        })
    }

    /// 执行带校验的网络下载，手动跟随重定向并逐跳校验目标地址。
    pub(crate) async fn download_with_validation(
        &self,
        url: &str,
        config: &ProcessingConfig,
    ) -> Result<Vec<u8>, SpriteSheetError> {
        let mut current_url = reqwest::Url::parse(url)
            .map_err(|e| SpriteSheetError::InvalidFormat(format!("URL 格式错误：{}", e)))?;

        for redirect_count in 0..=config.max_redirects {
            let request_clients = Self::build_request_clients_for_url(&current_url, config).await?;
            let response = Self::send_with_clients(&request_clients, &current_url, config).await?;

            if response.status().is_redirection() {
                if redirect_count >= config.max_redirects {
                    return Err(SpriteSheetError::Network(format!(
                        "重定向次数超过限制（{}）",
                        config.max_redirects
                    )));
                }

                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .ok_or_else(|| SpriteSheetError::Network("重定向响应缺少 Location 头".to_string()))?
                    .to_str()
                    .map_err(|e| SpriteSheetError::InvalidFormat(format!("重定向地址无效：{}", e)))?;

                let next_url = current_url.join(location).map_err(|e| {
                    SpriteSheetError::InvalidFormat(format!("重定向 URL 解析失败：{}", e))
                })?;
                Self::validate_url_safety(next_url.as_str(), config).await?;

                log::debug!("↪️ 跳转到: {}", Self::redact_url_for_log(next_url.as_str()));
                current_url = next_url;
                continue;
            }

            if !response.status().is_success() {
                return Err(SpriteSheetError::Network(format!(
                    "HTTP {}: {}",
                    response.status().as_u16(),
                    Self::status_message(response.status().as_u16())
                )));
            }

            if let Some(ct) = response.headers().get(reqwest::header::CONTENT_TYPE) {
                if let Ok(ct_str) = ct.to_str() {
                    if !Self::is_image_content_type(ct_str) {
                        return Err(SpriteSheetError::InvalidFormat(format!(
                            "不是图片类型：{}",
                            ct_str
                        )));
                    }
                }
            }

            let total_len = response.content_length();
            if let Some(size) = total_len {
                if size > config.max_file_size {
                    return Err(SpriteSheetError::ResourceLimit(format!(
                        "文件过大：{:.2} MB（限制：{:.2} MB）",
                        size as f64 / 1024.0 / 1024.0,
                        config.max_file_size as f64 / 1024.0 / 1024.0
                    )));
                }
            }

            let initial_capacity = total_len
                .map(|len| len.min(config.max_file_size) as usize)
                .filter(|len| *len > 0)
                .unwrap_or(BUFFER_INITIAL_CAPACITY);
            let mut buffer = Vec::with_capacity(initial_capacity);
            let mut response = response;
            let chunk_timeout = Duration::from_millis(config.stream_chunk_timeout_ms);

            loop {
                let next = tokio::time::timeout(chunk_timeout, response.chunk())
                    .await
                    .map_err(|_| SpriteSheetError::Timeout("下载数据流读取超时".to_string()))?;
                let Some(chunk) =
                    next.map_err(|e| SpriteSheetError::Network(format!("下载失败：{}", e)))?
                else {
                    break;
                };

                if buffer.len() as u64 + chunk.len() as u64 > config.max_file_size {
                    return Err(SpriteSheetError::ResourceLimit(
                        "下载后文件超过大小限制".to_string(),
                    ));
                }
                buffer.extend_from_slice(&chunk);
            }

            log::debug!("✅ 下载完成 - {} bytes", buffer.len());
            return Ok(buffer);
        }

        Err(SpriteSheetError::Network("下载流程异常结束".to_string()))
    }

    /// 依次尝试每个客户端，连接失败换下一个地址，其它错误直接返回。
    async fn send_with_clients(
        clients: &[reqwest::Client],
        url: &reqwest::Url,
        config: &ProcessingConfig,
    ) -> Result<reqwest::Response, SpriteSheetError> {
        let mut last_err: Option<SpriteSheetError> = None;
        for client in clients {
            let sent = client
                .get(url.clone())
                .header(reqwest::header::ACCEPT, "image/png,image/jpeg,image/*;q=0.8")
                .send()
                .await;
            match sent {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() => {
                    log::debug!("🔁 连接失败，尝试下一个解析地址");
                    last_err = Some(Self::map_reqwest_error(e, url.as_str(), config));
                }
                Err(e) => return Err(Self::map_reqwest_error(e, url.as_str(), config)),
            }
        }
        Err(last_err.unwrap_or_else(|| SpriteSheetError::Network("没有可用的 HTTP 客户端".to_string())))
    }

    /// 为当前跳构建请求客户端。
    ///
    /// 需要 DNS 校验的域名会在这里解析并过滤内网地址，每个公网地址对应一个
    /// 通过 `resolve` 绑定的客户端，连接时不会再走系统解析。
    async fn build_request_clients_for_url(
        url: &reqwest::Url,
        config: &ProcessingConfig,
    ) -> Result<Vec<reqwest::Client>, SpriteSheetError> {
        if config.allow_private_network || !config.resolve_dns_for_url_safety {
            return Ok(vec![Self::build_base_http_client(config)?]);
        }

        let Some(host) = url.host_str() else {
            return Ok(vec![Self::build_base_http_client(config)?]);
        };

        let bare_host = host.trim_start_matches('[').trim_end_matches(']');
        if bare_host.parse::<IpAddr>().is_ok() {
            return Ok(vec![Self::build_base_http_client(config)?]);
        }

        let port = url
            .port_or_known_default()
            .ok_or_else(|| SpriteSheetError::InvalidFormat("URL 缺少端口信息".to_string()))?;
        let pinned = Self::resolve_public_socket_addrs(host, port).await?;
        if pinned.is_empty() {
            return Err(SpriteSheetError::InvalidFormat("URL 未解析到有效公网地址".to_string()));
        }

        pinned
            .into_iter()
            .map(|addr| Self::build_pinned_http_client(config, host, addr))
            .collect()
    }

    fn base_client_builder(config: &ProcessingConfig) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::none())
    }

    fn build_base_http_client(config: &ProcessingConfig) -> Result<reqwest::Client, SpriteSheetError> {
        Self::base_client_builder(config)
            .build()
            .map_err(|e| SpriteSheetError::Network(format!("无法创建 HTTP 客户端：{}", e)))
    }

    fn build_pinned_http_client(
        config: &ProcessingConfig,
        host: &str,
        addr: SocketAddr,
    ) -> Result<reqwest::Client, SpriteSheetError> {
        Self::base_client_builder(config)
            .resolve(host, addr)
            .build()
            .map_err(|e| SpriteSheetError::Network(format!("无法创建 DNS 绑定客户端：{}", e)))
    }

    /// 解析主机并拒绝任何内网结果。
    async fn resolve_public_socket_addrs(
        host: &str,
        port: u16,
    ) -> Result<Vec<SocketAddr>, SpriteSheetError> {
        let addrs = lookup_host((host, port))
            .await
            .map_err(|e| SpriteSheetError::InvalidFormat(format!("URL 主机解析失败：{}", e)))?;

        let mut result = Vec::new();
        for addr in addrs {
            if Self::is_private_or_local_ip(addr.ip()) {
                return Err(SpriteSheetError::InvalidFormat(format!(
                    "URL 解析结果命中内网地址：{}",
                    addr.ip()
                )));
            }
            result.push(addr);
        }
        Ok(result)
    }

    /// 校验 URL 安全性。
    ///
    /// 默认阻止本地/内网目标，防止 SSRF 风险。
    pub(crate) async fn validate_url_safety(
        url: &str,
        config: &ProcessingConfig,
    ) -> Result<(), SpriteSheetError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| SpriteSheetError::InvalidFormat(format!("URL 格式错误：{}", e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SpriteSheetError::InvalidFormat("仅支持 HTTP/HTTPS".to_string()));
        }
        if config.allow_private_network {
            return Ok(());
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| SpriteSheetError::InvalidFormat("URL 缺少主机地址".to_string()))?;
        if Self::is_local_hostname(host) {
            return Err(SpriteSheetError::InvalidFormat(format!(
                "禁止访问本地网络地址：{}",
                host
            )));
        }

        let bare_host = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare_host.parse::<IpAddr>() {
            if Self::is_private_or_local_ip(ip) {
                return Err(SpriteSheetError::InvalidFormat(format!("禁止访问内网 IP：{}", ip)));
            }
            return Ok(());
        }

        if config.resolve_dns_for_url_safety {
            let port = parsed
                .port_or_known_default()
                .ok_or_else(|| SpriteSheetError::InvalidFormat("URL 缺少端口信息".to_string()))?;
            if Self::resolve_public_socket_addrs(host, port).await?.is_empty() {
                return Err(SpriteSheetError::InvalidFormat("URL 未解析到有效地址".to_string()));
            }
        }

        Ok(())
    }

    fn is_local_hostname(host: &str) -> bool {
        host.eq_ignore_ascii_case("localhost")
            || host.eq_ignore_ascii_case("localhost.")
            || host.ends_with(".local")
    }

    /// 判断 IP 是否属于本地/内网/链路本地等受限范围。
    fn is_private_or_local_ip(ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => {
                if v4.is_private()
                    || v4.is_loopback()
                    || v4.is_link_local()
                    || v4.is_broadcast()
                    || v4.is_documentation()
                    || v4.is_unspecified()
                    || v4.is_multicast()
                {
                    return true;
                }
                let octets = v4.octets();
                octets[0] == 0 || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000)
            }
            IpAddr::V6(v6) => {
                v6.is_loopback()
                    || v6.is_unspecified()
                    || v6.is_unique_local()
                    || v6.is_unicast_link_local()
                    || v6.is_multicast()
            }
        }
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, SpriteSheetError> {
        let len = base64_data.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| SpriteSheetError::ResourceLimit("Base64 输入长度溢出".to_string()))?
            / 4;
        groups
            .checked_mul(3)
            .ok_or_else(|| SpriteSheetError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
    }

    /// 解析 Base64 输入（支持 Data URL / 纯 Base64）。
    pub(crate) fn parse_base64_with_limit(
        data: &str,
        max_file_size: u64,
    ) -> Result<Vec<u8>, SpriteSheetError> {
        let normalized = data.trim();
        let payload = if normalized.starts_with("data:") {
            if !normalized.starts_with("data:image/") {
                return Err(SpriteSheetError::InvalidFormat("Data URL 不是图片类型".to_string()));
            }
            let base64_start = normalized
                .find(";base64,")
                .ok_or_else(|| SpriteSheetError::InvalidFormat("缺少 base64 标记".to_string()))?;
            &normalized[base64_start + 8..]
        } else {
            normalized
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(payload)?;
        if estimated_len > max_file_size {
            return Err(SpriteSheetError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| SpriteSheetError::Decode(format!("Base64 解码失败：{}", e)))
    }

    fn map_reqwest_error(e: reqwest::Error, url: &str, config: &ProcessingConfig) -> SpriteSheetError {
        let redacted = Self::redact_url_for_log(url);
        let err_msg = e.to_string().replace(url, &redacted);
        if e.is_timeout() {
            SpriteSheetError::Timeout(format!("下载超时（{}秒）", config.download_timeout))
        } else if e.is_connect() {
            SpriteSheetError::Network(format!("无法连接：{}", err_msg))
        } else {
            SpriteSheetError::Network(format!("请求失败：{}", err_msg))
        }
    }

    fn redact_url_for_log(url: &str) -> String {
        let Ok(parsed) = reqwest::Url::parse(url) else {
            return "<invalid-url>".to_string();
        };
        let host = parsed.host_str().unwrap_or("<unknown-host>");
        let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
        format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
    }

    fn is_image_content_type(content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .map(|base| {
                let base = base.trim().to_ascii_lowercase();
                base.starts_with("image/") || base == "application/octet-stream"
            })
            .unwrap_or(false)
    }

    fn status_message(code: u16) -> &'static str {
        match code {
            404 => "未找到",
            403 => "访问被拒绝",
            500..=599 => "服务器错误",
            _ => "请求失败",
        }
    }

    /// 通过文件签名（magic bytes）校验输入是否为图片。
    pub(crate) fn validate_image_signature(bytes: &[u8]) -> Result<(), SpriteSheetError> {
        if bytes.is_empty() {
            return Err(SpriteSheetError::InvalidFormat("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| SpriteSheetError::InvalidFormat("无法识别图片类型".to_string()))?;
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(SpriteSheetError::InvalidFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }
}
