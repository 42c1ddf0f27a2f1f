//! HTTP探测器实现
//!
//! 按服务定义构造请求，校验状态码和响应体，传输层错误记为失败的检测

use crate::error::ProbeError;
use crate::model::Service;
use crate::probe::prober::{ProbeReport, Prober};
use async_trait::async_trait;
use regex::bytes::Regex;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use tracing::debug;

/// 解析请求头字符串
///
/// 格式为 `key:value;key:value`，不能恰好拆成两段的条目直接跳过
///
/// # 参数
/// * `raw` - 请求头字符串
///
/// # 返回
/// * `Vec<(String, String)>` - 按出现顺序排列的请求头
pub fn parse_headers(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            match parts.as_slice() {
                [key, value] => Some((key.trim().to_string(), value.trim().to_string())),
                _ => None,
            }
        })
        .collect()
}

/// HTTP探测器
///
/// 每次探测按服务的超时、TLS 校验和重定向设置构建独立的客户端
#[derive(Debug, Clone, Default)]
pub struct HttpProber;

impl HttpProber {
    /// 创建新的HTTP探测器
    pub fn new() -> Self {
        Self
    }

    /// 构建HTTP客户端
    ///
    /// # 参数
    /// * `service` - 服务定义
    ///
    /// # 返回
    /// * `Result<Client, ProbeError>` - 客户端
    fn build_client(&self, service: &Service) -> Result<Client, ProbeError> {
        let redirect_policy = if service.follow_redirects {
            Policy::default()
        } else {
            Policy::custom(|attempt| attempt.error("redirects are not allowed for this service"))
        };

        let timeout_secs = u64::try_from(service.request_timeout_seconds.max(1)).unwrap_or(1);

        Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(!service.verify_ssl)
            .redirect(redirect_policy)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(ProbeError::ClientBuild)
    }

    /// 构建HTTP请求
    ///
    /// # 参数
    /// * `client` - HTTP客户端
    /// * `service` - 服务定义
    ///
    /// # 返回
    /// * `Result<RequestBuilder, ProbeError>` - 请求构建器
    fn build_request(&self, client: &Client, service: &Service) -> Result<RequestBuilder, ProbeError> {
        let method = Method::from_bytes(service.http_method.to_uppercase().as_bytes())
            .map_err(|_| ProbeError::InvalidMethod(service.http_method.clone()))?;

        let url = Url::parse(&service.endpoint).map_err(|e| ProbeError::InvalidEndpoint {
            endpoint: service.endpoint.clone(),
            reason: e.to_string(),
        })?;

        let mut request = client.request(method, url);

        for (key, value) in parse_headers(&service.http_headers) {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => request = request.header(name, value),
                _ => debug!("跳过无效的请求头: {}:{}", key, value),
            }
        }

        if !service.http_body.is_empty() {
            request = request.body(service.http_body.clone());
        }

        Ok(request)
    }

    /// 校验响应体
    ///
    /// # 返回
    /// * `Option<String>` - 校验失败时的原因
    async fn verify_body(&self, service: &Service, response: Response) -> Option<String> {
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Some(format!("Unable to read response body: {}", error_chain(&e))),
        };

        let pattern = match Regex::new(&service.expected_response_body) {
            Ok(pattern) => pattern,
            Err(e) => return Some(format!("Invalid response body pattern: {e}")),
        };

        if pattern.is_match(&body) {
            None
        } else {
            Some(format!(
                "Body did not match '{}'",
                service.expected_response_body
            ))
        }
    }
}

/// 拼接错误及其来源链，例如 `error following redirect for url (...): redirects are not allowed`
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, service: &Service) -> Result<ProbeReport, ProbeError> {
        let client = self.build_client(service)?;
        let request = self.build_request(&client, service)?;

        let start_time = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Ok(ProbeReport::failure(service.id, error_chain(&e))),
        };
        let latency = start_time.elapsed();

        let status_code = response.status().as_u16();
        if status_code != service.expected_status_code {
            return Ok(ProbeReport::failure(
                service.id,
                format!(
                    "Expected status code '{}' but got '{}'",
                    service.expected_status_code, status_code
                ),
            ));
        }

        if !service.expected_response_body.is_empty() {
            if let Some(reason) = self.verify_body(service, response).await {
                return Ok(ProbeReport::failure(service.id, reason));
            }
        }

        Ok(ProbeReport::success(
            service.id,
            i64::try_from(latency.as_millis()).unwrap_or(i64::MAX),
        ))
    }
}
