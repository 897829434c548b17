//! 抓取协作者 (Fetch Collaborator)
//!
//! 核心解析逻辑不直接依赖具体 HTTP 实现：插件通过 `Fetcher` 接口发起请求，
//! 生产实现 `HttpService` 封装 reqwest，测试注入回放桩。重试与超时策略
//! 属于协作者，核心不做任何重试。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::core::config::AppConfig;
use crate::core::error::Result;
use crate::network::session::Session;

/// 出站请求描述
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// urlencoded 表单字段
    pub form: Option<Vec<(String, String)>>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            form: None,
        }
    }

    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            form: Some(fields),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// 入站响应
///
/// `url` 为重定向后的最终地址，用于探测插页（如成人内容确认页）。
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub url: String,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// 抓取接口 - 宿主提供的 HTTP 原语
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

/// 生产环境抓取实现
pub struct HttpService {
    client: reqwest::Client,
    session: Arc<Session>,
}

impl HttpService {
    pub fn new(config: &AppConfig, session: Arc<Session>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs))
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()?;

        Ok(Self { client, session })
    }

    /// 组装基础 Header（UA、Cookie、Session 附加项）
    fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let ua = self.session.get_ua();
        if !ua.is_empty()
            && let Ok(value) = HeaderValue::from_str(&ua)
        {
            headers.insert(USER_AGENT, value);
        }

        if let Some(cookie) = self.session.get_cookie()
            && let Ok(value) = HeaderValue::from_str(&cookie)
        {
            headers.insert(COOKIE, value);
        }

        for (key, value) in self.session.get_headers() {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                headers.insert(name, value);
            }
        }

        headers
    }
}

#[async_trait]
impl Fetcher for HttpService {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(self.base_headers());

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        if let Some(fields) = &request.form {
            builder = builder.form(fields);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.bytes().await?;

        Ok(FetchResponse { status, url, body })
    }
}
