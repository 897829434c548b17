use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::core::error::{PluginError, Result};
use crate::network::fetch::{FetchRequest, FetchResponse, Fetcher};

/// 面向站点的 HTTP 客户端封装
///
/// 在抓取协作者之上叠加站点默认 Header（Referer 等），并提供
/// 常用取值方法。`get_*` 系列要求 2xx，原始 `execute` 不做状态检查。
#[derive(Clone)]
pub struct SiteClient {
    fetcher: Arc<dyn Fetcher>,
    default_headers: Vec<(String, String)>,
}

impl SiteClient {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            default_headers: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.default_headers = headers;
        self
    }

    /// 执行请求（不检查状态码）
    pub async fn execute(&self, mut request: FetchRequest) -> Result<FetchResponse> {
        for (key, value) in &self.default_headers {
            request.headers.push((key.clone(), value.clone()));
        }
        self.fetcher.fetch(request).await
    }

    pub async fn get(&self, url: &str) -> Result<FetchResponse> {
        self.execute(FetchRequest::get(url)).await
    }

    /// 获取文本内容，非 2xx 视为失败
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.get(url).await?;
        if !resp.ok() {
            return Err(PluginError::status(resp.status, url));
        }
        Ok(resp.text())
    }

    /// 获取 JSON 内容，非 2xx 视为失败
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.get(url).await?;
        if !resp.ok() {
            return Err(PluginError::status(resp.status, url));
        }
        resp.json()
    }

    /// 获取二进制内容，非 2xx 视为失败
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.get(url).await?;
        if !resp.ok() {
            return Err(PluginError::status(resp.status, url));
        }
        Ok(resp.body.to_vec())
    }

    /// 提交 urlencoded 表单
    pub async fn post_form(
        &self,
        url: &str,
        fields: Vec<(String, String)>,
    ) -> Result<FetchResponse> {
        self.execute(FetchRequest::post_form(url, fields)).await
    }
}
