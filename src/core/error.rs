//! 错误处理体系 (Error Handling System)
//!
//! 定义插件领域的错误类型及全局 Result 别名。

use thiserror::Error;

/// 全局错误定义 (Plugin Domain Errors)
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 主请求收到非 2xx 响应
    #[error("Could not reach {url} ({status})")]
    Status { status: u16, url: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Other error: {0}")]
    Custom(String),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// 根据响应状态构造错误
    pub fn status(status: u16, url: impl Into<String>) -> Self {
        Self::Status {
            status,
            url: url.into(),
        }
    }
}
