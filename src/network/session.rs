use std::sync::Arc;

use parking_lot::RwLock;

/// 会话状态（UA、Cookie、附加 Header）
#[derive(Debug, Default)]
pub struct Session {
    pub ua: Arc<RwLock<String>>,
    pub cookie: Arc<RwLock<Option<String>>>,
    pub extra_headers: Arc<RwLock<Vec<(String, String)>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ua(ua: impl Into<String>) -> Self {
        let session = Self::default();
        session.set_ua(ua.into());
        session
    }

    pub fn set_ua(&self, ua: String) {
        *self.ua.write() = ua;
    }

    pub fn get_ua(&self) -> String {
        self.ua.read().clone()
    }

    pub fn set_cookie(&self, cookie: String) {
        *self.cookie.write() = Some(cookie);
    }

    pub fn get_cookie(&self) -> Option<String> {
        self.cookie.read().clone()
    }

    pub fn set_headers(&self, headers: Vec<(String, String)>) {
        *self.extra_headers.write() = headers;
    }

    pub fn get_headers(&self) -> Vec<(String, String)> {
        self.extra_headers.read().clone()
    }

    /// 清空所有 Session 数据
    pub fn clear(&self) {
        self.ua.write().clear();
        *self.cookie.write() = None;
        self.extra_headers.write().clear();
    }
}
