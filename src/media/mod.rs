//! 图像载荷解码 (Image Payload Decoder)
//!
//! 站点对部分插图做了逐字节 XOR 混淆，加密方式编码在文件名里：
//! 36 位标识符的第 14 位为 `x` 表示直接 XOR 载荷；`s` 表示间接，
//! 先把该位替换为 `x` 得到真实载荷地址再解码；其余情况视为未加密。
//! 解码结果以 data URI 形式内嵌，进程内以有界 LRU 缓存避免重复解码。

use base64::prelude::*;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::network::SiteClient;

/// 缓存默认容量
pub const DEFAULT_CACHE_CAPACITY: usize = 120;

/// 加密方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    /// 直接 XOR 载荷
    Direct,
    /// 间接：改写文件名后再取载荷
    Indirect,
}

/// 从 URL 中取出文件名主干（去查询串、去扩展名）
fn image_stem(image_url: &str) -> &str {
    let file_name = image_url
        .rsplit('/')
        .next()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("");
    file_name.split('.').next().unwrap_or("")
}

/// 判定加密方式；标识符非 36 位或标记位未知时视为未加密
pub fn detect_cipher_mode(image_url: &str) -> Option<CipherMode> {
    let stem = image_stem(image_url);
    if stem.len() != 36 || !stem.is_ascii() {
        return None;
    }
    match stem.as_bytes()[14] {
        b'x' => Some(CipherMode::Direct),
        b's' => Some(CipherMode::Indirect),
        _ => None,
    }
}

/// 间接模式的地址改写：仅替换标识符第 14 位为 `x`
pub fn to_direct_url(image_url: &str) -> String {
    let (base_url, query) = match image_url.find('?') {
        Some(index) => image_url.split_at(index),
        None => (image_url, ""),
    };

    let mut segments: Vec<&str> = base_url.split('/').collect();
    let file_name = segments.pop().unwrap_or("");
    let (stem, extension) = match file_name.rfind('.') {
        Some(index) => file_name.split_at(index),
        None => (file_name, ""),
    };

    if stem.len() != 36 || !stem.is_ascii() {
        return image_url.to_string();
    }

    let patched = format!("{}x{}{}", &stem[..14], &stem[15..], extension);
    segments.push(&patched);
    format!("{}{}", segments.join("/"), query)
}

/// 循环 XOR 解码；空密钥时字节原样通过
pub fn xor_decode(bytes: &[u8], secret: &str) -> Vec<u8> {
    let key: Vec<u8> = secret.chars().map(|c| (c as u32 & 0xff) as u8).collect();
    if key.is_empty() {
        return bytes.to_vec();
    }

    bytes
        .iter()
        .enumerate()
        .map(|(index, byte)| byte ^ key[index % key.len()])
        .collect()
}

/// 魔数嗅探 MIME；未命中时回退到 URL 扩展名，最终回退 octet-stream
pub fn sniff_mime(bytes: &[u8], source_url: &str) -> String {
    if bytes.len() > 8 && bytes.starts_with(&[0x89, 0x50, 0x4e, 0x47]) {
        return "image/png".to_string();
    }
    if bytes.len() > 3 && bytes.starts_with(&[0xff, 0xd8]) {
        return "image/jpeg".to_string();
    }
    if bytes.len() > 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return "image/webp".to_string();
    }
    if bytes.len() > 4 && bytes.starts_with(&[0x47, 0x49, 0x46]) {
        return "image/gif".to_string();
    }

    let path = source_url.split('?').next().unwrap_or(source_url);
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// 标准字母表、带填充的 base64 data URI
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(bytes))
}

/// 解码结果缓存（有界 LRU）
///
/// 键为 `密钥∷地址`。读取将条目刷新到最新位置；写入超容时淘汰最旧。
/// 并发重复键采用后写覆盖，不影响淘汰簿记。
pub struct ImageCache {
    entries: Mutex<IndexMap<String, String>>,
    capacity: usize,
}

impl ImageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        let value = entries.shift_remove(key)?;
        entries.insert(key.to_string(), value.clone());
        Some(value)
    }

    pub fn insert(&self, key: String, value: String) {
        let mut entries = self.entries.lock();
        entries.shift_remove(&key);
        entries.insert(key, value);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// 解码一张加密插图为 data URI
///
/// 未加密、密钥缺失、取流失败均返回 `None`（尽力而为路径，不上抛）。
pub async fn decode_image(
    client: &SiteClient,
    cache: &ImageCache,
    image_url: &str,
    secret: Option<&str>,
) -> Option<String> {
    let mode = detect_cipher_mode(image_url)?;

    let secret = secret.map(str::trim).filter(|s| !s.is_empty())?;
    let cache_key = format!("{}::{}", secret, image_url);
    if let Some(cached) = cache.get(&cache_key) {
        return Some(cached);
    }

    let fetch_url = match mode {
        CipherMode::Indirect => to_direct_url(image_url),
        CipherMode::Direct => image_url.to_string(),
    };

    let response = client.get(&fetch_url).await.ok()?;
    if !response.ok() {
        tracing::debug!(url = %fetch_url, status = response.status, "image payload fetch failed");
        return None;
    }

    let decoded = xor_decode(&response.body, secret);
    let mime = sniff_mime(&decoded, image_url);
    let data_uri = to_data_uri(&mime, &decoded);
    cache.insert(cache_key, data_uri.clone());
    Some(data_uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XOR_ID: &str = "15c27a9b-6e12-x8af-9c41-0d2e7b5a9f33";
    const SEC_ID: &str = "15c27a9b-6e12-s8af-9c41-0d2e7b5a9f33";

    #[test]
    fn marker_classification() {
        let direct = format!("https://cdn.example/images/{}.jpg", XOR_ID);
        let indirect = format!("https://cdn.example/images/{}.jpg?v=2", SEC_ID);
        let plain = "https://cdn.example/images/plain-name.jpg";
        let short = "https://cdn.example/images/15c27a9b.jpg";

        assert_eq!(detect_cipher_mode(&direct), Some(CipherMode::Direct));
        assert_eq!(detect_cipher_mode(&indirect), Some(CipherMode::Indirect));
        assert_eq!(detect_cipher_mode(plain), None);
        assert_eq!(detect_cipher_mode(short), None);
    }

    #[test]
    fn indirect_rewrite_touches_only_marker_char() {
        let url = format!("https://cdn.example/images/{}.webp?token=abc", SEC_ID);
        let rewritten = to_direct_url(&url);
        assert_eq!(
            rewritten,
            format!("https://cdn.example/images/{}.webp?token=abc", XOR_ID)
        );

        // 非 36 位主干原样返回
        let odd = "https://cdn.example/images/short.webp";
        assert_eq!(to_direct_url(odd), odd);
    }

    #[test]
    fn xor_roundtrip_and_empty_key() {
        let payload = b"\x00\x01\x02hello";
        let once = xor_decode(payload, "key");
        assert_ne!(once, payload.to_vec());
        assert_eq!(xor_decode(&once, "key"), payload.to_vec());

        assert_eq!(xor_decode(payload, ""), payload.to_vec());
    }

    #[test]
    fn magic_bytes_win_over_extension() {
        // JPEG 魔数配 .png 文件名：魔数优先
        let jpeg = [0xff, 0xd8, 0xff, 0xe0, 0, 0, 0, 0];
        assert_eq!(sniff_mime(&jpeg, "https://x/pic.png"), "image/jpeg");

        let png = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00];
        assert_eq!(sniff_mime(&png, "https://x/pic.jpg"), "image/png");

        let mut webp = Vec::from(*b"RIFF\x00\x00\x00\x00WEBP");
        webp.push(0);
        assert_eq!(sniff_mime(&webp, "https://x/pic"), "image/webp");

        let gif = *b"GIF89a";
        assert_eq!(sniff_mime(&gif, "https://x/pic"), "image/gif");
    }

    #[test]
    fn extension_fallback_then_octet_stream() {
        let opaque = [0x00, 0x11, 0x22, 0x33, 0x44];
        assert_eq!(sniff_mime(&opaque, "https://x/pic.png?w=100"), "image/png");
        assert_eq!(
            sniff_mime(&opaque, "https://x/payload.bin2"),
            "application/octet-stream"
        );
    }

    #[test]
    fn base64_padding_for_tail_groups() {
        assert_eq!(to_data_uri("image/png", b"a"), "data:image/png;base64,YQ==");
        assert_eq!(to_data_uri("image/png", b"ab"), "data:image/png;base64,YWI=");
        assert_eq!(to_data_uri("image/png", b"abc"), "data:image/png;base64,YWJj");
    }

    #[test]
    fn lru_evicts_exactly_the_oldest() {
        let cache = ImageCache::new(3);
        cache.insert("k1".into(), "v1".into());
        cache.insert("k2".into(), "v2".into());
        cache.insert("k3".into(), "v3".into());
        cache.insert("k4".into(), "v4".into());

        assert!(!cache.contains("k1"));
        assert!(cache.contains("k2"));
        assert!(cache.contains("k3"));
        assert!(cache.contains("k4"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn read_refreshes_recency() {
        let cache = ImageCache::new(3);
        cache.insert("k1".into(), "v1".into());
        cache.insert("k2".into(), "v2".into());
        cache.insert("k3".into(), "v3".into());

        // 触碰 k1 后再超容：应淘汰 k2 而非 k1
        assert_eq!(cache.get("k1").as_deref(), Some("v1"));
        cache.insert("k4".into(), "v4".into());

        assert!(cache.contains("k1"));
        assert!(!cache.contains("k2"));
    }

    #[test]
    fn rewrite_on_duplicate_insert_keeps_capacity() {
        let cache = ImageCache::new(2);
        cache.insert("k1".into(), "v1".into());
        cache.insert("k1".into(), "v1b".into());
        cache.insert("k2".into(), "v2".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("k1").as_deref(), Some("v1b"));
    }
}
