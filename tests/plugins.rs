//! 插件门面端到端测试：经回放桩抓取器驱动四个宿主操作。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use silkworm::core::config::SiteConfig;
use silkworm::core::filter::PopularOptions;
use silkworm::core::model::NovelStatus;
use silkworm::network::{FetchRequest, FetchResponse, Fetcher};
use silkworm::plugins::PluginRegistry;
use silkworm::{PluginError, Result};

/// 回放桩：按 (方法, URL) 返回预置响应，未注册的请求一律 404
#[derive(Default)]
struct StubFetcher {
    routes: Mutex<HashMap<(String, String), FetchResponse>>,
    log: Mutex<Vec<(String, String)>>,
}

impl StubFetcher {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn on_get(&self, url: &str, status: u16, body: impl Into<Bytes>) {
        self.route("GET", url, status, url, body);
    }

    /// 模拟重定向：响应的最终 URL 与请求不同
    fn on_get_redirected(&self, url: &str, final_url: &str, status: u16, body: impl Into<Bytes>) {
        self.route("GET", url, status, final_url, body);
    }

    fn on_post(&self, url: &str, status: u16, body: impl Into<Bytes>) {
        self.route("POST", url, status, url, body);
    }

    fn route(&self, method: &str, url: &str, status: u16, final_url: &str, body: impl Into<Bytes>) {
        self.routes.lock().insert(
            (method.to_string(), url.to_string()),
            FetchResponse {
                status,
                url: final_url.to_string(),
                body: body.into(),
            },
        );
    }

    fn requested(&self, method: &str, url: &str) -> bool {
        self.log
            .lock()
            .iter()
            .any(|(m, u)| m == method && u == url)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let key = (request.method.to_string(), request.url.clone());
        self.log.lock().push(key.clone());

        Ok(self.routes.lock().get(&key).cloned().unwrap_or(FetchResponse {
            status: 404,
            url: request.url,
            body: Bytes::new(),
        }))
    }
}

fn create(stub: &Arc<StubFetcher>, id: &str) -> Box<dyn silkworm::SourcePlugin> {
    PluginRegistry::new()
        .create(id, SiteConfig::default(), stub.clone())
        .expect("plugin registered")
}

// ============================================================================
// freewebnovel
// ============================================================================

#[tokio::test]
async fn freewebnovel_popular_parses_list() {
    let stub = StubFetcher::new();
    stub.on_get(
        "https://freewebnovel.com/sort/most-popular",
        200,
        r#"<div class="ul-list1">
             <h3><a href="/n/123" title="Foo">X</a></h3>
             <span class="s2">Completed</span>
           </div>"#,
    );

    let plugin = create(&stub, "freewebnovel");
    let novels = plugin
        .list_popular(1, &PopularOptions::default())
        .await
        .unwrap();

    assert_eq!(novels.len(), 1);
    assert_eq!(novels[0].name, "Foo (Completed)");
    assert_eq!(novels[0].path, "n/123");
}

#[tokio::test]
async fn freewebnovel_popular_propagates_http_failure() {
    let stub = StubFetcher::new();
    stub.on_get("https://freewebnovel.com/sort/most-popular", 500, "boom");

    let plugin = create(&stub, "freewebnovel");
    let error = plugin
        .list_popular(1, &PopularOptions::default())
        .await
        .unwrap_err();

    match error {
        PluginError::Status { status, .. } => assert_eq!(status, 500),
        other => panic!("expected status error, got {other}"),
    }
}

#[tokio::test]
async fn freewebnovel_detail_falls_back_to_chapter_archive() {
    let stub = StubFetcher::new();
    stub.on_get(
        "https://freewebnovel.com/martial-peak.html",
        200,
        r#"<div class="m-imgtxt"><img src="/cover.jpg" title="Martial Peak"/></div>
           <div id="rating" data-novel-id="777"></div>"#,
    );
    stub.on_get(
        "https://freewebnovel.com/ajax/chapter-archive?novelId=777",
        200,
        r#"<ul>
             <li><a href="/martial-peak/chapter-1" title="Chapter 1"></a></li>
             <li><a href="/martial-peak/chapter-2" title="Chapter 2"></a></li>
           </ul>"#,
    );

    let plugin = create(&stub, "freewebnovel");
    let novel = plugin.fetch_detail("martial-peak.html").await.unwrap();

    assert_eq!(novel.name, "Martial Peak");
    assert_eq!(novel.chapters.len(), 2);
    assert_eq!(novel.chapters[1].path, "martial-peak/chapter-2");
}

#[tokio::test]
async fn freewebnovel_search_posts_form() {
    let stub = StubFetcher::new();
    stub.on_post(
        "https://freewebnovel.com/search",
        200,
        r#"<div id="list-page"><h3><a href="/n/9" title="Nine">N</a></h3></div>"#,
    );

    let plugin = create(&stub, "freewebnovel");
    let novels = plugin.search("nine", 1).await.unwrap();

    assert!(stub.requested("POST", "https://freewebnovel.com/search"));
    assert_eq!(novels.len(), 1);
    assert_eq!(novels[0].path, "n/9");
}

#[tokio::test]
async fn freewebnovel_chapter_body_is_rebuilt() {
    let stub = StubFetcher::new();
    stub.on_get(
        "https://freewebnovel.com/martial-peak/chapter-1.html",
        200,
        concat!(
            r#"<html><body><div id="chr-content">"#,
            r#"<p>First.</p>"#,
            r#"<script>track();</script>"#,
            r#"<div class="ads"><p>Buy!</p></div>"#,
            r#"<p>Second. Read more at freewebnovel.com</p>"#,
            r#"</div><footer>f</footer></body></html>"#
        ),
    );

    let plugin = create(&stub, "freewebnovel");
    let html = plugin
        .fetch_chapter("martial-peak/chapter-1.html")
        .await
        .unwrap();

    assert!(html.contains("<p>First.</p>"));
    assert!(html.contains("Second."));
    assert!(!html.contains("track()"));
    assert!(!html.contains("Buy!"));
    assert!(!html.contains("freewebnovel.com"));
    assert!(!html.contains("footer"));
}

// ============================================================================
// hexnovels
// ============================================================================

/// 状态数组：槽位 1/4 为回引，书籍字段再回引字面量槽位。
/// 章节内数字一律用字符串，避免被当作回引。
fn hex_detail_state() -> String {
    serde_json::json!([
        "current-book",
        2,
        {
            "id": 5,
            "slug": 6,
            "status": "ONGOING",
            "name": { "ru": 7 },
            "averageRating": 9.0,
            "labels": [{ "name": "Фэнтези" }, { "name": "Боевик" }],
            "relations": [{ "type": "AUTHOR", "publisher": { "name": 8 } }]
        },
        "current-book-chapters",
        9,
        "book1",
        "shield-hero",
        "Герой щита",
        "Иванов",
        [
            { "id": "c2", "number": "2", "volume": "1", "branchId": "br1",
              "createdAt": "2026-01-08T10:00:00Z" },
            { "id": "c1", "number": "1", "volume": "1", "branchId": "br1",
              "createdAt": "2026-01-01T10:00:00Z" },
            { "id": "x1", "number": "1", "branchId": "br2" }
        ]
    ])
    .to_string()
}

#[tokio::test]
async fn hexnovels_detail_decodes_state_and_reconciles_branches() {
    let stub = StubFetcher::new();
    stub.on_get(
        "https://hexnovels.me/content/shield-hero",
        200,
        format!(
            r#"<html><head><meta property="og:image" content="https://cdn.hex/p.jpg"/></head>
               <body><h1>Fallback Heading</h1>
               <script id="it-astro-state" type="application/json">{}</script>
               </body></html>"#,
            hex_detail_state()
        ),
    );
    stub.on_get(
        "https://api.hexnovels.me/v2/branches?bookId=book1",
        200,
        r#"[{ "id": "br1", "publishers": [{ "name": "Team Alpha" }] }]"#,
    );

    let plugin = create(&stub, "hexnovels");
    let novel = plugin.fetch_detail("/content/shield-hero").await.unwrap();

    assert_eq!(novel.name, "Герой щита");
    assert_eq!(novel.author.as_deref(), Some("Иванов"));
    assert_eq!(novel.status, NovelStatus::Ongoing);
    assert_eq!(novel.genres.as_deref(), Some("Фэнтези, Боевик"));
    assert_eq!(novel.rating, Some(4.5));

    // br2 被裁掉，br1 两章按 (卷, 章, 时间) 排序并重新编号
    assert_eq!(novel.chapters.len(), 2);
    assert_eq!(novel.chapters[0].path, "/content/shield-hero/c1");
    assert_eq!(novel.chapters[0].chapter_number, Some(1));
    assert_eq!(novel.chapters[0].name, "Том 1 - Глава 1");
    assert_eq!(novel.chapters[0].scanlator.as_deref(), Some("Team Alpha"));
    assert_eq!(novel.chapters[1].path, "/content/shield-hero/c2");
    assert_eq!(novel.chapters[1].chapter_number, Some(2));
}

#[tokio::test]
async fn hexnovels_chapter_decodes_encrypted_image() {
    // 36 位标识符第 14 位为 x：直接 XOR 载荷
    let image_url = "https://cdn.hexnovels.me/files/15c27a9b-6e12-x8af-9c41-0d2e7b5a9f33.jpg";
    let plain: Vec<u8> = {
        let mut bytes = vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
        bytes.extend_from_slice(b"payload");
        bytes
    };
    let secret = "kk";
    let encrypted: Vec<u8> = plain
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ secret.as_bytes()[i % secret.len()])
        .collect();

    let state = serde_json::json!([
        "reader-current-chapter",
        {
            "content": {
                "type": "doc",
                "content": [
                    { "type": "paragraph",
                      "content": [{ "type": "text", "text": "Привет" }] },
                    { "type": "image",
                      "attrs": { "id": "img1", "src": "blob:placeholder" } }
                ]
            }
        },
        "secret-key",
        "kk",
        "current-rich-attachments",
        { "img1": { "id": "img1", "image": image_url } }
    ])
    .to_string();

    let stub = StubFetcher::new();
    stub.on_get(
        "https://hexnovels.me/content/shield-hero/0f0e0d0c-1111-2222-3333-444455556666",
        200,
        format!(
            r#"<html><body><script id="it-astro-state" type="application/json">{}</script></body></html>"#,
            state
        ),
    );
    stub.on_get(image_url, 200, encrypted);

    let plugin = create(&stub, "hexnovels");
    let html = plugin
        .fetch_chapter("/content/shield-hero/0f0e0d0c-1111-2222-3333-444455556666")
        .await
        .unwrap();

    assert!(html.contains("<p>Привет</p>"));
    let expected_b64 = {
        use base64::prelude::*;
        BASE64_STANDARD.encode(&plain)
    };
    assert!(html.contains(&format!("data:image/png;base64,{}", expected_b64)));
    assert!(!html.contains("blob:placeholder"));
}

#[tokio::test]
async fn hexnovels_chapter_leaves_unmatched_blob_untouched() {
    // 内容引用的插图没有任何附件数据：blob 占位原样保留
    let state = serde_json::json!([
        "reader-current-chapter",
        {
            "content": {
                "type": "doc",
                "content": [
                    { "type": "image", "attrs": { "id": "abc", "src": "blob:deadbeef" } }
                ]
            }
        }
    ])
    .to_string();

    let stub = StubFetcher::new();
    stub.on_get(
        "https://hexnovels.me/content/some-novel/0f0e0d0c-1111-2222-3333-444455556666",
        200,
        format!(
            r#"<html><body><script id="it-astro-state" type="application/json">{}</script></body></html>"#,
            state
        ),
    );

    let plugin = create(&stub, "hexnovels");
    let html = plugin
        .fetch_chapter("/content/some-novel/0f0e0d0c-1111-2222-3333-444455556666")
        .await
        .unwrap();

    assert_eq!(html, r#"<img src="blob:deadbeef"/>"#);
}

#[tokio::test]
async fn hexnovels_search_maps_catalog_records() {
    let stub = StubFetcher::new();
    stub.on_get(
        "https://api.hexnovels.me/v2/books?size=30&page=0&sort=viewsCount%2Cdesc&search=hero",
        200,
        r#"[
            { "slug": "shield-hero", "poster": "https://cdn.hex/p.jpg",
              "name": { "ru": "Герой щита" } },
            { "poster": "https://cdn.hex/orphan.jpg" }
        ]"#,
    );

    let plugin = create(&stub, "hexnovels");
    let novels = plugin.search("hero", 1).await.unwrap();

    // 无 slug 的记录被丢弃
    assert_eq!(novels.len(), 1);
    assert_eq!(novels[0].name, "Герой щита");
    assert_eq!(novels[0].path, "/content/shield-hero");
    assert_eq!(novels[0].cover.as_deref(), Some("https://cdn.hex/p.jpg"));
}

// ============================================================================
// rulate
// ============================================================================

#[tokio::test]
async fn rulate_detail_confirms_mature_interstitial() {
    let stub = StubFetcher::new();
    stub.on_get_redirected(
        "https://erolate.com/book/1",
        "https://erolate.com/mature?path=/book/1",
        200,
        "<html>interstitial</html>",
    );
    stub.on_post(
        "https://erolate.com/mature?path=/book/1",
        200,
        r#"<div class="span8"><h1>Роман</h1></div>
           <a class="chapter" href="/book/1/c1"><div><span>№1</span><span>Первая</span></div></a>"#,
    );

    let plugin = create(&stub, "erolate");
    let novel = plugin.fetch_detail("/book/1").await.unwrap();

    assert!(stub.requested("POST", "https://erolate.com/mature?path=/book/1"));
    assert_eq!(novel.name, "Роман");
    assert_eq!(novel.chapters.len(), 1);
    assert_eq!(novel.chapters[0].name, "Первая");
}

#[tokio::test]
async fn rulate_search_uses_autocomplete_json() {
    let stub = StubFetcher::new();
    stub.on_get(
        "https://tl.rulate.ru/search/autocomplete?query=hero",
        200,
        r#"[
            { "id": 1, "title_one": "Герой", "title_two": "Hero",
              "url": "/book/1", "img": "/i/1.jpg" },
            { "id": 2, "title_one": "Пусто", "title_two": "Empty", "url": "", "img": "" }
        ]"#,
    );

    let plugin = create(&stub, "rulate");
    let novels = plugin.search("hero", 1).await.unwrap();

    assert_eq!(novels.len(), 1);
    assert_eq!(novels[0].name, "Герой / Hero");
    assert_eq!(novels[0].cover.as_deref(), Some("https://tl.rulate.ru/i/1.jpg"));
}

// ============================================================================
// ifreedom
// ============================================================================

#[tokio::test]
async fn ifreedom_chapter_strips_ads_and_promotes_srcset() {
    let stub = StubFetcher::new();
    stub.on_get(
        "https://ifreedom.su/chapter/5",
        200,
        concat!(
            r#"<div class="chapter-content">"#,
            r#"<script>spy()</script>"#,
            r#"<div class="pc-adv">ad</div>"#,
            r#"<p>Текст главы</p>"#,
            r#"<img srcset="https://img/1.jpg 1x, https://img/2.jpg 2x">"#,
            r#"</div>"#
        ),
    );

    let plugin = create(&stub, "ifreedom");
    let html = plugin.fetch_chapter("chapter/5").await.unwrap();

    assert!(html.contains("Текст главы"));
    assert!(!html.contains("spy()"));
    assert!(!html.contains("ad"));
    assert!(html.contains(r#"src="https://img/2.jpg""#));
}
