//! FreeWebNovel 插件
//!
//! 列表、详情、正文全部走流式扫描器。搜索为表单 POST。
//! 详情页若未解析出章节但捕获到内容 id，则回退请求章节归档接口。

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use crate::core::config::SiteConfig;
use crate::core::error::Result;
use crate::core::filter::{Filter, FilterOption, Filters, PopularOptions};
use crate::core::model::{NovelItem, SourceNovel};
use crate::network::{Fetcher, SiteClient};
use crate::plugins::{PluginMeta, SourcePlugin};
use crate::scan;

/// 站点水印语句，从正文文本中剔除
static SCRUB_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)Read more at freewebnovel\.com").unwrap(),
        Regex::new(r"(?i)Visit freewebnovel\.com for more chapters\.").unwrap(),
    ]
});

pub struct FreeWebNovel {
    meta: PluginMeta,
    base: Url,
    client: SiteClient,
}

impl FreeWebNovel {
    pub fn new(config: SiteConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or("https://freewebnovel.com/");
        let base = Url::parse(base_url).expect("Invalid base URL");

        Self {
            meta: PluginMeta {
                id: "freewebnovel".into(),
                name: "Free Web Novel".into(),
                site: base.to_string(),
                lang: "en".into(),
                version: "2.2.4".into(),
            },
            client: SiteClient::new(fetcher),
            base,
        }
    }

    fn absolute(&self, path: &str) -> String {
        self.base
            .join(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base, path))
    }
}

#[async_trait]
impl SourcePlugin for FreeWebNovel {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    fn filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert(
            "type".into(),
            Filter::Picker {
                label: "Novel Type".into(),
                default: "sort/most-popular".into(),
                options: vec![
                    FilterOption::new("Most Popular", "sort/most-popular"),
                    FilterOption::new("Latest Release", "sort/latest-release"),
                    FilterOption::new("Latest Novels", "sort/latest-novel"),
                    FilterOption::new("Completed Novels", "sort/completed-novel"),
                ],
            },
        );
        filters.insert(
            "genres".into(),
            Filter::Picker {
                label: "Genre".into(),
                default: String::new(),
                options: vec![
                    FilterOption::new("All", ""),
                    FilterOption::new("Action", "genre/Action"),
                    FilterOption::new("Fantasy", "genre/Fantasy"),
                    FilterOption::new("Romance", "genre/Romance"),
                    FilterOption::new("Xianxia", "genre/Xianxia"),
                ],
            },
        );
        filters
    }

    async fn list_popular(&self, page: u32, options: &PopularOptions) -> Result<Vec<NovelItem>> {
        let filter_type = options
            .filters
            .text("type")
            .unwrap_or("sort/most-popular");
        let filter_genre = options.filters.text("genres").unwrap_or_default();

        let base_page = if options.show_latest {
            "sort/latest-novels"
        } else if !filter_genre.is_empty() {
            filter_genre
        } else {
            filter_type
        };

        let url = if page > 1 {
            self.absolute(&format!("{}/{}.html", base_page, page))
        } else {
            self.absolute(base_page)
        };

        let html = self.client.get_text(&url).await?;
        Ok(scan::list::parse_novel_list(&html, &self.base))
    }

    async fn fetch_detail(&self, novel_path: &str) -> Result<SourceNovel> {
        let html = self.client.get_text(&self.absolute(novel_path)).await?;
        let scanned = scan::detail::parse_novel_detail(&html, &self.base, novel_path);
        let mut novel = scanned.novel;

        // 章节归档回退：尽力而为，失败时保留空列表
        if novel.chapters.is_empty()
            && let Some(novel_id) = scanned.novel_id
        {
            let archive_url = self.absolute(&format!("ajax/chapter-archive?novelId={}", novel_id));
            match self.client.get(&archive_url).await {
                Ok(resp) if resp.ok() => {
                    novel.chapters = scan::detail::parse_archive_chapters(&resp.text(), &self.base);
                }
                Ok(resp) => {
                    tracing::debug!(status = resp.status, "chapter archive unavailable");
                }
                Err(error) => {
                    tracing::debug!(%error, "chapter archive fetch failed");
                }
            }
        }

        Ok(novel)
    }

    async fn fetch_chapter(&self, chapter_path: &str) -> Result<String> {
        let html = self.client.get_text(&self.absolute(chapter_path)).await?;
        Ok(scan::content::parse_chapter_content(&html, &SCRUB_PATTERNS))
    }

    async fn search(&self, term: &str, _page: u32) -> Result<Vec<NovelItem>> {
        let url = self.absolute("search");
        let resp = self
            .client
            .post_form(&url, vec![("searchkey".to_string(), term.to_string())])
            .await?;
        if !resp.ok() {
            return Err(crate::core::error::PluginError::status(resp.status, &url));
        }
        Ok(scan::list::parse_novel_list(&resp.text(), &self.base))
    }
}
