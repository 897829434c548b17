//! HexNovels 插件
//!
//! 页面数据藏在内嵌状态数组里（详情、章节、密钥、富附件）。章节列表
//! 经调和引擎裁剪排序；插图按文件名标记解码为 data URI。目录与搜索
//! 共用同一 API 查询。

mod api;
mod richtext;

pub use api::AttachmentMap;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde_json::Value;
use url::Url;

use crate::core::config::SiteConfig;
use crate::core::error::Result;
use crate::core::filter::{Filter, FilterOption, FilterState, Filters, PopularOptions};
use crate::core::model::{ChapterItem, NovelItem, NovelStatus, SourceNovel};
use crate::dom;
use crate::media::{self, ImageCache};
use crate::network::{Fetcher, SiteClient};
use crate::plugins::{PluginMeta, SourcePlugin};
use crate::reconcile::{self, RawChapter};
use crate::state::StateTree;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/content/([^/]+)").unwrap());
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});
static TITLE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+[—-]\s+HexNovels$").unwrap());
static LEGACY_CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)window\["current-chapter"\]\s*=\s*(\{.*?\});?\s*</script>"#).unwrap()
});
static BLOB_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)blob:").unwrap());
static BLOB_IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img\b[^>]*\bsrc=["']blob:"#).unwrap());

/// 详情页的同步解析产物
struct DetailPage {
    state: Option<StateTree>,
    heading: Option<String>,
    meta_title: Option<String>,
    page_title: Option<String>,
    meta_summary: Option<String>,
    meta_cover: Option<String>,
}

/// 章节页的同步解析产物
struct ChapterPage {
    state: Option<StateTree>,
    legacy_content: Option<String>,
    fallback_html: Option<String>,
}

pub struct HexNovels {
    meta: PluginMeta,
    site: Url,
    api: Url,
    client: SiteClient,
    images: ImageCache,
}

impl HexNovels {
    pub fn new(config: SiteConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let site_url = config.base_url.as_deref().unwrap_or("https://hexnovels.me/");
        let api_url = config
            .api_url
            .as_deref()
            .unwrap_or("https://api.hexnovels.me/");
        let site = Url::parse(site_url).expect("Invalid base URL");
        let api = Url::parse(api_url).expect("Invalid API URL");

        Self {
            meta: PluginMeta {
                id: "hexnovels".into(),
                name: "HexNovels".into(),
                site: site.to_string(),
                lang: "ru".into(),
                version: "1.0.9".into(),
            },
            client: SiteClient::new(fetcher),
            site,
            api,
            images: ImageCache::default(),
        }
    }

    fn absolute(&self, path: &str) -> String {
        self.site
            .join(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.site, path.trim_start_matches('/')))
    }

    // =========================================================================
    // 目录查询
    // =========================================================================

    async fn fetch_catalog(
        &self,
        page: u32,
        sort_field: &str,
        sort_order: &str,
        search: &str,
        filters: Option<&FilterState>,
    ) -> Result<Vec<NovelItem>> {
        let mut query: Vec<(String, String)> = vec![
            ("size".into(), "30".into()),
            ("page".into(), page.saturating_sub(1).to_string()),
            ("sort".into(), format!("{},{}", sort_field, sort_order)),
        ];

        let search = search.trim();
        if !search.is_empty() {
            query.push(("search".into(), search.to_string()));
        }

        if let Some(filters) = filters {
            append_array_filter(&mut query, "country", filters.multi("countries"));
            append_array_filter(&mut query, "status", filters.multi("statuses"));
            append_array_filter(&mut query, "contentStatus", filters.multi("contentStatuses"));
            append_array_filter(&mut query, "formats", filters.multi("formats"));
            append_array_filter(&mut query, "labelsInclude", filters.include("genres"));
            append_array_filter(&mut query, "labelsExclude", filters.exclude("genres"));

            if filters.flag("strictLabelEqual") {
                query.push(("strictLabelEqual".into(), "true".into()));
            }

            for key in [
                "averageRatingMin",
                "averageRatingMax",
                "chaptersCountMin",
                "chaptersCountMax",
                "yearMin",
                "yearMax",
            ] {
                set_numeric_filter(&mut query, key, filters.text(key));
            }
        }

        let query_string = serde_urlencoded::to_string(&query)
            .map_err(|e| crate::core::error::PluginError::Parse(e.to_string()))?;
        let url = self
            .api
            .join(&format!("v2/books?{}", query_string))
            .map_err(|e| crate::core::error::PluginError::Parse(e.to_string()))?;

        let books: Vec<api::CatalogBook> = self.client.get_json(url.as_str()).await?;
        Ok(books
            .into_iter()
            .filter_map(|book| {
                let slug = api::normalize_id(book.slug.as_deref())?;
                Some(NovelItem {
                    name: localized(book.name.as_ref()).unwrap_or_else(|| slug.clone()),
                    path: format!("/content/{}", slug),
                    cover: api::normalize_id(book.poster.as_deref()),
                })
            })
            .collect())
    }

    // =========================================================================
    // 章节组装
    // =========================================================================

    async fn assemble_chapters(
        &self,
        source_chapters: Vec<RawChapter>,
        book_id: Option<&str>,
        slug: &str,
        novel_path: &str,
    ) -> Vec<ChapterItem> {
        let labels: HashMap<String, String> = match book_id {
            Some(book_id) => api::branch_labels(&self.client, &self.api, book_id).await,
            None => HashMap::new(),
        };

        let ordered = reconcile::reconcile(source_chapters);
        let mut chapters = Vec::with_capacity(ordered.len());
        for (index, chapter) in ordered.iter().enumerate() {
            let Some(chapter_id) = chapter.stable_id() else {
                continue;
            };
            let branch = api::resolve_branch_label(chapter.branch_id.as_deref(), &labels);
            let path = if !slug.is_empty() {
                format!("/content/{}/{}", slug, chapter_id)
            } else {
                format!("{}/{}", novel_path.trim_end_matches('/'), chapter_id)
            };

            chapters.push(ChapterItem {
                name: build_chapter_name(chapter, index + 1),
                path,
                release_time: chapter.created_at.as_deref().and_then(format_release),
                // 最终序号重新分配，源侧卷内重置编号不影响单调性
                chapter_number: Some(index as u32 + 1),
                scanlator: branch.clone(),
                page: branch,
            });
        }
        chapters
    }

    // =========================================================================
    // 富附件
    // =========================================================================

    /// 确保所需插图 id 均有附件；页面状态不足时向 API 补齐
    async fn ensure_attachments_for_ids(
        &self,
        chapter_id: Option<&str>,
        attachments: Option<AttachmentMap>,
        required: &[String],
    ) -> Option<AttachmentMap> {
        if required.is_empty() {
            return attachments;
        }

        let missing = required.iter().any(|id| {
            attachments
                .as_ref()
                .and_then(|map| map.get(id))
                .and_then(|value| api::attachment_image(value))
                .is_none()
        });
        if !missing {
            return attachments;
        }

        let Some(chapter_id) = chapter_id else {
            return attachments;
        };
        let fetched = api::chapter_attachments(&self.client, &self.api, chapter_id).await;
        api::merge_attachments(attachments, fetched)
    }

    /// blob 占位替换前的附件准备
    async fn ensure_attachments_for_blobs(
        &self,
        chapter_id: Option<&str>,
        attachments: Option<AttachmentMap>,
    ) -> Option<AttachmentMap> {
        let has_images = attachments
            .as_ref()
            .is_some_and(|map| !api::attachment_ids_with_images(map, None).is_empty());
        if has_images {
            return attachments;
        }

        let Some(chapter_id) = chapter_id else {
            return attachments;
        };
        let fetched = api::chapter_attachments(&self.client, &self.api, chapter_id).await;
        api::merge_attachments(attachments, fetched)
    }

    /// 并发解码一组附件插图；成功者以 data URI 回写
    async fn hydrate_attachments(
        &self,
        attachments: AttachmentMap,
        secret: Option<&str>,
        preferred_ids: &[String],
    ) -> AttachmentMap {
        let ids = if preferred_ids.is_empty() {
            api::attachment_ids_with_images(&attachments, None)
        } else {
            preferred_ids.to_vec()
        };
        if ids.is_empty() {
            return attachments;
        }

        let tasks = ids.iter().map(|id| {
            let source = attachments.get(id).and_then(api::attachment_source);
            async move {
                let source = source?;
                let decoded =
                    media::decode_image(&self.client, &self.images, &source, secret).await?;
                Some((id.clone(), decoded))
            }
        });

        let mut hydrated = attachments.clone();
        for outcome in futures::future::join_all(tasks).await.into_iter().flatten() {
            let (id, decoded) = outcome;
            match hydrated.get_mut(&id) {
                Some(Value::Object(entry)) => {
                    entry.insert("image".into(), Value::String(decoded));
                }
                Some(slot) => {
                    *slot = Value::String(decoded);
                }
                None => {}
            }
        }
        hydrated
    }

    /// 将正文中的 `blob:` 插图按出现顺序替换为已解码附件
    async fn normalize_blob_images(
        &self,
        html: String,
        chapter_id: Option<&str>,
        attachments: Option<AttachmentMap>,
        secret: Option<&str>,
    ) -> String {
        if html.is_empty() || !BLOB_RE.is_match(&html) {
            return html;
        }

        let blob_count = BLOB_IMG_RE.find_iter(&html).count();
        let Some(attachments) = self
            .ensure_attachments_for_blobs(chapter_id, attachments)
            .await
        else {
            return html;
        };

        let ids = api::attachment_ids_with_images(&attachments, Some(blob_count));
        let hydrated = self.hydrate_attachments(attachments, secret, &ids).await;

        let urls: Vec<String> = api::attachment_ids_with_images(&hydrated, Some(blob_count))
            .iter()
            .filter_map(|id| hydrated.get(id).and_then(api::attachment_image))
            .collect();
        if urls.is_empty() {
            return html;
        }

        replace_blob_sources(&html, &urls)
    }
}

#[async_trait]
impl SourcePlugin for HexNovels {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    fn filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert(
            "sortField".into(),
            Filter::Picker {
                label: "Поле сортировки".into(),
                default: "viewsCount".into(),
                options: vec![
                    FilterOption::new("Просмотры", "viewsCount"),
                    FilterOption::new("Лайки", "likesCount"),
                    FilterOption::new("Количество глав", "chaptersCount"),
                    FilterOption::new("Рейтинг", "averageRating"),
                    FilterOption::new("Дата добавления", "createdAt"),
                ],
            },
        );
        filters.insert(
            "sortOrder".into(),
            Filter::Picker {
                label: "Порядок сортировки".into(),
                default: "desc".into(),
                options: vec![
                    FilterOption::new("По убыванию", "desc"),
                    FilterOption::new("По возрастанию", "asc"),
                ],
            },
        );
        filters.insert(
            "countries".into(),
            Filter::CheckboxGroup {
                label: "Страны".into(),
                options: vec![
                    FilterOption::new("Россия", "RUSSIA"),
                    FilterOption::new("Япония", "JAPAN"),
                    FilterOption::new("Корея", "KOREA"),
                    FilterOption::new("Китай", "CHINA"),
                ],
            },
        );
        filters.insert(
            "statuses".into(),
            Filter::CheckboxGroup {
                label: "Статус произведения".into(),
                options: vec![
                    FilterOption::new("Онгоинг", "ONGOING"),
                    FilterOption::new("Завершено", "DONE"),
                    FilterOption::new("Заморожено", "FROZEN"),
                    FilterOption::new("Анонс", "ANNOUNCE"),
                ],
            },
        );
        filters.insert(
            "genres".into(),
            Filter::ExcludableCheckboxGroup {
                label: "Жанры".into(),
                options: vec![
                    FilterOption::new("Боевик", "action"),
                    FilterOption::new("Драма", "drama"),
                    FilterOption::new("Исекай", "isekai"),
                    FilterOption::new("Романтика", "romance"),
                    FilterOption::new("Фэнтези", "fantasy"),
                ],
            },
        );
        filters.insert(
            "strictLabelEqual".into(),
            Filter::Switch {
                label: "Строгое совпадение включённых жанров".into(),
                default: false,
            },
        );
        filters.insert(
            "chaptersCountMin".into(),
            Filter::Text {
                label: "Глав от".into(),
            },
        );
        filters.insert(
            "chaptersCountMax".into(),
            Filter::Text {
                label: "Глав до".into(),
            },
        );
        filters
    }

    async fn list_popular(&self, page: u32, options: &PopularOptions) -> Result<Vec<NovelItem>> {
        let sort_field = if options.show_latest {
            "updatedAt"
        } else {
            options.filters.text("sortField").unwrap_or("viewsCount")
        };
        let sort_order = if options.show_latest {
            "desc"
        } else {
            options.filters.text("sortOrder").unwrap_or("desc")
        };

        self.fetch_catalog(page, sort_field, sort_order, "", Some(&options.filters))
            .await
    }

    async fn fetch_detail(&self, novel_path: &str) -> Result<SourceNovel> {
        let url = self.absolute(novel_path);
        let html = self.client.get_text(&url).await?;
        let page = parse_detail_page(&html);

        let book: Option<api::BookData> = page
            .state
            .as_ref()
            .and_then(|state| state.get("current-book"));
        let state_chapters: Option<Vec<RawChapter>> = page
            .state
            .as_ref()
            .and_then(|state| state.get("current-book-chapters"));

        let mut novel = SourceNovel {
            path: novel_path.to_string(),
            name: page
                .heading
                .or(page.meta_title)
                .or(page.page_title)
                .unwrap_or_default(),
            summary: page.meta_summary,
            cover: page.meta_cover,
            ..Default::default()
        };

        if let Some(book) = &book {
            if let Some(name) = localized(book.name.as_ref()) {
                novel.name = name;
            }
            if let Some(summary) = localized(book.description.as_ref()) {
                novel.summary = Some(summary);
            }
            if let Some(poster) = api::normalize_id(book.poster.as_deref()) {
                novel.cover = Some(poster);
            }
            if let Some(status) = map_status(book.status.as_deref()) {
                novel.status = status;
            }
            novel.author = extract_author(&book.relations);
            novel.genres = extract_genres(&book.labels);
            novel.rating = normalize_rating(book.average_rating);
        }

        let slug = extract_slug(novel_path)
            .or_else(|| book.as_ref().and_then(|b| api::normalize_id(b.slug.as_deref())))
            .unwrap_or_default();
        let mut book_id = book.as_ref().and_then(|b| api::normalize_id(b.id.as_deref()));
        if book_id.is_none() && !slug.is_empty() {
            book_id = api::book_id_by_slug(&self.client, &self.api, &slug).await;
        }

        let mut source_chapters = state_chapters.unwrap_or_default();
        if source_chapters.is_empty()
            && let Some(book_id) = &book_id
        {
            source_chapters = api::book_chapters(&self.client, &self.api, book_id).await;
        }

        if !source_chapters.is_empty() {
            novel.chapters = self
                .assemble_chapters(source_chapters, book_id.as_deref(), &slug, novel_path)
                .await;
        }

        Ok(novel)
    }

    async fn fetch_chapter(&self, chapter_path: &str) -> Result<String> {
        let url = self.absolute(chapter_path);
        let html = self.client.get_text(&url).await?;
        let page = parse_chapter_page(&html);
        let chapter_id = extract_chapter_id(chapter_path);

        let reader: Option<api::ReaderChapter> = page
            .state
            .as_ref()
            .and_then(|state| state.get("reader-current-chapter"));
        let secret: Option<String> = page
            .state
            .as_ref()
            .and_then(|state| state.get("secret-key"));
        let attachments: Option<AttachmentMap> = page
            .state
            .as_ref()
            .and_then(|state| state.get("current-rich-attachments"));

        if let Some(content) = reader.and_then(|reader| reader.content) {
            match &content {
                Value::String(text) if !text.trim().is_empty() => {
                    return Ok(self
                        .normalize_blob_images(
                            text.clone(),
                            chapter_id.as_deref(),
                            attachments,
                            secret.as_deref(),
                        )
                        .await);
                }
                Value::Object(_) => {
                    let required = richtext::collect_image_ids(&content);
                    let prepared = self
                        .ensure_attachments_for_ids(
                            chapter_id.as_deref(),
                            attachments.clone(),
                            &required,
                        )
                        .await;
                    let hydrated = match prepared {
                        Some(prepared) => Some(
                            self.hydrate_attachments(prepared, secret.as_deref(), &required)
                                .await,
                        ),
                        None => None,
                    };

                    let rendered = richtext::render(&content, &|attrs| {
                        let Some(hydrated) = hydrated.as_ref() else {
                            return Vec::new();
                        };
                        richtext::extract_image_ids(attrs)
                            .iter()
                            .filter_map(|id| hydrated.get(id).and_then(api::attachment_image))
                            .collect()
                    });

                    if !rendered.trim().is_empty() {
                        return Ok(self
                            .normalize_blob_images(
                                rendered,
                                chapter_id.as_deref(),
                                hydrated.or(attachments),
                                secret.as_deref(),
                            )
                            .await);
                    }
                }
                _ => {}
            }
        }

        // 旧版内嵌脚本回退
        if let Some(legacy) = page.legacy_content {
            return Ok(self
                .normalize_blob_images(
                    legacy,
                    chapter_id.as_deref(),
                    attachments.clone(),
                    secret.as_deref(),
                )
                .await);
        }

        // 选择器兜底
        if let Some(fallback) = page.fallback_html {
            return Ok(self
                .normalize_blob_images(fallback, chapter_id.as_deref(), attachments, secret.as_deref())
                .await);
        }

        Ok(String::new())
    }

    async fn search(&self, term: &str, page: u32) -> Result<Vec<NovelItem>> {
        self.fetch_catalog(page, "viewsCount", "desc", term, None).await
    }
}

// ============================================================================
// 页面解析（同步，不跨越 await 持有文档）
// ============================================================================

fn parse_detail_page(html: &str) -> DetailPage {
    let doc = Html::parse_document(html);

    let state = dom::first_inner_html(&doc, &dom::selector("#it-astro-state"))
        .and_then(|raw| StateTree::parse(&raw));

    DetailPage {
        state,
        heading: dom::first_text(&doc, &dom::selector("h1")),
        meta_title: dom::first_attr(&doc, &dom::selector(r#"meta[property="og:title"]"#), "content"),
        page_title: dom::first_text(&doc, &dom::selector("title"))
            .map(|title| TITLE_SUFFIX_RE.replace(&title, "").trim().to_string())
            .and_then(dom::non_empty),
        meta_summary: dom::first_attr(&doc, &dom::selector(r#"meta[name="description"]"#), "content"),
        meta_cover: dom::first_attr(&doc, &dom::selector(r#"meta[property="og:image"]"#), "content"),
    }
}

fn parse_chapter_page(html: &str) -> ChapterPage {
    let doc = Html::parse_document(html);

    let state = dom::first_inner_html(&doc, &dom::selector("#it-astro-state"))
        .and_then(|raw| StateTree::parse(&raw));

    let legacy_content = LEGACY_CHAPTER_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .and_then(|value| {
            value
                .get("content")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|content| !content.is_empty())
                .map(str::to_string)
        });

    let fallback_html = [
        ".chapter-content",
        ".reader-content",
        ".prose",
        r#"[class*="content"]"#,
        "article",
        "main",
    ]
    .iter()
    .find_map(|css| {
        dom::first_inner_html(&doc, &dom::selector(css)).filter(|content| content.len() > 100)
    });

    ChapterPage {
        state,
        legacy_content,
        fallback_html,
    }
}

/// blob 占位按出现顺序替换；附件耗尽时沿用最后一个
fn replace_blob_sources(html: &str, urls: &[String]) -> String {
    use std::cell::Cell;

    let mut output = String::new();
    let index = Cell::new(0usize);
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("img[src]", |el| {
                let src = el.get_attribute("src").unwrap_or_default();
                if src.trim().to_lowercase().starts_with("blob:") {
                    let position = index.get();
                    let replacement = urls.get(position).or_else(|| urls.last());
                    if let Some(replacement) = replacement {
                        el.set_attribute("src", replacement).ok();
                        index.set(position + 1);
                    }
                }
                Ok(())
            })],
            ..lol_html::Settings::default()
        },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    if rewriter.write(html.as_bytes()).is_err() {
        return html.to_string();
    }
    if rewriter.end().is_err() {
        return html.to_string();
    }
    output
}

// ============================================================================
// 取值辅助
// ============================================================================

/// 本地化字符串：裸字符串或 {ru, en, original, name} 对象
fn localized(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => api::normalize_id(Some(text.as_str())),
        Value::Object(map) => ["ru", "en", "original", "name"].iter().find_map(|key| {
            api::normalize_id(map.get(*key).and_then(Value::as_str))
        }),
        _ => None,
    }
}

fn map_status(status: Option<&str>) -> Option<NovelStatus> {
    let status = status?.trim();
    if status.is_empty() {
        return None;
    }
    Some(match status.to_uppercase().as_str() {
        "ONGOING" | "INPROGRESS" => NovelStatus::Ongoing,
        "DONE" | "COMPLETED" => NovelStatus::Completed,
        "HIATUS" | "PAUSED" | "FROZEN" => NovelStatus::OnHiatus,
        "CANCELLED" | "DROPPED" => NovelStatus::Cancelled,
        _ => NovelStatus::Unknown,
    })
}

fn extract_author(relations: &[api::BookRelation]) -> Option<String> {
    relations
        .iter()
        .find(|relation| relation.kind.as_deref() == Some("AUTHOR"))
        .and_then(|relation| relation.publisher.as_ref())
        .and_then(|publisher| api::normalize_id(publisher.name.as_deref()))
}

fn extract_genres(labels: &[api::BookLabel]) -> Option<String> {
    let names: Vec<String> = labels
        .iter()
        .filter_map(|label| api::normalize_id(label.name.as_deref()))
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

fn normalize_rating(rating: Option<f64>) -> Option<f64> {
    let rating = rating.filter(|r| r.is_finite())?;
    Some(if rating > 5.0 { rating / 2.0 } else { rating })
}

fn extract_slug(novel_path: &str) -> Option<String> {
    let clean = novel_path.split('?').next().unwrap_or_default();
    SLUG_RE
        .captures(clean)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_chapter_id(chapter_path: &str) -> Option<String> {
    let clean = chapter_path
        .split('?')
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let last = clean.rsplit('/').find(|segment| !segment.is_empty())?;
    UUID_RE.is_match(last).then(|| last.to_string())
}

/// 章节显示名："Том X - Глава Y - 名称"，全部缺失时退化为序号
fn build_chapter_name(chapter: &RawChapter, fallback_number: usize) -> String {
    let volume = reconcile::numeric(chapter.volume.as_ref());
    let number = reconcile::numeric(chapter.number.as_ref());
    let title = chapter
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    let mut parts: Vec<String> = Vec::new();
    if volume > 0.0 {
        parts.push(format!("Том {}", format_number(volume)));
    }
    if number > 0.0 {
        parts.push(format!("Глава {}", format_number(number)));
    }
    if !title.is_empty() {
        parts.push(title.to_string());
    }

    if parts.is_empty() {
        format!("Глава {}", fallback_number)
    } else {
        parts.join(" - ")
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn format_release(created_at: &str) -> Option<String> {
    chrono::DateTime::parse_from_rfc3339(created_at.trim())
        .ok()
        .map(|dt| dt.format("%B %-d, %Y %H:%M").to_string())
}

fn append_array_filter(query: &mut Vec<(String, String)>, key: &str, values: &[String]) {
    for value in values {
        let value = value.trim();
        if !value.is_empty() {
            query.push((key.to_string(), value.to_string()));
        }
    }
}

fn set_numeric_filter(query: &mut Vec<(String, String)>, key: &str, value: Option<&str>) {
    static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").unwrap());
    if let Some(value) = value {
        let value = value.trim();
        if NUMERIC_RE.is_match(value) {
            query.push((key.to_string(), value.to_string()));
        }
    }
}
