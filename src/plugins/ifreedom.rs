//! Ifreedom 多源模板
//!
//! 同一逻辑站点的两套布局（ifreedom / bookhamster），构造时按域名一次性
//! 选定 `SiteVariant`，其后全部走 match 分派，绝不混用。章节列表源侧
//! 为最新在前：`chapter_number = 总数 - 下标`，再整体反转为最旧在前。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use scraper::{Html, Selector};
use url::Url;

use crate::core::config::SiteConfig;
use crate::core::error::Result;
use crate::core::filter::{Filter, FilterOption, Filters, PopularOptions};
use crate::core::model::{ChapterItem, NovelItem, NovelStatus, SourceNovel};
use crate::dom;
use crate::network::{Fetcher, SiteClient};
use crate::plugins::{PluginMeta, SourcePlugin};

/// 站点皮肤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteVariant {
    Ifreedom,
    Bookhamster,
}

/// 多源实例元数据
pub struct IfreedomMeta {
    pub id: &'static str,
    pub name: &'static str,
    pub site: &'static str,
}

impl IfreedomMeta {
    pub fn ifreedom() -> Self {
        Self {
            id: "ifreedom",
            name: "Ifreedom",
            site: "https://ifreedom.su/",
        }
    }

    pub fn bookhamster() -> Self {
        Self {
            id: "bookhamster",
            name: "BookHamster",
            site: "https://bookhamster.ru/",
        }
    }
}

/// 列表页选择器组
struct ListSelectors {
    item: Selector,
    link: Selector,
    cover: Selector,
    title: Selector,
}

/// 详情页选择器组
struct DetailSelectors {
    name: Selector,
    cover: Selector,
    summary: Selector,
    genres: Selector,
    chapter_item: Selector,
    chapter_link: Selector,
    chapter_date: Selector,
}

pub struct Ifreedom {
    meta: PluginMeta,
    base: Url,
    variant: SiteVariant,
    client: SiteClient,
    list: ListSelectors,
    detail: DetailSelectors,
}

impl Ifreedom {
    pub fn new(meta: IfreedomMeta, config: SiteConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let base_url = config.base_url.as_deref().unwrap_or(meta.site);
        let base = Url::parse(base_url).expect("Invalid base URL");

        // 皮肤只在构造时判定一次
        let variant = if base.host_str().is_some_and(|host| host.contains("bookhamster.ru")) {
            SiteVariant::Bookhamster
        } else {
            SiteVariant::Ifreedom
        };

        let list = match variant {
            SiteVariant::Bookhamster => ListSelectors {
                item: dom::selector("div.one-book-home.rnew"),
                link: dom::selector(".img-home a"),
                cover: dom::selector(".img-home a img"),
                title: dom::selector(".title-home a"),
            },
            SiteVariant::Ifreedom => ListSelectors {
                item: dom::selector("div.item-book-slide"),
                link: dom::selector("a.link-book-slide"),
                cover: dom::selector(".block-book-slide-img img"),
                title: dom::selector(".block-book-slide-title"),
            },
        };
        let detail = match variant {
            SiteVariant::Bookhamster => DetailSelectors {
                name: dom::selector("h1.entry-title.ranobe"),
                cover: dom::selector(".ranobe-book .column1 .img-ranobe img"),
                summary: dom::selector("div.ranobe-desc, .entry-content"),
                genres: dom::selector(".data-ranobe .data-value a"),
                chapter_item: dom::selector(".li-ranobe"),
                chapter_link: dom::selector(".li-col1-ranobe a"),
                chapter_date: dom::selector(".li-col2-ranobe"),
            },
            SiteVariant::Ifreedom => DetailSelectors {
                name: dom::selector(".book-info > h1"),
                cover: dom::selector(".book-img.block-book-slide-img img"),
                summary: dom::selector(r#".tab-content [data-name="Описание"]"#),
                genres: dom::selector(".book-info .genreslist a"),
                chapter_item: dom::selector(r#".tab-content [data-name="Главы"] .chapterinfo"#),
                chapter_link: dom::selector("a"),
                chapter_date: dom::selector(".timechapter"),
            },
        };

        let headers = vec![(
            "Referer".to_string(),
            format!("{}vse-knigi/", base),
        )];

        Self {
            meta: PluginMeta {
                id: meta.id.into(),
                name: meta.name.into(),
                site: base.to_string(),
                lang: "ru".into(),
                version: "1.0.3".into(),
            },
            client: SiteClient::new(fetcher).with_headers(headers),
            base,
            variant,
            list,
            detail,
        }
    }

    fn site_relative(&self, href: &str) -> String {
        href.trim()
            .strip_prefix(self.base.as_str())
            .map(|tail| format!("/{}", tail.trim_start_matches('/')))
            .unwrap_or_else(|| href.trim().to_string())
    }

    fn parse_novel_list(&self, html: &str) -> Vec<NovelItem> {
        let doc = Html::parse_document(html);
        doc.select(&self.list.item)
            .filter_map(|item| {
                let link = item.select(&self.list.link).next()?;
                let href = link.value().attr("href").unwrap_or_default();
                let cover = item
                    .select(&self.list.cover)
                    .next()
                    .and_then(|img| img.value().attr("src"))
                    .map(str::to_string);
                let name = item
                    .select(&self.list.title)
                    .next()
                    .map(|el| dom::collect_text(&el))
                    .filter(|name| !name.is_empty())
                    .or_else(|| link.value().attr("title").map(str::to_string))
                    .unwrap_or_else(|| dom::collect_text(&link));

                let novel = NovelItem {
                    name,
                    path: self.site_relative(href),
                    cover,
                };
                novel.is_valid().then_some(novel)
            })
            .collect()
    }

    fn parse_detail(&self, html: &str, novel_path: &str) -> SourceNovel {
        let doc = Html::parse_document(html);
        let s = &self.detail;

        let mut novel = SourceNovel {
            path: novel_path.to_string(),
            name: dom::first_text(&doc, &s.name).unwrap_or_default(),
            cover: dom::first_attr(&doc, &s.cover, "src"),
            summary: dom::first_text(&doc, &s.summary),
            ..Default::default()
        };

        let genres: Vec<String> = doc
            .select(&s.genres)
            .map(|el| dom::collect_text(&el))
            .filter(|genre| !genre.is_empty())
            .collect();
        if !genres.is_empty() {
            novel.genres = Some(genres.join(","));
        }

        match self.variant {
            SiteVariant::Bookhamster => {
                for row in doc.select(&dom::selector(".data-ranobe")) {
                    let key = row
                        .select(&dom::selector(".data-key b"))
                        .next()
                        .map(|el| dom::collect_text(&el))
                        .unwrap_or_default();
                    let value = row
                        .select(&dom::selector(".data-value"))
                        .next()
                        .map(|el| dom::collect_text(&el))
                        .unwrap_or_default();

                    if key.contains("Автор")
                        && !value.is_empty()
                        && value != "Не указан"
                        && value != "Не указано"
                    {
                        novel.author = Some(value.clone());
                    }
                    if key.contains("Статус книги") && !value.is_empty() {
                        novel.status = if value.contains("завершен") {
                            NovelStatus::Completed
                        } else {
                            NovelStatus::Ongoing
                        };
                    }
                }
            }
            SiteVariant::Ifreedom => {
                let rows: Vec<String> = doc
                    .select(&dom::selector(".group-book-info-list .book-info-list"))
                    .map(|el| dom::collect_text(&el))
                    .collect();
                if let Some(author) = rows.get(1)
                    && !author.is_empty()
                    && author != "Не указан"
                {
                    novel.author = Some(author.clone());
                }
                if let Some(status_row) = rows.iter().find(|row| row.contains("Книга завершена")) {
                    novel.status = if status_row.contains("завершена") {
                        NovelStatus::Completed
                    } else {
                        NovelStatus::Ongoing
                    };
                }
            }
        }

        novel.chapters = self.parse_chapters(&doc);
        novel
    }

    /// 源侧最新在前；编号 `总数 - 下标`，随后反转为最旧在前
    fn parse_chapters(&self, doc: &Html) -> Vec<ChapterItem> {
        let s = &self.detail;
        let nodes: Vec<_> = doc.select(&s.chapter_item).collect();
        let total = nodes.len();

        let mut chapters: Vec<ChapterItem> = nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                let link = node.select(&s.chapter_link).next()?;
                let name = dom::collect_text(&link);
                let href = link.value().attr("href").unwrap_or_default();
                if name.is_empty() || href.is_empty() {
                    return None;
                }
                let date_text = node
                    .select(&s.chapter_date)
                    .next()
                    .map(|el| dom::collect_text(&el))
                    .unwrap_or_default();

                Some(ChapterItem {
                    name,
                    path: self.site_relative(href),
                    release_time: parse_russian_date(&date_text),
                    chapter_number: Some((total - index) as u32),
                    ..Default::default()
                })
            })
            .collect();

        chapters.reverse();
        chapters
    }
}

#[async_trait]
impl SourcePlugin for Ifreedom {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    fn filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert(
            "sort".into(),
            Filter::Picker {
                label: "Сортировка".into(),
                default: "По рейтингу".into(),
                options: vec![
                    FilterOption::new("По рейтингу", "По рейтингу"),
                    FilterOption::new("По дате обновления", "По дате обновления"),
                    FilterOption::new("По дате добавления", "По дате добавления"),
                ],
            },
        );
        filters.insert(
            "genre".into(),
            Filter::CheckboxGroup {
                label: "Жанры".into(),
                options: vec![
                    FilterOption::new("Боевик", "боевик"),
                    FilterOption::new("Драма", "драма"),
                    FilterOption::new("Фэнтези", "фэнтези"),
                ],
            },
        );
        filters
    }

    async fn list_popular(&self, page: u32, options: &PopularOptions) -> Result<Vec<NovelItem>> {
        let sort = if options.show_latest {
            "По дате обновления"
        } else {
            options.filters.text("sort").unwrap_or("По рейтингу")
        };

        let mut url = format!(
            "{}vse-knigi/?sort={}",
            self.base,
            utf8_percent_encode(sort, NON_ALPHANUMERIC)
        );
        for (key, values) in [("genre", options.filters.multi("genre"))] {
            for value in values {
                url.push_str(&format!(
                    "&{}[]={}",
                    key,
                    utf8_percent_encode(value, NON_ALPHANUMERIC)
                ));
            }
        }
        url.push_str(&format!("&bpage={}", page));

        let html = self.client.get_text(&url).await?;
        Ok(self.parse_novel_list(&html))
    }

    async fn fetch_detail(&self, novel_path: &str) -> Result<SourceNovel> {
        let url = self
            .base
            .join(novel_path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base, novel_path.trim_start_matches('/')));
        let html = self.client.get_text(&url).await?;
        Ok(self.parse_detail(&html, novel_path))
    }

    async fn fetch_chapter(&self, chapter_path: &str) -> Result<String> {
        let url = self
            .base
            .join(chapter_path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base, chapter_path.trim_start_matches('/')));
        let html = self.client.get_text(&url).await?;

        let content = {
            let doc = Html::parse_document(&html);
            let selectors: &[&str] = match self.variant {
                SiteVariant::Bookhamster => &["article .entry-content", ".entry-content"],
                SiteVariant::Ifreedom => &[".chapter-content"],
            };
            selectors
                .iter()
                .find_map(|css| dom::first_inner_html(&doc, &dom::selector(css)))
                .unwrap_or_default()
        };
        if content.is_empty() {
            return Ok(String::new());
        }

        let cleaned = dom::strip_elements(&content, &["script", "div.pc-adv", "div.mob-adv"]);
        Ok(dom::promote_srcset(&cleaned))
    }

    async fn search(&self, term: &str, page: u32) -> Result<Vec<NovelItem>> {
        let url = format!(
            "{}vse-knigi/?searchname={}&bpage={}",
            self.base,
            utf8_percent_encode(term, NON_ALPHANUMERIC),
            page
        );
        let html = self.client.get_text(&url).await?;
        Ok(self.parse_novel_list(&html))
    }
}

/// 俄文日期解析：`dd.mm.yyyy` 或 `21 декабря`（年份按当前年补齐）
fn parse_russian_date(date_text: &str) -> Option<String> {
    let date_text = date_text.trim();
    if date_text.is_empty() {
        return None;
    }

    if date_text.contains('.') {
        let mut parts = date_text.split('.');
        if let (Some(day), Some(month), Some(year)) = (parts.next(), parts.next(), parts.next())
            && let (Ok(day), Ok(month), Ok(year)) =
                (day.trim().parse::<u32>(), month.trim().parse::<u32>(), year.trim().parse::<i32>())
            && let Some(date) = chrono::NaiveDate::from_ymd_opt(year, month, day)
        {
            return Some(format_long_date(date));
        }
    } else if date_text.contains(' ') {
        let mut parts = date_text.split(' ');
        if let (Some(day), Some(month)) = (parts.next(), parts.next())
            && let Ok(day) = day.trim().parse::<u32>()
            && let Some(month) = russian_month(month.trim())
        {
            let year = chrono::Local::now().year();
            if let Some(date) = chrono::NaiveDate::from_ymd_opt(year, month, day) {
                return Some(format_long_date(date));
            }
        }
    }

    Some(date_text.to_string())
}

fn format_long_date(date: chrono::NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// 属格月份表
fn russian_month(month: &str) -> Option<u32> {
    Some(match month {
        "января" => 1,
        "февраля" => 2,
        "марта" => 3,
        "апреля" => 4,
        "мая" => 5,
        "июня" => 6,
        "июля" => 7,
        "августа" => 8,
        "сентября" => 9,
        "октября" => 10,
        "ноября" => 11,
        "декабря" => 12,
        _ => return None,
    })
}
