//! Rulate 多源模板
//!
//! 两个站点实例（rulate / erolate）共用模板，章节表结构按实例分派。
//! 成人内容确认插页通过重定向后 URL 探测：命中即提交确认表单，
//! 用第二次响应继续解析。搜索走 JSON 自动补全接口。

use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use scraper::Html;
use serde::Deserialize;
use url::Url;

use crate::core::config::SiteConfig;
use crate::core::error::Result;
use crate::core::filter::{Filter, FilterOption, Filters, PopularOptions};
use crate::core::model::{ChapterItem, NovelItem, NovelStatus, SourceNovel};
use crate::dom;
use crate::network::{FetchRequest, Fetcher, SiteClient};
use crate::plugins::{PluginMeta, SourcePlugin};

/// 站点实例
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteVariant {
    Rulate,
    Erolate,
}

pub struct RulateMeta {
    pub id: &'static str,
    pub name: &'static str,
    pub site: &'static str,
}

impl RulateMeta {
    pub fn rulate() -> Self {
        Self {
            id: "rulate",
            name: "Rulate",
            site: "https://tl.rulate.ru/",
        }
    }

    pub fn erolate() -> Self {
        Self {
            id: "erolate",
            name: "Erolate",
            site: "https://erolate.com/",
        }
    }
}

/// 自动补全记录
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AutocompleteItem {
    title_one: String,
    title_two: String,
    url: String,
    img: String,
}

pub struct Rulate {
    meta: PluginMeta,
    base: Url,
    variant: SiteVariant,
    client: SiteClient,
}

impl Rulate {
    pub fn new(meta: RulateMeta, config: SiteConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let base_url = config.base_url.as_deref().unwrap_or(meta.site);
        let base = Url::parse(base_url).expect("Invalid base URL");

        let variant = if meta.id == "rulate" {
            SiteVariant::Rulate
        } else {
            SiteVariant::Erolate
        };

        let headers = vec![("Referer".to_string(), base.to_string())];

        Self {
            meta: PluginMeta {
                id: meta.id.into(),
                name: meta.name.into(),
                site: base.to_string(),
                lang: "ru".into(),
                version: "1.0.2".into(),
            },
            client: SiteClient::new(fetcher).with_headers(headers),
            base,
            variant,
        }
    }

    fn absolute(&self, path: &str) -> String {
        self.base
            .join(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base, path.trim_start_matches('/')))
    }

    /// 取页面正文；命中成人内容插页时提交确认表单后重取
    async fn get_page_through_interstitial(&self, path: &str) -> Result<String> {
        let url = self.absolute(path);
        let mut response = self.client.get(&url).await?;

        if response.url.contains("mature?path=") {
            let confirm = FetchRequest::post_form(
                response.url.clone(),
                vec![
                    ("path".to_string(), path.to_string()),
                    ("ok".to_string(), "Да".to_string()),
                ],
            );
            response = self.client.execute(confirm).await?;
        }

        if !response.ok() {
            return Err(crate::core::error::PluginError::status(response.status, &url));
        }
        Ok(response.text())
    }

    fn parse_search_results(&self, html: &str) -> Vec<NovelItem> {
        let doc = Html::parse_document(html);
        let item_sel = dom::selector(r#"ul.search-results > li:not(.ad_type_catalog)"#);
        let link_sel = dom::selector("p > a");
        let img_sel = dom::selector("img");

        doc.select(&item_sel)
            .filter_map(|item| {
                let link = item.select(&link_sel).next()?;
                let name = dom::collect_text(&link);
                let path = link.value().attr("href")?.to_string();
                let cover = item
                    .select(&img_sel)
                    .next()
                    .and_then(|img| img.value().attr("src"))
                    .map(|src| self.absolute(src));

                let novel = NovelItem { name, path, cover };
                novel.is_valid().then_some(novel)
            })
            .collect()
    }

    fn parse_detail(&self, html: &str, novel_path: &str) -> SourceNovel {
        let doc = Html::parse_document(html);

        let mut name = dom::first_text(&doc, &dom::selector(".span8 > h1, .book__title"))
            .unwrap_or_default();
        // 标题尾部的标签方括号不属于书名
        if let Some(cut) = name.find('[') {
            name = name[..cut].trim().to_string();
        }

        let mut novel = SourceNovel {
            path: novel_path.to_string(),
            name,
            cover: dom::first_attr(
                &doc,
                &dom::selector(r#"div.images > div img, .book__cover > img"#),
                "src",
            )
            .map(|src| self.absolute(&src)),
            summary: dom::first_text(
                &doc,
                &dom::selector("#Info > div:nth-child(4) > p:nth-child(1), .book__description"),
            ),
            ..Default::default()
        };

        let mut genres: Vec<String> = Vec::new();
        let row_sel = dom::selector("div.span5 > p");
        let strong_sel = dom::selector("strong");
        let em_link_sel = dom::selector("em > a");
        let em_sel = dom::selector("em");

        for row in doc.select(&row_sel) {
            let key = row
                .select(&strong_sel)
                .next()
                .map(|el| dom::collect_text(&el))
                .unwrap_or_default();
            match key.as_str() {
                "Автор:" => {
                    novel.author = row
                        .select(&em_link_sel)
                        .next()
                        .map(|el| dom::collect_text(&el))
                        .filter(|author| !author.is_empty());
                }
                "Выпуск:" => {
                    let value = row
                        .select(&em_sel)
                        .next()
                        .map(|el| dom::collect_text(&el))
                        .unwrap_or_default();
                    novel.status = if value == "продолжается" {
                        NovelStatus::Ongoing
                    } else {
                        NovelStatus::Completed
                    };
                }
                "Тэги:" | "Жанры:" => {
                    for genre in row.select(&em_link_sel) {
                        let genre = dom::collect_text(&genre);
                        if !genre.is_empty() {
                            genres.push(genre);
                        }
                    }
                }
                _ => {}
            }
        }
        if !genres.is_empty() {
            genres.reverse();
            novel.genres = Some(genres.join(","));
        }

        novel.chapters = match self.variant {
            SiteVariant::Rulate => self.parse_chapter_table(&doc),
            SiteVariant::Erolate => self.parse_chapter_links(&doc),
        };
        novel
    }

    /// rulate 实例：表格行，跳过未发布章节
    fn parse_chapter_table(&self, doc: &Html) -> Vec<ChapterItem> {
        let row_sel = dom::selector("table > tbody > tr.chapter_row");
        let link_sel = dom::selector(r#"td.t > a"#);
        let date_sel = dom::selector("td > span[title]");
        let disabled_sel = dom::selector(r#"td > span.disabled"#);

        doc.select(&row_sel)
            .enumerate()
            .filter_map(|(index, row)| {
                if row.select(&disabled_sel).next().is_some() {
                    return None;
                }
                let link = row.select(&link_sel).next()?;
                let path = link.value().attr("href")?.to_string();
                let release = row
                    .select(&date_sel)
                    .next()
                    .and_then(|el| el.value().attr("title"))
                    .map(str::trim)
                    .filter(|date| !date.is_empty())?;

                Some(ChapterItem {
                    name: dom::collect_text(&link),
                    path,
                    release_time: parse_russian_datetime(release),
                    chapter_number: Some(index as u32 + 1),
                    ..Default::default()
                })
            })
            .collect()
    }

    /// erolate 实例：链接列表，跳过付费章节
    fn parse_chapter_links(&self, doc: &Html) -> Vec<ChapterItem> {
        let link_sel = dom::selector("a.chapter");
        let name_sel = dom::selector("div:nth-child(1) > span:nth-child(2)");
        let paid_sel = dom::selector(r#"span[data-can-buy="true"]"#);

        doc.select(&link_sel)
            .enumerate()
            .filter_map(|(index, link)| {
                if link.select(&paid_sel).next().is_some() {
                    return None;
                }
                let path = link.value().attr("href")?.to_string();
                let name = link
                    .select(&name_sel)
                    .next()
                    .map(|el| dom::collect_text(&el))
                    .unwrap_or_default();

                Some(ChapterItem {
                    name,
                    path,
                    chapter_number: Some(index as u32 + 1),
                    ..Default::default()
                })
            })
            .collect()
    }
}

#[async_trait]
impl SourcePlugin for Rulate {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    fn filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert(
            "sort".into(),
            Filter::Picker {
                label: "Сортировка".into(),
                default: "6".into(),
                options: vec![
                    FilterOption::new("По рейтингу", "6"),
                    FilterOption::new("По дате обновления", "4"),
                    FilterOption::new("По просмотрам", "2"),
                ],
            },
        );
        filters.insert(
            "type".into(),
            Filter::Picker {
                label: "Тип перевода".into(),
                default: "0".into(),
                options: vec![
                    FilterOption::new("Любой", "0"),
                    FilterOption::new("Перевод", "1"),
                    FilterOption::new("Авторский", "2"),
                ],
            },
        );
        filters.insert(
            "adult".into(),
            Filter::Picker {
                label: "Возрастной рейтинг".into(),
                default: "0".into(),
                options: vec![
                    FilterOption::new("Любой", "0"),
                    FilterOption::new("Без эротики", "1"),
                    FilterOption::new("С эротикой", "2"),
                ],
            },
        );
        filters
    }

    async fn list_popular(&self, page: u32, options: &PopularOptions) -> Result<Vec<NovelItem>> {
        let filters = &options.filters;
        let sort = if options.show_latest {
            "4"
        } else {
            filters.text("sort").unwrap_or("6")
        };

        let mut url = format!(
            "{}search?t=&cat={}&s_lang={}&t_lang={}&type={}&sort={}&atmosphere={}&adult={}",
            self.base,
            filters.text("cat").unwrap_or("0"),
            filters.text("s_lang").unwrap_or("0"),
            filters.text("t_lang").unwrap_or("0"),
            filters.text("type").unwrap_or("0"),
            sort,
            filters.text("atmosphere").unwrap_or("0"),
            filters.text("adult").unwrap_or("0"),
        );
        for value in filters.multi("genres") {
            url.push_str(&format!(
                "&genres[]={}",
                utf8_percent_encode(value, NON_ALPHANUMERIC)
            ));
        }
        url.push_str(&format!("&Book_page={}", page));

        let html = self.client.get_text(&url).await?;
        Ok(self.parse_search_results(&html))
    }

    async fn fetch_detail(&self, novel_path: &str) -> Result<SourceNovel> {
        let html = self.get_page_through_interstitial(novel_path).await?;
        Ok(self.parse_detail(&html, novel_path))
    }

    async fn fetch_chapter(&self, chapter_path: &str) -> Result<String> {
        let html = self.get_page_through_interstitial(chapter_path).await?;
        let doc = Html::parse_document(&html);
        Ok(dom::first_inner_html(
            &doc,
            &dom::selector(".content-text, #read-text, .entry-content, .b-chapter-text"),
        )
        .unwrap_or_default())
    }

    async fn search(&self, term: &str, _page: u32) -> Result<Vec<NovelItem>> {
        let url = format!(
            "{}search/autocomplete?query={}",
            self.base,
            utf8_percent_encode(term, NON_ALPHANUMERIC)
        );
        let items: Vec<AutocompleteItem> = self.client.get_json(&url).await?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                if item.url.is_empty() {
                    return None;
                }
                let cover = (!item.img.is_empty()).then(|| self.absolute(&item.img));
                Some(NovelItem {
                    name: format!("{} / {}", item.title_one, item.title_two),
                    path: item.url,
                    cover,
                })
            })
            .collect())
    }
}

/// `12 янв. 2026 г. 15:30` 形式的日期
fn parse_russian_datetime(date_text: &str) -> Option<String> {
    let parts: Vec<&str> = date_text.split_whitespace().collect();
    if parts.len() >= 5
        && let Ok(day) = parts[0].parse::<u32>()
        && let Some(month) = russian_month_abbrev(parts[1])
        && let Ok(year) = parts[2].parse::<i32>()
        && let Ok(time) = chrono::NaiveTime::parse_from_str(parts[4], "%H:%M")
        && let Some(date) = chrono::NaiveDate::from_ymd_opt(year, month, day)
    {
        let stamp = date.and_time(time);
        return Some(stamp.format("%B %-d, %Y %H:%M").to_string());
    }
    Some(date_text.to_string()).filter(|s| !s.is_empty())
}

fn russian_month_abbrev(month: &str) -> Option<u32> {
    Some(match month {
        "янв." => 1,
        "февр." => 2,
        "мар." => 3,
        "апр." => 4,
        "мая" => 5,
        "июн." => 6,
        "июл." => 7,
        "авг." => 8,
        "сент." => 9,
        "окт." => 10,
        "нояб." => 11,
        "дек." => 12,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PluginError;
    use crate::network::FetchResponse;

    struct NoFetch;

    #[async_trait]
    impl Fetcher for NoFetch {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
            Err(PluginError::Parse(format!("unexpected fetch: {}", request.url)))
        }
    }

    fn plugin(meta: RulateMeta) -> Rulate {
        Rulate::new(meta, SiteConfig::default(), Arc::new(NoFetch))
    }

    const DETAIL: &str = r#"
        <div class="span8"><h1>Герой поневоле [18+]</h1></div>
        <div class="images"><div><img src="/covers/1.jpg"></div></div>
        <div class="span5">
          <p><strong>Автор:</strong> <em><a>Иванов</a></em></p>
          <p><strong>Выпуск:</strong> <em>продолжается</em></p>
          <p><strong>Жанры:</strong> <em><a>фэнтези</a><a>боевик</a></em></p>
        </div>
        <table><tbody>
          <tr class="chapter_row">
            <td class="t"><a href="/book/1/ch1">Глава 1</a></td>
            <td><span title="12 янв. 2026 г. 10:00"></span></td>
          </tr>
          <tr class="chapter_row">
            <td class="t"><a href="/book/1/ch2">Глава 2</a></td>
            <td><span class="disabled" title="скоро"></span></td>
          </tr>
        </tbody></table>"#;

    #[test]
    fn detail_parses_and_skips_unreleased_rows() {
        let site = plugin(RulateMeta::rulate());
        let novel = site.parse_detail(DETAIL, "/book/1");

        assert_eq!(novel.name, "Герой поневоле");
        assert_eq!(novel.author.as_deref(), Some("Иванов"));
        assert_eq!(novel.status, NovelStatus::Ongoing);
        // 题材反转后拼接
        assert_eq!(novel.genres.as_deref(), Some("боевик,фэнтези"));

        assert_eq!(novel.chapters.len(), 1);
        assert_eq!(novel.chapters[0].name, "Глава 1");
        assert_eq!(novel.chapters[0].chapter_number, Some(1));
        assert_eq!(
            novel.chapters[0].release_time.as_deref(),
            Some("January 12, 2026 10:00")
        );
    }

    #[test]
    fn erolate_variant_skips_paid_chapters() {
        let html = r#"
            <a class="chapter" href="/c1"><div><span>№1</span><span>Первая</span></div></a>
            <a class="chapter" href="/c2"><div><span>№2</span><span>Вторая</span></div>
              <span data-can-buy="true">99 руб.</span></a>"#;
        let site = plugin(RulateMeta::erolate());
        let doc = Html::parse_document(html);
        let chapters = site.parse_chapter_links(&doc);

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].name, "Первая");
        assert_eq!(chapters[0].path, "/c1");
    }

    #[test]
    fn search_results_drop_items_without_link() {
        let html = r#"
            <ul class="search-results">
              <li><p><a href="/book/9">Девятая</a></p><img src="/i/9.jpg"></li>
              <li class="ad_type_catalog"><p><a href="/ad">Реклама</a></p></li>
              <li><p><a>Без ссылки</a></p></li>
            </ul>"#;
        let site = plugin(RulateMeta::rulate());
        let novels = site.parse_search_results(html);

        assert_eq!(novels.len(), 1);
        assert_eq!(novels[0].path, "/book/9");
        assert_eq!(
            novels[0].cover.as_deref(),
            Some("https://tl.rulate.ru/i/9.jpg")
        );
    }

    #[test]
    fn datetime_parse_and_passthrough() {
        assert_eq!(
            parse_russian_datetime("12 янв. 2026 г. 10:00").as_deref(),
            Some("January 12, 2026 10:00")
        );
        assert_eq!(
            parse_russian_datetime("когда-нибудь").as_deref(),
            Some("когда-нибудь")
        );
    }
}
