//! 小说详情扫描 (Novel Detail Scanner)
//!
//! 详情页状态机：封面区、简介区、信息区（作者/状态/题材）、章节列表。
//! 另含归档回退扫描器：主解析未得章节但捕获到内容 id 时，二次请求的
//! 扁平章节列表按出现顺序解析。

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::{HtmlRewriter, Settings, element, text};
use url::Url;

use crate::core::model::{ChapterItem, NovelStatus, SourceNovel};
use crate::scan::{ScanState, StateStack};

/// 详情扫描结果
pub struct DetailScan {
    pub novel: SourceNovel,
    /// 页面内捕获的内容 id，用于章节归档回退请求
    pub novel_id: Option<String>,
}

fn map_status(text: &str) -> NovelStatus {
    let lower = text.to_lowercase();
    if lower.contains("ongoing") {
        NovelStatus::Ongoing
    } else if lower.contains("hiatus") {
        NovelStatus::OnHiatus
    } else if lower.contains("completed") {
        NovelStatus::Completed
    } else {
        NovelStatus::Unknown
    }
}

struct DetailScanner {
    stack: StateStack,
    base: Url,
    name: Option<String>,
    cover: Option<String>,
    author: Option<String>,
    status: NovelStatus,
    summary_parts: Vec<String>,
    genres: Vec<String>,
    chapters: Vec<ChapterItem>,
    novel_id: Option<String>,
}

impl DetailScanner {
    fn new(base: Url) -> Self {
        Self {
            stack: StateStack::new(),
            base,
            name: None,
            cover: None,
            author: None,
            status: NovelStatus::Unknown,
            summary_parts: Vec::new(),
            genres: Vec::new(),
            chapters: Vec::new(),
            novel_id: None,
        }
    }

    fn site_relative(&self, href: &str) -> Option<String> {
        self.base
            .join(href)
            .ok()
            .map(|url| url.path().trim_start_matches('/').to_string())
    }

    #[allow(clippy::too_many_arguments)]
    fn on_open(
        &mut self,
        tag: &str,
        class: &str,
        id: &str,
        href: Option<&str>,
        title: Option<&str>,
        cover: Option<&str>,
        novel_id: Option<&str>,
    ) {
        let state = self.stack.current();

        match tag {
            "div" => {
                match class {
                    "books" | "m-imgtxt" => {
                        self.stack.push(ScanState::Cover);
                        return;
                    }
                    "inner" | "desc-text" => {
                        if state == ScanState::Cover {
                            self.stack.pop();
                        }
                        self.stack.push(ScanState::Summary);
                    }
                    _ => {}
                }
                if id == "rating" {
                    self.novel_id = novel_id.map(str::to_string);
                }
            }
            "img" => {
                if state == ScanState::Cover {
                    if let Some(cover) = cover
                        && let Ok(absolute) = self.base.join(cover)
                    {
                        self.cover = Some(absolute.to_string());
                    }
                    if let Some(title) = title {
                        self.name = Some(title.to_string());
                    }
                }
            }
            "h3" => {
                if state == ScanState::Cover {
                    self.stack.push(ScanState::NovelName);
                }
            }
            "br" => {
                if state == ScanState::Summary {
                    self.summary_parts.push("\n".to_string());
                }
            }
            "ul" => {
                if class.contains("info-meta") {
                    self.stack.push(ScanState::Info);
                } else if id == "idData" {
                    self.stack.push(ScanState::ChapterList);
                }
            }
            "a" => {
                if state == ScanState::Genres {
                    self.genres.push(title.unwrap_or_default().to_string());
                } else if state == ScanState::ChapterList
                    && let Some(href) = href
                    && let Some(path) = self.site_relative(href)
                {
                    self.chapters.push(ChapterItem {
                        name: title.unwrap_or_default().to_string(),
                        path,
                        ..Default::default()
                    });
                }
            }
            _ => {}
        }
    }

    fn on_text(&mut self, data: &str) {
        let text = data.trim();
        if text.is_empty() {
            return;
        }

        match self.stack.current() {
            ScanState::NovelName => {
                let mut name = self.name.take().unwrap_or_default();
                name.push_str(text);
                self.name = Some(name);
            }
            ScanState::Summary => {
                self.summary_parts.push(data.to_string());
            }
            ScanState::Info => {
                let lower = text.to_lowercase();
                if lower.contains("author:") {
                    self.stack.push(ScanState::Author);
                } else if lower.contains("status:") {
                    self.stack.push(ScanState::Status);
                } else if lower.contains("genre:") {
                    self.stack.push(ScanState::Genres);
                }
            }
            ScanState::Author => {
                self.author = Some(text.to_string());
                self.stack.pop();
            }
            ScanState::Status => {
                self.status = map_status(text);
                self.stack.pop();
            }
            _ => {}
        }
    }

    fn on_close(&mut self, tag: &str) {
        let state = self.stack.current();
        match tag {
            "div" if state == ScanState::Summary => self.stack.pop(),
            "h3" if state == ScanState::NovelName => self.stack.pop(),
            "ul" if matches!(
                state,
                ScanState::Info | ScanState::ChapterList | ScanState::Genres
            ) =>
            {
                self.stack.pop()
            }
            _ => {}
        }
    }

    fn finish(self, novel_path: &str) -> DetailScan {
        let summary = {
            let joined = self.summary_parts.join("\n");
            let trimmed = joined.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };
        let genres = (!self.genres.is_empty()).then(|| self.genres.join(", "));

        DetailScan {
            novel: SourceNovel {
                path: novel_path.to_string(),
                name: self.name.unwrap_or_default(),
                cover: self.cover,
                summary,
                author: self.author,
                status: self.status,
                genres,
                rating: None,
                chapters: self.chapters,
            },
            novel_id: self.novel_id,
        }
    }
}

/// 扫描详情页
pub fn parse_novel_detail(html: &str, base: &Url, novel_path: &str) -> DetailScan {
    let scanner = Rc::new(RefCell::new(DetailScanner::new(base.clone())));
    let open_scanner = scanner.clone();
    let close_scanner = scanner.clone();
    let text_scanner = scanner.clone();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("*", move |el| {
                    let tag = el.tag_name();
                    let class = el.get_attribute("class").unwrap_or_default();
                    let id = el.get_attribute("id").unwrap_or_default();
                    let href = el.get_attribute("href");
                    let title = el.get_attribute("title");
                    // 详情页封面优先取 src，与列表页顺序相反
                    let cover = el
                        .get_attribute("src")
                        .or_else(|| el.get_attribute("data-cfsrc"))
                        .or_else(|| el.get_attribute("data-src"));
                    let novel_id = el.get_attribute("data-novel-id");

                    open_scanner.borrow_mut().on_open(
                        &tag,
                        &class,
                        &id,
                        href.as_deref(),
                        title.as_deref(),
                        cover.as_deref(),
                        novel_id.as_deref(),
                    );

                    if let Some(handlers) = el.end_tag_handlers() {
                        let close_scanner = close_scanner.clone();
                        let handler: Box<
                            dyn FnOnce(&mut lol_html::html_content::EndTag) -> lol_html::HandlerResult,
                        > = Box::new(move |end| {
                            let name = end.name();
                            close_scanner.borrow_mut().on_close(&name);
                            Ok(())
                        });
                        handlers.push(handler);
                    }
                    Ok(())
                }),
                text!("*", move |chunk| {
                    text_scanner.borrow_mut().on_text(chunk.as_str());
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    if rewriter.write(html.as_bytes()).is_ok() {
        let _ = rewriter.end();
    }

    let mut inner = scanner.borrow_mut();
    std::mem::replace(&mut *inner, DetailScanner::new(base.clone())).finish(novel_path)
}

/// 归档回退扫描：扁平 `<a>` 章节列表，按出现顺序产出
pub fn parse_archive_chapters(html: &str, base: &Url) -> Vec<ChapterItem> {
    struct ArchiveScanner {
        stack: StateStack,
        base: Url,
        pending: Option<ChapterItem>,
        chapters: Vec<ChapterItem>,
    }

    impl ArchiveScanner {
        fn on_open(&mut self, tag: &str, href: Option<&str>, title: Option<&str>) {
            if tag == "a"
                && let Some(href) = href
                && let Ok(absolute) = self.base.join(href)
            {
                self.pending = Some(ChapterItem {
                    name: title.unwrap_or_default().to_string(),
                    path: absolute.path().trim_start_matches('/').to_string(),
                    ..Default::default()
                });
                self.stack.push(ScanState::Chapter);
            }
        }

        fn on_text(&mut self, data: &str) {
            if self.stack.current() == ScanState::Chapter
                && let Some(pending) = self.pending.as_mut()
                && pending.name.is_empty()
            {
                pending.name = data.trim().to_string();
            }
        }

        fn on_close(&mut self, tag: &str) {
            if tag == "a" && self.stack.current() == ScanState::Chapter {
                if let Some(pending) = self.pending.take()
                    && !pending.path.is_empty()
                {
                    self.chapters.push(pending);
                }
                self.stack.pop();
            }
        }
    }

    let scanner = Rc::new(RefCell::new(ArchiveScanner {
        stack: StateStack::new(),
        base: base.clone(),
        pending: None,
        chapters: Vec::new(),
    }));
    let open_scanner = scanner.clone();
    let close_scanner = scanner.clone();
    let text_scanner = scanner.clone();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("*", move |el| {
                    let tag = el.tag_name();
                    let href = el.get_attribute("href");
                    let title = el.get_attribute("title");
                    open_scanner
                        .borrow_mut()
                        .on_open(&tag, href.as_deref(), title.as_deref());

                    if let Some(handlers) = el.end_tag_handlers() {
                        let close_scanner = close_scanner.clone();
                        let handler: Box<
                            dyn FnOnce(&mut lol_html::html_content::EndTag) -> lol_html::HandlerResult,
                        > = Box::new(move |end| {
                            let name = end.name();
                            close_scanner.borrow_mut().on_close(&name);
                            Ok(())
                        });
                        handlers.push(handler);
                    }
                    Ok(())
                }),
                text!("*", move |chunk| {
                    text_scanner.borrow_mut().on_text(chunk.as_str());
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    if rewriter.write(html.as_bytes()).is_ok() {
        let _ = rewriter.end();
    }

    let mut scanner = scanner.borrow_mut();
    std::mem::take(&mut scanner.chapters)
}
