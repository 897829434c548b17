//! 小说列表扫描 (Novel List Scanner)
//!
//! 列表页与搜索结果共用同一状态机。"当前小说"累加器在检测到新的识别性
//! 字段（封面、或 名称+路径 对）且累加器已持有完整记录时冲刷，避免相邻
//! 两条记录的字段互相渗透。

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::{HtmlRewriter, Settings, element, text};
use url::Url;

use crate::core::model::NovelItem;
use crate::scan::{ScanState, StateStack};

/// 进入列表区域的判定
fn enters_novel_list(class: &str, id: &str) -> bool {
    class.contains("archive")
        || class == "col-content"
        || class.contains("ul-list1")
        || id == "list-page"
}

/// 进入状态徽标的判定
fn enters_status(class: &str) -> bool {
    class.contains("s2") || class.contains("full")
}

/// 进入章节计数徽标的判定
fn enters_chapter_badge(class: &str) -> bool {
    class.contains("s3")
        || class.contains("s1")
        || class.contains("chapter")
        || class.contains("chr-text")
}

/// 状态徽标关闭判定：结构角色匹配，不要求同名标签
fn closes_badge(tag: &str) -> bool {
    matches!(tag, "span" | "a" | "div")
}

#[derive(Default)]
struct CurrentNovel {
    name: Option<String>,
    path: Option<String>,
    cover: Option<String>,
    status: Option<String>,
    chapters: Option<String>,
}

impl CurrentNovel {
    fn has_identity(&self) -> bool {
        self.name.as_deref().is_some_and(|s| !s.is_empty())
            && self.path.as_deref().is_some_and(|s| !s.is_empty())
    }
}

struct ListScanner {
    stack: StateStack,
    current: CurrentNovel,
    novels: Vec<NovelItem>,
    base: Url,
}

impl ListScanner {
    fn new(base: Url) -> Self {
        Self {
            stack: StateStack::new(),
            current: CurrentNovel::default(),
            novels: Vec::new(),
            base,
        }
    }

    /// 冲刷累加器：完整记录入列，不完整记录丢弃
    fn flush(&mut self) {
        let current = std::mem::take(&mut self.current);
        if let (Some(name), Some(path)) = (current.name, current.path) {
            if name.is_empty() || path.is_empty() {
                return;
            }
            let mut display = name;
            let extras: Vec<&str> = [current.status.as_deref(), current.chapters.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if !extras.is_empty() {
                display = format!("{} ({})", display, extras.join(", "));
            }
            self.novels.push(NovelItem {
                name: display,
                path,
                cover: current.cover,
            });
        }
    }

    fn on_open(
        &mut self,
        tag: &str,
        class: &str,
        id: &str,
        href: Option<&str>,
        title: Option<&str>,
        cover: Option<&str>,
    ) {
        let state = self.stack.current();

        if state == ScanState::Idle && enters_novel_list(class, id) {
            self.stack.push(ScanState::NovelList);
        }

        if self.stack.current() == ScanState::Idle {
            return;
        }

        if tag == "img"
            && let Some(cover) = cover
            && !cover.contains("icon")
        {
            if self.current.has_identity() {
                self.flush();
            }
            if let Ok(absolute) = self.base.join(cover) {
                self.current.cover = Some(absolute.to_string());
            }
        }

        if tag == "h3" {
            self.stack.push(ScanState::NovelName);
        }

        if state == ScanState::NovelName
            && tag == "a"
            && let Some(href) = href
        {
            if self.current.has_identity() {
                self.flush();
            }
            if let Ok(absolute) = self.base.join(href) {
                self.current.path = Some(absolute.path().trim_start_matches('/').to_string());
                self.current.name = Some(title.unwrap_or_default().to_string());
            }
        }

        if enters_status(class) {
            self.stack.push(ScanState::Status);
        } else if enters_chapter_badge(class) {
            self.stack.push(ScanState::Chapter);
        }
    }

    fn on_text(&mut self, data: &str) {
        let text = data.trim();
        if text.is_empty() {
            return;
        }

        match self.stack.current() {
            ScanState::NovelName => {
                if self.current.name.as_deref().unwrap_or_default().is_empty() {
                    self.current.name = Some(text.to_string());
                }
            }
            ScanState::Status => {
                let lower = text.to_lowercase();
                if lower.contains("full") || lower.contains("completed") {
                    self.current.status = Some("Completed".to_string());
                }
            }
            ScanState::Chapter => {
                let starts_numeric = text.chars().next().is_some_and(|c| c.is_ascii_digit());
                if text.to_lowercase().contains("chapter") || (starts_numeric && text.len() < 10) {
                    self.current.chapters = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    fn on_close(&mut self, tag: &str) {
        match self.stack.current() {
            ScanState::NovelName if tag == "h3" => self.stack.pop(),
            ScanState::Status | ScanState::Chapter if closes_badge(tag) => self.stack.pop(),
            _ => {}
        }
    }
}

/// 扫描列表页，产出通过完整性检查的小说记录
pub fn parse_novel_list(html: &str, base: &Url) -> Vec<NovelItem> {
    let scanner = Rc::new(RefCell::new(ListScanner::new(base.clone())));
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
                    let cover = el
                        .get_attribute("data-src")
                        .or_else(|| el.get_attribute("data-cfsrc"))
                        .or_else(|| el.get_attribute("src"));

                    open_scanner.borrow_mut().on_open(
                        &tag,
                        &class,
                        &id,
                        href.as_deref(),
                        title.as_deref(),
                        cover.as_deref(),
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

    let mut scanner = scanner.borrow_mut();
    scanner.flush();
    std::mem::take(&mut scanner.novels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://freewebnovel.com/").unwrap()
    }

    #[test]
    fn single_entry_with_status_badge() {
        let html = r#"<div class="ul-list1"><h3><a href="/n/123" title="Foo">X</a></h3><span class="s2">Completed</span></div>"#;
        let novels = parse_novel_list(html, &base());
        assert_eq!(novels.len(), 1);
        assert_eq!(novels[0].name, "Foo (Completed)");
        assert_eq!(novels[0].path, "n/123");
    }

    #[test]
    fn adjacent_entries_do_not_bleed() {
        let html = r#"
            <div class="ul-list1">
              <div class="item">
                <img data-src="/img/a.jpg"/>
                <h3><a href="/n/1" title="Alpha">Alpha</a></h3>
                <span class="s2">Completed</span>
              </div>
              <div class="item">
                <img data-src="/img/b.jpg"/>
                <h3><a href="/n/2" title="Beta">Beta</a></h3>
                <span class="s3">Chapter 42</span>
              </div>
            </div>"#;
        let novels = parse_novel_list(html, &base());
        assert_eq!(novels.len(), 2);
        assert_eq!(novels[0].name, "Alpha (Completed)");
        assert_eq!(novels[0].cover.as_deref(), Some("https://freewebnovel.com/img/a.jpg"));
        assert_eq!(novels[1].name, "Beta (Chapter 42)");
        assert_eq!(novels[1].cover.as_deref(), Some("https://freewebnovel.com/img/b.jpg"));
    }

    #[test]
    fn records_without_path_are_dropped() {
        let html = r#"<div class="ul-list1"><h3><a title="No Link">No Link</a></h3></div>"#;
        assert!(parse_novel_list(html, &base()).is_empty());
    }

    #[test]
    fn icon_images_are_not_covers() {
        let html = r#"<div class="ul-list1"><img src="/static/icon-star.png"/><h3><a href="/n/9" title="Nine">N</a></h3></div>"#;
        let novels = parse_novel_list(html, &base());
        assert_eq!(novels.len(), 1);
        assert!(novels[0].cover.is_none());
    }

    #[test]
    fn outside_list_region_nothing_is_captured() {
        let html = r#"<div class="footer"><h3><a href="/n/5" title="Nope">Nope</a></h3></div>"#;
        assert!(parse_novel_list(html, &base()).is_empty());
    }

    #[test]
    fn name_falls_back_to_anchor_text() {
        let html = r#"<div id="list-page"><h3><a href="/n/7">Seventh</a></h3></div>"#;
        let novels = parse_novel_list(html, &base());
        assert_eq!(novels.len(), 1);
        assert_eq!(novels[0].name, "Seventh");
    }
}
