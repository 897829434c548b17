//! 章节正文扫描 (Chapter Content Scanner)
//!
//! 显式维护 `div`/`article` 嵌套深度以判定内容容器何时完全闭合。
//! Hidden 区域（广告、解锁提示）抑制输出但仍参与深度计数；
//! `script`/`style` 区域完全抑制。输出为逐字重建的 HTML 字符串：
//! 属性顺序保留、属性值双引号转义、文本实体转义。

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::{HtmlRewriter, Settings, element, text};
use regex::Regex;

use crate::scan::{ScanState, StateStack, escape_attr, escape_text};

/// 进入内容容器的判定
fn enters_content(class: &str, id: &str) -> bool {
    class.contains("txt") || id == "chr-content" || id == "chapter-content" || id == "article"
}

/// 进入 Hidden 区域的判定
fn enters_hidden(class: &str, id: &str) -> bool {
    class.contains("unlock-buttons") || class.contains("ads") || id.contains("ads")
}

fn tracks_depth(tag: &str) -> bool {
    matches!(tag, "div" | "article")
}

struct ContentScanner {
    stack: StateStack,
    depth: i32,
    out: String,
    scrub: Vec<Regex>,
}

impl ContentScanner {
    fn on_open(&mut self, tag: &str, class: &str, id: &str, attrs: &[(String, String)]) {
        let state = self.stack.current();

        match state {
            ScanState::Idle => {
                if enters_content(class, id) {
                    self.stack.push(ScanState::Chapter);
                    self.depth = if tracks_depth(tag) { 1 } else { 0 };
                }
            }
            ScanState::Chapter => {
                if tracks_depth(tag) {
                    self.depth += 1;
                }
                if enters_hidden(class, id) {
                    self.stack.push(ScanState::Hidden);
                } else if tag == "script" || tag == "style" {
                    self.stack.push(ScanState::Script);
                }
            }
            ScanState::Hidden => {
                if tracks_depth(tag) {
                    self.depth += 1;
                }
            }
            _ => {}
        }

        if self.stack.current() == ScanState::Chapter {
            self.out.push('<');
            self.out.push_str(tag);
            for (name, value) in attrs {
                self.out.push(' ');
                self.out.push_str(name);
                self.out.push_str("=\"");
                self.out.push_str(&escape_attr(value));
                self.out.push('"');
            }
            self.out.push('>');
        }
    }

    fn on_text(&mut self, data: &str) {
        if self.stack.current() != ScanState::Chapter {
            return;
        }
        let mut cleaned = data.to_string();
        for pattern in &self.scrub {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }
        self.out.push_str(&escape_text(&cleaned));
    }

    fn on_close(&mut self, tag: &str) {
        let state = self.stack.current();

        if state == ScanState::Chapter {
            self.out.push_str("</");
            self.out.push_str(tag);
            self.out.push('>');
        }

        if state == ScanState::Script && (tag == "script" || tag == "style") {
            self.stack.pop();
        }

        if (state == ScanState::Hidden || state == ScanState::Chapter) && tracks_depth(tag) {
            self.depth -= 1;
            if self.depth <= 0 {
                if state == ScanState::Hidden {
                    self.stack.pop();
                }
                self.stack.pop();
                self.stack.push(ScanState::Stopped);
            } else if state == ScanState::Hidden && self.depth == 1 {
                self.stack.pop();
            }
        }
    }
}

/// 扫描章节页面，重建内容容器的 HTML；未找到容器时返回空串
pub fn parse_chapter_content(html: &str, scrub: &[Regex]) -> String {
    let scanner = Rc::new(RefCell::new(ContentScanner {
        stack: StateStack::new(),
        depth: 0,
        out: String::new(),
        scrub: scrub.to_vec(),
    }));
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
                    let attrs: Vec<(String, String)> = el
                        .attributes()
                        .iter()
                        .map(|a| (a.name(), a.value()))
                        .collect();

                    open_scanner.borrow_mut().on_open(&tag, &class, &id, &attrs);

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
    std::mem::take(&mut scanner.out)
}
