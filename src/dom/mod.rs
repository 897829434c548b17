//! 树查询抓取 (Tree-Query Scraper)
//!
//! 针对结构良好的站点：整页解析为可查询文档，选择器逐级取值，
//! 取值全部带 trim，选择器落空时退化为 `None`/空而非报错。
//! 另提供基于 lol_html 的正文清理工具（元素剔除、srcset 提升）。

use lol_html::{HtmlRewriter, Settings, element};
use scraper::{ElementRef, Html, Selector};

/// 编译选择器；选择器均为编译期常量，非法即为编码错误
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector literal")
}

/// 文档内首个匹配元素
pub fn first<'a>(doc: &'a Html, sel: &Selector) -> Option<ElementRef<'a>> {
    doc.select(sel).next()
}

/// 首个匹配元素的 trim 文本，空文本视为缺失
pub fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    first(doc, sel).and_then(|el| non_empty(collect_text(&el)))
}

/// 首个匹配元素的属性值
pub fn first_attr(doc: &Html, sel: &Selector, attr: &str) -> Option<String> {
    first(doc, sel).and_then(|el| el.value().attr(attr).and_then(|v| non_empty(v.trim().to_string())))
}

/// 首个匹配元素的内部 HTML
pub fn first_inner_html(doc: &Html, sel: &Selector) -> Option<String> {
    first(doc, sel).map(|el| el.inner_html())
}

/// 元素文本聚合（trim 后）
pub fn collect_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

pub fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// 剔除匹配选择器的元素（含子树）
pub fn strip_elements(html: &str, selectors: &[&str]) -> String {
    let mut output = String::new();
    let handlers = selectors
        .iter()
        .map(|sel| {
            element!(*sel, |el| {
                el.remove();
                Ok(())
            })
        })
        .collect();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
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

/// 将 `srcset` 中最后一个 http 候选提升为 `src`
///
/// 响应式图片在阅读器内无意义，取最大候选即可。
pub fn promote_srcset(html: &str) -> String {
    let mut output = String::new();
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("img[srcset]", |el| {
                if let Some(srcset) = el.get_attribute("srcset") {
                    let best = srcset
                        .split_whitespace()
                        .filter(|part| part.starts_with("http"))
                        .next_back();
                    if let Some(best) = best {
                        el.set_attribute("src", best).ok();
                        el.remove_attribute("srcset");
                    }
                }
                Ok(())
            })],
            ..Settings::default()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_selector_degrades_to_none() {
        let doc = Html::parse_document("<div><p>hi</p></div>");
        let sel = selector("h1.title");
        assert_eq!(first_text(&doc, &sel), None);
        assert_eq!(first_attr(&doc, &sel, "href"), None);
    }

    #[test]
    fn text_and_attr_are_trimmed() {
        let doc = Html::parse_document(r#"<a class="x" href=" /n/1 ">  Foo  </a>"#);
        let sel = selector("a.x");
        assert_eq!(first_text(&doc, &sel).as_deref(), Some("Foo"));
        assert_eq!(first_attr(&doc, &sel, "href").as_deref(), Some("/n/1"));
    }

    #[test]
    fn strip_removes_subtrees() {
        let html = r#"<div><script>x()</script><div class="pc-adv"><b>ad</b></div><p>Body</p></div>"#;
        let cleaned = strip_elements(html, &["script", "div.pc-adv"]);
        assert!(cleaned.contains("<p>Body</p>"));
        assert!(!cleaned.contains("ad"));
        assert!(!cleaned.contains("x()"));
    }

    #[test]
    fn srcset_promotes_last_http_candidate() {
        let html = r#"<img srcset="https://a/1.jpg 1x, https://a/2.jpg 2x" alt="p">"#;
        let out = promote_srcset(html);
        assert!(out.contains(r#"src="https://a/2.jpg""#));
        assert!(!out.contains("srcset"));
    }
}
