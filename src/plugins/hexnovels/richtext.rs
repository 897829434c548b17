//! 富文本渲染 (Rich Content Rendering)
//!
//! 阅读器章节内容是一棵节点树（段落/文本/标记/插图）。渲染为 HTML 时，
//! 插图节点经回调解析为附件 URL；无法解析时回退节点自带的 `src`
//! （通常是 `blob:` 占位），留待后续按位置替换或原样保留。

use serde_json::Value;

use crate::scan::escape_text;

/// 收集内容树中引用的全部插图 id（去重、保序）
pub fn collect_image_ids(content: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    walk_image_ids(content, &mut ids);
    ids
}

fn walk_image_ids(value: &Value, ids: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk_image_ids(item, ids);
            }
        }
        Value::Object(map) => {
            if let Some(attrs @ Value::Object(_)) = map.get("attrs") {
                for id in extract_image_ids(attrs) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            if let Some(content) = map.get("content") {
                walk_image_ids(content, ids);
            }
        }
        _ => {}
    }
}

/// 节点 attrs 中的插图 id（image / id / images[]）
pub fn extract_image_ids(attrs: &Value) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut push = |value: Option<&Value>| {
        if let Some(id) = value.and_then(Value::as_str) {
            let id = id.trim();
            if !id.is_empty() && !ids.iter().any(|known| known == id) {
                ids.push(id.to_string());
            }
        }
    };

    push(attrs.get("image"));
    push(attrs.get("id"));
    if let Some(Value::Array(images)) = attrs.get("images") {
        for image in images {
            push(Some(image));
        }
    }

    ids
}

/// 渲染内容树；`resolve_images` 以节点 attrs 换取插图 URL 列表
pub fn render(content: &Value, resolve_images: &dyn Fn(&Value) -> Vec<String>) -> String {
    let mut out = String::new();
    render_node(content, &mut out, resolve_images);
    out
}

fn render_children(node: &Value, out: &mut String, resolve: &dyn Fn(&Value) -> Vec<String>) {
    if let Some(Value::Array(children)) = node.get("content") {
        for child in children {
            render_node(child, out, resolve);
        }
    }
}

fn render_wrapped(
    node: &Value,
    tag: &str,
    out: &mut String,
    resolve: &dyn Fn(&Value) -> Vec<String>,
) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    render_children(node, out, resolve);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn render_node(node: &Value, out: &mut String, resolve: &dyn Fn(&Value) -> Vec<String>) {
    let kind = node.get("type").and_then(Value::as_str).unwrap_or("");

    match kind {
        "doc" => render_children(node, out, resolve),
        "paragraph" => render_wrapped(node, "p", out, resolve),
        "blockquote" => render_wrapped(node, "blockquote", out, resolve),
        "bulletList" | "bullet_list" => render_wrapped(node, "ul", out, resolve),
        "orderedList" | "ordered_list" => render_wrapped(node, "ol", out, resolve),
        "listItem" | "list_item" => render_wrapped(node, "li", out, resolve),
        "heading" => {
            let level = node
                .get("attrs")
                .and_then(|attrs| attrs.get("level"))
                .and_then(Value::as_u64)
                .unwrap_or(2)
                .clamp(1, 6);
            let tag = format!("h{}", level);
            render_wrapped(node, &tag, out, resolve);
        }
        "hardBreak" | "hard_break" => out.push_str("<br/>"),
        "horizontalRule" | "horizontal_rule" => out.push_str("<hr/>"),
        "text" => render_text(node, out),
        "image" => render_image(node, out, resolve),
        _ => render_children(node, out, resolve),
    }
}

fn render_text(node: &Value, out: &mut String) {
    let text = node.get("text").and_then(Value::as_str).unwrap_or("");
    if text.is_empty() {
        return;
    }

    let mut open = String::new();
    let mut close = String::new();
    if let Some(Value::Array(marks)) = node.get("marks") {
        for mark in marks {
            let mark_kind = mark.get("type").and_then(Value::as_str).unwrap_or("");
            match mark_kind {
                "bold" | "strong" => wrap(&mut open, &mut close, "strong"),
                "italic" | "em" => wrap(&mut open, &mut close, "em"),
                "underline" => wrap(&mut open, &mut close, "u"),
                "strike" | "strikethrough" => wrap(&mut open, &mut close, "s"),
                "link" => {
                    let href = mark
                        .get("attrs")
                        .and_then(|attrs| attrs.get("href"))
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    open.push_str(&format!("<a href=\"{}\">", href.replace('"', "&quot;")));
                    close.insert_str(0, "</a>");
                }
                _ => {}
            }
        }
    }

    out.push_str(&open);
    out.push_str(&escape_text(text));
    out.push_str(&close);
}

fn wrap(open: &mut String, close: &mut String, tag: &str) {
    open.push_str(&format!("<{}>", tag));
    close.insert_str(0, &format!("</{}>", tag));
}

fn render_image(node: &Value, out: &mut String, resolve: &dyn Fn(&Value) -> Vec<String>) {
    let attrs = node.get("attrs").cloned().unwrap_or(Value::Null);

    let urls = resolve(&attrs);
    if !urls.is_empty() {
        for url in urls {
            out.push_str(&format!("<img src=\"{}\"/>", url.replace('"', "&quot;")));
        }
        return;
    }

    // 未解析到附件：保留节点自带来源（可能是 blob: 占位）
    if let Some(src) = attrs.get("src").and_then(Value::as_str)
        && !src.is_empty()
    {
        out.push_str(&format!("<img src=\"{}\"/>", src.replace('"', "&quot;")));
    }
}
