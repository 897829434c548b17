//! HexNovels 目录 API (Catalog API)
//!
//! 除目录查询外均为尽力而为：失败退化为空数据，由调用方继续。

use std::collections::HashMap;

use indexmap::IndexMap;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::network::SiteClient;
use crate::reconcile::RawChapter;

/// 附件表：值可能是裸字符串（直接 URL）或对象
pub type AttachmentMap = IndexMap<String, Value>;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogBook {
    pub slug: Option<String>,
    pub poster: Option<String>,
    pub name: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BookData {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub poster: Option<String>,
    pub average_rating: Option<f64>,
    pub labels: Vec<BookLabel>,
    pub relations: Vec<BookRelation>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BookLabel {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BookRelation {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Publisher {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BranchData {
    pub id: Option<String>,
    pub publishers: Vec<Publisher>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ReaderChapter {
    pub content: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AttachmentRecord {
    pub id: Option<String>,
    pub image: Option<String>,
}

/// 空白归一化的标识符
pub fn normalize_id(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn encode(component: &str) -> String {
    utf8_percent_encode(component, NON_ALPHANUMERIC).to_string()
}

/// slug 反查书籍 id
pub async fn book_id_by_slug(client: &SiteClient, api: &Url, slug: &str) -> Option<String> {
    let slug = slug.trim();
    if slug.is_empty() {
        return None;
    }

    let url = api.join(&format!("v2/books/{}", encode(slug))).ok()?;
    let book: BookData = client.get_json(url.as_str()).await.ok()?;
    normalize_id(book.id.as_deref())
}

/// 书籍章节列表
pub async fn book_chapters(client: &SiteClient, api: &Url, book_id: &str) -> Vec<RawChapter> {
    let Some(book_id) = normalize_id(Some(book_id)) else {
        return Vec::new();
    };

    let Ok(url) = api.join(&format!("v2/chapters?bookId={}", encode(&book_id))) else {
        return Vec::new();
    };
    client
        .get_json::<Vec<RawChapter>>(url.as_str())
        .await
        .unwrap_or_default()
}

/// 分支展示标签表
pub async fn branch_labels(
    client: &SiteClient,
    api: &Url,
    book_id: &str,
) -> HashMap<String, String> {
    let Some(book_id) = normalize_id(Some(book_id)) else {
        return HashMap::new();
    };

    let Ok(url) = api.join(&format!("v2/branches?bookId={}", encode(&book_id))) else {
        return HashMap::new();
    };
    let branches: Vec<BranchData> = match client.get_json(url.as_str()).await {
        Ok(branches) => branches,
        Err(_) => return HashMap::new(),
    };

    let mut labels = HashMap::new();
    for branch in &branches {
        let Some(id) = normalize_id(branch.id.as_deref()) else {
            continue;
        };
        if let Some(label) = branch_label(branch) {
            labels.insert(id, label);
        }
    }
    labels
}

/// 分支标签：出版方名单去重拼接，缺失时回退 `Branch <id8>`
pub fn branch_label(branch: &BranchData) -> Option<String> {
    let mut names: Vec<String> = Vec::new();
    for publisher in &branch.publishers {
        if let Some(name) = normalize_id(publisher.name.as_deref())
            && !names.contains(&name)
        {
            names.push(name);
        }
    }

    if !names.is_empty() {
        return Some(names.join(" / "));
    }

    normalize_id(branch.id.as_deref()).map(|id| short_branch_label(&id))
}

pub fn short_branch_label(id: &str) -> String {
    format!("Branch {}", id.chars().take(8).collect::<String>())
}

/// 解析章节分支标签
pub fn resolve_branch_label(
    branch_id: Option<&str>,
    labels: &HashMap<String, String>,
) -> Option<String> {
    let id = normalize_id(branch_id)?;
    Some(
        labels
            .get(&id)
            .cloned()
            .unwrap_or_else(|| short_branch_label(&id)),
    )
}

/// 章节级富附件表
pub async fn chapter_attachments(
    client: &SiteClient,
    api: &Url,
    chapter_id: &str,
) -> Option<AttachmentMap> {
    let url = api
        .join(&format!("v2/rich-attachments?chapterId={}", encode(chapter_id)))
        .ok()?;
    let records: Vec<AttachmentRecord> = client.get_json(url.as_str()).await.ok()?;

    let mut attachments = AttachmentMap::new();
    for record in records {
        let Some(id) = normalize_id(record.id.as_deref()) else {
            continue;
        };
        let Some(image) = normalize_id(record.image.as_deref()) else {
            continue;
        };
        attachments.insert(
            id.clone(),
            serde_json::json!({ "id": id, "image": image }),
        );
    }

    (!attachments.is_empty()).then_some(attachments)
}

/// 附件的展示图 URL（仅 image 字段）
pub fn attachment_image(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize_id(Some(s.as_str())),
        Value::Object(map) => normalize_id(map.get("image").and_then(Value::as_str)),
        _ => None,
    }
}

/// 附件的载荷来源 URL（image 或 url 字段）
pub fn attachment_source(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize_id(Some(s.as_str())),
        Value::Object(map) => normalize_id(map.get("image").and_then(Value::as_str))
            .or_else(|| normalize_id(map.get("url").and_then(Value::as_str))),
        _ => None,
    }
}

/// 具备图像的附件 id 列表，可按需截断
pub fn attachment_ids_with_images(attachments: &AttachmentMap, limit: Option<usize>) -> Vec<String> {
    let ids = attachments
        .iter()
        .filter(|(_, value)| attachment_image(value).is_some())
        .map(|(id, _)| id.clone());

    match limit {
        Some(limit) if limit > 0 => ids.take(limit).collect(),
        _ => ids.collect(),
    }
}

/// 合并附件表：页面状态（primary）覆盖 API 结果（secondary）
pub fn merge_attachments(
    primary: Option<AttachmentMap>,
    secondary: Option<AttachmentMap>,
) -> Option<AttachmentMap> {
    match (primary, secondary) {
        (None, None) => None,
        (primary, secondary) => {
            let mut merged = secondary.unwrap_or_default();
            for (id, value) in primary.unwrap_or_default() {
                merged.insert(id, value);
            }
            Some(merged)
        }
    }
}
