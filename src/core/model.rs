//! 宿主数据模型 (Host-facing Data Model)
//!
//! 插件返回给宿主的标准化记录。字段序列化为 camelCase，与宿主约定一致。

use serde::{Deserialize, Serialize};

/// 小说列表项（列表页/搜索结果产出）
///
/// 约束：`name` 与 `path` 非空，不满足的记录在解析阶段直接丢弃。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovelItem {
    pub name: String,
    /// 站点相对路径
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

impl NovelItem {
    /// 列表约束检查
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.path.is_empty()
    }
}

/// 连载状态
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
pub enum NovelStatus {
    Ongoing,
    Completed,
    #[strum(serialize = "On Hiatus")]
    OnHiatus,
    Cancelled,
    #[default]
    Unknown,
}

/// 小说详情
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceNovel {
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub status: NovelStatus,
    /// 逗号拼接的题材列表
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<String>,
    /// 评分，区间 [0, 5]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub chapters: Vec<ChapterItem>,
}

/// 章节项
///
/// 最终列表中 `chapter_number` 为 1..N 严格递增、无空洞。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterItem {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<u32>,
    /// 分支（翻译组）标签
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanlator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn novel_item_validity() {
        let ok = NovelItem {
            name: "Foo".into(),
            path: "n/123".into(),
            cover: None,
        };
        assert!(ok.is_valid());

        let missing_path = NovelItem {
            name: "Foo".into(),
            path: String::new(),
            cover: None,
        };
        assert!(!missing_path.is_valid());
    }

    #[test]
    fn chapter_item_serializes_camel_case() {
        let chapter = ChapterItem {
            name: "Chapter 1".into(),
            path: "c/1".into(),
            release_time: Some("August 1, 2026".into()),
            chapter_number: Some(1),
            scanlator: None,
            page: None,
        };
        let json = serde_json::to_value(&chapter).unwrap();
        assert_eq!(json["releaseTime"], "August 1, 2026");
        assert_eq!(json["chapterNumber"], 1);
    }

    #[test]
    fn status_display_labels() {
        assert_eq!(NovelStatus::OnHiatus.to_string(), "On Hiatus");
        assert_eq!(NovelStatus::Ongoing.to_string(), "Ongoing");
    }
}
