//! 过滤器声明与运行时取值 (Filter Declarations & Runtime State)
//!
//! 插件向宿主声明可用过滤器；宿主回传 `FilterState`，由插件解析为
//! 查询参数或表单字段。声明顺序保留（IndexMap）。

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 单个选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOption {
    pub label: String,
    pub value: String,
}

impl FilterOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// 过滤器声明
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// 单选
    Picker {
        label: String,
        default: String,
        options: Vec<FilterOption>,
    },
    /// 多选
    CheckboxGroup {
        label: String,
        options: Vec<FilterOption>,
    },
    /// 可排除多选（include/exclude 两组）
    ExcludableCheckboxGroup {
        label: String,
        options: Vec<FilterOption>,
    },
    /// 开关
    Switch { label: String, default: bool },
    /// 自由文本
    Text { label: String },
}

/// 插件的全部过滤器声明
pub type Filters = IndexMap<String, Filter>;

/// 宿主回传的已选值
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Switch(bool),
    Text(String),
    Multi(Vec<String>),
    Excludable {
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
}

/// 一次调用的过滤器取值集合
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterState(pub HashMap<String, FilterValue>);

impl FilterState {
    pub fn set(&mut self, key: impl Into<String>, value: FilterValue) {
        self.0.insert(key.into(), value);
    }

    /// 文本/单选值
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(FilterValue::Text(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// 多选值（缺省为空）
    pub fn multi(&self, key: &str) -> &[String] {
        match self.0.get(key) {
            Some(FilterValue::Multi(values)) => values,
            _ => &[],
        }
    }

    pub fn include(&self, key: &str) -> &[String] {
        match self.0.get(key) {
            Some(FilterValue::Excludable { include, .. }) => include,
            _ => &[],
        }
    }

    pub fn exclude(&self, key: &str) -> &[String] {
        match self.0.get(key) {
            Some(FilterValue::Excludable { exclude, .. }) => exclude,
            _ => &[],
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(FilterValue::Switch(true)))
    }
}

/// 列表类操作的通用选项
#[derive(Debug, Clone, Default)]
pub struct PopularOptions {
    /// 按最近更新排序（覆盖排序过滤器）
    pub show_latest: bool,
    pub filters: FilterState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_accessors_degrade_to_empty() {
        let state = FilterState::default();
        assert_eq!(state.text("sort"), None);
        assert!(state.multi("genres").is_empty());
        assert!(!state.flag("strict"));
    }

    #[test]
    fn untagged_values_deserialize() {
        let state: FilterState = serde_json::from_str(
            r#"{"sort":"viewsCount","adult":true,"genres":["action","drama"],
                "labels":{"include":["a"],"exclude":["b"]}}"#,
        )
        .unwrap();
        assert_eq!(state.text("sort"), Some("viewsCount"));
        assert!(state.flag("adult"));
        assert_eq!(state.multi("genres"), ["action", "drama"]);
        assert_eq!(state.include("labels"), ["a"]);
        assert_eq!(state.exclude("labels"), ["b"]);
    }
}
