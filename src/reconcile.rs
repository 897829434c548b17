//! 章节调和引擎 (Chapter Reconciliation Engine)
//!
//! 原始章节描述符可能携带多个分支（平行翻译）、卷内重置的章节编号、
//! 不一致的时间戳。本引擎选出单一规范分支，按
//! (卷号, 章节号, 创建时间) 升序排序，并重新分配 1 起始、无空洞的
//! 连续序号，源侧编号一律丢弃。
//!
//! 分支策略：取章节数最多的分支，数量相同时取先出现者。两种观测到的
//! 策略（全分支合并带标签 / 取最大分支）中选择了后者，理由见 DESIGN.md。

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// 原始章节描述符（来源：页面状态或章节 API）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawChapter {
    pub id: Option<String>,
    pub name: Option<String>,
    /// 数字或字符串
    pub number: Option<Value>,
    pub volume: Option<Value>,
    pub branch_id: Option<String>,
    pub created_at: Option<String>,
}

impl RawChapter {
    /// 稳定标识；空白视为缺失
    pub fn stable_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// 宽容的数值转换：缺失或非数值一律归零
pub fn numeric(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// ISO 时间戳解析；失败视为无信息（排序平局）
fn timestamp(value: Option<&str>) -> Option<i64> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

fn compare_created(left: Option<&str>, right: Option<&str>) -> std::cmp::Ordering {
    match (timestamp(left), timestamp(right)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => std::cmp::Ordering::Equal,
    }
}

/// 规范排序比较器：卷号、章节号、创建时间，缺失项回退为 0 / 平局
pub fn compare_chapters(left: &RawChapter, right: &RawChapter) -> std::cmp::Ordering {
    numeric(left.volume.as_ref())
        .total_cmp(&numeric(right.volume.as_ref()))
        .then_with(|| {
            numeric(left.number.as_ref()).total_cmp(&numeric(right.number.as_ref()))
        })
        .then_with(|| compare_created(left.created_at.as_deref(), right.created_at.as_deref()))
}

/// 选出规范分支：章节数最多者，平局取先出现的分支
///
/// 返回 `None` 表示输入为空。无分支标识的章节归入独立的 `None` 组。
pub fn select_branch(chapters: &[RawChapter]) -> Option<Option<String>> {
    if chapters.is_empty() {
        return None;
    }

    let mut counts: HashMap<Option<&str>, usize> = HashMap::new();
    let mut encounter_order: Vec<Option<&str>> = Vec::new();

    for chapter in chapters {
        let branch = chapter.branch_id.as_deref();
        let count = counts.entry(branch).or_insert(0);
        if *count == 0 {
            encounter_order.push(branch);
        }
        *count += 1;
    }

    let mut winner = encounter_order[0];
    let mut best = counts[&winner];
    for branch in &encounter_order[1..] {
        let count = counts[branch];
        if count > best {
            winner = *branch;
            best = count;
        }
    }

    Some(winner.map(str::to_string))
}

/// 调和：丢弃无稳定标识的章节，裁剪到规范分支，规范排序
///
/// 产出顺序即最终顺序，调用方以 `1 + 下标` 作为章节序号。
pub fn reconcile(chapters: Vec<RawChapter>) -> Vec<RawChapter> {
    let mut usable: Vec<RawChapter> = chapters
        .into_iter()
        .filter(|chapter| chapter.stable_id().is_some())
        .collect();

    if let Some(winner) = select_branch(&usable) {
        usable.retain(|chapter| chapter.branch_id.as_deref() == winner.as_deref());
    }

    usable.sort_by(compare_chapters);
    usable
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chapter(id: &str, volume: Option<Value>, number: Option<Value>, branch: Option<&str>) -> RawChapter {
        RawChapter {
            id: Some(id.to_string()),
            name: None,
            number,
            volume,
            branch_id: branch.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn renumbering_is_gapless_for_any_permutation() {
        // 卷内重置编号：1-1, 1-2, 2-1, 2-2 以乱序输入
        let input = vec![
            chapter("c", Some(json!(2)), Some(json!(1)), None),
            chapter("a", Some(json!(1)), Some(json!(1)), None),
            chapter("d", Some(json!(2)), Some(json!(2)), None),
            chapter("b", Some(json!(1)), Some(json!(2)), None),
        ];
        let ordered = reconcile(input);
        let ids: Vec<_> = ordered.iter().filter_map(|c| c.stable_id()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);
    }

    #[test]
    fn string_numbers_and_missing_fields_fall_back_to_zero() {
        let input = vec![
            chapter("b", None, Some(json!("2")), None),
            chapter("a", None, Some(json!("garbage")), None),
            chapter("c", Some(json!("1")), Some(json!(0)), None),
        ];
        let ordered = reconcile(input);
        let ids: Vec<_> = ordered.iter().filter_map(|c| c.stable_id()).collect();
        // a: (0, 0), b: (0, 2), c: (1, 0)
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn largest_branch_wins() {
        let input = vec![
            chapter("x1", None, Some(json!(1)), Some("alpha")),
            chapter("y1", None, Some(json!(1)), Some("beta")),
            chapter("y2", None, Some(json!(2)), Some("beta")),
        ];
        let ordered = reconcile(input);
        assert!(ordered.iter().all(|c| c.branch_id.as_deref() == Some("beta")));
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn branch_tie_breaks_by_first_encounter() {
        let input = vec![
            chapter("b1", None, Some(json!(1)), Some("beta")),
            chapter("a1", None, Some(json!(1)), Some("alpha")),
            chapter("a2", None, Some(json!(2)), Some("alpha")),
            chapter("b2", None, Some(json!(2)), Some("beta")),
        ];
        assert_eq!(
            select_branch(&input).unwrap().as_deref(),
            Some("beta")
        );
    }

    #[test]
    fn branch_selection_is_deterministic() {
        let input = vec![
            chapter("a1", None, Some(json!(1)), Some("alpha")),
            chapter("b1", None, Some(json!(1)), Some("beta")),
            chapter("b2", None, Some(json!(2)), Some("beta")),
        ];
        for _ in 0..10 {
            assert_eq!(select_branch(&input).unwrap().as_deref(), Some("beta"));
        }
    }

    #[test]
    fn chapters_without_stable_id_are_dropped() {
        let mut missing = chapter("", None, Some(json!(1)), None);
        missing.id = Some("   ".to_string());
        let input = vec![
            missing,
            RawChapter::default(),
            chapter("keep", None, Some(json!(2)), None),
        ];
        let ordered = reconcile(input);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].stable_id(), Some("keep"));
    }

    #[test]
    fn created_at_breaks_number_ties() {
        let mut early = chapter("early", None, Some(json!(1)), None);
        early.created_at = Some("2026-01-01T00:00:00Z".to_string());
        let mut late = chapter("late", None, Some(json!(1)), None);
        late.created_at = Some("2026-03-01T00:00:00Z".to_string());

        let ordered = reconcile(vec![late, early]);
        let ids: Vec<_> = ordered.iter().filter_map(|c| c.stable_id()).collect();
        assert_eq!(ids, ["early", "late"]);
    }

    #[test]
    fn unparsable_dates_keep_input_order() {
        let mut first = chapter("first", None, Some(json!(1)), None);
        first.created_at = Some("вчера".to_string());
        let mut second = chapter("second", None, Some(json!(1)), None);
        second.created_at = Some("2026-03-01T00:00:00Z".to_string());

        // 稳定排序：平局保持输入顺序
        let ordered = reconcile(vec![first, second]);
        let ids: Vec<_> = ordered.iter().filter_map(|c| c.stable_id()).collect();
        assert_eq!(ids, ["first", "second"]);
    }
}
