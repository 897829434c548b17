//! 不透明状态解码 (Opaque State Decoder)
//!
//! 页面内嵌的服务端状态是一个扁平异构数组：槽位要么是字面量，要么是
//! 由整数回引（指向其他槽位下标）构成的数组/对象。该形式以下标模拟
//! 共享/循环引用，正对应 arena + index 的设计，数组本身就是 arena。
//!
//! 按键查询：在数组中找到与标记串字面相等的槽位，其后一个槽位即为
//! 值引用，递归解析。已解析槽位按下标记忆化；解析中的槽位集合用于
//! 斩断循环，重入处得到 `Null`。

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde_json::Value;

/// 解码后的状态树
#[derive(Debug, Clone)]
pub struct StateTree {
    slots: Vec<Value>,
}

impl StateTree {
    /// 从页面内嵌的 JSON 文本解析；非数组或非法 JSON 视为缺失
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(slots)) => Some(Self { slots }),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 按标记串取值并反序列化；键缺失或形状不符时返回 `None`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        serde_json::from_value(self.get_value(key)?).ok()
    }

    /// 按标记串取原始解析值
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let key_index = self.slots.iter().position(|slot| slot.as_str() == Some(key))?;
        let reference = self.slots.get(key_index + 1)?;

        let mut cache = HashMap::new();
        let mut visiting = HashSet::new();
        Some(self.resolve(reference, &mut cache, &mut visiting))
    }

    /// 判定回引：小于数组长度的非负整数
    fn back_reference(&self, value: &Value) -> Option<usize> {
        let index = value.as_u64()? as usize;
        (index < self.slots.len()).then_some(index)
    }

    fn resolve(
        &self,
        value: &Value,
        cache: &mut HashMap<usize, Value>,
        visiting: &mut HashSet<usize>,
    ) -> Value {
        if let Some(index) = self.back_reference(value) {
            if let Some(resolved) = cache.get(&index) {
                return resolved.clone();
            }
            if !visiting.insert(index) {
                // 循环重入点
                return Value::Null;
            }

            let target = self.slots[index].clone();
            let resolved = self.resolve(&target, cache, visiting);

            visiting.remove(&index);
            cache.insert(index, resolved.clone());
            return resolved;
        }

        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve(item, cache, visiting))
                    .collect(),
            ),
            Value::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), self.resolve(entry, cache, visiting)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
