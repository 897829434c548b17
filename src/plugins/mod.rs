//! 站点插件 (Source Plugins)
//!
//! 每个插件面向一个站点，组合扫描/查询/解码组件，向宿主暴露四个操作：
//! 热门列表、详情+章节列表、单章正文、搜索。插件经注册表按标识创建。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::SiteConfig;
use crate::core::error::Result;
use crate::core::filter::{Filters, PopularOptions};
use crate::core::model::{NovelItem, SourceNovel};
use crate::network::Fetcher;

pub mod freewebnovel;
pub mod hexnovels;
pub mod ifreedom;
pub mod rulate;

/// 插件元信息
#[derive(Debug, Clone)]
pub struct PluginMeta {
    pub id: String,
    pub name: String,
    pub site: String,
    pub lang: String,
    pub version: String,
}

/// 站点插件定义 Trait
#[async_trait]
pub trait SourcePlugin: Send + Sync {
    /// 插件元信息
    fn meta(&self) -> &PluginMeta;

    /// 过滤器声明（可选）
    fn filters(&self) -> Filters {
        Filters::new()
    }

    /// 热门/最新列表
    async fn list_popular(&self, page: u32, options: &PopularOptions) -> Result<Vec<NovelItem>>;

    /// 详情与章节列表
    async fn fetch_detail(&self, novel_path: &str) -> Result<SourceNovel>;

    /// 单章正文 HTML
    async fn fetch_chapter(&self, chapter_path: &str) -> Result<String>;

    /// 搜索
    async fn search(&self, term: &str, page: u32) -> Result<Vec<NovelItem>>;
}

// ============================================================================
// 插件注册表
// ============================================================================

type PluginFactory =
    Box<dyn Fn(SiteConfig, Arc<dyn Fetcher>) -> Box<dyn SourcePlugin> + Send + Sync>;

pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register("freewebnovel", |cfg, fetcher| {
            Box::new(freewebnovel::FreeWebNovel::new(cfg, fetcher))
        });
        registry.register("hexnovels", |cfg, fetcher| {
            Box::new(hexnovels::HexNovels::new(cfg, fetcher))
        });

        // 多源模板：同一模板注册为两个站点实例
        registry.register("ifreedom", |cfg, fetcher| {
            Box::new(ifreedom::Ifreedom::new(ifreedom::IfreedomMeta::ifreedom(), cfg, fetcher))
        });
        registry.register("bookhamster", |cfg, fetcher| {
            Box::new(ifreedom::Ifreedom::new(ifreedom::IfreedomMeta::bookhamster(), cfg, fetcher))
        });
        registry.register("rulate", |cfg, fetcher| {
            Box::new(rulate::Rulate::new(rulate::RulateMeta::rulate(), cfg, fetcher))
        });
        registry.register("erolate", |cfg, fetcher| {
            Box::new(rulate::Rulate::new(rulate::RulateMeta::erolate(), cfg, fetcher))
        });

        registry
    }

    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(SiteConfig, Arc<dyn Fetcher>) -> Box<dyn SourcePlugin> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Box::new(factory));
    }

    pub fn create(
        &self,
        id: &str,
        config: SiteConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> Option<Box<dyn SourcePlugin>> {
        self.factories.get(id).map(|factory| factory(config, fetcher))
    }

    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
