//! 小说聚合宿主的站点插件库
//!
//! 每个插件面向一个来源站点，负责抓取页面、抽取结构化的小说/章节
//! 元数据并归一化为宿主约定的记录形状。核心组件：流式标记扫描器、
//! 树查询抓取、不透明状态解码、章节调和、图像载荷解码。

pub mod core;
pub mod dom;
pub mod media;
pub mod network;
pub mod plugins;
pub mod reconcile;
pub mod scan;
pub mod state;

pub use crate::core::config::{AppConfig, SiteConfig};
pub use crate::core::error::{PluginError, Result};
pub use crate::core::filter::{Filter, FilterState, FilterValue, Filters, PopularOptions};
pub use crate::core::model::{ChapterItem, NovelItem, NovelStatus, SourceNovel};
pub use crate::network::{FetchRequest, FetchResponse, Fetcher, HttpService, Session, SiteClient};
pub use crate::plugins::{PluginMeta, PluginRegistry, SourcePlugin};
