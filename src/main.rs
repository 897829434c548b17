//! 应用程序入口 (Application Entrypoint)
//!
//! 薄宿主垫片：CLI 指令解析、遥测层初始化、插件创建与结果 JSON 输出。

use std::sync::Arc;

use clap::{Parser, Subcommand};

use silkworm::core::config::AppConfig;
use silkworm::core::filter::PopularOptions;
use silkworm::network::{HttpService, Session};
use silkworm::plugins::PluginRegistry;

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 列出已注册插件
    Plugins,
    /// 热门/最新列表
    Popular {
        /// 插件标识
        #[arg(short, long)]
        plugin: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// 按最近更新排序
        #[arg(long)]
        latest: bool,
    },
    /// 小说详情与章节列表
    Detail {
        #[arg(short, long)]
        plugin: String,
        /// 站点相对路径
        path: String,
    },
    /// 单章正文
    Chapter {
        #[arg(short, long)]
        plugin: String,
        path: String,
    },
    /// 搜索
    Search {
        #[arg(short, long)]
        plugin: String,
        term: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = Arc::new(AppConfig::load()?);
    let cli = Cli::parse();

    let registry = PluginRegistry::new();
    if let Commands::Plugins = cli.command {
        for id in registry.list() {
            println!("{}", id);
        }
        return Ok(());
    }

    let session = Arc::new(Session::with_ua(config.http.user_agent.clone()));
    let fetcher = Arc::new(HttpService::new(&config, session)?);

    let create = |id: &str| {
        registry
            .create(id, config.site(id), fetcher.clone())
            .ok_or_else(|| anyhow::anyhow!("Unknown plugin identifier: {}", id))
    };

    match cli.command {
        Commands::Plugins => unreachable!(),
        Commands::Popular {
            plugin,
            page,
            latest,
        } => {
            let plugin = create(&plugin)?;
            let options = PopularOptions {
                show_latest: latest,
                ..Default::default()
            };
            let novels = plugin.list_popular(page, &options).await?;
            println!("{}", serde_json::to_string_pretty(&novels)?);
        }
        Commands::Detail { plugin, path } => {
            let plugin = create(&plugin)?;
            let novel = plugin.fetch_detail(&path).await?;
            tracing::info!(chapters = novel.chapters.len(), "detail fetched");
            println!("{}", serde_json::to_string_pretty(&novel)?);
        }
        Commands::Chapter { plugin, path } => {
            let plugin = create(&plugin)?;
            let html = plugin.fetch_chapter(&path).await?;
            println!("{}", html);
        }
        Commands::Search { plugin, term, page } => {
            let plugin = create(&plugin)?;
            let novels = plugin.search(&term, page).await?;
            println!("{}", serde_json::to_string_pretty(&novels)?);
        }
    }

    Ok(())
}
