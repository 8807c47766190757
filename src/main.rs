// main.rs
use std::io::{self, Write};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use media_search::api::{
    format_duration, format_file_size, ErrorResponse, FindItemsRequest, FindItemsResponse,
    FoldersResponse, IndexRequest, IndexResponse,
};
use media_search::config::CONFIG;
use media_search::engine::{EngineError, LocalMediaSource, LocalMediaSourceBuilder, MediaDetails};
use media_search::query::QueryParser;

fn main() -> Result<()> {
    let config = Arc::new(CONFIG.clone());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.to_lowercase())),
        )
        .init();

    let source = LocalMediaSourceBuilder::new()
        .with_config(Arc::clone(&config))
        .build()
        .context("无法初始化媒体源")?;

    println!("--- 本地媒体查询 ---");
    info!("[Main] 媒体根目录: {}", source.media_root().display());

    // 1. 先启动监控，扫描期间的变化也会被处理
    let _watcher = source.start_watcher().context("无法启动目录监控")?;

    // 2. 全量扫描
    let stats = source.scan()?;
    println!(
        " [扫描] {} 个目录, {} 个新索引, {} 个未变化, 清理 {} 条",
        stats.folders, stats.indexed, stats.unchanged, stats.pruned
    );
    println!(" [前台] 输入查询 (例如: live --type=AUDIO --sort=title:desc)");
    println!("        :folders 列出目录, :index <路径> 重新索引, {{...}} JSON 请求, quit 退出");

    let parser = QueryParser::new().with_default_count(config.query.default_count);

    // 3. 主线程循环：处理用户输入
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input == "quit" || input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        if input == ":folders" {
            list_folders(&source)?;
        } else if let Some(request) = IndexRequest::from_command(input) {
            index_path(&source, &request)?;
        } else if input.starts_with('{') {
            match FindItemsRequest::from_json(input, config.query.default_count) {
                Ok(request) => find_items(&source, request)?,
                Err(e) => print_json(&ErrorResponse::new("INVALID_REQUEST", e.to_string()))?,
            }
        } else {
            match parser.parse(input) {
                Ok(request) => find_items(&source, request)?,
                Err(e) => print_json(&ErrorResponse::from(&EngineError::from(e)))?,
            }
        }
    }

    Ok(())
}

fn find_items(source: &LocalMediaSource, request: FindItemsRequest) -> Result<()> {
    let start = Instant::now();

    // 编译错误在提交之前就能报告
    let query = match source.explain(&request) {
        Ok(query) => query,
        Err(e) => return print_json(&ErrorResponse::from(&e)),
    };

    let (offset, count) = (request.offset, request.count);
    let (tx, rx) = mpsc::channel();
    source.find_items_async(request, move |result| {
        let _ = tx.send(result);
    });
    let result = rx.recv().context("查询线程意外退出")?;

    match result {
        Ok(items) => {
            for item in items.iter() {
                let extra = match &item.details {
                    MediaDetails::Audio(audio) => format!(
                        "{} - {} [{}]",
                        audio.artists.join(", "),
                        audio.album.as_deref().unwrap_or_default(),
                        audio.duration.map(format_duration).unwrap_or_default()
                    ),
                    MediaDetails::Video(video) => {
                        video.duration.map(format_duration).unwrap_or_default()
                    }
                    MediaDetails::Image(image) => match (image.width, image.height) {
                        (Some(w), Some(h)) => format!("{w}x{h}"),
                        _ => String::new(),
                    },
                };
                println!(
                    " #{:<5} {:?} {:<30} {:>10}  {}",
                    item.id,
                    item.media_type,
                    item.title,
                    format_file_size(item.size.unwrap_or_default().max(0) as u64),
                    extra
                );
            }
            let response = FindItemsResponse::new(query, items)
                .with_pagination(offset, count)
                .with_took(start.elapsed().as_millis() as u64);
            println!(" 共 {} 个结果 ({} ms)", response.items.size, response.took_ms);
            print_json(&response.query)
        }
        Err(message) => print_json(&ErrorResponse::new("QUERY_FAILED", message)),
    }
}

fn list_folders(source: &LocalMediaSource) -> Result<()> {
    let start = Instant::now();
    let (tx, rx) = mpsc::channel();
    source.get_folders_async(move |result| {
        let _ = tx.send(result);
    });
    match rx.recv().context("查询线程意外退出")? {
        Ok(folders) => print_json(&FoldersResponse::new(folders, start.elapsed().as_millis() as u64)),
        Err(message) => print_json(&ErrorResponse::new("QUERY_FAILED", message)),
    }
}

fn index_path(source: &LocalMediaSource, request: &IndexRequest) -> Result<()> {
    let start = Instant::now();
    let path = request.path();
    let response = match source.index_path(path) {
        Ok(stats) => IndexResponse {
            success: true,
            message: "已索引".to_string(),
            path: path.display().to_string(),
            stats,
            took_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => return print_json(&ErrorResponse::from(&e).with_details(path.display().to_string())),
    };
    print_json(&response)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
