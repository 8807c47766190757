// indexer.rs - 媒体扫描与目录监控
//! 遍历媒体根目录写入 files 表，并监听文件变化做增量更新

use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ignore::WalkBuilder;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::WalkerConfig;
use crate::engine::EngineResult;
use crate::extract::TagExtractor;
use crate::query::CompiledPredicate;
use crate::schema::{MediaRecord, COL_DATA, FILES_TABLE, MEDIA_TYPE_AUDIO};
use crate::store::{MediaStore, StoreQuery};

/// 单个路径的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Folder,
    Indexed,
    Unchanged,
    /// 不是可识别的媒体文件，或被忽略
    Skipped,
}

/// 扫描统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub folders: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pruned: usize,
}

impl ScanStats {
    fn record(&mut self, outcome: IndexOutcome) {
        match outcome {
            IndexOutcome::Folder => self.folders += 1,
            IndexOutcome::Indexed => self.indexed += 1,
            IndexOutcome::Unchanged => self.unchanged += 1,
            IndexOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// 媒体扫描器
pub struct MediaScanner {
    root: PathBuf,
    store: Arc<dyn MediaStore>,
    tags: Arc<TagExtractor>,
    walker: WalkerConfig,
    ignore_patterns: Vec<glob::Pattern>,
}

impl MediaScanner {
    pub fn new(
        root: impl Into<PathBuf>,
        store: Arc<dyn MediaStore>,
        tags: Arc<TagExtractor>,
        walker: WalkerConfig,
    ) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        let ignore_patterns = walker.custom_ignore_patterns.iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("[Scan] 忽略无效的模式 '{}': {}", p, e);
                    None
                }
            })
            .collect();
        Self { root, store, tags, walker, ignore_patterns }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 路径中任意一级命中隐藏规则或忽略模式即忽略
    pub fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            (self.walker.skip_hidden && name.starts_with('.') && name != "." && name != "..")
                || self.ignore_patterns.iter().any(|p| p.matches(&name))
        })
    }

    /// 扫描整个子树（含起点目录本身）
    pub fn scan(&self, start: &Path) -> EngineResult<ScanStats> {
        info!("[Scan] 正在扫描 {}", start.display());
        let mut stats = ScanStats::default();

        for path in self.walk(start) {
            match self.index_path(&path) {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    stats.failed += 1;
                    warn!("[Scan] 处理失败 {}: {}", path.display(), e);
                }
            }
        }

        info!(
            "[Scan] 完成: {} 个目录, {} 个新索引, {} 个未变化, {} 个失败",
            stats.folders, stats.indexed, stats.unchanged, stats.failed
        );
        Ok(stats)
    }

    /// 按配置选择遍历器；父目录总在子项之前
    fn walk(&self, start: &Path) -> Vec<PathBuf> {
        let max_depth = (self.walker.max_depth > 0).then_some(self.walker.max_depth);
        let mut paths = Vec::new();

        if self.walker.use_ripgrep_walker {
            let mut builder = WalkBuilder::new(start);
            builder
                .hidden(self.walker.skip_hidden)
                .git_ignore(self.walker.respect_gitignore)
                .git_global(false)
                .git_exclude(false)
                .ignore(self.walker.respect_gitignore)
                .require_git(false)
                .follow_links(self.walker.follow_symlinks)
                .max_depth(max_depth);
            for entry in builder.build() {
                match entry {
                    Ok(entry) => paths.push(entry.into_path()),
                    Err(e) => warn!("[Scan] 遍历出错: {}", e),
                }
            }
        } else {
            let mut walker = WalkDir::new(start).follow_links(self.walker.follow_symlinks);
            if let Some(depth) = max_depth {
                walker = walker.max_depth(depth);
            }
            let entries = walker.into_iter()
                .filter_entry(|e| e.depth() == 0 || !self.is_ignored(e.path()));
            for entry in entries {
                match entry {
                    Ok(entry) => paths.push(entry.into_path()),
                    Err(e) => warn!("[Scan] 遍历出错: {}", e),
                }
            }
        }

        paths.retain(|p| p == start || !self.is_ignored(p));
        paths
    }

    /// 索引单个文件或目录
    pub fn index_path(&self, path: &Path) -> EngineResult<IndexOutcome> {
        if self.is_ignored(path) {
            return Ok(IndexOutcome::Skipped);
        }
        let Some(mut record) = MediaRecord::from_path(path)? else {
            return Ok(IndexOutcome::Skipped);
        };

        if record.is_folder() {
            self.store.upsert(&record)?;
            return Ok(IndexOutcome::Folder);
        }

        // 修改时间没变就不再读标签
        if self.store.modified_time(&record.path)? == Some(record.date_modified as i64) {
            return Ok(IndexOutcome::Unchanged);
        }

        if record.media_type == MEDIA_TYPE_AUDIO && self.tags.is_supported(path) {
            record.apply_tags(self.tags.extract(path));
        }
        let id = self.store.upsert(&record)?;
        debug!("[Scan] 已索引 #{} {}", id, record.path);
        Ok(IndexOutcome::Indexed)
    }

    /// 删除路径（及其子项）的记录
    pub fn remove_path(&self, path: &Path) -> EngineResult<usize> {
        let removed = self.store.remove(&path.to_string_lossy())?;
        if removed > 0 {
            debug!("[Scan] 已移除 {} 条记录: {}", removed, path.display());
        }
        Ok(removed)
    }

    /// 清理文件已经不存在的记录
    pub fn prune_missing(&self) -> EngineResult<usize> {
        let selection = CompiledPredicate::empty();
        let columns = [COL_DATA];
        let mut cursor = self.store.query(&StoreQuery::new(FILES_TABLE, &columns, &selection))?;

        let mut missing = Vec::new();
        while let Some(row) = cursor.next_row() {
            if let Some(path) = row.get_str(COL_DATA) {
                if !Path::new(path).exists() {
                    missing.push(path.to_string());
                }
            }
        }
        cursor.close();

        let mut pruned = 0;
        for path in missing {
            pruned += self.store.remove(&path)?;
        }
        if pruned > 0 {
            info!("[Scan] 清理了 {} 条失效记录", pruned);
        }
        Ok(pruned)
    }
}

/// 处理一个文件系统事件，返回发生变化的路径数
pub fn handle_event(scanner: &MediaScanner, event: &Event) -> usize {
    let mut changed = 0;
    for path in &event.paths {
        let result = match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) if path.exists() => {
                if path.is_dir() {
                    scanner.scan(path).map(|s| s.folders + s.indexed)
                } else {
                    scanner.index_path(path).map(|o| usize::from(o == IndexOutcome::Indexed))
                }
            }
            // 重命名的旧路径也走这里
            EventKind::Modify(_) | EventKind::Remove(_) => scanner.remove_path(path),
            _ => Ok(0),
        };
        match result {
            Ok(n) => changed += n,
            Err(e) => warn!("[Watch] 处理事件失败 {}: {}", path.display(), e),
        }
    }
    changed
}

/// 启动监控线程
pub fn start_watcher_thread(scanner: Arc<MediaScanner>) -> EngineResult<JoinHandle<()>> {
    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
    watcher.watch(scanner.root(), RecursiveMode::Recursive)?;
    info!("[Watch] 正在监控: {}", scanner.root().display());

    let handle = thread::Builder::new()
        .name("media-watcher".to_string())
        .spawn(move || {
            // watcher 被丢弃时监控停止
            let _watcher = watcher;
            for res in rx {
                match res {
                    Ok(event) => {
                        let changed = handle_event(&scanner, &event);
                        if changed > 0 {
                            info!("[Watch] 已更新 {} 个条目", changed);
                        }
                    }
                    Err(e) => warn!("[Watch] 监控出错: {:?}", e),
                }
            }
        })?;
    Ok(handle)
}
