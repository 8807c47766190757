// engine/core.rs - 本地媒体源核心
//! 统一的媒体查询接口：目录列表、条目查找（同步与异步）

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::api::{FindItemsRequest, QueryInfo};
use crate::config::FolderStrategy;
use crate::extract::TagExtractor;
use crate::indexer::{self, MediaScanner, ScanStats};
use crate::pool::{Completion, PoolError, WorkerPool};
use crate::query::{compile_sort, CompiledPredicate, FilterCompiler, QueryError, SqlArg};
use crate::schema::{
    AttributeMapping, COL_DATA, COL_DATE_MODIFIED, COL_ID, COL_MEDIA_TYPE, COL_PARENT,
    COL_TITLE, FILES_TABLE, MEDIA_TYPE_AUDIO, MEDIA_TYPE_IMAGE, MEDIA_TYPE_NONE,
    MEDIA_TYPE_VIDEO,
};
use crate::store::{MediaStore, Row, StoreQuery};

use super::item::{MediaFolder, MediaItem, MediaItemCollection, StorageType};

/// 媒体源错误类型
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// 用于 API 错误响应的错误代码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Query(e) => e.code(),
            Self::Sqlite(_) | Self::Store(_) => "STORE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Watch(_) => "WATCH_ERROR",
            Self::Pool(_) => "POOL_ERROR",
            Self::Config(_) => "CONFIGURATION_ERROR",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// 标准目录（相对媒体根目录）
pub const STANDARD_FOLDERS: [&str; 5] = ["Music", "Pictures", "Movies", "Download", "DCIM"];

/// 查询共享的状态；异步任务持有它的 Arc
pub(crate) struct SourceState {
    pub(crate) store: Arc<dyn MediaStore>,
    pub(crate) mapping: &'static AttributeMapping,
    pub(crate) tags: Arc<TagExtractor>,
    pub(crate) scanner: Arc<MediaScanner>,
    pub(crate) media_root: PathBuf,
    pub(crate) storage_type: StorageType,
    pub(crate) strategy: FolderStrategy,
}

/// 本地媒体源
pub struct LocalMediaSource {
    pub(crate) state: Arc<SourceState>,
    pub(crate) pool: WorkerPool,
}

impl LocalMediaSource {
    pub fn storage_type(&self) -> StorageType {
        self.state.storage_type
    }

    pub fn media_root(&self) -> &Path {
        &self.state.media_root
    }

    pub fn store(&self) -> &Arc<dyn MediaStore> {
        &self.state.store
    }

    /// 全量扫描媒体根目录，并清理失效记录
    pub fn scan(&self) -> EngineResult<ScanStats> {
        let start = Instant::now();
        let scanner = &self.state.scanner;
        let mut stats = scanner.scan(scanner.root())?;
        stats.pruned = scanner.prune_missing()?;
        info!("[Source] 扫描耗时 {} ms", start.elapsed().as_millis());
        Ok(stats)
    }

    /// 索引单个文件或目录
    pub fn index_path(&self, path: &Path) -> EngineResult<ScanStats> {
        if path.is_dir() {
            self.state.scanner.scan(path)
        } else {
            let mut stats = ScanStats::default();
            match self.state.scanner.index_path(path)? {
                indexer::IndexOutcome::Indexed => stats.indexed = 1,
                indexer::IndexOutcome::Unchanged => stats.unchanged = 1,
                indexer::IndexOutcome::Folder => stats.folders = 1,
                indexer::IndexOutcome::Skipped => stats.skipped = 1,
            }
            Ok(stats)
        }
    }

    /// 启动目录监控线程
    pub fn start_watcher(&self) -> EngineResult<JoinHandle<()>> {
        indexer::start_watcher_thread(Arc::clone(&self.state.scanner))
    }

    /// 列出媒体目录
    pub fn get_folders(&self) -> EngineResult<Vec<MediaFolder>> {
        self.state.get_folders()
    }

    /// 查找媒体条目
    pub fn find_items(&self, request: &FindItemsRequest) -> EngineResult<MediaItemCollection> {
        self.state.find_items(request)
    }

    /// 编译请求，返回将要执行的查询（不访问存储）
    pub fn explain(&self, request: &FindItemsRequest) -> EngineResult<QueryInfo> {
        let (selection, order_by) = self.state.compile(request)?;
        Ok(QueryInfo {
            selection: selection.template,
            args: selection.args,
            order_by,
        })
    }

    /// 在工作线程上执行 get_folders；回调恰好调用一次
    pub fn get_folders_async<F>(&self, callback: F)
    where
        F: FnOnce(Result<Vec<MediaFolder>, String>) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let completion = Completion::new(callback);
        let submitted = self.pool.submit(move || {
            completion.complete(state.get_folders().map_err(|e| e.to_string()));
        });
        // 提交失败时闭包被丢弃，Completion 会以错误回调
        if let Err(e) = submitted {
            warn!("[Source] getFolders 提交失败: {}", e);
        }
    }

    /// 在工作线程上执行 find_items；回调恰好调用一次
    pub fn find_items_async<F>(&self, request: FindItemsRequest, callback: F)
    where
        F: FnOnce(Result<MediaItemCollection, String>) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let completion = Completion::new(callback);
        let submitted = self.pool.submit(move || {
            completion.complete(state.find_items(&request).map_err(|e| e.to_string()));
        });
        if let Err(e) = submitted {
            warn!("[Source] findItems 提交失败: {}", e);
        }
    }

    /// 停止工作线程（已排队的任务会执行完）
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}

impl SourceState {
    /// 编译过滤与排序；任何错误都发生在访问存储之前
    fn compile(&self, request: &FindItemsRequest) -> EngineResult<(CompiledPredicate, Option<String>)> {
        let filter = FilterCompiler::new(self.mapping).compile(request.filter.as_ref())?;
        let order_by = compile_sort(request.sort.as_ref(), self.mapping)?;

        let mut selection = CompiledPredicate::new(
            format!("{COL_MEDIA_TYPE} != ?"),
            vec![SqlArg::Integer(MEDIA_TYPE_NONE)],
        );
        // 组合条件自带括号，和基础条件直接 AND
        selection = selection.and(filter);
        if let Some(folder_id) = request.folder_id {
            selection = selection.and(CompiledPredicate::new(
                format!("{COL_PARENT} = ?"),
                vec![SqlArg::Integer(folder_id)],
            ));
        }
        Ok((selection, order_by))
    }

    fn find_items(&self, request: &FindItemsRequest) -> EngineResult<MediaItemCollection> {
        let start = Instant::now();
        let (selection, order_by) = self.compile(request)?;
        debug!("[Query] WHERE {} {:?} ORDER BY {:?}", selection.template, selection.args, order_by);

        let columns = self.mapping.projection();
        let query = StoreQuery::new(FILES_TABLE, &columns, &selection)
            .order_by(order_by.as_deref())
            .page(request.count, request.offset);
        let mut cursor = self.store.query(&query)?;

        let mut collection = MediaItemCollection::default();
        while let Some(row) = cursor.next_row() {
            if let Some(item) = self.build_item(&row)? {
                collection.push(item);
            }
        }
        cursor.close();

        debug!("[Query] 返回 {} 个条目, 耗时 {} ms", collection.size, start.elapsed().as_millis());
        Ok(collection)
    }

    fn build_item(&self, row: &Row) -> EngineResult<Option<MediaItem>> {
        let values = self.mapping.read_row(|column| row.get(column))?;
        let Some(mut item) = MediaItem::from_values(&values) else {
            return Ok(None);
        };
        // 文件已被删除但索引还没更新
        let path = Path::new(&item.item_uri);
        if !path.exists() {
            debug!("[Query] 跳过不存在的文件 {}", item.item_uri);
            return Ok(None);
        }
        if item.needs_tags() && self.tags.is_supported(path) {
            item.enrich(&self.tags.extract(path));
        }
        item.fill_unknown();
        Ok(Some(item))
    }

    fn get_folders(&self) -> EngineResult<Vec<MediaFolder>> {
        match self.strategy {
            FolderStrategy::StandardFolders => self.standard_folders(),
            FolderStrategy::All => self.media_folders(),
        }
    }

    /// 存在且已索引的标准目录
    fn standard_folders(&self) -> EngineResult<Vec<MediaFolder>> {
        let mut folders = Vec::new();
        for name in STANDARD_FOLDERS {
            let path = self.media_root.join(name);
            if !path.is_dir() {
                continue;
            }
            let uri = path.to_string_lossy().to_string();
            let Some(id) = self.store.find_id(&uri)? else {
                debug!("[Source] 标准目录尚未索引: {}", uri);
                continue;
            };
            let modified_date = self.store.modified_time(&uri)?.map(|s| s * 1000);
            folders.push(MediaFolder {
                id,
                folder_uri: uri,
                title: name.to_string(),
                storage_type: self.storage_type,
                modified_date,
            });
        }
        Ok(folders)
    }

    /// 所有直接包含媒体文件的目录
    fn media_folders(&self) -> EngineResult<Vec<MediaFolder>> {
        let media = CompiledPredicate::new(
            format!("{COL_MEDIA_TYPE} IN (?, ?, ?) AND {COL_PARENT} IS NOT NULL"),
            vec![
                SqlArg::Integer(MEDIA_TYPE_AUDIO),
                SqlArg::Integer(MEDIA_TYPE_VIDEO),
                SqlArg::Integer(MEDIA_TYPE_IMAGE),
            ],
        );
        let parent_column = [COL_PARENT];
        let mut cursor = self.store.query(
            &StoreQuery::new(FILES_TABLE, &parent_column, &media).distinct(),
        )?;
        let mut parents = Vec::new();
        while let Some(row) = cursor.next_row() {
            if let Some(id) = row.get_i64(COL_PARENT) {
                parents.push(SqlArg::Integer(id));
            }
        }
        cursor.close();

        if parents.is_empty() {
            return Ok(Vec::new());
        }

        let selection = CompiledPredicate::new(
            format!("{COL_ID} IN ({})", vec!["?"; parents.len()].join(", ")),
            parents,
        );
        let columns = [COL_ID, COL_DATA, COL_TITLE, COL_DATE_MODIFIED];
        let mut cursor = self.store.query(
            &StoreQuery::new(FILES_TABLE, &columns, &selection).order_by(Some(COL_DATA)),
        )?;
        let mut folders = Vec::new();
        while let Some(row) = cursor.next_row() {
            let (Some(id), Some(uri)) = (row.get_i64(COL_ID), row.get_str(COL_DATA)) else {
                continue;
            };
            folders.push(MediaFolder {
                id,
                folder_uri: uri.to_string(),
                title: row.get_str(COL_TITLE).unwrap_or_default().to_string(),
                storage_type: self.storage_type,
                modified_date: row.get_i64(COL_DATE_MODIFIED).map(|s| s * 1000),
            });
        }
        cursor.close();
        Ok(folders)
    }
}
