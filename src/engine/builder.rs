// engine/builder.rs - 媒体源构建器
//! 使用 Builder 模式构建 LocalMediaSource

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::{AppConfig, FolderStrategy, CONFIG};
use crate::extract::TagExtractor;
use crate::indexer::MediaScanner;
use crate::pool::WorkerPool;
use crate::schema::MAPPING;
use crate::store::{MediaStore, SqliteStore};

use super::core::{EngineError, EngineResult, LocalMediaSource, SourceState};
use super::item::StorageType;

/// 媒体源构建器
#[derive(Default)]
pub struct LocalMediaSourceBuilder {
    config: Option<Arc<AppConfig>>,
    store: Option<Arc<dyn MediaStore>>,
    storage_path: Option<PathBuf>,
    in_memory: bool,
    media_root: Option<PathBuf>,
    volume: Option<String>,
    strategy: Option<FolderStrategy>,
    pool: Option<(usize, usize)>,
    tags: Option<Arc<TagExtractor>>,
}

impl LocalMediaSourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置配置；未设置时使用全局配置
    pub fn with_config(mut self, config: Arc<AppConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// 使用已有的存储
    pub fn with_store(mut self, store: Arc<dyn MediaStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 设置数据库文件路径
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// 使用内存数据库
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    pub fn with_media_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.media_root = Some(path.into());
        self
    }

    /// 卷名: "internal" / "external"
    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    pub fn with_strategy(mut self, strategy: FolderStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// 设置工作线程数和队列容量
    pub fn with_pool(mut self, workers: usize, queue_capacity: usize) -> Self {
        self.pool = Some((workers, queue_capacity));
        self
    }

    /// 替换标签读取链
    pub fn with_tag_extractor(mut self, tags: TagExtractor) -> Self {
        self.tags = Some(Arc::new(tags));
        self
    }

    /// 构建媒体源
    pub fn build(self) -> EngineResult<LocalMediaSource> {
        let config = self.config.unwrap_or_else(|| Arc::new(CONFIG.clone()));

        // 映射表的配置错误在启动时暴露，而不是等到第一次查询
        MAPPING.validate()?;

        let volume = self.volume.unwrap_or_else(|| config.source.volume.clone());
        let storage_type = StorageType::from_volume(&volume).ok_or_else(|| {
            EngineError::Config(format!(
                "unknown volume '{volume}', expected 'internal' or 'external'"
            ))
        })?;

        let media_root = self.media_root
            .unwrap_or_else(|| PathBuf::from(&config.paths.media_root));
        std::fs::create_dir_all(&media_root)?;
        let media_root = media_root.canonicalize()?;

        let store: Arc<dyn MediaStore> = match self.store {
            Some(store) => store,
            None if self.in_memory => Arc::new(SqliteStore::open_in_memory()?),
            None => {
                let path = self.storage_path
                    .unwrap_or_else(|| PathBuf::from(&config.paths.storage_path));
                Arc::new(SqliteStore::open(path)?)
            }
        };

        let tags = self.tags.unwrap_or_else(|| Arc::new(TagExtractor::new()));
        let scanner = Arc::new(MediaScanner::new(
            media_root.clone(),
            Arc::clone(&store),
            Arc::clone(&tags),
            config.walker.clone(),
        ));

        let (workers, queue_capacity) = self.pool
            .unwrap_or((config.pool.workers, config.pool.queue_capacity));
        let pool = WorkerPool::new(workers, queue_capacity)?;

        let strategy = self.strategy.unwrap_or(config.source.folder_strategy);
        info!(
            "[Source] 媒体根目录 {} ({:?}, {:?}, {} 个工作线程)",
            media_root.display(), storage_type, strategy, pool.size()
        );

        Ok(LocalMediaSource {
            state: Arc::new(SourceState {
                store,
                mapping: &MAPPING,
                tags,
                scanner,
                media_root,
                storage_type,
                strategy,
            }),
            pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builder() {
        let temp_dir = tempdir().unwrap();

        let result = LocalMediaSourceBuilder::new()
            .with_storage_path(temp_dir.path().join("db/media.db"))
            .with_media_root(temp_dir.path().join("media"))
            .with_pool(1, 1)
            .build();

        assert!(result.is_ok());
        assert!(temp_dir.path().join("db/media.db").exists());
    }

    #[test]
    fn test_unknown_volume_is_config_error() {
        let temp_dir = tempdir().unwrap();
        let result = LocalMediaSourceBuilder::new()
            .in_memory()
            .with_media_root(temp_dir.path())
            .with_volume("sdcard2")
            .build();

        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
