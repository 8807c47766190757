// 配置模块 - 支持外部配置文件
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// 配置文件路径
const CONFIG_FILE: &str = "./config.toml";

// ============== 配置结构体 ==============

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub source: SourceConfig,
    pub walker: WalkerConfig,
    pub pool: PoolConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// 媒体根目录（相当于外部存储根目录）
    pub media_root: String,
    /// 媒体索引数据库文件
    pub storage_path: String,
}

/// 目录列举策略
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FolderStrategy {
    /// 所有包含媒体文件的目录
    All,
    /// 只列出 Music/Pictures/Movies/Download/DCIM
    StandardFolders,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// 卷名: "internal" 或 "external"
    pub volume: String,
    pub folder_strategy: FolderStrategy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalkerConfig {
    /// 是否启用 ripgrep 风格遍历
    pub use_ripgrep_walker: bool,
    /// 是否遵循 .gitignore 规则
    pub respect_gitignore: bool,
    /// 是否跳过隐藏文件
    pub skip_hidden: bool,
    /// 是否跟随符号链接
    pub follow_symlinks: bool,
    /// 最大遍历深度 (0 表示无限制)
    pub max_depth: usize,
    /// 自定义忽略模式 (glob)
    pub custom_ignore_patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    /// 后台工作线程数
    pub workers: usize,
    /// 任务队列容量，队列满时提交会阻塞
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// findItems 未指定 count 时的默认值
    pub default_count: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// tracing 过滤级别，RUST_LOG 优先
    pub level: String,
}

// ============== 默认配置 ==============

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            use_ripgrep_walker: false,
            respect_gitignore: false,
            skip_hidden: true,
            follow_symlinks: false,
            max_depth: 0,
            custom_ignore_patterns: vec![
                "*.tmp".to_string(),
                "*.part".to_string(),
                ".thumbnails".to_string(),
            ],
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                media_root: "./media".to_string(),
                storage_path: "./storage/media.db".to_string(),
            },
            source: SourceConfig {
                volume: "external".to_string(),
                folder_strategy: FolderStrategy::All,
            },
            walker: WalkerConfig::default(),
            pool: PoolConfig {
                workers: 4,
                queue_capacity: 64,
            },
            query: QueryConfig {
                default_count: 20,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

// ============== 配置加载 ==============

impl AppConfig {
    /// 从配置文件加载，失败则使用默认配置
    pub fn load() -> Self {
        Self::load_from_file(CONFIG_FILE).unwrap_or_else(|e| {
            // 此时日志还没初始化
            eprintln!(" [Config] 无法加载配置文件 '{}': {}", CONFIG_FILE, e);
            eprintln!(" [Config] 使用默认配置");
            Self::default()
        })
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// 生成默认配置文件
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
        let default_content = include_str!("../config.toml");
        fs::write(path, default_content)?;
        Ok(())
    }
}

// ============== 全局配置实例 ==============

/// 全局配置实例 (懒加载)
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::load);
