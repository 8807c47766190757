// engine/mod.rs - 媒体源抽象层
//! 提供统一的本地媒体查询接口

pub mod core;
pub mod builder;
pub mod item;

pub use self::core::*;
pub use self::builder::*;
pub use self::item::*;
