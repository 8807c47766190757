// query/mod.rs - 查询模块
//! 过滤表达式、排序的编译，以及查询语法解析

pub mod error;
pub mod filter;
mod parser;
pub mod sort;
pub mod types;

pub use error::*;
pub use filter::*;
pub use parser::*;
pub use sort::*;
pub use types::*;
