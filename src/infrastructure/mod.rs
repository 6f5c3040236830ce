//! 基础设施层
//!
//! 持有磁盘资源，只暴露读写能力，不认识 Run 的流程

pub mod archive;
pub mod cache;

pub use archive::RunArchive;
pub use cache::{CacheKey, CacheStore, FsCache, MemoryCache};
