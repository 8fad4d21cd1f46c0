//! 指纹缓存
//!
//! 订单 ID → 最近接受的指纹。位于快照库之前的快速去重路径，
//! 可选地整文件镜像到磁盘。

mod fingerprint;

pub use fingerprint::{CacheError, FingerprintCache};
