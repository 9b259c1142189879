//! Storage Module
//!
//! Persistent key-value capabilities for the durable mirror.
//!
//! # Backends
//! - `MemoryKvStore`: in-process map with a byte quota (tests, ephemeral hosts)
//! - `FileKvStore`: one file per key under a directory

mod file;
mod memory;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;
