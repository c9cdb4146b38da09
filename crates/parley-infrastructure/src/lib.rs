//! Infrastructure layer for Parley.
//!
//! File-backed and in-memory implementations of the domain ports, plus the
//! configuration loader and an offline completion client.

pub mod config_service;
pub mod context_cache;
pub mod dto;
pub mod echo_client;
pub mod memory_session_repository;
pub mod paths;
pub mod storage;
pub mod toml_session_repository;

pub use config_service::ConfigService;
pub use context_cache::MemoryContextCache;
pub use echo_client::EchoCompletionClient;
pub use memory_session_repository::MemorySessionRepository;
pub use paths::ParleyPaths;
pub use toml_session_repository::TomlSessionRepository;
