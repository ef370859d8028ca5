//! Re-exports the node's local environment configuration. `LocalConfig`
//! itself lives in `ocr-types` alongside the rest of the shared data model;
//! this module exists so callers can reach it as `ocr_runtime::config::LocalConfig`.

pub use ocr_types::LocalConfig;
