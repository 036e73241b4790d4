// storage-common: shared utilities for the storage platform services

pub mod config;
pub mod errors;
pub mod json;
pub mod logger;
pub mod pagination;
