pub mod autocomplete;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod import;
pub mod kaggle;
pub mod output;
pub mod publish;
pub mod retrieval;
