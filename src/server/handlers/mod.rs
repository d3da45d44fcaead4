//! HTTP request handlers.

pub mod ai;
pub mod elements;
pub mod export;
pub mod pointer;
pub mod sessions;
