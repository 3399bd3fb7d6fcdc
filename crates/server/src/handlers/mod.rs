//! HTTP request handlers.

mod chunked;
mod common;
mod files;

pub use chunked::*;
pub use common::*;
pub use files::*;
