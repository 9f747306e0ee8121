//! Core client database reader module

pub mod codec;
pub mod decode;
pub mod format;
pub mod iter;
pub mod reader;
pub mod sections;
pub mod types;
pub mod utils;

pub use reader::DbFile;
pub use types::error::{DbError, Result};
