//! File handles and the filesystem services behind them.
//!
//! [`file::File`] is the entry point; [`files::Files`] abstracts the
//! primitives it performs, [`hash`] computes content digests and
//! [`response::BinaryResponse`] describes downloads.

pub mod file;
pub mod files;
pub mod hash;
pub mod response;

pub use file::{strip_bom, File, PathParts};
pub use files::{Files, LocalFiles};
pub use response::{ascii_fold, BinaryResponse};
