//! `lrl-toolbox` - data preprocessing transformers and a locked on-disk file tree
//!
//! The [`preprocessing`] module provides column-wise numeric transformers
//! ([`Winsorizer`], [`CircularTransformer`]) with a fit/transform lifecycle.
//! The [`filetree`] module provides [`LocalFileTree`], an append-only store of
//! data files addressed by index and shared safely between processes.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod filetree;
pub mod logging;
pub mod preprocessing;

pub use config::Config;
pub use error::{Error, Result};
pub use filetree::{DataFormat, FileTreeConfig, LocalFileTree, TreeDataEntry, TreeOptions};
pub use logging::init_logging;
pub use preprocessing::{CircularTransformer, Matrix, NanPolicy, Transformer, Winsorizer};
