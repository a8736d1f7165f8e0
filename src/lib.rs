// lib.rs
pub mod bin_index;
pub mod binning;
pub mod builder;
pub mod chunk;
pub mod config;
pub mod error;
pub mod index;
pub mod interval;
pub mod linear_index;
pub mod query;
pub mod region;
pub mod stream;
pub mod tbi;

pub use builder::{compress_and_index, index_bgzf, IndexBuilder};
pub use config::{Preset, TabixConfig};
pub use error::{Result, TabixError};
pub use index::TabixIndex;
pub use query::{Records, TabixReader};
pub use region::Region;
