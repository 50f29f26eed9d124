//! Application-wide configuration constants.

pub const NAME: &str = concat!("Comic Shelf ", env!("CARGO_PKG_VERSION"));
/// Number of inspected pages to keep per open comic.
pub const CACHE_SIZE: usize = 20;
/// Log filter used when neither `RUST_LOG` nor `-v` says otherwise.
pub const DEFAULT_LOG_LEVEL: &str = "warn";
