pub mod config;
pub mod fetch;
pub mod index;
pub mod judge;
pub mod model;
pub mod oracle;
pub mod providers;
pub mod query;
pub mod research;
pub mod storage;

#[cfg(test)]
mod testing;

pub const USER_AGENT: &str = concat!("sift/", env!("CARGO_PKG_VERSION"));
