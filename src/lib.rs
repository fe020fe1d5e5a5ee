pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod files;
pub mod logging;
pub mod state;
pub mod tools;
pub mod types;
pub mod ui;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;
