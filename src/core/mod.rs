pub mod config;
pub mod driver;

pub use config::{ConfigOverrides, FixtureConfig};
pub use driver::PageDriver;
