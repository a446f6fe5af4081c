pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod fixture;
pub mod probe;
pub mod testing;
pub mod types;
pub mod utils;

pub use browser::BrowserSession;
pub use crate::core::{ConfigOverrides, FixtureConfig, PageDriver};
pub use dom::{Locator, TodoPage};
pub use errors::{FailureKind, ProbeError};
pub use fixture::SessionFixture;
pub use probe::{AssertionProbe, ProbeReport, Walkthrough};
pub use types::*;
