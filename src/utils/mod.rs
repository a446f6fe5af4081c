pub mod screenshot;
pub mod wait;

pub use screenshot::ArtifactStore;
pub use wait::{poll_until, run_blocking, PollOutcome, WaitPolicy};
