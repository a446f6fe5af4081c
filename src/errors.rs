use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Browser session error: {0}")]
    SessionFailed(String),

    #[error("Element not found: {locator}")]
    ElementNotFound {
        locator: String,
        screenshot: Option<PathBuf>,
    },

    #[error(
        "Timed out after {timeout:?} waiting for {locator} to contain {expected:?} (last observed: {observed:?})"
    )]
    WaitTimeout {
        locator: String,
        expected: String,
        observed: Option<String>,
        timeout: Duration,
        screenshot: Option<PathBuf>,
    },

    #[error("Text mismatch at {locator}: expected {expected:?}, got {observed:?}")]
    AssertionMismatch {
        locator: String,
        expected: String,
        observed: String,
        screenshot: Option<PathBuf>,
    },

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProbeError>;

/// Coarse classification used to decide whether a failure gets a screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ElementNotFound,
    WaitTimeout,
    AssertionMismatch,
    Session,
}

// headless_chrome reports everything through anyhow
impl From<anyhow::Error> for ProbeError {
    fn from(err: anyhow::Error) -> Self {
        ProbeError::SessionFailed(err.to_string())
    }
}

impl ProbeError {
    pub fn element_not_found(locator: impl ToString) -> Self {
        ProbeError::ElementNotFound {
            locator: locator.to_string(),
            screenshot: None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProbeError::ElementNotFound { .. } => FailureKind::ElementNotFound,
            ProbeError::WaitTimeout { .. } => FailureKind::WaitTimeout,
            ProbeError::AssertionMismatch { .. } => FailureKind::AssertionMismatch,
            _ => FailureKind::Session,
        }
    }

    /// True for failures of the page under test rather than of the browser session.
    pub fn is_test_failure(&self) -> bool {
        self.kind() != FailureKind::Session
    }

    /// Attaches a diagnostic screenshot path. Session-level errors are returned unchanged.
    pub fn with_screenshot(mut self, path: Option<PathBuf>) -> Self {
        match &mut self {
            ProbeError::ElementNotFound { screenshot, .. }
            | ProbeError::WaitTimeout { screenshot, .. }
            | ProbeError::AssertionMismatch { screenshot, .. } => *screenshot = path,
            _ => {}
        }
        self
    }

    pub fn screenshot(&self) -> Option<&Path> {
        match self {
            ProbeError::ElementNotFound { screenshot, .. }
            | ProbeError::WaitTimeout { screenshot, .. }
            | ProbeError::AssertionMismatch { screenshot, .. } => screenshot.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_test_failures_and_session_failures() {
        assert_eq!(
            ProbeError::element_not_found("#taskInput").kind(),
            FailureKind::ElementNotFound
        );
        assert!(ProbeError::element_not_found("#taskInput").is_test_failure());
        assert!(!ProbeError::LaunchFailed("no chrome".into()).is_test_failure());
        assert!(!ProbeError::from(anyhow::anyhow!("socket closed")).is_test_failure());
    }

    #[test]
    fn screenshot_attaches_only_to_test_failures() {
        let path = PathBuf::from("artifacts/screenshots/x.png");

        let mismatch = ProbeError::AssertionMismatch {
            locator: "span".into(),
            expected: "a".into(),
            observed: "b".into(),
            screenshot: None,
        }
        .with_screenshot(Some(path.clone()));
        assert_eq!(mismatch.screenshot(), Some(path.as_path()));

        let session = ProbeError::SessionFailed("gone".into()).with_screenshot(Some(path));
        assert_eq!(session.screenshot(), None);
    }

    #[test]
    fn timeout_message_names_expected_and_observed() {
        let err = ProbeError::WaitTimeout {
            locator: "css `ul#taskList li:last-child span`".into(),
            expected: "Buy groceries".into(),
            observed: Some("Walk dog".into()),
            timeout: Duration::from_secs(8),
            screenshot: None,
        };
        let message = err.to_string();
        assert!(message.contains("\"Buy groceries\""));
        assert!(message.contains("Walk dog"));
        assert!(message.contains("8s"));
    }
}
