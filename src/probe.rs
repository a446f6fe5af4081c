use crate::core::PageDriver;
use crate::dom::TodoPage;
use crate::errors::{ProbeError, Result};
use crate::utils::{poll_until, ArtifactStore, PollOutcome, WaitPolicy};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_FAILURE_PREFIX: &str = "probe_failure";
pub const WALKTHROUGH_SCREENSHOT: &str = "simple_add_task_run";

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// Text read back from the newest entry.
    pub label: String,
    pub elapsed: Duration,
    pub attempts: u32,
}

/// Result of an unchecked run: what the page looked like right after the click.
#[derive(Debug, Clone, PartialEq)]
pub struct Walkthrough {
    pub screenshot: Option<PathBuf>,
    pub last_entry_text: Option<String>,
}

/// One user action followed by one bounded observation window.
pub struct AssertionProbe<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    page: TodoPage,
    policy: WaitPolicy,
    artifacts: ArtifactStore,
    failure_prefix: String,
}

impl<'a, D: PageDriver + ?Sized> AssertionProbe<'a, D> {
    pub fn new(driver: &'a D, page: TodoPage, policy: WaitPolicy, artifacts: ArtifactStore) -> Self {
        Self {
            driver,
            page,
            policy,
            artifacts,
            failure_prefix: DEFAULT_FAILURE_PREFIX.to_string(),
        }
    }

    /// Screenshot filename prefix used when a check fails.
    pub fn named(mut self, prefix: impl Into<String>) -> Self {
        self.failure_prefix = prefix.into();
        self
    }

    /// Clears the input, types `label` and activates the add control.
    ///
    /// Both elements must already be present; nothing here waits.
    pub async fn perform_add(&self, label: &str) -> Result<()> {
        let page = &self.page;

        if !self.driver.element_exists(&page.task_input).await? {
            return Err(ProbeError::element_not_found(&page.task_input));
        }
        debug!("Found task input element");

        if !self.driver.element_exists(&page.add_button).await? {
            return Err(ProbeError::element_not_found(&page.add_button));
        }
        debug!("Found add control");

        self.driver.clear_input(&page.task_input).await?;
        self.driver.type_text(&page.task_input, label).await?;
        self.driver.click(&page.add_button).await?;
        info!("Clicked add control with text: {}", label);

        Ok(())
    }

    /// Polls the newest entry's label until it contains `expected`, then
    /// requires the text to equal `expected` exactly.
    pub async fn await_label(&self, expected: &str) -> Result<ProbeReport> {
        let locator = &self.page.last_entry_label;
        let driver = self.driver;

        let outcome = poll_until(
            self.policy,
            move || driver.element_text(locator),
            |text: &Option<String>| text.as_deref().is_some_and(|t| t.contains(expected)),
        )
        .await?;

        match outcome {
            PollOutcome::Satisfied {
                value,
                elapsed,
                attempts,
            } => {
                let observed = value.unwrap_or_default();
                if observed != expected {
                    return Err(ProbeError::AssertionMismatch {
                        locator: locator.to_string(),
                        expected: expected.to_string(),
                        observed,
                        screenshot: None,
                    });
                }

                Ok(ProbeReport {
                    label: observed,
                    elapsed,
                    attempts,
                })
            }
            PollOutcome::TimedOut { last, attempts, .. } => {
                debug!("Gave up on {} after {} reads", locator, attempts);
                Err(ProbeError::WaitTimeout {
                    locator: locator.to_string(),
                    expected: expected.to_string(),
                    observed: last.flatten(),
                    timeout: self.policy.timeout,
                    screenshot: None,
                })
            }
        }
    }

    /// Adds `label` and verifies it shows up as the newest entry.
    ///
    /// Test failures (missing element, timeout, mismatch) come back with a
    /// screenshot path attached when one could be written. Session failures
    /// are returned as they are.
    pub async fn add_and_verify(&self, label: &str) -> Result<ProbeReport> {
        let result = match self.perform_add(label).await {
            Ok(()) => self.await_label(label).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                info!(
                    "Task added and verified: {} ({} reads, {:?})",
                    report.label, report.attempts, report.elapsed
                );
                Ok(report)
            }
            Err(e) if e.is_test_failure() => {
                error!("Check failed: {}", e);
                let screenshot = self
                    .artifacts
                    .capture(self.driver, &self.failure_prefix)
                    .await;
                Err(e.with_screenshot(screenshot))
            }
            Err(e) => {
                error!("Browser session failed: {}", e);
                Err(e)
            }
        }
    }

    pub async fn entry_count(&self) -> Result<usize> {
        self.driver.count_elements(&self.page.entries).await
    }

    /// Performs the add action without waiting or asserting, then records a
    /// screenshot and whatever the last entry shows at that instant.
    pub async fn walkthrough(&self, label: &str) -> Result<Walkthrough> {
        self.perform_add(label).await?;

        let screenshot = match self.driver.take_screenshot().await {
            Ok(bytes) => match self.artifacts.save_named(WALKTHROUGH_SCREENSHOT, &bytes).await {
                Ok(path) => {
                    info!("Screenshot saved to {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    warn!("Could not write screenshot: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Could not take screenshot: {}", e);
                None
            }
        };

        let last_entry_text = match self.driver.element_text(&self.page.last_entry).await {
            Ok(Some(text)) => {
                info!("Last list item text: {}", text);
                Some(text)
            }
            Ok(None) => {
                info!("Could not read last list item (no waits used)");
                None
            }
            Err(e) => {
                warn!("Could not read last list item: {}", e);
                None
            }
        };

        Ok(Walkthrough {
            screenshot,
            last_entry_text,
        })
    }
}
