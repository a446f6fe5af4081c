//! Per-test browser session with a known-empty starting state.

use crate::browser::BrowserSession;
use crate::core::{FixtureConfig, PageDriver};
use crate::errors::{ProbeError, Result};
use crate::probe::AssertionProbe;
use crate::utils::{poll_until, ArtifactStore, WaitPolicy};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Owns one browser session for the duration of one test.
///
/// Opening the fixture loads the application, wipes its `localStorage` and
/// reloads, so the page starts from an empty task list. The session is
/// released by [`SessionFixture::close`] or, on any other exit path
/// (early `?` return, assertion panic), when the fixture is dropped.
pub struct SessionFixture<D: PageDriver> {
    driver: D,
    config: FixtureConfig,
    session_id: Uuid,
    released: bool,
}

impl SessionFixture<BrowserSession> {
    /// Launches Chrome and prepares the page.
    pub async fn launch(config: FixtureConfig) -> Result<Self> {
        config.validate()?;
        let driver = BrowserSession::new(config.browser.clone(), config.wait_timeout()).await?;
        Self::open(driver, config).await
    }
}

impl<D: PageDriver> SessionFixture<D> {
    /// Takes ownership of `driver` and prepares the page. If preparation
    /// fails the driver is released before the error is returned.
    pub async fn open(driver: D, config: FixtureConfig) -> Result<Self> {
        let fixture = Self {
            driver,
            config,
            session_id: Uuid::new_v4(),
            released: false,
        };
        fixture.prepare().await?;
        Ok(fixture)
    }

    async fn prepare(&self) -> Result<()> {
        info!(session = %self.session_id, "Opening {}", self.config.app_url);
        self.driver.navigate(&self.config.app_url).await?;

        // Best effort: a page that refuses storage access still gets tested
        match self.driver.clear_local_storage().await {
            Ok(()) => info!(session = %self.session_id, "Cleared localStorage"),
            Err(e) => warn!(
                session = %self.session_id,
                "Could not clear localStorage; continuing: {}", e
            ),
        }

        self.driver.reload().await?;
        self.wait_for_page_load().await?;

        let entries = self.driver.count_elements(&self.config.page.entries).await?;
        if entries > 0 {
            warn!(
                session = %self.session_id,
                "Task list not empty after reset ({} entries)", entries
            );
        } else {
            debug!(session = %self.session_id, "Task list empty after reset");
        }

        Ok(())
    }

    /// Polls `document.readyState` until the page reports `complete`.
    pub async fn wait_for_page_load(&self) -> Result<()> {
        let driver = &self.driver;
        let outcome = poll_until(
            self.wait_policy(),
            move || driver.is_page_loaded(),
            |loaded| *loaded,
        )
        .await?;

        if outcome.is_satisfied() {
            Ok(())
        } else {
            Err(ProbeError::NavigationFailed(format!(
                "Page load timeout after {:?}",
                self.config.wait_timeout()
            )))
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(self.config.wait_timeout(), self.config.poll_interval())
    }

    /// Probe bound to this session, using the configured contract, waits and
    /// artifact directory.
    pub fn probe(&self) -> AssertionProbe<'_, D> {
        AssertionProbe::new(
            &self.driver,
            self.config.page.clone(),
            self.wait_policy(),
            ArtifactStore::new(&self.config.artifacts_dir),
        )
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.driver.close();
        info!(session = %self.session_id, "Session released");
    }
}

impl<D: PageDriver> fmt::Debug for SessionFixture<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFixture")
            .field("session_id", &self.session_id)
            .field("app_url", &self.config.app_url)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl<D: PageDriver> Drop for SessionFixture<D> {
    fn drop(&mut self) {
        self.release();
    }
}
