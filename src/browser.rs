use crate::core::PageDriver;
use crate::dom::Locator;
use crate::errors::{ProbeError, Result};
use crate::types::BrowserConfig;
use crate::utils::run_blocking;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A Chrome process with a single tab, driven over the DevTools protocol.
///
/// `headless_chrome` calls block their thread. Each one runs on tokio's
/// blocking pool, where a bounded wait can abandon it.
pub struct BrowserSession {
    // Dropping the browser kills the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
    closed: bool,
}

impl BrowserSession {
    /// Launches Chrome. `call_timeout` becomes the tab's default timeout for
    /// navigation and element waits.
    pub async fn new(config: BrowserConfig, call_timeout: Duration) -> Result<Self> {
        let launch_args = config.launch_args();

        let (browser, tab) = run_blocking(move || {
            let args: Vec<&OsStr> = launch_args.iter().map(OsStr::new).collect();

            // The headless switch is in `launch_args`; the builder's own flag
            // would select the legacy headless mode
            let launch_options = LaunchOptions::default_builder()
                .headless(false)
                .args(args)
                .build()
                .map_err(|e| ProbeError::LaunchFailed(e.to_string()))?;

            let browser = Browser::new(launch_options)
                .map_err(|e| ProbeError::LaunchFailed(e.to_string()))?;
            let tab = browser.new_tab()?;
            Ok((browser, tab))
        })
        .await?;

        tab.set_default_timeout(call_timeout);

        debug!(
            "Launched Chrome (headless: {}, viewport: {}x{}, call timeout: {:?})",
            config.headless, config.viewport.width, config.viewport.height, call_timeout
        );

        Ok(Self {
            _browser: browser,
            tab,
            closed: false,
        })
    }

    pub async fn execute_javascript(&self, script: &str) -> Result<Value> {
        let script = script.to_string();
        self.on_tab(move |tab| {
            let result = tab
                .evaluate(&script, false)
                .map_err(|e| ProbeError::JavaScriptFailed(e.to_string()))?;
            Ok(result.value.unwrap_or(Value::Null))
        })
        .await
    }

    async fn on_tab<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        self.ensure_open()?;
        let tab = Arc::clone(&self.tab);
        run_blocking(move || call(&tab)).await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ProbeError::SessionFailed(
                "browser session already closed".to_string(),
            ));
        }
        Ok(())
    }
}

fn find_element<'t>(tab: &'t Tab, locator: &Locator) -> Result<Element<'t>> {
    let found = match locator {
        Locator::XPath(expression) => tab.find_element_by_xpath(expression),
        _ => {
            let selector = locator.css_selector().unwrap_or_default();
            tab.find_element(&selector)
        }
    };

    found.map_err(|e| {
        debug!("Lookup of {} failed: {}", locator, e);
        ProbeError::element_not_found(locator)
    })
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.on_tab(move |tab| {
            tab.navigate_to(&url)
                .map_err(|e| ProbeError::NavigationFailed(e.to_string()))?;

            // Wait for navigation to complete
            tab.wait_until_navigated()
                .map_err(|e| ProbeError::NavigationFailed(e.to_string()))?;

            Ok(())
        })
        .await
    }

    async fn reload(&self) -> Result<()> {
        self.on_tab(|tab| {
            tab.reload(false, None)
                .map_err(|e| ProbeError::NavigationFailed(e.to_string()))?;

            tab.wait_until_navigated()
                .map_err(|e| ProbeError::NavigationFailed(e.to_string()))?;

            Ok(())
        })
        .await
    }

    async fn clear_local_storage(&self) -> Result<()> {
        // Opaque origins throw a SecurityError on access; report it instead of a bare failure
        let js_code = r#"
            (function() {
                try {
                    window.localStorage.clear();
                    return true;
                } catch (e) {
                    return String(e);
                }
            })()
        "#;

        match self.execute_javascript(js_code).await? {
            Value::Bool(true) => Ok(()),
            other => Err(ProbeError::JavaScriptFailed(format!(
                "localStorage.clear() rejected: {}",
                other
            ))),
        }
    }

    async fn is_page_loaded(&self) -> Result<bool> {
        let value = self
            .execute_javascript("document.readyState === 'complete'")
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn element_exists(&self, locator: &Locator) -> Result<bool> {
        let value = self
            .execute_javascript(&format!("({}) !== null", locator.to_js()))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn count_elements(&self, locator: &Locator) -> Result<usize> {
        let value = self.execute_javascript(&locator.to_js_count()).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn element_text(&self, locator: &Locator) -> Result<Option<String>> {
        let value = self.execute_javascript(&locator.to_js_text()).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn clear_input(&self, locator: &Locator) -> Result<()> {
        let js_code = format!(
            r#"
            (function() {{
                const element = {};
                if (element) {{
                    element.value = '';
                    element.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    element.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return true;
                }}
                return false;
            }})()
        "#,
            locator.to_js()
        );

        if self.execute_javascript(&js_code).await?.as_bool() == Some(true) {
            return Ok(());
        }

        Err(ProbeError::element_not_found(locator))
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        let locator = locator.clone();
        let text = text.to_string();
        self.on_tab(move |tab| {
            // type_into clicks the field to focus it
            find_element(tab, &locator)?
                .type_into(&text)
                .map_err(|e| ProbeError::JavaScriptFailed(e.to_string()))?;

            Ok(())
        })
        .await
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let locator = locator.clone();
        self.on_tab(move |tab| {
            find_element(tab, &locator)?
                .click()
                .map_err(|e| ProbeError::JavaScriptFailed(e.to_string()))?;

            Ok(())
        })
        .await
    }

    async fn take_screenshot(&self) -> Result<Vec<u8>> {
        self.on_tab(|tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| ProbeError::ScreenshotFailed(e.to_string()))
        })
        .await
    }

    async fn current_url(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.tab.get_url())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.tab.close(true) {
            warn!("Closing the tab failed, Chrome exits with the session: {}", e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.close();
    }
}
