use crate::dom::Locator;
use crate::errors::Result;
use async_trait::async_trait;

/// Page operations the fixture and probe rely on.
///
/// One driver is one browser session showing one page. Implementations must
/// report a missing element as `ProbeError::ElementNotFound` and anything
/// that breaks the session itself as one of the session-level variants.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the navigation to commit
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Reload the current page
    async fn reload(&self) -> Result<()>;

    /// Remove everything in `window.localStorage` for the current origin
    async fn clear_local_storage(&self) -> Result<()>;

    /// Whether `document.readyState` has reached `complete`
    async fn is_page_loaded(&self) -> Result<bool>;

    async fn element_exists(&self, locator: &Locator) -> Result<bool>;

    async fn count_elements(&self, locator: &Locator) -> Result<usize>;

    /// Rendered text of the first match, `None` when nothing matches yet
    async fn element_text(&self, locator: &Locator) -> Result<Option<String>>;

    async fn clear_input(&self, locator: &Locator) -> Result<()>;

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()>;

    async fn click(&self, locator: &Locator) -> Result<()>;

    /// PNG screenshot of the viewport
    async fn take_screenshot(&self) -> Result<Vec<u8>>;

    async fn current_url(&self) -> Result<String>;

    /// Release the session. Must be idempotent; it also runs from `Drop`.
    fn close(&mut self);
}
