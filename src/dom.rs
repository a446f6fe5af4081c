use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule identifying a DOM element.
///
/// Prefer `Id` and attribute-based `Css` selectors. Text and position based
/// rules break as soon as the markup shifts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locator {
    Id(String),
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }

    /// CSS form of the locator, when one exists.
    pub fn css_selector(&self) -> Option<String> {
        match self {
            Locator::Id(id) => Some(format!("#{}", id)),
            Locator::Css(selector) => Some(selector.clone()),
            Locator::XPath(_) => None,
        }
    }

    /// JavaScript expression evaluating to the first matching element or `null`.
    pub fn to_js(&self) -> String {
        match self {
            Locator::Id(id) => format!("document.getElementById({})", js_string(id)),
            Locator::Css(selector) => format!("document.querySelector({})", js_string(selector)),
            Locator::XPath(expression) => format!(
                "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_string(expression)
            ),
        }
    }

    /// JavaScript expression evaluating to the number of matching elements.
    pub fn to_js_count(&self) -> String {
        match self {
            Locator::Id(_) => format!("({} ? 1 : 0)", self.to_js()),
            Locator::Css(selector) => format!(
                "document.querySelectorAll({}).length",
                js_string(selector)
            ),
            Locator::XPath(expression) => format!(
                "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength",
                js_string(expression)
            ),
        }
    }

    /// JavaScript expression evaluating to the element's `textContent`, or
    /// `null` when nothing matches. `innerText` would fold the label's
    /// surrounding whitespace.
    pub fn to_js_text(&self) -> String {
        format!(
            "(function() {{ const element = {}; return element ? element.textContent : null; }})()",
            self.to_js()
        )
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "id `{}`", id),
            Locator::Css(selector) => write!(f, "css `{}`", selector),
            Locator::XPath(expression) => write!(f, "xpath `{}`", expression),
        }
    }
}

// JSON string literals are valid JavaScript string literals.
fn js_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}

/// Locators making up the to-do application's DOM contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPage {
    pub task_input: Locator,
    pub add_button: Locator,
    /// Every rendered entry.
    pub entries: Locator,
    /// The newest entry, delete control included.
    pub last_entry: Locator,
    /// Text-bearing element inside the newest entry.
    pub last_entry_label: Locator,
}

impl Default for TodoPage {
    fn default() -> Self {
        Self {
            task_input: Locator::id("taskInput"),
            add_button: Locator::css(r#"button[onclick="addTask()"]"#),
            entries: Locator::css("ul#taskList li"),
            last_entry: Locator::css("ul#taskList li:last-child"),
            last_entry_label: Locator::css("ul#taskList li:last-child span"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_quoted_for_javascript() {
        let page = TodoPage::default();
        assert_eq!(
            page.add_button.to_js(),
            r#"document.querySelector("button[onclick=\"addTask()\"]")"#
        );
        assert_eq!(
            page.task_input.to_js(),
            r#"document.getElementById("taskInput")"#
        );
        assert_eq!(
            page.entries.to_js_count(),
            r#"document.querySelectorAll("ul#taskList li").length"#
        );
    }

    #[test]
    fn id_locators_have_a_css_form_and_xpath_does_not() {
        assert_eq!(
            Locator::id("taskInput").css_selector().as_deref(),
            Some("#taskInput")
        );
        assert_eq!(Locator::xpath("//ul/li[last()]").css_selector(), None);
        assert!(Locator::xpath("//ul/li[last()]")
            .to_js_count()
            .contains("snapshotLength"));
    }

    #[test]
    fn label_text_is_read_verbatim() {
        let script = TodoPage::default().last_entry_label.to_js_text();
        assert!(script.contains(r#"document.querySelector("ul#taskList li:last-child span")"#));
        assert!(script.contains("element.textContent"));
        assert!(!script.contains("innerText"));
    }

    #[test]
    fn display_names_the_strategy() {
        assert_eq!(Locator::id("taskInput").to_string(), "id `taskInput`");
        assert_eq!(
            TodoPage::default().last_entry_label.to_string(),
            "css `ul#taskList li:last-child span`"
        );
    }
}
