use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info};

use super::agent::Page;
use super::dom;
use super::step::{EXTRACT_MAX_CHARS, Extraction, PageState, Step, truncate_chars};
use crate::backend::{BrowserConfig, BrowserHandle};

const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

/// A Chrome process owned by one run.
pub struct ChromeBrowser {
    // Dropping the inner browser kills the process.
    inner: Mutex<Option<Browser>>,
}

impl ChromeBrowser {
    /// Launches Chrome. Blocks until the DevTools connection is up.
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let options = LaunchOptions {
            headless: config.headless,
            path: config.chrome_path.clone(),
            window_size: Some((1280, 900)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: IDLE_BROWSER_TIMEOUT,
            ..Default::default()
        };

        info!(headless = config.headless, "Starting Chrome");
        let browser = Browser::new(options).map_err(|e| anyhow!("Browser launch failed: {}", e))?;
        debug!(pid = ?browser.get_process_id(), "Chrome started");

        Ok(Self {
            inner: Mutex::new(Some(browser)),
        })
    }

    /// Opens a fresh blank tab for a task.
    pub fn open_page(&self) -> Result<TabPage> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("browser lock poisoned"))?;
        let browser = guard.as_ref().ok_or_else(|| anyhow!("browser is closed"))?;
        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        Ok(TabPage { tab })
    }

    /// Takes the browser out so it is dropped (and the process killed) only
    /// once, by whoever gets it first.
    fn take(&self) -> Result<Browser> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("browser lock poisoned"))?
            .take()
            .ok_or_else(|| anyhow!("browser already closed"))
    }
}

#[async_trait]
impl BrowserHandle for ChromeBrowser {
    async fn close(&self) -> Result<()> {
        let browser = self.take()?;
        debug!(pid = ?browser.get_process_id(), "Stopping Chrome");
        // Dropping sends Browser.Close, then kills and reaps the child.
        tokio::task::spawn_blocking(move || drop(browser))
            .await
            .context("browser shutdown panicked")
    }
}

/// A single tab the agent acts on.
#[derive(Clone)]
pub struct TabPage {
    tab: Arc<Tab>,
}

impl Page for TabPage {
    fn perform(&self, step: &Step) -> Result<Option<Extraction>> {
        let tab = &self.tab;
        match step {
            Step::Navigate { url } => {
                tab.navigate_to(url)?;
                tab.wait_until_navigated()?;
                tab.wait_for_element("body")?;
            }
            Step::WaitFor {
                selector,
                timeout_ms,
            } => {
                tab.wait_for_element_with_custom_timeout(
                    selector,
                    Duration::from_millis(*timeout_ms),
                )?;
            }
            Step::TypeInto { selector, text } => {
                tab.find_element(selector)?.click()?;
                let js_sel = super::step::js_selector(selector);
                tab.evaluate(
                    &format!("document.querySelector('{js_sel}').value = ''"),
                    false,
                )?;
                tab.type_str(text)?;
            }
            Step::Click { selector } => {
                tab.find_element(selector)?.click()?;
                std::thread::sleep(Duration::from_millis(1000));
            }
            Step::PressKey { key } => {
                tab.press_key(key)?;
                std::thread::sleep(Duration::from_millis(1000));
            }
            Step::Extract { selector, label } => {
                let content = dom::inner_text(tab, selector)?;
                return Ok(Some(Extraction {
                    label: label.clone(),
                    content: truncate_chars(&content, EXTRACT_MAX_CHARS),
                }));
            }
            Step::Screenshot | Step::Done { .. } => {}
        }
        Ok(None)
    }

    fn observe(&self, dom_max_chars: usize) -> PageState {
        PageState {
            url: dom::current_url(&self.tab).unwrap_or_else(|_| "unknown".into()),
            title: dom::page_title(&self.tab).unwrap_or_else(|_| "untitled".into()),
            dom_snapshot: dom::capture_dom_snapshot(&self.tab, dom_max_chars).unwrap_or_default(),
            extracted: None,
            error: None,
        }
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closing_a_closed_browser_is_an_error() {
        let browser = ChromeBrowser {
            inner: Mutex::new(None),
        };
        let err = browser.close().await.unwrap_err();
        assert_eq!(err.to_string(), "browser already closed");
        assert!(browser.open_page().is_err());
    }
}
