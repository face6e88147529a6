//! Navigation session contract and its chromiumoxide-backed implementation.
//!
//! The engine never touches the browser crate directly: all navigation goes
//! through [`NavigationSession`] / [`ElementRef`], so tests can substitute
//! deterministic fakes and the session manager can swap handles on failure.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::{self, JoinHandle};
use tracing::{info, warn};

use crate::engine::errors::{ScrapeError, ScrapeResult};

/// User agent presented by scraping sessions
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// One element handle inside a live session.
///
/// Every accessor is individually failable; callers treat failures on
/// optional fields as null values, never as item-fatal errors.
#[async_trait]
pub trait ElementRef: Send + Sync {
    /// Attribute value, `None` when the attribute is absent
    async fn attribute(&self, name: &str) -> ScrapeResult<Option<String>>;

    /// Rendered inner text, `None` when empty
    async fn inner_text(&self) -> ScrapeResult<Option<String>>;

    /// Attribute of the first matching descendant
    async fn child_attribute(&self, selector: &str, name: &str) -> ScrapeResult<Option<String>>;

    /// Inner texts of all matching descendants, in document order
    async fn query_texts(&self, selector: &str) -> ScrapeResult<Vec<String>>;

    /// Click the element
    async fn click(&self) -> ScrapeResult<()>;
}

/// A live browsing context.
///
/// Exclusively owned by the session manager; other components obtain it
/// per-operation and must never cache it across a suspension point, since a
/// recreation invalidates all outstanding handles.
#[async_trait]
pub trait NavigationSession: Send + Sync {
    type Element: ElementRef;

    async fn navigate(&self, url: &str) -> ScrapeResult<()>;

    /// Cheap liveness probe; used by the manager's rate-limited health check
    async fn is_alive(&self) -> bool;

    /// Evaluate a script in the page and return its JSON value
    async fn run_script(&self, js: &str) -> ScrapeResult<Value>;

    /// All elements matching `selector`, in document order
    async fn locate_all(&self, selector: &str) -> ScrapeResult<Vec<Self::Element>>;

    /// Current page URL, if the page has navigated anywhere yet
    async fn current_url(&self) -> ScrapeResult<Option<String>>;

    /// Graceful teardown; the default relies on Drop
    async fn close(&mut self) {}
}

// =============================================================================
// chromiumoxide implementation
// =============================================================================

/// Wrapper for Browser and its event handler task.
///
/// The handler MUST be aborted when the browser goes away, otherwise it runs
/// indefinitely after the Chrome process exits.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Remove the temp profile directory.
    ///
    /// Must run after Chrome has released its file handles; uses blocking
    /// `std::fs` because it may be called from Drop.
    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();
        // Browser::drop kills the Chrome process
        if self.user_data_dir.is_some() {
            self.cleanup_temp_dir();
        }
    }
}

/// Find a Chrome/Chromium executable on the system.
///
/// `CHROMIUM_PATH` overrides everything; then well-known install paths, then
/// `which` on Unix.
pub fn find_browser_executable() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    let paths: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path_str in paths {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Some(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    return Some(PathBuf::from(path_str));
                }
            }
        }
    }

    None
}

/// Launch a browser with a unique temp profile and a tracked handler task.
async fn launch_browser(headless: bool) -> ScrapeResult<BrowserWrapper> {
    info!("Launching browser session");

    let user_data_dir = std::env::temp_dir().join(format!(
        "placescrape_chrome_{}_{}",
        std::process::id(),
        rand::random::<u32>()
    ));
    std::fs::create_dir_all(&user_data_dir)
        .map_err(|e| ScrapeError::Fatal(format!("failed to create user data directory: {e}")))?;

    let mut config = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir.clone())
        .headless_mode(if headless {
            HeadlessMode::default()
        } else {
            HeadlessMode::False
        })
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-background-networking")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-extensions")
        .arg("--disable-popup-blocking")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--mute-audio")
        .arg("--hide-scrollbars");

    if let Some(executable) = find_browser_executable() {
        config = config.chrome_executable(executable);
    }

    let config = config
        .build()
        .map_err(|e| ScrapeError::Fatal(format!("failed to build browser config: {e}")))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| ScrapeError::Fatal(format!("failed to launch browser: {e}")))?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!("Browser handler event error: {:?}", e);
            }
        }
    });

    Ok(BrowserWrapper::new(browser, handler_task, user_data_dir))
}

/// chromiumoxide-backed [`NavigationSession`] over a single page
pub struct BrowserSession {
    wrapper: BrowserWrapper,
    page: Page,
    navigation_timeout: Duration,
}

impl BrowserSession {
    /// Launch a fresh browser and open a blank page for it
    pub async fn launch(headless: bool, navigation_timeout: Duration) -> ScrapeResult<Self> {
        let wrapper = launch_browser(headless).await?;
        let page = wrapper
            .browser()
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Fatal(format!("failed to create page: {e}")))?;

        Ok(Self {
            wrapper,
            page,
            navigation_timeout,
        })
    }
}

#[async_trait]
impl NavigationSession for BrowserSession {
    type Element = PanelElement;

    async fn navigate(&self, url: &str) -> ScrapeResult<()> {
        let goto = async {
            self.page
                .goto(url)
                .await
                .map_err(ScrapeError::from_automation)?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(ScrapeError::from_automation)?;
            Ok(())
        };

        match tokio::time::timeout(self.navigation_timeout, goto).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Transient(format!(
                "navigation to {url} timed out after {:?}",
                self.navigation_timeout
            ))),
        }
    }

    async fn is_alive(&self) -> bool {
        self.wrapper.browser().version().await.is_ok()
    }

    async fn run_script(&self, js: &str) -> ScrapeResult<Value> {
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(ScrapeError::from_automation)?;
        result
            .into_value::<Value>()
            .map_err(|e| ScrapeError::Transient(format!("script result not deserializable: {e}")))
    }

    async fn locate_all(&self, selector: &str) -> ScrapeResult<Vec<Self::Element>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(ScrapeError::from_automation)?;
        Ok(elements.into_iter().map(PanelElement).collect())
    }

    async fn current_url(&self) -> ScrapeResult<Option<String>> {
        self.page.url().await.map_err(ScrapeError::from_automation)
    }

    async fn close(&mut self) {
        // Page::close takes ownership; Page is an Arc handle so a clone works
        if let Err(e) = self.page.clone().close().await {
            tracing::debug!("Failed to close page cleanly: {}", e);
        }
        if let Err(e) = self.wrapper.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.wrapper.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.wrapper.cleanup_temp_dir();
    }
}

/// Element handle backed by a chromiumoxide [`Element`]
pub struct PanelElement(Element);

#[async_trait]
impl ElementRef for PanelElement {
    async fn attribute(&self, name: &str) -> ScrapeResult<Option<String>> {
        self.0
            .attribute(name)
            .await
            .map_err(ScrapeError::from_automation)
    }

    async fn inner_text(&self) -> ScrapeResult<Option<String>> {
        self.0
            .inner_text()
            .await
            .map_err(ScrapeError::from_automation)
    }

    async fn child_attribute(&self, selector: &str, name: &str) -> ScrapeResult<Option<String>> {
        let child = match self.0.find_element(selector).await {
            Ok(el) => el,
            Err(_) => return Ok(None),
        };
        child.attribute(name).await.map_err(ScrapeError::from_automation)
    }

    async fn query_texts(&self, selector: &str) -> ScrapeResult<Vec<String>> {
        let children = match self.0.find_elements(selector).await {
            Ok(els) => els,
            Err(_) => return Ok(Vec::new()),
        };

        let mut texts = Vec::with_capacity(children.len());
        for child in children {
            if let Ok(Some(text)) = child.inner_text().await {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    texts.push(text);
                }
            }
        }
        Ok(texts)
    }

    async fn click(&self) -> ScrapeResult<()> {
        self.0
            .click()
            .await
            .map(|_| ())
            .map_err(ScrapeError::from_automation)
    }
}
