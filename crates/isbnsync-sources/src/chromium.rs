use crate::error::{FetchError, FetcherInitError};
use crate::traits::{FetcherProvider, PageFetcher, Row};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use which::which;

/// Reads cell text of every row matching the selector placeholder.
const READ_ROWS_JS: &str = r#"
    Array.from(document.querySelectorAll(__SELECTOR__)).map(function (tr) {
        return Array.from(tr.querySelectorAll('td')).map(function (td) {
            return td.innerText || '';
        });
    })
"#;

const CLEAR_STORAGE_JS: &str = "window.localStorage.clear(); window.sessionStorage.clear(); true";

/// How long to sleep between selector checks while waiting for the table to render
const RENDER_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub headless: bool,
    /// Wait after the row selector appears so templated cells get filled in
    pub settle: Duration,
    /// Parent of per-session profiles and of downloaded Chromium builds
    pub browser_dir: PathBuf,
}

/// Launches one headless Chromium per batch.
pub struct ChromiumProvider {
    options: ChromiumOptions,
}

impl ChromiumProvider {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl FetcherProvider for ChromiumProvider {
    async fn acquire(&self) -> Result<Box<dyn PageFetcher>, FetcherInitError> {
        let fetcher = ChromiumFetcher::launch(&self.options)
            .await
            .map_err(|e| FetcherInitError(e.to_string()))?;
        Ok(Box::new(fetcher))
    }
}

pub struct ChromiumFetcher {
    browser: Option<Browser>,
    handler_task: Option<tokio::task::JoinHandle<()>>,
    page: Option<Page>,
    settle: Duration,
    session_dir: PathBuf,
}

impl ChromiumFetcher {
    pub async fn launch(options: &ChromiumOptions) -> Result<Self> {
        let session_dir = options.browser_dir.join(generate_session_id());
        std::fs::create_dir_all(&session_dir)?;

        let chrome_path = match find_system_chromium() {
            Some(path) => path,
            None => download_chromium(&options.browser_dir).await?,
        };

        let config = build_browser_config(&chrome_path, &session_dir, options.headless)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            let mut error_count = 0;
            const MAX_ERRORS: usize = 10;

            while let Some(h) = handler.next().await {
                match h {
                    Ok(_) => error_count = 0,
                    Err(e) => {
                        error_count += 1;
                        warn!("Browser handler error (count: {}/{}): {:?}", error_count, MAX_ERRORS, e);
                        if error_count >= MAX_ERRORS {
                            error!("Browser handler received {} consecutive errors. Browser process may have crashed.", error_count);
                            break;
                        }
                    }
                }
            }
            debug!("Browser handler task ended");
        });

        info!("Browser launched (profile: {})", session_dir.display());

        Ok(Self {
            browser: Some(browser),
            handler_task: Some(handler_task),
            page: None,
            settle: options.settle,
            session_dir,
        })
    }

    async fn page(&mut self) -> Result<Page, FetchError> {
        if let Some(page) = &self.page {
            return Ok(page.clone());
        }
        let browser = self.browser.as_ref().ok_or_else(|| FetchError::Navigation {
            url: "about:blank".to_string(),
            message: "browser already released".to_string(),
        })?;
        let page = browser.new_page("about:blank").await.map_err(|e| FetchError::Navigation {
            url: "about:blank".to_string(),
            message: format!("failed to open tab: {}", e),
        })?;
        self.page = Some(page.clone());
        Ok(page)
    }
}

#[async_trait]
impl PageFetcher for ChromiumFetcher {
    fn fetcher_name(&self) -> &str {
        "chromium"
    }

    async fn fetch_rows(
        &mut self,
        url: &str,
        render_wait_selector: &str,
        render_timeout: Duration,
    ) -> Result<Vec<Row>, FetchError> {
        let page = self.page().await?;

        page.goto(url).await.map_err(|e| FetchError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let wait_for_rows = async {
            loop {
                if let Ok(elements) = page.find_elements(render_wait_selector).await {
                    if !elements.is_empty() {
                        return;
                    }
                }
                sleep(RENDER_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(render_timeout, wait_for_rows)
            .await
            .map_err(|_| FetchError::RenderTimeout {
                selector: render_wait_selector.to_string(),
                seconds: render_timeout.as_secs(),
            })?;

        sleep(self.settle).await;

        let selector_literal = serde_json::to_string(render_wait_selector)
            .map_err(|e| FetchError::Script(e.to_string()))?;
        let script = READ_ROWS_JS.replace("__SELECTOR__", &selector_literal);
        let cells: Vec<Vec<String>> = page
            .evaluate(script)
            .await
            .map_err(|e| FetchError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| FetchError::Script(e.to_string()))?;

        // Stop late requests so they don't bleed into the next navigation
        if let Err(e) = page.evaluate("window.stop(); true").await {
            debug!("window.stop() failed: {}", e);
        }

        Ok(cells.into_iter().map(|cells| Row { cells }).collect())
    }

    async fn release(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.evaluate(CLEAR_STORAGE_JS).await {
                debug!("Failed to clear page storage: {}", e);
            }
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.clear_cookies().await {
                warn!("Failed to clear browser cookies: {}", e);
            }
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
        }

        if let Some(handler_task) = self.handler_task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), handler_task).await;
        }

        remove_session_dir(&self.session_dir);
        info!("Browser instance shut down");
    }
}

impl Drop for ChromiumFetcher {
    fn drop(&mut self) {
        // release() was skipped (task cancelled or panicked); the child dies with `Browser`
        if self.browser.take().is_some() {
            warn!("Browser dropped without release; closing");
            if let Some(handler_task) = self.handler_task.take() {
                handler_task.abort();
            }
            remove_session_dir(&self.session_dir);
        }
    }
}

fn remove_session_dir(dir: &Path) {
    if !dir.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(dir) {
        warn!("Failed to remove browser profile {:?}: {}", dir, e);
    } else {
        debug!("Removed browser profile {:?}", dir);
    }
}

fn generate_session_id() -> String {
    format!("session_{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

/// Find a system Chromium/Chrome executable
fn find_system_chromium() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        let macos_paths = [
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/opt/homebrew/bin/chromium",
        ];
        for path in &macos_paths {
            if Path::new(path).exists() {
                return Some(PathBuf::from(path));
            }
        }
    }

    let system_paths = [
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/local/bin/chromium",
        "/opt/chromium/chromium",
    ];
    for path in &system_paths {
        if Path::new(path).exists() {
            return Some(PathBuf::from(path));
        }
    }

    which("chromium")
        .or_else(|_| which("chromium-browser"))
        .or_else(|_| which("google-chrome"))
        .ok()
}

async fn download_chromium(browser_dir: &Path) -> Result<PathBuf> {
    info!("No system Chromium found, downloading via BrowserFetcher...");
    let download_path = browser_dir.join("chromium_downloads");
    tokio::fs::create_dir_all(&download_path).await?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&download_path)
            .build()
            .map_err(|e| anyhow!("Failed to create BrowserFetcherOptions: {}", e))?,
    );
    let info = fetcher
        .fetch()
        .await
        .map_err(|e| anyhow!("Failed to fetch Chromium: {}", e))?;

    info!("Chromium downloaded to: {:?}", info.executable_path);
    Ok(info.executable_path)
}

fn build_browser_config(chrome_path: &Path, profile_dir: &Path, headless: bool) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .user_data_dir(profile_dir)
        .request_timeout(Duration::from_secs(20));

    if !headless {
        builder = builder.with_head();
    }

    builder = builder
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg("--disable-extensions")
        .arg("--disable-plugins")
        .arg("--disable-default-apps")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--ignore-certificate-errors")
        .arg("--disable-blink-features=AutomationControlled")
        // Memory: the catalog is ~250 pages per run in one tab
        .arg("--memory-pressure-off")
        .arg("--aggressive-cache-discard")
        .arg("--disk-cache-size=1")
        .arg("--disable-background-networking")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-renderer-backgrounding")
        .arg("--disable-backgrounding-occluded-windows")
        .arg("--blink-settings=imagesEnabled=false")
        .arg("--window-size=1024,768")
        .arg("--user-agent=Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36");

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}
