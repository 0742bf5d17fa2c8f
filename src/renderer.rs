use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::RendererConfig;
use crate::utils::error::{AppError, Result};

/// Fixed search query: featured-rank sorted internal hard drives. The page
/// number is the only variable; callers never supply query parameters.
const SEARCH_URL: &str = "https://www.amazon.com/s/ref=sr_st_featured-rank";
const SEARCH_PARAMS: &[(&str, &str)] = &[
    ("bbn", "595048"),
    ("fst", "as:off"),
    ("lo", "computers"),
    ("qid", "1526155460"),
    (
        "rh",
        "n:172282,n:!493964,n:541966,n:1292110011,n:595048,p_n_feature_two_browse-bin:5446816011",
    ),
    ("sort", "featured-rank"),
];

/// The bottom next-page control only appears once the result list has fully
/// rendered; waiting for it avoids parsing a truncated document.
const PAGE_COMPLETE_SELECTOR: &str = "li.a-last";

/// Produces rendered markup for a search-results page. Pages are 1-based.
///
/// Implementations must block until the document is complete and must fail,
/// not hang, past a bounded wait.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, page: u32) -> Result<String>;
}

/// Renders result pages with a headless Chrome instance, reusing one tab
/// across cycles.
pub struct ChromeRenderer {
    _browser: Browser,
    tab: Arc<Tab>,
    page_load_timeout: Duration,
}

impl ChromeRenderer {
    /// Starts the browser. This is the only failure that aborts startup;
    /// everything after launch is a per-page, non-fatal error.
    pub fn launch(config: &RendererConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| AppError::RendererInit(format!("invalid launch options: {e}")))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::RendererInit(format!("failed to launch browser: {e}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| AppError::RendererInit(format!("failed to open tab: {e}")))?;
        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| AppError::RendererInit(format!("failed to set user agent: {e}")))?;

        Ok(Self {
            _browser: browser,
            tab,
            page_load_timeout: Duration::from_secs(config.page_load_timeout_secs),
        })
    }

    fn search_url(page: u32) -> String {
        // Infallible for a constant base URL
        let mut url = Url::parse(SEARCH_URL).unwrap();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in SEARCH_PARAMS {
                query.append_pair(key, value);
            }
            query.append_pair("page", &page.to_string());
        }
        url.to_string()
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, page: u32) -> Result<String> {
        let url = Self::search_url(page);

        self.tab
            .navigate_to(&url)
            .map_err(|e| AppError::render(page, format!("navigation failed: {e}")))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AppError::render(page, format!("page load failed: {e}")))?;
        self.tab
            .wait_for_element_with_custom_timeout(PAGE_COMPLETE_SELECTOR, self.page_load_timeout)
            .map_err(|e| {
                AppError::render(page, format!("timed out waiting for result list: {e}"))
            })?;

        self.tab
            .get_content()
            .map_err(|e| AppError::render(page, format!("failed to read page content: {e}")))
    }
}
