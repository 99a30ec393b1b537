//! Chromium-backed interactive session using chromiumoxide.
//!
//! Interaction is performed by evaluating small JS snippets in the page
//! (querySelector + synthetic events), with all injected values escaped for
//! the JS string context. The launch carries the disguise options from
//! [`BrowserOptions`]; they are data, not workflow logic.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;

use crate::config::BrowserOptions;
use crate::session::{InteractiveSession, SessionError, SessionKey, DOCUMENT_SELECTOR};

/// Navigation budget; element waits use the caller-supplied budget instead.
const NAV_TIMEOUT_MS: u64 = 30_000;

/// Visibility poll interval for `wait_visible`.
const POLL_INTERVAL_MS: u64 = 100;

/// Injected before any page script runs, so automation probes see a
/// regular browser.
const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Locate a Chromium binary: `HARVEST_CHROMIUM_PATH`, then the system
/// PATH, then the default desktop install on macOS.
fn probe_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("HARVEST_CHROMIUM_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| {
            let desktop =
                PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
            (cfg!(target_os = "macos") && desktop.exists()).then_some(desktop)
        })
}

/// A launched Chromium instance with one page driven by the session trait.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
}

impl ChromiumSession {
    /// Launch Chromium and open a blank page.
    ///
    /// Failing here is fatal to the run: without an interactive session
    /// nothing can be harvested.
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let chrome_path = match &options.chrome_path {
            Some(path) => path.clone(),
            None => probe_chromium()
                .context("Chromium not found. Set browser.chrome_path or HARVEST_CHROMIUM_PATH.")?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-blink-features=AutomationControlled");

        if options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head().arg("--start-maximized");
        }
        if let Some(ua) = &options.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        if let Some(lang) = &options.accept_language {
            builder = builder.arg(format!("--lang={lang}"));
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create page")?;

        page.execute(
            AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(HIDE_WEBDRIVER_SCRIPT)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build init script: {e}"))?,
        )
        .await
        .context("failed to install init script")?;

        Ok(Self { browser, page })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, SessionError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| SessionError::Interaction(format!("JS evaluation failed: {e}")))?;

        result
            .into_value()
            .map_err(|e| SessionError::Interaction(format!("failed to convert JS result: {e:?}")))
    }

    fn key_script(key: &SessionKey) -> String {
        match key {
            SessionKey::Text(text) => format!(
                r#"(() => {{
                    const el = document.activeElement;
                    if (!el || el === document.body) return false;
                    el.value = (el.value || '') + '{}';
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return true;
                }})()"#,
                escape_js(text)
            ),
            SessionKey::Backspace => r#"(() => {
                const el = document.activeElement;
                if (!el || el === document.body) return false;
                if (el.selectionStart !== el.selectionEnd) {
                    el.value = '';
                } else {
                    el.value = (el.value || '').slice(0, -1);
                }
                el.dispatchEvent(new Event('input', { bubbles: true }));
                return true;
            })()"#
                .to_string(),
            SessionKey::SelectAll => r#"(() => {
                const el = document.activeElement;
                if (!el || el === document.body) return false;
                if (el.select) el.select();
                return true;
            })()"#
                .to_string(),
            SessionKey::Enter => r#"(() => {
                const el = document.activeElement;
                if (!el) return false;
                const ev = new KeyboardEvent('keydown',
                    { key: 'Enter', code: 'Enter', bubbles: true, cancelable: true });
                const proceed = el.dispatchEvent(ev);
                el.dispatchEvent(new KeyboardEvent('keyup',
                    { key: 'Enter', code: 'Enter', bubbles: true }));
                if (proceed && el.form) {
                    if (el.form.requestSubmit) el.form.requestSubmit();
                    else el.form.submit();
                }
                return true;
            })()"#
                .to_string(),
            SessionKey::Tab | SessionKey::ArrowDown => {
                let name = match key {
                    SessionKey::Tab => "Tab",
                    _ => "ArrowDown",
                };
                format!(
                    r#"(() => {{
                        const el = document.activeElement || document.body;
                        el.dispatchEvent(new KeyboardEvent('keydown',
                            {{ key: '{name}', code: '{name}', bubbles: true, cancelable: true }}));
                        el.dispatchEvent(new KeyboardEvent('keyup',
                            {{ key: '{name}', code: '{name}', bubbles: true }}));
                        return true;
                    }})()"#
                )
            }
        }
    }
}

#[async_trait]
impl InteractiveSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let result = tokio::time::timeout(
            Duration::from_millis(NAV_TIMEOUT_MS),
            self.page.goto(url),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                // Settle the load; navigation errors past this point surface
                // in later waits instead.
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::Interaction(format!(
                "navigation to {url} failed: {e}"
            ))),
            Err(_) => Err(SessionError::Timeout {
                what: format!("navigation to {url}"),
                waited_ms: NAV_TIMEOUT_MS,
            }),
        }
    }

    async fn wait_visible(&mut self, selector: &str, timeout_ms: u64) -> Result<(), SessionError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                return !!el && (el.offsetParent !== null || el.getClientRects().length > 0);
            }})()"#,
            escape_js(selector)
        );

        let started = Instant::now();
        loop {
            if self.eval::<bool>(&script).await? {
                return Ok(());
            }
            if started.elapsed() >= Duration::from_millis(timeout_ms) {
                return Err(SessionError::Timeout {
                    what: selector.to_string(),
                    waited_ms: timeout_ms,
                });
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                if (!el) return false;
                if (el.focus) el.focus();
                el.click();
                return true;
            }})()"#,
            escape_js(selector)
        );

        if self.eval::<bool>(&script).await? {
            Ok(())
        } else {
            Err(SessionError::Interaction(format!(
                "no element matching {selector}"
            )))
        }
    }

    async fn type_keys(&mut self, keys: &[SessionKey]) -> Result<(), SessionError> {
        for key in keys {
            let script = Self::key_script(key);
            if !self.eval::<bool>(&script).await? {
                return Err(SessionError::Interaction(format!(
                    "no focused element to receive {key:?}"
                )));
            }
        }
        Ok(())
    }

    async fn read_content(&mut self, selector: &str) -> Result<String, SessionError> {
        let script = if selector == DOCUMENT_SELECTOR {
            "document.documentElement.outerHTML".to_string()
        } else {
            format!(
                r#"(() => {{
                    const el = document.querySelector('{}');
                    return el ? el.outerHTML : null;
                }})()"#,
                escape_js(selector)
            )
        };

        let content: Option<String> = self.eval(&script).await?;
        content.ok_or_else(|| SessionError::Interaction(format!("no element matching {selector}")))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let _ = self.page.clone().close().await;
        let _ = self.browser.close().await;
        Ok(())
    }
}

/// Escape a value for injection into a single-quoted JS string literal.
fn escape_js(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}
