//! Live browser page driver over the DevTools protocol.
//!
//! Elements found by queries are kept in a page-side registry
//! (`window.__siteharvest`) stamped with the driver's document generation.
//! A handle is the element's index in that registry. Navigations and clicks
//! start a new generation, which empties the registry and turns older handles
//! stale.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::cdp::CdpClient;
use super::{ElementHandle, PageDriver, WaitUntil};
use crate::errors::DriverError;

/// Quiet period that counts as network idle.
pub const NETWORK_IDLE_QUIET: Duration = Duration::from_millis(500);

const READINESS_POLL: Duration = Duration::from_millis(100);

const STALE_MARKER: &str = "__siteharvestStale";

/// Environment variable naming the browser executable.
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";

/// [`PageDriver`] backed by a Chromium-family browser.
#[derive(Debug)]
pub struct BrowserPageDriver {
    client: CdpClient,
    generation: AtomicU64,
    navigation_timeout: Duration,
    current_url: parking_lot::Mutex<Option<String>>,
    process: Option<ChromeProcess>,
}

impl BrowserPageDriver {
    /// Attaches to a page target of an already running browser.
    pub async fn connect(page_ws_url: &str) -> Result<Self, DriverError> {
        let client = CdpClient::connect(page_ws_url).await?;
        for domain in ["Page", "Runtime", "Network"] {
            client.enable(domain).await?;
        }
        Ok(Self {
            client,
            generation: AtomicU64::new(0),
            navigation_timeout: Duration::from_secs(30),
            current_url: parking_lot::Mutex::new(None),
            process: None,
        })
    }

    /// Starts a browser and attaches to its first tab.
    pub async fn launch(options: BrowserLaunch) -> Result<Self, DriverError> {
        let process = ChromeProcess::spawn(&options).await?;
        let page_url = process.first_page_ws_url().await?;
        let mut driver = Self::connect(&page_url).await?;
        driver.process = Some(process);
        Ok(driver)
    }

    /// Sets how long a navigation may take to reach its readiness state.
    #[must_use]
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn run_script(&self, expression: &str) -> Result<Value, DriverError> {
        let response = self
            .client
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        runtime_value(&response)
    }

    async fn element_value(&self, element: ElementHandle, body: &str) -> Result<Value, DriverError> {
        if element.document() != self.generation() {
            return Err(DriverError::StaleElement);
        }
        let reply = self.run_script(&element_script(element, body)).await?;
        decode_reply(reply, "")
    }

    async fn query(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let generation = self.generation();
        if scope.is_some_and(|s| s.document() != generation) {
            return Err(DriverError::StaleElement);
        }
        let reply = self
            .run_script(&query_script(generation, scope, selector, limit))
            .await?;
        let nodes = decode_reply(reply, selector)?;
        nodes
            .as_array()
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|n| usize::try_from(n).ok())
                    .map(|n| ElementHandle::new(generation, n))
                    .collect()
            })
            .ok_or_else(|| DriverError::Evaluation(format!("query returned {nodes}")))
    }

    async fn ready_state(&self) -> Option<(String, bool)> {
        let expression = format!("[document.readyState, !!window.{STALE_MARKER}]");
        let value = self.run_script(&expression).await.ok()?;
        let state = value.get(0)?.as_str()?.to_string();
        let stale = value.get(1)?.as_bool()?;
        Some((state, stale))
    }

    async fn wait_until_ready(&self, url: &str, wait_until: WaitUntil) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + self.navigation_timeout;
        loop {
            if let Some((state, stale)) = self.ready_state().await {
                let ready = !stale
                    && match wait_until {
                        WaitUntil::DomContentLoaded => state != "loading",
                        WaitUntil::Load => state == "complete",
                        WaitUntil::NetworkIdle => {
                            state == "complete"
                                && self
                                    .client
                                    .network()
                                    .idle_for()
                                    .is_some_and(|quiet| quiet >= NETWORK_IDLE_QUIET)
                        }
                    };
                if ready {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    status: None,
                    message: format!(
                        "timed out after {:?} waiting for {}",
                        self.navigation_timeout,
                        wait_until.as_str()
                    ),
                });
            }
            tokio::time::sleep(READINESS_POLL).await;
        }
    }
}

#[async_trait]
impl PageDriver for BrowserPageDriver {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), DriverError> {
        let navigation_error = |message: String| DriverError::Navigation {
            url: url.to_string(),
            status: None,
            message,
        };

        self.next_generation();
        // A failed mark only means the old document is already gone.
        let _ = self.run_script(&format!("window.{STALE_MARKER} = true")).await;
        self.client.network().reset();

        debug!(url = %url, wait_until = wait_until.as_str(), "Navigating");
        let result = self
            .client
            .send("Page.navigate", json!({ "url": url }))
            .await
            .map_err(|err| navigation_error(err.to_string()))?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            return Err(navigation_error(error_text.to_string()));
        }
        if result.get("loaderId").is_none() {
            // Same-document navigation keeps the page, marker included.
            let _ = self.run_script(&format!("delete window.{STALE_MARKER}")).await;
        }

        self.wait_until_ready(url, wait_until).await?;
        *self.current_url.lock() = Some(url.to_string());
        Ok(())
    }

    fn current_url(&self) -> Option<String> {
        self.current_url.lock().clone()
    }

    async fn query_selector(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.query(scope, selector, Some(1)).await?.into_iter().next())
    }

    async fn query_selector_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        self.query(scope, selector, None).await
    }

    async fn inner_text(&self, element: ElementHandle) -> Result<String, DriverError> {
        let value = self.element_value(element, "el.innerText").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn get_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let body = format!("el.getAttribute({})", js_string(name));
        let value = self.element_value(element, &body).await?;
        Ok(value.as_str().map(ToString::to_string))
    }

    async fn click(&self, element: ElementHandle) -> Result<(), DriverError> {
        self.element_value(element, "(el.scrollIntoView({block: 'center'}), el.click(), null)")
            .await?;
        self.next_generation();
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
        self.run_script(expression).await
    }
}

/// Encodes `value` as a JavaScript string literal.
fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

fn query_script(
    generation: u64,
    scope: Option<ElementHandle>,
    selector: &str,
    limit: Option<usize>,
) -> String {
    let scope = scope.map_or_else(|| "null".to_string(), |s| s.node().to_string());
    let limit = limit.map_or_else(|| "null".to_string(), |l| l.to_string());
    format!(
        r"(() => {{
  let reg = window.__siteharvest;
  if (!reg || reg.generation !== {generation}) {{
    reg = window.__siteharvest = {{ generation: {generation}, nodes: [] }};
  }}
  const scope = {scope};
  const root = scope === null ? document : reg.nodes[scope];
  if (!root) return {{ stale: true }};
  let found;
  try {{ found = Array.from(root.querySelectorAll({selector})); }}
  catch (e) {{ return {{ invalid: true }}; }}
  const limit = {limit};
  if (limit !== null) found = found.slice(0, limit);
  return {{ value: found.map((el) => reg.nodes.push(el) - 1) }};
}})()",
        selector = js_string(selector),
    )
}

fn element_script(element: ElementHandle, body: &str) -> String {
    format!(
        r"(() => {{
  const reg = window.__siteharvest;
  const el = reg && reg.generation === {generation} ? reg.nodes[{node}] : undefined;
  if (!el || !el.isConnected) return {{ stale: true }};
  return {{ value: {body} }};
}})()",
        generation = element.document(),
        node = element.node(),
    )
}

/// Unwraps a `Runtime.evaluate` result, surfacing page exceptions.
fn runtime_value(response: &Value) -> Result<Value, DriverError> {
    if let Some(details) = response.get("exceptionDetails") {
        let message = details
            .pointer("/exception/description")
            .or_else(|| details.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("uncaught exception");
        return Err(DriverError::Evaluation(message.to_string()));
    }
    Ok(response
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}

/// Interprets a registry script reply.
fn decode_reply(reply: Value, selector: &str) -> Result<Value, DriverError> {
    if reply.get("stale").and_then(Value::as_bool) == Some(true) {
        return Err(DriverError::StaleElement);
    }
    if reply.get("invalid").and_then(Value::as_bool) == Some(true) {
        return Err(DriverError::InvalidSelector(selector.to_string()));
    }
    match reply {
        Value::Object(mut map) => Ok(map.remove("value").unwrap_or(Value::Null)),
        other => Err(DriverError::Evaluation(format!("unexpected reply {other}"))),
    }
}

/// How to start a browser.
#[derive(Debug, Clone)]
pub struct BrowserLaunch {
    /// Browser executable.
    pub executable: PathBuf,
    /// Show a window instead of running headless.
    pub headful: bool,
    /// How long to wait for the DevTools endpoint.
    pub startup_timeout: Duration,
    /// Extra command-line switches.
    pub args: Vec<String>,
}

impl Default for BrowserLaunch {
    fn default() -> Self {
        Self {
            executable: std::env::var_os(CHROME_PATH_ENV)
                .map_or_else(|| PathBuf::from("chromium"), PathBuf::from),
            headful: false,
            startup_timeout: Duration::from_secs(20),
            args: Vec::new(),
        }
    }
}

impl BrowserLaunch {
    /// Sets the executable.
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Requests a visible window.
    #[must_use]
    pub fn with_headful(mut self, headful: bool) -> Self {
        self.headful = headful;
        self
    }

    /// Adds a command-line switch.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn command_args(&self, profile_dir: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            "--remote-debugging-port=0".to_string(),
            format!("--user-data-dir={}", profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];
        if !self.headful {
            args.push("--headless=new".to_string());
        }
        args.extend(self.args.iter().cloned());
        args.push("about:blank".to_string());
        args
    }
}

/// A browser process started by [`BrowserPageDriver::launch`]. Killed and
/// its throwaway profile removed on drop.
#[derive(Debug)]
pub struct ChromeProcess {
    child: Child,
    profile_dir: PathBuf,
    browser_ws_url: String,
}

impl ChromeProcess {
    async fn spawn(options: &BrowserLaunch) -> Result<Self, DriverError> {
        let profile_dir = std::env::temp_dir().join(format!("siteharvest-{}", Uuid::new_v4()));
        let mut child = Command::new(&options.executable)
            .args(options.command_args(&profile_dir))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                DriverError::Protocol(format!(
                    "cannot start {}: {err}",
                    options.executable.display()
                ))
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DriverError::Protocol("browser stderr unavailable".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();

        let found = tokio::time::timeout(options.startup_timeout, async {
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(url) = devtools_url_from_line(&line) {
                    return Some(url);
                }
            }
            None
        })
        .await;

        let browser_ws_url = match found {
            Ok(Some(url)) => url,
            Ok(None) => {
                return Err(DriverError::Protocol(
                    "browser exited before opening DevTools".to_string(),
                ))
            }
            Err(_) => {
                return Err(DriverError::Protocol(format!(
                    "no DevTools endpoint within {:?}",
                    options.startup_timeout
                )))
            }
        };

        // Keep draining stderr so the browser never blocks on a full pipe.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "siteharvest::browser", "{line}");
            }
        });

        info!(endpoint = %browser_ws_url, headful = options.headful, "Browser started");
        Ok(Self {
            child,
            profile_dir,
            browser_ws_url,
        })
    }

    /// Browser-level DevTools endpoint.
    pub fn browser_ws_url(&self) -> &str {
        &self.browser_ws_url
    }

    async fn first_page_ws_url(&self) -> Result<String, DriverError> {
        let browser = CdpClient::connect(&self.browser_ws_url).await?;
        let targets = browser.send("Target.getTargets", json!({})).await?;
        let target_id = targets
            .get("targetInfos")
            .and_then(Value::as_array)
            .and_then(|infos| {
                infos
                    .iter()
                    .find(|info| info.get("type").and_then(Value::as_str) == Some("page"))
            })
            .and_then(|info| info.get("targetId").and_then(Value::as_str))
            .map(ToString::to_string);

        let target_id = match target_id {
            Some(id) => id,
            None => browser
                .send("Target.createTarget", json!({ "url": "about:blank" }))
                .await?
                .get("targetId")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| DriverError::Protocol("no page target".to_string()))?,
        };
        page_ws_url(&self.browser_ws_url, &target_id)
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        if let Err(err) = self.child.start_kill() {
            warn!(error = %err, "Could not stop the browser");
        }
        let _ = std::fs::remove_dir_all(&self.profile_dir);
    }
}

/// Extracts the endpoint from Chrome's `DevTools listening on ws://...` line.
fn devtools_url_from_line(line: &str) -> Option<String> {
    let rest = line.trim().strip_prefix("DevTools listening on ")?;
    rest.starts_with("ws://").then(|| rest.to_string())
}

/// Endpoint of page target `target_id` on the browser behind `browser_ws_url`.
fn page_ws_url(browser_ws_url: &str, target_id: &str) -> Result<String, DriverError> {
    let mut url = Url::parse(browser_ws_url)
        .map_err(|err| DriverError::Protocol(format!("bad DevTools endpoint: {err}")))?;
    url.set_path(&format!("/devtools/page/{target_id}"));
    Ok(url.to_string())
}
