//! Static-document page driver built on `scraper`.
//!
//! Each navigation parses the fetched document once. Element handles index a
//! node table built at parse time, so lookups never rescan the tree.

use async_trait::async_trait;
use ego_tree::NodeId;
use parking_lot::Mutex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};
use url::Url;

use super::fetch::Fetcher;
use super::{ElementHandle, PageDriver, WaitUntil, DOCUMENT_HEIGHT_SCRIPT, SCROLL_TO_BOTTOM_SCRIPT};
use crate::errors::DriverError;

/// Elements whose contents never contribute rendered text.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new line in rendered text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// A parsed document plus the node table its handles index.
struct LoadedDocument {
    url: String,
    html: Html,
    nodes: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
    source_len: usize,
    generation: u64,
}

impl LoadedDocument {
    fn parse(url: String, source: &str, generation: u64) -> Self {
        let html = Html::parse_document(source);
        let nodes: Vec<NodeId> = html.tree.nodes().map(|node| node.id()).collect();
        let positions = nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        Self {
            url,
            html,
            nodes,
            positions,
            source_len: source.len(),
            generation,
        }
    }

    fn resolve(&self, handle: ElementHandle) -> Result<ElementRef<'_>, DriverError> {
        if handle.document() != self.generation {
            return Err(DriverError::StaleElement);
        }
        self.nodes
            .get(handle.node())
            .and_then(|id| self.html.tree.get(*id))
            .and_then(ElementRef::wrap)
            .ok_or(DriverError::StaleElement)
    }

    fn handle(&self, element: ElementRef<'_>) -> Option<ElementHandle> {
        self.positions
            .get(&element.id())
            .map(|&node| ElementHandle::new(self.generation, node))
    }
}

impl fmt::Debug for LoadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedDocument")
            .field("url", &self.url)
            .field("nodes", &self.nodes.len())
            .field("source_len", &self.source_len)
            .field("generation", &self.generation)
            .finish()
    }
}

/// [`PageDriver`] over static HTML documents.
///
/// Scripts never run: the document height is the length of the source, so
/// scroll traversal settles immediately, and only link-like elements can be
/// activated.
#[derive(Debug)]
pub struct HtmlPageDriver<F: Fetcher> {
    fetcher: F,
    state: Mutex<Option<LoadedDocument>>,
    generations: Mutex<u64>,
}

impl<F: Fetcher> HtmlPageDriver<F> {
    /// Creates a driver with no document loaded.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            state: Mutex::new(None),
            generations: Mutex::new(0),
        }
    }

    /// Loads a document from source without fetching it.
    pub fn load_html(&self, url: impl Into<String>, source: impl AsRef<str>) {
        let generation = self.next_generation();
        let document = LoadedDocument::parse(url.into(), source.as_ref(), generation);
        *self.state.lock() = Some(document);
    }

    fn next_generation(&self) -> u64 {
        let mut generations = self.generations.lock();
        *generations += 1;
        *generations
    }

    fn with_document<T>(
        &self,
        f: impl FnOnce(&LoadedDocument) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let state = self.state.lock();
        let loaded = state
            .as_ref()
            .ok_or_else(|| DriverError::Unsupported("no document loaded".to_string()))?;
        f(loaded)
    }

    fn with_element<T>(
        &self,
        handle: ElementHandle,
        f: impl FnOnce(ElementRef<'_>) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        self.with_document(|doc| f(doc.resolve(handle)?))
    }

    fn query(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let parsed = parse_selector(selector)?;
        let limit = limit.unwrap_or(usize::MAX);
        self.with_document(|doc| {
            let handles: Vec<ElementHandle> = match scope {
                Some(handle) => doc
                    .resolve(handle)?
                    .select(&parsed)
                    .filter_map(|el| doc.handle(el))
                    .take(limit)
                    .collect(),
                None => doc
                    .html
                    .select(&parsed)
                    .filter_map(|el| doc.handle(el))
                    .take(limit)
                    .collect(),
            };
            Ok(handles)
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector).map_err(|_| DriverError::InvalidSelector(selector.to_string()))
}

/// Approximates a browser's `innerText`: hidden elements are skipped and
/// block elements break lines.
fn rendered_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_rendered_text(element, &mut out);
    out
}

fn push_rendered_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                if HIDDEN_ELEMENTS.contains(&el.name()) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&el.name());
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_rendered_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl<F: Fetcher> PageDriver for HtmlPageDriver<F> {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), DriverError> {
        debug!(url = %url, wait_until = wait_until.as_str(), "Fetching document");
        let result = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|err| DriverError::Navigation {
                url: url.to_string(),
                status: None,
                message: err.to_string(),
            })?;
        if !result.is_success() {
            warn!(url = %url, status = result.status_code, "Loaded an error page");
        }
        self.load_html(result.final_url, &result.text);
        Ok(())
    }

    fn current_url(&self) -> Option<String> {
        self.state.lock().as_ref().map(|doc| doc.url.clone())
    }

    async fn query_selector(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.query(scope, selector, Some(1))?.into_iter().next())
    }

    async fn query_selector_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        self.query(scope, selector, None)
    }

    async fn inner_text(&self, element: ElementHandle) -> Result<String, DriverError> {
        self.with_element(element, |el| Ok(rendered_text(el)))
    }

    async fn get_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.with_element(element, |el| Ok(el.value().attr(name).map(ToString::to_string)))
    }

    async fn click(&self, element: ElementHandle) -> Result<(), DriverError> {
        let (tag, href) = self.with_element(element, |el| {
            Ok((
                el.value().name().to_string(),
                el.value().attr("href").map(|h| h.trim().to_string()),
            ))
        })?;

        let href = match href {
            Some(href) if !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:") => href,
            _ => {
                return Err(DriverError::Unsupported(format!(
                    "cannot activate <{tag}> without a followable href in a static document"
                )))
            }
        };

        let base = self
            .current_url()
            .ok_or_else(|| DriverError::Unsupported("no document loaded".to_string()))?;
        let target = Url::parse(&base)
            .and_then(|base| base.join(&href))
            .map_err(|err| DriverError::Navigation {
                url: href.clone(),
                status: None,
                message: err.to_string(),
            })?;

        debug!(from = %base, to = %target, "Following link");
        self.goto(target.as_str(), WaitUntil::NetworkIdle).await
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, DriverError> {
        match expression {
            DOCUMENT_HEIGHT_SCRIPT => {
                let state = self.state.lock();
                let height = state.as_ref().map_or(0, |doc| doc.source_len);
                Ok(serde_json::json!(height))
            }
            SCROLL_TO_BOTTOM_SCRIPT => Ok(serde_json::Value::Null),
            other => Err(DriverError::Unsupported(format!(
                "script evaluation is not available for static documents: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{FetchResult, StaticFetcher};
    use pretty_assertions::assert_eq;

    const LISTING: &str = r#"
        <html><head><title>Listing</title><script>var x = 1;</script></head>
        <body>
          <div class="card" id="first">
            <h2>  Acme
              Corp </h2>
            <a class="mail" href="mailto:info@acme.com">Mail</a>
          </div>
          <div class="card">
            <h2>Globex</h2>
            <p>Line one<br>Line two</p>
          </div>
          <a class="next" href="/page/2">Next</a>
          <button class="more">More</button>
        </body></html>
    "#;

    fn driver() -> HtmlPageDriver<StaticFetcher> {
        let fetcher = StaticFetcher::new()
            .with_page("https://site.test/page/1", LISTING)
            .with_page("https://site.test/page/2", "<div class='card'><h2>Initech</h2></div>");
        HtmlPageDriver::new(fetcher)
    }

    #[tokio::test]
    async fn test_goto_and_query_all_in_document_order() {
        let driver = driver();
        driver.goto("https://site.test/page/1", WaitUntil::NetworkIdle).await.unwrap();
        assert_eq!(driver.current_url().as_deref(), Some("https://site.test/page/1"));

        let cards = driver.query_selector_all(None, ".card").await.unwrap();
        assert_eq!(cards.len(), 2);
        assert!(cards[0].node() < cards[1].node());

        let id = driver.get_attribute(cards[0], "id").await.unwrap();
        assert_eq!(id.as_deref(), Some("first"));
        assert_eq!(driver.get_attribute(cards[1], "id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scoped_query() {
        let driver = driver();
        driver.goto("https://site.test/page/1", WaitUntil::NetworkIdle).await.unwrap();
        let cards = driver.query_selector_all(None, ".card").await.unwrap();

        let heading = driver.query_selector(Some(cards[1]), "h2").await.unwrap().unwrap();
        assert_eq!(driver.inner_text(heading).await.unwrap(), "Globex");

        let mail = driver.query_selector(Some(cards[1]), "a.mail").await.unwrap();
        assert_eq!(mail, None);
    }

    #[tokio::test]
    async fn test_inner_text_breaks_blocks_and_skips_scripts() {
        let driver = driver();
        driver.goto("https://site.test/page/1", WaitUntil::NetworkIdle).await.unwrap();

        let paragraph = driver.query_selector(None, "p").await.unwrap().unwrap();
        let text = driver.inner_text(paragraph).await.unwrap();
        assert!(text.contains("Line one\n"));
        assert!(text.contains("Line two"));

        let html = driver.query_selector(None, "html").await.unwrap().unwrap();
        assert!(!driver.inner_text(html).await.unwrap().contains("var x"));
    }

    #[tokio::test]
    async fn test_click_follows_link_and_invalidates_handles() {
        let driver = driver();
        driver.goto("https://site.test/page/1", WaitUntil::NetworkIdle).await.unwrap();
        let next = driver.query_selector(None, "a.next").await.unwrap().unwrap();

        driver.click(next).await.unwrap();
        assert_eq!(driver.current_url().as_deref(), Some("https://site.test/page/2"));
        assert_eq!(driver.inner_text(next).await, Err(DriverError::StaleElement));

        let cards = driver.query_selector_all(None, ".card").await.unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[tokio::test]
    async fn test_click_without_href_is_unsupported() {
        let driver = driver();
        driver.goto("https://site.test/page/1", WaitUntil::NetworkIdle).await.unwrap();
        let button = driver.query_selector(None, "button.more").await.unwrap().unwrap();
        assert!(matches!(driver.click(button).await, Err(DriverError::Unsupported(_))));
    }

    #[derive(Debug)]
    struct UnreachableFetcher;

    #[async_trait]
    impl Fetcher for UnreachableFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchResult, DriverError> {
            Err(DriverError::Http("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_error_status_loads_the_error_page() {
        let driver = driver();
        driver.goto("https://site.test/missing", WaitUntil::NetworkIdle).await.unwrap();

        assert_eq!(driver.current_url().as_deref(), Some("https://site.test/missing"));
        assert!(driver.query_selector_all(None, ".card").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_target_is_a_navigation_failure() {
        let driver = HtmlPageDriver::new(UnreachableFetcher);
        let err = driver.goto("https://down.test/", WaitUntil::NetworkIdle).await.unwrap_err();

        match err {
            DriverError::Navigation { url, status, message } => {
                assert_eq!(url, "https://down.test/");
                assert_eq!(status, None);
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(driver.current_url(), None);
    }

    #[tokio::test]
    async fn test_large_document_handles_resolve_by_index() {
        let cards: String = (0..2000)
            .map(|i| format!("<div class='card'><h2>Company {i}</h2></div>"))
            .collect();
        let driver = HtmlPageDriver::new(StaticFetcher::new());
        driver.load_html("https://site.test/", format!("<html><body>{cards}</body></html>"));

        let handles = driver.query_selector_all(None, ".card").await.unwrap();
        assert_eq!(handles.len(), 2000);
        let last = driver.query_selector(Some(handles[1999]), "h2").await.unwrap().unwrap();
        assert_eq!(driver.inner_text(last).await.unwrap(), "Company 1999");
    }

    #[tokio::test]
    async fn test_invalid_selector() {
        let driver = driver();
        driver.goto("https://site.test/page/1", WaitUntil::NetworkIdle).await.unwrap();
        let err = driver.query_selector_all(None, "div[").await.unwrap_err();
        assert_eq!(err, DriverError::InvalidSelector("div[".to_string()));
    }

    #[tokio::test]
    async fn test_height_is_stable_and_scroll_is_noop() {
        let driver = driver();
        driver.goto("https://site.test/page/1", WaitUntil::NetworkIdle).await.unwrap();
        driver.scroll_to_bottom().await.unwrap();
        let first = driver.document_height().await.unwrap();
        driver.scroll_to_bottom().await.unwrap();
        assert_eq!(driver.document_height().await.unwrap(), first);
        assert_eq!(first, LISTING.len() as u64);

        assert!(matches!(
            driver.evaluate("document.title").await,
            Err(DriverError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_queries_before_navigation_fail() {
        let driver = driver();
        assert!(driver.query_selector(None, "div").await.is_err());
        assert_eq!(driver.current_url(), None);
    }
}
