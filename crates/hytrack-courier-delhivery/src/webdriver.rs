//! Minimal W3C WebDriver client
//!
//! Speaks just enough of the WebDriver protocol to load a page in a headless
//! browser and read text from rendered elements. Every command is a JSON
//! request to the driver (e.g. chromedriver); every response carries a
//! top-level `value`, which holds an `error` object on failure.

use serde_json::{Value, json};
use std::time::Duration;

use hytrack_core::FetchFailure;

type Result<T> = std::result::Result<T, FetchFailure>;

/// Key under which WebDriver returns element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Chrome arguments for an unattended headless session
const CHROME_ARGS: [&str; 5] = [
    "--headless=new",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--window-size=1920,1080",
    "--log-level=3",
];

/// Element lookup strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    XPath(&'a str),
    TagName(&'a str),
}

impl Locator<'_> {
    fn to_json(self) -> Value {
        match self {
            Locator::XPath(xpath) => json!({ "using": "xpath", "value": xpath }),
            Locator::TagName(tag) => json!({ "using": "tag name", "value": tag }),
        }
    }
}

/// An open browser session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A reference to an element in a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    id: String,
}

/// WebDriver HTTP client
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    base_url: String,
    client: reqwest::Client,
    command_timeout: Duration,
}

impl WebDriverClient {
    /// Create a client for the driver at `base_url`
    ///
    /// `command_timeout` bounds each individual command; it must exceed any
    /// implicit wait set on the session.
    pub fn new(base_url: &str, command_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(command_timeout)
            .build()
            .map_err(|e| FetchFailure::browser(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            command_timeout,
        })
    }

    /// Start a headless Chrome session
    pub async fn new_session(&self) -> Result<Session> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": CHROME_ARGS }
                }
            }
        });

        let value = self
            .command(reqwest::Method::POST, "/session", Some(capabilities))
            .await?;
        parse_session(&value)
    }

    /// Set how long element lookups wait for elements to appear
    pub async fn set_implicit_wait(&self, session: &Session, wait: Duration) -> Result<()> {
        let path = format!("/session/{}/timeouts", session.id);
        let body = json!({ "implicit": wait.as_millis() as u64 });
        self.command(reqwest::Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    /// Navigate to `url` and wait for the page load
    pub async fn navigate(&self, session: &Session, url: &str) -> Result<()> {
        let path = format!("/session/{}/url", session.id);
        self.command(reqwest::Method::POST, &path, Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    /// All elements in the document matching `locator`
    pub async fn find_elements(&self, session: &Session, locator: Locator<'_>) -> Result<Vec<Element>> {
        let path = format!("/session/{}/elements", session.id);
        let value = self
            .command(reqwest::Method::POST, &path, Some(locator.to_json()))
            .await?;
        parse_elements(&value)
    }

    /// The first descendant of `parent` matching `locator`
    pub async fn find_child(
        &self,
        session: &Session,
        parent: &Element,
        locator: Locator<'_>,
    ) -> Result<Element> {
        let path = format!("/session/{}/element/{}/element", session.id, parent.id);
        let value = self
            .command(reqwest::Method::POST, &path, Some(locator.to_json()))
            .await?;
        parse_element(&value)
    }

    /// Rendered text of an element
    pub async fn element_text(&self, session: &Session, element: &Element) -> Result<String> {
        let path = format!("/session/{}/element/{}/text", session.id, element.id);
        let value = self.command(reqwest::Method::GET, &path, None).await?;
        value
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| FetchFailure::browser("element text is not a string"))
    }

    /// Close the session and its browser
    pub async fn delete_session(&self, session: &Session) -> Result<()> {
        let path = format!("/session/{}", session.id);
        self.command(reqwest::Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// Send one command and unwrap its `value`
    async fn command(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!("WebDriver {} {}", method, path);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout(self.command_timeout)
            } else if e.is_connect() {
                FetchFailure::browser(format!("WebDriver unreachable at {}: {}", self.base_url, e))
            } else {
                FetchFailure::browser(format!("WebDriver request failed: {}", e))
            }
        })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchFailure::browser(format!("Invalid WebDriver response ({}): {}", status, e)))?;

        unwrap_value(body)
    }
}

/// Extract `value` from a response body, surfacing protocol errors
pub fn unwrap_value(mut body: Value) -> Result<Value> {
    let value = body
        .get_mut("value")
        .map(Value::take)
        .ok_or_else(|| FetchFailure::browser("WebDriver response has no 'value'"))?;

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let detail = format!("{}: {}", error, message);
        return Err(match error {
            "no such element" | "stale element reference" => FetchFailure::unrecognized(detail),
            _ => FetchFailure::browser(detail),
        });
    }

    Ok(value)
}

fn parse_session(value: &Value) -> Result<Session> {
    value["sessionId"]
        .as_str()
        .map(|id| Session { id: id.to_string() })
        .ok_or_else(|| FetchFailure::browser("new session response has no sessionId"))
}

fn parse_element(value: &Value) -> Result<Element> {
    value[ELEMENT_KEY]
        .as_str()
        .map(|id| Element { id: id.to_string() })
        .ok_or_else(|| FetchFailure::browser("response is not an element reference"))
}

fn parse_elements(value: &Value) -> Result<Vec<Element>> {
    value
        .as_array()
        .ok_or_else(|| FetchFailure::browser("find elements response is not an array"))?
        .iter()
        .map(parse_element)
        .collect()
}
