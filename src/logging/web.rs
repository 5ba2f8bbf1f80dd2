//! Webhook log sink
//!
//! Each accepted event is rendered into an HTTP request and handed to a
//! single worker thread for delivery, so a slow endpoint does not stall the
//! backup. The worker reports delivery problems to the console only.

use std::fmt;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::config::{HttpMethod, WebAuth, WebLoggerConfig};
use crate::error::{BackeeError, BackeeResult};

pub const MESSAGE_PLACEHOLDER: &str = "{{ message }}";
pub const NAME_PLACEHOLDER: &str = "{{ name }}";

/// Messages longer than this many characters are truncated
pub const MAX_MESSAGE_CHARS: usize = 4000;

const QUEUE_CAPACITY: usize = 64;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A rendered webhook call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Cut a message down to the maximum length
pub fn truncate_message(message: &str) -> String {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => format!("{}…", &message[..idx]),
        None => message.to_string(),
    }
}

fn substitute(text: &str, message: &str, name: &str) -> String {
    text.replace(NAME_PLACEHOLDER, name)
        .replace(MESSAGE_PLACEHOLDER, message)
}

/// Render the request for a log message
///
/// A body holding a JSON object gets its top-level string keys and values
/// substituted and is re-serialized; any other body is substituted as text.
pub fn render(config: &WebLoggerConfig, message: &str) -> WebRequest {
    let message = truncate_message(message);
    let sub = |text: &str| substitute(text, &message, &config.name);

    let body = config.body.as_deref().map(|body| {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) if !map.is_empty() => {
                let rendered: serde_json::Map<String, serde_json::Value> = map
                    .into_iter()
                    .map(|(key, value)| {
                        let value = match value {
                            serde_json::Value::String(s) => serde_json::Value::String(sub(s.as_str())),
                            other => other,
                        };
                        (sub(key.as_str()), value)
                    })
                    .collect();
                serde_json::Value::Object(rendered).to_string()
            }
            _ => sub(body),
        }
    });

    WebRequest {
        method: config.method,
        url: sub(config.url.as_str()),
        headers: config
            .headers
            .iter()
            .map(|(key, value)| (sub(key.as_str()), sub(value.as_str())))
            .collect(),
        body,
    }
}

/// Collects the message and the other fields of an event
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

/// Layer forwarding events to a webhook
pub struct WebLayer {
    config: WebLoggerConfig,
    sender: SyncSender<WebRequest>,
}

impl WebLayer {
    fn new(config: WebLoggerConfig, sender: SyncSender<WebRequest>) -> Self {
        Self { config, sender }
    }

    /// Create the layer and its delivery thread
    ///
    /// The thread exits once the layer has been dropped and the queue is
    /// drained. `console` receives reports about failed deliveries.
    pub fn spawn(config: WebLoggerConfig, console: Dispatch) -> BackeeResult<(Self, JoinHandle<()>)> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackeeError::Logging(format!("Failed to create web logger client: {}", e)))?;

        let (sender, receiver) = mpsc::sync_channel(QUEUE_CAPACITY);
        let auth = config.auth.clone();
        let handle = thread::Builder::new()
            .name("web_logger".to_string())
            .spawn(move || {
                tracing::dispatcher::with_default(&console, || deliver_all(&client, auth.as_ref(), receiver))
            })
            .map_err(|e| BackeeError::Logging(format!("Failed to start web logger: {}", e)))?;

        Ok((Self::new(config, sender), handle))
    }
}

impl<S: Subscriber> Layer<S> for WebLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let request = render(&self.config, &visitor.finish());
        // The worker only goes away when the process is shutting down
        let _ = self.sender.send(request);
    }
}

fn deliver_all(client: &reqwest::blocking::Client, auth: Option<&WebAuth>, receiver: Receiver<WebRequest>) {
    for request in receiver {
        let url = request.url.clone();
        match deliver(client, auth, request) {
            Ok(summary) => tracing::debug!(url = %url, "{}", summary),
            Err(e) => tracing::warn!(url = %url, error = %e, "error while sending web log message"),
        }
    }
}

fn deliver(
    client: &reqwest::blocking::Client,
    auth: Option<&WebAuth>,
    request: WebRequest,
) -> Result<String, reqwest::Error> {
    let mut builder = match request.method {
        HttpMethod::Get => client.get(&request.url),
        HttpMethod::Post => client.post(&request.url),
    };
    for (key, value) in &request.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if let Some(WebAuth::Basic { username, password }) = auth {
        builder = builder.basic_auth(username, Some(password.as_str()));
    }
    if let (HttpMethod::Post, Some(body)) = (request.method, request.body) {
        builder = builder.body(body);
    }

    let response = builder.send()?;
    let status = response.status();
    let text = response.text().unwrap_or_default();
    Ok(format!("web logger response {}: {}", status.as_u16(), text))
}
