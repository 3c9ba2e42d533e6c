use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, Request};
use reqwest::cookie::Jar;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;
use crate::params::{ParamValue, Params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid MediaWiki API URL {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("failed to build MediaWiki HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("failed to call MediaWiki API")]
    Http(#[source] reqwest::Error),

    #[error("MediaWiki API returned an empty body (HTTP {status})")]
    EmptyBody { status: StatusCode },

    #[error("failed to decode MediaWiki API JSON response (HTTP {status})")]
    Decode {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },
}

/// Moves one parameter map to the API and back as decoded JSON.
///
/// Implementations own the session cookie: whatever the server sets on one
/// call is sent on the next, until [`Transport::clear_session`].
pub trait Transport {
    fn request(&mut self, method: HttpMethod, params: &Params) -> Result<Value, TransportError>;
    fn clear_session(&mut self) -> Result<(), TransportError>;
}

/// Parameters every call carries unless the caller already set them.
pub fn response_format_defaults() -> Params {
    Params::new()
        .with("format", "json")
        .with("formatversion", 2_i64)
        .with("errorformat", "plaintext")
}

/// Blocking reqwest transport with an in-memory cookie jar.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    user_agent: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let endpoint =
            Url::parse(&config.api_url).map_err(|error| TransportError::InvalidEndpoint {
                url: config.api_url.clone(),
                reason: error.to_string(),
            })?;
        let user_agent = config.user_agent.clone();
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = build_client(&user_agent, timeout)?;

        Ok(Self {
            client,
            endpoint,
            user_agent,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds the outgoing request without sending it.
    pub fn build_request(
        &self,
        method: HttpMethod,
        params: &Params,
    ) -> Result<Request, TransportError> {
        let pairs = params
            .clone()
            .with_defaults(response_format_defaults())
            .to_pairs();
        let builder = match method {
            HttpMethod::Get => self.client.get(self.endpoint.clone()).query(&pairs),
            HttpMethod::Post => self.client.post(self.endpoint.clone()).form(&pairs),
        };
        builder.build().map_err(TransportError::Http)
    }
}

impl Transport for HttpTransport {
    fn request(&mut self, method: HttpMethod, params: &Params) -> Result<Value, TransportError> {
        let request = self.build_request(method, params)?;
        debug!(%method, action = action_name(params), "sending MediaWiki API request");

        let response = self.client.execute(request).map_err(TransportError::Http)?;
        let status = response.status();
        let body = response.text().map_err(TransportError::Http)?;
        debug!(%status, bytes = body.len(), "received MediaWiki API response");

        if body.trim().is_empty() {
            return Err(TransportError::EmptyBody { status });
        }
        serde_json::from_str(&body).map_err(|source| TransportError::Decode { status, source })
    }

    fn clear_session(&mut self) -> Result<(), TransportError> {
        // A fresh client gets a fresh, empty jar.
        self.client = build_client(&self.user_agent, self.timeout)?;
        Ok(())
    }
}

fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, TransportError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .cookie_provider(Arc::new(Jar::default()))
        .build()
        .map_err(TransportError::Client)
}

fn action_name(params: &Params) -> &str {
    match params.get("action") {
        Some(ParamValue::Text(action)) => action.as_str(),
        _ => "<none>",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new(&ClientConfig::new("https://wiki.example.org/w/api.php"))
            .expect("transport")
    }

    fn query_map(request: &Request) -> BTreeMap<String, String> {
        request
            .url()
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    fn form_map(request: &Request) -> BTreeMap<String, String> {
        let body = request
            .body()
            .and_then(|body| body.as_bytes())
            .expect("form body");
        Url::parse(&format!("http://form.invalid/?{}", String::from_utf8_lossy(body)))
            .expect("form url")
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    #[test]
    fn get_encodes_params_and_format_defaults_in_query() {
        let params = Params::new()
            .with("action", "parse")
            .with("page", "Main Page")
            .with("pageid", ParamValue::Absent);
        let request = transport()
            .build_request(HttpMethod::Get, &params)
            .expect("request");

        assert_eq!(request.method(), &reqwest::Method::GET);
        assert_eq!(request.url().path(), "/w/api.php");
        let query = query_map(&request);
        assert_eq!(query.get("action").map(String::as_str), Some("parse"));
        assert_eq!(query.get("page").map(String::as_str), Some("Main Page"));
        assert_eq!(query.get("format").map(String::as_str), Some("json"));
        assert_eq!(query.get("formatversion").map(String::as_str), Some("2"));
        assert_eq!(query.get("errorformat").map(String::as_str), Some("plaintext"));
        assert!(!query.contains_key("pageid"));
        assert!(request.body().is_none());
    }

    #[test]
    fn post_encodes_params_as_form_body() {
        let params = Params::new()
            .with("action", "edit")
            .with("title", "Sandbox")
            .with("text", "hello & goodbye")
            .with("summary", None::<String>);
        let request = transport()
            .build_request(HttpMethod::Post, &params)
            .expect("request");

        assert_eq!(request.method(), &reqwest::Method::POST);
        assert_eq!(request.url().query(), None);
        let form = form_map(&request);
        assert_eq!(form.get("text").map(String::as_str), Some("hello & goodbye"));
        assert_eq!(form.get("format").map(String::as_str), Some("json"));
        assert!(!form.contains_key("summary"));
    }

    #[test]
    fn caller_format_values_are_not_overridden() {
        let params = Params::new()
            .with("action", "query")
            .with("formatversion", 1_i64);
        let request = transport()
            .build_request(HttpMethod::Get, &params)
            .expect("request");
        assert_eq!(
            query_map(&request).get("formatversion").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let error = HttpTransport::new(&ClientConfig::new("not a url"))
            .err()
            .expect("must fail");
        assert!(matches!(error, TransportError::InvalidEndpoint { .. }));
    }

    #[test]
    fn clear_session_keeps_endpoint() {
        let mut transport = transport();
        transport.clear_session().expect("clear session");
        assert_eq!(
            transport.endpoint().as_str(),
            "https://wiki.example.org/w/api.php"
        );
    }

    /// Serves one canned response per connection and hands back the request
    /// head of each call.
    fn serve(responses: Vec<(&'static str, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/w/api.php", listener.local_addr().expect("addr"));
        let handle = thread::spawn(move || {
            let mut heads = Vec::new();
            for (extra_headers, body) in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
                let mut head = String::new();
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).expect("read request");
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    head.push_str(&line);
                }
                heads.push(head);
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n{extra_headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .expect("write response");
            }
            heads
        });
        (url, handle)
    }

    fn has_session_cookie(head: &str) -> bool {
        head.lines().any(|line| {
            line.to_ascii_lowercase().starts_with("cookie:") && line.contains("wikisession=abc")
        })
    }

    #[test]
    fn session_cookie_is_replayed_until_cleared() {
        let (url, server) = serve(vec![
            ("Set-Cookie: wikisession=abc; Path=/\r\n", "{\"login\":{}}"),
            ("", "{}"),
            ("", "{}"),
        ]);
        let mut transport = HttpTransport::new(&ClientConfig::new(url)).expect("transport");
        let params = Params::new().with("action", "query");

        transport
            .request(HttpMethod::Get, &params)
            .expect("first request");
        transport
            .request(HttpMethod::Get, &params)
            .expect("second request");
        transport.clear_session().expect("clear session");
        transport
            .request(HttpMethod::Get, &params)
            .expect("third request");

        let heads = server.join().expect("server thread");
        assert_eq!(heads.len(), 3);
        assert!(!has_session_cookie(&heads[0]));
        assert!(has_session_cookie(&heads[1]));
        assert!(!has_session_cookie(&heads[2]));
    }

    #[test]
    fn empty_and_non_json_bodies_are_errors() {
        let (url, server) = serve(vec![("", "  \n"), ("", "<html>Service unavailable</html>")]);
        let mut transport = HttpTransport::new(&ClientConfig::new(url)).expect("transport");
        let params = Params::new().with("action", "query");

        let empty = transport
            .request(HttpMethod::Get, &params)
            .expect_err("empty body");
        assert!(matches!(
            empty,
            TransportError::EmptyBody { status } if status == StatusCode::OK
        ));

        let html = transport
            .request(HttpMethod::Get, &params)
            .expect_err("html body");
        assert!(matches!(
            html,
            TransportError::Decode { status, .. } if status == StatusCode::OK
        ));
        server.join().expect("server thread");
    }
}
