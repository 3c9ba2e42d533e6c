use serde_json::Value;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::navigator::{find, find_first, first_page};
use crate::params::{PageRef, Params};
use crate::transport::{HttpMethod, HttpTransport, Transport};

pub const DEFAULT_TOKEN_TYPE: &str = "csrf";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    LoggedOut,
    LoggedIn {
        username: String,
    },
}

/// Action API client.
///
/// Every call takes `&mut self` and blocks until the transport returns. The
/// session cookie lives in the transport, so one instance must not be driven
/// from several threads at once; give each worker its own client.
///
/// Methods taking a `needle` run the response through [`find`]: an empty
/// needle returns the whole response, otherwise the value(s) stored under
/// that key.
pub struct WikiClient<T: Transport = HttpTransport> {
    transport: T,
    session: SessionState,
}

impl WikiClient<HttpTransport> {
    /// Build an HTTP client for `config`, logging in right away when
    /// credentials are configured.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let mut client = Self::new(HttpTransport::new(config)?);
        if let Some(credentials) = &config.credentials {
            client.login(&credentials.username, &credentials.password)?;
        }
        Ok(client)
    }
}

impl<T: Transport> WikiClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            session: SessionState::LoggedOut,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.session, SessionState::LoggedIn { .. })
    }

    /// Send `params` as-is and return the full decoded response.
    pub fn request(&mut self, method: HttpMethod, params: &Params) -> Result<Value> {
        Ok(self.transport.request(method, params)?)
    }

    pub fn get(&mut self, params: Params, needle: &str) -> Result<Option<Value>> {
        let response = self.request(HttpMethod::Get, &params)?;
        Ok(find(needle, &response))
    }

    pub fn post(&mut self, params: Params, needle: &str) -> Result<Option<Value>> {
        let response = self.request(HttpMethod::Post, &params)?;
        Ok(find(needle, &response))
    }

    /// Log in with a bot password. The current session is always reset
    /// first. A `Failed` result becomes [`Error::Authentication`]; any other
    /// non-success result is returned as data and the client stays logged
    /// out.
    pub fn login(&mut self, username: &str, password: &str) -> Result<Value> {
        self.logout()?;
        let login_token = self.get_token("login")?;
        let response = self.request(
            HttpMethod::Post,
            &Params::new()
                .with("action", "login")
                .with("lgname", username)
                .with("lgpassword", password)
                .with("lgtoken", login_token),
        )?;

        let login = find_first("login", &response);
        let result = login
            .and_then(|payload| payload.get("result"))
            .and_then(Value::as_str);
        match result {
            Some("Success") => {
                info!(username, "logged in to MediaWiki");
                self.session = SessionState::LoggedIn {
                    username: username.to_string(),
                };
            }
            Some("Failed") => {
                let reason = failure_reason(login);
                warn!(username, %reason, "MediaWiki login failed");
                return Err(Error::Authentication { reason });
            }
            other => {
                warn!(
                    username,
                    result = other.unwrap_or("<missing>"),
                    "MediaWiki login did not succeed"
                );
            }
        }
        Ok(response)
    }

    /// End the session. Safe to call when not logged in.
    ///
    /// The local cookie jar is reset and the client ends up logged out even
    /// when the remote call fails; that failure is still returned.
    pub fn logout(&mut self) -> Result<Value> {
        let remote = self.remote_logout();
        let cleared = self.transport.clear_session();
        if let SessionState::LoggedIn { username } = &self.session {
            match &remote {
                Ok(_) => info!(username = username.as_str(), "logged out of MediaWiki"),
                Err(error) => warn!(
                    username = username.as_str(),
                    %error,
                    "MediaWiki logout failed, local session reset anyway"
                ),
            }
        }
        self.session = SessionState::LoggedOut;
        let response = remote?;
        cleared?;
        Ok(response)
    }

    fn remote_logout(&mut self) -> Result<Value> {
        let token = self.get_token(DEFAULT_TOKEN_TYPE)?;
        self.request(
            HttpMethod::Post,
            &Params::new().with("action", "logout").with("token", token),
        )
    }

    pub fn query(&mut self, params: Params, needle: &str) -> Result<Option<Value>> {
        let response = self.query_response(params)?;
        Ok(find(needle, &response))
    }

    pub fn parse(&mut self, params: Params, needle: &str) -> Result<Option<Value>> {
        self.get(
            params.with_defaults(
                Params::new()
                    .with("action", "parse")
                    .with("redirects", true),
            ),
            needle,
        )
    }

    pub fn edit(
        &mut self,
        page: impl Into<PageRef>,
        params: Params,
        needle: &str,
    ) -> Result<Option<Value>> {
        let page = page.into();
        let params = params
            .with_defaults(Params::new().with("action", "edit"))
            .with_defaults(page.project("title", "pageid"));
        self.write(params, needle)
    }

    /// `action=move`. Named `move_page` since `move` is a keyword.
    pub fn move_page(
        &mut self,
        from: impl Into<PageRef>,
        to: &str,
        params: Params,
        needle: &str,
    ) -> Result<Option<Value>> {
        let from = from.into();
        let params = params
            .with_defaults(Params::new().with("action", "move").with("to", to))
            .with_defaults(from.project("from", "fromid"));
        self.write(params, needle)
    }

    pub fn delete(
        &mut self,
        page: impl Into<PageRef>,
        params: Params,
        needle: &str,
    ) -> Result<Option<Value>> {
        let page = page.into();
        let params = params
            .with_defaults(Params::new().with("action", "delete"))
            .with_defaults(page.project("title", "pageid"));
        self.write(params, needle)
    }

    /// Fetch a token of `kind` (`csrf`, `login`, `watch`, ...).
    pub fn get_token(&mut self, kind: &str) -> Result<Option<String>> {
        let token = self.query(
            Params::new().with("meta", "tokens").with("type", kind),
            &format!("{kind}token"),
        )?;
        Ok(token.as_ref().and_then(Value::as_str).map(str::to_string))
    }

    pub fn create(
        &mut self,
        title: &str,
        text: &str,
        params: Params,
        needle: &str,
    ) -> Result<Option<Value>> {
        let params = params.with_defaults(
            Params::new()
                .with("createonly", true)
                .with("recreate", true)
                .with("text", text),
        );
        self.edit(title, params, needle)
    }

    pub fn prepend(
        &mut self,
        page: impl Into<PageRef>,
        text: &str,
        params: Params,
        needle: &str,
    ) -> Result<Option<Value>> {
        let params = params.with_defaults(Params::new().with("prependtext", text));
        self.edit(page, params, needle)
    }

    pub fn append(
        &mut self,
        page: impl Into<PageRef>,
        text: &str,
        params: Params,
        needle: &str,
    ) -> Result<Option<Value>> {
        let params = params.with_defaults(Params::new().with("appendtext", text));
        self.edit(page, params, needle)
    }

    pub fn get_wikitext(
        &mut self,
        page: impl Into<PageRef>,
        params: Params,
    ) -> Result<Option<String>> {
        let page = page.into();
        let params = params
            .with_defaults(page.project("page", "pageid"))
            .with_defaults(Params::new().with("prop", "wikitext"));
        let wikitext = self.parse(params, "wikitext")?;
        Ok(wikitext.as_ref().and_then(Value::as_str).map(str::to_string))
    }

    pub fn get_html(&mut self, page: impl Into<PageRef>, params: Params) -> Result<Option<String>> {
        let page = page.into();
        let params = params
            .with_defaults(page.project("page", "pageid"))
            .with_defaults(Params::new().with("prop", "text"));
        let html = self.parse(params, "text")?;
        Ok(html.as_ref().and_then(Value::as_str).map(str::to_string))
    }

    /// Categories of a page, or `None` when it has none or does not exist.
    pub fn get_categories(&mut self, page: impl Into<PageRef>) -> Result<Option<Value>> {
        let page = page.into();
        let response = self.query_response(
            page.project("titles", "pageids")
                .with("prop", "categories")
                .with("cllimit", "max"),
        )?;
        Ok(first_page(&response).and_then(|page| find("categories", page)))
    }

    /// `prop=info` for a page; an empty needle returns the whole page entry.
    pub fn get_page_info(
        &mut self,
        page: impl Into<PageRef>,
        needle: &str,
    ) -> Result<Option<Value>> {
        let page = page.into();
        let response =
            self.query_response(page.project("titles", "pageids").with("prop", "info"))?;
        Ok(first_page(&response).and_then(|page| find(needle, page)))
    }

    /// General site info; an empty needle returns the whole `general` block.
    pub fn get_site_info(&mut self, needle: &str) -> Result<Option<Value>> {
        let general = self.query(Params::new().with("meta", "siteinfo"), "general")?;
        Ok(general.and_then(|general| find(needle, &general)))
    }

    pub fn get_namespaces(&mut self) -> Result<Option<Value>> {
        self.query(
            Params::new()
                .with("meta", "siteinfo")
                .with("siprop", "namespaces"),
            "namespaces",
        )
    }

    fn query_response(&mut self, params: Params) -> Result<Value> {
        let params = params.with_defaults(
            Params::new()
                .with("action", "query")
                .with("redirects", true),
        );
        self.request(HttpMethod::Get, &params)
    }

    /// POST a write action, fetching a csrf token unless the caller brought one.
    fn write(&mut self, mut params: Params, needle: &str) -> Result<Option<Value>> {
        if !params.contains_key("token") {
            let token = self.get_token(DEFAULT_TOKEN_TYPE)?;
            params.set("token", token);
        }
        self.post(params, needle)
    }
}

fn failure_reason(login: Option<&Value>) -> String {
    let reason = login.and_then(|payload| payload.get("reason"));
    let text = match reason {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Object(fields)) => fields
            .get("text")
            .or_else(|| fields.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };
    text.unwrap_or_else(|| "unknown error".to_string())
}
