//! SSO login and the cookie-carrying session used for every portal request.

use crate::{config, error::EtlError};
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

static FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("form").unwrap());
static PASSWORD_INPUT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("input[type=\"password\"]").unwrap());
static INPUT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("input[name]").unwrap());
static LOGIN_ERROR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("#input-error, .kc-feedback-text, .alert-error, .alert-danger").unwrap()
});

/// Authenticated HTTP context: one blocking client sharing one cookie jar.
pub struct Session {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
}

impl Session {
    pub fn new(portal: &config::Portal) -> Result<Self, EtlError> {
        let base_url = Url::parse(&portal.base_url).map_err(|e| {
            EtlError::Configuration(format!("invalid portal.base_url {:?}: {e}", portal.base_url))
        })?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(portal.timeout())
            .user_agent(portal.user_agent.as_str())
            .build()
            .map_err(|e| EtlError::Configuration(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            jar,
            base_url,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Adds `name=value` cookies scoped to the portal host.
    pub fn install_cookies(&self, cookies: &BTreeMap<String, String>) {
        for (name, value) in cookies {
            self.jar
                .add_cookie_str(&format!("{name}={value}; Path=/"), &self.base_url);
        }
        debug!("installed {} cookies for {}", cookies.len(), self.base_url);
    }

    /// The `Cookie` header the jar would send to `url`.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.jar
            .cookies(url)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }
}

/// Result of a successful provider round-trip.
#[derive(Debug, Clone, Default)]
pub struct AuthOutcome {
    /// Cookies the provider handed back explicitly. `None` means the provider
    /// already populated the session's jar while talking to the SSO server.
    pub cookies: Option<BTreeMap<String, String>>,
}

pub trait SsoProvider {
    /// `Ok(None)` means the provider answered but produced no usable login.
    fn authenticate(
        &self,
        session: &Session,
        username: &str,
        password: &str,
    ) -> Result<Option<AuthOutcome>, EtlError>;
}

pub fn login<P: SsoProvider>(
    provider: &P,
    portal: &config::Portal,
    username: &str,
    password: &str,
) -> Result<Session, EtlError> {
    let session = Session::new(portal)?;
    let outcome = provider
        .authenticate(&session, username, password)?
        .ok_or_else(|| EtlError::Authentication("no result returned by SSO provider".into()))?;

    if let Some(cookies) = &outcome.cookies {
        session.install_cookies(cookies);
    }
    Ok(session)
}

/// Interactive form login against a Keycloak-style SSO page.
pub struct FormSsoProvider {
    entry_url: String,
}

impl FormSsoProvider {
    pub fn new(cfg: &config::Sso) -> Self {
        Self {
            entry_url: cfg.entry_url.clone(),
        }
    }
}

impl SsoProvider for FormSsoProvider {
    fn authenticate(
        &self,
        session: &Session,
        username: &str,
        password: &str,
    ) -> Result<Option<AuthOutcome>, EtlError> {
        let client = session.client();

        let resp = client
            .get(&self.entry_url)
            .send()
            .map_err(|e| EtlError::Authentication(format!("GET {}: {e}", self.entry_url)))?;
        if !resp.status().is_success() {
            return Err(EtlError::Authentication(format!(
                "GET {} returned {}",
                self.entry_url,
                resp.status()
            )));
        }
        let page_url = resp.url().clone();
        let body = resp
            .text()
            .map_err(|e| EtlError::Authentication(format!("reading login page: {e}")))?;

        let Some(form) = find_login_form(&body, &page_url) else {
            info!("no login form at {page_url}; session already authenticated");
            return Ok(Some(AuthOutcome::default()));
        };
        debug!("submitting login form to {}", form.action);

        let fields = form.fields(username, password);
        let resp = client
            .post(form.action.clone())
            .form(&fields)
            .send()
            .map_err(|e| EtlError::Authentication(format!("POST {}: {e}", form.action)))?;

        let status = resp.status();
        let landed = resp.url().clone();
        let body = resp
            .text()
            .map_err(|e| EtlError::Authentication(format!("reading login response: {e}")))?;

        if !status.is_success() {
            warn!("login POST ended with {status} at {landed}");
            return Ok(None);
        }
        if find_login_form(&body, &landed).is_some() {
            match login_error_text(&body) {
                Some(msg) => warn!("SSO rejected login: {msg}"),
                None => warn!("SSO returned the login form again"),
            }
            return Ok(None);
        }

        info!("SSO login landed at {landed}");
        Ok(Some(AuthOutcome::default()))
    }
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub action: Url,
    pub username_field: String,
    pub password_field: String,
    pub hidden: Vec<(String, String)>,
}

impl LoginForm {
    pub fn fields(&self, username: &str, password: &str) -> Vec<(String, String)> {
        let mut fields = self.hidden.clone();
        fields.push((self.username_field.clone(), username.to_string()));
        fields.push((self.password_field.clone(), password.to_string()));
        fields
    }
}

/// Finds the first `<form>` holding a password input.
pub fn find_login_form(html: &str, page_url: &Url) -> Option<LoginForm> {
    let doc = Html::parse_document(html);
    let form = doc
        .select(&FORM_SELECTOR)
        .find(|f| f.select(&PASSWORD_INPUT_SELECTOR).next().is_some())?;

    let action = match form.value().attr("action").map(str::trim) {
        Some(a) if !a.is_empty() => page_url.join(a).ok()?,
        _ => page_url.clone(),
    };

    let mut username_field = None;
    let mut password_field = None;
    let mut hidden = Vec::new();

    for input in form.select(&INPUT_SELECTOR) {
        let el = input.value();
        let Some(name) = el.attr("name") else { continue };
        match el.attr("type").unwrap_or("text").to_ascii_lowercase().as_str() {
            "hidden" => hidden.push((name.to_string(), el.attr("value").unwrap_or("").to_string())),
            "password" => {
                password_field.get_or_insert_with(|| name.to_string());
            }
            "text" | "email" => {
                username_field.get_or_insert_with(|| name.to_string());
            }
            _ => {}
        }
    }

    Some(LoginForm {
        action,
        username_field: username_field.unwrap_or_else(|| "username".to_string()),
        password_field: password_field.unwrap_or_else(|| "password".to_string()),
        hidden,
    })
}

pub fn login_error_text(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&LOGIN_ERROR_SELECTOR)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}
