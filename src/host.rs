//! Host primitives that turn an action string into tokens, markup and verdicts.
//!
//! This module:
//! - Defines the `NonceHost` trait, the seam between a [`NonceHandle`](crate::nonce::NonceHandle)
//!   and whatever mints and checks tokens.
//! - Implements `RequestHost`, which mints tick-based HMAC tokens bound to the visitor of one
//!   request.
//!
//! # Token scheme
//! 1. `tick = ceil(now / (nonce_life / 2))`
//! 2. `hash = hex(HMAC-SHA256(secret, "tick|action|uid|session_token"))`
//! 3. The token is the ten hex characters ending two before the end of `hash`.
//!
//! A token verifies as `Current` in the tick it was minted in and as `Previous` in the tick
//! after.
use std::time::{SystemTime, UNIX_EPOCH};

use maud::html;
use serde::Serialize;
use tracing::{debug, error, warn};
use url::form_urlencoded;

use crate::{
    config::Config,
    error::Error,
    hash::{constant_time_eq, nonce_hash, nonce_tick, truncate_token},
    request::{REFERER_PARAM, Request},
    verification::Verification,
};

/// Action used when none was given.
pub const DEFAULT_ACTION: &str = "-1";

/// Default name of the field or query parameter carrying a nonce.
pub const DEFAULT_NONCE_NAME: &str = "_wpnonce";

/// Parameter checked first by AJAX referer checks when no name is given.
pub const AJAX_NONCE_NAME: &str = "_ajax_nonce";

/// Primitives a nonce handle delegates to once it knows its action.
pub trait NonceHost {
    /// Mints the token for `action`.
    fn create_nonce(&self, action: &str) -> Result<String, Error>;

    /// Checks `nonce` against `action`.
    fn verify_nonce(&self, nonce: &str, action: &str) -> Result<Verification, Error>;

    /// Renders a hidden form field named `name` holding the token for `action`,
    /// optionally followed by a field carrying the current page.
    fn nonce_field(&self, action: &str, name: &str, referer: bool) -> Result<String, Error>;

    /// Returns `url` (or the current request uri when `None`) with `name` set to `value`.
    fn add_query_arg(&self, name: &str, value: &str, url: Option<&str>) -> Result<String, Error>;

    /// Verifies the nonce an AJAX request carries in `query_arg`, `_ajax_nonce` or `_wpnonce`.
    ///
    /// A failed check returns `Error::AjaxRefererCheck` when `die` is set.
    fn check_ajax_referer(
        &self,
        action: &str,
        query_arg: Option<&str>,
        die: bool,
    ) -> Result<Verification, Error>;

    /// Verifies the nonce an administrative request carries in `query_arg`.
    ///
    /// A failed check returns `Error::AdminRefererCheck`.
    fn check_admin_referer(&self, action: &str, query_arg: &str) -> Result<Verification, Error>;
}

/// Snapshot of the inputs behind a token, for debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraDebugInfo {
    pub uid: u64,
    pub session_token: String,
    pub tick: u64,
    pub nonce_life: u64,
    pub hash: String,
}

/// A `NonceHost` bound to one request.
///
/// # Example
/// ```rust,no_run
/// use tiny_nonce::{config::Config, host::{NonceHost, RequestHost}, request::Request};
///
/// let config = Config::builder().secret_key(b"secret").build();
/// let request = Request::new().with_user_id(1);
/// let host = RequestHost::new(&config, &request);
///
/// let token = host.create_nonce("delete-post-5").unwrap();
/// assert!(host.verify_nonce(&token, "delete-post-5").unwrap().is_valid());
/// ```
#[derive(Debug, Clone)]
pub struct RequestHost<'a> {
    config: &'a Config,
    request: &'a Request,
    now: u64,
}

impl<'a> RequestHost<'a> {
    /// Binds `config` and `request` at the current system time.
    pub fn new(config: &'a Config, request: &'a Request) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            config,
            request,
            now,
        }
    }

    /// Pins the clock to `now` (unix seconds).
    pub fn at(mut self, now: u64) -> Self {
        self.now = now;
        self
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn tick(&self) -> u64 {
        nonce_tick(self.now, self.config.nonce_life())
    }

    fn uid(&self, action: &str) -> u64 {
        self.config.effective_uid(self.request.user_id(), action)
    }

    fn hash(&self, tick: u64, action: &str) -> Result<String, Error> {
        nonce_hash(
            &self.config.secret_key.0,
            tick,
            action,
            self.uid(action),
            self.request.session_token().value(),
        )
    }

    fn token_at(&self, tick: u64, action: &str) -> Result<String, Error> {
        Ok(truncate_token(&self.hash(tick, action)?).to_string())
    }

    /// Reports the inputs `create_nonce` would hash for `action`.
    pub fn extra_debug_info(&self, action: &str) -> Result<ExtraDebugInfo, Error> {
        let tick = self.tick();
        Ok(ExtraDebugInfo {
            uid: self.uid(action),
            session_token: self.request.session_token().value().to_string(),
            tick,
            nonce_life: self.config.nonce_life().as_secs(),
            hash: self.hash(tick, action)?,
        })
    }
}

impl NonceHost for RequestHost<'_> {
    fn create_nonce(&self, action: &str) -> Result<String, Error> {
        self.token_at(self.tick(), action)
    }

    fn verify_nonce(&self, nonce: &str, action: &str) -> Result<Verification, Error> {
        if nonce.is_empty() {
            return Ok(Verification::Invalid);
        }

        let tick = self.tick();
        if constant_time_eq(nonce, &self.token_at(tick, action)?) {
            return Ok(Verification::Current);
        }
        if tick > 0 && constant_time_eq(nonce, &self.token_at(tick - 1, action)?) {
            return Ok(Verification::Previous);
        }

        debug!("Nonce verification failed for action `{}`", action);
        Ok(Verification::Invalid)
    }

    fn nonce_field(&self, action: &str, name: &str, referer: bool) -> Result<String, Error> {
        let token = self.create_nonce(action)?;
        // drop any referer the current uri already carries
        let referer_uri = if referer {
            Some(rewrite_query(self.request.request_uri(), |pairs| {
                pairs.into_iter().filter(|(k, _)| k != REFERER_PARAM).collect()
            })?)
        } else {
            None
        };
        let markup = html! {
            input type="hidden" id=(name) name=(name) value=(token);
            @if let Some(uri) = referer_uri {
                input type="hidden" name=(REFERER_PARAM) value=(uri);
            }
        };
        Ok(markup.into_string())
    }

    fn add_query_arg(&self, name: &str, value: &str, url: Option<&str>) -> Result<String, Error> {
        let base = url.unwrap_or(self.request.request_uri());
        rewrite_query(base, |pairs| {
            let mut replaced = false;
            let mut pairs: Vec<(String, String)> = pairs
                .into_iter()
                .map(|(k, v)| {
                    if k == name {
                        replaced = true;
                        (k, value.to_string())
                    } else {
                        (k, v)
                    }
                })
                .collect();
            if !replaced {
                pairs.push((name.to_string(), value.to_string()));
            }
            pairs
        })
    }

    fn check_ajax_referer(
        &self,
        action: &str,
        query_arg: Option<&str>,
        die: bool,
    ) -> Result<Verification, Error> {
        let nonce = query_arg
            .and_then(|name| self.request.param(name))
            .or_else(|| self.request.param(AJAX_NONCE_NAME))
            .or_else(|| self.request.param(DEFAULT_NONCE_NAME))
            .unwrap_or_default();

        let result = self.verify_nonce(nonce, action)?;
        if die && !result.is_valid() {
            warn!("AJAX referer check failed for action `{}`", action);
            return Err(Error::AjaxRefererCheck);
        }
        Ok(result)
    }

    fn check_admin_referer(&self, action: &str, query_arg: &str) -> Result<Verification, Error> {
        let result = match self.request.param(query_arg) {
            Some(nonce) => self.verify_nonce(nonce, action)?,
            None => Verification::Invalid,
        };
        if result.is_valid() {
            return Ok(result);
        }

        // the default action may still pass when coming from inside the admin area
        let admin_url = self.config.admin_url().to_lowercase();
        let referer = self.request.referer().unwrap_or_default().to_lowercase();
        if action == DEFAULT_ACTION && !admin_url.is_empty() && referer.starts_with(&admin_url) {
            return Ok(result);
        }

        warn!("Admin referer check failed for action `{}`", action);
        Err(Error::AdminRefererCheck {
            action: action.to_string(),
        })
    }
}

type Pairs = Vec<(String, String)>;

/// Applies `edit` to the query pairs of `base`.
///
/// Absolute urls go through `url::Url`. Anything relative keeps its path and fragment
/// exactly as written and only has the query between `?` and `#` rebuilt.
fn rewrite_query<F>(base: &str, edit: F) -> Result<String, Error>
where
    F: FnOnce(Pairs) -> Pairs,
{
    match url::Url::parse(base) {
        Ok(mut url) => {
            let pairs = edit(url.query_pairs().into_owned().collect());
            if pairs.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(pairs);
            }
            Ok(url.to_string())
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let (rest, fragment) = match base.split_once('#') {
                Some((rest, fragment)) => (rest, Some(fragment)),
                None => (base, None),
            };
            let (prefix, query) = rest.split_once('?').unwrap_or((rest, ""));

            let pairs = edit(form_urlencoded::parse(query.as_bytes()).into_owned().collect());
            let mut out = prefix.to_string();
            if !pairs.is_empty() {
                out.push('?');
                out.push_str(
                    &form_urlencoded::Serializer::new(String::new())
                        .extend_pairs(pairs)
                        .finish(),
                );
            }
            if let Some(fragment) = fragment {
                out.push('#');
                out.push_str(fragment);
            }
            Ok(out)
        }
        Err(e) => {
            error!("Failed to parse url: {}", e);
            Err(Error::URL)
        }
    }
}
