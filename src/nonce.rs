//! Represents a reusable definition of an action-bound nonce.
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    format::{Arg, format_action},
    host::{DEFAULT_ACTION, DEFAULT_NONCE_NAME, ExtraDebugInfo, NonceHost, RequestHost},
    verification::Verification,
};

/// A `NonceHandle` names **what** a nonce authorizes.
///
/// # **Overview**
/// The handle stores an action format, either a literal such as `"update-settings"` or a
/// template such as `"delete-post-%d"`, and expands it into the action string a
/// [`NonceHost`] mints and verifies tokens for. Everything cryptographic is left to the host.
///
/// # **Usage**
///
/// - Build a handle once, usually through a [`NonceRegistry`](crate::registry::NonceRegistry).
/// - Call [`field`](Self::field) or [`url`](Self::url) when rendering a page.
/// - Call [`is_valid`](Self::is_valid) (or one of the request-bound checks) when the form or
///   link comes back, with the same arguments.
///
/// # **Example**
///
/// ```rust,no_run
/// use tiny_nonce::{config::Config, format::Arg, host::RequestHost, nonce::NonceHandle, request::Request};
///
/// let config = Config::builder().secret_key(b"secret").build();
/// let request = Request::new().with_user_id(1);
/// let host = RequestHost::new(&config, &request);
///
/// let nonce = NonceHandle::new("delete-post-%d");
/// let args = [Arg::from(5)];
/// let token = nonce.token(&host, &args).unwrap();
/// assert!(nonce.is_valid(&host, &token, &args).unwrap().is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceHandle {
    format: String,
    #[serde(default)]
    args: Vec<Arg>,
}

impl NonceHandle {
    /// Creates a handle for `format`. The format is not checked until it is used.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            args: Vec::new(),
        }
    }

    /// Creates a handle that remembers `args` for debugging output.
    pub fn with_args(format: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            format: format.into(),
            args,
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Arguments kept for debugging. They play no part in minting or verifying.
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Builds the action string.
    ///
    /// With no arguments the format is returned as is, otherwise it is expanded as a
    /// printf-style template.
    pub fn action(&self, args: &[Arg]) -> Result<String, Error> {
        if args.is_empty() {
            return Ok(self.format.clone());
        }
        format_action(&self.format, args)
    }

    /// Mints the token for the action built from `args`.
    pub fn token<H>(&self, host: &H, args: &[Arg]) -> Result<String, Error>
    where
        H: NonceHost + ?Sized,
    {
        host.create_nonce(&self.action(args)?)
    }

    /// Shorthand for [`token`](Self::token).
    pub fn call<H>(&self, host: &H, args: &[Arg]) -> Result<String, Error>
    where
        H: NonceHost + ?Sized,
    {
        self.token(host, args)
    }

    /// Renders the hidden field holding the token, plus a referer field when `referer` is set.
    pub fn field<H>(&self, host: &H, args: &[Arg], name: &str, referer: bool) -> Result<String, Error>
    where
        H: NonceHost + ?Sized,
    {
        host.nonce_field(&self.action(args)?, name, referer)
    }

    /// [`field`](Self::field) named `_wpnonce`, with a referer field.
    pub fn field_default<H>(&self, host: &H, args: &[Arg]) -> Result<String, Error>
    where
        H: NonceHost + ?Sized,
    {
        self.field(host, args, DEFAULT_NONCE_NAME, true)
    }

    /// Adds the token to `base` (or the current request uri) as query parameter `name`.
    pub fn url<H>(&self, host: &H, args: &[Arg], name: &str, base: Option<&str>) -> Result<String, Error>
    where
        H: NonceHost + ?Sized,
    {
        host.add_query_arg(name, &self.token(host, args)?, base)
    }

    /// Checks a submitted token against the action built from `args`.
    pub fn is_valid<H>(&self, host: &H, value: &str, args: &[Arg]) -> Result<Verification, Error>
    where
        H: NonceHost + ?Sized,
    {
        host.verify_nonce(value, &self.action(args)?)
    }

    /// Checks the token an AJAX request carries.
    ///
    /// With `name` unset the host looks at `_ajax_nonce`, then `_wpnonce`. When `die` is set a
    /// failed check is returned as `Error::AjaxRefererCheck`.
    pub fn is_valid_for_ajax<H>(
        &self,
        host: &H,
        args: &[Arg],
        name: Option<&str>,
        die: bool,
    ) -> Result<Verification, Error>
    where
        H: NonceHost + ?Sized,
    {
        host.check_ajax_referer(&self.action(args)?, name, die)
    }

    /// Checks the token an administrative request carries in `name`.
    pub fn is_valid_for_admin<H>(&self, host: &H, args: &[Arg], name: &str) -> Result<Verification, Error>
    where
        H: NonceHost + ?Sized,
    {
        host.check_admin_referer(&self.action(args)?, name)
    }

    /// Displays as the token of the unformatted action.
    pub fn display<'a, H>(&'a self, host: &'a H) -> NonceDisplay<'a, H>
    where
        H: NonceHost + ?Sized,
    {
        NonceDisplay { nonce: self, host }
    }

    /// Owned form of [`display`](Self::display).
    pub fn to_token_string<H>(&self, host: &H) -> Result<String, Error>
    where
        H: NonceHost + ?Sized,
    {
        self.token(host, &[])
    }

    /// Evaluates every output and check with the stored debug arguments.
    ///
    /// Failures are folded into the snapshot, so this never returns an error.
    pub fn debug_info<H>(&self, host: &H) -> DebugInfo
    where
        H: NonceHost + ?Sized,
    {
        let args = &self.args;
        let token = self.token(host, args);
        let is_valid = match &token {
            Ok(token) => self.is_valid(host, token, args),
            Err(e) => Err(e.clone()),
        };

        DebugInfo {
            args: args.clone(),
            format: self.format.clone(),
            display: self.to_token_string(host).into(),
            action: self.action(args).into(),
            token: token.into(),
            field: self.field_default(host, args).into(),
            url: self.url(host, args, DEFAULT_NONCE_NAME, None).into(),
            is_valid: is_valid.map(Verification::code).into(),
            is_valid_for_ajax: self
                .is_valid_for_ajax(host, args, Some(DEFAULT_NONCE_NAME), false)
                .map(Verification::code)
                .into(),
            // a failed admin check reads as invalid instead of an error
            is_valid_for_admin: match self.is_valid_for_admin(host, args, DEFAULT_NONCE_NAME) {
                Err(Error::AdminRefererCheck { .. }) => Outcome::Ok(Verification::Invalid.code()),
                result => result.map(Verification::code).into(),
            },
        }
    }

    /// Reports the inputs hashed for the action built from the debug arguments.
    pub fn extra_debug_info(&self, host: &RequestHost<'_>) -> Result<ExtraDebugInfo, Error> {
        host.extra_debug_info(&self.action(&self.args)?)
    }
}

/// Equivalent to `NonceHandle::new("-1")`, the default action.
impl Default for NonceHandle {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION)
    }
}

/// `Display` adapter returned by [`NonceHandle::display`].
pub struct NonceDisplay<'a, H: ?Sized> {
    nonce: &'a NonceHandle,
    host: &'a H,
}

impl<H> fmt::Display for NonceDisplay<'_, H>
where
    H: NonceHost + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = self.nonce.token(self.host, &[]).map_err(|_| fmt::Error)?;
        f.write_str(&token)
    }
}

/// Either a computed value or the error that prevented it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome<T> {
    Ok(T),
    Error(String),
}

impl<T> From<Result<T, Error>> for Outcome<T> {
    fn from(value: Result<T, Error>) -> Self {
        match value {
            Ok(v) => Outcome::Ok(v),
            Err(e) => Outcome::Error(e.to_string()),
        }
    }
}

/// Snapshot produced by [`NonceHandle::debug_info`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugInfo {
    pub args: Vec<Arg>,
    pub format: String,
    pub display: Outcome<String>,
    pub action: Outcome<String>,
    pub token: Outcome<String>,
    pub field: Outcome<String>,
    pub url: Outcome<String>,
    pub is_valid: Outcome<i32>,
    pub is_valid_for_ajax: Outcome<i32>,
    pub is_valid_for_admin: Outcome<i32>,
}

impl fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |outcome: &Outcome<String>| match outcome {
            Outcome::Ok(v) => v.clone(),
            Outcome::Error(e) => format!("<{}>", e),
        };
        writeln!(f, "format: {}", self.format)?;
        writeln!(f, "args: [{}]", self.args.iter().join(", "))?;
        writeln!(f, "action: {}", show(&self.action))?;
        write!(f, "token: {}", show(&self.token))
    }
}
