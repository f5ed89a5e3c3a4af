//! Tiny library for action-bound CSRF nonces.
//!
//! A nonce here is a short token proving that a request was issued by a page the server
//! rendered for the same visitor, for the same action, within a limited time window.
//! This library provides a small, reusable handle around that idea.
//! # Feature
//! - Describe an action once, either as a literal or as a printf-style template
//!   (`"delete-post-%d"`)
//! - Mint a token for the action, bound to the visitor's user id and session token
//! - Render the token as a hidden form field or add it to a url
//! - Verify a submitted token, directly or from an AJAX/admin request, with a tri-state
//!   result (invalid, current, previous)
//! - Share named definitions across an application through an explicit registry
//! # Caution
//! - Tokens are valid for a whole tick window and are **not** single use. They protect
//!   against cross-site request forgery, not replay by the same visitor.
//! - The secret key must be kept private and stable across restarts, or every outstanding
//!   token becomes invalid.
//! # Examples
//! For example usage, see the `demos` directory.
pub mod config;
pub mod error;
pub mod format;
pub mod hash;
pub mod host;
pub mod nonce;
pub mod registry;
pub mod request;
pub mod session_token;
pub mod verification;
