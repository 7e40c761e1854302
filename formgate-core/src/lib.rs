#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
#![forbid(unsafe_code)]

pub mod cache;
pub mod captcha;
pub mod config;
pub mod dispatcher;
pub mod extensions;
pub mod forwarder;
pub mod gateway;
pub mod nonce;
pub mod payment;
pub mod redirect;
pub mod sanitize;
pub mod verifier;
