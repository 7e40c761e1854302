//! Shared types for formgate.
//!
//! Everything an integrator needs to talk to a formgate server lives here:
//! the request parameter model, the HMAC signing scheme used for signed
//! redirect URLs and gateway calls, and the JSON objects on the wire.

#![forbid(unsafe_code)]

pub mod objects;
pub mod params;
pub mod signature;
