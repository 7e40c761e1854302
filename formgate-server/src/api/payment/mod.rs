//! Payment endpoints.

pub mod initiate;
pub mod methods;
pub mod response;
