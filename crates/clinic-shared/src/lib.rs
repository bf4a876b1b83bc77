//! # Clinic Shared
//!
//! Wire types shared between the rate limit service and its clients.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
