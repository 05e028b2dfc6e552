//! HTTP client utilities for Vellum.

pub mod client;
pub mod request;
pub mod response;

pub use client::{build_client, HttpClient, HttpConfig, HttpError};
pub use request::{headers, RequestBuilder};
pub use response::{decode_json, parse_json, ResponseError};
