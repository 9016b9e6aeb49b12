pub mod client;
pub mod types;

pub use client::{normalize_base_url, ClientOptions, GitLabClient};
