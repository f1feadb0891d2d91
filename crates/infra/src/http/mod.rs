//! HTTP adapters

pub mod client;
pub mod uploader;

pub use client::{HttpClient, HttpClientBuilder};
pub use uploader::HttpArtifactUploader;
