//! Production adapters for the two remote API contracts

pub mod kube;
pub mod pool_http;

pub use kube::KubeClusterApi;
pub use pool_http::HttpNodepoolClient;
