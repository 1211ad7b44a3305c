pub mod audit;
pub mod auth;
pub mod bridge;
pub mod metrics;
pub mod protocol;
pub mod tls;
