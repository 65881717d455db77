// keemple-api: Async Rust client for the Keemple smart-home cloud API

pub mod auth;
pub mod client;
pub mod devices;
pub mod error;
pub mod login;
pub mod models;
pub mod retry;
pub mod transport;

pub use auth::{Credentials, DEFAULT_COUNTRY_CODE, Session};
pub use client::{DEFAULT_BASE_URL, DEFAULT_PLATFORM, KeempleClient};
pub use error::Error;
pub use models::{Ack, ApplianceStatus, ChangedData, OperateCommand, Operation, RemoteDevice};
pub use retry::RetryPolicy;
pub use transport::{TlsMode, TransportConfig};
