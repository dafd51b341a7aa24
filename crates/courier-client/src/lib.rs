//! Request-coalescing client for a SOAP-over-JSON groupware API.
//!
//! Callers submit [`RequestDescriptor`](courier_core::RequestDescriptor)s;
//! the [`RequestBatcher`] groups them into envelopes, and each response
//! header feeds the [`SessionTracker`] and [`Notifier`] before any caller is
//! answered.

mod error;

pub mod batcher;
pub mod client;
pub mod codec;
pub mod config;
pub mod http;
pub mod notifier;
pub mod ops;
pub mod session;
pub mod transport;

pub use batcher::{Credentials, PendingResponse, RequestBatcher};
pub use client::CourierClient;
pub use config::ClientConfig;
pub use error::{ClientError, TransportError};
pub use http::HttpTransport;
pub use notifier::{NotificationListener, Notifier, SequenceReader};
pub use ops::{GetFolderOptions, MessageMeta, parse_message_meta};
pub use session::{
    FileSessionStore, MemorySessionStore, SessionReader, SessionStore, SessionStoreError,
    SessionTracker,
};
pub use transport::Transport;
