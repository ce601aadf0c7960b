//! TLS reference hook: a concrete [`crate::hook::Hook`] implementing
//! handshake and record-layer framing with the `openssl` crate, modeled
//! directly on the source's `issl_session`/`SSL_accept`/`SSL_connect`
//! state machine.

mod cert;
mod config;
mod context;
mod hook;
mod io;

pub use cert::CertificateInfo;
pub use config::TlsConfig;
pub use context::TlsContext;
pub use hook::{TlsDirection, TlsHook};
