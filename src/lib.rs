//! A buffered, non-blocking TCP socket core with a pluggable I/O hook chain.
//!
//! Five pieces, leaves first: a [`engine::Engine`] wraps the platform's
//! readiness primitive; a [`socket::BufferedSocket`] drives one connection
//! through its lifecycle on top of it; a [`listener::Listener`] accepts and
//! hands off child connections; a [`hook::HookChain`] lets application
//! framing, encryption, or compression splice into the byte stream; and
//! [`tls::TlsHook`] is the reference hook implementing TLS over that splice
//! point.
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use std::time::Duration;
//! use hookline::engine::Engine;
//! use hookline::listener::{Listener, Accepted};
//! use hookline::socket::{BufferedSocket, SocketHandler};
//!
//! struct Echo;
//! impl SocketHandler for Echo {
//!     fn on_data_ready(&mut self, socket: &mut BufferedSocket) -> bool {
//!         let line = socket.inbound().to_vec();
//!         socket.write(&line);
//!         socket.consume(line.len());
//!         true
//!     }
//! }
//!
//! let mut engine = Engine::new().unwrap();
//! let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
//! let mut listener = Listener::open(&mut engine, addr).unwrap();
//! let mut handler = Echo;
//!
//! loop {
//!     for (handle, ready) in engine.wait(Some(Duration::from_millis(100))).unwrap() {
//!         if handle == listener.handle() {
//!             if let Accepted::Connection(stream, peer) = listener.poll_ready().unwrap() {
//!                 let _ = BufferedSocket::adopt(&mut engine, stream, peer);
//!             }
//!         }
//!         let _ = ready; // dispatch to the matching BufferedSocket in a real loop
//!     }
//!     break;
//! }
//! ```

mod sys;

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod hook;
pub mod listener;
pub mod mode;
pub mod net;
pub mod ready;
pub mod socket;
pub mod tls;

pub use engine::Engine;
pub use error::ErrorKind;
pub use handle::Handle;
pub use mode::Mode;
pub use ready::Ready;
