use std::cell::Cell;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use log::{debug, warn};
use openssl::ssl::{ErrorCode, HandshakeError, MidHandshakeSslStream, SslStream};
use openssl::x509::X509StoreContextRef;

use crate::hook::{Hook, Next, ReadOutcome, WriteOutcome};
use crate::mode::Mode;

use super::cert::CertificateInfo;
use super::context::TlsContext;
use super::io::RawIo;

/// OpenSSL's `X509_V_ERR_DEPTH_ZERO_SELF_SIGNED_CERT`. Not re-exported by the
/// `openssl` crate's safe API, so the numeric constant is reproduced here;
/// it is part of OpenSSL's stable public ABI.
const X509_V_ERR_DEPTH_ZERO_SELF_SIGNED_CERT: i32 = 18;

thread_local! {
    /// Set by `permissive_verify` during the handshake, read immediately
    /// after it completes. Mirrors the source's single process-global
    /// `SelfSigned` flag (`static bool SelfSigned` in `m_ssl_openssl.cpp`):
    /// correct under this crate's single-threaded cooperative scheduling
    /// model.
    static LAST_SELF_SIGNED: Cell<bool> = Cell::new(false);
}

/// Always accepts the peer certificate; rejection policy is a consumer
/// concern. Records whether the leaf was self-signed so the certificate
/// metadata can report `unknownsigner`/`trusted` correctly.
pub(super) fn permissive_verify(_preverify_ok: bool, ctx: &mut X509StoreContextRef) -> bool {
    let self_signed = ctx.error().as_raw() == X509_V_ERR_DEPTH_ZERO_SELF_SIGNED_CERT;
    LAST_SELF_SIGNED.with(|flag| flag.set(self_signed));
    true
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TlsDirection {
    InboundAccept,
    OutboundConnect,
}

enum State {
    Handshaking(MidHandshakeSslStream<RawIo>),
    Open(SslStream<RawIo>),
    Closed,
}

enum HandshakeStep {
    Pending,
    Failed,
}

/// The TLS reference hook: handshake plus record-layer framing over a raw
/// descriptor, modeled on the source's `issl_session`.
pub struct TlsHook {
    direction: TlsDirection,
    state: State,
    read_want: Mode,
    write_want: Mode,
    self_signed: bool,
    cert_info: Option<CertificateInfo>,
}

impl TlsHook {
    /// Opens a TLS session over `fd` and starts the handshake immediately
    /// (the source calls `Handshake()` as soon as the socket is connected).
    pub fn new(fd: RawFd, direction: TlsDirection, context: &Rc<TlsContext>) -> std::io::Result<TlsHook> {
        let io = RawIo(fd);

        let state = match (context.as_ref(), direction) {
            (TlsContext::Server(acceptor), TlsDirection::InboundAccept) => match acceptor.accept(io) {
                Ok(stream) => State::Open(stream),
                Err(HandshakeError::WouldBlock(mid)) => State::Handshaking(mid),
                Err(e) => return Err(handshake_err_to_io(e)),
            },
            (TlsContext::Client(connector), TlsDirection::OutboundConnect) => {
                let conf = connector
                    .configure()
                    .map_err(super::context::openssl_to_io)?
                    .verify_hostname(false);

                match conf.connect("", io) {
                    Ok(stream) => State::Open(stream),
                    Err(HandshakeError::WouldBlock(mid)) => State::Handshaking(mid),
                    Err(e) => return Err(handshake_err_to_io(e)),
                }
            }
            _ => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "TLS direction does not match the supplied context",
                ))
            }
        };

        let mut hook = TlsHook {
            direction,
            state,
            read_want: Mode::Read,
            write_want: Mode::Read,
            self_signed: false,
            cert_info: None,
        };

        if matches!(hook.state, State::Open(_)) {
            hook.finish_handshake();
        }

        Ok(hook)
    }

    pub fn direction(&self) -> TlsDirection {
        self.direction
    }

    pub fn certificate(&self) -> Option<&CertificateInfo> {
        self.cert_info.as_ref()
    }

    pub fn is_self_signed(&self) -> bool {
        self.self_signed
    }

    fn drive_handshake(&mut self) -> HandshakeStep {
        let state = std::mem::replace(&mut self.state, State::Closed);
        match state {
            State::Handshaking(mid) => match mid.handshake() {
                Ok(stream) => {
                    self.state = State::Open(stream);
                    self.finish_handshake();
                    HandshakeStep::Pending // caller re-issues the read/write now that we're open
                }
                Err(HandshakeError::WouldBlock(mid2)) => {
                    match mid2.error().code() {
                        ErrorCode::WANT_READ => {
                            self.read_want = Mode::Read;
                            self.write_want = Mode::Read;
                        }
                        ErrorCode::WANT_WRITE => {
                            self.read_want = Mode::Write;
                            self.write_want = Mode::Write;
                        }
                        _ => {}
                    }
                    self.state = State::Handshaking(mid2);
                    HandshakeStep::Pending
                }
                Err(HandshakeError::Failure(mid2)) => {
                    warn!("tls: handshake failed: {}", mid2.error());
                    self.state = State::Closed;
                    HandshakeStep::Failed
                }
                Err(HandshakeError::SetupFailure(e)) => {
                    warn!("tls: handshake setup failed: {}", e);
                    self.state = State::Closed;
                    HandshakeStep::Failed
                }
            },
            other => {
                self.state = other;
                HandshakeStep::Pending
            }
        }
    }

    fn finish_handshake(&mut self) {
        debug!("tls: handshake complete ({:?})", self.direction);

        let self_signed = LAST_SELF_SIGNED.with(|flag| flag.replace(false));
        self.self_signed = self_signed;

        if let State::Open(stream) = &self.state {
            let verify_ok = stream.ssl().verify_result() == openssl::x509::X509VerifyResult::OK;
            if let Some(cert) = stream.ssl().peer_certificate() {
                match CertificateInfo::extract(&cert, verify_ok, self_signed) {
                    Ok(info) => self.cert_info = Some(info),
                    Err(e) => warn!("tls: failed to extract peer certificate metadata: {}", e),
                }
            }
        }
    }

    fn do_open_read(&mut self, dst: &mut [u8]) -> ReadOutcome {
        let stream = match &mut self.state {
            State::Open(s) => s,
            _ => return ReadOutcome::Error(closed_err()),
        };

        match stream.ssl_read(dst) {
            Ok(0) => ReadOutcome::Eof,
            Ok(n) => ReadOutcome::Data(n),
            Err(e) => match e.code() {
                ErrorCode::WANT_READ => {
                    self.read_want = Mode::Read;
                    ReadOutcome::WouldBlock
                }
                ErrorCode::WANT_WRITE => {
                    self.read_want = Mode::Write;
                    ReadOutcome::WouldBlock
                }
                ErrorCode::ZERO_RETURN => ReadOutcome::Eof,
                _ => ReadOutcome::Error(ssl_err_to_io(e)),
            },
        }
    }

    fn do_open_write(&mut self, src: &[u8]) -> WriteOutcome {
        let stream = match &mut self.state {
            State::Open(s) => s,
            _ => return WriteOutcome::Error(closed_err()),
        };

        match stream.ssl_write(src) {
            Ok(n) => WriteOutcome::Wrote(n),
            Err(e) => match e.code() {
                ErrorCode::WANT_READ => {
                    self.write_want = Mode::Read;
                    WriteOutcome::WouldBlock
                }
                ErrorCode::WANT_WRITE => {
                    self.write_want = Mode::Write;
                    WriteOutcome::WouldBlock
                }
                _ => WriteOutcome::Error(ssl_err_to_io(e)),
            },
        }
    }
}

impl Hook for TlsHook {
    fn on_attach(&mut self) {
        debug!("tls: attached ({:?})", self.direction);
    }

    fn on_detach(&mut self) {
        let state = std::mem::replace(&mut self.state, State::Closed);
        if let State::Open(mut stream) = state {
            let _ = stream.shutdown();
        }
    }

    fn read(&mut self, _next: &mut dyn Next, dst: &mut [u8]) -> ReadOutcome {
        if !matches!(self.state, State::Open(_)) {
            match self.drive_handshake() {
                HandshakeStep::Failed => return ReadOutcome::Error(closed_err()),
                HandshakeStep::Pending => {
                    if !matches!(self.state, State::Open(_)) {
                        return ReadOutcome::WouldBlock;
                    }
                }
            }
        }

        self.do_open_read(dst)
    }

    fn write(&mut self, _next: &mut dyn Next, src: &[u8]) -> WriteOutcome {
        if !matches!(self.state, State::Open(_)) {
            match self.drive_handshake() {
                HandshakeStep::Failed => return WriteOutcome::Error(closed_err()),
                HandshakeStep::Pending => {
                    if !matches!(self.state, State::Open(_)) {
                        return WriteOutcome::WouldBlock;
                    }
                }
            }
        }

        self.do_open_write(src)
    }

    fn handshake_done(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    fn wants_write(&self) -> bool {
        self.read_want.is_write() || self.write_want.is_write()
    }
}

impl std::fmt::Debug for TlsHook {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("TlsHook")
            .field("direction", &self.direction)
            .field("open", &matches!(self.state, State::Open(_)))
            .finish()
    }
}

fn closed_err() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "tls session is closed")
}

fn ssl_err_to_io(e: openssl::ssl::Error) -> std::io::Error {
    match e.into_io_error() {
        Ok(io_err) => io_err,
        Err(e) => std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    }
}

fn handshake_err_to_io<S>(e: HandshakeError<S>) -> std::io::Error {
    match e {
        HandshakeError::SetupFailure(stack) => super::context::openssl_to_io(stack),
        HandshakeError::Failure(mid) => std::io::Error::new(std::io::ErrorKind::Other, mid.error().to_string()),
        HandshakeError::WouldBlock(_) => unreachable!("would-block handled by the caller before mapping errors"),
    }
}
