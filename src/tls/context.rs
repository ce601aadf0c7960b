use std::io;
use std::sync::Once;

use log::{info, warn};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslConnector, SslConnectorBuilder, SslFiletype, SslMethod, SslVerifyMode};

use super::config::TlsConfig;

static LIBRARY_INIT: Once = Once::new();

fn ensure_library_initialised() {
    LIBRARY_INIT.call_once(|| {
        openssl::init();
    });
}

/// Shared, per-listen-endpoint TLS material: built once from a `TlsConfig`,
/// then reused to hand out cheap per-connection sessions. Holds either a
/// server-side acceptor or a client-side connector, mirroring the source's
/// separate `ctx`/`clictx` contexts.
pub enum TlsContext {
    Server(SslAcceptor),
    Client(SslConnector),
}

impl TlsContext {
    /// Builds the server-side context: loads `cert_path`/`key_path`/`ca_path`
    /// and the mandatory `dhparams_path`. A missing or unreadable cert, key,
    /// or CA file is logged and the context is built without it; a missing
    /// or unreadable DH parameter file is fatal.
    pub fn server(config: &TlsConfig) -> io::Result<TlsContext> {
        ensure_library_initialised();

        let mut builder: SslAcceptorBuilder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())
            .map_err(openssl_to_io)?;

        if let Err(e) = builder.set_private_key_file(&config.key_path, SslFiletype::PEM) {
            warn!("tls: failed to load private key {}: {}", config.key_path.display(), e);
        }

        if let Err(e) = builder.set_certificate_chain_file(&config.cert_path) {
            warn!("tls: failed to load certificate chain {}: {}", config.cert_path.display(), e);
        }

        if config.ca_path.exists() {
            if let Err(e) = builder.set_ca_file(&config.ca_path) {
                warn!("tls: failed to load CA file {}: {}", config.ca_path.display(), e);
            }
        } else {
            warn!("tls: no CA file at {}, peer verification disabled", config.ca_path.display());
        }

        load_dh_params(&mut builder, &config.dhparams_path)?;

        builder.set_verify_callback(SslVerifyMode::PEER, super::hook::permissive_verify);

        info!("tls: server context ready (cert={})", config.cert_path.display());
        Ok(TlsContext::Server(builder.build()))
    }

    /// Builds the client-side context used for outbound connects.
    pub fn client(config: &TlsConfig) -> io::Result<TlsContext> {
        ensure_library_initialised();

        let mut builder: SslConnectorBuilder = SslConnector::builder(SslMethod::tls()).map_err(openssl_to_io)?;

        if config.cert_path.exists() && config.key_path.exists() {
            builder
                .set_private_key_file(&config.key_path, SslFiletype::PEM)
                .map_err(openssl_to_io)?;
            builder
                .set_certificate_chain_file(&config.cert_path)
                .map_err(openssl_to_io)?;
        }

        if config.ca_path.exists() {
            builder.set_ca_file(&config.ca_path).map_err(openssl_to_io)?;
        }

        builder.set_verify_callback(SslVerifyMode::PEER, super::hook::permissive_verify);

        Ok(TlsContext::Client(builder.build()))
    }
}

fn load_dh_params(builder: &mut SslAcceptorBuilder, path: &std::path::Path) -> io::Result<()> {
    use std::fs;
    use openssl::dh::Dh;
    use openssl::pkey::Params;

    let pem = fs::read(path)?;
    let dh: Dh<Params> = Dh::params_from_pem(&pem).map_err(openssl_to_io)?;
    builder.set_tmp_dh(&dh).map_err(openssl_to_io)?;
    Ok(())
}

pub(super) fn openssl_to_io(stack: openssl::error::ErrorStack) -> io::Error {
    io::Error::new(io::ErrorKind::Other, stack.to_string())
}
