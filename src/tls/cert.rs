use std::cmp::Ordering;
use std::fmt;

use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::x509::X509Ref;

/// Certificate metadata extracted at handshake completion. Carries both
/// fingerprint algorithms: MD5 for wire-compatibility with existing
/// consumers, SHA-256 alongside it.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub fingerprint_md5: String,
    pub fingerprint_sha256: String,
    pub not_before: String,
    pub not_after: String,
    pub invalid: bool,
    pub trusted: bool,
    pub unknownsigner: bool,
}

impl CertificateInfo {
    /// Builds a record from a peer certificate and the verify outcome.
    /// `verify_ok` is `SSL_get_verify_result(...) == X509_V_OK`; `self_signed`
    /// is the `OnVerify` callback's depth-zero-self-signed flag.
    pub fn extract(cert: &X509Ref, verify_ok: bool, self_signed: bool) -> Result<CertificateInfo, openssl::error::ErrorStack> {
        let subject = name_to_string(cert.subject_name());
        let issuer = name_to_string(cert.issuer_name());

        let fingerprint_md5 = hex_digest(cert, MessageDigest::md5())?;
        let fingerprint_sha256 = hex_digest(cert, MessageDigest::sha256())?;

        let now = Asn1Time::days_from_now(0)?;
        let not_before_ok = cert.not_before().compare(&now)? != Ordering::Greater;
        let not_after_ok = cert.not_after().compare(&now)? != Ordering::Less;

        // unknownsigner/trusted mirror the source's VerifyCertificate: a
        // self-signed leaf is reported trusted (the hook is permissive by
        // design), anything else untrusted by this hook unless verify_ok.
        let (unknownsigner, trusted) = if self_signed {
            (false, true)
        } else {
            (!verify_ok, verify_ok)
        };

        Ok(CertificateInfo {
            subject,
            issuer,
            fingerprint_md5,
            fingerprint_sha256,
            not_before: cert.not_before().to_string(),
            not_after: cert.not_after().to_string(),
            invalid: !verify_ok || !not_before_ok || !not_after_ok,
            trusted,
            unknownsigner,
        })
    }
}

fn name_to_string(name: &openssl::x509::X509NameRef) -> String {
    name.entries()
        .map(|entry| format!("{}={}", entry.object().nid().short_name().unwrap_or("?"), entry.data().as_utf8().map(|s| s.to_string()).unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("/")
}

fn hex_digest(cert: &X509Ref, digest: MessageDigest) -> Result<String, openssl::error::ErrorStack> {
    let bytes = cert.digest(digest)?;
    Ok(hex_encode(&bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    use fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02X}", b);
    }
    out
}
