use std::path::{Path, PathBuf};

/// The four PEM-encoded files a `TlsContext` is built from. Paths are
/// resolved relative to `base_dir` unless already absolute, matching the
/// source's "relative to the configuration file's directory" rule.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: PathBuf,
    pub dhparams_path: PathBuf,
}

impl TlsConfig {
    /// Builds a config with the source's default filenames, resolved
    /// against `base_dir`.
    pub fn with_defaults(base_dir: impl AsRef<Path>) -> TlsConfig {
        let base = base_dir.as_ref();
        TlsConfig {
            cert_path: base.join("cert.pem"),
            key_path: base.join("key.pem"),
            ca_path: base.join("ca.pem"),
            dhparams_path: base.join("dhparams.pem"),
        }
    }

    /// Overrides one or more paths, leaving unspecified ones at their
    /// current (default) value. Absolute paths pass through unchanged.
    pub fn with_cert_path(mut self, path: impl Into<PathBuf>) -> TlsConfig {
        self.cert_path = path.into();
        self
    }

    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> TlsConfig {
        self.key_path = path.into();
        self
    }

    pub fn with_ca_path(mut self, path: impl Into<PathBuf>) -> TlsConfig {
        self.ca_path = path.into();
        self
    }

    pub fn with_dhparams_path(mut self, path: impl Into<PathBuf>) -> TlsConfig {
        self.dhparams_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_relative_to_base() {
        let cfg = TlsConfig::with_defaults("/etc/ircd");
        assert_eq!(cfg.cert_path, PathBuf::from("/etc/ircd/cert.pem"));
        assert_eq!(cfg.key_path, PathBuf::from("/etc/ircd/key.pem"));
        assert_eq!(cfg.ca_path, PathBuf::from("/etc/ircd/ca.pem"));
        assert_eq!(cfg.dhparams_path, PathBuf::from("/etc/ircd/dhparams.pem"));
    }

    #[test]
    fn absolute_override_passes_through() {
        let cfg = TlsConfig::with_defaults("/etc/ircd").with_cert_path("/srv/tls/cert.pem");
        assert_eq!(cfg.cert_path, PathBuf::from("/srv/tls/cert.pem"));
    }
}
