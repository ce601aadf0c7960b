//! Configuration collaborator: the core reads bind entries to choose
//! outbound bind addresses and to learn which listen endpoints require
//! TLS. Parsing an on-disk format is explicitly out of scope; this module
//! only defines the shape a caller hands in.

/// Whether a bind entry describes a server-facing or client-facing address,
/// mirroring the source's `bind` block `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindKind {
    Servers,
    Clients,
}

/// One configured listen/connect address record.
#[derive(Debug, Clone)]
pub struct BindEntry {
    pub kind: BindKind,
    pub address: Option<String>,
    pub port: u16,
    pub tls: bool,
}

impl BindEntry {
    /// The address-binding heuristic's qualifying test: skip wildcard,
    /// loopback, and empty entries.
    pub fn is_bindable_address(&self) -> bool {
        match &self.address {
            None => false,
            Some(addr) if addr.is_empty() => false,
            Some(addr) => addr != "*" && addr != "0.0.0.0" && addr != "::" && addr != "127.0.0.1" && addr != "::1",
        }
    }
}

/// Iteration over configured bind entries. A caller backs this with
/// whatever on-disk format it parses; the core never reads files itself.
pub trait BindEntries {
    fn entries(&self) -> &[BindEntry];

    /// First numeric address tagged `Servers` that qualifies under
    /// `is_bindable_address`.
    fn first_server_bind_address(&self) -> Option<&str> {
        self.entries()
            .iter()
            .filter(|e| e.kind == BindKind::Servers && e.is_bindable_address())
            .find_map(|e| e.address.as_deref())
    }

    /// TLS-enabled listen endpoints, for the `SSL=<list>` capability line.
    fn tls_listen_endpoints(&self) -> Vec<(&str, u16)> {
        self.entries()
            .iter()
            .filter(|e| e.kind == BindKind::Clients && e.tls)
            .map(|e| (e.address.as_deref().unwrap_or("*"), e.port))
            .collect()
    }

    /// Renders `tls_listen_endpoints` as the `SSL=<list>` value appended to
    /// the `005` numeric: `;`-separated `ip:port` pairs, wildcard as `*`.
    /// Empty when no listen endpoint has TLS enabled.
    fn ssl_capability_value(&self) -> Option<String> {
        let endpoints = self.tls_listen_endpoints();
        if endpoints.is_empty() {
            return None;
        }

        Some(
            endpoints
                .iter()
                .map(|(addr, port)| format!("{}:{}", addr, port))
                .collect::<Vec<_>>()
                .join(";"),
        )
    }
}

/// The simplest `BindEntries` implementation: an in-memory vector, typically
/// built by a caller's own config-file parser.
#[derive(Debug, Clone, Default)]
pub struct StaticBindList(pub Vec<BindEntry>);

impl BindEntries for StaticBindList {
    fn entries(&self) -> &[BindEntry] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: BindKind, address: Option<&str>, tls: bool) -> BindEntry {
        BindEntry {
            kind,
            address: address.map(String::from),
            port: 6667,
            tls,
        }
    }

    #[test]
    fn skips_wildcard_loopback_and_empty() {
        let list = StaticBindList(vec![
            entry(BindKind::Servers, Some("0.0.0.0"), false),
            entry(BindKind::Servers, Some(""), false),
            entry(BindKind::Servers, None, false),
            entry(BindKind::Servers, Some("127.0.0.1"), false),
            entry(BindKind::Servers, Some("10.0.0.5"), false),
        ]);

        assert_eq!(list.first_server_bind_address(), Some("10.0.0.5"));
    }

    #[test]
    fn no_qualifying_entry_returns_none() {
        let list = StaticBindList(vec![entry(BindKind::Servers, Some("0.0.0.0"), false)]);
        assert_eq!(list.first_server_bind_address(), None);
    }

    #[test]
    fn tls_listen_endpoints_renders_wildcard_as_star() {
        let list = StaticBindList(vec![
            entry(BindKind::Clients, None, true),
            entry(BindKind::Clients, Some("10.0.0.5"), true),
            entry(BindKind::Clients, Some("10.0.0.6"), false),
        ]);

        assert_eq!(list.tls_listen_endpoints(), vec![("*", 6667), ("10.0.0.5", 6667)]);
    }

    #[test]
    fn ssl_capability_value_joins_endpoints_with_semicolons() {
        let list = StaticBindList(vec![
            entry(BindKind::Clients, None, true),
            entry(BindKind::Clients, Some("10.0.0.5"), true),
        ]);

        assert_eq!(list.ssl_capability_value(), Some("*:6667;10.0.0.5:6667".to_string()));
    }

    #[test]
    fn ssl_capability_value_is_none_without_tls_endpoints() {
        let list = StaticBindList(vec![entry(BindKind::Clients, Some("10.0.0.5"), false)]);

        assert_eq!(list.ssl_capability_value(), None);
    }
}
