use std::fmt;

/// Name of the single header covered by request signatures.
pub const DATE_HEADER: &str = "date";

/// An HTTP signature authentication header value:
///
/// `keyId="<key_id>",algorithm="<algorithm>",headers="<headers>",signature="<signature>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeader<'a> {
    pub key_id: &'a str,
    pub algorithm: &'a str,
    pub headers: &'a str,
    pub signature: &'a str,
}

impl fmt::Display for AuthorizationHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"keyId="{}",algorithm="{}",headers="{}",signature="{}""#,
            self.key_id, self.algorithm, self.headers, self.signature
        )
    }
}

/// The exact bytes signed for a request carrying `date_header_value`.
pub fn signing_string(date_header_value: &str) -> String {
    format!("{DATE_HEADER}: {date_header_value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fields_in_order() {
        let header = AuthorizationHeader {
            key_id: "/acme/keys/SHA256:ab:cd",
            algorithm: "rsa-sha256",
            headers: DATE_HEADER,
            signature: "c2ln",
        };
        assert_eq!(
            header.to_string(),
            r#"keyId="/acme/keys/SHA256:ab:cd",algorithm="rsa-sha256",headers="date",signature="c2ln""#
        );
    }

    #[test]
    fn signing_string_prefixes_header_name() {
        assert_eq!(
            signing_string("Tue, 01 Jan 2019 00:00:00 GMT"),
            "date: Tue, 01 Jan 2019 00:00:00 GMT"
        );
    }
}
