//! HMAC-SHA256 request signing
//!
//! Canonical request layout:
//!
//! ```text
//! METHOD
//! /encoded/path
//! sorted=query&params=...
//! content-type:application/json
//! host:example.com
//! x-content-sha256:<body hash>
//! x-date:20250101T000000Z
//!
//! content-type;host;x-content-sha256;x-date
//! <body hash>
//! ```
//!
//! The signing key is derived as `HMAC(HMAC(HMAC(HMAC(secret, date), region), service), "request")`.

use crate::auth::{Clock, Credential};
use crate::error::{DeepSearchError, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Region the knowledge-base service signs under
pub const SIGNING_REGION: &str = "cn-north-1";

/// Service name in the credential scope
pub const SIGNING_SERVICE: &str = "air";

const ALGORITHM: &str = "HMAC-SHA256";
const DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Request content before signing
#[derive(Debug, Clone)]
pub struct SignableRequest {
    pub method: String,
    pub host: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl SignableRequest {
    /// JSON POST with the headers the knowledge-base API requires
    pub fn json_post(host: &str, path: &str, account_id: &str, body: Vec<u8>) -> Self {
        Self {
            method: "POST".to_string(),
            host: host.to_string(),
            path: path.to_string(),
            query: BTreeMap::new(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Host".to_string(), host.to_string()),
                ("V-Account-Id".to_string(), account_id.to_string()),
            ],
            body,
        }
    }
}

/// Request with signature headers attached, ready to send once
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: String,
    pub host: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub signature: String,
    pub timestamp: String,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Full URL for the request under the given scheme
    pub fn url(&self, scheme: &str) -> String {
        let mut url = format!("{}://{}{}", scheme, self.host, self.path);
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query(&self.query));
        }
        url
    }
}

/// Signs outbound knowledge-base requests with a shared credential
#[derive(Clone)]
pub struct RequestSigner {
    credential: Arc<Credential>,
    clock: Arc<dyn Clock>,
}

impl RequestSigner {
    pub fn new(credential: Arc<Credential>, clock: Arc<dyn Clock>) -> Result<Self> {
        credential.ensure_complete()?;
        Ok(Self { credential, clock })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Attach `X-Date`, `X-Content-Sha256` and `Authorization` headers
    pub fn sign(&self, request: SignableRequest) -> Result<SignedRequest> {
        self.credential.ensure_complete()?;

        let SignableRequest {
            method,
            host,
            path,
            query,
            mut headers,
            body,
        } = request;

        let path = if path.is_empty() { "/".to_string() } else { path };
        let timestamp = self.clock.now().format(DATE_FORMAT).to_string();
        let date = &timestamp[..8];
        let body_hash = hex::encode(Sha256::digest(&body));

        headers.retain(|(key, _)| {
            !key.eq_ignore_ascii_case("X-Date")
                && !key.eq_ignore_ascii_case("X-Content-Sha256")
                && !key.eq_ignore_ascii_case("Authorization")
        });
        headers.push(("X-Date".to_string(), timestamp.clone()));
        headers.push(("X-Content-Sha256".to_string(), body_hash.clone()));

        let (canonical_headers, signed_headers) = canonical_headers(&headers);
        let canonical_request = [
            method.to_uppercase(),
            encode_uri(&path, true),
            canonical_query(&query),
            canonical_headers,
            signed_headers.clone(),
            body_hash,
        ]
        .join("\n");

        let scope = format!("{}/{}/{}/request", date, SIGNING_REGION, SIGNING_SERVICE);
        let string_to_sign = [
            ALGORITHM.to_string(),
            timestamp.clone(),
            scope.clone(),
            hex::encode(Sha256::digest(canonical_request.as_bytes())),
        ]
        .join("\n");

        let signing_key = derive_signing_key(self.credential.secret_key(), date)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        headers.push((
            "Authorization".to_string(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM,
                self.credential.access_key(),
                scope,
                signed_headers,
                signature
            ),
        ));

        Ok(SignedRequest {
            method,
            host,
            path,
            query,
            headers,
            body,
            signature,
            timestamp,
        })
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("credential", &self.credential)
            .finish()
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| DeepSearchError::AuthConfig(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn derive_signing_key(secret_key: &str, date: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(secret_key.as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, SIGNING_REGION.as_bytes())?;
    let k_service = hmac_sha256(&k_region, SIGNING_SERVICE.as_bytes())?;
    hmac_sha256(&k_service, b"request")
}

/// Lowercased, sorted `name:value\n` lines plus the `;`-joined name list.
/// Only content-type, content-md5, host and x-* headers take part.
fn canonical_headers(headers: &[(String, String)]) -> (String, String) {
    let mut signed: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in headers {
        let lower = key.to_lowercase();
        if matches!(lower.as_str(), "content-type" | "content-md5" | "host")
            || lower.starts_with("x-")
        {
            signed.insert(lower, value.trim().to_string());
        }
    }

    if let Some(host) = signed.get_mut("host") {
        if let Some((name, port)) = host.split_once(':') {
            if port == "80" || port == "443" {
                *host = name.to_string();
            }
        }
    }

    let lines: String = signed
        .iter()
        .map(|(key, value)| format!("{}:{}\n", key, value))
        .collect();
    let names = signed.keys().cloned().collect::<Vec<_>>().join(";");
    (lines, names)
}

fn canonical_query(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(key, value)| format!("{}={}", encode_uri(key, false), encode_uri(value, false)))
        .collect::<Vec<_>>()
        .join("&")
}

/// RFC 3986 percent-encoding; unreserved characters pass through
fn encode_uri(input: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if keep_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
