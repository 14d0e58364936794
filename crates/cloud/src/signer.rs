//! API-key request signing (HTTP Signatures, version 1, rsa-sha256)
//!
//! The signing string is one `name: value` line per covered header, joined by
//! `\n`. Every request covers `date (request-target) host`; requests that
//! carry a JSON body also cover `content-length content-type x-content-sha256`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use pkcs8::DecodePrivateKey;
use reqwest::Request;
use reqwest::header::{HeaderName, HeaderValue};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::sha2::{Digest, Sha256};
use rsa::signature::{SignatureEncoding, Signer};
use secrecy::ExposeSecret;

use crate::config::ApiKeyCredentials;
use crate::error::{CloudError, CloudResult};

const HEADER_CONTENT_SHA256: &str = "x-content-sha256";

/// Which headers a request's signature covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedHeaders {
    /// `date (request-target) host`
    Basic,
    /// Basic plus `content-length content-type x-content-sha256`
    WithBody,
}

impl SignedHeaders {
    fn names(self) -> &'static [&'static str] {
        match self {
            Self::Basic => &["date", "(request-target)", "host"],
            Self::WithBody => &[
                "date",
                "(request-target)",
                "host",
                "content-length",
                "content-type",
                HEADER_CONTENT_SHA256,
            ],
        }
    }
}

/// Signs requests with an API key
pub struct RequestSigner {
    key_id: String,
    signing_key: SigningKey<Sha256>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// Parse the private key from `credentials`
    pub fn new(credentials: &ApiKeyCredentials) -> CloudResult<Self> {
        let pem = credentials.private_key_pem.expose_secret();
        let passphrase = credentials
            .passphrase
            .as_ref()
            .map(|p| p.expose_secret().to_owned());
        let key = decode_private_key(pem, passphrase.as_deref())?;

        Ok(Self {
            key_id: credentials.key_id(),
            signing_key: SigningKey::<Sha256>::new(key),
        })
    }

    /// `keyId` placed in the authorization header
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign `request` at the current time
    pub fn sign(&self, request: &mut Request, headers: SignedHeaders) -> CloudResult<()> {
        self.sign_at(request, headers, Utc::now())
    }

    /// Sign `request` as of `now`
    ///
    /// Sets `date` and `host`, the body headers when `headers` asks for them,
    /// and finally `authorization`.
    pub fn sign_at(
        &self,
        request: &mut Request,
        headers: SignedHeaders,
        now: DateTime<Utc>,
    ) -> CloudResult<()> {
        let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let host = host_header(request)?;
        let target = request_target(request);

        set_header(request, "date", &date)?;
        set_header(request, "host", &host)?;

        if headers == SignedHeaders::WithBody {
            let body = request
                .body()
                .and_then(reqwest::Body::as_bytes)
                .unwrap_or_default()
                .to_vec();
            let digest = STANDARD.encode(Sha256::digest(&body));
            set_header(request, "content-length", &body.len().to_string())?;
            if !request.headers().contains_key(reqwest::header::CONTENT_TYPE) {
                set_header(request, "content-type", "application/json")?;
            }
            set_header(request, HEADER_CONTENT_SHA256, &digest)?;
        }

        let mut lines = Vec::with_capacity(headers.names().len());
        for name in headers.names() {
            let value = if *name == "(request-target)" {
                target.clone()
            } else {
                request
                    .headers()
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
                    .ok_or_else(|| CloudError::Signing(format!("header {name} is not set")))?
            };
            lines.push(format!("{name}: {value}"));
        }
        let signing_string = lines.join("\n");

        let signature = STANDARD.encode(self.signing_key.sign(signing_string.as_bytes()).to_bytes());
        let authorization = format!(
            r#"Signature version="1",keyId="{}",algorithm="rsa-sha256",headers="{}",signature="{}""#,
            self.key_id,
            headers.names().join(" "),
            signature
        );
        set_header(request, "authorization", &authorization)
    }
}

fn decode_private_key(pem: &str, passphrase: Option<&str>) -> CloudResult<RsaPrivateKey> {
    if pem.contains("ENCRYPTED PRIVATE KEY") {
        let passphrase = passphrase.ok_or_else(|| {
            CloudError::Signing("private key is encrypted but no passphrase was given".into())
        })?;
        return RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase.as_bytes())
            .map_err(|e| CloudError::Signing(format!("cannot decrypt private key: {e}")));
    }
    if pem.contains("BEGIN RSA PRIVATE KEY") {
        return RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| CloudError::Signing(format!("invalid PKCS#1 private key: {e}")));
    }
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| CloudError::Signing(format!("invalid PKCS#8 private key: {e}")))
}

fn host_header(request: &Request) -> CloudResult<String> {
    let url = request.url();
    let host = url
        .host_str()
        .ok_or_else(|| CloudError::Signing(format!("{url} has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

fn request_target(request: &Request) -> String {
    let url = request.url();
    let method = request.method().as_str().to_ascii_lowercase();
    match url.query() {
        Some(query) => format!("{method} {}?{query}", url.path()),
        None => format!("{method} {}", url.path()),
    }
}

fn set_header(request: &mut Request, name: &'static str, value: &str) -> CloudResult<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| CloudError::Signing(format!("invalid {name} header value: {e}")))?;
    request
        .headers_mut()
        .insert(HeaderName::from_static(name), value);
    Ok(())
}
