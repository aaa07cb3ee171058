use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::client::{ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::{
    self, Certificate, ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName,
};
use tokio_rustls::TlsConnector;
use url::Url;

/// Default Gemini port, used when the target URL carries none.
pub const DEFAULT_PORT: u16 = 1965;

// Body text retained for link spidering is capped; byte counting is not.
const BODY_CAPTURE_LIMIT: usize = 512 * 1024;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("url '{0}' has no host")]
    MissingHost(Url),

    #[error("invalid server name '{0}'")]
    InvalidServerName(String),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out talking to {addr}")]
    Timeout { addr: String },

    #[error("tls handshake with {addr} failed: {source}")]
    Handshake {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request write failed: {source}")]
    Write {
        #[source]
        source: std::io::Error,
    },

    #[error("malformed response header {0:?}")]
    MalformedHeader(String),

    #[error("response read failed: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one probe. `status`/`meta` are empty when the request failed
/// before a header was parsed; `error` is set for any failure, including a
/// body read that died after a valid header (in which case `size` holds the
/// bytes drained so far).
#[derive(Debug, Default)]
pub struct FetchResult {
    pub status: String,
    pub meta: String,
    pub size: u64,
    pub body: Option<String>,
    pub error: Option<ClientError>,
}

/// Seam between the workers and the network, so scans can run against stub
/// servers in tests.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn fetch(&self, url: &Url) -> FetchResult;
}

// Gemini servers overwhelmingly present self-signed certificates (trust on
// first use), so certificate validation has to be optional.
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

fn tls_config(insecure: bool) -> ClientConfig {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));
    let mut config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    if insecure {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyServerCert));
    }
    config
}

/// Stateless Gemini client: one TLS connection per fetch, no pooling, no
/// retries. The timeout bounds connect, handshake, and each body read.
pub struct GeminiClient {
    connector: TlsConnector,
    timeout: Duration,
    capture_body: bool,
}

#[derive(Debug)]
struct RawResponse {
    status: String,
    meta: String,
    size: u64,
    body: Option<String>,
    error: Option<ClientError>,
}

impl GeminiClient {
    pub fn new(timeout: Duration, insecure: bool, capture_body: bool) -> Self {
        Self {
            connector: TlsConnector::from(Arc::new(tls_config(insecure))),
            timeout,
            capture_body,
        }
    }

    async fn fetch_raw(&self, url: &Url) -> Result<RawResponse, ClientError> {
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::MissingHost(url.clone()))?
            .to_string();
        let port = url.port().unwrap_or(DEFAULT_PORT);
        let addr = format!("{host}:{port}");

        let server_name = ServerName::try_from(host.as_str())
            .map_err(|_| ClientError::InvalidServerName(host.clone()))?;

        let tcp = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::Timeout { addr: addr.clone() })?
            .map_err(|e| ClientError::Connect {
                addr: addr.clone(),
                source: e,
            })?;

        let stream = timeout(self.timeout, self.connector.connect(server_name, tcp))
            .await
            .map_err(|_| ClientError::Timeout { addr: addr.clone() })?
            .map_err(|e| ClientError::Handshake { addr, source: e })?;

        self.converse(stream, url.as_str()).await
    }

    // The wire exchange, split from dialing so tests can drive it over an
    // in-memory duplex stream.
    async fn converse<S>(&self, stream: S, target: &str) -> Result<RawResponse, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(stream);

        reader
            .write_all(format!("{target}\r\n").as_bytes())
            .await
            .map_err(|e| ClientError::Write { source: e })?;

        let mut header = String::new();
        let read = timeout(self.timeout, reader.read_line(&mut header))
            .await
            .map_err(|_| ClientError::Timeout {
                addr: target.to_string(),
            })?
            .map_err(|e| ClientError::Read { source: e })?;
        if read == 0 {
            return Err(ClientError::MalformedHeader(String::new()));
        }

        let line = header.trim_end_matches(['\r', '\n']);
        let (status, meta) = match line.split_once(' ') {
            Some((status, meta)) => (status, meta.trim()),
            None => (line, ""),
        };
        if status.len() != 2 || !status.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClientError::MalformedHeader(line.to_string()));
        }
        let status = status.to_string();
        let meta = meta.to_string();

        // Drain the body to EOF regardless of status: whether a payload
        // follows is the server's choice, and the size exclusion filter
        // needs an accurate count either way.
        let mut size = 0u64;
        let mut captured: Vec<u8> = Vec::new();
        let mut buf = [0u8; 8192];
        let error = loop {
            match timeout(self.timeout, reader.read(&mut buf)).await {
                Err(_) => {
                    break Some(ClientError::Timeout {
                        addr: target.to_string(),
                    })
                }
                Ok(Err(e)) => break Some(ClientError::Read { source: e }),
                Ok(Ok(0)) => break None,
                Ok(Ok(n)) => {
                    size += n as u64;
                    if self.capture_body && captured.len() < BODY_CAPTURE_LIMIT {
                        let room = BODY_CAPTURE_LIMIT - captured.len();
                        captured.extend_from_slice(&buf[..n.min(room)]);
                    }
                }
            }
        };

        let body = (self.capture_body && !captured.is_empty())
            .then(|| String::from_utf8_lossy(&captured).into_owned());

        Ok(RawResponse {
            status,
            meta,
            size,
            body,
            error,
        })
    }
}

#[async_trait]
impl Probe for GeminiClient {
    async fn fetch(&self, url: &Url) -> FetchResult {
        tracing::debug!(url = %url, "fetching");
        match self.fetch_raw(url).await {
            Ok(raw) => FetchResult {
                status: raw.status,
                meta: raw.meta,
                size: raw.size,
                body: raw.body,
                error: raw.error,
            },
            Err(e) => FetchResult {
                error: Some(e),
                ..FetchResult::default()
            },
        }
    }
}
