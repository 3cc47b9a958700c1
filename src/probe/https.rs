use super::response::ResponseReader;
use super::{body_matches, ProbeRequest, Prober};
use crate::model::DEFAULT_MAX_BODY_BYTES;
use crate::util::join_host_port;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;
use tracing::debug;

pub const HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone)]
pub struct HttpsProbe {
    port: u16,
    max_body_bytes: usize,
}

impl Default for HttpsProbe {
    fn default() -> Self {
        Self {
            port: HTTPS_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl HttpsProbe {
    pub fn new(max_body_bytes: usize) -> Self {
        Self {
            max_body_bytes,
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn fetch_body(&self, address: &str) -> anyhow::Result<Vec<u8>> {
        let endpoint = join_host_port(address, self.port);
        let stream = TcpStream::connect(endpoint.as_str())
            .await
            .with_context(|| format!("failed to connect to {endpoint}"))?;

        let host = address.trim_start_matches('[').trim_end_matches(']');
        let is_ip = host.parse::<IpAddr>().is_ok();
        let mut config = https_connector()?
            .configure()
            .context("failed to configure TLS connector")?;
        // Certificates are never checked, so neither is the name they attest to.
        config.set_verify_hostname(false);
        if is_ip {
            config.set_use_server_name_indication(false);
        }
        let ssl = config
            .into_ssl(host)
            .context("failed to configure TLS session")?;
        let mut tls_stream =
            SslStream::new(ssl, stream).context("failed to initialize TLS stream")?;
        Pin::new(&mut tls_stream)
            .connect()
            .await
            .with_context(|| format!("TLS handshake failed for {endpoint}"))?;

        let authority = match (self.port, host.contains(':')) {
            (HTTPS_PORT, true) => format!("[{host}]"),
            (HTTPS_PORT, false) => host.to_string(),
            (port, _) => join_host_port(host, port),
        };
        let request = format!(
            "GET / HTTP/1.0\r\nHost: {authority}\r\nConnection: close\r\n\r\n"
        );
        tls_stream
            .write_all(request.as_bytes())
            .await
            .context("failed to write HTTPS request")?;

        let response = ResponseReader::new(self.max_body_bytes)
            .read(&mut tls_stream)
            .await?;
        debug!(%endpoint, status = response.status, bytes = response.body.len(), "received response");
        Ok(response.body)
    }
}

#[async_trait]
impl Prober for HttpsProbe {
    fn name(&self) -> &'static str {
        "https"
    }

    async fn probe(&self, req: &ProbeRequest<'_>) -> bool {
        match timeout(req.timeout, self.fetch_body(req.address)).await {
            Ok(Ok(body)) => body_matches(&body, req.search_text),
            Ok(Err(err)) => {
                let reason = format!("{err:#}");
                debug!(address = req.address, error = %reason, "probe failed");
                false
            }
            Err(_) => {
                debug!(address = req.address, "probe timed out");
                false
            }
        }
    }
}

fn https_connector() -> anyhow::Result<&'static SslConnector> {
    static CONNECTOR: OnceLock<anyhow::Result<SslConnector>> = OnceLock::new();

    CONNECTOR
        .get_or_init(|| {
            let mut builder = SslConnector::builder(SslMethod::tls()).map_err(|e| anyhow!(e))?;
            // Addresses are scanned for content, not identity: accept any certificate.
            builder.set_verify(SslVerifyMode::NONE);
            Ok(builder.build())
        })
        .as_ref()
        .map_err(|err| anyhow!("failed to create TLS connector: {err}"))
}
