//! Shared helpers for the integration tests: self-signed server TLS,
//! an accept-anything client, and trait adapters for sync handlers.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use epp_common::frame::ResponseWriter;
use epps::{ConnContext, Greeting, HandleCommand, Server, ServerError};
use futures_util::future::BoxFuture;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

pub fn install_crypto_provider() {
    use std::sync::Once;
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Server TLS configuration with a fresh self-signed certificate.
pub fn server_tls_config() -> Arc<rustls::ServerConfig> {
    install_crypto_provider();

    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("generate self-signed certificate");
    let cert_der = certified.cert.der().clone();
    let key_der = PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], PrivateKeyDer::Pkcs8(key_der))
        .expect("build server TLS config");

    Arc::new(config)
}

/// Certificate verifier that accepts whatever the server presents. The
/// tests talk to their own self-signed server on loopback.
#[derive(Debug)]
struct AcceptAnyCert(rustls::crypto::CryptoProvider);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn client_tls_config() -> Arc<rustls::ClientConfig> {
    install_crypto_provider();

    let provider = rustls::crypto::ring::default_provider();
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
        .with_no_client_auth();

    Arc::new(config)
}

/// A TLS client speaking raw RFC 5734 frames.
pub struct TestClient {
    pub stream: tokio_rustls::client::TlsStream<TcpStream>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let tcp = TcpStream::connect(addr).await.expect("connect to server");
        let connector = TlsConnector::from(client_tls_config());
        let server_name = ServerName::try_from("localhost").unwrap();
        let stream = connector
            .connect(server_name, tcp)
            .await
            .expect("TLS handshake");
        Self { stream }
    }

    pub async fn send_frame(&mut self, body: &[u8]) {
        let total = u32::try_from(body.len() + 4).unwrap();
        self.stream.write_all(&total.to_be_bytes()).await.unwrap();
        self.stream.write_all(body).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Sends a raw header and body, without consistency checks.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    pub async fn read_frame(&mut self) -> Vec<u8> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).await.unwrap();
        let total = u32::from_be_bytes(header);
        assert!(total > 4, "frame total {total} has no body");

        let mut body = vec![0u8; total as usize - 4];
        self.stream.read_exact(&mut body).await.unwrap();
        body
    }

    pub async fn read_exact(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.stream.read_exact(&mut bytes).await.unwrap();
        bytes
    }

    /// Asserts the server closes the connection without sending more
    /// bytes.
    pub async fn expect_close(&mut self) {
        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(5), self.stream.read(&mut buf))
            .await
            .expect("timed out waiting for the server to close");
        match read {
            Ok(0) | Err(_) => {}
            Ok(n) => panic!("expected close, read {n} unexpected bytes"),
        }
    }
}

/// Adapts a synchronous closure as a [`Greeting`].
pub struct SyncGreeting<F>(pub F);

impl<F> Greeting for SyncGreeting<F>
where
    F: Fn(ConnContext, &mut ResponseWriter) + Send + Sync,
{
    fn greeting<'a>(&'a self, ctx: ConnContext, rw: &'a mut ResponseWriter) -> BoxFuture<'a, ()> {
        (self.0)(ctx, rw);
        Box::pin(async {})
    }
}

/// Adapts a synchronous closure as a [`HandleCommand`].
pub struct SyncHandler<F>(pub F);

impl<F> HandleCommand for SyncHandler<F>
where
    F: Fn(ConnContext, &mut ResponseWriter, &[u8]) + Send + Sync,
{
    fn handle_command<'a>(
        &'a self,
        ctx: ConnContext,
        rw: &'a mut ResponseWriter,
        cmd: &'a [u8],
    ) -> BoxFuture<'a, ()> {
        (self.0)(ctx, rw, cmd);
        Box::pin(async {})
    }
}

/// Greeting writing the fixed bytes `"Greeting"`.
pub fn greeting() -> Arc<dyn Greeting> {
    Arc::new(SyncGreeting(|_ctx: ConnContext, rw: &mut ResponseWriter| {
        rw.write_all(b"Greeting").unwrap();
    }))
}

/// Handler echoing every command as `"Response to: <cmd>"`.
pub fn echo_handler() -> Arc<dyn HandleCommand> {
    Arc::new(SyncHandler(
        |_ctx: ConnContext, rw: &mut ResponseWriter, cmd: &[u8]| {
            rw.write_all(b"Response to: ").unwrap();
            rw.write_all(cmd).unwrap();
        },
    ))
}

/// Binds a loopback listener and serves `server` on a background task.
pub async fn start_server(
    server: Arc<Server>,
) -> (SocketAddr, JoinHandle<Result<(), ServerError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(Arc::clone(&server).serve(listener));

    tokio::time::sleep(Duration::from_millis(20)).await;

    (addr, handle)
}
