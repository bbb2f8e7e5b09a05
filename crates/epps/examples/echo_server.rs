//! Minimal EPP server with a self-signed certificate.
//!
//! Sends a static greeting and answers `<hello/>` commands with a
//! success result. Try it with an EPP client pointed at the listen
//! address, TLS verification disabled.

#![forbid(unsafe_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use epp_common::error::EppError;
use epp_common::namespace::Namespace;
use epp_common::status;
use epp_common::xml::XmlString;
use epp_common::xmlpath::XmlPathBuilder;
use epps::{CommandMux, Server, ServerOptions};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::net::TcpListener;
use tracing::info;

/// CLI arguments for the echo server.
#[derive(Parser, Debug)]
#[command(name = "echo-server")]
#[command(about = "EPP echo server with a self-signed certificate")]
struct Args {
    /// Socket address to listen on.
    #[arg(long, default_value = "127.0.0.1:7000", env = "EPPS_LISTEN")]
    listen: SocketAddr,
    /// Maximum command body size in bytes. 0 disables the limit.
    #[arg(long, default_value = "131072", env = "EPPS_MAX_MESSAGE_SIZE")]
    max_message_size: u32,
    /// Connection idle timeout in seconds. 0 disables the timeout.
    #[arg(long, default_value = "300", env = "EPPS_IDLE_TIMEOUT")]
    idle_timeout: u64,
}

const GREETING: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
  <greeting>
    <svID>epps echo server</svID>
    <svcMenu>
      <version>1.0</version>
      <lang>en</lang>
    </svcMenu>
  </greeting>
</epp>"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut mux = CommandMux::new();

    mux.bind_greeting(Box::new(|_ctx, rw, _doc| {
        let _ = rw.write_all(GREETING.as_bytes());
        Box::pin(async {})
    }));

    let hello_path = XmlPathBuilder::new()
        .add_orphan("//hello", Namespace::IetfEpp10.as_uri())
        .build();
    mux.bind(&hello_path, Box::new(|_ctx, rw, _doc| {
        let result = EppError::new(status::SUCCESS);
        let _ = write!(
            rw,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
  <response>
    <result code="{}">
      <msg>{}</msg>
    </result>
  </response>
</epp>"#,
            result.code,
            XmlString(&result.message),
        );
        Box::pin(async {})
    }));

    let mux = Arc::new(mux);
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(mux.clone()),
        greeting: Some(mux),
        tls_config: Some(self_signed_tls_config()?),
        idle_timeout: Duration::from_secs(args.idle_timeout),
        max_message_size: args.max_message_size,
        ..ServerOptions::default()
    }));

    let listener = TcpListener::bind(args.listen).await?;
    info!("listening on {}", args.listen);

    let mut serve = tokio::spawn(Arc::clone(&server).serve(listener));

    tokio::select! {
        result = &mut serve => result??,
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            server.close();
            serve.await??;
        }
    }

    Ok(())
}

fn self_signed_tls_config() -> Result<Arc<rustls::ServerConfig>> {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
    let cert = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)?;

    Ok(Arc::new(config))
}
