mod common;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;
use epp_common::frame::ResponseWriter;
use epp_common::namespace::Namespace;
use epps::{
    CommandMux, ConnAborted, ConnContext, ConnId, Server, ServerError, ServerOptions,
    ServerTlsStream,
};

#[tokio::test]
async fn greeting_frame_is_sent_on_connect() {
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(echo_handler()),
        greeting: Some(greeting()),
        tls_config: Some(server_tls_config()),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;

    // 12 bytes on the wire: the header counts itself.
    let wire = client.read_exact(12).await;
    assert_eq!(
        wire,
        [0x00, 0x00, 0x00, 0x0C, b'G', b'r', b'e', b'e', b't', b'i', b'n', b'g']
    );

    server.close();
}

#[tokio::test]
async fn commands_are_echoed() {
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(echo_handler()),
        greeting: Some(greeting()),
        tls_config: Some(server_tls_config()),
        idle_timeout: Duration::from_secs(10),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_frame().await, b"Greeting");

    client.send_frame(b"A command").await;
    assert_eq!(client.read_frame().await, b"Response to: A command");

    // The response writer is reused; a second command works the same.
    client.send_frame(b"Another").await;
    assert_eq!(client.read_frame().await, b"Response to: Another");

    server.close();
}

#[tokio::test]
async fn oversized_message_closes_the_connection() {
    let handled = Arc::new(AtomicBool::new(false));

    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(Arc::new(SyncHandler({
            let handled = Arc::clone(&handled);
            move |_ctx: ConnContext, _rw: &mut ResponseWriter, _cmd: &[u8]| {
                handled.store(true, Ordering::SeqCst);
            }
        }))),
        greeting: Some(greeting()),
        tls_config: Some(server_tls_config()),
        max_message_size: 9,
        idle_timeout: Duration::from_secs(10),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_frame().await, b"Greeting");

    // Total of 14 declares a 10-byte body, one over the cap.
    let mut oversize = 14u32.to_be_bytes().to_vec();
    oversize.extend_from_slice(&[b'x'; 10]);
    client.send_raw(&oversize).await;

    client.expect_close().await;
    assert!(!handled.load(Ordering::SeqCst));

    server.close();
}

#[tokio::test]
async fn unknown_command_closes_the_connection() {
    let foo_called = Arc::new(AtomicBool::new(false));

    let mut mux = CommandMux::new();
    mux.bind_greeting(Box::new(|_ctx, rw, _doc| {
        let _ = rw.write_all(b"Greeting");
        Box::pin(async {})
    }));
    mux.bind("//foo", {
        let foo_called = Arc::clone(&foo_called);
        Box::new(move |_ctx, _rw, _doc| {
            foo_called.store(true, Ordering::SeqCst);
            Box::pin(async {})
        })
    });
    let mux = Arc::new(mux);

    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(mux.clone()),
        greeting: Some(mux),
        tls_config: Some(server_tls_config()),
        idle_timeout: Duration::from_secs(10),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_frame().await, b"Greeting");

    client
        .send_frame(
            format!(
                r#"<epp xmlns="{}"><bar/></epp>"#,
                Namespace::IetfEpp10.as_uri()
            )
            .as_bytes(),
        )
        .await;

    // No response body is pending, so the close comes with no frame.
    client.expect_close().await;
    assert!(!foo_called.load(Ordering::SeqCst));

    server.close();
}

#[tokio::test]
async fn handler_close_after_write_flushes_then_closes() {
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(Arc::new(SyncHandler(
            |_ctx: ConnContext, rw: &mut ResponseWriter, _cmd: &[u8]| {
                rw.write_all(b"goodbye").unwrap();
                rw.close_after_write();
            },
        ))),
        greeting: Some(greeting()),
        tls_config: Some(server_tls_config()),
        idle_timeout: Duration::from_secs(10),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_frame().await, b"Greeting");

    client.send_frame(b"logout").await;
    assert_eq!(client.read_frame().await, b"goodbye");
    client.expect_close().await;

    server.close();
}

#[tokio::test]
async fn close_unblocks_serve() {
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(echo_handler()),
        greeting: Some(greeting()),
        tls_config: Some(server_tls_config()),
        ..ServerOptions::default()
    }));
    let (addr, serve) = start_server(Arc::clone(&server)).await;

    // A live connection must not keep the server from shutting down.
    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_frame().await, b"Greeting");

    server.close();

    let result = tokio::time::timeout(Duration::from_secs(10), serve)
        .await
        .expect("serve did not return after close")
        .unwrap();
    assert!(result.is_ok());

    client.expect_close().await;
}

#[tokio::test]
async fn idle_timeout_closes_quiet_connections() {
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(echo_handler()),
        greeting: Some(greeting()),
        tls_config: Some(server_tls_config()),
        idle_timeout: Duration::from_millis(200),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_frame().await, b"Greeting");

    client.expect_close().await;

    server.close();
}

#[tokio::test]
async fn conn_context_hook_stores_values_for_handlers() {
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(Arc::new(SyncHandler(
            |ctx: ConnContext, rw: &mut ResponseWriter, _cmd: &[u8]| {
                let user = ctx.value("user").unwrap_or_default();
                write!(rw, "user={user}").unwrap();
            },
        ))),
        greeting: Some(greeting()),
        conn_context: Some(Arc::new(
            |ctx: &ConnContext, _tls: &ServerTlsStream| -> Result<(), ConnAborted> {
                ctx.set_value("user", "registrar-7");
                Ok(())
            },
        )),
        tls_config: Some(server_tls_config()),
        idle_timeout: Duration::from_secs(10),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_frame().await, b"Greeting");

    client.send_frame(b"whoami").await;
    assert_eq!(client.read_frame().await, b"user=registrar-7");

    server.close();
}

#[tokio::test]
async fn conn_context_error_aborts_before_the_greeting() {
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(echo_handler()),
        greeting: Some(greeting()),
        conn_context: Some(Arc::new(
            |_ctx: &ConnContext, _tls: &ServerTlsStream| -> Result<(), ConnAborted> {
                Err(ConnAborted)
            },
        )),
        tls_config: Some(server_tls_config()),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;
    client.expect_close().await;

    server.close();
}

#[tokio::test]
async fn close_conn_hook_runs_with_the_final_context() {
    let hook_user = Arc::new(Mutex::new(None::<String>));

    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(echo_handler()),
        greeting: Some(greeting()),
        conn_context: Some(Arc::new(
            |ctx: &ConnContext, _tls: &ServerTlsStream| -> Result<(), ConnAborted> {
                ctx.set_value("user", "registrar-9");
                Ok(())
            },
        )),
        close_conn_hook: Some(Arc::new({
            let hook_user = Arc::clone(&hook_user);
            move |ctx: &ConnContext, _peer: std::net::SocketAddr| {
                *hook_user.lock().unwrap() = ctx.value("user");
            }
        })),
        tls_config: Some(server_tls_config()),
        idle_timeout: Duration::from_millis(200),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_frame().await, b"Greeting");
    client.expect_close().await;

    // The hook runs in the worker's teardown, shortly after the close.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if hook_user.lock().unwrap().as_deref() == Some("registrar-9") {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "close hook did not run"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    server.close();
}

#[tokio::test]
async fn close_connection_interrupts_a_parked_connection() {
    let conn_id = Arc::new(Mutex::new(None::<ConnId>));

    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(echo_handler()),
        greeting: Some(greeting()),
        conn_context: Some(Arc::new({
            let conn_id = Arc::clone(&conn_id);
            move |ctx: &ConnContext, _tls: &ServerTlsStream| -> Result<(), ConnAborted> {
                *conn_id.lock().unwrap() = Some(ctx.conn_id());
                Ok(())
            }
        })),
        tls_config: Some(server_tls_config()),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_frame().await, b"Greeting");

    let id = conn_id.lock().unwrap().take().expect("conn id captured");
    assert!(server.close_connection(id));

    // The parked connection closes; the server keeps serving others.
    client.expect_close().await;

    let mut second = TestClient::connect(addr).await;
    assert_eq!(second.read_frame().await, b"Greeting");

    server.close();
}

#[tokio::test]
async fn concurrent_connections_are_isolated() {
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(echo_handler()),
        greeting: Some(greeting()),
        tls_config: Some(server_tls_config()),
        idle_timeout: Duration::from_secs(10),
        ..ServerOptions::default()
    }));
    let (addr, _serve) = start_server(Arc::clone(&server)).await;

    let mut first = TestClient::connect(addr).await;
    let mut second = TestClient::connect(addr).await;
    assert_eq!(first.read_frame().await, b"Greeting");
    assert_eq!(second.read_frame().await, b"Greeting");

    second.send_frame(b"from second").await;
    first.send_frame(b"from first").await;

    assert_eq!(first.read_frame().await, b"Response to: from first");
    assert_eq!(second.read_frame().await, b"Response to: from second");

    server.close();
}

#[tokio::test]
#[should_panic(expected = "handle_command and greeting are required")]
async fn serve_panics_without_the_required_callbacks() {
    let server = Arc::new(Server::new(ServerOptions {
        tls_config: Some(server_tls_config()),
        ..ServerOptions::default()
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let _ = server.serve(listener).await;
}

#[tokio::test]
async fn serve_requires_a_tls_config() {
    let server = Arc::new(Server::new(ServerOptions {
        handle_command: Some(echo_handler()),
        greeting: Some(greeting()),
        ..ServerOptions::default()
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let result = server.serve(listener).await;
    assert!(matches!(result, Err(ServerError::MissingTlsConfig)));
}
