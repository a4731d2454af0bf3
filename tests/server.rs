//! End-to-end wire tests: a real listener on an ephemeral port, literal
//! RESP bytes in, literal RESP bytes out.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use spinel::commands::COMMAND_REPLY;
use spinel::server::serve;
use spinel::storage::memory::MemoryEngine;
use spinel::storage::StorageEngine;

async fn start_server() -> SocketAddr {
    let engine: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(serve(listener, engine));

    address
}

/// Sends a request and asserts the reply byte-for-byte.
async fn roundtrip(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
    stream.write_all(request).await.unwrap();

    let mut reply = vec![0u8; expected.len()];
    stream.read_exact(&mut reply).await.unwrap();

    assert_eq!(
        reply,
        expected,
        "request {:?} expected {:?} got {:?}",
        String::from_utf8_lossy(request),
        String::from_utf8_lossy(expected),
        String::from_utf8_lossy(&reply),
    );
}

#[tokio::test]
async fn test_set_get_exists_del_cycle() {
    let address = start_server().await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    roundtrip(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
    roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n", b"$3\r\nbar\r\n").await;
    roundtrip(&mut stream, b"*2\r\n$6\r\nEXISTS\r\n$3\r\nfoo\r\n", b":1\r\n").await;
    roundtrip(&mut stream, b"*2\r\n$6\r\nEXISTS\r\n$3\r\nxxx\r\n", b":0\r\n").await;
    roundtrip(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$3\r\nxxx\r\n",
        b"-ERR key not found\r\n",
    )
    .await;
    roundtrip(
        &mut stream,
        b"*2\r\n$4\r\nKEYS\r\n$1\r\n*\r\n",
        b"*1\r\n$3\r\nfoo\r\n",
    )
    .await;
    roundtrip(&mut stream, b"*2\r\n$3\r\nDEL\r\n$3\r\nfoo\r\n", b"+OK\r\n").await;
    roundtrip(
        &mut stream,
        b"*2\r\n$3\r\nDEL\r\n$3\r\nfoo\r\n",
        b"-ERR key not found\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_command_descriptor() {
    let address = start_server().await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    roundtrip(&mut stream, b"*1\r\n$7\r\nCOMMAND\r\n", COMMAND_REPLY.as_bytes()).await;
}

#[tokio::test]
async fn test_unknown_command() {
    let address = start_server().await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    roundtrip(
        &mut stream,
        b"*2\r\n$4\r\nPING\r\n$0\r\n\r\n",
        b"-ERR unknown command: PING\r\n",
    )
    .await;

    // The connection survives a command error.
    roundtrip(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\nb\r\n",
        b"+OK\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_commands_are_case_insensitive() {
    let address = start_server().await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    roundtrip(
        &mut stream,
        b"*3\r\n$3\r\nset\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
    roundtrip(&mut stream, b"*2\r\n$3\r\ngEt\r\n$3\r\nfoo\r\n", b"$3\r\nbar\r\n").await;
}

#[tokio::test]
async fn test_wrong_arity_keeps_connection_open() {
    let address = start_server().await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    roundtrip(
        &mut stream,
        b"*2\r\n$3\r\nSET\r\n$3\r\nfoo\r\n",
        b"-ERR wrong number of arguments for 'SET' command\r\n",
    )
    .await;
    roundtrip(
        &mut stream,
        b"*1\r\n$3\r\nGET\r\n",
        b"-ERR wrong number of arguments for 'GET' command\r\n",
    )
    .await;
    roundtrip(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_keys_glob_over_wire() {
    let address = start_server().await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    for (key, length) in [("foo", 3), ("foobar", 6), ("bar", 3)] {
        let request = format!("*3\r\n$3\r\nSET\r\n${length}\r\n{key}\r\n$1\r\nx\r\n");
        roundtrip(&mut stream, request.as_bytes(), b"+OK\r\n").await;
    }

    // `KEYS foo*` matches foo and foobar; bucket order is unspecified, so
    // read the fixed-size reply and check membership.
    stream
        .write_all(b"*2\r\n$4\r\nKEYS\r\n$4\r\nfoo*\r\n")
        .await
        .unwrap();

    let mut reply = vec![0u8; 4 + 9 + 12];
    stream.read_exact(&mut reply).await.unwrap();
    let reply = String::from_utf8(reply).unwrap();

    assert!(reply.starts_with("*2\r\n"), "reply was {reply:?}");
    assert!(reply.contains("$3\r\nfoo\r\n"));
    assert!(reply.contains("$6\r\nfoobar\r\n"));

    // An exact pattern with no wildcard matches only itself.
    roundtrip(
        &mut stream,
        b"*2\r\n$4\r\nKEYS\r\n$3\r\nbar\r\n",
        b"*1\r\n$3\r\nbar\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_binary_values_round_trip() {
    let address = start_server().await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    let mut request = b"*3\r\n$3\r\nSET\r\n$3\r\nbin\r\n$4\r\n".to_vec();
    request.extend_from_slice(&[0x00, 0xff, 0x0d, 0x0a]);
    request.extend_from_slice(b"\r\n");
    roundtrip(&mut stream, &request, b"+OK\r\n").await;

    let mut expected = b"$4\r\n".to_vec();
    expected.extend_from_slice(&[0x00, 0xff, 0x0d, 0x0a]);
    expected.extend_from_slice(b"\r\n");
    roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$3\r\nbin\r\n", &expected).await;
}

#[tokio::test]
async fn test_pipelined_requests_processed_in_order() {
    let address = start_server().await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    // Two requests written back-to-back; replies come back in order.
    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
        .await
        .unwrap();

    let expected = b"+OK\r\n$1\r\nv\r\n";
    let mut reply = vec![0u8; expected.len()];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, expected);
}

#[tokio::test]
async fn test_protocol_error_closes_connection_without_reply() {
    let address = start_server().await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    stream.write_all(b"GET foo\r\n").await.unwrap();

    // The server drops the connection with nothing written.
    let mut buffer = Vec::new();
    let read = stream.read_to_end(&mut buffer).await.unwrap();
    assert_eq!(read, 0);
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn test_concurrent_connections_share_the_store() {
    let address = start_server().await;

    let mut writer = TcpStream::connect(address).await.unwrap();
    let mut reader = TcpStream::connect(address).await.unwrap();

    roundtrip(
        &mut writer,
        b"*3\r\n$3\r\nSET\r\n$6\r\nshared\r\n$5\r\nvalue\r\n",
        b"+OK\r\n",
    )
    .await;
    roundtrip(
        &mut reader,
        b"*2\r\n$3\r\nGET\r\n$6\r\nshared\r\n",
        b"$5\r\nvalue\r\n",
    )
    .await;
}
