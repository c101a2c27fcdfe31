// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::memory::MemoryCoordinator;
use tokio::io::AsyncWriteExt;

const TIMEOUT: Duration = Duration::from_secs(2);

async fn connected_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, _) = listener.accept().await.unwrap();
    (client, server)
}

#[tokio::test]
async fn ping_is_answered() {
    let coordinator = MemoryCoordinator::new();
    let (client, server) = connected_pair().await;
    let handler = tokio::spawn(async move {
        handle_connection(&coordinator, server, TIMEOUT).await
    });

    let (reader, mut writer) = client.into_split();
    protocol::write_message(&mut writer, &Request::Ping, TIMEOUT)
        .await
        .unwrap();
    let response: Response = protocol::read_message(&mut BufReader::new(reader), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(response, Response::Pong);
    handler.await.unwrap().unwrap();
}

#[tokio::test]
async fn garbage_request_is_a_protocol_error() {
    let coordinator = MemoryCoordinator::new();
    let (mut client, server) = connected_pair().await;
    let handler = tokio::spawn(async move {
        handle_connection(&coordinator, server, TIMEOUT).await
    });

    client.write_all(b"not json\n").await.unwrap();

    assert!(matches!(
        handler.await.unwrap(),
        Err(ServerError::Protocol(ProtocolError::Json(_)))
    ));
}

#[tokio::test]
async fn silent_client_is_dropped() {
    let coordinator = MemoryCoordinator::new();
    let (_client, server) = connected_pair().await;

    let result = handle_connection(&coordinator, server, Duration::from_millis(20)).await;

    assert!(matches!(
        result,
        Err(ServerError::Protocol(ProtocolError::Timeout))
    ));
}
