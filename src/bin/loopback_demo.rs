//! Runs the executor against a throwaway server on loopback and prints how
//! each call was classified.
//!
//! $ cargo run --bin loopback_demo

use counterpoint_client::application_impl::{RpcConfig, RpcExecutor};
use counterpoint_client::application_port::JsonCall;
use counterpoint_client::infra_tcp::{FaultFrame, ReplyFrame, RequestFrame, TcpChannelFactory};
use counterpoint_client::logger::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;

async fn serve(stream: TcpStream) -> anyhow::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        let request: RequestFrame = serde_json::from_str(&line)?;
        let reply = match request.op.as_str() {
            "account.sign_up" => ReplyFrame::Fault(FaultFrame {
                code: "USERNAME_TAKEN".to_string(),
                message: "Username already exists".to_string(),
            }),
            "lobby.slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                ReplyFrame::Ok(Value::Null)
            }
            "lobby.garbage" => {
                write.write_all(b"<html>\n").await?;
                continue;
            }
            _ => ReplyFrame::Ok(request.payload),
        };
        let mut bytes = serde_json::to_vec(&reply)?;
        bytes.push(b'\n');
        write.write_all(&bytes).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    logger.reload_from_config(&LogConfig {
        filter: "debug".to_string(),
    })?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let endpoint = listener.local_addr()?.to_string();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Err(e) = serve(stream).await {
                    warn!("demo server connection ended: {e:#}");
                }
            });
        }
    });

    let executor = RpcExecutor::new(
        Arc::new(TcpChannelFactory::new()),
        RpcConfig {
            endpoint,
            default_deadline: Duration::from_millis(500),
            close_timeout: Duration::from_millis(200),
        },
        Handle::current(),
    );

    for (operation, payload) in [
        ("session.ping", json!({"seq": 1})),
        ("account.sign_up", json!({"username": "alice"})),
        ("lobby.slow", json!(null)),
        ("lobby.garbage", json!(null)),
    ] {
        let result = executor.call(JsonCall::<Value>::new(operation, payload)).await;
        match result {
            Ok(value) => println!("{operation}: ok {value}"),
            Err(failure) => println!(
                "{operation}: {} -> {:?}",
                failure.category,
                failure.user_message()
            ),
        }
    }

    let unreachable = RpcExecutor::new(
        Arc::new(TcpChannelFactory::new()),
        RpcConfig {
            endpoint: "127.0.0.1:1".to_string(),
            ..RpcConfig::default()
        },
        Handle::current(),
    );
    let failure = unreachable
        .call(JsonCall::<Value>::new("session.ping", json!({})))
        .await
        .unwrap_err();
    println!("unreachable: {}", failure.category);

    Ok(())
}
