use crate::domain_port::{Channel, ChannelFactory, ChannelFault};
use crate::infra_tcp::{ReplyFrame, RequestFrame};
use serde_json::Value;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const MAX_FRAME: u64 = 1 << 20;

/// Dials a fresh TCP connection per channel.
#[derive(Debug, Default)]
pub struct TcpChannelFactory;

impl TcpChannelFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ChannelFactory for TcpChannelFactory {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Channel>, ChannelFault> {
        let stream = TcpStream::connect(endpoint).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(TcpChannel {
            stream: Some(BufReader::new(stream)),
        }))
    }
}

/// Newline-delimited JSON over one connection.
pub struct TcpChannel {
    stream: Option<BufReader<TcpStream>>,
}

impl TcpChannel {
    fn stream(&mut self) -> Result<&mut BufReader<TcpStream>, ChannelFault> {
        self.stream
            .as_mut()
            .ok_or_else(|| ChannelFault::Faulted("channel already released".to_string()))
    }
}

#[async_trait::async_trait]
impl Channel for TcpChannel {
    async fn invoke(&mut self, operation: &str, payload: Value) -> Result<Value, ChannelFault> {
        let stream = self.stream()?;

        let request = RequestFrame {
            op: operation.to_string(),
            payload,
        };
        let mut line = serde_json::to_vec(&request)
            .map_err(|e| ChannelFault::Protocol(format!("encode request: {e}")))?;
        line.push(b'\n');
        stream.get_mut().write_all(&line).await?;
        stream.get_mut().flush().await?;

        let mut reply = String::new();
        let read = (&mut *stream).take(MAX_FRAME).read_line(&mut reply).await?;
        if read == 0 {
            return Err(ChannelFault::Transport(io::Error::from(
                io::ErrorKind::UnexpectedEof,
            )));
        }
        if !reply.ends_with('\n') {
            return Err(ChannelFault::Protocol("reply frame too large".to_string()));
        }

        match serde_json::from_str::<ReplyFrame>(&reply)
            .map_err(|e| ChannelFault::Protocol(format!("decode reply: {e}")))?
        {
            ReplyFrame::Ok(value) => Ok(value),
            ReplyFrame::Fault(fault) => Err(ChannelFault::Remote {
                code: fault.code,
                message: fault.message,
            }),
        }
    }

    async fn close(&mut self) -> Result<(), ChannelFault> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        stream.into_inner().shutdown().await?;
        Ok(())
    }

    /// Zero linger turns the drop into a reset instead of an orderly FIN.
    fn abort(&mut self) {
        if let Some(stream) = self.stream.take() {
            #[allow(deprecated)]
            let _ = stream.get_ref().set_linger(Some(Duration::ZERO));
        }
    }
}
