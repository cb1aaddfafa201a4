//! Line-delimited stdio transport.
//!
//! A reader task forwards raw input lines over a channel to a single processing
//! loop, so requests are handled strictly one at a time. Each response is
//! written as one line, flushed, and followed by an optional settle delay.
//! A line that is not valid UTF-8 is answered with a parse error.
//! End of input does not stop the server: the loop idles until the
//! shutdown token is canceled.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::TransportError;
use crate::core::{HandshakeMode, ProtocolConfig};
use crate::mcp::{handshake, parse_error_response, Dispatcher, RequestContext, Transport};

/// Stdio adapter options.
#[derive(Debug, Clone)]
pub struct StdioOptions {
    /// Readiness sentinels to emit at startup
    pub handshake: HandshakeMode,
    /// Pause after each write
    pub settle_delay: Duration,
}

impl Default for StdioOptions {
    fn default() -> Self {
        Self { handshake: HandshakeMode::Full, settle_delay: Duration::from_millis(10) }
    }
}

impl From<&ProtocolConfig> for StdioOptions {
    fn from(config: &ProtocolConfig) -> Self {
        Self { handshake: config.handshake, settle_delay: Duration::from_millis(config.settle_delay_ms) }
    }
}

/// Serve on the process's stdin and stdout.
pub async fn serve_stdio(
    dispatcher: Arc<Dispatcher>,
    options: StdioOptions,
    shutdown: CancellationToken,
) -> Result<(), TransportError> {
    serve(dispatcher, options, tokio::io::stdin(), tokio::io::stdout(), shutdown).await
}

/// Serve on arbitrary streams.
pub async fn serve<R, W>(
    dispatcher: Arc<Dispatcher>,
    options: StdioOptions,
    input: R,
    mut output: W,
    shutdown: CancellationToken,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    for line in handshake::sentinels(options.handshake, dispatcher.server_info())? {
        write_line(&mut output, &line, options.settle_delay).await?;
    }

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
    let reader = tokio::spawn(async move {
        let mut input = BufReader::new(input);
        loop {
            let mut buf = Vec::new();
            match input.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(buf).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });

    tracing::info!(tools = dispatcher.registry().tool_count(), "stdio transport ready");

    loop {
        let bytes = tokio::select! {
            () = shutdown.cancelled() => break,
            bytes = rx.recv() => bytes,
        };

        let Some(bytes) = bytes else {
            tracing::info!("stdin closed, waiting for shutdown signal");
            shutdown.cancelled().await;
            break;
        };

        let ctx = RequestContext::new(Transport::Stdio).with_parent(&shutdown);
        let response = match String::from_utf8(bytes) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => dispatcher.handle_message(line.trim_end_matches(['\r', '\n']), &ctx).await,
            Err(e) => {
                tracing::warn!(error = %e, correlation_id = %ctx.correlation_id, "input line is not UTF-8");
                Some(parse_error_response(&format!("input is not valid UTF-8: {e}"), &ctx).into())
            }
        };

        if let Some(response) = response {
            let payload = serde_json::to_string(&response)?;
            write_line(&mut output, &payload, options.settle_delay).await?;
        }
    }

    reader.abort();
    tracing::info!("stdio transport stopped");
    Ok(())
}

async fn write_line<W>(output: &mut W, line: &str, settle: Duration) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{DispatcherOptions, MCPServerInfo, Registry};
    use serde_json::Value;
    use tokio::io::{duplex, AsyncReadExt};

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            Arc::new(Registry::new()),
            MCPServerInfo::new("maas-mcp", "test"),
            DispatcherOptions::default(),
        ))
    }

    async fn run(input: &str, handshake: HandshakeMode) -> Vec<String> {
        let (mut client_in, server_in) = duplex(4096);
        let (server_out, mut client_out) = duplex(4096);
        let shutdown = CancellationToken::new();

        let options = StdioOptions { handshake, settle_delay: Duration::ZERO };
        let server = tokio::spawn(serve(dispatcher(), options, server_in, server_out, shutdown.clone()));

        client_in.write_all(input.as_bytes()).await.unwrap();
        drop(client_in);

        // EOF alone must not stop the server
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!server.is_finished());

        shutdown.cancel();
        server.await.unwrap().unwrap();

        let mut raw = String::new();
        client_out.read_to_string(&mut raw).await.unwrap();
        raw.lines().map(String::from).collect()
    }

    #[tokio::test]
    async fn test_requests_answered_in_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"ping","id":1}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"missing","id":2}"#, "\n",
        );
        let lines = run(input, HandshakeMode::None).await;
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(first["result"], serde_json::json!({}));

        let second: Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_full_handshake_precedes_responses() {
        let lines = run("{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":1}\n", HandshakeMode::Full).await;
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], handshake::READY_BANNER);
        assert!(lines[3].contains("\"id\":1"));
    }

    #[tokio::test]
    async fn test_read_error_is_treated_as_end_of_input() {
        let input = tokio_test::io::Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":\"a\"}\n")
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let (server_out, mut client_out) = duplex(4096);
        let shutdown = CancellationToken::new();

        let options = StdioOptions { handshake: HandshakeMode::Single, settle_delay: Duration::ZERO };
        let server = tokio::spawn(serve(dispatcher(), options, input, server_out, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!server.is_finished());
        shutdown.cancel();
        server.await.unwrap().unwrap();

        let mut raw = String::new();
        client_out.read_to_string(&mut raw).await.unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("notifications/ready"));
        assert!(lines[1].contains("\"id\":\"a\""));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_gets_parse_error_and_loop_continues() {
        let input = tokio_test::io::Builder::new()
            .read(b"\xff\xfe garbage\n")
            .read(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":1}\r\n")
            .build();
        let (server_out, mut client_out) = duplex(4096);
        let shutdown = CancellationToken::new();

        let options = StdioOptions { handshake: HandshakeMode::None, settle_delay: Duration::ZERO };
        let server = tokio::spawn(serve(dispatcher(), options, input, server_out, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        server.await.unwrap().unwrap();

        let mut raw = String::new();
        client_out.read_to_string(&mut raw).await.unwrap();
        let lines: Vec<Value> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["error"]["code"], -32700);
        assert_eq!(lines[0]["id"], Value::Null);
        assert_eq!(lines[1]["id"], 1);
        assert_eq!(lines[1]["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_parse_error_keeps_loop_alive() {
        let input = "garbage\n{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":9}\n";
        let lines = run(input, HandshakeMode::None).await;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("-32700"));
        assert!(lines[1].contains("\"id\":9"));
    }
}
