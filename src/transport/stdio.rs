// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! JSON-lines transport
//!
//! Each inbound line is one [`ClientMessage`]; each outbound line is one
//! [`ServerEvent`], written in emission order.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::error::{Result, RoundtableError};
use crate::session::{ChannelSink, ClientMessage, EventSink, ServerEvent};

/// Parse one inbound line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ClientMessage>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| RoundtableError::Protocol(format!("Invalid message: {}", e)))
}

/// Render one outbound event as a line, newline included
pub fn encode_event(event: &ServerEvent) -> Result<String> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}

/// Reader and writer halves of a line-oriented connection
pub struct StdioTransport<R, W> {
    reader: R,
    writer: W,
}

impl StdioTransport<BufReader<Stdin>, Stdout> {
    /// The process's own stdin and stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

/// Background tasks of a started transport
pub struct TransportTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<Result<()>>,
}

impl TransportTasks {
    /// Stop reading and wait until every emitted event is written.
    ///
    /// Returns once all sinks feeding the writer have been dropped.
    pub async fn finish(self) -> Result<()> {
        self.reader.abort();
        match self.writer.await {
            Ok(result) => result,
            Err(e) => Err(RoundtableError::Protocol(format!("writer task failed: {}", e))),
        }
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Start the reader and writer tasks.
    ///
    /// Parsed messages arrive on the returned receiver, which closes at end
    /// of input. Malformed lines are answered through `sink` and skipped.
    pub fn start(
        self,
        sink: ChannelSink,
        events: mpsc::UnboundedReceiver<ServerEvent>,
    ) -> (mpsc::UnboundedReceiver<ClientMessage>, TransportTasks) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_messages(self.reader, tx, sink));
        let writer = tokio::spawn(write_events(self.writer, events));
        (rx, TransportTasks { reader, writer })
    }
}

async fn read_messages<R>(reader: R, tx: mpsc::UnboundedSender<ClientMessage>, sink: ChannelSink)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.transpose() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(target: "roundtable.transport", error = %e, "read failed");
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(message)) => {
                if tx.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(target: "roundtable.transport", error = %e, "skipping malformed line");
                let reply = match e {
                    RoundtableError::Protocol(msg) => msg,
                    other => other.to_string(),
                };
                sink.emit(ServerEvent::error(reply));
            }
        }
    }
    tracing::debug!(target: "roundtable.transport", "input closed");
}

async fn write_events<W>(mut writer: W, events: mpsc::UnboundedReceiver<ServerEvent>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut events = UnboundedReceiverStream::new(events);
    while let Some(event) = events.next().await {
        let line = encode_event(&event)?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let msg = parse_line(r#"{"type":"stop"}"#).unwrap();
        assert_eq!(msg, Some(ClientMessage::Stop));
    }

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_malformed_line() {
        let err = parse_line("{not json").unwrap_err();
        assert!(matches!(err, RoundtableError::Protocol(ref msg) if msg.starts_with("Invalid message")));
    }

    #[test]
    fn test_encode_event() {
        let line = encode_event(&ServerEvent::RoundEnd { round: 2 }).unwrap();
        assert_eq!(line, "{\"type\":\"round_end\",\"round\":2}\n");
    }

    #[tokio::test]
    async fn test_round_trip_through_pipes() {
        let input = b"{\"type\":\"pause\"}\ngarbage\n\n{\"type\":\"resume\"}\n".to_vec();
        let (client, server_out) = tokio::io::duplex(4096);

        let (sink, events) = ChannelSink::channel();
        let transport = StdioTransport::new(std::io::Cursor::new(input), server_out);
        let (mut inbound, tasks) = transport.start(sink.clone(), events);

        assert_eq!(inbound.recv().await, Some(ClientMessage::Pause));
        assert_eq!(inbound.recv().await, Some(ClientMessage::Resume));
        assert_eq!(inbound.recv().await, None);

        sink.emit(ServerEvent::Paused);
        drop(sink);
        tasks.finish().await.unwrap();

        let mut output = String::new();
        let mut lines = BufReader::new(client).lines();
        while let Some(line) = lines.next_line().await.unwrap() {
            output.push_str(&line);
            output.push('\n');
        }
        let mut out_lines = output.lines();
        let first: serde_json::Value = serde_json::from_str(out_lines.next().unwrap()).unwrap();
        assert_eq!(first["type"], "error");
        let text = first["error"].as_str().unwrap();
        assert!(text.starts_with("Invalid message"), "{}", text);
        assert!(!text.contains("Protocol error"));
        assert_eq!(out_lines.next(), Some(r#"{"type":"paused"}"#));
    }
}
