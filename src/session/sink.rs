// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Outbound event sinks

use std::sync::Mutex;

use tokio::sync::mpsc;

use super::protocol::ServerEvent;

/// Destination for a session's events. Emission order is delivery order.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ServerEvent);
}

/// Forwards events into a channel drained by a transport writer
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { tx }
    }

    /// A sink plus the receiver for its events
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ServerEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            tracing::debug!(target: "roundtable.session", kind, "event dropped, client gone");
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ServerEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ServerEvent> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// The `type` tags in emission order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(ServerEvent::kind).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ServerEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.emit(ServerEvent::Ready);
        sink.emit(ServerEvent::RoundStart { round: 0 });
        assert_eq!(rx.recv().await, Some(ServerEvent::Ready));
        assert_eq!(rx.recv().await, Some(ServerEvent::RoundStart { round: 0 }));
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.emit(ServerEvent::Stopped);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.emit(ServerEvent::Paused);
        sink.emit(ServerEvent::Resumed);
        assert_eq!(sink.kinds(), vec!["paused", "resumed"]);
    }
}
