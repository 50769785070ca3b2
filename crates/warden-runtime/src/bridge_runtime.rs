//! Gateway bridge loop: connect, authenticate, read frames, dispatch rules.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use warden_gateway::{classify_inbound_frame, ActionSink, InboundEvent, OutboundAction};
use warden_rules::RuleEngine;

#[derive(Debug, Clone)]
/// Transport configuration for the bridge loop.
pub struct BridgeConfig {
    pub gateway_url: String,
    pub token: Option<String>,
    pub reconnect_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Runs the bridge until ctrl-c. Session errors reconnect after the
/// configured delay; a single bad frame never ends the session.
pub async fn run_warden_bridge(config: BridgeConfig, engine: RuleEngine) -> Result<()> {
    loop {
        match run_socket_session(&config, &engine).await {
            Ok(SessionEnd::Shutdown) => {
                tracing::info!("warden bridge shutdown requested");
                return Ok(());
            }
            Ok(SessionEnd::Disconnected) => {
                tracing::warn!("gateway socket closed: url={}", config.gateway_url);
            }
            Err(error) => {
                tracing::error!("gateway session failed: {error:#}");
            }
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("warden bridge shutdown requested");
                return Ok(());
            }
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
}

async fn run_socket_session(config: &BridgeConfig, engine: &RuleEngine) -> Result<SessionEnd> {
    let (stream, _response) = connect_async(config.gateway_url.as_str())
        .await
        .with_context(|| format!("failed to connect gateway websocket {}", config.gateway_url))?;
    tracing::info!("gateway socket connected: url={}", config.gateway_url);
    let (sink, mut source) = stream.split();
    let mut action_sink = SocketActionSink { sink };

    match config.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => {
            action_sink
                .submit(OutboundAction::authenticate(token))
                .await?;
            tracing::info!("sent gateway authentication");
        }
        _ => {
            tracing::debug!("no gateway token configured, skipping authentication");
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                return Ok(SessionEnd::Shutdown);
            }
            maybe_message = source.next() => {
                let Some(message_result) = maybe_message else {
                    return Ok(SessionEnd::Disconnected);
                };
                let message = message_result.context("failed reading gateway websocket message")?;
                match frame_text(message) {
                    Ok(Some(raw)) => handle_frame(engine, &mut action_sink, &raw).await,
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!("dropping undecodable gateway frame: {error:#}");
                    }
                }
            }
        }
    }
}

fn frame_text(message: WsMessage) -> Result<Option<String>> {
    match message {
        WsMessage::Text(text) => Ok(Some(text.to_string())),
        WsMessage::Binary(bytes) => {
            let text = String::from_utf8(bytes.to_vec())
                .context("invalid utf-8 gateway frame payload")?;
            Ok(Some(text))
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) => Ok(None),
        WsMessage::Close(_) => Ok(None),
        WsMessage::Frame(_) => Ok(None),
    }
}

async fn handle_frame(engine: &RuleEngine, sink: &mut dyn ActionSink, raw: &str) {
    match classify_inbound_frame(raw) {
        Ok(InboundEvent::Heartbeat) => {
            tracing::debug!("gateway heartbeat received");
        }
        Ok(InboundEvent::Other { post_type }) => {
            tracing::debug!("ignoring gateway event: post_type={post_type}");
        }
        Ok(event) => {
            let report = engine.dispatch(&event, sink).await;
            if report.actions_emitted > 0 || report.rule_errors > 0 {
                tracing::info!(
                    "dispatch cycle: actions={} rule_errors={}",
                    report.actions_emitted,
                    report.rule_errors
                );
            }
        }
        Err(error) => {
            tracing::warn!("dropping malformed inbound frame: {error:#}");
        }
    }
}

struct SocketActionSink<S> {
    sink: S,
}

#[async_trait]
impl<S> ActionSink for SocketActionSink<S>
where
    S: futures_util::Sink<WsMessage> + Unpin + Send,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    async fn submit(&mut self, action: OutboundAction) -> Result<()> {
        let frame = action.to_frame()?;
        tracing::debug!("submitting action: action={}", action.action);
        self.sink
            .send(WsMessage::Text(frame.into()))
            .await
            .context("failed to send gateway action frame")?;
        Ok(())
    }
}
