use std::sync::Arc;

use actix_web::{web, HttpRequest, Responder};
use actix_ws::Message;
use futures_util::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

use crate::realtime::{Envelope, COORDINATOR_CHANNEL};
use crate::service::AlertEngine;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// `caregiver:<uuid>` for a caregiver dashboard, `coordinators` for the
    /// operations channel. Defaults to the operations channel.
    pub channel: Option<String>,
}

/// Commands the dashboard buttons send back over the socket.
#[derive(Debug, Deserialize)]
pub struct ClientCommand {
    pub action: String,
    pub alert_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
}

pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> Result<impl Responder, actix_web::Error> {
    let query = web::Query::<WsQuery>::from_query(req.query_string())?;
    let channel = query
        .into_inner()
        .channel
        .unwrap_or_else(|| COORDINATOR_CHANNEL.to_string());

    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let mut rx = data.hub.subscribe();
    let engine = data.engine.clone();

    tracing::info!(%channel, "websocket session opened");

    actix_rt::spawn(async move {
        loop {
            tokio::select! {
                val = msg_stream.next() => {
                    match val {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(cmd) = serde_json::from_str::<ClientCommand>(&text) {
                                handle_command(&engine, cmd).await;
                            } else {
                                tracing::debug!(%text, "ignoring unrecognized ws message");
                            }
                        }
                        Some(Ok(Message::Ping(bytes))) => {
                            let _ = session.pong(&bytes).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        _ => {}
                    }
                }
                val = rx.recv() => {
                    match val {
                        Ok(text) => {
                            // Forward only traffic addressed to this session's
                            // channel; the envelope itself stays server-side.
                            if let Ok(envelope) = serde_json::from_str::<Envelope>(&text) {
                                if envelope.channel == channel
                                    && session.text(envelope.payload.to_string()).await.is_err()
                                {
                                    break;
                                }
                            }
                        }
                        // Lagged receivers just skip the dropped backlog.
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
            }
        }
        tracing::info!("websocket session closed");
    });

    Ok(res)
}

async fn handle_command(engine: &Arc<AlertEngine>, cmd: ClientCommand) {
    let Some(alert_id) = cmd.alert_id else {
        tracing::debug!(action = %cmd.action, "ws command without alert_id");
        return;
    };
    let result = match (cmd.action.as_str(), cmd.actor_id) {
        ("ACKNOWLEDGE_ALERT", Some(actor)) => engine.acknowledge_alert(alert_id, actor).await,
        ("RESOLVE_ALERT", Some(actor)) => engine.resolve_alert(alert_id, actor).await,
        ("EMERGENCY_CONTACTED", _) => engine.mark_emergency_contacted(alert_id).await,
        ("NEXT_OF_KIN_NOTIFIED", _) => engine.mark_next_of_kin_notified(alert_id).await,
        (other, _) => {
            tracing::debug!(action = other, "unknown ws action");
            return;
        }
    };
    if let Err(err) = result {
        tracing::warn!(%err, %alert_id, action = %cmd.action, "ws command failed");
    }
}
