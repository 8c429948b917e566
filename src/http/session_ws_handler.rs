use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::notifier::{SessionEventMessage, SessionHub};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Control frames clients send; session events flow the other way as
/// serialized [`crate::notifier::SessionEvent`] frames.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    /// Subscribe to another session's channel
    Subscribe { session_id: Uuid },
    /// Unsubscribe from a session's channel
    Unsubscribe { session_id: Uuid },
    Ping,
    Pong,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    Ping,
    Pong,
    Error { message: String },
}

/// WebSocket actor relaying session events to one client connection.
pub struct SessionWebSocket {
    /// Unique connection id
    id: Uuid,
    /// Last heartbeat time
    hb: Instant,
    /// Session channel joined from the connection path
    session_id: Uuid,
    hub: Arc<SessionHub>,
}

impl SessionWebSocket {
    pub fn new(session_id: Uuid, hub: Arc<SessionHub>) -> Self {
        Self {
            id: Uuid::new_v4(),
            hb: Instant::now(),
            session_id,
            hub,
        }
    }

    fn hb(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!(conn_id = %act.id, "WebSocket heartbeat timeout, disconnecting");
                ctx.stop();
                return;
            }

            if let Ok(ping) = serde_json::to_string(&WsServerMessage::Ping) {
                ctx.text(ping);
            }
        });
    }

    fn handle_message(&mut self, msg: &str, ctx: &mut <Self as Actor>::Context) {
        match serde_json::from_str::<WsClientMessage>(msg) {
            Ok(WsClientMessage::Subscribe { session_id }) => {
                self.hub.subscribe(session_id, self.id, ctx.address().recipient());
                info!(
                    conn_id = %self.id,
                    session_id = %session_id,
                    "Subscribed to session channel"
                );
            }
            Ok(WsClientMessage::Unsubscribe { session_id }) => {
                self.hub.unsubscribe(session_id, self.id);
                info!(
                    conn_id = %self.id,
                    session_id = %session_id,
                    "Unsubscribed from session channel"
                );
            }
            Ok(WsClientMessage::Ping) => {
                if let Ok(pong) = serde_json::to_string(&WsServerMessage::Pong) {
                    ctx.text(pong);
                }
            }
            Ok(WsClientMessage::Pong) => {
                self.hb = Instant::now();
            }
            Err(e) => {
                error!(
                    conn_id = %self.id,
                    error = %e,
                    "Failed to parse WebSocket message"
                );
                let error_msg = WsServerMessage::Error {
                    message: "Invalid message format".to_string(),
                };
                if let Ok(json) = serde_json::to_string(&error_msg) {
                    ctx.text(json);
                }
            }
        }
    }
}

impl Actor for SessionWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            conn_id = %self.id,
            session_id = %self.session_id,
            "WebSocket connection established"
        );
        self.hub
            .subscribe(self.session_id, self.id, ctx.address().recipient());
        self.hb(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.hub.disconnect(self.id);
        info!(conn_id = %self.id, "WebSocket connection closed");
    }
}

impl Handler<SessionEventMessage> for SessionWebSocket {
    type Result = ();

    fn handle(&mut self, msg: SessionEventMessage, ctx: &mut Self::Context) {
        if let Ok(json) = serde_json::to_string(&msg.0) {
            ctx.text(json);
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for SessionWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.handle_message(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                warn!(conn_id = %self.id, "Binary messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                info!(
                    conn_id = %self.id,
                    reason = ?reason,
                    "Client initiated close"
                );
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// WebSocket endpoint handler
/// WS /ws/sessions/:id
pub async fn session_websocket(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<Uuid>,
    hub: web::Data<Arc<SessionHub>>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();

    info!(session_id = %session_id, "New WebSocket connection request");

    let actor = SessionWebSocket::new(session_id, hub.get_ref().clone());
    ws::start(actor, &req, stream)
}

pub fn configure_ws_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws/sessions/{id}", web::get().to(session_websocket));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_message_round_trip() {
        let msg = WsClientMessage::Subscribe {
            session_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("subscribe"));

        let decoded: WsClientMessage = serde_json::from_str(&json).unwrap();
        match decoded {
            WsClientMessage::Subscribe { .. } => {}
            _ => panic!("Expected Subscribe message"),
        }
    }

    #[test]
    fn test_error_message_serialization() {
        let msg = WsServerMessage::Error {
            message: "Test error".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Test error"));
    }
}
