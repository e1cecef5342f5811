use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, StreamHandler, WrapFuture};
use actix_web_actors::ws;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::models::ConversationKey;
use crate::state::AppState;
use crate::websocket::{ClientEvent, ConnectionId, ServerEvent};

/// One live WebSocket connection.
///
/// The bearer token authenticates the connection; the `join` event
/// activates it. No fan-out reaches the connection until the join is
/// processed, and the association is re-established from scratch on
/// every reconnect.
pub struct WsSession {
    /// User id proven by the bearer token at upgrade time.
    authenticated_user: Uuid,
    /// Set once the client has joined.
    joined: bool,
    connection_id: ConnectionId,
    state: AppState,
    hb: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl WsSession {
    pub fn new(authenticated_user: Uuid, state: AppState) -> Self {
        let heartbeat_interval =
            Duration::from_secs(state.config.realtime.heartbeat_interval_secs);
        let client_timeout = Duration::from_secs(state.config.realtime.client_timeout_secs);
        Self {
            authenticated_user,
            joined: false,
            connection_id: ConnectionId::new(),
            state,
            hb: Instant::now(),
            heartbeat_interval,
            client_timeout,
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let timeout = self.client_timeout;
        ctx.run_interval(self.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > timeout {
                tracing::warn!(
                    user_id = %act.authenticated_user,
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_join(&mut self, user_id: Uuid, ctx: &mut ws::WebsocketContext<Self>) {
        if user_id != self.authenticated_user {
            tracing::warn!(
                claimed = %user_id,
                authenticated = %self.authenticated_user,
                "join rejected: identity mismatch"
            );
            ctx.close(Some(ws::CloseReason {
                code: ws::CloseCode::Policy,
                description: Some("identity mismatch".into()),
            }));
            ctx.stop();
            return;
        }
        if self.joined {
            // Duplicate joins are idempotent.
            return;
        }
        self.joined = true;

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<ServerEvent>();
        let registry = self.state.registry.clone();
        let connection_id = self.connection_id;

        // Register with the connection manager, then start draining
        // fan-out events into this socket.
        let register = async move {
            registry.register(user_id, connection_id, tx).await;
        };
        ctx.wait(register.into_actor(self));
        ctx.add_stream(UnboundedReceiverStream::new(rx));

        tracing::info!(user_id = %user_id, "WebSocket session joined");
    }

    fn handle_typing(&self, receiver_id: Uuid, book_id: Option<Uuid>, started: bool) {
        if !self.joined {
            return;
        }
        let typist = self.authenticated_user;
        let conversation = ConversationKey::of(typist, receiver_id, book_id);
        let typing = self.state.typing.clone();
        let fanout = self.state.fanout.clone();

        actix::spawn(async move {
            if started {
                if typing.start(conversation, typist).await {
                    fanout.typing_started(conversation, typist).await;
                }
            } else if typing.stop(conversation, typist).await {
                fanout.typing_stopped(conversation, typist).await;
            }
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            user_id = %self.authenticated_user,
            "WebSocket session started"
        );
        self.heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            user_id = %self.authenticated_user,
            "WebSocket session stopped"
        );

        let registry = self.state.registry.clone();
        let typing = self.state.typing.clone();
        let fanout = self.state.fanout.clone();
        let user_id = self.authenticated_user;
        let connection_id = self.connection_id;
        let joined = self.joined;

        actix::spawn(async move {
            if joined {
                registry.unregister(user_id, connection_id).await;
            }
            // Any typing state this user was broadcasting is force-stopped
            // so counterparts do not wait out the receiver-side timeout.
            for conversation in typing.stop_all_for(user_id).await {
                fanout.typing_stopped(conversation, user_id).await;
            }
        });
    }
}

/// Fan-out events flow from the connection manager into the socket.
impl StreamHandler<ServerEvent> for WsSession {
    fn handle(&mut self, event: ServerEvent, ctx: &mut Self::Context) {
        match event.to_json() {
            Ok(json) => ctx.text(json),
            Err(e) => tracing::error!(error = %e, "failed to serialize server event"),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.hb = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::Join { user_id }) => self.handle_join(user_id, ctx),
                Ok(ClientEvent::Typing {
                    receiver_id,
                    book_id,
                }) => self.handle_typing(receiver_id, book_id, true),
                Ok(ClientEvent::StopTyping {
                    receiver_id,
                    book_id,
                }) => self.handle_typing(receiver_id, book_id, false),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse client event");
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(?reason, "WebSocket close received");
                ctx.stop();
            }
            _ => {}
        }
    }
}
