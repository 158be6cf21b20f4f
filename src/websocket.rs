//! # Interview WebSocket Handler
//!
//! Real-time channel between one browser tab and an interview's coordinator.
//! Clients connect to `/ws/interviews/{interview_id}`.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: The socket attaches to the interview's coordinator before
//!    any client frame is processed, then receives `interview_details`
//! 2. **Audio**: Each binary frame is one complete audio submission
//! 3. **Events**: The server pushes `message` and `error` events as JSON text
//! 4. **Keep-alive**: `ping` or `{"type":"ping"}` is answered with `{"type":"pong"}`
//!
//! Each socket is an actix actor. Outbound events arrive on a bounded channel
//! owned by the session registry and are forwarded to the socket in order.

use crate::coordinator::{Coordinator, CoordinatorDirectory, PipelineError};
use crate::error::AppError;
use crate::session::{is_keep_alive, ConnectionHandle, ServerEvent};
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Room for WebSocket framing on top of the largest accepted audio submission.
const FRAME_OVERHEAD_BYTES: usize = 64 * 1024;

/// Text pushed to this socket from outside the actor.
#[derive(Message)]
#[rtype(result = "()")]
struct SendText(String);

/// One already-serialized outbound event.
struct Outbound(Arc<str>);

pub struct InterviewSocket {
    interview_id: String,
    connection_id: Uuid,
    coordinator: Arc<Coordinator>,
    directory: Arc<CoordinatorDirectory>,
    /// Taken in `started`; handed to the coordinator on attach
    pending: Option<(ConnectionHandle, mpsc::Receiver<Arc<str>>)>,
    heartbeat_interval: Duration,
    client_timeout: Duration,
    last_heartbeat: Instant,
}

impl InterviewSocket {
    pub fn new(
        coordinator: Arc<Coordinator>,
        directory: Arc<CoordinatorDirectory>,
        send_buffer_capacity: usize,
        heartbeat_interval: Duration,
        client_timeout: Duration,
    ) -> Self {
        let (handle, receiver) = ConnectionHandle::channel(send_buffer_capacity);
        Self {
            interview_id: coordinator.interview_id().to_string(),
            connection_id: handle.id(),
            coordinator,
            directory,
            pending: Some((handle, receiver)),
            heartbeat_interval,
            client_timeout,
            last_heartbeat: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.client_timeout {
                warn!(
                    interview_id = %act.interview_id,
                    connection_id = %act.connection_id,
                    "WebSocket heartbeat timeout, closing connection"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send_event(&self, ctx: &mut ws::WebsocketContext<Self>, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(json) => ctx.text(json),
            Err(err) => error!(event = event.kind(), "Failed to serialize event: {}", err),
        }
    }

    fn handle_audio(&self, audio: Vec<u8>, ctx: &mut ws::WebsocketContext<Self>) {
        let coordinator = Arc::clone(&self.coordinator);
        let cancel = self.directory.pipeline_token();
        let connection_id = self.connection_id;
        let addr = ctx.address();

        tokio::spawn(async move {
            match coordinator.on_audio(connection_id, audio, cancel).await {
                Ok(exchange) => {
                    debug!(
                        connection_id = %connection_id,
                        user_message_id = %exchange.user.id,
                        "Audio submission processed"
                    );
                }
                // The registry has no route to this socket, so answer directly.
                Err(err @ PipelineError::NotPaired) => {
                    if let Ok(json) = serde_json::to_string(&ServerEvent::error(err.to_string())) {
                        addr.do_send(SendText(json));
                    }
                }
                // Already reported to the client by the coordinator.
                Err(_) => {}
            }
        });
    }

    fn handle_text(&self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        if is_keep_alive(text) {
            self.send_event(ctx, &ServerEvent::Pong);
        } else {
            debug!(connection_id = %self.connection_id, "Ignoring unsupported text frame");
            self.send_event(
                ctx,
                &ServerEvent::error("Unsupported message. Send audio as binary frames."),
            );
        }
    }
}

impl Actor for InterviewSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            interview_id = %self.interview_id,
            connection_id = %self.connection_id,
            "WebSocket connection started"
        );
        self.start_heartbeat(ctx);

        let Some((handle, receiver)) = self.pending.take() else {
            return;
        };
        ctx.add_stream(tokio_stream::StreamExt::map(
            ReceiverStream::new(receiver),
            Outbound,
        ));

        // Hold back client frames until the connection is registered.
        let coordinator = Arc::clone(&self.coordinator);
        ctx.wait(
            async move { coordinator.on_attach(handle).await }
                .into_actor(self)
                .map(|result, act, _ctx| {
                    if let Err(err) = result {
                        warn!(
                            interview_id = %act.interview_id,
                            connection_id = %act.connection_id,
                            "Attach completed with a storage error: {}",
                            err
                        );
                    }
                }),
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.coordinator.on_detach(self.connection_id);
        info!(
            interview_id = %self.interview_id,
            connection_id = %self.connection_id,
            "WebSocket connection stopped"
        );

        // Runs after this actor, and its coordinator handle, are dropped.
        let directory = Arc::clone(&self.directory);
        let interview_id = self.interview_id.clone();
        actix::spawn(async move {
            directory.release(&interview_id).await;
        });
    }
}

impl StreamHandler<Outbound> for InterviewSocket {
    fn handle(&mut self, Outbound(payload): Outbound, ctx: &mut Self::Context) {
        ctx.text(&*payload);
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        // The registry dropped our sender; keep the socket itself open.
        debug!(connection_id = %self.connection_id, "Outbound event stream ended");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for InterviewSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Binary(data)) => {
                self.last_heartbeat = Instant::now();
                self.handle_audio(data.to_vec(), ctx);
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                self.handle_text(&text, ctx);
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(connection_id = %self.connection_id, "WebSocket closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(connection_id = %self.connection_id, "Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(connection_id = %self.connection_id, "WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

impl Handler<SendText> for InterviewSocket {
    type Result = ();

    fn handle(&mut self, msg: SendText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

/// Upgrades `GET /ws/interviews/{interview_id}` to a WebSocket.
pub async fn interview_websocket(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let interview_id = path.into_inner();
    info!(
        interview_id = %interview_id,
        peer = ?req.connection_info().peer_addr(),
        "New WebSocket connection request"
    );

    let directory = Arc::clone(&app_state.directory);
    let coordinator = directory
        .get_or_create(&interview_id)
        .await
        .map_err(AppError::from)?;

    let session = app_state.get_config().session;
    let socket = InterviewSocket::new(
        coordinator,
        directory,
        session.send_buffer_capacity,
        Duration::from_secs(session.heartbeat_interval_secs),
        Duration::from_secs(session.client_timeout_secs),
    );

    ws::WsResponseBuilder::new(socket, &req, stream)
        .frame_size(session.max_audio_bytes + FRAME_OVERHEAD_BYTES)
        .start()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use crate::store::InterviewTitle;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_upgrade_registers_coordinator() {
        let state = test_state();
        let interview = state
            .store
            .create_interview(InterviewTitle::SystemArchitect, &["SQL".to_string()])
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route(
                    "/ws/interviews/{interview_id}",
                    web::get().to(interview_websocket),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/ws/interviews/{}", interview.id))
            .insert_header(("connection", "upgrade"))
            .insert_header(("upgrade", "websocket"))
            .insert_header(("sec-websocket-version", "13"))
            .insert_header(("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ=="))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::SWITCHING_PROTOCOLS);
        assert!(state.directory.get(&interview.id).await.is_some());
    }

    #[actix_web::test]
    async fn test_plain_request_is_rejected() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route(
                    "/ws/interviews/{interview_id}",
                    web::get().to(interview_websocket),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/ws/interviews/some-id")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_client_error());
    }
}
