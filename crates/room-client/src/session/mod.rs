//! Room session actor.
//!
//! One actor per room membership. It owns the join/leave state machine, the
//! negotiated capability set, both transports, and the producer/consumer
//! registries; embedders drive it through a clonable [`SessionHandle`] and
//! observe it through [`SessionEvent`]s and [`SessionSnapshot`]s.
//!
//! The mailbox is processed one command at a time, so each command sees a
//! consistent view of the session and signaling notifications that arrive
//! during a multi-step sequence (join, in particular) are buffered and
//! applied afterwards.

pub mod messages;
pub mod participants;
pub mod registry;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use signaling_protocol::{
    ClientMessage, DtlsParameters, MediaKind, ServerMessage, TransportDirection,
};

use crate::config::Config;
use crate::device::CapabilitySet;
use crate::errors::SessionError;
use crate::media::LocalTrack;
use crate::metrics::SessionMetrics;
use crate::signaling::{ChannelEvent, RequestKey, SignalingChannel, SignalingHandle};
use crate::transport::TransportManager;

pub use messages::{ProduceOutcome, SessionCommand, SessionEvent, SessionSnapshot, SessionState};
pub use participants::{Participant, ParticipantRegistry, RemoteStream};
pub use registry::{Consumer, MediaRegistry, Producer};

/// Command mailbox buffer size.
const COMMAND_CHANNEL_BUFFER: usize = 100;

/// Buffer for session events and forwarded signaling notifications.
const EVENT_CHANNEL_BUFFER: usize = 256;

/// Handle to a running [`SessionActor`].
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    cancel_token: CancellationToken,
}

impl SessionHandle {
    /// Join a room. Fails fast with `AlreadyJoined` if a join is in flight
    /// or the session is established.
    pub async fn join(
        &self,
        room_id: String,
        user_id: String,
        display_name: String,
    ) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Join {
            room_id,
            user_id,
            display_name,
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|_| SessionError::Channel("session actor dropped the response".to_string()))?
    }

    /// Leave the room. Idempotent: leaving an idle session is a no-op.
    pub async fn leave(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Leave { respond_to: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Channel("session actor dropped the response".to_string()))?
    }

    /// Publish a local track. Queued if the send transport is not ready yet.
    pub async fn produce_track(&self, track: LocalTrack) -> Result<ProduceOutcome, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::ProduceTrack {
            track,
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|_| SessionError::Channel("session actor dropped the response".to_string()))?
    }

    /// Consume one remote producer. Returns the consumer id.
    pub async fn consume(
        &self,
        producer_id: String,
        peer_id: String,
        kind: MediaKind,
    ) -> Result<String, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Consume {
            producer_id,
            peer_id,
            kind,
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|_| SessionError::Channel("session actor dropped the response".to_string()))?
    }

    /// Read a point-in-time view of the session.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { respond_to: tx })
            .await?;
        rx.await
            .map_err(|_| SessionError::Channel("session actor dropped the response".to_string()))
    }

    /// Cancel the actor and everything it spawned.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| SessionError::Channel("session actor is gone".to_string()))
    }
}

/// The room session actor.
pub struct SessionActor {
    config: Config,
    receiver: mpsc::Receiver<SessionCommand>,
    /// Notifications and connectivity events from the signaling channel.
    channel_events: mpsc::Receiver<ChannelEvent>,
    channel_closed: bool,
    signaling: SignalingHandle,
    transports: TransportManager,
    media: MediaRegistry,
    participants: ParticipantRegistry,
    capabilities: Option<CapabilitySet>,
    state: SessionState,
    room_id: Option<String>,
    /// Set while signaling is lost; the session fails when the grace window
    /// elapses without recovery.
    degraded_since: Option<Instant>,
    last_error: Option<String>,
    fatal_reason: Option<String>,
    events_tx: mpsc::Sender<SessionEvent>,
    cancel_token: CancellationToken,
    metrics: Arc<SessionMetrics>,
}

impl SessionActor {
    /// Spawn a session actor over the given signaling wire halves.
    ///
    /// Returns a handle, the event stream, and the task join handle. The
    /// signaling channel actor is spawned on a child token, so cancelling
    /// the session tears everything down.
    #[must_use]
    pub fn spawn(
        config: Config,
        wire_tx: mpsc::Sender<ClientMessage>,
        wire_rx: mpsc::Receiver<ServerMessage>,
        cancel_token: CancellationToken,
        metrics: Arc<SessionMetrics>,
    ) -> (
        SessionHandle,
        mpsc::Receiver<SessionEvent>,
        JoinHandle<()>,
    ) {
        let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let (channel_events_tx, channel_events) = mpsc::channel(EVENT_CHANNEL_BUFFER);

        let (signaling, _channel_task) = SignalingChannel::spawn(
            wire_tx,
            wire_rx,
            channel_events_tx,
            cancel_token.child_token(),
            Arc::clone(&metrics),
        );

        let transports = TransportManager::new(signaling.clone(), config.request_timeout);

        let actor = Self {
            config,
            receiver,
            channel_events,
            channel_closed: false,
            signaling,
            transports,
            media: MediaRegistry::default(),
            participants: ParticipantRegistry::default(),
            capabilities: None,
            state: SessionState::Idle,
            room_id: None,
            degraded_since: None,
            last_error: None,
            fatal_reason: None,
            events_tx,
            cancel_token: cancel_token.clone(),
            metrics,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = SessionHandle {
            sender,
            cancel_token,
        };

        (handle, events_rx, task_handle)
    }

    /// Run the actor message loop.
    async fn run(mut self) {
        info!(target: "room.session", "Session actor started");

        loop {
            let degraded_deadline = self
                .degraded_since
                .map(|since| since + self.config.disconnect_grace);

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(target: "room.session", "Session actor cancelled");
                    break;
                }

                command = self.receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!(target: "room.session", "All handles dropped, exiting");
                            break;
                        }
                    }
                }

                event = self.channel_events.recv(), if !self.channel_closed => {
                    match event {
                        Some(event) => self.handle_channel_event(event).await,
                        None => {
                            self.channel_closed = true;
                            self.handle_disconnect();
                        }
                    }
                }

                () = sleep_until_opt(degraded_deadline) => {
                    self.fail_session(
                        "signaling channel did not recover within the grace window",
                    );
                }
            }
        }

        info!(target: "room.session", "Session actor stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Join {
                room_id,
                user_id,
                display_name,
                respond_to,
            } => {
                let result = self.handle_join(room_id, user_id, display_name).await;
                let _ = respond_to.send(result);
            }

            SessionCommand::Leave { respond_to } => {
                let result = self.handle_leave().await;
                let _ = respond_to.send(result);
            }

            SessionCommand::ProduceTrack { track, respond_to } => {
                let result = self.handle_produce(track).await;
                let _ = respond_to.send(result);
            }

            SessionCommand::Consume {
                producer_id,
                peer_id,
                kind,
                respond_to,
            } => {
                let result = self.consume_remote(&producer_id, &peer_id, kind).await;
                if let Err(err) = &result {
                    self.report_consume_failure(&producer_id, err);
                }
                let _ = respond_to.send(result);
            }

            SessionCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    /// Run the join sequence. Any fatal error moves the session to `Failed`.
    async fn handle_join(
        &mut self,
        room_id: String,
        user_id: String,
        display_name: String,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyJoined);
        }

        info!(target: "room.session", room_id = %room_id, user_id = %user_id, "Joining room");
        self.room_id = Some(room_id.clone());
        self.set_state(SessionState::Joining);

        match self.run_join(room_id, user_id, display_name).await {
            Ok(()) => {
                self.set_state(SessionState::Joined);
                self.metrics.record_join();
                info!(
                    target: "room.session",
                    participants = self.participants.len(),
                    consumers = self.media.consumer_count(),
                    "Joined room"
                );
                Ok(())
            }
            Err(err) => {
                error!(target: "room.session", error = %err, "Join sequence failed");
                self.fail_session(&err.to_string());
                Err(err)
            }
        }
    }

    async fn run_join(
        &mut self,
        room_id: String,
        user_id: String,
        display_name: String,
    ) -> Result<(), SessionError> {
        let response = self
            .signaling
            .request(
                ClientMessage::JoinRoom {
                    room_id,
                    user_id,
                    peer_name: display_name,
                },
                RequestKey::Join,
                self.config.join_timeout,
            )
            .await
            .map_err(|err| SessionError::JoinFailed(err.to_string()))?;

        let (rtp_capabilities, existing_peers, existing_producers) = match response {
            ServerMessage::JoinSuccess {
                rtp_capabilities,
                existing_peers,
                existing_producers,
            } => (rtp_capabilities, existing_peers, existing_producers),
            ServerMessage::JoinError { message } => return Err(SessionError::JoinFailed(message)),
            other => {
                return Err(SessionError::JoinFailed(format!(
                    "unexpected response {}",
                    other.name()
                )))
            }
        };

        let capabilities = CapabilitySet::negotiate(&rtp_capabilities)?;
        self.capabilities = Some(capabilities);

        for peer in existing_peers {
            self.participants.upsert_named(&peer.peer_id, &peer.peer_name);
            self.publish(SessionEvent::ParticipantJoined {
                peer_id: peer.peer_id,
                display_name: peer.peer_name,
            });
        }
        self.metrics.set_participants(self.participants.len());

        // Both directions concurrently; responses are correlated by
        // direction, so they cannot cross.
        let (send_params, recv_params) = tokio::join!(
            TransportManager::request_parameters(
                &self.signaling,
                TransportDirection::Send,
                self.config.request_timeout,
            ),
            TransportManager::request_parameters(
                &self.signaling,
                TransportDirection::Receive,
                self.config.request_timeout,
            ),
        );
        self.transports
            .install(TransportDirection::Send, send_params?)?;
        self.transports
            .install(TransportDirection::Receive, recv_params?)?;

        let dtls = self.dtls_parameters()?;
        self.transports
            .connect(TransportDirection::Send, dtls)
            .await?;

        // Tracks published before readiness drain now, in publish order.
        self.drain_pending_tracks().await;

        let dtls = self.dtls_parameters()?;
        self.transports
            .connect(TransportDirection::Receive, dtls)
            .await?;

        // Consume producers announced in the join snapshot. Best-effort: a
        // rejected producer leaves a gap for that peer, not a dead session.
        for announcement in existing_producers {
            if let Err(err) = self
                .consume_remote(
                    &announcement.producer_id,
                    &announcement.peer_id,
                    announcement.kind,
                )
                .await
            {
                self.report_consume_failure(&announcement.producer_id, &err);
            }
        }

        Ok(())
    }

    /// Leave the room, releasing all media state locally before notifying
    /// the server.
    async fn handle_leave(&mut self) -> Result<(), SessionError> {
        match self.state {
            // Leave is idempotent.
            SessionState::Idle | SessionState::Leaving => return Ok(()),
            SessionState::Joining => {
                return Err(SessionError::InvalidState(
                    "cannot leave while a join is in flight".to_string(),
                ))
            }
            SessionState::Joined | SessionState::Failed => {}
        }

        self.set_state(SessionState::Leaving);

        let (producers, consumers) = self.media.close_all();
        let transports = self.transports.close_all();
        self.participants.clear();
        self.metrics.set_participants(0);
        self.capabilities = None;
        self.degraded_since = None;

        // Best-effort: the wire may already be gone.
        let _ = self.signaling.emit(ClientMessage::LeaveRoom).await;

        info!(
            target: "room.session",
            producers, consumers, transports,
            "Left room"
        );

        self.room_id = None;
        self.last_error = None;
        self.fatal_reason = None;
        self.set_state(SessionState::Idle);
        Ok(())
    }

    async fn handle_produce(&mut self, track: LocalTrack) -> Result<ProduceOutcome, SessionError> {
        if matches!(self.state, SessionState::Leaving | SessionState::Failed) {
            return Err(SessionError::InvalidState(format!(
                "cannot produce while {}",
                self.state.as_str()
            )));
        }

        if !self.transports.send_ready() {
            self.media.queue_track(track);
            return Ok(ProduceOutcome::Queued);
        }

        let producer_id = self.produce_now(track).await?;
        Ok(ProduceOutcome::Produced { producer_id })
    }

    /// Produce one track over the ready send transport.
    async fn produce_now(&mut self, track: LocalTrack) -> Result<String, SessionError> {
        let capabilities = self
            .capabilities
            .as_ref()
            .ok_or(SessionError::DeviceNotReady)?;
        let rtp_parameters = capabilities.rtp_parameters_for(track.kind)?;

        match self
            .transports
            .produce(&track.id, track.kind, rtp_parameters)
            .await
        {
            Ok(producer_id) => {
                let transport_id = self
                    .transports
                    .transport_id(TransportDirection::Send)
                    .map(str::to_string)
                    .unwrap_or_default();
                self.media.insert_producer(Producer {
                    id: producer_id.clone(),
                    track_id: track.id,
                    kind: track.kind,
                    transport_id,
                });
                self.metrics.record_producer_created();
                self.publish(SessionEvent::TrackProduced {
                    producer_id: producer_id.clone(),
                    kind: track.kind,
                });
                Ok(producer_id)
            }
            Err(err) => {
                self.metrics.record_produce_failure();
                self.last_error = Some(err.to_string());
                warn!(target: "room.session", track_id = %track.id, error = %err, "Produce failed");
                self.publish(SessionEvent::ProduceFailed {
                    track_id: track.id,
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Drain the pending-track queue in publish order. Failed tracks are
    /// reported and skipped; the rest of the queue still drains.
    async fn drain_pending_tracks(&mut self) {
        let queued = self.media.drain_pending();
        if queued.is_empty() {
            return;
        }
        info!(target: "room.session", count = queued.len(), "Draining queued tracks");
        for track in queued {
            let _ = self.produce_now(track).await;
        }
    }

    /// Consume one remote producer: consume request, resume, then register
    /// the stream on the owning participant.
    async fn consume_remote(
        &mut self,
        producer_id: &str,
        peer_id: &str,
        kind: MediaKind,
    ) -> Result<String, SessionError> {
        let capabilities = self
            .capabilities
            .as_ref()
            .ok_or(SessionError::DeviceNotReady)?;

        // Duplicate announcement for a producer we already consume.
        if let Some(existing) = self.media.consumer_for_producer(producer_id) {
            return Ok(existing.id.clone());
        }

        let rtp_capabilities = capabilities.rtp_capabilities();
        let parameters = self.transports.consume(producer_id, rtp_capabilities).await?;

        let transport_id = self
            .transports
            .transport_id(TransportDirection::Receive)
            .map(str::to_string)
            .ok_or_else(|| SessionError::ConsumeRejected {
                producer_id: producer_id.to_string(),
                reason: "receive transport is gone".to_string(),
            })?;

        if parameters.kind != kind {
            debug!(
                target: "room.session",
                producer_id,
                announced = kind.as_str(),
                actual = parameters.kind.as_str(),
                "Announced kind differs from consumer parameters"
            );
        }

        let consumer_id = parameters.id.clone();
        let kind = parameters.kind;
        self.media.insert_consumer(Consumer {
            id: consumer_id.clone(),
            producer_id: producer_id.to_string(),
            peer_id: peer_id.to_string(),
            kind,
            transport_id,
            paused: true,
        });
        self.metrics.record_consumer_created();

        // Consumers are created paused on the router; resume and await the
        // confirmation. A failed resume leaves the consumer paused but does
        // not end the session.
        match self
            .signaling
            .request(
                ClientMessage::ResumeConsumer {
                    consumer_id: consumer_id.clone(),
                },
                RequestKey::ResumeConsumer(consumer_id.clone()),
                self.config.resume_timeout,
            )
            .await
        {
            Ok(ServerMessage::ConsumerResumed { success: true, .. }) => {
                self.media.mark_consumer_resumed(&consumer_id);
            }
            Ok(other) => {
                warn!(
                    target: "room.session",
                    consumer_id = %consumer_id,
                    response = other.name(),
                    "Consumer resume rejected; consumer stays paused"
                );
            }
            Err(err) => {
                warn!(
                    target: "room.session",
                    consumer_id = %consumer_id,
                    error = %err,
                    "Consumer resume unconfirmed; consumer stays paused"
                );
            }
        }

        self.participants.attach_stream(
            peer_id,
            kind,
            RemoteStream {
                consumer_id: consumer_id.clone(),
                producer_id: producer_id.to_string(),
            },
        );
        self.metrics.set_participants(self.participants.len());

        self.publish(SessionEvent::TrackConsumed {
            peer_id: peer_id.to_string(),
            producer_id: producer_id.to_string(),
            consumer_id: consumer_id.clone(),
            kind,
        });

        Ok(consumer_id)
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Notification(message) => self.handle_notification(message).await,
            ChannelEvent::Disconnected => self.handle_disconnect(),
        }
    }

    async fn handle_notification(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::NewProducer {
                producer_id,
                peer_id,
                kind,
            } => {
                if self.state != SessionState::Joined {
                    debug!(
                        target: "room.session",
                        producer_id = %producer_id,
                        state = self.state.as_str(),
                        "new-producer ignored outside joined state"
                    );
                    return;
                }
                if let Err(err) = self.consume_remote(&producer_id, &peer_id, kind).await {
                    self.report_consume_failure(&producer_id, &err);
                }
            }

            ServerMessage::PeerJoined { peer_id, peer_name } => {
                self.participants.upsert_named(&peer_id, &peer_name);
                self.metrics.set_participants(self.participants.len());
                self.publish(SessionEvent::ParticipantJoined {
                    peer_id,
                    display_name: peer_name,
                });
            }

            ServerMessage::PeerLeft { peer_id } => {
                for consumer_id in self.media.consumers_for_peer(&peer_id) {
                    self.media.close_consumer(&consumer_id);
                }
                if self.participants.remove(&peer_id).is_some() {
                    self.metrics.set_participants(self.participants.len());
                    self.publish(SessionEvent::ParticipantLeft { peer_id });
                }
            }

            other => {
                // Responses are correlated by the signaling channel; one
                // surfacing here is stale.
                debug!(
                    target: "room.session",
                    event = other.name(),
                    "Unexpected notification ignored"
                );
            }
        }
    }

    /// Enter the degraded window after signaling loss.
    fn handle_disconnect(&mut self) {
        if matches!(
            self.state,
            SessionState::Idle | SessionState::Leaving | SessionState::Failed
        ) {
            return;
        }
        if self.degraded_since.is_some() {
            return;
        }

        warn!(
            target: "room.session",
            grace_seconds = self.config.disconnect_grace.as_secs(),
            "Signaling lost; session degraded"
        );
        self.last_error = Some(SessionError::SignalingDisconnected.to_string());
        self.degraded_since = Some(Instant::now());
        self.publish(SessionEvent::SignalingLost);
    }

    /// Move the session to `Failed`, releasing transports and media.
    fn fail_session(&mut self, reason: &str) {
        if self.state == SessionState::Failed {
            return;
        }

        error!(target: "room.session", reason, "Session failed");
        self.fatal_reason = Some(reason.to_string());
        self.media.close_all();
        self.transports.close_all();
        self.capabilities = None;
        self.degraded_since = None;
        self.publish(SessionEvent::SessionFailed {
            reason: reason.to_string(),
        });
        self.set_state(SessionState::Failed);
    }

    fn report_consume_failure(&mut self, producer_id: &str, err: &SessionError) {
        self.metrics.record_consume_failure();
        self.last_error = Some(err.to_string());
        warn!(target: "room.session", producer_id, error = %err, "Consume failed");
        self.publish(SessionEvent::ConsumeFailed {
            producer_id: producer_id.to_string(),
            reason: err.to_string(),
        });
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!(
            target: "room.session",
            from = self.state.as_str(),
            to = state.as_str(),
            "State transition"
        );
        self.state = state;
        self.publish(SessionEvent::StateChanged { state });
    }

    /// Publish an event without blocking the actor. A slow or absent
    /// receiver loses events; state remains authoritative via snapshots.
    fn publish(&self, event: SessionEvent) {
        if self.events_tx.try_send(event).is_err() {
            debug!(target: "room.session", "Event dropped (receiver slow or gone)");
        }
    }

    fn dtls_parameters(&self) -> Result<DtlsParameters, SessionError> {
        self.capabilities
            .as_ref()
            .map(CapabilitySet::dtls_parameters)
            .ok_or(SessionError::DeviceNotReady)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            room_id: self.room_id.clone(),
            participants: self.participants.snapshot(),
            producers: self.media.producers(),
            consumers: self.media.consumers(),
            send_transport_ready: self.transports.send_ready(),
            recv_transport_ready: self.transports.recv_ready(),
            pending_tracks: self.media.pending_len(),
            last_error: self.last_error.clone(),
            fatal_reason: self.fatal_reason.clone(),
        }
    }
}

/// Sleep until the deadline, or forever when there is none.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
