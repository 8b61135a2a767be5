use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{info, warn};

use crate::{
    dao::models::TripEntity,
    dto::ws::{PlanInboundMessage, PlanOutboundMessage, UserDescriptor},
    error::ServiceError,
    services::{flush_scheduler, plan_service, room_events},
    state::{SharedState, rooms::RoomEvent},
};

/// Internal error type for plan socket operations.
#[derive(Debug, Error)]
enum SocketError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Handle the full lifecycle for an individual plan WebSocket connection.
///
/// The first frame must be a `join` handshake; a socket that fails the
/// membership check receives `unauthorizedJoin` and is closed, a socket with
/// a malformed handshake is closed with no event.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let join_timeout = state.config().join_timeout();
    let initial_message = match tokio::time::timeout(join_timeout, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("plan socket handshake timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match PlanInboundMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse join handshake");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let PlanInboundMessage::Join { trip_id, user } = inbound else {
        warn!("first frame was not a join handshake");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    if let Err(err) = authorize_join(&state, &trip_id, &user).await {
        let reason = match &err {
            ServiceError::Unauthorized(reason) => reason.clone(),
            other => other.to_string(),
        };
        let _ = send_message_to_websocket(
            &outbound_tx,
            &PlanOutboundMessage::UnauthorizedJoin {
                reason: reason.clone(),
            },
        );
        info!(trip_id = %trip_id, email = %user.email, reason = %reason, "rejected plan room join");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let room_rx = state.rooms().join(&trip_id);
    let forwarder_task = spawn_room_forwarder(room_rx, outbound_tx.clone());
    info!(trip_id = %trip_id, email = %user.email, "tripmate joined plan room");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match PlanInboundMessage::from_json_str(&text) {
                Ok(command) => {
                    if let Err(err) =
                        handle_command(&state, &trip_id, &user, command, &outbound_tx).await
                    {
                        warn!(trip_id = %trip_id, error = %err, "terminating plan socket");
                        break;
                    }
                }
                Err(err) => {
                    warn!(trip_id = %trip_id, error = %err, "failed to parse plan command");
                    let _ = send_message_to_websocket(
                        &outbound_tx,
                        &PlanOutboundMessage::CommandRejected {
                            message: err.to_string(),
                        },
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(trip_id = %trip_id, "plan socket closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(trip_id = %trip_id, error = %err, "websocket error");
                break;
            }
        }
    }

    forwarder_task.abort();
    let _ = forwarder_task.await;
    info!(trip_id = %trip_id, email = %user.email, "tripmate left plan room");

    // Last member gone with a debounce window still open: persist now instead
    // of waiting out the timer.
    if state.rooms().member_count(&trip_id) == 0
        && flush_scheduler::has_pending_flush(&state, &trip_id).await
    {
        if let Err(err) = flush_scheduler::force_flush(&state, &trip_id).await {
            warn!(trip_id = %trip_id, error = %err, "failed to flush plan after last tripmate left");
        }
    }

    finalize(writer_task, outbound_tx).await;
}

/// Dispatch one accepted command from a joined connection.
async fn handle_command(
    state: &SharedState,
    trip_id: &str,
    user: &UserDescriptor,
    command: PlanInboundMessage,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), SocketError> {
    match command {
        PlanInboundMessage::Join { .. } => {
            warn!(trip_id, "ignoring duplicate join message");
            Ok(())
        }
        PlanInboundMessage::Ping => {
            send_message_to_websocket(outbound_tx, &PlanOutboundMessage::Pong)
        }
        PlanInboundMessage::PlanItemAdded { patch } => {
            match plan_service::add_item(state, trip_id, patch, Some(user)).await {
                Ok(item) => {
                    room_events::broadcast_item_added(state, trip_id, item, user);
                    Ok(())
                }
                Err(err) => reject_command(outbound_tx, &err),
            }
        }
        PlanInboundMessage::PlanItemUpdated { patch } => {
            match plan_service::update_item(state, trip_id, &patch).await {
                Ok(()) => {
                    room_events::broadcast_item_updated(state, trip_id, patch, user);
                    Ok(())
                }
                Err(err) => reject_command(outbound_tx, &err),
            }
        }
        PlanInboundMessage::PlanItemDeleted { section, item_id } => {
            match plan_service::delete_item(state, trip_id, section, &item_id).await {
                Ok(()) => {
                    room_events::broadcast_item_deleted(state, trip_id, section, item_id, user);
                    Ok(())
                }
                Err(err) => reject_command(outbound_tx, &err),
            }
        }
    }
}

/// Report a rejected mutation to the originating connection only.
fn reject_command(
    tx: &mpsc::UnboundedSender<Message>,
    err: &ServiceError,
) -> Result<(), SocketError> {
    send_message_to_websocket(
        tx,
        &PlanOutboundMessage::CommandRejected {
            message: err.to_string(),
        },
    )
}

/// Run the gate checks for a join handshake: trip lookup, membership, and
/// plan hydration.
async fn authorize_join(
    state: &SharedState,
    trip_id: &str,
    user: &UserDescriptor,
) -> Result<(), ServiceError> {
    let store = state.require_plan_store().await?;

    let trip = store.find_trip(trip_id.to_owned()).await?;

    check_membership(trip.as_ref(), trip_id, &user.email).map_err(ServiceError::Unauthorized)?;

    // Hydrate the plan before the first mutation can reach this trip.
    plan_service::open_for_editing(state, trip_id).await?;

    Ok(())
}

/// Membership rule of the connection gate, factored out for testing.
fn check_membership(
    trip: Option<&TripEntity>,
    trip_id: &str,
    email: &str,
) -> Result<(), String> {
    let Some(trip) = trip else {
        return Err(format!("trip `{trip_id}` does not exist"));
    };

    if !trip.tripmates.iter().any(|tripmate| tripmate == email) {
        return Err(format!("`{email}` is not a tripmate of trip `{trip_id}`"));
    }

    Ok(())
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are permanent errors and reported as `Ok` after
/// logging; a closed writer channel is surfaced so the caller can terminate.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), SocketError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| SocketError::ConnectionClosed)
}

/// Forward room broadcasts onto this connection's writer queue.
fn spawn_room_forwarder(
    room_rx: broadcast::Receiver<RoomEvent>,
    outbound_tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(room_rx);
        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => {
                    if outbound_tx.send(Message::Text(event.data.into())).is_err() {
                        break;
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "plan room subscriber lagged; continuing");
                }
            }
        }
    })
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(tripmates: &[&str]) -> TripEntity {
        TripEntity {
            id: "trip-1".into(),
            name: "Lisbon".into(),
            tripmates: tripmates.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn missing_trip_is_rejected_with_a_reason() {
        let result = check_membership(None, "trip-1", "ana@example.com");
        let reason = result.expect_err("missing trips are rejected");
        assert!(!reason.is_empty());
        assert!(reason.contains("trip-1"));
    }

    #[test]
    fn non_tripmate_is_rejected_with_a_reason() {
        let trip = trip(&["bea@example.com"]);
        let result = check_membership(Some(&trip), "trip-1", "ana@example.com");
        let reason = result.expect_err("non-members are rejected");
        assert!(reason.contains("ana@example.com"));
    }

    #[test]
    fn tripmate_is_admitted() {
        let trip = trip(&["ana@example.com", "bea@example.com"]);
        assert!(check_membership(Some(&trip), "trip-1", "ana@example.com").is_ok());
    }
}
