use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use casino::house::SettlementReport;
use casino::types::{Balance, BetStatus, Currency, SportsBet, UserId};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::AppState;

// Notification types that can be sent to users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotificationType {
    #[serde(rename = "balance_updated")]
    BalanceUpdated {
        currency: Currency,
        amount: f64,
        reason: String,
    },
    #[serde(rename = "sports_bet_settled")]
    SportsBetSettled {
        bet_id: u64,
        match_id: String,
        selection_id: String,
        status: BetStatus,
        stake: f64,
        potential_win: f64,
        currency: Currency,
    },
    #[serde(rename = "connection_established")]
    ConnectionEstablished { user_id: u64, message: String },
}

impl NotificationType {
    pub fn balance_updated(balance: &Balance, reason: &str) -> Self {
        NotificationType::BalanceUpdated {
            currency: balance.currency,
            amount: balance.amount,
            reason: reason.to_string(),
        }
    }

    pub fn bet_settled(bet: &SportsBet) -> Self {
        NotificationType::SportsBetSettled {
            bet_id: bet.id,
            match_id: bet.match_id.clone(),
            selection_id: bet.selection_id.clone(),
            status: bet.status,
            stake: bet.stake,
            potential_win: bet.potential_win,
            currency: bet.currency,
        }
    }
}

// Global notification manager
pub type NotificationManager = Arc<Mutex<HashMap<UserId, broadcast::Sender<NotificationType>>>>;

// Create a new notification manager
pub fn create_notification_manager() -> NotificationManager {
    Arc::new(Mutex::new(HashMap::new()))
}

fn lock_manager(
    notification_manager: &NotificationManager,
) -> MutexGuard<'_, HashMap<UserId, broadcast::Sender<NotificationType>>> {
    notification_manager
        .lock()
        .unwrap_or_else(|p| p.into_inner())
}

// WebSocket handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket_with_auth(socket, state))
}

fn auth_failure(message: &str) -> Message {
    let notification = NotificationType::ConnectionEstablished {
        user_id: 0,
        message: message.to_string(),
    };
    Message::Text(
        serde_json::to_string(&notification)
            .unwrap_or_default()
            .into(),
    )
}

// Handle socket with authentication via first message
async fn handle_socket_with_auth(socket: WebSocket, state: AppState) {
    tracing::info!("WebSocket connection established, awaiting authentication");

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Wait for authentication message carrying the bearer token
    let user_id = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<AuthMessage>(&text) {
            Ok(auth_msg) => match state.sessions.user_id(&auth_msg.session_id) {
                Some(user_id) => {
                    tracing::info!("User {} authenticated via WebSocket", user_id);
                    user_id
                }
                None => {
                    tracing::warn!("Invalid session token in WebSocket auth");
                    let _ = sender
                        .send(auth_failure("Authentication failed: invalid session"))
                        .await;
                    return;
                }
            },
            Err(e) => {
                tracing::warn!("Failed to parse WebSocket auth message: {}", e);
                let _ = sender
                    .send(auth_failure("Authentication failed: invalid message format"))
                    .await;
                return;
            }
        },
        Some(Ok(Message::Close(_))) | None => {
            tracing::info!("WebSocket connection closed before authentication");
            return;
        }
        Some(Err(e)) => {
            tracing::error!("WebSocket error during authentication: {}", e);
            return;
        }
        _ => {
            tracing::warn!("Unexpected message type during WebSocket authentication");
            return;
        }
    };

    // Continue with authenticated socket handling
    handle_authenticated_socket(sender, receiver, user_id, state).await;
}

// Authentication message structure
#[derive(Debug, Deserialize)]
struct AuthMessage {
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn handle_authenticated_socket(
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    user_id: UserId,
    state: AppState,
) {
    // Create a broadcast channel for this user
    let (tx, mut rx) = broadcast::channel(100);

    // A newer connection replaces an older one
    lock_manager(&state.notification_manager).insert(user_id, tx.clone());

    let connection_msg = NotificationType::ConnectionEstablished {
        user_id,
        message: "Successfully connected to notifications".to_string(),
    };

    if let Ok(msg_text) = serde_json::to_string(&connection_msg) {
        if sender.send(Message::Text(msg_text.into())).await.is_err() {
            tracing::warn!("Failed to send connection message to user {}", user_id);
        }
    }

    // Client messages are only read to notice the socket closing
    let incoming_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    tracing::debug!("Received message from user {}: {}", user_id, text);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("WebSocket connection closed by user {}", user_id);
                    break;
                }
                Err(e) => {
                    tracing::error!("WebSocket error for user {}: {}", user_id, e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Handle outgoing notifications
    let outgoing_task = tokio::spawn(async move {
        while let Ok(notification) = rx.recv().await {
            match serde_json::to_string(&notification) {
                Ok(msg_text) => {
                    if sender.send(Message::Text(msg_text.into())).await.is_err() {
                        tracing::warn!("Failed to send notification to user {}", user_id);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to serialize notification for user {}: {}",
                        user_id,
                        e
                    );
                }
            }
        }
    });

    tokio::select! {
        _ = incoming_task => {
            tracing::info!("Incoming task completed for user {}", user_id);
        }
        _ = outgoing_task => {
            tracing::info!("Outgoing task completed for user {}", user_id);
        }
    }

    // Only remove our own sender; a newer connection may have replaced it
    {
        let mut manager = lock_manager(&state.notification_manager);
        if manager
            .get(&user_id)
            .is_some_and(|current| current.same_channel(&tx))
        {
            manager.remove(&user_id);
        }
    }

    tracing::info!("WebSocket connection closed for user {}", user_id);
}

pub fn send_notification_to_user(
    notification_manager: &NotificationManager,
    user_id: UserId,
    notification: NotificationType,
) {
    let manager = lock_manager(notification_manager);
    if let Some(tx) = manager.get(&user_id) {
        if let Err(e) = tx.send(notification) {
            tracing::warn!("Failed to send notification to user {}: {}", user_id, e);
        }
    }
}

pub fn send_balance_notification(
    notification_manager: &NotificationManager,
    balance: &Balance,
    reason: &str,
) {
    send_notification_to_user(
        notification_manager,
        balance.user_id,
        NotificationType::balance_updated(balance, reason),
    );
}

// Tell every bettor about their settled bet and any credited balance
pub fn send_settlement_notifications(
    notification_manager: &NotificationManager,
    report: &SettlementReport,
) {
    for settled in &report.settled {
        send_notification_to_user(
            notification_manager,
            settled.bet.user_id,
            NotificationType::bet_settled(&settled.bet),
        );
        if let Some(balance) = &settled.balance {
            send_balance_notification(notification_manager, balance, "sports_settlement");
        }
    }
}
