use serde::{Deserialize, Serialize};

/// `TIME_SYNC{clientSentAt}` — the first leg of the clock-offset exchange
/// (spec §4.O).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSync {
    /// The client's local clock reading when this frame was sent.
    pub client_sent_at: i64,
}

/// `TIME_SYNC_ACK` — sent by the server as the second leg (`client_received_at`
/// absent), and by the client as the third and final leg (`client_received_at`
/// present), at which point the server estimates the offset and stores it on
/// the session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSyncAck {
    /// Echoed from the original `TIME_SYNC`.
    pub client_sent_at: i64,
    /// The server's clock reading when it received `TIME_SYNC`.
    pub server_received_at: i64,
    /// The server's clock reading when it sent this acknowledgement.
    pub server_sent_at: i64,
    /// The client's clock reading when it received the server's
    /// acknowledgement; present only on the client's final reply.
    #[serde(default)]
    pub client_received_at: Option<i64>,
}
