use serde::Serialize;

/// Peripheral entity: created when someone answers your question.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: u64,
    pub recipient_id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: i64,
}
