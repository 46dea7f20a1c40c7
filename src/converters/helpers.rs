use uuid::Uuid;

pub fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}

pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Drops leading newlines and trailing whitespace.
pub fn trim_message(text: &str) -> String {
    text.trim_start_matches('\n').trim_end().to_string()
}
