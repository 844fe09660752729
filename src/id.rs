use uuid::Uuid;

/// UUIDv7 keeps ids roughly time-ordered, which makes server-side rows and
/// log entries cheap to scan in creation order.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}
