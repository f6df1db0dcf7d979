use uuid::Uuid;

/// Prefix carried by records synthesized while the store rejects writes.
pub const DEMO_ID_PREFIX: &str = "demo-";

pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

pub fn demo_id(now_ms: i64) -> String {
    format!("{DEMO_ID_PREFIX}{now_ms}")
}

pub fn is_demo_id(id: &str) -> bool {
    id.starts_with(DEMO_ID_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_ids_are_time_based() {
        let id = demo_id(1_700_000_000_123);
        assert_eq!(id, "demo-1700000000123");
        assert!(is_demo_id(&id));
        assert!(!is_demo_id(&new_uuid_v7()));
    }
}
