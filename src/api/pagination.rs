pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Normalizes `skip`/`offset` and `limit` query values into `(offset, limit)`.
pub fn window(offset: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    (
        offset.unwrap_or(0).max(0),
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamps() {
        assert_eq!(window(None, None), (0, 20));
        assert_eq!(window(Some(-5), Some(0)), (0, 1));
        assert_eq!(window(Some(40), Some(1000)), (40, 100));
    }
}
