//! Request DTOs for the cache HTTP API

use serde::Deserialize;
use serde_json::Value;

/// Request body for `PUT /groups/:group/entries/:key`
#[derive(Debug, Clone, Deserialize)]
pub struct PutRequest {
    /// Any JSON value
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_request_deserialize() {
        let json = r#"{"value": {"rows": [1, 2, 3]}}"#;
        let req: PutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.value["rows"][2], 3);
    }

    #[test]
    fn test_put_request_requires_value() {
        let result = serde_json::from_str::<PutRequest>(r#"{"val": 1}"#);
        assert!(result.is_err());
    }
}
