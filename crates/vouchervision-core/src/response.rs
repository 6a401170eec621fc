//! Classification of service responses into payloads or per-item errors.

use serde_json::Value;

use crate::error::{ItemError, ItemResult};

/// Read a response body and classify it.
pub async fn read_payload(response: reqwest::Response, timeout_ms: u64) -> ItemResult<Value> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| ItemError::from_transport(&e, timeout_ms))?;
    classify(status, &body)
}

/// Classify a status code and body.
///
/// 200 must carry a JSON document; anything else is an error whose message
/// comes from a JSON `error` field when present, or the raw body otherwise.
pub fn classify(status: u16, body: &str) -> ItemResult<Value> {
    if status == 200 {
        return serde_json::from_str(body).map_err(|e| ItemError::MalformedResponse {
            status,
            message: e.to_string(),
        });
    }

    let message = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "Unknown error".to_string(),
            Some(other) => other.to_string(),
        },
        Ok(_) | Err(_) => {
            let text = body.trim();
            if text.is_empty() {
                reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                text.to_string()
            }
        }
    };

    Err(ItemError::Remote { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_json_is_payload() {
        let payload = classify(200, r#"{"formatted_json": {"catalogNumber": "123"}}"#).unwrap();
        assert_eq!(payload["formatted_json"]["catalogNumber"], "123");
    }

    #[test]
    fn test_ok_garbage_is_malformed() {
        let err = classify(200, "<html>oops</html>").unwrap_err();
        assert!(matches!(
            err,
            ItemError::MalformedResponse { status: 200, .. }
        ));
        assert!(err.to_string().contains("Malformed response"));
    }

    #[test]
    fn test_error_field_is_used() {
        let err = classify(401, r#"{"error": "Invalid API key"}"#).unwrap_err();
        assert_eq!(
            err,
            ItemError::Remote {
                status: 401,
                message: "Invalid API key".to_string()
            }
        );
    }

    #[test]
    fn test_json_without_error_field() {
        let err = classify(500, &json!({"detail": "x"}).to_string()).unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: Unknown error");
    }

    #[test]
    fn test_plain_text_body_falls_back_to_raw_text() {
        let err = classify(502, "Bad Gateway from upstream\n").unwrap_err();
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway from upstream");
    }

    #[test]
    fn test_empty_body_uses_reason_phrase() {
        let err = classify(503, "").unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }

    #[test]
    fn test_non_200_success_codes_are_not_payloads() {
        let err = classify(202, r#"{"status": "queued"}"#).unwrap_err();
        assert_eq!(err.http_status(), Some(202));
    }
}
