use chrono::prelude::*;

#[derive(Serialize)]
pub struct List {
    pub orders: Vec<String>
}

#[derive(Serialize, Deserialize)]
pub struct Order {
    #[serde(skip_deserializing)]
    pub status: Status,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    pub identifiers: Vec<super::identifier::Identifier>,
    #[serde(rename = "notBefore", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(rename = "notAfter", default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub error: Option<super::error::Error>,
    #[serde(skip_deserializing)]
    pub authorizations: Vec<String>,
    #[serde(skip_deserializing)]
    pub finalize: String,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "valid")]
    Valid,
    #[serde(rename = "invalid")]
    Invalid,
}

impl Default for Status {
    fn default() -> Status {
        Status::Pending
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderCreate {
    pub identifiers: Vec<super::identifier::Identifier>,
    #[serde(rename = "notBefore", default)]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(rename = "notAfter", default)]
    pub not_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct OrderFinalize {
    pub csr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_serializes_rfc_field_names() {
        let order = Order {
            status: Status::Pending,
            expires: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
            identifiers: vec![super::super::identifier::Identifier {
                id_type: "dns".to_string(),
                value: "test.example".to_string(),
            }],
            not_before: None,
            not_after: None,
            error: None,
            authorizations: vec!["https://ca.example/authz/authz_1".to_string()],
            finalize: "https://ca.example/order/order_1/finalize".to_string(),
            certificate: None,
        };
        let val = serde_json::to_value(&order).unwrap();
        assert_eq!(val["status"], "pending");
        assert_eq!(val["identifiers"][0]["type"], "dns");
        assert!(val.get("notBefore").is_none());
        assert!(val.get("certificate").is_none());
        assert_eq!(val["expires"], "2026-03-01T12:00:00Z");
    }

    #[test]
    fn order_create_accepts_advisory_window() {
        let payload: OrderCreate = serde_json::from_str(
            r#"{"identifiers":[{"type":"dns","value":"a.example"}],
                "notBefore":"2026-01-01T00:00:00Z"}"#,
        ).unwrap();
        assert_eq!(payload.identifiers.len(), 1);
        assert!(payload.not_before.is_some());
        assert!(payload.not_after.is_none());
    }
}
