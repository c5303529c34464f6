#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Error {
    #[serde(rename = "type")]
    pub error_type: Type,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(rename = "subproblems", default, skip_serializing_if = "Vec::is_empty")]
    pub sub_problems: Vec<Error>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<super::identifier::Identifier>
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Type {
    #[serde(rename = "urn:ietf:params:acme:error:accountDoesNotExist")]
    AccountDoesNotExist,
    #[serde(rename = "urn:ietf:params:acme:error:alreadyRevoked")]
    AlreadyRevoked,
    #[serde(rename = "urn:ietf:params:acme:error:authorizationNotFound")]
    AuthorizationNotFound,
    #[serde(rename = "urn:ietf:params:acme:error:badCSR")]
    BadCSR,
    #[serde(rename = "urn:ietf:params:acme:error:badNonce")]
    BadNonce,
    #[serde(rename = "urn:ietf:params:acme:error:badPublicKey")]
    BadPublicKey,
    #[serde(rename = "urn:ietf:params:acme:error:badRevocationReason")]
    BadRevocationReason,
    #[serde(rename = "urn:ietf:params:acme:error:badSignatureAlgorithm")]
    BadSignatureAlgorithm,
    #[serde(rename = "urn:ietf:params:acme:error:challengeInvalid")]
    ChallengeInvalid,
    #[serde(rename = "urn:ietf:params:acme:error:challengeNotFound")]
    ChallengeNotFound,
    #[serde(rename = "urn:ietf:params:acme:error:compound")]
    Compound,
    #[serde(rename = "urn:ietf:params:acme:error:invalidContact")]
    InvalidContact,
    #[serde(rename = "urn:ietf:params:acme:error:malformed")]
    Malformed,
    #[serde(rename = "urn:ietf:params:acme:error:orderNotReady")]
    OrderNotReady,
    #[serde(rename = "urn:ietf:params:acme:error:rejectedIdentifier")]
    RejectedIdentifier,
    #[serde(rename = "urn:ietf:params:acme:error:serverInternal")]
    ServerInternal,
    #[serde(rename = "urn:ietf:params:acme:error:unauthorized")]
    Unauthorized,
    #[serde(rename = "urn:ietf:params:acme:error:unsupportedContact")]
    UnsupportedContact,
    #[serde(rename = "urn:ietf:params:acme:error:unsupportedIdentifier")]
    UnsupportedIdentifier,
    #[serde(rename = "urn:ietf:params:acme:error:userActionRequired")]
    UserActionRequired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_types_serialize_to_acme_urns() {
        assert_eq!(
            serde_json::to_value(&Type::BadNonce).unwrap(),
            serde_json::json!("urn:ietf:params:acme:error:badNonce")
        );
        assert_eq!(
            serde_json::to_value(&Type::OrderNotReady).unwrap(),
            serde_json::json!("urn:ietf:params:acme:error:orderNotReady")
        );
        assert_eq!(
            serde_json::to_value(&Type::AuthorizationNotFound).unwrap(),
            serde_json::json!("urn:ietf:params:acme:error:authorizationNotFound")
        );
    }

    #[test]
    fn empty_optionals_are_omitted_from_problems() {
        let err = Error {
            error_type: Type::Malformed,
            title: "Bad request".to_string(),
            status: 400,
            detail: "unparsable".to_string(),
            instance: None,
            sub_problems: vec![],
            identifier: None,
        };
        let val = serde_json::to_value(&err).unwrap();
        let obj = val.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["type"], "urn:ietf:params:acme:error:malformed");
        assert_eq!(obj["status"], 400);
    }

    #[test]
    fn problem_round_trips() {
        let err = Error {
            error_type: Type::Unauthorized,
            title: "Unauthorized".to_string(),
            status: 401,
            detail: "no".to_string(),
            instance: Some("/order/abc".to_string()),
            sub_problems: vec![],
            identifier: None,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: Error = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }
}
