use super::schema::*;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use chrono::prelude::*;

#[derive(DbEnum, Debug, PartialEq, Eq, Clone, Copy)]
pub enum AccountStatus {
    Valid,
    Deactivated,
    Revoked,
}

#[derive(Insertable, Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = accounts)]
pub struct Account {
    pub id: String,
    pub key: serde_json::Value,
    pub key_thumbprint: String,
    pub contact: serde_json::Value,
    pub status: AccountStatus,
    pub terms_agreed: bool,
    pub created_at: DateTime<Utc>,
    pub initial_ip: String,
}

impl Account {
    pub fn kid(&self) -> String {
        rocket::uri!(crate::acme::account(&self.id)).to_string()
    }

    pub fn contacts(&self) -> Vec<String> {
        serde_json::from_value(self.contact.clone()).unwrap_or_default()
    }

    pub(crate) fn to_json(&self, base: &url::Url) -> crate::types::account::Account {
        crate::types::account::Account {
            status: match self.status {
                AccountStatus::Valid => crate::types::account::Status::Valid,
                AccountStatus::Deactivated => crate::types::account::Status::Deactivated,
                AccountStatus::Revoked => crate::types::account::Status::Revoked,
            },
            contact: self.contacts(),
            terms_of_service_agreed: self.terms_agreed,
            orders: base.join(
                &rocket::uri!(crate::acme::account_orders(&self.id)).to_string()
            ).unwrap().to_string(),
        }
    }
}

pub(crate) fn parse_contact(contact: &str) -> Result<(), (crate::types::error::Type, String)> {
    let url = match url::Url::parse(contact) {
        Ok(v) => v,
        Err(_) => return Err((crate::types::error::Type::InvalidContact, "Invalid URL formatting".to_string()))
    };
    match url.scheme() {
        "mailto" => {
            if url.query().is_some() {
                return Err((crate::types::error::Type::InvalidContact, "hfields not allowed in mailto URL".to_string()));
            }
            if url.path().contains(',') {
                return Err((crate::types::error::Type::InvalidContact, "No more than one address per URL allowed".to_string()));
            }
            Ok(())
        }
        _ => Err((crate::types::error::Type::UnsupportedContact, "Unsupported URL scheme".to_string()))
    }
}

pub(crate) fn parse_contacts(contacts: &[&str]) -> crate::acme::ACMEResult<()> {
    let mut errors = vec![];

    for contact in contacts {
        if let Err((error_type, detail)) = parse_contact(contact) {
            errors.push(crate::types::error::Error {
                error_type,
                status: 400,
                title: "Invalid contact".to_string(),
                detail,
                sub_problems: vec![],
                instance: None,
                identifier: None,
            });
        }
    }

    crate::util::error_list_to_result(errors, "Multiple contacts make this request invalid".to_string())
}

#[derive(DbEnum, Debug, PartialEq, Eq, Clone, Copy)]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

#[derive(Insertable, Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = orders)]
pub struct Order {
    pub id: String,
    pub account_id: String,
    pub status: OrderStatus,
    pub expires_at: DateTime<Utc>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub identifiers: serde_json::Value,
    pub finalize: String,
    pub certificate_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn url(&self) -> String {
        rocket::uri!(crate::acme::order(&self.id)).to_string()
    }

    pub fn identifier_list(&self) -> Vec<crate::types::identifier::Identifier> {
        serde_json::from_value(self.identifiers.clone()).unwrap_or_default()
    }

    pub(crate) async fn to_json(
        &self, db: &crate::DBConn, base: &url::Url,
    ) -> crate::acme::ACMEResult<crate::types::order::Order> {
        let oid = self.id.clone();
        let authzs: Vec<String> = crate::try_db_result!(db.run(move |c| {
            authorizations::dsl::authorizations.filter(
                authorizations::dsl::order_id.eq(&oid)
            ).select(authorizations::dsl::id).load::<String>(c)
        }).await, "Failed to get order authorizations: {}")?;

        Ok(crate::types::order::Order {
            status: match self.status {
                OrderStatus::Pending => crate::types::order::Status::Pending,
                OrderStatus::Ready => crate::types::order::Status::Ready,
                OrderStatus::Processing => crate::types::order::Status::Processing,
                OrderStatus::Valid => crate::types::order::Status::Valid,
                OrderStatus::Invalid => crate::types::order::Status::Invalid,
            },
            expires: Some(self.expires_at),
            identifiers: self.identifier_list(),
            not_before: self.not_before,
            not_after: self.not_after,
            error: None,
            authorizations: authzs.into_iter().map(|a| {
                base.join(&rocket::uri!(crate::acme::authorization(a)).to_string()).unwrap().to_string()
            }).collect(),
            finalize: base.join(
                &rocket::uri!(crate::acme::order_finalize(&self.id)).to_string()
            ).unwrap().to_string(),
            certificate: self.certificate_id.as_ref().map(|c| {
                base.join(&rocket::uri!(crate::acme::certificate(c)).to_string()).unwrap().to_string()
            }),
        })
    }
}

#[derive(DbEnum, Debug, PartialEq, Eq, Clone, Copy)]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

impl AuthorizationStatus {
    /// Terminal authorizations never accept further challenge responses.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuthorizationStatus::Pending)
    }
}

#[derive(Insertable, Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = authorizations)]
pub struct Authorization {
    pub id: String,
    pub order_id: String,
    pub status: AuthorizationStatus,
    pub expires_at: DateTime<Utc>,
    pub identifier: serde_json::Value,
    pub wildcard: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Authorization {
    pub fn url(&self) -> String {
        rocket::uri!(crate::acme::authorization(&self.id)).to_string()
    }

    pub fn identifier_value(&self) -> crate::types::identifier::Identifier {
        serde_json::from_value(self.identifier.clone()).unwrap_or(crate::types::identifier::Identifier {
            id_type: String::new(),
            value: String::new(),
        })
    }

    pub(crate) async fn to_json(
        &self, db: &crate::DBConn, base: &url::Url,
    ) -> crate::acme::ACMEResult<crate::types::authorization::Authorization> {
        let aid = self.id.clone();
        let challenges: Vec<Challenge> = crate::try_db_result!(db.run(move |c| {
            challenges::dsl::challenges.filter(
                challenges::dsl::authorization_id.eq(&aid)
            ).load(c)
        }).await, "Failed to get authorization challenges: {}")?;

        Ok(crate::types::authorization::Authorization {
            identifier: self.identifier_value(),
            status: match self.status {
                AuthorizationStatus::Pending => crate::types::authorization::Status::Pending,
                AuthorizationStatus::Valid => crate::types::authorization::Status::Valid,
                AuthorizationStatus::Invalid => crate::types::authorization::Status::Invalid,
                AuthorizationStatus::Deactivated => crate::types::authorization::Status::Deactivated,
                AuthorizationStatus::Expired => crate::types::authorization::Status::Expired,
                AuthorizationStatus::Revoked => crate::types::authorization::Status::Revoked,
            },
            expires: Some(self.expires_at),
            challenges: challenges.iter().map(|c| c.to_json(base)).collect(),
            wildcard: if self.wildcard { Some(true) } else { None },
        })
    }
}

#[derive(DbEnum, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChallengeType {
    #[db_rename = "http-01"]
    Http01,
    #[db_rename = "tls-alpn-01"]
    TlsAlpn01,
    #[db_rename = "dns-01"]
    Dns01,
}

#[derive(DbEnum, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

#[derive(Insertable, Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = challenges)]
pub struct Challenge {
    pub id: String,
    pub authorization_id: String,
    pub type_: ChallengeType,
    pub url: String,
    pub status: ChallengeStatus,
    pub token: String,
    pub validated: Option<DateTime<Utc>>,
    pub error: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl Challenge {
    pub(crate) fn to_json(&self, base: &url::Url) -> crate::types::challenge::Challenge {
        crate::types::challenge::Challenge {
            challenge_type: match self.type_ {
                ChallengeType::Http01 => crate::types::challenge::Type::HTTP01,
                ChallengeType::TlsAlpn01 => crate::types::challenge::Type::TLSALPN01,
                ChallengeType::Dns01 => crate::types::challenge::Type::DNS01,
            },
            url: base.join(&self.url).unwrap().to_string(),
            status: match self.status {
                ChallengeStatus::Pending => crate::types::challenge::Status::Pending,
                ChallengeStatus::Processing => crate::types::challenge::Status::Processing,
                ChallengeStatus::Valid => crate::types::challenge::Status::Valid,
                ChallengeStatus::Invalid => crate::types::challenge::Status::Invalid,
            },
            validated: self.validated,
            error: self.error.as_ref().and_then(|e| serde_json::from_value(e.clone()).ok()),
            token: self.token.clone(),
        }
    }
}

#[derive(Insertable, Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = certificates)]
pub struct Certificate {
    pub id: String,
    pub order_id: String,
    pub certificate: String,
    pub revoked: bool,
    pub revocation_reason: Option<i16>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Certificate {
    pub fn url(&self) -> String {
        rocket::uri!(crate::acme::certificate(&self.id)).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailto_contacts_are_accepted() {
        assert!(parse_contact("mailto:admin@example.com").is_ok());
    }

    #[test]
    fn mailto_hfields_are_rejected() {
        let (t, _) = parse_contact("mailto:admin@example.com?subject=hi").unwrap_err();
        assert_eq!(t, crate::types::error::Type::InvalidContact);
    }

    #[test]
    fn multiple_addresses_are_rejected() {
        let (t, _) = parse_contact("mailto:a@example.com,b@example.com").unwrap_err();
        assert_eq!(t, crate::types::error::Type::InvalidContact);
    }

    #[test]
    fn non_mailto_schemes_are_unsupported() {
        let (t, _) = parse_contact("tel:+15551234567").unwrap_err();
        assert_eq!(t, crate::types::error::Type::UnsupportedContact);
    }

    #[test]
    fn contact_errors_compound() {
        let err = parse_contacts(&["tel:+15551234567", "not a url"]).unwrap_err();
        assert_eq!(err.sub_problems.len(), 2);
    }

    #[test]
    fn only_pending_authorizations_accept_responses() {
        assert!(!AuthorizationStatus::Pending.is_terminal());
        assert!(AuthorizationStatus::Valid.is_terminal());
        assert!(AuthorizationStatus::Invalid.is_terminal());
        assert!(AuthorizationStatus::Expired.is_terminal());
        assert!(AuthorizationStatus::Deactivated.is_terminal());
    }
}
