use diesel::prelude::*;
use chrono::prelude::*;
use base64::prelude::*;
use crate::{types, DBConn};
use super::{models, schema};

const CHALLENGE_TOKEN_BYTES: usize = 16;
const CERT_SERIAL_BYTES: usize = 16;

/// Orders and their authorizations stay actionable for a day.
fn order_lifetime() -> chrono::Duration {
    chrono::Duration::hours(24)
}

/// Normalizes and checks a new-order identifier list: types must be dns or
/// ip, dns names are lowercased, duplicates collapse in order. Wildcards are
/// refused as they would need a dns-01 validation we do not provision.
pub(crate) fn validate_identifiers(
    identifiers: &[types::identifier::Identifier],
) -> super::ACMEResult<Vec<types::identifier::Identifier>> {
    if identifiers.is_empty() {
        return Err(types::error::Error {
            error_type: types::error::Type::Malformed,
            status: 400,
            title: "Bad request".to_string(),
            detail: "At least one identifier is required".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        });
    }

    let mut errors = vec![];
    let mut out: Vec<types::identifier::Identifier> = vec![];

    for id in identifiers {
        let normalized = match types::identifier::Type::from_str(&id.id_type) {
            Some(types::identifier::Type::DNS) => {
                let value = id.value.trim_end_matches('.').to_ascii_lowercase();
                if value.starts_with("*.") {
                    errors.push(types::error::Error {
                        error_type: types::error::Type::RejectedIdentifier,
                        status: 400,
                        title: "Rejected identifier".to_string(),
                        detail: format!("Wildcard identifier '{}' requires dns-01 validation, which is not offered", value),
                        sub_problems: vec![],
                        instance: None,
                        identifier: Some(id.to_owned()),
                    });
                    continue;
                }
                if value.is_empty() || value.contains(|c: char| c.is_whitespace()) {
                    errors.push(types::error::Error {
                        error_type: types::error::Type::RejectedIdentifier,
                        status: 400,
                        title: "Rejected identifier".to_string(),
                        detail: format!("'{}' is not a valid DNS name", id.value),
                        sub_problems: vec![],
                        instance: None,
                        identifier: Some(id.to_owned()),
                    });
                    continue;
                }
                types::identifier::Identifier {
                    id_type: "dns".to_string(),
                    value,
                }
            }
            Some(types::identifier::Type::IP) => {
                if id.value.parse::<std::net::IpAddr>().is_err() {
                    errors.push(types::error::Error {
                        error_type: types::error::Type::RejectedIdentifier,
                        status: 400,
                        title: "Rejected identifier".to_string(),
                        detail: format!("'{}' is not a valid IP address", id.value),
                        sub_problems: vec![],
                        instance: None,
                        identifier: Some(id.to_owned()),
                    });
                    continue;
                }
                id.to_owned()
            }
            None => {
                errors.push(types::error::Error {
                    error_type: types::error::Type::UnsupportedIdentifier,
                    status: 400,
                    title: "Unsupported identifier".to_string(),
                    detail: format!("'{}' is not an identifier we support", id.id_type),
                    sub_problems: vec![],
                    instance: None,
                    identifier: Some(id.to_owned()),
                });
                continue;
            }
        };

        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }

    crate::util::error_list_to_result(errors, "Multiple errors make this order invalid".to_string())?;

    Ok(out)
}

fn new_challenge(authorization_id: &str, type_: models::ChallengeType, now: DateTime<Utc>) -> super::ACMEResult<models::Challenge> {
    let token = match crate::util::rand_b64(CHALLENGE_TOKEN_BYTES) {
        Ok(v) => v,
        Err(err) => {
            error!("Unable to generate challenge token: {}", err);
            return Err(crate::internal_server_error!());
        }
    };
    Ok(models::Challenge {
        id: crate::util::new_id("chall"),
        authorization_id: authorization_id.to_string(),
        type_,
        url: rocket::uri!(crate::acme::challenge(&token)).to_string(),
        status: models::ChallengeStatus::Pending,
        token,
        validated: None,
        error: None,
        updated_at: now,
    })
}

/// Creates the order, one authorization per identifier and two challenges per
/// authorization in a single transaction; nothing persists on error.
pub(crate) async fn create_order(
    db: &DBConn, payload: &types::order::OrderCreate, account: &super::Account,
) -> super::ACMEResult<models::Order> {
    let identifiers = validate_identifiers(&payload.identifiers)?;

    let now = Utc::now();
    let expires = now + order_lifetime();
    let order_id = crate::util::new_id("order");

    let order = models::Order {
        id: order_id.clone(),
        account_id: account.inner.id.clone(),
        status: models::OrderStatus::Pending,
        expires_at: expires,
        not_before: payload.not_before,
        not_after: payload.not_after,
        identifiers: serde_json::to_value(&identifiers).map_err(|_| crate::internal_server_error!())?,
        finalize: rocket::uri!(crate::acme::order_finalize(&order_id)).to_string(),
        certificate_id: None,
        created_at: now,
        updated_at: now,
    };

    let mut authzs = vec![];
    let mut challenges = vec![];
    for identifier in &identifiers {
        let authz = models::Authorization {
            id: crate::util::new_id("authz"),
            order_id: order_id.clone(),
            status: models::AuthorizationStatus::Pending,
            expires_at: expires,
            identifier: serde_json::to_value(identifier).map_err(|_| crate::internal_server_error!())?,
            wildcard: identifier.value.starts_with("*."),
            created_at: now,
            updated_at: now,
        };
        challenges.push(new_challenge(&authz.id, models::ChallengeType::Http01, now)?);
        challenges.push(new_challenge(&authz.id, models::ChallengeType::TlsAlpn01, now)?);
        authzs.push(authz);
    }

    let order = crate::try_db_result!(db.run(move |c| {
        c.transaction::<_, diesel::result::Error, _>(|c| {
            diesel::insert_into(schema::orders::dsl::orders)
                .values(&order)
                .execute(c)?;
            for authz in &authzs {
                diesel::insert_into(schema::authorizations::dsl::authorizations)
                    .values(authz)
                    .execute(c)?;
            }
            for challenge in &challenges {
                diesel::insert_into(schema::challenges::dsl::challenges)
                    .values(challenge)
                    .execute(c)?;
            }
            Ok(order)
        })
    }).await, "Unable to save order to database: {}")?;

    Ok(order)
}

/// What a pending order should become given its authorizations.
pub(crate) fn pending_order_transition(
    authz_statuses: &[models::AuthorizationStatus],
) -> Option<models::OrderStatus> {
    let mut all_valid = !authz_statuses.is_empty();
    for status in authz_statuses {
        match status {
            models::AuthorizationStatus::Valid => {}
            models::AuthorizationStatus::Pending => {
                all_valid = false;
            }
            _ => return Some(models::OrderStatus::Invalid),
        }
    }
    if all_valid {
        Some(models::OrderStatus::Ready)
    } else {
        None
    }
}

/// Read-triggered invariant check: a pending order whose authorizations have
/// all been validated advances to ready; a failed or expired authorization
/// (or an expired order) makes it invalid. Idempotent, committed atomically.
pub(crate) async fn refresh_order_status(
    db: &DBConn, order: models::Order,
) -> super::ACMEResult<models::Order> {
    match order.status {
        models::OrderStatus::Pending | models::OrderStatus::Ready | models::OrderStatus::Processing => {}
        _ => return Ok(order),
    }

    let now = Utc::now();
    if order.expires_at < now {
        let oid = order.id.clone();
        return crate::try_db_result!(db.run(move |c| {
            diesel::update(schema::orders::dsl::orders.filter(schema::orders::dsl::id.eq(&oid)))
                .set((
                    schema::orders::dsl::status.eq(models::OrderStatus::Invalid),
                    schema::orders::dsl::updated_at.eq(now),
                ))
                .get_result(c)
        }).await, "Unable to expire order: {}");
    }

    if order.status != models::OrderStatus::Pending {
        return Ok(order);
    }

    let oid = order.id.clone();
    let updated = crate::try_db_result!(db.run(move |c| {
        c.transaction::<_, diesel::result::Error, _>(|c| {
            let statuses: Vec<models::AuthorizationStatus> = schema::authorizations::dsl::authorizations
                .filter(schema::authorizations::dsl::order_id.eq(&oid))
                .select(schema::authorizations::dsl::status)
                .load(c)?;

            match pending_order_transition(&statuses) {
                Some(next) => {
                    diesel::update(schema::orders::dsl::orders.filter(schema::orders::dsl::id.eq(&oid)))
                        .set((
                            schema::orders::dsl::status.eq(next),
                            schema::orders::dsl::updated_at.eq(now),
                        ))
                        .get_result(c)
                }
                None => schema::orders::dsl::orders
                    .filter(schema::orders::dsl::id.eq(&oid))
                    .first(c),
            }
        })
    }).await, "Unable to refresh order status: {}")?;

    Ok(updated)
}

/// A pending authorization past its expiry flips to expired on read.
pub(crate) async fn refresh_authz_status(
    db: &DBConn, authz: models::Authorization,
) -> super::ACMEResult<models::Authorization> {
    let now = Utc::now();
    if authz.status != models::AuthorizationStatus::Pending || authz.expires_at >= now {
        return Ok(authz);
    }

    let aid = authz.id.clone();
    crate::try_db_result!(db.run(move |c| {
        diesel::update(schema::authorizations::dsl::authorizations.filter(schema::authorizations::dsl::id.eq(&aid)))
            .set((
                schema::authorizations::dsl::status.eq(models::AuthorizationStatus::Expired),
                schema::authorizations::dsl::updated_at.eq(now),
            ))
            .get_result(c)
    }).await, "Unable to expire authorization: {}")
}

/// Runs a pending challenge through the validator and cascades the verdict to
/// its authorization. Re-posting a resolved challenge is a no-op returning
/// the current snapshot.
pub(crate) async fn respond_to_challenge(
    db: &DBConn, validator: &crate::validator::SharedValidator,
    challenge: models::Challenge, authz: models::Authorization,
    account_thumbprint: String,
) -> super::ACMEResult<models::Challenge> {
    if challenge.status != models::ChallengeStatus::Pending {
        return Ok(challenge);
    }

    let authz = refresh_authz_status(db, authz).await?;
    if authz.status.is_terminal() {
        return Err(challenge_gone(&challenge.token));
    }

    let now = Utc::now();
    let cid = challenge.id.clone();
    crate::try_db_result!(db.run(move |c| {
        diesel::update(schema::challenges::dsl::challenges.filter(schema::challenges::dsl::id.eq(&cid)))
            .set((
                schema::challenges::dsl::status.eq(models::ChallengeStatus::Processing),
                schema::challenges::dsl::updated_at.eq(now),
            ))
            .execute(c)
    }).await, "Unable to update challenge status: {}")?;

    let key_auth = crate::validator::key_authorization(&challenge.token, &account_thumbprint);
    let verdict = validator.validate(&challenge, &authz.identifier_value(), &key_auth).await;

    let cid = challenge.id.clone();
    let aid = authz.id.clone();
    let finished = Utc::now();
    let updated = crate::try_db_result!(db.run(move |c| {
        c.transaction::<_, diesel::result::Error, _>(|c| {
            match &verdict {
                Ok(()) => {
                    diesel::update(schema::challenges::dsl::challenges.filter(schema::challenges::dsl::id.eq(&cid)))
                        .set((
                            schema::challenges::dsl::status.eq(models::ChallengeStatus::Valid),
                            schema::challenges::dsl::validated.eq(finished),
                            schema::challenges::dsl::updated_at.eq(finished),
                        ))
                        .execute(c)?;
                    // one validated challenge is proof of control for the
                    // whole authorization
                    diesel::update(schema::authorizations::dsl::authorizations.filter(schema::authorizations::dsl::id.eq(&aid)))
                        .set((
                            schema::authorizations::dsl::status.eq(models::AuthorizationStatus::Valid),
                            schema::authorizations::dsl::updated_at.eq(finished),
                        ))
                        .execute(c)?;
                }
                Err(problem) => {
                    diesel::update(schema::challenges::dsl::challenges.filter(schema::challenges::dsl::id.eq(&cid)))
                        .set((
                            schema::challenges::dsl::status.eq(models::ChallengeStatus::Invalid),
                            schema::challenges::dsl::error.eq(serde_json::to_value(problem).ok()),
                            schema::challenges::dsl::updated_at.eq(finished),
                        ))
                        .execute(c)?;
                    diesel::update(schema::authorizations::dsl::authorizations.filter(schema::authorizations::dsl::id.eq(&aid)))
                        .set((
                            schema::authorizations::dsl::status.eq(models::AuthorizationStatus::Invalid),
                            schema::authorizations::dsl::updated_at.eq(finished),
                        ))
                        .execute(c)?;
                }
            }
            schema::challenges::dsl::challenges.filter(schema::challenges::dsl::id.eq(&cid)).first(c)
        })
    }).await, "Unable to record challenge result: {}")?;

    Ok(updated)
}

/// Draws a fresh 128-bit certificate serial. The leading byte is kept
/// nonzero: DER integer encoding drops leading zero bytes, and revocation
/// relies on the presented serial reproducing the certificate row ID.
fn new_certificate_serial() -> super::ACMEResult<Vec<u8>> {
    let mut serial = vec![0u8; CERT_SERIAL_BYTES];
    if openssl::rand::rand_bytes(&mut serial).is_err() {
        return Err(crate::internal_server_error!());
    }
    while serial[0] == 0 {
        if openssl::rand::rand_bytes(&mut serial[..1]).is_err() {
            return Err(crate::internal_server_error!());
        }
    }
    Ok(serial)
}

/// Maps a leaf serial back to a certificate row ID. Issued serials are
/// exactly 16 bytes and never start with a zero byte, so a shorter value
/// (a foreign CA's serial, or one that would need zero-padding) or a longer
/// one cannot name a certificate from this CA.
pub(crate) fn certificate_id_from_serial(serial: &[u8]) -> Option<String> {
    if serial.len() != CERT_SERIAL_BYTES || serial[0] == 0 {
        return None;
    }
    Some(format!("cert_{}", BASE64_URL_SAFE_NO_PAD.encode(serial)))
}

fn challenge_gone(token: &str) -> types::error::Error {
    types::error::Error {
        error_type: types::error::Type::ChallengeInvalid,
        status: 400,
        title: "Challenge unavailable".to_string(),
        detail: format!("The authorization owning challenge '{}' is no longer pending", token),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }
}

/// Finalize: gate on ready (re-deriving from authorizations when still
/// pending), validate and sign the CSR, then link the certificate and mark
/// the order valid atomically. Client-side CSR faults leave the order ready.
pub(crate) async fn finalize_order(
    db: &DBConn, issuer: &crate::pki::CaIssuer,
    order: models::Order, csr_der: Vec<u8>,
) -> super::ACMEResult<(models::Order, models::Certificate)> {
    let order = refresh_order_status(db, order).await?;

    if order.status != models::OrderStatus::Ready {
        return Err(types::error::Error {
            error_type: types::error::Type::OrderNotReady,
            status: 403,
            title: "Order not ready".to_string(),
            detail: "Not all authorizations on this order are valid".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        });
    }

    let now = Utc::now();
    let oid = order.id.clone();
    let order: models::Order = crate::try_db_result!(db.run(move |c| {
        diesel::update(schema::orders::dsl::orders.filter(schema::orders::dsl::id.eq(&oid)))
            .set((
                schema::orders::dsl::status.eq(models::OrderStatus::Processing),
                schema::orders::dsl::updated_at.eq(now),
            ))
            .get_result(c)
    }).await, "Unable to update order status: {}")?;

    let serial = new_certificate_serial()?;

    let issued = match issuer.issue(&csr_der, &order.identifier_list(), &serial) {
        Ok(v) => v,
        Err(err) => {
            // client faults roll the order back to ready, issuer faults kill it
            let next = if err.status < 500 {
                models::OrderStatus::Ready
            } else {
                models::OrderStatus::Invalid
            };
            let oid = order.id.clone();
            let rollback = Utc::now();
            crate::try_db_result!(db.run(move |c| {
                diesel::update(schema::orders::dsl::orders.filter(schema::orders::dsl::id.eq(&oid)))
                    .set((
                        schema::orders::dsl::status.eq(next),
                        schema::orders::dsl::updated_at.eq(rollback),
                    ))
                    .execute(c)
            }).await, "Unable to update order status: {}")?;
            return Err(err);
        }
    };

    let cert_id = match certificate_id_from_serial(&serial) {
        Some(v) => v,
        None => return Err(crate::internal_server_error!()),
    };
    let cert = models::Certificate {
        id: cert_id,
        order_id: order.id.clone(),
        certificate: issued.pem_chain,
        revoked: false,
        revocation_reason: None,
        revoked_at: None,
        created_at: Utc::now(),
    };

    let issued_at = Utc::now();
    let oid = order.id.clone();
    let (order, cert) = crate::try_db_result!(db.run(move |c| {
        c.transaction::<_, diesel::result::Error, _>(|c| {
            diesel::insert_into(schema::certificates::dsl::certificates)
                .values(&cert)
                .execute(c)?;
            let order: models::Order = diesel::update(schema::orders::dsl::orders.filter(schema::orders::dsl::id.eq(&oid)))
                .set((
                    schema::orders::dsl::status.eq(models::OrderStatus::Valid),
                    schema::orders::dsl::certificate_id.eq(&cert.id),
                    schema::orders::dsl::updated_at.eq(issued_at),
                ))
                .get_result(c)?;
            Ok((order, cert))
        })
    }).await, "Unable to save certificate to database: {}")?;

    Ok((order, cert))
}

/// Marks a certificate revoked with the given RFC 5280 reason code.
pub(crate) async fn revoke_certificate(
    db: &DBConn, cert: models::Certificate, reason: Option<i16>,
) -> super::ACMEResult<()> {
    if let Some(reason) = reason {
        if !(0..=10).contains(&reason) {
            return Err(types::error::Error {
                error_type: types::error::Type::BadRevocationReason,
                status: 400,
                title: "Bad revocation reason".to_string(),
                detail: format!("'{}' is not an RFC 5280 revocation reason", reason),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            });
        }
    }

    if cert.revoked {
        return Err(types::error::Error {
            error_type: types::error::Type::AlreadyRevoked,
            status: 400,
            title: "Already revoked".to_string(),
            detail: "The certificate has already been revoked".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        });
    }

    let now = Utc::now();
    crate::try_db_result!(db.run(move |c| {
        diesel::update(schema::certificates::dsl::certificates.filter(schema::certificates::dsl::id.eq(&cert.id)))
            .set((
                schema::certificates::dsl::revoked.eq(true),
                schema::certificates::dsl::revocation_reason.eq(reason),
                schema::certificates::dsl::revoked_at.eq(now),
            ))
            .execute(c)
    }).await, "Unable to revoke certificate: {}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dns(value: &str) -> types::identifier::Identifier {
        types::identifier::Identifier {
            id_type: "dns".to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn identifiers_are_lowercased_and_deduplicated_in_order() {
        let out = validate_identifiers(&[
            dns("B.Example"),
            dns("a.example"),
            dns("b.example."),
        ]).unwrap();
        assert_eq!(
            out.iter().map(|i| i.value.as_str()).collect::<Vec<_>>(),
            vec!["b.example", "a.example"]
        );
    }

    #[test]
    fn empty_identifier_list_is_malformed() {
        let err = validate_identifiers(&[]).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::Malformed);
    }

    #[test]
    fn wildcards_are_rejected() {
        let err = validate_identifiers(&[dns("*.example.com")]).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::RejectedIdentifier);
    }

    #[test]
    fn unknown_identifier_types_are_unsupported() {
        let err = validate_identifiers(&[types::identifier::Identifier {
            id_type: "email".to_string(),
            value: "a@example.com".to_string(),
        }]).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::UnsupportedIdentifier);
    }

    #[test]
    fn ip_identifiers_must_parse() {
        assert!(validate_identifiers(&[types::identifier::Identifier {
            id_type: "ip".to_string(),
            value: "192.0.2.7".to_string(),
        }]).is_ok());

        let err = validate_identifiers(&[types::identifier::Identifier {
            id_type: "ip".to_string(),
            value: "not-an-ip".to_string(),
        }]).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::RejectedIdentifier);
    }

    #[test]
    fn bad_identifiers_compound() {
        let err = validate_identifiers(&[dns("*.a.example"), types::identifier::Identifier {
            id_type: "email".to_string(),
            value: "a@example.com".to_string(),
        }]).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::Compound);
        assert_eq!(err.sub_problems.len(), 2);
    }

    #[test]
    fn pending_order_becomes_ready_when_all_authzs_valid() {
        use models::AuthorizationStatus::*;
        assert_eq!(
            pending_order_transition(&[Valid, Valid]),
            Some(models::OrderStatus::Ready)
        );
    }

    #[test]
    fn pending_order_stays_pending_with_outstanding_authzs() {
        use models::AuthorizationStatus::*;
        assert_eq!(pending_order_transition(&[Valid, Pending]), None);
        assert_eq!(pending_order_transition(&[Pending]), None);
    }

    #[test]
    fn failed_or_expired_authz_fails_the_order() {
        use models::AuthorizationStatus::*;
        assert_eq!(
            pending_order_transition(&[Valid, Invalid]),
            Some(models::OrderStatus::Invalid)
        );
        assert_eq!(
            pending_order_transition(&[Expired, Pending]),
            Some(models::OrderStatus::Invalid)
        );
        assert_eq!(
            pending_order_transition(&[Deactivated]),
            Some(models::OrderStatus::Invalid)
        );
    }

    #[test]
    fn orders_without_authzs_never_go_ready() {
        assert_eq!(pending_order_transition(&[]), None);
    }

    #[test]
    fn challenge_tokens_are_unique_with_full_entropy() {
        let now = Utc::now();
        let a = new_challenge("authz_x", models::ChallengeType::Http01, now).unwrap();
        let b = new_challenge("authz_x", models::ChallengeType::TlsAlpn01, now).unwrap();
        assert_ne!(a.token, b.token);
        assert_eq!(BASE64_URL_SAFE_NO_PAD.decode(&a.token).unwrap().len(), 16);
        assert_eq!(a.url, format!("/challenge/{}", a.token));
    }

    #[test]
    fn issued_serials_survive_der_round_trips() {
        for _ in 0..32 {
            let serial = new_certificate_serial().unwrap();
            assert_eq!(serial.len(), 16);
            assert_ne!(serial[0], 0);
            // BigNum drops leading zeros; with a nonzero first byte the
            // magnitude reproduces the id bytes exactly
            let bn = openssl::bn::BigNum::from_slice(&serial).unwrap();
            assert_eq!(bn.to_vec(), serial);
            let id = certificate_id_from_serial(&serial).unwrap();
            assert_eq!(id, format!("cert_{}", BASE64_URL_SAFE_NO_PAD.encode(&serial)));
        }
    }

    #[test]
    fn foreign_short_serial_certificate_is_rejected() {
        // a certificate from some other CA with a one-byte serial must not
        // zero-pad into our id space
        let key = openssl::pkey::PKey::from_rsa(openssl::rsa::Rsa::generate(2048).unwrap()).unwrap();
        let mut builder = openssl::x509::X509Builder::new().unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_serial_number(
            openssl::bn::BigNum::from_u32(10).unwrap().to_asn1_integer().unwrap().as_ref()
        ).unwrap();
        builder.set_not_before(openssl::asn1::Asn1Time::days_from_now(0).unwrap().as_ref()).unwrap();
        builder.set_not_after(openssl::asn1::Asn1Time::days_from_now(1).unwrap().as_ref()).unwrap();
        builder.sign(&key, openssl::hash::MessageDigest::sha256()).unwrap();
        let cert = builder.build();

        let serial = cert.serial_number().to_bn().unwrap().to_vec();
        assert_eq!(serial, vec![10]);
        assert!(certificate_id_from_serial(&serial).is_none());
    }

    #[test]
    fn malformed_serials_never_map_to_certificates() {
        assert!(certificate_id_from_serial(&[]).is_none());
        assert!(certificate_id_from_serial(&[1u8; 15]).is_none());
        assert!(certificate_id_from_serial(&[1u8; 20]).is_none());
        // a 16-byte value with a leading zero is not one we issue
        let mut zero_led = vec![1u8; 16];
        zero_led[0] = 0;
        assert!(certificate_id_from_serial(&zero_led).is_none());
    }
}
