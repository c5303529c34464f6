use crate::types;
use crate::types::jose::{JWSProtectedHeader, FlattenedJWS};
use std::convert::TryInto;
use base64::prelude::*;

const SUPPORTED_ALGS: [&str; 4] = ["ES256", "ES384", "ES512", "RS256"];

#[derive(Debug)]
pub enum JWSRequestKey {
    JWK {
        jwk: types::jose::JWK,
        key: openssl::pkey::PKey<openssl::pkey::Public>,
    },
    KID(super::Account),
}

#[derive(Debug)]
pub struct JWSRequest<R> where R: serde::de::DeserializeOwned + std::fmt::Debug {
    pub payload: Option<R>,
    pub key: JWSRequestKey,
    pub url: String,
}

async fn get_flattened_jws(
    request: &rocket::request::Request<'_>, data: rocket::data::Data<'_>,
) -> Result<FlattenedJWS, (rocket::http::Status, types::error::Error)> {
    let ct = request.headers().get_one("Content-Type").unwrap_or_default();
    if ct != "application/jose+json" {
        return Err((rocket::http::Status::BadRequest, types::error::Error {
            error_type: types::error::Type::Malformed,
            status: 400,
            title: "Invalid content type".to_string(),
            detail: format!("'{}' is not an expected body content type", ct),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        }));
    }
    let body = match data.open(1 * rocket::data::ByteUnit::MiB).into_string().await {
        Ok(v) => v,
        Err(err) => {
            return Err((rocket::http::Status::BadRequest, types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Invalid UTF8".to_string(),
                detail: format!("Invalid UTF8 received in body: '{}'", err),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            }));
        }
    };
    if !body.is_complete() {
        return Err((rocket::http::Status::BadRequest, types::error::Error {
            error_type: types::error::Type::Malformed,
            status: 400,
            title: "Body too large".to_string(),
            detail: "Request bodies are limited to 1MiB".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        }));
    }
    let jws = match serde_json::from_str::<FlattenedJWS>(&body) {
        Ok(j) => j,
        Err(err) => {
            return Err((rocket::http::Status::BadRequest, types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Invalid JWS".to_string(),
                detail: format!("Invalid JWS received in body: '{}'", err),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            }));
        }
    };

    Ok(jws)
}

pub fn start_decode_jws(
    jws: &FlattenedJWS,
) -> Result<(JWSProtectedHeader, Vec<u8>, Vec<u8>), types::error::Error> {
    let header_bytes = match BASE64_URL_SAFE_NO_PAD.decode(&jws.protected) {
        Ok(h) => h,
        Err(err) => {
            return Err(types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Invalid JWS".to_string(),
                detail: format!("Invalid JWS header: '{}'", err),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            });
        }
    };
    let signature_bytes = match BASE64_URL_SAFE_NO_PAD.decode(&jws.signature) {
        Ok(h) => h,
        Err(err) => {
            return Err(types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Invalid JWS".to_string(),
                detail: format!("Invalid JWS signature: '{}'", err),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            });
        }
    };
    let payload_bytes = match BASE64_URL_SAFE_NO_PAD.decode(&jws.payload) {
        Ok(h) => h,
        Err(err) => {
            return Err(types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Invalid JWS".to_string(),
                detail: format!("Invalid JWS payload: '{}'", err),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            });
        }
    };

    let header = match serde_json::from_slice::<types::jose::JWSProtectedHeader>(&header_bytes) {
        Ok(h) => h,
        Err(err) => {
            return Err(types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Invalid JWS".to_string(),
                detail: format!("Invalid JWS header: '{}'", err),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            });
        }
    };

    let crit_vals = header.crit.as_deref().unwrap_or_default();
    if !crit_vals.is_empty() {
        return Err(types::error::Error {
            error_type: types::error::Type::Malformed,
            status: 400,
            title: "Invalid JWS".to_string(),
            detail: format!("Unsupported critical constraints: {:?}", crit_vals),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        });
    }

    if !header.b64.unwrap_or(true) {
        return Err(types::error::Error {
            error_type: types::error::Type::Malformed,
            status: 400,
            title: "Invalid JWS".to_string(),
            detail: "Unencoded payload not supported".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        });
    }

    // The algorithm whitelist applies before any signature work happens.
    if !SUPPORTED_ALGS.contains(&header.alg.as_str()) {
        return Err(types::error::Error {
            error_type: types::error::Type::BadSignatureAlgorithm,
            status: 400,
            title: "Invalid JWS".to_string(),
            detail: format!("'{}' is not a supported algorithm", header.alg),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        });
    }

    Ok((header, payload_bytes, signature_bytes))
}

/// The URL a JWS binds itself to must match the request target: scheme is
/// ignored, hosts compare case-insensitively without the port, paths exactly.
pub(crate) fn check_request_url(jws_url: &str, req_host: &str, req_path: &str) -> Result<(), types::error::Error> {
    let mismatch = |detail: String| types::error::Error {
        error_type: types::error::Type::Malformed,
        status: 400,
        title: "Invalid URI".to_string(),
        detail,
        sub_problems: vec![],
        instance: None,
        identifier: None,
    };

    let url = match url::Url::parse(jws_url) {
        Ok(v) => v,
        Err(err) => {
            return Err(mismatch(format!("Invalid JWS URL: {}", err)));
        }
    };

    let jws_host = url.host_str().unwrap_or_default();
    let req_host = match req_host.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) => h,
        _ => req_host,
    };
    if !jws_host.eq_ignore_ascii_case(req_host) {
        return Err(mismatch(format!(
            "JWS is for host '{}' but request made to '{}'", jws_host, req_host
        )));
    }

    if url.path() != req_path {
        return Err(mismatch(format!(
            "JWS is for '{}' but request made to '{}'", url.path(), req_path
        )));
    }

    Ok(())
}

/// Extracts the account ID from a kid of the form `<base>/account/<id>`.
pub(crate) fn account_id_from_kid(kid: &str) -> Result<String, types::error::Error> {
    let bad_kid = |detail: String| types::error::Error {
        error_type: types::error::Type::Malformed,
        status: 400,
        title: "Bad kid".to_string(),
        detail,
        sub_problems: vec![],
        instance: None,
        identifier: None,
    };

    let kid_url = match url::Url::parse(kid) {
        Ok(v) => v,
        Err(err) => return Err(bad_kid(format!("Invalid kid URL format: {}", err)))
    };
    let segments = kid_url.path()
        .trim_matches('/')
        .split('/')
        .collect::<Vec<_>>();
    match segments.as_slice() {
        ["account", id] if !id.is_empty() => Ok(id.to_string()),
        _ => Err(bad_kid("Invalid kid format".to_string()))
    }
}

fn digest_for_key(
    alg: &str, key: &openssl::pkey::PKeyRef<openssl::pkey::Public>,
) -> Result<openssl::hash::MessageDigest, types::error::Error> {
    let alg_mismatch = || types::error::Error {
        error_type: types::error::Type::BadSignatureAlgorithm,
        status: 400,
        title: "Invalid JWS".to_string(),
        detail: format!("'{}' is not an appropriate algorithm for the given key", alg),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    };

    match alg {
        "RS256" => {
            if key.rsa().is_err() {
                return Err(alg_mismatch());
            }
            Ok(openssl::hash::MessageDigest::sha256())
        }
        "ES256" | "ES384" | "ES512" => {
            let curve = match key.ec_key() {
                Ok(k) => k.group().curve_name(),
                Err(_) => return Err(alg_mismatch()),
            };
            let (expected, digest) = match alg {
                "ES256" => (openssl::nid::Nid::X9_62_PRIME256V1, openssl::hash::MessageDigest::sha256()),
                "ES384" => (openssl::nid::Nid::SECP384R1, openssl::hash::MessageDigest::sha384()),
                "ES512" => (openssl::nid::Nid::SECP521R1, openssl::hash::MessageDigest::sha512()),
                _ => unreachable!()
            };
            if curve != Some(expected) {
                return Err(alg_mismatch());
            }
            Ok(digest)
        }
        _ => Err(alg_mismatch())
    }
}

/// JOSE encodes ECDSA signatures as fixed-width `r || s`; OpenSSL wants DER.
fn jose_ec_sig_to_der(sig: &[u8]) -> Result<Vec<u8>, openssl::error::ErrorStack> {
    let half = sig.len() / 2;
    let r = openssl::bn::BigNum::from_slice(&sig[..half])?;
    let s = openssl::bn::BigNum::from_slice(&sig[half..])?;
    openssl::ecdsa::EcdsaSig::from_private_components(r, s)?.to_der()
}

pub(crate) fn verify_signature_with_key(
    jws: &FlattenedJWS, header: &JWSProtectedHeader, signature_bytes: &[u8],
    key: &openssl::pkey::PKeyRef<openssl::pkey::Public>,
) -> crate::acme::ACMEResult<()> {
    let bad_signature = || types::error::Error {
        error_type: types::error::Type::Unauthorized,
        status: 401,
        title: "Invalid JWS signature".to_string(),
        detail: "The JWS signature did not verify".to_string(),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    };

    let msg_digest = digest_for_key(&header.alg, key)?;

    let signature = if key.id() == openssl::pkey::Id::EC {
        if signature_bytes.is_empty() || signature_bytes.len() % 2 != 0 {
            return Err(bad_signature());
        }
        match jose_ec_sig_to_der(signature_bytes) {
            Ok(v) => v,
            Err(_) => return Err(bad_signature())
        }
    } else {
        signature_bytes.to_vec()
    };

    let mut verifier = match openssl::sign::Verifier::new(msg_digest, key) {
        Ok(v) => v,
        Err(err) => {
            return Err(types::error::Error {
                error_type: types::error::Type::BadPublicKey,
                status: 400,
                title: "Invalid JWS".to_string(),
                detail: err.to_string(),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            });
        }
    };

    let to_verify = format!("{}.{}", jws.protected, jws.payload);
    match verifier.verify_oneshot(&signature, to_verify.as_bytes()) {
        Ok(true) => Ok(()),
        Ok(false) => Err(bad_signature()),
        Err(_) => Err(bad_signature()),
    }
}

async fn verify_jws_sig(
    jws: &FlattenedJWS, header: &JWSProtectedHeader, signature_bytes: &[u8], db: &crate::DBConn,
) -> crate::acme::ACMEResult<JWSRequestKey> {
    let key: JWSRequestKey = match &header.key {
        types::jose::JWKKey::JWK(jwk) => {
            if jwk.is_private() {
                return Err(types::error::Error {
                    error_type: types::error::Type::BadPublicKey,
                    status: 400,
                    title: "Invalid public key".to_string(),
                    detail: "The JWK encodes a private key".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                });
            }
            match jwk.try_into() {
                Ok(v) => JWSRequestKey::JWK {
                    jwk: jwk.clone(),
                    key: v,
                },
                Err(err) => {
                    return Err(types::error::Error {
                        error_type: types::error::Type::BadPublicKey,
                        status: 400,
                        title: "Invalid public key".to_string(),
                        detail: err,
                        sub_problems: vec![],
                        instance: None,
                        identifier: None,
                    });
                }
            }
        }
        types::jose::JWKKey::KID(kid) => {
            let account_id = account_id_from_kid(kid)?;
            match super::lookup_account(&account_id, db).await? {
                Some(a) => JWSRequestKey::KID(a),
                None => {
                    return Err(types::error::Error {
                        error_type: types::error::Type::AccountDoesNotExist,
                        status: 400,
                        title: "Account does not exist".to_string(),
                        detail: format!("No account can be found with the ID {}", kid),
                        sub_problems: vec![],
                        instance: None,
                        identifier: None,
                    });
                }
            }
        }
    };

    match &key {
        JWSRequestKey::JWK { key: k, .. } => verify_signature_with_key(jws, header, signature_bytes, k)?,
        JWSRequestKey::KID(a) => verify_signature_with_key(jws, header, signature_bytes, &a.key)?,
    }

    Ok(key)
}

fn decode_jws_payload<R: serde::de::DeserializeOwned>(
    payload_bytes: &[u8],
) -> Result<R, types::error::Error> {
    match serde_json::from_slice(payload_bytes) {
        Ok(v) => Ok(v),
        Err(err) => Err(types::error::Error {
            error_type: types::error::Type::Malformed,
            status: 400,
            title: "Invalid JWS".to_string(),
            detail: format!("Error decoding payload: '{}'", err),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        })
    }
}

#[rocket::async_trait]
impl<'r, R: serde::de::DeserializeOwned + std::fmt::Debug> rocket::data::FromData<'r> for JWSRequest<R> {
    type Error = types::error::Error;

    async fn from_data(request: &'r rocket::request::Request<'_>, data: rocket::data::Data<'r>) -> rocket::data::Outcome<'r, Self> {
        let base = match request.guard::<super::BaseUrl>().await {
            rocket::request::Outcome::Success(v) => v,
            rocket::request::Outcome::Error((s, e)) => {
                return rocket::data::Outcome::Error((s, e));
            }
            rocket::request::Outcome::Forward(_) => unreachable!()
        };
        let nonces = match request.guard::<&rocket::State<super::replay::SharedNonces>>().await {
            rocket::request::Outcome::Success(v) => v,
            _ => {
                return rocket::data::Outcome::Error((rocket::http::Status::InternalServerError, crate::internal_server_error!()));
            }
        };
        let db = match request.guard::<crate::DBConn>().await {
            rocket::request::Outcome::Success(v) => v,
            _ => {
                return rocket::data::Outcome::Error((rocket::http::Status::InternalServerError, crate::internal_server_error!()));
            }
        };

        let jws = match get_flattened_jws(request, data).await {
            Ok(v) => v,
            Err(e) => return rocket::data::Outcome::Error(e)
        };

        let (header, payload_bytes, signature_bytes) = match start_decode_jws(&jws) {
            Ok(v) => v,
            Err(e) => return rocket::data::Outcome::Error((rocket::http::Status::BadRequest, e))
        };

        let nonce = match &header.nonce {
            Some(v) => v,
            None => {
                return rocket::data::Outcome::Error((rocket::http::Status::BadRequest, types::error::Error {
                    error_type: types::error::Type::BadNonce,
                    status: 400,
                    title: "No nonce".to_string(),
                    detail: "A nonce must be provided".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                }));
            }
        };
        if let Err(err) = nonces.consume(nonce).await {
            return rocket::data::Outcome::Error((rocket::http::Status::BadRequest, err));
        }

        let req_host = base.0.host_str().unwrap_or_default().to_string();
        let req_host = match base.0.port() {
            Some(p) => format!("{}:{}", req_host, p),
            None => req_host,
        };
        if let Err(err) = check_request_url(&header.url, &req_host, request.uri().path().as_str()) {
            return rocket::data::Outcome::Error((rocket::http::Status::BadRequest, err));
        }

        let key = match verify_jws_sig(&jws, &header, &signature_bytes, &db).await {
            Ok(v) => v,
            Err(e) => {
                let status = rocket::http::Status::from_code(e.status).unwrap_or(rocket::http::Status::BadRequest);
                return rocket::data::Outcome::Error((status, e));
            }
        };

        let payload = if !payload_bytes.is_empty() {
            match decode_jws_payload(&payload_bytes) {
                Ok(v) => Some(v),
                Err(e) => return rocket::data::Outcome::Error((rocket::http::Status::BadRequest, e))
            }
        } else {
            None
        };

        rocket::data::Outcome::Success(JWSRequest {
            payload,
            key,
            url: header.url,
        })
    }
}

/// RFC 7638 thumbprint: required members only, lexicographic order, SHA-256.
pub fn make_jwk_thumbprint(jwk: &types::jose::JWK) -> String {
    let jwk = types::jose::JWK {
        kty: jwk.kty.clone(),
        alg: None,
        kid: None,
        params: jwk.params.clone(),
    };
    let jwk = serde_json::to_string(&jwk).unwrap();
    let jwk: std::collections::BTreeMap<String, serde_json::Value> = serde_json::from_str(&jwk).unwrap();
    let jwk = serde_json::to_string(&jwk).unwrap();
    let thumbprint_bytes = openssl::hash::hash(openssl::hash::MessageDigest::sha256(), jwk.as_bytes()).unwrap().to_vec();
    BASE64_URL_SAFE_NO_PAD.encode(thumbprint_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    fn ec_keypair() -> (openssl::pkey::PKey<openssl::pkey::Private>, openssl::pkey::PKey<openssl::pkey::Public>) {
        let group = openssl::ec::EcGroup::from_curve_name(openssl::nid::Nid::X9_62_PRIME256V1).unwrap();
        let ec = openssl::ec::EcKey::generate(&group).unwrap();
        let private = openssl::pkey::PKey::from_ec_key(ec.clone()).unwrap();
        let public = openssl::pkey::PKey::from_ec_key(
            openssl::ec::EcKey::from_public_key(&group, ec.public_key()).unwrap()
        ).unwrap();
        (private, public)
    }

    fn signed_jws(
        alg: &str, url: &str, payload: &[u8],
        private: &openssl::pkey::PKey<openssl::pkey::Private>,
        jwk: &types::jose::JWK,
    ) -> FlattenedJWS {
        let header = serde_json::json!({
            "alg": alg,
            "nonce": "dGVzdC1ub25jZQ",
            "url": url,
            "jwk": serde_json::to_value(jwk).unwrap(),
        });
        let protected = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
        let payload = BASE64_URL_SAFE_NO_PAD.encode(payload);
        let to_sign = format!("{}.{}", protected, payload);

        let digest = match alg {
            "ES256" | "RS256" => openssl::hash::MessageDigest::sha256(),
            "ES384" => openssl::hash::MessageDigest::sha384(),
            _ => openssl::hash::MessageDigest::sha512(),
        };
        let mut signer = openssl::sign::Signer::new(digest, private).unwrap();
        signer.update(to_sign.as_bytes()).unwrap();
        let mut sig = signer.sign_to_vec().unwrap();

        if private.id() == openssl::pkey::Id::EC {
            // re-encode DER to fixed-width JOSE r||s
            let der = openssl::ecdsa::EcdsaSig::from_der(&sig).unwrap();
            let width = 32;
            let mut jose = vec![0u8; width * 2];
            let r = der.r().to_vec();
            let s = der.s().to_vec();
            jose[width - r.len()..width].copy_from_slice(&r);
            jose[2 * width - s.len()..].copy_from_slice(&s);
            sig = jose;
        }

        FlattenedJWS {
            protected,
            payload,
            signature: BASE64_URL_SAFE_NO_PAD.encode(sig),
        }
    }

    fn public_jwk(public: &openssl::pkey::PKey<openssl::pkey::Public>) -> types::jose::JWK {
        types::jose::JWK::try_from(public).unwrap()
    }

    #[test]
    fn es256_signature_verifies() {
        let (private, public) = ec_keypair();
        let jwk = public_jwk(&public);
        let jws = signed_jws("ES256", "https://ca.example/new-account", b"{}", &private, &jwk);

        let (header, _, sig) = start_decode_jws(&jws).unwrap();
        assert!(verify_signature_with_key(&jws, &header, &sig, &public).is_ok());
    }

    #[test]
    fn tampered_payload_is_unauthorized() {
        let (private, public) = ec_keypair();
        let jwk = public_jwk(&public);
        let mut jws = signed_jws("ES256", "https://ca.example/new-account", b"{}", &private, &jwk);
        jws.payload = BASE64_URL_SAFE_NO_PAD.encode(b"{\"evil\":true}");

        let (header, _, sig) = start_decode_jws(&jws).unwrap();
        let err = verify_signature_with_key(&jws, &header, &sig, &public).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::Unauthorized);
        assert_eq!(err.status, 401);
    }

    #[test]
    fn rs256_signature_verifies() {
        let rsa = openssl::rsa::Rsa::generate(2048).unwrap();
        let private = openssl::pkey::PKey::from_rsa(rsa.clone()).unwrap();
        let public = openssl::pkey::PKey::from_rsa(
            openssl::rsa::Rsa::from_public_components(
                rsa.n().to_owned().unwrap(), rsa.e().to_owned().unwrap()
            ).unwrap()
        ).unwrap();
        let jwk = public_jwk(&public);
        let jws = signed_jws("RS256", "https://ca.example/new-account", b"{}", &private, &jwk);

        let (header, _, sig) = start_decode_jws(&jws).unwrap();
        assert!(verify_signature_with_key(&jws, &header, &sig, &public).is_ok());
    }

    #[test]
    fn alg_none_is_rejected_before_verification() {
        let header = serde_json::json!({
            "alg": "none",
            "nonce": "bm9uY2U",
            "url": "https://ca.example/new-account",
            "jwk": {"kty": "RSA", "n": "AQAB", "e": "AQAB"},
        });
        let jws = FlattenedJWS {
            protected: BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap()),
            payload: String::new(),
            signature: String::new(),
        };
        let err = start_decode_jws(&jws).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::BadSignatureAlgorithm);
    }

    #[test]
    fn unlisted_algorithms_are_rejected() {
        for alg in ["RS384", "RS512", "HS256", "EdDSA"] {
            let header = serde_json::json!({
                "alg": alg,
                "nonce": "bm9uY2U",
                "url": "https://ca.example/new-account",
                "jwk": {"kty": "RSA", "n": "AQAB", "e": "AQAB"},
            });
            let jws = FlattenedJWS {
                protected: BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap()),
                payload: String::new(),
                signature: String::new(),
            };
            let err = start_decode_jws(&jws).unwrap_err();
            assert_eq!(err.error_type, types::error::Type::BadSignatureAlgorithm);
        }
    }

    #[test]
    fn alg_must_match_key_type() {
        let (private, public) = ec_keypair();
        let jwk = public_jwk(&public);
        // ES384 header over a P-256 key
        let jws = signed_jws("ES384", "https://ca.example/new-account", b"{}", &private, &jwk);
        let (header, _, sig) = start_decode_jws(&jws).unwrap();
        let err = verify_signature_with_key(&jws, &header, &sig, &public).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::BadSignatureAlgorithm);
    }

    #[test]
    fn url_binding_matches_host_case_insensitively_without_port() {
        assert!(check_request_url("https://CA.Example:8443/new-order", "ca.example:8443", "/new-order").is_ok());
        assert!(check_request_url("https://ca.example/new-order", "ca.example", "/new-order").is_ok());

        let err = check_request_url("https://other.example/new-order", "ca.example", "/new-order").unwrap_err();
        assert_eq!(err.error_type, types::error::Type::Malformed);
    }

    #[test]
    fn url_binding_requires_exact_path() {
        let err = check_request_url("https://ca.example/new-account", "ca.example", "/new-order").unwrap_err();
        assert_eq!(err.error_type, types::error::Type::Malformed);
    }

    #[test]
    fn kid_parses_account_urls_only() {
        assert_eq!(
            account_id_from_kid("https://ca.example/account/acct_abc").unwrap(),
            "acct_abc"
        );
        assert!(account_id_from_kid("https://ca.example/order/order_abc").is_err());
        assert!(account_id_from_kid("not a url").is_err());
        assert!(account_id_from_kid("https://ca.example/account/").is_err());
    }

    #[test]
    fn thumbprint_matches_rfc7638_vector() {
        let jwk: types::jose::JWK = serde_json::from_str(r#"{
            "kty": "RSA",
            "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
            "e": "AQAB",
            "alg": "RS256",
            "kid": "2011-04-29"
        }"#).unwrap();
        assert_eq!(
            make_jwk_thumbprint(&jwk),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }
}
