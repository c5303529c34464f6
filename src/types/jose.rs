use std::convert::TryFrom;
use base64::prelude::*;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FlattenedJWS {
    pub payload: String,
    pub protected: String,
    pub signature: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct JWSProtectedHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,
    #[serde(flatten)]
    pub key: JWKKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize)]
pub enum JWKKey {
    #[serde(rename = "kid")]
    KID(String),
    #[serde(rename = "jwk")]
    JWK(JWK)
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JWK {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(flatten)]
    pub params: JWKType
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum JWKType {
    EC {
        crv: String,
        x: String,
        y: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        d: Option<String>,
    },
    RSA {
        n: String,
        e: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        d: Option<String>,
    },
}

impl JWK {
    /// An ACME request must never embed private key material.
    pub fn is_private(&self) -> bool {
        match &self.params {
            JWKType::EC { d, .. } => d.is_some(),
            JWKType::RSA { d, .. } => d.is_some(),
        }
    }
}

impl TryFrom<&openssl::pkey::PKey<openssl::pkey::Public>> for JWK {
    type Error = String;

    fn try_from(from: &openssl::pkey::PKey<openssl::pkey::Public>) -> Result<Self, Self::Error> {
        let (kty, params) = match from.id() {
            openssl::pkey::Id::EC => {
                let ec_key = from.ec_key().unwrap();

                let crv = match ec_key.group().curve_name() {
                    Some(openssl::nid::Nid::X9_62_PRIME256V1) => "P-256",
                    Some(openssl::nid::Nid::SECP384R1) => "P-384",
                    Some(openssl::nid::Nid::SECP521R1) => "P-521",
                    _ => return Err("Unknown curve".to_string()),
                }.to_string();

                let pubkey = ec_key.public_key();
                let mut ctx = openssl::bn::BigNumContext::new().unwrap();
                let mut x = openssl::bn::BigNum::new().unwrap();
                let mut y = openssl::bn::BigNum::new().unwrap();
                pubkey.affine_coordinates_gfp(ec_key.group(), &mut x, &mut y, &mut ctx).unwrap();

                ("EC", JWKType::EC {
                    crv,
                    x: BASE64_URL_SAFE_NO_PAD.encode(x.to_vec()),
                    y: BASE64_URL_SAFE_NO_PAD.encode(y.to_vec()),
                    d: None,
                })
            },
            openssl::pkey::Id::RSA => {
                let rsa_key = from.rsa().unwrap();

                ("RSA", JWKType::RSA {
                    n: BASE64_URL_SAFE_NO_PAD.encode(rsa_key.n().to_vec()),
                    e: BASE64_URL_SAFE_NO_PAD.encode(rsa_key.e().to_vec()),
                    d: None,
                })
            },
            _ => return Err("Unsupported key type".to_string())
        };

        Ok(JWK {
            kty: kty.to_string(),
            params,
            kid: None,
            alg: None
        })
    }
}

impl TryFrom<&JWK> for openssl::pkey::PKey<openssl::pkey::Public> {
    type Error = String;

    fn try_from(from: &JWK) -> Result<Self, Self::Error> {
        match from.kty.as_str() {
            "EC" => {
                match &from.params {
                    JWKType::EC { crv, x, y, d: _ } => {
                        let ec_group = match crv.as_str() {
                            "P-256" => openssl::ec::EcGroup::from_curve_name(openssl::nid::Nid::X9_62_PRIME256V1).unwrap(),
                            "P-384" => openssl::ec::EcGroup::from_curve_name(openssl::nid::Nid::SECP384R1).unwrap(),
                            "P-521" => openssl::ec::EcGroup::from_curve_name(openssl::nid::Nid::SECP521R1).unwrap(),
                            o => return Err(format!("'{}' is not a supported curve", o))
                        };
                        let x = match BASE64_URL_SAFE_NO_PAD.decode(x) {
                            Ok(v) => v,
                            Err(err) => return Err(format!("Invalid x parameter: {}", err))
                        };
                        let y = match BASE64_URL_SAFE_NO_PAD.decode(y) {
                            Ok(v) => v,
                            Err(err) => return Err(format!("Invalid y parameter: {}", err))
                        };
                        let x = match openssl::bn::BigNum::from_slice(&x) {
                            Ok(v) => v,
                            Err(err) => return Err(format!("Invalid x parameter: {}", err))
                        };
                        let y = match openssl::bn::BigNum::from_slice(&y) {
                            Ok(v) => v,
                            Err(err) => return Err(format!("Invalid y parameter: {}", err))
                        };
                        let key = match openssl::ec::EcKey::from_public_key_affine_coordinates(&ec_group, &x, &y) {
                            Ok(v) => v,
                            Err(err) => return Err(format!("Invalid public key: {}", err))
                        };
                        Ok(openssl::pkey::PKey::from_ec_key(key).unwrap())
                    },
                    _ => Err("Invalid key parameters".to_string())
                }
            },
            "RSA" => match &from.params {
                JWKType::RSA { n, e, d: _ } => {
                    let n = match BASE64_URL_SAFE_NO_PAD.decode(n) {
                        Ok(v) => v,
                        Err(err) => return Err(format!("Invalid n parameter: {}", err))
                    };
                    let e = match BASE64_URL_SAFE_NO_PAD.decode(e) {
                        Ok(v) => v,
                        Err(err) => return Err(format!("Invalid e parameter: {}", err))
                    };
                    let n = match openssl::bn::BigNum::from_slice(&n) {
                        Ok(v) => v,
                        Err(err) => return Err(format!("Invalid n parameter: {}", err))
                    };
                    let e = match openssl::bn::BigNum::from_slice(&e) {
                        Ok(v) => v,
                        Err(err) => return Err(format!("Invalid e parameter: {}", err))
                    };
                    let key = match openssl::rsa::Rsa::from_public_components(n, e) {
                        Ok(v) => v,
                        Err(err) => return Err(format!("Invalid public key: {}", err))
                    };
                    Ok(openssl::pkey::PKey::from_rsa(key).unwrap())
                },
                _ => Err("Invalid key parameters".to_string())
            },
            o => Err(format!("'{}' is not a supported key type", o))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryInto;

    #[test]
    fn p256_key_round_trips_through_jwk() {
        let group = openssl::ec::EcGroup::from_curve_name(openssl::nid::Nid::X9_62_PRIME256V1).unwrap();
        let ec = openssl::ec::EcKey::generate(&group).unwrap();
        let pkey = openssl::pkey::PKey::from_ec_key(
            openssl::ec::EcKey::from_public_key(&group, ec.public_key()).unwrap()
        ).unwrap();

        let jwk: JWK = (&pkey).try_into().unwrap();
        assert_eq!(jwk.kty, "EC");
        assert!(!jwk.is_private());
        match &jwk.params {
            JWKType::EC { crv, .. } => assert_eq!(crv, "P-256"),
            _ => panic!("expected EC params"),
        }

        let back: openssl::pkey::PKey<openssl::pkey::Public> = (&jwk).try_into().unwrap();
        assert!(pkey.public_eq(&back));
    }

    #[test]
    fn rsa_key_round_trips_through_jwk() {
        let rsa = openssl::rsa::Rsa::generate(2048).unwrap();
        let pkey = openssl::pkey::PKey::from_rsa(
            openssl::rsa::Rsa::from_public_components(
                rsa.n().to_owned().unwrap(), rsa.e().to_owned().unwrap()
            ).unwrap()
        ).unwrap();

        let jwk: JWK = (&pkey).try_into().unwrap();
        assert_eq!(jwk.kty, "RSA");
        let back: openssl::pkey::PKey<openssl::pkey::Public> = (&jwk).try_into().unwrap();
        assert!(pkey.public_eq(&back));
    }

    #[test]
    fn private_components_are_detected() {
        let jwk: JWK = serde_json::from_str(
            r#"{"kty":"RSA","n":"AQAB","e":"AQAB","d":"c2VjcmV0"}"#
        ).unwrap();
        assert!(jwk.is_private());
    }

    #[test]
    fn header_rejects_both_kid_and_jwk() {
        let header = serde_json::from_str::<JWSProtectedHeader>(
            r#"{"alg":"ES256","nonce":"n","url":"https://ca.example/new-order",
                "kid":"https://ca.example/account/acct_1",
                "jwk":{"kty":"RSA","n":"AQAB","e":"AQAB"}}"#
        );
        assert!(header.is_err());
    }

    #[test]
    fn header_requires_a_key_reference() {
        let header = serde_json::from_str::<JWSProtectedHeader>(
            r#"{"alg":"ES256","nonce":"n","url":"https://ca.example/new-order"}"#
        );
        assert!(header.is_err());
    }
}
