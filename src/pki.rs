use chrono::prelude::*;
use x509_parser::prelude::FromDer;

/// How long issued leaves live. Advisory notBefore/notAfter from orders are
/// clamped to this fixed window.
const LEAF_VALIDITY_DAYS: i64 = 365;

#[derive(Debug)]
pub enum CaLoadError {
    Read(String, std::io::Error),
    Parse(String, openssl::error::ErrorStack),
}

impl std::fmt::Display for CaLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaLoadError::Read(path, err) => write!(f, "unable to read '{}': {}", path, err),
            CaLoadError::Parse(path, err) => write!(f, "unable to parse '{}': {}", path, err),
        }
    }
}

#[derive(Debug)]
pub struct IssuedCertificate {
    /// Leaf PEM followed by the CA chain PEM.
    pub pem_chain: String,
}

/// In-process certificate issuer. CA material is loaded once at boot and held
/// for the process's lifetime.
pub struct CaIssuer {
    ca_cert: openssl::x509::X509,
    ca_key: openssl::pkey::PKey<openssl::pkey::Private>,
    chain_pem: String,
}

fn bad_csr(detail: String) -> crate::types::error::Error {
    crate::types::error::Error {
        error_type: crate::types::error::Type::BadCSR,
        status: 400,
        title: "Bad CSR".to_string(),
        detail,
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }
}

struct CsrIdentifiers {
    dns: Vec<String>,
    ips: Vec<std::net::IpAddr>,
}

/// Pulls the identifier set out of a CSR: SubjectAltName entries plus any
/// Subject CN values.
fn collect_csr_identifiers(
    csr_der: &[u8], req: &openssl::x509::X509Req,
) -> Result<CsrIdentifiers, crate::types::error::Error> {
    let (_, csr) = x509_parser::certification_request::X509CertificationRequest::from_der(csr_der)
        .map_err(|err| bad_csr(format!("CSR could not be parsed: {}", err)))?;

    let mut dns = vec![];
    let mut ips = vec![];

    if let Some(extensions) = csr.requested_extensions() {
        for extension in extensions {
            if let x509_parser::extensions::ParsedExtension::SubjectAlternativeName(san) = extension {
                for general in &san.general_names {
                    match general {
                        x509_parser::extensions::GeneralName::DNSName(value) => {
                            dns.push(value.trim_end_matches('.').to_ascii_lowercase());
                        }
                        x509_parser::extensions::GeneralName::IPAddress(raw) => {
                            let ip: std::net::IpAddr = match raw.len() {
                                4 => std::net::Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3]).into(),
                                16 => {
                                    let mut buf = [0u8; 16];
                                    buf.copy_from_slice(raw);
                                    std::net::Ipv6Addr::from(buf).into()
                                }
                                _ => return Err(bad_csr(
                                    "CSR SubjectAltName IPAddress must be 4 or 16 bytes".to_string()
                                )),
                            };
                            ips.push(ip);
                        }
                        _ => {
                            return Err(bad_csr("CSR contains an unsupported SubjectAltName entry".to_string()));
                        }
                    }
                }
            }
        }
    }

    for entry in req.subject_name().entries_by_nid(openssl::nid::Nid::COMMONNAME) {
        match entry.data().as_utf8() {
            Ok(cn) => dns.push(cn.trim_end_matches('.').to_ascii_lowercase()),
            Err(_) => return Err(bad_csr("CSR subject CN is not valid UTF-8".to_string())),
        }
    }

    if dns.is_empty() && ips.is_empty() {
        return Err(bad_csr("CSR names no identifiers".to_string()));
    }

    Ok(CsrIdentifiers { dns, ips })
}

/// Every identifier the CSR asks for must be part of the authorized order.
fn check_identifier_containment(
    csr_ids: &CsrIdentifiers, order_ids: &[crate::types::identifier::Identifier],
) -> Result<(), crate::types::error::Error> {
    let order_dns: Vec<&str> = order_ids.iter()
        .filter(|i| i.id_type == "dns")
        .map(|i| i.value.as_str())
        .collect();
    let order_ips: Vec<std::net::IpAddr> = order_ids.iter()
        .filter(|i| i.id_type == "ip")
        .filter_map(|i| i.value.parse().ok())
        .collect();

    for name in &csr_ids.dns {
        if !order_dns.contains(&name.as_str()) {
            return Err(bad_csr(format!("'{}' is not an identifier on this order", name)));
        }
    }
    for ip in &csr_ids.ips {
        if !order_ips.contains(ip) {
            return Err(bad_csr(format!("'{}' is not an identifier on this order", ip)));
        }
    }

    Ok(())
}

impl CaIssuer {
    pub fn from_files(cert_file: &str, key_file: &str) -> Result<Self, CaLoadError> {
        let cert_pem = std::fs::read(cert_file)
            .map_err(|e| CaLoadError::Read(cert_file.to_string(), e))?;
        let ca_cert = openssl::x509::X509::from_pem(&cert_pem)
            .map_err(|e| CaLoadError::Parse(cert_file.to_string(), e))?;

        let key_pem = std::fs::read(key_file)
            .map_err(|e| CaLoadError::Read(key_file.to_string(), e))?;
        // PKey::private_key_from_pem understands both PKCS#1 and PKCS#8
        let ca_key = openssl::pkey::PKey::private_key_from_pem(&key_pem)
            .map_err(|e| CaLoadError::Parse(key_file.to_string(), e))?;

        Ok(CaIssuer {
            ca_cert,
            ca_key,
            chain_pem: String::from_utf8_lossy(&cert_pem).to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        ca_cert: openssl::x509::X509, ca_key: openssl::pkey::PKey<openssl::pkey::Private>,
    ) -> Self {
        let chain_pem = String::from_utf8(ca_cert.to_pem().unwrap()).unwrap();
        CaIssuer { ca_cert, ca_key, chain_pem }
    }

    /// Validates a finalize CSR against the order's identifiers and signs a
    /// one-year leaf. `serial` doubles as the certificate row ID's random
    /// bytes, so it is drawn from a CSPRNG by the caller.
    pub fn issue(
        &self, csr_der: &[u8], order_identifiers: &[crate::types::identifier::Identifier],
        serial: &[u8],
    ) -> crate::acme::ACMEResult<IssuedCertificate> {
        let req = match openssl::x509::X509Req::from_der(csr_der) {
            Ok(r) => r,
            Err(_) => {
                return Err(crate::types::error::Error {
                    error_type: crate::types::error::Type::Malformed,
                    status: 400,
                    title: "Bad CSR".to_string(),
                    detail: "Un-parsable CSR".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                });
            }
        };

        let public_key = req.public_key()
            .map_err(|_| bad_csr("CSR contains an invalid public key".to_string()))?;
        if !req.verify(&public_key)
            .map_err(|_| bad_csr("CSR signature could not be verified".to_string()))? {
            return Err(bad_csr("CSR not signed by its own public key".to_string()));
        }

        let csr_ids = collect_csr_identifiers(csr_der, &req)?;
        check_identifier_containment(&csr_ids, order_identifiers)?;

        self.build_leaf(&req, &csr_ids, serial).map_err(|err| {
            error!("Failed to build certificate: {}", err);
            crate::internal_server_error!()
        })
    }

    fn build_leaf(
        &self, req: &openssl::x509::X509Req, csr_ids: &CsrIdentifiers, serial: &[u8],
    ) -> Result<IssuedCertificate, openssl::error::ErrorStack> {
        let now = Utc::now();
        let expiry = now + chrono::Duration::days(LEAF_VALIDITY_DAYS);

        let mut builder = openssl::x509::X509Builder::new()?;
        builder.set_version(2)?;
        builder.set_pubkey(req.public_key()?.as_ref())?;
        builder.set_serial_number(
            openssl::bn::BigNum::from_slice(serial)?.to_asn1_integer()?.as_ref()
        )?;
        builder.set_not_before(openssl::asn1::Asn1Time::from_unix(now.timestamp())?.as_ref())?;
        builder.set_not_after(openssl::asn1::Asn1Time::from_unix(expiry.timestamp())?.as_ref())?;
        builder.set_subject_name(req.subject_name())?;
        builder.set_issuer_name(self.ca_cert.subject_name())?;

        let mut bc = openssl::x509::extension::BasicConstraints::new();
        bc.critical();
        builder.append_extension(bc.build()?)?;

        let mut ku = openssl::x509::extension::KeyUsage::new();
        ku.critical();
        ku.digital_signature();
        ku.key_encipherment();
        builder.append_extension(ku.build()?)?;

        let mut eku = openssl::x509::extension::ExtendedKeyUsage::new();
        eku.server_auth();
        builder.append_extension(eku.build()?)?;

        if !csr_ids.dns.is_empty() || !csr_ids.ips.is_empty() {
            let mut san = openssl::x509::extension::SubjectAlternativeName::new();
            for name in &csr_ids.dns {
                san.dns(name);
            }
            for ip in &csr_ids.ips {
                san.ip(&ip.to_string());
            }
            let context = builder.x509v3_context(Some(&self.ca_cert), None);
            let san = san.build(&context)?;
            builder.append_extension(san)?;
        }

        builder.sign(&self.ca_key, openssl::hash::MessageDigest::sha256())?;
        let leaf = builder.build();

        let mut pem_chain = String::from_utf8_lossy(&leaf.to_pem()?).to_string();
        pem_chain.push_str(&self.chain_pem);

        Ok(IssuedCertificate { pem_chain })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ca() -> CaIssuer {
        let key = openssl::pkey::PKey::from_rsa(openssl::rsa::Rsa::generate(2048).unwrap()).unwrap();

        let mut name = openssl::x509::X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "Hagall Test CA").unwrap();
        let name = name.build();

        let mut builder = openssl::x509::X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_serial_number(
            openssl::bn::BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap().as_ref()
        ).unwrap();
        builder.set_not_before(openssl::asn1::Asn1Time::days_from_now(0).unwrap().as_ref()).unwrap();
        builder.set_not_after(openssl::asn1::Asn1Time::days_from_now(3650).unwrap().as_ref()).unwrap();
        let mut bc = openssl::x509::extension::BasicConstraints::new();
        bc.critical();
        bc.ca();
        builder.append_extension(bc.build().unwrap()).unwrap();
        builder.sign(&key, openssl::hash::MessageDigest::sha256()).unwrap();

        CaIssuer::from_parts(builder.build(), key)
    }

    fn test_csr(names: &[&str]) -> Vec<u8> {
        let key = openssl::pkey::PKey::from_rsa(openssl::rsa::Rsa::generate(2048).unwrap()).unwrap();
        csr_for_key(&key, names)
    }

    fn csr_for_key(key: &openssl::pkey::PKey<openssl::pkey::Private>, names: &[&str]) -> Vec<u8> {
        let mut builder = openssl::x509::X509ReqBuilder::new().unwrap();
        builder.set_pubkey(key).unwrap();

        let mut san = openssl::x509::extension::SubjectAlternativeName::new();
        for name in names {
            san.dns(name);
        }
        let san = san.build(&builder.x509v3_context(None)).unwrap();
        let mut extensions = openssl::stack::Stack::new().unwrap();
        extensions.push(san).unwrap();
        builder.add_extensions(&extensions).unwrap();

        builder.sign(key, openssl::hash::MessageDigest::sha256()).unwrap();
        builder.build().to_der().unwrap()
    }

    fn dns_id(value: &str) -> crate::types::identifier::Identifier {
        crate::types::identifier::Identifier {
            id_type: "dns".to_string(),
            value: value.to_string(),
        }
    }

    fn fresh_serial() -> Vec<u8> {
        let mut serial = vec![0u8; 16];
        openssl::rand::rand_bytes(&mut serial).unwrap();
        serial
    }

    #[test]
    fn issues_leaf_with_csr_sans() {
        let ca = test_ca();
        let csr = test_csr(&["test.example"]);
        let serial = fresh_serial();

        let issued = ca.issue(&csr, &[dns_id("test.example")], &serial).unwrap();
        assert!(issued.pem_chain.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(issued.pem_chain.matches("-----BEGIN CERTIFICATE-----").count(), 2);

        let leaf = openssl::x509::X509::from_pem(issued.pem_chain.as_bytes()).unwrap();
        let sans: Vec<String> = leaf.subject_alt_names().unwrap().iter()
            .filter_map(|n| n.dnsname().map(|d| d.to_string()))
            .collect();
        assert_eq!(sans, vec!["test.example".to_string()]);

        let got_serial = leaf.serial_number().to_bn().unwrap().to_vec();
        let mut expected = serial.clone();
        while expected.first() == Some(&0) {
            expected.remove(0);
        }
        assert_eq!(got_serial, expected);
    }

    #[test]
    fn leaf_is_valid_for_one_year() {
        let ca = test_ca();
        let csr = test_csr(&["test.example"]);
        let issued = ca.issue(&csr, &[dns_id("test.example")], &fresh_serial()).unwrap();
        let leaf = openssl::x509::X509::from_pem(issued.pem_chain.as_bytes()).unwrap();

        let not_before = leaf.not_before();
        let one_year = openssl::asn1::Asn1Time::days_from_now(365).unwrap();
        let diff = one_year.diff(leaf.not_after()).unwrap();
        assert_eq!(diff.days, 0);
        assert!(openssl::asn1::Asn1Time::days_from_now(0).unwrap().diff(not_before).unwrap().days == 0);
    }

    #[test]
    fn csr_outside_order_identifiers_is_rejected() {
        let ca = test_ca();
        let csr = test_csr(&["b.example"]);
        let err = ca.issue(&csr, &[dns_id("a.example")], &fresh_serial()).unwrap_err();
        assert_eq!(err.error_type, crate::types::error::Type::BadCSR);
    }

    #[test]
    fn csr_subset_of_order_identifiers_is_accepted() {
        let ca = test_ca();
        let csr = test_csr(&["a.example"]);
        assert!(ca.issue(
            &csr, &[dns_id("a.example"), dns_id("b.example")], &fresh_serial()
        ).is_ok());
    }

    #[test]
    fn csr_signed_by_other_key_is_rejected() {
        let ca = test_ca();
        let signer = openssl::pkey::PKey::from_rsa(openssl::rsa::Rsa::generate(2048).unwrap()).unwrap();
        let other = openssl::pkey::PKey::from_rsa(openssl::rsa::Rsa::generate(2048).unwrap()).unwrap();

        // build a CSR whose pubkey and signing key disagree
        let mut builder = openssl::x509::X509ReqBuilder::new().unwrap();
        builder.set_pubkey(&other).unwrap();
        let mut san = openssl::x509::extension::SubjectAlternativeName::new();
        san.dns("a.example");
        let san = san.build(&builder.x509v3_context(None)).unwrap();
        let mut extensions = openssl::stack::Stack::new().unwrap();
        extensions.push(san).unwrap();
        builder.add_extensions(&extensions).unwrap();
        builder.sign(&signer, openssl::hash::MessageDigest::sha256()).unwrap();
        let csr = builder.build().to_der().unwrap();

        let err = ca.issue(&csr, &[dns_id("a.example")], &fresh_serial()).unwrap_err();
        assert_eq!(err.error_type, crate::types::error::Type::BadCSR);
    }

    #[test]
    fn garbage_csr_is_malformed() {
        let ca = test_ca();
        let err = ca.issue(b"not a csr", &[dns_id("a.example")], &fresh_serial()).unwrap_err();
        assert_eq!(err.error_type, crate::types::error::Type::Malformed);
    }

    #[test]
    fn leaf_has_server_auth_extended_key_usage() {
        let ca = test_ca();
        let csr = test_csr(&["test.example"]);
        let issued = ca.issue(&csr, &[dns_id("test.example")], &fresh_serial()).unwrap();
        let leaf_der = openssl::x509::X509::from_pem(issued.pem_chain.as_bytes()).unwrap().to_der().unwrap();
        let (_, leaf) = x509_parser::parse_x509_certificate(&leaf_der).unwrap();
        let eku = leaf.extended_key_usage().unwrap().unwrap();
        assert!(eku.value.server_auth);
        let ku = leaf.key_usage().unwrap().unwrap();
        assert!(ku.value.digital_signature());
        assert!(ku.value.key_encipherment());
    }
}
