use base64::prelude::*;

pub fn uuid_as_b64(uuid: &uuid::Uuid) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(uuid.as_bytes())
}

/// Makes an opaque, prefix-tagged entity ID such as `order_yaFHhTM5TdC_EeodlQnBXg`.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid_as_b64(&uuid::Uuid::new_v4()))
}

pub fn rand_b64(len: usize) -> Result<String, openssl::error::ErrorStack> {
    let mut buf = vec![0; len];
    openssl::rand::rand_bytes(&mut buf)?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(&buf))
}

pub fn error_list_to_result<D: Into<Option<String>>>(
    mut errors: Vec<crate::types::error::Error>, compound_detail: D
) -> Result<(), crate::types::error::Error> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.pop().unwrap()),
        _ => Err(crate::types::error::Error {
            error_type: crate::types::error::Type::Compound,
            status: 400,
            title: "Compound errors".to_string(),
            detail: match compound_detail.into() {
                Some(d) => d,
                None => "Multiple errors make this request invalid".to_string(),
            },
            sub_problems: errors,
            instance: None,
            identifier: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix_and_unique_suffix() {
        let a = new_id("acct");
        let b = new_id("acct");
        assert!(a.starts_with("acct_"));
        assert_ne!(a, b);
        assert_eq!(a.len(), "acct_".len() + 22);
    }

    #[test]
    fn rand_b64_is_unpadded_url_safe() {
        let tok = rand_b64(16).unwrap();
        assert_eq!(BASE64_URL_SAFE_NO_PAD.decode(&tok).unwrap().len(), 16);
        assert!(!tok.contains('='));
        assert!(!tok.contains('+'));
        assert!(!tok.contains('/'));
    }

    #[test]
    fn single_error_passes_through_unwrapped() {
        let err = crate::types::error::Error {
            error_type: crate::types::error::Type::Malformed,
            status: 400,
            title: "Bad".to_string(),
            detail: "bad".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        };
        let err = error_list_to_result(vec![err], None::<String>).unwrap_err();
        assert!(err.sub_problems.is_empty());
        assert_eq!(err.status, 400);
    }

    #[test]
    fn multiple_errors_become_compound() {
        let mk = || crate::types::error::Error {
            error_type: crate::types::error::Type::Malformed,
            status: 400,
            title: "Bad".to_string(),
            detail: "bad".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        };
        let err = error_list_to_result(vec![mk(), mk()], "several".to_string()).unwrap_err();
        assert_eq!(err.sub_problems.len(), 2);
        assert_eq!(err.detail, "several");
    }
}
