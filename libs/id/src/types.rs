//! Typed IDs.

use crate::define_id;

// Tags one install request emitted while describing a deployment.
define_id!(RequestId, "req");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdError;

    #[test]
    fn test_request_id_roundtrip() {
        let id = RequestId::new();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with("req_"));
    }

    #[test]
    fn test_request_id_wrong_prefix() {
        let err = "app_01HV4Z2WQXKJNM8GPQY6VBKC3D"
            .parse::<RequestId>()
            .unwrap_err();
        assert!(matches!(err, IdError::WrongTypePrefix { expected: "req", .. }));
    }

    #[test]
    fn test_request_id_missing_separator() {
        let err = "req01HV4Z2WQXKJNM8GPQY6VBKC3D"
            .parse::<RequestId>()
            .unwrap_err();
        assert_eq!(err, IdError::MissingSeparator);
    }

    #[test]
    fn test_request_id_empty_and_bad_ulid() {
        assert!("".parse::<RequestId>().unwrap_err().is_empty());
        assert!(matches!(
            "req_nope".parse::<RequestId>(),
            Err(IdError::InvalidUlid(_))
        ));
    }

    #[test]
    fn test_request_id_json() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_request_id_short() {
        let id = RequestId::from_ulid(crate::Ulid::from_string("01HV4Z2WQXKJNM8GPQY6VBKC3D").unwrap());
        assert_eq!(id.short(), "y6vbkc3d");
    }

    #[test]
    fn test_request_ids_sort_by_creation() {
        let first = RequestId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = RequestId::new();
        assert!(first < second);
    }
}
