//! Cache value encoding.
//!
//! Records are stored as JSON: self-describing, readable from `redis-cli`,
//! and tolerant of added fields. Anything that fails to decode is treated
//! by the resolver as a miss.

use lookaside_core::CodecError;
use serde::{de::DeserializeOwned, Serialize};

/// Encode a record for storage in the cache.
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(record).map_err(|e| CodecError::Encode {
        reason: e.to_string(),
    })
}

/// Decode a cached entry back into a record.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookaside_core::User;

    #[test]
    fn test_encode_produces_row_json() {
        let bytes = encode(&User::new(1, "Alice", 30)).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"id":1,"name":"Alice","age":30}"#
        );
    }

    #[test]
    fn test_decode_round_trips_unicode_names() {
        let user = User::new(12, "Зоя \"Z\" O'Brien", 0);
        let decoded: User = decode(&encode(&user).unwrap()).unwrap();
        assert_eq!(decoded, user);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode::<User>(b"\x00\xffnot json").unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let err = decode::<User>(br#"{"id":1,"name":"Alice"}"#).unwrap_err();
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        assert!(decode::<User>(br#"{"id":"1","name":"Alice","age":30}"#).is_err());
        assert!(decode::<User>(br#"{"id":1,"name":null,"age":30}"#).is_err());
    }

    #[test]
    fn test_decode_tolerates_extra_fields() {
        let user: User = decode(br#"{"id":3,"name":"Bo","age":9,"email":"bo@x"}"#).unwrap();
        assert_eq!(user, User::new(3, "Bo", 9));
    }
}
