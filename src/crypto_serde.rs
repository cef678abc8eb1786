use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, SerializationError};
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonically serializes any arkworks value into a `0x`-prefixed lowercase hex string.
pub fn canonical_serialize_hex<T>(value: &T) -> Result<String, SerializationError>
where
    T: CanonicalSerialize,
{
    let mut buf = Vec::with_capacity(value.compressed_size());
    value.serialize_compressed(&mut buf)?;
    Ok(format!("0x{}", hex::encode(buf)))
}

/// Canonically deserializes a value from a hex string (accepts an optional `0x` prefix).
pub fn canonical_deserialize_hex<T>(value: &str) -> Result<T, String>
where
    T: CanonicalDeserialize,
{
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed).map_err(|err| format!("invalid hex: {err}"))?;
    T::deserialize_compressed(&mut &bytes[..])
        .map_err(|err| format!("canonical deserialize failed: {err}"))
}

/// Serde helpers for curve points and field elements encoded as hex strings.
pub mod canonical {
    use super::*;

    pub fn serialize<T, S>(value: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let hex = canonical_serialize_hex(value).map_err(SerError::custom)?;
        serializer.serialize_str(&hex)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> std::result::Result<T, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        canonical_deserialize_hex(&s).map_err(DeError::custom)
    }
}

/// Serde helpers for `Vec<T>` of arkworks values, each encoded as a hex string.
pub mod canonical_vec {
    use super::*;

    pub fn serialize<T, S>(value: &[T], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let encoded: Vec<String> = value
            .iter()
            .map(canonical_serialize_hex)
            .collect::<Result<_, _>>()
            .map_err(SerError::custom)?;
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| canonical_deserialize_hex(s).map_err(DeError::custom))
            .collect()
    }
}
