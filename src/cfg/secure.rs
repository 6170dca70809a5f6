// src/cfg/secure.rs

use secure_string::SecureString;
use serde::{Deserialize, Deserializer, Serializer};

/// Deserializes a `SecureString` from a plain JSON/YAML string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<SecureString, D::Error>
where
    D: Deserializer<'de>,
{
    let plain = String::deserialize(deserializer)?;
    Ok(SecureString::from(plain))
}

/// Deserializes an `Option<SecureString>`.
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<SecureString>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.map(SecureString::from))
}

/// Serializes a `SecureString` back to a plain string (token cache only).
pub fn serialize<S>(value: &SecureString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.unsecure())
}

/// Serializes an `Option<SecureString>`.
pub fn serialize_opt<S>(value: &Option<SecureString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) => serializer.serialize_some(v.unsecure()),
        None => serializer.serialize_none(),
    }
}
