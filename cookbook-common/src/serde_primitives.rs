//! Serde helpers for amounts.
//!
//! Token amounts routinely exceed what JSON numbers can represent exactly, so they travel as
//! decimal strings.

pub mod biguint_string {
    use std::str::FromStr;

    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BigUint::from_str(&s).map_err(|e| de::Error::custom(format!("invalid amount {s}: {e}")))
    }
}
