//! Serde support for [`Hash`].
//!
//! Block ids cross serialization boundaries in two places: metadata side
//! records and JSON manifests. Both want the canonical lowercase-hex
//! rendering rather than a byte array, so a hash serializes through its
//! `Display` form and deserializes through `FromStr`.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::Hash;

impl<const BYTES: usize> Serialize for Hash<BYTES> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, const BYTES: usize> Deserialize<'de> for Hash<BYTES> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(|_| {
            de::Error::custom(format_args!(
                "`{text}` is not a {BYTES} byte hex digest"
            ))
        })
    }
}
