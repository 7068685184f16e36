//! Who made a CBL.
//!
//! Identity (the 32-byte creator id carried on the wire) is split from
//! credentials (the signing key). A bare identity can still encode a
//! manifest with the zero placeholder signature, which never verifies;
//! a signer produces a real signature over the header and address list.

use brightchain_crypto::hash::{Hash, Hasher};
use brightchain_crypto::key::ed25519::{PublicKey, SecretKey, Signature};
use rand::{CryptoRng, RngCore};

/// the opaque 32-byte creator identifier inside the header
pub type CreatorId = Hash<32>;

/// A CBL creator: identity alone, or identity with signing credentials.
pub enum Creator {
    /// id only; encodes with a placeholder signature
    Identity(CreatorId),
    /// id plus the Ed25519 key that signs the manifest
    Signer { id: CreatorId, secret: SecretKey },
}

impl Creator {
    /// mint a fresh signing member whose id is the digest of its public
    /// key
    pub fn member<R>(rng: &mut R) -> Self
    where
        R: RngCore + CryptoRng,
    {
        let mut seed = [0u8; SecretKey::SIZE];
        rng.fill_bytes(&mut seed);
        let secret = SecretKey::from(seed);

        let id = Hasher::<256>::hash(secret.public_key().as_ref());
        Self::Signer { id, secret }
    }

    pub fn id(&self) -> CreatorId {
        match self {
            Creator::Identity(id) => *id,
            Creator::Signer { id, .. } => *id,
        }
    }

    /// the verifying key, when credentials are present
    pub fn public_key(&self) -> Option<PublicKey> {
        match self {
            Creator::Identity(_) => None,
            Creator::Signer { secret, .. } => Some(secret.public_key()),
        }
    }

    /// sign the payload, or emit the placeholder when only an identity
    /// is known
    pub fn sign(&self, payload: &[u8]) -> Signature {
        match self {
            Creator::Identity(_) => Signature::placeholder(),
            Creator::Signer { secret, .. } => secret.sign(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_id_is_bound_to_the_key() {
        let mut rng = rand::rng();
        let creator = Creator::member(&mut rng);

        let key = creator.public_key().unwrap();
        assert_eq!(creator.id(), Hasher::<256>::hash(key.as_ref()));
    }

    #[test]
    fn identity_signs_with_placeholder() {
        let creator = Creator::Identity(Hash::new([1; 32]));
        assert!(creator.sign(b"anything").is_placeholder());
        assert!(creator.public_key().is_none());
    }

    #[test]
    fn signer_signature_verifies() {
        let mut rng = rand::rng();
        let creator = Creator::member(&mut rng);

        let signature = creator.sign(b"manifest payload");
        assert!(creator
            .public_key()
            .unwrap()
            .verify(b"manifest payload", &signature));
    }
}
