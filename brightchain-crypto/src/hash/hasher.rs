use crate::hash::Hash;
use cryptoxide::digest::Digest;
use cryptoxide::sha3;

/// handy method to create a SHA3 hash of given `BITS` digest size.
///
/// The constant parameter is the number of bits of the digest. `256` is
/// the size used for block identity; `224` and `512` are available for
/// external checksums.
///
/// # Generate a block identity
///
/// The following will generate the 32 byte digest a block is addressed by
///
/// ```
/// # use brightchain_crypto::hash::Hasher;
///
/// let mut hasher = Hasher::<256>::new();
/// hasher.input(b"abc");
///
/// let digest = hasher.finalize();
/// # assert_eq!(
/// #   "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532",
/// #   hex::encode(digest)
/// # );
/// ```
pub struct Hasher<const BITS: usize>(Box<dyn Digest>);

impl<const BITS: usize> Hasher<BITS> {
    /// update the [`Hasher`] with the given inputs
    #[inline]
    pub fn input(&mut self, bytes: &[u8]) {
        self.0.input(bytes);
    }
}

macro_rules! common_hasher {
    ($size:literal, $context:ident) => {
        impl Hasher<$size> {
            /// create a new [`Hasher`]
            #[inline]
            pub fn new() -> Self {
                Self(Box::new(sha3::$context::new()))
            }

            /// convenient function to directly generate the hash
            /// of the given bytes without creating the intermediary
            /// [`Hasher`] and calling [`Hasher::input`].
            #[inline]
            pub fn hash(bytes: &[u8]) -> Hash<{ $size / 8 }> {
                let mut hasher = Self::new();
                hasher.input(bytes);
                hasher.finalize()
            }

            /// hash the concatenation of all the given byte sequences
            #[inline]
            pub fn hash_all(parts: &[&[u8]]) -> Hash<{ $size / 8 }> {
                let mut hasher = Self::new();
                for part in parts {
                    hasher.input(part);
                }
                hasher.finalize()
            }

            /// consume the [`Hasher`] and return the computed digest
            pub fn finalize(mut self) -> Hash<{ $size / 8 }> {
                let mut hash = [0; $size / 8];
                self.0.result(&mut hash);
                Hash::new(hash)
            }
        }

        impl Default for Hasher<$size> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

common_hasher!(224, Sha3_224);
common_hasher!(256, Sha3_256);
common_hasher!(512, Sha3_512);
