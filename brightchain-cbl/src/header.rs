//! The byte-exact CBL header codec.
//!
//! Wire layout, all multi-byte integers big-endian:
//!
//! ```text
//! CreatorId        : 32 bytes
//! DateCreated      :  8 bytes (ms since epoch)
//! AddressCount     :  4 bytes
//! TupleSize        :  1 byte  (3 to 255)
//! OriginalDataLen  :  8 bytes
//! DataChecksum     : 32 bytes (SHA3 of the reconstructed file)
//! IsExtended       :  1 byte  (0 | 1)
//! [ FileNameLen    :  2 bytes
//!   FileName       :  FileNameLen bytes (UTF-8)
//!   MimeTypeLen    :  1 byte
//!   MimeType       :  MimeTypeLen bytes (UTF-8, lowercase) ]
//! CreatorSignature : 64 bytes
//! Addresses        : AddressCount x 32 bytes
//! ```
//!
//! The signature covers `base || extended || blockSize(u32 BE) || addresses`.
//! A buffer whose first byte is the ECIES public-key magic (`0x04`) is an
//! encrypted CBL: every accessor except [`is_encrypted`] refuses it.

use brightchain_codec::be::{Reader, Writer};
use brightchain_crypto::hash::Hash;
use brightchain_crypto::key::ed25519::{PublicKey, Signature};
use brightchain_magnet::BlockId;

use crate::capacity::{address_capacity, EncryptionMode, MAX_INPUT_FILE_SIZE};
use crate::creator::{Creator, CreatorId};
use crate::fields::{validate_file_name, validate_mime_type};
use crate::CblError;

pub const CREATOR_ID_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;
pub const ADDRESS_LEN: usize = 32;
pub const DATA_CHECKSUM_LEN: usize = 32;

/// fixed cost of the base header fields
pub const BASE_HEADER_LEN: usize = CREATOR_ID_LEN + 8 + 4 + 1 + 8 + DATA_CHECKSUM_LEN + 1;

/// first byte of an uncompressed ECIES public key; a buffer starting
/// with it is an encrypted CBL
pub const ECIES_MAGIC: u8 = 0x04;

pub const MIN_TUPLE_SIZE: u8 = 3;
pub const DEFAULT_TUPLE_SIZE: u8 = 3;

/// The optional human-facing file metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub file_name: String,
    pub mime_type: String,
}

impl ExtendedHeader {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    fn validate(&self) -> Result<(), CblError> {
        validate_file_name(&self.file_name)?;
        validate_mime_type(&self.mime_type)?;
        if self.file_name.len() > u16::MAX as usize {
            return Err(CblError::field("fileName", "length field overflow"));
        }
        if self.mime_type.len() > u8::MAX as usize {
            return Err(CblError::field("mimeType", "length field overflow"));
        }
        Ok(())
    }
}

/// The decoded header, signature included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CblHeader {
    pub creator_id: CreatorId,
    pub date_created: u64,
    pub address_count: u32,
    pub tuple_size: u8,
    pub original_data_len: u64,
    pub data_checksum: Hash<32>,
    pub extended: Option<ExtendedHeader>,
    pub signature: Signature,
}

/// A fully parsed CBL buffer: header plus the ordered address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCbl {
    pub header: CblHeader,
    pub addresses: Vec<BlockId>,
}

/// Everything a build needs besides the addresses themselves.
pub struct BuildParams<'a> {
    pub creator: &'a Creator,
    pub date_created: u64,
    pub tuple_size: u8,
    pub original_data_len: u64,
    pub data_checksum: Hash<32>,
    pub extended: Option<ExtendedHeader>,
}

/// true when the buffer is an encrypted CBL rather than a plaintext
/// header
pub fn is_encrypted(buf: &[u8]) -> bool {
    buf.first() == Some(&ECIES_MAGIC)
}

fn write_prefix(w: &mut Writer, header: &CblHeader) {
    w.put_bytes(header.creator_id.as_ref());
    w.put_u64(header.date_created);
    w.put_u32(header.address_count);
    w.put_u8(header.tuple_size);
    w.put_u64(header.original_data_len);
    w.put_bytes(header.data_checksum.as_ref());
    match &header.extended {
        None => {
            w.put_u8(0);
        }
        Some(extended) => {
            w.put_u8(1);
            w.put_u16(extended.file_name.len() as u16);
            w.put_bytes(extended.file_name.as_bytes());
            w.put_u8(extended.mime_type.len() as u8);
            w.put_bytes(extended.mime_type.as_bytes());
        }
    }
}

/// the bytes the creator signature covers
fn signature_payload(header: &CblHeader, addresses: &[BlockId], block_size: usize) -> Vec<u8> {
    let mut w = Writer::with_capacity(
        BASE_HEADER_LEN + 4 + addresses.len() * ADDRESS_LEN + 64,
    );
    write_prefix(&mut w, header);
    w.put_u32(block_size as u32);
    for address in addresses {
        w.put_bytes(address.as_ref());
    }
    w.into_bytes()
}

/// encode and sign a CBL.
///
/// A creator without credentials still encodes; the signature field is
/// then the all-zero placeholder and will never verify.
pub fn build(
    params: BuildParams<'_>,
    addresses: &[BlockId],
    block_size: usize,
) -> Result<Vec<u8>, CblError> {
    if params.tuple_size < MIN_TUPLE_SIZE {
        return Err(CblError::field(
            "tupleSize",
            format!("{} is below the minimum of {MIN_TUPLE_SIZE}", params.tuple_size),
        ));
    }
    if params.original_data_len > MAX_INPUT_FILE_SIZE {
        return Err(CblError::field(
            "originalDataLen",
            format!("{} exceeds the policy cap", params.original_data_len),
        ));
    }
    if let Some(extended) = &params.extended {
        extended.validate()?;
    }
    // a creator id starting with the ECIES magic would make the
    // plaintext buffer unreadable
    if params.creator.id().as_ref()[0] == ECIES_MAGIC {
        return Err(CblError::InvalidCblFormat(
            "creator id collides with the encryption magic".into(),
        ));
    }

    let extended_lens = params
        .extended
        .as_ref()
        .map(|e| (e.file_name.len(), e.mime_type.len()));
    let cap = address_capacity(
        block_size,
        EncryptionMode::None,
        extended_lens,
        params.tuple_size,
    );
    if addresses.len() > cap {
        return Err(CblError::field(
            "addressCount",
            format!(
                "{} addresses exceed the capacity of {cap} for a {block_size} byte block",
                addresses.len()
            ),
        ));
    }

    let mut header = CblHeader {
        creator_id: params.creator.id(),
        date_created: params.date_created,
        address_count: addresses.len() as u32,
        tuple_size: params.tuple_size,
        original_data_len: params.original_data_len,
        data_checksum: params.data_checksum,
        extended: params.extended,
        signature: Signature::placeholder(),
    };

    let payload = signature_payload(&header, addresses, block_size);
    header.signature = params.creator.sign(&payload);

    let mut w = Writer::with_capacity(payload.len() + SIGNATURE_LEN);
    write_prefix(&mut w, &header);
    w.put_bytes(header.signature.as_ref());
    for address in addresses {
        w.put_bytes(address.as_ref());
    }
    Ok(w.into_bytes())
}

/// re-encode a parsed CBL losslessly, signature included.
///
/// `parse(encode(x)) == x`; used when a manifest that was decoded (or
/// assembled in memory) needs to hit the wire again without re-signing.
pub fn encode(parsed: &ParsedCbl) -> Vec<u8> {
    let mut w = Writer::with_capacity(
        BASE_HEADER_LEN + SIGNATURE_LEN + parsed.addresses.len() * ADDRESS_LEN + 64,
    );
    write_prefix(&mut w, &parsed.header);
    w.put_bytes(parsed.header.signature.as_ref());
    for address in &parsed.addresses {
        w.put_bytes(address.as_ref());
    }
    w.into_bytes()
}

/// decode a plaintext CBL buffer.
///
/// Fails with [`CblError::Encrypted`] when the buffer carries the
/// encryption magic; the ciphertext is opaque to this codec.
pub fn parse(buf: &[u8]) -> Result<ParsedCbl, CblError> {
    if is_encrypted(buf) {
        return Err(CblError::Encrypted);
    }

    let mut r = Reader::new(buf);

    let creator_id =
        CreatorId::try_from(r.read_bytes(CREATOR_ID_LEN)?).expect("fixed-width read");
    let date_created = r.read_u64()?;
    let address_count = r.read_u32()?;
    let tuple_size = r.read_u8()?;
    if tuple_size < MIN_TUPLE_SIZE {
        return Err(CblError::field(
            "tupleSize",
            format!("{tuple_size} is below the minimum of {MIN_TUPLE_SIZE}"),
        ));
    }
    let original_data_len = r.read_u64()?;
    let data_checksum =
        Hash::<32>::try_from(r.read_bytes(DATA_CHECKSUM_LEN)?).expect("fixed-width read");

    let extended = match r.read_u8()? {
        0 => None,
        1 => {
            let file_name_len = r.read_u16()? as usize;
            let file_name = String::from_utf8(r.read_bytes(file_name_len)?.to_vec())
                .map_err(|_| CblError::field("fileName", "not valid UTF-8"))?;
            let mime_type_len = r.read_u8()? as usize;
            let mime_type = String::from_utf8(r.read_bytes(mime_type_len)?.to_vec())
                .map_err(|_| CblError::field("mimeType", "not valid UTF-8"))?;

            let extended = ExtendedHeader {
                file_name,
                mime_type,
            };
            extended.validate()?;
            Some(extended)
        }
        other => {
            return Err(CblError::InvalidCblFormat(format!(
                "IsExtended must be 0 or 1, found {other}"
            )))
        }
    };

    let signature =
        Signature::try_from(r.read_bytes(SIGNATURE_LEN)?).expect("fixed-width read");

    let mut addresses = Vec::with_capacity(address_count as usize);
    for _ in 0..address_count {
        let address =
            BlockId::try_from(r.read_bytes(ADDRESS_LEN)?).expect("fixed-width read");
        addresses.push(address);
    }

    if r.remaining() != 0 {
        return Err(CblError::InvalidCblFormat(format!(
            "{} trailing bytes after the address list",
            r.remaining()
        )));
    }

    Ok(ParsedCbl {
        header: CblHeader {
            creator_id,
            date_created,
            address_count,
            tuple_size,
            original_data_len,
            data_checksum,
            extended,
            signature,
        },
        addresses,
    })
}

impl ParsedCbl {
    /// verify the creator signature against the given public key.
    ///
    /// Always false for placeholder signatures (a creator without
    /// credentials cannot be verified, only identified).
    pub fn verify_signature(&self, key: &PublicKey, block_size: usize) -> bool {
        if self.header.signature.is_placeholder() {
            return false;
        }
        let payload = signature_payload(&self.header, &self.addresses, block_size);
        key.verify(payload, &self.header.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brightchain_crypto::hash::Hasher;

    fn addresses(n: usize) -> Vec<BlockId> {
        (0..n)
            .map(|i| Hasher::<256>::hash(&(i as u64).to_be_bytes()))
            .collect()
    }

    fn signer() -> Creator {
        let mut rng = rand::rng();
        loop {
            let creator = Creator::member(&mut rng);
            // avoid the 1-in-256 collision with the encryption magic
            if creator.id().as_ref()[0] != ECIES_MAGIC {
                return creator;
            }
        }
    }

    fn params<'a>(creator: &'a Creator, extended: Option<ExtendedHeader>) -> BuildParams<'a> {
        BuildParams {
            creator,
            date_created: 1_700_000_000_000,
            tuple_size: DEFAULT_TUPLE_SIZE,
            original_data_len: 4100,
            data_checksum: Hasher::<256>::hash(b"the file"),
            extended,
        }
    }

    #[test]
    fn base_header_length_matches_layout() {
        assert_eq!(BASE_HEADER_LEN, 86);
    }

    #[test]
    fn build_parse_round_trip_plain() {
        let creator = signer();
        let addrs = addresses(6);

        let bytes = build(params(&creator, None), &addrs, 4096).unwrap();
        let parsed = parse(&bytes).unwrap();

        assert_eq!(parsed.header.creator_id, creator.id());
        assert_eq!(parsed.header.date_created, 1_700_000_000_000);
        assert_eq!(parsed.header.address_count, 6);
        assert_eq!(parsed.header.tuple_size, 3);
        assert_eq!(parsed.header.original_data_len, 4100);
        assert_eq!(parsed.header.extended, None);
        assert_eq!(parsed.addresses, addrs);
    }

    #[test]
    fn build_parse_round_trip_extended() {
        let creator = signer();
        let addrs = addresses(2);
        let extended = ExtendedHeader::new("report.txt", "text/plain");

        let bytes = build(params(&creator, Some(extended.clone())), &addrs, 4096).unwrap();
        let parsed = parse(&bytes).unwrap();

        assert_eq!(parsed.header.extended, Some(extended));
        // S2 shape: two direct addresses under the conventional tuple
        // size of three
        assert_eq!(parsed.header.address_count, 2);
        assert_eq!(parsed.header.tuple_size, 3);
    }

    #[test]
    fn encode_is_the_inverse_of_parse() {
        let creator = signer();
        let extended = ExtendedHeader::new("report.txt", "text/plain");
        let bytes = build(params(&creator, Some(extended)), &addresses(4), 4096).unwrap();

        let parsed = parse(&bytes).unwrap();
        assert_eq!(encode(&parsed), bytes);
    }

    #[test]
    fn signature_verifies_and_binds_the_content() {
        let creator = signer();
        let addrs = addresses(3);

        let bytes = build(params(&creator, None), &addrs, 4096).unwrap();
        let parsed = parse(&bytes).unwrap();
        let key = creator.public_key().unwrap();

        assert!(parsed.verify_signature(&key, 4096));

        // a different block size is a different signed payload
        assert!(!parsed.verify_signature(&key, 1024));

        // tampering with an address breaks the signature
        let mut tampered = parsed.clone();
        tampered.addresses[0] = Hasher::<256>::hash(b"evil");
        assert!(!tampered.verify_signature(&key, 4096));

        // a stranger's key does not verify
        let stranger = signer();
        assert!(!parsed.verify_signature(&stranger.public_key().unwrap(), 4096));
    }

    #[test]
    fn identity_creator_gets_placeholder_signature() {
        let identity = Creator::Identity(Hash::new([9; 32]));
        let addrs = addresses(3);

        let bytes = build(params(&identity, None), &addrs, 4096).unwrap();
        let parsed = parse(&bytes).unwrap();

        assert!(parsed.header.signature.is_placeholder());

        let someone = signer();
        assert!(!parsed.verify_signature(&someone.public_key().unwrap(), 4096));
    }

    #[test]
    fn encrypted_buffer_refused() {
        let mut buf = vec![0u8; 200];
        buf[0] = ECIES_MAGIC;
        assert!(is_encrypted(&buf));
        assert!(matches!(parse(&buf), Err(CblError::Encrypted)));
    }

    #[test]
    fn capacity_overflow_rejected() {
        let creator = signer();
        // 512-byte blocks hold 9 plain addresses, so 12 must not fit
        let result = build(params(&creator, None), &addresses(12), 512);
        assert!(matches!(
            result,
            Err(CblError::InvalidField {
                field: "addressCount",
                ..
            })
        ));
    }

    #[test]
    fn bad_tuple_size_rejected() {
        let creator = signer();
        let mut p = params(&creator, None);
        p.tuple_size = 2;
        assert!(matches!(
            build(p, &addresses(3), 4096),
            Err(CblError::InvalidField {
                field: "tupleSize",
                ..
            })
        ));
    }

    #[test]
    fn oversized_file_rejected() {
        let creator = signer();
        let mut p = params(&creator, None);
        p.original_data_len = MAX_INPUT_FILE_SIZE + 1;
        assert!(matches!(
            build(p, &addresses(3), 4096),
            Err(CblError::InvalidField {
                field: "originalDataLen",
                ..
            })
        ));
    }

    #[test]
    fn bad_extended_fields_rejected() {
        let creator = signer();
        let bad_name = ExtendedHeader::new("../etc/passwd", "text/plain");
        assert!(build(params(&creator, Some(bad_name)), &addresses(3), 4096).is_err());

        let bad_mime = ExtendedHeader::new("ok.txt", "Text/Plain");
        assert!(build(params(&creator, Some(bad_mime)), &addresses(3), 4096).is_err());
    }

    #[test]
    fn truncated_buffer_rejected() {
        let creator = signer();
        let bytes = build(params(&creator, None), &addresses(3), 4096).unwrap();
        assert!(parse(&bytes[..bytes.len() - 10]).is_err());
    }

    #[test]
    fn trailing_garbage_rejected() {
        let creator = signer();
        let mut bytes = build(params(&creator, None), &addresses(3), 4096).unwrap();
        bytes.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(
            parse(&bytes),
            Err(CblError::InvalidCblFormat(_))
        ));
    }
}
