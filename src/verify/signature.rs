// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! OpenPGP signature evaluation.

Signature blobs extracted from a package are parsed into OpenPGP
signature packets and checked against every key in the supplied set,
primary keys and subkeys alike. The digest feeds the signed region
first, then the signature's own hashed data and trailer, mirroring how
binary document signatures are computed.
*/

use {
    crate::error::Result,
    digest::Digest,
    log::debug,
    pgp::{
        crypto::{HashAlgorithm, Hasher},
        packet::{Packet, PacketParser},
        types::PublicKeyTrait,
        Signature, SignedPublicKey,
    },
    std::io,
};

/// Content digesting for signature evaluation, covering the hash
/// algorithms RPM signatures use in practice.
#[derive(Clone)]
enum SignatureHasher {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
}

impl SignatureHasher {
    fn for_algorithm(algorithm: HashAlgorithm) -> Option<Self> {
        match algorithm {
            HashAlgorithm::MD5 => Some(Self::Md5(md5::Md5::new())),
            HashAlgorithm::SHA1 => Some(Self::Sha1(sha1::Sha1::new())),
            HashAlgorithm::SHA2_256 => Some(Self::Sha256(sha2::Sha256::new())),
            HashAlgorithm::SHA2_384 => Some(Self::Sha384(sha2::Sha384::new())),
            HashAlgorithm::SHA2_512 => Some(Self::Sha512(sha2::Sha512::new())),
            _ => None,
        }
    }
}

impl io::Write for SignatureHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Hasher for SignatureHasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(digest) => digest.update(data),
            Self::Sha1(digest) => digest.update(data),
            Self::Sha256(digest) => digest.update(data),
            Self::Sha384(digest) => digest.update(data),
            Self::Sha512(digest) => digest.update(data),
        }
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        match *self {
            Self::Md5(digest) => digest.finalize().to_vec(),
            Self::Sha1(digest) => digest.finalize().to_vec(),
            Self::Sha256(digest) => digest.finalize().to_vec(),
            Self::Sha384(digest) => digest.finalize().to_vec(),
            Self::Sha512(digest) => digest.finalize().to_vec(),
        }
    }
}

/// Parse signature packets out of raw OpenPGP packet data.
///
/// Non-signature packets are skipped.
pub(crate) fn parse_signatures(data: &[u8]) -> Result<Vec<Signature>> {
    let mut signatures = vec![];

    for packet in PacketParser::new(io::Cursor::new(data)) {
        match packet {
            Ok(Packet::Signature(signature)) => signatures.push(signature),
            Ok(packet) => {
                debug!("ignoring non-signature packet: {:?}", packet.tag());
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(signatures)
}

/// Whether a signature over the given region verifies against any of
/// the supplied keys.
pub(crate) fn signature_verifies(
    signature: &Signature,
    signed: &[u8],
    keys: &[SignedPublicKey],
) -> bool {
    let digest = match signature_digest(signature, signed) {
        Some(digest) => digest,
        None => return false,
    };

    if digest.len() < 2 || digest[0..2] != signature.signed_hash_value {
        return false;
    }

    for key in keys {
        if key_verifies(key, signature, &digest) {
            return true;
        }

        for subkey in &key.public_subkeys {
            if key_verifies(subkey, signature, &digest) {
                return true;
            }
        }
    }

    false
}

fn signature_digest(signature: &Signature, signed: &[u8]) -> Option<Vec<u8>> {
    let mut hasher = Box::new(SignatureHasher::for_algorithm(signature.config.hash_alg)?);

    hasher.update(signed);

    let len = signature.config.hash_signature_data(&mut *hasher).ok()?;
    hasher.update(&signature.config.trailer(len));

    Some(hasher.finish())
}

fn key_verifies(key: &impl PublicKeyTrait, signature: &Signature, digest: &[u8]) -> bool {
    // Signatures carrying an issuer only need checking against the
    // matching key.
    if let Some(issuer) = signature.issuer() {
        if &key.key_id() != issuer {
            return false;
        }
    }

    key.verify_signature(signature.config.hash_alg, digest, &signature.signature)
        .is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hashers_cover_rpm_algorithms() {
        for algorithm in [
            HashAlgorithm::MD5,
            HashAlgorithm::SHA1,
            HashAlgorithm::SHA2_256,
            HashAlgorithm::SHA2_384,
            HashAlgorithm::SHA2_512,
        ] {
            assert!(SignatureHasher::for_algorithm(algorithm).is_some());
        }

        assert!(SignatureHasher::for_algorithm(HashAlgorithm::RIPEMD160).is_none());
    }

    #[test]
    fn hasher_digests_match_direct_hashing() {
        let mut hasher = Box::new(SignatureHasher::for_algorithm(HashAlgorithm::SHA2_256).unwrap());
        hasher.update(b"hello");
        hasher.update(b" world");

        assert_eq!(
            hasher.finish(),
            sha2::Sha256::digest(b"hello world").to_vec()
        );
    }

    #[test]
    fn garbage_packet_data_is_an_error() {
        assert!(parse_signatures(&[0x00, 0x01, 0x02]).is_err());
    }

    #[test]
    fn empty_packet_data_yields_no_signatures() {
        assert!(parse_signatures(&[]).unwrap().is_empty());
    }
}
