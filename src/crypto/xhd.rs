//! BIP32-Ed25519 key derivation (Algorand xHD scheme)
//!
//! Implements `KeyDerivationPort` on top of `curve25519-dalek`:
//! - Root key from seed: `kL || kR || chain code` (96 bytes)
//! - Hardened and soft private child derivation
//! - Soft public child derivation from `pk || chain code`
//! - Signing with the extended key, verifiable as plain Ed25519
//! - X25519 ECDH over the derived scalar, hashed with BLAKE2b-256
//!
//! Index bytes are little-endian. The derivation type decides how many
//! bits of `zL` are discarded before it is added to the parent scalar.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blake2::digest::consts::U32;
use blake2::Blake2b;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, Zeroizing};

use super::port::{
    ChildNodeDraft, DataEncoding, DeriveKeyDraft, KeyCoordinate, KeyDerivationPort, SdkError,
    SdkResult, SignMetadata, VerifySignatureDraft, HARDENED, PROHIBITED_DATA_PREFIXES,
};

type HmacSha512 = Hmac<Sha512>;
type Blake2b256 = Blake2b<U32>;

pub const EXTENDED_PRIVATE_KEY_LENGTH: usize = 96;
pub const EXTENDED_PUBLIC_KEY_LENGTH: usize = 64;

/// Stateless adapter; holds no key material
#[derive(Debug, Clone, Copy, Default)]
pub struct XhdKeyDerivation;

impl XhdKeyDerivation {
    pub fn new() -> Self {
        Self
    }

    /// Extended root key from a BIP-39 seed
    pub fn root_key(seed: &[u8]) -> SdkResult<Zeroizing<Vec<u8>>> {
        if !(16..=64).contains(&seed.len()) {
            return Err(SdkError::InvalidSeed(format!(
                "seed must be 16..=64 bytes, got {}",
                seed.len()
            )));
        }

        let mut k = Zeroizing::new([0u8; 64]);
        k.copy_from_slice(&Sha512::digest(seed));

        // Third highest bit of kL must be clear
        while k[31] & 0b0010_0000 != 0 {
            let mut mac = hmac_sha512(&k[..32])?;
            mac.update(&k[32..]);
            let next = mac.finalize().into_bytes();
            k.copy_from_slice(&next);
        }

        k[0] &= 0b1111_1000;
        k[31] &= 0b0111_1111;
        k[31] |= 0b0100_0000;

        let chain_code = Sha256::new().chain_update([0x01u8]).chain_update(seed).finalize();

        let mut root = Zeroizing::new(Vec::with_capacity(EXTENDED_PRIVATE_KEY_LENGTH));
        root.extend_from_slice(&k[..]);
        root.extend_from_slice(&chain_code);
        Ok(root)
    }

    fn child_private(extended: &[u8], index: u32, truncated_bits: u32) -> SdkResult<Zeroizing<Vec<u8>>> {
        if extended.len() != EXTENDED_PRIVATE_KEY_LENGTH {
            return Err(SdkError::InvalidExtendedKey {
                expected: EXTENDED_PRIVATE_KEY_LENGTH,
                actual: extended.len(),
            });
        }
        let (kl, rest) = extended.split_at(32);
        let (kr, chain_code) = rest.split_at(32);

        let (z, child_chain) = if index < HARDENED {
            let pk = public_from_scalar_bytes(kl);
            (
                tagged_hmac(chain_code, 0x02, &[&pk[..]], index)?,
                tagged_hmac(chain_code, 0x03, &[&pk[..]], index)?,
            )
        } else {
            (
                tagged_hmac(chain_code, 0x00, &[kl, kr], index)?,
                tagged_hmac(chain_code, 0x01, &[kl, kr], index)?,
            )
        };

        let zl8 = Zeroizing::new(mul8_le(&truncate_trailing_bits(&z[..32], truncated_bits)));
        let (left, overflow) = add_le(&to_array(kl), &zl8);
        let left = Zeroizing::new(left);
        if overflow || left[31] & 0x80 != 0 {
            return Err(SdkError::Native("child scalar overflow".into()));
        }
        let (right, _) = add_le(&to_array(kr), &to_array(&z[32..]));
        let right = Zeroizing::new(right);

        let mut child = Zeroizing::new(Vec::with_capacity(EXTENDED_PRIVATE_KEY_LENGTH));
        child.extend_from_slice(&left[..]);
        child.extend_from_slice(&right[..]);
        child.extend_from_slice(&child_chain[32..]);
        Ok(child)
    }

    fn child_public(extended: &[u8], index: u32, truncated_bits: u32) -> SdkResult<Vec<u8>> {
        if extended.len() != EXTENDED_PUBLIC_KEY_LENGTH {
            return Err(SdkError::InvalidExtendedKey {
                expected: EXTENDED_PUBLIC_KEY_LENGTH,
                actual: extended.len(),
            });
        }
        if index >= HARDENED {
            return Err(SdkError::HardenedPublicDerivation(index));
        }
        let (pk, chain_code) = extended.split_at(32);
        let parent = decompress(pk)?;

        let z = tagged_hmac(chain_code, 0x02, &[pk], index)?;
        let zl8 = mul8_le(&truncate_trailing_bits(&z[..32], truncated_bits));
        let point = parent + EdwardsPoint::mul_base(&Scalar::from_bytes_mod_order(zl8));
        let child_chain = tagged_hmac(chain_code, 0x03, &[pk], index)?;

        let mut child = Vec::with_capacity(EXTENDED_PUBLIC_KEY_LENGTH);
        child.extend_from_slice(point.compress().as_bytes());
        child.extend_from_slice(&child_chain[32..]);
        Ok(child)
    }

    fn derive_path(root: &[u8], path: &[u32], truncated_bits: u32) -> SdkResult<Zeroizing<Vec<u8>>> {
        let mut node = Zeroizing::new(root.to_vec());
        for &index in path {
            node = Self::child_private(&node, index, truncated_bits)?;
        }
        Ok(node)
    }

    fn leaf(seed: &[u8], coordinate: &KeyCoordinate) -> SdkResult<Zeroizing<Vec<u8>>> {
        let root = Self::root_key(seed)?;
        Self::derive_path(&root, &coordinate.bip44_path()?, coordinate.derivation_type.truncated_bits())
    }

    /// Ed25519 signature using `kL` as the scalar and `kR` as the nonce key
    fn raw_sign(node: &[u8], message: &[u8]) -> Vec<u8> {
        let mut kl = to_array(&node[..32]);
        let mut a = Scalar::from_bytes_mod_order(kl);
        kl.zeroize();
        let public = EdwardsPoint::mul_base(&a).compress();

        let mut r = Scalar::from_bytes_mod_order_wide(&sha512_parts(&[&node[32..64], message]));
        let big_r = EdwardsPoint::mul_base(&r).compress();
        let h = Scalar::from_bytes_mod_order_wide(&sha512_parts(&[
            big_r.as_bytes(),
            public.as_bytes(),
            message,
        ]));
        let s = r + h * a;
        a.zeroize();
        r.zeroize();

        let mut signature = Vec::with_capacity(64);
        signature.extend_from_slice(big_r.as_bytes());
        signature.extend_from_slice(s.as_bytes());
        signature
    }
}

impl KeyDerivationPort for XhdKeyDerivation {
    fn derive_public_child_node(&self, draft: &ChildNodeDraft) -> SdkResult<Vec<u8>> {
        Self::child_public(&draft.extended_key, draft.index, draft.derivation_type.truncated_bits())
    }

    fn derive_private_child_node(&self, draft: &ChildNodeDraft) -> SdkResult<Zeroizing<Vec<u8>>> {
        Self::child_private(&draft.extended_key, draft.index, draft.derivation_type.truncated_bits())
    }

    fn generate_key(&self, seed: &[u8], coordinate: &KeyCoordinate) -> SdkResult<Vec<u8>> {
        let node = Self::leaf(seed, coordinate)?;
        Ok(public_from_scalar_bytes(&node[..32]).to_vec())
    }

    fn derive_key(&self, draft: &DeriveKeyDraft) -> SdkResult<Zeroizing<Vec<u8>>> {
        let node = Self::derive_path(&draft.root_key, &draft.path, draft.derivation_type.truncated_bits())?;
        if draft.is_private {
            return Ok(node);
        }
        let mut public = Zeroizing::new(Vec::with_capacity(EXTENDED_PUBLIC_KEY_LENGTH));
        public.extend_from_slice(&public_from_scalar_bytes(&node[..32]));
        public.extend_from_slice(&node[64..]);
        Ok(public)
    }

    fn sign_algorand_transaction(
        &self,
        seed: &[u8],
        coordinate: &KeyCoordinate,
        prefix_encoded_tx: &[u8],
    ) -> SdkResult<Vec<u8>> {
        if !prefix_encoded_tx.starts_with(b"TX") {
            return Err(SdkError::InvalidData);
        }
        let node = Self::leaf(seed, coordinate)?;
        Ok(Self::raw_sign(&node, prefix_encoded_tx))
    }

    fn sign_data(
        &self,
        seed: &[u8],
        coordinate: &KeyCoordinate,
        data: &[u8],
        metadata: &SignMetadata,
    ) -> SdkResult<Vec<u8>> {
        if !self.validate_data(data, metadata) {
            return Err(SdkError::InvalidData);
        }
        let node = Self::leaf(seed, coordinate)?;
        Ok(Self::raw_sign(&node, data))
    }

    fn verify_signature(&self, draft: &VerifySignatureDraft) -> bool {
        let Ok(public_key) = <[u8; 32]>::try_from(draft.public_key.as_slice()) else {
            return false;
        };
        let Ok(signature) = <[u8; 64]>::try_from(draft.signature.as_slice()) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key) else {
            return false;
        };
        verifying_key
            .verify(&draft.message, &Signature::from_bytes(&signature))
            .is_ok()
    }

    fn validate_data(&self, data: &[u8], metadata: &SignMetadata) -> bool {
        if has_prohibited_prefix(data) {
            return false;
        }

        let decoded = match metadata.encoding {
            DataEncoding::None => data.to_vec(),
            DataEncoding::Base64 => match STANDARD.decode(data) {
                Ok(bytes) => bytes,
                Err(_) => return false,
            },
        };
        if has_prohibited_prefix(&decoded) {
            return false;
        }

        match &metadata.schema {
            None => true,
            Some(schema) => matches_required_keys(&decoded, schema),
        }
    }

    fn perform_ecdh(
        &self,
        seed: &[u8],
        coordinate: &KeyCoordinate,
        other_party_public_key: &[u8],
        me_first: bool,
    ) -> SdkResult<Vec<u8>> {
        let other = decompress(other_party_public_key)?;
        let node = Self::leaf(seed, coordinate)?;

        let scalar = Zeroizing::new(to_array(&node[..32]));
        let shared = other.to_montgomery().mul_clamped(*scalar);

        let mine = decompress(&public_from_scalar_bytes(&node[..32]))?.to_montgomery();
        let theirs = other.to_montgomery();

        let mut hasher = Blake2b256::new();
        hasher.update(shared.as_bytes());
        if me_first {
            hasher.update(mine.as_bytes());
            hasher.update(theirs.as_bytes());
        } else {
            hasher.update(theirs.as_bytes());
            hasher.update(mine.as_bytes());
        }
        Ok(hasher.finalize().to_vec())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn hmac_sha512(key: &[u8]) -> SdkResult<HmacSha512> {
    HmacSha512::new_from_slice(key).map_err(|e| SdkError::Native(e.to_string()))
}

/// HMAC-SHA512(chain code, tag || parts || index_le)
fn tagged_hmac(chain_code: &[u8], tag: u8, parts: &[&[u8]], index: u32) -> SdkResult<Zeroizing<[u8; 64]>> {
    let mut mac = hmac_sha512(chain_code)?;
    mac.update(&[tag]);
    for part in parts {
        mac.update(part);
    }
    mac.update(&index.to_le_bytes());

    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn sha512_parts(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn to_array(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[..32]);
    out
}

/// Public key for an unclamped scalar
fn public_from_scalar_bytes(kl: &[u8]) -> [u8; 32] {
    let mut bytes = to_array(kl);
    let mut scalar = Scalar::from_bytes_mod_order(bytes);
    bytes.zeroize();
    let public = EdwardsPoint::mul_base(&scalar).compress().to_bytes();
    scalar.zeroize();
    public
}

fn decompress(public_key: &[u8]) -> SdkResult<EdwardsPoint> {
    let bytes = <[u8; 32]>::try_from(public_key).map_err(|_| {
        SdkError::InvalidPublicKey(format!("expected 32 bytes, got {}", public_key.len()))
    })?;
    CompressedEdwardsY(bytes)
        .decompress()
        .ok_or_else(|| SdkError::InvalidPublicKey("not a point on the curve".into()))
}

/// Clear the top `bits` bits of a little-endian 256-bit value
fn truncate_trailing_bits(value: &[u8], bits: u32) -> [u8; 32] {
    let mut out = to_array(value);
    let mut remaining = bits;
    for byte in out.iter_mut().rev() {
        if remaining == 0 {
            break;
        }
        if remaining >= 8 {
            *byte = 0;
            remaining -= 8;
        } else {
            *byte &= 0xff >> remaining;
            remaining = 0;
        }
    }
    out
}

fn mul8_le(value: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry = 0u8;
    for (dst, src) in out.iter_mut().zip(value.iter()) {
        *dst = (src << 3) | carry;
        carry = src >> 5;
    }
    out
}

fn add_le(a: &[u8; 32], b: &[u8; 32]) -> ([u8; 32], bool) {
    let mut out = [0u8; 32];
    let mut carry = 0u16;
    for i in 0..32 {
        let sum = a[i] as u16 + b[i] as u16 + carry;
        out[i] = sum as u8;
        carry = sum >> 8;
    }
    (out, carry != 0)
}

fn has_prohibited_prefix(data: &[u8]) -> bool {
    PROHIBITED_DATA_PREFIXES.iter().any(|prefix| data.starts_with(prefix))
}

fn matches_required_keys(data: &[u8], schema: &serde_json::Value) -> bool {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return false;
    };
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return true;
    };
    let Some(object) = value.as_object() else {
        return false;
    };
    required
        .iter()
        .filter_map(|key| key.as_str())
        .all(|key| object.contains_key(key))
}
