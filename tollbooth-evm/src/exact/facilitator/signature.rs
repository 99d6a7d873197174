//! Signature structuring: EOA, ERC-1271, and ERC-6492 formats.

use alloy_primitives::{Address, B256, Bytes, Signature, hex};
use alloy_sol_types::SolType;

use super::contract::Sig6492;

/// The fixed 32-byte magic suffix defined by ERC-6492.
pub const EIP6492_MAGIC_SUFFIX: [u8; 32] =
    hex!("6492649264926492649264926492649264926492649264926492649264926492");

/// A signature normalized into one of the three formats the facilitator
/// can check.
#[derive(Debug, Clone)]
pub enum StructuredSignature {
    /// A plain EOA signature whose recovered address matches the claimed
    /// signer.
    Eoa(Signature),
    /// An ERC-6492 wrapped signature for a counterfactual smart account.
    Erc6492 {
        /// Wallet factory to deploy through.
        factory: Address,
        /// Calldata for the factory deployment.
        factory_calldata: Bytes,
        /// The signature the deployed wallet validates.
        inner: Bytes,
        /// The full wrapped bytes, passed verbatim to the validator.
        original: Bytes,
    },
    /// A contract (ERC-1271) signature, or an EOA signature that did not
    /// recover to the claimed signer.
    Erc1271(Bytes),
}

/// The ERC-6492 wrapper could not be decoded.
#[derive(Debug, thiserror::Error)]
#[error("malformed ERC-6492 signature wrapper: {0}")]
pub struct MalformedErc6492Error(#[from] alloy_sol_types::Error);

impl StructuredSignature {
    /// Classifies raw signature bytes.
    ///
    /// Bytes carrying the ERC-6492 magic suffix are unwrapped; 64/65-byte
    /// signatures that recover to `expected_signer` over `prehash` are EOA;
    /// everything else is treated as ERC-1271 and left for the on-chain
    /// validator.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedErc6492Error`] when the magic suffix is present
    /// but the wrapper does not ABI-decode.
    pub fn classify(
        bytes: Bytes,
        expected_signer: Address,
        prehash: &B256,
    ) -> Result<Self, MalformedErc6492Error> {
        let is_erc6492 = bytes.len() >= 32 && bytes[bytes.len() - 32..] == EIP6492_MAGIC_SUFFIX;
        if is_erc6492 {
            let body = &bytes[..bytes.len() - 32];
            let sig6492 = Sig6492::abi_decode_params(body)?;
            return Ok(Self::Erc6492 {
                factory: sig6492.factory,
                factory_calldata: sig6492.factoryCalldata,
                inner: sig6492.innerSig,
                original: bytes,
            });
        }

        let eoa = if bytes.len() == 65 {
            Signature::from_raw(&bytes).ok().map(Signature::normalized_s)
        } else if bytes.len() == 64 {
            Some(Signature::from_erc2098(&bytes).normalized_s())
        } else {
            None
        };

        match eoa {
            Some(signature)
                if signature
                    .recover_address_from_prehash(prehash)
                    .is_ok_and(|r| r == expected_signer) =>
            {
                Ok(Self::Eoa(signature))
            }
            _ => Ok(Self::Erc1271(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use alloy_sol_types::SolValue;

    #[test]
    fn forged_wrapper_with_zeroed_inner_classifies_as_erc6492() {
        let factory = Address::repeat_byte(0x42);
        let factory_calldata = Bytes::from(vec![0xde, 0xad]);
        let inner = Bytes::from(vec![0u8; 65]);

        let mut wrapped =
            (factory, factory_calldata.clone(), inner.clone()).abi_encode_params();
        wrapped.extend_from_slice(&EIP6492_MAGIC_SUFFIX);

        let structured = StructuredSignature::classify(
            Bytes::from(wrapped),
            Address::repeat_byte(0x01),
            &B256::ZERO,
        )
        .unwrap();

        match structured {
            StructuredSignature::Erc6492 {
                factory: f,
                inner: i,
                ..
            } => {
                assert_eq!(f, factory);
                assert_eq!(i, inner);
            }
            other => panic!("expected ERC-6492 classification, got {other:?}"),
        }
    }

    #[test]
    fn suffix_without_valid_wrapper_is_an_error() {
        let mut bogus = vec![0xff; 7];
        bogus.extend_from_slice(&EIP6492_MAGIC_SUFFIX);
        assert!(
            StructuredSignature::classify(
                Bytes::from(bogus),
                Address::repeat_byte(0x01),
                &B256::ZERO
            )
            .is_err()
        );
    }

    #[test]
    fn mismatched_eoa_signature_falls_back_to_erc1271() {
        // A syntactically valid 65-byte signature that recovers to some
        // other address than the claimed signer.
        let signature = Signature::new(U256::from(1u64), U256::from(1u64), false);
        let bytes = Bytes::from(signature.as_bytes().to_vec());
        let structured = StructuredSignature::classify(
            bytes,
            Address::repeat_byte(0x01),
            &B256::repeat_byte(0x02),
        )
        .unwrap();
        assert!(matches!(structured, StructuredSignature::Erc1271(_)));
    }

    #[test]
    fn short_garbage_is_erc1271_not_a_panic() {
        let structured = StructuredSignature::classify(
            Bytes::from(vec![1, 2, 3]),
            Address::repeat_byte(0x01),
            &B256::ZERO,
        )
        .unwrap();
        assert!(matches!(structured, StructuredSignature::Erc1271(_)));
    }
}
