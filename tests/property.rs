use ethers_core::types::{Address, H256, U256};
use proptest::prelude::*;
use tx_signer::tx::{
    decode_unsigned, encode_unsigned, to_ledger_amount, AccessListItem, DynamicFeeTransaction, LedgerAmount,
    LegacyTransaction, UnsignedTransaction, MAX_BASE_UNITS,
};
use tx_signer::utils::crypto::{keccak256, parse_account_address, to_checksum_address};

fn any_u256() -> impl Strategy<Value = U256> {
    prop::array::uniform32(any::<u8>()).prop_map(|bytes| U256::from_big_endian(&bytes))
}

fn any_address() -> impl Strategy<Value = Address> {
    prop::array::uniform20(any::<u8>()).prop_map(Address::from)
}

fn any_legacy() -> impl Strategy<Value = UnsignedTransaction> {
    (
        any::<u64>(),
        any_u256(),
        any::<u64>(),
        any_address(),
        any_u256(),
        prop::collection::vec(any::<u8>(), 0..64),
        prop::option::of(1u64..100_000),
    )
        .prop_map(|(nonce, gas_price, gas_limit, to, value, data, chain_id)| {
            UnsignedTransaction::Legacy(LegacyTransaction {
                nonce,
                gas_price,
                gas_limit,
                to: Some(to),
                value,
                data,
                chain_id,
            })
        })
}

fn any_dynamic_fee() -> impl Strategy<Value = UnsignedTransaction> {
    (
        any::<u64>(),
        any::<u64>(),
        any_u256(),
        any_u256(),
        any::<u64>(),
        any_address(),
        any_u256(),
        prop::collection::vec(any::<u8>(), 0..64),
        prop::collection::vec(
            (any_address(), prop::collection::vec(prop::array::uniform32(any::<u8>()), 0..3)),
            0..3,
        ),
    )
        .prop_map(
            |(chain_id, nonce, priority, max_fee, gas_limit, to, value, data, access)| {
                UnsignedTransaction::DynamicFee(DynamicFeeTransaction {
                    chain_id,
                    nonce,
                    max_priority_fee_per_gas: priority,
                    max_fee_per_gas: max_fee,
                    gas_limit,
                    to: Some(to),
                    value,
                    data,
                    access_list: access
                        .into_iter()
                        .map(|(address, keys)| AccessListItem {
                            address,
                            storage_keys: keys.into_iter().map(H256::from).collect(),
                        })
                        .collect(),
                })
            },
        )
}

proptest! {
    #[test]
    fn legacy_codec_roundtrip(tx in any_legacy()) {
        let encoded = encode_unsigned(&tx);
        let decoded = decode_unsigned(&encoded).expect("canonical encoding decodes");
        prop_assert_eq!(&decoded, &tx);
        prop_assert_eq!(encode_unsigned(&decoded), encoded);
    }

    #[test]
    fn dynamic_fee_codec_roundtrip(tx in any_dynamic_fee()) {
        let encoded = encode_unsigned(&tx);
        prop_assert_eq!(encoded[0], 0x02);
        let decoded = decode_unsigned(&encoded).expect("canonical encoding decodes");
        prop_assert_eq!(decoded, tx);
    }

    #[test]
    fn decoder_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_unsigned(&bytes);
    }

    #[test]
    fn ledger_amounts_are_exact(units in 0u128..=MAX_BASE_UNITS) {
        let amount = to_ledger_amount(U256::from(units)).expect("within precision");
        prop_assert_eq!(amount.base_units(), units);

        let text = amount.to_string();
        let parsed: LedgerAmount = text.parse().expect("display output parses");
        prop_assert_eq!(parsed, amount);
    }

    #[test]
    fn oversized_amounts_are_rejected(excess in 1u128..u128::MAX - MAX_BASE_UNITS) {
        prop_assert!(to_ledger_amount(U256::from(MAX_BASE_UNITS) + U256::from(excess)).is_err());
    }

    #[test]
    fn checksum_addresses_roundtrip(bytes in prop::array::uniform20(any::<u8>())) {
        let checksummed = to_checksum_address(&bytes);
        prop_assert!(checksummed.starts_with("0x"));

        let lower_expected = hex::encode(bytes);
        let tail = checksummed.trim_start_matches("0x");
        prop_assert_eq!(tail.to_ascii_lowercase(), lower_expected.clone());

        let hash = keccak256(lower_expected.as_bytes());
        for (i, ch) in tail.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if ch.is_ascii_alphabetic() {
                prop_assert_eq!(ch.is_ascii_uppercase(), nibble >= 8);
            }
        }

        let parsed = parse_account_address(&checksummed).expect("checksummed address parses");
        prop_assert_eq!(parsed.as_bytes(), &bytes[..]);
    }
}
