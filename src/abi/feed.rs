//! The `feed` vote call and its parameters

use super::encoder::{encode_call, AbiValue, EncodedCall};
use crate::error::{VoterError, VoterResult};

use ethers::types::U256;
use serde::Deserialize;

/// Six-parameter vote carrying the order's request data and integrity proof
pub const FEED_SIGNATURE: &str = "feed(string,uint256,string,string,bytes,bytes)";

/// Static-amount vote without order request data
pub const SIMPLE_FEED_SIGNATURE: &str = "feed(string,uint256)";

/// Which `feed` overload to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallVariant {
    #[default]
    Full,
    Simple,
}

/// Decode hex text into raw bytes, with or without a `0x`/`0X` prefix
pub fn normalize_hex(field: &str, input: &str) -> VoterResult<Vec<u8>> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    hex::decode(digits).map_err(|e| VoterError::Encoding {
        field: field.to_string(),
        message: format!("{:?} is not valid hex: {}", input, e),
    })
}

/// Reject negative amounts before they reach the encoder
pub fn checked_amount(amount: i64) -> VoterResult<U256> {
    u64::try_from(amount)
        .map(U256::from)
        .map_err(|_| VoterError::InvalidInput(format!("negative feed amount {}", amount)))
}

/// Arguments of the six-parameter `feed` call, already normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallParameters {
    pub candidate_id: String,
    pub amount: U256,
    pub request_id: String,
    pub request_data: String,
    pub user_hashed_message: Vec<u8>,
    pub integrity_signature: Vec<u8>,
}

impl CallParameters {
    pub fn new(
        candidate_id: impl Into<String>,
        amount: i64,
        request_id: impl Into<String>,
        request_data: impl Into<String>,
        user_hashed_message: &str,
        integrity_signature: &str,
    ) -> VoterResult<Self> {
        Ok(Self {
            candidate_id: candidate_id.into(),
            amount: checked_amount(amount)?,
            request_id: request_id.into(),
            request_data: request_data.into(),
            user_hashed_message: normalize_hex("userHashedMessage", user_hashed_message)?,
            integrity_signature: normalize_hex("integritySignature", integrity_signature)?,
        })
    }
}

/// A `feed` call in one of its two shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCall {
    Full(CallParameters),
    Simple { candidate_id: String, amount: U256 },
}

impl FeedCall {
    pub fn signature(&self) -> &'static str {
        match self {
            FeedCall::Full(_) => FEED_SIGNATURE,
            FeedCall::Simple { .. } => SIMPLE_FEED_SIGNATURE,
        }
    }

    /// Arguments in the order the contract declares them
    pub fn args(&self) -> Vec<AbiValue> {
        match self {
            FeedCall::Full(p) => vec![
                AbiValue::String(p.candidate_id.clone()),
                AbiValue::Uint(p.amount),
                AbiValue::String(p.request_id.clone()),
                AbiValue::String(p.request_data.clone()),
                AbiValue::Bytes(p.user_hashed_message.clone()),
                AbiValue::Bytes(p.integrity_signature.clone()),
            ],
            FeedCall::Simple {
                candidate_id,
                amount,
            } => vec![
                AbiValue::String(candidate_id.clone()),
                AbiValue::Uint(*amount),
            ],
        }
    }

    pub fn encode(&self) -> VoterResult<EncodedCall> {
        encode_call(self.signature(), &self.args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encoder::{selector, SELECTOR_LEN, WORD};
    use ethers::abi::{decode, ParamType, Token};

    fn feed_param_types() -> Vec<ParamType> {
        vec![
            ParamType::String,
            ParamType::Uint(256),
            ParamType::String,
            ParamType::String,
            ParamType::Bytes,
            ParamType::Bytes,
        ]
    }

    fn head_word(data: &[u8], index: usize) -> usize {
        let start = SELECTOR_LEN + index * WORD;
        U256::from_big_endian(&data[start..start + WORD]).as_usize()
    }

    #[test]
    fn test_normalize_hex_is_prefix_insensitive() {
        let expected = vec![0xde, 0xad, 0xbe, 0xef];
        assert_eq!(normalize_hex("f", "0xdeadbeef").unwrap(), expected);
        assert_eq!(normalize_hex("f", "deadbeef").unwrap(), expected);
        assert_eq!(normalize_hex("f", "0XDEADBEEF").unwrap(), expected);
        assert_eq!(normalize_hex("f", "DeAdBeEf").unwrap(), expected);
        assert_eq!(normalize_hex("f", "0x").unwrap(), Vec::<u8>::new());
        assert_eq!(normalize_hex("f", "").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_unprefixed_hex_is_not_read_as_text() {
        // "5678" as text would be four bytes
        assert_eq!(normalize_hex("f", "5678").unwrap(), vec![0x56, 0x78]);
    }

    #[test]
    fn test_normalize_hex_rejects_garbage() {
        let err = normalize_hex("integritySignature", "0xzz").unwrap_err();
        assert!(matches!(err, VoterError::Encoding { ref field, .. } if field == "integritySignature"));
        assert!(normalize_hex("f", "0x123").is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let err = CallParameters::new("1", -1, "abc", "", "0x12", "34").unwrap_err();
        assert!(matches!(err, VoterError::InvalidInput(_)));
    }

    #[test]
    fn test_feed_call_layout_and_round_trip() {
        let params = CallParameters::new("7", 3, "abc", "", "0x1234", "5678").unwrap();
        let call = FeedCall::Full(params).encode().unwrap();
        let data = call.as_bytes();

        assert_eq!(call.selector(), selector(FEED_SIGNATURE));

        // six head slots; the amount sits inline in the second one
        assert_eq!(head_word(data, 1), 3);
        let offsets: Vec<usize> = [0, 2, 3, 4, 5].iter().map(|i| head_word(data, *i)).collect();
        assert_eq!(offsets, vec![192, 256, 320, 352, 416]);

        // requestData is an empty segment: a zero length word and nothing else
        assert_eq!(head_word(data, 10), 0);
        assert_eq!(data.len(), SELECTOR_LEN + 480);

        let tokens = decode(&feed_param_types(), &data[SELECTOR_LEN..]).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::String("7".to_string()),
                Token::Uint(U256::from(3)),
                Token::String("abc".to_string()),
                Token::String(String::new()),
                Token::Bytes(vec![0x12, 0x34]),
                Token::Bytes(vec![0x56, 0x78]),
            ]
        );
    }

    #[test]
    fn test_round_trip_over_varied_lengths() {
        for len in [0usize, 1, 31, 32, 33, 64, 65, 200] {
            let text = "q".repeat(len);
            let blob = vec![0x5a; len];
            let params = CallParameters {
                candidate_id: text.clone(),
                amount: U256::MAX,
                request_id: text.clone(),
                request_data: "r".repeat(len / 2),
                user_hashed_message: blob.clone(),
                integrity_signature: blob[..len / 3].to_vec(),
            };
            let call = FeedCall::Full(params.clone()).encode().unwrap();
            let tokens = decode(&feed_param_types(), &call.as_bytes()[SELECTOR_LEN..]).unwrap();

            assert_eq!(tokens[0], Token::String(params.candidate_id));
            assert_eq!(tokens[1], Token::Uint(U256::MAX));
            assert_eq!(tokens[2], Token::String(params.request_id));
            assert_eq!(tokens[3], Token::String(params.request_data));
            assert_eq!(tokens[4], Token::Bytes(params.user_hashed_message));
            assert_eq!(tokens[5], Token::Bytes(params.integrity_signature));
        }
    }

    #[test]
    fn test_simple_variant_shares_the_encoder() {
        let call = FeedCall::Simple {
            candidate_id: "12".to_string(),
            amount: U256::from(5),
        }
        .encode()
        .unwrap();

        assert_eq!(call.selector(), selector(SIMPLE_FEED_SIGNATURE));
        let tokens = decode(
            &[ParamType::String, ParamType::Uint(256)],
            &call.as_bytes()[SELECTOR_LEN..],
        )
        .unwrap();
        assert_eq!(tokens[0], Token::String("12".to_string()));
        assert_eq!(tokens[1], Token::Uint(U256::from(5)));
    }
}
