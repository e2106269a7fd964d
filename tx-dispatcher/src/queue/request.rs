//! Enqueue input and its validation.

use ethers::types::{Address, U256};

use crate::error::DispatchError;

/// Raw enqueue arguments as the operator typed them.
#[derive(Debug, Clone, Default)]
pub struct EnqueueRequest {
    pub receiver: String,
    pub value: Option<String>,
    pub gas_price: Option<String>,
    pub gas_limit: String,
    pub data: Option<String>,
}

/// Fields that passed validation, ready to become a queue record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransfer {
    pub receiver: String,
    pub value: String,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub data: String,
}

impl EnqueueRequest {
    pub fn validate(&self, default_gas_price: u64) -> Result<ValidatedTransfer, DispatchError> {
        let receiver = self.receiver.trim();
        parse_address(receiver)?;

        let value = match self.value.as_deref().map(str::trim) {
            None | Some("") => "0".to_string(),
            Some(raw) => {
                let parsed = U256::from_dec_str(raw).map_err(|_| {
                    DispatchError::validation("value", format!("'{}' is not a non-negative integer", raw))
                })?;
                parsed.to_string()
            }
        };

        let gas_price = match self.gas_price.as_deref().map(str::trim) {
            None | Some("") => default_gas_price,
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                DispatchError::validation("gas_price", format!("'{}' is not a non-negative integer", raw))
            })?,
        };

        let gas_limit = match self.gas_limit.trim().parse::<u64>() {
            Ok(limit) if limit > 0 => limit,
            _ => {
                return Err(DispatchError::validation(
                    "gas_limit",
                    format!("'{}' is not a positive integer", self.gas_limit.trim()),
                ));
            }
        };

        let data = self.data.clone().unwrap_or_default();
        decode_payload(&data).map_err(|reason| DispatchError::validation("data", reason))?;

        Ok(ValidatedTransfer {
            receiver: receiver.to_string(),
            value,
            gas_price,
            gas_limit,
            data,
        })
    }
}

/// Parse a `0x`-prefixed 20-byte hex address.
pub fn parse_address(raw: &str) -> Result<Address, DispatchError> {
    let hex_part = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).ok_or_else(|| {
        DispatchError::validation("receiver", format!("'{}' must start with 0x", raw))
    })?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DispatchError::validation(
            "receiver",
            format!("'{}' is not a 20-byte hex address", raw),
        ));
    }

    hex_part
        .parse::<Address>()
        .map_err(|e| DispatchError::validation("receiver", format!("'{}': {}", raw, e)))
}

/// Turn the stored `data` field into transaction payload bytes.
///
/// `0x`-prefixed input is hex; anything else is taken as UTF-8 text.
pub fn decode_payload(data: &str) -> Result<Vec<u8>, String> {
    match data.strip_prefix("0x") {
        Some(hex_part) => hex::decode(hex_part).map_err(|e| format!("invalid hex payload: {}", e)),
        None => Ok(data.as_bytes().to_vec()),
    }
}
