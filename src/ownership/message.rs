//! Binding Message
//!
//! The text a user signs to bind a Bitcoin address to an EVM address.
//! Byte-identical output for identical inputs; no validation happens here.

/// Domain line of every binding message
pub const BINDING_DOMAIN: &str = "reservebtc.io";

/// Build the canonical binding message
///
/// ```text
/// ReserveBTC binding:
/// ETH=<evm address>
/// BTC=<bitcoin address>
/// checksum=<hex>
/// nonce=<string>
/// height=<int>
/// domain=reservebtc.io
/// ```
pub fn create_ownership_message(
    evm_address: &str,
    btc_address: &str,
    checksum_hex: &str,
    nonce: &str,
    height: u64,
) -> String {
    format!(
        "ReserveBTC binding:\nETH={}\nBTC={}\nchecksum={}\nnonce={}\nheight={}\ndomain={}",
        evm_address, btc_address, checksum_hex, nonce, height, BINDING_DOMAIN
    )
}
