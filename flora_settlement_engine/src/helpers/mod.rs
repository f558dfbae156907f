mod commission;
mod signature;

pub use commission::{split_commission, CommissionSplit};
pub use signature::{hmac_sha256_hex, hmac_sha512_hex, secure_eq};
