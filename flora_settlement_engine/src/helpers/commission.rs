use fpg_common::Vnd;

/// The outcome of deducting the platform commission from an escrowed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub commission: Vnd,
    pub farmer_amount: Vnd,
}

/// Split `amount` into the platform commission and the farmer's share. The rate is expressed in
/// basis points (300 = 3%). The commission rounds down, so the farmer never loses a đồng to
/// rounding.
pub fn split_commission(amount: Vnd, rate_bps: i64) -> CommissionSplit {
    let commission = Vnd::from(amount.value() * rate_bps / 10_000);
    CommissionSplit { commission, farmer_amount: amount - commission }
}
