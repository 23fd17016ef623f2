//! Position modification requests and transaction outcomes.
//!
//! Amounts are 6-decimal fixed point (`UFixed6`/`Fixed6` on-chain): sizes are
//! unsigned, the collateral delta is signed (negative withdraws).

use std::fmt;

use alloy::primitives::{I256, TxHash, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::market::PositionSide;

/// Scale of the on-chain fixed-point types.
pub const FIXED6_DECIMALS: u32 = 6;

/// A requested change to an account's position in one market. Transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionModificationRequest {
    pub side: PositionSide,
    /// Absolute position size for `side`, 6 decimals.
    pub size: U256,
    /// Collateral to deposit (positive) or withdraw (negative), 6 decimals.
    pub collateral_delta: I256,
}

/// Per-side position slots as taken by the market `update` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionTargets {
    pub maker: U256,
    pub long: U256,
    pub short: U256,
}

impl PositionModificationRequest {
    /// Build a request from human amounts (e.g. `1.5` ETH, `-250` USDC).
    ///
    /// # Errors
    /// Fails on negative sizes or amounts that do not fit 6-decimal fixed point.
    pub fn from_decimals(
        side: PositionSide,
        size: Decimal,
        collateral_delta: Decimal,
    ) -> Result<Self, AmountError> {
        Ok(Self {
            side,
            size: to_ufixed6(size)?,
            collateral_delta: to_fixed6(collateral_delta)?,
        })
    }

    /// Spread the size onto the slot selected by `side`; `None` closes all.
    pub fn targets(&self) -> PositionTargets {
        let mut targets = PositionTargets::default();
        match self.side {
            PositionSide::Maker => targets.maker = self.size,
            PositionSide::Long => targets.long = self.size,
            PositionSide::Short => targets.short = self.size,
            PositionSide::None => {}
        }
        targets
    }

    /// Collateral the market will pull from the account (zero on withdrawals).
    pub fn collateral_deposit(&self) -> U256 {
        if self.collateral_delta.is_negative() {
            U256::ZERO
        } else {
            self.collateral_delta.into_raw()
        }
    }
}

/// Execution status of an included transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Reverted,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Reverted => f.write_str("reverted"),
        }
    }
}

/// What the ledger reports once a transaction is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    pub tx_hash: TxHash,
    pub status: TxStatus,
}

impl TransactionOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self.status, TxStatus::Success)
    }
}

// ────────────────────────────────────────────
// Fixed-point conversions
// ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount {0} must not be negative")]
    Negative(Decimal),
    #[error("amount {0} has more than 6 decimal places")]
    TooPrecise(Decimal),
    #[error("amount {0} is out of range")]
    Overflow(Decimal),
}

fn scaled_mantissa(amount: Decimal) -> Result<i128, AmountError> {
    let normalized = amount.normalize();
    if normalized.scale() > FIXED6_DECIMALS {
        return Err(AmountError::TooPrecise(amount));
    }
    let factor = 10i128.pow(FIXED6_DECIMALS - normalized.scale());
    normalized
        .mantissa()
        .checked_mul(factor)
        .ok_or(AmountError::Overflow(amount))
}

/// Decimal → unsigned 6-decimal fixed point.
///
/// # Errors
/// Negative or over-precise input.
pub fn to_ufixed6(amount: Decimal) -> Result<U256, AmountError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative(amount));
    }
    let raw = scaled_mantissa(amount)?;
    u128::try_from(raw)
        .map(U256::from)
        .map_err(|_| AmountError::Overflow(amount))
}

/// Decimal → signed 6-decimal fixed point.
///
/// # Errors
/// Over-precise input.
pub fn to_fixed6(amount: Decimal) -> Result<I256, AmountError> {
    let raw = scaled_mantissa(amount)?;
    I256::try_from(raw).map_err(|_| AmountError::Overflow(amount))
}

/// Unsigned 6-decimal fixed point → Decimal, for display.
///
/// Values beyond `u64` whole units saturate; they only appear for
/// unlimited allowances.
pub fn from_ufixed6(raw: U256) -> Decimal {
    let units = u64::try_from(raw).unwrap_or(u64::MAX);
    Decimal::from_i128_with_scale(i128::from(units), FIXED6_DECIMALS)
}
