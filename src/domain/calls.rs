//! Contract calls - ABI-encoded calls for the collateral token, the market
//! factory and the markets.
//!
//! Each builder returns a [`ContractCall`]: target address, method label for
//! logs, and calldata ready for the ledger transport.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use super::position::PositionModificationRequest;

sol! {
    /// Collateral token (USDC on testnets exposes a public `mint`).
    interface ICollateralToken {
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256 balance);
        function mint(address to, uint256 amount) external;
    }

    /// Market factory; operators act on behalf of an account across markets.
    interface IMarketFactory {
        function updateOperator(address operator, bool newEnabled) external;
    }

    /// V2 market. Sizes are UFixed6, collateral is Fixed6.
    interface IMarket {
        function update(
            address account,
            uint256 newMaker,
            uint256 newLong,
            uint256 newShort,
            int256 collateral,
            bool protect
        ) external;
    }
}

/// A call ready to be submitted or executed read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub method: &'static str,
    pub data: Bytes,
}

impl ContractCall {
    fn new<C: SolCall>(to: Address, call: &C) -> Self {
        Self {
            to,
            method: C::SIGNATURE,
            data: Bytes::from(call.abi_encode()),
        }
    }
}

/// `approve(spender, amount)` on the collateral token.
pub fn approve_collateral(token: Address, spender: Address, amount: U256) -> ContractCall {
    ContractCall::new(token, &ICollateralToken::approveCall { spender, amount })
}

/// `balanceOf(account)` on the collateral token.
pub fn collateral_balance_of(token: Address, account: Address) -> ContractCall {
    ContractCall::new(token, &ICollateralToken::balanceOfCall { account })
}

/// Testnet faucet `mint(to, amount)` on the collateral token.
pub fn mint_collateral(token: Address, to: Address, amount: U256) -> ContractCall {
    ContractCall::new(token, &ICollateralToken::mintCall { to, amount })
}

/// `updateOperator(operator, true)` on the market factory.
pub fn approve_operator(factory: Address, operator: Address) -> ContractCall {
    ContractCall::new(
        factory,
        &IMarketFactory::updateOperatorCall {
            operator,
            newEnabled: true,
        },
    )
}

/// Market `update` carrying the requested side, size and collateral delta.
pub fn modify_position(
    market: Address,
    account: Address,
    request: &PositionModificationRequest,
) -> ContractCall {
    let targets = request.targets();
    ContractCall::new(
        market,
        &IMarket::updateCall {
            account,
            newMaker: targets.maker,
            newLong: targets.long,
            newShort: targets.short,
            collateral: request.collateral_delta,
            protect: false,
        },
    )
}

/// Decode the return data of a `balanceOf` read.
///
/// # Errors
/// Malformed return data.
pub fn decode_balance(data: &[u8]) -> alloy::sol_types::Result<U256> {
    ICollateralToken::balanceOfCall::abi_decode_returns(data, true).map(|ret| ret.balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::PositionSide;
    use alloy::primitives::{I256, address};
    use rust_decimal_macros::dec;

    const TOKEN: Address = address!("0x00000000000000000000000000000000000000aa");
    const SPENDER: Address = address!("0x00000000000000000000000000000000000000bb");
    const ACCOUNT: Address = address!("0x00000000000000000000000000000000000000cc");

    #[test]
    fn test_approve_selector_and_target() {
        let call = approve_collateral(TOKEN, SPENDER, U256::MAX);
        assert_eq!(call.to, TOKEN);
        assert_eq!(call.method, "approve(address,uint256)");
        // approve(address,uint256) = 0x095ea7b3
        assert_eq!(&call.data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(call.data.len(), 4 + 32 * 2);
    }

    #[test]
    fn test_balance_of_selector() {
        let call = collateral_balance_of(TOKEN, ACCOUNT);
        // balanceOf(address) = 0x70a08231
        assert_eq!(&call.data[..4], &[0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn test_operator_approval_enables() {
        let call = approve_operator(TOKEN, SPENDER);
        let decoded = IMarketFactory::updateOperatorCall::abi_decode(&call.data, true).unwrap();
        assert_eq!(decoded.operator, SPENDER);
        assert!(decoded.newEnabled);
    }

    #[test]
    fn test_modify_position_encodes_side_and_collateral() {
        let request =
            PositionModificationRequest::from_decimals(PositionSide::Short, dec!(2), dec!(-10))
                .unwrap();
        let call = modify_position(SPENDER, ACCOUNT, &request);
        assert_eq!(call.to, SPENDER);

        let decoded = IMarket::updateCall::abi_decode(&call.data, true).unwrap();
        assert_eq!(decoded.account, ACCOUNT);
        assert_eq!(decoded.newShort, U256::from(2_000_000u64));
        assert_eq!(decoded.newLong, U256::ZERO);
        assert_eq!(decoded.newMaker, U256::ZERO);
        assert_eq!(decoded.collateral, I256::try_from(-10_000_000i64).unwrap());
        assert!(!decoded.protect);
    }

    #[test]
    fn test_decode_balance() {
        let mut word = [0u8; 32];
        word[31] = 42;
        assert_eq!(decode_balance(&word).unwrap(), U256::from(42u64));
        assert!(decode_balance(&[0u8; 3]).is_err());
    }
}
