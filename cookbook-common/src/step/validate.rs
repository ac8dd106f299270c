use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;
use num_bigint::BigUint;

use crate::{
    models::{format_address, token::StepERC20Balance},
    step::{StepError, StepInput, UnvalidatedStepOutput},
};

fn totals<'a>(items: impl Iterator<Item = (&'a Address, &'a BigUint)>) -> HashMap<Address, BigUint> {
    let mut totals: HashMap<Address, BigUint> = HashMap::new();
    for (token, amount) in items {
        *totals.entry(*token).or_default() += amount;
    }
    totals
}

/// Checks a step's raw output against the input it was given.
pub(super) fn validate_step_output(
    step: &str,
    input: &StepInput,
    output: &UnvalidatedStepOutput,
) -> Result<(), StepError> {
    let violation = |msg: String| StepError::InvariantViolation { step: step.to_string(), msg };

    let available = totals(
        input
            .erc20_amounts
            .iter()
            .map(|b| (&b.token_address, &b.expected_balance)),
    );
    let spent = totals(
        output
            .spent_erc20_amounts
            .iter()
            .map(|s| (&s.token_address, &s.amount)),
    );
    let fees = totals(
        output
            .fee_erc20_amount_recipients
            .iter()
            .map(|f| (&f.token_address, &f.amount)),
    );
    let produced = totals(
        output
            .output_erc20_amounts
            .iter()
            .map(|b| (&b.token_address, &b.expected_balance)),
    );

    let zero = BigUint::default();
    let mut settled = HashSet::new();
    for token in spent.keys().chain(fees.keys()) {
        if !settled.insert(*token) {
            continue;
        }
        let spent_amount = spent.get(token).unwrap_or(&zero);
        let fee = fees.get(token).unwrap_or(&zero);
        let out = produced.get(token).unwrap_or(&zero);
        let Some(balance) = available.get(token) else {
            if spent.contains_key(token) {
                return Err(violation(format!("spent token {} is not in the input", format_address(token))));
            }
            // a step may charge a fee on what it produces, e.g. a vault withdraw fee
            if !produced.contains_key(token) {
                return Err(violation(format!(
                    "charges a fee on {} which it neither received nor produced",
                    format_address(token)
                )));
            }
            continue;
        };
        if !spent.contains_key(token) && out > balance {
            // fee charged on a produced token the input already held; held entries pass through
            settled.remove(token);
            continue;
        }
        let charged = spent_amount + fee;
        if charged > *balance {
            return Err(violation(format!(
                "spends {spent_amount} and charges {fee} of {} but only {balance} is available",
                format_address(token)
            )));
        }
        let remainder = balance - &charged;
        if *out > remainder {
            return Err(violation(format!(
                "outputs {out} of {} but only {remainder} remains",
                format_address(token)
            )));
        }
        if !spent.contains_key(token) && *out != remainder {
            return Err(violation(format!(
                "charges a fee of {fee} on {} but outputs {out} instead of {remainder}",
                format_address(token)
            )));
        }
    }

    for nft in output.spent_nfts.iter() {
        let held = input
            .nfts
            .iter()
            .any(|n| n.same_asset(nft) && n.amount >= nft.amount);
        if !held {
            return Err(violation(format!(
                "spent NFT {} #{} is not in the input",
                format_address(&nft.nft_address),
                nft.token_sub_id
            )));
        }
    }
    for nft in input.nfts.iter() {
        let spent = output
            .spent_nfts
            .iter()
            .any(|n| n.same_asset(nft));
        if !spent && !output.output_nfts.contains(nft) {
            return Err(violation(format!(
                "dropped NFT {} #{} without spending it",
                format_address(&nft.nft_address),
                nft.token_sub_id
            )));
        }
    }

    if let Some(bad) = output
        .output_erc20_amounts
        .iter()
        .find(|b| !b.has_valid_bounds())
    {
        return Err(violation(format!(
            "output {} has min balance {} above expected balance {}",
            format_address(&bad.token_address),
            bad.min_balance,
            bad.expected_balance
        )));
    }

    check_pass_through(input, output, &settled).map_err(violation)?;

    Ok(())
}

/// Every input entry of a token the step has not settled by spending or charging it must come
/// out unchanged.
fn check_pass_through(
    input: &StepInput,
    output: &UnvalidatedStepOutput,
    settled: &HashSet<Address>,
) -> Result<(), String> {
    let mut claimed = vec![false; output.output_erc20_amounts.len()];
    let untouched = input
        .erc20_amounts
        .iter()
        .filter(|b| !settled.contains(&b.token_address));

    for balance in untouched {
        let found = output
            .output_erc20_amounts
            .iter()
            .enumerate()
            .find(|(i, o)| !claimed[*i] && same_entry(balance, o));
        match found {
            Some((i, _)) => claimed[i] = true,
            None => {
                return Err(format!(
                    "balance {} of {} was neither spent nor passed through",
                    balance.expected_balance,
                    format_address(&balance.token_address)
                ))
            }
        }
    }
    Ok(())
}

fn same_entry(a: &StepERC20Balance, b: &StepERC20Balance) -> bool {
    a.same_balances(b) && a.decimals == b.decimals && a.is_base_token == b.is_base_token
}
