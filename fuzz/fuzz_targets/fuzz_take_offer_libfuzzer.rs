#![no_main]

use arbitrary::Arbitrary;
use fuzz_helpers::*;
use libfuzzer_sys::fuzz_target;
use solana_sdk::signature::Signer;
use swap::error::SwapError;

/// Fuzzable input for the make + take lifecycle
#[derive(Debug, Clone, Arbitrary)]
struct TakeOfferFuzzInput {
    /// Offer identifier chosen by the maker
    offer_id: u64,
    /// Token A deposited into the vault
    token_a_offered_amount: u64,
    /// Token B price named by the maker
    token_b_wanted_amount: u64,
    /// Token B the taker supplies (often, but not always, the exact price)
    token_b_offered_amount: u64,
    /// Whether the taker pays the exact price instead of the fuzzed amount
    pay_exact_price: bool,
    /// Taker balance of token B on top of (or below) the price
    taker_balance_b: u64,
    /// Token decimals (for setup)
    decimals: u8,
    /// Run both mints under Token-2022 instead of SPL Token
    token_2022: bool,
    /// Whether to try taking the same offer a second time
    replay: bool,
}

/// Execute a single fuzz iteration for the take_offer instruction
async fn fuzz_take_offer_once(input: TakeOfferFuzzInput) -> FuzzResult<()> {
    // Zero amounts are covered by make_offer's own fuzz target
    let token_a_offered_amount = input.token_a_offered_amount.max(1);
    let token_b_wanted_amount = input.token_b_wanted_amount.max(1);
    let token_b_offered_amount = if input.pay_exact_price {
        token_b_wanted_amount
    } else {
        input.token_b_offered_amount
    };
    let decimals = input.decimals % 10;
    let token_program = if input.token_2022 {
        anchor_spl::token_2022::ID
    } else {
        spl_token::id()
    };

    let (mut env, setup) = match setup_swap_environment(
        &token_program,
        token_a_offered_amount,
        input.taker_balance_b,
        decimals,
    )
    .await
    {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Setup failed: {}", e);
            return Ok(()); // Skip this iteration if setup fails
        }
    };

    let maker = setup.maker.owner.pubkey();
    let taker = setup.taker.owner.pubkey();

    let ix = make_offer_ix(
        &env.program_id,
        &maker,
        &setup.mint_a.mint,
        &setup.mint_b.mint,
        &token_program,
        input.offer_id,
        token_a_offered_amount,
        token_b_wanted_amount,
    );
    if send_instruction(&mut env.context, ix, &setup.maker.owner, &[])
        .await
        .is_err()
    {
        return Ok(()); // Skip if the offer could not be made
    }

    let offer = offer_accounts(
        &env.program_id,
        &maker,
        &setup.mint_a.mint,
        &token_program,
        input.offer_id,
    );
    let before = get_swap_balances(&mut env.context, &setup, &offer).await?;

    assert_eq!(
        before.vault_a, token_a_offered_amount,
        "Vault must hold exactly the deposit after make_offer"
    );

    let ix = take_offer_ix(
        &env.program_id,
        &taker,
        &maker,
        &setup.mint_a.mint,
        &setup.mint_b.mint,
        &token_program,
        &offer,
        token_b_offered_amount,
    );
    let result = send_instruction(&mut env.context, ix, &setup.taker.owner, &[]).await;

    let after = get_swap_balances(&mut env.context, &setup, &offer).await?;

    // PROPERTY 1: CONSERVATION OF TOKENS, whatever the outcome
    assert_eq!(
        before.total_a(),
        after.total_a(),
        "CRITICAL: token A conservation violated! Before: {:?}, After: {:?}",
        before,
        after
    );
    assert_eq!(
        before.total_b(),
        after.total_b(),
        "CRITICAL: token B conservation violated! Before: {:?}, After: {:?}",
        before,
        after
    );

    let offer_open = account_exists(&mut env.context, &offer.offer).await?;
    let vault_open = account_exists(&mut env.context, &offer.vault).await?;

    // PROPERTY 2: SHARED LIFECYCLE - offer and vault exist together or not at all
    assert_eq!(
        offer_open, vault_open,
        "CRITICAL: offer and vault lifecycles diverged (offer={}, vault={})",
        offer_open, vault_open
    );

    match result {
        Ok(()) => {
            // PROPERTY 3: EXACT PRICE
            assert_eq!(
                token_b_offered_amount, token_b_wanted_amount,
                "CRITICAL: take_offer settled at a price other than the offer's"
            );

            // PROPERTY 4: ATOMICITY - both legs moved in full
            assert_eq!(after.taker_a, before.taker_a + token_a_offered_amount);
            assert_eq!(after.maker_b, before.maker_b + token_b_wanted_amount);
            assert_eq!(after.taker_b, before.taker_b - token_b_wanted_amount);
            assert_eq!(after.vault_a, 0);
            assert!(!offer_open, "Offer must be closed after settlement");

            // PROPERTY 5: SINGLE SETTLEMENT
            if input.replay {
                let payer = env.context.payer.insecure_clone();
                let ix = take_offer_ix(
                    &env.program_id,
                    &taker,
                    &maker,
                    &setup.mint_a.mint,
                    &setup.mint_b.mint,
                    &token_program,
                    &offer,
                    token_b_offered_amount,
                );
                let replay = send_instruction(&mut env.context, ix, &payer, &[&setup.taker.owner]).await;
                let err = replay.expect_err("CRITICAL: offer settled twice");
                assert_eq!(
                    program_error_code(&err),
                    Some(u32::from(SwapError::VaultNotFound)),
                    "Replay must fail as a stale offer, got {:?}",
                    err
                );
                assert_eq!(after, get_swap_balances(&mut env.context, &setup, &offer).await?);
            }

            println!(
                "✓ PASS [SETTLED] - a={}, b={}, all invariants ✓",
                token_a_offered_amount, token_b_wanted_amount
            );
        }
        Err(e) => {
            // PROPERTY 6: FAILED TAKE CHANGES NOTHING
            assert_eq!(before, after, "Failed take_offer moved tokens");
            assert!(offer_open, "Failed take_offer closed the offer");

            let code = program_error_code(&e);
            let acceptable_errors = [
                u32::from(SwapError::AmountMismatch),
                u32::from(SwapError::InsufficientFunds),
            ];

            if !code.is_some_and(|code| acceptable_errors.contains(&code)) {
                panic!(
                    "Unexpected error during take_offer: {:?}\nInput: {:?}",
                    e, input
                );
            }

            if token_b_offered_amount != token_b_wanted_amount {
                assert_eq!(code, Some(u32::from(SwapError::AmountMismatch)));
            }

            println!(
                "✗ take_offer rejected: wanted={}, offered={}, balance={}, error={:?}",
                token_b_wanted_amount, token_b_offered_amount, input.taker_balance_b, code
            );
        }
    }

    Ok(())
}

fuzz_target!(|input: TakeOfferFuzzInput| {
    // Run the async fuzz test
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        if let Err(e) = fuzz_take_offer_once(input).await {
            eprintln!("Fuzz iteration failed: {}", e);
        }
    });
});
