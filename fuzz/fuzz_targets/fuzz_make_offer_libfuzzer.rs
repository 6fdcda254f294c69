#![no_main]

use arbitrary::Arbitrary;
use fuzz_helpers::*;
use libfuzzer_sys::fuzz_target;
use solana_sdk::signature::Signer;
use swap::error::SwapError;

/// Fuzzable input for make_offer
#[derive(Debug, Clone, Arbitrary)]
struct MakeOfferFuzzInput {
    offer_id: u64,
    /// Token A to deposit (fuzzed, zero included)
    token_a_offered_amount: u64,
    /// Token B price (fuzzed, zero included)
    token_b_wanted_amount: u64,
    /// Maker's token A balance before the offer
    maker_balance_a: u64,
    /// Token decimals (for setup)
    decimals: u8,
    /// Run both mints under Token-2022 instead of SPL Token
    token_2022: bool,
    /// Whether to submit the same offer id a second time
    repeat_offer_id: bool,
}

/// Execute a single fuzz iteration for the make_offer instruction
async fn fuzz_make_offer_once(input: MakeOfferFuzzInput) -> FuzzResult<()> {
    let decimals = input.decimals % 10;
    let token_program = if input.token_2022 {
        anchor_spl::token_2022::ID
    } else {
        spl_token::id()
    };

    let (mut env, setup) = match setup_swap_environment(&token_program, input.maker_balance_a, 0, decimals).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Setup failed: {}", e);
            return Ok(()); // Skip this iteration if setup fails
        }
    };

    let maker = setup.maker.owner.pubkey();
    let offer = offer_accounts(
        &env.program_id,
        &maker,
        &setup.mint_a.mint,
        &token_program,
        input.offer_id,
    );

    let maker_balance_before = get_token_balance(&mut env.context, &setup.maker.token_account_a).await?;

    let ix = make_offer_ix(
        &env.program_id,
        &maker,
        &setup.mint_a.mint,
        &setup.mint_b.mint,
        &token_program,
        input.offer_id,
        input.token_a_offered_amount,
        input.token_b_wanted_amount,
    );
    let result = send_instruction(&mut env.context, ix, &setup.maker.owner, &[]).await;

    let maker_balance_after = get_token_balance(&mut env.context, &setup.maker.token_account_a).await?;
    let offer_open = account_exists(&mut env.context, &offer.offer).await?;
    let vault_open = account_exists(&mut env.context, &offer.vault).await?;

    // PROPERTY 1: SHARED LIFECYCLE
    assert_eq!(
        offer_open, vault_open,
        "CRITICAL: offer and vault lifecycles diverged (offer={}, vault={})",
        offer_open, vault_open
    );

    match result {
        Ok(()) => {
            let vault_balance = get_token_balance(&mut env.context, &offer.vault).await?;

            // PROPERTY 2: CONSERVATION - the deposit moved, nothing else
            assert_eq!(vault_balance, input.token_a_offered_amount);
            assert_eq!(
                maker_balance_after,
                maker_balance_before - input.token_a_offered_amount
            );

            // PROPERTY 3: RECORDED TERMS
            let state = get_offer_state(&mut env.context, &offer.offer).await?;
            assert_eq!(state.maker, maker);
            assert_eq!(state.id, input.offer_id);
            assert_eq!(state.token_b_wanted_amount, input.token_b_wanted_amount);
            assert!(input.token_a_offered_amount > 0 && input.token_b_wanted_amount > 0);

            // PROPERTY 4: NO OVERWRITE
            if input.repeat_offer_id {
                let ix = make_offer_ix(
                    &env.program_id,
                    &maker,
                    &setup.mint_a.mint,
                    &setup.mint_b.mint,
                    &token_program,
                    input.offer_id,
                    1,
                    input.token_b_wanted_amount.wrapping_add(1).max(1),
                );
                let err = send_instruction(&mut env.context, ix, &setup.maker.owner, &[])
                    .await
                    .expect_err("CRITICAL: open offer was overwritten");
                assert_eq!(
                    program_error_code(&err),
                    Some(u32::from(SwapError::DuplicateOffer))
                );
                assert_eq!(
                    get_token_balance(&mut env.context, &offer.vault).await?,
                    vault_balance
                );
            }

            println!(
                "✓ PASS [MADE] - id={}, a={}, b={}, all invariants ✓",
                input.offer_id, input.token_a_offered_amount, input.token_b_wanted_amount
            );
        }
        Err(e) => {
            assert!(!offer_open, "Failed make_offer left an offer behind");
            assert_eq!(maker_balance_before, maker_balance_after);

            let code = program_error_code(&e);
            let expected = if input.token_a_offered_amount == 0 || input.token_b_wanted_amount == 0 {
                SwapError::InvalidAmount
            } else {
                SwapError::InsufficientFunds
            };

            if code != Some(u32::from(expected)) {
                panic!(
                    "Unexpected error during make_offer: {:?}\nInput: {:?}",
                    e, input
                );
            }

            println!("✗ make_offer rejected: {:?}, error={:?}", input, code);
        }
    }

    Ok(())
}

fuzz_target!(|input: MakeOfferFuzzInput| {
    // Run the async fuzz test
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        if let Err(e) = fuzz_make_offer_once(input).await {
            eprintln!("Fuzz iteration failed: {}", e);
        }
    });
});
