use std::sync::{Mutex, Once};

use anchor_lang::solana_program::program_stubs::{self, SyscallStubs};
use anchor_lang::solana_program::{account_info::AccountInfo, entrypoint::ProgramResult};
use anchor_lang::AccountDeserialize;
use anchor_lang::Event;
use anchor_lang::InstructionData;
use anchor_lang::ToAccountMetas;
use anchor_spl::token_2022::spl_token_2022::instruction as token_instruction;
use solana_program_test::*;
use solana_sdk::{
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::{Transaction, TransactionError},
};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account_idempotent,
};
use swap::state::Offer;

// Re-export for convenience
pub use solana_program_test::{BanksClientError, ProgramTestContext};

// Custom error type for fuzzing
pub type FuzzResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Test environment with program loaded
pub struct FuzzTestEnv {
    pub program_id: Pubkey,
    pub context: ProgramTestContext,
}

/// Token mint accounts
#[derive(Debug)]
pub struct MintAccounts {
    pub mint: Pubkey,
    pub mint_authority: Keypair,
    pub decimals: u8,
    /// SPL Token or Token-2022
    pub token_program: Pubkey,
}

/// A funded wallet with associated token accounts for both swap mints
#[derive(Debug)]
pub struct UserAccounts {
    pub owner: Keypair,
    pub token_account_a: Pubkey,
    pub token_account_b: Pubkey,
}

/// Addresses of one offer and its vault
#[derive(Debug, Clone)]
pub struct OfferAccounts {
    pub offer_id: u64,
    pub offer: Pubkey,
    pub vault: Pubkey,
}

/// Complete setup: two mints, a maker holding token A, a taker holding token B
pub struct SwapSetup {
    /// Token program owning both mints and every token account
    pub token_program: Pubkey,
    pub mint_a: MintAccounts,
    pub mint_b: MintAccounts,
    pub maker: UserAccounts,
    pub taker: UserAccounts,
}

// ============================================================================
// Core Setup Functions
// ============================================================================

/// Anchor's entrypoint wants the account slice and the accounts to share one
/// lifetime, which the native test processor cannot promise. The list is moved
/// to the heap for the duration of the call and freed once `entry` returns.
fn process_swap_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    data: &[u8],
) -> ProgramResult {
    let accounts = Box::into_raw(Box::new(accounts.to_vec()));
    // SAFETY: `accounts` stays valid until the `Box::from_raw` below, and
    // nothing `entry` returns borrows from it.
    let result = swap::entry(program_id, unsafe { &*accounts }, data);
    drop(unsafe { Box::from_raw(accounts) });
    result
}

/// Creates the program test environment with the swap program loaded
pub async fn setup_program_test() -> FuzzTestEnv {
    let program_id = swap::id();
    let mut program_test = ProgramTest::new(
        "swap",
        program_id,
        processor!(process_swap_instruction),
    );
    program_test.prefer_bpf(false);

    let context = program_test.start_with_context().await;
    record_emitted_events();

    FuzzTestEnv {
        program_id,
        context,
    }
}

/// Sends lamports from the test payer so `wallet` can pay fees and rent
pub async fn fund_wallet(context: &mut ProgramTestContext, wallet: &Pubkey) -> FuzzResult<()> {
    let rent = context.banks_client.get_rent().await?;
    let lamports = rent.minimum_balance(0) + 1_000_000_000; // 1 SOL

    let ix = solana_sdk::system_instruction::transfer(&context.payer.pubkey(), wallet, lamports);

    let tx = Transaction::new_signed_with_payer(
        &[ix],
        Some(&context.payer.pubkey()),
        &[&context.payer],
        context.last_blockhash,
    );

    context.banks_client.process_transaction(tx).await?;

    Ok(())
}

/// Creates a new mint owned by `token_program`
pub async fn setup_mint(
    context: &mut ProgramTestContext,
    token_program: &Pubkey,
    decimals: u8,
) -> FuzzResult<MintAccounts> {
    let mint_authority = Keypair::new();
    let mint_keypair = Keypair::new();
    let mint = mint_keypair.pubkey();

    let rent = context.banks_client.get_rent().await?;
    let mint_len = 82; // Base Mint size, shared by Token-2022 without extensions
    let mint_rent = rent.minimum_balance(mint_len);

    // Create mint account
    let create_account_ix = solana_sdk::system_instruction::create_account(
        &context.payer.pubkey(),
        &mint,
        mint_rent,
        mint_len as u64,
        token_program,
    );

    // Initialize mint
    let init_mint_ix = token_instruction::initialize_mint(
        token_program,
        &mint,
        &mint_authority.pubkey(),
        None,
        decimals,
    )?;

    let tx = Transaction::new_signed_with_payer(
        &[create_account_ix, init_mint_ix],
        Some(&context.payer.pubkey()),
        &[&context.payer, &mint_keypair],
        context.last_blockhash,
    );

    context.banks_client.process_transaction(tx).await?;

    Ok(MintAccounts {
        mint,
        mint_authority,
        decimals,
        token_program: *token_program,
    })
}

/// Creates a funded wallet with associated token accounts for both mints
pub async fn setup_user(
    context: &mut ProgramTestContext,
    mint_a: &MintAccounts,
    mint_b: &MintAccounts,
) -> FuzzResult<UserAccounts> {
    let owner = Keypair::new();
    fund_wallet(context, &owner.pubkey()).await?;

    let create_a_ix = create_associated_token_account_idempotent(
        &context.payer.pubkey(),
        &owner.pubkey(),
        &mint_a.mint,
        &mint_a.token_program,
    );
    let create_b_ix = create_associated_token_account_idempotent(
        &context.payer.pubkey(),
        &owner.pubkey(),
        &mint_b.mint,
        &mint_b.token_program,
    );

    let tx = Transaction::new_signed_with_payer(
        &[create_a_ix, create_b_ix],
        Some(&context.payer.pubkey()),
        &[&context.payer],
        context.last_blockhash,
    );

    context.banks_client.process_transaction(tx).await?;

    Ok(UserAccounts {
        token_account_a: associated_token_address(&owner.pubkey(), &mint_a.mint, &mint_a.token_program),
        token_account_b: associated_token_address(&owner.pubkey(), &mint_b.mint, &mint_b.token_program),
        owner,
    })
}

/// Mints tokens to a token account
pub async fn mint_tokens(
    context: &mut ProgramTestContext,
    mint: &MintAccounts,
    destination: &Pubkey,
    amount: u64,
) -> FuzzResult<()> {
    let mint_to_ix = token_instruction::mint_to(
        &mint.token_program,
        &mint.mint,
        destination,
        &mint.mint_authority.pubkey(),
        &[],
        amount,
    )?;

    let tx = Transaction::new_signed_with_payer(
        &[mint_to_ix],
        Some(&context.payer.pubkey()),
        &[&context.payer, &mint.mint_authority],
        context.last_blockhash,
    );

    context.banks_client.process_transaction(tx).await?;

    Ok(())
}

/// Sets up everything under `token_program`: two mints, a maker holding
/// `maker_balance_a` of token A and a taker holding `taker_balance_b` of token B
pub async fn setup_swap_environment(
    token_program: &Pubkey,
    maker_balance_a: u64,
    taker_balance_b: u64,
    decimals: u8,
) -> FuzzResult<(FuzzTestEnv, SwapSetup)> {
    let mut env = setup_program_test().await;

    let mint_a = setup_mint(&mut env.context, token_program, decimals).await?;
    let mint_b = setup_mint(&mut env.context, token_program, decimals).await?;

    let maker = setup_user(&mut env.context, &mint_a, &mint_b).await?;
    let taker = setup_user(&mut env.context, &mint_a, &mint_b).await?;

    if maker_balance_a > 0 {
        mint_tokens(&mut env.context, &mint_a, &maker.token_account_a, maker_balance_a).await?;
    }

    if taker_balance_b > 0 {
        mint_tokens(&mut env.context, &mint_b, &taker.token_account_b, taker_balance_b).await?;
    }

    let setup = SwapSetup {
        token_program: *token_program,
        mint_a,
        mint_b,
        maker,
        taker,
    };

    Ok((env, setup))
}

// ============================================================================
// Instruction Builders
// ============================================================================

/// Addresses `make_offer` will create for `maker` and `offer_id`
pub fn offer_accounts(
    program_id: &Pubkey,
    maker: &Pubkey,
    mint_a: &Pubkey,
    token_program: &Pubkey,
    offer_id: u64,
) -> OfferAccounts {
    let (offer, _) = derive_offer_pda(program_id, maker, offer_id);
    let vault = associated_token_address(&offer, mint_a, token_program);

    OfferAccounts {
        offer_id,
        offer,
        vault,
    }
}

pub fn make_offer_ix(
    program_id: &Pubkey,
    maker: &Pubkey,
    mint_a: &Pubkey,
    mint_b: &Pubkey,
    token_program: &Pubkey,
    offer_id: u64,
    token_a_offered_amount: u64,
    token_b_wanted_amount: u64,
) -> Instruction {
    let offer = offer_accounts(program_id, maker, mint_a, token_program, offer_id);

    let accounts = swap::accounts::MakeOffer {
        maker: *maker,
        token_mint_a: *mint_a,
        token_mint_b: *mint_b,
        maker_token_account_a: associated_token_address(maker, mint_a, token_program),
        offer: offer.offer,
        vault: offer.vault,
        associated_token_program: spl_associated_token_account::id(),
        token_program: *token_program,
        system_program: solana_sdk::system_program::ID,
    };

    let data = swap::instruction::MakeOffer {
        offer_id,
        token_a_offered_amount,
        token_b_wanted_amount,
    }
    .data();

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data,
    }
}

pub fn take_offer_ix(
    program_id: &Pubkey,
    taker: &Pubkey,
    maker: &Pubkey,
    mint_a: &Pubkey,
    mint_b: &Pubkey,
    token_program: &Pubkey,
    offer: &OfferAccounts,
    token_b_offered_amount: u64,
) -> Instruction {
    let accounts = swap::accounts::TakeOffer {
        taker: *taker,
        maker: *maker,
        token_mint_a: *mint_a,
        token_mint_b: *mint_b,
        taker_token_account_a: associated_token_address(taker, mint_a, token_program),
        taker_token_account_b: associated_token_address(taker, mint_b, token_program),
        maker_token_account_b: associated_token_address(maker, mint_b, token_program),
        offer: offer.offer,
        vault: offer.vault,
        associated_token_program: spl_associated_token_account::id(),
        token_program: *token_program,
        system_program: solana_sdk::system_program::ID,
    };

    let data = swap::instruction::TakeOffer {
        token_b_offered_amount,
    }
    .data();

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data,
    }
}

pub fn cancel_offer_ix(
    program_id: &Pubkey,
    maker: &Pubkey,
    mint_a: &Pubkey,
    token_program: &Pubkey,
    offer: &OfferAccounts,
) -> Instruction {
    let accounts = swap::accounts::CancelOffer {
        maker: *maker,
        token_mint_a: *mint_a,
        maker_token_account_a: associated_token_address(maker, mint_a, token_program),
        offer: offer.offer,
        vault: offer.vault,
        associated_token_program: spl_associated_token_account::id(),
        token_program: *token_program,
        system_program: solana_sdk::system_program::ID,
    };

    let data = swap::instruction::CancelOffer {}.data();

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data,
    }
}

/// Signs `ix` with `payer` (fee payer) plus `signers` and processes it,
/// returning the raw banks error so callers can inspect the program error code
pub async fn send_instruction(
    context: &mut ProgramTestContext,
    ix: Instruction,
    payer: &Keypair,
    signers: &[&Keypair],
) -> Result<(), BanksClientError> {
    let mut all_signers = vec![payer];
    all_signers.extend_from_slice(signers);

    let tx = Transaction::new_signed_with_payer(
        &[ix],
        Some(&payer.pubkey()),
        &all_signers,
        context.last_blockhash,
    );

    context.banks_client.process_transaction(tx).await
}

/// Custom program error code carried by a failed transaction, if any
pub fn program_error_code(err: &BanksClientError) -> Option<u32> {
    match err {
        BanksClientError::TransactionError(TransactionError::InstructionError(
            _,
            InstructionError::Custom(code),
        ))
        | BanksClientError::SimulationError {
            err: TransactionError::InstructionError(_, InstructionError::Custom(code)),
            ..
        } => Some(*code),
        _ => None,
    }
}

// ============================================================================
// PDA Derivation Helpers
// ============================================================================

/// Derive offer PDA
pub fn derive_offer_pda(program_id: &Pubkey, maker: &Pubkey, offer_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[swap::OFFER_SEED, maker.as_ref(), &offer_id.to_le_bytes()],
        program_id,
    )
}

/// Associated token account of `wallet` for `mint` under `token_program`
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(wallet, mint, token_program)
}

// ============================================================================
// Account State Verification Helpers
// ============================================================================

/// Fetch and return offer state
pub async fn get_offer_state(context: &mut ProgramTestContext, offer: &Pubkey) -> FuzzResult<Offer> {
    let account = context
        .banks_client
        .get_account(*offer)
        .await?
        .ok_or("Offer account not found")?;

    let offer_data = Offer::try_deserialize(&mut account.data.as_ref())?;
    Ok(offer_data)
}

/// Whether an account currently exists on the ledger
pub async fn account_exists(context: &mut ProgramTestContext, address: &Pubkey) -> FuzzResult<bool> {
    let account = context.banks_client.get_account(*address).await?;
    Ok(account.is_some_and(|account| account.lamports > 0))
}

/// Get token account balance
pub async fn get_token_balance(context: &mut ProgramTestContext, account: &Pubkey) -> FuzzResult<u64> {
    let account_data = context
        .banks_client
        .get_account(*account)
        .await?
        .ok_or("Token account not found")?;

    // Token account structure: amount is at offset 64 (u64)
    if account_data.data.len() < 72 {
        return Err("Invalid token account data".into());
    }

    let amount = u64::from_le_bytes(
        account_data.data[64..72]
            .try_into()
            .map_err(|_| "Failed to parse amount")?,
    );

    Ok(amount)
}

/// Token balances of every party in a swap, for before/after comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapBalances {
    pub maker_a: u64,
    pub maker_b: u64,
    pub taker_a: u64,
    pub taker_b: u64,
    pub vault_a: u64,
}

impl SwapBalances {
    pub fn total_a(&self) -> u128 {
        self.maker_a as u128 + self.taker_a as u128 + self.vault_a as u128
    }

    pub fn total_b(&self) -> u128 {
        self.maker_b as u128 + self.taker_b as u128
    }
}

/// Snapshot of all balances; a closed vault counts as zero
pub async fn get_swap_balances(
    context: &mut ProgramTestContext,
    setup: &SwapSetup,
    offer: &OfferAccounts,
) -> FuzzResult<SwapBalances> {
    let vault_a = if account_exists(context, &offer.vault).await? {
        get_token_balance(context, &offer.vault).await?
    } else {
        0
    };

    Ok(SwapBalances {
        maker_a: get_token_balance(context, &setup.maker.token_account_a).await?,
        maker_b: get_token_balance(context, &setup.maker.token_account_b).await?,
        taker_a: get_token_balance(context, &setup.taker.token_account_a).await?,
        taker_b: get_token_balance(context, &setup.taker.token_account_b).await?,
        vault_a,
    })
}

// ============================================================================
// Event Capture
// ============================================================================

/// Every `sol_log_data` payload written by the swap program in this process
static EMITTED_DATA: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());

/// The native runtime only prints `emit!` payloads to stdout. This keeps a
/// copy of each one and forwards every syscall to the program-test stubs.
struct EventRecorder {
    runtime: Box<dyn SyscallStubs>,
}

struct Detached;

impl SyscallStubs for Detached {}

impl SyscallStubs for EventRecorder {
    fn sol_log(&self, message: &str) {
        self.runtime.sol_log(message)
    }

    fn sol_log_compute_units(&self) {
        self.runtime.sol_log_compute_units()
    }

    fn sol_remaining_compute_units(&self) -> u64 {
        self.runtime.sol_remaining_compute_units()
    }

    fn sol_invoke_signed(
        &self,
        instruction: &Instruction,
        account_infos: &[AccountInfo],
        signers_seeds: &[&[&[u8]]],
    ) -> ProgramResult {
        self.runtime
            .sol_invoke_signed(instruction, account_infos, signers_seeds)
    }

    fn sol_get_sysvar(
        &self,
        sysvar_id_addr: *const u8,
        var_addr: *mut u8,
        offset: u64,
        length: u64,
    ) -> u64 {
        self.runtime
            .sol_get_sysvar(sysvar_id_addr, var_addr, offset, length)
    }

    fn sol_get_clock_sysvar(&self, var_addr: *mut u8) -> u64 {
        self.runtime.sol_get_clock_sysvar(var_addr)
    }

    fn sol_get_epoch_schedule_sysvar(&self, var_addr: *mut u8) -> u64 {
        self.runtime.sol_get_epoch_schedule_sysvar(var_addr)
    }

    fn sol_get_fees_sysvar(&self, var_addr: *mut u8) -> u64 {
        self.runtime.sol_get_fees_sysvar(var_addr)
    }

    fn sol_get_rent_sysvar(&self, var_addr: *mut u8) -> u64 {
        self.runtime.sol_get_rent_sysvar(var_addr)
    }

    fn sol_get_epoch_rewards_sysvar(&self, var_addr: *mut u8) -> u64 {
        self.runtime.sol_get_epoch_rewards_sysvar(var_addr)
    }

    fn sol_get_last_restart_slot(&self, var_addr: *mut u8) -> u64 {
        self.runtime.sol_get_last_restart_slot(var_addr)
    }

    fn sol_get_epoch_stake(&self, vote_address: *const u8) -> u64 {
        self.runtime.sol_get_epoch_stake(vote_address)
    }

    fn sol_get_return_data(&self) -> Option<(Pubkey, Vec<u8>)> {
        self.runtime.sol_get_return_data()
    }

    fn sol_set_return_data(&self, data: &[u8]) {
        self.runtime.sol_set_return_data(data)
    }

    fn sol_log_data(&self, fields: &[&[u8]]) {
        let mut emitted = EMITTED_DATA.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        emitted.extend(fields.iter().map(|field| field.to_vec()));
        drop(emitted);

        self.runtime.sol_log_data(fields)
    }

    fn sol_get_processed_sibling_instruction(&self, index: usize) -> Option<Instruction> {
        self.runtime.sol_get_processed_sibling_instruction(index)
    }

    fn sol_get_stack_height(&self) -> u64 {
        self.runtime.sol_get_stack_height()
    }
}

/// Wraps the program-test stubs once per process. Must run after the first
/// `start_with_context`, which installs them.
fn record_emitted_events() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let runtime = program_stubs::set_syscall_stubs(Box::new(Detached));
        program_stubs::set_syscall_stubs(Box::new(EventRecorder { runtime }));
    });
}

/// Every `E` emitted so far by any test in this process, oldest first.
/// Tests run in parallel, so callers filter by their own offer address.
pub fn emitted_events<E: Event>() -> Vec<E> {
    let emitted = EMITTED_DATA.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    emitted
        .iter()
        .filter_map(|payload| payload.strip_prefix(E::DISCRIMINATOR))
        .filter_map(|body| E::try_from_slice(body).ok())
        .collect()
}
