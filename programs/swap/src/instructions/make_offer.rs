use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{Mint, TokenAccount, TokenInterface},
};

use crate::constants::OFFER_SEED;
use crate::error::SwapError;
use crate::events::OfferMade;
use crate::state::{vault, Offer};

#[derive(Accounts)]
#[instruction(offer_id: u64)]
pub struct MakeOffer<'info> {
    /// The maker depositing token A and paying for the new accounts
    #[account(mut)]
    pub maker: Signer<'info>,

    #[account(mint::token_program = token_program)]
    pub token_mint_a: Box<InterfaceAccount<'info, Mint>>,

    #[account(mint::token_program = token_program)]
    pub token_mint_b: Box<InterfaceAccount<'info, Mint>>,

    /// Maker's token A account, source of the deposit
    #[account(
        mut,
        associated_token::mint = token_mint_a,
        associated_token::authority = maker,
        associated_token::token_program = token_program,
    )]
    pub maker_token_account_a: Box<InterfaceAccount<'info, TokenAccount>>,

    /// The offer record. An already open offer at this address is rejected
    /// in the handler.
    #[account(
        init_if_needed,
        payer = maker,
        space = Offer::LEN,
        seeds = [OFFER_SEED, maker.key().as_ref(), offer_id.to_le_bytes().as_ref()],
        bump
    )]
    pub offer: Box<Account<'info, Offer>>,

    /// Custody account for token A, owned by the offer PDA
    #[account(
        init_if_needed,
        payer = maker,
        associated_token::mint = token_mint_a,
        associated_token::authority = offer,
        associated_token::token_program = token_program,
    )]
    pub vault: Box<InterfaceAccount<'info, TokenAccount>>,

    pub associated_token_program: Program<'info, AssociatedToken>,
    pub token_program: Interface<'info, TokenInterface>,
    pub system_program: Program<'info, System>,
}

pub fn handler(
    ctx: Context<MakeOffer>,
    offer_id: u64,
    token_a_offered_amount: u64,
    token_b_wanted_amount: u64,
) -> Result<()> {
    require!(token_a_offered_amount > 0, SwapError::InvalidAmount);
    require!(token_b_wanted_amount > 0, SwapError::InvalidAmount);
    require_keys_neq!(
        ctx.accounts.token_mint_a.key(),
        ctx.accounts.token_mint_b.key(),
        SwapError::InvalidTokenMint
    );
    require!(!ctx.accounts.offer.is_open(), SwapError::DuplicateOffer);

    let maker = ctx.accounts.maker.key();
    let token_mint_a = ctx.accounts.token_mint_a.key();
    let token_mint_b = ctx.accounts.token_mint_b.key();

    ctx.accounts.offer.set_inner(Offer {
        id: offer_id,
        maker,
        token_mint_a,
        token_mint_b,
        token_b_wanted_amount,
        bump: ctx.bumps.offer,
    });

    // Funding goes last; a failed transfer aborts the record with it.
    vault::fund(
        &ctx.accounts.maker_token_account_a,
        &ctx.accounts.vault,
        &ctx.accounts.token_mint_a,
        &ctx.accounts.maker.to_account_info(),
        &ctx.accounts.token_program,
        token_a_offered_amount,
    )?;

    let offer = ctx.accounts.offer.key();

    emit!(OfferMade {
        offer,
        offer_id,
        maker,
        token_mint_a,
        token_mint_b,
        token_a_offered_amount,
        token_b_wanted_amount,
    });

    msg!("Offer made!");
    msg!("Offer: {}", offer);
    msg!("Vault: {}", ctx.accounts.vault.key());
    msg!("Offered: {} of mint {}", token_a_offered_amount, token_mint_a);
    msg!("Wanted: {} of mint {}", token_b_wanted_amount, token_mint_b);

    Ok(())
}
