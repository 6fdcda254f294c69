use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{Mint, TokenAccount, TokenInterface},
};

use crate::error::SwapError;
use crate::events::OfferCancelled;
use crate::state::{Offer, Vault};

#[derive(Accounts)]
pub struct CancelOffer<'info> {
    /// Only the maker of the offer may reclaim its deposit
    #[account(mut)]
    pub maker: Signer<'info>,

    #[account(mint::token_program = token_program)]
    pub token_mint_a: Box<InterfaceAccount<'info, Mint>>,

    /// Receives the refunded token A
    #[account(
        init_if_needed,
        payer = maker,
        associated_token::mint = token_mint_a,
        associated_token::authority = maker,
        associated_token::token_program = token_program,
    )]
    pub maker_token_account_a: Box<InterfaceAccount<'info, TokenAccount>>,

    /// CHECK: decoded by `Offer::load`, which re-derives its address from the
    /// stored terms
    #[account(mut)]
    pub offer: UncheckedAccount<'info>,

    /// CHECK: must be the offer's vault, verified by `Vault::balance`
    #[account(mut)]
    pub vault: UncheckedAccount<'info>,

    pub associated_token_program: Program<'info, AssociatedToken>,
    pub token_program: Interface<'info, TokenInterface>,
    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<CancelOffer>) -> Result<()> {
    let accounts = &ctx.accounts;

    let offer = Offer::load(&accounts.offer)?;
    require_keys_eq!(offer.maker, accounts.maker.key(), SwapError::Unauthorized);
    require_keys_eq!(
        offer.token_mint_a,
        accounts.token_mint_a.key(),
        SwapError::OfferAccountMismatch
    );

    let vault = Vault {
        account: &accounts.vault,
        offer: &accounts.offer,
        mint: &accounts.token_mint_a,
        token_program: &accounts.token_program,
    };
    let refund = vault.balance(&offer)?;

    let maker = accounts.maker.to_account_info();
    vault.release_and_close(
        &offer,
        &accounts.maker_token_account_a.to_account_info(),
        &maker,
        refund,
    )?;
    Offer::close(&accounts.offer, &maker)?;

    emit!(OfferCancelled {
        offer: accounts.offer.key(),
        offer_id: offer.id,
        maker: offer.maker,
        token_a_refunded: refund,
    });

    msg!("Offer cancelled!");
    msg!("Offer: {}", accounts.offer.key());
    msg!("Refunded: {} of mint {}", refund, offer.token_mint_a);

    Ok(())
}
