use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{Mint, TokenAccount, TokenInterface},
};

use crate::error::SwapError;
use crate::events::OfferTaken;
use crate::state::{vault, Offer, Vault};

#[derive(Accounts)]
pub struct TakeOffer<'info> {
    /// The taker paying token B and receiving token A
    #[account(mut)]
    pub taker: Signer<'info>,

    /// Receives token B and the rent of the closed offer and vault
    #[account(mut)]
    pub maker: SystemAccount<'info>,

    #[account(mint::token_program = token_program)]
    pub token_mint_a: Box<InterfaceAccount<'info, Mint>>,

    #[account(mint::token_program = token_program)]
    pub token_mint_b: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        init_if_needed,
        payer = taker,
        associated_token::mint = token_mint_a,
        associated_token::authority = taker,
        associated_token::token_program = token_program,
    )]
    pub taker_token_account_a: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = token_mint_b,
        associated_token::authority = taker,
        associated_token::token_program = token_program,
    )]
    pub taker_token_account_b: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = taker,
        associated_token::mint = token_mint_b,
        associated_token::authority = maker,
        associated_token::token_program = token_program,
    )]
    pub maker_token_account_b: Box<InterfaceAccount<'info, TokenAccount>>,

    /// CHECK: decoded by `Offer::load`, which re-derives its address from the
    /// stored terms. A taken offer is closed and surfaces as `VaultNotFound`.
    #[account(mut)]
    pub offer: UncheckedAccount<'info>,

    /// CHECK: must be the offer's vault, verified by `Vault::balance`
    #[account(mut)]
    pub vault: UncheckedAccount<'info>,

    pub associated_token_program: Program<'info, AssociatedToken>,
    pub token_program: Interface<'info, TokenInterface>,
    pub system_program: Program<'info, System>,
}

impl<'info> TakeOffer<'info> {
    fn vault(&self) -> Vault<'_, 'info> {
        Vault {
            account: &self.vault,
            offer: &self.offer,
            mint: &self.token_mint_a,
            token_program: &self.token_program,
        }
    }

    /// The maker and both mints supplied must be the ones the offer names.
    fn check_parties(&self, offer: &Offer) -> Result<()> {
        require_keys_eq!(offer.maker, self.maker.key(), SwapError::OfferAccountMismatch);
        require_keys_eq!(
            offer.token_mint_a,
            self.token_mint_a.key(),
            SwapError::OfferAccountMismatch
        );
        require_keys_eq!(
            offer.token_mint_b,
            self.token_mint_b.key(),
            SwapError::OfferAccountMismatch
        );
        Ok(())
    }

    /// Both transfers and both closes. Runs only after every check passed, and
    /// any failing CPI aborts the whole transaction.
    fn settle(&self, offer: &Offer, token_b_amount: u64, token_a_amount: u64) -> Result<()> {
        let maker = self.maker.to_account_info();

        vault::transfer_tokens(
            &self.taker_token_account_b.to_account_info(),
            &self.maker_token_account_b.to_account_info(),
            &self.token_mint_b,
            &self.taker.to_account_info(),
            &self.token_program,
            token_b_amount,
            None,
        )?;

        self.vault().release_and_close(
            offer,
            &self.taker_token_account_a.to_account_info(),
            &maker,
            token_a_amount,
        )?;

        Offer::close(&self.offer, &maker)
    }
}

pub fn handler(ctx: Context<TakeOffer>, token_b_offered_amount: u64) -> Result<()> {
    let accounts = &ctx.accounts;

    let offer = Offer::load(&accounts.offer)?;
    accounts.check_parties(&offer)?;

    require_eq!(
        token_b_offered_amount,
        offer.token_b_wanted_amount,
        SwapError::AmountMismatch
    );

    let token_a_amount = accounts.vault().balance(&offer)?;

    require_gte!(
        accounts.taker_token_account_b.amount,
        token_b_offered_amount,
        SwapError::InsufficientFunds
    );

    accounts.settle(&offer, token_b_offered_amount, token_a_amount)?;

    emit!(OfferTaken {
        offer: accounts.offer.key(),
        offer_id: offer.id,
        maker: offer.maker,
        taker: accounts.taker.key(),
        token_a_amount,
        token_b_amount: token_b_offered_amount,
    });

    msg!("Offer taken!");
    msg!("Offer: {}", accounts.offer.key());
    msg!("Taker received: {} of mint {}", token_a_amount, offer.token_mint_a);
    msg!("Maker received: {} of mint {}", token_b_offered_amount, offer.token_mint_b);

    Ok(())
}
