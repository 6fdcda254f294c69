use anchor_lang::prelude::*;
use anchor_spl::associated_token::get_associated_token_address_with_program_id;
use anchor_spl::token_interface::{
    close_account, transfer_checked, CloseAccount, Mint, TokenAccount, TokenInterface,
    TransferChecked,
};

use crate::error::SwapError;
use crate::state::Offer;

/// Address of the token account holding `token_mint_a` for the offer at
/// `offer`. One vault per offer and asset, never shared.
pub fn derive_address(offer: &Pubkey, token_mint_a: &Pubkey, token_program: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(offer, token_mint_a, token_program)
}

/// `transfer_checked` between two token accounts. PDA authorities pass their
/// signer seeds, wallet authorities already signed the transaction.
pub fn transfer_tokens<'info>(
    from: &AccountInfo<'info>,
    to: &AccountInfo<'info>,
    mint: &InterfaceAccount<'info, Mint>,
    authority: &AccountInfo<'info>,
    token_program: &Interface<'info, TokenInterface>,
    amount: u64,
    signer_seeds: Option<&[&[&[u8]]]>,
) -> Result<()> {
    let transfer_accounts = TransferChecked {
        from: from.clone(),
        mint: mint.to_account_info(),
        to: to.clone(),
        authority: authority.clone(),
    };

    let cpi_ctx = match signer_seeds {
        Some(seeds) => CpiContext::new_with_signer(
            token_program.to_account_info(),
            transfer_accounts,
            seeds,
        ),
        None => CpiContext::new(token_program.to_account_info(), transfer_accounts),
    };

    transfer_checked(cpi_ctx, amount, mint.decimals)
}

/// Moves the maker's deposit into a freshly opened vault.
pub fn fund<'info>(
    maker_token_account_a: &InterfaceAccount<'info, TokenAccount>,
    vault: &InterfaceAccount<'info, TokenAccount>,
    token_mint_a: &InterfaceAccount<'info, Mint>,
    maker: &AccountInfo<'info>,
    token_program: &Interface<'info, TokenInterface>,
    amount: u64,
) -> Result<()> {
    require!(amount > 0, SwapError::InvalidAmount);
    require_gte!(
        maker_token_account_a.amount,
        amount,
        SwapError::InsufficientFunds
    );

    transfer_tokens(
        &maker_token_account_a.to_account_info(),
        &vault.to_account_info(),
        token_mint_a,
        maker,
        token_program,
        amount,
        None,
    )
}

/// The custody token account of one offer. Funds leave it only through
/// `release_and_close`, signed by the offer PDA.
pub struct Vault<'a, 'info> {
    pub account: &'a AccountInfo<'info>,
    pub offer: &'a AccountInfo<'info>,
    pub mint: &'a InterfaceAccount<'info, Mint>,
    pub token_program: &'a Interface<'info, TokenInterface>,
}

impl<'a, 'info> Vault<'a, 'info> {
    /// Balance of token A in custody for `offer`.
    ///
    /// The supplied account must sit at the derived vault address. A vault that
    /// is closed or already empty fails with `VaultNotFound`.
    pub fn balance(&self, offer: &Offer) -> Result<u64> {
        let expected = derive_address(self.offer.key, &offer.token_mint_a, &self.token_program.key());
        require_keys_eq!(*self.account.key, expected, SwapError::OfferAccountMismatch);

        if self.account.owner != &self.token_program.key() || self.account.data_is_empty() {
            return err!(SwapError::VaultNotFound);
        }

        let vault = {
            let data = self.account.try_borrow_data()?;
            TokenAccount::try_deserialize(&mut data.as_ref())
                .map_err(|_| error!(SwapError::VaultNotFound))?
        };
        require_keys_eq!(vault.mint, offer.token_mint_a, SwapError::OfferAccountMismatch);
        require_keys_eq!(vault.owner, *self.offer.key, SwapError::OfferAccountMismatch);
        require_gt!(vault.amount, 0, SwapError::VaultNotFound);

        Ok(vault.amount)
    }

    /// Pays `amount` out to `destination`, then closes the vault and returns
    /// its rent to `rent_destination`.
    pub fn release_and_close(
        &self,
        offer: &Offer,
        destination: &AccountInfo<'info>,
        rent_destination: &AccountInfo<'info>,
        amount: u64,
    ) -> Result<()> {
        let seeds = offer.seeds();
        let offer_seeds = seeds.as_slices();
        let signer_seeds: &[&[&[u8]]] = &[&offer_seeds];

        transfer_tokens(
            self.account,
            destination,
            self.mint,
            self.offer,
            self.token_program,
            amount,
            Some(signer_seeds),
        )?;

        let close_accounts = CloseAccount {
            account: self.account.clone(),
            destination: rent_destination.clone(),
            authority: self.offer.clone(),
        };

        close_account(CpiContext::new_with_signer(
            self.token_program.to_account_info(),
            close_accounts,
            signer_seeds,
        ))
    }
}
