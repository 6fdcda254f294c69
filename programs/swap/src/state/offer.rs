use anchor_lang::prelude::*;
use anchor_lang::system_program;

use crate::constants::{ANCHOR_DISCRIMINATOR_SIZE, OFFER_SEED};
use crate::error::SwapError;

/// Terms of one open offer. The account lives at the PDA of
/// `["offer", maker, id]` and is the signing authority of its vault.
#[account]
#[derive(InitSpace, Debug)]
pub struct Offer {
    /// Caller-chosen identifier, unique per maker
    pub id: u64,
    /// The party that deposited token A
    pub maker: Pubkey,
    /// Mint of the token held in the vault
    pub token_mint_a: Pubkey,
    /// Mint of the token the maker wants
    pub token_mint_b: Pubkey,
    /// Exact amount of token B a taker must pay
    pub token_b_wanted_amount: u64,
    /// Bump seed for PDA derivation
    pub bump: u8,
}

/// Owned copy of an offer's signer seeds.
pub struct OfferSeeds {
    maker: Pubkey,
    id: [u8; 8],
    bump: [u8; 1],
}

impl OfferSeeds {
    pub fn as_slices(&self) -> [&[u8]; 4] {
        [OFFER_SEED, self.maker.as_ref(), &self.id, &self.bump]
    }
}

impl Offer {
    pub const LEN: usize = ANCHOR_DISCRIMINATOR_SIZE + Offer::INIT_SPACE;

    /// Address of the offer `offer_id` made by `maker`. Anyone can reproduce it
    /// off-chain to find an offer and its vault before trusting them.
    pub fn derive_address(maker: &Pubkey, offer_id: u64) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[OFFER_SEED, maker.as_ref(), &offer_id.to_le_bytes()],
            &crate::ID,
        )
    }

    /// Zeroed accounts freshly created by `init_if_needed` are not open yet.
    pub fn is_open(&self) -> bool {
        self.maker != Pubkey::default()
    }

    pub fn seeds(&self) -> OfferSeeds {
        OfferSeeds {
            maker: self.maker,
            id: self.id.to_le_bytes(),
            bump: [self.bump],
        }
    }

    /// Decodes the open offer stored in `info`.
    ///
    /// A closed, empty or foreign account means the offer was already taken or
    /// cancelled and fails with `VaultNotFound`. The stored terms must
    /// re-derive to the supplied address.
    pub fn load(info: &AccountInfo) -> Result<Offer> {
        if info.owner != &crate::ID || info.data_is_empty() {
            return err!(SwapError::VaultNotFound);
        }

        let offer = {
            let data = info.try_borrow_data()?;
            Offer::try_deserialize(&mut data.as_ref())
                .map_err(|_| error!(SwapError::VaultNotFound))?
        };
        require!(offer.is_open(), SwapError::VaultNotFound);

        let seeds = offer.seeds();
        let expected = Pubkey::create_program_address(&seeds.as_slices(), &crate::ID)
            .map_err(|_| error!(SwapError::OfferAccountMismatch))?;
        require_keys_eq!(*info.key, expected, SwapError::OfferAccountMismatch);

        Ok(offer)
    }

    /// Removes the offer record: rent goes to `destination` and the account is
    /// handed back to the system program with no data.
    pub fn close<'info>(info: &AccountInfo<'info>, destination: &AccountInfo<'info>) -> Result<()> {
        let rent = info.lamports();
        let destination_lamports = destination.lamports();

        **destination.try_borrow_mut_lamports()? = destination_lamports
            .checked_add(rent)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        **info.try_borrow_mut_lamports()? = 0;

        info.assign(&system_program::ID);
        info.resize(0)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::error::Error;

    fn sample_offer(maker: Pubkey, id: u64) -> Offer {
        let (_, bump) = Offer::derive_address(&maker, id);
        Offer {
            id,
            maker,
            token_mint_a: Pubkey::new_unique(),
            token_mint_b: Pubkey::new_unique(),
            token_b_wanted_amount: 1_000_000,
            bump,
        }
    }

    fn serialized(offer: &Offer) -> Vec<u8> {
        let mut data = Vec::with_capacity(Offer::LEN);
        offer.try_serialize(&mut data).unwrap();
        data
    }

    fn error_code(err: Error) -> u32 {
        match err {
            Error::AnchorError(e) => e.error_code_number,
            Error::ProgramError(e) => panic!("unexpected program error: {e:?}"),
        }
    }

    #[test]
    fn derive_address_is_deterministic() {
        let maker = Pubkey::new_unique();
        assert_eq!(
            Offer::derive_address(&maker, 42),
            Offer::derive_address(&maker, 42)
        );
    }

    #[test]
    fn derive_address_separates_makers_and_ids() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();

        let (alice_1, _) = Offer::derive_address(&alice, 1);
        let (alice_2, _) = Offer::derive_address(&alice, 2);
        let (bob_1, _) = Offer::derive_address(&bob, 1);

        assert_ne!(alice_1, alice_2);
        assert_ne!(alice_1, bob_1);
    }

    #[test]
    fn stored_seeds_sign_for_the_derived_address() {
        let maker = Pubkey::new_unique();
        let offer = sample_offer(maker, u64::MAX);
        let (address, _) = Offer::derive_address(&maker, u64::MAX);

        let seeds = offer.seeds();
        let signer = Pubkey::create_program_address(&seeds.as_slices(), &crate::ID).unwrap();
        assert_eq!(signer, address);
    }

    #[test]
    fn load_returns_open_offer() {
        let maker = Pubkey::new_unique();
        let offer = sample_offer(maker, 7);
        let (key, _) = Offer::derive_address(&maker, 7);
        let mut data = serialized(&offer);
        let mut lamports = 1_000_000;
        let info = AccountInfo::new(&key, false, true, &mut lamports, &mut data, &crate::ID, false, 0);

        let loaded = Offer::load(&info).unwrap();
        assert_eq!(loaded.maker, maker);
        assert_eq!(loaded.id, 7);
        assert_eq!(loaded.token_b_wanted_amount, 1_000_000);
    }

    #[test]
    fn load_of_closed_account_is_vault_not_found() {
        let maker = Pubkey::new_unique();
        let (key, _) = Offer::derive_address(&maker, 7);
        let mut data: Vec<u8> = Vec::new();
        let mut lamports = 0;
        let info = AccountInfo::new(
            &key,
            false,
            true,
            &mut lamports,
            &mut data,
            &system_program::ID,
            false,
            0,
        );

        let err = Offer::load(&info).unwrap_err();
        assert_eq!(error_code(err), u32::from(SwapError::VaultNotFound));
    }

    #[test]
    fn load_rejects_offer_stored_at_foreign_address() {
        let maker = Pubkey::new_unique();
        let offer = sample_offer(maker, 7);
        let (other_key, _) = Offer::derive_address(&maker, 8);
        let mut data = serialized(&offer);
        let mut lamports = 1_000_000;
        let info = AccountInfo::new(
            &other_key,
            false,
            true,
            &mut lamports,
            &mut data,
            &crate::ID,
            false,
            0,
        );

        let err = Offer::load(&info).unwrap_err();
        assert_eq!(error_code(err), u32::from(SwapError::OfferAccountMismatch));
    }

    #[test]
    fn zeroed_record_is_not_open() {
        let offer = Offer {
            id: 0,
            maker: Pubkey::default(),
            token_mint_a: Pubkey::default(),
            token_mint_b: Pubkey::default(),
            token_b_wanted_amount: 0,
            bump: 0,
        };
        assert!(!offer.is_open());
    }
}
