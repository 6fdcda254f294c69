pub mod constants;
pub mod error;
pub mod events;
pub mod instructions;
pub mod state;

use anchor_lang::prelude::*;

pub use constants::*;
pub use instructions::*;
pub use state::*;

declare_id!("2CnpKeCduJPyAnpWwabyG5mGynMo6J9Mjwfzye9CC5cZ");

#[program]
pub mod swap {
    use super::*;

    pub fn make_offer(
        ctx: Context<MakeOffer>,
        offer_id: u64,
        token_a_offered_amount: u64,
        token_b_wanted_amount: u64,
    ) -> Result<()> {
        make_offer::handler(ctx, offer_id, token_a_offered_amount, token_b_wanted_amount)
    }

    pub fn take_offer(ctx: Context<TakeOffer>, token_b_offered_amount: u64) -> Result<()> {
        take_offer::handler(ctx, token_b_offered_amount)
    }

    pub fn cancel_offer(ctx: Context<CancelOffer>) -> Result<()> {
        cancel_offer::handler(ctx)
    }
}
