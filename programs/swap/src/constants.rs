use anchor_lang::prelude::*;

/// Seed prefix of every offer PDA: `["offer", maker, offer_id (le)]`
#[constant]
pub const OFFER_SEED: &[u8] = b"offer";

pub const ANCHOR_DISCRIMINATOR_SIZE: usize = 8;
