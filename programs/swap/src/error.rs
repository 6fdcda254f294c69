use anchor_lang::prelude::*;

#[error_code]
pub enum SwapError {
    #[msg("An open offer already exists for this maker and offer id")]
    DuplicateOffer,
    #[msg("Amount must be greater than zero")]
    InvalidAmount,
    #[msg("Insufficient token balance for this operation")]
    InsufficientFunds,
    #[msg("Offer vault is missing or already emptied")]
    VaultNotFound,
    #[msg("Supplied token B amount does not match the offer")]
    AmountMismatch,
    #[msg("Offered and wanted tokens must use different mints")]
    InvalidTokenMint,
    #[msg("Account does not belong to this offer")]
    OfferAccountMismatch,
    #[msg("Only the maker can cancel the offer")]
    Unauthorized,
}
