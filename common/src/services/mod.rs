mod associations;
mod finance;
mod wallet;

pub use associations::AssociationService;
pub use finance::FinanceService;
pub use wallet::WalletService;
