use common::{AssociationService, Database, FinanceService, WalletService};

use crate::auth::TokenAuthority;

pub struct AppState {
    pub db: Database,
    pub wallets: WalletService,
    pub finance: FinanceService,
    pub associations: AssociationService,
    pub tokens: TokenAuthority,
}

impl AppState {
    pub fn new(db: Database, tokens: TokenAuthority) -> Self {
        AppState {
            wallets: WalletService::new(db.clone()),
            finance: FinanceService::new(db.clone()),
            associations: AssociationService::new(db.clone()),
            db,
            tokens,
        }
    }
}
