mod args;

pub use args::{Args, Commands, CreateSuperuserArgs, CreditWalletArgs};
use clap::Parser;
use common::{
    Amount, AssociationService, CreditRequest, Database, FinanceService, User, WalletService,
};

/// Runs the CLI command parser and executes the selected command.
/// Returns `Ok(true)` if a CLI command was handled, `Ok(false)` if the
/// server should start, and the command's error if it failed.
pub async fn run_cli() -> anyhow::Result<bool> {
    let args = Args::parse();
    let Some(command) = &args.command else {
        return Ok(false);
    };

    let db = connect_database().await?;
    execute(&db, command).await?;
    Ok(true)
}

/// Executes one subcommand against `db`.
pub async fn execute(db: &Database, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::CreateSuperuser(superuser_args) => {
            create_superuser(
                db,
                &superuser_args.username,
                &superuser_args.email,
                &superuser_args.password,
            )
            .await
        }
        Commands::CreditWallet(credit_args) => credit_wallet(db, credit_args).await,
        Commands::AuditWallets => audit_wallets(db).await,
        Commands::MarkOverdue(overdue_args) => {
            let today = overdue_args
                .date
                .unwrap_or_else(|| chrono::Local::now().date_naive());
            mark_overdue(db, today).await
        }
        Commands::ImportMembers(import_args) => {
            import_members(db, import_args.association, &import_args.csv).await
        }
    }
}

/// Connects to the database named by DATABASE_URL.
async fn connect_database() -> anyhow::Result<Database> {
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL not set"))?;
    Database::new(&database_url).await
}

/// Creates a superuser: validates input, hashes password, checks for duplicates, and saves to DB.
async fn create_superuser(
    db: &Database,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let user = User::new(username, email, password, true)
        .map_err(|e| anyhow::anyhow!("Validation error: {e}"))?;

    if db.user_exists(&user.username, &user.email).await? {
        return Err(anyhow::anyhow!(
            "A user with username '{}' or email '{}' already exists.",
            username,
            email
        ));
    }

    db.save_user(&user)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {e}"))?;

    println!("Superuser '{}' created successfully.", username);
    Ok(())
}

async fn credit_wallet(db: &Database, args: &CreditWalletArgs) -> anyhow::Result<()> {
    let amount: Amount = args.amount.parse()?;
    let user = db
        .get_user(&args.username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User '{}' not found", args.username))?;

    let transaction = WalletService::new(db.clone())
        .admin_credit(CreditRequest {
            user_id: user.id,
            amount,
            reference: args.reference.clone(),
            description: args.description.clone(),
        })
        .await?;

    println!(
        "Recorded {:?} of {} for '{}' (transaction {}).",
        transaction.kind, transaction.amount, user.username, transaction.id
    );
    Ok(())
}

async fn audit_wallets(db: &Database) -> anyhow::Result<()> {
    let mismatches = WalletService::new(db.clone()).audit().await?;
    if mismatches.is_empty() {
        println!("All wallet balances match their ledgers.");
        return Ok(());
    }
    for m in &mismatches {
        println!(
            "wallet={} user={} balance={} ledger={}",
            m.wallet_id, m.user_id, m.balance, m.ledger_total
        );
    }
    Err(anyhow::anyhow!(
        "{} wallet(s) out of balance",
        mismatches.len()
    ))
}

async fn mark_overdue(db: &Database, today: chrono::NaiveDate) -> anyhow::Result<()> {
    let count = FinanceService::new(db.clone()).mark_overdue(today).await?;
    println!("{} fee(s) marked overdue.", count);
    Ok(())
}

async fn import_members(db: &Database, association_id: i64, csv: &str) -> anyhow::Result<()> {
    let report = AssociationService::new(db.clone())
        .import_members(association_id, csv)
        .await?;
    println!(
        "Imported {} member(s), skipped {} row(s).",
        report.added, report.skipped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn database_with_wallet() -> (Database, User) {
        let db = Database::in_memory().await.unwrap();
        let user = User::new("ines", "ines@example.org", "Passw0rd", false).unwrap();
        let user = db.save_user(&user).await.unwrap();
        let credit = Args::try_parse_from([
            "assohub",
            "credit-wallet",
            "--username",
            "ines",
            "--amount",
            "15.00",
        ])
        .unwrap();
        execute(&db, credit.command.as_ref().unwrap()).await.unwrap();
        (db, user)
    }

    #[tokio::test]
    async fn audit_succeeds_on_balanced_ledger() {
        let (db, _user) = database_with_wallet().await;
        assert!(execute(&db, &Commands::AuditWallets).await.is_ok());
    }

    #[tokio::test]
    async fn audit_fails_when_a_wallet_is_out_of_balance() {
        let (db, user) = database_with_wallet().await;
        sqlx::query("UPDATE wallets SET balance = balance + 100 WHERE user_id = ?")
            .bind(user.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = execute(&db, &Commands::AuditWallets).await.unwrap_err();
        assert!(err.to_string().contains("1 wallet(s) out of balance"));
    }

    #[tokio::test]
    async fn failed_credit_is_reported_as_error() {
        let db = Database::in_memory().await.unwrap();
        let credit = Args::try_parse_from([
            "assohub",
            "credit-wallet",
            "--username",
            "nobody",
            "--amount",
            "1",
        ])
        .unwrap();
        assert!(execute(&db, credit.command.as_ref().unwrap()).await.is_err());
    }
}
