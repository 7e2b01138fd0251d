use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Assohub CLI - administer users, wallets and fees")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a superuser (platform admin) account
    CreateSuperuser(CreateSuperuserArgs),

    /// Credit or debit a user's wallet immediately
    ///
    /// Negative amounts are recorded as adjustments.
    CreditWallet(CreditWalletArgs),

    /// Compare every wallet balance with its completed transactions
    AuditWallets,

    /// Flag pending fees whose campaign due date has passed
    MarkOverdue(MarkOverdueArgs),

    /// Add members to an association from a `username,role` CSV file
    ImportMembers(ImportMembersArgs),
}

#[derive(ClapArgs, Debug)]
pub struct CreateSuperuserArgs {
    /// Username for the superuser
    #[arg(short, long, help = "Username for the superuser")]
    pub username: String,

    /// Email address for the superuser
    #[arg(short, long, help = "Email address for the superuser")]
    pub email: String,

    /// Password for the superuser
    #[arg(short, long, help = "Password for the superuser")]
    pub password: String,
}

#[derive(ClapArgs, Debug)]
pub struct CreditWalletArgs {
    #[arg(short, long, help = "Username owning the wallet")]
    pub username: String,

    /// Decimal amount such as 12.50; prefix with '-' to debit
    #[arg(short, long, allow_hyphen_values = true, help = "Amount to credit")]
    pub amount: String,

    #[arg(short, long, help = "Payment or bank reference")]
    pub reference: Option<String>,

    #[arg(short, long, help = "Free-text description")]
    pub description: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct MarkOverdueArgs {
    /// Reference date (YYYY-MM-DD), defaults to today
    #[arg(long, help = "Reference date, defaults to today")]
    pub date: Option<chrono::NaiveDate>,
}

#[derive(ClapArgs, Debug)]
pub struct ImportMembersArgs {
    #[arg(short, long, help = "Association id")]
    pub association: i64,

    #[arg(short, long, help = "CSV file with username,role columns")]
    pub csv: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_negative_credit_amount() {
        let args =
            Args::try_parse_from(["assohub", "credit-wallet", "-u", "alice", "-a", "-5.00"])
                .unwrap();
        match args.command {
            Some(Commands::CreditWallet(credit)) => {
                assert_eq!(credit.username, "alice");
                assert_eq!(credit.amount, "-5.00");
                assert!(credit.reference.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_overdue_reference_date() {
        let args = Args::try_parse_from(["assohub", "mark-overdue", "--date", "2024-03-01"]).unwrap();
        match args.command {
            Some(Commands::MarkOverdue(overdue)) => assert_eq!(
                overdue.date,
                chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            ),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_means_serve() {
        let args = Args::try_parse_from(["assohub"]).unwrap();
        assert!(args.command.is_none());
    }
}
