//! CLI entry point for storefront-session.

pub mod session;

use clap::{Parser, Subcommand};

/// Storefront session CLI
#[derive(Parser, Debug)]
#[command(
    name = "storefront-session",
    version,
    about = "Inspect and drive a storefront customer session"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show who the persisted session belongs to and when its token expires
    Status,
    /// Log a customer in
    Login(LoginArgs),
    /// Forget the persisted session
    Logout,
    /// Refresh the persisted token now
    Refresh,
    /// Keep the session alive, refreshing before expiry, until Ctrl-C
    Watch,
}

/// Arguments for `storefront-session login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Customer email
    pub email: String,

    /// Customer password
    #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_login_with_password_flag() {
        let cli = Cli::try_parse_from([
            "storefront-session",
            "login",
            "ann@example.com",
            "--password",
            "s3cret",
        ])
        .unwrap();
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.email, "ann@example.com");
                assert_eq!(args.password, "s3cret");
            }
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parses_watch() {
        let cli = Cli::try_parse_from(["storefront-session", "watch"]).unwrap();
        assert!(matches!(cli.command, Commands::Watch));
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(Cli::try_parse_from(["storefront-session", "checkout"]).is_err());
    }
}
