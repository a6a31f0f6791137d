use clap::{Parser, Subcommand};

use authdesk_core::admin::DEFAULT_PAGE_SIZE;

/// Sign in to an authdesk server and manage your account or, as an admin,
/// other users.
#[derive(Debug, Parser)]
#[command(name = "authdesk", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and remember the session
    Login {
        /// Email address; defaults to the last one used
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Forget the session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show session state without contacting the server
    Status,
    /// Create an account
    Register {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Change your password
    ChangePassword,
    /// Email yourself a password recovery link
    ForgotPassword { email: String },
    /// Set a new password using a recovery token
    ResetPassword { token: String },
    /// Show or edit your profile
    Profile {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Permanently delete your account
    DeleteAccount {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Navigate to an app path and report where the route guard lands
    Visit { path: String },
    /// User administration (superusers only)
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// List users
    List {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,
    },
    /// Show one user
    Show { id: i64 },
    /// Create a user (password is prompted)
    Create {
        email: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        superuser: bool,
        #[arg(long)]
        inactive: bool,
    },
    /// Update a user
    Update {
        id: i64,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        password: bool,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        superuser: Option<bool>,
    },
    /// Delete a user
    Delete {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}
