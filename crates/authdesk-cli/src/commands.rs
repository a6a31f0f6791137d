//! Command handlers. Every screen-backed command first navigates to its
//! route so the same guard rules apply as in any other front end.

use anyhow::{bail, Result};
use tracing::{debug, warn};

use authdesk_core::admin::AdminUsers;
use authdesk_core::auth::SessionStatus;
use authdesk_core::models::{PasswordChange, PasswordReset, UserCreate, UserRead, UserUpdate};
use authdesk_core::navigation::{Location, NavigationOutcome, Navigator, RouteName};
use authdesk_core::notice::Notice;
use authdesk_core::{Config, SessionStore};

use crate::cli::{AdminCommand, Command};
use crate::prompt::{confirm, prompt_line, prompt_password};

pub async fn run(command: Command, store: &SessionStore, config: &mut Config) -> Result<()> {
    let mut notices = store.notifier().subscribe();
    let mut navigator = Navigator::new(store.clone());

    let result = dispatch(command, store, config, &mut navigator).await;

    // Success notices are the confirmation; failures surface as the error
    while let Ok(notice) = notices.try_recv() {
        if let Notice::Success(message) = notice {
            println!("{}", message);
        }
    }
    result
}

async fn dispatch(
    command: Command,
    store: &SessionStore,
    config: &mut Config,
    navigator: &mut Navigator,
) -> Result<()> {
    match command {
        Command::Login { username } => login(store, config, navigator, username).await,
        Command::Logout => {
            store.logout();
            navigator.process_session_events().await;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => {
            enter(navigator, "/").await?;
            let user = current_user(store)?;
            print_user(&user);
            if let Some(minutes) = store.credential().and_then(|c| c.minutes_until_expiry()) {
                println!("Session expires in {} minutes", minutes);
            }
            Ok(())
        }
        Command::Status => {
            status(store, config);
            Ok(())
        }
        Command::Register { email, full_name } => {
            enter(navigator, "/register").await?;
            let email = match email {
                Some(email) => email,
                None => prompt_line("Email", None)?,
            };
            let password = prompt_password("Password")?;
            let new_user = UserCreate {
                email,
                password,
                full_name,
                ..Default::default()
            };
            let user = store.register(&new_user).await?;
            config.last_username = Some(user.email.clone());
            save_config(config);
            Ok(())
        }
        Command::ChangePassword => {
            enter(navigator, "/change-password").await?;
            let change = PasswordChange {
                current_password: prompt_password("Current password")?,
                new_password: prompt_password("New password")?,
                new_password_confirm: prompt_password("Confirm new password")?,
            };
            store.change_password(&change).await?;
            Ok(())
        }
        Command::ForgotPassword { email } => {
            enter(navigator, "/forgot-password").await?;
            let message = store.request_password_recovery(&email).await?;
            println!("{}", message);
            Ok(())
        }
        Command::ResetPassword { token } => {
            enter(navigator, "/reset-password").await?;
            let reset = PasswordReset {
                token,
                new_password: prompt_password("New password")?,
                new_password_confirm: prompt_password("Confirm new password")?,
            };
            store.reset_password(&reset).await?;
            Ok(())
        }
        Command::Profile { email, full_name } => {
            enter(navigator, "/profile").await?;
            let update = UserUpdate {
                email,
                full_name,
                ..Default::default()
            };
            if update.is_empty() {
                print_user(&current_user(store)?);
                return Ok(());
            }
            let user = store.update_profile(&update).await?;
            print_user(&user);
            Ok(())
        }
        Command::DeleteAccount { yes } => {
            enter(navigator, "/profile").await?;
            if !yes && !confirm("Delete your account permanently?")? {
                println!("Cancelled.");
                return Ok(());
            }
            store.delete_account().await?;
            navigator.process_session_events().await;
            Ok(())
        }
        Command::Visit { path } => {
            let outcome = navigator.navigate(&path).await;
            print_outcome(&outcome);
            Ok(())
        }
        Command::Admin { command } => admin(store, navigator, command).await,
    }
}

async fn login(
    store: &SessionStore,
    config: &mut Config,
    navigator: &mut Navigator,
    username: Option<String>,
) -> Result<()> {
    match navigator.navigate("/login").await {
        NavigationOutcome::Arrived(_) => {}
        NavigationOutcome::Redirected { .. } => {
            let name = store
                .current_user()
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| "an unknown user".to_string());
            println!("Already logged in as {}. Run `authdesk logout` first.", name);
            return Ok(());
        }
        other => bail!("Login page unavailable: {:?}", other),
    }

    let username = match username {
        Some(username) => username,
        None => prompt_line("Email", config.last_username.as_deref())?,
    };
    let password = prompt_password("Password")?;

    let user = store.login(&username, &password).await?;

    config.last_username = Some(username);
    save_config(config);

    let outcome = navigator.resume_after_login().await;
    debug!(?outcome, "Resumed after login");
    println!("Logged in as {}.", user.display_name());
    Ok(())
}

async fn admin(store: &SessionStore, navigator: &mut Navigator, command: AdminCommand) -> Result<()> {
    let admin = AdminUsers::new(store);

    match command {
        AdminCommand::List { skip, limit } => {
            enter(navigator, "/admin/users").await?;
            admin.fetch_users(skip, limit).await;
            if let Some(err) = admin.error() {
                bail!(err);
            }
            let state = admin.snapshot();
            println!(
                "{:>6}  {:<32}  {:<24}  {:<6}  {}",
                "ID", "EMAIL", "NAME", "ACTIVE", "SUPERUSER"
            );
            for user in &state.users {
                println!(
                    "{:>6}  {:<32}  {:<24}  {:<6}  {}",
                    user.id,
                    user.email,
                    user.full_name.as_deref().unwrap_or("-"),
                    user.is_active,
                    user.is_superuser
                );
            }
            println!("Page {} ({} users)", state.current_page, state.total_users);
            Ok(())
        }
        AdminCommand::Show { id } => {
            enter(navigator, &format!("/admin/users/edit/{}", id)).await?;
            let user = admin.fetch_user_by_id(id).await?;
            print_user(&user);
            Ok(())
        }
        AdminCommand::Create {
            email,
            full_name,
            superuser,
            inactive,
        } => {
            enter(navigator, "/admin/users/create").await?;
            let new_user = UserCreate {
                email,
                password: prompt_password("Password for the new user")?,
                full_name,
                is_active: Some(!inactive),
                is_superuser: Some(superuser),
            };
            let user = admin.create_user(&new_user).await?;
            print_user(&user);
            Ok(())
        }
        AdminCommand::Update {
            id,
            email,
            full_name,
            password,
            active,
            superuser,
        } => {
            enter(navigator, &format!("/admin/users/edit/{}", id)).await?;
            let password = if password {
                Some(prompt_password("New password")?)
            } else {
                None
            };
            let update = UserUpdate {
                email,
                password,
                full_name,
                is_active: active,
                is_superuser: superuser,
            };
            if update.is_empty() {
                bail!("Nothing to update");
            }
            let user = admin.update_user(id, &update).await?;
            print_user(&user);
            Ok(())
        }
        AdminCommand::Delete { id, yes } => {
            enter(navigator, "/admin/users").await?;
            if !yes && !confirm(&format!("Delete user {}?", id))? {
                println!("Cancelled.");
                return Ok(());
            }
            admin.delete_user(id).await;
            if let Some(err) = admin.error() {
                bail!(err);
            }
            Ok(())
        }
    }
}

/// Navigate and require arrival at the requested page
async fn enter(navigator: &mut Navigator, path: &str) -> Result<Location> {
    match navigator.navigate(path).await {
        NavigationOutcome::Arrived(location) => Ok(location),
        NavigationOutcome::Redirected { location, .. } => match location.route() {
            RouteName::Login => bail!("Not logged in. Run `authdesk login` first."),
            RouteName::Home => bail!("Not available to the current session ({}).", path),
            _ => bail!("Redirected to {}", location),
        },
        NavigationOutcome::NotFound(path) => bail!("No such page: {}", path),
        NavigationOutcome::Aborted(path) => bail!("Navigation to {} did not settle", path),
    }
}

fn current_user(store: &SessionStore) -> Result<UserRead> {
    match store.current_user() {
        Some(user) => Ok(user),
        None => match store.last_error() {
            Some(err) => bail!("Could not load your profile: {}", err),
            None => bail!("Profile not loaded"),
        },
    }
}

fn status(store: &SessionStore, config: &Config) {
    let label = match store.status() {
        SessionStatus::Anonymous => "logged out",
        SessionStatus::CredentialOnly => "credential held, profile not loaded",
        SessionStatus::Authenticated => "logged in",
    };
    println!("Session:  {}", label);
    if let Some(user) = store.current_user() {
        println!("User:     {} <{}>", user.display_name(), user.email);
    }
    if let Some(credential) = store.credential() {
        match credential.expires_at() {
            Some(expiry) if credential.is_expired() => println!("Token:    expired at {}", expiry),
            Some(expiry) => println!("Token:    valid until {}", expiry),
            None => println!("Token:    expiry unknown"),
        }
    }
    println!("Server:   {}", store.api().base_url());
    match config.storage_backend() {
        Ok(backend) => println!("Storage:  {}", backend),
        Err(e) => println!("Storage:  {:#}", e),
    }
}

fn print_user(user: &UserRead) {
    match serde_json::to_string_pretty(user) {
        Ok(json) => println!("{}", json),
        Err(_) => println!("{} <{}>", user.display_name(), user.email),
    }
}

fn print_outcome(outcome: &NavigationOutcome) {
    match outcome {
        NavigationOutcome::Arrived(location) => {
            println!("Arrived at {} ({})", location, location.route())
        }
        NavigationOutcome::Redirected { requested, location } => {
            println!("{} redirected to {} ({})", requested, location, location.route())
        }
        NavigationOutcome::NotFound(path) => println!("Not found: {}", path),
        NavigationOutcome::Aborted(path) => println!("Too many redirects for {}", path),
    }
}

fn save_config(config: &Config) {
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}
