use inkpad_core::auth::{AuthSession, SignUpOutcome};

use crate::auth::{clear_stored_session, load_stored_session, session_manager};
use crate::cli::AuthCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    match command {
        AuthCommands::Login {
            profile,
            email,
            password,
        } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let backend = config.backend_config(&profile_name)?;
            let sessions = session_manager(&profile_name, &backend)?;
            let state = sessions.sign_in(&email, &password).await?;
            let email_label = state
                .user()
                .and_then(|user| user.email.as_deref())
                .unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Signup {
            profile,
            email,
            password,
        } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let backend = config.backend_config(&profile_name)?;
            let sessions = session_manager(&profile_name, &backend)?;
            match sessions.sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(session) => {
                    println!(
                        "Created account and signed in profile '{profile_name}' as {}",
                        email_label(&session)
                    );
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!(
                        "Account created. Confirm {email} from your inbox, then run `inkpad auth login`."
                    );
                }
            }
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let session = match config.backend_config(&profile_name) {
                Ok(backend) => session_manager(&profile_name, &backend)?
                    .restore()
                    .await?
                    .session()
                    .cloned(),
                Err(CliError::NotConfigured(_)) => load_stored_session(&profile_name)?,
                Err(error) => return Err(error),
            };

            if let Some(session) = session {
                println!(
                    "Profile '{}' is signed in as {} (user_id={}, expires_at={})",
                    profile_name,
                    email_label(&session),
                    session.user_id(),
                    session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let stored = load_stored_session(&profile_name)?;

            match (config.backend_config(&profile_name), stored) {
                (Ok(backend), Some(session)) => {
                    let sessions = session_manager(&profile_name, &backend)?;
                    let client_state = sessions.restore().await?;
                    if client_state.is_signed_in() {
                        sessions.sign_out().await?;
                    } else {
                        tracing::debug!(
                            "Stored session for {} could not be restored",
                            session.user_id()
                        );
                        clear_stored_session(&profile_name)?;
                    }
                }
                _ => clear_stored_session(&profile_name)?,
            }

            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

fn email_label(session: &AuthSession) -> &str {
    session.user.email.as_deref().unwrap_or("(no email)")
}
