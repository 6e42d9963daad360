use std::env;

use inkpad_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            image_bucket,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileInput {
                supabase_url,
                supabase_anon_key,
                image_bucket,
            },
            no_activate,
        ),
        ConfigCommands::Show { profile } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let Some(profile) = config.profile(&profile_name) else {
                println!("Profile '{profile_name}' is not configured.");
                return Ok(());
            };
            let active = config.active_profile.as_deref() == Some(profile_name.as_str());
            println!("profile:           {profile_name}{}", if active { " (active)" } else { "" });
            for line in describe_profile(profile) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

/// Values given on the command line for `config init`.
#[derive(Debug, Default)]
pub struct ProfileInput {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub image_bucket: Option<String>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    input: ProfileInput,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let existing = config.profile(&profile_name).cloned().unwrap_or_default();
    let merged = merge_profile(&existing, input, |key| env::var(key).ok());
    merged.backend_config()?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }
    let path = config.save().map_err(CliError::Config)?;
    println!("Saved profile '{profile_name}' to {}", path.display());
    Ok(())
}

/// Explicit values win, then environment variables, then what the profile
/// already had.
pub fn merge_profile(
    existing: &CliProfile,
    input: ProfileInput,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> CliProfile {
    CliProfile {
        supabase_url: normalize_text_option(input.supabase_url)
            .or_else(|| normalize_text_option(env_lookup("SUPABASE_URL")))
            .or_else(|| existing.supabase_url())
            .map(|url| url.trim_end_matches('/').to_string()),
        supabase_anon_key: normalize_text_option(input.supabase_anon_key)
            .or_else(|| normalize_text_option(env_lookup("SUPABASE_ANON_KEY")))
            .or_else(|| existing.supabase_anon_key()),
        image_bucket: normalize_text_option(input.image_bucket)
            .or_else(|| normalize_text_option(env_lookup("INKPAD_IMAGE_BUCKET")))
            .or_else(|| existing.image_bucket()),
    }
}

pub fn describe_profile(profile: &CliProfile) -> Vec<String> {
    let unset = || "(unset)".to_string();
    vec![
        format!(
            "supabase_url:      {}",
            profile.supabase_url().unwrap_or_else(unset)
        ),
        format!(
            "supabase_anon_key: {}",
            profile
                .supabase_anon_key()
                .map_or_else(unset, |key| mask_secret(&key))
        ),
        format!(
            "image_bucket:      {}",
            profile.image_bucket().unwrap_or_else(|| format!(
                "{} (default)",
                inkpad_core::config::DEFAULT_IMAGE_BUCKET
            ))
        ),
    ]
}

/// Keep the first and last four characters of a key.
pub fn mask_secret(value: &str) -> String {
    let chars = value.chars().collect::<Vec<_>>();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head = chars[..4].iter().collect::<String>();
    let tail = chars[chars.len() - 4..].iter().collect::<String>();
    format!("{head}...{tail}")
}
