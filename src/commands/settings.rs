use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::commands::{require_action, require_screen, CommandError, CommandResult};
use crate::db::{Collection, Database};
use crate::models::{AiPrompt, AuditAction, Screen, Settings};
use crate::services::audit::AuditEvent;
use crate::services::permissions::Action;
use crate::services::secrets::StoredSecret;
use crate::services::state::AppState;
use crate::utils::parse_decimal;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Default, Deserialize)]
pub struct SettingsPayload {
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub local_currency: Option<String>,
    pub default_exchange_rate: Option<String>,
}

pub fn load_settings(db: &Database) -> Result<Settings> {
    let defaults = Settings::default();
    let default_exchange_rate = match db.get_setting("default_exchange_rate")? {
        Some(value) => parse_decimal(&value)?,
        None => defaults.default_exchange_rate,
    };
    Ok(Settings {
        gemini_api_key: db.get_setting("gemini_api_key")?,
        gemini_model: db
            .get_setting("gemini_model")?
            .unwrap_or(defaults.gemini_model),
        local_currency: db
            .get_setting("local_currency")?
            .unwrap_or(defaults.local_currency),
        default_exchange_rate,
    })
}

pub fn save_settings(state: &mut AppState, db: &Database, payload: SettingsPayload) -> CommandResult<Settings> {
    require_action(state, Action::ManageSystem)?;

    if let Some(value) = payload.gemini_model.filter(|v| !v.trim().is_empty()) {
        db.set_setting("gemini_model", value.trim()).map_err(anyhow::Error::from)?;
    }
    if let Some(value) = payload.local_currency.filter(|v| !v.trim().is_empty()) {
        db.set_setting("local_currency", value.trim()).map_err(anyhow::Error::from)?;
    }
    if let Some(value) = payload.default_exchange_rate {
        let rate = parse_decimal(&value).map_err(|e| CommandError::Invalid(e.to_string()))?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CommandError::Invalid("exchange rate must be positive".to_string()));
        }
        db.set_setting("default_exchange_rate", &rate.to_string())
            .map_err(anyhow::Error::from)?;
    }
    if let Some(api_key) = payload.gemini_api_key {
        if !api_key.trim().is_empty() {
            let stored = StoredSecret::store(api_key.trim())?;
            db.set_setting("gemini_api_key", &stored.to_string())
                .map_err(anyhow::Error::from)?;
        }
    }

    state.settings = load_settings(db)?;
    tracing::info!(model = %state.settings.gemini_model, currency = %state.settings.local_currency, "Settings saved");
    Ok(state.settings.clone())
}

/// The key to call the extraction service with; the environment wins over
/// the stored value.
pub fn resolve_api_key(settings: &Settings) -> Result<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Ok(key);
        }
    }
    let stored = settings
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| anyhow!("Extraction API key missing; set {} or run `config --api-key`", API_KEY_ENV))?;
    stored.parse::<StoredSecret>()?.reveal()
}

pub fn list_prompts(state: &AppState) -> CommandResult<&[AiPrompt]> {
    require_screen(state, Screen::Prompts)?;
    Ok(&state.prompts)
}

pub fn update_prompt(state: &mut AppState, prompt_id: i64, content: &str) -> CommandResult<()> {
    require_screen(state, Screen::Prompts)?;
    require_action(state, Action::ManageSystem)?;
    if content.trim().is_empty() {
        return Err(CommandError::Invalid("prompt content is empty".to_string()));
    }
    let prompt = state
        .prompts
        .iter_mut()
        .find(|p| p.id == prompt_id)
        .ok_or_else(|| CommandError::NotFound(format!("prompt {}", prompt_id)))?;
    prompt.content = content.to_string();
    let title = prompt.title.clone();

    state.mark_dirty(Collection::Prompts);
    state.record(AuditEvent::new(
        AuditAction::UpdatePrompt,
        format!("Prompt {} updated", title),
    ));
    Ok(())
}

/// Exactly one prompt is active afterwards.
pub fn activate_prompt(state: &mut AppState, prompt_id: i64) -> CommandResult<()> {
    require_screen(state, Screen::Prompts)?;
    require_action(state, Action::ManageSystem)?;
    if !state.prompts.iter().any(|p| p.id == prompt_id) {
        return Err(CommandError::NotFound(format!("prompt {}", prompt_id)));
    }
    for prompt in state.prompts.iter_mut() {
        prompt.is_active = prompt.id == prompt_id;
    }
    state.mark_dirty(Collection::Prompts);
    state.record(AuditEvent::new(
        AuditAction::UpdatePrompt,
        format!("Prompt {} activated", prompt_id),
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fall_back_to_defaults() {
        let db = Database::in_memory().unwrap();
        let settings = load_settings(&db).unwrap();
        assert_eq!(settings.local_currency, "Bs");
        assert_eq!(settings.default_exchange_rate, 60.0);
        assert_eq!(settings.gemini_api_key, None);
    }

    #[test]
    fn saved_settings_are_reloaded_into_state() {
        let db = Database::in_memory().unwrap();
        let mut state = AppState::seeded(Settings::default());
        let saved = save_settings(
            &mut state,
            &db,
            SettingsPayload {
                local_currency: Some("VES".into()),
                default_exchange_rate: Some("36,5".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(saved.local_currency, "VES");
        assert_eq!(state.defaults().exchange_rate, 36.5);
        assert_eq!(load_settings(&db).unwrap().default_exchange_rate, 36.5);

        let bad = SettingsPayload {
            default_exchange_rate: Some("-1".into()),
            ..Default::default()
        };
        assert!(matches!(
            save_settings(&mut state, &db, bad),
            Err(CommandError::Invalid(_))
        ));
        for garbage in ["NaN", "inf", "1e400"] {
            let payload = SettingsPayload {
                default_exchange_rate: Some(garbage.into()),
                ..Default::default()
            };
            assert!(matches!(
                save_settings(&mut state, &db, payload),
                Err(CommandError::Invalid(_))
            ));
        }
        assert_eq!(state.settings.default_exchange_rate, 36.5);
    }

    #[test]
    fn only_admins_change_settings_and_prompts() {
        let db = Database::in_memory().unwrap();
        let mut state = AppState::seeded(Settings::default());
        state.switch_user("u2").unwrap();
        assert!(matches!(
            save_settings(&mut state, &db, SettingsPayload::default()),
            Err(CommandError::Forbidden(_))
        ));
        assert!(matches!(
            update_prompt(&mut state, 1, "new"),
            Err(CommandError::Forbidden(_))
        ));
    }

    #[test]
    fn prompts_update_and_activate() {
        let mut state = AppState::seeded(Settings::default());
        state.prompts.push(AiPrompt {
            id: 2,
            title: "Lenient".into(),
            content: "Return JSON".into(),
            is_active: false,
        });

        update_prompt(&mut state, 2, "Return JSON only").unwrap();
        activate_prompt(&mut state, 2).unwrap();
        assert_eq!(state.active_prompt_id(), 2);
        assert_eq!(state.prompts.iter().filter(|p| p.is_active).count(), 1);
        assert_eq!(state.audit.entries()[0].action, AuditAction::UpdatePrompt);
        assert!(matches!(
            activate_prompt(&mut state, 9),
            Err(CommandError::NotFound(_))
        ));
    }
}
