/*
Small i18n helper for user-facing texts.

This module provides:
- An embedded translations store for EN/RU (compile-time embedded JSON).
- `tr` to look up a key for a language with optional `{name}` params.
- `t` / `t_with` wrappers using the default language (DEFAULT_LANG).

Usage:
    let title = i18n::tr(user.lang.as_deref(), "notifications.shared.title", None);
    let body = i18n::t_with("notifications.shared.description", &[("actor", "Alice"), ("subject", "Groceries")]);

If a key is missing for the requested language, the default language is used,
then the key itself.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "en";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const EN_JSON: &str = r#"
{
  "subject.task": "task",
  "subject.list": "list",
  "notifications.shared.title": "New {subject_type} shared with you",
  "notifications.shared.description": "{actor} shared the {subject_type} \"{subject}\" with you.",
  "notifications.expired.title": "Task overdue",
  "notifications.expired.description": "The task \"{subject}\" is past its due date.",
  "not_found.user": "User not found",
  "not_found.task": "Task not found",
  "not_found.list": "List not found",
  "not_found.share": "Share not found",
  "not_found.notification": "Notification not found",
  "validation.share_with_owner": "The owner already has full access; shares cannot target the owner",
  "validation.invalid_email": "Invalid email address",
  "validation.invalid_name": "Name must be between 1 and 100 characters",
  "validation.password_too_short": "Password must be at least 8 characters",
  "validation.invalid_title": "Title must be between 1 and 200 characters",
  "validation.invalid_permission": "Permission must be one of VIEW, EDIT, ADMIN",
  "error.unsupported_language": "Unsupported language: {lang}"
}
"#;

const RU_JSON: &str = r#"
{
  "subject.task": "задача",
  "subject.list": "список",
  "notifications.shared.title": "С вами поделились: {subject_type}",
  "notifications.shared.description": "{actor} открыл(а) вам доступ: {subject_type} «{subject}».",
  "notifications.expired.title": "Задача просрочена",
  "notifications.expired.description": "Срок задачи «{subject}» истёк.",
  "not_found.user": "Пользователь не найден",
  "not_found.task": "Задача не найдена",
  "not_found.list": "Список не найден",
  "not_found.share": "Доступ не найден",
  "not_found.notification": "Уведомление не найдено",
  "validation.share_with_owner": "Владелец уже имеет полный доступ; делиться с ним нельзя",
  "validation.invalid_email": "Неверный адрес электронной почты",
  "validation.invalid_name": "Имя должно содержать от 1 до 100 символов",
  "validation.password_too_short": "Пароль должен содержать не менее 8 символов",
  "validation.invalid_title": "Название должно содержать от 1 до 200 символов",
  "validation.invalid_permission": "Уровень доступа должен быть одним из VIEW, EDIT, ADMIN",
  "error.unsupported_language": "Неподдерживаемый язык: {lang}"
}
"#;

/// Build the translations map from the embedded JSON strings.
fn build_translations() -> HashMap<String, HashMap<String, String>> {
    let mut out = HashMap::new();

    let en_map: HashMap<String, String> = serde_json::from_str(EN_JSON).unwrap_or_else(|e| {
        panic!("failed to parse EN_JSON in i18n module: {}", e);
    });
    out.insert("en".to_string(), en_map);

    let ru_map: HashMap<String, String> = serde_json::from_str(RU_JSON).unwrap_or_else(|e| {
        panic!("failed to parse RU_JSON in i18n module: {}", e);
    });
    out.insert("ru".to_string(), ru_map);

    out
}

fn translations() -> &'static HashMap<String, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(build_translations)
}

/// Normalize a language tag into a short, lowercase code (e.g. "en-US" -> "en").
pub fn normalize_language(lang: &str) -> String {
    lang.split('-').next().unwrap_or(lang).to_lowercase()
}

pub fn is_supported_language(lang: &str) -> bool {
    translations().contains_key(lang)
}

/// Translate `key` for `lang` (default language if `None`), substituting
/// `{name}` placeholders from `params`.
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let map = translations();

    let desired = lang.map(normalize_language);
    let desired = desired.as_deref().unwrap_or(DEFAULT_LANG);

    let val = map
        .get(desired)
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| map.get(DEFAULT_LANG).and_then(|m| m.get(key)).cloned())
        .unwrap_or_else(|| key.to_string());

    if let Some(params) = params {
        let mut s = val;
        for (k, v) in params {
            s = s.replace(&format!("{{{}}}", k), v);
        }
        s
    } else {
        val
    }
}

/// Translate using the default language.
pub fn t(key: &str) -> String {
    tr(None, key, None)
}

/// Translate with params using the default language.
pub fn t_with(key: &str, params: &[(&str, &str)]) -> String {
    tr(None, key, Some(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_description_substitutes_params() {
        let s = t_with(
            "notifications.shared.description",
            &[
                ("actor", "Alice"),
                ("subject_type", "list"),
                ("subject", "Groceries"),
            ],
        );
        assert_eq!(s, "Alice shared the list \"Groceries\" with you.");
    }

    #[test]
    fn region_tags_resolve_to_base_language() {
        let s = tr(Some("ru-RU"), "notifications.expired.title", None);
        assert_eq!(s, "Задача просрочена");
    }

    #[test]
    fn unknown_language_falls_back_to_default() {
        let s = tr(Some("fr"), "not_found.user", None);
        assert_eq!(s, "User not found");
    }

    #[test]
    fn missing_key_returns_key() {
        let k = "non.existent.key";
        assert_eq!(t(k), k.to_string());
    }

    #[test]
    fn supported_languages() {
        assert!(is_supported_language("ru"));
        assert!(is_supported_language("en"));
        assert!(!is_supported_language("fr"));
    }
}
