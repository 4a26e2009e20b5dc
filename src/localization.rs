use anyhow::{Context, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LANGUAGE: &str = "en";

const RESOURCES: [(&str, &str); 2] = [
    ("en", include_str!("../locales/en/main.ftl")),
    ("uk", include_str!("../locales/uk/main.ftl")),
];

/// Localization manager for the bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every bundled language loaded
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (code, source) in RESOURCES {
            let locale: LanguageIdentifier = code
                .parse()
                .with_context(|| format!("Invalid locale identifier: {code}"))?;
            let bundle = Self::create_bundle(&locale, source)?;
            bundles.insert(code.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Keep interpolated values free of Unicode isolation marks
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow::anyhow!("Invalid FTL for {locale}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Duplicate FTL messages for {locale}: {errors:?}"))?;

        Ok(bundle)
    }

    /// Whether a bundle exists for the language code
    pub fn is_language_supported(&self, language_code: &str) -> bool {
        self.bundles.contains_key(language_code)
    }

    /// Map a Telegram language code such as `uk-UA` to a loaded bundle key
    pub fn resolve_language<'a>(&self, language_code: Option<&'a str>) -> &'a str {
        let primary = language_code
            .and_then(|code| code.split(['-', '_']).next())
            .unwrap_or(DEFAULT_LANGUAGE);
        if self.is_language_supported(primary) {
            primary
        } else {
            DEFAULT_LANGUAGE
        }
    }

    /// Get a localized message in a language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language_code: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language_code)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {key}"),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {key}"),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {key}"),
        };

        let mut value = String::new();

        let fluent_args = args.map(|args| {
            FluentArgs::from_iter(args.iter().map(|(k, v)| (*k, FluentValue::from(*v))))
        });
        let _ = bundle.write_pattern(&mut value, pattern, fluent_args.as_ref(), &mut vec![]);

        value
    }
}

/// Get a localized message for a Telegram language code
pub fn t_lang(manager: &LocalizationManager, key: &str, language_code: Option<&str>) -> String {
    let language = manager.resolve_language(language_code);
    manager.get_message_in_language(key, language, None)
}

/// Get a localized message with arguments for a Telegram language code
pub fn t_args_lang(
    manager: &LocalizationManager,
    key: &str,
    args: &[(&str, &str)],
    language_code: Option<&str>,
) -> String {
    let language = manager.resolve_language(language_code);
    let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
    manager.get_message_in_language(key, language, Some(&args_map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_language() {
        let manager = LocalizationManager::new().unwrap();

        assert_eq!(manager.resolve_language(Some("uk")), "uk");
        assert_eq!(manager.resolve_language(Some("uk-UA")), "uk");
        assert_eq!(manager.resolve_language(Some("de")), "en");
        assert_eq!(manager.resolve_language(None), "en");
    }
}
