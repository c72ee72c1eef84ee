/*!
 * Language settings per site.
 *
 * The registry answers "what is the fallback for language X on site S" and
 * "which languages should be shown for X". Lookups never fail: a language
 * that is not configured for a site first tries a configured variant of its
 * base language (`fr-ca` uses the settings of `fr`), then the global defaults.
 */

use log::debug;
use std::collections::{HashMap, HashSet};

use crate::app_config::LanguagesConfig;
use crate::errors::AppError;
use crate::language_utils::{base_language, normalize_language_code};

/// Deployment scope identifier
pub type SiteId = u32;

/// Resolved settings for one language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSettings {
    /// Language code (normalized)
    pub code: String,
    /// Fallback language; equal to `code` when there is no fallback
    pub fallback: String,
    /// Hide objects that are not translated in this language
    pub hide_untranslated: bool,
}

/// Ordered language choices per site plus global defaults
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    default: LanguageSettings,
    sites: HashMap<SiteId, Vec<LanguageSettings>>,
}

impl LanguageRegistry {
    /// Registry without site configuration, every language falls back to `default_code`
    pub fn new(default_code: &str) -> Self {
        let code = normalize_language_code(default_code);
        Self {
            default: LanguageSettings {
                fallback: code.clone(),
                code,
                hide_untranslated: false,
            },
            sites: HashMap::new(),
        }
    }

    /// Add a site with `(code, fallback)` choices; `None` inherits the default fallback
    pub fn with_site(mut self, site: SiteId, choices: &[(&str, Option<&str>)]) -> Result<Self, AppError> {
        let settings = choices
            .iter()
            .map(|(code, fallback)| LanguageSettings {
                code: normalize_language_code(code),
                fallback: fallback
                    .map(normalize_language_code)
                    .unwrap_or_else(|| self.default.fallback.clone()),
                hide_untranslated: self.default.hide_untranslated,
            })
            .collect();
        self.sites.insert(site, settings);
        self.validate_chains()?;
        Ok(self)
    }

    /// Set the global `hide_untranslated` flag for the defaults
    pub fn with_hide_untranslated(mut self, hide: bool) -> Self {
        self.default.hide_untranslated = hide;
        self
    }

    /// Build the registry from configuration
    pub fn from_config(config: &LanguagesConfig) -> Result<Self, AppError> {
        let code = normalize_language_code(&config.default.code);
        if code.is_empty() {
            return Err(AppError::Config("Default language code is empty".to_string()));
        }
        let default = LanguageSettings {
            fallback: config
                .default
                .fallback
                .as_deref()
                .map(normalize_language_code)
                .unwrap_or_else(|| code.clone()),
            code,
            hide_untranslated: config.default.hide_untranslated,
        };

        let sites = config
            .sites
            .iter()
            .map(|(site, choices)| {
                let settings = choices
                    .iter()
                    .map(|choice| LanguageSettings {
                        code: normalize_language_code(&choice.code),
                        fallback: choice
                            .fallback
                            .as_deref()
                            .map(normalize_language_code)
                            .unwrap_or_else(|| default.fallback.clone()),
                        hide_untranslated: choice.hide_untranslated.unwrap_or(default.hide_untranslated),
                    })
                    .collect();
                (*site, settings)
            })
            .collect();

        let registry = Self { default, sites };
        registry.validate_chains()?;
        Ok(registry)
    }

    /// Every fallback chain must end in a language that falls back to itself
    fn validate_chains(&self) -> Result<(), AppError> {
        let scopes = std::iter::once(None).chain(self.sites.keys().copied().map(Some));
        for site in scopes {
            let starts: Vec<String> = match site {
                Some(s) => self
                    .sites
                    .get(&s)
                    .map(|choices| choices.iter().map(|c| c.code.clone()).collect())
                    .unwrap_or_default(),
                None => vec![self.default.code.clone()],
            };

            for start in starts {
                let mut visited = HashSet::new();
                let mut current = start.clone();
                loop {
                    if !visited.insert(current.clone()) {
                        return Err(AppError::Config(format!(
                            "Fallback chain starting at '{}' does not terminate (site {:?})",
                            start, site
                        )));
                    }
                    let settings = self.language_settings(&current, site);
                    if settings.fallback == current {
                        break;
                    }
                    current = settings.fallback.clone();
                }
            }
        }
        Ok(())
    }

    /// Settings for a language: exact match, then base-language variant, then defaults
    pub fn language_settings(&self, language: &str, site: Option<SiteId>) -> &LanguageSettings {
        let language = normalize_language_code(language);
        let Some(choices) = site.and_then(|s| self.sites.get(&s)) else {
            return &self.default;
        };

        if let Some(exact) = choices.iter().find(|c| c.code == language) {
            return exact;
        }

        let base = base_language(&language);
        if let Some(variant) = choices.iter().find(|c| base_language(&c.code) == base) {
            debug!("Language '{}' uses the settings of '{}'", language, variant.code);
            return variant;
        }

        &self.default
    }

    /// The configured fallback, or `None` when the language is its own terminal fallback
    pub fn fallback_of(&self, language: &str, site: Option<SiteId>) -> Option<String> {
        let language = normalize_language_code(language);
        let settings = self.language_settings(&language, site);
        (settings.fallback != language).then(|| settings.fallback.clone())
    }

    /// Languages that should be visible for `language`: itself, then its fallback
    pub fn active_choices(&self, language: &str, site: Option<SiteId>) -> Vec<String> {
        let language = normalize_language_code(language);
        let settings = self.language_settings(&language, site);
        if settings.hide_untranslated || settings.fallback == language {
            vec![language]
        } else {
            vec![language, settings.fallback.clone()]
        }
    }

    /// The global default language
    pub fn default_language(&self) -> &str {
        &self.default.code
    }

    /// First configured language of a site, e.g. for the first language tab
    pub fn first_language(&self, site: Option<SiteId>) -> &str {
        site.and_then(|s| self.sites.get(&s))
            .and_then(|choices| choices.first())
            .map(|c| c.code.as_str())
            .unwrap_or(&self.default.code)
    }

    /// Configured language codes of a site, in order
    pub fn site_languages(&self, site: Option<SiteId>) -> Vec<&str> {
        site.and_then(|s| self.sites.get(&s))
            .map(|choices| choices.iter().map(|c| c.code.as_str()).collect())
            .unwrap_or_else(|| vec![self.default.code.as_str()])
    }

    /// Whether the site has its own language configuration
    pub fn is_multilingual(&self, site: Option<SiteId>) -> bool {
        site.is_some_and(|s| self.sites.contains_key(&s))
    }
}
