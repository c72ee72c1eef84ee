/*!
 * Resolution context: the store, the external cache, the language registry
 * and the site a shared record works against.
 */

use std::sync::Arc;

use crate::database::TranslationStore;
use crate::language_registry::{LanguageRegistry, SiteId};
use crate::translation::cache::TranslationCache;

/// Collaborators a shared record resolves against
///
/// Cheap to clone; every handle inside is shared.
#[derive(Clone)]
pub struct TranslationContext {
    /// Storage backend
    pub store: Arc<dyn TranslationStore>,
    /// External translation cache
    pub cache: TranslationCache,
    /// Language settings
    pub languages: Arc<LanguageRegistry>,
    /// Site whose language settings apply
    pub site: Option<SiteId>,
}

impl TranslationContext {
    /// Create a context without a site; the global language defaults apply
    pub fn new(store: Arc<dyn TranslationStore>, cache: TranslationCache, languages: Arc<LanguageRegistry>) -> Self {
        Self {
            store,
            cache,
            languages,
            site: None,
        }
    }

    /// Use the language settings of a site
    pub fn with_site(mut self, site: Option<SiteId>) -> Self {
        self.site = site;
        self
    }

    /// Configured fallback of a language for this context's site
    pub fn fallback_of(&self, language: &str) -> Option<String> {
        self.languages.fallback_of(language, self.site)
    }
}

impl std::fmt::Debug for TranslationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationContext")
            .field("cache", &self.cache)
            .field("languages", &self.languages)
            .field("site", &self.site)
            .finish_non_exhaustive()
    }
}
