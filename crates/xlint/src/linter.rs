//! Linter - Main entry point

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};
use xlint_core::{CheckResult, CompatStore, Config, Feature};
use xlint_css::{CssChecker, CssError};
use xlint_html::{HtmlChecker, HtmlError};
use xlint_media::{MediaError, MediaHook};

use crate::Result;

/// Checkers bound to the active configuration
struct Checkers {
    config: Config,
    css: CssChecker,
    html: HtmlChecker,
}

/// The xlint compatibility linter.
///
/// Owns the compatibility store shared by its checkers. Data for the
/// configured features and platforms is loaded by [`Linter::init`] and
/// [`Linter::configure`]; checks before `init` fail with
/// [`LintError::NotInitialized`].
pub struct Linter {
    store: Arc<CompatStore>,
    checkers: Option<Checkers>,
}

impl Linter {
    /// Create a linter reading compatibility data under `data_root`
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self::with_store(Arc::new(CompatStore::new(data_root)))
    }

    /// Create a linter over an existing store
    pub fn with_store(store: Arc<CompatStore>) -> Self {
        info!("xlint {} initialized", crate::VERSION);
        Self { store, checkers: None }
    }

    pub fn store(&self) -> &Arc<CompatStore> {
        &self.store
    }

    /// Active configuration, once initialised
    pub fn config(&self) -> Option<&Config> {
        self.checkers.as_ref().map(|c| &c.config)
    }

    pub fn is_initialized(&self) -> bool {
        self.checkers.is_some()
    }

    /// Load data for `config` and build the checkers
    pub async fn init(&mut self, config: Config) -> Result<()> {
        self.store.load(&config.features, &config.target_platforms).await?;

        let css = CssChecker::new(self.store.clone(), config.clone())?;
        let mut html = HtmlChecker::new(self.store.clone(), config.clone());
        if config.features.contains(&Feature::Media) {
            html.register(Box::new(MediaHook::new()?));
        }

        info!(
            "Linter ready for {} platform(s): {}",
            config.target_platforms.len(),
            config.platform_ids().collect::<Vec<_>>().join(", ")
        );
        self.checkers = Some(Checkers { config, css, html });
        Ok(())
    }

    pub fn init_blocking(&mut self, config: Config) -> Result<()> {
        smol::block_on(self.init(config))
    }

    /// Replace the active configuration, loading missing data first.
    ///
    /// A failed load leaves the previous configuration active.
    pub async fn configure(&mut self, config: Config) -> Result<()> {
        if self.checkers.is_none() {
            return self.init(config).await;
        }
        self.store.load(&config.features, &config.target_platforms).await?;
        let checkers = self.checkers.as_mut().ok_or(LintError::NotInitialized)?;

        let wants_media = config.features.contains(&Feature::Media);
        let has_media = checkers.html.hook_names().contains(&MediaHook::NAME);
        if wants_media && !has_media {
            checkers.html.register(Box::new(MediaHook::new()?));
        } else if !wants_media && has_media {
            checkers.html.unregister(MediaHook::NAME);
        }

        debug!("Reconfigured for {:?}", config.platform_ids().collect::<Vec<_>>());
        checkers.css.set_config(config.clone());
        checkers.html.set_config(config.clone());
        checkers.config = config;
        Ok(())
    }

    pub fn configure_blocking(&mut self, config: Config) -> Result<()> {
        smol::block_on(self.configure(config))
    }

    /// Check CSS source text
    pub fn check_css(&self, css: &str) -> Result<CheckResult> {
        Ok(self.checkers()?.css.check(css)?)
    }

    /// Check HTML source text, including embedded media
    pub fn check_html(&self, html: &str) -> Result<CheckResult> {
        Ok(self.checkers()?.html.check(html)?)
    }

    pub fn css_checker(&self) -> Option<&CssChecker> {
        self.checkers.as_ref().map(|c| &c.css)
    }

    pub fn html_checker(&self) -> Option<&HtmlChecker> {
        self.checkers.as_ref().map(|c| &c.html)
    }

    fn checkers(&self) -> Result<&Checkers> {
        self.checkers.as_ref().ok_or(LintError::NotInitialized)
    }
}

/// Linter error
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error(transparent)]
    Core(#[from] xlint_core::Error),

    #[error(transparent)]
    Css(#[from] CssError),

    #[error(transparent)]
    Html(#[from] HtmlError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("linter used before init")]
    NotInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlint_core::Dataset;

    fn store() -> Arc<CompatStore> {
        let store = Arc::new(CompatStore::new("/nonexistent"));
        for feature in Feature::ALL {
            store.insert_dataset(feature, "ios_7", Dataset::default()).unwrap();
        }
        store
    }

    #[test]
    fn test_check_before_init() {
        let linter = Linter::new("/nonexistent");
        assert!(!linter.is_initialized());
        assert!(matches!(linter.check_css("a{}"), Err(LintError::NotInitialized)));
        assert!(matches!(linter.check_html("<p>"), Err(LintError::NotInitialized)));
    }

    #[test]
    fn test_init_registers_media_hook() {
        let mut linter = Linter::with_store(store());
        linter.init_blocking(Config::for_platforms(&["ios-7"])).unwrap();
        assert_eq!(linter.html_checker().unwrap().hook_names(), ["media"]);
        assert!(linter.check_css("a{float:left}").unwrap().is_clean());
    }

    #[test]
    fn test_configure_toggles_media_hook() {
        let mut linter = Linter::with_store(store());
        linter.init_blocking(Config::for_platforms(&["ios-7"])).unwrap();

        let mut config = Config::for_platforms(&["ios-7"]);
        config.features = vec![Feature::Css, Feature::Html];
        linter.configure_blocking(config).unwrap();
        assert!(linter.html_checker().unwrap().hook_names().is_empty());
        assert_eq!(linter.config().unwrap().features.len(), 2);
    }

    #[test]
    fn test_failed_configure_keeps_config() {
        let mut linter = Linter::with_store(store());
        linter.init_blocking(Config::for_platforms(&["ios-7"])).unwrap();

        let err = linter.configure_blocking(Config::for_platforms(&["android-4.0"])).unwrap_err();
        assert!(matches!(err, LintError::Core(xlint_core::Error::DataLoad { .. })));
        assert_eq!(linter.config().unwrap().platform_ids().collect::<Vec<_>>(), ["ios_7"]);
    }
}
