use std::sync::Arc;

use log::Logger;

use crate::classifier::Classifier;
use crate::config::parse_variable_or;
use crate::db::Db;

pub type SafeDb = dyn Db + Send + Sync;
pub type SafeClassifier = dyn Classifier + Send + Sync;

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<SafeDb>,
    pub classifier: Arc<SafeClassifier>,
    pub config: Config,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, db: Arc<SafeDb>, classifier: Arc<SafeClassifier>, config: Config) -> Self {
        Self {
            logger,
            db,
            classifier,
            config,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub(crate) default_page_size: i64,
    pub(crate) max_page_size: i64,
    pub(crate) top_count: i64,
}

impl Config {
    pub fn new(default_page_size: i64, max_page_size: i64, top_count: i64) -> Self {
        Self {
            default_page_size,
            max_page_size,
            top_count,
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self::new(
            parse_variable_or("BACKEND_DEFAULT_PAGE_SIZE", defaults.default_page_size),
            parse_variable_or("BACKEND_MAX_PAGE_SIZE", defaults.max_page_size),
            parse_variable_or("BACKEND_TOP_COUNT", defaults.top_count),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(20, 100, 5)
    }
}
