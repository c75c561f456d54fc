use std::fmt;

use serde::{Serialize, Serializer};

use crate::errors::BackendError;

/// Every locale the front end ships messages for.
pub const SUPPORTED_LOCALES: &[&str] = &[
    "ar", "az", "bg", "bn", "cs", "da", "de", "el", "en", "es", "et", "fa", "fi", "fr", "he", "hi",
    "hr", "hu", "hy", "id", "it", "ja", "ka", "kk", "ko", "ky", "lt", "lv", "mn", "ms", "nl", "no",
    "pl", "pt", "ro", "ru", "sk", "sl", "sr", "sv", "tg", "th", "tk", "tr", "uk", "uz", "vi",
    "zh-CN", "zh",
];

pub const DEFAULT_LOCALE: &str = "en";

/// A language/region tag from [`SUPPORTED_LOCALES`], in its canonical
/// spelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale(&'static str);

impl Locale {
    /// Matches `tag` case-insensitively against the supported set.
    ///
    /// ```
    /// use risk_backend::locale::Locale;
    ///
    /// assert_eq!(Locale::parse(" ZH-cn ").unwrap().as_str(), "zh-CN");
    /// assert!(Locale::parse("xx").is_err());
    /// ```
    pub fn parse(tag: &str) -> Result<Self, BackendError> {
        let tag = tag.trim();

        SUPPORTED_LOCALES
            .iter()
            .find(|supported| supported.eq_ignore_ascii_case(tag))
            .map(|supported| Locale(*supported))
            .ok_or_else(|| BackendError::UnsupportedLocale(tag.to_owned()))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale(DEFAULT_LOCALE)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for Locale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}
