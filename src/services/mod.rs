pub mod synthesis;
pub mod translate;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DubError;

pub use synthesis::{HttpSynthesizer, SpeechSynthesizer};
pub use translate::{LibreTranslateClient, Translator};

/// ISO-639 language code with an optional region, e.g. `es`, `hi`, `zh-CN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LanguageCode {
    type Err = DubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut parts = s.splitn(2, ['-', '_']);
        let lang = parts.next().unwrap_or_default();
        let region = parts.next();

        let lang_ok = (2..=3).contains(&lang.len()) && lang.chars().all(|c| c.is_ascii_alphabetic());
        let region_ok = region.map_or(true, |r| {
            (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric())
        });
        if !lang_ok || !region_ok {
            return Err(DubError::Config(format!("invalid language code '{}'", s)));
        }

        let code = match region {
            Some(r) => format!("{}-{}", lang.to_ascii_lowercase(), r.to_ascii_uppercase()),
            None => lang.to_ascii_lowercase(),
        };
        Ok(LanguageCode(code))
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = DubError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self {
        code.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_normalized() {
        assert_eq!("ES".parse::<LanguageCode>().expect("valid").as_str(), "es");
        assert_eq!("zh_cn".parse::<LanguageCode>().expect("valid").as_str(), "zh-CN");
        assert_eq!(" hi ".parse::<LanguageCode>().expect("valid").to_string(), "hi");
    }

    #[test]
    fn malformed_codes_are_rejected() {
        for bad in ["", "e", "spanish", "e5", "es-", "es-TOOLONG"] {
            assert!(bad.parse::<LanguageCode>().is_err(), "{} accepted", bad);
        }
    }
}
