//! Script based language detection used to steer the response
//! language of the persona.
//!
//! Detection counts code points that fall in each script's Unicode
//! ranges and compares the ratio over the total character count
//! against a per-script threshold. Rules are checked in order and the
//! first one to fire wins. Chinese is checked first with a higher
//! threshold than the others since CJK ideographs also show up in
//! Japanese text.
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    Zh,
    En,
    Ja,
    Ko,
    Ru,
    Ar,
}

struct ScriptRule {
    language: Language,
    ranges: &'static [(char, char)],
    threshold: f64,
}

const RULES: &[ScriptRule] = &[
    ScriptRule {
        language: Language::Zh,
        ranges: &[('\u{4e00}', '\u{9fff}')],
        threshold: 0.3,
    },
    ScriptRule {
        language: Language::Ja,
        ranges: &[('\u{3040}', '\u{309f}'), ('\u{30a0}', '\u{30ff}')],
        threshold: 0.2,
    },
    ScriptRule {
        language: Language::Ko,
        ranges: &[('\u{ac00}', '\u{d7af}')],
        threshold: 0.2,
    },
    ScriptRule {
        language: Language::Ru,
        ranges: &[('\u{0400}', '\u{04ff}')],
        threshold: 0.2,
    },
    ScriptRule {
        language: Language::Ar,
        ranges: &[('\u{0600}', '\u{06ff}')],
        threshold: 0.2,
    },
];

const ENGLISH_INSTRUCTION: &str = "IMPORTANT: Always respond in English.";

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
            Language::Ja => "ja",
            Language::Ko => "ko",
            Language::Ru => "ru",
            Language::Ar => "ar",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            Language::Zh => "IMPORTANT: Always respond in Chinese (中文).",
            Language::En => ENGLISH_INSTRUCTION,
            Language::Ja => "IMPORTANT: Always respond in Japanese (日本語).",
            Language::Ko => "IMPORTANT: Always respond in Korean (한국어).",
            Language::Ru => "IMPORTANT: Always respond in Russian (Русский).",
            Language::Ar => "IMPORTANT: Always respond in Arabic (العربية).",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zh" => Ok(Language::Zh),
            "en" => Ok(Language::En),
            "ja" => Ok(Language::Ja),
            "ko" => Ok(Language::Ko),
            "ru" => Ok(Language::Ru),
            "ar" => Ok(Language::Ar),
            other => Err(anyhow!("Unsupported language code: {}", other)),
        }
    }
}

/// Detect the language of `text`. Defaults to English.
pub fn detect(text: &str) -> Language {
    let total = text.chars().count();
    if total == 0 {
        return Language::En;
    }

    RULES
        .iter()
        .find(|rule| {
            let matches = text
                .chars()
                .filter(|c| rule.ranges.iter().any(|&(lo, hi)| (lo..=hi).contains(c)))
                .count();
            matches as f64 / total as f64 > rule.threshold
        })
        .map(|rule| rule.language)
        .unwrap_or(Language::En)
}

/// The instruction sentence appended to the system prompt for a
/// language code. Unknown codes get the English instruction.
pub fn language_instruction(code: &str) -> &'static str {
    code.parse::<Language>()
        .map(|lang| lang.instruction())
        .unwrap_or(ENGLISH_INSTRUCTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_examples() {
        assert_eq!(detect("你好世界"), Language::Zh);
        assert_eq!(detect("Hello world"), Language::En);
        assert_eq!(detect(""), Language::En);
        assert_eq!(detect("こんにちは"), Language::Ja);
        assert_eq!(detect("안녕하세요"), Language::Ko);
        assert_eq!(detect("Привет, мир"), Language::Ru);
        assert_eq!(detect("مرحبا بالعالم"), Language::Ar);
    }

    #[test]
    fn test_detect_thresholds_are_strict() {
        // 3 of 10 characters is exactly 0.3 which does not fire for zh
        assert_eq!(detect("你好吗abcdefg"), Language::En);
        // 4 of 10 does
        assert_eq!(detect("你好吗呀abcdef"), Language::Zh);
        // 1 of 5 is exactly 0.2 which does not fire for ru
        assert_eq!(detect("Жabcd"), Language::En);
        assert_eq!(detect("Жabc"), Language::Ru);
    }

    #[test]
    fn test_detect_checks_chinese_first() {
        // Kanji heavy Japanese clears the zh threshold before ja is checked
        assert_eq!(detect("日本語を話す"), Language::Zh);
        // Kana heavy Japanese falls through to ja
        assert_eq!(detect("ひらがなとカタカナ"), Language::Ja);
    }

    #[test]
    fn test_language_instruction() {
        assert_eq!(
            language_instruction("zh"),
            "IMPORTANT: Always respond in Chinese (中文)."
        );
        assert_eq!(
            language_instruction("ko"),
            "IMPORTANT: Always respond in Korean (한국어)."
        );
        assert_eq!(language_instruction("fr"), ENGLISH_INSTRUCTION);
        assert_eq!(language_instruction(""), ENGLISH_INSTRUCTION);
    }

    #[test]
    fn test_language_code_round_trip() {
        for lang in [
            Language::Zh,
            Language::En,
            Language::Ja,
            Language::Ko,
            Language::Ru,
            Language::Ar,
        ] {
            assert_eq!(lang.code().parse::<Language>().unwrap(), lang);
            assert_eq!(lang.to_string(), lang.code());
        }
    }
}
