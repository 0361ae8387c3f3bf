//! Classification rule tables.
//!
//! Rules are data: ordered lists evaluated first match wins. The built-in
//! tables can be extended (user rules take priority) or replaced through a
//! [`RulesConfig`], typically read from the `[rules]` table of a TOML file.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;

use logsift_types::ErrorType;

use crate::error::RuleError;

/// Built-in severity tokens, in priority order
const DEFAULT_SEVERITY: &[(&str, ErrorType)] = &[
    ("fatal", ErrorType::Fatal),
    ("ftl", ErrorType::Fatal),
    ("panic", ErrorType::Fatal),
    ("critical", ErrorType::Fatal),
    ("crit", ErrorType::Fatal),
    ("emerg", ErrorType::Fatal),
    ("emergency", ErrorType::Fatal),
    ("alert", ErrorType::Fatal),
    ("error", ErrorType::Error),
    ("err", ErrorType::Error),
    ("erro", ErrorType::Error),
    ("severe", ErrorType::Error),
    ("warning", ErrorType::Warning),
    ("warn", ErrorType::Warning),
    ("wrn", ErrorType::Warning),
    ("info", ErrorType::Info),
    ("inf", ErrorType::Info),
    ("information", ErrorType::Info),
    ("notice", ErrorType::Info),
    ("debug", ErrorType::Debug),
    ("dbg", ErrorType::Debug),
    ("debg", ErrorType::Debug),
    ("fine", ErrorType::Debug),
    ("trace", ErrorType::Trace),
    ("trc", ErrorType::Trace),
    ("trce", ErrorType::Trace),
    ("finer", ErrorType::Trace),
    ("finest", ErrorType::Trace),
];

/// Built-in message keywords, in priority order. Matched case-insensitively.
const DEFAULT_KEYWORDS: &[(&str, ErrorType)] = &[
    (r"\bfatal\b", ErrorType::Fatal),
    (r"\bpanic(?:ked|king)?\b", ErrorType::Fatal),
    (r"\bout of memory\b", ErrorType::Fatal),
    (r"\bsegmentation fault\b|\bsegfault\b", ErrorType::Fatal),
    (r"\bcore dumped\b", ErrorType::Fatal),
    (r"exception", ErrorType::Error),
    (r"\berrors?\b", ErrorType::Error),
    (r"\bfail(?:s|ed|ure|ing)?\b", ErrorType::Error),
    (r"\btimed?[ -]?out\b", ErrorType::Error),
    (r"\brefused\b", ErrorType::Error),
    (r"\bdenied\b", ErrorType::Error),
    (r"\btraceback\b", ErrorType::Error),
    (r"\bunable to\b|\bcould not\b|\bcannot\b|\bcan't\b", ErrorType::Error),
    (r"\bcrash(?:ed|es|ing)?\b", ErrorType::Error),
    (r"\bunreachable\b", ErrorType::Error),
    (r"\bno space left\b|\bdisk full\b", ErrorType::Error),
    (r"\bwarn(?:ing|ings|s)?\b", ErrorType::Warning),
    (r"\bdeprecat\w*", ErrorType::Warning),
    (r"\bretry(?:ing)?\b|\bretries\b", ErrorType::Warning),
    (r"\bdebug\b", ErrorType::Debug),
    (r"\binfo\b", ErrorType::Info),
    (r"\bsuccess(?:ful|fully)?\b", ErrorType::Info),
    (r"\bstarted\b|\bcompleted\b", ErrorType::Info),
];

/// Built-in phrase sub-tags, in priority order. Matched case-insensitively.
const DEFAULT_SUB_TAGS: &[(&str, &str)] = &[
    (r"\btimed?[ -]?out\b", "Timeout"),
    (r"\bconnection refused\b", "ConnectionRefused"),
    (r"\bconnection reset\b", "ConnectionReset"),
    (r"\bout of memory\b|\boom\b", "OutOfMemory"),
    (r"\bpermission denied\b|\baccess denied\b", "PermissionDenied"),
    (r"\bno space left\b|\bdisk full\b", "DiskFull"),
    (r"\bnull pointer\b|\bnull reference\b|\bnil pointer\b", "NullReference"),
    (r"\bsegmentation fault\b|\bsegfault\b", "SegmentationFault"),
    (r"\bdeadlock", "Deadlock"),
    (r"\bunauthori[sz]ed\b", "Unauthorized"),
    (r"\bnot found\b", "NotFound"),
];

/// Identifier ending in `Error` or `Exception`, optional dotted package path.
/// Group 1 is the bare name.
const EXCEPTION_PATTERN: &str =
    r"\b(?:[A-Za-z_][A-Za-z0-9_]*\.)*([A-Za-z_][A-Za-z0-9_]*(?:Error|Exception))\b";

static BUILTIN: LazyLock<RuleSet> = LazyLock::new(|| {
    RuleSet::from_config(&RulesConfig::default()).expect("built-in rules are valid")
});

// ============================================================================
// Configuration
// ============================================================================

/// Serializable rule configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Drop the built-in tables instead of extending them
    pub replace_defaults: bool,

    pub severity: Vec<SeverityRuleConfig>,
    pub keyword: Vec<KeywordRuleConfig>,
    pub sub_tag: Vec<SubTagRuleConfig>,
}

/// `token` (case-insensitive) → `error_type`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeverityRuleConfig {
    pub token: String,
    pub error_type: ErrorType,
}

/// Message regex → `error_type`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordRuleConfig {
    pub pattern: String,
    pub error_type: ErrorType,
}

/// Message regex → free-text sub-tag
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubTagRuleConfig {
    pub pattern: String,
    pub tag: String,
}

// ============================================================================
// Compiled rules
// ============================================================================

/// A compiled message rule
#[derive(Clone, Debug)]
pub struct KeywordRule {
    pub pattern: Regex,
    pub error_type: ErrorType,
}

/// A compiled sub-tag rule
#[derive(Clone, Debug)]
pub struct SubTagRule {
    pub pattern: Regex,
    pub tag: String,
}

/// Compiled, immutable rule tables shared by the recognizer and classifier
#[derive(Clone, Debug)]
pub struct RuleSet {
    /// Lowercased token → type, first configured mapping wins
    severity: HashMap<String, ErrorType>,

    /// Tokens as configured, in priority order (recognizer vocabulary)
    tokens: Vec<String>,

    keywords: Vec<KeywordRule>,
    sub_tags: Vec<SubTagRule>,
    exception: Regex,
}

impl RuleSet {
    /// Compile a rule configuration
    pub fn from_config(config: &RulesConfig) -> Result<Self, RuleError> {
        let mut severity_pairs: Vec<(String, ErrorType)> = config
            .severity
            .iter()
            .map(|r| (r.token.clone(), r.error_type))
            .collect();
        let mut keyword_pairs: Vec<(String, ErrorType)> = config
            .keyword
            .iter()
            .map(|r| (r.pattern.clone(), r.error_type))
            .collect();
        let mut sub_tag_pairs: Vec<(String, String)> = config
            .sub_tag
            .iter()
            .map(|r| (r.pattern.clone(), r.tag.clone()))
            .collect();

        if !config.replace_defaults {
            severity_pairs.extend(DEFAULT_SEVERITY.iter().map(|(t, e)| (t.to_string(), *e)));
            keyword_pairs.extend(DEFAULT_KEYWORDS.iter().map(|(p, e)| (p.to_string(), *e)));
            sub_tag_pairs.extend(
                DEFAULT_SUB_TAGS
                    .iter()
                    .map(|(p, t)| (p.to_string(), t.to_string())),
            );
        }

        let mut severity = HashMap::new();
        let mut tokens = Vec::new();
        for (token, error_type) in severity_pairs {
            let token = token.trim();
            if token.is_empty() {
                return Err(RuleError::EmptyToken);
            }
            let key = token.to_lowercase();
            if !severity.contains_key(&key) {
                severity.insert(key, error_type);
                tokens.push(token.to_string());
            }
        }

        let keywords = keyword_pairs
            .into_iter()
            .map(|(pattern, error_type)| {
                Ok(KeywordRule {
                    pattern: compile("keyword", &pattern)?,
                    error_type,
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        let sub_tags = sub_tag_pairs
            .into_iter()
            .map(|(pattern, tag)| {
                if tag.trim().is_empty() {
                    return Err(RuleError::EmptySubTag(pattern));
                }
                Ok(SubTagRule {
                    pattern: compile("sub-tag", &pattern)?,
                    tag,
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        let exception = Regex::new(EXCEPTION_PATTERN).map_err(|source| RuleError::InvalidPattern {
            kind: "exception",
            pattern: EXCEPTION_PATTERN.to_string(),
            source,
        })?;

        Ok(Self {
            severity,
            tokens,
            keywords,
            sub_tags,
            exception,
        })
    }

    /// Map a severity token, case-insensitively
    pub fn severity_of(&self, token: &str) -> Option<ErrorType> {
        self.severity.get(&token.trim().to_lowercase()).copied()
    }

    /// Severity vocabulary in priority order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// First keyword rule (by priority) matching `message`
    pub fn keyword_match(&self, message: &str) -> Option<ErrorType> {
        self.keywords
            .iter()
            .find(|rule| rule.pattern.is_match(message))
            .map(|rule| rule.error_type)
    }

    /// First phrase sub-tag (by priority) matching `message`
    pub fn sub_tag_match(&self, message: &str) -> Option<&str> {
        self.sub_tags
            .iter()
            .find(|rule| rule.pattern.is_match(message))
            .map(|rule| rule.tag.as_str())
    }

    /// First exception-like identifier in `message`, package path removed
    pub fn exception_name<'a>(&self, message: &'a str) -> Option<&'a str> {
        self.exception
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

fn compile(kind: &'static str, pattern: &str) -> Result<Regex, RuleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| RuleError::InvalidPattern {
            kind,
            pattern: pattern.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_lookup_is_case_insensitive() {
        let rules = RuleSet::default();
        assert_eq!(rules.severity_of("WARN"), Some(ErrorType::Warning));
        assert_eq!(rules.severity_of("Critical"), Some(ErrorType::Fatal));
        assert_eq!(rules.severity_of("verbose"), None);
    }

    #[test]
    fn test_keyword_priority_not_position() {
        let rules = RuleSet::default();
        // "warning" appears first but error rules have priority
        assert_eq!(
            rules.keyword_match("warning: request failed"),
            Some(ErrorType::Error)
        );
        assert_eq!(rules.keyword_match("system heartbeat ok"), None);
    }

    #[test]
    fn test_exception_name_strips_package() {
        let rules = RuleSet::default();
        assert_eq!(
            rules.exception_name("java.lang.NullPointerException: x is null"),
            Some("NullPointerException")
        );
        assert_eq!(rules.exception_name("raise ValueError('bad')"), Some("ValueError"));
        assert_eq!(rules.exception_name("ERROR Error: nope"), None);
    }

    #[test]
    fn test_user_rules_take_priority() {
        let config = RulesConfig {
            severity: vec![SeverityRuleConfig {
                token: "notice".to_string(),
                error_type: ErrorType::Warning,
            }],
            keyword: vec![KeywordRuleConfig {
                pattern: r"\bheartbeat\b".to_string(),
                error_type: ErrorType::Info,
            }],
            ..RulesConfig::default()
        };
        let rules = RuleSet::from_config(&config).unwrap();
        assert_eq!(rules.severity_of("NOTICE"), Some(ErrorType::Warning));
        assert_eq!(
            rules.keyword_match("system heartbeat ok"),
            Some(ErrorType::Info)
        );
        // built-ins still present
        assert_eq!(rules.severity_of("error"), Some(ErrorType::Error));
    }

    #[test]
    fn test_replace_defaults() {
        let config = RulesConfig {
            replace_defaults: true,
            severity: vec![SeverityRuleConfig {
                token: "E".to_string(),
                error_type: ErrorType::Error,
            }],
            ..RulesConfig::default()
        };
        let rules = RuleSet::from_config(&config).unwrap();
        assert_eq!(rules.tokens(), &["E".to_string()]);
        assert_eq!(rules.severity_of("error"), None);
        assert_eq!(rules.keyword_match("it failed"), None);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = RulesConfig {
            keyword: vec![KeywordRuleConfig {
                pattern: "(unclosed".to_string(),
                error_type: ErrorType::Error,
            }],
            ..RulesConfig::default()
        };
        let err = RuleSet::from_config(&config).unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { kind: "keyword", .. }));
    }
}
