use std::borrow::Cow;

/// Errors raised while loading rulesets, restoring characters or folding
/// award records. Rule checks on a character never error; they return a
/// [`Decision`](crate::Decision).
#[larp_derive::larp_error]
pub enum RulesError {
    /// A property expression or requirement that does not match the grammar.
    #[status(422)]
    #[error("Requirement parse failure for {input}")]
    Parse { input: String },

    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[status(422)]
    #[error("YAML error{}: {source}", format_context(.context))]
    Yaml { source: serde_yaml::Error, context: Option<Cow<'static, str>> },

    #[status(422)]
    #[error("JSON error{}: {source}", format_context(.context))]
    Json { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[status(422)]
    #[error("TOML error{}: {source}", format_context(.context))]
    Toml { source: toml::de::Error, context: Option<Cow<'static, str>> },

    #[error("Directory walk failed{}: {source}", format_context(.context))]
    Walk { source: walkdir::Error, context: Option<Cow<'static, str>> },

    #[status(404)]
    #[error("No ruleset file found in {path}")]
    RulesetNotFound { path: String },

    /// Strict loading stops at the first bad definition.
    #[status(422)]
    #[error("Bad definition in {path}: {message}")]
    BadDefinition { path: String, message: String },

    #[status(409)]
    #[error("Incompatible ruleset{}: {message}", format_context(.context))]
    Incompatible { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[status(422)]
    #[error("Invalid table{}: {message}", format_context(.context))]
    Table { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[status(422)]
    #[error("Invalid record{}: {message}", format_context(.context))]
    Record { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal rules error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
