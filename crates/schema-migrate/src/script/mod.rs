//! Script handling: delimiters, statement tokenization and placeholder
//! substitution.

pub mod delimiter;
pub mod placeholder;
pub mod tokenizer;

pub use delimiter::Delimiter;
pub use placeholder::PlaceholderReplacer;
pub use tokenizer::{AlternateQuoteRules, NoAlternateQuotes, SqlStatement, StatementTokenizer};
