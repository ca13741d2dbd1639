use thiserror::Error;

#[derive(Error, Debug)]
pub enum AstError {
    #[error("failed to set language for parser")]
    LanguageSet,

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("syntax error near line {line}: {message}")]
    Syntax { line: usize, message: String },
}
