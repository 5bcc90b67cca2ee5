use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and knowledgeable assistant designed to help students find professors based on their specific queries.
You use Retrieval-Augmented Generation (RAG) to provide the top 3 professors who best match the user's request.
For each query, retrieve relevant information from the database, including professor ratings, courses taught, and student reviews.
Then, generate a response that ranks the top 3 professors according to the student's criteria.
Ensure that the response is clear, concise, and tailored to the user's needs.
If needed, ask clarifying questions to better understand the student's query.
";

#[derive(Debug)]
pub enum PromptError {
    Empty(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::Empty(path) => write!(f, "Prompt file '{}' has an empty system_prompt", path),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    pub system_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { system_prompt: DEFAULT_SYSTEM_PROMPT.to_string() }
    }
}

pub fn load_prompts_from_str(content: &str, origin: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(content)?;
    if config.system_prompt.trim().is_empty() {
        return Err(PromptError::Empty(origin.to_string()));
    }
    Ok(config)
}

/// Loads the persona from `path`, or the built-in one when no path is given.
pub fn load_prompts<P: AsRef<Path>>(path: Option<P>) -> Result<Arc<PromptConfig>, PromptError> {
    let Some(path) = path else {
        return Ok(Arc::new(PromptConfig::default()));
    };
    let path = path.as_ref();
    let file_content = fs::read_to_string(path)?;
    let config = load_prompts_from_str(&file_content, &path.display().to_string())?;
    info!("Loaded system prompt override from {}", path.display());
    Ok(Arc::new(config))
}
