//! Interactive prompts

use async_trait::async_trait;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use super::parameters::ParameterValues;
use crate::manifest::ManifestParameter;

#[async_trait]
pub trait Prompter: Send + Sync {
    /// Pick one of `choices`
    async fn select_chain(&self, choices: &[String]) -> Result<String, PromptError>;

    /// Ask for each parameter; unanswered ones are left out of the map
    async fn collect_parameter_values(
        &self,
        parameters: &[&ManifestParameter],
    ) -> Result<ParameterValues, PromptError>;

    async fn confirm(&self, question: &str) -> Result<bool, PromptError>;

    async fn input(&self, question: &str) -> Result<String, PromptError>;
}

/// Line based prompts on stdin/stdout
pub struct StdinPrompter {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn ask(&self, question: &str) -> Result<String, PromptError> {
        print!("{} ", question);
        std::io::stdout()
            .flush()
            .map_err(|e| PromptError::Io(e.to_string()))?;

        let mut lines = self.lines.lock().await;
        let line = lines
            .next_line()
            .await
            .map_err(|e| PromptError::Io(e.to_string()))?
            .ok_or(PromptError::Closed)?;
        Ok(line.trim().to_string())
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn select_chain(&self, choices: &[String]) -> Result<String, PromptError> {
        if choices.is_empty() {
            return Err(PromptError::NoChoices);
        }
        for (idx, choice) in choices.iter().enumerate() {
            println!("  {}) {}", idx + 1, choice);
        }

        loop {
            let answer = self.ask("Select a chain:").await?;
            if let Some(choice) = pick(choices, &answer) {
                return Ok(choice.clone());
            }
            println!("Enter a number between 1 and {} or a chain name", choices.len());
        }
    }

    async fn collect_parameter_values(
        &self,
        parameters: &[&ManifestParameter],
    ) -> Result<ParameterValues, PromptError> {
        let mut values = ParameterValues::new();
        for param in parameters {
            let question = match &param.default_value {
                Some(default) => format!("{} ({}) [{}]:", param.title, param.key, default),
                None => format!("{} ({}):", param.title, param.key),
            };
            let answer = self.ask(&question).await?;
            if !answer.is_empty() {
                values.insert(param.key.clone(), answer);
            }
        }
        Ok(values)
    }

    async fn confirm(&self, question: &str) -> Result<bool, PromptError> {
        let answer = self.ask(&format!("{} [y/N]", question)).await?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    async fn input(&self, question: &str) -> Result<String, PromptError> {
        self.ask(question).await
    }
}

/// Match an answer by 1-based index or by name
fn pick<'a>(choices: &'a [String], answer: &str) -> Option<&'a String> {
    if let Ok(n) = answer.parse::<usize>() {
        return n.checked_sub(1).and_then(|idx| choices.get(idx));
    }
    choices.iter().find(|c| c.eq_ignore_ascii_case(answer))
}

/// Prompt errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum PromptError {
    #[error("Input closed before an answer was given")]
    Closed,

    #[error("Nothing to choose from")]
    NoChoices,

    #[error("Prompt I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick() {
        let choices = vec!["SUI_TESTNET".to_string(), "SUI_MAINNET".to_string()];
        assert_eq!(pick(&choices, "2").unwrap(), "SUI_MAINNET");
        assert_eq!(pick(&choices, "sui_testnet").unwrap(), "SUI_TESTNET");
        assert!(pick(&choices, "0").is_none());
        assert!(pick(&choices, "3").is_none());
        assert!(pick(&choices, "ETH_MAINNET").is_none());
    }
}
