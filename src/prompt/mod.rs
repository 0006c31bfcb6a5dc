//! Operator interaction.
//!
//! Every question the release asks goes through [`Prompter`]. The terminal
//! implementation uses `dialoguer`, whose prompts block until the operator
//! answers, so they run on tokio's blocking pool. Tests script the answers.

use crate::error::{CliError, ReleaseError, Result};
use dialoguer::{Confirm, Input, Select};
use std::future::Future;

/// Interactive questions asked during a release
pub trait Prompter: Send + Sync {
    /// Yes/no question
    fn confirm(&self, message: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Pick one of `choices`, returning its index
    fn choose(
        &self,
        message: &str,
        choices: &[String],
    ) -> impl Future<Output = Result<usize>> + Send;

    /// Free-form single line answer
    fn input(&self, message: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Prompter attached to the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Create a terminal prompter
    pub fn new() -> Self {
        Self
    }
}

fn prompt_failed(reason: impl ToString) -> ReleaseError {
    CliError::PromptFailed {
        reason: reason.to_string(),
    }
    .into()
}

/// Run a blocking terminal prompt off the async workers
async fn on_terminal<T, F>(prompt: F) -> Result<T>
where
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .map_err(prompt_failed)?
        .map_err(prompt_failed)
}

impl Prompter for TerminalPrompter {
    async fn confirm(&self, message: &str) -> Result<bool> {
        let message = message.to_string();
        on_terminal(move || {
            Confirm::new()
                .with_prompt(message)
                .default(false)
                .interact()
        })
        .await
    }

    async fn choose(&self, message: &str, choices: &[String]) -> Result<usize> {
        let message = message.to_string();
        let choices = choices.to_vec();
        on_terminal(move || {
            Select::new()
                .with_prompt(message)
                .items(&choices)
                .default(0)
                .interact()
        })
        .await
    }

    async fn input(&self, message: &str) -> Result<String> {
        let message = message.to_string();
        on_terminal(move || Input::<String>::new().with_prompt(message).interact_text()).await
    }
}
