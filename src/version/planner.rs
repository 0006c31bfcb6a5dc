//! Next-tag selection from the repository's existing tags.

use crate::error::{CliError, Result};
use crate::git::GitOperations;
use crate::prompt::Prompter;

use super::tag::{ReleaseTag, suggest_next};

/// Choice offered after the suggestions for a free-form tag
pub const OTHER_CHOICE: &str = "Other...";

/// Highest tag among the labels, or `v0.0.0` when there are none
pub fn highest_tag<S: AsRef<str>>(labels: &[S]) -> ReleaseTag {
    labels
        .iter()
        .filter_map(|label| ReleaseTag::parse(label.as_ref()).ok())
        .max()
        .unwrap_or_else(ReleaseTag::initial)
}

/// Derives the tag for a release from the tags already in the repository
pub struct TagPlanner<'a, G> {
    git: &'a G,
}

impl<'a, G: GitOperations> TagPlanner<'a, G> {
    /// Create a planner over a repository
    pub fn new(git: &'a G) -> Self {
        Self { git }
    }

    /// Most recent tag in the repository
    pub async fn current_tag(&self) -> Result<ReleaseTag> {
        let tags = self.git.list_tags().await?;
        Ok(highest_tag(tags.as_slice()))
    }

    /// Candidate tags following `current`, patch bump first
    pub fn suggest_next(&self, current: &ReleaseTag) -> Vec<ReleaseTag> {
        suggest_next(current)
    }

    /// Ask the operator for the new tag, offering the suggestions first
    pub async fn choose_next<P: Prompter>(&self, prompter: &P) -> Result<ReleaseTag> {
        let current = self.current_tag().await?;
        let suggestions = self.suggest_next(&current);

        let mut choices: Vec<String> = suggestions.iter().map(ToString::to_string).collect();
        choices.push(OTHER_CHOICE.to_string());

        let message = format!("Current tag is {}. What should the new tag be?", current);
        let index = prompter.choose(&message, &choices).await?;

        match suggestions.get(index) {
            Some(tag) => Ok(tag.clone()),
            None if index == suggestions.len() => {
                let typed = prompter.input("Type a name for the new tag:").await?;
                ReleaseTag::parse(&typed)
            }
            None => Err(CliError::PromptFailed {
                reason: format!("choice {} out of range", index),
            }
            .into()),
        }
    }
}
