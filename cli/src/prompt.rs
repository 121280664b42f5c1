//! Interactive questions for the values which were not passed as flags

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};
use eyre::{eyre, WrapErr};

/// An option of a single choice question
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Choice {
    pub(crate) value: String,

    /// Shown dimmed next to the value
    pub(crate) hint: Option<String>,
}

impl Choice {
    pub(crate) fn new(value: &str) -> Self {
        Choice {
            value: value.to_string(),
            hint: None,
        }
    }

    pub(crate) fn with_hint(value: &str, hint: &str) -> Self {
        Choice {
            value: value.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn label(&self) -> String {
        match &self.hint {
            Some(hint) => format!("{}  {}", self.value, console::style(format!("({hint})")).dim()),
            None => self.value.clone(),
        }
    }
}

pub(crate) type Validator<'a> = &'a dyn Fn(&str) -> eyre::Result<()>;

pub(crate) trait Prompter: Send + Sync {
    /// Free text answer, re-asked until the validator accepts it
    fn get(
        &self,
        message: &str,
        default: Option<&str>,
        validator: Validator,
    ) -> eyre::Result<String>;

    /// Hidden input
    fn get_secret(&self, message: &str) -> eyre::Result<String>;

    /// Returns the value of the picked choice
    fn select_one(&self, message: &str, choices: &[Choice]) -> eyre::Result<String>;

    fn confirm(&self, message: &str, default: bool) -> eyre::Result<bool>;
}

/// Questions in the terminal
pub(crate) struct Terminal {
    theme: ColorfulTheme,
}

impl Terminal {
    pub(crate) fn new() -> Self {
        Terminal {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Prompter for Terminal {
    fn get(
        &self,
        message: &str,
        default: Option<&str>,
        validator: Validator,
    ) -> eyre::Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(message)
            .validate_with(|value: &String| -> Result<(), String> {
                validator(value).map_err(|e| e.to_string())
            });

        if let Some(default) = default {
            input = input.default(default.to_string());
        }

        input
            .interact_text()
            .wrap_err("Failed to read the answer")
    }

    fn get_secret(&self, message: &str) -> eyre::Result<String> {
        Password::with_theme(&self.theme)
            .with_prompt(message)
            .interact()
            .wrap_err("Failed to read the answer")
    }

    fn select_one(&self, message: &str, choices: &[Choice]) -> eyre::Result<String> {
        let labels = choices.iter().map(Choice::label).collect::<Vec<_>>();

        let index = Select::with_theme(&self.theme)
            .with_prompt(message)
            .items(&labels)
            .default(0)
            .interact()
            .wrap_err("Failed to read the answer")?;

        choices
            .get(index)
            .map(|c| c.value.clone())
            .ok_or_else(|| eyre!("No choice at position {index}"))
    }

    fn confirm(&self, message: &str, default: bool) -> eyre::Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(default)
            .interact()
            .wrap_err("Failed to read the answer")
    }
}
