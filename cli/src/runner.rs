use crate::context::Context;
use crate::error::Error;
use std::error::Error as StdError;

/// Every command goes through the same three steps
///
/// Validate the flags, ask for whatever is still missing, then do the actual work.
pub(crate) trait Runner {
    /// Check the values passed as flags, before any prompt is shown
    async fn validate(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Prompt for the values which were not passed as flags
    async fn ask(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Run the command
    ///
    /// Returns an error shown to the user in case of failure
    async fn execute(&mut self) -> Result<(), Error>;

    async fn run(&mut self) -> Result<(), Error> {
        self.validate().await?;
        self.ask().await?;
        self.execute().await
    }

    /// Construct an error shown to the user
    fn error(
        &self,
        title: Option<&str>,
        description: Option<&str>,
        origin: Option<Box<dyn StdError>>,
    ) -> Error {
        if let Some(origin) = origin {
            log::error!("{origin:?}");
        }

        if let Some(title) = title {
            Error::new(title, description)
        } else {
            Error::new(
                "Failed to run the command",
                Some("Run again with RUST_LOG=debug to see the details"),
            )
        }
    }

    /// A shortcut for failed AWS calls
    fn aws_error(&self, title: &str, origin: eyre::Report) -> Error {
        let details = format!("{origin:#}");
        self.error(Some(title), Some(&details), Some(origin.into()))
    }
}

/// Return a runner for a command
pub(crate) trait Runnable {
    fn runner(&self, ctx: &Context) -> impl Runner;
}
