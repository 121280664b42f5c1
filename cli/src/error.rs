/// Display global error message in unified format
#[derive(Debug)]
pub struct Error(String, Option<String>);

impl Error {
    pub fn new(message: &str, details: Option<&str>) -> Self {
        Error(message.to_string(), details.map(|d| d.to_string()))
    }

    #[cfg(test)]
    pub fn message(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub fn details(&self) -> Option<&str> {
        self.1.as_deref()
    }

    /// Print the error to stderr in the same format for every command
    pub fn print(&self) {
        eprintln!("\n{}\n{self}", console::style("Error").red().bold());
    }
}

/// Display the message and details, as sort of a hint
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.1 {
            Some(details) => write!(f, "{}\n\n{}", self.0, console::style(details).dim()),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Implement std::error::Error trait for Error
impl std::error::Error for Error {}

/// Automatically convert all eyre error reports
///
/// The outermost context becomes the message, the rest of the chain goes to details.
impl From<eyre::ErrReport> for Error {
    fn from(error: eyre::ErrReport) -> Self {
        log::error!("{error:?}");

        error.downcast::<Error>().unwrap_or_else(|err| {
            let causes = err
                .chain()
                .skip(1)
                .map(|cause| cause.to_string())
                .collect::<Vec<_>>();

            if causes.is_empty() {
                Error::new(&err.to_string(), None)
            } else {
                Error::new(&err.to_string(), Some(&causes.join(": ")))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn report_chain_becomes_details() {
        let report = Err::<(), _>(eyre::eyre!("Stack not found"))
            .wrap_err("Failed to deploy")
            .unwrap_err();

        let error = Error::from(report);
        assert_eq!(error.message(), "Failed to deploy");
        assert_eq!(error.details(), Some("Stack not found"));
    }

    #[test]
    fn wrapped_error_is_kept_as_is() {
        let report = eyre::Report::new(Error::new("Workspace not found", Some("Run init")));
        let error = Error::from(report);

        assert_eq!(error.message(), "Workspace not found");
        assert_eq!(error.details(), Some("Run init"));
    }
}
