#![cfg_attr(doc, doc = include_str!("../README.md"))]

use core::fmt;

/// Error carried by every IronMMS fallible operation: a static context
/// naming the operation, a crate-specific kind, and an optional
/// underlying cause.
#[derive(Debug)]
pub struct Error<Kind> {
    context: &'static str,
    kind: Kind,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl<Kind> Error<Kind> {
    #[cold]
    #[must_use]
    pub fn new(context: &'static str, kind: Kind) -> Self {
        Self {
            context,
            kind,
            cause: None,
        }
    }

    /// Attaches the error that triggered this one.
    #[cold]
    #[must_use]
    pub fn caused_by<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn context(&self) -> &'static str {
        self.context
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }
}

impl<Kind> Error<Kind>
where
    Kind: std::error::Error + 'static,
{
    /// Renders the error followed by its whole cause chain; meant for
    /// one-line log records.
    pub fn verbose(&self) -> String {
        use fmt::Write as _;
        use std::error::Error as _;

        let mut rendered = self.to_string();

        let mut next = self.source();
        while let Some(cause) = next {
            let _ = write!(rendered, ": {cause}");
            next = cause.source();
        }

        rendered
    }
}

impl<Kind> fmt::Display for Error<Kind>
where
    Kind: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.kind)
    }
}

impl<Kind> std::error::Error for Error<Kind>
where
    Kind: std::error::Error,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(source) = self.kind.source() {
            return Some(source);
        }

        // NOTE: Option::as_deref runs into type inference issues here
        if let Some(cause) = &self.cause {
            Some(cause.as_ref())
        } else {
            None
        }
    }
}
