use std::{borrow::Cow, fmt::Write as _};

/// An error parsing or converting a canary API type.
///
/// Errors should be treated as opaque. They contain a message about what went
/// wrong and, when the error came from converting a nested object, a
/// jsonpath style path to the field that caused problems.
#[derive(Clone, PartialEq, Eq, thiserror::Error)]
pub struct Error {
    message: Cow<'static, str>,

    // the reversed path to the offending field. the leaf is pushed first and
    // the root of the object ends up last, see ErrorContext.
    path: Vec<PathEntry>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.path.is_empty() {
            write!(f, "{}: ", self.path())?;
        }

        f.write_str(&self.message)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Error")
            .field("message", &self.message)
            .field("path", &self.path())
            .finish()
    }
}

impl Error {
    /// The path to the field that caused this error, or an empty string if the
    /// error isn't attached to a field.
    pub fn path(&self) -> String {
        path_str(self.path.iter().rev())
    }

    /// The error message, without any path information.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn new_static(message: &'static str) -> Self {
        Self {
            message: Cow::Borrowed(message),
            path: vec![],
        }
    }

    pub(crate) fn new(message: String) -> Self {
        Self {
            message: Cow::Owned(message),
            path: vec![],
        }
    }
}

// field context is only attached during kube conversion. leave it available
// without the feature flag instead of gating every helper.
#[allow(unused)]
impl Error {
    pub(crate) fn with_field(mut self, field: &'static str) -> Self {
        self.path.push(PathEntry::Field(field));
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.path.push(PathEntry::Index(index));
        self
    }
}

fn path_str<'a, I>(path: I) -> String
where
    I: Iterator<Item = &'a PathEntry>,
{
    let mut buf = String::with_capacity(16);

    for (i, entry) in path.enumerate() {
        if i > 0 && entry.is_field() {
            buf.push('.');
        }
        let _ = write!(&mut buf, "{entry}");
    }

    buf
}

/// Add field-path context to an error. Context is added at the callsite, so a
/// function can add its own fields as an error propagates and the path ends up
/// in root-to-leaf order.
///
/// Not meant to be implemented outside this crate.
#[allow(unused)]
pub(crate) trait ErrorContext<T>: Sized {
    fn with_field(self, field: &'static str) -> Result<T, Error>;
    fn with_index(self, index: usize) -> Result<T, Error>;

    /// Shorthand for `with_field(b).with_field(a)`.
    fn with_fields(self, a: &'static str, b: &'static str) -> Result<T, Error> {
        self.with_field(b).with_field(a)
    }

    /// Shorthand for `with_index(idx).with_field(name)`.
    fn with_field_index(self, field: &'static str, index: usize) -> Result<T, Error> {
        self.with_index(index).with_field(field)
    }
}

impl<T> ErrorContext<T> for Result<T, Error> {
    fn with_field(self, field: &'static str) -> Result<T, Error> {
        self.map_err(|e| e.with_field(field))
    }

    fn with_index(self, index: usize) -> Result<T, Error> {
        self.map_err(|e| e.with_index(index))
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
enum PathEntry {
    Field(&'static str),
    Index(usize),
}

impl PathEntry {
    fn is_field(&self) -> bool {
        matches!(self, PathEntry::Field(_))
    }
}

impl std::fmt::Display for PathEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathEntry::Field(field) => f.write_str(field),
            PathEntry::Index(idx) => write!(f, "[{idx}]"),
        }
    }
}
