//! ConsumerHandle - tag for a registered push handler
//!
//! Uses `Arc<str>` internally so the registry can hand out copies cheaply.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Identifies one registration in the dispatch core's handler registry.
///
/// # Examples
/// ```
/// use contracts::ConsumerHandle;
///
/// let handle: ConsumerHandle = "push-consumer".into();
/// assert_eq!(handle, "push-consumer");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConsumerHandle(Arc<str>);

impl ConsumerHandle {
    /// Create a new handle from a name.
    #[inline]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Borrow the handle name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ConsumerHandle {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for ConsumerHandle {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ConsumerHandle {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsumerHandle({:?})", self.0)
    }
}

impl PartialEq<str> for ConsumerHandle {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ConsumerHandle {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}
