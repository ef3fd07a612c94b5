//! Status-code policy results.

/// Result of checking a response against an expected status code.
///
/// `Ok` carries the payload when the status matched. `NotMatched` carries
/// the status the server actually returned; it is an ordinary answer
/// (a lookup that found nothing, a refused toggle), not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    NotMatched(u16),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    /// The unexpected status code, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::NotMatched(status) => Some(*status),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::NotMatched(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::NotMatched(status) => Outcome::NotMatched(status),
        }
    }
}
