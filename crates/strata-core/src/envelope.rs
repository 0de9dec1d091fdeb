//! Uniform `{success, data | error}` response envelope

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ErrorKind, StrataError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub kind: ErrorKind,
}

impl From<&StrataError> for ErrorBody {
    fn from(err: &StrataError) -> Self {
        ErrorBody {
            message: err.to_string(),
            kind: err.kind(),
        }
    }
}

/// Result of one operation as seen by the boundary layer. Expected failures
/// never escape as panics or errors; they become `Failure`.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success(T),
    Failure(ErrorBody),
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Envelope::Success(data) => Some(data),
            Envelope::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Envelope::Success(_) => None,
            Envelope::Failure(body) => Some(body),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        match self {
            Envelope::Success(data) => Envelope::Success(f(data)),
            Envelope::Failure(body) => Envelope::Failure(body),
        }
    }
}

impl<T, E> From<Result<T, E>> for Envelope<T>
where
    E: Into<StrataError>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Envelope::Success(data),
            Err(err) => {
                let err: StrataError = err.into();
                tracing::debug!(kind = ?err.kind(), "operation failed: {}", err);
                Envelope::Failure(ErrorBody::from(&err))
            }
        }
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Envelope", 2)?;
        match self {
            Envelope::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            Envelope::Failure(body) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", body)?;
            }
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serialization() {
        let env: Envelope<Option<u32>> = Ok::<_, StrataError>(None).into();
        let json = serde_json::to_string(&env).unwrap();
        insta::assert_snapshot!(json, @r#"{"success":true,"data":null}"#);
    }

    #[test]
    fn test_failure_serialization() {
        let env: Envelope<()> = Err(StrataError::Conflict("duplicate id: a".to_string())).into();
        let json = serde_json::to_string(&env).unwrap();
        insta::assert_snapshot!(
            json,
            @r#"{"success":false,"error":{"message":"conflict: duplicate id: a","kind":"conflict"}}"#
        );
    }

    #[test]
    fn test_map_preserves_failure() {
        let env: Envelope<u32> = Err(StrataError::Config("missing output directory".into())).into();
        let mapped = env.map(|n| n + 1);
        assert!(!mapped.is_success());
        assert_eq!(mapped.error().map(|e| e.kind), Some(ErrorKind::Config));
    }
}
