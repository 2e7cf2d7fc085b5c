use serde_json::Value;

use crate::error::CompileError;

/// The schema dialects this compiler understands.
///
/// Ordering follows publication order, which is what the keyword gates in
/// the dispatcher compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Dialect {
    Draft4,
    Draft6,
    Draft7,
    Draft201909,
    Draft202012,
}

impl Dialect {
    /// Decides the dialect from `$schema`, falling back to `default` when
    /// the schema does not declare one. A declared but unrecognized
    /// dialect is an error, not a silent fallback.
    pub fn detect(schema: &Value, default: Dialect) -> Result<Dialect, CompileError> {
        let Some(uri) = schema.get("$schema").and_then(Value::as_str) else {
            return Ok(default);
        };

        match uri.trim_end_matches('#') {
            "http://json-schema.org/draft-04/schema" => Ok(Dialect::Draft4),
            "http://json-schema.org/draft-06/schema" => Ok(Dialect::Draft6),
            "http://json-schema.org/draft-07/schema" => Ok(Dialect::Draft7),
            "https://json-schema.org/draft/2019-09/schema" => Ok(Dialect::Draft201909),
            "https://json-schema.org/draft/2020-12/schema" => Ok(Dialect::Draft202012),
            _ => Err(CompileError::UnknownDialect(uri.to_string())),
        }
    }

    /// The keyword that names a schema resource in this dialect.
    pub fn id_keyword(self) -> &'static str {
        match self {
            Dialect::Draft4 => "id",
            _ => "$id",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect() {
        assert_eq!(
            Dialect::detect(&json!({}), Dialect::Draft202012).unwrap(),
            Dialect::Draft202012
        );
        assert_eq!(
            Dialect::detect(
                &json!({"$schema": "http://json-schema.org/draft-04/schema#"}),
                Dialect::Draft202012
            )
            .unwrap(),
            Dialect::Draft4
        );
        assert_eq!(
            Dialect::detect(
                &json!({"$schema": "https://json-schema.org/draft/2019-09/schema"}),
                Dialect::Draft202012
            )
            .unwrap(),
            Dialect::Draft201909
        );
        assert!(Dialect::detect(
            &json!({"$schema": "https://example.com/custom"}),
            Dialect::Draft202012
        )
        .is_err());
    }

    #[test]
    fn test_ordering_follows_publication() {
        assert!(Dialect::Draft4 < Dialect::Draft7);
        assert!(Dialect::Draft201909 < Dialect::Draft202012);
    }
}
