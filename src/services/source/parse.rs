/// Outcome of a post-parse unit or global action.
///
/// Hooks report expected operational failures through this value instead of
/// an error, so the processing loop can collect the message and continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub result: bool,
    pub message: String,
    pub code: String,
}

impl ParseResult {
    pub fn success() -> Self {
        Self {
            result: true,
            message: String::new(),
            code: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            result: false,
            message: message.into(),
            code: code.into(),
        }
    }
}

impl Default for ParseResult {
    fn default() -> Self {
        Self::success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_success() {
        let result = ParseResult::default();
        assert!(result.result);
        assert!(result.message.is_empty());
        assert!(result.code.is_empty());
    }

    #[test]
    fn test_failure_carries_message_and_code() {
        let result = ParseResult::failure("flag update rejected", "FLAG_UPDATE_FAILED");
        assert!(!result.result);
        assert_eq!(result.message, "flag update rejected");
        assert_eq!(result.code, "FLAG_UPDATE_FAILED");
    }
}
