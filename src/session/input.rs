//! User input classification

/// Words that end the chat, compared case-insensitively
pub const EXIT_WORDS: [&str; 3] = ["exit", "quit", "bye"];

/// What to do with a line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Leave the chat loop
    Exit,
    /// Nothing to send; prompt again
    Skip,
    /// Forward the trimmed text to the agent
    Send(String),
}

/// Classify a raw input line
pub fn classify(line: &str) -> InputAction {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return InputAction::Skip;
    }
    let lowered = trimmed.to_lowercase();
    if EXIT_WORDS.contains(&lowered.as_str()) {
        return InputAction::Exit;
    }
    InputAction::Send(trimmed.to_string())
}

/// Whether a permission prompt answer grants access
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words() {
        assert_eq!(classify("exit"), InputAction::Exit);
        assert_eq!(classify("  QUIT \n"), InputAction::Exit);
        assert_eq!(classify("Bye"), InputAction::Exit);
    }

    #[test]
    fn test_empty_is_skipped() {
        assert_eq!(classify(""), InputAction::Skip);
        assert_eq!(classify("   \t\n"), InputAction::Skip);
    }

    #[test]
    fn test_send_is_trimmed() {
        assert_eq!(
            classify("  Quiz me on ownership \n"),
            InputAction::Send("Quiz me on ownership".to_string())
        );
    }

    #[test]
    fn test_exit_word_inside_sentence_is_sent() {
        assert_eq!(
            classify("how do I exit vim"),
            InputAction::Send("how do I exit vim".to_string())
        );
    }

    #[test]
    fn test_affirmative_answers() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES\n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("sure"));
    }
}
