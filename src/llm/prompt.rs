//! Persona preamble for assistant questions.
//!
//! Every question is sent as a single prompt: a fixed preamble establishing
//! who the assistant is and how it should answer, followed by the user's
//! words on a `User:` line.  There is no conversation memory.

/// Builds the single-turn prompt sent to the conversational model.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    assistant_name: String,
}

impl PromptBuilder {
    pub fn new(assistant_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
        }
    }

    /// The fixed system preamble.
    pub fn preamble(&self) -> String {
        format!(
            "You are {}, a helpful desktop assistant with a friendly, intelligent personality. \
             Keep responses concise, actionable, and polite. Your answers are read aloud, so \
             avoid markdown, tables and long lists.",
            self.assistant_name
        )
    }

    /// Preamble + user query.
    pub fn build(&self, query: &str) -> String {
        format!("{}\nUser: {}", self.preamble(), query.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_names_the_assistant() {
        let p = PromptBuilder::new("Loki");
        assert!(p.preamble().starts_with("You are Loki,"));
    }

    #[test]
    fn build_appends_user_line() {
        let p = PromptBuilder::new("Loki");
        let prompt = p.build("  What's the weather? ");
        assert!(prompt.ends_with("\nUser: What's the weather?"));
        assert!(prompt.contains("concise"));
    }
}
