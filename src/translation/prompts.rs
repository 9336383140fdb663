/*!
 * Prompt templates for document translation.
 *
 * The system prompt is assembled from fixed sections: the translator persona,
 * an optional retain-term rule, the placeholder rule, and on retries a short
 * addendum asking for simpler output.
 */

/// System prompt builder for one translation attempt
#[derive(Debug, Clone)]
pub struct TranslationPromptBuilder {
    target_language: String,
    retain_terms: Vec<String>,
    attempt: u32,
}

impl TranslationPromptBuilder {
    /// Persona and core rules. Placeholder: {target_language}
    pub const BASE: &'static str = r#"
You are an expert translator creating educational content for students. Translate the given English text into a simple, clear and natural-sounding version of {target_language}. Students will read the result during an exam, so it MUST be easy to understand quickly.

## Core Persona: The Helpful Teacher
Write as a good teacher explaining these questions to students. The text must be 100% clear and easy to follow. Keep the tone encouraging and straightforward rather than formal or academic.

## CRITICAL RULES:
Follow these rules without exception:

1. **Clarity and Simplicity FIRST**: Prefer simple, common, everyday words over formal, literary or technical ones.

2. **Preserve Core Meaning, Not Exact Wording**: Keep all facts, data, names and the essential meaning of the question intact.

3. **Use Common English Words**: Many English words are common in modern spoken {target_language}. Use such loanwords when they make the translation more natural and easier to understand.

4. **Preserve Structure & Entities**: Keep all structural and named items exactly as they appear in the original text.
"#;

    /// Retain-term rule. Placeholder: {terms}
    pub const USER_TERMS: &'static str = r#"
5. **User-Defined Terms**: The user asked for the following words or phrases to stay exactly as they are. Do NOT translate them: {terms}.
"#;

    /// Placeholder rule and output format
    pub const MASK_TOKENS: &'static str = r#"
6. **Mask Tokens**: Tokens such as <<UT0>>, <<UT1>> or <<NE0>> stand for protected words or phrases. Keep every token exactly unchanged and in the same position.

## Output Format:
Answer with the translated text ONLY. No explanations, apologies or introductions.
"#;

    /// Retry addendum. Placeholder: {attempt} (1-based)
    pub const RETRY: &'static str = r#"
## RETRY ATTEMPT {attempt}:
The previous translation had quality issues. Focus on:
- Using even simpler language
- Perfect clarity for students
- Sounding more natural
- Preserving all formatting exactly
"#;

    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            retain_terms: Vec::new(),
            attempt: 0,
        }
    }

    /// Terms the model must leave untranslated
    pub fn with_retain_terms(mut self, terms: &[String]) -> Self {
        self.retain_terms = terms.to_vec();
        self
    }

    /// Zero-based attempt index; any value above zero adds the retry addendum
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Render the complete system prompt
    pub fn build(&self) -> String {
        let mut prompt = Self::BASE.replace("{target_language}", &self.target_language);

        if !self.retain_terms.is_empty() {
            let terms = self
                .retain_terms
                .iter()
                .map(|t| format!("\"{}\"", t))
                .collect::<Vec<_>>()
                .join(", ");
            prompt.push_str(&Self::USER_TERMS.replace("{terms}", &terms));
        }

        prompt.push_str(Self::MASK_TOKENS);

        if self.attempt > 0 {
            prompt.push_str(&Self::RETRY.replace("{attempt}", &(self.attempt + 1).to_string()));
        }

        prompt
    }
}

/// Scoring prompt. Placeholders: {target_language}, {original}, {translated}
pub const QUALITY_ASSESSMENT: &str = r#"
You are a translation quality assessor. Rate this translation from English to {target_language} (0-40 total):

Original: {original}
Translation: {translated}

Rate on:
1. Accuracy (0-10): Does it preserve the original meaning?
2. Clarity (0-10): Is it clear and easy to understand for students?
3. Naturalness (0-10): Does it sound natural in {target_language}?
4. Educational Appropriateness (0-10): Is it suitable for students?

Provide only the total score (0-40).
"#;

/// Render the scoring prompt
pub fn quality_prompt(original: &str, translated: &str, target_language: &str) -> String {
    QUALITY_ASSESSMENT
        .replace("{target_language}", target_language)
        .replace("{original}", original)
        .replace("{translated}", translated)
}
