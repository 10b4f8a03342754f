//! Rewrites post text through an LLM backend.

use async_trait::async_trait;
use tracing::debug;

use recast_types::{Category, CollaboratorError, CollaboratorResult, Rewriter};

use crate::backend::SharedBackend;
use crate::types::{CompletionRequest, Message};

/// Maximum characters in a published post.
pub const MAX_POST_CHARS: usize = 280;

const ELLIPSIS: &str = "...";

const SYSTEM_PROMPT: &str = "You are an expert social media editor.";

fn instruction(category: Category) -> &'static str {
    match category {
        Category::General => "Rewrite this post so it is more engaging and relatable",
        Category::Promotional => {
            "Rewrite this promotional post so it is more compelling while staying professional"
        }
        Category::News => "Rewrite this news post so it is clearer and grabs attention",
        Category::Personal => "Rewrite this personal post so it sounds authentic and engaging",
        Category::Retweet => "This is a repost; only tidy up the language where needed",
        Category::Thread => "This post is part of a thread; make it more coherent and engaging",
    }
}

/// Build the user prompt for one post.
pub fn build_prompt(text: &str, category: Category) -> String {
    format!(
        "{}.\n\n\
         Post: \"{}\"\n\n\
         Constraints:\n\
         - At most {} characters\n\
         - Keep the original meaning and tone\n\
         - No hashtags\n\
         - Leave URLs and @mentions unchanged\n\
         - Emoji and non-English text are fine\n\n\
         Reply with the rewritten post only.",
        instruction(category),
        text,
        MAX_POST_CHARS
    )
}

/// Strip fenced code blocks, inline backticks and surrounding whitespace.
pub fn clean_response(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("```") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 3..];
        let Some(end) = after_open.find("```") else {
            // Unterminated fence: keep the remainder without the marker.
            rest = after_open;
            break;
        };
        let block = &after_open[..end];
        // Drop an optional language tag on the opening line.
        let body = match block.split_once('\n') {
            Some((tag, body)) if !tag.trim().contains(' ') => body,
            _ => block,
        };
        out.push_str(body);
        rest = &after_open[end + 3..];
    }
    out.push_str(rest);

    out.replace('`', "").trim().to_string()
}

/// Cut text longer than [`MAX_POST_CHARS`] characters, ending it with `...`.
pub fn fit_to_limit(text: &str) -> String {
    if text.chars().count() <= MAX_POST_CHARS {
        return text.to_string();
    }
    let keep = MAX_POST_CHARS - ELLIPSIS.len();
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(ELLIPSIS);
    cut
}

/// Rewrite collaborator backed by an LLM.
pub struct LlmRewriter {
    backend: SharedBackend,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmRewriter {
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 200,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Rewriter for LlmRewriter {
    async fn rewrite(&self, text: &str, category: Category) -> CollaboratorResult<String> {
        let request = CompletionRequest::new(
            self.model.as_str(),
            vec![Message::user(build_prompt(text, category))],
            self.max_tokens,
        )
        .with_system(SYSTEM_PROMPT)
        .with_temperature(self.temperature);

        let response = self.backend.complete(request).await?;
        let cleaned = clean_response(&response.text);
        if cleaned.is_empty() {
            return Err(CollaboratorError::failure(format!(
                "{} returned an empty rewrite",
                self.backend.name()
            )));
        }

        let rewritten = fit_to_limit(&cleaned);
        debug!(
            backend = self.backend.name(),
            category = %category,
            chars = rewritten.chars().count(),
            "Post rewritten"
        );
        Ok(rewritten)
    }
}
