//! Budgeted summarization.
//!
//! Turns extracted file content into chat prompts that fit the model's
//! context window and asks the model for a one-sentence description per
//! file, plus an optional aggregate summary across every file in the batch.
//!
//! # Budgets
//!
//! Token counts are approximated as 4 characters per token. A single file
//! gets `context_length * 4` characters. The aggregate prompt shares the
//! same budget across all files after reserving 200 characters of base
//! overhead and 500 per file for headers and the per-file summaries:
//!
//! ```text
//! chars_per_file = (context_length * 4 - (200 + 500 * n)) / n
//! ```
//!
//! When that comes out at zero or below, every file's content is replaced
//! with a placeholder and only the summaries are sent.
//!
//! Lengths are counted in `char`s, so cuts land on character boundaries.

use async_trait::async_trait;

use crate::llm::{ChatClient, ChatMessage, ChatRequest, ContentPart, ImageUrl};

pub const CHARS_PER_TOKEN: usize = 4;
pub const TRUNCATION_MARKER: &str = "\n...[TRUNCATED]...";
pub const OMITTED_PLACEHOLDER: &str = "[CONTENT OMITTED DUE TO CONTEXT LIMIT]";

const AGGREGATE_BASE_OVERHEAD: i64 = 200;
const AGGREGATE_PER_FILE_OVERHEAD: i64 = 500;

const DESCRIBE_PROMPT: &str = "Describe the following file in one sentence";
const DESCRIBE_IMAGE_PROMPT: &str = "Describe this image.";
const AGGREGATE_PROMPT: &str = "You are a helpful assistant. Provide a comprehensive summary of the provided files, highlighting the overall purpose and relationships between them.";
const AGGREGATE_INTRO: &str =
    "Here are the summaries and truncated contents of the files analyzed:\n\n";

/// The model's description of one file, with the content it was shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub filename: String,
    pub summary: String,
    /// Content as sent, after budget truncation.
    pub content: String,
}

#[derive(Debug)]
pub enum SummarizeError {
    /// The completion service failed; the underlying error is kept as-is.
    Service(anyhow::Error),
    /// The service answered with zero choices.
    NoResponse,
}

impl std::fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummarizeError::Service(e) => write!(f, "{}", e),
            SummarizeError::NoResponse => write!(f, "no response from AI"),
        }
    }
}

impl std::error::Error for SummarizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SummarizeError::Service(e) => Some(&**e),
            SummarizeError::NoResponse => None,
        }
    }
}

/// Describes single files and whole batches.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// One-sentence description of one file's extracted content.
    async fn summarize(
        &self,
        content: &str,
        content_type: &str,
        model: &str,
        filename: &str,
    ) -> Result<FileSummary, SummarizeError>;

    /// Cross-file summary of everything summarized so far.
    async fn summarize_all(
        &self,
        file_summaries: &[FileSummary],
        model: &str,
    ) -> Result<String, SummarizeError>;
}

/// [`Summarizer`] backed by a chat-completion service.
pub struct LlmSummarizer<C> {
    client: C,
    context_length: usize,
}

impl<C: ChatClient> LlmSummarizer<C> {
    /// `context_length` is the model's context window in tokens.
    pub fn new(client: C, context_length: usize) -> Self {
        Self {
            client,
            context_length,
        }
    }

    async fn request_completion(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<String, SummarizeError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages,
        };
        let response = self
            .client
            .complete(&request)
            .await
            .map_err(SummarizeError::Service)?;
        response.first_text().ok_or(SummarizeError::NoResponse)
    }
}

#[async_trait]
impl<C: ChatClient> Summarizer for LlmSummarizer<C> {
    async fn summarize(
        &self,
        content: &str,
        content_type: &str,
        model: &str,
        filename: &str,
    ) -> Result<FileSummary, SummarizeError> {
        let truncated = truncate_to_budget(content, char_budget(self.context_length));
        let messages = file_messages(&truncated, content_type, filename);
        let summary = self.request_completion(model, messages).await?;
        Ok(FileSummary {
            filename: filename.to_string(),
            summary,
            content: truncated,
        })
    }

    async fn summarize_all(
        &self,
        file_summaries: &[FileSummary],
        model: &str,
    ) -> Result<String, SummarizeError> {
        let per_file = chars_per_file(self.context_length, file_summaries.len());
        tracing::debug!(
            files = file_summaries.len(),
            chars_per_file = per_file,
            "building aggregate prompt"
        );
        let messages = vec![
            ChatMessage::system(AGGREGATE_PROMPT),
            ChatMessage::user(aggregate_prompt(file_summaries, per_file)),
        ];
        self.request_completion(model, messages).await
    }
}

/// Character budget for `tokens` tokens.
pub fn char_budget(tokens: usize) -> usize {
    tokens.saturating_mul(CHARS_PER_TOKEN)
}

/// Cut `content` to `max_chars` characters and append [`TRUNCATION_MARKER`]
/// if it is longer than that; otherwise return it unchanged.
pub fn truncate_to_budget(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

/// Per-file content allowance for the aggregate prompt. Zero means "omit".
pub fn chars_per_file(context_length: usize, files: usize) -> i64 {
    let max_total = i64::try_from(char_budget(context_length)).unwrap_or(i64::MAX);
    let files_i = i64::try_from(files).unwrap_or(i64::MAX);
    let overhead = AGGREGATE_PER_FILE_OVERHEAD
        .saturating_mul(files_i)
        .saturating_add(AGGREGATE_BASE_OVERHEAD);
    let available = max_total - overhead;
    if available > 0 && files_i > 0 {
        available / files_i
    } else {
        0
    }
}

/// Messages for describing a single file.
///
/// Images go out as a data URI built from the (possibly truncated) base64
/// content. A truncated payload is not valid base64 any more; it is sent
/// anyway.
pub fn file_messages(content: &str, content_type: &str, filename: &str) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage::system(DESCRIBE_PROMPT),
        ChatMessage::system(format!("The file name is called {}", filename)),
        ChatMessage::system(format!(
            "The output of the /usr/bin/file command is: {}",
            content_type
        )),
    ];

    if content_type.starts_with("image/") {
        messages.push(ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: DESCRIBE_IMAGE_PROMPT.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", content_type, content),
                },
            },
        ]));
    } else {
        messages.push(ChatMessage::user(content));
    }
    messages
}

/// Body of the aggregate request: every file's header, summary, and
/// content cut to `chars_per_file`.
pub fn aggregate_prompt(file_summaries: &[FileSummary], chars_per_file: i64) -> String {
    let mut out = String::from(AGGREGATE_INTRO);
    for fs in file_summaries {
        let content = if chars_per_file <= 0 {
            OMITTED_PLACEHOLDER.to_string()
        } else {
            truncate_to_budget(&fs.content, chars_per_file as usize)
        };
        out.push_str(&format!("--- File: {} ---\n", fs.filename));
        out.push_str(&format!("Summary: {}\n", fs.summary));
        out.push_str(&format!("Content:\n{}\n\n", content));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, MessageContent, Role};
    use anyhow::Result;
    use std::sync::{Arc, Mutex};

    enum Reply {
        Texts(Vec<&'static str>),
        Fail(&'static str),
    }

    /// Shared view of the requests a [`StubClient`] received.
    #[derive(Clone, Default)]
    struct RequestLog(Arc<Mutex<Vec<ChatRequest>>>);

    impl RequestLog {
        fn last_request(&self) -> ChatRequest {
            self.0.lock().unwrap().last().cloned().unwrap()
        }

        fn request_count(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    /// Records every request and answers with a canned reply.
    struct StubClient {
        reply: Reply,
        requests: RequestLog,
    }

    impl StubClient {
        fn answering(text: &'static str) -> Self {
            Self::with(Reply::Texts(vec![text]))
        }

        fn with(reply: Reply) -> Self {
            Self {
                reply,
                requests: RequestLog::default(),
            }
        }

        fn log(&self) -> RequestLog {
            self.requests.clone()
        }
    }

    #[async_trait]
    impl ChatClient for StubClient {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
            self.requests.0.lock().unwrap().push(request.clone());
            match &self.reply {
                Reply::Texts(texts) => Ok(ChatResponse::from_texts(texts.iter().copied())),
                Reply::Fail(msg) => Err(anyhow::anyhow!("{}", msg)),
            }
        }
    }

    fn summary(name: &str, content: &str) -> FileSummary {
        FileSummary {
            filename: name.to_string(),
            summary: format!("{} does things", name),
            content: content.to_string(),
        }
    }

    #[test]
    fn truncate_to_budget_cuts_on_characters() {
        assert_eq!(truncate_to_budget("abcdef", 6), "abcdef");
        assert_eq!(truncate_to_budget("abcdefg", 6), format!("abcdef{}", TRUNCATION_MARKER));
        assert_eq!(truncate_to_budget("", 0), "");
        assert_eq!(truncate_to_budget("héllo wörld", 4), format!("héll{}", TRUNCATION_MARKER));
    }

    #[test]
    fn chars_per_file_splits_what_is_left() {
        // 1000 tokens -> 4000 chars, minus 200 + 2 * 500.
        assert_eq!(chars_per_file(1000, 2), 1400);
        assert_eq!(chars_per_file(100, 1), 0);
        assert_eq!(chars_per_file(175, 1), 0);
        assert_eq!(chars_per_file(176, 1), 4);
        assert_eq!(chars_per_file(1000, 0), 0);
    }

    #[tokio::test]
    async fn summarize_truncates_to_four_chars_per_token() {
        let stub = StubClient::answering("A shopping list.");
        let log = stub.log();
        let summarizer = LlmSummarizer::new(stub, 10);
        let content = "x".repeat(41);

        let result = summarizer
            .summarize(&content, "text/plain", "test-model", "list.txt")
            .await
            .unwrap();

        let expected = format!("{}{}", "x".repeat(40), TRUNCATION_MARKER);
        assert_eq!(result.content, expected);
        assert_eq!(result.summary, "A shopping list.");
        assert_eq!(result.filename, "list.txt");

        let request = log.last_request();
        assert_eq!(request.model, "test-model");
        assert_eq!(request.messages.last().unwrap().text(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn summarize_keeps_content_at_exact_budget() {
        let summarizer = LlmSummarizer::new(StubClient::answering("ok"), 10);
        let content = "y".repeat(40);
        let result = summarizer
            .summarize(&content, "text/plain", "m", "f")
            .await
            .unwrap();
        assert_eq!(result.content, content);
    }

    #[tokio::test]
    async fn summarize_message_layout() {
        let stub = StubClient::answering("ok");
        let log = stub.log();
        let summarizer = LlmSummarizer::new(stub, 1000);
        summarizer
            .summarize("fn main() {}", "text/x-rust", "m", "main.rs")
            .await
            .unwrap();

        let messages = log.last_request().messages;
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::System, Role::System, Role::User]);
        let texts: Vec<&str> = messages.iter().filter_map(|m| m.text()).collect();
        assert_eq!(
            texts,
            vec![
                "Describe the following file in one sentence",
                "The file name is called main.rs",
                "The output of the /usr/bin/file command is: text/x-rust",
                "fn main() {}",
            ]
        );
    }

    #[tokio::test]
    async fn empty_content_is_sent_as_empty_user_turn() {
        let stub = StubClient::answering("An empty file.");
        let log = stub.log();
        let summarizer = LlmSummarizer::new(stub, 1000);
        let result = summarizer
            .summarize("", "application/octet-stream", "m", "blob.bin")
            .await
            .unwrap();
        assert_eq!(result.content, "");
        assert_eq!(log.last_request().messages[3].text(), Some(""));
    }

    #[tokio::test]
    async fn image_goes_out_as_data_uri() {
        let stub = StubClient::answering("A single pixel.");
        let log = stub.log();
        let summarizer = LlmSummarizer::new(stub, 1000);
        summarizer
            .summarize("iVBORw0KGgo=", "image/png", "m", "pixel.png")
            .await
            .unwrap();

        let user = log.last_request().messages.pop().unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(
            user.content,
            MessageContent::Parts(vec![
                ContentPart::Text {
                    text: "Describe this image.".to_string()
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/png;base64,iVBORw0KGgo=".to_string()
                    }
                },
            ])
        );
    }

    // Known defect: the budget applies to the base64 text of images too, so
    // an oversized image reaches the model as a corrupt, marker-suffixed
    // payload.
    #[tokio::test]
    async fn oversized_image_payload_is_truncated_as_text() {
        let stub = StubClient::answering("?");
        let log = stub.log();
        let summarizer = LlmSummarizer::new(stub, 2);
        let result = summarizer
            .summarize("AAAABBBBCCCC", "image/jpeg", "m", "big.jpg")
            .await
            .unwrap();
        assert_eq!(result.content, format!("AAAABBBB{}", TRUNCATION_MARKER));

        let user = log.last_request().messages.pop().unwrap();
        match user.content {
            MessageContent::Parts(parts) => assert_eq!(
                parts[1],
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,AAAABBBB{}", TRUNCATION_MARKER)
                    }
                }
            ),
            other => panic!("expected parts, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_choices_is_no_response() {
        let summarizer = LlmSummarizer::new(StubClient::with(Reply::Texts(vec![])), 1000);

        let err = summarizer
            .summarize("hello", "text/plain", "m", "a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizeError::NoResponse));

        let err = summarizer
            .summarize_all(&[summary("a.txt", "hello")], "m")
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizeError::NoResponse));
    }

    #[tokio::test]
    async fn service_errors_pass_through() {
        let summarizer =
            LlmSummarizer::new(StubClient::with(Reply::Fail("401 Unauthorized: bad key")), 1000);
        let err = summarizer
            .summarize("hello", "text/plain", "m", "a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizeError::Service(_)));
        assert_eq!(err.to_string(), "401 Unauthorized: bad key");
    }

    #[tokio::test]
    async fn first_choice_wins() {
        let summarizer = LlmSummarizer::new(
            StubClient::with(Reply::Texts(vec!["first", "second"])),
            1000,
        );
        let result = summarizer
            .summarize("hello", "text/plain", "m", "a.txt")
            .await
            .unwrap();
        assert_eq!(result.summary, "first");
    }

    #[tokio::test]
    async fn summarize_all_omits_every_file_when_budget_is_exhausted() {
        let stub = StubClient::answering("Overall.");
        let log = stub.log();
        let summarizer = LlmSummarizer::new(stub, 100);
        // 100 tokens -> 400 chars, overhead 200 + 3 * 500.
        let files = vec![
            summary("a.txt", "alpha"),
            summary("b.txt", ""),
            summary("c.txt", "gamma"),
        ];

        let overall = summarizer.summarize_all(&files, "m").await.unwrap();
        assert_eq!(overall, "Overall.");
        assert_eq!(log.request_count(), 1);

        let request = log.last_request();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        let body = request.messages[1].text().unwrap();
        assert_eq!(body.matches("Content:\n").count(), 3);
        for block in body.split("Content:\n").skip(1) {
            assert!(block.starts_with(OMITTED_PLACEHOLDER), "block: {:?}", block);
        }
        assert!(!body.contains("alpha"));
    }

    #[test]
    fn aggregate_prompt_layout() {
        let files = vec![summary("a.txt", &"a".repeat(2000)), summary("b.txt", "short")];
        let body = aggregate_prompt(&files, 1400);
        let expected = format!(
            "Here are the summaries and truncated contents of the files analyzed:\n\n\
             --- File: a.txt ---\nSummary: a.txt does things\nContent:\n{}{}\n\n\
             --- File: b.txt ---\nSummary: b.txt does things\nContent:\nshort\n\n",
            "a".repeat(1400),
            TRUNCATION_MARKER
        );
        assert_eq!(body, expected);
    }
}
