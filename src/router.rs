//! Conversational intent routing
//!
//! Every inbound text message is classified against the sender's session
//! flags. Routing applies the state transition (opening the code challenge,
//! granting access) and returns an [`Intent`] that the transport acts on.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use crate::auth::AuthGate;
use lazy_regex::lazy_regex;
use tracing::debug;

/// Match a YouTube watch, shorts or short-domain link anywhere in the text
static RE_VIDEO_URL: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r"(?:https?://)?(?:www\.)?(?:youtube\.com/watch\?v=|youtube\.com/shorts/|youtu\.be/)[A-Za-z0-9_-]+"
);

const HELP_TEXT: &str = "📥 Send me a YouTube link and I will download the video for you.\n\n\
Supported links:\n\
• https://www.youtube.com/watch?v=VIDEO_ID\n\
• https://www.youtube.com/shorts/VIDEO_ID\n\
• https://youtu.be/VIDEO_ID\n\n\
Commands:\n\
/start - start the bot\n\
/help - show this message";

/// Commands the bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start`
    Start,
    /// `/help`
    Help,
}

/// Parse a leading bot command, accepting the `/cmd@botname` form.
///
/// Returns `None` for plain text and for commands the bot does not know.
#[must_use]
pub fn parse_command(text: &str) -> Option<Command> {
    let token = text.split_whitespace().next()?;
    let name = token.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// Extract the first recognised video link from free text.
///
/// `https://` is prepended when the matched text has no scheme.
///
/// # Examples
///
/// ```
/// use tube_courier::router::extract_video_url;
///
/// assert_eq!(
///     extract_video_url("check this out youtu.be/abc123XYZ").as_deref(),
///     Some("https://youtu.be/abc123XYZ")
/// );
/// assert_eq!(extract_video_url("watch on vimeo.com/12345"), None);
/// ```
#[must_use]
pub fn extract_video_url(text: &str) -> Option<String> {
    let matched = RE_VIDEO_URL.find(text)?.as_str();
    if matched.starts_with("http://") || matched.starts_with("https://") {
        Some(matched.to_string())
    } else {
        Some(format!("https://{matched}"))
    }
}

/// Outcome of routing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// `/start` from an unauthenticated user: ask for the code
    PromptCode,
    /// Correct code: access granted
    CodeAccepted,
    /// Wrong code: the challenge stays open
    CodeRejected,
    /// Anything else from an unauthenticated user
    AuthRequired,
    /// `/start` from an authenticated user
    AlreadyAuthenticated,
    /// `/help` from an authenticated user
    Help,
    /// Authenticated user sent a recognised link
    Download {
        /// Normalised link with scheme
        url: String,
    },
    /// Authenticated user sent text without a recognised link
    InvalidLink,
}

impl Intent {
    /// Message to send back, `None` when the intent starts a download
    #[must_use]
    pub fn reply_text(&self) -> Option<String> {
        let text = match self {
            Self::PromptCode => "🔐 Please enter the access code.".to_string(),
            Self::CodeAccepted => format!("✅ Access granted!\n\n{HELP_TEXT}"),
            Self::CodeRejected => "❌ Wrong code. Please try again.".to_string(),
            Self::AuthRequired => {
                "⛔️ Please authenticate first: send /start and enter the access code.".to_string()
            }
            Self::AlreadyAuthenticated => {
                format!("👋 You are already authenticated.\n\n{HELP_TEXT}")
            }
            Self::Help => HELP_TEXT.to_string(),
            Self::InvalidLink => "⚠️ Please send a valid YouTube link, for example:\n\
                 https://www.youtube.com/watch?v=VIDEO_ID"
                .to_string(),
            Self::Download { .. } => return None,
        };
        Some(text)
    }

    /// Short label used in logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::PromptCode => "prompt_code",
            Self::CodeAccepted => "code_accepted",
            Self::CodeRejected => "auth_rejected",
            Self::AuthRequired => "auth_required",
            Self::AlreadyAuthenticated => "already_authenticated",
            Self::Help => "help",
            Self::Download { .. } => "download",
            Self::InvalidLink => "unrecognized_input",
        }
    }
}

/// Classifies messages and drives the per-user challenge state
#[derive(Clone)]
pub struct IntentRouter {
    gate: AuthGate,
}

impl IntentRouter {
    /// Create a router backed by `gate`
    #[must_use]
    pub const fn new(gate: AuthGate) -> Self {
        Self { gate }
    }

    /// Authentication gate used by this router
    #[must_use]
    pub const fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// Route one text message from `user_id`, applying any state change.
    pub async fn route(&self, user_id: i64, text: &str) -> Intent {
        let session = self.gate.store().session(user_id).await;
        let command = parse_command(text);

        let intent = if session.authenticated {
            match command {
                Some(Command::Start) => Intent::AlreadyAuthenticated,
                Some(Command::Help) => Intent::Help,
                None => extract_video_url(text)
                    .map_or(Intent::InvalidLink, |url| Intent::Download { url }),
            }
        } else if session.awaiting_code {
            if command == Some(Command::Start) {
                Intent::PromptCode
            } else if self.gate.verify_code(text) {
                self.gate.grant(user_id).await;
                Intent::CodeAccepted
            } else {
                Intent::CodeRejected
            }
        } else if command == Some(Command::Start) {
            self.gate.store().set_awaiting_code(user_id, true).await;
            Intent::PromptCode
        } else {
            Intent::AuthRequired
        };

        debug!(user_id, intent = intent.label(), "Routed message");
        intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{InMemorySessionStore, MockSessionStore, UserSession};
    use std::sync::Arc;

    const SECRET: &str = "Secret42";

    fn router() -> IntentRouter {
        IntentRouter::new(AuthGate::new(
            Arc::new(InMemorySessionStore::new()),
            SECRET,
        ))
    }

    async fn session(router: &IntentRouter, user_id: i64) -> UserSession {
        router.gate().store().session(user_id).await
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/start@courier_bot"), Some(Command::Start));
        assert_eq!(parse_command("/HELP extra words"), Some(Command::Help));
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command("start"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_extract_short_link_without_scheme() {
        assert_eq!(
            extract_video_url("check this out youtu.be/abc123XYZ").as_deref(),
            Some("https://youtu.be/abc123XYZ")
        );
    }

    #[test]
    fn test_extract_rejects_other_sites() {
        assert_eq!(extract_video_url("watch on vimeo.com/12345"), None);
        assert_eq!(extract_video_url("youtube.com/channel/xyz"), None);
        assert_eq!(extract_video_url("just text"), None);
    }

    #[test]
    fn test_extract_keeps_existing_scheme() {
        assert_eq!(
            extract_video_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_url("http://youtube.com/shorts/a_B-c").as_deref(),
            Some("http://youtube.com/shorts/a_B-c")
        );
        assert_eq!(
            extract_video_url("www.youtube.com/shorts/xyz").as_deref(),
            Some("https://www.youtube.com/shorts/xyz")
        );
    }

    #[test]
    fn test_extract_uses_first_match() {
        assert_eq!(
            extract_video_url("youtu.be/first and youtu.be/second").as_deref(),
            Some("https://youtu.be/first")
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_text_requires_auth() {
        let router = router();
        for text in ["hello", "/help", "https://youtu.be/abc", SECRET] {
            assert_eq!(router.route(1, text).await, Intent::AuthRequired);
        }
        assert_eq!(session(&router, 1).await, UserSession::default());
    }

    #[tokio::test]
    async fn test_start_opens_challenge() {
        let router = router();
        assert_eq!(router.route(1, "/start").await, Intent::PromptCode);
        assert!(session(&router, 1).await.awaiting_code);

        // Repeated /start keeps the challenge open without granting anything
        assert_eq!(router.route(1, "/start").await, Intent::PromptCode);
        let state = session(&router, 1).await;
        assert!(state.awaiting_code);
        assert!(!state.authenticated);
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_challenge_open() {
        let router = router();
        router.route(1, "/start").await;

        for attempt in ["secret42", "Secret4", "Secret42 ", "/help"] {
            assert_eq!(router.route(1, attempt).await, Intent::CodeRejected);
            assert!(session(&router, 1).await.awaiting_code);
        }
    }

    #[tokio::test]
    async fn test_correct_code_grants_access() {
        let router = router();
        router.route(1, "/start").await;
        assert_eq!(router.route(1, SECRET).await, Intent::CodeAccepted);

        let state = session(&router, 1).await;
        assert!(state.authenticated);
        assert!(!state.awaiting_code);
    }

    #[tokio::test]
    async fn test_authenticated_routes() {
        let router = router();
        router.gate().grant(1).await;

        assert_eq!(router.route(1, "/start").await, Intent::AlreadyAuthenticated);
        assert_eq!(router.route(1, "/help").await, Intent::Help);
        assert_eq!(router.route(1, "hello there").await, Intent::InvalidLink);
        assert_eq!(router.route(1, SECRET).await, Intent::InvalidLink);
        assert_eq!(
            router.route(1, "look: youtube.com/watch?v=abc_123").await,
            Intent::Download {
                url: "https://youtube.com/watch?v=abc_123".to_string()
            }
        );
        assert!(session(&router, 1).await.authenticated);
    }

    #[tokio::test]
    async fn test_start_never_reprompts_after_grant() {
        let router = router();
        router.route(1, "/start").await;
        router.route(1, SECRET).await;

        for _ in 0..3 {
            assert_eq!(router.route(1, "/start").await, Intent::AlreadyAuthenticated);
        }
    }

    #[tokio::test]
    async fn test_route_does_not_write_for_plain_rejection() {
        let mut store = MockSessionStore::new();
        store
            .expect_session()
            .returning(|_| UserSession::default());
        store.expect_set_awaiting_code().never();
        store.expect_set_authenticated().never();

        let router = IntentRouter::new(AuthGate::new(Arc::new(store), SECRET));
        assert_eq!(router.route(3, "hi").await, Intent::AuthRequired);
    }

    #[test]
    fn test_reply_text() {
        assert!(Intent::Download {
            url: "https://youtu.be/x".to_string()
        }
        .reply_text()
        .is_none());
        assert!(Intent::AuthRequired
            .reply_text()
            .is_some_and(|t| t.contains("authenticate first")));
        assert!(Intent::AlreadyAuthenticated
            .reply_text()
            .is_some_and(|t| t.contains("already authenticated")));
    }
}
