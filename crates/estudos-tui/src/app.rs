use ratatui::widgets::ListState;
use tracing::{info, warn};
use estudos_core::theme::{parse_hex_color, DEFAULT_ACCENT};
use estudos_core::{ChatSession, Command, KeyValueStore, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Chat
    pub session: ChatSession,
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Context picker popup
    pub show_context_picker: bool,
    pub context_picker_state: ListState,

    // Appearance
    pub theme: Theme,
    pub accent: (u8, u8, u8),
    pub animation_frame: u8, // 0-2 for ellipsis animation

    /// One-line message for the footer (e.g. a failed preference write)
    pub status: Option<String>,

    store: Box<dyn KeyValueStore>,
}

impl App {
    pub fn new(
        session: ChatSession,
        store: Box<dyn KeyValueStore>,
        accent_color: Option<&str>,
    ) -> Self {
        let theme = Theme::load(&*store);

        let accent = accent_color
            .and_then(parse_hex_color)
            .or_else(|| parse_hex_color(DEFAULT_ACCENT))
            .unwrap_or((0, 123, 255));

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,

            session,
            input: String::new(),
            cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            show_context_picker: false,
            context_picker_state: ListState::default(),

            theme,
            accent,
            animation_frame: 0,

            status: None,
            store,
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Apply whatever the session finished in the background (the context
    /// list, the in-flight answer). Never waits on the backend.
    pub async fn sync_session(&mut self) {
        self.session.poll_contexts().await;
        if self.session.poll_reply().await {
            self.scroll_to_bottom();
        }
    }

    /// Send the current input as a new turn. The input is kept if the
    /// session refuses it (blank, or still waiting on the previous answer).
    pub fn submit_input(&mut self) -> bool {
        let text = self.input.clone();
        if !self.session.dispatch(Command::SubmitClicked { text }) {
            return false;
        }

        self.input.clear();
        self.cursor = 0;
        self.animation_frame = 0;
        self.input_mode = InputMode::Normal;
        self.scroll_to_bottom();
        true
    }

    pub fn open_context_picker(&mut self) {
        let selected = self
            .session
            .contexts()
            .iter()
            .position(|c| c.id == self.session.selected_context())
            .unwrap_or(0);
        self.context_picker_state.select(Some(selected));
        self.show_context_picker = true;
    }

    pub fn context_picker_nav_down(&mut self) {
        let len = self.session.contexts().len();
        if len > 0 {
            let i = self.context_picker_state.selected().unwrap_or(0);
            self.context_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn context_picker_nav_up(&mut self) {
        let i = self.context_picker_state.selected().unwrap_or(0);
        self.context_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn confirm_context(&mut self) {
        let chosen = self
            .context_picker_state
            .selected()
            .and_then(|i| self.session.contexts().get(i))
            .map(|c| c.id.clone());

        if let Some(context_id) = chosen {
            self.session.dispatch(Command::ContextChanged { context_id });
        }
        self.show_context_picker = false;
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        match self.theme.save(&mut *self.store) {
            Ok(()) => info!(theme = self.theme.as_str(), "theme saved"),
            Err(e) => {
                warn!(error = %e, "failed to save theme");
                self.status = Some(format!("Could not save theme: {e}"));
            }
        }
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll chat to bottom so the newest entry is visible
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.session.transcript().messages() {
            total_lines = total_lines.saturating_add(1); // Role line ("You:" or "AI:")
            let text = if msg.text.is_empty() { " " } else { msg.text.as_str() };
            for line in text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 { 1 } else { char_count / wrap_width + 1 };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    /// Display name of the context questions are currently scoped to
    pub fn context_label(&self) -> String {
        self.session
            .selected_context_option()
            .map(|c| c.display_name.clone())
            .unwrap_or_else(|| self.session.selected_context().to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use estudos_core::{
        AnswerService, ChatError, ChatRequest, ContextOption, ContextRegistry, MemoryStore, Role,
    };
    use std::sync::Arc;

    struct EchoAnswers;

    #[async_trait]
    impl AnswerService for EchoAnswers {
        async fn ask(&self, request: &ChatRequest) -> Result<String, ChatError> {
            Ok(format!("**{}**", request.text))
        }
    }

    struct Folders;

    #[async_trait]
    impl ContextRegistry for Folders {
        async fn list(&self) -> Result<Vec<ContextOption>, ChatError> {
            Ok(vec![ContextOption::new("f123", "Biologia")])
        }
    }

    /// Accepts the request and never answers
    pub(crate) struct StalledFolders;

    #[async_trait]
    impl ContextRegistry for StalledFolders {
        async fn list(&self) -> Result<Vec<ContextOption>, ChatError> {
            std::future::pending().await
        }
    }

    pub(crate) fn stalled_app() -> App {
        let mut session = ChatSession::new(Arc::new(EchoAnswers), Arc::new(StalledFolders));
        session.begin_loading_contexts();
        App::new(session, Box::new(MemoryStore::new()), None)
    }

    pub(crate) async fn test_app() -> App {
        let mut session = ChatSession::new(Arc::new(EchoAnswers), Arc::new(Folders));
        session.load_contexts().await;
        App::new(session, Box::new(MemoryStore::new()), Some("#ffffff"))
    }

    #[tokio::test]
    async fn test_submit_clears_input_and_starts_turn() {
        let mut app = test_app().await;
        app.input = "  mitose  ".to_string();
        app.cursor = app.input.chars().count();
        app.input_mode = InputMode::Editing;

        assert!(app.submit_input());
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.session.is_waiting());

        app.session.wait_for_reply().await;
        let roles: Vec<Role> = app.session.transcript().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_blank_submit_keeps_input() {
        let mut app = test_app().await;
        app.input = "   ".to_string();
        assert!(!app.submit_input());
        assert_eq!(app.input, "   ");
        assert!(app.session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_context_picker_selects_folder() {
        let mut app = test_app().await;
        assert_eq!(app.context_label(), "General");

        app.open_context_picker();
        assert_eq!(app.context_picker_state.selected(), Some(0));
        app.context_picker_nav_down();
        app.context_picker_nav_down();
        assert_eq!(app.context_picker_state.selected(), Some(1));
        app.confirm_context();

        assert!(!app.show_context_picker);
        assert_eq!(app.session.selected_context(), "f123");
        assert_eq!(app.context_label(), "Biologia");
    }

    #[tokio::test]
    async fn test_toggle_theme_persists() {
        let mut app = test_app().await;
        assert_eq!(app.theme, Theme::Light);
        app.toggle_theme();
        assert_eq!(app.theme, Theme::Dark);
        assert_eq!(Theme::load(&*app.store), Theme::Dark);
        assert!(app.status.is_none());
    }

    #[tokio::test]
    async fn test_sync_session_does_not_wait_on_contexts() {
        let mut app = stalled_app();
        app.sync_session().await;
        assert!(!app.session.contexts_loaded());
        assert!(!app.session.is_input_enabled());
    }

    #[tokio::test]
    async fn test_sync_session_applies_answer() {
        let mut app = test_app().await;
        app.input = "mitose".to_string();
        assert!(app.submit_input());

        let mut polls = 0;
        while app.session.is_waiting() {
            polls += 1;
            assert!(polls < 1000, "reply never arrived");
            tokio::task::yield_now().await;
            app.sync_session().await;
        }
        assert_eq!(app.session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_accent_parsing() {
        let app = test_app().await;
        assert_eq!(app.accent, (255, 255, 255));

        let session = ChatSession::new(Arc::new(EchoAnswers), Arc::new(Folders));
        let app = App::new(session, Box::new(MemoryStore::new()), Some("bogus"));
        assert_eq!(app.accent, (0, 123, 255));
    }
}
