use std::io;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, size};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use ratatui::{Frame, Terminal, TerminalOptions, Viewport};
use tokio::sync::mpsc;

use crate::anthropic::{MessageParam, Role};
use crate::client::ChatClient;
use crate::protocol::StreamEvent;
use crate::quick_start::QuickStartPicker;

type TuiTerminal = Terminal<CrosstermBackend<io::Stdout>>;

const INPUT_HEIGHT: u16 = 6;
const PICKER_HEIGHT: u16 = 6;

// Restores terminal settings even if the loop exits early.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Self {
        Self
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().flush();
    }
}

#[derive(Debug, Clone)]
pub enum ChatMessage {
    User(String),
    Assistant(String),
    Info(String),
}

#[derive(Debug, Clone)]
struct LineSpec {
    text: String,
    style: Style,
}

impl LineSpec {
    fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

impl ChatMessage {
    fn line_specs(&self) -> Vec<LineSpec> {
        match self {
            ChatMessage::User(msg) => {
                let header_style = Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::BOLD);
                let body_style = Style::default().fg(Color::Blue);
                let mut lines = vec![LineSpec::new("You:", header_style)];
                for line in msg.lines() {
                    lines.push(LineSpec::new(format!("  {}", line), body_style));
                }
                lines
            }
            ChatMessage::Assistant(msg) => {
                let header_style = Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD);
                let body_style = Style::default().fg(Color::Yellow);
                let mut lines = vec![LineSpec::new("CopyWriter:", header_style)];
                for line in msg.lines() {
                    lines.push(LineSpec::new(format!("  {}", line), body_style));
                }
                lines
            }
            ChatMessage::Info(msg) => vec![LineSpec::new(
                format!("ℹ {}", msg),
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            )],
        }
    }

    fn to_text(&self) -> Text<'static> {
        let lines = self
            .line_specs()
            .into_iter()
            .map(|spec| Line::from(Span::styled(spec.text, spec.style)))
            .collect::<Vec<_>>();
        Text::from(lines)
    }

    fn plain_lines(&self) -> Vec<String> {
        self.line_specs()
            .into_iter()
            .map(|spec| spec.text)
            .collect()
    }

    fn rendered_height(&self, width: u16) -> u16 {
        let width = width.max(1) as usize;
        let mut total = 0usize;
        for line in self.plain_lines() {
            let len = line.len().max(1);
            total += (len + width - 1) / width;
        }
        total as u16
    }
}

#[derive(Debug)]
enum UiEvent {
    Delta(String),
    Done,
    Error(String),
    Quit,
}

struct InputBuffer {
    lines: Vec<String>,
    cursor_x: usize,
    cursor_y: usize,
}

impl InputBuffer {
    fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_x: 0,
            cursor_y: 0,
        }
    }

    fn clear(&mut self) {
        self.lines = vec![String::new()];
        self.cursor_x = 0;
        self.cursor_y = 0;
    }

    fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.cursor_y = self.lines.len() - 1;
        self.cursor_x = self.lines[self.cursor_y].len();
    }

    fn insert_char(&mut self, c: char) {
        let line = &mut self.lines[self.cursor_y];
        if self.cursor_x >= line.len() {
            line.push(c);
        } else {
            line.insert(self.cursor_x, c);
        }
        self.cursor_x += 1;
    }

    fn delete_char(&mut self) {
        let line = &mut self.lines[self.cursor_y];
        if self.cursor_x > 0 {
            line.remove(self.cursor_x - 1);
            self.cursor_x -= 1;
        } else if self.cursor_y > 0 {
            let prev_line = self.lines.remove(self.cursor_y);
            self.cursor_y -= 1;
            self.cursor_x = self.lines[self.cursor_y].len();
            self.lines[self.cursor_y].push_str(&prev_line);
        }
    }

    fn new_line(&mut self) {
        let line = &self.lines[self.cursor_y];
        let remaining: String = line.chars().skip(self.cursor_x).collect();
        self.lines[self.cursor_y] = line.chars().take(self.cursor_x).collect();
        self.lines.insert(self.cursor_y + 1, remaining);
        self.cursor_y += 1;
        self.cursor_x = 0;
    }

    fn move_left(&mut self) {
        if self.cursor_x > 0 {
            self.cursor_x -= 1;
        } else if self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.cursor_x = self.lines[self.cursor_y].len();
        }
    }

    fn move_right(&mut self) {
        let line_len = self.lines[self.cursor_y].len();
        if self.cursor_x < line_len {
            self.cursor_x += 1;
        } else if self.cursor_y < self.lines.len() - 1 {
            self.cursor_y += 1;
            self.cursor_x = 0;
        }
    }

    fn move_up(&mut self) {
        if self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.cursor_x = self.cursor_x.min(self.lines[self.cursor_y].len());
        }
    }

    fn move_down(&mut self) {
        if self.cursor_y < self.lines.len() - 1 {
            self.cursor_y += 1;
            self.cursor_x = self.cursor_x.min(self.lines[self.cursor_y].len());
        }
    }

    fn to_string(&self) -> String {
        self.lines.join("\n")
    }

    fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.is_empty())
    }

    fn render(&self) -> Text<'static> {
        if self.is_empty() {
            return Text::from(Span::styled(
                "Describe the copy you need...",
                Style::default().fg(Color::DarkGray),
            ));
        }
        Text::from(
            self.lines
                .iter()
                .map(|l| Line::from(l.clone()))
                .collect::<Vec<_>>(),
        )
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct App {
    messages: Vec<ChatMessage>,
    input: InputBuffer,
    should_quit: bool,
    sender: mpsc::Sender<UiEvent>,
    receiver: mpsc::Receiver<UiEvent>,
    is_streaming: bool,
    client: Arc<ChatClient>,
    conversation: Vec<MessageParam>,
    picker: Option<QuickStartPicker>,
    current_response: String,
}

impl App {
    pub fn new(client: ChatClient) -> Self {
        let (sender, receiver) = mpsc::channel(100);

        Self {
            messages: Vec::new(),
            input: InputBuffer::new(),
            should_quit: false,
            sender,
            receiver,
            is_streaming: false,
            client: Arc::new(client),
            conversation: Vec::new(),
            picker: Some(QuickStartPicker::new()),
            current_response: String::new(),
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let [picker_area, input_area] =
            Layout::vertical([Constraint::Length(PICKER_HEIGHT), Constraint::Length(INPUT_HEIGHT)])
                .areas(f.area());

        match &self.picker {
            Some(picker) => {
                let paragraph = Paragraph::new(picker.to_text()).block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(" Quick start (↑/↓ to choose, Enter to use) ")
                        .border_style(Style::default().fg(Color::DarkGray)),
                );
                f.render_widget(paragraph, picker_area);
            }
            None => {
                let status = if self.is_streaming {
                    "CopyWriter is writing..."
                } else {
                    ""
                };
                let paragraph =
                    Paragraph::new(Span::styled(status, Style::default().fg(Color::DarkGray)));
                f.render_widget(paragraph, picker_area);
            }
        }

        let title = if self.is_streaming {
            " Input (Enter to send, Esc to quit) [Streaming...] "
        } else {
            " Input (Enter to send, Esc to quit) "
        };

        let input_paragraph = Paragraph::new(self.input.render())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(Color::DarkGray)),
            )
            .wrap(Wrap { trim: false });

        f.render_widget(input_paragraph, input_area);

        let cursor_x = (self.input.cursor_x + 1) as u16;
        let cursor_y = self.input.cursor_y as u16;
        let x = (input_area.x + cursor_x).min(input_area.x + input_area.width - 2);
        let y = (input_area.y + 1 + cursor_y).min(input_area.y + input_area.height - 2);
        f.set_cursor_position((x, y));
    }

    fn append_message(
        &mut self,
        terminal: &mut TuiTerminal,
        message: ChatMessage,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let width = terminal.size()?.width;
        let height = message.rendered_height(width).saturating_add(1);
        let mut text = message.to_text();
        text.extend(Text::raw("\n"));
        // Insert above the inline viewport so the transcript stays in scrollback.
        terminal.insert_before(height, |buf| {
            let paragraph = Paragraph::new(text).wrap(Wrap { trim: false });
            paragraph.render(buf.area, buf);
        })?;
        self.messages.push(message);
        Ok(())
    }

    fn send_current_input(
        &mut self,
        terminal: &mut TuiTerminal,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let msg = self.input.to_string();
        if msg.trim().is_empty() {
            return Ok(());
        }

        self.append_message(terminal, ChatMessage::User(msg.clone()))?;
        self.conversation.push(MessageParam {
            role: Role::User,
            content: msg,
        });
        self.input.clear();
        self.picker = None;
        self.is_streaming = true;
        self.current_response.clear();

        let client = Arc::clone(&self.client);
        let sender = self.sender.clone();
        let conversation = self.conversation.clone();
        tokio::spawn(async move {
            let events = sender.clone();
            let result = client
                .stream_chat(&conversation, |event| {
                    let events = events.clone();
                    async move {
                        let _ = match event {
                            StreamEvent::Content(text) => events.send(UiEvent::Delta(text)).await,
                            StreamEvent::Done => events.send(UiEvent::Done).await,
                            StreamEvent::Error(message) => {
                                events.send(UiEvent::Error(message)).await
                            }
                        };
                    }
                })
                .await;

            if let Err(err) = result {
                let _ = sender.send(UiEvent::Error(err.to_string())).await;
            }
        });

        Ok(())
    }

    fn finish_stream(
        &mut self,
        terminal: &mut TuiTerminal,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.current_response.is_empty() {
            let text = std::mem::take(&mut self.current_response);
            self.append_message(terminal, ChatMessage::Assistant(text.clone()))?;
            self.conversation.push(MessageParam {
                role: Role::Assistant,
                content: text,
            });
        }
        self.is_streaming = false;
        Ok(())
    }

    fn handle_events(
        &mut self,
        terminal: &mut TuiTerminal,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        while let Ok(event) = self.receiver.try_recv() {
            match event {
                UiEvent::Delta(text) => {
                    self.current_response.push_str(&text);
                }
                UiEvent::Done => {
                    self.finish_stream(terminal)?;
                }
                UiEvent::Error(err) => {
                    // Keep whatever text arrived before the failure.
                    self.finish_stream(terminal)?;
                    self.append_message(terminal, ChatMessage::Info(format!("Error: {}", err)))?;
                }
                UiEvent::Quit => {
                    self.should_quit = true;
                    return Ok(false);
                }
            }
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    self.should_quit = true;
                    let _ = self.sender.try_send(UiEvent::Quit);
                    return Ok(false);
                }

                match key.code {
                    KeyCode::Esc => {
                        self.should_quit = true;
                        let _ = self.sender.try_send(UiEvent::Quit);
                        return Ok(false);
                    }
                    KeyCode::Enter => {
                        if key.modifiers.contains(KeyModifiers::SHIFT) {
                            self.input.new_line();
                        } else if self.input.is_empty() {
                            // Enter on an empty input picks the highlighted
                            // starter and drops it into the input for editing.
                            if let Some(picker) = &self.picker {
                                let mut template = String::new();
                                picker.activate(|text| template = text.to_string());
                                self.input.set_text(&template);
                            }
                        } else if !self.is_streaming {
                            self.send_current_input(terminal)?;
                        }
                    }
                    KeyCode::Char(c) => {
                        self.input.insert_char(c);
                    }
                    KeyCode::Backspace => {
                        self.input.delete_char();
                    }
                    KeyCode::Left => {
                        self.input.move_left();
                    }
                    KeyCode::Right => {
                        self.input.move_right();
                    }
                    KeyCode::Up => match &mut self.picker {
                        Some(picker) if self.input.is_empty() => picker.select_prev(),
                        _ => self.input.move_up(),
                    },
                    KeyCode::Down => match &mut self.picker {
                        Some(picker) if self.input.is_empty() => picker.select_next(),
                        _ => self.input.move_down(),
                    },
                    KeyCode::Home => {
                        self.input.cursor_x = 0;
                    }
                    KeyCode::End => {
                        self.input.cursor_x = self.input.lines[self.input.cursor_y].len();
                    }
                    _ => {}
                }
            }
        }

        Ok(true)
    }
}

pub fn run_tui(client: ChatClient) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    let (_, rows) = size()?;
    if rows > 0 {
        // Push existing screen content into scrollback without clearing it.
        for _ in 0..rows {
            writeln!(stdout)?;
        }
        stdout.flush()?;
    }
    execute!(stdout, MoveTo(0, 0))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::with_options(
        backend,
        TerminalOptions {
            viewport: Viewport::Inline(PICKER_HEIGHT + INPUT_HEIGHT),
        },
    )?;

    let mut app = App::new(client);

    let _guard = TerminalGuard::new();

    terminal.draw(|f| app.draw(f))?;

    while !app.should_quit {
        if !app.handle_events(&mut terminal)? {
            break;
        }

        terminal.draw(|f| app.draw(f))?;

        std::thread::sleep(Duration::from_millis(10));
    }

    disable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::InputBuffer;

    #[test]
    fn input_buffer_shift_enter_inserts_new_line() {
        let mut buffer = InputBuffer::new();
        for ch in "hello".chars() {
            buffer.insert_char(ch);
        }
        buffer.new_line();
        for ch in "world".chars() {
            buffer.insert_char(ch);
        }

        assert_eq!(buffer.to_string(), "hello\nworld");
        assert_eq!(buffer.lines.len(), 2);
        assert_eq!(buffer.cursor_y, 1);
    }

    #[test]
    fn set_text_places_cursor_at_the_end() {
        let mut buffer = InputBuffer::new();
        buffer.set_text("first\nsecond");

        assert_eq!(buffer.to_string(), "first\nsecond");
        assert_eq!(buffer.cursor_y, 1);
        assert_eq!(buffer.cursor_x, "second".len());
    }
}
