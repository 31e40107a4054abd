//! Canned starter prompts shown before the first message is sent.
//!
//! Purely presentational: a fixed list of templates and a selection cursor.
//! Activation hands the chosen template string to a caller-supplied
//! callback, verbatim, placeholders included.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

pub struct QuickStartItem {
    pub icon: &'static str,
    pub label: &'static str,
    pub template: &'static str,
}

pub const ITEMS: [QuickStartItem; 4] = [
    QuickStartItem {
        icon: "✎",
        label: "Website Copy",
        template: "Can you help me write compelling website copy? My business focuses on [please specify your industry and target audience].",
    },
    QuickStartItem {
        icon: "💬",
        label: "Social Media Captions",
        template: "I need engaging social media captions for my posts about [mention topic or product]. Can you provide some creative options?",
    },
    QuickStartItem {
        icon: "✉",
        label: "Email Marketing",
        template: "Can you draft a high-converting email for my campaign? The goal is [e.g., lead generation, sales, engagement].",
    },
    QuickStartItem {
        icon: "📖",
        label: "Blog Content",
        template: "I need a blog post on [mention topic]. Can you help structure and write an engaging piece?",
    },
];

pub struct QuickStartPicker {
    selected: usize,
}

impl QuickStartPicker {
    pub fn new() -> Self {
        Self { selected: 0 }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % ITEMS.len();
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.checked_sub(1).unwrap_or(ITEMS.len() - 1);
    }

    /// Invokes `on_select` with the selected item's template, verbatim.
    pub fn activate<F: FnOnce(&str)>(&self, on_select: F) {
        on_select(ITEMS[self.selected].template);
    }

    pub fn to_text(&self) -> Text<'static> {
        let lines = ITEMS
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let style = if index == self.selected {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                let marker = if index == self.selected { "▸" } else { " " };
                Line::from(Span::styled(
                    format!("{} {} {}", marker, item.icon, item.label),
                    style,
                ))
            })
            .collect::<Vec<_>>();
        Text::from(lines)
    }
}

impl Default for QuickStartPicker {
    fn default() -> Self {
        Self::new()
    }
}
