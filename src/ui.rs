use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::CMDMode;
use crate::model::{Model, UIData};
use crate::pagination::visible_range;
use crate::service::display_cell;
use crate::state::{Presentation, Status};

pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const MAX_COLUMN_WIDTH: usize = 40;

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let data = model.get_uidata();
        let [header, search, table, footer, statusline] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_header(&data, frame, header);
        self.draw_search(&data, frame, search);
        self.draw_table(&data, frame, table);
        self.draw_footer(&data, frame, footer);
        self.draw_statusline(&data, frame, statusline);

        if let Some(message) = data.popup_message {
            self.draw_popup(message, frame);
        }
    }

    fn draw_header(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let title = Line::from(" CSV Viewer ".bold());
        let summary = match data.view.dataset() {
            Some(d) => Line::from(vec![
                "Records: ".into(),
                d.row_count.to_string().yellow(),
                "  Columns: ".into(),
                d.headers.len().to_string().yellow(),
            ]),
            None => Line::from(vec![
                "No dataset loaded. Press ".into(),
                "<u>".blue().bold(),
                " to upload a CSV file.".into(),
            ]),
        };
        let instructions = Line::from(vec![
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.right_aligned())
            .border_set(border::THICK);
        frame.render_widget(Paragraph::new(summary).block(block), area);
    }

    fn draw_search(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let (title, text, editing) = match data.cmd_mode {
            Some(CMDMode::Upload) => (" Upload CSV file ", data.cmdinput.input.as_str(), true),
            Some(CMDMode::GoToPage) => (" Go to page ", data.cmdinput.input.as_str(), true),
            Some(CMDMode::Search) => (" Search all columns ", data.search_text, true),
            None => (" Search all columns ", data.search_text, false),
        };
        let style = if editing {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let line = if text.is_empty() && !editing {
            Line::from("Press / to search ...".dark_gray())
        } else {
            Line::from(text.to_string())
        };
        let block = Block::bordered().title(title).border_style(style);
        let inner = block.inner(area);
        frame.render_widget(Paragraph::new(line).block(block), area);

        if editing {
            let curser_x = inner.x.saturating_add(data.cmdinput.curser_pos as u16);
            frame.set_cursor_position((curser_x.min(inner.right().saturating_sub(1)), inner.y));
        }
    }

    fn draw_table(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let message = match data.view.presentation() {
            Presentation::Rows => None,
            Presentation::NoDataset => Some(Line::from("Upload a CSV file to get started.".dark_gray())),
            Presentation::Loading => Some(Line::from("Loading ...".italic())),
            Presentation::NoData => Some(Line::from("No data to display".dark_gray())),
            Presentation::NoResults => Some(Line::from("Nothing found".dark_gray())),
            Presentation::Failed(detail) => Some(Line::from(vec![
                "Failed to load data: ".red().bold(),
                detail.red(),
            ])),
        };
        if let Some(line) = message {
            let block = Block::bordered();
            frame.render_widget(
                Paragraph::new(line)
                    .centered()
                    .wrap(Wrap { trim: true })
                    .block(block),
                area,
            );
            return;
        }

        let headers = data.view.headers();
        let rows = data.view.result().map(|r| r.rows.as_slice()).unwrap_or_default();
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| headers.iter().map(|h| display_cell(row, h)).collect())
            .collect();

        let widths: Vec<Constraint> = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| {
                let widest = cells
                    .iter()
                    .map(|r| r[idx].chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(h.chars().count());
                Constraint::Length((widest + COLUMN_WIDTH_MARGIN).min(MAX_COLUMN_WIDTH) as u16)
            })
            .collect();

        let header = Row::new(headers.iter().map(|h| Cell::from(h.clone().bold())))
            .style(Style::default().add_modifier(Modifier::UNDERLINED));
        let body = cells.into_iter().map(Row::new);

        let table = Table::new(body, widths)
            .header(header)
            .block(Block::bordered())
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = TableState::default().with_selected(Some(data.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_footer(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let view = data.view;
        if view.dataset().is_none() {
            return;
        }
        let query = view.query();
        let total = view.total_records();
        let mut spans: Vec<Span> = Vec::new();
        if let Some((first, last)) = visible_range(query.page_number(), query.page_size(), total) {
            spans.push(format!("Showing {first}-{last} of {total}").into());
        }
        if view.total_pages() > 1 {
            spans.push(format!("   Page {} of {}", query.page_number(), view.total_pages()).into());
        }
        if view.status() == Status::Loading {
            spans.push("   Loading ...".italic().yellow());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_statusline(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let line = if let Some(upload) = data.uploading {
            Line::from(format!("Uploading {} ...", upload.file_name).yellow())
        } else if data.clearing {
            Line::from("Clearing dataset ...".yellow())
        } else if let Some(notice) = &data.notice {
            if notice.is_error {
                Line::from(vec![notice.text.clone().red(), "  (Esc to dismiss)".dark_gray()])
            } else {
                Line::from(notice.text.clone().dark_gray())
            }
        } else {
            Line::default()
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let [area] = Layout::vertical([Constraint::Percentage(80)])
            .flex(Flex::Center)
            .areas(frame.area());
        let [area] = Layout::horizontal([Constraint::Percentage(60)])
            .flex(Flex::Center)
            .areas(area);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(message).block(block), area);
    }
}
