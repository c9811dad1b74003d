use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace};

use crate::domain::{CMDMode, Command, HELP_TEXT, Message, ViewerConfig};
use crate::inputter::{InputResult, Inputter};
use crate::lifecycle::DatasetLifecycle;
use crate::orchestrator::{Commit, FetchOrchestrator};
use crate::pagination::clamp_page_request;
use crate::query::QueryModel;
use crate::service::{DatasetDescriptor, display_cell};
use crate::state::ViewState;
use crate::upload::{self, UploadCandidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modus {
    Table,
    Popup,
    CmdInput,
}

/// Search text typed but not yet sent, waiting out the debounce.
#[derive(Debug, Clone)]
struct PendingSearch {
    text: String,
    since: Instant,
}

/// A line for the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

/// Everything the UI needs for one frame.
pub struct UIData<'a> {
    pub view: &'a ViewState,
    pub search_text: &'a str,
    pub cmd_mode: Option<CMDMode>,
    pub cmdinput: &'a InputResult,
    pub selected_row: usize,
    pub popup_message: Option<&'a str>,
    pub uploading: Option<&'a UploadCandidate>,
    pub clearing: bool,
    pub notice: Option<Notice>,
}

/// The reducer. Every user intent and every finished request goes through
/// `update`, which returns the commands to run.
pub struct Model {
    config: ViewerConfig,
    quitting: bool,
    modus: Modus,
    previous_modus: Modus,
    view: ViewState,
    orchestrator: FetchOrchestrator,
    lifecycle: DatasetLifecycle,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    pending_search: Option<PendingSearch>,
    selected_row: usize,
    clipboard: Option<Clipboard>,
    status_message: String,
}

impl Model {
    pub fn init(config: &ViewerConfig) -> Self {
        Self {
            config: config.clone(),
            quitting: false,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            view: ViewState::new(),
            orchestrator: FetchOrchestrator::new(),
            lifecycle: DatasetLifecycle::new(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            pending_search: None,
            selected_row: 0,
            clipboard: None,
            status_message: format!("Connected to {}", config.server_url),
        }
    }

    pub fn quitting(&self) -> bool {
        self.quitting
    }

    /// While a prompt is open the controller forwards raw keys.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CmdInput
    }

    #[cfg(test)]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    #[cfg(test)]
    pub fn lifecycle(&self) -> &DatasetLifecycle {
        &self.lifecycle
    }

    pub fn get_uidata(&self) -> UIData<'_> {
        let search_text = match self.cmd_mode {
            Some(CMDMode::Search) => self.last_input.input.as_str(),
            _ => self
                .pending_search
                .as_ref()
                .map_or(self.view.query().search_text(), |p| p.text.as_str()),
        };
        UIData {
            view: &self.view,
            search_text,
            cmd_mode: self.cmd_mode,
            cmdinput: &self.last_input,
            selected_row: self.selected_row,
            popup_message: (self.modus == Modus::Popup).then_some(HELP_TEXT),
            uploading: self.lifecycle.uploading(),
            clearing: self.lifecycle.clearing(),
            notice: self.notice(),
        }
    }

    pub fn update(&mut self, message: Message) -> Vec<Command> {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        let mut commands = Vec::new();

        // Results and timer ticks are handled whatever the user is doing.
        match message {
            Message::Tick(now) => {
                self.flush_pending_search(now, &mut commands);
                return commands;
            }
            Message::FetchCompleted { token, outcome } => {
                match self.orchestrator.complete(&mut self.view, token, outcome) {
                    Commit::Applied | Commit::Failed => self.clamp_selection(),
                    Commit::Stale => {}
                }
                return commands;
            }
            Message::UploadCompleted(outcome) => {
                match outcome {
                    Ok(descriptor) => self.dataset_loaded(descriptor, &mut commands),
                    Err(e) => self.lifecycle.on_upload_failure(e),
                }
                return commands;
            }
            Message::ClearCompleted(outcome) => {
                let ok = outcome.is_ok();
                self.lifecycle.on_clear_result(&mut self.view, outcome);
                if ok {
                    self.pending_search = None;
                    self.selected_row = 0;
                    self.set_status_message("Dataset cleared");
                }
                return commands;
            }
            Message::Upload(path) => {
                self.request_upload(&path.to_string_lossy(), &mut commands);
                return commands;
            }
            _ => {}
        }

        match self.modus {
            Modus::Table => match message {
                Message::Quit => self.quit(),
                Message::NextPage => {
                    let page = self.view.query().page_number().saturating_add(1);
                    self.go_to_page(page, &mut commands);
                }
                Message::PreviousPage => {
                    let page = self.view.query().page_number().saturating_sub(1);
                    self.go_to_page(page, &mut commands);
                }
                Message::FirstPage => self.go_to_page(1, &mut commands),
                Message::LastPage => self.go_to_page(self.view.total_pages(), &mut commands),
                Message::GoToPage(page) => self.go_to_page(page, &mut commands),
                Message::MoveUp => self.selected_row = self.selected_row.saturating_sub(1),
                Message::MoveDown => {
                    self.selected_row += 1;
                    self.clamp_selection();
                }
                Message::Reload => self.reload(&mut commands),
                Message::CopyRow => self.copy_selected_row(),
                Message::Help => self.show_help(),
                Message::ClearSearch => self.change_search("", &mut commands),
                Message::EnterSearch => self.enter_cmd_mode(CMDMode::Search),
                Message::EnterUpload => self.enter_cmd_mode(CMDMode::Upload),
                Message::EnterGoToPage => self.enter_cmd_mode(CMDMode::GoToPage),
                Message::ClearDataset => {
                    if self.lifecycle.begin_clear(&self.view) {
                        self.set_status_message("Clearing dataset ...");
                        commands.push(Command::Clear);
                    }
                }
                Message::Exit => self.lifecycle.dismiss_error(),
                _ => (),
            },
            Modus::Popup => match message {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.close_popup(),
                _ => (),
            },
            Modus::CmdInput => {
                if let Message::RawKey(key) = message {
                    self.raw_input(key, &mut commands);
                }
            }
        }
        commands
    }

    // -------------------- Query changes ---------------------- //

    fn submit(&mut self, query: QueryModel, commands: &mut Vec<Command>) {
        let request = self.orchestrator.submit(&mut self.view, query);
        self.selected_row = 0;
        commands.push(Command::Fetch(request));
    }

    fn go_to_page(&mut self, requested: u64, commands: &mut Vec<Command>) {
        if self.view.dataset().is_none() {
            return;
        }
        let total_pages = self.view.total_pages();
        match clamp_page_request(requested, total_pages) {
            Some(page) if page != self.view.query().page_number() => {
                let query = self.view.query().with_page(page);
                self.submit(query, commands);
            }
            Some(_) => trace!("Already on page {requested}"),
            None => debug!("Ignoring page {requested}, valid range is 1..={total_pages}"),
        }
    }

    fn change_search(&mut self, text: &str, commands: &mut Vec<Command>) {
        self.pending_search = None;
        if self.view.dataset().is_none() || text == self.view.query().search_text() {
            return;
        }
        let query = self.view.query().with_search_text(text);
        self.submit(query, commands);
    }

    fn schedule_search(&mut self, text: String, commands: &mut Vec<Command>) {
        if self.config.search_debounce.is_zero() {
            self.change_search(&text, commands);
        } else {
            self.pending_search = Some(PendingSearch {
                text,
                since: Instant::now(),
            });
        }
    }

    fn flush_pending_search(&mut self, now: Instant, commands: &mut Vec<Command>) {
        let due = self
            .pending_search
            .as_ref()
            .is_some_and(|p| now.saturating_duration_since(p.since) >= self.config.search_debounce);
        if due && let Some(pending) = self.pending_search.take() {
            self.change_search(&pending.text, commands);
        }
    }

    fn reload(&mut self, commands: &mut Vec<Command>) {
        if self.view.dataset().is_some() {
            let query = self.view.query().clone();
            self.submit(query, commands);
        }
    }

    // -------------------- Dataset lifecycle ---------------------- //

    fn request_upload(&mut self, input: &str, commands: &mut Vec<Command>) {
        match upload::inspect(input) {
            Err(e) => self.lifecycle.reject(e),
            Ok(candidate) => {
                let message = if candidate.exceeds_size_hint() {
                    format!(
                        "Uploading {} ({:.2} MB, larger than the 10 MB the server accepts) ...",
                        candidate.file_name,
                        candidate.size_mb()
                    )
                } else {
                    format!(
                        "Uploading {} ({:.2} MB) ...",
                        candidate.file_name,
                        candidate.size_mb()
                    )
                };
                if self.lifecycle.begin_upload(candidate.clone()) {
                    self.set_status_message(message);
                    commands.push(Command::Upload(candidate));
                }
            }
        }
    }

    fn dataset_loaded(&mut self, descriptor: DatasetDescriptor, commands: &mut Vec<Command>) {
        let message = format!(
            "Loaded {} records with {} columns",
            descriptor.row_count,
            descriptor.headers.len()
        );
        self.lifecycle.on_upload_success(&mut self.view, descriptor);
        self.pending_search = None;
        if self.cmd_mode == Some(CMDMode::Search) {
            self.leave_cmd_mode();
            self.input.clear();
            self.last_input = self.input.get();
        }
        self.set_status_message(message);
        // The reset query counts as a query change, fetch its first page.
        let query = self.view.query().clone();
        self.submit(query, commands);
    }

    // -------------------- Control handling functions ---------------------- //

    fn quit(&mut self) {
        self.quitting = true;
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::Popup;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CmdInput;
        self.cmd_mode = Some(mode);
        match mode {
            CMDMode::Search => {
                let current = self
                    .pending_search
                    .as_ref()
                    .map_or(self.view.query().search_text(), |p| p.text.as_str())
                    .to_string();
                self.input.set(&current);
            }
            CMDMode::Upload | CMDMode::GoToPage => self.input.clear(),
        }
        self.last_input = self.input.get();
    }

    fn leave_cmd_mode(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CmdInput;
        self.cmd_mode = None;
    }

    fn raw_input(&mut self, key: KeyEvent, commands: &mut Vec<Command>) {
        self.last_input = self.input.read(key);
        let input = self.last_input.clone();

        if self.cmd_mode == Some(CMDMode::Search) && input.changed && !input.finished {
            self.schedule_search(input.input.clone(), commands);
        }
        if !input.finished {
            return;
        }

        let mode = self.cmd_mode;
        self.leave_cmd_mode();
        trace!("Handle cmd input {:?} '{}'", mode, input.input);
        match mode {
            Some(CMDMode::Search) => {
                // Esc leaves an empty buffer, which clears the search.
                self.change_search(&input.input, commands);
            }
            Some(CMDMode::Upload) if !input.canceled && !input.input.trim().is_empty() => {
                self.request_upload(&input.input, commands);
            }
            Some(CMDMode::GoToPage) if !input.canceled => {
                match input.input.trim().parse::<u64>() {
                    Ok(page) => commands.extend(self.update(Message::GoToPage(page))),
                    Err(_) => self.set_status_message(format!("Not a page number: '{}'", input.input)),
                }
            }
            _ => {}
        }
    }

    fn clamp_selection(&mut self) {
        let rows = self.view.result().map_or(0, |r| r.rows.len());
        self.selected_row = self.selected_row.min(rows.saturating_sub(1));
    }

    fn copy_selected_row(&mut self) {
        let Some(row) = self
            .view
            .result()
            .and_then(|r| r.rows.get(self.selected_row))
        else {
            return;
        };
        let text = self
            .view
            .headers()
            .iter()
            .map(|h| display_cell(row, h))
            .collect::<Vec<String>>()
            .join("\t");

        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    self.set_status_message(format!("Clipboard unavailable: {e}"));
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(text) {
                Ok(_) => self.set_status_message("Copied row to clipboard"),
                Err(e) => self.set_status_message(format!("Error copying to clipboard: {e}")),
            }
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        info!("{}", self.status_message);
    }

    fn notice(&self) -> Option<Notice> {
        if let Some(err) = self.lifecycle.last_error() {
            return Some(Notice {
                text: err.to_string(),
                is_error: true,
            });
        }
        if self.status_message.is_empty() {
            return None;
        }
        Some(Notice {
            text: self.status_message.clone(),
            is_error: false,
        })
    }
}
