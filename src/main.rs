mod asset;
mod config;
mod error;
mod gemini;
mod request;
mod response;
mod reverse_search;
mod validate;

use iced::{
    widget::{
        button, column, container, horizontal_space, image::Handle as ImageHandle, row,
        scrollable, text, text_input, text_input::Id, Column, Image,
    },
    Element, Length, Task, Theme, Font, Subscription,
    time, clipboard,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment,
    window,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::asset::{Ingested, SelectedFile, UploadedAsset, DEFAULT_CLAIM_PLACEHOLDER};
use crate::error::Error;
use crate::gemini::FactChecker;
use crate::response::AnalysisOutcome;
use crate::reverse_search::ReverseSearchLinks;

const LOG_ENV: &str = "GROUNDCHECK_LOG";
const DEFAULT_FILE_STATUS: &str = "Enter the path of an image (.jpg, .png) or text document (.txt)";
const LINKS_PREPARED: &str =
    "Links prepared! Click the Google Images or TinEye links to perform the search in your browser.";

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load();
    if config.gemini.api_key.is_empty() {
        tracing::warn!(
            "no API key configured; set GEMINI_API_KEY or [gemini].api_key in {}",
            config::Config::get_config_path().display()
        );
    }

    iced::application("Groundcheck", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: iced::Size::new(config.window.width as f32, config.window.height as f32),
            min_size: Some(iced::Size::new(480.0, 420.0)),
            position: window::Position::Centered,
            ..Default::default()
        })
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(config))
}

#[derive(Debug, Clone)]
enum Message {
    ClaimChanged(String),
    FilePathChanged(String),
    LoadFile,
    /// Result of the load started with the given generation.
    FileLoaded(u64, Result<Ingested, Arc<Error>>),
    Submit,
    AnalysisFinished(Result<AnalysisOutcome, Arc<Error>>),
    OpenLink(String),
    CopyVerdict,
    ImageUrlChanged(String),
    PrepareLinks,
    Tick,
    Exit,
}

struct App {
    claim: String,
    claim_placeholder: String,
    file_path: String,
    file_status: String,
    asset: UploadedAsset,
    preview: Option<ImageHandle>,
    load_generation: u64,
    is_loading: bool,
    loading_frame: usize,
    error_message: Option<String>,
    outcome: Option<AnalysisOutcome>,
    image_url: String,
    search_links: Option<ReverseSearchLinks>,
    search_message: Option<String>,
    checker: Arc<FactChecker>,
    claim_id: Id,
}

impl App {
    fn new(config: config::Config) -> (Self, Task<Message>) {
        let checker = FactChecker::with_config(&config.gemini, &config.retry);
        let claim_id = Id::unique();

        let app = App {
            claim: String::new(),
            claim_placeholder: DEFAULT_CLAIM_PLACEHOLDER.to_string(),
            file_path: String::new(),
            file_status: DEFAULT_FILE_STATUS.to_string(),
            asset: UploadedAsset::absent(),
            preview: None,
            load_generation: 0,
            is_loading: false,
            loading_frame: 0,
            error_message: None,
            outcome: None,
            image_url: String::new(),
            search_links: None,
            search_message: None,
            checker: Arc::new(checker),
            claim_id: claim_id.clone(),
        };

        (app, text_input::focus(claim_id))
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ClaimChanged(value) => {
                self.claim = value;
                Task::none()
            }
            Message::FilePathChanged(value) => {
                self.file_path = value;
                Task::none()
            }
            Message::LoadFile => {
                // A new selection always starts from an empty slot, and any
                // load still in flight is superseded.
                self.load_generation += 1;
                self.asset = UploadedAsset::absent();
                self.preview = None;
                self.error_message = None;

                let path = self.file_path.trim().to_string();
                if path.is_empty() {
                    self.file_status = DEFAULT_FILE_STATUS.to_string();
                    return Task::none();
                }
                self.file_status = format!("Reading {}...", path);
                let generation = self.load_generation;

                Task::future(async move {
                    let result: crate::error::Result<Ingested> = async {
                        let file = SelectedFile::from_path(path).await?;
                        asset::ingest(&file).await
                    }
                    .await;
                    Message::FileLoaded(generation, result.map_err(Arc::new))
                })
            }
            Message::FileLoaded(generation, _) if generation != self.load_generation => {
                tracing::debug!(generation, current = self.load_generation, "dropping stale file load");
                Task::none()
            }
            Message::FileLoaded(_, Ok(ingested)) => {
                self.claim = ingested.claim_text();
                self.claim_placeholder = ingested.claim_placeholder().to_string();
                self.asset = ingested.asset();
                match ingested {
                    Ingested::Image { asset, preview } => {
                        self.file_status = format!(
                            "File Ready: {}",
                            asset.original_name.unwrap_or_default()
                        );
                        self.preview = Some(ImageHandle::from_bytes(preview));
                    }
                    Ingested::Text { name, .. } => {
                        self.file_status = format!("File Ready: {}", name);
                    }
                }
                Task::none()
            }
            Message::FileLoaded(_, Err(error)) => {
                if error.is_selection_error() {
                    self.asset = UploadedAsset::absent();
                    self.preview = None;
                    self.file_path.clear();
                }
                self.file_status = match error.as_ref() {
                    Error::OversizeAsset { .. } => "Image too large. Please choose a smaller file.",
                    Error::UnsupportedMediaGuidance => {
                        "Video detected. Please upload a keyframe image instead."
                    }
                    Error::FileRead { .. } => "File could not be read. Please choose a different file.",
                    _ => "Unsupported file type. Please choose a different file.",
                }
                .to_string();
                self.error_message = Some(error.to_string());
                Task::none()
            }
            Message::Submit => {
                if self.is_loading {
                    return Task::none();
                }

                self.error_message = None;
                self.outcome = None;

                if let Err(e) = validate::validate(&self.claim, &self.asset) {
                    self.error_message = Some(e.to_string());
                    return Task::none();
                }

                self.is_loading = true;
                self.loading_frame = 0;

                let checker = self.checker.clone();
                let claim = self.claim.clone();
                let asset = self.asset.clone();

                Task::future(async move {
                    let result = checker.check(&claim, &asset).await;
                    Message::AnalysisFinished(result.map_err(Arc::new))
                })
            }
            Message::AnalysisFinished(result) => {
                self.is_loading = false;
                match result {
                    Ok(outcome) => self.outcome = Some(outcome),
                    Err(error) => self.error_message = Some(error.to_string()),
                }
                Task::none()
            }
            Message::OpenLink(url) => {
                if let Err(e) = open::that_detached(&url) {
                    tracing::warn!(%url, error = %e, "could not open link");
                }
                Task::none()
            }
            Message::CopyVerdict => match &self.outcome {
                Some(outcome) => clipboard::write(outcome.verdict_text.clone()),
                None => Task::none(),
            },
            Message::ImageUrlChanged(value) => {
                self.image_url = value;
                Task::none()
            }
            Message::PrepareLinks => {
                match reverse_search::build_links(&self.image_url) {
                    Ok(links) => {
                        self.search_links = Some(links);
                        self.search_message = Some(LINKS_PREPARED.to_string());
                    }
                    Err(e) => {
                        self.search_links = None;
                        self.search_message = Some(e.to_string());
                    }
                }
                Task::none()
            }
            Message::Tick => {
                if self.is_loading {
                    self.loading_frame = (self.loading_frame + 1) % 60; // 10 frames * 6 messages
                }
                Task::none()
            }
            Message::Exit => iced::exit(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.is_loading {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Exit)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let claim_input = text_input(&self.claim_placeholder, &self.claim)
            .on_input(Message::ClaimChanged)
            .on_submit(Message::Submit)
            .padding(12)
            .size(16)
            .id(self.claim_id.clone());

        let file_row = row![
            text_input("/path/to/photo.jpg", &self.file_path)
                .on_input(Message::FilePathChanged)
                .on_submit(Message::LoadFile)
                .padding(10),
            button(text("Load file")).on_press(Message::LoadFile).padding(10),
        ]
        .spacing(10);

        let check_button = button(text("Check claim").size(16))
            .on_press_maybe((!self.is_loading).then_some(Message::Submit))
            .padding(12);

        let mut content = column![
            text("Fact check a claim or image").size(22),
            claim_input,
            file_row,
            text(&self.file_status).size(13),
        ]
        .spacing(10)
        .padding(15);

        if let Some(handle) = &self.preview {
            content = content.push(Image::new(handle.clone()).height(Length::Fixed(220.0)));
        }

        content = content.push(check_button);

        if let Some(message) = &self.error_message {
            content = content.push(text(message).style(text::danger));
        }

        if self.is_loading {
            content = content.push(self.loading_view());
        } else if let Some(outcome) = &self.outcome {
            content = content.push(self.result_view(outcome));
        }

        content = content.push(self.reverse_search_view());

        container(scrollable(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn loading_view(&self) -> Element<Message> {
        let loading_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        let loading_messages = [
            "Searching the web for evidence...",
            "Cross-checking sources...",
            "Weighing the evidence...",
            "Looking for the original context...",
            "Checking for visual anomalies...",
            "Drafting the assessment...",
        ];

        let message_idx = (self.loading_frame / 10) % loading_messages.len();
        let spinner_idx = self.loading_frame % loading_frames.len();

        container(
            column![
                text(loading_frames[spinner_idx]).size(32),
                text(loading_messages[message_idx]).size(15),
            ]
            .spacing(10)
            .align_x(alignment::Horizontal::Center),
        )
        .width(Length::Fill)
        .align_x(alignment::Horizontal::Center)
        .into()
    }

    fn result_view<'a>(&'a self, outcome: &'a AnalysisOutcome) -> Element<'a, Message> {
        let sources: Element<Message> = if outcome.sources.is_empty() {
            Column::with_children(
                outcome
                    .source_lines()
                    .into_iter()
                    .map(|line| text(line).size(13).into()),
            )
            .into()
        } else {
            Column::with_children(outcome.sources.iter().map(|source| {
                button(text(source.label()).size(13))
                    .style(button::text)
                    .on_press(Message::OpenLink(source.uri.clone()))
                    .into()
            }))
            .into()
        };

        column![
            row![
                text("Assessment").size(18),
                horizontal_space(),
                button(text("[Copy]").size(14)).on_press(Message::CopyVerdict),
            ],
            text(&outcome.verdict_text).size(15),
            text("Sources").size(16),
            sources,
        ]
        .spacing(8)
        .into()
    }

    fn reverse_search_view(&self) -> Element<Message> {
        let mut panel = column![
            text("Reverse image search").size(18),
            row![
                text_input("https://example.com/image.jpg", &self.image_url)
                    .on_input(Message::ImageUrlChanged)
                    .on_submit(Message::PrepareLinks)
                    .padding(10),
                button(text("Prepare links")).on_press(Message::PrepareLinks).padding(10),
            ]
            .spacing(10),
        ]
        .spacing(8);

        if let Some(message) = &self.search_message {
            let message = if self.search_links.is_some() {
                text(message).size(13)
            } else {
                text(message).size(13).style(text::danger)
            };
            panel = panel.push(message);
        }

        if let Some(links) = &self.search_links {
            panel = panel.push(
                row![
                    button(text("Google Images"))
                        .style(button::secondary)
                        .on_press(Message::OpenLink(links.google.clone())),
                    button(text("TinEye"))
                        .style(button::secondary)
                        .on_press(Message::OpenLink(links.tineye.clone())),
                ]
                .spacing(10),
            );
        }

        panel.into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
