use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use client::state::presence::SWEEP_INTERVAL;
use client::state::typing::TICK_INTERVAL;
use client::state::{Applied, ClientState, Identity};
use frames::{RawEvent, SseDecoder};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing user id; pass --user-id or set CHAT_USER_ID")]
    MissingUserId,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("event stream closed")]
    StreamClosed,
    #[error("connect task failed: {0}")]
    ConnectTask(#[from] tokio::task::JoinError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chat-cli", about = "Broadcast chat client with typing presence")]
struct Cli {
    #[arg(long, env = "CHAT_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "CHAT_USER_ID")]
    user_id: Option<String>,

    #[arg(long, env = "CHAT_USERNAME")]
    username: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print messages and typing changes from the event stream.
    Listen,
    /// Send one message.
    Send {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Send one typing ping.
    Typing,
    /// Interactive session: stream events while reading lines from stdin.
    Chat,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let api = ChatApi::new(&cli.base_url)?;
    let identity = Identity {
        user_id: cli.user_id.unwrap_or_default(),
        username: cli.username.unwrap_or_default(),
    };

    match cli.command {
        Command::Listen => run_session(&api, identity, false).await,
        Command::Send { text } => {
            let user_id = non_empty(&identity.user_id);
            api.send(user_id, &text.join(" ")).await?;
            println!("sent");
            Ok(())
        }
        Command::Typing => {
            let user_id = non_empty(&identity.user_id).ok_or(CliError::MissingUserId)?;
            api.typing(user_id).await?;
            println!("ok");
            Ok(())
        }
        Command::Chat => run_session(&api, identity, true).await,
    }
}

// =============================================================================
// HTTP
// =============================================================================

#[derive(Debug, Clone)]
struct ChatApi {
    http: reqwest::Client,
    base_url: String,
}

impl ChatApi {
    fn new(base_url: &str) -> Result<Self, CliError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CliError::InvalidBaseUrl(base_url.to_owned()));
        }
        Ok(Self { http: reqwest::Client::new(), base_url: base_url.to_owned() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn open_stream(&self, identity: &Identity) -> Result<reqwest::Response, CliError> {
        let mut query = Vec::new();
        if let Some(user_id) = non_empty(&identity.user_id) {
            query.push(("userId", user_id));
        }
        if let Some(username) = non_empty(&identity.username) {
            query.push(("username", username));
        }
        let response = self.http.get(self.url("/stream")).query(&query).send().await?;
        ensure_success(response).await
    }

    async fn send(&self, user_id: Option<&str>, content: &str) -> Result<(), CliError> {
        let mut request = self
            .http
            .post(self.url("/send"))
            .json(&serde_json::json!({ "content": content }));
        if let Some(user_id) = user_id {
            request = request.query(&[("userId", user_id)]);
        }
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn typing(&self, user_id: &str) -> Result<(), CliError> {
        let response = self
            .http
            .post(self.url("/typing"))
            .json(&serde_json::json!({ "userId": user_id }))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CliError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CliError::ServerError { status: status.as_u16(), message: error_message(&body) })
}

/// Pull `message` out of a JSON error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_owned())
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

// =============================================================================
// SESSION
// =============================================================================

struct EventStream {
    response: reqwest::Response,
    decoder: SseDecoder,
}

impl EventStream {
    /// Next batch of decoded frames; an empty batch means the chunk held only
    /// part of a frame.
    async fn next_batch(&mut self) -> Result<Vec<RawEvent>, CliError> {
        match self.response.chunk().await? {
            Some(chunk) => Ok(self.decoder.push(&chunk)),
            None => Err(CliError::StreamClosed),
        }
    }
}

async fn next_batch(stream: &mut Option<EventStream>) -> Result<Vec<RawEvent>, CliError> {
    match stream {
        Some(stream) => stream.next_batch().await,
        None => std::future::pending().await,
    }
}

type ConnectTask = JoinHandle<Result<reqwest::Response, CliError>>;

/// Outcome of the in-flight connect; pending while none is running.
async fn connect_result(task: &mut Option<ConnectTask>) -> Result<reqwest::Response, CliError> {
    let Some(handle) = task.as_mut() else {
        return std::future::pending().await;
    };
    let result = handle.await;
    *task = None;
    result?
}

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Draft(String),
    Clear,
    Send(String),
    Nothing,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Nothing;
    }
    if line == "/clear" {
        return Input::Clear;
    }
    if line == "/type" {
        return Input::Draft(String::new());
    }
    if let Some(draft) = line.strip_prefix("/type ") {
        return Input::Draft(draft.trim_start().to_owned());
    }
    Input::Send(line.to_owned())
}

struct Session<'a> {
    api: &'a ChatApi,
    state: ClientState,
    stream: Option<EventStream>,
    connecting: Option<ConnectTask>,
    retry_at: Option<Instant>,
    draft: String,
    typing_line: Option<String>,
}

impl<'a> Session<'a> {
    fn new(api: &'a ChatApi, identity: Identity) -> Self {
        Self {
            api,
            state: ClientState::new(identity),
            stream: None,
            connecting: None,
            retry_at: Some(Instant::now()),
            draft: String::new(),
            typing_line: None,
        }
    }

    /// Start a background connect when the retry deadline has passed. The
    /// result arrives through [`connect_result`] so input and ticks keep
    /// flowing while the request is outstanding.
    fn start_connect_if_due(&mut self, now: Instant) {
        if self.stream.is_some() || self.connecting.is_some() {
            return;
        }
        if self.retry_at.is_none_or(|at| at > now) {
            return;
        }
        let api = self.api.clone();
        let identity = self.state.identity.clone();
        self.connecting = Some(tokio::spawn(async move { api.open_stream(&identity).await }));
    }

    fn on_connect_result(&mut self, result: Result<reqwest::Response, CliError>, now: Instant) {
        match result {
            Ok(response) => {
                self.stream = Some(EventStream { response, decoder: SseDecoder::new() });
                self.retry_at = None;
                self.state.on_connected();
                eprintln!("[{}]", self.state.status.label());
            }
            Err(error) => {
                eprintln!("connect failed: {error}");
                self.schedule_reconnect(now);
            }
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        self.stream = None;
        self.retry_at = Some(now + RECONNECT_DELAY);
        self.state.on_disconnected();
        self.report_typing();
    }

    fn on_frames(&mut self, frames: Vec<RawEvent>) {
        let now = Instant::now();
        for raw in &frames {
            match self.state.apply_raw(raw, now) {
                Applied::Identity => {
                    let identity = &self.state.identity;
                    eprintln!("you are {} ({})", identity.username, identity.user_id);
                }
                Applied::Message => {
                    if let Some(entry) = self.state.chat.last() {
                        println!("<{}> {}", entry.from, entry.content);
                    }
                }
                Applied::Presence => self.report_typing(),
                Applied::Nothing => {}
            }
        }
    }

    /// Print the typing line when it changed since the last print.
    fn report_typing(&mut self) {
        let line = self.state.presence.typing_line();
        if line == self.typing_line {
            return;
        }
        match &line {
            Some(text) => eprintln!("* {text}"),
            None => eprintln!("* nobody is typing"),
        }
        self.typing_line = line;
    }

    fn on_tick(&mut self, now: Instant) {
        if self.state.debounce.on_tick(now) {
            self.ping();
        }
        if self.state.presence.sweep(now) {
            self.report_typing();
        }
    }

    fn on_input(&mut self, input: Input) {
        let now = Instant::now();
        match input {
            Input::Draft(draft) => {
                self.draft = draft;
                if self.state.debounce.on_edit(&self.draft, now) {
                    self.ping();
                }
            }
            Input::Clear => {
                self.draft.clear();
                self.state.debounce.on_edit("", now);
            }
            Input::Send(content) => {
                // Cleared before the request completes; not restored on failure.
                self.draft.clear();
                self.state.debounce.reset();
                let api = self.api.clone();
                let user_id = non_empty(&self.state.identity.user_id).map(str::to_owned);
                tokio::spawn(async move {
                    if let Err(error) = api.send(user_id.as_deref(), &content).await {
                        eprintln!("send failed: {error}");
                    }
                });
            }
            Input::Nothing => {}
        }
    }

    fn ping(&self) {
        let Some(user_id) = non_empty(&self.state.identity.user_id).map(str::to_owned) else {
            return;
        };
        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(error) = api.typing(&user_id).await {
                eprintln!("typing ping failed: {error}");
            }
        });
    }
}

async fn run_session(api: &ChatApi, identity: Identity, interactive: bool) -> Result<(), CliError> {
    let mut session = Session::new(api, identity);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(TICK_INTERVAL.min(SWEEP_INTERVAL));

    if interactive {
        eprintln!("commands: /type <text>, /clear; any other line is sent");
    }

    loop {
        tokio::select! {
            batch = next_batch(&mut session.stream) => match batch {
                Ok(frames) => session.on_frames(frames),
                Err(error) => {
                    eprintln!("stream dropped: {error}");
                    session.schedule_reconnect(Instant::now());
                }
            },
            line = lines.next_line(), if interactive => match line? {
                Some(line) => session.on_input(parse_input(&line)),
                None => return Ok(()),
            },
            result = connect_result(&mut session.connecting) => {
                session.on_connect_result(result, Instant::now());
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                session.on_tick(now);
                session.start_connect_if_due(now);
            }
        }
    }
}
