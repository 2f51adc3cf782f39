//! The session controller.
//!
//! `Session` holds all client state for one run. Operations never perform I/O
//! themselves: they update state and hand back [`Command`]s, and the results
//! of those commands come back in as [`SessionEvent`]s through [`Session::handle`].

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::client::HealthStatus;
use crate::config::Config;
use crate::error::{ApiError, FileRejected, SendRejected};
use crate::graph::{GraphSnapshot, GraphView};
use crate::status::{StatusKind, StatusNotifier};
use crate::stream::StreamFrame;
use crate::transcript::Transcript;
use crate::upload::{FileSelection, UploadFailure};

/// Layout iterations run per UI tick.
pub const LAYOUT_STEPS_PER_TICK: u32 = 5;

/// Work for the driver to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query { text: String },
    Upload { file: FileSelection },
    RefreshGraph { generation: u64 },
    CheckHealth,
}

#[derive(Debug)]
pub enum QueryEvent {
    Frame(StreamFrame),
    Finished,
    Failed(ApiError),
}

/// Outcome of a [`Command`], reported back by the driver.
#[derive(Debug)]
pub enum SessionEvent {
    Query(QueryEvent),
    Graph {
        generation: u64,
        result: Result<GraphSnapshot, ApiError>,
    },
    Upload {
        file_name: String,
        result: Result<(), ApiError>,
    },
    Health(Result<HealthStatus, ApiError>),
}

/// Announcement held back until the refresh that follows an upload completes.
#[derive(Debug)]
struct PendingAnnouncement {
    generation: u64,
    file_name: String,
}

pub struct Session {
    notifier: StatusNotifier,
    transcript: Transcript,
    graph: GraphView,
    selected_file: Option<FileSelection>,
    upload_in_flight: bool,
    next_generation: u64,
    applied_generation: u64,
    refreshes_in_flight: usize,
    pending_announcement: Option<PendingAnnouncement>,
    last_health: Option<HealthStatus>,
}

impl Session {
    pub fn new(status_duration: Duration, physics_enabled: bool) -> Self {
        Self {
            notifier: StatusNotifier::new(status_duration),
            transcript: Transcript::new(),
            graph: GraphView::new(physics_enabled),
            selected_file: None,
            upload_in_flight: false,
            next_generation: 0,
            applied_generation: 0,
            refreshes_in_flight: 0,
            pending_announcement: None,
            last_health: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.status_duration(), config.physics())
    }

    pub fn notifier(&self) -> &StatusNotifier {
        &self.notifier
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn graph(&self) -> &GraphView {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut GraphView {
        &mut self.graph
    }

    pub fn selected_file(&self) -> Option<&FileSelection> {
        self.selected_file.as_ref()
    }

    pub fn last_health(&self) -> Option<&HealthStatus> {
        self.last_health.as_ref()
    }

    /// True while an answer is streaming.
    pub fn is_processing(&self) -> bool {
        self.transcript.is_busy()
    }

    pub fn is_uploading(&self) -> bool {
        self.upload_in_flight
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshes_in_flight > 0
    }

    /// Whether the upload action is available.
    pub fn can_upload(&self) -> bool {
        self.selected_file.is_some() && !self.upload_in_flight
    }

    pub fn notify(&mut self, message: impl Into<String>, kind: StatusKind) {
        self.notifier.notify(message, kind);
    }

    /// Ask a question. Returns the request to issue, or `None` if it was rejected.
    pub fn send(&mut self, text: &str) -> Option<Command> {
        match self.transcript.begin(text) {
            Ok(question) => {
                debug!(len = question.len(), "sending question");
                Some(Command::Query { text: question })
            }
            Err(reason) => {
                warn!(%reason, "question not sent");
                let kind = match reason {
                    SendRejected::Empty => StatusKind::Error,
                    SendRejected::Busy => StatusKind::Warning,
                };
                self.notifier.notify(reason.to_string(), kind);
                None
            }
        }
    }

    /// Pick the file to upload next. Unsupported types leave nothing selected.
    pub fn select_file(&mut self, file: FileSelection) -> bool {
        match file.check() {
            Ok(file) => {
                self.notifier.notify(
                    format!("Selected {} ({})", file.name, file.display_size()),
                    StatusKind::Info,
                );
                self.selected_file = Some(file);
                true
            }
            Err(reason) => {
                warn!(%reason, "file rejected");
                self.selected_file = None;
                self.notifier.notify(reason.to_string(), StatusKind::Error);
                false
            }
        }
    }

    pub fn clear_file(&mut self) {
        self.selected_file = None;
    }

    pub fn upload(&mut self) -> Option<Command> {
        if self.upload_in_flight {
            self.notifier
                .notify("An upload is already in progress.", StatusKind::Warning);
            return None;
        }
        let Some(file) = self.selected_file.clone() else {
            self.notifier
                .notify(FileRejected::NothingSelected.to_string(), StatusKind::Error);
            return None;
        };

        self.upload_in_flight = true;
        self.notifier.notify("Uploading document...", StatusKind::Progress);
        Some(Command::Upload { file })
    }

    pub fn refresh_graph(&mut self) -> Command {
        self.next_generation += 1;
        self.refreshes_in_flight += 1;
        Command::RefreshGraph {
            generation: self.next_generation,
        }
    }

    pub fn check_health(&self) -> Command {
        Command::CheckHealth
    }

    /// Flip the layout simulation. Returns the new setting.
    pub fn toggle_physics(&mut self) -> bool {
        let enabled = self.graph.toggle_physics();
        let message = if enabled { "Physics enabled" } else { "Physics disabled" };
        self.notifier.notify(message, StatusKind::Info);
        enabled
    }

    pub fn toggle_context(&mut self, index: usize) -> Option<bool> {
        self.transcript.toggle_context(index)
    }

    /// Apply the outcome of a command. May ask for follow-up work.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        match event {
            SessionEvent::Query(event) => {
                self.handle_query(event);
                Vec::new()
            }
            SessionEvent::Graph { generation, result } => {
                self.handle_graph(generation, result);
                Vec::new()
            }
            SessionEvent::Upload { file_name, result } => self.handle_upload(file_name, result),
            SessionEvent::Health(result) => {
                match result {
                    Ok(health) => {
                        let message = match &health.neo4j {
                            Some(db) => format!("API is {} (database {})", health.status, db),
                            None => format!("API is {}", health.status),
                        };
                        self.notifier.notify(message, StatusKind::Success);
                        self.last_health = Some(health);
                    }
                    Err(err) => {
                        warn!(error = %err, "health check failed");
                        self.last_health = None;
                        self.notifier
                            .notify(format!("API unavailable: {}", err), StatusKind::Error);
                    }
                }
                Vec::new()
            }
        }
    }

    fn handle_query(&mut self, event: QueryEvent) {
        match event {
            QueryEvent::Frame(frame) => {
                self.transcript.apply(frame);
            }
            QueryEvent::Finished => self.transcript.complete(),
            QueryEvent::Failed(err) => {
                warn!(error = %err, "query failed");
                self.transcript.fail();
                self.notifier
                    .notify(format!("Error: {}", err), StatusKind::Error);
            }
        }
    }

    fn handle_graph(&mut self, generation: u64, result: Result<GraphSnapshot, ApiError>) {
        self.refreshes_in_flight = self.refreshes_in_flight.saturating_sub(1);
        let stale = generation < self.applied_generation;

        match result {
            Ok(_) if stale => {
                debug!(generation, applied = self.applied_generation, "discarding stale graph");
            }
            Ok(snapshot) => {
                info!(
                    generation,
                    nodes = snapshot.nodes.len(),
                    edges = snapshot.edges.len(),
                    "graph refreshed"
                );
                self.graph.replace(snapshot);
                self.applied_generation = generation;
            }
            Err(err) if stale => {
                debug!(generation, error = %err, "stale graph request failed");
            }
            Err(err) => {
                warn!(generation, error = %err, "graph refresh failed");
                self.notifier
                    .notify(format!("Error fetching graph data: {}", err), StatusKind::Error);
            }
        }

        if self
            .pending_announcement
            .as_ref()
            .is_some_and(|pending| pending.generation <= generation)
        {
            if let Some(pending) = self.pending_announcement.take() {
                self.notifier.notify(
                    "Document uploaded and processed successfully!",
                    StatusKind::Success,
                );
                self.transcript.push_system(format!(
                    "Document \"{}\" has been uploaded and processed. You can now ask questions about it.",
                    pending.file_name
                ));
            }
        }
    }

    fn handle_upload(&mut self, file_name: String, result: Result<(), ApiError>) -> Vec<Command> {
        self.upload_in_flight = false;
        match result {
            Ok(()) => {
                info!(file = %file_name, "document uploaded");
                self.selected_file = None;
                self.notifier
                    .notify("Processing document chunks...", StatusKind::Progress);
                let refresh = self.refresh_graph();
                if let Command::RefreshGraph { generation } = &refresh {
                    self.pending_announcement = Some(PendingAnnouncement {
                        generation: *generation,
                        file_name,
                    });
                }
                vec![refresh]
            }
            Err(err) => {
                warn!(file = %file_name, error = %err, "upload failed");
                let failure = UploadFailure::classify(&err);
                self.notifier.notify(failure.user_message(), StatusKind::Error);
                Vec::new()
            }
        }
    }

    /// Advance time-driven state. Returns true if the graph moved.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.notifier.tick(now);
        self.graph.step(LAYOUT_STEPS_PER_TICK)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::from_config(&Config::new())
    }
}
