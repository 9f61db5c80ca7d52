use super::protocol::{write_message, HostMessage, HostMessageContent};
use crate::attribution::place_variables;
use crate::config::{Settings, WhenToExecute};
use crate::error::ProtocolError;
use crate::grid::build_grid;
use crate::render::{GridRenderer, Panel, PanelState};
use crate::scheduler::{
    Completion, DeliveryKind, DocumentId, DocumentSnapshot, Notice, ProcessLauncher, RunDecision,
    TraceDelivery, TraceScheduler, Trigger,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, warn};

const RUNNING: &str = "Running tracer...";

#[derive(Debug, Deserialize)]
struct DocumentArgs {
    document: DocumentId,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ToggleArgs {
    value: bool,
}

#[derive(Debug, Deserialize)]
struct VisibleRangeArgs {
    document: DocumentId,
    line: usize,
}

#[derive(Debug, Deserialize)]
struct VariablesArgs {
    document: DocumentId,
    variables: Map<String, Value>,
}

fn parse_args<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, serde_json::Error> {
    serde_json::from_value(arguments.unwrap_or(Value::Null))
}

fn kind_name(kind: DeliveryKind) -> &'static str {
    match kind {
        DeliveryKind::Output => "output",
        DeliveryKind::UserError => "userError",
        DeliveryKind::Infrastructure => "infrastructure",
    }
}

/// Dispatches host requests into the scheduler and turns scheduler notices
/// into rendered pages and events.
pub struct HostServer<W, L> {
    seq: u64,
    writer: W,
    scheduler: TraceScheduler<L>,
    renderer: GridRenderer,
    settings: Settings,
    previews: HashMap<DocumentId, PanelState>,
}

impl<W: Write, L: ProcessLauncher> HostServer<W, L> {
    pub fn new(writer: W, scheduler: TraceScheduler<L>, settings: Settings) -> Self {
        Self {
            seq: 0,
            writer,
            scheduler,
            renderer: GridRenderer::new(settings.display_flags()),
            settings,
            previews: HashMap::new(),
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn scheduler(&self) -> &TraceScheduler<L> {
        &self.scheduler
    }

    pub fn renderer(&self) -> &GridRenderer {
        &self.renderer
    }

    pub fn preview(&self, document: &DocumentId) -> Option<&PanelState> {
        self.previews.get(document)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn send_response(
        &mut self,
        request_seq: u64,
        command: String,
        success: bool,
        message: Option<String>,
        body: Option<Value>,
    ) -> Result<(), ProtocolError> {
        let msg = HostMessage {
            seq: self.next_seq(),
            msg_type: "response".to_string(),
            content: HostMessageContent::Response {
                request_seq,
                success,
                command,
                message,
                body,
            },
        };
        write_message(&mut self.writer, &msg)
    }

    pub fn send_event(&mut self, event: &str, body: Value) -> Result<(), ProtocolError> {
        let msg = HostMessage {
            seq: self.next_seq(),
            msg_type: "event".to_string(),
            content: HostMessageContent::Event {
                event: event.to_string(),
                body: Some(body),
            },
        };
        write_message(&mut self.writer, &msg)
    }

    /// Handle one incoming message. Returns `false` once the host disconnects.
    pub fn handle_message(&mut self, msg: HostMessage, now: Instant) -> Result<bool, ProtocolError> {
        let (command, arguments) = match msg.content {
            HostMessageContent::Request { command, arguments } => (command, arguments),
            other => {
                debug!(?other, "ignoring non-request message");
                return Ok(true);
            }
        };
        debug!(command = %command, seq = msg.seq, "request");

        let handled = match command.as_str() {
            "open" => self.handle_open(arguments, now),
            "change" => self.handle_edit(arguments, Trigger::OnChangeDebounced, now),
            "save" => self.handle_edit(arguments, Trigger::OnSave, now),
            "execute" => self.handle_execute(arguments, now),
            "close" => self.handle_close(arguments),
            "toggleSource" => self.handle_toggle(arguments, |r, v| r.set_show_source(v)),
            "toggleDebug" => self.handle_toggle(arguments, |r, v| r.set_show_debug(v)),
            "install" => self.handle_install(arguments),
            "visibleRange" => self.handle_visible_range(arguments),
            "variables" => self.handle_variables(arguments),
            "disconnect" => {
                self.send_response(msg.seq, command, true, None, None)?;
                return Ok(false);
            }
            _ => {
                warn!(command = %command, "unhandled host command");
                Err(format!("unknown command `{}`", command))
            }
        };

        match handled {
            Ok(body) => self.send_response(msg.seq, command, true, None, body)?,
            Err(message) => self.send_response(msg.seq, command, false, Some(message), None)?,
        }
        self.flush_notices()?;
        Ok(true)
    }

    pub fn on_completion(&mut self, completion: Completion) -> Result<(), ProtocolError> {
        self.scheduler.on_completion(completion);
        self.flush_notices()
    }

    /// Fire expired debounce timers.
    pub fn on_tick(&mut self, now: Instant) -> Result<(), ProtocolError> {
        self.scheduler.fire_due(now);
        self.flush_notices()
    }

    fn snapshot(&self, args: DocumentArgs) -> Result<DocumentSnapshot, String> {
        match args.text {
            Some(text) => Ok(DocumentSnapshot::new(args.document, text, args.path)),
            None => self
                .scheduler
                .latest_request(&args.document)
                .cloned()
                .ok_or_else(|| format!("no text known for {}", args.document)),
        }
    }

    fn handle_open(&mut self, arguments: Option<Value>, now: Instant) -> Result<Option<Value>, String> {
        let args: DocumentArgs = parse_args(arguments).map_err(|e| e.to_string())?;
        let id = args.document.clone();
        self.previews
            .entry(id.clone())
            .or_insert_with(|| PanelState::new(Panel::Landing));

        if self.settings.skip_landing_page && args.text.is_some() {
            let snapshot = self.snapshot(args)?;
            self.scheduler.request_run(snapshot, Trigger::Explicit, now);
        } else {
            self.render_document(&id).map_err(|e| e.to_string())?;
        }
        Ok(None)
    }

    fn handle_edit(
        &mut self,
        arguments: Option<Value>,
        trigger: Trigger,
        now: Instant,
    ) -> Result<Option<Value>, String> {
        if trigger == Trigger::OnChangeDebounced
            && self.settings.when_to_execute == WhenToExecute::OnSave
        {
            return Ok(Some(json!({ "decision": "ignored" })));
        }
        let args: DocumentArgs = parse_args(arguments).map_err(|e| e.to_string())?;
        let snapshot = self.snapshot(args)?;
        let decision = self.scheduler.request_run(snapshot, trigger, now);
        Ok(Some(decision_body(decision)))
    }

    fn handle_execute(&mut self, arguments: Option<Value>, now: Instant) -> Result<Option<Value>, String> {
        let args: DocumentArgs = parse_args(arguments).map_err(|e| e.to_string())?;
        let snapshot = self.snapshot(args)?;
        let decision = self.scheduler.request_run(snapshot, Trigger::Explicit, now);
        Ok(Some(decision_body(decision)))
    }

    fn handle_close(&mut self, arguments: Option<Value>) -> Result<Option<Value>, String> {
        let args: DocumentArgs = parse_args(arguments).map_err(|e| e.to_string())?;
        self.scheduler.close(&args.document);
        self.previews.remove(&args.document);
        Ok(None)
    }

    fn handle_toggle(
        &mut self,
        arguments: Option<Value>,
        apply: impl FnOnce(&mut GridRenderer, bool),
    ) -> Result<Option<Value>, String> {
        let args: ToggleArgs = parse_args(arguments).map_err(|e| e.to_string())?;
        apply(&mut self.renderer, args.value);

        let mut documents: Vec<DocumentId> = self.previews.keys().cloned().collect();
        documents.sort();
        for id in documents {
            self.render_document(&id).map_err(|e| e.to_string())?;
        }
        Ok(None)
    }

    fn handle_install(&mut self, arguments: Option<Value>) -> Result<Option<Value>, String> {
        let args: DocumentArgs = parse_args(arguments).map_err(|e| e.to_string())?;
        self.scheduler
            .request_install(&args.document)
            .map_err(|e| e.to_string())?;
        Ok(None)
    }

    fn handle_visible_range(&mut self, arguments: Option<Value>) -> Result<Option<Value>, String> {
        let args: VisibleRangeArgs = parse_args(arguments).map_err(|e| e.to_string())?;
        if let Some(state) = self.previews.get_mut(&args.document) {
            state.scroll_line = args.line;
        }
        self.send_event("scroll", json!({ "document": args.document, "line": args.line }))
            .map_err(|e| e.to_string())?;
        Ok(None)
    }

    fn handle_variables(&mut self, arguments: Option<Value>) -> Result<Option<Value>, String> {
        let args: VariablesArgs = parse_args(arguments).map_err(|e| e.to_string())?;
        let text = self
            .scheduler
            .latest_request(&args.document)
            .map(|s| s.text.clone())
            .unwrap_or_default();
        let placement = place_variables(&text, &args.variables);
        let body = placement.to_json();

        if let Some(state) = self.previews.get_mut(&args.document) {
            state.variables = Some(placement);
            self.render_document(&args.document)
                .map_err(|e| e.to_string())?;
        }
        Ok(Some(body))
    }

    fn render_document(&mut self, id: &DocumentId) -> Result<(), ProtocolError> {
        let Some(state) = self.previews.get(id) else {
            return Ok(());
        };
        let html = self.renderer.render(state);
        self.send_event("render", json!({ "document": id, "html": html }))
    }

    fn show(&mut self, id: &DocumentId, panel: Panel) -> Result<(), ProtocolError> {
        let state = self
            .previews
            .entry(id.clone())
            .or_insert_with(|| PanelState::new(Panel::Landing));
        state.panel = panel;
        self.render_document(id)
    }

    fn deliver(&mut self, id: &DocumentId, delivery: TraceDelivery) -> Result<(), ProtocolError> {
        let interpreter = delivery.interpreter.display().to_string();
        let status = match delivery.kind {
            DeliveryKind::Infrastructure => delivery.text.lines().next().unwrap_or_default().to_string(),
            DeliveryKind::UserError => "Tracer finished with errors".to_string(),
            DeliveryKind::Output => "Tracer finished".to_string(),
        };
        let kind = delivery.kind;

        let panel = match kind {
            DeliveryKind::Infrastructure => Panel::Failure {
                message: delivery.text,
                interpreter,
            },
            DeliveryKind::Output | DeliveryKind::UserError => Panel::Trace {
                grid: build_grid(&delivery.source, &delivery.text),
                source: delivery.source,
                trace: delivery.text,
                interpreter,
            },
        };
        self.show(id, panel)?;
        self.send_event(
            "status",
            json!({ "document": id, "running": false, "kind": kind_name(kind), "text": status }),
        )
    }

    fn flush_notices(&mut self) -> Result<(), ProtocolError> {
        for notice in self.scheduler.take_notices() {
            match notice {
                Notice::RunStarted { document, token } => {
                    self.send_event(
                        "status",
                        json!({ "document": document, "running": true, "token": token, "text": RUNNING }),
                    )?;
                }
                Notice::Delivered {
                    document, delivery, ..
                } => self.deliver(&document, delivery)?,
                Notice::InstallPrompt {
                    document,
                    interpreter,
                    message,
                } => {
                    self.show(
                        &document,
                        Panel::InstallPrompt {
                            message: message.clone(),
                        },
                    )?;
                    self.send_event(
                        "installPrompt",
                        json!({ "document": document, "interpreter": interpreter, "message": message }),
                    )?;
                }
                Notice::InstallFinished {
                    document,
                    interpreter,
                    success,
                    output,
                } => {
                    self.send_event(
                        "installResult",
                        json!({
                            "document": document,
                            "interpreter": interpreter,
                            "success": success,
                            "output": output,
                        }),
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn decision_body(decision: RunDecision) -> Value {
    match decision {
        RunDecision::Launched(token) => json!({ "decision": "launched", "token": token }),
        RunDecision::Debounced { .. } => json!({ "decision": "debounced" }),
        RunDecision::AwaitingAvailability => json!({ "decision": "awaitingAvailability" }),
        RunDecision::NotRun(reason) => {
            json!({ "decision": "notRun", "reason": format!("{:?}", reason) })
        }
    }
}
