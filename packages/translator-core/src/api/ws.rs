//! WebSocket handler for the translation streaming session (§4.6-§4.8).
//!
//! Exactly one session runs at a time (`crate::session::SessionSlot`). All
//! segmenting, translation dispatch, and history persistence happens inside
//! this one task's `tokio::select!` loop; a single sibling task owns the
//! socket's write half so frames are never interleaved, mirroring the
//! teacher's single-writer-task rule (same structure as `stt-core`'s
//! `api/ws.rs`).
//!
//! The translator backend is shared across sessions (`Arc<dyn Translator>`),
//! so unlike `stt-core`'s per-session recorder, `init` is the factory's
//! responsibility, not this handler's.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::{SplitStream, StreamExt};

use crate::api::AppState;
use crate::config::Config;
use crate::constants::{CLOSE_NORMAL, IDLE_CHECK_INTERVAL_SEC, IDLE_TIMEOUT_SEC, STATUS_INTERVAL_MS};
use crate::emitter::{self, Emitter, Outbound};
use crate::error::{ErrorCode, TranslatorError};
use crate::history::HistoryWriter;
use crate::protocol::{self, HelloDetail, ServerMessage, StatusDetail, UpstreamMessage};
use crate::segmenter::{SegmentResult, SegmenterState};
use crate::translator::Translator;
use crate::workers::{self, CommitWorker, DraftEpoch};

fn close_message(code: u16) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: "".into(),
    }))
}

fn error_message(err: &TranslatorError) -> ServerMessage {
    ServerMessage::Error {
        error: err.to_string(),
        code: err.code(),
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let Some(guard) = state.session_slot.try_acquire() else {
        if let Some(text) = error_message(&TranslatorError::Busy).to_text() {
            let _ = sender.send(Message::Text(text.into())).await;
        }
        let _ = sender
            .send(close_message(TranslatorError::Busy.close_code()))
            .await;
        let _ = sender.close().await;
        return;
    };

    let (emitter, mut sink) = emitter::channel();

    let writer_task = tokio::spawn(async move {
        while let Some(item) = sink.recv().await {
            match item {
                Outbound::Message(msg) => {
                    if let Some(text) = msg.to_text() {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Outbound::Close(code) => {
                    let _ = sender.send(close_message(code)).await;
                    break;
                }
            }
        }
        let _ = sender.close().await;
    });

    let translator = (state.translator_factory)();
    run_session(&mut receiver, &emitter, &state.config, translator).await;

    drop(guard);
    drop(emitter);
    let _ = writer_task.await;
}

struct SessionState {
    segmenter: SegmenterState,
    commit_worker: CommitWorker,
    draft_epoch: Arc<DraftEpoch>,
    history: Option<HistoryWriter>,
    units_committed: u64,
}

async fn run_session(
    receiver: &mut SplitStream<WebSocket>,
    emitter: &Emitter,
    config: &Config,
    translator: Arc<dyn Translator>,
) {
    emitter.send(ServerMessage::Hello {
        detail: HelloDetail {
            lang_src: "en",
            lang_tgt: "vi",
            idle_timeout_sec: IDLE_TIMEOUT_SEC,
        },
    });

    let history = match HistoryWriter::open(&config.history) {
        Ok(writer) => writer,
        Err(err) => {
            emitter.send(error_message(&err));
            None
        }
    };

    let mut state = SessionState {
        segmenter: SegmenterState::new(config.segmenter, Instant::now()),
        commit_worker: CommitWorker::new(config.worker),
        draft_epoch: Arc::new(DraftEpoch::new()),
        history,
        units_committed: 0,
    };

    let mut last_activity = Instant::now();
    let mut idle_check = tokio::time::interval(Duration::from_secs(IDLE_CHECK_INTERVAL_SEC));
    let mut status_tick = tokio::time::interval(Duration::from_millis(STATUS_INTERVAL_MS));
    status_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        handle_text(&text, &mut state, &translator, config, emitter).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            _ = idle_check.tick() => {
                if last_activity.elapsed() >= Duration::from_secs(IDLE_TIMEOUT_SEC) {
                    emitter.send(error_message(&TranslatorError::IdleTimeout));
                    emitter.close(TranslatorError::IdleTimeout.close_code());
                    break;
                }
            }
            _ = status_tick.tick() => {
                let result = state.segmenter.release_if_idle(Instant::now());
                apply_result(result, &mut state, &translator, config, emitter).await;
                emitter.send(ServerMessage::Status {
                    detail: StatusDetail {
                        en_len: state.segmenter.full_len(),
                        units_committed: state.units_committed,
                        vi_len: state.commit_worker.vi_full().len(),
                    },
                });
            }
        }
    }

    emitter.close(CLOSE_NORMAL);
}

async fn handle_text(
    text: &str,
    state: &mut SessionState,
    translator: &Arc<dyn Translator>,
    config: &Config,
    emitter: &Emitter,
) {
    let now = Instant::now();
    let parsed = match protocol::parse_upstream_message(text) {
        Ok(m) => m,
        Err(_) => return,
    };

    match parsed {
        UpstreamMessage::Reset => {
            state.segmenter.reset(now);
            state.commit_worker.reset();
            state.units_committed = 0;
            state.draft_epoch.next();
            if let Some(writer) = &mut state.history {
                if let Err(err) = writer.on_reset() {
                    emitter.send(error_message(&err));
                }
            }
            emitter.send(ServerMessage::ViDraft {
                text: String::new(),
                seq: 0,
                en_seq: 0,
                req_id: 0,
            });
        }
        UpstreamMessage::Stable { full } | UpstreamMessage::Baseline { full } => {
            let result = state.segmenter.apply_full(&full, now);
            apply_result(result, state, translator, config, emitter).await;
        }
        UpstreamMessage::Patch { delete, insert } => {
            let result = state.segmenter.apply_patch(delete, &insert, now);
            apply_result(result, state, translator, config, emitter).await;
        }
    }
}

async fn apply_result(
    result: SegmentResult,
    state: &mut SessionState,
    translator: &Arc<dyn Translator>,
    config: &Config,
    emitter: &Emitter,
) {
    if !result.commits.is_empty() {
        state.draft_epoch.next();
        emitter.send(ServerMessage::ViDraft {
            text: String::new(),
            seq: 0,
            en_seq: 0,
            req_id: 0,
        });

        match state
            .commit_worker
            .process(translator.as_ref(), &result.commits)
            .await
        {
            Ok(outputs) => {
                state.units_committed += outputs.len() as u64;
                for output in &outputs {
                    emitter.send(ServerMessage::ViCommit {
                        append: output.append.clone(),
                        seq: output.seq,
                        en_seq: output.en_seq,
                    });
                    if config.compat.emit_vi_delta {
                        emitter.send(ServerMessage::ViDelta {
                            append: output.append.clone(),
                        });
                    }
                }
                if let Some(writer) = &mut state.history {
                    if let Err(err) = writer.on_update(state.commit_worker.vi_full()) {
                        emitter.send(error_message(&err));
                    }
                }
            }
            Err(err) => emitter.send(error_message(&err)),
        }
    }

    if let Some(draft_text) = result.draft {
        spawn_draft_translation(draft_text, state, translator, config, emitter);
    }
}

fn spawn_draft_translation(
    draft_text: String,
    state: &SessionState,
    translator: &Arc<dyn Translator>,
    config: &Config,
    emitter: &Emitter,
) {
    let req_id = state.draft_epoch.next();
    let worker_config = config.worker;
    let translator = Arc::clone(translator);
    let emitter = emitter.clone();
    let epoch = Arc::clone(&state.draft_epoch);

    tokio::spawn(async move {
        let outcome =
            workers::translate_draft(translator.as_ref(), &worker_config, &draft_text).await;
        if !epoch.is_current(req_id) {
            return;
        }
        match outcome {
            Ok(Some(text)) => emitter.send(ServerMessage::ViDraft {
                text,
                seq: req_id,
                en_seq: 0,
                req_id,
            }),
            Ok(None) => emitter.send(ServerMessage::ViDraft {
                text: String::new(),
                seq: req_id,
                en_seq: 0,
                req_id,
            }),
            Err(err) => emitter.send(error_message(&err)),
        }
    });
}
