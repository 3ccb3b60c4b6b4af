//! WebSocket handler for the realtime STT streaming session (§4, §6).
//!
//! Exactly one session runs at a time (`crate::session::SessionSlot`); a
//! second connection is rejected immediately. Everything downstream of the
//! socket — ingress queueing, resampling, pacing, recognition, stabilizing,
//! history — runs inside this one task's `tokio::select!` loop, with a
//! single sibling task owning the socket's write half so frames are never
//! interleaved (mirroring the teacher's single-writer-task rule).

use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use base64::Engine as _;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::Deserialize;

use crate::api::AppState;
use crate::auth;
use crate::config::Config;
use crate::constants::{
    CLOSE_NORMAL, FRAME_MS, IDLE_CHECK_INTERVAL_SEC, IDLE_TIMEOUT_SEC, SAMPLE_RATE_OUT,
    TAIL_SILENCE_SEC,
};
use crate::error::SttError;
use crate::emitter::{self, Emitter, Outbound};
use crate::feeder::FeederState;
use crate::history::HistoryWriter;
use crate::ingress::{AudioItem, IngressQueue};
use crate::protocol::{
    self, AckDetail, ClientMessage, Dtype, HelloDetail, ServerMessage, StabilizerInfo,
    StatusDetail,
};
use crate::recorder::SttRecorder;
use crate::resample;
use crate::stabilizer::StabilizerState;

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

fn close_message(code: u16) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: "".into(),
    }))
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<AuthQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state, query.token))
}

async fn handle_ws(socket: WebSocket, state: AppState, query_token: Option<String>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(_guard) = state.session_slot.try_acquire() else {
        let msg = ServerMessage::Error {
            error: SttError::Busy.to_string(),
            code: "BUSY",
        };
        if let Some(text) = msg.to_text() {
            let _ = sender.send(Message::Text(text.into())).await;
        }
        let _ = sender.send(close_message(SttError::Busy.close_code())).await;
        let _ = sender.close().await;
        return;
    };

    let mut authenticated = state.config.auth.secret.is_none();
    if !authenticated {
        if let (Some(secret), Some(token)) = (&state.config.auth.secret, &query_token) {
            authenticated = auth::verify(token, secret).is_ok();
        }
    }

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

    let mut recorder = (state.recorder_factory)();
    run_session(
        &mut receiver,
        &emitter,
        &state.config,
        recorder.as_mut(),
        authenticated,
    )
    .await;

    drop(emitter);
    let _ = writer_task.await;
}

struct SessionFormat {
    sample_rate: u32,
    dtype: Dtype,
}

async fn run_session(
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    emitter: &Emitter,
    config: &Config,
    recorder: &mut dyn SttRecorder,
    mut authenticated: bool,
) {
    emitter.send(ServerMessage::Hello {
        detail: HelloDetail {
            sample_rate_in_default: SAMPLE_RATE_OUT,
            sample_rate_out: SAMPLE_RATE_OUT,
            frame_ms: FRAME_MS,
            queue_max: config.ingress.queue_max,
            device: "default".to_string(),
            model: "mock".to_string(),
            idle_timeout_sec: IDLE_TIMEOUT_SEC,
            stabilizer: StabilizerInfo {
                max_rollback_chars: config.stabilizer.max_rollback_chars,
                rewrite_confirm_n: config.stabilizer.rewrite_confirm_n,
                patch_max_hz: config.stabilizer.patch_max_hz,
            },
        },
    });

    let mut format = SessionFormat {
        sample_rate: SAMPLE_RATE_OUT,
        dtype: Dtype::I16,
    };
    let mut format_set = false;

    let ingress = IngressQueue::new(config.ingress);
    let mut feeder = FeederState::new(config.feeder);
    let start = Instant::now();
    let mut stabilizer = StabilizerState::new(config.stabilizer, start);
    let mut history = match HistoryWriter::open(&config.history) {
        Ok(writer) => writer,
        Err(err) => {
            emitter.send(ServerMessage::Error {
                error: err.to_string(),
                code: "INIT_FAILED",
            });
            None
        }
    };

    let mut last_activity = Instant::now();
    let mut idle_check = tokio::time::interval(Duration::from_secs(IDLE_CHECK_INTERVAL_SEC));
    let mut pump = tokio::time::interval(Duration::from_millis(FRAME_MS));
    pump.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        handle_text(
                            &text,
                            emitter,
                            &mut authenticated,
                            config,
                            &mut format,
                            &mut format_set,
                            recorder,
                            &ingress,
                        ).await;
                        if !authenticated {
                            let err = SttError::Unauthorized("authentication required".into());
                            emitter.send(ServerMessage::Error {
                                error: err.to_string(),
                                code: "UNAUTHORIZED",
                            });
                            emitter.close(err.close_code());
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        last_activity = Instant::now();
                        if authenticated {
                            if bytes.len() % format.dtype.bytes_per_sample() == 0 {
                                ingress.push(AudioItem {
                                    samples: bytes.to_vec(),
                                    sample_rate: format.sample_rate,
                                    dtype: format.dtype,
                                    enqueued_at: Instant::now(),
                                });
                            } else {
                                emitter.send(ServerMessage::Error {
                                    error: SttError::ParseError(
                                        "frame length not a multiple of dtype size".into(),
                                    )
                                    .to_string(),
                                    code: "PARSE_ERROR",
                                });
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            _ = idle_check.tick() => {
                if last_activity.elapsed() >= Duration::from_secs(IDLE_TIMEOUT_SEC) {
                    emitter.send(ServerMessage::Error {
                        error: SttError::IdleTimeout.to_string(),
                        code: "IDLE_TIMEOUT",
                    });
                    emitter.close(SttError::IdleTimeout.close_code());
                    break;
                }
            }
            _ = pump.tick() => {
                pump_once(&ingress, &mut feeder, recorder, &mut stabilizer, &mut history, emitter, config);
            }
        }
    }

    feed_tail_silence(&mut feeder, recorder, &mut stabilizer, &mut history, emitter, config);
    if let Some(hyp) = recorder.flush() {
        apply_hypothesis(&hyp, &mut stabilizer, &mut history, emitter);
    }
    emitter.close(CLOSE_NORMAL);
}

#[allow(clippy::too_many_arguments)]
async fn handle_text(
    text: &str,
    emitter: &Emitter,
    authenticated: &mut bool,
    config: &Config,
    format: &mut SessionFormat,
    format_set: &mut bool,
    recorder: &mut dyn SttRecorder,
    ingress: &IngressQueue,
) {
    let parsed = match protocol::parse_client_message(text) {
        Ok(m) => m,
        Err(_) => {
            emitter.send(ServerMessage::Error {
                error: "could not parse message".to_string(),
                code: "PARSE_ERROR",
            });
            return;
        }
    };

    match parsed {
        ClientMessage::Auth { token } => {
            if let Some(secret) = &config.auth.secret {
                *authenticated = auth::verify(&token, secret).is_ok();
            } else {
                *authenticated = true;
            }
        }
        ClientMessage::Start { sample_rate, dtype } => {
            format.sample_rate = sample_rate;
            format.dtype = dtype;
            if !*format_set {
                *format_set = true;
                let _ = recorder.init().await;
            }
            emitter.send(ServerMessage::Ack {
                detail: AckDetail {
                    src_sr: sample_rate,
                    dtype,
                    auto_started: true,
                },
            });
        }
        ClientMessage::Stop => {
            // Draining happens once the select loop exits; nothing to do
            // beyond letting the caller observe no further frames.
        }
        ClientMessage::AudioJson { audio, sr, dtype } => {
            if *authenticated {
                if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(audio) {
                    if bytes.len() % dtype.bytes_per_sample() == 0 {
                        ingress.push(AudioItem {
                            samples: bytes,
                            sample_rate: sr,
                            dtype,
                            enqueued_at: Instant::now(),
                        });
                    } else {
                        emitter.send(ServerMessage::Error {
                            error: SttError::ParseError(
                                "frame length not a multiple of dtype size".into(),
                            )
                            .to_string(),
                            code: "PARSE_ERROR",
                        });
                    }
                }
            }
        }
    }
}

fn pump_once(
    ingress: &IngressQueue,
    feeder: &mut FeederState,
    recorder: &mut dyn SttRecorder,
    stabilizer: &mut StabilizerState,
    history: &mut Option<HistoryWriter>,
    emitter: &Emitter,
    config: &Config,
) {
    while let Some(item) = ingress.try_pop() {
        let mut samples = resample::decode_pcm(&item.samples, item.dtype);
        let resampled = resample::resample_linear(&samples, item.sample_rate, SAMPLE_RATE_OUT);
        samples = resampled;
        resample::apply_agc(&mut samples, &config.agc);
        feeder.push(&samples, item.enqueued_at);
    }

    while let Some(frame) = feeder.next_frame() {
        if let Some(hyp) = recorder.feed(&frame) {
            apply_hypothesis(&hyp, stabilizer, history, emitter);
        }
    }

    let (queue_depth, queue_bytes) = ingress.occupancy();
    let (frames_total, _) = ingress.counters();
    emitter.send(ServerMessage::Status {
        stage: "listening",
        detail: StatusDetail {
            frames_total,
            queue: queue_depth,
            bytes_in_queue: queue_bytes,
            buf_ms: feeder.backlog_ms(),
            ui_e2e_ms_last: feeder.take_last_latency_ms(),
        },
    });
}

fn feed_tail_silence(
    feeder: &mut FeederState,
    recorder: &mut dyn SttRecorder,
    stabilizer: &mut StabilizerState,
    history: &mut Option<HistoryWriter>,
    emitter: &Emitter,
    _config: &Config,
) {
    let tail_samples = (SAMPLE_RATE_OUT as f32 * TAIL_SILENCE_SEC) as usize;
    feeder.push(&vec![0.0f32; tail_samples], Instant::now());
    for frame in feeder.drain_remaining() {
        if let Some(hyp) = recorder.feed(&frame) {
            apply_hypothesis(&hyp, stabilizer, history, emitter);
        }
    }
}

fn apply_hypothesis(
    hyp: &crate::recorder::Hypothesis,
    stabilizer: &mut StabilizerState,
    history: &mut Option<HistoryWriter>,
    emitter: &Emitter,
) {
    let now = Instant::now();
    let patches = stabilizer.process(&hyp.text, now);
    for patch in patches {
        emitter.send(ServerMessage::Patch {
            delete: patch.delete,
            insert: patch.insert,
            seq: patch.seq,
            t_ms: patch.t_ms,
            continuation: patch.continuation,
        });
    }
    if hyp.is_final {
        emitter.send(ServerMessage::Stable {
            full: stabilizer.shown().to_string(),
            seq: stabilizer.next_stable_seq(),
            t_ms: now.elapsed().as_millis() as u64,
        });
    }
    if let Some(writer) = history {
        let _ = writer.on_stable(stabilizer.shown());
    }
}
