//! Playlist Rotation Engine: the device-side state machine that walks a
//! playlist forward, honoring day/time constraints, pause/resume, explicit
//! next/previous, and broadcast overrides. Single-threaded cooperative: all
//! transitions happen on the task spawned by [`Engine::spawn`]; timers post
//! work back to that same task, generalizing the connection manager's
//! health-check/reconnect timer idiom from "session expiry" to "item
//! rotation timer".

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveTime, Utc, Weekday};
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use protocol::{ConfigUpdatePayload, Event, PlaybackState, PlaylistItem, PlaylistSnapshot};

use crate::browser::BrowserController;

/// Commands accepted by the engine. Most map directly onto wire events the
/// WebSocket client forwards after deserializing; `StartBroadcast` is raised
/// when an inbound `content:update` carries the broadcast marker, and
/// `EndBroadcast` when a `broadcast:end` frame arrives, both translated by
/// the WebSocket client before reaching this channel.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    Inbound(Event),
    StartBroadcast(PlaylistSnapshot),
    EndBroadcast,
}

#[derive(Debug, Clone)]
struct BroadcastSaved {
    playlist_id: Uuid,
    items: Vec<PlaylistItem>,
    index: usize,
    remaining_ms: u64,
}

/// Wire-adjacent state, mirroring spec's `{items[], index, running, paused,
/// pausedAt?, remainingMs, currentItemStartedAt?, broadcastSaved?}` shape.
#[derive(Debug, Clone)]
struct EngineState {
    items: Vec<PlaylistItem>,
    index: usize,
    running: bool,
    paused: bool,
    paused_at: Option<DateTime<Utc>>,
    remaining_ms: u64,
    current_item_started_at: Option<DateTime<Utc>>,
    broadcast_saved: Option<BroadcastSaved>,
    playlist_id: Uuid,
}

impl EngineState {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: 0,
            running: false,
            paused: false,
            paused_at: None,
            remaining_ms: 0,
            current_item_started_at: None,
            broadcast_saved: None,
            playlist_id: Uuid::nil(),
        }
    }
}

pub struct EngineHandle {
    pub commands: mpsc::Sender<EngineCommand>,
    /// Ticks once per successful navigation; the screenshot collector waits
    /// on this to capture ~3s after an item change settles.
    pub item_changed: watch::Receiver<u64>,
}

pub struct Engine<B: BrowserController> {
    browser: Arc<B>,
    base_url: String,
    state: EngineState,
    current_item_duration_secs: u32,
    rotation_deadline: Option<Instant>,
    /// Set when the last selection pass found no eligible item; the next
    /// deadline rescans from the same index instead of advancing.
    idle: bool,
    out_tx: mpsc::Sender<Event>,
    item_changed_tx: watch::Sender<u64>,
    item_changed_seq: u64,
    viewport_width: Option<u32>,
    viewport_height: Option<u32>,
    kiosk_mode: Option<bool>,
}

impl<B: BrowserController + 'static> Engine<B> {
    pub fn spawn(
        browser: Arc<B>,
        base_url: String,
        out_tx: mpsc::Sender<Event>,
    ) -> (EngineHandle, tokio::task::JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (item_changed_tx, item_changed_rx) = watch::channel(0);

        let engine = Engine {
            browser,
            base_url,
            state: EngineState::new(),
            current_item_duration_secs: 0,
            rotation_deadline: None,
            idle: false,
            out_tx,
            item_changed_tx,
            item_changed_seq: 0,
            viewport_width: None,
            viewport_height: None,
            kiosk_mode: None,
        };

        let handle = EngineHandle {
            commands: cmd_tx,
            item_changed: item_changed_rx,
        };

        let join = tokio::spawn(engine.run(cmd_rx));
        (handle, join)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<EngineCommand>) {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(5));
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let deadline_sleep = async {
                match self.rotation_deadline {
                    Some(instant) => tokio::time::sleep_until(instant).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => break,
                    }
                }
                _ = deadline_sleep => {
                    self.on_rotation_deadline().await;
                }
                _ = heartbeat.tick() => {
                    if self.state.running && !self.state.paused {
                        self.emit_state().await;
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Inbound(Event::ContentUpdate(snapshot)) => {
                self.load_playlist(snapshot).await;
            }
            EngineCommand::Inbound(Event::ConfigUpdate(patch)) => {
                self.apply_config(patch).await;
            }
            EngineCommand::Inbound(Event::DisplayNavigate { url }) => {
                let url = self.resolve_url(&url);
                let _ = self.browser.navigate(&url).await;
            }
            EngineCommand::Inbound(Event::DisplayRefresh {}) => {
                let _ = self.browser.refresh().await;
            }
            EngineCommand::Inbound(Event::RemoteClick { x, y, button }) => {
                let _ = self.browser.click(x, y, button.as_deref()).await;
            }
            EngineCommand::Inbound(Event::RemoteType { text, selector }) => {
                let _ = self.browser.type_text(&text, selector.as_deref()).await;
            }
            EngineCommand::Inbound(Event::RemoteKey { key, modifiers }) => {
                let modifiers = modifiers.unwrap_or_default();
                let _ = self.browser.key(&key, &modifiers).await;
            }
            EngineCommand::Inbound(Event::RemoteScroll { x, y }) => {
                let _ = self.browser.scroll(x, y).await;
            }
            EngineCommand::Inbound(Event::PlaylistPause(_)) => self.pause().await,
            EngineCommand::Inbound(Event::PlaylistResume(_)) => self.resume().await,
            EngineCommand::Inbound(Event::PlaylistNext(payload)) => {
                self.step(true, payload.respect_constraints.unwrap_or(true)).await;
            }
            EngineCommand::Inbound(Event::PlaylistPrevious(payload)) => {
                self.step(false, payload.respect_constraints.unwrap_or(true)).await;
            }
            EngineCommand::StartBroadcast(snapshot) => self.start_broadcast(snapshot).await,
            EngineCommand::EndBroadcast => self.end_broadcast().await,
            // Screenshot requests, restarts, and screencast control are
            // handled by the collectors and the WebSocket client directly;
            // they never reach the rotation state machine.
            EngineCommand::Inbound(_) => {}
        }
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }

    fn notify_item_changed(&mut self) {
        self.item_changed_seq += 1;
        let _ = self.item_changed_tx.send(self.item_changed_seq);
    }

    /// Stores the new viewport/kiosk settings and re-initializes the browser
    /// when display geometry actually changed, re-navigating the current
    /// item so the new geometry takes effect immediately.
    async fn apply_config(&mut self, patch: ConfigUpdatePayload) {
        let mut geometry_changed = false;
        if let Some(width) = patch.display_width {
            if self.viewport_width != Some(width) {
                geometry_changed = true;
            }
            self.viewport_width = Some(width);
        }
        if let Some(height) = patch.display_height {
            if self.viewport_height != Some(height) {
                geometry_changed = true;
            }
            self.viewport_height = Some(height);
        }
        if let Some(kiosk_mode) = patch.kiosk_mode {
            self.kiosk_mode = Some(kiosk_mode);
        }

        if let Err(e) = self
            .browser
            .configure(self.viewport_width, self.viewport_height, self.kiosk_mode)
            .await
        {
            tracing::warn!(error = %e, "browser configure failed");
        }

        if geometry_changed {
            if let Some(item) = self.state.items.get(self.state.index).cloned() {
                let url = self.resolve_url(&item.url);
                if self.browser.navigate(&url).await.is_ok() {
                    self.notify_item_changed();
                }
            }
        }
    }

    /// Navigates to `idx` and arms the rotation timer for its duration.
    /// Returns `Err` on navigation failure without mutating `index`.
    async fn play_index(&mut self, idx: usize) -> Result<(), crate::errors::EngineError> {
        let item = self.state.items[idx].clone();
        let url = self.resolve_url(&item.url);
        self.browser.navigate(&url).await?;

        self.state.index = idx;
        self.state.current_item_started_at = Some(Utc::now());
        self.state.running = true;
        self.state.paused = false;
        self.state.paused_at = None;

        let decision = effective_duration(&self.state.items, idx);
        if decision.used_default {
            tracing::warn!(item_id = %item.id, "zero duration with multiple items, defaulting to 15s");
        }
        self.current_item_duration_secs = decision.seconds;
        self.rotation_deadline = if decision.permanent {
            None
        } else {
            Some(Instant::now() + Duration::from_secs(decision.seconds as u64))
        };
        self.state.remaining_ms = decision.seconds as u64 * 1000;
        self.idle = false;

        self.notify_item_changed();
        self.emit_state().await;
        Ok(())
    }

    /// Walks forward from `index` (or from `index + 1` when `keep_index` is
    /// false) looking for an eligible item, retrying failed navigations with
    /// the next item instead of giving up.
    async fn advance_and_play(&mut self, keep_index: bool) {
        if self.state.items.is_empty() {
            self.state.running = true;
            self.idle = true;
            self.rotation_deadline = Some(Instant::now() + Duration::from_secs(60));
            self.emit_state().await;
            return;
        }

        let mut first = true;
        loop {
            let len = self.state.items.len();
            let start = if first && keep_index {
                self.state.index
            } else {
                (self.state.index + 1) % len
            };
            first = false;

            let today = Local::now().weekday();
            let now = Local::now().time();

            match select_next_valid(&self.state.items, start, today, now) {
                Some(idx) => match self.play_index(idx).await {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::warn!(error = %e, "navigation failed, continuing with next item");
                        self.emit_error_report(format!("navigation failed: {e}")).await;
                        self.state.index = idx;
                        let delay = rand_delay_secs(3, 10);
                        tokio::time::sleep(Duration::from_secs(delay)).await;
                        continue;
                    }
                },
                None => {
                    self.state.running = true;
                    self.idle = true;
                    self.rotation_deadline = Some(Instant::now() + Duration::from_secs(60));
                    self.emit_state().await;
                    return;
                }
            }
        }
    }

    async fn on_rotation_deadline(&mut self) {
        let keep = self.idle;
        self.advance_and_play(keep).await;
    }

    async fn load_playlist(&mut self, snapshot: PlaylistSnapshot) {
        let restart = should_reload(&self.state.items, &snapshot.items, self.state.index);
        self.state.items = snapshot.items;
        self.state.playlist_id = snapshot.playlist_id;

        if self.state.items.is_empty() {
            self.state.index = 0;
            self.rotation_deadline = None;
            self.state.running = false;
            self.emit_state().await;
            return;
        }

        self.state.index = self.state.index.min(self.state.items.len() - 1);

        if restart {
            self.rotation_deadline = None;
            self.state.paused = false;
            self.state.paused_at = None;
            self.advance_and_play(true).await;
        }
    }

    async fn pause(&mut self) {
        if !self.state.running || self.state.paused || self.state.items.is_empty() {
            return; // no-op on an idle/already-paused engine
        }
        let elapsed_ms = self
            .state
            .current_item_started_at
            .map(|t| (Utc::now() - t).num_milliseconds().max(0) as u64)
            .unwrap_or(0);
        self.state.remaining_ms = remaining_after_pause(self.current_item_duration_secs, elapsed_ms);
        self.state.paused = true;
        self.state.paused_at = Some(Utc::now());
        self.rotation_deadline = None;
        self.emit_state().await;
    }

    async fn resume(&mut self) {
        if !self.state.paused {
            return;
        }
        self.state.paused = false;
        self.state.paused_at = None;

        if self.state.remaining_ms == 0 {
            self.advance_and_play(false).await;
            return;
        }

        self.rotation_deadline = Some(Instant::now() + Duration::from_millis(self.state.remaining_ms));
        let elapsed_ms = (self.current_item_duration_secs as i64 * 1000) - self.state.remaining_ms as i64;
        self.state.current_item_started_at = Some(Utc::now() - ChronoDuration::milliseconds(elapsed_ms.max(0)));
        self.emit_state().await;
    }

    async fn step(&mut self, forward: bool, respect_constraints: bool) {
        if self.state.items.is_empty() {
            return;
        }
        self.rotation_deadline = None;
        self.state.paused = false;
        self.state.paused_at = None;
        self.idle = false;

        let today = Local::now().weekday();
        let now = Local::now().time();

        match step_index(&self.state.items, self.state.index, forward, respect_constraints, today, now) {
            Some(idx) => {
                if self.play_index(idx).await.is_err() {
                    self.advance_and_play(false).await;
                }
            }
            None => self.emit_state().await,
        }
    }

    async fn start_broadcast(&mut self, snapshot: PlaylistSnapshot) {
        if self.state.broadcast_saved.is_none() {
            let elapsed_ms = self
                .state
                .current_item_started_at
                .map(|t| (Utc::now() - t).num_milliseconds().max(0) as u64)
                .unwrap_or(0);
            let remaining = if self.state.paused {
                self.state.remaining_ms
            } else {
                remaining_after_pause(self.current_item_duration_secs, elapsed_ms)
            };
            self.state.broadcast_saved = Some(BroadcastSaved {
                playlist_id: self.state.playlist_id,
                items: self.state.items.clone(),
                index: self.state.index,
                remaining_ms: remaining,
            });
        }

        self.state.items = snapshot.items;
        self.state.playlist_id = snapshot.playlist_id;
        self.state.index = 0;
        self.rotation_deadline = None;
        self.state.paused = false;
        self.state.paused_at = None;
        self.advance_and_play(true).await;
    }

    async fn end_broadcast(&mut self) {
        let Some(saved) = self.state.broadcast_saved.take() else {
            return;
        };

        self.state.items = saved.items;
        self.state.playlist_id = saved.playlist_id;
        self.state.index = saved.index.min(self.state.items.len().saturating_sub(1));
        self.state.remaining_ms = saved.remaining_ms;
        self.rotation_deadline = None;
        self.state.paused = false;
        self.state.paused_at = None;

        if let Some(item) = self.state.items.get(self.state.index).cloned() {
            let url = self.resolve_url(&item.url);
            if self.browser.navigate(&url).await.is_ok() {
                let decision = effective_duration(&self.state.items, self.state.index);
                self.current_item_duration_secs = decision.seconds;
                let elapsed_ms = (decision.seconds as u64 * 1000).saturating_sub(saved.remaining_ms);
                self.state.current_item_started_at =
                    Some(Utc::now() - ChronoDuration::milliseconds(elapsed_ms as i64));
                self.rotation_deadline = if decision.permanent {
                    None
                } else {
                    Some(Instant::now() + Duration::from_millis(saved.remaining_ms))
                };
                self.notify_item_changed();
            }
        }

        self.state.running = true;
        self.idle = false;
        self.emit_state().await;
    }

    async fn emit_state(&self) {
        let total = self.state.items.len();
        let current_item_id = self.state.items.get(self.state.index).map(|i| i.id);
        let current_url = self.browser.current_url().await;

        let time_remaining_ms = if self.state.paused {
            self.state.remaining_ms
        } else if let Some(deadline) = self.rotation_deadline {
            let now = Instant::now();
            if deadline > now {
                (deadline - now).as_millis() as u64
            } else {
                0
            }
        } else {
            self.state.remaining_ms
        };

        let playback = PlaybackState {
            is_playing: self.state.running,
            is_paused: self.state.paused,
            is_broadcasting: self.state.broadcast_saved.is_some(),
            current_item_id,
            current_item_index: self.state.index,
            playlist_id: self.state.playlist_id,
            total_items: total,
            current_url,
            time_remaining_ms,
        };

        let _ = self.out_tx.send(Event::PlaybackStateUpdate(playback)).await;
    }

    async fn emit_error_report(&self, message: String) {
        let _ = self
            .out_tx
            .send(Event::ErrorReport { message, context: None })
            .await;
    }
}

fn rand_delay_secs(min: u64, max: u64) -> u64 {
    use rand::Rng;
    rand::thread_rng().gen_range(min..=max)
}

/// Whether the engine must stop and restart given an incoming item list,
/// per the "(a) identical single item, (b) currently-playing item survives
/// and this isn't a single-item-permanent configuration" rule.
fn should_reload(old: &[PlaylistItem], new: &[PlaylistItem], current_index: usize) -> bool {
    if old.len() == 1
        && new.len() == 1
        && old[0].id == new[0].id
        && old[0].duration_seconds == new[0].duration_seconds
    {
        return false;
    }

    let old_is_single_permanent = old.len() == 1 && old[0].duration_seconds == 0;
    if !old_is_single_permanent {
        if let Some(current) = old.get(current_index) {
            if new.iter().any(|it| it.id == current.id) {
                return false;
            }
        }
    }

    true
}

/// Walks forward from `start_index`, wrapping once, for the first item
/// eligible at `(today, now)`.
fn select_next_valid(
    items: &[PlaylistItem],
    start_index: usize,
    today: Weekday,
    now: NaiveTime,
) -> Option<usize> {
    if items.is_empty() {
        return None;
    }
    let len = items.len();
    (0..len)
        .map(|step| (start_index + step) % len)
        .find(|&idx| items[idx].is_eligible_at(today, now))
}

fn step_index(
    items: &[PlaylistItem],
    current: usize,
    forward: bool,
    respect_constraints: bool,
    today: Weekday,
    now: NaiveTime,
) -> Option<usize> {
    if items.is_empty() {
        return None;
    }
    let len = items.len();
    if !respect_constraints {
        return Some(if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        });
    }
    (1..=len)
        .map(|step| {
            if forward {
                (current + step) % len
            } else {
                (current + len - step) % len
            }
        })
        .find(|&idx| items[idx].is_eligible_at(today, now))
}

struct DurationDecision {
    seconds: u32,
    permanent: bool,
    used_default: bool,
}

fn effective_duration(items: &[PlaylistItem], index: usize) -> DurationDecision {
    let item = &items[index];
    if item.duration_seconds > 0 {
        DurationDecision {
            seconds: item.duration_seconds,
            permanent: false,
            used_default: false,
        }
    } else if items.len() == 1 {
        DurationDecision {
            seconds: 0,
            permanent: true,
            used_default: false,
        }
    } else {
        DurationDecision {
            seconds: 15,
            permanent: false,
            used_default: true,
        }
    }
}

fn remaining_after_pause(duration_seconds: u32, elapsed_ms: u64) -> u64 {
    (duration_seconds as u64 * 1000).saturating_sub(elapsed_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::browser::test_support::RecordingBrowser;
    use protocol::RotationControlPayload;

    async fn drain_playback_states(rx: &mut mpsc::Receiver<Event>) -> Vec<PlaybackState> {
        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::PlaybackStateUpdate(state) = event {
                states.push(state);
            }
        }
        states
    }

    #[tokio::test]
    async fn spawn_loads_playlist_and_navigates_first_item() {
        let browser = Arc::new(RecordingBrowser::new());
        let (out_tx, mut out_rx) = mpsc::channel(64);
        let (handle, _join) = Engine::spawn(browser.clone(), "https://base".to_string(), out_tx);

        let snapshot = PlaylistSnapshot {
            playlist_id: Uuid::new_v4(),
            items: vec![item(Uuid::new_v4(), 30), item(Uuid::new_v4(), 30)],
            broadcast: false,
        };
        handle
            .commands
            .send(EngineCommand::Inbound(Event::ContentUpdate(snapshot.clone())))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(
            browser.navigations.lock().unwrap().as_slice(),
            [snapshot.items[0].url.clone()]
        );
        let states = drain_playback_states(&mut out_rx).await;
        assert!(states.last().expect("expected a playback state emission").is_playing);
    }

    /// Scenario: device paused mid-item, resumed shortly after; the
    /// remaining duration at resume must not jump back up or lose the time
    /// already spent paused.
    #[tokio::test]
    async fn pause_then_resume_preserves_remaining_time() {
        let browser = Arc::new(RecordingBrowser::new());
        let (out_tx, mut out_rx) = mpsc::channel(64);
        let (handle, _join) = Engine::spawn(browser.clone(), "https://base".to_string(), out_tx);

        let snapshot = PlaylistSnapshot {
            playlist_id: Uuid::new_v4(),
            items: vec![item(Uuid::new_v4(), 1)],
            broadcast: false,
        };
        handle
            .commands
            .send(EngineCommand::Inbound(Event::ContentUpdate(snapshot)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        handle
            .commands
            .send(EngineCommand::Inbound(Event::PlaylistPause(
                RotationControlPayload::default(),
            )))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let states = drain_playback_states(&mut out_rx).await;
        let remaining_at_pause = states
            .iter()
            .rev()
            .find(|s| s.is_paused)
            .expect("expected a paused state emission")
            .time_remaining_ms;
        assert!(
            (450..850).contains(&remaining_at_pause),
            "remaining_ms at pause was {remaining_at_pause}"
        );

        handle
            .commands
            .send(EngineCommand::Inbound(Event::PlaylistResume(
                RotationControlPayload::default(),
            )))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let states = drain_playback_states(&mut out_rx).await;
        let remaining_at_resume = states
            .iter()
            .rev()
            .find(|s| !s.is_paused)
            .expect("expected a resumed state emission")
            .time_remaining_ms;
        assert!(
            remaining_at_resume + 100 >= remaining_at_pause && remaining_at_resume <= remaining_at_pause + 50,
            "remaining_ms at resume ({remaining_at_resume}) drifted too far from pause ({remaining_at_pause})"
        );
    }

    /// Scenario: device at item index 2 with ~300 ms elapsed on a 1000 ms
    /// item. A broadcast override runs, then ends; the device must resume
    /// item index 2 with ~700 ms remaining.
    #[tokio::test]
    async fn broadcast_save_and_restore_preserves_position_and_remaining_time() {
        let browser = Arc::new(RecordingBrowser::new());
        let (out_tx, mut out_rx) = mpsc::channel(64);
        let (handle, _join) = Engine::spawn(browser.clone(), "https://base".to_string(), out_tx);

        let items = vec![
            item_with_url(Uuid::new_v4(), "https://example.com/a", 1),
            item_with_url(Uuid::new_v4(), "https://example.com/b", 1),
            item_with_url(Uuid::new_v4(), "https://example.com/c", 1),
        ];
        let playlist_id = Uuid::new_v4();
        let snapshot = PlaylistSnapshot {
            playlist_id,
            items: items.clone(),
            broadcast: false,
        };
        handle
            .commands
            .send(EngineCommand::Inbound(Event::ContentUpdate(snapshot)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Walk forward to index 2 without waiting out each item's full duration.
        for _ in 0..2 {
            handle
                .commands
                .send(EngineCommand::Inbound(Event::PlaylistNext(
                    RotationControlPayload::default(),
                )))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::sleep(Duration::from_millis(300)).await;

        let broadcast_url = "https://broadcast.example".to_string();
        let broadcast_snapshot = PlaylistSnapshot {
            playlist_id: Uuid::new_v4(),
            items: vec![item_with_url(Uuid::new_v4(), &broadcast_url, 0)],
            broadcast: true,
        };
        handle
            .commands
            .send(EngineCommand::StartBroadcast(broadcast_snapshot))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(browser.navigations.lock().unwrap().contains(&broadcast_url));

        handle.commands.send(EngineCommand::EndBroadcast).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let navigations = browser.navigations.lock().unwrap().clone();
        assert_eq!(navigations.last(), Some(&items[2].url));

        let states = drain_playback_states(&mut out_rx).await;
        let restored = states
            .iter()
            .rev()
            .find(|s| !s.is_broadcasting)
            .expect("expected a post-restore state emission");
        assert_eq!(restored.current_item_index, 2);
        assert!(
            (500..900).contains(&restored.time_remaining_ms),
            "remaining_ms after restore was {}",
            restored.time_remaining_ms
        );
    }

    fn item(id: Uuid, duration: u32) -> PlaylistItem {
        item_with_url(id, "https://example.com", duration)
    }

    fn item_with_url(id: Uuid, url: &str, duration: u32) -> PlaylistItem {
        PlaylistItem {
            id,
            playlist_id: Uuid::nil(),
            content_id: None,
            url: url.to_string(),
            duration_seconds: duration,
            order_index: 0,
            time_window_start: None,
            time_window_end: None,
            days_of_week: None,
        }
    }

    fn item_days(id: Uuid, days: &[u8]) -> PlaylistItem {
        let mut it = item(id, 10);
        it.days_of_week = Some(days.iter().copied().collect());
        it
    }

    #[test]
    fn same_single_item_does_not_restart() {
        let id = Uuid::new_v4();
        let old = vec![item(id, 10)];
        let new = vec![item(id, 10)];
        assert!(!should_reload(&old, &new, 0));
    }

    #[test]
    fn changed_duration_on_single_item_restarts() {
        let id = Uuid::new_v4();
        let old = vec![item(id, 10)];
        let new = vec![item(id, 20)];
        assert!(should_reload(&old, &new, 0));
    }

    #[test]
    fn current_item_surviving_in_multi_item_list_does_not_restart() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let old = vec![item(a, 10), item(b, 10)];
        let new = vec![item(b, 10), item(c, 10)];
        assert!(!should_reload(&old, &new, 1));
    }

    #[test]
    fn single_item_permanent_always_restarts_unless_identical() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let old = vec![item(a, 0)];
        let new = vec![item(a, 0), item(b, 10)];
        assert!(should_reload(&old, &new, 0));
    }

    #[test]
    fn select_next_valid_skips_ineligible_days() {
        let mon_only = item_days(Uuid::new_v4(), &[1]);
        let any_day = item_days(Uuid::new_v4(), &[0, 1, 2, 3, 4, 5, 6]);
        let items = vec![mon_only, any_day.clone()];
        let idx = select_next_valid(&items, 0, Weekday::Sun, "12:00:00".parse().unwrap());
        assert_eq!(idx, Some(1));
    }

    #[test]
    fn select_next_valid_wraps_and_returns_none_if_nothing_fits() {
        let mon_only = item_days(Uuid::new_v4(), &[1]);
        let items = vec![mon_only];
        let idx = select_next_valid(&items, 0, Weekday::Sun, "12:00:00".parse().unwrap());
        assert_eq!(idx, None);
    }

    #[test]
    fn effective_duration_defaults_to_15s_with_warning_for_multi_item_zero_duration() {
        let items = vec![item(Uuid::new_v4(), 0), item(Uuid::new_v4(), 10)];
        let decision = effective_duration(&items, 0);
        assert_eq!(decision.seconds, 15);
        assert!(decision.used_default);
        assert!(!decision.permanent);
    }

    #[test]
    fn effective_duration_is_permanent_for_single_zero_duration_item() {
        let items = vec![item(Uuid::new_v4(), 0)];
        let decision = effective_duration(&items, 0);
        assert!(decision.permanent);
        assert_eq!(decision.seconds, 0);
    }

    #[test]
    fn remaining_plus_elapsed_equals_duration() {
        let remaining = remaining_after_pause(30, 12_000);
        assert_eq!(remaining + 12_000, 30_000);
    }

    #[test]
    fn step_index_without_constraints_takes_immediate_neighbor() {
        let items = vec![item(Uuid::new_v4(), 10), item(Uuid::new_v4(), 10), item(Uuid::new_v4(), 10)];
        let idx = step_index(&items, 0, true, false, Weekday::Mon, "12:00:00".parse().unwrap());
        assert_eq!(idx, Some(1));
        let idx = step_index(&items, 0, false, false, Weekday::Mon, "12:00:00".parse().unwrap());
        assert_eq!(idx, Some(2));
    }

    #[test]
    fn step_index_with_constraints_skips_ineligible_items() {
        let eligible = item_days(Uuid::new_v4(), &[1, 2, 3, 4, 5]);
        let ineligible = item_days(Uuid::new_v4(), &[0]);
        let items = vec![eligible.clone(), ineligible, eligible];
        let idx = step_index(&items, 0, true, true, Weekday::Mon, "12:00:00".parse().unwrap());
        assert_eq!(idx, Some(2));
    }
}
