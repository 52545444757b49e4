//! Session Manager
//!
//! Owns the match state machine, the roster, the spectator set and every
//! scheduled task, and orchestrates tower generation and loot.
//!
//! ```text
//! host requests ──► Session (main context, &mut self)
//!                     │  join / leave / start / stop / eliminate / break
//!                     ├─► StructureGenerator ──► LootEngine
//!                     ├─► EventBus (lifecycle + cancelable proposals)
//!                     └─► Scheduler ── tick() ──► countdown / cadence /
//!                                                 match timer / reset / rescue
//! cadence ──► Offload (roster read) ──► GrowthUnit channel ──► tick()
//! ```
//!
//! Every state change goes through one guarded transition that refuses
//! anything outside the edge list in [`SessionState::can_transition_to`].

mod error;
mod growth;
pub mod layout;
mod participant;
mod state;

pub use error::SessionError;
pub use growth::{GrowthUnit, InlineOffload, Offload, RayonOffload};
pub use participant::{Participant, ParticipantId, ParticipantStats, SharedRoster};
pub use state::SessionState;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, PillarsConfig, VoidPolicy};
use crate::constants::COUNTDOWN_TITLE_SECS;
use crate::events::{
    Cancellable, EliminationCause, EventBus, ParticipantEliminated, ParticipantJoined,
    ParticipantLeft, SessionEnded, SessionStarted, SessionStateChanged,
};
use crate::geometry::{CellPos, Position};
use crate::host::{Host, HostError, Notice};
use crate::logging::TimingSpan;
use crate::loot::{Artifact, LoadReport, LootEngine, LootError, LootFile};
use crate::rules::{self, MovementVerdict};
use crate::scheduler::{Scheduler, TaskHandle, TickScheduler};
use crate::snapshot::SessionSnapshot;
use crate::structure::{BreakOutcome, GrowthContext, StructureError, StructureGenerator};

/// Work the session schedules for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTask {
    CountdownTick,
    MatchTimeout,
    Growth,
    Reset,
    VoidRescue(ParticipantId),
}

/// Returned by a successful join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReceipt {
    pub roster_size: usize,
    pub max_players: usize,
    pub countdown_started: bool,
}

/// What an operator stop did, depending on the state it found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopOutcome {
    CountdownCancelled,
    Ended,
    Reset,
}

/// Result of [`Session::eliminate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EliminationOutcome {
    Eliminated,
    /// A handler cancelled it; the actor's health was restored
    Vetoed,
    /// Not a living participant of an active match
    Ignored,
}

/// What the host should do with a break request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakResponse {
    /// Actor is not a participant; normal host rules apply
    Ignored,
    /// Participant outside `Active`; cancel the break
    Denied,
    /// Not a tower cell; normal host rules apply
    Untracked,
    /// A handler vetoed; the cell stays
    Vetoed,
    /// Cell removed; `artifact` is what the actor received
    Harvested {
        owner: ParticipantId,
        own_cell: bool,
        artifact: Option<Artifact>,
    },
}

/// What happened to a void fall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoidResponse {
    /// Not a participant; host decides
    Ignored,
    /// Countdown in progress; cancel the damage
    Protected,
    /// Damage cancelled, rescue teleport scheduled
    Rescuing { ticks: u64 },
    /// Damage cancelled, participant is now spectating
    Spectated,
    /// Let the damage through; the host reports the death later
    Lethal,
}

impl VoidResponse {
    pub fn cancels_damage(&self) -> bool {
        !matches!(self, VoidResponse::Ignored | VoidResponse::Lethal)
    }
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    handle: TaskHandle,
    remaining: u32,
}

/// One arena match: roster, state machine, towers and loot.
///
/// Single-threaded. Everything runs on the caller of [`Session::tick`] and
/// the host-report methods; only tower growth scans may be offloaded.
pub struct Session<H: Host, S: Scheduler<SessionTask> = TickScheduler<SessionTask>> {
    config: PillarsConfig,
    pending_config: Option<PillarsConfig>,
    state: SessionState,
    roster: SharedRoster,
    spectators: BTreeSet<ParticipantId>,
    structures: StructureGenerator,
    loot: LootEngine,
    events: EventBus,
    host: H,
    scheduler: S,
    offload: Box<dyn Offload>,
    growth_tx: Sender<GrowthUnit>,
    growth_rx: Receiver<GrowthUnit>,
    countdown: Option<Countdown>,
    cadence: Option<TaskHandle>,
    match_timer: Option<TaskHandle>,
    pending_reset: Option<TaskHandle>,
    rescues: HashMap<ParticipantId, TaskHandle>,
    match_started_at: Option<u64>,
}

impl<H: Host> Session<H> {
    /// Session with the tick scheduler and the rayon roster scan
    pub fn new(config: PillarsConfig, host: H) -> Self {
        Self::with_parts(config, host, TickScheduler::new(), Box::new(RayonOffload))
    }
}

impl<H: Host, S: Scheduler<SessionTask>> Session<H, S> {
    pub fn with_parts(
        config: PillarsConfig,
        host: H,
        scheduler: S,
        offload: Box<dyn Offload>,
    ) -> Self {
        let (growth_tx, growth_rx) = channel();
        Self {
            structures: StructureGenerator::new(config.pillar.clone()),
            loot: LootEngine::new(config.loot.clone()),
            config,
            pending_config: None,
            state: SessionState::Lobby,
            roster: Arc::new(RwLock::new(BTreeMap::new())),
            spectators: BTreeSet::new(),
            events: EventBus::new(),
            host,
            scheduler,
            offload,
            growth_tx,
            growth_rx,
            countdown: None,
            cadence: None,
            match_timer: None,
            pending_reset: None,
            rescues: HashMap::new(),
            match_started_at: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &PillarsConfig {
        &self.config
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn structures(&self) -> &StructureGenerator {
        &self.structures
    }

    pub fn loot(&self) -> &LootEngine {
        &self.loot
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Read handle on the roster
    pub fn roster(&self) -> SharedRoster {
        self.roster.clone()
    }

    pub fn participant(&self, id: ParticipantId) -> Option<Participant> {
        self.roster.read().get(&id).cloned()
    }

    pub fn is_participant(&self, id: ParticipantId) -> bool {
        self.roster.read().contains_key(&id)
    }

    pub fn is_spectating(&self, id: ParticipantId) -> bool {
        self.spectators.contains(&id)
    }

    pub fn spectators(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.spectators.iter().copied()
    }

    pub fn roster_size(&self) -> usize {
        self.roster.read().len()
    }

    pub fn alive_count(&self) -> usize {
        self.roster.read().values().filter(|p| p.alive).count()
    }

    /// Seconds left on the countdown while `Starting`
    pub fn countdown_remaining(&self) -> Option<u32> {
        self.countdown.map(|c| c.remaining)
    }

    /// Time since the match went `Active`; zero outside a match
    pub fn elapsed(&self) -> Duration {
        let Some(start) = self.match_started_at else {
            return Duration::ZERO;
        };
        let ticks = self.scheduler.now().saturating_sub(start);
        let tps = u64::from(self.config.game.ticks_per_second.max(1));
        Duration::from_millis(ticks * 1000 / tps)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(self)
    }

    fn name_of(&self, id: ParticipantId) -> Option<String> {
        self.roster.read().get(&id).map(|p| p.name.clone())
    }

    fn update_participant(&self, id: ParticipantId, f: impl FnOnce(&mut Participant)) {
        if let Some(p) = self.roster.write().get_mut(&id) {
            f(p);
        }
    }

    fn audience(&self) -> Vec<ParticipantId> {
        let mut ids: BTreeSet<ParticipantId> = self.roster.read().keys().copied().collect();
        ids.extend(self.spectators.iter().copied());
        ids.into_iter().collect()
    }

    fn announce(&mut self, notice: Notice) {
        for id in self.audience() {
            self.tell(id, &notice);
        }
    }

    fn tell(&mut self, id: ParticipantId, notice: &Notice) {
        if let Err(e) = self.host.notify(id, notice) {
            debug!(participant = %id, error = %e, "notice not delivered");
        }
    }

    fn host_call(&self, what: &str, result: Result<(), HostError>) {
        if let Err(e) = result {
            warn!(action = what, error = %e, "host call failed");
        }
    }

    // ========================================================================
    // State Machine
    // ========================================================================

    fn transition(&mut self, next: SessionState) -> bool {
        let previous = self.state;
        if !previous.can_transition_to(next) {
            error!(from = %previous, to = %next, "refused illegal session transition");
            return false;
        }
        self.state = next;
        info!(from = %previous, to = %next, "session state changed");
        self.events.publish(&mut SessionStateChanged {
            previous,
            new: next,
        });
        true
    }

    /// Advance one host tick: apply pending growth, then run due tasks
    pub fn tick(&mut self) {
        let units: Vec<GrowthUnit> = self.growth_rx.try_iter().collect();
        if self.state == SessionState::Active {
            for unit in units {
                self.apply_growth(unit);
            }
        }

        for (handle, task) in self.scheduler.advance() {
            self.run_task(handle, task);
        }
    }

    fn run_task(&mut self, handle: TaskHandle, task: SessionTask) {
        match task {
            SessionTask::CountdownTick => self.on_countdown_tick(handle),
            SessionTask::MatchTimeout => {
                self.match_timer = None;
                info!("match time limit reached");
                if let Err(e) = self.end_session(None) {
                    debug!(error = %e, "match timeout ignored");
                }
            }
            SessionTask::Growth => {
                if self.state != SessionState::Active {
                    self.scheduler.cancel(handle);
                    return;
                }
                self.offload
                    .spawn(growth::scan_job(self.roster.clone(), self.growth_tx.clone()));
            }
            SessionTask::Reset => {
                self.pending_reset = None;
                self.reset();
            }
            SessionTask::VoidRescue(id) => {
                self.rescues.remove(&id);
                self.rescue(id);
            }
        }
    }

    fn apply_growth(&mut self, unit: GrowthUnit) {
        let alive = self
            .roster
            .read()
            .get(&unit.participant)
            .is_some_and(|p| p.alive);
        if !alive {
            return;
        }
        let elapsed = self.elapsed();
        let mut ctx = GrowthContext {
            host: &mut self.host,
            events: &mut self.events,
            loot: &mut self.loot,
            elapsed,
        };
        let placed = self.structures.grow_tower(unit.participant, &mut ctx);
        if placed > 0 {
            debug!(participant = %unit.participant, placed, "tower grew");
        }
    }

    // ========================================================================
    // Roster
    // ========================================================================

    /// Add a participant. Reaching `min_players` in the lobby starts the
    /// countdown and builds the initial towers.
    pub fn join(
        &mut self,
        id: ParticipantId,
        name: impl Into<String>,
    ) -> Result<JoinReceipt, SessionError> {
        if self.is_participant(id) {
            return Err(SessionError::AlreadyInSession);
        }
        if !self.state.accepts_joins() {
            return Err(SessionError::WrongState { actual: self.state });
        }
        let max = self.config.game.max_players;
        if self.roster_size() >= max {
            return Err(SessionError::SessionFull { max });
        }

        let participant = Participant::new(id, name);
        let name = participant.name.clone();
        let roster_size = {
            let mut roster = self.roster.write();
            roster.insert(id, participant);
            roster.len()
        };
        self.spectators.remove(&id);
        info!(participant = %id, name = %name, roster_size, "participant joined");

        self.events.publish(&mut ParticipantJoined {
            participant: id,
            roster_size,
        });
        self.announce(Notice::Joined {
            name,
            players: roster_size,
            max,
        });

        let mut countdown_started = false;
        match self.state {
            SessionState::Lobby => {
                let min = self.config.game.min_players;
                if roster_size >= min {
                    countdown_started = self.start_countdown().is_ok();
                } else {
                    self.announce(Notice::WaitingForPlayers {
                        players: roster_size,
                        needed: min,
                    });
                }
            }
            // Late joiner: rebuild the circle so everyone has a tower
            SessionState::Starting => self.arrange_participants(),
            _ => {}
        }

        Ok(JoinReceipt {
            roster_size,
            max_players: max,
            countdown_started,
        })
    }

    /// Remove a participant or spectator. Leaving can cancel the countdown
    /// or end an active match.
    pub fn leave(&mut self, id: ParticipantId) -> Result<(), SessionError> {
        let removed = self.roster.write().remove(&id);
        let was_spectator = self.spectators.remove(&id);
        if removed.is_none() && !was_spectator {
            return Err(SessionError::NotInSession);
        }
        if let Some(handle) = self.rescues.remove(&id) {
            self.scheduler.cancel(handle);
        }
        if let Err(e) = self.host.restore(id) {
            debug!(participant = %id, error = %e, "could not restore leaving actor");
        }

        let Some(participant) = removed else {
            return Ok(());
        };
        let roster_size = self.roster_size();
        info!(participant = %id, roster_size, "participant left");
        self.events.publish(&mut ParticipantLeft {
            participant: id,
            roster_size,
        });
        self.announce(Notice::Left {
            name: participant.name,
            players: roster_size,
            max: self.config.game.max_players,
        });

        match self.state {
            SessionState::Starting if roster_size < self.config.game.min_players => {
                self.cancel_countdown();
            }
            SessionState::Active => self.evaluate_win_condition(),
            _ => {}
        }
        Ok(())
    }

    /// The actor dropped off the host. Counts as an elimination during a match.
    pub fn disconnect(&mut self, id: ParticipantId) {
        let alive_in_match = self.state == SessionState::Active
            && self.roster.read().get(&id).is_some_and(|p| p.alive);
        if alive_in_match {
            // Informational; a disconnect cannot be vetoed
            let mut event = ParticipantEliminated::new(id, EliminationCause::Disconnected, None);
            self.events.publish(&mut event);
            self.update_participant(id, |p| p.alive = false);
        }
        if self.leave(id).is_err() {
            debug!(participant = %id, "disconnect from non-member ignored");
        }
    }

    // ========================================================================
    // Countdown
    // ========================================================================

    /// Operator start from the lobby; the roster must still meet `min_players`
    pub fn start_countdown(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Lobby {
            return Err(SessionError::WrongState { actual: self.state });
        }
        let have = self.roster_size();
        let need = self.config.game.min_players;
        if have < need {
            return Err(SessionError::BelowMinimum { have, need });
        }
        if !self.transition(SessionState::Starting) {
            return Err(SessionError::WrongState { actual: self.state });
        }

        self.arrange_participants();

        let seconds = self.config.game.countdown_secs;
        let handle = self.scheduler.every(
            u64::from(self.config.game.ticks_per_second),
            SessionTask::CountdownTick,
        );
        self.countdown = Some(Countdown {
            handle,
            remaining: seconds,
        });
        self.announce(Notice::CountdownStarted { seconds });
        info!(players = have, seconds, "countdown started");
        Ok(())
    }

    /// Lay the roster out on a circle, build towers, teleport and freeze
    fn arrange_participants(&mut self) {
        self.structures.clear_all(&mut self.host);

        let ids: Vec<ParticipantId> = self.roster.read().keys().copied().collect();
        let bases = layout::circle_bases(ids.len(), &self.config.arena, &self.config.pillar);
        let height = self.config.pillar.initial_height;

        for (id, base) in ids.into_iter().zip(bases) {
            if let Err(e) = self
                .structures
                .generate_initial_tower(&mut self.host, id, base)
            {
                error!(participant = %id, error = %e, "no tower built for participant");
            }
            let spawn = Position::above_cell(&base, height);
            if let Err(e) = self.host.teleport(id, &spawn) {
                warn!(participant = %id, error = %e, "could not move participant to tower");
            }
            self.update_participant(id, |p| {
                p.spawn = Some(spawn);
                p.tower_base = Some(base);
                p.frozen = true;
            });
        }
    }

    fn on_countdown_tick(&mut self, handle: TaskHandle) {
        let remaining = match (self.state, self.countdown.as_mut()) {
            (SessionState::Starting, Some(countdown)) if countdown.handle == handle => {
                countdown.remaining = countdown.remaining.saturating_sub(1);
                countdown.remaining
            }
            _ => {
                self.scheduler.cancel(handle);
                return;
            }
        };

        if remaining == 0 {
            self.scheduler.cancel(handle);
            self.countdown = None;
            self.begin_match();
            return;
        }

        if remaining <= COUNTDOWN_TITLE_SECS {
            let ids: Vec<ParticipantId> = self.roster.read().keys().copied().collect();
            for id in ids {
                self.tell(id, &Notice::CountdownTitle { seconds: remaining });
            }
        }
        self.announce(Notice::CountdownTick { seconds: remaining });
    }

    /// Abort a running countdown back to `Lobby`. Returns false if none was running.
    pub fn cancel_countdown(&mut self) -> bool {
        if self.state != SessionState::Starting {
            return false;
        }
        if let Some(countdown) = self.countdown.take() {
            self.scheduler.cancel(countdown.handle);
        }
        self.structures.clear_all(&mut self.host);
        for p in self.roster.write().values_mut() {
            p.frozen = false;
            p.spawn = None;
            p.tower_base = None;
        }
        self.transition(SessionState::Lobby);
        self.announce(Notice::CountdownCancelled);
        info!("countdown cancelled");
        true
    }

    // ========================================================================
    // Match
    // ========================================================================

    fn begin_match(&mut self) {
        if !self.transition(SessionState::Active) {
            return;
        }
        self.match_started_at = Some(self.scheduler.now());

        let participant_count = {
            let mut roster = self.roster.write();
            for p in roster.values_mut() {
                p.frozen = false;
            }
            roster.len()
        };
        self.events.publish(&mut SessionStarted { participant_count });
        self.announce(Notice::GameStarted);

        self.cadence = Some(self.scheduler.every(
            self.config.pillar.generation_interval_ticks,
            SessionTask::Growth,
        ));
        if let Some(ticks) = self.config.game.match_duration_ticks() {
            self.match_timer = Some(self.scheduler.after(ticks, SessionTask::MatchTimeout));
        }
        info!(participants = participant_count, "match started");
        // Roster may already be down to one alive participant
        self.evaluate_win_condition();
    }

    /// End the match. Repeated calls while already ending are no-ops.
    pub fn end_session(&mut self, winner: Option<ParticipantId>) -> Result<(), SessionError> {
        match self.state {
            SessionState::Ending | SessionState::Resetting => return Ok(()),
            SessionState::Lobby | SessionState::Starting => {
                return Err(SessionError::WrongState { actual: self.state })
            }
            SessionState::Active => {}
        }

        for handle in [self.match_timer.take(), self.cadence.take()]
            .into_iter()
            .flatten()
        {
            self.scheduler.cancel(handle);
        }
        for (_, handle) in self.rescues.drain() {
            self.scheduler.cancel(handle);
        }
        // Units from a scan that raced the end are stale
        let _ = self.growth_rx.try_iter().count();

        self.transition(SessionState::Ending);
        self.events.publish(&mut SessionEnded { winner });

        match winner.and_then(|id| self.name_of(id)) {
            Some(name) => {
                info!(winner = %name, "match won");
                self.announce(Notice::Winner { name });
            }
            None => {
                info!("match ended without a winner");
                self.announce(Notice::Draw);
            }
        }

        self.pending_reset = Some(
            self.scheduler
                .after(self.config.game.end_delay_ticks, SessionTask::Reset),
        );
        Ok(())
    }

    fn reset(&mut self) {
        if self.state != SessionState::Ending {
            return;
        }
        if let Some(handle) = self.pending_reset.take() {
            self.scheduler.cancel(handle);
        }
        let _timing = TimingSpan::new("session_reset");
        self.transition(SessionState::Resetting);
        self.structures.clear_all(&mut self.host);
        self.release_all();
        self.match_started_at = None;

        if let Some(config) = self.pending_config.take() {
            self.install_config(config);
        }
        self.transition(SessionState::Lobby);
        info!("session reset");
    }

    /// Restore and forget every participant and spectator
    fn release_all(&mut self) {
        for id in self.audience() {
            if let Err(e) = self.host.restore(id) {
                debug!(participant = %id, error = %e, "could not restore actor");
            }
        }
        self.roster.write().clear();
        self.spectators.clear();
    }

    /// End an active match once at most one participant is alive
    pub fn evaluate_win_condition(&mut self) {
        if self.state != SessionState::Active {
            return;
        }
        let alive: Vec<ParticipantId> = self
            .roster
            .read()
            .values()
            .filter(|p| p.alive)
            .map(|p| p.id)
            .collect();
        if alive.len() <= 1 {
            if let Err(e) = self.end_session(alive.first().copied()) {
                error!(error = %e, "win condition could not end the match");
            }
        }
    }

    /// Move a participant to the spectators without an elimination event
    pub fn make_spectator(&mut self, id: ParticipantId) {
        self.update_participant(id, |p| {
            p.alive = false;
            p.frozen = false;
        });
        self.spectators.insert(id);
        if let Some(handle) = self.rescues.remove(&id) {
            self.scheduler.cancel(handle);
        }
        let result = self.host.set_spectator(id);
        self.host_call("set_spectator", result);
        self.tell(id, &Notice::Spectating);
        self.evaluate_win_condition();
    }

    /// Eliminate a living participant of an active match
    pub fn eliminate(
        &mut self,
        id: ParticipantId,
        cause: EliminationCause,
        killer: Option<ParticipantId>,
    ) -> EliminationOutcome {
        let Some(victim) = self.participant(id).filter(|p| p.alive) else {
            return EliminationOutcome::Ignored;
        };
        if self.state != SessionState::Active {
            return EliminationOutcome::Ignored;
        }

        let mut event = ParticipantEliminated::new(id, cause, killer);
        self.events.publish(&mut event);
        if event.is_cancelled() {
            let result = self.host.restore_health(id);
            self.host_call("restore_health", result);
            return EliminationOutcome::Vetoed;
        }

        let killer_name = event.killer.filter(|k| *k != id).and_then(|k| {
            let mut roster = self.roster.write();
            let name = roster.get_mut(&k).map(|p| {
                p.stats.eliminations += 1;
                p.name.clone()
            });
            name
        });
        let notice = match (killer_name, event.cause) {
            (Some(killer), _) => Notice::Killed {
                victim: victim.name,
                killer,
            },
            (None, EliminationCause::Void) => Notice::VoidDeath {
                victim: victim.name,
            },
            (None, _) => Notice::Died {
                victim: victim.name,
            },
        };
        info!(participant = %id, cause = ?event.cause, "participant eliminated");
        self.announce(notice);
        self.make_spectator(id);
        EliminationOutcome::Eliminated
    }

    /// Explicit operator stop
    pub fn stop(&mut self) -> Result<StopOutcome, SessionError> {
        match self.state {
            SessionState::Lobby | SessionState::Resetting => {
                Err(SessionError::WrongState { actual: self.state })
            }
            SessionState::Starting => {
                self.cancel_countdown();
                self.release_all();
                Ok(StopOutcome::CountdownCancelled)
            }
            SessionState::Active => {
                self.end_session(None)?;
                Ok(StopOutcome::Ended)
            }
            SessionState::Ending => {
                self.reset();
                Ok(StopOutcome::Reset)
            }
        }
    }

    // ========================================================================
    // World Interaction
    // ========================================================================

    /// Resolve a cell break by `actor`
    pub fn break_cell(
        &mut self,
        actor: ParticipantId,
        cell: &CellPos,
    ) -> Result<BreakResponse, StructureError> {
        let Some(alive) = self.participant(actor).map(|p| p.alive) else {
            return Ok(BreakResponse::Ignored);
        };
        if self.state != SessionState::Active || !alive {
            return Ok(BreakResponse::Denied);
        }

        match self
            .structures
            .handle_cell_break(actor, cell, &mut self.events)?
        {
            BreakOutcome::NotTracked => Ok(BreakResponse::Untracked),
            BreakOutcome::Vetoed => Ok(BreakResponse::Vetoed),
            BreakOutcome::Harvested {
                owner,
                artifact,
                own_cell,
            } => {
                let result = self.host.set_cell(cell, None);
                self.host_call("clear_cell", result);

                let delivered = match artifact {
                    Some(artifact) if self.config.pillar.drop_items => {
                        match self.host.give_artifact(actor, &artifact) {
                            Ok(()) => {
                                self.tell(
                                    actor,
                                    &Notice::ArtifactReceived {
                                        item: artifact.item,
                                        amount: artifact.amount,
                                    },
                                );
                                Some(artifact)
                            }
                            Err(e) => {
                                warn!(participant = %actor, error = %e, "artifact not delivered");
                                None
                            }
                        }
                    }
                    _ => None,
                };
                let collected = delivered.as_ref().map_or(0, |a| a.amount);
                self.update_participant(actor, |p| {
                    p.stats.cells_broken += 1;
                    p.stats.artifacts_collected += collected;
                });
                debug!(participant = %actor, owner = %owner, cell = %cell, own_cell, "cell harvested");
                Ok(BreakResponse::Harvested {
                    owner,
                    own_cell,
                    artifact: delivered,
                })
            }
        }
    }

    /// Whether `actor` may place a cell now; counts the placement when allowed
    pub fn place_cell(&mut self, actor: ParticipantId) -> bool {
        if !self.is_participant(actor) {
            return true;
        }
        if self.state != SessionState::Active {
            return false;
        }
        self.update_participant(actor, |p| p.stats.cells_placed += 1);
        true
    }

    /// A participant fell into the void
    pub fn void_fall(&mut self, id: ParticipantId) -> VoidResponse {
        if !self.is_participant(id) {
            return VoidResponse::Ignored;
        }
        if self.state == SessionState::Starting {
            return VoidResponse::Protected;
        }
        if self.state != SessionState::Active || !self.participant(id).is_some_and(|p| p.alive) {
            return VoidResponse::Ignored;
        }
        match self.config.game.void_policy() {
            VoidPolicy::Lethal => VoidResponse::Lethal,
            VoidPolicy::Spectate => {
                self.make_spectator(id);
                VoidResponse::Spectated
            }
            VoidPolicy::Grace { ticks } => {
                let seconds = self.config.game.void_grace_secs.max(0) as u32;
                self.tell(id, &Notice::VoidWarning { seconds });
                let has_spawn = self.participant(id).is_some_and(|p| p.spawn.is_some());
                if has_spawn && !self.rescues.contains_key(&id) {
                    let handle = self.scheduler.after(ticks, SessionTask::VoidRescue(id));
                    self.rescues.insert(id, handle);
                }
                VoidResponse::Rescuing { ticks }
            }
        }
    }

    fn rescue(&mut self, id: ParticipantId) {
        let Some(spawn) = self
            .participant(id)
            .filter(|p| p.alive)
            .and_then(|p| p.spawn)
        else {
            return;
        };
        if !self.host.is_reachable(id) {
            return;
        }
        let result = self.host.teleport(id, &spawn);
        self.host_call("rescue_teleport", result);
        self.tell(id, &Notice::VoidSaved);
    }

    /// Whether damage to `victim` (optionally from `attacker`) should land
    pub fn damage_allowed(&self, victim: ParticipantId, attacker: Option<ParticipantId>) -> bool {
        rules::damage_allowed(
            self.state,
            self.is_participant(victim),
            attacker.map(|a| self.is_participant(a)),
        )
    }

    pub fn movement_verdict(
        &self,
        id: ParticipantId,
        from: &Position,
        to: &Position,
    ) -> MovementVerdict {
        let frozen_spawn = self
            .participant(id)
            .filter(|p| p.frozen)
            .map(|p| p.spawn);
        match frozen_spawn {
            Some(spawn) => rules::movement_verdict(
                self.state,
                &self.config.freeze,
                spawn.as_ref(),
                from,
                to,
            ),
            None => MovementVerdict::Allow,
        }
    }

    /// Where a participant or spectator respawns
    pub fn respawn_point(&self, id: ParticipantId) -> Option<Position> {
        if !self.is_participant(id) && !self.is_spectating(id) {
            return None;
        }
        self.participant(id).and_then(|p| p.spawn)
    }

    // ========================================================================
    // Reload
    // ========================================================================

    pub fn reload_loot(&mut self, file: &LootFile) -> LoadReport {
        self.loot.load(file)
    }

    pub fn reload_loot_file(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, LootError> {
        self.loot.load_file(path)
    }

    pub fn reload_loot_str(&mut self, text: &str) -> Result<LoadReport, LootError> {
        self.loot.load_str(text)
    }

    /// Apply a new config now if idle, otherwise at the next reset.
    /// Returns whether it was applied immediately.
    pub fn apply_config(&mut self, config: PillarsConfig) -> Result<bool, ConfigError> {
        config.validate()?;
        if self.state == SessionState::Lobby {
            self.install_config(config);
            Ok(true)
        } else {
            info!("config change deferred until the session resets");
            self.pending_config = Some(config);
            Ok(false)
        }
    }

    fn install_config(&mut self, config: PillarsConfig) {
        self.structures.set_settings(config.pillar.clone());
        self.loot.set_settings(config.loot.clone());
        self.config = config;
        info!("config applied");
    }
}
