//! Tiered actor replication.
//!
//! The authority registers every replicated actor into one of three
//! priority tiers. Each tick, a round-robin cursor walks a fixed number
//! of actors per tier (higher tiers walk more, so their state refreshes
//! more often), gathers their current field values through the driver,
//! diffs them against the last values put on the wire and emits
//! [`Replicate`] messages for whatever changed. Forced actors bypass the
//! cadence and go out reliably on the next tick.
//!
//! Peers keep a flat registry of the same actors, built from the spawn
//! messages they execute; it feeds remote-call gathering and the
//! script/native routing of later messages.

use crate::{
    driver::{NetDriver, NetFuncCall},
    protocol::{
        constants::{MAX_MSG_BODY_SIZE, MAX_NET_FUNC_PARAMS, TIER_VISIT_COUNTS},
        datum::Datum,
        message::{
            DestroyActor, FIELD_INDEX_SIZE, Invoke, InvokeScript, NetMsg, REPLICATE_BASE_SIZE,
            Replicate, ReplicateScript, SpawnActor, SpawnBlueprint,
        },
    },
    session::NetId,
};

/// Cadence bucket an actor is registered into. Higher rates are visited
/// by the round-robin more often per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationRate {
    Low,
    Medium,
    High,
}

impl ReplicationRate {
    fn tier(self) -> usize {
        match self {
            ReplicationRate::Low => 0,
            ReplicationRate::Medium => 1,
            ReplicationRate::High => 2,
        }
    }
}

/// How peers instantiate the actor when its spawn message executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnKind {
    Actor { type_id: u32 },
    Blueprint { name: String },
}

/// Field indices are a single byte on the wire; anything past 256 is
/// unaddressable and silently out of scope.
fn all_fields(data: &[Datum]) -> Vec<(u8, Datum)> {
    data.iter()
        .enumerate()
        .take(u8::MAX as usize + 1)
        .map(|(i, d)| (i as u8, d.clone()))
        .collect()
}

fn spawn_msg(net_id: NetId, kind: &SpawnKind) -> NetMsg {
    match kind {
        SpawnKind::Actor { type_id } => NetMsg::SpawnActor(SpawnActor {
            type_id: *type_id,
            net_id,
        }),
        SpawnKind::Blueprint { name } => NetMsg::SpawnBlueprint(SpawnBlueprint {
            name: name.clone(),
            net_id,
        }),
    }
}

/// One registered actor: its identity, how peers spawn it, and the last
/// field values that actually went on the wire. A `None` snapshot slot
/// means the field was never sent and counts as dirty.
struct ReplicatedActor {
    net_id: NetId,
    kind: SpawnKind,
    script: bool,
    forced: bool,
    snapshot: Vec<Option<Datum>>,
}

impl ReplicatedActor {
    fn new(net_id: NetId, kind: SpawnKind, script: bool) -> ReplicatedActor {
        ReplicatedActor {
            net_id,
            kind,
            script,
            forced: false,
            snapshot: Vec::new(),
        }
    }

    fn dirty(&self, index: usize, value: &Datum) -> bool {
        !matches!(self.snapshot.get(index), Some(Some(s)) if s == value)
    }

    fn record(&mut self, index: usize, value: &Datum) {
        if self.snapshot.len() <= index {
            self.snapshot.resize_with(index + 1, || None);
        }
        self.snapshot[index] = Some(value.clone());
    }

    fn snapshot_matches(&self, data: &[Datum]) -> bool {
        self.snapshot.len() == data.len()
            && self.snapshot.iter().zip(data).all(|(s, d)| s.as_ref() == Some(d))
    }

    fn replicate_msg(&self, fields: Vec<(u8, Datum)>, reliable: bool) -> NetMsg {
        if self.script {
            NetMsg::ReplicateScript(ReplicateScript {
                net_id: self.net_id,
                fields,
                reliable,
            })
        } else {
            NetMsg::Replicate(Replicate {
                net_id: self.net_id,
                fields,
                reliable,
            })
        }
    }

    fn invoke_msg(&self, call: NetFuncCall) -> NetMsg {
        if self.script {
            NetMsg::InvokeScript(InvokeScript {
                net_id: self.net_id,
                func: call.func,
                params: call.params,
                reliable: call.reliable,
            })
        } else {
            NetMsg::Invoke(Invoke {
                net_id: self.net_id,
                func: call.func,
                params: call.params,
                reliable: call.reliable,
            })
        }
    }

    /// Whole-state update regardless of the diff, on the reliable channel.
    fn build_forced(&mut self, data: Vec<Datum>) -> Option<NetMsg> {
        if data.is_empty() {
            return None;
        }
        let fields = all_fields(&data);
        self.snapshot = data.into_iter().map(Some).collect();
        Some(self.replicate_msg(fields, true))
    }

    /// Cadence update: everything-if-anything-changed in normal mode,
    /// only the dirty fields (rotating start, bounded by the body limit)
    /// in incremental mode.
    fn build_update(
        &mut self,
        data: Vec<Datum>,
        incremental: bool,
        var_cursor: usize,
    ) -> Option<NetMsg> {
        if data.is_empty() {
            return None;
        }
        if !incremental {
            if self.snapshot_matches(&data) {
                return None;
            }
            let fields = all_fields(&data);
            self.snapshot = data.into_iter().map(Some).collect();
            return Some(self.replicate_msg(fields, false));
        }

        let n = data.len().min(u8::MAX as usize + 1);
        let mut fields = Vec::new();
        let mut size = REPLICATE_BASE_SIZE;
        for k in 0..n {
            let i = (var_cursor + k) % n;
            let value = &data[i];
            if !self.dirty(i, value) {
                continue;
            }
            let cost = FIELD_INDEX_SIZE + value.wire_size();
            if REPLICATE_BASE_SIZE + cost > MAX_MSG_BODY_SIZE {
                tracing::warn!(
                    net_id = self.net_id,
                    field = i,
                    "replicated field can never fit a message body"
                );
                continue;
            }
            if size + cost > MAX_MSG_BODY_SIZE {
                // Out of room; the field stays dirty for a later visit.
                continue;
            }
            size += cost;
            fields.push((i as u8, value.clone()));
        }
        if fields.is_empty() {
            return None;
        }
        for (i, value) in &fields {
            self.record(*i as usize, value);
        }
        Some(self.replicate_msg(fields, false))
    }
}

/// One priority bucket: its actors, the round-robin position, and the
/// rotating field index incremental diffs start from.
#[derive(Default)]
struct Tier {
    actors: Vec<ReplicatedActor>,
    cursor: usize,
    var_cursor: usize,
}

impl Tier {
    fn visit(
        &mut self,
        budget: usize,
        incremental: bool,
        driver: &mut dyn NetDriver,
        out: &mut Vec<NetMsg>,
    ) {
        // Forced actors first: whole state, reliable, cadence ignored.
        // The flag survives a visit the driver skipped.
        for actor in &mut self.actors {
            if !actor.forced {
                continue;
            }
            let Some(data) = driver.gather_replicated_data(actor.net_id) else {
                continue;
            };
            actor.forced = false;
            if let Some(msg) = actor.build_forced(data) {
                out.push(msg);
            }
        }

        let count = budget.min(self.actors.len());
        for _ in 0..count {
            if self.cursor >= self.actors.len() {
                self.cursor = 0;
            }
            let index = self.cursor;
            self.cursor = (self.cursor + 1) % self.actors.len();

            let actor = &mut self.actors[index];
            let Some(data) = driver.gather_replicated_data(actor.net_id) else {
                continue;
            };
            if let Some(msg) = actor.build_update(data, incremental, self.var_cursor) {
                out.push(msg);
            }
        }
        self.var_cursor = self.var_cursor.wrapping_add(1);
    }
}

/// The replication registry and scheduler. The authority drives the full
/// engine; peers use it only as the registry behind spawn bookkeeping
/// and remote-call gathering.
#[derive(Default)]
pub(crate) struct Replication {
    tiers: [Tier; 3],
    next_net_id: NetId,
    incremental: bool,
    pending: Vec<NetMsg>,
}

impl Replication {
    pub(crate) fn new() -> Replication {
        Replication {
            next_net_id: 1,
            ..Replication::default()
        }
    }

    pub(crate) fn register_actor(&mut self, type_id: u32, rate: ReplicationRate) -> NetId {
        self.register(SpawnKind::Actor { type_id }, false, rate)
    }

    pub(crate) fn register_blueprint(
        &mut self,
        name: impl Into<String>,
        rate: ReplicationRate,
    ) -> NetId {
        self.register(SpawnKind::Blueprint { name: name.into() }, true, rate)
    }

    fn register(&mut self, kind: SpawnKind, script: bool, rate: ReplicationRate) -> NetId {
        let net_id = self.next_net_id;
        self.next_net_id += 1;
        self.pending.push(spawn_msg(net_id, &kind));
        self.tiers[rate.tier()]
            .actors
            .push(ReplicatedActor::new(net_id, kind, script));
        tracing::debug!(net_id, rate = ?rate, "replicated actor registered");
        net_id
    }

    /// Binds an actor spawned by a received message into the peer-side
    /// registry. Ignores ids already bound so a replayed spawn cannot
    /// double-register.
    pub(crate) fn adopt(&mut self, net_id: NetId, kind: SpawnKind, script: bool) -> bool {
        if self.find(net_id).is_some() {
            tracing::debug!(net_id, "spawn for an actor already bound");
            return false;
        }
        self.tiers[ReplicationRate::Medium.tier()]
            .actors
            .push(ReplicatedActor::new(net_id, kind, script));
        true
    }

    /// Drops the actor and queues the DestroyActor broadcast.
    pub(crate) fn unregister(&mut self, net_id: NetId) -> bool {
        if !self.remove(net_id) {
            return false;
        }
        self.pending.push(NetMsg::DestroyActor(DestroyActor { net_id }));
        true
    }

    /// Drops the actor without announcing it. Used when executing a
    /// received DestroyActor and when tearing a session down.
    pub(crate) fn remove(&mut self, net_id: NetId) -> bool {
        for tier in &mut self.tiers {
            let Some(pos) = tier.actors.iter().position(|a| a.net_id == net_id) else {
                continue;
            };
            tier.actors.remove(pos);
            if pos < tier.cursor {
                tier.cursor -= 1;
            }
            if tier.cursor >= tier.actors.len() {
                tier.cursor = 0;
            }
            return true;
        }
        false
    }

    fn find(&self, net_id: NetId) -> Option<&ReplicatedActor> {
        self.tiers
            .iter()
            .flat_map(|t| t.actors.iter())
            .find(|a| a.net_id == net_id)
    }

    fn find_mut(&mut self, net_id: NetId) -> Option<&mut ReplicatedActor> {
        self.tiers
            .iter_mut()
            .flat_map(|t| t.actors.iter_mut())
            .find(|a| a.net_id == net_id)
    }

    /// Whether the id is bound, and to a script actor or a native one.
    pub(crate) fn script_flag(&self, net_id: NetId) -> Option<bool> {
        self.find(net_id).map(|a| a.script)
    }

    pub(crate) fn force(&mut self, net_id: NetId) -> bool {
        match self.find_mut(net_id) {
            Some(actor) => {
                actor.forced = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_forced(&mut self, net_id: NetId) -> bool {
        match self.find_mut(net_id) {
            Some(actor) => {
                actor.forced = false;
                true
            }
            None => false,
        }
    }

    pub(crate) fn force_all(&mut self) {
        for tier in &mut self.tiers {
            for actor in &mut tier.actors {
                actor.forced = true;
            }
        }
    }

    pub(crate) fn set_incremental(&mut self, on: bool) {
        self.incremental = on;
    }

    pub(crate) fn num_actors(&self) -> usize {
        self.tiers.iter().map(|t| t.actors.len()).sum()
    }

    /// Spawn and destroy announcements queued since the last drain.
    pub(crate) fn take_pending(&mut self) -> Vec<NetMsg> {
        std::mem::take(&mut self.pending)
    }

    /// Spawn messages recreating every registered actor, for a peer that
    /// just became ready.
    pub(crate) fn spawn_catalog(&self) -> Vec<NetMsg> {
        self.tiers
            .iter()
            .flat_map(|t| t.actors.iter())
            .map(|a| spawn_msg(a.net_id, &a.kind))
            .collect()
    }

    /// One replication pass: forced actors, then the per-tier cadence.
    pub(crate) fn tick(&mut self, driver: &mut dyn NetDriver) -> Vec<NetMsg> {
        let mut out = Vec::new();
        for (tier, budget) in self.tiers.iter_mut().zip(TIER_VISIT_COUNTS) {
            tier.visit(budget, self.incremental, driver, &mut out);
        }
        out
    }

    /// Gathers queued remote calls from every registered actor. Runs on
    /// both sides; calls target the other end of the connection.
    pub(crate) fn collect_net_funcs(&mut self, driver: &mut dyn NetDriver) -> Vec<NetMsg> {
        let mut out = Vec::new();
        for tier in &mut self.tiers {
            for actor in &mut tier.actors {
                for call in driver.gather_net_funcs(actor.net_id) {
                    if call.params.len() > MAX_NET_FUNC_PARAMS {
                        tracing::warn!(
                            net_id = actor.net_id,
                            func = call.func,
                            params = call.params.len(),
                            "dropping net func with too many params"
                        );
                        continue;
                    }
                    out.push(actor.invoke_msg(call));
                }
            }
        }
        out
    }

    pub(crate) fn clear(&mut self) {
        for tier in &mut self.tiers {
            tier.actors.clear();
            tier.cursor = 0;
            tier.var_cursor = 0;
        }
        self.pending.clear();
        self.next_net_id = 1;
    }
}
