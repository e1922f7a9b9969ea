//! End-to-end session scenarios over the in-memory network.
//!
//! Each test wires real manager values together through `SimNetwork`
//! and drives whole frames, so handshake, reliability, replication and
//! discovery are exercised exactly the way a game loop would.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    net::SocketAddr,
    rc::Rc,
    time::Duration,
};

use replicast::{
    Callback, Datum, KickReason, LifecycleEvent, NetConfig, NetDriver, NetFuncCall, NetHostId,
    NetId, NetStatus, NetworkManager, RejectReason, ReplicationRate, ScriptHook, SimNetwork,
    SimTransport, Transport,
};

const DT: Duration = Duration::from_millis(50);

/// Driver stub that records every engine-to-game call and serves
/// canned replication state.
struct RecordingDriver {
    /// Authoritative field values served to `gather_replicated_data`.
    fields: BTreeMap<NetId, Vec<Datum>>,
    /// One-shot remote calls served to `gather_net_funcs`.
    queued_funcs: BTreeMap<NetId, Vec<NetFuncCall>>,
    level_ok: bool,

    levels: Vec<String>,
    spawned: Vec<(u32, NetId)>,
    blueprints: Vec<(String, NetId)>,
    destroyed: Vec<NetId>,
    applied: Vec<(NetId, Vec<(u8, Datum)>, bool)>,
    invoked: Vec<(NetId, u8, Vec<Datum>, NetHostId, bool)>,
    hooks: Vec<String>,
}

impl RecordingDriver {
    fn new() -> RecordingDriver {
        RecordingDriver {
            fields: BTreeMap::new(),
            queued_funcs: BTreeMap::new(),
            level_ok: true,
            levels: Vec::new(),
            spawned: Vec::new(),
            blueprints: Vec::new(),
            destroyed: Vec::new(),
            applied: Vec::new(),
            invoked: Vec::new(),
            hooks: Vec::new(),
        }
    }

    fn applies_for(&self, net_id: NetId) -> usize {
        self.applied.iter().filter(|(id, _, _)| *id == net_id).count()
    }
}

impl NetDriver for RecordingDriver {
    fn load_level(&mut self, name: &str) -> bool {
        self.levels.push(name.to_string());
        self.level_ok
    }

    fn spawn_actor(&mut self, type_id: u32, net_id: NetId) {
        self.spawned.push((type_id, net_id));
    }

    fn spawn_blueprint(&mut self, name: &str, net_id: NetId) {
        self.blueprints.push((name.to_string(), net_id));
    }

    fn destroy_actor(&mut self, net_id: NetId) {
        self.destroyed.push(net_id);
    }

    fn gather_replicated_data(&mut self, net_id: NetId) -> Option<Vec<Datum>> {
        self.fields.get(&net_id).cloned()
    }

    fn apply_replicated_data(&mut self, net_id: NetId, fields: &[(u8, Datum)], script: bool) {
        self.applied.push((net_id, fields.to_vec(), script));
    }

    fn gather_net_funcs(&mut self, net_id: NetId) -> Vec<NetFuncCall> {
        self.queued_funcs.remove(&net_id).unwrap_or_default()
    }

    fn invoke_net_func(
        &mut self,
        net_id: NetId,
        func: u8,
        params: &[Datum],
        sender: NetHostId,
        script: bool,
    ) {
        self.invoked
            .push((net_id, func, params.to_vec(), sender, script));
    }

    fn call_script_hook(&mut self, hook: &ScriptHook, _event: &LifecycleEvent) {
        self.hooks.push(format!("{}.{}", hook.table, hook.function));
    }
}

fn config() -> NetConfig {
    NetConfig {
        game_code: 0xAB,
        version: 3,
        session_name: "flow".into(),
        max_clients: 4,
        ..NetConfig::default()
    }
}

fn host(net: &SimNetwork, config: NetConfig) -> (NetworkManager<SimTransport>, SocketAddr) {
    let game = net.bind(config.game_port);
    let addr = game.local_addr().unwrap();
    let advert = net.bind(config.discovery_port);
    let mut manager = NetworkManager::new(config);
    manager.open_session_with(game, advert).unwrap();
    (manager, addr)
}

fn join(net: &SimNetwork, to: SocketAddr, config: NetConfig) -> NetworkManager<SimTransport> {
    let mut manager = NetworkManager::new(config);
    manager.connect_with(net.bind(0), to).unwrap();
    manager
}

fn recorder() -> (Callback, Rc<RefCell<Vec<LifecycleEvent>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let callback = Callback::Native(Box::new(move |event: &LifecycleEvent| {
        sink.borrow_mut().push(event.clone());
    }));
    (callback, log)
}

fn pump(
    a: &mut NetworkManager<SimTransport>,
    ad: &mut RecordingDriver,
    b: &mut NetworkManager<SimTransport>,
    bd: &mut RecordingDriver,
    ticks: usize,
) {
    for _ in 0..ticks {
        a.pre_tick_update(ad, DT);
        b.pre_tick_update(bd, DT);
        a.post_tick_update(ad, DT);
        b.post_tick_update(bd, DT);
    }
}

fn pump_one(
    m: &mut NetworkManager<SimTransport>,
    d: &mut RecordingDriver,
    ticks: usize,
    dt: Duration,
) {
    for _ in 0..ticks {
        m.pre_tick_update(d, dt);
        m.post_tick_update(d, dt);
    }
}

/// Hosts a session with a loaded level and one replicated actor, joins a
/// client, and pumps until the client is ready and caught up.
fn established(
    net: &SimNetwork,
) -> (
    NetworkManager<SimTransport>,
    RecordingDriver,
    NetworkManager<SimTransport>,
    RecordingDriver,
    NetId,
) {
    let (mut server, addr) = host(net, config());
    let mut sd = RecordingDriver::new();
    server.load_level("arena").unwrap();
    let net_id = server.register_actor(9, ReplicationRate::Low).unwrap();
    sd.fields.insert(
        net_id,
        vec![Datum::Int(10), Datum::Float(0.5), Datum::Str("hp".into())],
    );

    let mut client = join(net, addr, config());
    let mut cd = RecordingDriver::new();
    pump(&mut server, &mut sd, &mut client, &mut cd, 6);

    assert_eq!(client.status(), NetStatus::Client);
    (server, sd, client, cd, net_id)
}

#[test]
fn handshake_assigns_the_first_free_id() {
    let net = SimNetwork::new();
    let (mut server, addr) = host(&net, config());
    let mut sd = RecordingDriver::new();
    let (connect_cb, connects) = recorder();
    server.set_connect_callback(connect_cb);

    let mut client = join(&net, addr, config());
    let mut cd = RecordingDriver::new();
    let (accept_cb, accepts) = recorder();
    client.set_accept_callback(accept_cb);
    assert_eq!(client.status(), NetStatus::Connecting);

    pump(&mut server, &mut sd, &mut client, &mut cd, 3);

    assert_eq!(client.status(), NetStatus::Client);
    assert_eq!(client.local_host_id(), 1);
    assert_eq!(server.num_peers(), 1);
    assert_eq!(server.connected_hosts().next().unwrap().id, 1);

    assert_eq!(accepts.borrow().len(), 1);
    assert_eq!(*accepts.borrow(), vec![LifecycleEvent::Accept { host_id: 1 }]);
    let connects = connects.borrow();
    assert!(matches!(connects[0], LifecycleEvent::Connect { host } if host.id == 1));
}

#[test]
fn level_and_state_reach_a_late_joiner() {
    let net = SimNetwork::new();
    let (mut server, mut sd, mut client, mut cd, net_id) = established(&net);

    assert_eq!(cd.levels, vec!["arena".to_string()]);
    assert_eq!(cd.spawned, vec![(9, net_id)]);
    // The forced catch-up pass carries the whole state reliably.
    assert!(cd.applies_for(net_id) >= 1);
    let (_, fields, script) = &cd.applied[0];
    assert!(!script);
    assert_eq!(
        fields,
        &vec![
            (0, Datum::Int(10)),
            (1, Datum::Float(0.5)),
            (2, Datum::Str("hp".into())),
        ]
    );

    // Both sides have an RTT estimate once acks flowed.
    assert!(server.ping(1).is_some());
    assert!(client.ping(0).is_some());

    // Unchanged state produces no further traffic.
    let before = cd.applied.len();
    pump(&mut server, &mut sd, &mut client, &mut cd, 4);
    assert_eq!(cd.applied.len(), before);
}

#[test]
fn mismatches_and_full_sessions_are_rejected() {
    let net = SimNetwork::new();
    let (mut server, addr) = host(
        &net,
        NetConfig {
            max_clients: 1,
            ..config()
        },
    );
    let mut sd = RecordingDriver::new();

    let mut wrong_version = join(
        &net,
        addr,
        NetConfig {
            version: 99,
            ..config()
        },
    );
    let (cb_v, log_v) = recorder();
    wrong_version.set_reject_callback(cb_v);
    let mut vd = RecordingDriver::new();

    let mut wrong_code = join(
        &net,
        addr,
        NetConfig {
            game_code: 0xFF,
            ..config()
        },
    );
    let (cb_c, log_c) = recorder();
    wrong_code.set_reject_callback(cb_c);
    let mut gd = RecordingDriver::new();

    let mut first = join(&net, addr, config());
    let mut fd = RecordingDriver::new();
    let mut second = join(&net, addr, config());
    let (cb_f, log_f) = recorder();
    second.set_reject_callback(cb_f);
    let mut ed = RecordingDriver::new();

    for _ in 0..3 {
        server.pre_tick_update(&mut sd, DT);
        wrong_version.pre_tick_update(&mut vd, DT);
        wrong_code.pre_tick_update(&mut gd, DT);
        first.pre_tick_update(&mut fd, DT);
        second.pre_tick_update(&mut ed, DT);
        server.post_tick_update(&mut sd, DT);
        wrong_version.post_tick_update(&mut vd, DT);
        wrong_code.post_tick_update(&mut gd, DT);
        first.post_tick_update(&mut fd, DT);
        second.post_tick_update(&mut ed, DT);
    }

    assert_eq!(first.status(), NetStatus::Client);
    assert_eq!(wrong_version.status(), NetStatus::Local);
    assert_eq!(wrong_code.status(), NetStatus::Local);
    assert_eq!(second.status(), NetStatus::Local);
    assert_eq!(
        *log_v.borrow(),
        vec![LifecycleEvent::Reject {
            reason: RejectReason::VersionMismatch
        }]
    );
    assert_eq!(
        *log_c.borrow(),
        vec![LifecycleEvent::Reject {
            reason: RejectReason::GameCodeMismatch
        }]
    );
    assert_eq!(
        *log_f.borrow(),
        vec![LifecycleEvent::Reject {
            reason: RejectReason::SessionFull
        }]
    );
    assert_eq!(server.num_peers(), 1);
}

#[test]
fn connect_attempt_times_out_after_retries() {
    let net = SimNetwork::new();
    // A bound socket that never answers.
    let mut silent = net.bind(5151);
    let target = silent.local_addr().unwrap();

    let mut client = join(&net, target, config());
    let (cb, log) = recorder();
    client.set_reject_callback(cb);
    let mut cd = RecordingDriver::new();

    pump_one(&mut client, &mut cd, 8, Duration::from_secs(1));

    assert_eq!(client.status(), NetStatus::Local);
    assert_eq!(
        *log.borrow(),
        vec![LifecycleEvent::Reject {
            reason: RejectReason::Timeout
        }]
    );

    // The probe was retried while the attempt was pending.
    let mut buf = [0u8; 64];
    let mut probes = 0;
    while silent.try_recv_from(&mut buf).unwrap().is_some() {
        probes += 1;
    }
    assert!(probes >= 3, "expected retries, saw {probes} probe(s)");
}

#[test]
fn kick_tears_the_client_down() {
    let net = SimNetwork::new();
    let (mut server, mut sd, mut client, mut cd, _net_id) = established(&net);
    let (cb, log) = recorder();
    client.set_kick_callback(cb);

    server.kick(1, KickReason::Banned).unwrap();
    assert_eq!(server.num_peers(), 0);

    pump(&mut server, &mut sd, &mut client, &mut cd, 2);

    assert_eq!(client.status(), NetStatus::Local);
    assert_eq!(
        *log.borrow(),
        vec![LifecycleEvent::Kick {
            reason: KickReason::Banned
        }]
    );
}

#[test]
fn client_leaving_notifies_the_host() {
    let net = SimNetwork::new();
    let (mut server, mut sd, mut client, mut cd, _net_id) = established(&net);
    let (cb, log) = recorder();
    server.set_disconnect_callback(cb);

    client.close_session();
    assert_eq!(client.status(), NetStatus::Local);

    pump(&mut server, &mut sd, &mut client, &mut cd, 2);

    assert_eq!(server.num_peers(), 0);
    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert!(matches!(log[0], LifecycleEvent::Disconnect { host } if host.id == 1));
}

#[test]
fn silent_client_is_evicted_exactly_once() {
    let net = SimNetwork::new();
    let (mut server, mut sd, _client, _cd, _net_id) = established(&net);
    let (cb, log) = recorder();
    server.set_disconnect_callback(cb);

    // The client stops ticking entirely; only the host's clock advances.
    pump_one(&mut server, &mut sd, 20, Duration::from_secs(1));

    assert_eq!(server.num_peers(), 0);
    let log = log.borrow();
    assert_eq!(log.len(), 1, "eviction must fire one disconnect event");
    assert!(matches!(log[0], LifecycleEvent::Disconnect { host } if host.id == 1));
}

#[test]
fn reliable_spawn_survives_heavy_loss() {
    let net = SimNetwork::new();
    let (mut server, mut sd, mut client, mut cd, _net_id) = established(&net);

    net.set_loss(40);
    let new_id = server.register_actor(7, ReplicationRate::Medium).unwrap();
    pump(&mut server, &mut sd, &mut client, &mut cd, 100);

    assert!(net.dropped() > 0, "loss roll never dropped anything");
    let spawns = cd
        .spawned
        .iter()
        .filter(|(ty, id)| (*ty, *id) == (7, new_id))
        .count();
    assert_eq!(spawns, 1, "reliable spawn must arrive exactly once");
}

#[test]
fn low_tier_rotation_updates_every_actor() {
    let net = SimNetwork::new();
    let (mut server, addr) = host(&net, config());
    let mut sd = RecordingDriver::new();
    server.load_level("arena").unwrap();

    let mut ids = Vec::new();
    for type_id in [1u32, 2, 3] {
        let id = server.register_actor(type_id, ReplicationRate::Low).unwrap();
        sd.fields.insert(id, vec![Datum::Int(0)]);
        ids.push(id);
    }

    let mut client = join(&net, addr, config());
    let mut cd = RecordingDriver::new();
    pump(&mut server, &mut sd, &mut client, &mut cd, 8);
    for id in &ids {
        assert!(cd.applies_for(*id) >= 1, "catch-up missed actor {id}");
    }

    // Dirty all three; the Low tier visits one actor per tick, so the
    // rotation must reach each exactly once more.
    let before: Vec<usize> = ids.iter().map(|id| cd.applies_for(*id)).collect();
    for id in &ids {
        sd.fields.insert(*id, vec![Datum::Int(77)]);
    }
    pump(&mut server, &mut sd, &mut client, &mut cd, 5);

    for (i, id) in ids.iter().enumerate() {
        assert_eq!(
            cd.applies_for(*id),
            before[i] + 1,
            "actor {id} should get exactly one rotation update"
        );
    }
}

#[test]
fn incremental_mode_sends_only_the_dirty_field() {
    let net = SimNetwork::new();
    let (mut server, mut sd, mut client, mut cd, net_id) = established(&net);
    server.set_incremental_replication(true);

    let before = cd.applied.len();
    sd.fields.insert(
        net_id,
        vec![Datum::Int(10), Datum::Float(0.75), Datum::Str("hp".into())],
    );
    pump(&mut server, &mut sd, &mut client, &mut cd, 3);

    let new: Vec<_> = cd.applied[before..].to_vec();
    assert_eq!(new.len(), 1);
    let (id, fields, script) = &new[0];
    assert_eq!(*id, net_id);
    assert!(!script);
    assert_eq!(fields, &vec![(1, Datum::Float(0.75))]);
}

#[test]
fn net_funcs_travel_both_directions() {
    let net = SimNetwork::new();
    let (mut server, mut sd, mut client, mut cd, net_id) = established(&net);

    // Client-side actor queues a call for the host.
    cd.queued_funcs.insert(
        net_id,
        vec![NetFuncCall {
            func: 4,
            params: vec![Datum::Int(5)],
            reliable: true,
        }],
    );
    // Host calls back at every ready client.
    server
        .send_net_func(net_id, 9, vec![Datum::Bool(true)], false)
        .unwrap();

    pump(&mut server, &mut sd, &mut client, &mut cd, 3);

    assert_eq!(
        sd.invoked,
        vec![(net_id, 4, vec![Datum::Int(5)], 1, false)]
    );
    assert_eq!(
        cd.invoked,
        vec![(net_id, 9, vec![Datum::Bool(true)], 0, false)]
    );
}

#[test]
fn destroy_propagates_to_clients() {
    let net = SimNetwork::new();
    let (mut server, mut sd, mut client, mut cd, net_id) = established(&net);

    server.unregister_actor(net_id).unwrap();
    pump(&mut server, &mut sd, &mut client, &mut cd, 3);

    assert_eq!(cd.destroyed, vec![net_id]);
}

#[test]
fn level_change_unreadies_and_catches_up_again() {
    let net = SimNetwork::new();
    let (mut server, mut sd, mut client, mut cd, net_id) = established(&net);

    server.load_level("second").unwrap();
    let applies = cd.applies_for(net_id);
    pump(&mut server, &mut sd, &mut client, &mut cd, 6);

    assert_eq!(cd.levels, vec!["arena".to_string(), "second".to_string()]);
    // The replayed spawn is deduplicated, the state pass is not.
    assert_eq!(cd.spawned, vec![(9, net_id)]);
    assert!(cd.applies_for(net_id) > applies);
}

#[test]
fn session_search_finds_the_host() {
    let net = SimNetwork::new();
    let (mut server, addr) = host(&net, config());
    let mut sd = RecordingDriver::new();

    let mut searcher: NetworkManager<SimTransport> = NetworkManager::new(config());
    searcher.begin_session_search_with(net.bind(0));
    let mut xd = RecordingDriver::new();

    pump(&mut server, &mut sd, &mut searcher, &mut xd, 3);

    let sessions = searcher.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].host.addr, addr);
    assert_eq!(sessions[0].name, "flow");
    assert_eq!(sessions[0].version, 3);
    assert_eq!(sessions[0].max_players, 5);
    assert_eq!(sessions[0].num_players, 1);

    searcher.end_session_search();
    assert!(searcher.sessions().is_empty());
}
