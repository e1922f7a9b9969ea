use std::{
    error::Error,
    thread,
    time::{Duration, Instant},
};

use replicast::{
    Callback, Datum, LifecycleEvent, NetConfig, NetDriver, NetFuncCall, NetHostId, NetId,
    NetStatus, NetworkManager, SERVER_HOST_ID, ScriptHook,
};

const LOBBY_CODE: u32 = 0x4C4F_4242;
const FUNC_CHAT: u8 = 0;

/// Mirror of the lobby beacon: whatever the host replicates lands here.
#[derive(Default)]
struct LobbyDriver {
    beacon: Option<NetId>,
    uptime_secs: i32,
    players: u8,
}

impl NetDriver for LobbyDriver {
    fn load_level(&mut self, name: &str) -> bool {
        println!("entering level: {name}");
        true
    }

    fn spawn_actor(&mut self, type_id: u32, net_id: NetId) {
        println!("spawned actor type {type_id} as net id {net_id}");
        self.beacon.get_or_insert(net_id);
    }

    fn spawn_blueprint(&mut self, name: &str, net_id: NetId) {
        println!("spawned blueprint {name} as net id {net_id}");
    }

    fn destroy_actor(&mut self, net_id: NetId) {
        if self.beacon == Some(net_id) {
            self.beacon = None;
        }
    }

    fn gather_replicated_data(&mut self, _net_id: NetId) -> Option<Vec<Datum>> {
        None
    }

    fn apply_replicated_data(&mut self, _net_id: NetId, fields: &[(u8, Datum)], _script: bool) {
        for (index, value) in fields {
            match (index, value) {
                (0, Datum::Int(secs)) => self.uptime_secs = *secs,
                (1, Datum::Byte(count)) => self.players = *count,
                _ => {}
            }
        }
    }

    fn gather_net_funcs(&mut self, _net_id: NetId) -> Vec<NetFuncCall> {
        Vec::new()
    }

    fn invoke_net_func(
        &mut self,
        _net_id: NetId,
        func: u8,
        params: &[Datum],
        _sender: NetHostId,
        _script: bool,
    ) {
        if func == FUNC_CHAT {
            if let Some(Datum::Str(text)) = params.first() {
                println!("chat: {text}");
            }
        }
    }

    fn call_script_hook(&mut self, _hook: &ScriptHook, _event: &LifecycleEvent) {}
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut manager = NetworkManager::new(NetConfig {
        game_code: LOBBY_CODE,
        ..NetConfig::default()
    });
    let mut driver = LobbyDriver::default();

    manager.set_accept_callback(Callback::Native(Box::new(|e| {
        if let LifecycleEvent::Accept { host_id } = e {
            println!("joined as host id {host_id}");
        }
    })));
    manager.set_reject_callback(Callback::Native(Box::new(|e| {
        if let LifecycleEvent::Reject { reason } = e {
            println!("join refused: {reason:?}");
        }
    })));
    manager.set_kick_callback(Callback::Native(Box::new(|e| {
        if let LifecycleEvent::Kick { reason } = e {
            println!("kicked: {reason:?}");
        }
    })));
    manager.set_disconnect_callback(Callback::Native(Box::new(|_| {
        println!("host closed the lobby");
    })));

    let frame = Duration::from_millis(16);

    println!("searching for lobbies...");
    manager.begin_session_search()?;
    let deadline = Instant::now() + Duration::from_secs(6);
    let mut last = Instant::now();
    while Instant::now() < deadline {
        let dt = last.elapsed();
        last = Instant::now();
        manager.pre_tick_update(&mut driver, dt);
        manager.post_tick_update(&mut driver, dt);
        thread::sleep(frame);
    }

    let sessions = manager.sessions().to_vec();
    manager.end_session_search();
    if sessions.is_empty() {
        println!("no lobbies found");
        return Ok(());
    }
    for s in &sessions {
        println!(
            "  \"{}\" at {} ({}/{} players, v{})",
            s.name, s.host.addr, s.num_players, s.max_players, s.version
        );
    }

    let target = &sessions[0];
    println!("joining \"{}\"", target.name);
    manager.connect(target.host.addr)?;

    let mut last = Instant::now();
    let mut chat_timer = Duration::ZERO;
    let mut report_timer = Duration::ZERO;
    loop {
        let dt = last.elapsed();
        last = Instant::now();

        manager.pre_tick_update(&mut driver, dt);
        if manager.status() == NetStatus::Local {
            break;
        }

        if manager.status() == NetStatus::Client {
            chat_timer += dt;
            if chat_timer >= Duration::from_secs(5) {
                chat_timer = Duration::ZERO;
                if let Some(beacon) = driver.beacon {
                    let line = format!("hello from host id {}", manager.local_host_id());
                    if let Err(e) =
                        manager.send_net_func(beacon, FUNC_CHAT, vec![Datum::Str(line)], true)
                    {
                        println!("chat failed: {e}");
                    }
                }
            }

            report_timer += dt;
            if report_timer >= Duration::from_secs(5) {
                report_timer = Duration::ZERO;
                let ping = manager.ping(SERVER_HOST_ID).unwrap_or_default();
                println!(
                    "lobby up {}s, {} players, ping {}ms",
                    driver.uptime_secs,
                    driver.players,
                    ping.as_millis()
                );
            }
        }

        manager.post_tick_update(&mut driver, dt);
        thread::sleep(frame);
    }

    println!("left the lobby");
    Ok(())
}
