use std::{
    error::Error,
    thread,
    time::{Duration, Instant},
};

use replicast::{
    Callback, Datum, LifecycleEvent, NetConfig, NetDriver, NetFuncCall, NetHostId, NetId,
    NetworkManager, ReplicationRate, ScriptHook,
};

const LOBBY_CODE: u32 = 0x4C4F_4242;
const BEACON_TYPE: u32 = 1;
const FUNC_CHAT: u8 = 0;

/// Lobby state behind the driver: one beacon actor replicating the
/// uptime and the player count, plus chat lines waiting for an echo.
#[derive(Default)]
struct LobbyDriver {
    uptime_secs: i32,
    players: u8,
    chat: Vec<(NetHostId, String)>,
}

impl NetDriver for LobbyDriver {
    fn load_level(&mut self, name: &str) -> bool {
        println!("level loaded: {name}");
        true
    }

    fn spawn_actor(&mut self, _type_id: u32, _net_id: NetId) {}

    fn spawn_blueprint(&mut self, _name: &str, _net_id: NetId) {}

    fn destroy_actor(&mut self, _net_id: NetId) {}

    fn gather_replicated_data(&mut self, _net_id: NetId) -> Option<Vec<Datum>> {
        Some(vec![Datum::Int(self.uptime_secs), Datum::Byte(self.players)])
    }

    fn apply_replicated_data(&mut self, _net_id: NetId, _fields: &[(u8, Datum)], _script: bool) {}

    fn gather_net_funcs(&mut self, _net_id: NetId) -> Vec<NetFuncCall> {
        Vec::new()
    }

    fn invoke_net_func(
        &mut self,
        _net_id: NetId,
        func: u8,
        params: &[Datum],
        sender: NetHostId,
        _script: bool,
    ) {
        if func == FUNC_CHAT {
            if let Some(Datum::Str(text)) = params.first() {
                self.chat.push((sender, text.clone()));
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
        session_name: "lobby demo".into(),
        ..NetConfig::default()
    });
    let mut driver = LobbyDriver::default();

    manager.set_connect_callback(Callback::Native(Box::new(|e| {
        if let LifecycleEvent::Connect { host } = e {
            println!("client {} joined from {}", host.id, host.addr);
        }
    })));
    manager.set_disconnect_callback(Callback::Native(Box::new(|e| {
        if let LifecycleEvent::Disconnect { host } = e {
            println!("client {} left", host.id);
        }
    })));

    manager.open_session()?;
    manager.load_level("lobby")?;
    let beacon = manager.register_actor(BEACON_TYPE, ReplicationRate::Low)?;
    println!(
        "hosting \"{}\" on port {}, discoverable on port {}",
        manager.config().session_name,
        manager.config().game_port,
        manager.config().discovery_port,
    );

    let frame = Duration::from_millis(16);
    let mut last = Instant::now();
    let mut second = Duration::ZERO;
    loop {
        let dt = last.elapsed();
        last = Instant::now();

        manager.pre_tick_update(&mut driver, dt);

        driver.players = manager.num_peers() as u8;
        for (sender, text) in std::mem::take(&mut driver.chat) {
            println!("chat from {sender}: {text}");
            let echo = format!("[{sender}] {text}");
            if let Err(e) = manager.send_net_func(beacon, FUNC_CHAT, vec![Datum::Str(echo)], true)
            {
                println!("echo failed: {e}");
            }
        }

        second += dt;
        if second >= Duration::from_secs(1) {
            second -= Duration::from_secs(1);
            driver.uptime_secs += 1;
            if driver.uptime_secs % 30 == 0 {
                let stats = manager.stats();
                println!(
                    "up {}s, {} players, {} B/s out, {} B/s in",
                    driver.uptime_secs,
                    manager.num_peers(),
                    stats.upload_rate() as u64,
                    stats.download_rate() as u64,
                );
            }
        }

        manager.post_tick_update(&mut driver, dt);
        thread::sleep(frame);
    }
}
