//! A poll-driven UDP session layer for games: reliable messaging, tiered
//! actor replication and LAN discovery, with no threads and no async
//! runtime.
//!
//! Everything runs inside two calls the game loop makes each frame:
//! [`NetworkManager::pre_tick_update`] drains the sockets and executes
//! whatever arrived, [`NetworkManager::post_tick_update`] runs
//! replication and flushes outgoing traffic. In between, the application
//! owns the frame. The engine reaches back into the application through
//! the [`NetDriver`] trait it is handed every tick.
//!
//! On the wire, every datagram is a 3-byte header followed by a batch of
//! tagged messages. Each peer pair runs two channels over the same
//! socket: a reliable one with acknowledgement, retransmission and
//! in-order delivery, and an unreliable one where only the newest
//! datagram counts. Replicated actors are diffed against a per-actor
//! snapshot and broadcast round-robin in three rate tiers, so a large
//! world drips out across frames instead of bursting.
//!
//! ```no_run
//! use std::time::Duration;
//! use replicast::{
//!     Datum, LifecycleEvent, NetConfig, NetDriver, NetFuncCall, NetHostId, NetId,
//!     NetworkManager, ReplicationRate, ScriptHook,
//! };
//!
//! struct Game;
//!
//! impl NetDriver for Game {
//!     fn load_level(&mut self, _name: &str) -> bool {
//!         true
//!     }
//!     fn spawn_actor(&mut self, _type_id: u32, _net_id: NetId) {}
//!     fn spawn_blueprint(&mut self, _name: &str, _net_id: NetId) {}
//!     fn destroy_actor(&mut self, _net_id: NetId) {}
//!     fn gather_replicated_data(&mut self, _net_id: NetId) -> Option<Vec<Datum>> {
//!         None
//!     }
//!     fn apply_replicated_data(&mut self, _net_id: NetId, _fields: &[(u8, Datum)], _script: bool) {}
//!     fn gather_net_funcs(&mut self, _net_id: NetId) -> Vec<NetFuncCall> {
//!         Vec::new()
//!     }
//!     fn invoke_net_func(
//!         &mut self,
//!         _net_id: NetId,
//!         _func: u8,
//!         _params: &[Datum],
//!         _sender: NetHostId,
//!         _script: bool,
//!     ) {
//!     }
//!     fn call_script_hook(&mut self, _hook: &ScriptHook, _event: &LifecycleEvent) {}
//! }
//!
//! fn main() -> Result<(), replicast::NetError> {
//!     let mut game = Game;
//!     let mut net = NetworkManager::new(NetConfig {
//!         game_code: 0xC0DE,
//!         session_name: "my lobby".into(),
//!         ..NetConfig::default()
//!     });
//!     net.open_session()?;
//!     net.load_level("arena")?;
//!     let _beacon = net.register_actor(1, ReplicationRate::Low)?;
//!
//!     let dt = Duration::from_millis(16);
//!     for _ in 0..600 {
//!         net.pre_tick_update(&mut game, dt);
//!         // game logic here
//!         net.post_tick_update(&mut game, dt);
//!     }
//!     net.close_session();
//!     Ok(())
//! }
//! ```

pub mod callbacks;
pub mod driver;
mod error;
pub mod manager;
pub mod protocol;
pub mod replication;
mod session;
mod stats;
pub mod transport;

pub use callbacks::{Callback, LifecycleEvent, ScriptHook};
pub use driver::{NetDriver, NetFuncCall};
pub use error::NetError;
pub use manager::{NetConfig, NetworkManager};
pub use protocol::datum::Datum;
pub use protocol::message::{KickReason, RejectReason};
pub use replication::ReplicationRate;
pub use session::{GameSession, NetHost, NetHostId, NetId, NetStatus, SERVER_HOST_ID};
pub use stats::NetworkStats;
pub use transport::{SimNetwork, SimTransport, Transport, UdpTransport};
