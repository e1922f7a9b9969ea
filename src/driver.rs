//! The seam between the network layer and the game it synchronizes.
//!
//! The engine never touches actors, levels or scripts itself; every side
//! effect of an executed message and every piece of gathered state goes
//! through a [`NetDriver`] the application passes into the two tick
//! calls. Tests drive the engine with recording stubs behind the same
//! trait.

use crate::{
    callbacks::{LifecycleEvent, ScriptHook},
    protocol::datum::Datum,
    session::{NetHostId, NetId},
};

/// A remote call gathered from an actor, ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct NetFuncCall {
    pub func: u8,
    pub params: Vec<Datum>,
    pub reliable: bool,
}

/// Everything the engine asks of the game.
///
/// Gathering calls run on the authority during replication; the apply
/// and spawn calls run on peers executing received messages. All of it
/// happens inside the tick, on the simulation thread.
pub trait NetDriver {
    /// Load the named level. Returning `true` means the level is in
    /// place and this process may report itself ready to the host.
    fn load_level(&mut self, name: &str) -> bool;

    /// Instantiate a registered actor type and bind it to `net_id`.
    fn spawn_actor(&mut self, type_id: u32, net_id: NetId);

    /// Instantiate a blueprint-defined actor and bind it to `net_id`.
    fn spawn_blueprint(&mut self, name: &str, net_id: NetId);

    fn destroy_actor(&mut self, net_id: NetId);

    /// Current replicated field values of an actor, in stable field
    /// order. `None` skips the actor for this visit.
    fn gather_replicated_data(&mut self, net_id: NetId) -> Option<Vec<Datum>>;

    /// Apply changed fields received from the authority. `script` routes
    /// the values to the actor's script component instead of its native
    /// fields.
    fn apply_replicated_data(&mut self, net_id: NetId, fields: &[(u8, Datum)], script: bool);

    /// Remote calls queued on an actor since the last gather.
    fn gather_net_funcs(&mut self, net_id: NetId) -> Vec<NetFuncCall>;

    /// Run a remote call received from `sender`.
    fn invoke_net_func(
        &mut self,
        net_id: NetId,
        func: u8,
        params: &[Datum],
        sender: NetHostId,
        script: bool,
    );

    /// Dispatch a lifecycle event to a script-side handler.
    fn call_script_hook(&mut self, hook: &ScriptHook, event: &LifecycleEvent);
}
