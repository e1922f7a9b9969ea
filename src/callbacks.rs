//! Connection lifecycle callbacks.
//!
//! The application registers one handler per lifecycle event, either a
//! native closure or a [`ScriptHook`] the game's scripting collaborator
//! resolves. Exactly one target fires per event; an empty slot fires
//! nothing.

use crate::{
    driver::NetDriver,
    protocol::message::{KickReason, RejectReason},
    session::{NetHost, NetHostId},
};

/// Names a script-side handler: the table and function the driver's
/// scripting layer looks up when the event fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptHook {
    pub table: String,
    pub function: String,
}

impl ScriptHook {
    pub fn new(table: impl Into<String>, function: impl Into<String>) -> ScriptHook {
        ScriptHook {
            table: table.into(),
            function: function.into(),
        }
    }
}

/// A connection lifecycle notification, as delivered to the registered
/// handler. Only remote-initiated transitions produce events; locally
/// requested ones (closing a session, kicking a client) do not echo back.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A peer joined the session this process hosts.
    Connect { host: NetHost },
    /// The host accepted our connection attempt under this id.
    Accept { host_id: NetHostId },
    /// The host turned our connection attempt down, or it timed out.
    Reject { reason: RejectReason },
    /// A peer left, timed out, or the host closed the session.
    Disconnect { host: NetHost },
    /// The host removed us from the session.
    Kick { reason: KickReason },
}

/// Where one lifecycle event goes.
#[derive(Default)]
pub enum Callback {
    /// Nothing registered; the event is dropped.
    #[default]
    None,
    /// A native closure, called directly.
    Native(Box<dyn FnMut(&LifecycleEvent)>),
    /// A script handler, dispatched through the driver.
    Script(ScriptHook),
}

impl Callback {
    pub(crate) fn fire(&mut self, driver: &mut dyn NetDriver, event: &LifecycleEvent) {
        match self {
            Callback::None => {}
            Callback::Native(f) => f(event),
            Callback::Script(hook) => driver.call_script_hook(hook, event),
        }
    }
}

/// The five callback slots, one per event kind.
#[derive(Default)]
pub(crate) struct Callbacks {
    pub(crate) connect: Callback,
    pub(crate) accept: Callback,
    pub(crate) reject: Callback,
    pub(crate) disconnect: Callback,
    pub(crate) kick: Callback,
}

impl Callbacks {
    /// Routes the event to its slot and fires it.
    pub(crate) fn fire(&mut self, driver: &mut dyn NetDriver, event: &LifecycleEvent) {
        let slot = match event {
            LifecycleEvent::Connect { .. } => &mut self.connect,
            LifecycleEvent::Accept { .. } => &mut self.accept,
            LifecycleEvent::Reject { .. } => &mut self.reject,
            LifecycleEvent::Disconnect { .. } => &mut self.disconnect,
            LifecycleEvent::Kick { .. } => &mut self.kick,
        };
        slot.fire(driver, event);
    }
}
