//! Pairing for the split link.
//!
//! Only the peripheral half the session scanned for may bond, and only one
//! bond is kept, in RAM. The peripheral half re-pairs after a reset.

use core::cell::{Cell, RefCell};

use defmt::{info, warn};
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{Connection, EncryptionInfo, IdentityKey, MasterId, SecurityMode};
use static_cell::StaticCell;

use split_central::ble::{Address, ConnHandle, SecurityLevel};
use split_central::event::LinkEvent;

use super::events;

/// Keys of the peripheral half.
struct SplitBond {
    master_id: MasterId,
    key: EncryptionInfo,
    peer_id: IdentityKey,
}

pub struct SplitBonder {
    /// Address the session is connecting to.
    peer: Cell<Option<Address>>,
    bond: RefCell<Option<SplitBond>>,
}

impl SplitBonder {
    const fn new() -> Self {
        Self {
            peer: Cell::new(None),
            bond: RefCell::new(None),
        }
    }

    /// Accept pairing from `peer` only, from now on.
    pub fn expect_peer(&self, peer: Address) {
        self.peer.set(Some(peer));
    }

    fn is_split_peer(&self, conn: &Connection) -> bool {
        self.peer
            .get()
            .is_some_and(|peer| peer.bytes == conn.peer_address().bytes())
    }
}

impl SecurityHandler for SplitBonder {
    fn io_capabilities(&self) -> IoCapabilities {
        // Neither half has a display or keypad for passkeys.
        IoCapabilities::None
    }

    fn can_bond(&self, conn: &Connection) -> bool {
        self.is_split_peer(conn)
    }

    fn on_bonded(
        &self,
        conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        if !self.is_split_peer(conn) {
            warn!("ignoring bond from unexpected peer");
            return;
        }
        let replaced = self
            .bond
            .replace(Some(SplitBond {
                master_id,
                key,
                peer_id,
            }))
            .is_some();
        info!("bonded with peripheral half (replaced: {})", replaced);
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.bond
            .borrow()
            .as_ref()
            .filter(|bond| bond.master_id == master_id)
            .map(|bond| bond.key)
    }

    fn get_peripheral_key(&self, conn: &Connection) -> Option<(MasterId, EncryptionInfo)> {
        self.bond
            .borrow()
            .as_ref()
            .filter(|bond| bond.peer_id.is_match(conn.peer_address()))
            .map(|bond| (bond.master_id, bond.key))
    }

    fn on_security_update(&self, conn: &Connection, mode: SecurityMode) {
        info!("split link security mode: {}", mode);
        if let Some(handle) = conn.handle() {
            events::post(LinkEvent::SecurityChanged {
                conn: ConnHandle(handle),
                level: security_level(mode),
            });
        }
    }
}

pub fn bonder() -> &'static SplitBonder {
    static BONDER: StaticCell<SplitBonder> = StaticCell::new();
    BONDER.init(SplitBonder::new())
}

/// Map a SoftDevice security mode onto the session's levels.
fn security_level(mode: SecurityMode) -> SecurityLevel {
    match mode {
        SecurityMode::JustWorks | SecurityMode::Signed => SecurityLevel::Encrypted,
        SecurityMode::Mitm | SecurityMode::SignedMitm => SecurityLevel::Authenticated,
        SecurityMode::LescMitm => SecurityLevel::SecureConnections,
        _ => SecurityLevel::Open,
    }
}
