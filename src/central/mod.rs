//! Split central session.
//!
//! [`Central`] owns every piece of mutable state of the link manager: the
//! lifecycle state, the single peripheral link (with its discovery cursor
//! or subscription) and the key position snapshot. The BLE stack drives it
//! by calling one `on_*` method per callback, always from the same task.
//!
//! ```text
//!  Idle ──start──▶ Scanning ──split service seen──▶ Connecting
//!                     ▲                                  │
//!                     │ connect failed                   │ connected
//!                     ├──────────────────────────────────┤
//!                     │                                  ▼
//!               Disconnected ◀──────link lost────── Connected
//!                                                   (discover → subscribe)
//! ```
//!
//! Callbacks return `Err` for anything that went wrong, but by then the
//! error has been logged and contained; only [`Error::FatalInit`] from
//! [`Central::start`] needs handling by the caller.


use crate::ble::adv_filter;
use crate::ble::decoder::KeyPositionSnapshot;
use crate::ble::discovery::{DiscoveryCursor, DiscoveryStep};
use crate::ble::host::{BleHost, EventSink};
use crate::ble::link::{GattState, LinkState, PeripheralLink};
use crate::ble::subscription;
use crate::ble::{Address, Attribute, ConnHandle, Generation, Phy, ScanReport, SecurityLevel};
use crate::config::{SPLIT_CONN_PARAMS, SPLIT_PREFERRED_PHY, SPLIT_SECURITY_LEVEL, SPLIT_SERVICE_UUID};
use crate::error::{Error, HostError, Request};
use crate::event::LinkEvent;

pub struct Central {
    state: LinkState,
    link: Option<PeripheralLink>,
    /// Address that triggered the last connect; only this peer gets
    /// discovered.
    target: Option<Address>,
    generation: Generation,
    snapshot: KeyPositionSnapshot,
}

impl Default for Central {
    fn default() -> Self {
        Self::new()
    }
}

impl Central {
    pub const fn new() -> Self {
        Self {
            state: LinkState::Idle,
            link: None,
            target: None,
            generation: Generation(0),
            snapshot: KeyPositionSnapshot::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn link(&self) -> Option<&PeripheralLink> {
        self.link.as_ref()
    }

    pub fn snapshot(&self) -> &KeyPositionSnapshot {
        &self.snapshot
    }

    /// Start scanning for the peripheral half. Called once at boot.
    pub fn start<H: BleHost>(&mut self, host: &mut H) -> Result<(), Error> {
        if let Err(e) = host.start_scan() {
            error!("Scanning failed to start (err {:?})", e);
            self.state = LinkState::Idle;
            return Err(Error::FatalInit(e));
        }
        debug!("Scanning successfully started");
        self.state = LinkState::Scanning;
        Ok(())
    }

    fn restart_scan<H: BleHost>(&mut self, host: &mut H) {
        match host.start_scan() {
            Ok(()) => {
                debug!("Scanning successfully started");
                self.state = LinkState::Scanning;
            }
            Err(e) => {
                error!("Scanning failed to start (err {:?})", e);
                self.state = LinkState::Idle;
            }
        }
    }

    // Advertisement filter

    /// One advertisement seen while scanning.
    pub fn on_scan_report<H: BleHost>(
        &mut self,
        host: &mut H,
        report: &ScanReport<'_>,
    ) -> Result<(), Error> {
        if self.state != LinkState::Scanning {
            return Ok(());
        }
        if !adv_filter::is_split_peripheral(report, &SPLIT_SERVICE_UUID) {
            return Ok(());
        }

        debug!("Found the split service");
        if let Err(e) = host.stop_scan() {
            // The stack is still scanning, so the next match gets another go.
            error!("Stop LE scan failed (err {:?})", e);
            return Err(Error::Transient(Request::StopScan, e));
        }

        let peer = report.address;
        self.target = Some(peer);

        if let Some(conn) = host.find_connection(&peer) {
            debug!("Found existing connection");
            return self.process_connection(host, conn, peer);
        }

        self.state = LinkState::Connecting { peer };
        if let Err(e) = host.connect(&peer, &SPLIT_CONN_PARAMS) {
            error!("Create conn failed (err {:?})", e);
            self.restart_scan(host);
            return Err(Error::Transient(Request::Connect, e));
        }

        if let Err(e) = host.update_phy(&peer, SPLIT_PREFERRED_PHY) {
            error!("Update phy conn failed (err {:?})", e);
            self.restart_scan(host);
            return Err(Error::Transient(Request::PhyUpdate, e));
        }

        Ok(())
    }

    // Link lifecycle

    /// Connection attempt to `peer` completed. `Err` carries the HCI status.
    pub fn on_connected<H: BleHost>(
        &mut self,
        host: &mut H,
        peer: Address,
        result: Result<ConnHandle, u8>,
    ) -> Result<(), Error> {
        let conn = match result {
            Ok(conn) => conn,
            Err(status) => {
                error!("Failed to connect to {:?} ({})", peer, status);
                if let Some(link) = &self.link {
                    // An older attempt failing does not affect the live link.
                    return Err(Error::Stale(link.conn));
                }
                if self.target == Some(peer) {
                    self.target = None;
                }
                self.restart_scan(host);
                return Err(Error::Transient(
                    Request::Connect,
                    HostError::Rejected(u32::from(status)),
                ));
            }
        };

        info!("Connected: {:?}", peer);
        if self.state == LinkState::Scanning {
            // A connect that completed after its scan was restarted.
            if let Err(e) = host.stop_scan() {
                warn!("Stop LE scan failed (err {:?})", e);
            }
        }
        self.process_connection(host, conn, peer)
    }

    fn process_connection<H: BleHost>(
        &mut self,
        host: &mut H,
        conn: ConnHandle,
        peer: Address,
    ) -> Result<(), Error> {
        if let Some(old) = self.link.take() {
            if old.conn != conn {
                warn!("Replacing link {} with {}", old.conn.0, conn.0);
                if let Err(e) = host.disconnect(old.conn) {
                    warn!("Failed to drop link {} (err {:?})", old.conn.0, e);
                }
            }
        }

        self.generation = self.generation.next();
        let mut link = PeripheralLink::new(conn, peer, self.generation);
        self.state = LinkState::Connected;

        debug!("Current security for connection: {:?}", link.security);
        if let Err(e) = host.set_security(conn, SPLIT_SECURITY_LEVEL) {
            // Not fatal: the peripheral may still serve the link unencrypted.
            error!("Failed to set security (reason {:?})", e);
        }

        let result = if self.target == Some(peer) {
            let cursor = DiscoveryCursor::new(self.generation);
            match host.discover(conn, &cursor.request()) {
                Ok(()) => {
                    link.gatt = GattState::Discovering(cursor);
                    Ok(())
                }
                Err(e) => {
                    error!("Discover failed (err {:?})", e);
                    link.gatt = GattState::Stalled;
                    Err(Error::Transient(Request::Discover, e))
                }
            }
        } else {
            debug!("Connection to {:?} was not requested by the scan", peer);
            Ok(())
        };

        self.link = Some(link);
        result
    }

    /// The connection `conn` dropped.
    pub fn on_disconnected<H: BleHost>(
        &mut self,
        host: &mut H,
        conn: ConnHandle,
        reason: u8,
    ) -> Result<(), Error> {
        debug!("Disconnected: {} (reason {})", conn.0, reason);

        if !self.link.as_ref().is_some_and(|link| link.conn == conn) {
            return Err(Error::Stale(conn));
        }

        self.link = None;
        self.state = LinkState::Disconnected;
        self.restart_scan(host);
        Ok(())
    }

    /// The stack negotiated a new PHY.
    pub fn on_phy_updated(&mut self, conn: ConnHandle, phy: Phy) -> Result<(), Error> {
        let link = self.active_link(conn)?;
        link.phy = phy;
        debug!("PHY updated to {:?}", phy);
        Ok(())
    }

    /// A PHY update the stack accepted earlier could not be started on
    /// `conn`. Handled like an immediate rejection: scanning resumes.
    pub fn on_phy_update_failed<H: BleHost>(
        &mut self,
        host: &mut H,
        conn: ConnHandle,
        error: HostError,
    ) -> Result<(), Error> {
        self.active_link(conn)?;
        error!("Update phy conn failed (err {:?})", error);
        self.restart_scan(host);
        Err(Error::Transient(Request::PhyUpdate, error))
    }

    /// The link's security level changed.
    pub fn on_security_changed(
        &mut self,
        conn: ConnHandle,
        level: SecurityLevel,
    ) -> Result<(), Error> {
        let link = self.active_link(conn)?;
        link.security = level;
        info!("Security changed to {:?}", level);
        Ok(())
    }

    /// The stack reported the negotiated connection parameters.
    pub fn on_params_updated(
        &mut self,
        conn: ConnHandle,
        interval: u16,
        latency: u16,
        supervision_timeout: u16,
    ) -> Result<(), Error> {
        let link = self.active_link(conn)?;
        link.interval = Some(interval);
        link.latency = Some(latency);
        link.supervision_timeout = Some(supervision_timeout);
        debug!(
            "New connection params: Interval: {}, Latency: {}, PHY: {:?}",
            interval,
            latency,
            link.phy
        );
        Ok(())
    }

    /// Replay a link update reported by the stack.
    pub fn on_link_event<H: BleHost>(
        &mut self,
        host: &mut H,
        event: LinkEvent,
    ) -> Result<(), Error> {
        match event {
            LinkEvent::PhyUpdated { conn, phy } => self.on_phy_updated(conn, phy),
            LinkEvent::SecurityChanged { conn, level } => self.on_security_changed(conn, level),
            LinkEvent::ParamsUpdated {
                conn,
                interval,
                latency,
                supervision_timeout,
            } => self.on_params_updated(conn, interval, latency, supervision_timeout),
            LinkEvent::Disconnected { conn, reason } => self.on_disconnected(host, conn, reason),
        }
    }

    fn active_link(&mut self, conn: ConnHandle) -> Result<&mut PeripheralLink, Error> {
        match self.link.as_mut() {
            Some(link) if link.conn == conn => Ok(link),
            _ => Err(Error::Stale(conn)),
        }
    }

    // Attribute discovery & subscription

    /// Response to the last discovery request; `None` means no (more)
    /// matching attribute.
    pub fn on_discovery<H: BleHost>(
        &mut self,
        host: &mut H,
        conn: ConnHandle,
        generation: Generation,
        attribute: Option<Attribute>,
    ) -> Result<(), Error> {
        let link = self.active_link(conn)?;
        if link.generation != generation {
            return Err(Error::Stale(conn));
        }
        if !link.is_discovering() {
            debug!("Discovery response with no discovery in progress");
            return Ok(());
        }

        let Some(attr) = attribute else {
            warn!("Discover complete without finding the split service");
            link.gatt = GattState::Stalled;
            return Ok(());
        };

        let step = match link.cursor_mut() {
            Some(cursor) => cursor.advance(&attr),
            None => return Ok(()),
        };

        match step {
            DiscoveryStep::Next(request) => {
                if let Err(e) = host.discover(conn, &request) {
                    error!("Discover failed (err {:?})", e);
                    link.gatt = GattState::Stalled;
                    return Err(Error::Transient(Request::Discover, e));
                }
                Ok(())
            }
            DiscoveryStep::Complete(request) => {
                match subscription::subscribe(host, conn, &request) {
                    Ok(sub) => {
                        link.gatt = GattState::Subscribed(sub);
                        Ok(())
                    }
                    Err(e) => {
                        link.gatt = GattState::Stalled;
                        Err(Error::Transient(Request::Subscribe, e))
                    }
                }
            }
            DiscoveryStep::Ignored => Ok(()),
        }
    }

    /// The CCC write for `ccc_handle` failed after the stack queued it.
    pub fn on_subscribe_failed(
        &mut self,
        conn: ConnHandle,
        generation: Generation,
        ccc_handle: u16,
        error: HostError,
    ) -> Result<(), Error> {
        let link = self.active_link(conn)?;
        let current = link
            .subscription()
            .is_some_and(|sub| sub.ccc_handle() == ccc_handle);
        if link.generation != generation || !current {
            return Err(Error::Stale(conn));
        }

        error!("Subscribe failed (err {:?})", error);
        link.gatt = GattState::Stalled;
        Err(Error::Transient(Request::Subscribe, error))
    }

    // Notification decoder

    /// Notification from `value_handle`. `None` or an empty payload means
    /// the stack dropped the subscription.
    pub fn on_notification<E: EventSink>(
        &mut self,
        events: &mut E,
        conn: ConnHandle,
        value_handle: u16,
        payload: Option<&[u8]>,
    ) -> Result<(), Error> {
        let link = match self.link.as_mut() {
            Some(link) if link.conn == conn => link,
            _ => return Err(Error::Stale(conn)),
        };
        let Some(sub) = link.subscription_mut().filter(|sub| sub.accepts(value_handle)) else {
            debug!("Notification from unbound handle {}", value_handle);
            return Err(Error::Stale(conn));
        };

        let payload = match payload {
            Some(data) if !data.is_empty() => data,
            _ => {
                // Keep the snapshot: a resubscription must not replay presses.
                debug!("[UNSUBSCRIBED]");
                sub.unbind();
                return Ok(());
            }
        };

        debug!("[NOTIFICATION] length {}", payload.len());
        let changes = self.snapshot.apply(payload).map_err(|e| {
            warn!("Dropping position state: {:?}", e);
            Error::from(e)
        })?;

        for event in changes {
            debug!(
                "Trigger key position state change for {} ({})",
                event.position,
                event.pressed
            );
            events.publish(event);
        }
        trace!("{} positions held", self.snapshot.pressed_count());
        Ok(())
    }
}
