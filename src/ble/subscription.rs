//! Subscription manager - enables position-state notifications.

use crate::ble::host::BleHost;
use crate::ble::ConnHandle;
use crate::error::HostError;

/// CCC value enabling notifications.
pub const CCC_NOTIFY: u16 = 0x0001;

/// Write `value` to the CCC descriptor at `ccc_handle`, so that the
/// characteristic at `value_handle` starts notifying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscribeRequest {
    pub value_handle: u16,
    pub ccc_handle: u16,
    pub value: u16,
}

impl SubscribeRequest {
    pub const fn notify(value_handle: u16, ccc_handle: u16) -> Self {
        Self {
            value_handle,
            ccc_handle,
            value: CCC_NOTIFY,
        }
    }

    /// CCC value as written on the air.
    pub fn value_bytes(&self) -> [u8; 2] {
        self.value.to_le_bytes()
    }
}

/// Notification binding of the active link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscriptionState {
    /// Cleared when the stack reports the subscription gone.
    value_handle: Option<u16>,
    ccc_handle: u16,
}

impl SubscriptionState {
    pub fn value_handle(&self) -> Option<u16> {
        self.value_handle
    }

    pub fn ccc_handle(&self) -> u16 {
        self.ccc_handle
    }

    pub fn is_bound(&self) -> bool {
        self.value_handle.is_some()
    }

    /// True if a notification from `value_handle` belongs to this binding.
    pub fn accepts(&self, value_handle: u16) -> bool {
        self.value_handle == Some(value_handle)
    }

    /// Forget the value handle. The stack signals this with an empty
    /// notification; there is no other unsubscribe path.
    pub fn unbind(&mut self) {
        self.value_handle = None;
    }
}

/// Issue the subscribe request. "Already subscribed" counts as success.
pub fn subscribe<H: BleHost>(
    host: &mut H,
    conn: ConnHandle,
    request: &SubscribeRequest,
) -> Result<SubscriptionState, HostError> {
    match host.subscribe(conn, request) {
        Ok(()) | Err(HostError::AlreadySubscribed) => {
            debug!("[SUBSCRIBED]");
            Ok(SubscriptionState {
                value_handle: Some(request.value_handle),
                ccc_handle: request.ccc_handle,
            })
        }
        Err(e) => {
            error!("Subscribe failed (err {:?})", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::mock::{HostCall, MockHost};

    #[test]
    fn notify_request_writes_0x0001_le() {
        let request = SubscribeRequest::notify(9, 10);
        assert_eq!(request.value_bytes(), [0x01, 0x00]);
    }

    #[test]
    fn subscribe_binds_value_handle() {
        let mut host = MockHost::new();
        let state = subscribe(&mut host, ConnHandle(1), &SubscribeRequest::notify(9, 10)).unwrap();
        assert_eq!(state.value_handle(), Some(9));
        assert_eq!(state.ccc_handle(), 10);
        assert_eq!(
            host.calls(),
            &[HostCall::Subscribe(ConnHandle(1), SubscribeRequest::notify(9, 10))]
        );
    }

    #[test]
    fn already_subscribed_counts_as_success() {
        let mut host = MockHost::new();
        host.fail_subscribe = Some(HostError::AlreadySubscribed);
        let state = subscribe(&mut host, ConnHandle(1), &SubscribeRequest::notify(9, 10));
        assert!(state.is_ok_and(|s| s.is_bound()));
    }

    #[test]
    fn other_rejections_are_returned() {
        let mut host = MockHost::new();
        host.fail_subscribe = Some(HostError::Rejected(5));
        let state = subscribe(&mut host, ConnHandle(1), &SubscribeRequest::notify(9, 10));
        assert_eq!(state, Err(HostError::Rejected(5)));
    }

    #[test]
    fn unbind_stops_accepting_notifications() {
        let mut host = MockHost::new();
        let mut state =
            subscribe(&mut host, ConnHandle(1), &SubscribeRequest::notify(9, 10)).unwrap();
        assert!(state.accepts(9));
        assert!(!state.accepts(11));
        state.unbind();
        assert!(!state.accepts(9));
        assert!(!state.is_bound());
    }
}
