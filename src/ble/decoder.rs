//! Key position state decoder.
//!
//! The peripheral half notifies its full key state as a fixed-size bitmap:
//!
//! ```text
//! Byte n, bit m  →  key position n * 8 + m   (1 = pressed)
//! ```
//!
//! Each notification replaces the stored snapshot; every bit that differs
//! from the previous snapshot becomes one [`PositionChangeEvent`].

use crate::config::{MAX_POSITIONS, POSITION_STATE_DATA_LEN};
use crate::error::DecodeError;
use crate::event::PositionChangeEvent;

/// Last known pressed/released state of every key position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyPositionSnapshot {
    state: [u8; POSITION_STATE_DATA_LEN],
}

impl KeyPositionSnapshot {
    /// All positions released.
    pub const fn new() -> Self {
        Self {
            state: [0; POSITION_STATE_DATA_LEN],
        }
    }

    /// Encode a set of pressed positions into the wire bitmap.
    pub fn from_positions(pressed: &[usize]) -> Result<Self, DecodeError> {
        let mut snapshot = Self::new();
        for &position in pressed {
            if position >= MAX_POSITIONS {
                return Err(DecodeError::PositionOutOfRange(position));
            }
            snapshot.state[position / 8] |= 1 << (position % 8);
        }
        Ok(snapshot)
    }

    /// Raw bitmap, in the same layout as a notification payload.
    pub fn as_bytes(&self) -> &[u8; POSITION_STATE_DATA_LEN] {
        &self.state
    }

    pub fn is_pressed(&self, position: usize) -> bool {
        position < MAX_POSITIONS && self.state[position / 8] & (1 << (position % 8)) != 0
    }

    /// Number of positions currently pressed.
    pub fn pressed_count(&self) -> usize {
        self.state.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Replace the snapshot with `payload` and return the changes.
    ///
    /// A payload of the wrong length is rejected and leaves the snapshot
    /// untouched.
    pub fn apply(&mut self, payload: &[u8]) -> Result<PositionChanges, DecodeError> {
        let next: [u8; POSITION_STATE_DATA_LEN] =
            payload
                .try_into()
                .map_err(|_| DecodeError::WrongLength {
                    expected: POSITION_STATE_DATA_LEN,
                    actual: payload.len(),
                })?;

        let mut changed = [0u8; POSITION_STATE_DATA_LEN];
        for (i, byte) in next.iter().enumerate() {
            changed[i] = byte ^ self.state[i];
        }
        self.state = next;

        Ok(PositionChanges {
            changed,
            state: next,
            index: 0,
        })
    }
}

/// Position changes between two snapshots, in ascending position order.
#[derive(Clone, Debug)]
pub struct PositionChanges {
    changed: [u8; POSITION_STATE_DATA_LEN],
    state: [u8; POSITION_STATE_DATA_LEN],
    index: usize,
}

impl Iterator for PositionChanges {
    type Item = PositionChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < MAX_POSITIONS {
            let position = self.index;
            self.index += 1;

            let (byte, bit) = (position / 8, position % 8);
            if self.changed[byte] & (1 << bit) != 0 {
                let pressed = self.state[byte] & (1 << bit) != 0;
                return Some(PositionChangeEvent::new(position as u8, pressed));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(first: u8) -> [u8; POSITION_STATE_DATA_LEN] {
        let mut p = [0u8; POSITION_STATE_DATA_LEN];
        p[0] = first;
        p
    }

    fn collect(changes: PositionChanges) -> heapless::Vec<PositionChangeEvent, MAX_POSITIONS> {
        changes.collect()
    }

    #[test]
    fn single_press_from_released() {
        let mut snapshot = KeyPositionSnapshot::new();
        let events = collect(snapshot.apply(&payload(0x01)).unwrap());
        assert_eq!(&events[..], &[PositionChangeEvent::new(0, true)]);
    }

    #[test]
    fn single_release() {
        let mut snapshot = KeyPositionSnapshot::from_positions(&[0]).unwrap();
        let events = collect(snapshot.apply(&payload(0x00)).unwrap());
        assert_eq!(&events[..], &[PositionChangeEvent::new(0, false)]);
    }

    #[test]
    fn two_presses_in_ascending_order() {
        let mut snapshot = KeyPositionSnapshot::new();
        let events = collect(snapshot.apply(&payload(0x03)).unwrap());
        assert_eq!(
            &events[..],
            &[
                PositionChangeEvent::new(0, true),
                PositionChangeEvent::new(1, true)
            ]
        );
    }

    #[test]
    fn same_payload_twice_yields_nothing() {
        let mut snapshot = KeyPositionSnapshot::new();
        let mut p = payload(0x81);
        p[15] = 0x80;
        assert_eq!(snapshot.apply(&p).unwrap().count(), 3);

        let second = snapshot.apply(&p).unwrap();
        assert_eq!(second.count(), 0);
    }

    #[test]
    fn mixed_press_and_release_across_bytes() {
        let mut snapshot = KeyPositionSnapshot::from_positions(&[3, 17, 100]).unwrap();
        let next = KeyPositionSnapshot::from_positions(&[3, 9, 127]).unwrap();
        let events = collect(snapshot.apply(next.as_bytes()).unwrap());
        assert_eq!(
            &events[..],
            &[
                PositionChangeEvent::new(9, true),
                PositionChangeEvent::new(17, false),
                PositionChangeEvent::new(100, false),
                PositionChangeEvent::new(127, true),
            ]
        );
        assert_eq!(snapshot, next);
    }

    #[test]
    fn every_position_round_trips_through_the_bitmap() {
        let pressed = [0usize, 7, 8, 15, 16, 63, 64, 99, 120, 127];
        let mut snapshot = KeyPositionSnapshot::new();
        let encoded = KeyPositionSnapshot::from_positions(&pressed).unwrap();
        let events = collect(snapshot.apply(encoded.as_bytes()).unwrap());

        assert_eq!(events.len(), pressed.len());
        for (event, &position) in events.iter().zip(pressed.iter()) {
            assert_eq!(event.position as usize, position);
            assert!(event.pressed);
        }
        assert_eq!(snapshot.pressed_count(), pressed.len());
    }

    #[test]
    fn wrong_length_is_rejected_and_snapshot_kept() {
        let mut snapshot = KeyPositionSnapshot::from_positions(&[5]).unwrap();
        let before = snapshot;

        for len in [0usize, 1, 15, 17, 32] {
            let data = [0xFFu8; 32];
            let result = snapshot.apply(&data[..len]);
            assert_eq!(
                result.err(),
                Some(DecodeError::WrongLength {
                    expected: POSITION_STATE_DATA_LEN,
                    actual: len
                })
            );
            assert_eq!(snapshot, before);
        }
    }

    #[test]
    fn from_positions_rejects_out_of_range() {
        assert_eq!(
            KeyPositionSnapshot::from_positions(&[1, MAX_POSITIONS]),
            Err(DecodeError::PositionOutOfRange(MAX_POSITIONS))
        );
    }

    #[test]
    fn is_pressed_reads_the_bitmap() {
        let snapshot = KeyPositionSnapshot::from_positions(&[10]).unwrap();
        assert!(snapshot.is_pressed(10));
        assert!(!snapshot.is_pressed(11));
        assert!(!snapshot.is_pressed(MAX_POSITIONS + 5));
    }
}
