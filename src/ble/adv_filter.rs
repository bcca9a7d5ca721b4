//! Advertisement filter - recognises the split service in scan reports.

use crate::ble::{ScanReport, Uuid128};
use crate::error::DecodeError;

/// AD type: incomplete list of 128-bit service UUIDs.
pub const AD_TYPE_UUID128_SOME: u8 = 0x06;
/// AD type: complete list of 128-bit service UUIDs.
pub const AD_TYPE_UUID128_ALL: u8 = 0x07;

/// One `[len][type][data]` structure from advertising data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdStructure<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Iterator over the AD structures of a raw advertising payload.
///
/// Stops at the first zero-length structure or at a structure that runs
/// past the end of the buffer.
pub struct AdStructures<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AdStructures<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = AdStructure<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.offset;
        let len = *self.data.get(i)? as usize;
        if len == 0 || i + len >= self.data.len() {
            self.offset = self.data.len();
            return None;
        }
        self.offset = i + len + 1;
        Some(AdStructure {
            ad_type: self.data[i + 1],
            data: &self.data[i + 2..i + 1 + len],
        })
    }
}

/// Split a 128-bit UUID list record into UUIDs.
pub fn uuid128_list(data: &[u8]) -> Result<impl Iterator<Item = Uuid128> + '_, DecodeError> {
    if data.len() % 16 != 0 {
        return Err(DecodeError::MalformedUuidList { len: data.len() });
    }
    Ok(data.chunks_exact(16).filter_map(Uuid128::from_le_slice))
}

/// Check if raw advertisement data lists `target` among its 128-bit
/// service UUIDs.
///
/// Malformed UUID lists are logged and skipped; the rest of the payload
/// is still inspected.
pub fn contains_service_uuid128(data: &[u8], target: &Uuid128) -> bool {
    for ad in AdStructures::new(data) {
        trace!("[AD]: {} data_len {}", ad.ad_type, ad.data.len());
        if ad.ad_type != AD_TYPE_UUID128_SOME && ad.ad_type != AD_TYPE_UUID128_ALL {
            continue;
        }
        match uuid128_list(ad.data) {
            Ok(mut uuids) => {
                if uuids.any(|uuid| uuid == *target) {
                    return true;
                }
            }
            Err(_) => {
                error!("AD malformed: 128-bit UUID list of {} bytes", ad.data.len());
            }
        }
    }
    false
}

/// Decide whether a scan report comes from a connectable peripheral
/// advertising `target`.
pub fn is_split_peripheral(report: &ScanReport<'_>, target: &Uuid128) -> bool {
    debug!(
        "[DEVICE]: {:?}, AD evt type {:?}, AD data len {}, RSSI {}",
        report.address,
        report.adv_type,
        report.data.len(),
        report.rssi
    );

    // We're only interested in connectable events
    if !report.adv_type.is_connectable() {
        return false;
    }
    contains_service_uuid128(report.data, target)
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::{Address, AddressKind, AdvType};
    use crate::config::SPLIT_SERVICE_UUID;

    const OTHER_UUID: Uuid128 = Uuid128::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

    fn uuid_record(ad_type: u8, uuids: &[Uuid128], out: &mut [u8]) -> usize {
        let len = 1 + uuids.len() * 16;
        out[0] = len as u8;
        out[1] = ad_type;
        for (i, uuid) in uuids.iter().enumerate() {
            out[2 + i * 16..2 + (i + 1) * 16].copy_from_slice(uuid.as_bytes());
        }
        len + 1
    }

    fn report(adv_type: AdvType, data: &[u8]) -> ScanReport<'_> {
        ScanReport {
            address: Address::new(AddressKind::RandomStatic, [1, 2, 3, 4, 5, 6]),
            rssi: -40,
            adv_type,
            data,
        }
    }

    #[test]
    fn detect_split_uuid_in_complete_list() {
        let mut buf = [0u8; 64];
        let n = uuid_record(AD_TYPE_UUID128_ALL, &[SPLIT_SERVICE_UUID], &mut buf);
        assert!(contains_service_uuid128(&buf[..n], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn detect_split_uuid_in_incomplete_list() {
        let mut buf = [0u8; 64];
        let n = uuid_record(AD_TYPE_UUID128_SOME, &[SPLIT_SERVICE_UUID], &mut buf);
        assert!(contains_service_uuid128(&buf[..n], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn split_uuid_among_multiple_uuids() {
        let mut buf = [0u8; 64];
        let n = uuid_record(
            AD_TYPE_UUID128_ALL,
            &[OTHER_UUID, SPLIT_SERVICE_UUID],
            &mut buf,
        );
        assert!(contains_service_uuid128(&buf[..n], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn split_uuid_after_flags_record() {
        let mut buf = [0u8; 64];
        buf[..3].copy_from_slice(&[0x02, 0x01, 0x06]); // Flags
        let n = uuid_record(AD_TYPE_UUID128_ALL, &[SPLIT_SERVICE_UUID], &mut buf[3..]);
        assert!(contains_service_uuid128(&buf[..3 + n], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn other_uuid_does_not_match() {
        let mut buf = [0u8; 64];
        let n = uuid_record(AD_TYPE_UUID128_ALL, &[OTHER_UUID], &mut buf);
        assert!(!contains_service_uuid128(&buf[..n], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn uuid_bytes_in_other_record_types_are_ignored() {
        // Same 16 bytes carried as manufacturer data (0xFF).
        let mut buf = [0u8; 64];
        let n = uuid_record(0xFF, &[SPLIT_SERVICE_UUID], &mut buf);
        assert!(!contains_service_uuid128(&buf[..n], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn malformed_list_is_skipped_not_fatal() {
        // len=6, type=0x07, five bytes: not a multiple of 16.
        let mut buf = [0u8; 64];
        buf[..7].copy_from_slice(&[0x06, 0x07, 1, 2, 3, 4, 5]);
        let n = uuid_record(AD_TYPE_UUID128_ALL, &[SPLIT_SERVICE_UUID], &mut buf[7..]);
        assert!(contains_service_uuid128(&buf[..7 + n], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn uuid128_list_rejects_partial_uuid() {
        assert_eq!(
            uuid128_list(&[0u8; 20]).err(),
            Some(DecodeError::MalformedUuidList { len: 20 })
        );
        assert_eq!(uuid128_list(&[0u8; 32]).map(|u| u.count()).ok(), Some(2));
    }

    #[test]
    fn empty_advertisement_data() {
        assert!(!contains_service_uuid128(&[], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn malformed_ad_length_zero() {
        assert!(!contains_service_uuid128(&[0x00], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn truncated_structure_stops_parsing() {
        let mut buf = [0u8; 64];
        let n = uuid_record(AD_TYPE_UUID128_ALL, &[SPLIT_SERVICE_UUID], &mut buf);
        assert!(!contains_service_uuid128(&buf[..n - 1], &SPLIT_SERVICE_UUID));
    }

    #[test]
    fn ad_structures_iterates_in_order() {
        let data = [0x02, 0x01, 0x06, 0x03, 0x03, 0x12, 0x18];
        let mut it = AdStructures::new(&data);
        assert_eq!(
            it.next(),
            Some(AdStructure { ad_type: 0x01, data: &[0x06] })
        );
        assert_eq!(
            it.next(),
            Some(AdStructure { ad_type: 0x03, data: &[0x12, 0x18] })
        );
        assert_eq!(it.next(), None);
    }

    #[test]
    fn only_connectable_reports_match() {
        let mut buf = [0u8; 64];
        let n = uuid_record(AD_TYPE_UUID128_ALL, &[SPLIT_SERVICE_UUID], &mut buf);
        let data = &buf[..n];
        assert!(is_split_peripheral(&report(AdvType::Ind, data), &SPLIT_SERVICE_UUID));
        assert!(is_split_peripheral(&report(AdvType::DirectInd, data), &SPLIT_SERVICE_UUID));
        assert!(!is_split_peripheral(&report(AdvType::ScanInd, data), &SPLIT_SERVICE_UUID));
        assert!(!is_split_peripheral(&report(AdvType::NonConnInd, data), &SPLIT_SERVICE_UUID));
        assert!(!is_split_peripheral(&report(AdvType::ScanRsp, data), &SPLIT_SERVICE_UUID));
    }
}
