//! Byte layout of a persisted configuration record.
//!
//! ```text
//! +--------+---------+-------------+-----------------+----------+--------+
//! | HEAD   | version | payload len | payload (JSON)  | CRC-16   | FOOT   |
//! | 4 B    | 1 B     | u32 LE      | len bytes       | u16 LE   | 4 B    |
//! +--------+---------+-------------+-----------------+----------+--------+
//! ```
//!
//! The head and foot markers tell a written record apart from erased or foreign
//! storage. The CRC-16/MODBUS covers version, length and payload so a record
//! with intact markers but damaged contents is still rejected.

use crate::store::record::ConfigRecord;
use crate::store::StoreError;

pub const HEAD_MARKER: [u8; 4] = *b"OWS<";
pub const FOOT_MARKER: [u8; 4] = *b">OWS";
pub const RECORD_VERSION: u8 = 1;

const HEADER_LEN: usize = HEAD_MARKER.len() + 1 + 4;
const TRAILER_LEN: usize = 2 + FOOT_MARKER.len();

/// Bytes taken by the frame around the payload.
pub const FRAME_OVERHEAD: usize = HEADER_LEN + TRAILER_LEN;

fn crc16_step(mut crc: u16, byte: u8) -> u16 {
    crc ^= byte as u16;
    for _ in 0..8 {
        crc = if (crc & 1) != 0 {
            (crc >> 1) ^ 0xA001
        } else {
            crc >> 1
        };
    }
    crc
}

/// CRC-16/MODBUS.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF, |crc, &b| crc16_step(crc, b))
}

/// Serialise a record into a complete frame no longer than `capacity`.
pub fn encode(record: &ConfigRecord, capacity: usize) -> Result<Vec<u8>, StoreError> {
    let payload = serde_json::to_vec(record).map_err(StoreError::Encode)?;
    let total = payload.len() + FRAME_OVERHEAD;
    if total > capacity {
        return Err(StoreError::RecordTooLarge {
            size: total,
            capacity,
        });
    }

    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&HEAD_MARKER);
    frame.push(RECORD_VERSION);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    let crc = crc16(&frame[HEAD_MARKER.len()..]);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&FOOT_MARKER);
    Ok(frame)
}

/// Validate a frame and decode the record it carries.
///
/// Trailing bytes after the foot marker are ignored, so a whole storage area can
/// be handed in.
pub fn decode(bytes: &[u8]) -> Result<ConfigRecord, StoreError> {
    if bytes.len() < FRAME_OVERHEAD || bytes[..HEAD_MARKER.len()] != HEAD_MARKER {
        return Err(StoreError::InvalidSignature);
    }

    let len_start = HEAD_MARKER.len() + 1;
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[len_start..len_start + 4]);
    let payload_len = u32::from_le_bytes(len_bytes) as usize;

    let payload_end = match HEADER_LEN.checked_add(payload_len) {
        Some(end) if end + TRAILER_LEN <= bytes.len() => end,
        _ => return Err(StoreError::InvalidSignature),
    };
    let foot_start = payload_end + 2;
    if bytes[foot_start..foot_start + FOOT_MARKER.len()] != FOOT_MARKER {
        return Err(StoreError::InvalidSignature);
    }

    let version = bytes[HEAD_MARKER.len()];
    if version != RECORD_VERSION {
        return Err(StoreError::UnsupportedVersion(version));
    }

    let stored_crc = u16::from_le_bytes([bytes[payload_end], bytes[payload_end + 1]]);
    let computed_crc = crc16(&bytes[HEAD_MARKER.len()..payload_end]);
    if stored_crc != computed_crc {
        return Err(StoreError::ChecksumMismatch {
            stored: stored_crc,
            computed: computed_crc,
        });
    }

    serde_json::from_slice(&bytes[HEADER_LEN..payload_end]).map_err(StoreError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ConfigRecord {
        let mut record = ConfigRecord::default();
        record.wifi.ssid = "Muspelheim".to_string();
        record.mqtt.server = "192.168.66.21".to_string();
        record.sensors[0].address = "28EE3F8C25160102".to_string();
        record.sensors[0].config.name = "Tank".to_string();
        record.sensors[0].config.max = Some(3.0);
        record
    }

    #[test]
    fn test_crc16_modbus_check_value() {
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_frame_markers_in_place() {
        let frame = encode(&sample_record(), 4096).unwrap();
        assert_eq!(&frame[..4], &HEAD_MARKER);
        assert_eq!(&frame[frame.len() - 4..], &FOOT_MARKER);
        assert_eq!(frame[4], RECORD_VERSION);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let record = sample_record();
        let mut area = encode(&record, 4096).unwrap();
        area.resize(4096, 0xFF);
        assert_eq!(decode(&area).unwrap(), record);
    }

    #[test]
    fn test_erased_storage_is_invalid_signature() {
        assert!(matches!(
            decode(&[0xFF; 256]),
            Err(StoreError::InvalidSignature)
        ));
        assert!(matches!(decode(&[]), Err(StoreError::InvalidSignature)));
    }

    #[test]
    fn test_wrong_foot_marker() {
        let mut frame = encode(&sample_record(), 4096).unwrap();
        let last = frame.len() - 1;
        frame[last] = b'X';
        assert!(matches!(decode(&frame), Err(StoreError::InvalidSignature)));
    }

    #[test]
    fn test_oversized_length_field() {
        let mut frame = encode(&sample_record(), 4096).unwrap();
        frame[5..9].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&frame), Err(StoreError::InvalidSignature)));
    }

    #[test]
    fn test_damaged_payload_fails_checksum() {
        let mut frame = encode(&sample_record(), 4096).unwrap();
        frame[HEADER_LEN + 3] ^= 0x01;
        assert!(matches!(
            decode(&frame),
            Err(StoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_version() {
        let mut frame = encode(&sample_record(), 4096).unwrap();
        frame[4] = 9;
        assert!(matches!(
            decode(&frame),
            Err(StoreError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_capacity_enforced() {
        assert!(matches!(
            encode(&sample_record(), 64),
            Err(StoreError::RecordTooLarge { capacity: 64, .. })
        ));
    }
}
