use crate::config::PlcKind;

/// Default (local, remote) TSAP pair for the ISO connection request.
///
/// Rack and slot only matter for the 300/400/1200/1500 families, where they
/// select the remote TSAP low byte.
pub fn default_tsap_pair(plc: PlcKind, rack: u8, slot: u8) -> (u16, u16) {
    match plc {
        PlcKind::S200 => (0x4D57, 0x4D57),
        PlcKind::S200Smart => (0x1000, 0x0300),
        PlcKind::S300 | PlcKind::S400 | PlcKind::S1200 | PlcKind::S1500 => {
            (0x0100, 0x0300 + 0x20 * rack as u16 + slot as u16)
        }
        PlcKind::Sinumerik828d => (0x0400, 0x0D04),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsap_selection_per_plc_kind() {
        assert_eq!(default_tsap_pair(PlcKind::S200, 0, 0), (0x4D57, 0x4D57));
        assert_eq!(default_tsap_pair(PlcKind::S200Smart, 0, 0), (0x1000, 0x0300));
        assert_eq!(default_tsap_pair(PlcKind::S1500, 0, 0), (0x0100, 0x0300));
        assert_eq!(default_tsap_pair(PlcKind::S300, 0, 2), (0x0100, 0x0302));
        assert_eq!(default_tsap_pair(PlcKind::S400, 1, 3), (0x0100, 0x0323));
        assert_eq!(
            default_tsap_pair(PlcKind::Sinumerik828d, 0, 0),
            (0x0400, 0x0D04)
        );
    }
}
