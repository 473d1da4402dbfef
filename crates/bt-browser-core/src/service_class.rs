//! Well-known Bluetooth protocol and service-class identifiers.
//!
//! Every assigned Bluetooth identifier is a 16-bit short form substituted into
//! the Bluetooth base UUID `00000000-0000-1000-8000-00805F9B34FB`:
//!
//! ```text
//! 0000xxxx-0000-1000-8000-00805F9B34FB
//!     ^^^^ short form
//! ```
//!
//! Service discovery filters by one of these identifiers (the browser uses
//! [`RFCOMM_PROTOCOL`] by default, since only RFCOMM services can be opened as
//! `btspp://` streams), and each discovered service reports one of them.

use thiserror::Error;
use uuid::Uuid;

/// The Bluetooth base UUID as a 128-bit integer.
const BASE_UUID_U128: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// Builds a full identifier from a 16-bit short form.
pub const fn from_short(short: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID_U128 | ((short as u128) << 96))
}

/// Returns the 16-bit short form if `uuid` is derived from the base UUID.
pub fn short_form(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let short = (value >> 96) as u32;
    if short <= u16::MAX as u32 && value & !(0xFFFF_u128 << 96) == BASE_UUID_U128 {
        Some(short as u16)
    } else {
        None
    }
}

pub const BLUETOOTH_BASE: Uuid = from_short(0x0000);

// ── Protocols ─────────────────────────────────────────────────────────────────

pub const SDP_PROTOCOL: Uuid = from_short(0x0001);
pub const UDP_PROTOCOL: Uuid = from_short(0x0002);
pub const RFCOMM_PROTOCOL: Uuid = from_short(0x0003);
pub const TCP_PROTOCOL: Uuid = from_short(0x0004);
pub const TCS_BIN_PROTOCOL: Uuid = from_short(0x0005);
pub const TCS_AT_PROTOCOL: Uuid = from_short(0x0006);
pub const OBEX_PROTOCOL: Uuid = from_short(0x0008);
pub const IP_PROTOCOL: Uuid = from_short(0x0009);
pub const FTP_PROTOCOL: Uuid = from_short(0x000A);
pub const HTTP_PROTOCOL: Uuid = from_short(0x000C);
pub const WSP_PROTOCOL: Uuid = from_short(0x000E);
pub const BNEP_PROTOCOL: Uuid = from_short(0x000F);
pub const UPNP_PROTOCOL: Uuid = from_short(0x0010);
pub const HIDP_PROTOCOL: Uuid = from_short(0x0011);
pub const HARDCOPY_CONTROL_CHANNEL_PROTOCOL: Uuid = from_short(0x0012);
pub const HARDCOPY_DATA_CHANNEL_PROTOCOL: Uuid = from_short(0x0014);
pub const HARDCOPY_NOTIFICATION_PROTOCOL: Uuid = from_short(0x0016);
pub const AVCTP_PROTOCOL: Uuid = from_short(0x0017);
pub const AVDTP_PROTOCOL: Uuid = from_short(0x0019);
pub const CMTP_PROTOCOL: Uuid = from_short(0x001B);
pub const UDI_C_PLANE_PROTOCOL: Uuid = from_short(0x001D);
pub const L2CAP_PROTOCOL: Uuid = from_short(0x0100);

// ── Service classes ───────────────────────────────────────────────────────────

pub const SERVICE_DISCOVERY_SERVER: Uuid = from_short(0x1000);
pub const BROWSE_GROUP_DESCRIPTOR: Uuid = from_short(0x1001);
pub const PUBLIC_BROWSE_GROUP: Uuid = from_short(0x1002);
pub const SERIAL_PORT: Uuid = from_short(0x1101);
pub const LAN_ACCESS_USING_PPP: Uuid = from_short(0x1102);
pub const DIALUP_NETWORKING: Uuid = from_short(0x1103);
pub const IRMC_SYNC: Uuid = from_short(0x1104);
pub const OBEX_OBJECT_PUSH: Uuid = from_short(0x1105);
pub const OBEX_FILE_TRANSFER: Uuid = from_short(0x1106);
pub const IRMC_SYNC_COMMAND: Uuid = from_short(0x1107);
pub const HEADSET: Uuid = from_short(0x1108);
pub const CORDLESS_TELEPHONY: Uuid = from_short(0x1109);
pub const AUDIO_SOURCE: Uuid = from_short(0x110A);
pub const AUDIO_SINK: Uuid = from_short(0x110B);
pub const AV_REMOTE_CONTROL_TARGET: Uuid = from_short(0x110C);
pub const ADVANCED_AUDIO_DISTRIBUTION: Uuid = from_short(0x110D);
pub const AV_REMOTE_CONTROL: Uuid = from_short(0x110E);
pub const VIDEO_CONFERENCING: Uuid = from_short(0x110F);
pub const INTERCOM: Uuid = from_short(0x1110);
pub const FAX: Uuid = from_short(0x1111);
pub const HEADSET_AUDIO_GATEWAY: Uuid = from_short(0x1112);
pub const WAP: Uuid = from_short(0x1113);
pub const WAP_CLIENT: Uuid = from_short(0x1114);
pub const PANU: Uuid = from_short(0x1115);
pub const NAP: Uuid = from_short(0x1116);
pub const GN: Uuid = from_short(0x1117);
pub const DIRECT_PRINTING: Uuid = from_short(0x1118);
pub const REFERENCE_PRINTING: Uuid = from_short(0x1119);
pub const IMAGING: Uuid = from_short(0x111A);
pub const IMAGING_RESPONDER: Uuid = from_short(0x111B);
pub const IMAGING_AUTOMATIC_ARCHIVE: Uuid = from_short(0x111C);
pub const IMAGING_REFERENCED_OBJECTS: Uuid = from_short(0x111D);
pub const HANDSFREE: Uuid = from_short(0x111E);
pub const HANDSFREE_AUDIO_GATEWAY: Uuid = from_short(0x111F);
pub const DIRECT_PRINTING_REFERENCE_OBJECTS: Uuid = from_short(0x1120);
pub const REFLECTED_UI: Uuid = from_short(0x1121);
pub const BASIC_PRINTING: Uuid = from_short(0x1122);
pub const PRINTING_STATUS: Uuid = from_short(0x1123);
pub const HUMAN_INTERFACE_DEVICE: Uuid = from_short(0x1124);
pub const HARDCOPY_CABLE_REPLACEMENT: Uuid = from_short(0x1125);
pub const HCR_PRINT: Uuid = from_short(0x1126);
pub const HCR_SCAN: Uuid = from_short(0x1127);
pub const COMMON_ISDN_ACCESS: Uuid = from_short(0x1128);
pub const VIDEO_CONFERENCING_GW: Uuid = from_short(0x1129);
pub const UDI_MT: Uuid = from_short(0x112A);
pub const UDI_TA: Uuid = from_short(0x112B);
pub const AUDIO_VIDEO: Uuid = from_short(0x112C);
pub const PNP_INFORMATION: Uuid = from_short(0x1200);
pub const GENERIC_NETWORKING: Uuid = from_short(0x1201);
pub const GENERIC_FILE_TRANSFER: Uuid = from_short(0x1202);
pub const GENERIC_AUDIO: Uuid = from_short(0x1203);
pub const GENERIC_TELEPHONY: Uuid = from_short(0x1204);

/// Lookup table of (identifier, lowercase name) pairs.
///
/// Names double as the accepted spellings of `--service-filter` style
/// configuration values.
const WELL_KNOWN: &[(Uuid, &str)] = &[
    (SDP_PROTOCOL, "sdp"),
    (UDP_PROTOCOL, "udp"),
    (RFCOMM_PROTOCOL, "rfcomm"),
    (TCP_PROTOCOL, "tcp"),
    (TCS_BIN_PROTOCOL, "tcs-bin"),
    (TCS_AT_PROTOCOL, "tcs-at"),
    (OBEX_PROTOCOL, "obex"),
    (IP_PROTOCOL, "ip"),
    (FTP_PROTOCOL, "ftp"),
    (HTTP_PROTOCOL, "http"),
    (WSP_PROTOCOL, "wsp"),
    (BNEP_PROTOCOL, "bnep"),
    (UPNP_PROTOCOL, "upnp"),
    (HIDP_PROTOCOL, "hidp"),
    (HARDCOPY_CONTROL_CHANNEL_PROTOCOL, "hcrp-control"),
    (HARDCOPY_DATA_CHANNEL_PROTOCOL, "hcrp-data"),
    (HARDCOPY_NOTIFICATION_PROTOCOL, "hcrp-notification"),
    (AVCTP_PROTOCOL, "avctp"),
    (AVDTP_PROTOCOL, "avdtp"),
    (CMTP_PROTOCOL, "cmtp"),
    (UDI_C_PLANE_PROTOCOL, "udi-c-plane"),
    (L2CAP_PROTOCOL, "l2cap"),
    (SERVICE_DISCOVERY_SERVER, "service-discovery-server"),
    (BROWSE_GROUP_DESCRIPTOR, "browse-group-descriptor"),
    (PUBLIC_BROWSE_GROUP, "public-browse-group"),
    (SERIAL_PORT, "serial-port"),
    (LAN_ACCESS_USING_PPP, "lan-access-ppp"),
    (DIALUP_NETWORKING, "dialup-networking"),
    (IRMC_SYNC, "irmc-sync"),
    (OBEX_OBJECT_PUSH, "obex-object-push"),
    (OBEX_FILE_TRANSFER, "obex-file-transfer"),
    (IRMC_SYNC_COMMAND, "irmc-sync-command"),
    (HEADSET, "headset"),
    (CORDLESS_TELEPHONY, "cordless-telephony"),
    (AUDIO_SOURCE, "audio-source"),
    (AUDIO_SINK, "audio-sink"),
    (AV_REMOTE_CONTROL_TARGET, "av-remote-control-target"),
    (ADVANCED_AUDIO_DISTRIBUTION, "advanced-audio-distribution"),
    (AV_REMOTE_CONTROL, "av-remote-control"),
    (VIDEO_CONFERENCING, "video-conferencing"),
    (INTERCOM, "intercom"),
    (FAX, "fax"),
    (HEADSET_AUDIO_GATEWAY, "headset-audio-gateway"),
    (WAP, "wap"),
    (WAP_CLIENT, "wap-client"),
    (PANU, "panu"),
    (NAP, "nap"),
    (GN, "gn"),
    (DIRECT_PRINTING, "direct-printing"),
    (REFERENCE_PRINTING, "reference-printing"),
    (IMAGING, "imaging"),
    (IMAGING_RESPONDER, "imaging-responder"),
    (IMAGING_AUTOMATIC_ARCHIVE, "imaging-automatic-archive"),
    (IMAGING_REFERENCED_OBJECTS, "imaging-referenced-objects"),
    (HANDSFREE, "handsfree"),
    (HANDSFREE_AUDIO_GATEWAY, "handsfree-audio-gateway"),
    (DIRECT_PRINTING_REFERENCE_OBJECTS, "direct-printing-reference-objects"),
    (REFLECTED_UI, "reflected-ui"),
    (BASIC_PRINTING, "basic-printing"),
    (PRINTING_STATUS, "printing-status"),
    (HUMAN_INTERFACE_DEVICE, "human-interface-device"),
    (HARDCOPY_CABLE_REPLACEMENT, "hardcopy-cable-replacement"),
    (HCR_PRINT, "hcr-print"),
    (HCR_SCAN, "hcr-scan"),
    (COMMON_ISDN_ACCESS, "common-isdn-access"),
    (VIDEO_CONFERENCING_GW, "video-conferencing-gw"),
    (UDI_MT, "udi-mt"),
    (UDI_TA, "udi-ta"),
    (AUDIO_VIDEO, "audio-video"),
    (PNP_INFORMATION, "pnp-information"),
    (GENERIC_NETWORKING, "generic-networking"),
    (GENERIC_FILE_TRANSFER, "generic-file-transfer"),
    (GENERIC_AUDIO, "generic-audio"),
    (GENERIC_TELEPHONY, "generic-telephony"),
];

/// Returns the lowercase name of a well-known identifier.
pub fn well_known_name(uuid: &Uuid) -> Option<&'static str> {
    WELL_KNOWN
        .iter()
        .find(|(known, _)| known == uuid)
        .map(|(_, name)| *name)
}

/// Error returned by [`parse_service_filter`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown service class {0:?}: expected a well-known name or a UUID")]
pub struct UnknownServiceClass(pub String);

/// Parses a service-class filter given either as a well-known name
/// (case-insensitive, e.g. `rfcomm`) or as a full UUID string.
///
/// # Errors
///
/// Returns [`UnknownServiceClass`] when the input is neither.
pub fn parse_service_filter(input: &str) -> Result<Uuid, UnknownServiceClass> {
    let wanted = input.trim().to_ascii_lowercase();
    if let Some((uuid, _)) = WELL_KNOWN.iter().find(|(_, name)| *name == wanted) {
        return Ok(*uuid);
    }
    Uuid::parse_str(&wanted).map_err(|_| UnknownServiceClass(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfcomm_matches_assigned_number() {
        assert_eq!(
            RFCOMM_PROTOCOL.to_string(),
            "00000003-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_serial_port_matches_assigned_number() {
        assert_eq!(
            SERIAL_PORT.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_short_form_recovers_16_bit_value() {
        assert_eq!(short_form(&L2CAP_PROTOCOL), Some(0x0100));
        assert_eq!(short_form(&GENERIC_TELEPHONY), Some(0x1204));
        assert_eq!(short_form(&BLUETOOTH_BASE), Some(0));
    }

    #[test]
    fn test_short_form_is_none_for_vendor_uuid() {
        let vendor = Uuid::from_u128(0xa1b2c3d4_e5f6_7890_abcd_ef1234567890);
        assert_eq!(short_form(&vendor), None);
    }

    #[test]
    fn test_well_known_name_lookup() {
        assert_eq!(well_known_name(&OBEX_OBJECT_PUSH), Some("obex-object-push"));
        assert_eq!(well_known_name(&Uuid::nil()), None);
    }

    #[test]
    fn test_parse_service_filter_accepts_names_and_uuids() {
        assert_eq!(parse_service_filter("RFCOMM"), Ok(RFCOMM_PROTOCOL));
        assert_eq!(
            parse_service_filter("00001101-0000-1000-8000-00805F9B34FB"),
            Ok(SERIAL_PORT)
        );
        assert!(parse_service_filter("carrier-pigeon").is_err());
    }
}
