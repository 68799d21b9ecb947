//! Progress and state-update payloads carried on the broadcast streams.

use serde::{Deserialize, Serialize};

/// Progress of a device inventory sync operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSyncProgress {
    /// Identifies the sync operation; scopes the per-operation group stream.
    pub sync_id: String,
    pub total: u32,
    pub completed: u32,
    pub message: Option<String>,
}

/// Progress of a device pairing operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePairingProgress {
    /// Identifies the pairing operation; scopes the per-operation group stream.
    pub pairing_id: String,
    /// Seconds remaining in the pairing window.
    pub remaining_seconds: u32,
    /// Device id of a newly discovered device, once pairing succeeds.
    pub discovered_device_id: Option<String>,
}

/// A lightweight device state change (online/offline, battery, link quality).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateUpdate {
    pub device_id: String,
    pub online: bool,
    pub battery_percent: Option<u8>,
    pub link_quality: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_progress_serializes_camel_case() {
        let progress = DeviceSyncProgress {
            sync_id: "sync-1".to_string(),
            total: 10,
            completed: 3,
            message: None,
        };
        let json = serde_json::to_value(&progress).expect("serialize");
        assert!(json.get("syncId").is_some());
        assert!(json.get("sync_id").is_none());
    }
}
