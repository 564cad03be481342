use uuid::Uuid;

/**
 * How long (seconds) a scan runs before the transport stops it on its own.
 */
pub const SCAN_SECONDS: u64 = 5;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) connecting, retrieving services and subscribing may take together.
 */
pub const CONNECT_DEADLINE: u64 = 10000;

/**
 * Number of telemetry samples kept in the rolling gait window.
 */
pub const GAIT_WINDOW: usize = 10;

/**
 * The Bluetooth BLE service exposed by the smart stick, 1234abcd-0000-1000-8000-00805f9b34fb
 */
pub const STICK_SERVICE_UUID: Uuid = Uuid::from_u128(0x1234abcd_0000_1000_8000_00805f9b34fb);

/**
 * The characteristic that accepts feature commands and pushes gait notifications,
 * abcd1234-0000-1000-8000-00805f9b34fb. The firmware uses one characteristic for both directions.
 */
pub const STICK_DATA_UUID: Uuid = Uuid::from_u128(0xabcd1234_0000_1000_8000_00805f9b34fb);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_have_the_advertised_form() {
        assert_eq!(STICK_SERVICE_UUID.to_string(), "1234abcd-0000-1000-8000-00805f9b34fb");
        assert_eq!(STICK_DATA_UUID.to_string(), "abcd1234-0000-1000-8000-00805f9b34fb");
    }
}
