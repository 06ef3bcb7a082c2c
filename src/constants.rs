/// Column names of the Powerbox device export.
/// These keep the type rules, consistency checks and tests in agreement.

// Timestamp
pub const TIMESTAMP: &str = "Timestamp";

// Boolean flags
pub const SYSTEM_ON: &str = "System ON";
pub const SYSTEM_FAULT_ALERTS: &str = "System Fault Alerts";
pub const BATTERY_LOW_FLAG: &str = "Battery Low Flag";
pub const BATTERY_FULL_FLAG: &str = "Battery Full Flag";

// Measurements
pub const TEMPERATURE: &str = "Temperature (°C)";
pub const SOLAR_OUTPUT: &str = "Solar Panels Energy Output (W)";
pub const POWER_CONSUMPTION: &str = "Power Consumption (kW)";
pub const ENERGY_STORED: &str = "Energy Stored in Batteries (kWh)";
pub const INVERTER_EFFICIENCY: &str = "Inverter Efficiency (%)";
pub const SYSTEM_LOAD: &str = "System Load (kW)";
pub const VOLTAGE: &str = "Voltage (V)";
pub const CURRENT: &str = "Current (A)";
pub const POWER_FACTOR: &str = "Power Factor";
pub const DUST_ACCUMULATION: &str = "Dust and Dirt Accumulation (g/m²)";
pub const BATTERY_CAPACITY: &str = "Battery Capacity (Wh)";
pub const INVERTER_CAPACITY: &str = "Inverter Capacity (kW)";
pub const DEPTH_OF_DISCHARGE: &str = "Depth of Discharge";

// Categories
pub const CUSTOMER_PROFILE: &str = "Customer Profile";
pub const SOLAR_PANELS_TYPE: &str = "Solar Panels Type";
pub const SOLAR_PANELS_CONFIGURATION: &str = "Solar Panels Configuration";
pub const BATTERY_TECHNOLOGY: &str = "Battery Technology";

// Coordinates, split into LATITUDE/LONGITUDE during normalization
pub const USER_COORDINATES: &str = "User Coordinates";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";

/// Measurements that are physically non-negative.
pub const NON_NEGATIVE_COLUMNS: [&str; 6] = [
    SOLAR_OUTPUT,
    POWER_CONSUMPTION,
    ENERGY_STORED,
    SYSTEM_LOAD,
    BATTERY_CAPACITY,
    INVERTER_CAPACITY,
];

/// Full raw export header in device order.
pub const POWERBOX_COLUMNS: [&str; 23] = [
    TIMESTAMP,
    SYSTEM_ON,
    TEMPERATURE,
    SOLAR_OUTPUT,
    POWER_CONSUMPTION,
    ENERGY_STORED,
    INVERTER_EFFICIENCY,
    SYSTEM_LOAD,
    SYSTEM_FAULT_ALERTS,
    VOLTAGE,
    CURRENT,
    POWER_FACTOR,
    DUST_ACCUMULATION,
    BATTERY_LOW_FLAG,
    BATTERY_FULL_FLAG,
    CUSTOMER_PROFILE,
    USER_COORDINATES,
    SOLAR_PANELS_TYPE,
    SOLAR_PANELS_CONFIGURATION,
    DEPTH_OF_DISCHARGE,
    BATTERY_CAPACITY,
    INVERTER_CAPACITY,
    BATTERY_TECHNOLOGY,
];

// File handling
pub const CSV_EXTENSION: &str = "csv";
pub const SPREADSHEET_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "ods"];
pub const HASH_CHUNK_SIZE: usize = 4096;
pub const RENAME_DATE_FORMAT: &str = "%Y%m%d";
pub const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const INDEX_DIR_NAME: &str = ".index";
pub const INDEX_DB_NAME: &str = "digests.db";

// Defaults
pub const DEFAULT_MISSINGNESS_THRESHOLD: f64 = 0.5;
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_CONFIG_FILE: &str = "powerbox.toml";
pub const DEFAULT_SCHEMA_FILE: &str = "powerbox_schema.csv";
pub const DEFAULT_ARCHIVE_DIR: &str = "archive";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_STORE: &str = "Clean_data/solar_system.db";
pub const DEFAULT_TABLE: &str = "cleaned_solar_data";
pub const DEFAULT_FLAT_FILE: &str = "Clean_data/cleaned_solar_data.csv";

/// Whether `extension` (without the dot, any case) names a supported input format.
pub fn is_supported_extension(extension: &str) -> bool {
    let ext = extension.to_ascii_lowercase();
    ext == CSV_EXTENSION || SPREADSHEET_EXTENSIONS.contains(&ext.as_str())
}
