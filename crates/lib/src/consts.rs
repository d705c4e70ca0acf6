pub const APP_NAME: &str = "debrig";

/// Metadata file written to the sandbox root right after driver creation.
pub const BUILD_METADATA_FILENAME: &str = "build.json";

/// Fixed mount point of the sandbox root inside container sandboxes.
pub const SANDBOX_MOUNT_POINT: &str = "/debrig";

/// Environment variable overriding the configured build root.
pub const BUILD_ROOT_ENV: &str = "DEBRIG_BUILD_ROOT";
