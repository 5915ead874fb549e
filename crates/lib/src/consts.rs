/// Application name used for directory layout and environment variable prefixes.
pub const APP_NAME: &str = "vpack";

/// Environment variable overriding the pipeline work directory.
pub const WORK_DIR_ENV: &str = "VPACK_WORK_DIR";

/// Environment variables consulted by [`crate::identity::EnvIdentity`].
pub const USER_ID_ENV: &str = "VPACK_USER_ID";
pub const NICKNAME_ENV: &str = "VPACK_NICKNAME";

/// Catalog file the external bundler must produce for a platform build to count as successful.
pub const DEFAULT_CATALOG_FILE: &str = "catalog_v2.json";

/// Default location of the package manifest consulted for build prerequisites.
pub const DEFAULT_PACKAGES_MANIFEST: &str = "Packages/manifest.json";

/// Suffix for the intermediate directory used while relocating bundler output.
pub const RELOCATE_SUFFIX: &str = "relocating";

/// Environment variable overriding the local test directory.
pub const LOCAL_TEST_DIR_ENV: &str = "VPACK_LOCAL_TEST_DIR";

/// Directory under the system temp dir that a running client loads local test builds from.
pub const LOCAL_TEST_DIR_NAME: &str = "VivenSDK";

/// Player version stamped on local test builds; the bundler names its catalog after it.
pub const LOCAL_TEST_PLAYER_VERSION: &str = "0.1";

/// Touched after a local test build so a running client reloads.
pub const RELOAD_TRIGGER_FILE: &str = "reload_trigger.txt";
