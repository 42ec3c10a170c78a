//! Constants shared across the engine.

use std::time::Duration;

/// Application name, used for the originator string and env var prefixes.
pub const APP_NAME: &str = "streamsub";

/// Environment variable holding the path to a service credentials document.
pub const VCAP_SERVICES_ENV: &str = "VCAP_SERVICES";

/// Environment variable holding explicit credentials JSON.
pub const CREDENTIALS_ENV: &str = "STREAMSUB_CREDENTIALS";

/// Environment variable overriding the token exchange endpoint.
pub const TOKEN_URL_ENV: &str = "STREAMSUB_TOKEN_URL";

/// Environment variable overriding the cloud dashboard URL.
pub const DASHBOARD_URL_ENV: &str = "STREAMSUB_DASHBOARD_URL";

/// Key of the service array in a nested credentials document.
pub const SERVICE_ARRAY_KEY: &str = "streaming-analytics";

/// Default API-key token exchange endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// Grant type sent with the API key during token exchange.
pub const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Dashboard listing the service instances of the account.
pub const DEFAULT_DASHBOARD_URL: &str = "https://cloud.ibm.com/resources?groups=resource-instance";

/// Delay between build status queries.
pub const BUILD_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Delay between service state queries while waiting for a start.
pub const SERVICE_POLL_INTERVAL: Duration = Duration::from_secs(8);

/// Build output is forwarded to the message handler on every Nth poll tick.
pub const OUTPUT_NOTIFY_EVERY: u32 = 3;

/// Error codes signalling that the backing compute service is stopped.
pub const DORMANT_SERVICE_CODES: &[&str] = &["CDISB4090E"];

/// Descriptor file marking a toolkit directory.
pub const TOOLKIT_DESCRIPTOR: &str = "toolkit.xml";

/// Descriptor file marking an application directory.
pub const APP_DESCRIPTOR: &str = "info.xml";

/// Name of the synthesized build file.
pub const MAKEFILE_NAME: &str = "Makefile";

/// Archive directory holding bundled toolkits.
pub const TOOLKITS_ARCHIVE_DIR: &str = "toolkits";

/// Directory (next to the archive) where downloaded bundles are written.
pub const OUTPUT_DIR_NAME: &str = "output";

/// Root-level files never included in a source archive.
pub const DEFAULT_IGNORE_FILES: &[&str] = &[".git", ".project", ".classpath", "toolkit.xml", ".build*zip", "___bundle.zip"];

/// Root-level directories never included in a source archive.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
  ".git",
  "output",
  "doc",
  "samples",
  "opt/client",
  ".settings",
  ".apt_generated",
  ".build*",
  "___bundle",
];
