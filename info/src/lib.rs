//! Build metadata shared by the server, the logger and the helper binaries.

pub const NAME: &str = "risk-backend";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The VCS revision, injected by the build pipeline.
pub const REVISION: Option<&str> = option_env!("BACKEND_REVISION");

pub const BUILD_TIMESTAMP: Option<&str> = option_env!("BUILD_TIMESTAMP");

/// Returns the `User-Agent` sent on outbound requests.
///
/// ```
/// assert!(info::user_agent().starts_with("risk-backend/"));
/// ```
pub fn user_agent() -> String {
    match REVISION {
        Some(revision) => format!("{}/{} ({})", NAME, VERSION, revision),
        None => format!("{}/{}", NAME, VERSION),
    }
}
