//! Contract API Version
//!
//! The plugin contract version is read from Cargo.toml at build time
//! (`package.metadata.plugbound.api_version`, format YYYYMMDD) so the same
//! source always yields the same version.

include!(concat!(env!("OUT_DIR"), "/version_api.rs"));

/// The contract API version spoken by this host build
pub fn api_version() -> u32 {
    CONTRACT_API_VERSION
}

/// Render a YYYYMMDD version as YYYY-MM-DD.
///
/// Values outside the eight-digit range are rendered as plain numbers.
pub fn version_date_string(version: u32) -> String {
    if (10_000_000..=99_999_999).contains(&version) {
        let year = version / 10000;
        let month = (version % 10000) / 100;
        let day = version % 100;
        format!("{year:04}-{month:02}-{day:02}")
    } else {
        version.to_string()
    }
}
