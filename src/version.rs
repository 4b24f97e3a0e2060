// Centralized version information

// Cargo package version from Cargo.toml
pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

// Full version string including the target it was built for
pub fn full_version() -> String {
    format!("v{} ({})", CARGO_VERSION, std::env::consts::OS)
}
