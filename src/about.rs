pub const PROBEMAP_DISPLAY_VERSION: &str = env!("PROBEMAP_DISPLAY_VERSION");
pub const PROBEMAP_BUILD_N: &str = env!("PROBEMAP_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "probemap {}\nBuild {}\nResolves ambiguous microarray probe-to-gene mappings",
        PROBEMAP_DISPLAY_VERSION, PROBEMAP_BUILD_N
    )
}
