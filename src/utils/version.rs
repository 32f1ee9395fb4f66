const DEVELOPMENT_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-dev");

/// Release pipelines stamp `CREDENCE_RELEASE_VERSION`; local builds report `<pkg>-dev`.
pub fn build_version() -> &'static str {
    match option_env!("CREDENCE_RELEASE_VERSION") {
        Some(version) if !version.trim().is_empty() => version,
        _ => DEVELOPMENT_VERSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_never_blank() {
        assert!(!build_version().trim().is_empty());
    }
}
