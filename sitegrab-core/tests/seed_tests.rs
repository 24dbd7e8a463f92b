// Tests for seed validation and output directory naming

use sitegrab_core::seed::{default_output_dir, validate_seed};
use sitegrab_engine::MirrorError;
use url::Url;

// ============================================================================
// Seed Validation Tests
// ============================================================================

#[test]
fn test_validate_seed_with_scheme() {
    let url = validate_seed("https://example.com/docs/").unwrap();
    assert_eq!(url.as_str(), "https://example.com/docs/");
}

#[test]
fn test_validate_seed_bare_host_gets_https() {
    let url = validate_seed("example.com").unwrap();
    assert_eq!(url.scheme(), "https");
    assert_eq!(url.host_str(), Some("example.com"));
}

#[test]
fn test_validate_seed_trims_whitespace() {
    let url = validate_seed("  http://example.com  ").unwrap();
    assert_eq!(url.as_str(), "http://example.com/");
}

#[test]
fn test_validate_seed_empty() {
    assert!(matches!(validate_seed("   "), Err(MirrorError::InvalidUrl(_))));
}

#[test]
fn test_validate_seed_unsupported_scheme() {
    assert!(matches!(
        validate_seed("ftp://example.com/"),
        Err(MirrorError::InvalidUrl(_))
    ));
}

#[test]
fn test_validate_seed_garbage() {
    assert!(validate_seed("not a valid url!!!").is_err());
}

// ============================================================================
// Output Directory Tests
// ============================================================================

#[test]
fn test_default_output_dir_strips_www() {
    let url = Url::parse("https://www.example.com/").unwrap();
    assert_eq!(default_output_dir(&url), "example_com");
}

#[test]
fn test_default_output_dir_collapses_separators() {
    let url = Url::parse("https://docs--api.example.co.uk/").unwrap();
    assert_eq!(default_output_dir(&url), "docs_api_example_co_uk");
}

#[test]
fn test_default_output_dir_ignores_port_and_path() {
    let url = Url::parse("http://localhost:8080/some/page").unwrap();
    assert_eq!(default_output_dir(&url), "localhost");
}
