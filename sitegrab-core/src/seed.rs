use sitegrab_engine::MirrorError;
use url::Url;

/// Validate a user-supplied seed, prefixing `https://` when no scheme is given.
pub fn validate_seed(input: &str) -> Result<Url, MirrorError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(MirrorError::InvalidUrl("No URL provided".to_string()));
    }

    let candidate = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| MirrorError::InvalidUrl(format!("{}: {}", input, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(MirrorError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            input,
            url.scheme()
        )));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(MirrorError::InvalidUrl(format!("{}: missing host", input))),
    }
}

/// Directory name derived from the seed host, e.g. `www.example.com` -> `example_com`.
pub fn default_output_dir(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);

    let mut name = String::with_capacity(host.len());
    for c in host.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && name.ends_with('_') {
            continue;
        }
        name.push(c);
    }

    let name = name.trim_matches('_');
    if name.is_empty() {
        "site".to_string()
    } else {
        name.to_string()
    }
}
