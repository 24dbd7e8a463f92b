pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    DownloadOutcome, DownloadSettings, confirm_overwrite, entry_point, handle_download,
    is_affirmative, parse_delay, parse_delay_arg, print_outcome, prompt_settings, prompt_url,
    resolve_output_dir,
};

// Re-export mirror functionality from sitegrab-core
pub use sitegrab_core::{
    MirrorOptions, MirrorProgressCallback, default_output_dir, execute_mirror,
    extract_url_path, generate_summary_report, validate_seed,
};
