pub mod mirror;
pub mod report;
pub mod seed;

use colored::Colorize;

pub use mirror::{MirrorOptions, MirrorProgressCallback, execute_mirror, extract_url_path};
pub use report::{ReportFormat, generate_summary_report, render_report};
pub use seed::{default_output_dir, validate_seed};

const BANNER: &str = r#"
     _ _                       _
 ___(_) |_ ___  __ _ _ __ __ _| |__
/ __| | __/ _ \/ _` | '__/ _` | '_ \
\__ \ | ||  __/ (_| | | | (_| | |_) |
|___/_|\__\___|\__, |_|  \__,_|_.__/
               |___/
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "offline website mirror".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}
