use crate::CLAP_STYLING;
use clap::{arg, command};
use sitegrab::handlers::parse_delay_arg;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitegrab")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitegrab")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("download")
                .about(
                    "Download a complete static copy of a website. Same-domain pages are \
                crawled, assets saved and links rewritten for offline browsing.",
                )
                .arg(
                    arg!([URL])
                        .required(false)
                        .help("Website URL to download (prompted for when omitted)"),
                )
                .arg(
                    arg!([OUTPUT_DIR])
                        .required(false)
                        .help("Output directory (default: derived from the URL's host)"),
                )
                .arg(
                    arg!(-d --"delay" <SECONDS>)
                        .required(false)
                        .help("Delay between page requests in seconds")
                        .value_parser(parse_delay_arg)
                        .default_value("1.0"),
                )
                .arg(
                    arg!(-i --"interactive")
                        .required(false)
                        .help("Prompt for the URL, output directory and delay")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"max-pages" <NUM_PAGES>)
                        .required(false)
                        .help("Stop after this many pages have been saved")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("30"),
                )
                .arg(
                    arg!(--"user-agent" <STRING>)
                        .required(false)
                        .help("User-Agent header sent with every request"),
                )
                .arg(
                    arg!(-y --"yes")
                        .required(false)
                        .help("Overwrite an existing output directory without asking")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"ignore-robots")
                        .required(false)
                        .help("Do not consult the site's robots.txt")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the final summary as JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_defaults() {
        let matches = command_argument_builder()
            .try_get_matches_from(["sitegrab", "download", "example.com"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "download");
        assert_eq!(sub.get_one::<String>("URL").unwrap(), "example.com");
        assert!(sub.get_one::<String>("OUTPUT_DIR").is_none());
        assert_eq!(*sub.get_one::<f64>("delay").unwrap(), 1.0);
        assert_eq!(*sub.get_one::<u64>("timeout").unwrap(), 30);
        assert!(!sub.get_flag("interactive"));
    }

    #[test]
    fn test_download_all_flags() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "sitegrab",
                "-q",
                "download",
                "https://example.com",
                "./mirror",
                "--delay",
                "0.5",
                "--max-pages",
                "20",
                "--ignore-robots",
                "--json",
                "-y",
            ])
            .unwrap();
        assert!(matches.get_flag("quiet"));
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("OUTPUT_DIR").unwrap(), "./mirror");
        assert_eq!(*sub.get_one::<f64>("delay").unwrap(), 0.5);
        assert_eq!(*sub.get_one::<usize>("max-pages").unwrap(), 20);
        assert!(sub.get_flag("ignore-robots"));
        assert!(sub.get_flag("json"));
        assert!(sub.get_flag("yes"));
    }

    #[test]
    fn test_negative_delay_is_rejected() {
        let result = command_argument_builder().try_get_matches_from([
            "sitegrab",
            "download",
            "example.com",
            "--delay=-1",
        ]);
        assert!(result.is_err());
    }
}
