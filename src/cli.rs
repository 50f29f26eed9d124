use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "comic_shelf", version)]
#[command(about = "Catalog, inspect and read CBZ, CBR and PDF comics")]
pub struct Args {
    /// Progress store to read and write.
    #[arg(long, global = true)]
    pub progress_file: Option<PathBuf>,

    /// Only count pages while scanning, skip cover extraction.
    #[arg(long, global = true)]
    pub no_covers: bool,

    /// Scan subdirectories too.
    #[arg(long, global = true)]
    pub recursive: bool,

    /// More log output; repeat for debug messages.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the comics in a directory with their reading progress.
    Scan { dir: PathBuf },

    /// Pick a comic from a directory and page through it.
    Read { dir: PathBuf },

    /// Show the format and ordered pages of one comic.
    Pages { file: PathBuf },

    /// Write a single page to disk.
    Extract {
        file: PathBuf,
        /// 1-based page number or in-archive entry name.
        page: String,
        /// Output file, defaults to the entry's file name.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "comic_shelf",
            "scan",
            "/comics",
            "--no-covers",
            "-vv",
            "--progress-file",
            "p.toml",
        ])
        .unwrap();
        assert!(args.no_covers);
        assert!(!args.recursive);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.progress_file, Some(PathBuf::from("p.toml")));
        assert!(matches!(args.command, Command::Scan { ref dir } if dir == &PathBuf::from("/comics")));
    }

    #[test]
    fn extract_arguments() {
        let args =
            Args::try_parse_from(["comic_shelf", "extract", "a.cbz", "3", "-o", "out.png"]).unwrap();
        match args.command {
            Command::Extract { file, page, output } => {
                assert_eq!(file, PathBuf::from("a.cbz"));
                assert_eq!(page, "3");
                assert_eq!(output, Some(PathBuf::from("out.png")));
            }
            _ => panic!("expected extract"),
        }
    }
}
