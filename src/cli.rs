use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docpack")]
#[command(version)]
#[command(about = "Pack and unpack manifest-driven document archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  docpack create work/Document.xml Part.FCStd   pack a document and the files it references\n  \
  docpack extract Part.FCStd -d work            unpack a document archive into work/\n  \
  docpack list -v Part.FCStd                    list entries with sizes and dates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract every entry of an archive
    Extract {
        /// Archive to extract
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Extract files into exdir (created if missing)
        #[arg(short = 'd', value_name = "DIR", default_value = ".")]
        extract_dir: PathBuf,
    },

    /// Create an archive from a manifest and the files it references
    Create {
        /// Primary manifest, or the directory holding Document.xml
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Archive to write (overwritten if it exists)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// DEFLATE level, 0 (fastest) to 9 (smallest)
        #[arg(long, value_name = "N", default_value_t = 6,
              value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
    },

    /// List archive entries
    List {
        /// Archive to list
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// List verbosely (sizes, ratio, dates)
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Print the files a manifest pulls into an archive
    Files {
        /// Primary manifest, or the directory holding Document.xml
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },

    /// Recompress an archive into a new file
    Rewrite {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        #[arg(value_name = "TARGET")]
        target: PathBuf,
    },
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }
}
