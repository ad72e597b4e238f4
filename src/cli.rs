use clap::Parser;
use std::ffi::OsString;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "arcbrowse")]
#[command(version)]
#[command(about = "Browse a directory tree and the archives inside it over HTTP", long_about = None)]
#[command(after_help = "Examples:\n  \
  arcbrowse --root ~/comics                  serve ~/comics on 127.0.0.1:8080\n  \
  arcbrowse --root . --bind 0.0.0.0 -p 9000  serve the current directory to the LAN\n\n\
Paths use '//' to step into an archive, e.g. /list/vol1.zip//chapter2/")]
pub struct Cli {
    /// Root directory to serve
    #[arg(long, env = "ARCBROWSE_ROOT", value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Address to bind
    #[arg(long, env = "ARCBROWSE_BIND", default_value = "127.0.0.1")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(short = 'p', long, env = "ARCBROWSE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Landing page served at /
    #[arg(long, env = "ARCBROWSE_INDEX", value_name = "FILE", default_value = "index.html")]
    pub index: PathBuf,

    /// Maximum number of archives kept open
    #[arg(long, env = "ARCBROWSE_MAX_OPEN_ARCHIVES", default_value = "64")]
    pub max_open_archives: NonZeroUsize,

    /// 7z program used to read 7z archives
    #[arg(long, env = "ARCBROWSE_SEVEN_ZIP", value_name = "PROGRAM", default_value = "7z")]
    pub seven_zip: OsString,

    /// Match image extensions case-sensitively in /listimg/
    #[arg(long)]
    pub case_sensitive_images: bool,
}

impl Cli {
    /// Address the server listens on.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["arcbrowse"]);
        assert_eq!(cli.socket_addr(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cli.max_open_archives.get(), 64);
        assert_eq!(cli.seven_zip, "7z");
        assert!(!cli.case_sensitive_images);
    }

    #[test]
    fn overrides() {
        let cli = Cli::parse_from([
            "arcbrowse",
            "--root",
            "/data",
            "--bind",
            "0.0.0.0",
            "-p",
            "9000",
            "--max-open-archives",
            "8",
            "--case-sensitive-images",
        ]);
        assert_eq!(cli.root, PathBuf::from("/data"));
        assert_eq!(cli.socket_addr(), "0.0.0.0:9000".parse().unwrap());
        assert_eq!(cli.max_open_archives.get(), 8);
        assert!(cli.case_sensitive_images);
    }

    #[test]
    fn zero_archives_is_rejected() {
        assert!(Cli::try_parse_from(["arcbrowse", "--max-open-archives", "0"]).is_err());
    }
}
