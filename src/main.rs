fn main() {
    #[cfg(feature = "cli")]
    pngdemux::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("pngdemux: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
