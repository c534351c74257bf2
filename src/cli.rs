use clap::{Args, Parser, Subcommand};
use mediaslots::manifest::{AspectRatio, ClipSeconds, MediaKind};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mediaslots", version)]
#[command(about = "Generate, curate and resolve media variants for site slots", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $MEDIASLOTS_CONFIG or config/mediaslots.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate image variants for a slot
    Image(GenerateArgs),
    /// Generate video variants for a slot
    Video(VideoArgs),
    /// Run the staging endpoints used by the preview bar
    Serve(ServeArgs),
    /// Print the path page rendering would use for a slot
    Resolve(ResolveArgs),
    /// List slots with file counts and selections
    Slots(SlotsArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Slot name, e.g. `hero` or `services/ai`
    #[arg(long)]
    pub slot: String,

    /// Prompt for the generated variants
    #[arg(long)]
    pub prompt: String,

    /// Number of variants (default from config)
    #[arg(long)]
    pub count: Option<u32>,

    /// Aspect ratio: 16:9, 4:3, 1:1 or 9:16
    #[arg(long)]
    pub aspect: Option<AspectRatio>,

    /// Base filename instead of the slot-derived one
    #[arg(long)]
    pub name: Option<String>,

    /// Output directory below the public dir
    #[arg(long = "out")]
    pub out_dir: Option<String>,
}

#[derive(Args, Debug)]
pub struct VideoArgs {
    #[command(flatten)]
    pub common: GenerateArgs,

    /// Clip length in seconds: 5, 6 or 8
    #[arg(long)]
    pub duration: Option<ClipSeconds>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the staging server to (default from config)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[arg(long, default_value = "image")]
    pub kind: MediaKind,

    #[arg(long)]
    pub slot: String,

    /// Path printed when nothing resolves
    #[arg(long)]
    pub fallback: Option<String>,

    /// Treat `--slot` as a base name with `-v<N>` redesigns
    #[arg(long)]
    pub versioned: bool,
}

#[derive(Args, Debug)]
pub struct SlotsArgs {
    #[arg(long, default_value = "image")]
    pub kind: MediaKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_command() {
        let cli = Cli::try_parse_from([
            "mediaslots",
            "video",
            "--slot",
            "hero",
            "--prompt",
            "slow pan",
            "--aspect",
            "9:16",
            "--duration",
            "6",
        ])
        .unwrap();

        match cli.command {
            Commands::Video(args) => {
                assert_eq!(args.common.slot, "hero");
                assert_eq!(args.common.prompt, "slow pan");
                assert_eq!(args.common.aspect, Some(AspectRatio::Portrait));
                assert_eq!(args.duration.map(|d| d.get()), Some(6));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_aspect() {
        assert!(
            Cli::try_parse_from([
                "mediaslots",
                "image",
                "--slot",
                "hero",
                "--prompt",
                "gradient",
                "--aspect",
                "3:2",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_prompt_required() {
        let err = Cli::try_parse_from(["mediaslots", "image", "--slot", "hero"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from(["mediaslots", "video", "--slot", "hero"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from([
            "mediaslots",
            "slots",
            "--kind",
            "videos",
            "--config",
            "site.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        assert!(matches!(cli.command, Commands::Slots(SlotsArgs { kind: MediaKind::Video })));
    }
}
