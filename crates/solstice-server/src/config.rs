use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use solstice_engine::logging::LoggingConfig;
use solstice_engine::{RenderSettings, ShaderSource, Viewport};

/// Command-line options.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "solstice",
    version,
    about = "Renders the day/night Earth for a sub-solar point and serves it as PNG"
)]
pub struct Args {
    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind.
    #[arg(short, long, default_value = "0.0.0.0")]
    pub address: IpAddr,

    /// Output image width in pixels; the height is half of it.
    #[arg(short, long, default_value_t = 2048, value_parser = parse_width)]
    pub width: u32,

    /// Verbose logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Equirectangular day map.
    #[arg(long, default_value = "earth_day.png")]
    pub day_texture: PathBuf,

    /// Equirectangular night map.
    #[arg(long, default_value = "earth_night.png")]
    pub night_texture: PathBuf,

    /// WGSL file replacing the built-in vertex stage.
    #[arg(long)]
    pub vertex_shader: Option<PathBuf>,

    /// WGSL file replacing the built-in fragment stage.
    #[arg(long)]
    pub fragment_shader: Option<PathBuf>,

    /// Maximum number of jobs queued or in flight before requests get 503.
    #[arg(long, default_value_t = 1024, value_parser = parse_max_pending)]
    pub max_pending: usize,
}

impl Args {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            verbose: self.debug,
            ..LoggingConfig::default()
        }
    }

    pub fn render_settings(&self) -> RenderSettings {
        let override_or_builtin = |path: &Option<PathBuf>| match path {
            Some(path) => ShaderSource::File(path.clone()),
            None => ShaderSource::Builtin,
        };

        RenderSettings {
            vertex_shader: override_or_builtin(&self.vertex_shader),
            fragment_shader: override_or_builtin(&self.fragment_shader),
            ..RenderSettings::new(self.width, &self.day_texture, &self.night_texture)
        }
    }
}

fn parse_width(s: &str) -> Result<u32, String> {
    let width: u32 = s.parse().map_err(|e| format!("{e}"))?;
    match Viewport::from_width(width) {
        Some(_) => Ok(width),
        None => Err(format!("{width} is not a positive even number")),
    }
}

fn parse_max_pending(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
