//! planview CLI - hidden-line projection of STL meshes
//!
//! Reads a mesh, projects its edges along a direction, and writes visible
//! and hidden segments (and optionally the silhouette outline) as JSON.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use planview::{
    project_edges_with_progress, project_outline_with_progress, FillGeometry, LineGeometry,
    LineSet, ProjectionSettings, RingPoints, Scene,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod stl;

#[derive(Parser)]
#[command(name = "planview")]
#[command(about = "Project the visible and hidden edges of an STL mesh", long_about = None)]
struct Cli {
    /// Input mesh (binary or ASCII STL)
    input: PathBuf,

    /// Projection direction, e.g. `0,0,-1`
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    direction: Option<Vec<f64>>,

    /// Crease angle threshold in degrees
    #[arg(long)]
    angle: Option<f64>,

    /// TOML settings file; flags override its values
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Also compute the silhouette outline
    #[arg(long)]
    outline: bool,

    /// Output JSON file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log progress at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Document {
    settings: ProjectionSettings,
    visible: LineGeometry,
    hidden: LineGeometry,
    #[serde(skip_serializing_if = "Option::is_none")]
    outline: Option<OutlineDocument>,
}

#[derive(Serialize)]
struct OutlineDocument {
    area: f64,
    rings: Vec<RingPoints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fill: Option<FillGeometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lines: Option<LineGeometry>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(&cli)?;
    let mesh = stl::read_stl(&cli.input)?;
    info!(
        input = %cli.input.display(),
        triangles = mesh.num_triangles(),
        "loaded mesh"
    );
    let scene = Scene::single(mesh);

    let visibility = project_edges_with_progress(&scene, &settings, |fraction, partial| {
        debug!(fraction, edges = partial.len(), "edge projection progress");
    })
    .context("edge projection failed")?;

    let outline = if cli.outline {
        let result = project_outline_with_progress(&scene, &settings, |fraction, _| {
            debug!(fraction, "outline progress");
        })
        .context("outline projection failed")?;
        Some(OutlineDocument {
            area: result.state.area(),
            rings: result
                .state
                .rings()
                .into_iter()
                .map(|r| RingPoints {
                    points: r.points.iter().map(|p| [p.x, p.y]).collect(),
                    is_hole: r.is_hole,
                })
                .collect(),
            fill: result.fill,
            lines: result.lines,
        })
    } else {
        None
    };

    let document = Document {
        visible: visibility.to_line_geometry(LineSet::Visible),
        hidden: visibility.to_line_geometry(LineSet::Hidden),
        settings,
        outline,
    };
    info!(
        visible = document.visible.len(),
        hidden = document.hidden.len(),
        "projection complete"
    );

    let json = serde_json::to_string_pretty(&document)?;
    match &cli.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            info!(output = %path.display(), "wrote result");
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn load_settings(cli: &Cli) -> Result<ProjectionSettings> {
    let mut settings = match &cli.settings {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ProjectionSettings::from_toml_str(&text)
                .with_context(|| format!("invalid settings in {}", path.display()))?
        }
        None => ProjectionSettings::default(),
    };
    if let Some(d) = &cli.direction {
        let &[x, y, z] = d.as_slice() else {
            bail!("--direction takes three comma-separated numbers");
        };
        settings.direction = [x, y, z];
    }
    if let Some(angle) = cli.angle {
        settings.angle_threshold = angle;
    }
    settings.validate()?;
    Ok(settings)
}
