//! Print command - composite a print job into a PDF

use anyhow::{Context, Result};
use geoprint_export::{AbortSignal, PrintCompositor};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::job::{LoadedJob, Overrides};

pub struct PrintArgs {
    pub job: PathBuf,
    pub output: PathBuf,
    pub overrides: Overrides,
    pub no_filter: bool,
    pub deadline_secs: Option<u64>,
    pub summary: bool,
}

pub fn execute(config: &Config, args: PrintArgs) -> Result<()> {
    log::info!("Starting print");
    log::info!("Print job: {}", args.job.display());
    log::info!("Output file: {}", args.output.display());

    let job = LoadedJob::load(&args.job)?;
    let request = job.print_request(config, &args.overrides)?;
    let mut view = job.map_view()?;

    let mut settings = config.print_settings();
    if args.no_filter {
        settings.filter_legend_by_content = false;
    }
    let compositor = PrintCompositor::new(settings);

    let abort = AbortSignal::new();
    if let Some(secs) = args.deadline_secs {
        let signal = abort.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            log::debug!("deadline of {}s reached; cancelling print", secs);
            signal.abort();
        });
    }

    let output = compositor.print(&mut view, request, &abort)?;
    output
        .write_to_file(&args.output)
        .with_context(|| format!("Failed to write PDF: {}", args.output.display()))?;

    let s = &output.summary;
    log::info!(
        "Wrote {} ({} page(s), map {}x{} px, {} legend entries, scale {})",
        args.output.display(),
        s.page_count,
        s.map_width_px,
        s.map_height_px,
        s.legend_entries,
        s.scale.as_deref().unwrap_or("n/a")
    );
    if s.unavailable_legends > 0 {
        log::warn!("{} legend image(s) could not be fetched", s.unavailable_legends);
    }
    if args.summary {
        println!("{}", serde_json::to_string_pretty(s)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn prints_job_to_pdf() {
        let dir = tempdir().unwrap();
        RgbaImage::from_pixel(100, 80, Rgba([200, 210, 220, 255])).save(dir.path().join("base.png")).unwrap();
        let job = r#"{
            "view": {"width": 100, "height": 80, "center": [-5702000, -3509000], "resolution": 10},
            "canvases": [{"kind": "basemap", "image": "base.png"}],
            "selection": {"extent": [-5702200, -3509200, -5701800, -3508800]},
            "options": {"includeLegends": false},
            "layerTree": []
        }"#;
        let job_path = dir.path().join("job.json");
        std::fs::write(&job_path, job).unwrap();
        let output = dir.path().join("out.pdf");

        let mut config = Config::default();
        config.general.render_wait_ms = 10;
        let args = PrintArgs {
            job: job_path,
            output: output.clone(),
            overrides: Overrides::default(),
            no_filter: true,
            deadline_secs: None,
            summary: false,
        };
        execute(&config, args).unwrap();
        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
