//! Legend command - list the layers a print would put in its legend

use anyhow::Result;
use geoprint_core::collect_visible_legend_items;
use serde::Serialize;
use std::path::Path;

use crate::job::LoadedJob;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LegendLine<'a> {
    root_group: &'a str,
    thematic_group: Option<&'a str>,
    layer_id: &'a str,
    title: &'a str,
    service_type: geoprint_core::ServiceType,
}

pub fn execute(job_path: &Path, json: bool) -> Result<()> {
    let job = LoadedJob::load(job_path)?;
    let tree = job.layer_tree()?;
    let items = collect_visible_legend_items(&tree, &job.job.visibility);
    log::info!("{} of {} layers are visible", items.len(), tree.layer_count());

    let lines: Vec<LegendLine> = items
        .iter()
        .map(|item| LegendLine {
            root_group: item.root_group_title,
            thematic_group: item.thematic_group_title(),
            layer_id: item.layer.id.as_str(),
            title: &item.layer.title,
            service_type: item.layer.service_type,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }
    if lines.is_empty() {
        println!("{}", geoprint_core::legend::NO_VISIBLE_LAYERS);
    }
    for line in &lines {
        match line.thematic_group {
            Some(group) => println!("{} / {} / {} ({:?})", line.root_group, group, line.title, line.service_type),
            None => println!("{} / {} ({:?})", line.root_group, line.title, line.service_type),
        }
    }
    Ok(())
}
