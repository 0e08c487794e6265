//! Layer tree as served by the backend's `/layers/tree/` endpoint.
//!
//! The tree is three levels deep: root groups (one per GeoServer workspace and
//! service type), optional thematic groups inside them, and layers hanging off
//! either. Nodes are addressed through typed ids so a thematic-group id can
//! never be looked up in the layer visibility map by accident.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::Extent;

macro_rules! node_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

node_id!(RootGroupId);
node_id!(ThematicGroupId);
node_id!(LayerId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceType {
    /// Vector features drawn client-side from a WFS source.
    Wfs,
    /// Server-rendered raster tiles/images.
    Wms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometryType {
    #[default]
    Point,
    LineString,
    Polygon,
}

/// RGBA colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#')?;
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 | 8 => hex.to_string(),
            _ => return None,
        };
        let byte = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
        let a = if expanded.len() == 8 { byte(6)? } else { 255 };
        Some(Self {
            r: byte(0)? as f32 / 255.0,
            g: byte(2)? as f32 / 255.0,
            b: byte(4)? as f32 / 255.0,
            a: a as f32 / 255.0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelStyle {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Vector style as stored in the layer's `styleConfig` column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleConfig {
    #[serde(rename = "type", default)]
    pub geometry: Option<GeometryType>,
    #[serde(default)]
    pub radius: Option<f32>,
    #[serde(default)]
    pub fill_color: Option<String>,
    #[serde(default)]
    pub stroke_color: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f32>,
    #[serde(default)]
    pub label: Option<LabelStyle>,
}

impl StyleConfig {
    pub fn fill(&self) -> Option<Color> {
        self.fill_color.as_deref().and_then(Color::from_hex)
    }

    pub fn stroke(&self) -> Option<Color> {
        self.stroke_color.as_deref().and_then(Color::from_hex)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub crs: Option<String>,
    pub extent: Extent,
}

/// Native and geographic bounds as reported by GeoServer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerBounds {
    #[serde(default)]
    pub native: Option<BoundingBox>,
    #[serde(default)]
    pub lat_lon: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    #[serde(default)]
    pub root_group_id: Option<RootGroupId>,
    #[serde(default)]
    pub thematic_group_id: Option<ThematicGroupId>,
    pub title: String,
    pub layer_name: String,
    pub workspace: String,
    pub service_type: ServiceType,
    #[serde(default)]
    pub native_crs: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub geometry_type: GeometryType,
    #[serde(default)]
    pub min_zoom: Option<f64>,
    #[serde(default)]
    pub max_zoom: Option<f64>,
    #[serde(default)]
    pub queryable: bool,
    #[serde(default)]
    pub style_config: Option<StyleConfig>,
    #[serde(default)]
    pub bbox: Option<LayerBounds>,
}

impl Layer {
    /// `workspace:layerName`, as GeoServer addresses the layer.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.workspace, self.layer_name)
    }

    pub fn zoom_in_range(&self, zoom: f64) -> bool {
        let above_min = self.min_zoom.map_or(true, |min| zoom >= min);
        let below_max = self.max_zoom.map_or(true, |max| zoom <= max);
        above_min && below_max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThematicGroup {
    pub id: ThematicGroupId,
    #[serde(default)]
    pub root_group_id: Option<RootGroupId>,
    pub title: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootGroup {
    pub id: RootGroupId,
    pub title: String,
    pub service_type: ServiceType,
    #[serde(default)]
    pub workspace: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub thematic_groups: Vec<ThematicGroup>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerTree {
    pub roots: Vec<RootGroup>,
}

/// One node of the tree during traversal.
#[derive(Debug, Clone, Copy)]
pub enum TreeNode<'a> {
    Root(&'a RootGroup),
    Thematic(&'a RootGroup, &'a ThematicGroup),
    Layer { root: &'a RootGroup, thematic: Option<&'a ThematicGroup>, layer: &'a Layer },
}

impl LayerTree {
    pub fn new(roots: Vec<RootGroup>) -> Self {
        Self { roots }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Depth-first walk: root, its direct layers, then each thematic group
    /// followed by its layers.
    pub fn walk(&self) -> Vec<TreeNode<'_>> {
        let mut out = Vec::new();
        for root in &self.roots {
            out.push(TreeNode::Root(root));
            for layer in &root.layers {
                out.push(TreeNode::Layer { root, thematic: None, layer });
            }
            for group in &root.thematic_groups {
                out.push(TreeNode::Thematic(root, group));
                for layer in &group.layers {
                    out.push(TreeNode::Layer { root, thematic: Some(group), layer });
                }
            }
        }
        out
    }

    pub fn find_layer(&self, id: &LayerId) -> Option<&Layer> {
        self.walk().into_iter().find_map(|node| match node {
            TreeNode::Layer { layer, .. } if &layer.id == id => Some(layer),
            _ => None,
        })
    }

    pub fn layer_count(&self) -> usize {
        self.roots
            .iter()
            .map(|r| r.layers.len() + r.thematic_groups.iter().map(|g| g.layers.len()).sum::<usize>())
            .sum()
    }
}

/// Visibility flags toggled in the layer panel. Ids missing from a map fall
/// back to the node's stored default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityState {
    #[serde(default)]
    pub root_groups: HashMap<RootGroupId, bool>,
    #[serde(default)]
    pub thematic_groups: HashMap<ThematicGroupId, bool>,
    #[serde(default)]
    pub layers: HashMap<LayerId, bool>,
}

impl VisibilityState {
    pub fn root_visible(&self, root: &RootGroup) -> bool {
        self.root_groups.get(&root.id).copied().unwrap_or(root.visible)
    }

    pub fn thematic_visible(&self, group: &ThematicGroup) -> bool {
        self.thematic_groups.get(&group.id).copied().unwrap_or(group.visible)
    }

    pub fn layer_visible(&self, layer: &Layer) -> bool {
        self.layers.get(&layer.id).copied().unwrap_or(layer.visible)
    }

    pub fn set_root(&mut self, id: &str, visible: bool) {
        self.root_groups.insert(RootGroupId::from(id), visible);
    }

    pub fn set_thematic(&mut self, id: &str, visible: bool) {
        self.thematic_groups.insert(ThematicGroupId::from(id), visible);
    }

    pub fn set_layer(&mut self, id: &str, visible: bool) {
        self.layers.insert(LayerId::from(id), visible);
    }
}

/// A layer that is switched on all the way down the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleLegendItem<'a> {
    pub root_group_id: &'a RootGroupId,
    pub root_group_title: &'a str,
    pub thematic_group: Option<(&'a ThematicGroupId, &'a str)>,
    pub layer: &'a Layer,
}

impl VisibleLegendItem<'_> {
    pub fn thematic_group_title(&self) -> Option<&str> {
        self.thematic_group.map(|(_, title)| title)
    }
}

/// Collect the layers eligible for the legend, in traversal order.
///
/// A layer qualifies only if its root group is visible, its thematic group
/// (when it has one) is visible, and the layer itself is visible.
pub fn collect_visible_legend_items<'a>(
    tree: &'a LayerTree,
    visibility: &VisibilityState,
) -> Vec<VisibleLegendItem<'a>> {
    let mut items = Vec::new();
    for node in tree.walk() {
        let TreeNode::Layer { root, thematic, layer } = node else { continue };
        if !visibility.root_visible(root) {
            continue;
        }
        if let Some(group) = thematic {
            if !visibility.thematic_visible(group) {
                continue;
            }
        }
        if !visibility.layer_visible(layer) {
            continue;
        }
        items.push(VisibleLegendItem {
            root_group_id: &root.id,
            root_group_title: &root.title,
            thematic_group: thematic.map(|g| (&g.id, g.title.as_str())),
            layer,
        });
    }
    items
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_tree;
    use super::*;

    fn ids(items: &[VisibleLegendItem<'_>]) -> Vec<String> {
        items.iter().map(|i| i.layer.id.to_string()).collect()
    }

    #[test]
    fn traversal_order_is_direct_layers_then_thematic_groups() {
        let tree = sample_tree();
        let items = collect_visible_legend_items(&tree, &VisibilityState::default());
        assert_eq!(ids(&items), vec!["pop", "aereas", "subterraneas"]);
        assert_eq!(items[1].thematic_group_title(), Some("Caixas de Emenda"));
        assert_eq!(items[0].thematic_group_title(), None);
    }

    #[test]
    fn hidden_root_hides_everything_below_it() {
        let tree = sample_tree();
        let mut vis = VisibilityState::default();
        vis.set_root("infovia", false);
        vis.set_layer("pop", true);
        vis.set_thematic("caixas", true);
        let items = collect_visible_legend_items(&tree, &vis);
        assert!(items.iter().all(|i| i.root_group_id.as_str() != "infovia"));
    }

    #[test]
    fn state_overrides_stored_defaults() {
        let tree = sample_tree();
        let mut vis = VisibilityState::default();
        vis.set_thematic("bairros", true);
        vis.set_layer("aereas", false);
        let items = collect_visible_legend_items(&tree, &vis);
        assert_eq!(ids(&items), vec!["pop", "subterraneas", "limites"]);
    }

    #[test]
    fn parses_backend_tree_json() {
        let json = r##"[{
            "id": "infovia", "title": "INFOVIA", "serviceType": "WFS",
            "workspace": "infovia_post", "visible": true, "order": 0,
            "layers": [{
                "id": "infovia-pop", "rootGroupId": "infovia", "thematicGroupId": null,
                "title": "POP", "layerName": "pop", "workspace": "infovia_post",
                "serviceType": "WFS", "nativeCrs": "EPSG:10665", "visible": true,
                "order": 0, "geometryType": "Point", "minZoom": 11, "queryable": true,
                "queryableFields": ["nome"], "tableFields": [],
                "styleConfig": {"type": "Point", "radius": 8, "fillColor": "#e69800",
                                "strokeColor": "#000000", "strokeWidth": 0.5}
            }],
            "thematicGroups": []
        }]"##;
        let tree = LayerTree::from_json(json).unwrap();
        let layer = tree.find_layer(&LayerId::from("infovia-pop")).unwrap();
        assert_eq!(layer.qualified_name(), "infovia_post:pop");
        assert_eq!(layer.min_zoom, Some(11.0));
        let style = layer.style_config.as_ref().unwrap();
        assert_eq!(style.geometry, Some(GeometryType::Point));
        let fill = style.fill().unwrap();
        assert!((fill.r - 230.0 / 255.0).abs() < 1e-6);
        assert_eq!(tree.layer_count(), 1);
    }

    #[test]
    fn hex_colours() {
        assert_eq!(Color::from_hex("#000"), Some(Color::BLACK));
        let c = Color::from_hex("#ff000080").unwrap();
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(Color::from_hex("red"), None);
        assert_eq!(Color::from_hex("#12345"), None);
    }

    #[test]
    fn zoom_range_is_inclusive() {
        let mut l = fixtures::layer("x", ServiceType::Wms, true);
        l.min_zoom = Some(11.0);
        l.max_zoom = Some(18.0);
        assert!(l.zoom_in_range(11.0));
        assert!(l.zoom_in_range(18.0));
        assert!(!l.zoom_in_range(10.5));
        assert!(!l.zoom_in_range(18.1));
    }
}
