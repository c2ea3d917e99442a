//! In-memory map composition.
//!
//! A [`MapCanvas`] is a plain value describing one Leaflet map: base tiles,
//! overlays in draw order, legends and controls. Each builder returns a fresh
//! canvas so the two dashboard maps never share state.

use crate::config::{HeatRiskConfig, HviConfig};
use crate::types::{LatLon, Neighborhood};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// One NWS HeatRisk level as shown in the legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskCategory {
    pub level: u8,
    pub swatch: &'static str,
    pub color: &'static str,
    pub label: &'static str,
}

/// HeatRisk levels in increasing severity.
pub const HEAT_RISK_CATEGORIES: [RiskCategory; 5] = [
    RiskCategory { level: 0, swatch: "Green", color: "#d9f0d3", label: "Little/no risk" },
    RiskCategory { level: 1, swatch: "Yellow", color: "#ffff99", label: "Minor" },
    RiskCategory { level: 2, swatch: "Orange", color: "#f46d43", label: "Moderate" },
    RiskCategory { level: 3, swatch: "Red", color: "#d73027", label: "Major" },
    RiskCategory { level: 4, swatch: "Magenta", color: "#762a83", label: "Extreme" },
];

/// ColorBrewer YlOrRd, five classes.
pub const YLORRD_5: [&str; 5] = ["#ffffb2", "#fecc5c", "#fd8d3c", "#f03b20", "#bd0026"];

/// Choropleth outline weight; hover adds 2.
const LINE_WEIGHT: f32 = 1.0;

/// Fill for neighborhoods without a usable rank.
pub const NAN_FILL: &str = "black";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TooltipField {
    pub field: &'static str,
    pub alias: &'static str,
}

pub const TOOLTIP_FIELDS: [TooltipField; 5] = [
    TooltipField { field: "ntaname", alias: "NTA:" },
    TooltipField { field: "GEONAME", alias: "Neighborhood:" },
    TooltipField { field: "HVI_RANK", alias: "HVI Rank:" },
    TooltipField { field: "MEDIAN_INCOME", alias: "Median Income:" },
    TooltipField { field: "PCT_HOUSEHOLDS_AC", alias: "% Households w/ AC:" },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BaseTiles {
    #[serde(rename = "cartodb_positron")]
    CartoDbPositron,
}

/// Leaflet path options, serialized under Leaflet's own key names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStyle {
    pub color: String,
    pub weight: f32,
    pub opacity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WmsTileLayer {
    pub name: String,
    pub url: String,
    pub layers: String,
    pub format: String,
    pub transparent: bool,
    pub attribution: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoroplethLayer {
    pub name: String,
    pub data: FeatureCollection,
    /// Fill per feature, indexed by the numeric feature id.
    pub fills: Vec<&'static str>,
    pub style: PathStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<PathStyle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tooltip {
    pub fields: Vec<TooltipField>,
    pub localize: bool,
    pub sticky: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TooltipOverlay {
    pub name: String,
    pub data: FeatureCollection,
    pub style: PathStyle,
    pub tooltip: Tooltip,
    /// Name of a choropleth whose matching feature is highlighted on hover.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    WmsTile(WmsTileLayer),
    Choropleth(ChoroplethLayer),
    TooltipOverlay(TooltipOverlay),
}

impl Layer {
    pub fn name(&self) -> &str {
        match self {
            Layer::WmsTile(l) => &l.name,
            Layer::Choropleth(l) => &l.name,
            Layer::TooltipOverlay(l) => &l.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorStop {
    pub value: u8,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Legend {
    Categories { title: String, entries: Vec<RiskCategory> },
    ColorBar { caption: String, stops: Vec<ColorStop> },
}

#[derive(Debug, Clone, Serialize)]
pub struct MapCanvas {
    pub id: String,
    pub title: String,
    pub center: LatLon,
    pub zoom: u8,
    pub tiles: BaseTiles,
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
    pub legends: Vec<Legend>,
    pub layer_control: bool,
}

impl MapCanvas {
    pub fn new(id: &str, title: &str, center: LatLon, zoom: u8, width: u32, height: u32) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            center,
            zoom,
            tiles: BaseTiles::CartoDbPositron,
            width,
            height,
            layers: Vec::new(),
            legends: Vec::new(),
            layer_control: false,
        }
    }

    /// Appends an overlay; overlays draw in the order they were added.
    pub fn add_layer(&mut self, layer: Layer) -> &mut Self {
        self.layers.push(layer);
        self
    }

    pub fn add_legend(&mut self, legend: Legend) -> &mut Self {
        self.legends.push(legend);
        self
    }

    pub fn with_layer_control(&mut self) -> &mut Self {
        self.layer_control = true;
        self
    }
}

pub fn heat_risk_legend() -> Legend {
    Legend::Categories {
        title: "Heat Risk Categories".to_string(),
        entries: HEAT_RISK_CATEGORIES.to_vec(),
    }
}

/// NWS HeatRisk WMS overlay on a positron base with the fixed category legend.
pub fn heat_risk_map(config: &HeatRiskConfig) -> MapCanvas {
    let mut canvas = MapCanvas::new(
        "heat-risk-map",
        "NWS Heat Risk Map",
        config.center,
        config.zoom,
        config.width,
        config.height,
    );

    canvas
        .add_layer(Layer::WmsTile(WmsTileLayer {
            name: config.layer.clone(),
            url: config.wms_url.clone(),
            layers: config.layer.clone(),
            format: config.format.clone(),
            transparent: config.transparent,
            attribution: config.attribution.clone(),
        }))
        .add_legend(heat_risk_legend());

    canvas
}

/// Maps an HVI rank onto the five-class ramp.
pub fn rank_color(rank: Option<u8>) -> &'static str {
    match rank {
        Some(r @ 1..=5) => YLORRD_5[usize::from(r) - 1],
        _ => NAN_FILL,
    }
}

/// Choropleth of HVI rank plus a transparent tooltip overlay and a layer toggle.
pub fn hvi_map(config: &HviConfig, neighborhoods: &[Neighborhood]) -> MapCanvas {
    let mut canvas = MapCanvas::new(
        "hvi-map",
        "NYC Heat Vulnerability Index Map",
        config.center,
        config.zoom,
        config.width,
        config.height,
    );

    let data = neighborhood_collection(neighborhoods);
    let fills = neighborhoods.iter().map(|n| rank_color(n.hvi_rank())).collect();

    let choropleth = Layer::Choropleth(ChoroplethLayer {
        name: "Heat Vulnerability Index".to_string(),
        data: data.clone(),
        fills,
        style: PathStyle {
            color: "black".to_string(),
            weight: LINE_WEIGHT,
            opacity: config.line_opacity,
            fill_color: None,
            fill_opacity: Some(config.fill_opacity),
        },
        highlight: Some(PathStyle {
            color: "black".to_string(),
            weight: LINE_WEIGHT + 2.0,
            opacity: config.line_opacity,
            fill_color: None,
            fill_opacity: Some((config.fill_opacity + 0.2).min(1.0)),
        }),
    });

    let overlay = TooltipOverlay {
        name: "Neighborhood details".to_string(),
        data,
        style: PathStyle {
            color: "black".to_string(),
            weight: 0.3,
            opacity: 1.0,
            fill_color: Some("transparent".to_string()),
            fill_opacity: None,
        },
        tooltip: Tooltip {
            fields: TOOLTIP_FIELDS.to_vec(),
            localize: true,
            sticky: true,
        },
        // the overlay sits on top and receives the pointer events
        highlights: Some(choropleth.name().to_string()),
    };

    canvas
        .add_layer(choropleth)
        .add_layer(Layer::TooltipOverlay(overlay))
        .add_legend(Legend::ColorBar {
            caption: config.legend_name.clone(),
            stops: (1u8..=5).map(|value| ColorStop { value, color: rank_color(Some(value)) }).collect(),
        })
        .with_layer_control();

    canvas
}

/// Joined rows as GeoJSON, ids numbered in input order.
pub fn neighborhood_collection(neighborhoods: &[Neighborhood]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: neighborhoods.iter().enumerate()
            .map(|(i, n)| neighborhood_feature(i, n))
            .collect(),
        foreign_members: None,
    }
}

fn neighborhood_feature(index: usize, neighborhood: &Neighborhood) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&neighborhood.geometry))),
        id: Some(Id::Number(index.into())),
        properties: Some(joined_properties(neighborhood)),
        foreign_members: None,
    }
}

/// Geometry properties overlaid with the CSV columns. Unmatched rows get
/// nulls, except where the geometry file already carries that column.
pub fn joined_properties(neighborhood: &Neighborhood) -> JsonMap<String, JsonValue> {
    let mut props = neighborhood.properties.clone();

    match &neighborhood.vulnerability {
        Some(v) => {
            props.insert("NTACode".into(), v.nta_code.clone().into());
            props.insert("ntaname".into(), v.ntaname.clone().into());
            props.insert("GEONAME".into(), v.geoname.clone().into());
            props.insert("HVI_RANK".into(), v.hvi_rank.into());
            props.insert("MEDIAN_INCOME".into(), v.median_income.into());
            props.insert("PCT_HOUSEHOLDS_AC".into(), v.pct_households_ac.into());
        }
        None => {
            for column in crate::data::HVI_COLUMNS {
                props.entry(column).or_insert(JsonValue::Null);
            }
        }
    }

    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HviRecord;
    use geo::{polygon, MultiPolygon};

    fn neighborhood(code: &str, rank: Option<u8>, matched: bool) -> Neighborhood {
        let mut properties = JsonMap::new();
        properties.insert("nta2020".into(), code.into());
        Neighborhood {
            code: Some(code.to_string()),
            geometry: MultiPolygon::new(vec![polygon![
                (x: -74.0, y: 40.7), (x: -73.9, y: 40.7), (x: -73.9, y: 40.8), (x: -74.0, y: 40.7)
            ]]),
            properties,
            vulnerability: matched.then(|| HviRecord {
                nta_code: code.to_string(),
                ntaname: code.to_string(),
                geoname: "Greenpoint".to_string(),
                hvi_rank: rank,
                median_income: Some(72000.0),
                pct_households_ac: Some(88.5),
            }),
        }
    }

    #[test]
    fn heat_risk_legend_has_five_levels_in_severity_order() {
        let Legend::Categories { title, entries } = heat_risk_legend() else {
            panic!("expected category legend");
        };
        assert_eq!(title, "Heat Risk Categories");
        assert_eq!(entries.len(), 5);
        let levels: Vec<u8> = entries.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 3, 4]);
        let colors: Vec<&str> = entries.iter().map(|e| e.color).collect();
        assert_eq!(colors, vec!["#d9f0d3", "#ffff99", "#f46d43", "#d73027", "#762a83"]);
        assert_eq!(entries[4].swatch, "Magenta");
    }

    #[test]
    fn heat_risk_map_has_single_wms_layer() {
        let canvas = heat_risk_map(&HeatRiskConfig::default());
        assert_eq!((canvas.width, canvas.height), (900, 600));
        assert_eq!(canvas.zoom, 9);
        assert_eq!(canvas.layers.len(), 1);
        let Layer::WmsTile(wms) = &canvas.layers[0] else {
            panic!("expected WMS layer");
        };
        assert_eq!(wms.layers, "NWS_HeatRisk");
        assert_eq!(wms.format, "image/png");
        assert!(wms.transparent);
        assert!(wms.url.contains("NWS_HeatRisk/ImageServer/WMSServer"));
        assert!(!canvas.layer_control);
    }

    #[test]
    fn rank_colors_follow_ramp() {
        assert_eq!(rank_color(Some(1)), "#ffffb2");
        assert_eq!(rank_color(Some(5)), "#bd0026");
        assert_eq!(rank_color(None), NAN_FILL);
        assert_eq!(rank_color(Some(0)), NAN_FILL);
        assert_eq!(rank_color(Some(6)), NAN_FILL);
    }

    #[test]
    fn hvi_map_layers_in_insertion_order() {
        let rows = vec![neighborhood("BK01", Some(3), true), neighborhood("BK02", None, false)];
        let canvas = hvi_map(&HviConfig::default(), &rows);

        assert_eq!((canvas.width, canvas.height), (1000, 700));
        let names: Vec<&str> = canvas.layers.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["Heat Vulnerability Index", "Neighborhood details"]);
        assert!(canvas.layer_control);

        let Layer::Choropleth(choropleth) = &canvas.layers[0] else {
            panic!("expected choropleth first");
        };
        assert_eq!(choropleth.fills, vec!["#fd8d3c", NAN_FILL]);
        assert_eq!(choropleth.fills[0], YLORRD_5[2]);
        assert_eq!(choropleth.style.fill_opacity, Some(0.7));
        assert_eq!(choropleth.style.opacity, 0.3);
        let highlight = choropleth.highlight.as_ref().unwrap();
        assert_eq!(highlight.weight, choropleth.style.weight + 2.0);
        assert_eq!(highlight.weight, 3.0);
        assert!((highlight.fill_opacity.unwrap() - 0.9).abs() < 1e-6);

        let Layer::TooltipOverlay(overlay) = &canvas.layers[1] else {
            panic!("expected tooltip overlay second");
        };
        assert_eq!(overlay.highlights.as_deref(), Some(canvas.layers[0].name()));
        assert_eq!(choropleth.data.features.len(), 2);
    }

    #[test]
    fn tooltip_has_five_fixed_fields_regardless_of_rows() {
        for count in [0usize, 1, 7] {
            let rows: Vec<_> = (0..count).map(|i| neighborhood(&format!("X{}", i), Some(1), true)).collect();
            let canvas = hvi_map(&HviConfig::default(), &rows);
            let Layer::TooltipOverlay(overlay) = &canvas.layers[1] else {
                panic!("expected tooltip overlay second");
            };
            assert_eq!(overlay.tooltip.fields.len(), 5);
            let aliases: Vec<&str> = overlay.tooltip.fields.iter().map(|f| f.alias).collect();
            assert_eq!(
                aliases,
                vec!["NTA:", "Neighborhood:", "HVI Rank:", "Median Income:", "% Households w/ AC:"]
            );
            assert!(overlay.tooltip.sticky && overlay.tooltip.localize);
            assert_eq!(overlay.style.fill_color.as_deref(), Some("transparent"));
        }
    }

    #[test]
    fn unmatched_properties_are_null() {
        let props = joined_properties(&neighborhood("BK02", None, false));
        assert_eq!(props["nta2020"], "BK02");
        assert_eq!(props["HVI_RANK"], JsonValue::Null);
        assert_eq!(props["MEDIAN_INCOME"], JsonValue::Null);

        let props = joined_properties(&neighborhood("BK01", Some(3), true));
        assert_eq!(props["HVI_RANK"], 3);
        assert_eq!(props["GEONAME"], "Greenpoint");
    }

    #[test]
    fn unmatched_row_keeps_geometry_name() {
        let mut row = neighborhood("BK02", None, false);
        row.properties.insert("ntaname".into(), "Williamsburg".into());
        let props = joined_properties(&row);
        assert_eq!(props["ntaname"], "Williamsburg");
    }

    #[test]
    fn canvas_serializes_layer_kinds() {
        let canvas = heat_risk_map(&HeatRiskConfig::default());
        let json = serde_json::to_value(&canvas).unwrap();
        assert_eq!(json["layers"][0]["kind"], "wms_tile");
        assert_eq!(json["legends"][0]["kind"], "categories");
        assert_eq!(json["center"], serde_json::json!([40.7128, -74.006]));
    }
}
