use crate::map::{Legend, MapCanvas};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

#[derive(Serialize)]
struct CanvasView<'a> {
    #[serde(flatten)]
    canvas: &'a MapCanvas,
    legend_html: Vec<String>,
}

/// Renders all canvases into one self-contained dashboard page.
pub fn render_dashboard(canvases: &[MapCanvas]) -> Result<String> {
    let views: Vec<CanvasView> = canvases.iter()
        .map(|canvas| CanvasView {
            canvas,
            legend_html: canvas.legends.iter().map(render_legend).collect(),
        })
        .collect();

    let payload = serde_json::to_string(&views).context("Failed to encode map canvases")?;

    let sections: String = canvases.iter().map(render_section).collect();

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>NYC Heat Maps</title>
    <link rel="stylesheet" href="{leaflet_css}">
    <style>{css}</style>
</head>
<body>
{sections}
    <script src="{leaflet_js}"></script>
    <script>
    const CANVASES = {payload};
{js}
    </script>
</body>
</html>
"#,
        leaflet_css = LEAFLET_CSS,
        leaflet_js = LEAFLET_JS,
        css = INLINE_CSS,
        sections = sections,
        payload = script_safe(&payload),
        js = INLINE_JS,
    ))
}

pub fn write_dashboard(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    fs::write(path, html).with_context(|| format!("Failed to write page: {:?}", path))?;
    info!("Wrote dashboard to {:?}", path);
    Ok(())
}

fn render_section(canvas: &MapCanvas) -> String {
    format!(
        "    <section>\n        <h1>{title}</h1>\n        <div id=\"{id}\" class=\"map\" style=\"width: {w}px; height: {h}px;\"></div>\n    </section>\n",
        title = escape_html(&canvas.title),
        id = escape_html(&canvas.id),
        w = canvas.width,
        h = canvas.height,
    )
}

pub fn render_legend(legend: &Legend) -> String {
    match legend {
        Legend::Categories { title, entries } => {
            let rows: String = entries.iter()
                .map(|e| format!(
                    "<i style=\"background: {}\"></i> {} ({}) - {}<br>",
                    escape_html(e.color), escape_html(e.swatch), e.level, escape_html(e.label)
                ))
                .collect();
            format!("<div class=\"legend categories\"><b>{}</b><br>{}</div>", escape_html(title), rows)
        }
        Legend::ColorBar { caption, stops } => {
            let cells: String = stops.iter()
                .map(|s| format!(
                    "<span style=\"background: {}\">{}</span>",
                    escape_html(s.color), s.value
                ))
                .collect();
            format!(
                "<div class=\"legend colorbar\"><div class=\"bar\">{}</div><div class=\"caption\">{}</div></div>",
                cells, escape_html(caption)
            )
        }
    }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// JSON inside a <script> element must not close the element early.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

const INLINE_CSS: &str = r#"
body { font-family: system-ui, -apple-system, 'Segoe UI', sans-serif; margin: 2rem; color: #111827; }
section { margin-bottom: 2.5rem; }
h1 { font-size: 1.75rem; margin-bottom: 1rem; }
.legend { background: white; border: 2px solid grey; border-radius: 6px; padding: 10px; font-size: 14px; line-height: 18px; }
.legend.categories { width: 200px; }
.legend.categories i { width: 15px; height: 15px; float: left; margin-right: 5px; opacity: 0.7; }
.legend.colorbar .bar { display: flex; }
.legend.colorbar .bar span { width: 40px; text-align: center; font-size: 12px; }
.legend.colorbar .caption { margin-top: 4px; font-size: 12px; }
.hvi-tooltip th { text-align: left; padding-right: 6px; }
"#;

const INLINE_JS: &str = r#"
    const BASE_TILES = {
      cartodb_positron: {
        name: 'cartodbpositron',
        url: 'https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png',
        options: {
          attribution: '&copy; OpenStreetMap contributors &copy; CARTO',
          subdomains: 'abcd',
          maxZoom: 20
        }
      }
    };

    function formatValue(value, localize) {
      if (value === null || value === undefined) return '';
      if (localize && typeof value === 'number') return value.toLocaleString();
      return String(value);
    }

    function escapeText(text) {
      const div = document.createElement('div');
      div.textContent = text;
      return div.innerHTML;
    }

    function tooltipHtml(props, tooltip) {
      const rows = tooltip.fields.map((f) =>
        '<tr><th>' + escapeText(f.alias) + '</th><td>' +
        escapeText(formatValue(props[f.field], tooltip.localize)) + '</td></tr>');
      return '<table class="hvi-tooltip">' + rows.join('') + '</table>';
    }

    function buildLayer(layer, built) {
      switch (layer.kind) {
        case 'wms_tile':
          return L.tileLayer.wms(layer.url, {
            layers: layer.layers,
            format: layer.format,
            transparent: layer.transparent,
            attribution: layer.attribution
          });
        case 'choropleth': {
          const paths = {};
          const geo = L.geoJSON(layer.data, {
            interactive: false,
            style: (f) => Object.assign({}, layer.style, { fillColor: layer.fills[f.id] }),
            onEachFeature: (feature, path) => { paths[feature.id] = path; }
          });
          geo.highlightable = { paths: paths, style: layer.highlight };
          return geo;
        }
        case 'tooltip_overlay': {
          const target = layer.highlights ? built[layer.highlights] : null;
          return L.geoJSON(layer.data, {
            style: () => layer.style,
            onEachFeature: (feature, path) => {
              path.bindTooltip(tooltipHtml(feature.properties || {}, layer.tooltip), {
                sticky: layer.tooltip.sticky
              });
              if (!target || !target.highlightable || !target.highlightable.style) return;
              const under = target.highlightable.paths[feature.id];
              if (!under) return;
              path.on('mouseover', () => {
                under.setStyle(target.highlightable.style);
                under.bringToFront();
                path.bringToFront();
              });
              path.on('mouseout', () => target.resetStyle(under));
            }
          });
        }
      }
      return null;
    }

    function addLegend(map, html, position) {
      const control = L.control({ position: position });
      control.onAdd = () => {
        const div = L.DomUtil.create('div');
        div.innerHTML = html;
        return div;
      };
      control.addTo(map);
    }

    function renderCanvas(canvas) {
      const map = L.map(canvas.id).setView(canvas.center, canvas.zoom);
      const baseSpec = BASE_TILES[canvas.tiles];
      const base = L.tileLayer(baseSpec.url, baseSpec.options).addTo(map);

      const overlays = {};
      for (const spec of canvas.layers) {
        const layer = buildLayer(spec, overlays);
        if (!layer) continue;
        layer.addTo(map);
        overlays[spec.name] = layer;
      }

      canvas.legends.forEach((legend, i) => {
        addLegend(map, canvas.legend_html[i], legend.kind === 'categories' ? 'bottomleft' : 'topright');
      });

      if (canvas.layer_control) {
        L.control.layers({ [baseSpec.name]: base }, overlays).addTo(map);
      }
    }

    CANVASES.forEach(renderCanvas);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeatRiskConfig, HviConfig};
    use crate::map::{heat_risk_legend, heat_risk_map, hvi_map};

    #[test]
    fn dashboard_embeds_both_maps_with_sizes() {
        let canvases = vec![
            heat_risk_map(&HeatRiskConfig::default()),
            hvi_map(&HviConfig::default(), &[]),
        ];
        let html = render_dashboard(&canvases).unwrap();

        assert!(html.contains("<h1>NWS Heat Risk Map</h1>"));
        assert!(html.contains("<h1>NYC Heat Vulnerability Index Map</h1>"));
        assert!(html.contains("id=\"heat-risk-map\" class=\"map\" style=\"width: 900px; height: 600px;\""));
        assert!(html.contains("id=\"hvi-map\" class=\"map\" style=\"width: 1000px; height: 700px;\""));
        assert!(html.contains("\"kind\":\"wms_tile\""));
        assert!(html.contains("\"kind\":\"choropleth\""));
        assert!(html.contains("\"highlights\":\"Heat Vulnerability Index\""));
        assert!(html.contains("interactive: false"));
        assert!(html.contains(LEAFLET_JS));
    }

    #[test]
    fn category_legend_lists_levels_in_order() {
        let html = render_legend(&heat_risk_legend());
        assert_eq!(html.matches("<i style=").count(), 5);
        let green = html.find("Green (0) - Little/no risk").unwrap();
        let magenta = html.find("Magenta (4) - Extreme").unwrap();
        assert!(green < magenta);
        assert!(html.contains("#762a83"));
    }

    #[test]
    fn titles_are_escaped() {
        let mut canvas = heat_risk_map(&HeatRiskConfig::default());
        canvas.title = "<script>alert(1)</script>".to_string();
        let html = render_dashboard(&[canvas]).unwrap();
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("\"title\":\"<script>alert(1)</script>\""));
    }

    #[test]
    fn write_dashboard_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("index.html");
        write_dashboard(&path, "<html></html>").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html></html>");
    }
}
