//! Export des parcelles acceptées en GeoJSON (géométries écrites par geozero)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use crate::plot::CanonicalPlot;

/// Écrit une FeatureCollection dans un fichier
pub fn export_to_geojson(plots: &[CanonicalPlot], epsg: Option<u32>, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_feature_collection(&mut writer, plots, epsg)?;
    writer.flush()?;
    Ok(())
}

/// Écrit une FeatureCollection, membre `crs` si le code EPSG est connu
pub fn write_feature_collection<W: Write>(
    writer: &mut W,
    plots: &[CanonicalPlot],
    epsg: Option<u32>,
) -> Result<()> {
    write!(writer, r#"{{"type":"FeatureCollection","#)?;
    if let Some(epsg) = epsg {
        write!(
            writer,
            r#""crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"#,
            epsg
        )?;
    }
    write!(writer, r#""features":["#)?;

    for (i, plot) in plots.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, plot)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

fn write_feature<W: Write>(writer: &mut W, plot: &CanonicalPlot) -> Result<()> {
    write!(
        writer,
        r#"{{"type":"Feature","id":{},"geometry":"#,
        serde_json::to_string(&plot.plot_code)?
    )?;

    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    plot.geometry.process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    // Champs canoniques et attributs d'origine
    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, plot)?;
    write!(writer, "}}")?;

    Ok(())
}
