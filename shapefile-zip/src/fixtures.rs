//! Construction de shapefiles synthétiques pour les tests et benchmarks
//!
//! Les fichiers produits respectent le format (en-têtes, longueurs, index) afin
//! de pouvoir être relus par les parsers de la crate.

use std::io::{Cursor, Write};

use encoding_rs::Encoding;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::parser::shp::{FILE_CODE, HEADER_LEN, VERSION};
use crate::types::ShapeType;

/// Forme à écrire dans un .shp de test
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureShape {
    /// Anneaux (le premier est normalement horaire)
    Polygon(Vec<Vec<(f64, f64)>>),
    Point(f64, f64),
    Null,
}

impl FixtureShape {
    fn shape_type(&self) -> ShapeType {
        match self {
            Self::Polygon(_) => ShapeType::Polygon,
            Self::Point(..) => ShapeType::Point,
            Self::Null => ShapeType::Null,
        }
    }

    fn coords(&self) -> Vec<(f64, f64)> {
        match self {
            Self::Polygon(rings) => rings.iter().flatten().copied().collect(),
            Self::Point(x, y) => vec![(*x, *y)],
            Self::Null => Vec::new(),
        }
    }

    /// Contenu de l'enregistrement (sans l'en-tête numéro/longueur)
    fn content(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.shape_type().code().to_le_bytes());

        match self {
            Self::Null => {}
            Self::Point(x, y) => {
                out.extend_from_slice(&x.to_le_bytes());
                out.extend_from_slice(&y.to_le_bytes());
            }
            Self::Polygon(rings) => {
                for value in bbox(&self.coords()) {
                    out.extend_from_slice(&value.to_le_bytes());
                }
                let num_points: usize = rings.iter().map(Vec::len).sum();
                out.extend_from_slice(&(rings.len() as i32).to_le_bytes());
                out.extend_from_slice(&(num_points as i32).to_le_bytes());

                let mut start = 0;
                for ring in rings {
                    out.extend_from_slice(&(start as i32).to_le_bytes());
                    start += ring.len();
                }
                for (x, y) in rings.iter().flatten() {
                    out.extend_from_slice(&x.to_le_bytes());
                    out.extend_from_slice(&y.to_le_bytes());
                }
            }
        }
        out
    }
}

/// Carré fermé en sens horaire, de coin inférieur gauche (x, y)
pub fn square(x: f64, y: f64, size: f64) -> Vec<(f64, f64)> {
    vec![
        (x, y),
        (x, y + size),
        (x + size, y + size),
        (x + size, y),
        (x, y),
    ]
}

fn bbox(coords: &[(f64, f64)]) -> [f64; 4] {
    if coords.is_empty() {
        return [0.0; 4];
    }
    coords.iter().fold(
        [f64::MAX, f64::MAX, f64::MIN, f64::MIN],
        |[xmin, ymin, xmax, ymax], &(x, y)| [xmin.min(x), ymin.min(y), xmax.max(x), ymax.max(y)],
    )
}

/// En-tête commun .shp / .shx
fn file_header(shapes: &[FixtureShape], file_length: usize) -> Vec<u8> {
    let shape_type = shapes
        .iter()
        .map(FixtureShape::shape_type)
        .find(|t| *t != ShapeType::Null)
        .unwrap_or(ShapeType::Polygon);
    let all: Vec<(f64, f64)> = shapes.iter().flat_map(FixtureShape::coords).collect();

    let mut header = vec![0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&FILE_CODE.to_be_bytes());
    header[24..28].copy_from_slice(&((file_length / 2) as i32).to_be_bytes());
    header[28..32].copy_from_slice(&VERSION.to_le_bytes());
    header[32..36].copy_from_slice(&shape_type.code().to_le_bytes());
    for (i, value) in bbox(&all).iter().enumerate() {
        header[36 + i * 8..44 + i * 8].copy_from_slice(&value.to_le_bytes());
    }
    header
}

/// Fichier .shp complet
pub fn shp_file(shapes: &[FixtureShape]) -> Vec<u8> {
    let mut body = Vec::new();
    for (i, shape) in shapes.iter().enumerate() {
        let content = shape.content();
        body.extend_from_slice(&((i + 1) as i32).to_be_bytes());
        body.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());
        body.extend_from_slice(&content);
    }

    let mut data = file_header(shapes, HEADER_LEN + body.len());
    data.extend_from_slice(&body);
    data
}

/// Fichier .shx correspondant à [`shp_file`]
pub fn shx_file(shapes: &[FixtureShape]) -> Vec<u8> {
    let mut data = file_header(shapes, HEADER_LEN + shapes.len() * 8);
    let mut offset = HEADER_LEN;
    for shape in shapes {
        let length = shape.content().len();
        data.extend_from_slice(&((offset / 2) as i32).to_be_bytes());
        data.extend_from_slice(&((length / 2) as i32).to_be_bytes());
        offset += 8 + length;
    }
    data
}

/// Descripteur de champ DBF de test
#[derive(Debug, Clone)]
pub struct DbfFieldSpec {
    pub name: String,
    pub kind: char,
    pub length: u8,
    pub decimals: u8,
}

impl DbfFieldSpec {
    pub fn new(name: &str, kind: char, length: u8, decimals: u8) -> Self {
        Self {
            name: name.to_string(),
            kind,
            length,
            decimals,
        }
    }

    pub fn text(name: &str, length: u8) -> Self {
        Self::new(name, 'C', length, 0)
    }

    pub fn numeric(name: &str, length: u8, decimals: u8) -> Self {
        Self::new(name, 'N', length, decimals)
    }
}

/// Table DBF encodée en UTF-8, sans language driver
pub fn dbf_file(fields: &[DbfFieldSpec], rows: &[Vec<&str>]) -> Vec<u8> {
    dbf_file_with(fields, rows, None, 0)
}

/// Table DBF avec encodage et octet "language driver" explicites
pub fn dbf_file_with(
    fields: &[DbfFieldSpec],
    rows: &[Vec<&str>],
    encoding: Option<&'static Encoding>,
    ldid: u8,
) -> Vec<u8> {
    let header_len = 32 + fields.len() * 32 + 1;
    let record_len = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();

    let mut data = vec![0u8; 32];
    data[0] = 0x03;
    data[1..4].copy_from_slice(&[124, 1, 15]);
    data[4..8].copy_from_slice(&(rows.len() as u32).to_le_bytes());
    data[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
    data[10..12].copy_from_slice(&(record_len as u16).to_le_bytes());
    data[29] = ldid;

    for field in fields {
        let mut descriptor = [0u8; 32];
        let name = field.name.as_bytes();
        let name_len = name.len().min(10);
        descriptor[..name_len].copy_from_slice(&name[..name_len]);
        descriptor[11] = field.kind as u8;
        descriptor[16] = field.length;
        descriptor[17] = field.decimals;
        data.extend_from_slice(&descriptor);
    }
    data.push(0x0D);

    for row in rows {
        data.push(b' ');
        for (i, field) in fields.iter().enumerate() {
            let value = row.get(i).copied().unwrap_or("");
            let encoded: Vec<u8> = match encoding {
                Some(encoding) => encoding.encode(value).0.into_owned(),
                None => value.as_bytes().to_vec(),
            };
            let width = field.length as usize;
            let mut cell = vec![b' '; width];
            let len = encoded.len().min(width);
            // Les numériques sont justifiés à droite
            if matches!(field.kind, 'N' | 'F') {
                cell[width - len..].copy_from_slice(&encoded[..len]);
            } else {
                cell[..len].copy_from_slice(&encoded[..len]);
            }
            data.extend_from_slice(&cell);
        }
    }
    data.push(0x1A);
    data
}

/// Archive ZIP (deflate) contenant les fichiers donnés, dans l'ordre
///
/// Retourne un vecteur vide si l'écriture échoue.
pub fn zip_archive(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    write_zip(files).unwrap_or_default()
}

fn write_zip(files: &[(&str, Vec<u8>)]) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in files {
        writer.start_file(*name, options)?;
        writer.write_all(content)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Assemble un shapefile complet enregistrement par enregistrement
#[derive(Debug, Clone)]
pub struct ShapefileBuilder {
    fields: Vec<DbfFieldSpec>,
    shapes: Vec<FixtureShape>,
    rows: Vec<Vec<String>>,
    extra_rows: Vec<Vec<String>>,
    prj: Option<String>,
    cpg: Option<String>,
    encoding: Option<&'static Encoding>,
    ldid: u8,
    with_index: bool,
}

impl ShapefileBuilder {
    pub fn new(fields: Vec<DbfFieldSpec>) -> Self {
        Self {
            fields,
            shapes: Vec::new(),
            rows: Vec::new(),
            extra_rows: Vec::new(),
            prj: None,
            cpg: None,
            encoding: None,
            ldid: 0,
            with_index: true,
        }
    }

    /// Ajoute une forme et sa ligne d'attributs
    pub fn record(mut self, shape: FixtureShape, values: &[&str]) -> Self {
        self.shapes.push(shape);
        self.rows.push(values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Ligne d'attributs sans forme correspondante
    pub fn extra_attribute_row(mut self, values: &[&str]) -> Self {
        self.extra_rows
            .push(values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Ajoute un .prj
    pub fn prj(mut self, wkt: &str) -> Self {
        self.prj = Some(wkt.to_string());
        self
    }

    /// Ajoute un .cpg et encode la table avec cet encodage
    pub fn cpg(mut self, label: &str) -> Self {
        self.encoding = Encoding::for_label(label.as_bytes());
        self.cpg = Some(label.to_string());
        self
    }

    /// Encode la table sans .cpg, en renseignant l'octet "language driver"
    pub fn language_driver(mut self, encoding: &'static Encoding, ldid: u8) -> Self {
        self.encoding = Some(encoding);
        self.ldid = ldid;
        self
    }

    /// Omet le .shx
    pub fn without_index(mut self) -> Self {
        self.with_index = false;
        self
    }

    /// Fichiers du shapefile, nommés d'après `stem`
    pub fn files(&self, stem: &str) -> Vec<(String, Vec<u8>)> {
        let rows: Vec<Vec<&str>> = self
            .rows
            .iter()
            .chain(&self.extra_rows)
            .map(|row| row.iter().map(String::as_str).collect())
            .collect();

        let mut files = vec![
            (format!("{}.shp", stem), shp_file(&self.shapes)),
            (
                format!("{}.dbf", stem),
                dbf_file_with(&self.fields, &rows, self.encoding, self.ldid),
            ),
        ];
        if self.with_index {
            files.push((format!("{}.shx", stem), shx_file(&self.shapes)));
        }
        if let Some(prj) = &self.prj {
            files.push((format!("{}.prj", stem), prj.as_bytes().to_vec()));
        }
        if let Some(cpg) = &self.cpg {
            files.push((format!("{}.cpg", stem), cpg.as_bytes().to_vec()));
        }
        files
    }

    /// Archive ZIP du shapefile
    pub fn zip(&self, stem: &str) -> Vec<u8> {
        let files = self.files(stem);
        let refs: Vec<(&str, Vec<u8>)> = files
            .iter()
            .map(|(name, content)| (name.as_str(), content.clone()))
            .collect();
        zip_archive(&refs)
    }
}
