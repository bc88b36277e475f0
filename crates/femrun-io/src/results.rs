//! Solver result readers.
//!
//! Elmer writes VTU (XML) files and MoFEM results are converted to legacy
//! VTK by `mbconvert`. Both are read into one [`ResultSet`] so the pipeline
//! hands the host a single shape regardless of backend.
//!
//! Only ASCII payloads are decoded. Binary or appended arrays are still
//! listed with their name and component count but carry no values.
//!
//! ```rust,no_run
//! use femrun_io::ResultSet;
//!
//! let result = ResultSet::from_file("case0001.vtu")?;
//! println!("Points: {}, Cells: {}", result.points.len(), result.cell_count);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;

use crate::error::ResultReadError;

type Result<T> = std::result::Result<T, ResultReadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Vtu,
    LegacyVtk,
}

impl ResultFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "vtu" => Some(ResultFormat::Vtu),
            "vtk" => Some(ResultFormat::LegacyVtk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    Point,
    Cell,
}

/// One named data array.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultField {
    pub name: String,
    pub location: FieldLocation,
    pub components: usize,
    /// Flattened tuples; empty when the payload was not ASCII.
    pub values: Vec<f64>,
}

impl ResultField {
    pub fn tuple_count(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.values.len() / self.components
        }
    }
}

/// Normalized solver result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub source: PathBuf,
    pub format: ResultFormat,
    pub points: Vec<[f64; 3]>,
    pub cell_count: usize,
    pub fields: Vec<ResultField>,
}

impl ResultSet {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ResultFormat::from_path(path)
            .ok_or_else(|| ResultReadError::UnsupportedFormat(path.display().to_string()))?;
        let text = fs::read_to_string(path)?;
        let mut set = match format {
            ResultFormat::Vtu => parse_vtu(&text)?,
            ResultFormat::LegacyVtk => parse_legacy_vtk(&text)?,
        };
        set.source = path.to_path_buf();
        Ok(set)
    }

    pub fn field(&self, name: &str) -> Option<&ResultField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self, location: FieldLocation) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.location == location)
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Parses an unstructured-grid VTU document.
pub fn parse_vtu(text: &str) -> Result<ResultSet> {
    // raw appended data is not valid XML
    let xml = match text.find("<AppendedData") {
        Some(pos) => format!("{}</UnstructuredGrid></VTKFile>", &text[..pos]),
        None => text.to_string(),
    };
    let doc = roxmltree::Document::parse(&xml)?;
    let piece = doc
        .descendants()
        .find(|n| n.has_tag_name("Piece"))
        .ok_or_else(|| ResultReadError::Parse("VTU file has no Piece element".to_string()))?;
    let point_count = count_attribute(&piece, "NumberOfPoints")?;
    let cell_count = count_attribute(&piece, "NumberOfCells")?;

    let mut points = Vec::new();
    if let Some(array) = piece
        .children()
        .find(|n| n.has_tag_name("Points"))
        .and_then(|p| p.children().find(|n| n.has_tag_name("DataArray")))
    {
        let values = ascii_values(&array)?;
        points.extend(
            values
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]]),
        );
        // binary coordinates carry no values to compare against
        if !values.is_empty() && points.len() != point_count {
            return Err(ResultReadError::Parse(format!(
                "Piece declares {point_count} points but lists {}",
                points.len()
            )));
        }
    }

    let mut fields = Vec::new();
    for (tag, location) in [("PointData", FieldLocation::Point), ("CellData", FieldLocation::Cell)] {
        let Some(data) = piece.children().find(|n| n.has_tag_name(tag)) else {
            continue;
        };
        for array in data.children().filter(|n| n.has_tag_name("DataArray")) {
            let name = array.attribute("Name").unwrap_or("unnamed").to_string();
            let components = array
                .attribute("NumberOfComponents")
                .map(|v| {
                    v.parse::<usize>().map_err(|_| {
                        ResultReadError::Parse(format!("bad component count '{v}' for {name}"))
                    })
                })
                .transpose()?
                .unwrap_or(1);
            fields.push(ResultField {
                name,
                location,
                components,
                values: ascii_values(&array)?,
            });
        }
    }

    Ok(ResultSet {
        source: PathBuf::new(),
        format: ResultFormat::Vtu,
        points,
        cell_count,
        fields,
    })
}

fn count_attribute(node: &roxmltree::Node<'_, '_>, name: &str) -> Result<usize> {
    let raw = node
        .attribute(name)
        .ok_or_else(|| ResultReadError::Parse(format!("Piece lacks {name}")))?;
    raw.trim()
        .parse()
        .map_err(|_| ResultReadError::Parse(format!("invalid {name} '{raw}'")))
}

fn ascii_values(array: &roxmltree::Node<'_, '_>) -> Result<Vec<f64>> {
    if array.attribute("format").unwrap_or("ascii") != "ascii" {
        return Ok(Vec::new());
    }
    array
        .text()
        .unwrap_or("")
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| ResultReadError::Parse(format!("invalid number '{token}'")))
        })
        .collect()
}

struct Tokens<'a> {
    inner: Peekable<SplitWhitespace<'a>>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace().peekable(),
        }
    }

    fn next(&mut self, what: &str) -> Result<&'a str> {
        self.inner
            .next()
            .ok_or_else(|| ResultReadError::Parse(format!("unexpected end of file, expected {what}")))
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let token = self.next(what)?;
        token
            .parse()
            .map_err(|_| ResultReadError::Parse(format!("invalid {what} '{token}'")))
    }

    fn floats(&mut self, n: usize) -> Result<Vec<f64>> {
        (0..n)
            .map(|_| {
                let token = self.next("value")?;
                token
                    .parse::<f64>()
                    .map_err(|_| ResultReadError::Parse(format!("invalid number '{token}'")))
            })
            .collect()
    }

    /// Reads `count` tuples of `components` values each.
    fn tuples(&mut self, components: usize, count: usize) -> Result<Vec<f64>> {
        let n = components.checked_mul(count).ok_or_else(|| {
            ResultReadError::Parse(format!("{count} tuples of {components} values overflow"))
        })?;
        self.floats(n)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.next("value")?;
        }
        Ok(())
    }
}

/// Parses an ASCII legacy VTK unstructured grid.
pub fn parse_legacy_vtk(text: &str) -> Result<ResultSet> {
    let mut lines = text.splitn(4, '\n');
    let version = lines.next().unwrap_or("");
    if !version.starts_with("# vtk DataFile") {
        return Err(ResultReadError::Parse("missing legacy VTK header".to_string()));
    }
    let _title = lines.next();
    let encoding = lines.next().unwrap_or("").trim();
    if !encoding.eq_ignore_ascii_case("ASCII") {
        return Err(ResultReadError::UnsupportedFormat(format!(
            "{encoding} legacy VTK"
        )));
    }
    let mut tokens = Tokens::new(lines.next().unwrap_or(""));

    let mut points = Vec::new();
    let mut cell_count = 0usize;
    let mut fields = Vec::new();
    let mut location = FieldLocation::Point;
    let mut tuples = 0usize;

    while let Some(keyword) = tokens.inner.next() {
        match keyword.to_ascii_uppercase().as_str() {
            "DATASET" => {
                let kind = tokens.next("dataset type")?;
                if !kind.eq_ignore_ascii_case("UNSTRUCTURED_GRID") {
                    return Err(ResultReadError::UnsupportedFormat(format!("{kind} dataset")));
                }
            }
            "POINTS" => {
                let n = tokens.count("point count")?;
                tokens.next("point type")?;
                points = tokens
                    .tuples(3, n)?
                    .chunks_exact(3)
                    .map(|c| [c[0], c[1], c[2]])
                    .collect();
            }
            "CELLS" => {
                cell_count = tokens.count("cell count")?;
                let size = tokens.count("cell list size")?;
                tokens.skip(size)?;
            }
            "CELL_TYPES" => {
                let n = tokens.count("cell type count")?;
                tokens.skip(n)?;
            }
            "POINT_DATA" => {
                location = FieldLocation::Point;
                tuples = tokens.count("point data count")?;
            }
            "CELL_DATA" => {
                location = FieldLocation::Cell;
                tuples = tokens.count("cell data count")?;
            }
            "SCALARS" => {
                let name = tokens.next("scalar name")?.to_string();
                tokens.next("scalar type")?;
                let explicit = tokens.inner.peek().and_then(|t| t.parse::<usize>().ok());
                let components = explicit.unwrap_or(1);
                if explicit.is_some() {
                    tokens.inner.next();
                }
                if tokens
                    .inner
                    .peek()
                    .is_some_and(|t| t.eq_ignore_ascii_case("LOOKUP_TABLE"))
                {
                    tokens.inner.next();
                    tokens.next("lookup table name")?;
                }
                fields.push(ResultField {
                    name,
                    location,
                    components,
                    values: tokens.tuples(components, tuples)?,
                });
            }
            kind @ ("VECTORS" | "NORMALS" | "TENSORS") => {
                let components = if kind == "TENSORS" { 9 } else { 3 };
                let name = tokens.next("array name")?.to_string();
                tokens.next("array type")?;
                fields.push(ResultField {
                    name,
                    location,
                    components,
                    values: tokens.tuples(components, tuples)?,
                });
            }
            "FIELD" => {
                tokens.next("field name")?;
                let arrays = tokens.count("field array count")?;
                for _ in 0..arrays {
                    let name = tokens.next("array name")?.to_string();
                    let components = tokens.count("component count")?;
                    let count = tokens.count("tuple count")?;
                    tokens.next("array type")?;
                    fields.push(ResultField {
                        name,
                        location,
                        components,
                        values: tokens.tuples(components, count)?,
                    });
                }
            }
            "METADATA" => break,
            other => {
                return Err(ResultReadError::Parse(format!(
                    "unexpected legacy VTK keyword '{other}'"
                )));
            }
        }
    }

    Ok(ResultSet {
        source: PathBuf::new(),
        format: ResultFormat::LegacyVtk,
        points,
        cell_count,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VTU: &str = r#"<?xml version="1.0"?>
<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">
  <UnstructuredGrid>
    <Piece NumberOfPoints="3" NumberOfCells="1">
      <PointData>
        <DataArray type="Float64" Name="displacement" NumberOfComponents="3" format="ascii">
          0 0 0  0.1 0 0  0 0.2 0
        </DataArray>
        <DataArray type="Float64" Name="vonmises" format="binary">AAAA</DataArray>
      </PointData>
      <CellData>
        <DataArray type="Int32" Name="GeometryIds" format="ascii">1</DataArray>
      </CellData>
      <Points>
        <DataArray type="Float64" NumberOfComponents="3" format="ascii">
          0 0 0 1 0 0 0 1 0
        </DataArray>
      </Points>
      <Cells>
        <DataArray type="Int32" Name="connectivity" format="ascii">0 1 2</DataArray>
      </Cells>
    </Piece>
  </UnstructuredGrid>
</VTKFile>
"#;

    const VTK: &str = "# vtk DataFile Version 3.0
MOAB 5.3.0
ASCII
DATASET UNSTRUCTURED_GRID
POINTS 3 double
0 0 0
1 0 0
0 1 0
CELLS 1 4
3 0 1 2
CELL_TYPES 1
5
POINT_DATA 3
VECTORS DISPLACEMENT double
0 0 0 0.1 0 0 0 0.2 0
SCALARS ENERGY double 1
LOOKUP_TABLE default
1 2 3
CELL_DATA 1
FIELD FieldData 1
STRESS 9 1 double
1 0 0 0 1 0 0 0 1
";

    #[test]
    fn reads_ascii_vtu() {
        let set = parse_vtu(VTU).expect("VTU should parse");
        assert_eq!(set.points.len(), 3);
        assert_eq!(set.points[1], [1.0, 0.0, 0.0]);
        assert_eq!(set.cell_count, 1);
        assert_eq!(set.field_names(FieldLocation::Point), vec!["displacement", "vonmises"]);
        assert_eq!(set.field_names(FieldLocation::Cell), vec!["GeometryIds"]);

        let displacement = set.field("displacement").expect("displacement field");
        assert_eq!(displacement.components, 3);
        assert_eq!(displacement.tuple_count(), 3);
        assert!(set.field("vonmises").expect("binary field listed").values.is_empty());
    }

    #[test]
    fn vtu_with_appended_data_is_truncated() {
        let text = VTU.replace(
            "  </UnstructuredGrid>",
            "  <AppendedData encoding=\"raw\">_\u{1}\u{2}</AppendedData>\n  </UnstructuredGrid>",
        );
        let set = parse_vtu(&text).expect("VTU with appended data should parse");
        assert_eq!(set.points.len(), 3);
    }

    #[test]
    fn reads_ascii_legacy_vtk() {
        let set = parse_legacy_vtk(VTK).expect("legacy VTK should parse");
        assert_eq!(set.points.len(), 3);
        assert_eq!(set.cell_count, 1);
        assert_eq!(set.field("ENERGY").expect("scalar field").values, vec![1.0, 2.0, 3.0]);
        assert_eq!(set.field("DISPLACEMENT").expect("vector field").tuple_count(), 3);
        let stress = set.field("STRESS").expect("field data");
        assert_eq!(stress.location, FieldLocation::Cell);
        assert_eq!(stress.components, 9);
    }

    #[test]
    fn rejects_binary_legacy_vtk() {
        let text = VTK.replacen("ASCII", "BINARY", 1);
        let err = parse_legacy_vtk(&text).expect_err("binary should be rejected");
        assert!(matches!(err, ResultReadError::UnsupportedFormat(_)));
    }

    #[test]
    fn vtu_point_count_must_match_coordinates() {
        let text = VTU.replace("NumberOfPoints=\"3\"", "NumberOfPoints=\"18446744073709551615\"");
        let err = parse_vtu(&text).expect_err("bogus point count should fail");
        assert!(matches!(err, ResultReadError::Parse(_)));
    }

    #[test]
    fn legacy_vtk_huge_counts_are_parse_errors() {
        let text = VTK.replace("POINTS 3 double", "POINTS 9223372036854775807 double");
        let err = parse_legacy_vtk(&text).expect_err("overflowing point count should fail");
        assert!(matches!(err, ResultReadError::Parse(_)));

        let text = VTK.replace("STRESS 9 1 double", "STRESS 9 18446744073709551615 double");
        let err = parse_legacy_vtk(&text).expect_err("overflowing tuple count should fail");
        assert!(matches!(err, ResultReadError::Parse(_)));

        let text = VTK.replace("POINTS 3 double", "POINTS 300 double");
        let err = parse_legacy_vtk(&text).expect_err("truncated points should fail");
        assert!(matches!(err, ResultReadError::Parse(_)));
    }

    #[test]
    fn from_file_picks_reader_by_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.vtk");
        fs::write(&path, VTK).expect("write result");
        let set = ResultSet::from_file(&path).expect("result should load");
        assert_eq!(set.format, ResultFormat::LegacyVtk);
        assert_eq!(set.source, path);

        let other = dir.path().join("out.h5m");
        fs::write(&other, "").expect("write result");
        assert!(matches!(
            ResultSet::from_file(&other),
            Err(ResultReadError::UnsupportedFormat(_))
        ));
    }
}
