//! Parser for the TCAD DF-ISE mesh format: a `.grd` topology file (vertices and,
//! elsewhere, region-tagged element lists) paired with a `.dat` file carrying
//! per-observable vertex values. Only vertex-located observables are kept; anything
//! tagged with more than one validity region is rejected.

use crate::error::MeshError;
use crate::geometry::Point3D;
use crate::mesh::converter::UnstructuredField;

/// The vertex-located observables the core knows how to resample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observable {
    ElectricField,
    ElectrostaticPotential,
    DopingConcentration,
    DonorConcentration,
    AcceptorConcentration,
}

impl Observable {
    fn components(self) -> usize {
        match self {
            Observable::ElectricField => 3,
            _ => 1,
        }
    }

    fn matches_name(self, name: &str) -> bool {
        let target = match self {
            Observable::ElectricField => "ElectricField",
            Observable::ElectrostaticPotential => "ElectrostaticPotential",
            Observable::DopingConcentration => "DopingConcentration",
            Observable::DonorConcentration => "DonorConcentration",
            Observable::AcceptorConcentration => "AcceptorConcentration",
        };
        name == target
    }
}

/// Parses the vertex coordinate list out of a `.grd` file's `Vertices` section.
/// `dimension` is 2 or 3; a 2D mesh's coordinates map to (y, z) with x = 0, per the
/// DF-ISE convention this core follows.
pub fn parse_grd_vertices(text: &str) -> Result<(usize, Vec<Point3D>), MeshError> {
    let dimension = extract_int(text, "dimension")?;
    if dimension != 2 && dimension != 3 {
        return Err(MeshError::DfiseParse { section: "Info".into(), detail: format!("unsupported dimension {dimension}") });
    }

    let body = section_body(text, "Vertices").ok_or_else(|| MeshError::DfiseParse { section: "Vertices".into(), detail: "section not found".into() })?;
    let numbers = parse_numbers(&body);
    let stride = dimension;
    if numbers.len() % stride != 0 {
        return Err(MeshError::DfiseParse { section: "Vertices".into(), detail: "coordinate count not a multiple of dimension".into() });
    }

    let vertices = numbers
        .chunks(stride)
        .map(|c| if dimension == 3 { Point3D::new(c[0], c[1], c[2]) } else { Point3D::new(0.0, c[0], c[1]) })
        .collect();
    Ok((dimension, vertices))
}

/// Parses one observable's per-vertex values out of a `.dat` file. Only the
/// `location = vertex` dataset for a single-region `validity` list is accepted;
/// anything else is out of scope for the core's resampler.
pub fn parse_dat_observable(text: &str, observable: Observable, vertex_count: usize) -> Result<Vec<Vec<f64>>, MeshError> {
    let dataset = find_dataset(text, observable).ok_or_else(|| MeshError::DfiseParse { section: "Data".into(), detail: format!("observable {observable:?} not found") })?;

    if !dataset_is_vertex_located(&dataset) {
        return Err(MeshError::DfiseParse { section: "Data".into(), detail: "observable is not vertex-located".into() });
    }
    if dataset_validity_region_count(&dataset) > 1 {
        return Err(MeshError::DfiseParse { section: "Data".into(), detail: "multi-region validity is not supported".into() });
    }

    let values_body = section_body(&dataset, "Values").ok_or_else(|| MeshError::DfiseParse { section: "Data".into(), detail: "Values block missing".into() })?;
    let numbers = parse_numbers(&values_body);
    let components = observable.components();
    if numbers.len() != vertex_count * components {
        return Err(MeshError::DfiseParse {
            section: "Data".into(),
            detail: format!("expected {} values ({vertex_count} vertices x {components}), got {}", vertex_count * components, numbers.len()),
        });
    }
    Ok(numbers.chunks(components).map(|c| c.to_vec()).collect())
}

/// Convenience entry point: parses vertices and one observable into the
/// [`UnstructuredField`] the converter consumes.
pub fn load_field(grd_text: &str, dat_text: &str, observable: Observable) -> Result<UnstructuredField, MeshError> {
    let (dimension, vertices) = parse_grd_vertices(grd_text)?;
    let values = parse_dat_observable(dat_text, observable, vertices.len())?;
    Ok(UnstructuredField { dimension, vertices, values })
}

fn extract_int(text: &str, key: &str) -> Result<usize, MeshError> {
    let needle = format!("{key} = ");
    let pos = text.find(&needle).ok_or_else(|| MeshError::DfiseParse { section: "Info".into(), detail: format!("key '{key}' not found") })?;
    let rest = &text[pos + needle.len()..];
    let token: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    token.parse().map_err(|_| MeshError::DfiseParse { section: "Info".into(), detail: format!("key '{key}' is not an integer") })
}

/// Extracts the brace-delimited body of the first section named `name`, e.g.
/// `Vertices (4) { ... }` or `Dataset ("X") { ... }` — the optional parenthesised
/// argument between the name and its opening brace is skipped. Honours nested braces.
fn section_body(text: &str, name: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(name) {
        let start = search_from + rel;
        let is_word_start = start == 0 || !text.as_bytes()[start - 1].is_ascii_alphanumeric();
        if is_word_start {
            let after_name = &text[start + name.len()..];
            if let Some(brace_rel) = after_name.find('{') {
                // Only an optional `(...)` argument (and whitespace) may separate the
                // name from its brace; anything else means this was a different token.
                let between = after_name[..brace_rel].trim();
                if between.is_empty() || (between.starts_with('(') && between.ends_with(')')) {
                    let body_start = start + name.len() + brace_rel + 1;
                    return extract_braced(text, body_start);
                }
            }
        }
        search_from = start + name.len();
    }
    None
}

fn extract_braced(text: &str, body_start: usize) -> Option<String> {
    let mut depth = 1i32;
    let bytes = text.as_bytes();
    let mut i = body_start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[body_start..i].to_string());
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn parse_numbers(body: &str) -> Vec<f64> {
    body.split_whitespace().filter_map(|t| t.parse::<f64>().ok()).collect()
}

fn find_dataset(text: &str, observable: Observable) -> Option<String> {
    let mut search_from = 0;
    loop {
        let body = section_body(&text[search_from..], "Dataset")?;
        let header_end = text[search_from..].find(&body)? + search_from;
        let header = &text[search_from..header_end];
        if observable.matches_name(extract_quoted(header).as_deref().unwrap_or("")) {
            return Some(body);
        }
        search_from = header_end + body.len();
    }
}

fn extract_quoted(text: &str) -> Option<String> {
    let start = text.find('"')? + 1;
    let end = text[start..].find('"')? + start;
    Some(text[start..end].to_string())
}

fn dataset_is_vertex_located(dataset: &str) -> bool {
    dataset.contains("location = \"vertex\"") || dataset.contains("location=\"vertex\"")
}

fn dataset_validity_region_count(dataset: &str) -> usize {
    section_body(dataset, "Validity").map(|v| v.split_whitespace().filter(|t| t.starts_with('"')).count()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRD: &str = r#"
Info {
  version = 1.0
  dimension = 3
}
Vertices (4) {
  0.0 0.0 0.0
  1.0 0.0 0.0
  0.0 1.0 0.0
  0.0 0.0 1.0
}
"#;

    const DAT: &str = r#"
Dataset ("ElectrostaticPotential") {
  location = "vertex"
  Validity ( "region0" ) {
  }
  Values (4) {
    1.0 2.0 3.0 4.0
  }
}
"#;

    #[test]
    fn parses_vertices() {
        let (dim, verts) = parse_grd_vertices(GRD).unwrap();
        assert_eq!(dim, 3);
        assert_eq!(verts.len(), 4);
        assert_eq!(verts[3], Point3D::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn parses_scalar_observable() {
        let values = parse_dat_observable(DAT, Observable::ElectrostaticPotential, 4).unwrap();
        assert_eq!(values, vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]]);
    }

    #[test]
    fn rejects_multi_region_validity() {
        let dat = DAT.replace(r#"Validity ( "region0" ) {"#, r#"Validity ( "region0" "region1" ) {"#);
        let result = parse_dat_observable(&dat, Observable::ElectrostaticPotential, 4);
        assert!(result.is_err());
    }

    #[test]
    fn load_field_combines_both_files() {
        let field = load_field(GRD, DAT, Observable::ElectrostaticPotential).unwrap();
        assert_eq!(field.dimension, 3);
        assert_eq!(field.vertices.len(), 4);
        assert_eq!(field.values.len(), 4);
    }
}
