//! OBJ file loader for collision meshes
//!
//! Only positions and faces matter for collision; normals, texture
//! coordinates, groups and materials are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::foundation::math::Vec3;
use crate::spatial::Aabb;

/// Errors produced while reading an OBJ file
#[derive(Error, Debug)]
pub enum ObjError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A value failed to parse
    #[error("Parse error on line {line}: {message}")]
    ParseError {
        /// 1-based line number
        line: usize,
        /// What failed
        message: String,
    },
    /// The file parsed but is not usable
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Triangle data read from a model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions in model space
    pub positions: Vec<Vec3>,
    /// Three indices per triangle, counter-clockwise
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Create mesh data from positions and triangle indices
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Extent of the vertex positions; `None` for an empty mesh
    pub fn aabb(&self) -> Option<Aabb> {
        Aabb::from_points(&self.positions)
    }
}

/// Reader for Wavefront OBJ files
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<MeshData, ObjError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mesh = Self::parse(BufReader::new(file))?;
        log::debug!(
            "Loaded {} ({} vertices, {} triangles)",
            path.display(),
            mesh.positions.len(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    /// Parse OBJ text from any buffered reader
    pub fn parse<R: BufRead>(reader: R) -> Result<MeshData, ObjError> {
        let mut positions = Vec::new();
        let mut indices = Vec::new();

        for (line_index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = line_index + 1;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("v") => {
                    let mut coords = [0.0f32; 3];
                    for (axis, coord) in coords.iter_mut().enumerate() {
                        let text = parts.next().ok_or_else(|| ObjError::ParseError {
                            line: line_number,
                            message: format!("vertex is missing component {axis}"),
                        })?;
                        *coord = text.parse().map_err(|_| ObjError::ParseError {
                            line: line_number,
                            message: format!("invalid vertex component '{text}'"),
                        })?;
                    }
                    positions.push(Vec3::new(coords[0], coords[1], coords[2]));
                }
                Some("f") => {
                    let mut face = Vec::new();
                    for vertex_data in parts {
                        face.push(resolve_index(vertex_data, positions.len(), line_number)?);
                    }
                    if face.len() < 3 {
                        return Err(ObjError::ParseError {
                            line: line_number,
                            message: format!("face has {} vertices", face.len()),
                        });
                    }
                    // Fan triangulation keeps the winding of convex polygons
                    for i in 1..face.len() - 1 {
                        indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                    }
                }
                _ => {}
            }
        }

        if positions.is_empty() {
            return Err(ObjError::InvalidFormat("No vertices found in OBJ file".to_string()));
        }

        Ok(MeshData::new(positions, indices))
    }
}

/// Position index of one face corner (`v`, `v/vt`, `v//vn`, `v/vt/vn`), 1-based or negative-relative
fn resolve_index(vertex_data: &str, vertex_count: usize, line: usize) -> Result<u32, ObjError> {
    let position_part = vertex_data.split('/').next().unwrap_or_default();
    let raw: i64 = position_part.parse().map_err(|_| ObjError::ParseError {
        line,
        message: format!("invalid face index '{vertex_data}'"),
    })?;

    let count = i64::try_from(vertex_count).unwrap_or(i64::MAX);
    let resolved = if raw < 0 { count + raw } else { raw - 1 };
    if resolved < 0 || resolved >= count {
        return Err(ObjError::InvalidFormat(format!(
            "face index {raw} out of bounds for {vertex_count} vertices (line {line})"
        )));
    }
    u32::try_from(resolved)
        .map_err(|_| ObjError::InvalidFormat(format!("face index {raw} does not fit in u32")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const PYRAMID: &str = "\
# square pyramid
v -1 0 -1
v 1 0 -1
v 1 0 1
v -1 0 1
v 0 2 0
vn 0 1 0
f 1 2 3 4
f 1/1/1 5/1/1 2/1/1
f 2//1 5//1 3//1
f -2 -1 -3
f 4 5 1
";

    #[test]
    fn test_parse_triangulates_quads() {
        let mesh = ObjLoader::parse(Cursor::new(PYRAMID)).unwrap();
        assert_eq!(mesh.positions.len(), 5);
        assert_eq!(mesh.triangle_count(), 2 + 4);
        assert_eq!(&mesh.indices[..6], &[0, 1, 2, 0, 2, 3]);
        // Negative indices count back from the latest vertex
        assert_eq!(&mesh.indices[12..15], &[3, 4, 2]);
    }

    #[test]
    fn test_aabb() {
        let mesh = ObjLoader::parse(Cursor::new(PYRAMID)).unwrap();
        let aabb = mesh.aabb().unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, 0.0, -1.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 1.0));
    }

    #[test]
    fn test_rejects_out_of_range_face() {
        let result = ObjLoader::parse(Cursor::new("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n"));
        assert!(matches!(result, Err(ObjError::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_bad_vertex() {
        let result = ObjLoader::parse(Cursor::new("v 0 zero 0\n"));
        assert!(matches!(result, Err(ObjError::ParseError { line: 1, .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ObjLoader::load_obj("definitely/not/here.obj");
        assert!(matches!(result, Err(ObjError::Io(_))));
    }
}
