use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use log::{debug, info};
use nohash_hasher::IntMap;

use crate::error::{Error, Result};
use crate::scene::geometry::Mesh;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenType
{
    Comment,
    Vertex,
    Normal,
    Texture,
    Face,
    Group,
    Object,
    Smoothing,
    Material,
    MaterialLibrary,
}

static TOKEN_TYPE: phf::Map<&'static str, TokenType> = phf::phf_map! {
    "#" => TokenType::Comment,
    "v" => TokenType::Vertex,
    "vn" => TokenType::Normal,
    "vt" => TokenType::Texture,
    "f" => TokenType::Face,
    "g" => TokenType::Group,
    "o" => TokenType::Object,
    "s" => TokenType::Smoothing,
    "usemtl" => TokenType::Material,
    "mtllib" => TokenType::MaterialLibrary,
};

pub fn parse_token(keyword: &str) -> Option<TokenType> { TOKEN_TYPE.get(keyword).copied() }

fn malformed(line: usize, reason: impl Into<String>) -> Error { Error::Obj { line, reason: reason.into() } }

fn parse_vec3(tokens: &[&str], line: usize) -> Result<glam::Vec3>
{
    match tokens
    {
        [x, y, z, ..] =>
        {
            let parse = |token: &str| f32::from_str(token).map_err(|error| malformed(line, format!("{token:?}: {error}")));
            Ok(glam::Vec3::new(parse(x)?, parse(y)?, parse(z)?))
        }
        _ => Err(malformed(line, "expected three coordinates")),
    }
}

/// One-based or negative (relative to the end) reference into a list of `len` elements
fn resolve(token: &str, len: usize, line: usize) -> Result<usize>
{
    let index: i64 = token.parse().map_err(|_| malformed(line, format!("invalid index {token:?}")))?;

    let resolved: i64 = if index < 0 { len as i64 + index } else { index - 1 };
    if index == 0 || resolved < 0 || resolved >= len as i64
    {
        return Err(malformed(line, format!("index {index} out of range ({len} elements)")));
    }

    Ok(resolved as usize)
}

#[derive(Copy, Clone)]
struct VertexRef
{
    vertex: usize,
    normal: Option<usize>,
}

/// Parses `v`, `v/vt`, `v//vn` and `v/vt/vn`
fn parse_vertex_ref(token: &str, positions: usize, normals: usize, line: usize) -> Result<VertexRef>
{
    let mut parts = token.split('/');

    let vertex: usize = resolve(parts.next().unwrap_or_default(), positions, line)?;
    let normal: Option<usize> = match parts.nth(1)
    {
        Some(normal) if !normal.is_empty() => Some(resolve(normal, normals, line)?),
        _ => None,
    };

    Ok(VertexRef { vertex, normal })
}

/// Reads a Wavefront OBJ file into an indexed mesh
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh>
{
    let timer: Instant = Instant::now();
    let file: File = File::open(path.as_ref())?;

    let mesh: Mesh = parse_obj(BufReader::new(file))?;

    info!(
        "OBJ - {:?}, {} vertices, {} triangles: \t{:?}",
        path.as_ref().file_name().unwrap_or_default(),
        mesh.vertices.len(),
        mesh.triangle_count(),
        timer.elapsed()
    );
    Ok(mesh)
}

/// Polygons are fan triangulated. Every distinct position/normal pair becomes one vertex; vertices without a
/// normal get the area weighted average of the normals of their faces
pub fn parse_obj<R: BufRead>(reader: R) -> Result<Mesh>
{
    let mut positions: Vec<glam::Vec3> = Vec::new();
    let mut normals: Vec<glam::Vec3> = Vec::new();

    let mut mesh: Mesh = Mesh::default();
    let mut unique: IntMap<u64, u32> = IntMap::default();
    let mut missing_normal: Vec<bool> = Vec::new();

    for (number, line) in reader.lines().enumerate()
    {
        let line: String = line?;
        let number: usize = number + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let Some((&keyword, arguments)) = tokens.split_first()
        else
        {
            continue;
        };

        match parse_token(keyword)
        {
            Some(TokenType::Vertex) => positions.push(parse_vec3(arguments, number)?),
            Some(TokenType::Normal) => normals.push(parse_vec3(arguments, number)?.normalize_or_zero()),
            Some(TokenType::Face) =>
            {
                if arguments.len() < 3
                {
                    return Err(malformed(number, "face with fewer than three vertices"));
                }

                let face: Vec<u32> = arguments
                    .iter()
                    .map(|token: &&str| -> Result<u32> {
                        let reference: VertexRef = parse_vertex_ref(token, positions.len(), normals.len(), number)?;
                        let key: u64 = ((reference.vertex as u64) << 32) | reference.normal.map_or(0, |n| n as u64 + 1);

                        Ok(*unique.entry(key).or_insert_with(|| {
                            mesh.vertices.push(positions[reference.vertex]);
                            mesh.normals.push(reference.normal.map_or(glam::Vec3::ZERO, |n| normals[n]));
                            missing_normal.push(reference.normal.is_none());
                            (mesh.vertices.len() - 1) as u32
                        }))
                    })
                    .collect::<Result<_>>()?;

                for i in 1..face.len() - 1
                {
                    mesh.indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
            //Comments, textures, groups, materials, unknown
            _ => continue,
        }
    }

    if missing_normal.iter().any(|&missing| missing)
    {
        debug!("OBJ - generating normals");

        for face in mesh.indices.chunks_exact(3)
        {
            let p: [glam::Vec3; 3] = [0, 1, 2].map(|i| mesh.vertices[face[i] as usize]);
            let area_normal: glam::Vec3 = (p[1] - p[0]).cross(p[2] - p[0]);

            for &index in face
            {
                if missing_normal[index as usize]
                {
                    mesh.normals[index as usize] += area_normal;
                }
            }
        }

        for (normal, _) in mesh.normals.iter_mut().zip(&missing_normal).filter(|(_, &missing)| missing)
        {
            *normal = normal.try_normalize().unwrap_or(glam::Vec3::Y);
        }
    }

    mesh.validate()?;
    Ok(mesh)
}

#[cfg(test)]
mod tests
{
    use std::io::{Cursor, Write};

    use super::*;

    const QUAD: &str = "\
# unit quad
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1 4//1
";

    #[test]
    fn quad_from_file()
    {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(QUAD.as_bytes()).unwrap();

        let mesh: Mesh = load_obj(file.path()).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(mesh.normals.iter().all(|&n| n == glam::Vec3::Z));
    }

    #[test]
    fn negative_indices_and_generated_normals()
    {
        let source: &str = "v 0 0 0\nv 0 0 2\nv 2 0 0\nf -3 -2 -1\n";
        let mesh: Mesh = parse_obj(Cursor::new(source)).unwrap();

        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert!(mesh.normals.iter().all(|&n| (n - glam::Vec3::Y).length() < 1e-6));
    }

    #[test]
    fn shared_vertices_are_merged_per_normal()
    {
        let source: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nvn 0 0 1\nvn 0 0 -1\nf 1//1 2//1 3//1\nf 2//1 4//1 3//1\nf 1//2 3//2 2//2\n";
        let mesh: Mesh = parse_obj(Cursor::new(source)).unwrap();

        assert_eq!(mesh.vertices.len(), 7);
        assert_eq!(mesh.triangle_count(), 3);
    }

    #[test]
    fn reports_line_of_malformed_input()
    {
        let source: &str = "v 0 0 0\nv 1 0 0\nf 1 2 3\n";
        assert!(matches!(parse_obj(Cursor::new(source)), Err(Error::Obj { line: 3, .. })));

        assert!(matches!(parse_obj(Cursor::new("v 0 zero 0\n")), Err(Error::Obj { line: 1, .. })));
        assert!(matches!(parse_obj(Cursor::new("v 0 0 0\nf 1 1\n")), Err(Error::Obj { line: 2, .. })));
        assert!(matches!(parse_obj(Cursor::new("# nothing\n")), Err(Error::EmptyMesh)));
    }

    #[test]
    fn missing_file_is_io_error()
    {
        let directory = tempfile::tempdir().unwrap();
        assert!(matches!(load_obj(directory.path().join("missing.obj")), Err(Error::Io(_))));
    }
}
