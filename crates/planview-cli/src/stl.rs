//! STL loading, binary and ASCII.

use std::path::Path;

use anyhow::{bail, Context, Result};
use planview::TriangleMesh;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Read an STL file into an unindexed mesh.
pub fn read_stl(path: &Path) -> Result<TriangleMesh> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_stl(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}

/// Parse STL bytes, picking the format from the content.
///
/// A file whose length matches the binary facet count is binary even if its
/// header starts with `solid`, which some exporters write.
pub fn parse_stl(bytes: &[u8]) -> Result<TriangleMesh> {
    if is_binary(bytes) {
        parse_binary(bytes)
    } else if bytes.trim_ascii_start().starts_with(b"solid") {
        parse_ascii(std::str::from_utf8(bytes).context("ASCII STL is not valid UTF-8")?)
    } else {
        bail!("unrecognized STL data ({} bytes)", bytes.len())
    }
}

fn is_binary(bytes: &[u8]) -> bool {
    match facet_count(bytes) {
        Some(n) => bytes.len() == HEADER_LEN + 4 + n * FACET_LEN,
        None => false,
    }
}

fn facet_count(bytes: &[u8]) -> Option<usize> {
    let raw: [u8; 4] = bytes.get(HEADER_LEN..HEADER_LEN + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw) as usize)
}

fn parse_binary(bytes: &[u8]) -> Result<TriangleMesh> {
    let count = facet_count(bytes).context("truncated binary STL header")?;
    let mut vertices = Vec::with_capacity(count * 9);
    for facet in bytes[HEADER_LEN + 4..].chunks_exact(FACET_LEN).take(count) {
        // Skip the stored normal; the attribute count follows the corners.
        for chunk in facet[12..48].chunks_exact(4) {
            let raw: [u8; 4] = chunk.try_into().context("short STL coordinate")?;
            vertices.push(f32::from_le_bytes(raw));
        }
    }
    Ok(TriangleMesh::from_soup(vertices)?)
}

fn parse_ascii(text: &str) -> Result<TriangleMesh> {
    let mut vertices = Vec::new();
    let mut corners = 0usize;
    for (number, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("facet") => corners = 0,
            Some("vertex") => {
                for axis in ["x", "y", "z"] {
                    let value: f32 = parts
                        .next()
                        .with_context(|| format!("line {}: missing vertex {axis}", number + 1))?
                        .parse()
                        .with_context(|| format!("line {}: bad vertex {axis}", number + 1))?;
                    vertices.push(value);
                }
                corners += 1;
            }
            Some("endfacet") if corners != 3 => {
                bail!("line {}: facet with {corners} vertices", number + 1)
            }
            Some("endsolid") => break,
            _ => {}
        }
    }
    Ok(TriangleMesh::from_soup(vertices)?)
}
