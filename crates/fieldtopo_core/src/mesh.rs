//! Output sink for line and point geometry.
//!
//! Visualizations append vertices to one shared pool and describe primitives
//! through any number of index buffers pointing into it.

use crate::types::Rgba;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawType {
    Points,
    Lines,
}

/// `None`: independent primitives (pairs for lines). `Strip`: one connected polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    None,
    Strip,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f64; 3],
    pub normal: [f64; 3],
    pub texcoord: [f64; 3],
    pub color: Rgba,
}

impl Vertex {
    /// A flat vertex at `(x, y, 0)` facing `+z`, with the position reused as texture coordinate.
    pub fn flat(x: f64, y: f64, color: Rgba) -> Self {
        Self {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
            texcoord: [x, y, 0.0],
            color,
        }
    }
}

/// Handle to an index buffer created through [`MeshSink::add_index_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// Receiver of visualization geometry, typically backed by the host's mesh type.
pub trait MeshSink {
    /// Appends a vertex and returns its index in the vertex pool.
    fn add_vertex(&mut self, vertex: Vertex) -> u32;

    fn add_index_buffer(&mut self, draw_type: DrawType, connectivity: Connectivity) -> BufferId;

    fn add_index(&mut self, buffer: BufferId, index: u32);

    /// Appends a vertex and references it from `buffer`.
    fn push(&mut self, buffer: BufferId, vertex: Vertex) -> u32 {
        let index = self.add_vertex(vertex);
        self.add_index(buffer, index);
        index
    }

    /// Appends an independent line segment (two new vertices) to `buffer`.
    fn push_segment(&mut self, buffer: BufferId, a: Vertex, b: Vertex) {
        self.push(buffer, a);
        self.push(buffer, b);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexBuffer {
    pub draw_type: DrawType,
    pub connectivity: Connectivity,
    pub indices: Vec<u32>,
}

/// In-memory mesh: one vertex pool plus index buffers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub index_buffers: Vec<IndexBuffer>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self, id: BufferId) -> Option<&IndexBuffer> {
        self.index_buffers.get(id.0)
    }

    /// Vertices referenced by `id`, in index order.
    pub fn buffer_vertices(&self, id: BufferId) -> Vec<&Vertex> {
        self.buffer(id)
            .map(|buffer| {
                buffer
                    .indices
                    .iter()
                    .filter_map(|&i| self.vertices.get(i as usize))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl MeshSink for Mesh {
    fn add_vertex(&mut self, vertex: Vertex) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    fn add_index_buffer(&mut self, draw_type: DrawType, connectivity: Connectivity) -> BufferId {
        self.index_buffers.push(IndexBuffer {
            draw_type,
            connectivity,
            indices: Vec::new(),
        });
        BufferId(self.index_buffers.len() - 1)
    }

    fn add_index(&mut self, buffer: BufferId, index: u32) {
        if let Some(target) = self.index_buffers.get_mut(buffer.0) {
            target.indices.push(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_share_one_vertex_pool() {
        let mut mesh = Mesh::new();
        let points = mesh.add_index_buffer(DrawType::Points, Connectivity::None);
        let lines = mesh.add_index_buffer(DrawType::Lines, Connectivity::Strip);
        let first = mesh.push(points, Vertex::flat(0.0, 0.0, [1.0; 4]));
        mesh.add_index(lines, first);
        mesh.push(lines, Vertex::flat(1.0, 0.5, [0.0, 0.0, 1.0, 1.0]));

        assert_eq!(mesh.vertices.len(), 2);
        assert_eq!(mesh.buffer(points).map(|b| b.indices.clone()), Some(vec![0]));
        assert_eq!(mesh.buffer(lines).map(|b| b.indices.clone()), Some(vec![0, 1]));
        let strip = mesh.buffer_vertices(lines);
        assert_eq!(strip[1].position, [1.0, 0.5, 0.0]);
    }

    #[test]
    fn push_segment_adds_two_vertices() {
        let mut mesh = Mesh::new();
        let lines = mesh.add_index_buffer(DrawType::Lines, Connectivity::None);
        mesh.push_segment(
            lines,
            Vertex::flat(0.0, 0.0, [0.0; 4]),
            Vertex::flat(1.0, 1.0, [0.0; 4]),
        );
        assert_eq!(mesh.index_buffers[0].indices, vec![0, 1]);
    }
}
