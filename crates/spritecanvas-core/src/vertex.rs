//! Vertex records and the fixed-capacity vertex arena.

use bytemuck::{Pod, Zeroable};

use crate::sheet::UvRect;

/// Vertices per quad (two triangles).
pub const VERTICES_PER_QUAD: usize = 6;

/// One vertex: canvas-normalized position and sheet-normalized texcoord.
///
/// Layout must match the vertex input of the backend shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
}

impl Vertex {
    #[inline]
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { x, y, u, v }
    }
}

/// Axis-aligned quad in canvas-normalized coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct QuadRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// A bounded vertex arena. Storage is allocated once; writing resets the
/// fill count instead of reallocating.
#[derive(Clone, Debug)]
pub struct VertexBuffer {
    vertices: Box<[Vertex]>,
    len: usize,
}

impl VertexBuffer {
    /// Allocate room for exactly `capacity` vertices.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            vertices: vec![Vertex::zeroed(); capacity].into_boxed_slice(),
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.vertices.len()
    }

    /// Number of vertices written since the last [`clear`](Self::clear).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forget all written vertices.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Written vertices.
    #[inline]
    pub fn as_slice(&self) -> &[Vertex] {
        &self.vertices[..self.len]
    }

    /// Written vertices as raw bytes, ready for upload.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }

    /// Append one quad as two triangles:
    /// (x0,y0) (x1,y0) (x1,y1) and (x0,y0) (x1,y1) (x0,y1).
    ///
    /// Panics if the arena is full; the canvas sizes the arena so that this
    /// cannot happen for any valid configuration.
    pub fn push_quad(&mut self, pos: QuadRect, uv: UvRect) {
        assert!(
            self.len + VERTICES_PER_QUAD <= self.capacity(),
            "vertex buffer overflow: {} + {} > {}",
            self.len,
            VERTICES_PER_QUAD,
            self.capacity()
        );
        let quad = [
            Vertex::new(pos.x0, pos.y0, uv.u0, uv.v0),
            Vertex::new(pos.x1, pos.y0, uv.u1, uv.v0),
            Vertex::new(pos.x1, pos.y1, uv.u1, uv.v1),
            Vertex::new(pos.x0, pos.y0, uv.u0, uv.v0),
            Vertex::new(pos.x1, pos.y1, uv.u1, uv.v1),
            Vertex::new(pos.x0, pos.y1, uv.u0, uv.v1),
        ];
        self.vertices[self.len..self.len + VERTICES_PER_QUAD].copy_from_slice(&quad);
        self.len += VERTICES_PER_QUAD;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POS: QuadRect = QuadRect {
        x0: 0.0,
        y0: 0.0,
        x1: 0.5,
        y1: 0.25,
    };
    const UV: UvRect = UvRect {
        u0: 0.1,
        v0: 0.2,
        u1: 0.3,
        v1: 0.4,
    };

    #[test]
    fn vertex_is_four_floats() {
        assert_eq!(std::mem::size_of::<Vertex>(), 16);
    }

    #[test]
    fn push_quad_winding() {
        let mut vb = VertexBuffer::with_capacity(12);
        vb.push_quad(POS, UV);
        assert_eq!(vb.len(), 6);
        let v = vb.as_slice();
        assert_eq!(v[0], Vertex::new(0.0, 0.0, 0.1, 0.2));
        assert_eq!(v[1], Vertex::new(0.5, 0.0, 0.3, 0.2));
        assert_eq!(v[2], Vertex::new(0.5, 0.25, 0.3, 0.4));
        assert_eq!(v[3], v[0]);
        assert_eq!(v[4], v[2]);
        assert_eq!(v[5], Vertex::new(0.0, 0.25, 0.1, 0.4));
        assert_eq!(vb.as_bytes().len(), 6 * 16);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut vb = VertexBuffer::with_capacity(6);
        vb.push_quad(POS, UV);
        vb.clear();
        assert!(vb.is_empty());
        assert_eq!(vb.capacity(), 6);
        vb.push_quad(POS, UV);
        assert_eq!(vb.len(), 6);
    }

    #[test]
    #[should_panic(expected = "vertex buffer overflow")]
    fn overflow_panics() {
        let mut vb = VertexBuffer::with_capacity(6);
        vb.push_quad(POS, UV);
        vb.push_quad(POS, UV);
    }
}
