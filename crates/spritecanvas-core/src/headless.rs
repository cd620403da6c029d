//! In-memory rendering backend.
//!
//! [`HeadlessBackend`] keeps track of live resources and records every draw
//! with a copy of the vertices that were current in the drawn mesh. It is
//! useful for off-screen rendering tests and for inspecting what a canvas
//! would submit to a GPU.

use std::collections::{HashMap, HashSet};

use crate::backend::{
    DrawCall, DrawStateId, MeshId, MeshSetup, ProgramId, RenderBackend, Resource, TextureId,
};
use crate::error::BackendError;
use crate::sheet::SheetImage;
use crate::vertex::Vertex;

/// Resource kinds, used to inject creation failures.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Mesh,
    Program,
    DrawState,
    Texture,
}

/// A recorded draw submission.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub call: DrawCall,
    /// The first `call.num_vertices` vertices of the mesh at draw time.
    pub vertices: Vec<Vertex>,
}

#[derive(Debug)]
struct MeshData {
    capacity_bytes: usize,
    vertices: Vec<Vertex>,
}

/// Backend that renders nothing and remembers everything.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u32,
    meshes: HashMap<MeshId, MeshData>,
    programs: HashSet<ProgramId>,
    draw_states: HashMap<DrawStateId, MeshId>,
    textures: HashMap<TextureId, (u32, u32)>,
    draws: Vec<DrawRecord>,
    fail_on: Option<ResourceKind>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next creation of `kind` fail with [`BackendError::Other`].
    pub fn fail_on(&mut self, kind: ResourceKind) {
        self.fail_on = Some(kind);
    }

    /// Number of resources currently alive.
    pub fn live_resources(&self) -> usize {
        self.meshes.len() + self.programs.len() + self.draw_states.len() + self.textures.len()
    }

    /// All draws recorded so far, oldest first.
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// The most recent draw.
    pub fn last_draw(&self) -> Option<&DrawRecord> {
        self.draws.last()
    }

    /// Forget recorded draws.
    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    /// Current vertex contents of `mesh`.
    pub fn mesh_vertices(&self, mesh: MeshId) -> Option<&[Vertex]> {
        self.meshes.get(&mesh).map(|m| m.vertices.as_slice())
    }

    /// Size of the texture `id`, if alive.
    pub fn texture_size(&self, id: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&id).copied()
    }

    fn alloc(&mut self, kind: ResourceKind) -> Result<u32, BackendError> {
        if self.fail_on == Some(kind) {
            self.fail_on = None;
            return Err(BackendError::Other(format!("injected {kind:?} failure")));
        }
        self.next_id += 1;
        Ok(self.next_id)
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_mesh(&mut self, setup: &MeshSetup) -> Result<MeshId, BackendError> {
        let id = MeshId(self.alloc(ResourceKind::Mesh)?);
        self.meshes.insert(
            id,
            MeshData {
                capacity_bytes: setup.byte_size(),
                vertices: Vec::new(),
            },
        );
        Ok(id)
    }

    fn create_program(&mut self) -> Result<ProgramId, BackendError> {
        let id = ProgramId(self.alloc(ResourceKind::Program)?);
        self.programs.insert(id);
        Ok(id)
    }

    fn create_draw_state(
        &mut self,
        mesh: MeshId,
        program: ProgramId,
    ) -> Result<DrawStateId, BackendError> {
        if !self.meshes.contains_key(&mesh) {
            return Err(BackendError::UnknownHandle("mesh", mesh.0));
        }
        if !self.programs.contains(&program) {
            return Err(BackendError::UnknownHandle("program", program.0));
        }
        let id = DrawStateId(self.alloc(ResourceKind::DrawState)?);
        self.draw_states.insert(id, mesh);
        Ok(id)
    }

    fn create_texture(&mut self, image: &SheetImage) -> Result<TextureId, BackendError> {
        let id = TextureId(self.alloc(ResourceKind::Texture)?);
        self.textures.insert(id, (image.width(), image.height()));
        Ok(id)
    }

    fn destroy(&mut self, resource: Resource) {
        let removed = match resource {
            Resource::Mesh(id) => self.meshes.remove(&id).is_some(),
            Resource::Program(id) => self.programs.remove(&id),
            Resource::DrawState(id) => self.draw_states.remove(&id).is_some(),
            Resource::Texture(id) => self.textures.remove(&id).is_some(),
        };
        if !removed {
            log::warn!("destroy of unknown {resource}");
        }
    }

    fn update_vertices(&mut self, mesh: MeshId, data: &[u8]) {
        let Some(m) = self.meshes.get_mut(&mesh) else {
            log::warn!("update of unknown mesh#{}", mesh.0);
            return;
        };
        if data.len() > m.capacity_bytes {
            log::warn!(
                "vertex upload of {} bytes exceeds mesh capacity {}",
                data.len(),
                m.capacity_bytes
            );
            return;
        }
        m.vertices = data
            .chunks_exact(std::mem::size_of::<Vertex>())
            .map(bytemuck::pod_read_unaligned)
            .collect();
    }

    fn draw(&mut self, call: &DrawCall) {
        let Some(mesh) = self.draw_states.get(&call.draw_state) else {
            log::warn!("draw with unknown draw-state#{}", call.draw_state.0);
            return;
        };
        if !self.textures.contains_key(&call.texture) {
            log::warn!("draw with unknown texture#{}", call.texture.0);
            return;
        }
        let vertices = self
            .meshes
            .get(mesh)
            .map(|m| m.vertices.iter().take(call.num_vertices).copied().collect())
            .unwrap_or_default();
        self.draws.push(DrawRecord {
            call: *call,
            vertices,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CanvasResources;

    fn image() -> SheetImage {
        SheetImage::from_fn(16, 8, |_, _| [255; 4])
    }

    const MESH: MeshSetup = MeshSetup {
        max_vertices: 12,
        vertex_stride: 16,
    };

    #[test]
    fn acquire_and_release() {
        let mut be = HeadlessBackend::new();
        let res = CanvasResources::acquire(&mut be, &MESH, &image()).unwrap();
        assert_eq!(be.live_resources(), 4);
        assert_eq!(be.texture_size(res.texture), Some((16, 8)));
        res.release(&mut be);
        assert_eq!(be.live_resources(), 0);
    }

    #[test]
    fn failed_acquire_rolls_back() {
        for kind in [
            ResourceKind::Mesh,
            ResourceKind::Program,
            ResourceKind::DrawState,
            ResourceKind::Texture,
        ] {
            let mut be = HeadlessBackend::new();
            be.fail_on(kind);
            assert!(CanvasResources::acquire(&mut be, &MESH, &image()).is_err());
            assert_eq!(be.live_resources(), 0, "leak after {kind:?} failure");
        }
    }

    #[test]
    fn draw_records_uploaded_vertices() {
        let mut be = HeadlessBackend::new();
        let res = CanvasResources::acquire(&mut be, &MESH, &image()).unwrap();
        let verts = [Vertex::new(1.0, 2.0, 3.0, 4.0); 6];
        be.update_vertices(res.mesh, bytemuck::cast_slice(&verts));
        be.draw(&DrawCall {
            draw_state: res.draw_state,
            texture: res.texture,
            num_vertices: 6,
        });
        let rec = be.last_draw().unwrap();
        assert_eq!(rec.vertices, verts.to_vec());
    }

    #[test]
    fn upload_decodes_unaligned_bytes() {
        let mut be = HeadlessBackend::new();
        let res = CanvasResources::acquire(&mut be, &MESH, &image()).unwrap();
        let verts = [Vertex::new(0.5, 0.25, 0.125, 1.0); 6];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(bytemuck::cast_slice(&verts));
        be.update_vertices(res.mesh, &bytes[1..]);
        assert_eq!(be.mesh_vertices(res.mesh), Some(&verts[..]));
    }

    #[test]
    fn clear_draws_forgets_history() {
        let mut be = HeadlessBackend::new();
        let res = CanvasResources::acquire(&mut be, &MESH, &image()).unwrap();
        let call = DrawCall {
            draw_state: res.draw_state,
            texture: res.texture,
            num_vertices: 0,
        };
        be.draw(&call);
        be.draw(&call);
        assert_eq!(be.draws().len(), 2);
        be.clear_draws();
        assert!(be.last_draw().is_none());
    }

    #[test]
    fn oversized_upload_is_ignored() {
        let mut be = HeadlessBackend::new();
        let res = CanvasResources::acquire(&mut be, &MESH, &image()).unwrap();
        let verts = [Vertex::default(); 18];
        be.update_vertices(res.mesh, bytemuck::cast_slice(&verts));
        assert_eq!(be.mesh_vertices(res.mesh), Some(&[][..]));
    }

    #[test]
    fn draw_with_released_state_is_dropped() {
        let mut be = HeadlessBackend::new();
        let res = CanvasResources::acquire(&mut be, &MESH, &image()).unwrap();
        res.release(&mut be);
        be.draw(&DrawCall {
            draw_state: res.draw_state,
            texture: res.texture,
            num_vertices: 0,
        });
        assert!(be.draws().is_empty());
    }
}
