//! The rendering backend seam.
//!
//! A [`RenderBackend`] creates and destroys the four resources a canvas
//! needs (mesh, shader program, draw state, texture), accepts vertex
//! uploads, and records draw calls. Handles are plain copyable ids; the
//! canvas is responsible for destroying every handle it created.

use std::fmt;

use crate::error::BackendError;
use crate::sheet::SheetImage;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Dynamic vertex buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Compiled shader program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Pipeline state binding a mesh to a program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DrawStateId(pub u32);

/// Sprite sheet texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Any backend resource, for destruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Mesh(MeshId),
    Program(ProgramId),
    DrawState(DrawStateId),
    Texture(TextureId),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Mesh(id) => write!(f, "mesh#{}", id.0),
            Resource::Program(id) => write!(f, "program#{}", id.0),
            Resource::DrawState(id) => write!(f, "draw-state#{}", id.0),
            Resource::Texture(id) => write!(f, "texture#{}", id.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Parameters for a dynamic mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MeshSetup {
    /// Maximum number of vertices the mesh must be able to hold.
    pub max_vertices: usize,
    /// Size of one vertex in bytes.
    pub vertex_stride: usize,
}

impl MeshSetup {
    /// Buffer size in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.max_vertices * self.vertex_stride
    }
}

/// One draw submission: a triangle list of `num_vertices` vertices from the
/// draw state's mesh, textured with `texture`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub draw_state: DrawStateId,
    pub texture: TextureId,
    pub num_vertices: usize,
}

// ---------------------------------------------------------------------------
// RenderBackend
// ---------------------------------------------------------------------------

/// Resource creation and draw submission for a [`TileCanvas`](crate::TileCanvas).
///
/// Vertex data arrives as `{x, y, u, v}` f32 quadruples, six per quad, with
/// positions normalized to the canvas (`0..1`, Y down) and texture
/// coordinates normalized to the sheet image.
pub trait RenderBackend {
    fn create_mesh(&mut self, setup: &MeshSetup) -> Result<MeshId, BackendError>;

    fn create_program(&mut self) -> Result<ProgramId, BackendError>;

    fn create_draw_state(
        &mut self,
        mesh: MeshId,
        program: ProgramId,
    ) -> Result<DrawStateId, BackendError>;

    fn create_texture(&mut self, image: &SheetImage) -> Result<TextureId, BackendError>;

    /// Release a resource. Destroying an unknown handle is ignored.
    fn destroy(&mut self, resource: Resource);

    /// Replace the contents of `mesh` with `data` (`data.len()` bytes).
    fn update_vertices(&mut self, mesh: MeshId, data: &[u8]);

    /// Submit a draw.
    fn draw(&mut self, call: &DrawCall);
}

impl<B: RenderBackend + ?Sized> RenderBackend for Box<B> {
    fn create_mesh(&mut self, setup: &MeshSetup) -> Result<MeshId, BackendError> {
        (**self).create_mesh(setup)
    }

    fn create_program(&mut self) -> Result<ProgramId, BackendError> {
        (**self).create_program()
    }

    fn create_draw_state(
        &mut self,
        mesh: MeshId,
        program: ProgramId,
    ) -> Result<DrawStateId, BackendError> {
        (**self).create_draw_state(mesh, program)
    }

    fn create_texture(&mut self, image: &SheetImage) -> Result<TextureId, BackendError> {
        (**self).create_texture(image)
    }

    fn destroy(&mut self, resource: Resource) {
        (**self).destroy(resource)
    }

    fn update_vertices(&mut self, mesh: MeshId, data: &[u8]) {
        (**self).update_vertices(mesh, data)
    }

    fn draw(&mut self, call: &DrawCall) {
        (**self).draw(call)
    }
}

// ---------------------------------------------------------------------------
// CanvasResources
// ---------------------------------------------------------------------------

/// The set of handles a valid canvas holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CanvasResources {
    pub mesh: MeshId,
    pub program: ProgramId,
    pub draw_state: DrawStateId,
    pub texture: TextureId,
}

impl CanvasResources {
    /// Create all four resources. If any creation fails, the ones already
    /// created are destroyed before the error is returned.
    pub fn acquire<B: RenderBackend + ?Sized>(
        backend: &mut B,
        mesh: &MeshSetup,
        image: &SheetImage,
    ) -> Result<Self, BackendError> {
        let mut created: Vec<Resource> = Vec::with_capacity(4);
        let result = Self::create_all(backend, mesh, image, &mut created);
        if result.is_err() {
            for res in created.into_iter().rev() {
                log::debug!("releasing {res} after failed setup");
                backend.destroy(res);
            }
        }
        result
    }

    fn create_all<B: RenderBackend + ?Sized>(
        backend: &mut B,
        mesh: &MeshSetup,
        image: &SheetImage,
        created: &mut Vec<Resource>,
    ) -> Result<Self, BackendError> {
        let mesh = backend.create_mesh(mesh)?;
        created.push(Resource::Mesh(mesh));
        let program = backend.create_program()?;
        created.push(Resource::Program(program));
        let draw_state = backend.create_draw_state(mesh, program)?;
        created.push(Resource::DrawState(draw_state));
        let texture = backend.create_texture(image)?;
        Ok(Self {
            mesh,
            program,
            draw_state,
            texture,
        })
    }

    /// Destroy all four resources, dependents first.
    pub fn release<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy(Resource::Texture(self.texture));
        backend.destroy(Resource::DrawState(self.draw_state));
        backend.destroy(Resource::Program(self.program));
        backend.destroy(Resource::Mesh(self.mesh));
    }
}
